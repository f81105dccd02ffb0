//! GPOS lookup subtables.
//!
//! These only decode the font data. Scaling values and resolving anchors to positions is done
//! by the positioning engine in `gpos`.

use std::rc::Rc;

use bitflags::bitflags;

use crate::binary::read::{
    CheckIndex, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFixedSizeDep, ReadScope,
};
use crate::binary::U16Be;
use crate::error::ParseError;
use crate::layout::contextual::{ChainContextLookup, ContextLookup};
use crate::layout::{
    read_classdef, read_coverage, read_device, read_objects_dep, read_subtables, ClassDef,
    Coverage, Device, LayoutCache, LayoutTableType, GPOS,
};
use crate::size;

pub enum PosLookup {
    SinglePos(Vec<SinglePos>),
    PairPos(Vec<PairPos>),
    CursivePos(Vec<CursivePos>),
    MarkBasePos(Vec<MarkBasePos>),
    MarkLigPos(Vec<MarkLigPos>),
    MarkMarkPos(Vec<MarkBasePos>),
    ContextPos(Vec<ContextLookup>),
    ChainContextPos(Vec<ChainContextLookup>),
}

impl LayoutTableType for GPOS {
    type LookupSubtables = PosLookup;

    const EXTENSION_LOOKUP_TYPE: u16 = 9;

    fn read_subtables<'a>(
        lookup_type: u16,
        subtables: &[ReadScope<'a>],
        cache: &'a LayoutCache,
    ) -> Result<PosLookup, ParseError> {
        let lookup = match lookup_type {
            1 => PosLookup::SinglePos(read_subtables(subtables, cache)?),
            2 => PosLookup::PairPos(read_subtables(subtables, cache)?),
            3 => PosLookup::CursivePos(read_subtables(subtables, cache)?),
            4 => PosLookup::MarkBasePos(read_subtables(subtables, cache)?),
            5 => PosLookup::MarkLigPos(read_subtables(subtables, cache)?),
            6 => PosLookup::MarkMarkPos(read_subtables(subtables, cache)?),
            7 => PosLookup::ContextPos(read_subtables(subtables, cache)?),
            8 => PosLookup::ChainContextPos(read_subtables(subtables, cache)?),
            _ => return Err(ParseError::BadFormat),
        };
        Ok(lookup)
    }
}

bitflags! {
    /// Which fields are present in a ValueRecord.
    ///
    /// The `ID` bits are the metric ids of the pre-1.0 multiple master extension.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct ValueFormat: u16 {
        const X_PLACEMENT = 0x0001;
        const Y_PLACEMENT = 0x0002;
        const X_ADVANCE = 0x0004;
        const Y_ADVANCE = 0x0008;
        const X_PLACEMENT_DEVICE = 0x0010;
        const Y_PLACEMENT_DEVICE = 0x0020;
        const X_ADVANCE_DEVICE = 0x0040;
        const Y_ADVANCE_DEVICE = 0x0080;
        const X_ID_PLACEMENT = 0x0100;
        const Y_ID_PLACEMENT = 0x0200;
        const X_ID_ADVANCE = 0x0400;
        const Y_ID_ADVANCE = 0x0800;
    }
}

impl ReadBinary for ValueFormat {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let value_format = ctxt.read_u16be()?;
        ValueFormat::from_bits(value_format).ok_or(ParseError::BadValue)
    }
}

impl ValueFormat {
    /// Size in bytes of a ValueRecord in this format.
    pub fn size(self) -> usize {
        self.bits().count_ones() as usize * size::U16
    }
}

/// A positioning adjustment. Only the fields named by the ValueFormat are present.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValueRecord {
    pub x_placement: Option<i16>,
    pub y_placement: Option<i16>,
    pub x_advance: Option<i16>,
    pub y_advance: Option<i16>,
    pub x_placement_device: Option<Device>,
    pub y_placement_device: Option<Device>,
    pub x_advance_device: Option<Device>,
    pub y_advance_device: Option<Device>,
    pub x_id_placement: Option<u16>,
    pub y_id_placement: Option<u16>,
    pub x_id_advance: Option<u16>,
    pub y_id_advance: Option<u16>,
}

impl ReadBinaryDep for ValueRecord {
    /// The format, and the table that Device offsets are relative to.
    type Args<'a> = (ValueFormat, ReadScope<'a>);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format, scope): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let mut read_i16 = |flag: ValueFormat| -> Result<Option<i16>, ParseError> {
            if value_format.contains(flag) {
                Ok(Some(ctxt.read_i16be()?))
            } else {
                Ok(None)
            }
        };
        let x_placement = read_i16(ValueFormat::X_PLACEMENT)?;
        let y_placement = read_i16(ValueFormat::Y_PLACEMENT)?;
        let x_advance = read_i16(ValueFormat::X_ADVANCE)?;
        let y_advance = read_i16(ValueFormat::Y_ADVANCE)?;

        let mut read_u16 = |flag: ValueFormat| -> Result<Option<u16>, ParseError> {
            if value_format.contains(flag) {
                Ok(Some(ctxt.read_u16be()?))
            } else {
                Ok(None)
            }
        };
        let x_placement_device_offset = read_u16(ValueFormat::X_PLACEMENT_DEVICE)?;
        let y_placement_device_offset = read_u16(ValueFormat::Y_PLACEMENT_DEVICE)?;
        let x_advance_device_offset = read_u16(ValueFormat::X_ADVANCE_DEVICE)?;
        let y_advance_device_offset = read_u16(ValueFormat::Y_ADVANCE_DEVICE)?;
        let x_id_placement = read_u16(ValueFormat::X_ID_PLACEMENT)?;
        let y_id_placement = read_u16(ValueFormat::Y_ID_PLACEMENT)?;
        let x_id_advance = read_u16(ValueFormat::X_ID_ADVANCE)?;
        let y_id_advance = read_u16(ValueFormat::Y_ID_ADVANCE)?;

        let device = |opt_offset: Option<u16>| match opt_offset {
            Some(offset) => read_device(&scope, offset),
            None => Ok(None),
        };
        Ok(ValueRecord {
            x_placement,
            y_placement,
            x_advance,
            y_advance,
            x_placement_device: device(x_placement_device_offset)?,
            y_placement_device: device(y_placement_device_offset)?,
            x_advance_device: device(x_advance_device_offset)?,
            y_advance_device: device(y_advance_device_offset)?,
            x_id_placement,
            y_id_placement,
            x_id_advance,
            y_id_advance,
        })
    }
}

impl ReadFixedSizeDep for ValueRecord {
    fn size((value_format, _scope): Self::Args<'_>) -> usize {
        value_format.size()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Anchor {
    /// Design units
    Format1 { x: i16, y: i16 },
    /// Design units, plus a contour point used when the glyph outline is available
    Format2 { x: i16, y: i16, anchor_point: u16 },
    /// Design units, plus Device tables
    Format3 {
        x: i16,
        y: i16,
        x_device: Option<Device>,
        y_device: Option<Device>,
    },
    /// Multiple master metric ids
    Format4 { x_id: u16, y_id: u16 },
}

impl ReadBinary for Anchor {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let x = ctxt.read_i16be()?;
                let y = ctxt.read_i16be()?;
                Ok(Anchor::Format1 { x, y })
            }
            2 => {
                let x = ctxt.read_i16be()?;
                let y = ctxt.read_i16be()?;
                let anchor_point = ctxt.read_u16be()?;
                Ok(Anchor::Format2 { x, y, anchor_point })
            }
            3 => {
                let x = ctxt.read_i16be()?;
                let y = ctxt.read_i16be()?;
                let x_device = read_device(&scope, ctxt.read_u16be()?)?;
                let y_device = read_device(&scope, ctxt.read_u16be()?)?;
                Ok(Anchor::Format3 {
                    x,
                    y,
                    x_device,
                    y_device,
                })
            }
            4 => {
                let x_id = ctxt.read_u16be()?;
                let y_id = ctxt.read_u16be()?;
                Ok(Anchor::Format4 { x_id, y_id })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

fn read_anchor<'a>(scope: &ReadScope<'a>, offset: u16) -> Result<Option<Anchor>, ParseError> {
    match scope.offset_nullable(offset)? {
        Some(anchor_scope) => anchor_scope.read::<Anchor>().map(Some),
        None => Ok(None),
    }
}

pub enum SinglePos {
    Format1 {
        coverage: Rc<Coverage>,
        value_record: ValueRecord,
    },
    Format2 {
        coverage: Rc<Coverage>,
        value_records: Vec<ValueRecord>,
    },
}

impl ReadBinaryDep for SinglePos {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_record = ctxt.read_dep::<ValueRecord>((value_format, scope))?;
                Ok(SinglePos::Format1 {
                    coverage,
                    value_record,
                })
            }
            2 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let value_format = ctxt.read::<ValueFormat>()?;
                let value_count = usize::from(ctxt.read_u16be()?);
                let value_records = ctxt
                    .read_array_dep::<ValueRecord>(value_count, (value_format, scope))?
                    .read_to_vec()?;
                Ok(SinglePos::Format2 {
                    coverage,
                    value_records,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl SinglePos {
    pub fn apply(&self, glyph: u16) -> Result<Option<&ValueRecord>, ParseError> {
        match self {
            SinglePos::Format1 {
                coverage,
                value_record,
            } => Ok(coverage
                .glyph_coverage_value(glyph)
                .map(|_| value_record)),
            SinglePos::Format2 {
                coverage,
                value_records,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(coverage_index) => {
                    let coverage_index = usize::from(coverage_index);
                    value_records.check_index(coverage_index)?;
                    Ok(Some(&value_records[coverage_index]))
                }
                None => Ok(None),
            },
        }
    }
}

pub enum PairPos {
    Format1 {
        coverage: Rc<Coverage>,
        value_format2: ValueFormat,
        pairsets: Vec<PairSet>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        value_format2: ValueFormat,
        classdef1: Rc<ClassDef>,
        classdef2: Rc<ClassDef>,
        class2_count: usize,
        class1_records: Vec<Class1Record>,
    },
}

impl ReadBinaryDep for PairPos {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let pairset_count = usize::from(ctxt.read_u16be()?);
                let pairset_offsets = ctxt.read_array::<U16Be>(pairset_count)?;
                let pairsets = read_objects_dep::<PairSet>(
                    &scope,
                    pairset_offsets,
                    (value_format1, value_format2),
                )?;
                Ok(PairPos::Format1 {
                    coverage,
                    value_format2,
                    pairsets,
                })
            }
            2 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let value_format1 = ctxt.read::<ValueFormat>()?;
                let value_format2 = ctxt.read::<ValueFormat>()?;
                let classdef1 = read_classdef(&scope, cache, ctxt.read_u16be()?)?;
                let classdef2 = read_classdef(&scope, cache, ctxt.read_u16be()?)?;
                let class1_count = ctxt.read_u16be()?;
                let class2_count = ctxt.read_u16be()?;
                classdef1.check_limit(class1_count)?;
                classdef2.check_limit(class2_count)?;
                let class1_records = ctxt
                    .read_array_dep::<Class1Record>(
                        usize::from(class1_count),
                        (
                            usize::from(class2_count),
                            value_format1,
                            value_format2,
                            scope,
                        ),
                    )?
                    .read_to_vec()?;
                Ok(PairPos::Format2 {
                    coverage,
                    value_format2,
                    classdef1,
                    classdef2,
                    class2_count: usize::from(class2_count),
                    class1_records,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

pub struct PairSet {
    pair_value_records: Vec<PairValueRecord>,
}

impl ReadBinaryDep for PairSet {
    type Args<'a> = (ValueFormat, ValueFormat);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        // Device offsets in the records are relative to the PairSet
        let scope = ctxt.scope();
        let pair_value_count = usize::from(ctxt.read_u16be()?);
        let pair_value_records = ctxt
            .read_array_dep::<PairValueRecord>(
                pair_value_count,
                (value_format1, value_format2, scope),
            )?
            .read_to_vec()?;
        Ok(PairSet { pair_value_records })
    }
}

pub struct PairValueRecord {
    second_glyph: u16,
    value_record1: ValueRecord,
    value_record2: ValueRecord,
}

impl ReadBinaryDep for PairValueRecord {
    type Args<'a> = (ValueFormat, ValueFormat, ReadScope<'a>);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2, scope): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let second_glyph = ctxt.read_u16be()?;
        let value_record1 = ctxt.read_dep::<ValueRecord>((value_format1, scope))?;
        let value_record2 = ctxt.read_dep::<ValueRecord>((value_format2, scope))?;
        Ok(PairValueRecord {
            second_glyph,
            value_record1,
            value_record2,
        })
    }
}

impl ReadFixedSizeDep for PairValueRecord {
    fn size((value_format1, value_format2, _scope): Self::Args<'_>) -> usize {
        size::U16 + value_format1.size() + value_format2.size()
    }
}

pub struct Class1Record {
    class2_records: Vec<Class2Record>,
}

impl ReadBinaryDep for Class1Record {
    type Args<'a> = (usize, ValueFormat, ValueFormat, ReadScope<'a>);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (class2_count, value_format1, value_format2, scope): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let class2_records = ctxt
            .read_array_dep::<Class2Record>(class2_count, (value_format1, value_format2, scope))?
            .read_to_vec()?;
        Ok(Class1Record { class2_records })
    }
}

impl ReadFixedSizeDep for Class1Record {
    fn size((class2_count, value_format1, value_format2, scope): Self::Args<'_>) -> usize {
        class2_count * Class2Record::size((value_format1, value_format2, scope))
    }
}

pub struct Class2Record {
    value_record1: ValueRecord,
    value_record2: ValueRecord,
}

impl ReadBinaryDep for Class2Record {
    type Args<'a> = (ValueFormat, ValueFormat, ReadScope<'a>);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (value_format1, value_format2, scope): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let value_record1 = ctxt.read_dep::<ValueRecord>((value_format1, scope))?;
        let value_record2 = ctxt.read_dep::<ValueRecord>((value_format2, scope))?;
        Ok(Class2Record {
            value_record1,
            value_record2,
        })
    }
}

impl ReadFixedSizeDep for Class2Record {
    fn size((value_format1, value_format2, _scope): Self::Args<'_>) -> usize {
        value_format1.size() + value_format2.size()
    }
}

impl PairPos {
    /// Whether the first glyph of a pair is covered.
    pub fn covers(&self, glyph: u16) -> bool {
        let coverage = match self {
            PairPos::Format1 { coverage, .. } | PairPos::Format2 { coverage, .. } => coverage,
        };
        coverage.glyph_coverage_value(glyph).is_some()
    }

    /// Whether the second glyph of a pair is adjusted. If not, it may start the next pair.
    pub fn adjusts_second_glyph(&self) -> bool {
        match self {
            PairPos::Format1 { value_format2, .. } | PairPos::Format2 { value_format2, .. } => {
                !value_format2.is_empty()
            }
        }
    }

    pub fn apply(
        &self,
        glyph1: u16,
        glyph2: u16,
    ) -> Result<Option<(&ValueRecord, &ValueRecord)>, ParseError> {
        match self {
            PairPos::Format1 {
                coverage, pairsets, ..
            } => match coverage.glyph_coverage_value(glyph1) {
                Some(coverage_index) => {
                    let coverage_index = usize::from(coverage_index);
                    pairsets.check_index(coverage_index)?;
                    Ok(pairsets[coverage_index]
                        .pair_value_records
                        .iter()
                        .find(|record| record.second_glyph == glyph2)
                        .map(|record| (&record.value_record1, &record.value_record2)))
                }
                None => Ok(None),
            },
            PairPos::Format2 {
                coverage,
                classdef1,
                classdef2,
                class2_count,
                class1_records,
                ..
            } => {
                if coverage.glyph_coverage_value(glyph1).is_none() {
                    return Ok(None);
                }
                let class1_value = usize::from(classdef1.glyph_class_value(glyph1));
                let class2_value = usize::from(classdef2.glyph_class_value(glyph2));
                if class1_value < class1_records.len() && class2_value < *class2_count {
                    let class2_record = &class1_records[class1_value].class2_records[class2_value];
                    Ok(Some((
                        &class2_record.value_record1,
                        &class2_record.value_record2,
                    )))
                } else {
                    Err(ParseError::BadIndex)
                }
            }
        }
    }
}

pub struct CursivePos {
    coverage: Rc<Coverage>,
    entry_exit_records: Vec<EntryExitRecord>,
}

pub struct EntryExitRecord {
    pub entry_anchor: Option<Anchor>,
    pub exit_anchor: Option<Anchor>,
}

impl ReadBinaryDep for CursivePos {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let entry_exit_count = usize::from(ctxt.read_u16be()?);
                let entry_exit_records = ctxt
                    .read_array_dep::<EntryExitRecord>(entry_exit_count, scope)?
                    .read_to_vec()?;
                Ok(CursivePos {
                    coverage,
                    entry_exit_records,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl ReadBinaryDep for EntryExitRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let entry_anchor = read_anchor(&scope, ctxt.read_u16be()?)?;
        let exit_anchor = read_anchor(&scope, ctxt.read_u16be()?)?;
        Ok(EntryExitRecord {
            entry_anchor,
            exit_anchor,
        })
    }
}

impl ReadFixedSizeDep for EntryExitRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        2 * size::U16
    }
}

impl CursivePos {
    pub fn entry_exit(&self, glyph: u16) -> Result<Option<&EntryExitRecord>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                self.entry_exit_records.check_index(coverage_index)?;
                Ok(Some(&self.entry_exit_records[coverage_index]))
            }
            None => Ok(None),
        }
    }
}

/// Mark-to-base subtable, also used for mark-to-mark where the "base" is the previous mark.
pub struct MarkBasePos {
    mark_coverage: Rc<Coverage>,
    base_coverage: Rc<Coverage>,
    mark_class_count: usize,
    mark_array: MarkArray,
    base_array: BaseArray,
}

impl ReadBinaryDep for MarkBasePos {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let mark_coverage_offset = ctxt.read_u16be()?;
                let base_coverage_offset = ctxt.read_u16be()?;
                let mark_class_count = usize::from(ctxt.read_u16be()?);
                let mark_array_offset = usize::from(ctxt.read_u16be()?);
                let base_array_offset = usize::from(ctxt.read_u16be()?);
                let mark_coverage = read_coverage(&scope, cache, mark_coverage_offset)?;
                let base_coverage = read_coverage(&scope, cache, base_coverage_offset)?;
                let mark_array = scope.offset(mark_array_offset).read::<MarkArray>()?;
                let base_array = scope
                    .offset(base_array_offset)
                    .read_dep::<BaseArray>(mark_class_count)?;
                Ok(MarkBasePos {
                    mark_coverage,
                    base_coverage,
                    mark_class_count,
                    mark_array,
                    base_array,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

struct BaseArray {
    base_records: Vec<BaseRecord>,
}

impl ReadBinaryDep for BaseArray {
    type Args<'a> = usize;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, mark_class_count: usize) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let base_count = usize::from(ctxt.read_u16be()?);
        let base_records = ctxt
            .read_array_dep::<BaseRecord>(base_count, (scope, mark_class_count))?
            .read_to_vec()?;
        Ok(BaseArray { base_records })
    }
}

struct BaseRecord {
    base_anchors: Vec<Option<Anchor>>,
}

impl ReadBinaryDep for BaseRecord {
    type Args<'a> = (ReadScope<'a>, usize);
    type HostType<'a> = Self;

    fn read_dep<'a>(
        ctxt: &mut ReadCtxt<'a>,
        (scope, mark_class_count): Self::Args<'a>,
    ) -> Result<Self, ParseError> {
        let base_anchor_offsets = ctxt.read_array::<U16Be>(mark_class_count)?;
        let base_anchors = base_anchor_offsets
            .iter()
            .map(|offset| read_anchor(&scope, offset))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BaseRecord { base_anchors })
    }
}

impl ReadFixedSizeDep for BaseRecord {
    fn size((_scope, mark_class_count): Self::Args<'_>) -> usize {
        mark_class_count * size::U16
    }
}

struct MarkArray {
    mark_records: Vec<MarkRecord>,
}

impl ReadBinary for MarkArray {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let mark_count = usize::from(ctxt.read_u16be()?);
        let mark_records = ctxt
            .read_array_dep::<MarkRecord>(mark_count, scope)?
            .read_to_vec()?;
        Ok(MarkArray { mark_records })
    }
}

struct MarkRecord {
    mark_class: u16,
    mark_anchor: Option<Anchor>,
}

impl ReadBinaryDep for MarkRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let mark_class = ctxt.read_u16be()?;
        let mark_anchor = read_anchor(&scope, ctxt.read_u16be()?)?;
        Ok(MarkRecord {
            mark_class,
            mark_anchor,
        })
    }
}

impl ReadFixedSizeDep for MarkRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        2 * size::U16
    }
}

impl MarkArray {
    /// The class and anchor of the mark with the given coverage index.
    fn mark(
        &self,
        mark_coverage_index: u16,
        mark_class_count: usize,
    ) -> Result<(usize, Option<&Anchor>), ParseError> {
        let mark_coverage_index = usize::from(mark_coverage_index);
        self.mark_records.check_index(mark_coverage_index)?;
        let mark_record = &self.mark_records[mark_coverage_index];
        let mark_class = usize::from(mark_record.mark_class);
        if mark_class < mark_class_count {
            Ok((mark_class, mark_record.mark_anchor.as_ref()))
        } else {
            Err(ParseError::BadIndex)
        }
    }
}

impl MarkBasePos {
    pub fn covers_mark(&self, glyph: u16) -> bool {
        self.mark_coverage.glyph_coverage_value(glyph).is_some()
    }

    /// The base anchor and mark anchor for attaching `mark_glyph` to `base_glyph`.
    pub fn apply(
        &self,
        base_glyph: u16,
        mark_glyph: u16,
    ) -> Result<Option<(&Anchor, &Anchor)>, ParseError> {
        let base_coverage_value = self.base_coverage.glyph_coverage_value(base_glyph);
        let mark_coverage_value = self.mark_coverage.glyph_coverage_value(mark_glyph);
        match (base_coverage_value, mark_coverage_value) {
            (Some(base_coverage_index), Some(mark_coverage_index)) => {
                let (mark_class, opt_mark_anchor) = self
                    .mark_array
                    .mark(mark_coverage_index, self.mark_class_count)?;
                let base_coverage_index = usize::from(base_coverage_index);
                self.base_array
                    .base_records
                    .check_index(base_coverage_index)?;
                let base_record = &self.base_array.base_records[base_coverage_index];
                match (base_record.base_anchors[mark_class].as_ref(), opt_mark_anchor) {
                    (Some(base_anchor), Some(mark_anchor)) => Ok(Some((base_anchor, mark_anchor))),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

pub struct MarkLigPos {
    mark_coverage: Rc<Coverage>,
    liga_coverage: Rc<Coverage>,
    mark_class_count: usize,
    mark_array: MarkArray,
    ligature_array: LigatureArray,
}

impl ReadBinaryDep for MarkLigPos {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let mark_coverage_offset = ctxt.read_u16be()?;
                let liga_coverage_offset = ctxt.read_u16be()?;
                let mark_class_count = usize::from(ctxt.read_u16be()?);
                let mark_array_offset = usize::from(ctxt.read_u16be()?);
                let liga_array_offset = usize::from(ctxt.read_u16be()?);
                let mark_coverage = read_coverage(&scope, cache, mark_coverage_offset)?;
                let liga_coverage = read_coverage(&scope, cache, liga_coverage_offset)?;
                let mark_array = scope.offset(mark_array_offset).read::<MarkArray>()?;
                let ligature_array = scope
                    .offset(liga_array_offset)
                    .read_dep::<LigatureArray>(mark_class_count)?;
                Ok(MarkLigPos {
                    mark_coverage,
                    liga_coverage,
                    mark_class_count,
                    mark_array,
                    ligature_array,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

struct LigatureArray {
    ligature_attaches: Vec<LigatureAttach>,
}

impl ReadBinaryDep for LigatureArray {
    type Args<'a> = usize;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, mark_class_count: usize) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let ligature_count = usize::from(ctxt.read_u16be()?);
        let ligature_attach_offsets = ctxt.read_array::<U16Be>(ligature_count)?;
        let ligature_attaches =
            read_objects_dep::<LigatureAttach>(&scope, ligature_attach_offsets, mark_class_count)?;
        Ok(LigatureArray { ligature_attaches })
    }
}

struct LigatureAttach {
    component_records: Vec<BaseRecord>,
}

impl ReadBinaryDep for LigatureAttach {
    type Args<'a> = usize;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, mark_class_count: usize) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let component_count = usize::from(ctxt.read_u16be()?);
        let component_records = ctxt
            .read_array_dep::<BaseRecord>(component_count, (scope, mark_class_count))?
            .read_to_vec()?;
        Ok(LigatureAttach { component_records })
    }
}

impl MarkLigPos {
    pub fn covers_mark(&self, glyph: u16) -> bool {
        self.mark_coverage.glyph_coverage_value(glyph).is_some()
    }

    /// The ligature anchor and mark anchor for attaching `mark_glyph` to a component of
    /// `liga_glyph`. With no component given the mark goes on the last component.
    pub fn apply(
        &self,
        liga_glyph: u16,
        mark_glyph: u16,
        opt_component: Option<u16>,
    ) -> Result<Option<(&Anchor, &Anchor)>, ParseError> {
        let liga_coverage_value = self.liga_coverage.glyph_coverage_value(liga_glyph);
        let mark_coverage_value = self.mark_coverage.glyph_coverage_value(mark_glyph);
        match (liga_coverage_value, mark_coverage_value) {
            (Some(liga_coverage_index), Some(mark_coverage_index)) => {
                let (mark_class, opt_mark_anchor) = self
                    .mark_array
                    .mark(mark_coverage_index, self.mark_class_count)?;
                let liga_coverage_index = usize::from(liga_coverage_index);
                self.ligature_array
                    .ligature_attaches
                    .check_index(liga_coverage_index)?;
                let components =
                    &self.ligature_array.ligature_attaches[liga_coverage_index].component_records;
                let opt_component_record = match opt_component {
                    Some(component) => components.get(usize::from(component)),
                    None => components.last(),
                };
                let component_record = match opt_component_record {
                    Some(component_record) => component_record,
                    None => return Ok(None),
                };
                match (
                    component_record.base_anchors[mark_class].as_ref(),
                    opt_mark_anchor,
                ) {
                    (Some(liga_anchor), Some(mark_anchor)) => Ok(Some((liga_anchor, mark_anchor))),
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::tests::writer::{classdef_format2, coverage_format1, table, words, Field};

    fn read<'a, T>(data: &'a [u8], cache: &'a LayoutCache) -> Result<T, ParseError>
    where
        T: ReadBinaryDep<Args<'a> = &'a LayoutCache, HostType<'a> = T>,
    {
        ReadScope::new(data).read_dep::<T>(cache)
    }

    fn device_data(start_size: u16, deltas: &[i16]) -> Vec<u8> {
        let device = Device::from_deltas(start_size, 2, deltas).unwrap();
        let mut buffer = WriteBuffer::new();
        Device::write(&mut buffer, &device).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn value_format_size() {
        let format = ValueFormat::X_PLACEMENT | ValueFormat::Y_ADVANCE | ValueFormat::X_ID_ADVANCE;
        assert_eq!(format.size(), 6);
        assert_eq!(ValueFormat::empty().size(), 0);

        let data = words(&[0x1000]);
        assert!(matches!(
            ReadScope::new(&data).read::<ValueFormat>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn single_pos_format1_with_device() {
        let data = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[3])),
            Field::Word(0x0044),
            Field::Int(-20),
            Field::Offset(device_data(12, &[1, -1])),
        ]);
        let cache = LayoutCache::new();
        let single = read::<SinglePos>(&data, &cache).unwrap();
        let value_record = single.apply(3).unwrap().unwrap();
        assert_eq!(value_record.x_advance, Some(-20));
        assert_eq!(value_record.x_placement, None);
        let device = value_record.x_advance_device.as_ref().unwrap();
        assert_eq!(device.delta(12), 1);
        assert_eq!(device.delta(13), -1);
        assert!(single.apply(4).unwrap().is_none());
    }

    #[test]
    fn pair_pos_format1() {
        let pairset = words(&[2, 20, 5, 0, 21, 7, 3]);
        let data = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[10])),
            Field::Word(0x0004),
            Field::Word(0x0001),
            Field::Word(1),
            Field::Offset(pairset),
        ]);
        let cache = LayoutCache::new();
        let pair = read::<PairPos>(&data, &cache).unwrap();
        assert!(pair.covers(10));
        assert!(pair.adjusts_second_glyph());
        let (first, second) = pair.apply(10, 21).unwrap().unwrap();
        assert_eq!(first.x_advance, Some(7));
        assert_eq!(second.x_placement, Some(3));
        assert!(pair.apply(10, 22).unwrap().is_none());
        assert!(pair.apply(11, 20).unwrap().is_none());
    }

    #[test]
    fn pair_pos_format2() {
        let data = table(&[
            Field::Word(2),
            Field::Offset(coverage_format1(&[1, 2])),
            Field::Word(0x0004),
            Field::Word(0),
            Field::Offset(classdef_format2(&[(2, 2, 1)])),
            Field::Offset(classdef_format2(&[(5, 6, 1)])),
            Field::Word(2),
            Field::Word(2),
            // class1 = 0
            Field::Int(0),
            Field::Int(-10),
            // class1 = 1
            Field::Int(0),
            Field::Int(-30),
        ]);
        let cache = LayoutCache::new();
        let pair = read::<PairPos>(&data, &cache).unwrap();
        assert!(!pair.adjusts_second_glyph());
        let x_advance = |glyph1, glyph2| {
            pair.apply(glyph1, glyph2)
                .unwrap()
                .and_then(|(first, _)| first.x_advance)
        };
        assert_eq!(x_advance(1, 5), Some(-10));
        assert_eq!(x_advance(2, 6), Some(-30));
        assert_eq!(x_advance(2, 7), Some(0));
        assert_eq!(x_advance(3, 5), None);
    }

    #[test]
    fn pair_pos_class_beyond_count() {
        let data = table(&[
            Field::Word(2),
            Field::Offset(coverage_format1(&[1])),
            Field::Word(0x0004),
            Field::Word(0),
            Field::Offset(classdef_format2(&[(1, 1, 3)])),
            Field::Offset(classdef_format2(&[(5, 6, 1)])),
            Field::Word(1),
            Field::Word(2),
            Field::Int(0),
            Field::Int(0),
        ]);
        let cache = LayoutCache::new();
        assert!(matches!(
            read::<PairPos>(&data, &cache),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn anchor_formats() {
        let anchor = |data: Vec<u8>| ReadScope::new(&data).read::<Anchor>().unwrap();
        assert_eq!(anchor(words(&[1, 10, 20])), Anchor::Format1 { x: 10, y: 20 });
        assert_eq!(
            anchor(words(&[2, 10, 20, 4])),
            Anchor::Format2 {
                x: 10,
                y: 20,
                anchor_point: 4
            }
        );
        assert_eq!(
            anchor(words(&[3, 10, 20, 0, 0])),
            Anchor::Format3 {
                x: 10,
                y: 20,
                x_device: None,
                y_device: None
            }
        );
        assert_eq!(
            anchor(words(&[4, 7, 8])),
            Anchor::Format4 { x_id: 7, y_id: 8 }
        );
        let data = words(&[5, 0, 0]);
        assert!(matches!(
            ReadScope::new(&data).read::<Anchor>(),
            Err(ParseError::BadFormat)
        ));
    }

    #[test]
    fn cursive_missing_anchors() {
        let data = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[4, 5])),
            Field::Word(2),
            Field::Offset(words(&[1, 100, 0])),
            Field::Null,
            Field::Null,
            Field::Offset(words(&[1, 0, 50])),
        ]);
        let cache = LayoutCache::new();
        let cursive = read::<CursivePos>(&data, &cache).unwrap();
        let first = cursive.entry_exit(4).unwrap().unwrap();
        assert_eq!(first.entry_anchor, Some(Anchor::Format1 { x: 100, y: 0 }));
        assert_eq!(first.exit_anchor, None);
        let second = cursive.entry_exit(5).unwrap().unwrap();
        assert_eq!(second.entry_anchor, None);
        assert_eq!(second.exit_anchor, Some(Anchor::Format1 { x: 0, y: 50 }));
        assert!(cursive.entry_exit(6).unwrap().is_none());
    }

    fn mark_array(marks: &[(u16, (i16, i16))]) -> Vec<u8> {
        let mut fields = vec![Field::Word(marks.len() as u16)];
        for &(class, (x, y)) in marks {
            fields.push(Field::Word(class));
            fields.push(Field::Offset(table(&[
                Field::Word(1),
                Field::Int(x),
                Field::Int(y),
            ])));
        }
        table(&fields)
    }

    #[test]
    fn mark_base_anchors() {
        let base_array = table(&[
            Field::Word(1),
            Field::Offset(words(&[1, 100, 200])),
            Field::Null,
        ]);
        let data = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[20, 21])),
            Field::Offset(coverage_format1(&[10])),
            Field::Word(2),
            Field::Offset(mark_array(&[(0, (10, 20)), (1, (0, 0))])),
            Field::Offset(base_array),
        ]);
        let cache = LayoutCache::new();
        let mark_base = read::<MarkBasePos>(&data, &cache).unwrap();
        assert!(mark_base.covers_mark(20));
        assert!(!mark_base.covers_mark(10));
        assert_eq!(
            mark_base.apply(10, 20).unwrap(),
            Some((
                &Anchor::Format1 { x: 100, y: 200 },
                &Anchor::Format1 { x: 10, y: 20 }
            ))
        );
        // class 1 has no base anchor
        assert_eq!(mark_base.apply(10, 21).unwrap(), None);
        assert_eq!(mark_base.apply(11, 20).unwrap(), None);
    }

    #[test]
    fn mark_class_beyond_count() {
        let base_array = table(&[Field::Word(1), Field::Offset(words(&[1, 100, 200]))]);
        let data = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[20])),
            Field::Offset(coverage_format1(&[10])),
            Field::Word(1),
            Field::Offset(mark_array(&[(1, (10, 20))])),
            Field::Offset(base_array),
        ]);
        let cache = LayoutCache::new();
        let mark_base = read::<MarkBasePos>(&data, &cache).unwrap();
        assert_eq!(mark_base.apply(10, 20), Err(ParseError::BadIndex));
    }

    #[test]
    fn mark_lig_components() {
        let component = |x: i16| Field::Offset(table(&[Field::Word(1), Field::Int(x), Field::Int(0)]));
        let ligature_attach = table(&[Field::Word(2), component(100), component(300)]);
        let ligature_array = table(&[Field::Word(1), Field::Offset(ligature_attach)]);
        let data = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[20])),
            Field::Offset(coverage_format1(&[30])),
            Field::Word(1),
            Field::Offset(mark_array(&[(0, (5, 0))])),
            Field::Offset(ligature_array),
        ]);
        let cache = LayoutCache::new();
        let mark_lig = read::<MarkLigPos>(&data, &cache).unwrap();
        let liga_x = |opt_component| {
            mark_lig
                .apply(30, 20, opt_component)
                .unwrap()
                .map(|(liga_anchor, _)| liga_anchor.clone())
        };
        assert_eq!(liga_x(Some(0)), Some(Anchor::Format1 { x: 100, y: 0 }));
        assert_eq!(liga_x(None), Some(Anchor::Format1 { x: 300, y: 0 }));
        assert_eq!(liga_x(Some(2)), None);
    }
}
