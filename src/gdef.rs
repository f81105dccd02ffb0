//! `GDEF` font table: glyph classes, attachment points and ligature carets.
//!
//! <https://docs.microsoft.com/en-us/typography/opentype/spec/gdef>
//!
//! Lookups use the glyph class of each glyph to decide which glyphs to skip. Fonts without a
//! GlyphClassDef can have one built from explicit glyph/class pairs, and glyphs that no range
//! covers then get a class assigned the first time a substitution produces them.

use std::cell::{OnceCell, RefCell};

use bitflags::bitflags;
use itertools::Itertools;
use unicode_general_category::{get_general_category, GeneralCategory};

use crate::binary::read::{ReadBinary, ReadCtxt, ReadScope, ReadScopeOwned};
use crate::binary::U16Be;
use crate::buffer::GlyphItem;
use crate::context::LookupFlag;
use crate::error::{LayoutError, ParseError};
use crate::layout::{read_device, read_objects, ClassDef, ClassRangeRecord, Coverage, Device};
use crate::tables::FontTableProvider;
use crate::tag;

pub const GLYPH_CLASS_NONE: u16 = 0;
pub const GLYPH_CLASS_BASE: u16 = 1;
pub const GLYPH_CLASS_LIGATURE: u16 = 2;
pub const GLYPH_CLASS_MARK: u16 = 3;
pub const GLYPH_CLASS_COMPONENT: u16 = 4;

bitflags! {
    /// The class of a glyph as seen by lookups.
    ///
    /// Glyphs with a mark attachment class carry the class in the high byte instead of a basic
    /// class bit.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct GlyphProperty: u16 {
        const BASE_GLYPH = 0x0002;
        const LIGATURE = 0x0004;
        const MARK = 0x0008;
        const COMPONENT = 0x0010;
        const MARK_ATTACHMENT_CLASS = 0xFF00;
    }
}

pub struct GdefTable {
    opt_glyph_classdef: Option<ClassDef>,
    opt_attach_list: Option<AttachList>,
    opt_lig_caret_list: Option<LigCaretList>,
    mark_attach_classdef_offset: u16,
    opt_table_data: Option<ReadScopeOwned>,
    mark_attach_classdef: OnceCell<ClassDef>,
    opt_new_glyph_classes: Option<NewGlyphClasses>,
}

pub struct AttachList {
    coverage: Coverage,
    attach_points: Vec<AttachPoint>,
}

struct AttachPoint {
    point_indices: Vec<u16>,
}

pub struct LigCaretList {
    coverage: Coverage,
    lig_glyphs: Vec<LigGlyph>,
}

struct LigGlyph {
    caret_values: Vec<CaretValue>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaretValue {
    Coordinate(i16),
    ContourPoint(u16),
    CoordinateWithDevice(i16, Option<Device>),
    IdCaret(u16),
}

/// Classes assigned to glyphs outside the ranges of a built GlyphClassDef.
///
/// There is one array of packed nibbles for each gap between ranges, including the gaps before
/// the first range and after the last.
struct NewGlyphClasses {
    last_glyph: u16,
    ranges: Vec<ClassRangeRecord>,
    gaps: RefCell<Vec<Vec<u16>>>,
}

impl GlyphProperty {
    pub fn from_class(class: u16) -> GlyphProperty {
        match class {
            GLYPH_CLASS_BASE => GlyphProperty::BASE_GLYPH,
            GLYPH_CLASS_LIGATURE => GlyphProperty::LIGATURE,
            GLYPH_CLASS_MARK => GlyphProperty::MARK,
            GLYPH_CLASS_COMPONENT => GlyphProperty::COMPONENT,
            _ => GlyphProperty::empty(),
        }
    }

    /// The basic class bit, treating glyphs with a mark attachment class as marks.
    pub fn basic(self) -> GlyphProperty {
        if self.intersects(GlyphProperty::MARK_ATTACHMENT_CLASS) {
            GlyphProperty::MARK
        } else {
            self
        }
    }

    pub fn is_mark(self) -> bool {
        self.basic() == GlyphProperty::MARK
    }
}

impl ReadBinary for GdefTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version == 1)?;
        let _minor_version = ctxt.read_u16be()?;
        let glyph_classdef_offset = ctxt.read_u16be()?;
        let attach_list_offset = ctxt.read_u16be()?;
        let lig_caret_list_offset = ctxt.read_u16be()?;
        // MarkAttachClassDef was added to GDEF in OpenType 1.2 without a change of version, so
        // the field is always read. It is only decoded if a lookup asks for it.
        let mark_attach_classdef_offset = ctxt.read_u16be()?;

        let opt_glyph_classdef = match table.offset_nullable(glyph_classdef_offset)? {
            Some(scope) => {
                let glyph_classdef = scope.read::<ClassDef>()?;
                glyph_classdef.check_limit(5)?;
                Some(glyph_classdef)
            }
            None => None,
        };
        let opt_attach_list = match table.offset_nullable(attach_list_offset)? {
            Some(scope) => Some(scope.read::<AttachList>()?),
            None => None,
        };
        let opt_lig_caret_list = match table.offset_nullable(lig_caret_list_offset)? {
            Some(scope) => Some(scope.read::<LigCaretList>()?),
            None => None,
        };
        let opt_table_data = if mark_attach_classdef_offset != 0 {
            Some(ReadScopeOwned::new(table))
        } else {
            None
        };

        Ok(GdefTable {
            opt_glyph_classdef,
            opt_attach_list,
            opt_lig_caret_list,
            mark_attach_classdef_offset,
            opt_table_data,
            mark_attach_classdef: OnceCell::new(),
            opt_new_glyph_classes: None,
        })
    }
}

impl ReadBinary for AttachList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let coverage_offset = usize::from(ctxt.read_u16be()?);
        let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
        let glyph_count = usize::from(ctxt.read_u16be()?);
        let attach_point_offsets = ctxt.read_array::<U16Be>(glyph_count)?;
        let attach_points = read_objects::<AttachPoint>(&scope, attach_point_offsets)?;
        Ok(AttachList {
            coverage,
            attach_points,
        })
    }
}

impl ReadBinary for AttachPoint {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let point_count = usize::from(ctxt.read_u16be()?);
        let point_indices = ctxt.read_array::<U16Be>(point_count)?.to_vec();
        Ok(AttachPoint { point_indices })
    }
}

impl ReadBinary for LigCaretList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let coverage_offset = usize::from(ctxt.read_u16be()?);
        let coverage = scope.offset(coverage_offset).read::<Coverage>()?;
        let lig_glyph_count = usize::from(ctxt.read_u16be()?);
        let lig_glyph_offsets = ctxt.read_array::<U16Be>(lig_glyph_count)?;
        let lig_glyphs = read_objects::<LigGlyph>(&scope, lig_glyph_offsets)?;
        Ok(LigCaretList {
            coverage,
            lig_glyphs,
        })
    }
}

impl ReadBinary for LigGlyph {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let caret_count = usize::from(ctxt.read_u16be()?);
        let caret_value_offsets = ctxt.read_array::<U16Be>(caret_count)?;
        let caret_values = read_objects::<CaretValue>(&scope, caret_value_offsets)?;
        Ok(LigGlyph { caret_values })
    }
}

impl ReadBinary for CaretValue {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => Ok(CaretValue::Coordinate(ctxt.read_i16be()?)),
            2 => Ok(CaretValue::ContourPoint(ctxt.read_u16be()?)),
            3 => {
                let coordinate = ctxt.read_i16be()?;
                let device_offset = ctxt.read_u16be()?;
                let opt_device = read_device(&scope, device_offset)?;
                Ok(CaretValue::CoordinateWithDevice(coordinate, opt_device))
            }
            4 => Ok(CaretValue::IdCaret(ctxt.read_u16be()?)),
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl GdefTable {
    /// An empty GDEF table, for fonts that do not have one.
    pub fn new_synthesized() -> GdefTable {
        GdefTable {
            opt_glyph_classdef: None,
            opt_attach_list: None,
            opt_lig_caret_list: None,
            mark_attach_classdef_offset: 0,
            opt_table_data: None,
            mark_attach_classdef: OnceCell::new(),
            opt_new_glyph_classes: None,
        }
    }

    pub fn glyph_classdef(&self) -> Option<&ClassDef> {
        self.opt_glyph_classdef.as_ref()
    }

    /// The MarkAttachClassDef, if it has been loaded.
    pub fn mark_attach_classdef(&self) -> Option<&ClassDef> {
        self.mark_attach_classdef.get()
    }

    /// Decode the MarkAttachClassDef. Does nothing if the table has none, or it is already
    /// loaded.
    pub fn load_mark_attach_class_def(&self) -> Result<(), ParseError> {
        if self.mark_attach_classdef.get().is_some() {
            return Ok(());
        }
        let table_data = match self.opt_table_data {
            Some(ref table_data) => table_data,
            None => return Ok(()),
        };
        let table = table_data.scope();
        if let Some(scope) = table.offset_nullable(self.mark_attach_classdef_offset)? {
            let mark_attach_classdef = scope.read::<ClassDef>()?;
            mark_attach_classdef.check_limit(256)?;
            // The cell was checked above and nothing else can fill it in between
            let _ = self.mark_attach_classdef.set(mark_attach_classdef);
        }
        Ok(())
    }

    /// The property that lookups test glyph `glyph` with.
    pub fn glyph_property(&self, glyph: u16) -> GlyphProperty {
        let opt_attach_class = self
            .mark_attach_classdef
            .get()
            .and_then(|mark_attach_classdef| mark_attach_classdef.class_of(glyph));
        if let Some(attach_class) = opt_attach_class.filter(|&class| class != 0) {
            return GlyphProperty::from_bits_retain(attach_class << 8);
        }

        let opt_class = self
            .opt_glyph_classdef
            .as_ref()
            .and_then(|glyph_classdef| glyph_classdef.class_of(glyph));
        let class = match opt_class {
            Some(class) => class,
            None => self
                .opt_new_glyph_classes
                .as_ref()
                .map(|new_glyph_classes| new_glyph_classes.get(glyph))
                .unwrap_or(GLYPH_CLASS_NONE),
        };
        GlyphProperty::from_class(class)
    }

    /// Build a GlyphClassDef from glyph/class pairs.
    ///
    /// `glyphs` must be in strictly ascending order and less than `num_glyphs`. Consecutive
    /// glyphs of the same class are merged into ranges. Glyphs between the ranges can later be
    /// classified with [`add_glyph_property`](GdefTable::add_glyph_property).
    ///
    /// Any MarkAttachClassDef is dropped.
    pub fn build_class_definition(
        &mut self,
        num_glyphs: u16,
        glyphs: &[u16],
        classes: &[u16],
    ) -> Result<(), LayoutError> {
        if self.opt_glyph_classdef.is_some() || num_glyphs == 0 || glyphs.len() != classes.len()
        {
            return Err(LayoutError::InvalidArgument);
        }
        if classes.iter().any(|&class| class > GLYPH_CLASS_COMPONENT)
            || glyphs.iter().any(|&glyph| glyph >= num_glyphs)
            || !glyphs.windows(2).all(|pair| pair[0] < pair[1])
        {
            return Err(LayoutError::InvalidArgument);
        }

        let ranges = glyphs
            .iter()
            .zip(classes.iter())
            .map(|(&glyph, &class_value)| ClassRangeRecord {
                start_glyph: glyph,
                end_glyph: glyph,
                class_value,
            })
            .coalesce(|prev, next| {
                if prev.end_glyph + 1 == next.start_glyph && prev.class_value == next.class_value
                {
                    Ok(ClassRangeRecord {
                        end_glyph: next.end_glyph,
                        ..prev
                    })
                } else {
                    Err((prev, next))
                }
            })
            .collect::<Vec<_>>();

        let nibble_words = |gap: u16| vec![0u16; (usize::from(gap) + 3) / 4];
        let mut gaps = Vec::with_capacity(ranges.len() + 1);
        match ranges.first() {
            Some(first) => gaps.push(nibble_words(first.start_glyph)),
            None => gaps.push(nibble_words(num_glyphs)),
        }
        for pair in ranges.windows(2) {
            gaps.push(nibble_words(pair[1].start_glyph - pair[0].end_glyph - 1));
        }
        if let Some(last) = ranges.last() {
            gaps.push(nibble_words(num_glyphs - last.end_glyph - 1));
        }

        self.opt_glyph_classdef = Some(ClassDef::from_ranges(ranges.clone()));
        self.opt_new_glyph_classes = Some(NewGlyphClasses {
            last_glyph: num_glyphs - 1,
            ranges,
            gaps: RefCell::new(gaps),
        });
        self.mark_attach_classdef_offset = 0;
        self.opt_table_data = None;
        self.mark_attach_classdef = OnceCell::new();
        Ok(())
    }

    /// Record the class of a glyph produced by a substitution.
    ///
    /// Returns `Ok(true)` if the glyph lies in a gap of the built class definition, whether or
    /// not its class was written: the first class recorded for a glyph is kept. Returns
    /// `Ok(false)` if the glyph cannot take a new class because it is covered by the
    /// GlyphClassDef, lies past the last glyph, or no class definition was built.
    pub fn add_glyph_property(
        &self,
        glyph: u16,
        property: GlyphProperty,
    ) -> Result<bool, LayoutError> {
        let new_class = if property.is_empty() {
            GLYPH_CLASS_NONE
        } else if property == GlyphProperty::BASE_GLYPH {
            GLYPH_CLASS_BASE
        } else if property == GlyphProperty::LIGATURE {
            GLYPH_CLASS_LIGATURE
        } else if property == GlyphProperty::MARK {
            GLYPH_CLASS_MARK
        } else if property == GlyphProperty::COMPONENT {
            GLYPH_CLASS_COMPONENT
        } else {
            return Err(LayoutError::InvalidArgument);
        };

        let covered = self
            .opt_glyph_classdef
            .as_ref()
            .and_then(|glyph_classdef| glyph_classdef.class_of(glyph))
            .is_some();
        if covered {
            return Ok(false);
        }
        match self.opt_new_glyph_classes {
            Some(ref new_glyph_classes) => Ok(new_glyph_classes.set(glyph, new_class)),
            None => Ok(false),
        }
    }

    /// Whether a GlyphClassDef was built and new classes can be recorded.
    pub fn has_new_glyph_classes(&self) -> bool {
        self.opt_new_glyph_classes.is_some()
    }

    /// Contour point indices of the attachment points of `glyph`.
    pub fn attach_points(&self, glyph: u16) -> Option<&[u16]> {
        let attach_list = self.opt_attach_list.as_ref()?;
        let index = attach_list.coverage.glyph_coverage_value(glyph)?;
        attach_list
            .attach_points
            .get(usize::from(index))
            .map(|attach_point| attach_point.point_indices.as_slice())
    }

    /// Caret positions between the components of ligature glyph `glyph`.
    pub fn lig_caret_values(&self, glyph: u16) -> Option<&[CaretValue]> {
        let lig_caret_list = self.opt_lig_caret_list.as_ref()?;
        let index = lig_caret_list.coverage.glyph_coverage_value(glyph)?;
        lig_caret_list
            .lig_glyphs
            .get(usize::from(index))
            .map(|lig_glyph| lig_glyph.caret_values.as_slice())
    }
}

impl NewGlyphClasses {
    /// Find the gap array and the position within it of `glyph`.
    fn locate(&self, glyph: u16) -> Option<(usize, usize)> {
        if glyph > self.last_glyph {
            return None;
        }
        let array_index = self.ranges.partition_point(|range| range.end_glyph < glyph);
        if let Some(range) = self.ranges.get(array_index) {
            if range.start_glyph <= glyph {
                return None;
            }
        }
        let glyph_index = match array_index {
            0 => glyph,
            _ => glyph - self.ranges[array_index - 1].end_glyph - 1,
        };
        Some((array_index, usize::from(glyph_index)))
    }

    fn get(&self, glyph: u16) -> u16 {
        match self.locate(glyph) {
            Some((array_index, glyph_index)) => self
                .gaps
                .borrow()
                .get(array_index)
                .map(|words| nibble_get(words, glyph_index))
                .unwrap_or(GLYPH_CLASS_NONE),
            None => GLYPH_CLASS_NONE,
        }
    }

    fn set(&self, glyph: u16, class: u16) -> bool {
        match self.locate(glyph) {
            Some((array_index, glyph_index)) => {
                let mut gaps = self.gaps.borrow_mut();
                match gaps.get_mut(array_index) {
                    Some(words) => {
                        if nibble_get(words, glyph_index) == GLYPH_CLASS_NONE {
                            nibble_set(words, glyph_index, class);
                        }
                        true
                    }
                    None => false,
                }
            }
            None => false,
        }
    }
}

/// Read the `index`th 4-bit value from `words`, packed most significant nibble first.
fn nibble_get(words: &[u16], index: usize) -> u16 {
    words
        .get(index / 4)
        .map(|word| (word >> (12 - (index % 4) * 4)) & 0xF)
        .unwrap_or(0)
}

/// Store a 4-bit value at `index` in `words`, packed most significant nibble first.
fn nibble_set(words: &mut [u16], index: usize, value: u16) {
    if let Some(word) = words.get_mut(index / 4) {
        let shift = 12 - (index % 4) * 4;
        *word = (*word & !(0xF << shift)) | ((value & 0xF) << shift);
    }
}

/// Decide whether a lookup with `lookup_flag` processes `item`.
///
/// Returns the glyph's property if it is processed and `None` if the lookup skips it. Without a
/// GDEF table every glyph is processed, with an empty property. The property is cached in the
/// item.
pub fn check_property(
    opt_gdef_table: Option<&GdefTable>,
    item: &GlyphItem,
    lookup_flag: LookupFlag,
) -> Option<GlyphProperty> {
    let gdef_table = match opt_gdef_table {
        Some(gdef_table) => gdef_table,
        None => return Some(GlyphProperty::empty()),
    };
    let property = match item.gdef_property.get() {
        Some(property) => property,
        None => {
            let property = gdef_table.glyph_property(item.glyph_index);
            item.gdef_property.set(Some(property));
            property
        }
    };

    let basic = property.basic();
    if lookup_flag.ignored_classes().intersects(basic) {
        return None;
    }
    let mark_attachment_type = lookup_flag.mark_attachment_type();
    if mark_attachment_type != 0
        && basic == GlyphProperty::MARK
        && property.bits() != mark_attachment_type
    {
        return None;
    }
    Some(property)
}

/// The GDEF glyph class suited to a character, for building a GlyphClassDef from a cmap.
pub fn classify_char(ch: char) -> u16 {
    match get_general_category(ch) {
        GeneralCategory::NonspacingMark | GeneralCategory::EnclosingMark => GLYPH_CLASS_MARK,
        GeneralCategory::Unassigned => GLYPH_CLASS_NONE,
        _ => GLYPH_CLASS_BASE,
    }
}

/// Load the `GDEF` table. Returns `Ok(None)` if the font has none.
pub fn load_gdef<F: FontTableProvider>(provider: &F) -> Result<Option<GdefTable>, ParseError> {
    match provider.table_data(tag::GDEF)? {
        Some(gdef_data) => {
            let gdef_table = ReadScope::new(&gdef_data).read::<GdefTable>()?;
            Ok(Some(gdef_table))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::OffsetTableFontProvider;
    use crate::tests::writer::{
        classdef_format1, classdef_format2, coverage_format1, gdef, sfnt, table, Field,
    };

    fn item(glyph: u16) -> GlyphItem {
        GlyphItem::new(glyph, 1, 0)
    }

    #[test]
    fn glyph_property_from_glyph_classdef() {
        let glyph_classdef = classdef_format2(&[(1, 4, 1), (5, 5, 2), (6, 7, 3), (8, 8, 4)]);
        let data = gdef(Some(glyph_classdef), None);
        let gdef_table = ReadScope::new(&data).read::<GdefTable>().unwrap();
        assert_eq!(gdef_table.glyph_property(0), GlyphProperty::empty());
        assert_eq!(gdef_table.glyph_property(2), GlyphProperty::BASE_GLYPH);
        assert_eq!(gdef_table.glyph_property(5), GlyphProperty::LIGATURE);
        assert_eq!(gdef_table.glyph_property(7), GlyphProperty::MARK);
        assert_eq!(gdef_table.glyph_property(8), GlyphProperty::COMPONENT);
    }

    #[test]
    fn glyph_classdef_limited_to_four_classes() {
        let data = gdef(Some(classdef_format1(1, &[1, 5])), None);
        assert!(matches!(
            ReadScope::new(&data).read::<GdefTable>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn gdef_bad_version() {
        let data = table(&[
            Field::Word(2),
            Field::Word(0),
            Field::Null,
            Field::Null,
            Field::Null,
            Field::Null,
        ]);
        assert!(matches!(
            ReadScope::new(&data).read::<GdefTable>(),
            Err(ParseError::BadVersion)
        ));
    }

    #[test]
    fn mark_attach_classdef_loaded_lazily() {
        let data = gdef(
            Some(classdef_format2(&[(10, 10, 1), (20, 21, 3)])),
            Some(classdef_format1(20, &[1, 2])),
        );
        let gdef_table = ReadScope::new(&data).read::<GdefTable>().unwrap();
        assert_eq!(gdef_table.glyph_property(21), GlyphProperty::MARK);
        assert!(gdef_table.mark_attach_classdef().is_none());

        gdef_table.load_mark_attach_class_def().unwrap();
        gdef_table.load_mark_attach_class_def().unwrap();
        assert_eq!(gdef_table.glyph_property(20).bits(), 0x0100);
        assert_eq!(gdef_table.glyph_property(21).bits(), 0x0200);
        assert!(gdef_table.glyph_property(21).is_mark());
        assert_eq!(gdef_table.glyph_property(10), GlyphProperty::BASE_GLYPH);
    }

    #[test]
    fn check_property_filters() {
        let data = gdef(
            Some(classdef_format2(&[(10, 10, 1), (11, 11, 2), (20, 21, 3)])),
            Some(classdef_format1(20, &[1, 2])),
        );
        let gdef_table = ReadScope::new(&data).read::<GdefTable>().unwrap();
        gdef_table.load_mark_attach_class_def().unwrap();

        let ignore_marks = LookupFlag::IGNORE_MARKS;
        assert_eq!(
            check_property(Some(&gdef_table), &item(10), ignore_marks),
            Some(GlyphProperty::BASE_GLYPH)
        );
        assert_eq!(check_property(Some(&gdef_table), &item(20), ignore_marks), None);

        let ignore_ligatures = LookupFlag::IGNORE_LIGATURES;
        assert_eq!(check_property(Some(&gdef_table), &item(11), ignore_ligatures), None);

        let attach_type_2 = LookupFlag::from_bits_retain(0x0200);
        assert_eq!(check_property(Some(&gdef_table), &item(20), attach_type_2), None);
        assert!(check_property(Some(&gdef_table), &item(21), attach_type_2).is_some());
        assert!(check_property(Some(&gdef_table), &item(10), attach_type_2).is_some());

        assert_eq!(
            check_property(None, &item(20), ignore_marks),
            Some(GlyphProperty::empty())
        );
    }

    #[test]
    fn check_property_caches() {
        let mut gdef_table = GdefTable::new_synthesized();
        gdef_table.build_class_definition(10, &[], &[]).unwrap();
        let glyph = item(3);
        assert!(check_property(Some(&gdef_table), &glyph, LookupFlag::IGNORE_MARKS).is_some());
        // Classifying the glyph later does not affect an item that was already checked
        gdef_table.add_glyph_property(3, GlyphProperty::MARK).unwrap();
        assert!(check_property(Some(&gdef_table), &glyph, LookupFlag::IGNORE_MARKS).is_some());
        assert!(check_property(Some(&gdef_table), &item(3), LookupFlag::IGNORE_MARKS).is_none());
    }

    #[test]
    fn build_class_definition_merges_runs() {
        let mut gdef_table = GdefTable::new_synthesized();
        gdef_table
            .build_class_definition(100, &[5, 6, 7, 8, 30], &[1, 1, 1, 3, 2])
            .unwrap();
        let glyph_classdef = gdef_table.glyph_classdef().unwrap();
        assert_eq!(glyph_classdef.class_of(5), Some(1));
        assert_eq!(glyph_classdef.class_of(7), Some(1));
        assert_eq!(glyph_classdef.class_of(8), Some(3));
        assert_eq!(glyph_classdef.class_of(9), None);
        assert_eq!(gdef_table.glyph_property(30), GlyphProperty::LIGATURE);
        assert_eq!(gdef_table.glyph_property(31), GlyphProperty::empty());
    }

    #[test]
    fn build_class_definition_rejects_bad_input() {
        let build = |num_glyphs: u16, glyphs: &[u16], classes: &[u16]| {
            GdefTable::new_synthesized().build_class_definition(num_glyphs, glyphs, classes)
        };
        assert_eq!(build(10, &[1, 2], &[1, 5]), Err(LayoutError::InvalidArgument));
        assert_eq!(build(10, &[2, 1], &[1, 1]), Err(LayoutError::InvalidArgument));
        assert_eq!(build(10, &[2, 2], &[1, 1]), Err(LayoutError::InvalidArgument));
        assert_eq!(build(10, &[1], &[1, 1]), Err(LayoutError::InvalidArgument));
        assert_eq!(build(10, &[10], &[1]), Err(LayoutError::InvalidArgument));
        assert_eq!(build(0, &[], &[]), Err(LayoutError::InvalidArgument));
        assert_eq!(
            build(0xFFFF, &[0xFFFF], &[1]),
            Err(LayoutError::InvalidArgument)
        );

        let data = gdef(Some(classdef_format1(1, &[1])), None);
        let mut gdef_table = ReadScope::new(&data).read::<GdefTable>().unwrap();
        assert_eq!(
            gdef_table.build_class_definition(10, &[3], &[1]),
            Err(LayoutError::InvalidArgument)
        );
    }

    #[test]
    fn add_glyph_property_first_write_wins() {
        let mut gdef_table = GdefTable::new_synthesized();
        gdef_table
            .build_class_definition(40, &[5, 6, 20], &[1, 1, 3])
            .unwrap();

        // before the first range, between ranges and after the last range. The second call
        // still reports the glyph as a gap glyph but keeps its first class.
        for &glyph in &[0, 4, 7, 19, 21, 39] {
            assert_eq!(
                gdef_table.add_glyph_property(glyph, GlyphProperty::LIGATURE),
                Ok(true)
            );
            assert_eq!(
                gdef_table.add_glyph_property(glyph, GlyphProperty::MARK),
                Ok(true)
            );
            assert_eq!(gdef_table.glyph_property(glyph), GlyphProperty::LIGATURE);
        }
        // neighbours are untouched
        assert_eq!(gdef_table.glyph_property(1), GlyphProperty::empty());
        assert_eq!(gdef_table.glyph_property(8), GlyphProperty::empty());

        assert_eq!(
            gdef_table.add_glyph_property(5, GlyphProperty::MARK),
            Ok(false)
        );
        assert_eq!(gdef_table.glyph_property(5), GlyphProperty::BASE_GLYPH);
        assert_eq!(
            gdef_table.add_glyph_property(40, GlyphProperty::MARK),
            Ok(false)
        );
        assert_eq!(
            gdef_table.add_glyph_property(9, GlyphProperty::from_bits_retain(0x0300)),
            Err(LayoutError::InvalidArgument)
        );
    }

    #[test]
    fn add_glyph_property_without_built_classes() {
        let gdef_table = GdefTable::new_synthesized();
        assert_eq!(
            gdef_table.add_glyph_property(3, GlyphProperty::MARK),
            Ok(false)
        );
        assert_eq!(gdef_table.glyph_property(3), GlyphProperty::empty());
    }

    #[test]
    fn attach_points_and_carets() {
        let attach_list = table(&[
            Field::Offset(coverage_format1(&[7])),
            Field::Word(1),
            Field::Offset(table(&[Field::Word(2), Field::Word(3), Field::Word(9)])),
        ]);
        let device = table(&[Field::Word(12), Field::Word(12), Field::Word(1), Field::Word(0x4000)]);
        let lig_glyph = table(&[
            Field::Word(3),
            Field::Offset(table(&[Field::Word(1), Field::Int(-40)])),
            Field::Offset(table(&[Field::Word(2), Field::Word(5)])),
            Field::Offset(table(&[Field::Word(3), Field::Int(300), Field::Offset(device.clone())])),
        ]);
        let lig_caret_list = table(&[
            Field::Offset(coverage_format1(&[8])),
            Field::Word(1),
            Field::Offset(lig_glyph),
        ]);
        let data = table(&[
            Field::Word(1),
            Field::Word(0),
            Field::Null,
            Field::Offset(attach_list),
            Field::Offset(lig_caret_list),
            Field::Null,
        ]);
        let gdef_table = ReadScope::new(&data).read::<GdefTable>().unwrap();

        assert_eq!(gdef_table.attach_points(7), Some(&[3u16, 9][..]));
        assert_eq!(gdef_table.attach_points(8), None);

        let expected_device = ReadScope::new(&device).read::<Device>().unwrap();
        assert_eq!(expected_device.delta(12), 1);
        assert_eq!(
            gdef_table.lig_caret_values(8),
            Some(
                &[
                    CaretValue::Coordinate(-40),
                    CaretValue::ContourPoint(5),
                    CaretValue::CoordinateWithDevice(300, Some(expected_device)),
                ][..]
            )
        );
        assert_eq!(gdef_table.lig_caret_values(7), None);
    }

    #[test]
    fn classify_chars() {
        assert_eq!(classify_char('a'), GLYPH_CLASS_BASE);
        assert_eq!(classify_char('\u{0301}'), GLYPH_CLASS_MARK);
        assert_eq!(classify_char('\u{20DD}'), GLYPH_CLASS_MARK);
        assert_eq!(classify_char('\u{0378}'), GLYPH_CLASS_NONE);
    }

    #[test]
    fn load_from_font() {
        let gdef_data = gdef(Some(classdef_format1(3, &[3])), None);
        let font = sfnt(&[(tag::GDEF, &gdef_data)]);
        let provider = OffsetTableFontProvider::new(ReadScope::new(&font)).unwrap();
        let gdef_table = load_gdef(&provider).unwrap().unwrap();
        assert_eq!(gdef_table.glyph_property(3), GlyphProperty::MARK);

        let font = sfnt(&[]);
        let provider = OffsetTableFontProvider::new(ReadScope::new(&font)).unwrap();
        assert!(load_gdef(&provider).unwrap().is_none());
    }
}
