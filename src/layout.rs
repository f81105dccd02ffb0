//! Shared parts of the `GSUB` and `GPOS` tables.
//!
//! Both tables have the same top level structure: a ScriptList, a FeatureList and a
//! LookupList. The subtables hanging off each lookup differ, and are decoded by the
//! [`LayoutTableType`] implementations in the `subst` and `pos` modules. Coverage, ClassDef and
//! Device tables are shared between the two and live here.
//!
//! Everything is loaded eagerly. Extension subtables are resolved while loading so the engines
//! only ever see the real subtable types.

pub mod contextual;
pub mod pos;
pub mod subst;

use std::cell::RefCell;
use std::cmp::Ordering;
use std::convert::TryFrom;
use std::rc::Rc;

use log::{debug, warn};

use crate::binary::read::{
    CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCache, ReadCtxt, ReadFixedSizeDep,
    ReadFrom, ReadScope,
};
use crate::binary::write::{WriteBinary, WriteContext};
use crate::binary::U16Be;
use crate::context::LookupFlag;
use crate::error::{LayoutError, ParseError, WriteError};
use crate::size;
use crate::tag::DisplayTag;

pub enum GSUB {}
pub enum GPOS {}

/// Language index that selects the DefaultLangSys of a script.
pub const DEFAULT_LANGUAGE_INDEX: u16 = 0xFFFF;

/// Required feature index meaning "no required feature".
pub const NO_REQUIRED_FEATURE: u16 = 0xFFFF;

/// Decoding of lookup subtables for one of the two layout tables.
pub trait LayoutTableType: Sized {
    type LookupSubtables;

    /// Lookup type of the Extension lookup, whose subtables point at subtables of another type.
    const EXTENSION_LOOKUP_TYPE: u16;

    fn read_subtables<'a>(
        lookup_type: u16,
        subtables: &[ReadScope<'a>],
        cache: &'a LayoutCache,
    ) -> Result<Self::LookupSubtables, ParseError>;
}

/// Coverage and ClassDef tables read while loading a layout table.
///
/// Subtables frequently share these, so each distinct table is decoded once and handed out as
/// an `Rc`.
pub struct LayoutCache {
    pub(crate) coverages: RefCell<ReadCache<Coverage>>,
    pub(crate) classdefs: RefCell<ReadCache<ClassDef>>,
}

// GSUB and GPOS tables have the same top-level structure
pub struct LayoutTable<T: LayoutTableType> {
    pub script_list: ScriptList,
    pub feature_list: FeatureList,
    pub lookup_list: LookupList<T>,
}

pub struct ScriptList {
    script_records: Vec<ScriptRecord>,
}

pub struct ScriptRecord {
    pub script_tag: u32,
    script_table: ScriptTable,
}

pub struct ScriptTable {
    default_langsys: LangSys,
    langsys_records: Vec<LangSysRecord>,
}

pub struct LangSysRecord {
    pub langsys_tag: u32,
    langsys_table: LangSys,
}

pub struct LangSys {
    _lookup_order: u16, // reserved field, should be zero
    required_feature_index: u16,
    feature_indices: Vec<u16>,
}

pub struct FeatureList {
    feature_records: Vec<FeatureRecord>,
}

pub struct FeatureRecord {
    pub feature_tag: u32,
    feature_table: FeatureTable,
}

pub struct FeatureTable {
    _feature_params: u16, // reserved field, should be zero
    pub lookup_indices: Vec<u16>,
}

pub struct LookupList<T: LayoutTableType> {
    lookups: Vec<Lookup<T>>,
}

pub struct Lookup<T: LayoutTableType> {
    /// The lookup type of the subtables. Never the extension type.
    pub lookup_type: u16,
    pub lookup_flag: LookupFlag,
    pub subtables: T::LookupSubtables,
}

struct ExtensionSubtable<'a> {
    extension_lookup_type: u16,
    subtable: ReadScope<'a>,
}

impl LayoutCache {
    pub fn new() -> LayoutCache {
        LayoutCache {
            coverages: RefCell::new(ReadCache::new()),
            classdefs: RefCell::new(ReadCache::new()),
        }
    }
}

impl Default for LayoutCache {
    fn default() -> Self {
        LayoutCache::new()
    }
}

impl<T: LayoutTableType> ReadBinary for LayoutTable<T> {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        let _minor_version = ctxt.read_u16be()?;
        let script_list_offset = ctxt.read_u16be()?;
        let feature_list_offset = ctxt.read_u16be()?;
        let lookup_list_offset = ctxt.read_u16be()?;

        // We handle versions 1.x
        ctxt.check_version(major_version == 1)?;

        let script_list = match table.offset_nullable(script_list_offset)? {
            Some(scope) => scope.read::<ScriptList>()?,
            None => ScriptList::empty(),
        };
        if script_list.is_empty() {
            warn!("layout table has an empty script list");
        }

        let feature_list = match table.offset_nullable(feature_list_offset)? {
            Some(scope) => scope.read::<FeatureList>()?,
            None => FeatureList::empty(),
        };

        let cache = LayoutCache::new();
        let lookup_list = match table.offset_nullable(lookup_list_offset)? {
            Some(scope) => scope.read_dep::<LookupList<T>>(&cache)?,
            None => LookupList::empty(),
        };

        // Version 1.1 also includes an offset to a FeatureVariations table, which is not used.

        Ok(LayoutTable {
            script_list,
            feature_list,
            lookup_list,
        })
    }
}

impl ReadBinary for ScriptList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let script_count = usize::from(ctxt.read_u16be()?);
        let script_records = ctxt
            .read_array_dep::<ScriptRecord>(script_count, scope)?
            .read_to_vec()?
            .into_iter()
            .filter(|script_record| {
                if script_record.script_table.is_empty() {
                    warn!(
                        "dropping empty script '{}'",
                        DisplayTag(script_record.script_tag)
                    );
                    false
                } else {
                    true
                }
            })
            .collect();
        Ok(ScriptList { script_records })
    }
}

impl ReadBinaryDep for ScriptRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = ScriptRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let script_tag = ctxt.read_u32be()?;
        let script_offset = ctxt.read_u16be()?;
        let script_table = scope
            .offset(usize::from(script_offset))
            .read::<ScriptTable>()?;
        Ok(ScriptRecord {
            script_tag,
            script_table,
        })
    }
}

impl ReadFixedSizeDep for ScriptRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for ScriptTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let default_langsys_offset = ctxt.read_u16be()?;
        let default_langsys = match scope.offset_nullable(default_langsys_offset)? {
            Some(langsys) => langsys.read::<LangSys>()?,
            None => LangSys::empty(),
        };
        let langsys_count = usize::from(ctxt.read_u16be()?);
        let langsys_records = ctxt
            .read_array_dep::<LangSysRecord>(langsys_count, scope)?
            .read_to_vec()?;
        Ok(ScriptTable {
            default_langsys,
            langsys_records,
        })
    }
}

impl ReadBinaryDep for LangSysRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = LangSysRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let langsys_tag = ctxt.read_u32be()?;
        let langsys_offset = ctxt.read_u16be()?;
        let langsys_table = scope
            .offset(usize::from(langsys_offset))
            .read::<LangSys>()?;
        Ok(LangSysRecord {
            langsys_tag,
            langsys_table,
        })
    }
}

impl ReadFixedSizeDep for LangSysRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for LangSys {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _lookup_order = ctxt.read_u16be()?;
        let required_feature_index = ctxt.read_u16be()?;
        let feature_index_count = usize::from(ctxt.read_u16be()?);
        let feature_indices = ctxt.read_array::<U16Be>(feature_index_count)?.to_vec();
        Ok(LangSys {
            _lookup_order,
            required_feature_index,
            feature_indices,
        })
    }
}

impl ReadBinary for FeatureList {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let feature_count = usize::from(ctxt.read_u16be()?);
        let feature_records = ctxt
            .read_array_dep::<FeatureRecord>(feature_count, scope)?
            .read_to_vec()?;
        Ok(FeatureList { feature_records })
    }
}

impl ReadBinaryDep for FeatureRecord {
    type Args<'a> = ReadScope<'a>;
    type HostType<'a> = FeatureRecord;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, scope: Self::Args<'a>) -> Result<Self, ParseError> {
        let feature_tag = ctxt.read_u32be()?;
        let feature_offset = ctxt.read_u16be()?;
        let feature_table = scope
            .offset(usize::from(feature_offset))
            .read::<FeatureTable>()?;
        Ok(FeatureRecord {
            feature_tag,
            feature_table,
        })
    }
}

impl ReadFixedSizeDep for FeatureRecord {
    fn size(_scope: Self::Args<'_>) -> usize {
        size::U32 + size::U16
    }
}

impl ReadBinary for FeatureTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let _feature_params = ctxt.read_u16be()?;
        let lookup_index_count = usize::from(ctxt.read_u16be()?);
        let lookup_indices = ctxt.read_array::<U16Be>(lookup_index_count)?.to_vec();
        Ok(FeatureTable {
            _feature_params,
            lookup_indices,
        })
    }
}

impl<T: LayoutTableType> ReadBinaryDep for LookupList<T> {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let lookup_offsets = ctxt.read_array::<U16Be>(lookup_count)?;
        let lookups = read_objects_dep::<Lookup<T>>(&scope, lookup_offsets, cache)?;
        Ok(LookupList { lookups })
    }
}

impl<T: LayoutTableType> ReadBinaryDep for Lookup<T> {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let lookup_type = ctxt.read_u16be()?;
        let lookup_flag = LookupFlag::from_bits_retain(ctxt.read_u16be()?);
        let subtable_count = usize::from(ctxt.read_u16be()?);
        let subtable_offsets = ctxt.read_array::<U16Be>(subtable_count)?;
        let subtables = subtable_offsets
            .iter()
            .map(|subtable_offset| scope.offset(usize::from(subtable_offset)))
            .collect::<Vec<_>>();

        let (lookup_type, subtables) = if lookup_type == T::EXTENSION_LOOKUP_TYPE {
            resolve_extensions::<T>(&subtables)?
        } else {
            (lookup_type, subtables)
        };
        let subtables = T::read_subtables(lookup_type, &subtables, cache)?;

        Ok(Lookup {
            lookup_type,
            lookup_flag,
            subtables,
        })
    }
}

impl<'b> ReadBinary for ExtensionSubtable<'b> {
    type HostType<'a> = ExtensionSubtable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let extension_lookup_type = ctxt.read_u16be()?;
                let extension_offset = usize::try_from(ctxt.read_u32be()?)?;
                if extension_offset >= scope.data().len() {
                    return Err(ParseError::BadOffset);
                }
                Ok(ExtensionSubtable {
                    extension_lookup_type,
                    subtable: scope.offset(extension_offset),
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

/// Follow the extension subtables of a lookup to the subtables they wrap.
///
/// All of them must wrap the same lookup type, and none may wrap another extension.
fn resolve_extensions<'a, T: LayoutTableType>(
    subtables: &[ReadScope<'a>],
) -> Result<(u16, Vec<ReadScope<'a>>), ParseError> {
    let mut opt_lookup_type = None;
    let mut resolved = Vec::with_capacity(subtables.len());
    for subtable in subtables {
        let extension = subtable.read::<ExtensionSubtable<'_>>()?;
        if extension.extension_lookup_type == T::EXTENSION_LOOKUP_TYPE {
            return Err(ParseError::BadValue);
        }
        match opt_lookup_type {
            None => opt_lookup_type = Some(extension.extension_lookup_type),
            Some(lookup_type) if lookup_type != extension.extension_lookup_type => {
                return Err(ParseError::BadValue)
            }
            Some(_) => {}
        }
        resolved.push(extension.subtable);
    }
    // An extension lookup with no subtables has no type to resolve to
    let lookup_type = opt_lookup_type.ok_or(ParseError::BadValue)?;
    Ok((lookup_type, resolved))
}

/// Decode each subtable of a lookup.
pub(crate) fn read_subtables<'a, S>(
    subtables: &[ReadScope<'a>],
    cache: &'a LayoutCache,
) -> Result<Vec<S>, ParseError>
where
    S: ReadBinaryDep<Args<'a> = &'a LayoutCache, HostType<'a> = S>,
{
    subtables
        .iter()
        .map(|subtable| subtable.read_dep::<S>(cache))
        .collect()
}

impl<T: LayoutTableType> LayoutTable<T> {
    /// Find the index of the script with the given tag.
    pub fn select_script(&self, script_tag: u32) -> Option<u16> {
        self.script_list
            .script_records
            .iter()
            .position(|script_record| script_record.script_tag == script_tag)
            .and_then(|index| u16::try_from(index).ok())
    }

    /// Find the language system with the given tag within a script.
    ///
    /// Returns the language index together with its required feature index, which is
    /// [`NO_REQUIRED_FEATURE`] when the language system has none.
    pub fn select_language(
        &self,
        language_tag: u32,
        script_index: u16,
    ) -> Result<Option<(u16, u16)>, LayoutError> {
        let script_table = self.script_table(script_index)?;
        let opt_language = script_table
            .langsys_records
            .iter()
            .position(|langsys_record| langsys_record.langsys_tag == language_tag)
            .map(|index| {
                let langsys = &script_table.langsys_records[index].langsys_table;
                (index as u16, langsys.required_feature_index)
            });
        Ok(opt_language)
    }

    /// The required feature of a language system, if it has one.
    pub fn required_feature(
        &self,
        script_index: u16,
        language_index: u16,
    ) -> Result<Option<u16>, LayoutError> {
        let langsys = self.langsys(script_index, language_index)?;
        match langsys.required_feature_index {
            NO_REQUIRED_FEATURE => Ok(None),
            feature_index => Ok(Some(feature_index)),
        }
    }

    /// Find the feature with the given tag in a language system.
    ///
    /// `language_index` may be [`DEFAULT_LANGUAGE_INDEX`] to use the script's DefaultLangSys.
    pub fn select_feature(
        &self,
        feature_tag: u32,
        script_index: u16,
        language_index: u16,
    ) -> Result<Option<u16>, LayoutError> {
        let langsys = self.langsys(script_index, language_index)?;
        for &feature_index in &langsys.feature_indices {
            let feature_record = self
                .feature_list
                .nth_feature_record(usize::from(feature_index))?;
            if feature_record.feature_tag == feature_tag {
                return Ok(Some(feature_index));
            }
        }
        Ok(None)
    }

    pub fn query_scripts(&self) -> Vec<u32> {
        self.script_list
            .script_records
            .iter()
            .map(|script_record| script_record.script_tag)
            .collect()
    }

    pub fn query_languages(&self, script_index: u16) -> Result<Vec<u32>, LayoutError> {
        let script_table = self.script_table(script_index)?;
        Ok(script_table
            .langsys_records
            .iter()
            .map(|langsys_record| langsys_record.langsys_tag)
            .collect())
    }

    pub fn query_features(
        &self,
        script_index: u16,
        language_index: u16,
    ) -> Result<Vec<u32>, LayoutError> {
        let langsys = self.langsys(script_index, language_index)?;
        let mut feature_tags = Vec::with_capacity(langsys.feature_indices.len());
        for &feature_index in &langsys.feature_indices {
            let feature_record = self
                .feature_list
                .nth_feature_record(usize::from(feature_index))?;
            feature_tags.push(feature_record.feature_tag);
        }
        Ok(feature_tags)
    }

    /// The lookup indices of a feature, as used to activate its lookups.
    pub fn feature_lookup_indices(&self, feature_index: u16) -> Result<&[u16], LayoutError> {
        self.feature_list
            .feature_records
            .get(usize::from(feature_index))
            .map(|feature_record| feature_record.feature_table.lookup_indices.as_slice())
            .ok_or(LayoutError::InvalidArgument)
    }

    fn script_table(&self, script_index: u16) -> Result<&ScriptTable, LayoutError> {
        self.script_list
            .script_records
            .get(usize::from(script_index))
            .map(|script_record| &script_record.script_table)
            .ok_or(LayoutError::InvalidArgument)
    }

    fn langsys(&self, script_index: u16, language_index: u16) -> Result<&LangSys, LayoutError> {
        let script_table = self.script_table(script_index)?;
        if language_index == DEFAULT_LANGUAGE_INDEX {
            Ok(&script_table.default_langsys)
        } else {
            script_table
                .langsys_records
                .get(usize::from(language_index))
                .map(|langsys_record| &langsys_record.langsys_table)
                .ok_or(LayoutError::InvalidArgument)
        }
    }
}

impl ScriptList {
    fn empty() -> Self {
        ScriptList {
            script_records: Vec::new(),
        }
    }

    pub fn script_records(&self) -> &[ScriptRecord] {
        &self.script_records
    }

    pub fn is_empty(&self) -> bool {
        self.script_records.is_empty()
    }
}

impl ScriptRecord {
    pub fn script_table(&self) -> &ScriptTable {
        &self.script_table
    }
}

impl ScriptTable {
    pub fn default_langsys(&self) -> &LangSys {
        &self.default_langsys
    }

    pub fn langsys_records(&self) -> &[LangSysRecord] {
        &self.langsys_records
    }

    fn is_empty(&self) -> bool {
        self.langsys_records.is_empty() && self.default_langsys.is_empty()
    }
}

impl LangSysRecord {
    pub fn langsys_table(&self) -> &LangSys {
        &self.langsys_table
    }
}

impl LangSys {
    fn empty() -> Self {
        LangSys {
            _lookup_order: 0,
            required_feature_index: NO_REQUIRED_FEATURE,
            feature_indices: Vec::new(),
        }
    }

    pub fn required_feature_index(&self) -> u16 {
        self.required_feature_index
    }

    pub fn feature_indices_iter(&self) -> impl Iterator<Item = &u16> {
        self.feature_indices.iter()
    }

    fn is_empty(&self) -> bool {
        self.required_feature_index == NO_REQUIRED_FEATURE && self.feature_indices.is_empty()
    }
}

impl FeatureList {
    fn empty() -> Self {
        FeatureList {
            feature_records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.feature_records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feature_records.is_empty()
    }

    pub fn nth_feature_record(&self, index: usize) -> Result<&FeatureRecord, ParseError> {
        self.feature_records.check_index(index)?;
        Ok(&self.feature_records[index])
    }
}

impl FeatureRecord {
    pub fn feature_table(&self) -> &FeatureTable {
        &self.feature_table
    }
}

impl<T: LayoutTableType> LookupList<T> {
    fn empty() -> Self {
        LookupList {
            lookups: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    pub fn lookup(&self, lookup_index: usize) -> Result<&Lookup<T>, ParseError> {
        self.lookups.check_index(lookup_index)?;
        Ok(&self.lookups[lookup_index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lookup<T>> {
        self.lookups.iter()
    }

    /// Whether any lookup filters marks by their GDEF mark attachment class.
    pub fn uses_mark_attachment_type(&self) -> bool {
        self.lookups
            .iter()
            .any(|lookup| lookup.lookup_flag.mark_attachment_type() != 0)
    }
}

pub enum Coverage {
    Format1 {
        glyph_array: Vec<u16>,
    },
    Format2 {
        coverage_range_array: Vec<CoverageRangeRecord>,
    },
}

pub struct CoverageRangeRecord {
    start_glyph: u16,
    end_glyph: u16,
    start_coverage_index: u16,
}

impl ReadFrom for CoverageRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, start_coverage_index): (u16, u16, u16)) -> Self {
        CoverageRangeRecord {
            start_glyph,
            end_glyph,
            start_coverage_index,
        }
    }
}

impl ReadBinary for Coverage {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let glyph_count = ctxt.read_u16be()?;
                let glyph_array = ctxt.read_array::<U16Be>(usize::from(glyph_count))?;
                let glyph_vec = glyph_array.to_vec();
                // The glyph indices must be in numerical order for binary searching of the list.
                ctxt.check(glyph_vec.windows(2).all(|pair| pair[0] <= pair[1]))?;
                Ok(Coverage::Format1 {
                    glyph_array: glyph_vec,
                })
            }
            2 => {
                let coverage_range_count = ctxt.read_u16be()?;
                let coverage_range_array =
                    ctxt.read_array::<CoverageRangeRecord>(usize::from(coverage_range_count))?;
                let coverage_range_vec = coverage_range_array.to_vec();
                for coverage_range_record in &coverage_range_vec {
                    ctxt.check(
                        coverage_range_record.start_glyph <= coverage_range_record.end_glyph,
                    )?;
                    let last_coverage_index = u32::from(coverage_range_record.start_coverage_index)
                        + u32::from(coverage_range_record.end_glyph)
                        - u32::from(coverage_range_record.start_glyph);
                    ctxt.check(last_coverage_index <= 0xFFFF)?;
                }
                ctxt.check(
                    coverage_range_vec
                        .windows(2)
                        .all(|pair| pair[0].end_glyph < pair[1].start_glyph),
                )?;
                Ok(Coverage::Format2 {
                    coverage_range_array: coverage_range_vec,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl Coverage {
    /// The coverage index of `glyph`, or `None` if the glyph is not covered.
    pub fn glyph_coverage_value(&self, glyph: u16) -> Option<u16> {
        match *self {
            Coverage::Format1 { ref glyph_array } => glyph_array
                .binary_search(&glyph)
                .ok()
                .map(|index| index as u16),
            Coverage::Format2 {
                ref coverage_range_array,
            } => {
                let index = coverage_range_array
                    .binary_search_by(|coverage_range| {
                        if coverage_range.end_glyph < glyph {
                            Ordering::Less
                        } else if coverage_range.start_glyph > glyph {
                            Ordering::Greater
                        } else {
                            Ordering::Equal
                        }
                    })
                    .ok()?;
                let coverage_range = &coverage_range_array[index];
                Some(coverage_range.start_coverage_index + (glyph - coverage_range.start_glyph))
            }
        }
    }

    /// Convenience method to count the total number of glyphs covered
    pub fn glyph_count(&self) -> usize {
        match self {
            Coverage::Format1 { glyph_array } => glyph_array.len(),
            Coverage::Format2 {
                coverage_range_array,
            } => coverage_range_array
                .iter()
                .fold(0, |acc, coverage_range_record| {
                    acc + (usize::from(coverage_range_record.end_glyph))
                        - (usize::from(coverage_range_record.start_glyph))
                        + 1
                }),
        }
    }
}

/// A Class Definition table.
///
/// Besides the glyph to class mapping this records which classes have at least one glyph, as
/// class based rules treat a class that names no glyph as class 0.
pub struct ClassDef {
    format: ClassDefFormat,
    defined: Vec<bool>,
}

enum ClassDefFormat {
    Format1 {
        start_glyph: u16,
        class_value_array: Vec<u16>,
    },
    Format2 {
        class_range_array: Vec<ClassRangeRecord>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClassRangeRecord {
    pub start_glyph: u16,
    pub end_glyph: u16,
    pub class_value: u16,
}

impl ReadFrom for ClassRangeRecord {
    type ReadType = (U16Be, U16Be, U16Be);
    fn read_from((start_glyph, end_glyph, class_value): (u16, u16, u16)) -> Self {
        ClassRangeRecord {
            start_glyph,
            end_glyph,
            class_value,
        }
    }
}

impl ReadBinary for ClassDef {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        match ctxt.read_u16be()? {
            1 => {
                let start_glyph = ctxt.read_u16be()?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                // Glyph ids are limited to 16 bits
                ctxt.check(usize::from(start_glyph) + glyph_count <= 0x10000)?;
                let class_value_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                let defined = defined_classes(class_value_array.iter().copied());
                Ok(ClassDef {
                    format: ClassDefFormat::Format1 {
                        start_glyph,
                        class_value_array,
                    },
                    defined,
                })
            }
            2 => {
                let class_range_count = usize::from(ctxt.read_u16be()?);
                let class_range_array = ctxt
                    .read_array::<ClassRangeRecord>(class_range_count)?
                    .to_vec();
                for class_range in &class_range_array {
                    ctxt.check(class_range.start_glyph <= class_range.end_glyph)?;
                }
                ctxt.check(
                    class_range_array
                        .windows(2)
                        .all(|pair| pair[0].end_glyph < pair[1].start_glyph),
                )?;
                Ok(ClassDef::from_ranges(class_range_array))
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

fn defined_classes(classes: impl Iterator<Item = u16>) -> Vec<bool> {
    let mut defined = Vec::new();
    for class_value in classes {
        let class_value = usize::from(class_value);
        if class_value >= defined.len() {
            defined.resize(class_value + 1, false);
        }
        defined[class_value] = true;
    }
    defined
}

impl ClassDef {
    /// A class definition that assigns no glyph to any class.
    pub fn empty() -> ClassDef {
        ClassDef::from_ranges(Vec::new())
    }

    pub fn from_ranges(class_range_array: Vec<ClassRangeRecord>) -> ClassDef {
        let defined = defined_classes(
            class_range_array
                .iter()
                .map(|class_range| class_range.class_value),
        );
        ClassDef {
            format: ClassDefFormat::Format2 { class_range_array },
            defined,
        }
    }

    /// The class of `glyph`, or `None` if the table does not mention the glyph at all.
    pub fn class_of(&self, glyph: u16) -> Option<u16> {
        match self.format {
            ClassDefFormat::Format1 {
                start_glyph,
                ref class_value_array,
            } => {
                if glyph >= start_glyph {
                    class_value_array
                        .get(usize::from(glyph - start_glyph))
                        .copied()
                } else {
                    None
                }
            }
            ClassDefFormat::Format2 {
                ref class_range_array,
            } => class_range_array
                .binary_search_by(|class_range| {
                    if class_range.end_glyph < glyph {
                        Ordering::Less
                    } else if class_range.start_glyph > glyph {
                        Ordering::Greater
                    } else {
                        Ordering::Equal
                    }
                })
                .ok()
                .map(|index| class_range_array[index].class_value),
        }
    }

    /// The class of `glyph`, with glyphs that are not mentioned in class 0.
    pub fn glyph_class_value(&self, glyph: u16) -> u16 {
        self.class_of(glyph).unwrap_or(0)
    }

    /// Whether at least one glyph is assigned to `class_value`.
    pub fn is_defined(&self, class_value: u16) -> bool {
        self.defined
            .get(usize::from(class_value))
            .copied()
            .unwrap_or(false)
    }

    /// Check that every class used is less than `limit`.
    pub fn check_limit(&self, limit: u16) -> Result<(), ParseError> {
        if self.defined.len() <= usize::from(limit) {
            Ok(())
        } else {
            Err(ParseError::BadValue)
        }
    }
}

/// Device table: per-PPEM pixel adjustments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Device {
    start_size: u16,
    end_size: u16,
    delta_format: u16,
    delta_values: Vec<u16>,
}

/// `DeltaFormat` value marking a VariationIndex table in place of a Device table.
pub const VARIATION_INDEX_FORMAT: u16 = 0x8000;

impl ReadBinary for Device {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let start_size = ctxt.read_u16be()?;
        let end_size = ctxt.read_u16be()?;
        let delta_format = ctxt.read_u16be()?;
        ctxt.check_format((1..=3).contains(&delta_format))?;
        ctxt.check(start_size <= end_size)?;
        let count = delta_word_count(start_size, end_size, delta_format);
        let delta_values = ctxt.read_array::<U16Be>(count)?.to_vec();
        Ok(Device {
            start_size,
            end_size,
            delta_format,
            delta_values,
        })
    }
}

impl WriteBinary<&Self> for Device {
    type Output = ();

    fn write<C: WriteContext>(ctxt: &mut C, device: &Device) -> Result<(), WriteError> {
        U16Be::write(ctxt, device.start_size)?;
        U16Be::write(ctxt, device.end_size)?;
        U16Be::write(ctxt, device.delta_format)?;
        ctxt.write_vec::<U16Be, _>(device.delta_values.clone())
    }
}

fn delta_word_count(start_size: u16, end_size: u16, delta_format: u16) -> usize {
    let sizes = usize::from(end_size - start_size) + 1;
    let per_word = 1 << (4 - delta_format);
    (sizes + per_word - 1) / per_word
}

impl Device {
    /// Pack `deltas`, one per PPEM size starting at `start_size`, into a Device table.
    ///
    /// Each delta must fit the bit width of `delta_format`: 2, 4 or 8 bits for formats 1 to 3.
    pub fn from_deltas(
        start_size: u16,
        delta_format: u16,
        deltas: &[i16],
    ) -> Result<Device, WriteError> {
        if !(1..=3).contains(&delta_format) || deltas.is_empty() {
            return Err(WriteError::BadValue);
        }
        let bits = 1u16 << delta_format;
        let limit = 1i16 << (bits - 1);
        let mask = 0xFFFF >> (16 - bits);
        let per_word = 1usize << (4 - delta_format);

        let last = u16::try_from(deltas.len() - 1)?;
        let end_size = start_size.checked_add(last).ok_or(WriteError::BadValue)?;
        let mut delta_values = vec![0u16; delta_word_count(start_size, end_size, delta_format)];
        for (i, &delta) in deltas.iter().enumerate() {
            if delta < -limit || delta >= limit {
                return Err(WriteError::BadValue);
            }
            let shift = 16 - ((i % per_word) as u16 + 1) * bits;
            delta_values[i / per_word] |= ((delta as u16) & mask) << shift;
        }
        Ok(Device {
            start_size,
            end_size,
            delta_format,
            delta_values,
        })
    }

    pub fn start_size(&self) -> u16 {
        self.start_size
    }

    pub fn end_size(&self) -> u16 {
        self.end_size
    }

    /// The pixel adjustment at `ppem`, zero outside the table's size range.
    pub fn delta(&self, ppem: u16) -> i16 {
        if ppem < self.start_size || ppem > self.end_size {
            return 0;
        }
        let f = self.delta_format;
        let s = ppem - self.start_size;
        let word = match self.delta_values.get(usize::from(s >> (4 - f))) {
            Some(&word) => word,
            None => return 0,
        };
        let bits = word >> (16 - ((s % (1 << (4 - f)) + 1) << f));
        let mask = 0xFFFF >> (16 - (1 << f));
        let value = (bits & mask) as i16;
        // sign extend
        if value >= ((mask as i16) + 1) >> 1 {
            value - (mask as i16 + 1)
        } else {
            value
        }
    }
}

/// Read an optional Device table. A VariationIndex table in its place is treated as absent.
pub(crate) fn read_device<'a>(
    scope: &ReadScope<'a>,
    offset: u16,
) -> Result<Option<Device>, ParseError> {
    match scope.offset_nullable(offset)? {
        Some(device_scope) => {
            let delta_format = device_scope.offset(2 * size::U16).ctxt().read_u16be()?;
            if delta_format == VARIATION_INDEX_FORMAT {
                debug!("ignoring VariationIndex table in place of Device table");
                Ok(None)
            } else {
                device_scope.read::<Device>().map(Some)
            }
        }
        None => Ok(None),
    }
}

pub(crate) fn read_objects<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<T::HostType<'a>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        let object = scope.offset(usize::from(offset)).read::<T>()?;
        objects.push(object);
    }
    Ok(objects)
}

pub(crate) fn read_objects_dep<'a, T: ReadBinaryDep<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
    args: T::Args<'a>,
) -> Result<Vec<T::HostType<'a>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        let object = scope.offset(usize::from(offset)).read_dep::<T>(args)?;
        objects.push(object);
    }
    Ok(objects)
}

pub(crate) fn read_objects_nullable<'a, T: ReadBinary<HostType<'a> = T>>(
    scope: &ReadScope<'a>,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Option<T::HostType<'a>>>, ParseError> {
    let mut objects = Vec::with_capacity(offsets.len());
    for offset in &offsets {
        if offset != 0 {
            let object = scope.offset(usize::from(offset)).read::<T>()?;
            objects.push(Some(object));
        } else {
            objects.push(None);
        }
    }
    Ok(objects)
}

pub(crate) fn read_coverage<'a>(
    scope: &ReadScope<'a>,
    cache: &LayoutCache,
    offset: u16,
) -> Result<Rc<Coverage>, ParseError> {
    scope
        .offset(usize::from(offset))
        .read_cache::<Coverage>(&mut cache.coverages.borrow_mut())
}

pub(crate) fn read_coverages<'a>(
    scope: &ReadScope<'a>,
    cache: &LayoutCache,
    offsets: ReadArray<'a, U16Be>,
) -> Result<Vec<Rc<Coverage>>, ParseError> {
    let mut coverages = Vec::with_capacity(offsets.len());
    for coverage_offset in &offsets {
        coverages.push(read_coverage(scope, cache, coverage_offset)?);
    }
    Ok(coverages)
}

pub(crate) fn read_classdef<'a>(
    scope: &ReadScope<'a>,
    cache: &LayoutCache,
    offset: u16,
) -> Result<Rc<ClassDef>, ParseError> {
    scope
        .offset(usize::from(offset))
        .read_cache::<ClassDef>(&mut cache.classdefs.borrow_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::tag;
    use crate::tests::writer::{
        classdef_format1, classdef_format2, coverage_format1, coverage_format2, layout_table,
        lookup, words,
    };

    fn single_subst_format1(coverage: &[u16], delta: i16) -> Vec<u8> {
        let mut data = words(&[1, 6, delta as u16]);
        data.extend(coverage_format1(coverage));
        data
    }

    #[test]
    fn coverage_format1_lookup() {
        let data = coverage_format1(&[3, 7, 9]);
        let coverage = ReadScope::new(&data).read::<Coverage>().unwrap();
        assert_eq!(coverage.glyph_coverage_value(3), Some(0));
        assert_eq!(coverage.glyph_coverage_value(9), Some(2));
        assert_eq!(coverage.glyph_coverage_value(8), None);
        assert_eq!(coverage.glyph_coverage_value(0xFFFF), None);
        assert_eq!(coverage.glyph_count(), 3);
    }

    #[test]
    fn coverage_format1_unsorted() {
        let data = coverage_format1(&[7, 3]);
        assert!(matches!(
            ReadScope::new(&data).read::<Coverage>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn coverage_empty() {
        let data = coverage_format1(&[]);
        let coverage = ReadScope::new(&data).read::<Coverage>().unwrap();
        assert_eq!(coverage.glyph_coverage_value(0), None);
        assert_eq!(coverage.glyph_count(), 0);
    }

    #[test]
    fn coverage_format2_lookup() {
        let data = coverage_format2(&[(10, 12, 0), (20, 20, 3)]);
        let coverage = ReadScope::new(&data).read::<Coverage>().unwrap();
        assert_eq!(coverage.glyph_coverage_value(9), None);
        assert_eq!(coverage.glyph_coverage_value(10), Some(0));
        assert_eq!(coverage.glyph_coverage_value(12), Some(2));
        assert_eq!(coverage.glyph_coverage_value(13), None);
        assert_eq!(coverage.glyph_coverage_value(20), Some(3));
        assert_eq!(coverage.glyph_count(), 4);
    }

    #[test]
    fn coverage_format2_invalid_ranges() {
        let reversed = coverage_format2(&[(12, 10, 0)]);
        assert!(matches!(
            ReadScope::new(&reversed).read::<Coverage>(),
            Err(ParseError::BadValue)
        ));

        let overflow = coverage_format2(&[(0, 10, 0xFFF8)]);
        assert!(matches!(
            ReadScope::new(&overflow).read::<Coverage>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn coverage_unknown_format() {
        let data = words(&[3, 0]);
        assert!(matches!(
            ReadScope::new(&data).read::<Coverage>(),
            Err(ParseError::BadFormat)
        ));
    }

    #[test]
    fn classdef_format1_bounds() {
        let data = classdef_format1(5, &[1, 0, 2]);
        let classdef = ReadScope::new(&data).read::<ClassDef>().unwrap();
        assert_eq!(classdef.class_of(4), None);
        assert_eq!(classdef.class_of(5), Some(1));
        assert_eq!(classdef.class_of(6), Some(0));
        assert_eq!(classdef.class_of(7), Some(2));
        assert_eq!(classdef.class_of(8), None);
        assert_eq!(classdef.glyph_class_value(8), 0);
        assert!(classdef.is_defined(2));
        assert!(!classdef.is_defined(3));
    }

    #[test]
    fn classdef_format1_overflow() {
        let data = classdef_format1(0xFFFE, &[1, 1, 1]);
        assert!(matches!(
            ReadScope::new(&data).read::<ClassDef>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn classdef_format2_lookup() {
        let data = classdef_format2(&[(10, 19, 1), (30, 30, 3)]);
        let classdef = ReadScope::new(&data).read::<ClassDef>().unwrap();
        assert_eq!(classdef.class_of(10), Some(1));
        assert_eq!(classdef.class_of(19), Some(1));
        assert_eq!(classdef.class_of(20), None);
        assert_eq!(classdef.class_of(30), Some(3));
        assert!(classdef.is_defined(1));
        assert!(!classdef.is_defined(2));
        assert!(classdef.check_limit(4).is_ok());
        assert_eq!(classdef.check_limit(3), Err(ParseError::BadValue));
    }

    #[test]
    fn classdef_format2_overlapping_ranges() {
        let overlapping = classdef_format2(&[(5, 10, 1), (8, 12, 2)]);
        assert!(matches!(
            ReadScope::new(&overlapping).read::<ClassDef>(),
            Err(ParseError::BadValue)
        ));

        let unsorted = classdef_format2(&[(20, 25, 1), (5, 10, 2)]);
        assert!(matches!(
            ReadScope::new(&unsorted).read::<ClassDef>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn classdef_empty() {
        let classdef = ClassDef::empty();
        assert_eq!(classdef.class_of(0), None);
        assert!(!classdef.is_defined(0));
        assert!(classdef.check_limit(0).is_ok());
    }

    #[test]
    fn device_round_trip() {
        let cases: [(u16, &[i16]); 3] = [
            (1, &[-2, -1, 0, 1, 1, 0, -1, -2, 1]),
            (2, &[-8, 7, 0, -1, 3]),
            (3, &[-128, 127, 5, -5]),
        ];
        for (delta_format, deltas) in cases.iter() {
            let device = Device::from_deltas(9, *delta_format, deltas).unwrap();
            let mut buffer = WriteBuffer::new();
            Device::write(&mut buffer, &device).unwrap();
            let read = ReadScope::new(buffer.bytes()).read::<Device>().unwrap();
            assert_eq!(read, device);
            for (i, &delta) in deltas.iter().enumerate() {
                assert_eq!(read.delta(9 + i as u16), delta);
            }
            assert_eq!(read.delta(8), 0);
            assert_eq!(read.delta(9 + deltas.len() as u16), 0);
        }
    }

    #[test]
    fn device_delta_out_of_range() {
        assert_eq!(Device::from_deltas(9, 1, &[2]), Err(WriteError::BadValue));
        assert_eq!(Device::from_deltas(9, 2, &[-9]), Err(WriteError::BadValue));
        assert_eq!(Device::from_deltas(9, 4, &[0]), Err(WriteError::BadValue));
    }

    #[test]
    fn device_invalid() {
        let reversed = words(&[12, 10, 1, 0]);
        assert!(matches!(
            ReadScope::new(&reversed).read::<Device>(),
            Err(ParseError::BadValue)
        ));
        let variation_index = words(&[0, 0, VARIATION_INDEX_FORMAT]);
        assert!(matches!(
            ReadScope::new(&variation_index).read::<Device>(),
            Err(ParseError::BadFormat)
        ));
    }

    #[test]
    fn read_gpos_v1_x() {
        let mut w = WriteBuffer::new();
        U16Be::write(&mut w, 1u16).unwrap(); // major version
        U16Be::write(&mut w, 2u16).unwrap(); // minor version
        U16Be::write(&mut w, 0u16).unwrap(); // script_list_offset
        U16Be::write(&mut w, 0u16).unwrap(); // feature_list_offset
        U16Be::write(&mut w, 0u16).unwrap(); // lookup_list_offset
        let data = w.into_inner();
        let table = ReadScope::new(&data).read::<LayoutTable<GPOS>>().unwrap();
        assert!(table.script_list.is_empty());
        assert!(table.feature_list.is_empty());
        assert!(table.lookup_list.is_empty());
    }

    #[test]
    fn read_layout_bad_version() {
        let data = words(&[2, 0, 0, 0, 0]);
        assert!(matches!(
            ReadScope::new(&data).read::<LayoutTable<GSUB>>(),
            Err(ParseError::BadVersion)
        ));
    }

    #[test]
    fn read_layout_offset_past_end() {
        let data = words(&[1, 0, 0, 0, 100]);
        assert!(matches!(
            ReadScope::new(&data).read::<LayoutTable<GSUB>>(),
            Err(ParseError::BadOffset)
        ));
    }

    #[test]
    fn select_and_query() {
        let lookups = vec![lookup(1, 0, &[single_subst_format1(&[5], 1)])];
        let data = layout_table(
            &[(tag::LATN, &[tag::TRK])],
            &[(tag::LIGA, &[0]), (tag::SMCP, &[0])],
            &lookups,
        );
        let table = ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap();

        assert_eq!(table.query_scripts(), vec![tag::LATN]);
        let script_index = table.select_script(tag::LATN).unwrap();
        assert_eq!(table.select_script(tag::ARAB), None);

        assert_eq!(table.query_languages(script_index).unwrap(), vec![tag::TRK]);
        assert_eq!(
            table.select_language(tag::TRK, script_index).unwrap(),
            Some((0, NO_REQUIRED_FEATURE))
        );
        assert_eq!(table.select_language(tag::DEU, script_index).unwrap(), None);

        assert_eq!(
            table
                .query_features(script_index, DEFAULT_LANGUAGE_INDEX)
                .unwrap(),
            vec![tag::LIGA, tag::SMCP]
        );
        assert_eq!(
            table
                .select_feature(tag::SMCP, script_index, 0)
                .unwrap(),
            Some(1)
        );
        assert_eq!(
            table
                .select_feature(tag::KERN, script_index, DEFAULT_LANGUAGE_INDEX)
                .unwrap(),
            None
        );
        assert_eq!(
            table.required_feature(script_index, 0).unwrap(),
            None
        );
        assert_eq!(table.feature_lookup_indices(1).unwrap(), &[0]);
    }

    #[test]
    fn select_invalid_indices() {
        let lookups = vec![lookup(1, 0, &[single_subst_format1(&[5], 1)])];
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::LIGA, &[0])], &lookups);
        let table = ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap();

        assert_eq!(
            table.query_languages(1),
            Err(LayoutError::InvalidArgument)
        );
        assert_eq!(
            table.select_feature(tag::LIGA, 0, 3),
            Err(LayoutError::InvalidArgument)
        );
        assert_eq!(
            table.feature_lookup_indices(1),
            Err(LayoutError::InvalidArgument)
        );
    }

    #[test]
    fn empty_script_is_dropped() {
        // ScriptList with two scripts, the first of which has no language systems and no
        // default language system
        let mut data = words(&[1, 0, 10, 0, 0]);
        data.extend(words(&[2]));
        data.extend(&tag::ARAB.to_be_bytes());
        data.extend(words(&[14]));
        data.extend(&tag::LATN.to_be_bytes());
        data.extend(words(&[18]));
        data.extend(words(&[0, 0])); // arab: no default langsys, no records
        data.extend(words(&[4, 0])); // latn: default langsys at 4
        data.extend(words(&[0, 0xFFFF, 1, 0]));
        let table = ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap();
        assert_eq!(table.query_scripts(), vec![tag::LATN]);
    }

    #[test]
    fn extension_lookup_is_resolved() {
        // Extension (type 7) wrapping a single substitution
        let mut extension = words(&[1, 1, 0, 8]);
        extension.extend(single_subst_format1(&[5], 1));
        let lookups = vec![lookup(7, 0, &[extension])];
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::LIGA, &[0])], &lookups);
        let table = ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap();
        let lookup = table.lookup_list.lookup(0).unwrap();
        assert_eq!(lookup.lookup_type, 1);
        assert!(matches!(lookup.subtables, subst::SubstLookup::SingleSubst(ref subtables) if subtables.len() == 1));
    }

    #[test]
    fn nested_extension_is_rejected() {
        let extension = words(&[1, 7, 0, 8, 1, 1, 0, 8]);
        let lookups = vec![lookup(7, 0, &[extension])];
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::LIGA, &[0])], &lookups);
        assert!(matches!(
            ReadScope::new(&data).read::<LayoutTable<GSUB>>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn empty_extension_lookup_is_rejected() {
        let lookups = vec![lookup(7, 0, &[])];
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::LIGA, &[0])], &lookups);
        assert!(matches!(
            ReadScope::new(&data).read::<LayoutTable<GSUB>>(),
            Err(ParseError::BadValue)
        ));
    }

    #[test]
    fn invalid_subtable_fails_load() {
        let bad_subtable = words(&[9, 0, 0]);
        let lookups = vec![lookup(
            1,
            0,
            &[single_subst_format1(&[5], 1), bad_subtable],
        )];
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::LIGA, &[0])], &lookups);
        assert!(matches!(
            ReadScope::new(&data).read::<LayoutTable<GSUB>>(),
            Err(ParseError::BadFormat)
        ));
    }

    #[test]
    fn unknown_lookup_type_fails() {
        let lookups = vec![lookup(9, 0, &[single_subst_format1(&[5], 1)])];
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::LIGA, &[0])], &lookups);
        assert!(matches!(
            ReadScope::new(&data).read::<LayoutTable<GSUB>>(),
            Err(ParseError::BadFormat)
        ));
    }

    #[test]
    fn mark_attachment_type_detected() {
        let lookups = vec![
            lookup(1, 0x0008, &[single_subst_format1(&[5], 1)]),
            lookup(1, 0x0200, &[single_subst_format1(&[6], 1)]),
        ];
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::LIGA, &[0, 1])], &lookups);
        let table = ReadScope::new(&data).read::<LayoutTable<GSUB>>().unwrap();
        assert!(table.lookup_list.uses_mark_attachment_type());
    }
}
