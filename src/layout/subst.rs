//! GSUB lookup subtables.

use std::rc::Rc;

use crate::binary::read::{CheckIndex, ReadBinary, ReadBinaryDep, ReadCtxt, ReadScope};
use crate::binary::U16Be;
use crate::error::ParseError;
use crate::layout::contextual::{ChainContextLookup, ContextLookup};
use crate::layout::{
    read_coverage, read_coverages, read_objects, read_subtables, Coverage, LayoutCache,
    LayoutTableType, GSUB,
};

pub enum SubstLookup {
    SingleSubst(Vec<SingleSubst>),
    MultipleSubst(Vec<MultipleSubst>),
    AlternateSubst(Vec<AlternateSubst>),
    LigatureSubst(Vec<LigatureSubst>),
    ContextSubst(Vec<ContextLookup>),
    ChainContextSubst(Vec<ChainContextLookup>),
    ReverseChainSingleSubst(Vec<ReverseChainSingleSubst>),
}

impl LayoutTableType for GSUB {
    type LookupSubtables = SubstLookup;

    const EXTENSION_LOOKUP_TYPE: u16 = 7;

    fn read_subtables<'a>(
        lookup_type: u16,
        subtables: &[ReadScope<'a>],
        cache: &'a LayoutCache,
    ) -> Result<SubstLookup, ParseError> {
        let lookup = match lookup_type {
            1 => SubstLookup::SingleSubst(read_subtables(subtables, cache)?),
            2 => SubstLookup::MultipleSubst(read_subtables(subtables, cache)?),
            3 => SubstLookup::AlternateSubst(read_subtables(subtables, cache)?),
            4 => SubstLookup::LigatureSubst(read_subtables(subtables, cache)?),
            5 => SubstLookup::ContextSubst(read_subtables(subtables, cache)?),
            6 => SubstLookup::ChainContextSubst(read_subtables(subtables, cache)?),
            8 => SubstLookup::ReverseChainSingleSubst(read_subtables(subtables, cache)?),
            _ => return Err(ParseError::BadFormat),
        };
        Ok(lookup)
    }
}

impl SubstLookup {
    pub fn is_empty(&self) -> bool {
        match self {
            SubstLookup::SingleSubst(subtables) => subtables.is_empty(),
            SubstLookup::MultipleSubst(subtables) => subtables.is_empty(),
            SubstLookup::AlternateSubst(subtables) => subtables.is_empty(),
            SubstLookup::LigatureSubst(subtables) => subtables.is_empty(),
            SubstLookup::ContextSubst(subtables) => subtables.is_empty(),
            SubstLookup::ChainContextSubst(subtables) => subtables.is_empty(),
            SubstLookup::ReverseChainSingleSubst(subtables) => subtables.is_empty(),
        }
    }
}

pub enum SingleSubst {
    Format1 {
        coverage: Rc<Coverage>,
        delta_glyph_index: i16,
    },
    Format2 {
        coverage: Rc<Coverage>,
        substitute_glyph_array: Vec<u16>,
    },
}

impl ReadBinaryDep for SingleSubst {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let delta_glyph_index = ctxt.read_i16be()?;
                Ok(SingleSubst::Format1 {
                    coverage,
                    delta_glyph_index,
                })
            }
            2 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitute_glyph_array = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                Ok(SingleSubst::Format2 {
                    coverage,
                    substitute_glyph_array,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl SingleSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<u16>, ParseError> {
        match self {
            SingleSubst::Format1 {
                coverage,
                delta_glyph_index,
            } => {
                if coverage.glyph_coverage_value(glyph).is_some() {
                    // Addition of deltaGlyphID is modulo 65536
                    Ok(Some(glyph.wrapping_add(*delta_glyph_index as u16)))
                } else {
                    Ok(None)
                }
            }
            SingleSubst::Format2 {
                coverage,
                substitute_glyph_array,
            } => match coverage.glyph_coverage_value(glyph) {
                Some(coverage_index) => {
                    let coverage_index = usize::from(coverage_index);
                    substitute_glyph_array.check_index(coverage_index)?;
                    Ok(Some(substitute_glyph_array[coverage_index]))
                }
                None => Ok(None),
            },
        }
    }
}

pub struct MultipleSubst {
    coverage: Rc<Coverage>,
    sequences: Vec<SequenceTable>,
}

pub struct SequenceTable {
    pub substitute_glyphs: Vec<u16>,
}

impl ReadBinaryDep for MultipleSubst {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let sequence_count = usize::from(ctxt.read_u16be()?);
                let sequence_offsets = ctxt.read_array::<U16Be>(sequence_count)?;
                let sequences = read_objects::<SequenceTable>(&scope, sequence_offsets)?;
                Ok(MultipleSubst {
                    coverage,
                    sequences,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl MultipleSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&SequenceTable>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                self.sequences.check_index(coverage_index)?;
                Ok(Some(&self.sequences[coverage_index]))
            }
            None => Ok(None),
        }
    }
}

impl ReadBinary for SequenceTable {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        // Empty sequences delete the glyph. Fonts use them even though they are not allowed.
        let glyph_count = usize::from(ctxt.read_u16be()?);
        let substitute_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
        Ok(SequenceTable { substitute_glyphs })
    }
}

pub struct AlternateSubst {
    coverage: Rc<Coverage>,
    alternatesets: Vec<AlternateSet>,
}

pub struct AlternateSet {
    pub alternate_glyphs: Vec<u16>,
}

impl ReadBinaryDep for AlternateSubst {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let alternateset_count = usize::from(ctxt.read_u16be()?);
                let alternateset_offsets = ctxt.read_array::<U16Be>(alternateset_count)?;
                let alternatesets = read_objects::<AlternateSet>(&scope, alternateset_offsets)?;
                Ok(AlternateSubst {
                    coverage,
                    alternatesets,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl AlternateSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&AlternateSet>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                self.alternatesets.check_index(coverage_index)?;
                Ok(Some(&self.alternatesets[coverage_index]))
            }
            None => Ok(None),
        }
    }
}

impl ReadBinary for AlternateSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let alternate_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
        Ok(AlternateSet { alternate_glyphs })
    }
}

pub struct LigatureSubst {
    coverage: Rc<Coverage>,
    ligaturesets: Vec<LigatureSet>,
}

pub struct LigatureSet {
    pub ligatures: Vec<Ligature>,
}

/// A ligature and the components after the first, which the coverage table matched.
pub struct Ligature {
    pub ligature_glyph: u16,
    pub component_glyphs: Vec<u16>,
}

impl ReadBinaryDep for LigatureSubst {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage = read_coverage(&scope, cache, ctxt.read_u16be()?)?;
                let ligatureset_count = usize::from(ctxt.read_u16be()?);
                let ligatureset_offsets = ctxt.read_array::<U16Be>(ligatureset_count)?;
                let ligaturesets = read_objects::<LigatureSet>(&scope, ligatureset_offsets)?;
                Ok(LigatureSubst {
                    coverage,
                    ligaturesets,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl LigatureSubst {
    pub fn apply_glyph(&self, glyph: u16) -> Result<Option<&LigatureSet>, ParseError> {
        match self.coverage.glyph_coverage_value(glyph) {
            Some(coverage_index) => {
                let coverage_index = usize::from(coverage_index);
                self.ligaturesets.check_index(coverage_index)?;
                Ok(Some(&self.ligaturesets[coverage_index]))
            }
            None => Ok(None),
        }
    }
}

impl ReadBinary for LigatureSet {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let ligature_count = usize::from(ctxt.read_u16be()?);
        let ligature_offsets = ctxt.read_array::<U16Be>(ligature_count)?;
        let ligatures = read_objects::<Ligature>(&scope, ligature_offsets)?;
        Ok(LigatureSet { ligatures })
    }
}

impl ReadBinary for Ligature {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let ligature_glyph = ctxt.read_u16be()?;
        let component_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(component_count > 0)?;
        let component_glyphs = ctxt.read_array::<U16Be>(component_count - 1)?.to_vec();
        Ok(Ligature {
            ligature_glyph,
            component_glyphs,
        })
    }
}

impl Ligature {
    /// Number of glyphs the ligature replaces.
    pub fn component_count(&self) -> usize {
        self.component_glyphs.len() + 1
    }
}

/// GSUB Lookup Type 8 subtable, applied from the end of the string to the start.
pub struct ReverseChainSingleSubst {
    /// Coverage table for the single input glyph
    coverage: Rc<Coverage>,
    /// Backtrack coverages, nearest glyph first
    backtrack_coverages: Vec<Rc<Coverage>>,
    lookahead_coverages: Vec<Rc<Coverage>>,
    /// Substitute glyphs, ordered by coverage index
    substitute_glyphs: Vec<u16>,
}

impl ReadBinaryDep for ReverseChainSingleSubst {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = ctxt.read_u16be()?;
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverage_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverage_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let glyph_count = usize::from(ctxt.read_u16be()?);
                let substitute_glyphs = ctxt.read_array::<U16Be>(glyph_count)?.to_vec();
                let coverage = read_coverage(&scope, cache, coverage_offset)?;
                let backtrack_coverages =
                    read_coverages(&scope, cache, backtrack_coverage_offsets)?;
                let lookahead_coverages =
                    read_coverages(&scope, cache, lookahead_coverage_offsets)?;

                ctxt.check(coverage.glyph_count() == glyph_count)?;
                Ok(ReverseChainSingleSubst {
                    coverage,
                    backtrack_coverages,
                    lookahead_coverages,
                    substitute_glyphs,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl ReverseChainSingleSubst {
    /// The substitute for `glyph` if it is covered, without checking the context.
    pub fn substitute(&self, glyph: u16) -> Option<u16> {
        self.coverage
            .glyph_coverage_value(glyph)
            .and_then(|coverage_index| {
                self.substitute_glyphs
                    .get(usize::from(coverage_index))
                    .copied()
            })
    }

    pub fn backtrack_coverages(&self) -> &[Rc<Coverage>] {
        &self.backtrack_coverages
    }

    pub fn lookahead_coverages(&self) -> &[Rc<Coverage>] {
        &self.lookahead_coverages
    }
}
