//! Context and chained context subtables, shared by GSUB (types 5 and 6) and GPOS (types 7
//! and 8).
//!
//! Both tables use identical structures for these lookups; only the nested lookups named by
//! the [`LookupRecord`]s differ, and those are applied by the engines.

use std::rc::Rc;

use tinyvec::TinyVec;

use crate::binary::read::{CheckIndex, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::U16Be;
use crate::buffer::GlyphItem;
use crate::context::{GlyphTable, MatchContext, MatchType};
use crate::error::ParseError;
use crate::gdef::GdefTable;
use crate::layout::{
    read_classdef, read_coverage, read_coverages, read_objects, read_objects_nullable, ClassDef,
    Coverage, LayoutCache,
};

/// Context length meaning the lookup is not nested inside a contextual rule.
pub const NO_CONTEXT: u16 = 0xFFFF;

/// A nested lookup to apply at one position of a matched input sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LookupRecord {
    pub sequence_index: u16,
    pub lookup_list_index: u16,
}

pub enum ContextLookup {
    Format1 {
        coverage: Rc<Coverage>,
        rulesets: Vec<Option<RuleSet<SequenceRule>>>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        classdef: Rc<ClassDef>,
        rulesets: Vec<Option<RuleSet<SequenceRule>>>,
    },
    Format3 {
        coverages: Vec<Rc<Coverage>>,
        lookup_records: Vec<LookupRecord>,
    },
}

pub enum ChainContextLookup {
    Format1 {
        coverage: Rc<Coverage>,
        rulesets: Vec<Option<RuleSet<ChainSequenceRule>>>,
    },
    Format2 {
        coverage: Rc<Coverage>,
        backtrack_classdef: Rc<ClassDef>,
        input_classdef: Rc<ClassDef>,
        lookahead_classdef: Rc<ClassDef>,
        rulesets: Vec<Option<RuleSet<ChainSequenceRule>>>,
    },
    Format3 {
        backtrack_coverages: Vec<Rc<Coverage>>,
        input_coverages: Vec<Rc<Coverage>>,
        lookahead_coverages: Vec<Rc<Coverage>>,
        lookup_records: Vec<LookupRecord>,
    },
}

/// The rules that start with one coverage index (format 1) or input class (format 2).
pub struct RuleSet<R> {
    rules: Vec<R>,
}

/// A context rule. Depending on the subtable format the sequence holds glyph ids or classes.
pub struct SequenceRule {
    input_sequence: Vec<u16>,
    lookup_records: Vec<LookupRecord>,
}

/// A chained context rule.
///
/// The backtrack sequence is stored nearest glyph first.
pub struct ChainSequenceRule {
    backtrack_sequence: Vec<u16>,
    input_sequence: Vec<u16>,
    lookahead_sequence: Vec<u16>,
    lookup_records: Vec<LookupRecord>,
}

/// A rule whose context matched at the current position.
#[derive(Copy, Clone, Debug)]
pub struct RuleMatch<'a> {
    /// Number of input glyphs, including the first.
    pub input_count: usize,
    pub lookup_records: &'a [LookupRecord],
}

impl ReadFrom for LookupRecord {
    type ReadType = (U16Be, U16Be);

    fn read_from((sequence_index, lookup_list_index): (u16, u16)) -> Self {
        LookupRecord {
            sequence_index,
            lookup_list_index,
        }
    }
}

/// Read lookup records, ordered by the position they apply to.
///
/// Records for the same position keep their order in the font.
fn read_lookup_records(
    ctxt: &mut ReadCtxt<'_>,
    lookup_count: usize,
) -> Result<Vec<LookupRecord>, ParseError> {
    let mut lookup_records = ctxt.read_array::<LookupRecord>(lookup_count)?.to_vec();
    lookup_records.sort_by_key(|record| record.sequence_index);
    Ok(lookup_records)
}

/// Read the optional ClassDef of a chained context subtable. A missing one puts every glyph
/// in class 0.
fn read_classdef_nullable<'a>(
    scope: &ReadScope<'a>,
    cache: &LayoutCache,
    offset: u16,
) -> Result<Rc<ClassDef>, ParseError> {
    if offset == 0 {
        Ok(Rc::new(ClassDef::empty()))
    } else {
        read_classdef(scope, cache, offset)
    }
}

impl ReadBinaryDep for ContextLookup {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = ctxt.read_u16be()?;
                let ruleset_count = usize::from(ctxt.read_u16be()?);
                let ruleset_offsets = ctxt.read_array::<U16Be>(ruleset_count)?;
                let rulesets =
                    read_objects_nullable::<RuleSet<SequenceRule>>(&scope, ruleset_offsets)?;
                let coverage = read_coverage(&scope, cache, coverage_offset)?;
                Ok(ContextLookup::Format1 { coverage, rulesets })
            }
            2 => {
                let coverage_offset = ctxt.read_u16be()?;
                let classdef_offset = ctxt.read_u16be()?;
                let ruleset_count = ctxt.read_u16be()?;
                let ruleset_offsets = ctxt.read_array::<U16Be>(usize::from(ruleset_count))?;
                let rulesets =
                    read_objects_nullable::<RuleSet<SequenceRule>>(&scope, ruleset_offsets)?;
                let coverage = read_coverage(&scope, cache, coverage_offset)?;
                let classdef = read_classdef(&scope, cache, classdef_offset)?;
                classdef.check_limit(ruleset_count)?;
                Ok(ContextLookup::Format2 {
                    coverage,
                    classdef,
                    rulesets,
                })
            }
            3 => {
                let glyph_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(glyph_count > 0)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let coverage_offsets = ctxt.read_array::<U16Be>(glyph_count)?;
                let lookup_records = read_lookup_records(ctxt, lookup_count)?;
                let coverages = read_coverages(&scope, cache, coverage_offsets)?;
                Ok(ContextLookup::Format3 {
                    coverages,
                    lookup_records,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl ReadBinaryDep for ChainContextLookup {
    type Args<'a> = &'a LayoutCache;
    type HostType<'a> = Self;

    fn read_dep<'a>(ctxt: &mut ReadCtxt<'a>, cache: Self::Args<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        match ctxt.read_u16be()? {
            1 => {
                let coverage_offset = ctxt.read_u16be()?;
                let ruleset_count = usize::from(ctxt.read_u16be()?);
                let ruleset_offsets = ctxt.read_array::<U16Be>(ruleset_count)?;
                let rulesets =
                    read_objects_nullable::<RuleSet<ChainSequenceRule>>(&scope, ruleset_offsets)?;
                let coverage = read_coverage(&scope, cache, coverage_offset)?;
                Ok(ChainContextLookup::Format1 { coverage, rulesets })
            }
            2 => {
                let coverage_offset = ctxt.read_u16be()?;
                let backtrack_classdef_offset = ctxt.read_u16be()?;
                let input_classdef_offset = ctxt.read_u16be()?;
                let lookahead_classdef_offset = ctxt.read_u16be()?;
                let ruleset_count = ctxt.read_u16be()?;
                let ruleset_offsets = ctxt.read_array::<U16Be>(usize::from(ruleset_count))?;
                let rulesets =
                    read_objects_nullable::<RuleSet<ChainSequenceRule>>(&scope, ruleset_offsets)?;
                let coverage = read_coverage(&scope, cache, coverage_offset)?;
                let backtrack_classdef =
                    read_classdef_nullable(&scope, cache, backtrack_classdef_offset)?;
                let input_classdef = read_classdef(&scope, cache, input_classdef_offset)?;
                input_classdef.check_limit(ruleset_count)?;
                let lookahead_classdef =
                    read_classdef_nullable(&scope, cache, lookahead_classdef_offset)?;
                Ok(ChainContextLookup::Format2 {
                    coverage,
                    backtrack_classdef,
                    input_classdef,
                    lookahead_classdef,
                    rulesets,
                })
            }
            3 => {
                let backtrack_count = usize::from(ctxt.read_u16be()?);
                let backtrack_coverage_offsets = ctxt.read_array::<U16Be>(backtrack_count)?;
                let input_count = usize::from(ctxt.read_u16be()?);
                ctxt.check(input_count > 0)?;
                let input_coverage_offsets = ctxt.read_array::<U16Be>(input_count)?;
                let lookahead_count = usize::from(ctxt.read_u16be()?);
                let lookahead_coverage_offsets = ctxt.read_array::<U16Be>(lookahead_count)?;
                let lookup_count = usize::from(ctxt.read_u16be()?);
                let lookup_records = read_lookup_records(ctxt, lookup_count)?;
                let backtrack_coverages =
                    read_coverages(&scope, cache, backtrack_coverage_offsets)?;
                let input_coverages = read_coverages(&scope, cache, input_coverage_offsets)?;
                let lookahead_coverages =
                    read_coverages(&scope, cache, lookahead_coverage_offsets)?;
                Ok(ChainContextLookup::Format3 {
                    backtrack_coverages,
                    input_coverages,
                    lookahead_coverages,
                    lookup_records,
                })
            }
            _ => Err(ParseError::BadFormat),
        }
    }
}

impl<R> ReadBinary for RuleSet<R>
where
    R: for<'a> ReadBinary<HostType<'a> = R>,
{
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();
        let rule_count = usize::from(ctxt.read_u16be()?);
        let rule_offsets = ctxt.read_array::<U16Be>(rule_count)?;
        let rules = read_objects::<R>(&scope, rule_offsets)?;
        Ok(RuleSet { rules })
    }
}

impl ReadBinary for SequenceRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let glyph_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(glyph_count > 0)?;
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let input_sequence = ctxt.read_array::<U16Be>(glyph_count - 1)?.to_vec();
        let lookup_records = read_lookup_records(ctxt, lookup_count)?;
        Ok(SequenceRule {
            input_sequence,
            lookup_records,
        })
    }
}

impl ReadBinary for ChainSequenceRule {
    type HostType<'a> = Self;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let backtrack_count = usize::from(ctxt.read_u16be()?);
        let backtrack_sequence = ctxt.read_array::<U16Be>(backtrack_count)?.to_vec();
        let input_count = usize::from(ctxt.read_u16be()?);
        ctxt.check(input_count > 0)?;
        let input_sequence = ctxt.read_array::<U16Be>(input_count - 1)?.to_vec();
        let lookahead_count = usize::from(ctxt.read_u16be()?);
        let lookahead_sequence = ctxt.read_array::<U16Be>(lookahead_count)?.to_vec();
        let lookup_count = usize::from(ctxt.read_u16be()?);
        let lookup_records = read_lookup_records(ctxt, lookup_count)?;
        Ok(ChainSequenceRule {
            backtrack_sequence,
            input_sequence,
            lookahead_sequence,
            lookup_records,
        })
    }
}

impl<R> RuleSet<R> {
    pub fn rules(&self) -> &[R] {
        &self.rules
    }
}

/// Whether a rule with `input_count` input glyphs fits in the enclosing context.
pub(crate) fn fits_context(input_count: usize, context_length: u16) -> bool {
    context_length == NO_CONTEXT || input_count <= usize::from(context_length)
}

impl<'a> RuleMatch<'a> {
    fn new(input_count: usize, lookup_records: &'a [LookupRecord]) -> RuleMatch<'a> {
        RuleMatch {
            input_count,
            lookup_records,
        }
    }

    /// Positions in `glyphs` of the matched input glyphs, starting with `index`.
    pub fn input_positions(
        &self,
        opt_gdef_table: Option<&GdefTable>,
        match_type: MatchType,
        glyphs: &[GlyphItem],
        index: usize,
    ) -> TinyVec<[usize; 8]> {
        let mut positions = TinyVec::new();
        positions.push(index);
        let mut current = index;
        while positions.len() < self.input_count {
            match match_type.find_next(opt_gdef_table, glyphs, current) {
                Some(next) => {
                    positions.push(next);
                    current = next;
                }
                None => break,
            }
        }
        positions
    }
}

impl ContextLookup {
    /// Find the first rule that applies to `glyph`, using `f` to test each rule's context.
    pub fn find_rule<'a>(
        &'a self,
        glyph: u16,
        context_length: u16,
        f: impl Fn(&MatchContext<'_>) -> bool,
    ) -> Result<Option<RuleMatch<'a>>, ParseError> {
        match self {
            ContextLookup::Format1 { coverage, rulesets } => {
                let coverage_index = match coverage.glyph_coverage_value(glyph) {
                    Some(index) => usize::from(index),
                    None => return Ok(None),
                };
                rulesets.check_index(coverage_index)?;
                let ruleset = match &rulesets[coverage_index] {
                    Some(ruleset) => ruleset,
                    None => return Ok(None),
                };
                for rule in &ruleset.rules {
                    let input_count = rule.input_sequence.len() + 1;
                    if !fits_context(input_count, context_length) {
                        continue;
                    }
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::Empty,
                        input_table: GlyphTable::ById(&rule.input_sequence),
                        lookahead_table: GlyphTable::Empty,
                    };
                    if f(&match_context) {
                        return Ok(Some(RuleMatch::new(input_count, &rule.lookup_records)));
                    }
                }
                Ok(None)
            }
            ContextLookup::Format2 {
                coverage,
                classdef,
                rulesets,
            } => {
                if coverage.glyph_coverage_value(glyph).is_none() {
                    return Ok(None);
                }
                let class_value = usize::from(classdef.glyph_class_value(glyph));
                let ruleset = match rulesets.get(class_value) {
                    Some(Some(ruleset)) => ruleset,
                    _ => return Ok(None),
                };
                for rule in &ruleset.rules {
                    let input_count = rule.input_sequence.len() + 1;
                    if !fits_context(input_count, context_length) {
                        continue;
                    }
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::Empty,
                        input_table: GlyphTable::ByClassDef(
                            Rc::clone(classdef),
                            &rule.input_sequence,
                        ),
                        lookahead_table: GlyphTable::Empty,
                    };
                    if f(&match_context) {
                        return Ok(Some(RuleMatch::new(input_count, &rule.lookup_records)));
                    }
                }
                Ok(None)
            }
            ContextLookup::Format3 {
                coverages,
                lookup_records,
            } => {
                if coverages[0].glyph_coverage_value(glyph).is_none()
                    || !fits_context(coverages.len(), context_length)
                {
                    return Ok(None);
                }
                let match_context = MatchContext {
                    backtrack_table: GlyphTable::Empty,
                    input_table: GlyphTable::ByCoverage(&coverages[1..]),
                    lookahead_table: GlyphTable::Empty,
                };
                if f(&match_context) {
                    Ok(Some(RuleMatch::new(coverages.len(), lookup_records)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}

impl ChainContextLookup {
    /// Find the first rule that applies to `glyph`, using `f` to test each rule's context.
    pub fn find_rule<'a>(
        &'a self,
        glyph: u16,
        context_length: u16,
        f: impl Fn(&MatchContext<'_>) -> bool,
    ) -> Result<Option<RuleMatch<'a>>, ParseError> {
        match self {
            ChainContextLookup::Format1 { coverage, rulesets } => {
                let coverage_index = match coverage.glyph_coverage_value(glyph) {
                    Some(index) => usize::from(index),
                    None => return Ok(None),
                };
                rulesets.check_index(coverage_index)?;
                let ruleset = match &rulesets[coverage_index] {
                    Some(ruleset) => ruleset,
                    None => return Ok(None),
                };
                for rule in &ruleset.rules {
                    let input_count = rule.input_sequence.len() + 1;
                    if !fits_context(input_count, context_length) {
                        continue;
                    }
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::ById(&rule.backtrack_sequence),
                        input_table: GlyphTable::ById(&rule.input_sequence),
                        lookahead_table: GlyphTable::ById(&rule.lookahead_sequence),
                    };
                    if f(&match_context) {
                        return Ok(Some(RuleMatch::new(input_count, &rule.lookup_records)));
                    }
                }
                Ok(None)
            }
            ChainContextLookup::Format2 {
                coverage,
                backtrack_classdef,
                input_classdef,
                lookahead_classdef,
                rulesets,
            } => {
                if coverage.glyph_coverage_value(glyph).is_none() {
                    return Ok(None);
                }
                let class_value = usize::from(input_classdef.glyph_class_value(glyph));
                let ruleset = match rulesets.get(class_value) {
                    Some(Some(ruleset)) => ruleset,
                    _ => return Ok(None),
                };
                for rule in &ruleset.rules {
                    let input_count = rule.input_sequence.len() + 1;
                    if !fits_context(input_count, context_length) {
                        continue;
                    }
                    let match_context = MatchContext {
                        backtrack_table: GlyphTable::ByClassDef(
                            Rc::clone(backtrack_classdef),
                            &rule.backtrack_sequence,
                        ),
                        input_table: GlyphTable::ByClassDef(
                            Rc::clone(input_classdef),
                            &rule.input_sequence,
                        ),
                        lookahead_table: GlyphTable::ByClassDef(
                            Rc::clone(lookahead_classdef),
                            &rule.lookahead_sequence,
                        ),
                    };
                    if f(&match_context) {
                        return Ok(Some(RuleMatch::new(input_count, &rule.lookup_records)));
                    }
                }
                Ok(None)
            }
            ChainContextLookup::Format3 {
                backtrack_coverages,
                input_coverages,
                lookahead_coverages,
                lookup_records,
            } => {
                if input_coverages[0].glyph_coverage_value(glyph).is_none()
                    || !fits_context(input_coverages.len(), context_length)
                {
                    return Ok(None);
                }
                let match_context = MatchContext {
                    backtrack_table: GlyphTable::ByCoverage(backtrack_coverages),
                    input_table: GlyphTable::ByCoverage(&input_coverages[1..]),
                    lookahead_table: GlyphTable::ByCoverage(lookahead_coverages),
                };
                if f(&match_context) {
                    Ok(Some(RuleMatch::new(input_coverages.len(), lookup_records)))
                } else {
                    Ok(None)
                }
            }
        }
    }
}
