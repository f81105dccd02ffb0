//! Utilities for performing contextual lookup in gpos and gsub.

use std::rc::Rc;

use bitflags::bitflags;

use crate::buffer::GlyphItem;
use crate::error::LayoutError;
use crate::gdef::{self, GdefTable, GlyphProperty};
use crate::layout::{ClassDef, Coverage};

/// Nesting limit for lookups invoked from contextual subtables.
pub const MAX_NESTING_LEVEL: usize = 100;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct LookupFlag: u16 {
        const RIGHT_TO_LEFT = 0x0001;
        const IGNORE_BASE_GLYPHS = 0x0002;
        const IGNORE_LIGATURES = 0x0004;
        const IGNORE_MARKS = 0x0008;
        const USE_MARK_FILTERING_SET = 0x0010;
        const MARK_ATTACHMENT_TYPE = 0xFF00;
    }
}

#[derive(Copy, Clone)]
pub struct MatchType {
    lookup_flag: LookupFlag,
}

pub enum GlyphTable<'a> {
    Empty,
    ById(&'a [u16]),
    ByClassDef(Rc<ClassDef>, &'a [u16]),
    ByCoverage(&'a [Rc<Coverage>]),
}

impl<'a> GlyphTable<'a> {
    pub fn len(&self) -> usize {
        match self {
            GlyphTable::Empty => 0,
            GlyphTable::ById(ref arr) => arr.len(),
            GlyphTable::ByClassDef(_, ref arr) => arr.len(),
            GlyphTable::ByCoverage(ref vec) => vec.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The backtrack, input and lookahead sequences of a contextual rule.
///
/// The input table excludes the first input glyph, which the caller has already matched
/// against the subtable's coverage.
pub struct MatchContext<'a> {
    pub backtrack_table: GlyphTable<'a>,
    pub input_table: GlyphTable<'a>,
    pub lookahead_table: GlyphTable<'a>,
}

/// Tracks how deeply lookups invoked from contextual rules are nested.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ApplyContext {
    nesting_level: usize,
    max_nesting_level: usize,
}

impl LookupFlag {
    pub fn rtl(self) -> bool {
        self.contains(LookupFlag::RIGHT_TO_LEFT)
    }

    /// The glyph classes this lookup skips, as `GlyphProperty` bits.
    pub fn ignored_classes(self) -> GlyphProperty {
        GlyphProperty::from_bits_truncate(self.bits())
            & (GlyphProperty::BASE_GLYPH | GlyphProperty::LIGATURE | GlyphProperty::MARK)
    }

    /// The mark attachment type in the high byte, left in place so it compares directly
    /// against a glyph property.
    pub fn mark_attachment_type(self) -> u16 {
        (self & LookupFlag::MARK_ATTACHMENT_TYPE).bits()
    }
}

impl MatchType {
    pub fn from_lookup_flag(lookup_flag: LookupFlag) -> MatchType {
        MatchType { lookup_flag }
    }

    pub fn match_glyph(self, opt_gdef_table: Option<&GdefTable>, glyph: &GlyphItem) -> bool {
        gdef::check_property(opt_gdef_table, glyph, self.lookup_flag).is_some()
    }

    // searches backwards from glyphs[index-1]
    pub fn find_prev(
        self,
        opt_gdef_table: Option<&GdefTable>,
        glyphs: &[GlyphItem],
        mut index: usize,
    ) -> Option<usize> {
        while index > 0 {
            index -= 1;
            if self.match_glyph(opt_gdef_table, &glyphs[index]) {
                return Some(index);
            }
        }
        None
    }

    // searches forwards from glyphs[index+1]
    pub fn find_next(
        self,
        opt_gdef_table: Option<&GdefTable>,
        glyphs: &[GlyphItem],
        mut index: usize,
    ) -> Option<usize> {
        while index + 1 < glyphs.len() {
            index += 1;
            if self.match_glyph(opt_gdef_table, &glyphs[index]) {
                return Some(index);
            }
        }
        None
    }

    // searches backwards from glyphs[index-1]
    pub fn match_back(
        self,
        opt_gdef_table: Option<&GdefTable>,
        glyph_table: &GlyphTable<'_>,
        glyphs: &[GlyphItem],
        mut index: usize,
    ) -> bool {
        for i in 0..glyph_table.len() {
            match self.find_prev(opt_gdef_table, glyphs, index) {
                Some(prev_index) => {
                    index = prev_index;
                    if !check_glyph_table(glyph_table, i, glyphs[index].glyph_index) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        true
    }

    // searches forwards from glyphs[index+1]
    pub fn match_front(
        self,
        opt_gdef_table: Option<&GdefTable>,
        glyph_table: &GlyphTable<'_>,
        glyphs: &[GlyphItem],
        mut index: usize,
        last_index: &mut usize,
    ) -> bool {
        for i in 0..glyph_table.len() {
            match self.find_next(opt_gdef_table, glyphs, index) {
                Some(next_index) => {
                    index = next_index;
                    if !check_glyph_table(glyph_table, i, glyphs[index].glyph_index) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        *last_index = index;
        true
    }
}

impl<'a> MatchContext<'a> {
    /// Match the rule with its first input glyph at `glyphs[index]`.
    ///
    /// Backtrack glyphs are matched from the end of `backtrack_glyphs`. GSUB passes the output
    /// string here, so substitutions already made are visible. GPOS passes the input glyphs
    /// before `index`.
    pub fn matches(
        &self,
        opt_gdef_table: Option<&GdefTable>,
        match_type: MatchType,
        backtrack_glyphs: &[GlyphItem],
        glyphs: &[GlyphItem],
        index: usize,
    ) -> bool {
        let mut front_index = index;
        match_type.match_back(
            opt_gdef_table,
            &self.backtrack_table,
            backtrack_glyphs,
            backtrack_glyphs.len(),
        ) && match_type.match_front(
            opt_gdef_table,
            &self.input_table,
            glyphs,
            index,
            &mut front_index,
        ) && match_type.match_front(
            opt_gdef_table,
            &self.lookahead_table,
            glyphs,
            front_index,
            &mut front_index,
        )
    }
}

fn check_glyph_table(glyph_table: &GlyphTable<'_>, i: usize, glyph_index: u16) -> bool {
    match *glyph_table {
        GlyphTable::Empty => false,
        GlyphTable::ById(ref table) => table[i] == glyph_index,
        GlyphTable::ByClassDef(ref classdef, ref table) => {
            classdef.glyph_class_value(glyph_index) == table[i]
        }
        GlyphTable::ByCoverage(ref vec) => vec[i].glyph_coverage_value(glyph_index).is_some(),
    }
}

impl ApplyContext {
    pub fn new(max_nesting_level: usize) -> ApplyContext {
        ApplyContext {
            nesting_level: 0,
            max_nesting_level,
        }
    }

    pub fn nesting_level(self) -> usize {
        self.nesting_level
    }

    /// Enter one more level of lookup application.
    pub fn nest(self) -> Result<ApplyContext, LayoutError> {
        let nesting_level = self.nesting_level + 1;
        if nesting_level > self.max_nesting_level {
            return Err(LayoutError::TooManyNestedContexts);
        }
        Ok(ApplyContext {
            nesting_level,
            max_nesting_level: self.max_nesting_level,
        })
    }
}

impl Default for ApplyContext {
    fn default() -> Self {
        ApplyContext::new(MAX_NESTING_LEVEL)
    }
}
