//! Glyph substitution (`gsub`) implementation.
//!
//! > The Glyph Substitution (GSUB) table provides data for substition of glyphs for appropriate
//! > rendering of scripts, such as cursively-connecting forms in Arabic script, or for advanced
//! > typographic effects, such as ligatures.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/gsub>
//!
//! Lookups are applied one at a time to the whole glyph string. Each pass reads the input
//! string of the [`GlyphBuffer`] and writes the output string, then the two are swapped.

use std::convert::TryFrom;
use std::rc::Rc;

use log::debug;
use tinyvec::TinyVec;

use crate::binary::read::ReadScope;
use crate::buffer::{GlyphBuffer, GlyphItem, INHERIT};
use crate::context::{ApplyContext, GlyphTable, LookupFlag, MatchType, MAX_NESTING_LEVEL};
use crate::error::{LayoutError, ParseError};
use crate::gdef::{check_property, GdefTable, GlyphProperty};
use crate::layout::contextual::{
    fits_context, ChainContextLookup, ContextLookup, RuleMatch, NO_CONTEXT,
};
use crate::layout::subst::{
    AlternateSubst, Ligature, LigatureSubst, MultipleSubst, ReverseChainSingleSubst,
    SingleSubst, SubstLookup,
};
use crate::layout::{LayoutTable, GSUB};
use crate::tables::FontTableProvider;
use crate::tag;

/// Chooses one glyph from the set of an Alternate substitution.
pub trait AlternateSelector {
    /// Return the index into `alternates` to substitute for `glyph`, the glyph at input
    /// position `pos`.
    fn select(&mut self, pos: usize, glyph: u16, alternates: &[u16]) -> usize;
}

/// Always picks the first alternate.
pub struct FirstAlternate;

impl AlternateSelector for FirstAlternate {
    fn select(&mut self, _pos: usize, _glyph: u16, _alternates: &[u16]) -> usize {
        0
    }
}

/// A loaded GSUB table together with the activation bits of each lookup.
pub struct GsubTable {
    layout: LayoutTable<GSUB>,
    opt_gdef_table: Option<Rc<GdefTable>>,
    lookup_properties: Vec<u32>,
    max_nesting_level: usize,
}

impl GsubTable {
    /// Wrap a layout table. If any lookup filters marks by attachment class, the
    /// MarkAttachClassDef of `opt_gdef_table` is loaded.
    pub fn new(
        layout: LayoutTable<GSUB>,
        opt_gdef_table: Option<Rc<GdefTable>>,
    ) -> Result<GsubTable, ParseError> {
        if layout.lookup_list.uses_mark_attachment_type() {
            if let Some(ref gdef_table) = opt_gdef_table {
                gdef_table.load_mark_attach_class_def()?;
            }
        }
        let lookup_properties = vec![0; layout.lookup_list.len()];
        Ok(GsubTable {
            layout,
            opt_gdef_table,
            lookup_properties,
            max_nesting_level: MAX_NESTING_LEVEL,
        })
    }

    pub fn layout(&self) -> &LayoutTable<GSUB> {
        &self.layout
    }

    pub fn gdef_table(&self) -> Option<&GdefTable> {
        self.opt_gdef_table.as_deref()
    }

    /// Activate the lookups of a feature for glyphs with any of the bits in `properties`.
    pub fn add_feature(&mut self, feature_index: u16, properties: u32) -> Result<(), LayoutError> {
        let lookup_indices = self.layout.feature_lookup_indices(feature_index)?;
        for &lookup_index in lookup_indices {
            match self.lookup_properties.get_mut(usize::from(lookup_index)) {
                Some(lookup_properties) => *lookup_properties |= properties,
                None => debug!(
                    "feature {} refers to missing lookup {}",
                    feature_index, lookup_index
                ),
            }
        }
        Ok(())
    }

    /// Deactivate every lookup.
    pub fn clear_features(&mut self) {
        self.lookup_properties.iter_mut().for_each(|bits| *bits = 0);
    }

    pub fn lookup_properties(&self) -> &[u32] {
        &self.lookup_properties
    }

    /// Limit how deeply contextual lookups may invoke one another.
    pub fn set_max_nesting_level(&mut self, max_nesting_level: usize) {
        self.max_nesting_level = max_nesting_level;
    }

    /// Apply every active lookup, in lookup list order, to the glyphs in `buffer`.
    ///
    /// On return the result is the input string of `buffer`.
    pub fn apply_string(
        &self,
        buffer: &mut GlyphBuffer,
        selector: &mut dyn AlternateSelector,
    ) -> Result<(), LayoutError> {
        if buffer.is_empty() {
            return Err(LayoutError::InvalidArgument);
        }
        let apply_context = ApplyContext::new(self.max_nesting_level);
        for (lookup_index, &properties) in self.lookup_properties.iter().enumerate() {
            if properties == 0 {
                continue;
            }
            let lookup = self.layout.lookup_list.lookup(lookup_index)?;
            if let SubstLookup::ReverseChainSingleSubst(ref subtables) = lookup.subtables {
                self.reverse_chain_single_subst_string(
                    subtables,
                    lookup.lookup_flag,
                    properties,
                    buffer,
                )?;
                continue;
            }
            while buffer.in_pos() < buffer.len() {
                let active = buffer
                    .current()
                    .map_or(false, |item| item.properties & properties != 0);
                let applied = active
                    && self.apply_lookup(
                        lookup_index,
                        buffer,
                        NO_CONTEXT,
                        selector,
                        apply_context,
                    )?;
                if !applied {
                    buffer.copy_output_glyph()?;
                }
            }
            buffer.swap();
        }
        Ok(())
    }

    /// Apply one lookup at the current input position.
    ///
    /// Returns `Ok(false)` if no subtable covers the glyph, leaving the buffer untouched.
    fn apply_lookup(
        &self,
        lookup_index: usize,
        buffer: &mut GlyphBuffer,
        context_length: u16,
        selector: &mut dyn AlternateSelector,
        apply_context: ApplyContext,
    ) -> Result<bool, LayoutError> {
        let apply_context = apply_context.nest()?;
        let lookup = self.layout.lookup_list.lookup(lookup_index)?;
        let lookup_flag = lookup.lookup_flag;
        match lookup.subtables {
            SubstLookup::SingleSubst(ref subtables) => {
                self.single_subst(subtables, lookup_flag, buffer, context_length)
            }
            SubstLookup::MultipleSubst(ref subtables) => {
                self.multiple_subst(subtables, lookup_flag, buffer, context_length)
            }
            SubstLookup::AlternateSubst(ref subtables) => {
                self.alternate_subst(subtables, lookup_flag, buffer, context_length, selector)
            }
            SubstLookup::LigatureSubst(ref subtables) => {
                self.ligature_subst(subtables, lookup_flag, buffer, context_length)
            }
            SubstLookup::ContextSubst(ref subtables) => self.context_subst(
                subtables,
                lookup_flag,
                buffer,
                context_length,
                selector,
                apply_context,
            ),
            SubstLookup::ChainContextSubst(ref subtables) => self.chain_context_subst(
                subtables,
                lookup_flag,
                buffer,
                context_length,
                selector,
                apply_context,
            ),
            SubstLookup::ReverseChainSingleSubst(_) => {
                debug!("reverse chaining lookup {} invoked from a context", lookup_index);
                Ok(false)
            }
        }
    }

    /// The current input glyph and its property, or `None` if the lookup skips it.
    fn current_glyph(
        &self,
        buffer: &GlyphBuffer,
        lookup_flag: LookupFlag,
    ) -> Result<Option<(u16, GlyphProperty)>, LayoutError> {
        let item = buffer.current().ok_or(LayoutError::InvalidArgument)?;
        Ok(check_property(self.gdef_table(), item, lookup_flag)
            .map(|property| (item.glyph_index, property)))
    }

    /// Record the class of a glyph a substitution produced, if the GDEF table takes new
    /// classes.
    fn set_glyph_property(&self, glyph: u16, property: GlyphProperty) -> Result<(), LayoutError> {
        if let Some(gdef_table) = self.gdef_table() {
            if gdef_table.has_new_glyph_classes() {
                gdef_table.add_glyph_property(glyph, property.basic())?;
            }
        }
        Ok(())
    }

    fn single_subst(
        &self,
        subtables: &[SingleSubst],
        lookup_flag: LookupFlag,
        buffer: &mut GlyphBuffer,
        context_length: u16,
    ) -> Result<bool, LayoutError> {
        if !fits_context(1, context_length) {
            return Ok(false);
        }
        let (glyph, property) = match self.current_glyph(buffer, lookup_flag)? {
            Some(current) => current,
            None => return Ok(false),
        };
        for single_subst in subtables {
            if let Some(output_glyph) = single_subst.apply_glyph(glyph)? {
                buffer.add_output_glyph(output_glyph, INHERIT, INHERIT)?;
                self.set_glyph_property(output_glyph, property)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn multiple_subst(
        &self,
        subtables: &[MultipleSubst],
        lookup_flag: LookupFlag,
        buffer: &mut GlyphBuffer,
        context_length: u16,
    ) -> Result<bool, LayoutError> {
        if !fits_context(1, context_length) {
            return Ok(false);
        }
        let (glyph, property) = match self.current_glyph(buffer, lookup_flag)? {
            Some(current) => current,
            None => return Ok(false),
        };
        for multiple_subst in subtables {
            if let Some(sequence_table) = multiple_subst.apply_glyph(glyph)? {
                buffer.add_output_glyphs(1, &sequence_table.substitute_glyphs, INHERIT, INHERIT)?;
                // a ligature split into pieces yields base glyphs
                let property = if property == GlyphProperty::LIGATURE {
                    GlyphProperty::BASE_GLYPH
                } else {
                    property
                };
                for &output_glyph in &sequence_table.substitute_glyphs {
                    self.set_glyph_property(output_glyph, property)?;
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn alternate_subst(
        &self,
        subtables: &[AlternateSubst],
        lookup_flag: LookupFlag,
        buffer: &mut GlyphBuffer,
        context_length: u16,
        selector: &mut dyn AlternateSelector,
    ) -> Result<bool, LayoutError> {
        if !fits_context(1, context_length) {
            return Ok(false);
        }
        let (glyph, property) = match self.current_glyph(buffer, lookup_flag)? {
            Some(current) => current,
            None => return Ok(false),
        };
        for alternate_subst in subtables {
            if let Some(alternate_set) = alternate_subst.apply_glyph(glyph)? {
                let alternates = &alternate_set.alternate_glyphs;
                let index = selector.select(buffer.in_pos(), glyph, alternates);
                let output_glyph = *alternates.get(index).ok_or(ParseError::BadIndex)?;
                buffer.add_output_glyph(output_glyph, INHERIT, INHERIT)?;
                self.set_glyph_property(output_glyph, property)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn ligature_subst(
        &self,
        subtables: &[LigatureSubst],
        lookup_flag: LookupFlag,
        buffer: &mut GlyphBuffer,
        context_length: u16,
    ) -> Result<bool, LayoutError> {
        if !fits_context(1, context_length) {
            return Ok(false);
        }
        let (glyph, property) = match self.current_glyph(buffer, lookup_flag)? {
            Some(current) => current,
            None => return Ok(false),
        };
        for ligature_subst in subtables {
            let ligature_set = match ligature_subst.apply_glyph(glyph)? {
                Some(ligature_set) => ligature_set,
                None => continue,
            };
            for ligature in &ligature_set.ligatures {
                let opt_match = self.match_ligature(
                    ligature,
                    lookup_flag,
                    buffer.in_glyphs(),
                    buffer.in_pos(),
                    context_length,
                    property.is_mark(),
                );
                if let Some((positions, all_marks)) = opt_match {
                    let ligature_property = if all_marks {
                        GlyphProperty::MARK
                    } else {
                        GlyphProperty::LIGATURE
                    };
                    self.set_glyph_property(ligature.ligature_glyph, ligature_property)?;
                    add_ligature(buffer, ligature.ligature_glyph, &positions)?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Match the components of `ligature` after `glyphs[index]`, skipping glyphs the lookup
    /// ignores.
    ///
    /// Returns the positions of all components, and whether they are all marks.
    fn match_ligature(
        &self,
        ligature: &Ligature,
        lookup_flag: LookupFlag,
        glyphs: &[GlyphItem],
        index: usize,
        context_length: u16,
        mut all_marks: bool,
    ) -> Option<(TinyVec<[usize; 8]>, bool)> {
        let component_count = ligature.component_count();
        if !fits_context(component_count, context_length)
            || index + component_count > glyphs.len()
        {
            return None;
        }
        let mut positions = TinyVec::new();
        positions.push(index);
        let mut j = index;
        for &component_glyph in &ligature.component_glyphs {
            let property = loop {
                j += 1;
                let item = glyphs.get(j)?;
                if let Some(property) = check_property(self.gdef_table(), item, lookup_flag) {
                    break property;
                }
            };
            if !property.is_mark() {
                all_marks = false;
            }
            if glyphs[j].glyph_index != component_glyph {
                return None;
            }
            positions.push(j);
        }
        Some((positions, all_marks))
    }

    fn context_subst(
        &self,
        subtables: &[ContextLookup],
        lookup_flag: LookupFlag,
        buffer: &mut GlyphBuffer,
        context_length: u16,
        selector: &mut dyn AlternateSelector,
        apply_context: ApplyContext,
    ) -> Result<bool, LayoutError> {
        let (glyph, _property) = match self.current_glyph(buffer, lookup_flag)? {
            Some(current) => current,
            None => return Ok(false),
        };
        let match_type = MatchType::from_lookup_flag(lookup_flag);
        for subtable in subtables {
            let opt_rule = subtable.find_rule(glyph, context_length, |match_context| {
                match_context.matches(
                    self.gdef_table(),
                    match_type,
                    buffer.out_glyphs(),
                    buffer.in_glyphs(),
                    buffer.in_pos(),
                )
            })?;
            if let Some(rule) = opt_rule {
                self.apply_rule(rule, match_type, buffer, selector, apply_context)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn chain_context_subst(
        &self,
        subtables: &[ChainContextLookup],
        lookup_flag: LookupFlag,
        buffer: &mut GlyphBuffer,
        context_length: u16,
        selector: &mut dyn AlternateSelector,
        apply_context: ApplyContext,
    ) -> Result<bool, LayoutError> {
        let (glyph, _property) = match self.current_glyph(buffer, lookup_flag)? {
            Some(current) => current,
            None => return Ok(false),
        };
        let match_type = MatchType::from_lookup_flag(lookup_flag);
        for subtable in subtables {
            let opt_rule = subtable.find_rule(glyph, context_length, |match_context| {
                match_context.matches(
                    self.gdef_table(),
                    match_type,
                    buffer.out_glyphs(),
                    buffer.in_glyphs(),
                    buffer.in_pos(),
                )
            })?;
            if let Some(rule) = opt_rule {
                self.apply_rule(rule, match_type, buffer, selector, apply_context)?;
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run the nested lookups of a matched rule over its input glyphs.
    ///
    /// Sequence indices count matched glyphs, so glyphs the rule skipped are copied through
    /// and never targeted. Each nested lookup sees the matched glyphs from its position on.
    fn apply_rule(
        &self,
        rule: RuleMatch<'_>,
        match_type: MatchType,
        buffer: &mut GlyphBuffer,
        selector: &mut dyn AlternateSelector,
        apply_context: ApplyContext,
    ) -> Result<(), LayoutError> {
        let positions = rule.input_positions(
            self.gdef_table(),
            match_type,
            buffer.in_glyphs(),
            buffer.in_pos(),
        );
        let last_position = match positions.last() {
            Some(&last_position) => last_position,
            None => return Ok(()),
        };
        let mut lookup_records = rule.lookup_records.iter().peekable();
        while buffer.in_pos() <= last_position {
            let in_pos = buffer.in_pos();
            let mut opt_lookup_record = None;
            while let Some(&&lookup_record) = lookup_records.peek() {
                match positions.get(usize::from(lookup_record.sequence_index)) {
                    Some(&position) if position == in_pos => {
                        opt_lookup_record = lookup_records.next();
                        break;
                    }
                    Some(&position) if position > in_pos => break,
                    _ => {
                        lookup_records.next();
                    }
                }
            }
            let applied = match opt_lookup_record {
                Some(lookup_record) => {
                    let remaining = positions.iter().filter(|&&pos| pos >= in_pos).count();
                    self.apply_lookup(
                        usize::from(lookup_record.lookup_list_index),
                        buffer,
                        u16::try_from(remaining)?,
                        selector,
                        apply_context,
                    )?
                }
                None => false,
            };
            if !applied {
                buffer.copy_output_glyph()?;
            }
        }
        Ok(())
    }

    /// Apply a reverse chaining lookup in place, from the last glyph to the first.
    fn reverse_chain_single_subst_string(
        &self,
        subtables: &[ReverseChainSingleSubst],
        lookup_flag: LookupFlag,
        properties: u32,
        buffer: &mut GlyphBuffer,
    ) -> Result<(), LayoutError> {
        let match_type = MatchType::from_lookup_flag(lookup_flag);
        for index in (0..buffer.len()).rev() {
            let item = &buffer.in_glyphs()[index];
            if item.properties & properties == 0 {
                continue;
            }
            let property = match check_property(self.gdef_table(), item, lookup_flag) {
                Some(property) => property,
                None => continue,
            };
            let glyph = item.glyph_index;
            let opt_output_glyph = subtables.iter().find_map(|subtable| {
                let output_glyph = subtable.substitute(glyph)?;
                let glyphs = buffer.in_glyphs();
                let mut last_index = index;
                let matches = match_type.match_back(
                    self.gdef_table(),
                    &GlyphTable::ByCoverage(subtable.backtrack_coverages()),
                    glyphs,
                    index,
                ) && match_type.match_front(
                    self.gdef_table(),
                    &GlyphTable::ByCoverage(subtable.lookahead_coverages()),
                    glyphs,
                    index,
                    &mut last_index,
                );
                matches.then_some(output_glyph)
            });
            if let Some(output_glyph) = opt_output_glyph {
                buffer.replace_in_glyph(index, output_glyph);
                self.set_glyph_property(output_glyph, property)?;
            }
        }
        Ok(())
    }
}

/// Replace the matched components at `positions` with `ligature_glyph`.
///
/// Glyphs skipped between the components are copied after the ligature and tagged with its
/// ligature id and the index of the component they follow.
fn add_ligature(
    buffer: &mut GlyphBuffer,
    ligature_glyph: u16,
    positions: &[usize],
) -> Result<(), LayoutError> {
    let in_pos = buffer.in_pos();
    let component_count = positions.len();
    let skipped = positions.last() != Some(&(in_pos + component_count - 1));
    if !skipped {
        let current_lig_id = buffer.current().map_or(0, |item| item.lig_id);
        let lig_id = if current_lig_id != 0 {
            INHERIT
        } else {
            buffer.allocate_lig_id()
        };
        return buffer.add_output_glyphs(component_count, &[ligature_glyph], INHERIT, lig_id);
    }

    let lig_id = buffer.allocate_lig_id();
    buffer.add_output_glyph(ligature_glyph, INHERIT, lig_id)?;
    for (component, &position) in positions.iter().enumerate().skip(1) {
        while buffer.in_pos() < position {
            let skipped_glyph = buffer
                .current()
                .ok_or(LayoutError::InvalidArgument)?
                .glyph_index;
            buffer.add_output_glyph(skipped_glyph, u16::try_from(component - 1)?, lig_id)?;
        }
        buffer.set_in_pos(position + 1);
    }
    Ok(())
}

/// Load the `GSUB` table. Returns `Ok(None)` if the font has none.
pub fn load_gsub<F: FontTableProvider>(
    provider: &F,
    opt_gdef_table: Option<Rc<GdefTable>>,
) -> Result<Option<GsubTable>, ParseError> {
    match provider.table_data(tag::GSUB)? {
        Some(gsub_data) => {
            let layout = ReadScope::new(&gsub_data).read::<LayoutTable<GSUB>>()?;
            GsubTable::new(layout, opt_gdef_table).map(Some)
        }
        None => Ok(None),
    }
}
