//! Glyph positioning (`gpos`) implementation.
//!
//! > The Glyph Positioning table (GPOS) provides precise control over glyph placement for
//! > sophisticated text layout and rendering in each script and language system that a font
//! > supports.
//!
//! — <https://docs.microsoft.com/en-us/typography/opentype/spec/gpos>
//!
//! Positioning does not change the glyphs. Each active lookup is run over the input string of
//! the [`GlyphBuffer`] and accumulates adjustments into one [`Position`] per glyph.

use std::convert::TryFrom;
use std::rc::Rc;

use log::debug;
use pathfinder_geometry::vector::{vec2i, Vector2I};

use crate::binary::read::ReadScope;
use crate::buffer::{GlyphBuffer, GlyphItem, Position};
use crate::context::{ApplyContext, LookupFlag, MatchType, MAX_NESTING_LEVEL};
use crate::error::{LayoutError, ParseError};
use crate::gdef::{check_property, GdefTable, GlyphProperty};
use crate::layout::contextual::{
    fits_context, ChainContextLookup, ContextLookup, RuleMatch, NO_CONTEXT,
};
use crate::layout::pos::{
    Anchor, CursivePos, MarkBasePos, MarkLigPos, PairPos, PosLookup, SinglePos, ValueRecord,
};
use crate::layout::{Device, LayoutTable, GPOS};
use crate::tables::FontTableProvider;
use crate::tag;

/// Scaling and rendering parameters for positioning.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PositioningParams {
    /// Horizontal scale in 16.16 fixed point. `0x10000` keeps design units.
    pub x_scale: i32,
    pub y_scale: i32,
    pub x_ppem: u16,
    pub y_ppem: u16,
    /// Device independent: ignore Device tables and contour points.
    pub dvi: bool,
    /// Right to left text, which changes how cursive attachments adjust advances.
    pub r2l: bool,
    /// Passed through to [`GlyphOutlines::contour_points`].
    pub load_flags: u32,
}

impl Default for PositioningParams {
    fn default() -> Self {
        PositioningParams {
            x_scale: 0x10000,
            y_scale: 0x10000,
            x_ppem: 0,
            y_ppem: 0,
            dvi: true,
            r2l: false,
            load_flags: 0,
        }
    }
}

/// Supplies glyph outlines for anchors defined by a contour point.
pub trait GlyphOutlines {
    /// The points of the scaled outline of `glyph`, in 26.6 pixels.
    ///
    /// An empty list means the glyph has no outline, and the anchor's design coordinates are
    /// used instead.
    fn contour_points(&mut self, glyph: u16, load_flags: u32) -> Result<Vec<Vector2I>, LayoutError>;
}

/// An outline provider with no outlines.
pub struct NoOutlines;

impl GlyphOutlines for NoOutlines {
    fn contour_points(
        &mut self,
        _glyph: u16,
        _load_flags: u32,
    ) -> Result<Vec<Vector2I>, LayoutError> {
        Ok(Vec::new())
    }
}

/// Resolves the metric ids of multiple master fonts.
pub trait MetricResolver {
    /// The scaled value of metric `metric_id`.
    fn metric_value(&mut self, metric_id: u16) -> Result<i32, LayoutError>;
}

/// Fails on every metric id.
pub struct NoMetrics;

impl MetricResolver for NoMetrics {
    fn metric_value(&mut self, _metric_id: u16) -> Result<i32, LayoutError> {
        Err(LayoutError::NoMultipleMasterInterpreter)
    }
}

/// A loaded GPOS table together with the activation bits of each lookup.
pub struct GposTable {
    layout: LayoutTable<GPOS>,
    opt_gdef_table: Option<Rc<GdefTable>>,
    lookup_properties: Vec<u32>,
    max_nesting_level: usize,
}

/// Converts font values to output units.
struct Scaler<'a> {
    params: &'a PositioningParams,
    outlines: &'a mut dyn GlyphOutlines,
    metrics: &'a mut dyn MetricResolver,
}

/// The attachment point of the previous glyph in a run of cursive glyphs.
#[derive(Copy, Clone)]
struct CursiveChain {
    last: Option<(usize, Vector2I)>,
}

struct PosState<'a> {
    glyphs: &'a [GlyphItem],
    positions: &'a mut [Position],
    scaler: Scaler<'a>,
    cursive: CursiveChain,
}

fn scale(value: i16, scale: i32) -> i32 {
    (i64::from(scale) * i64::from(value) / 0x10000) as i32
}

fn device_delta(opt_device: &Option<Device>, ppem: u16) -> i32 {
    opt_device
        .as_ref()
        .map_or(0, |device| i32::from(device.delta(ppem)) << 6)
}

impl Scaler<'_> {
    /// Add the fields of `value_record` to `position`.
    fn adjust(
        &mut self,
        value_record: &ValueRecord,
        position: &mut Position,
    ) -> Result<(), LayoutError> {
        let params = self.params;
        if let Some(x_placement) = value_record.x_placement {
            position.x_pos += scale(x_placement, params.x_scale);
        }
        if let Some(y_placement) = value_record.y_placement {
            position.y_pos += scale(y_placement, params.y_scale);
        }
        if let Some(x_advance) = value_record.x_advance {
            position.x_advance += scale(x_advance, params.x_scale);
        }
        if let Some(y_advance) = value_record.y_advance {
            position.y_advance += scale(y_advance, params.y_scale);
        }
        if !params.dvi {
            position.x_pos += device_delta(&value_record.x_placement_device, params.x_ppem);
            position.y_pos += device_delta(&value_record.y_placement_device, params.y_ppem);
            position.x_advance += device_delta(&value_record.x_advance_device, params.x_ppem);
            position.y_advance += device_delta(&value_record.y_advance_device, params.y_ppem);
        }
        if let Some(metric_id) = value_record.x_id_placement {
            position.x_pos += self.metrics.metric_value(metric_id)?;
        }
        if let Some(metric_id) = value_record.y_id_placement {
            position.y_pos += self.metrics.metric_value(metric_id)?;
        }
        if let Some(metric_id) = value_record.x_id_advance {
            position.x_advance += self.metrics.metric_value(metric_id)?;
        }
        if let Some(metric_id) = value_record.y_id_advance {
            position.y_advance += self.metrics.metric_value(metric_id)?;
        }
        Ok(())
    }

    /// The position of `anchor` on `glyph`.
    fn anchor(&mut self, anchor: &Anchor, glyph: u16) -> Result<Vector2I, LayoutError> {
        let params = self.params;
        let design = |x: i16, y: i16| vec2i(scale(x, params.x_scale), scale(y, params.y_scale));
        match *anchor {
            Anchor::Format1 { x, y } => Ok(design(x, y)),
            Anchor::Format2 { x, y, anchor_point } => {
                if params.dvi {
                    return Ok(design(x, y));
                }
                let points = self.outlines.contour_points(glyph, params.load_flags)?;
                if points.is_empty() {
                    return Ok(design(x, y));
                }
                points
                    .get(usize::from(anchor_point))
                    .copied()
                    .ok_or(LayoutError::Parse(ParseError::BadIndex))
            }
            Anchor::Format3 {
                x,
                y,
                ref x_device,
                ref y_device,
            } => {
                let point = design(x, y);
                if params.dvi {
                    return Ok(point);
                }
                Ok(vec2i(
                    point.x() + device_delta(x_device, params.x_ppem),
                    point.y() + device_delta(y_device, params.y_ppem),
                ))
            }
            Anchor::Format4 { x_id, y_id } => Ok(vec2i(
                self.metrics.metric_value(x_id)?,
                self.metrics.metric_value(y_id)?,
            )),
        }
    }
}

impl CursiveChain {
    fn new() -> CursiveChain {
        CursiveChain { last: None }
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

/// The property of a glyph regardless of lookup flags.
fn glyph_property(opt_gdef_table: Option<&GdefTable>, item: &GlyphItem) -> GlyphProperty {
    check_property(opt_gdef_table, item, LookupFlag::empty()).unwrap_or(GlyphProperty::empty())
}

impl GposTable {
    /// Wrap a layout table. If any lookup filters marks by attachment class, the
    /// MarkAttachClassDef of `opt_gdef_table` is loaded.
    pub fn new(
        layout: LayoutTable<GPOS>,
        opt_gdef_table: Option<Rc<GdefTable>>,
    ) -> Result<GposTable, ParseError> {
        if layout.lookup_list.uses_mark_attachment_type() {
            if let Some(ref gdef_table) = opt_gdef_table {
                gdef_table.load_mark_attach_class_def()?;
            }
        }
        let lookup_properties = vec![0; layout.lookup_list.len()];
        Ok(GposTable {
            layout,
            opt_gdef_table,
            lookup_properties,
            max_nesting_level: MAX_NESTING_LEVEL,
        })
    }

    pub fn layout(&self) -> &LayoutTable<GPOS> {
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

    /// Position the input string of `buffer`.
    ///
    /// `positions` is reset to one zeroed entry per glyph, then every active lookup adds its
    /// adjustments.
    pub fn apply_string(
        &self,
        buffer: &GlyphBuffer,
        positions: &mut Vec<Position>,
        params: &PositioningParams,
        outlines: &mut dyn GlyphOutlines,
        metrics: &mut dyn MetricResolver,
    ) -> Result<(), LayoutError> {
        if buffer.is_empty() {
            return Err(LayoutError::InvalidArgument);
        }
        positions.clear();
        positions.resize(buffer.len(), Position::default());
        let mut state = PosState {
            glyphs: buffer.in_glyphs(),
            positions,
            scaler: Scaler {
                params,
                outlines,
                metrics,
            },
            cursive: CursiveChain::new(),
        };
        let apply_context = ApplyContext::new(self.max_nesting_level);
        for (lookup_index, &properties) in self.lookup_properties.iter().enumerate() {
            if properties == 0 {
                continue;
            }
            state.cursive.reset();
            let mut pos = 0;
            while pos < state.glyphs.len() {
                if state.glyphs[pos].properties & properties == 0 {
                    state.cursive.reset();
                    pos += 1;
                    continue;
                }
                let opt_next_pos =
                    self.apply_lookup(lookup_index, &mut state, pos, NO_CONTEXT, apply_context)?;
                pos = opt_next_pos.unwrap_or(pos + 1);
            }
        }
        Ok(())
    }

    /// Apply one lookup to the glyph at `pos`.
    ///
    /// Returns the position to continue from, or `None` if no subtable covers the glyph.
    fn apply_lookup(
        &self,
        lookup_index: usize,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
        apply_context: ApplyContext,
    ) -> Result<Option<usize>, LayoutError> {
        let apply_context = apply_context.nest()?;
        let lookup = self.layout.lookup_list.lookup(lookup_index)?;
        let lookup_flag = lookup.lookup_flag;
        match lookup.subtables {
            PosLookup::SinglePos(ref subtables) => {
                self.single_pos(subtables, lookup_flag, state, pos, context_length)
            }
            PosLookup::PairPos(ref subtables) => {
                self.pair_pos(subtables, lookup_flag, state, pos, context_length)
            }
            PosLookup::CursivePos(ref subtables) => {
                self.cursive_pos(subtables, lookup_flag, state, pos, context_length)
            }
            PosLookup::MarkBasePos(ref subtables) => {
                self.mark_base_pos(subtables, lookup_flag, state, pos, context_length)
            }
            PosLookup::MarkLigPos(ref subtables) => {
                self.mark_lig_pos(subtables, lookup_flag, state, pos, context_length)
            }
            PosLookup::MarkMarkPos(ref subtables) => {
                self.mark_mark_pos(subtables, lookup_flag, state, pos, context_length)
            }
            PosLookup::ContextPos(ref subtables) => self.context_pos(
                subtables,
                lookup_flag,
                state,
                pos,
                context_length,
                apply_context,
            ),
            PosLookup::ChainContextPos(ref subtables) => self.chain_context_pos(
                subtables,
                lookup_flag,
                state,
                pos,
                context_length,
                apply_context,
            ),
        }
    }

    fn single_pos(
        &self,
        subtables: &[SinglePos],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
    ) -> Result<Option<usize>, LayoutError> {
        if !fits_context(1, context_length) {
            return Ok(None);
        }
        let item = &state.glyphs[pos];
        if check_property(self.gdef_table(), item, lookup_flag).is_none() {
            return Ok(None);
        }
        for single_pos in subtables {
            if let Some(value_record) = single_pos.apply(item.glyph_index)? {
                state
                    .scaler
                    .adjust(value_record, &mut state.positions[pos])?;
                return Ok(Some(pos + 1));
            }
        }
        Ok(None)
    }

    fn pair_pos(
        &self,
        subtables: &[PairPos],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
    ) -> Result<Option<usize>, LayoutError> {
        if !fits_context(2, context_length) {
            return Ok(None);
        }
        let glyphs = state.glyphs;
        if check_property(self.gdef_table(), &glyphs[pos], lookup_flag).is_none() {
            return Ok(None);
        }
        let match_type = MatchType::from_lookup_flag(lookup_flag);
        let second_pos = match match_type.find_next(self.gdef_table(), glyphs, pos) {
            Some(second_pos) => second_pos,
            None => return Ok(None),
        };
        let first_glyph = glyphs[pos].glyph_index;
        let second_glyph = glyphs[second_pos].glyph_index;
        for pair_pos in subtables {
            if !pair_pos.covers(first_glyph) {
                continue;
            }
            if let Some((value_record1, value_record2)) =
                pair_pos.apply(first_glyph, second_glyph)?
            {
                state
                    .scaler
                    .adjust(value_record1, &mut state.positions[pos])?;
                state
                    .scaler
                    .adjust(value_record2, &mut state.positions[second_pos])?;
                let next_pos = if pair_pos.adjusts_second_glyph() {
                    second_pos + 1
                } else {
                    second_pos
                };
                return Ok(Some(next_pos));
            }
        }
        Ok(None)
    }

    fn cursive_pos(
        &self,
        subtables: &[CursivePos],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
    ) -> Result<Option<usize>, LayoutError> {
        if !fits_context(1, context_length) {
            state.cursive.reset();
            return Ok(None);
        }
        let item = &state.glyphs[pos];
        // ignored glyphs leave the chain intact
        let property = match check_property(self.gdef_table(), item, lookup_flag) {
            Some(property) => property,
            None => return Ok(None),
        };
        if property.is_mark() {
            state.cursive.reset();
            return Ok(None);
        }
        let glyph = item.glyph_index;
        let opt_entry_exit = subtables
            .iter()
            .map(|cursive_pos| cursive_pos.entry_exit(glyph))
            .find_map(|res| res.transpose())
            .transpose()?;
        let entry_exit = match opt_entry_exit {
            Some(entry_exit) => entry_exit,
            None => {
                state.cursive.reset();
                return Ok(None);
            }
        };

        if let (Some((last_pos, last_exit)), Some(entry_anchor)) =
            (state.cursive.last, &entry_exit.entry_anchor)
        {
            let entry = state.scaler.anchor(entry_anchor, glyph)?;
            if state.scaler.params.r2l {
                let position = &mut state.positions[pos];
                position.x_advance = entry.x() - last_exit.x();
                position.new_advance = true;
            } else {
                let last_position = &mut state.positions[last_pos];
                last_position.x_advance = last_exit.x() - entry.x();
                last_position.new_advance = true;
            }
            let last_y_pos = state.positions[last_pos].y_pos;
            state.positions[pos].y_pos = last_exit.y() - entry.y() + last_y_pos;
        }

        state.cursive.last = match entry_exit.exit_anchor {
            Some(ref exit_anchor) => Some((pos, state.scaler.anchor(exit_anchor, glyph)?)),
            None => None,
        };
        Ok(Some(pos + 1))
    }

    /// Find the glyph a mark at `pos` attaches to, skipping other marks.
    ///
    /// Returns its position and property.
    fn find_mark_target(
        &self,
        glyphs: &[GlyphItem],
        pos: usize,
    ) -> Option<(usize, GlyphProperty)> {
        glyphs[..pos]
            .iter()
            .enumerate()
            .rev()
            .map(|(index, item)| (index, glyph_property(self.gdef_table(), item)))
            .find(|(_index, property)| !property.is_mark())
    }

    fn mark_base_pos(
        &self,
        subtables: &[MarkBasePos],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
    ) -> Result<Option<usize>, LayoutError> {
        if !fits_context(1, context_length) || lookup_flag.contains(LookupFlag::IGNORE_BASE_GLYPHS) {
            return Ok(None);
        }
        let glyphs = state.glyphs;
        let mark_glyph = glyphs[pos].glyph_index;
        if check_property(self.gdef_table(), &glyphs[pos], lookup_flag).is_none() {
            return Ok(None);
        }
        for mark_base_pos in subtables {
            if !mark_base_pos.covers_mark(mark_glyph) {
                continue;
            }
            let (base_pos, property) = match self.find_mark_target(glyphs, pos) {
                Some(target) => target,
                None => return Ok(None),
            };
            // unclassified glyphs are taken as bases
            if property != GlyphProperty::BASE_GLYPH && !property.is_empty() {
                return Ok(None);
            }
            let base_glyph = glyphs[base_pos].glyph_index;
            return match mark_base_pos.apply(base_glyph, mark_glyph)? {
                Some((base_anchor, mark_anchor)) => {
                    let base_point = state.scaler.anchor(base_anchor, base_glyph)?;
                    let mark_point = state.scaler.anchor(mark_anchor, mark_glyph)?;
                    attach_mark(state, pos, base_pos, base_point, mark_point)?;
                    Ok(Some(pos + 1))
                }
                None => Ok(None),
            };
        }
        Ok(None)
    }

    fn mark_lig_pos(
        &self,
        subtables: &[MarkLigPos],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
    ) -> Result<Option<usize>, LayoutError> {
        if !fits_context(1, context_length) || lookup_flag.contains(LookupFlag::IGNORE_LIGATURES)
        {
            return Ok(None);
        }
        let glyphs = state.glyphs;
        let mark = &glyphs[pos];
        if check_property(self.gdef_table(), mark, lookup_flag).is_none() {
            return Ok(None);
        }
        for mark_lig_pos in subtables {
            if !mark_lig_pos.covers_mark(mark.glyph_index) {
                continue;
            }
            let (liga_pos, property) = match self.find_mark_target(glyphs, pos) {
                Some(target) => target,
                None => return Ok(None),
            };
            if property != GlyphProperty::LIGATURE {
                return Ok(None);
            }
            let ligature = &glyphs[liga_pos];
            let opt_component = if mark.lig_id != 0 && mark.lig_id == ligature.lig_id {
                Some(mark.component)
            } else {
                None
            };
            return match mark_lig_pos.apply(ligature.glyph_index, mark.glyph_index, opt_component)?
            {
                Some((liga_anchor, mark_anchor)) => {
                    let liga_point = state.scaler.anchor(liga_anchor, ligature.glyph_index)?;
                    let mark_point = state.scaler.anchor(mark_anchor, mark.glyph_index)?;
                    attach_mark(state, pos, liga_pos, liga_point, mark_point)?;
                    Ok(Some(pos + 1))
                }
                None => Ok(None),
            };
        }
        Ok(None)
    }

    fn mark_mark_pos(
        &self,
        subtables: &[MarkBasePos],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
    ) -> Result<Option<usize>, LayoutError> {
        if !fits_context(1, context_length) || lookup_flag.contains(LookupFlag::IGNORE_MARKS) {
            return Ok(None);
        }
        let glyphs = state.glyphs;
        let mark1_glyph = glyphs[pos].glyph_index;
        if check_property(self.gdef_table(), &glyphs[pos], lookup_flag).is_none() {
            return Ok(None);
        }
        for mark_mark_pos in subtables {
            if !mark_mark_pos.covers_mark(mark1_glyph) {
                continue;
            }
            // the previous glyph not ignored by the lookup must be the mark to attach to
            let match_type = MatchType::from_lookup_flag(lookup_flag);
            let mark2_pos = match match_type.find_prev(self.gdef_table(), glyphs, pos) {
                Some(mark2_pos) => mark2_pos,
                None => return Ok(None),
            };
            let property = glyph_property(self.gdef_table(), &glyphs[mark2_pos]);
            let mark_attachment_type = lookup_flag.mark_attachment_type();
            let attachable = if mark_attachment_type != 0 {
                property.bits() == mark_attachment_type
            } else {
                property.is_mark()
            };
            if !attachable {
                return Ok(None);
            }
            let mark2_glyph = glyphs[mark2_pos].glyph_index;
            return match mark_mark_pos.apply(mark2_glyph, mark1_glyph)? {
                Some((mark2_anchor, mark1_anchor)) => {
                    let mark2_point = state.scaler.anchor(mark2_anchor, mark2_glyph)?;
                    let mark1_point = state.scaler.anchor(mark1_anchor, mark1_glyph)?;
                    attach_mark(state, pos, mark2_pos, mark2_point, mark1_point)?;
                    Ok(Some(pos + 1))
                }
                None => Ok(None),
            };
        }
        Ok(None)
    }

    fn context_pos(
        &self,
        subtables: &[ContextLookup],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
        apply_context: ApplyContext,
    ) -> Result<Option<usize>, LayoutError> {
        let glyphs = state.glyphs;
        if check_property(self.gdef_table(), &glyphs[pos], lookup_flag).is_none() {
            return Ok(None);
        }
        let match_type = MatchType::from_lookup_flag(lookup_flag);
        for subtable in subtables {
            let opt_rule =
                subtable.find_rule(glyphs[pos].glyph_index, context_length, |match_context| {
                    match_context.matches(
                        self.gdef_table(),
                        match_type,
                        &glyphs[..pos],
                        glyphs,
                        pos,
                    )
                })?;
            if let Some(rule) = opt_rule {
                let next_pos = self.apply_rule(rule, match_type, state, pos, apply_context)?;
                return Ok(Some(next_pos));
            }
        }
        Ok(None)
    }

    fn chain_context_pos(
        &self,
        subtables: &[ChainContextLookup],
        lookup_flag: LookupFlag,
        state: &mut PosState<'_>,
        pos: usize,
        context_length: u16,
        apply_context: ApplyContext,
    ) -> Result<Option<usize>, LayoutError> {
        let glyphs = state.glyphs;
        if check_property(self.gdef_table(), &glyphs[pos], lookup_flag).is_none() {
            return Ok(None);
        }
        let match_type = MatchType::from_lookup_flag(lookup_flag);
        for subtable in subtables {
            let opt_rule =
                subtable.find_rule(glyphs[pos].glyph_index, context_length, |match_context| {
                    match_context.matches(
                        self.gdef_table(),
                        match_type,
                        &glyphs[..pos],
                        glyphs,
                        pos,
                    )
                })?;
            if let Some(rule) = opt_rule {
                let next_pos = self.apply_rule(rule, match_type, state, pos, apply_context)?;
                return Ok(Some(next_pos));
            }
        }
        Ok(None)
    }

    /// Run the nested lookups of a matched rule. Returns the position after the rule.
    fn apply_rule(
        &self,
        rule: RuleMatch<'_>,
        match_type: MatchType,
        state: &mut PosState<'_>,
        mut pos: usize,
        apply_context: ApplyContext,
    ) -> Result<usize, LayoutError> {
        let positions = rule.input_positions(self.gdef_table(), match_type, state.glyphs, pos);
        let last_position = match positions.last() {
            Some(&last_position) => last_position,
            None => return Ok(pos + 1),
        };
        let mut lookup_records = rule.lookup_records.iter().peekable();
        while pos <= last_position {
            let mut opt_lookup_record = None;
            while let Some(&&lookup_record) = lookup_records.peek() {
                match positions.get(usize::from(lookup_record.sequence_index)) {
                    Some(&position) if position == pos => {
                        opt_lookup_record = lookup_records.next();
                        break;
                    }
                    Some(&position) if position > pos => break,
                    _ => {
                        lookup_records.next();
                    }
                }
            }
            let opt_next_pos = match opt_lookup_record {
                Some(lookup_record) => {
                    let remaining = positions.iter().filter(|&&p| p >= pos).count();
                    self.apply_lookup(
                        usize::from(lookup_record.lookup_list_index),
                        state,
                        pos,
                        u16::try_from(remaining)?,
                        apply_context,
                    )?
                }
                None => None,
            };
            pos = opt_next_pos.unwrap_or(pos + 1);
        }
        Ok(pos)
    }
}

/// Place the mark at `pos` so its anchor meets the anchor of the glyph at `target_pos`.
fn attach_mark(
    state: &mut PosState<'_>,
    pos: usize,
    target_pos: usize,
    target_anchor: Vector2I,
    mark_anchor: Vector2I,
) -> Result<(), LayoutError> {
    let position = &mut state.positions[pos];
    position.x_pos = target_anchor.x() - mark_anchor.x();
    position.y_pos = target_anchor.y() - mark_anchor.y();
    position.x_advance = 0;
    position.y_advance = 0;
    position.back = u16::try_from(pos - target_pos)?;
    Ok(())
}

/// Load the `GPOS` table. Returns `Ok(None)` if the font has none.
pub fn load_gpos<F: FontTableProvider>(
    provider: &F,
    opt_gdef_table: Option<Rc<GdefTable>>,
) -> Result<Option<GposTable>, ParseError> {
    match provider.table_data(tag::GPOS)? {
        Some(gpos_data) => {
            let layout = ReadScope::new(&gpos_data).read::<LayoutTable<GPOS>>()?;
            GposTable::new(layout, opt_gdef_table).map(Some)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::write::{WriteBinary, WriteBuffer};
    use crate::tests::writer::{coverage_format1, layout_table, lookup, table, words, Field};

    struct Points(Vec<Vector2I>);

    impl GlyphOutlines for Points {
        fn contour_points(
            &mut self,
            _glyph: u16,
            _load_flags: u32,
        ) -> Result<Vec<Vector2I>, LayoutError> {
            Ok(self.0.clone())
        }
    }

    struct Metrics;

    impl MetricResolver for Metrics {
        fn metric_value(&mut self, metric_id: u16) -> Result<i32, LayoutError> {
            Ok(i32::from(metric_id) * 10)
        }
    }

    fn gpos_table(lookups: &[Vec<u8>], opt_gdef_table: Option<GdefTable>) -> GposTable {
        let lookup_indices = (0..lookups.len() as u16).collect::<Vec<_>>();
        let data = layout_table(&[(tag::LATN, &[])], &[(tag::KERN, &lookup_indices)], lookups);
        let layout = ReadScope::new(&data)
            .read::<LayoutTable<GPOS>>()
            .unwrap();
        let mut gpos_table = GposTable::new(layout, opt_gdef_table.map(Rc::new)).unwrap();
        gpos_table.add_feature(0, 1).unwrap();
        gpos_table
    }

    fn buffer(glyphs: &[u16]) -> GlyphBuffer {
        let mut buffer = GlyphBuffer::new();
        for (i, &glyph) in glyphs.iter().enumerate() {
            buffer.add_glyph(glyph, 1, i as u32);
        }
        buffer
    }

    fn position(
        gpos_table: &GposTable,
        buffer: &GlyphBuffer,
        params: &PositioningParams,
    ) -> Result<Vec<Position>, LayoutError> {
        let mut positions = Vec::new();
        gpos_table.apply_string(buffer, &mut positions, params, &mut NoOutlines, &mut Metrics)?;
        Ok(positions)
    }

    fn device_data(start_size: u16, deltas: &[i16]) -> Vec<u8> {
        let device = Device::from_deltas(start_size, 2, deltas).unwrap();
        let mut buffer = WriteBuffer::new();
        Device::write(&mut buffer, &device).unwrap();
        buffer.into_inner()
    }

    fn gdef_with_classes(glyphs: &[u16], classes: &[u16]) -> GdefTable {
        let mut gdef_table = GdefTable::new_synthesized();
        gdef_table
            .build_class_definition(1000, glyphs, classes)
            .unwrap();
        gdef_table
    }

    #[test]
    fn single_pos_scaled_with_device() {
        let single_pos = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[3])),
            Field::Word(0x0044),
            Field::Int(-20),
            Field::Offset(device_data(12, &[1])),
        ]);
        let gpos_table = gpos_table(&[lookup(1, 0, &[single_pos])], None);
        let buffer = buffer(&[3, 4]);

        let params = PositioningParams {
            x_scale: 0x8000,
            ..PositioningParams::default()
        };
        let positions = position(&gpos_table, &buffer, &params).unwrap();
        assert_eq!(positions[0].x_advance, -10);
        assert_eq!(positions[1], Position::default());

        let params = PositioningParams {
            x_ppem: 12,
            dvi: false,
            ..PositioningParams::default()
        };
        let positions = position(&gpos_table, &buffer, &params).unwrap();
        assert_eq!(positions[0].x_advance, -20 + 64);
    }

    #[test]
    fn value_record_metric_ids() {
        let single_pos = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[3])),
            Field::Word(0x0400),
            Field::Word(7),
        ]);
        let gpos_table = gpos_table(&[lookup(1, 0, &[single_pos])], None);
        let buffer = buffer(&[3]);
        let positions = position(&gpos_table, &buffer, &PositioningParams::default()).unwrap();
        assert_eq!(positions[0].x_advance, 70);

        let mut positions = Vec::new();
        assert_eq!(
            gpos_table.apply_string(
                &buffer,
                &mut positions,
                &PositioningParams::default(),
                &mut NoOutlines,
                &mut NoMetrics
            ),
            Err(LayoutError::NoMultipleMasterInterpreter)
        );
    }

    #[test]
    fn pair_pos_skips_marks() {
        let pairset = words(&[1, 21, (-50i16) as u16, 0]);
        let pair_pos = table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[10])),
            Field::Word(0x0004),
            Field::Word(0x0001),
            Field::Word(1),
            Field::Offset(pairset),
        ]);
        let gdef_table = gdef_with_classes(&[30], &[3]);
        let gpos_table = gpos_table(&[lookup(2, 0x0008, &[pair_pos])], Some(gdef_table));
        let buffer = buffer(&[10, 30, 21, 10]);
        let positions = position(&gpos_table, &buffer, &PositioningParams::default()).unwrap();
        assert_eq!(positions[0].x_advance, -50);
        assert_eq!(positions[1], Position::default());
        assert_eq!(positions[2], Position::default());
        assert_eq!(positions[3], Position::default());
    }

    fn anchor(x: i16, y: i16) -> Field {
        Field::Offset(table(&[Field::Word(1), Field::Int(x), Field::Int(y)]))
    }

    // glyph 4 exits at (500, 100), glyph 5 enters at (20, 30)
    fn cursive_subtable() -> Vec<u8> {
        table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[4, 5])),
            Field::Word(2),
            Field::Null,
            anchor(500, 100),
            anchor(20, 30),
            Field::Null,
        ])
    }

    #[test]
    fn cursive_chain() {
        let gpos_table = gpos_table(&[lookup(3, 0, &[cursive_subtable()])], None);
        let buffer = buffer(&[4, 5]);

        let positions = position(&gpos_table, &buffer, &PositioningParams::default()).unwrap();
        assert_eq!(positions[0].x_advance, 480);
        assert!(positions[0].new_advance);
        assert_eq!(positions[1].y_pos, 70);

        let params = PositioningParams {
            r2l: true,
            ..PositioningParams::default()
        };
        let positions = position(&gpos_table, &buffer, &params).unwrap();
        assert_eq!(positions[0], Position::default());
        assert_eq!(positions[1].x_advance, -480);
        assert!(positions[1].new_advance);
    }

    #[test]
    fn cursive_chain_broken_by_uncovered_glyph() {
        let gpos_table = gpos_table(&[lookup(3, 0, &[cursive_subtable()])], None);
        let buffer = buffer(&[4, 9, 5]);
        let positions = position(&gpos_table, &buffer, &PositioningParams::default()).unwrap();
        assert!(positions.iter().all(|position| *position == Position::default()));
    }

    fn mark_mark_subtable(anchor_format: Vec<u8>) -> Vec<u8> {
        let mark_array = table(&[
            Field::Word(1),
            Field::Word(0),
            Field::Offset(words(&[1, 0, 0])),
        ]);
        let mark2_array = table(&[Field::Word(1), Field::Offset(anchor_format)]);
        table(&[
            Field::Word(1),
            Field::Offset(coverage_format1(&[41])),
            Field::Offset(coverage_format1(&[40])),
            Field::Word(1),
            Field::Offset(mark_array),
            Field::Offset(mark2_array),
        ])
    }

    #[test]
    fn mark_to_mark_with_contour_point() {
        let gdef_table = gdef_with_classes(&[40, 41], &[3, 3]);
        let gpos_table = gpos_table(
            &[lookup(6, 0, &[mark_mark_subtable(words(&[2, 5, 6, 1]))])],
            Some(gdef_table),
        );
        let buffer = buffer(&[40, 41]);

        let positions = position(&gpos_table, &buffer, &PositioningParams::default()).unwrap();
        assert_eq!((positions[1].x_pos, positions[1].y_pos), (5, 6));
        assert_eq!(positions[1].back, 1);

        let params = PositioningParams {
            dvi: false,
            ..PositioningParams::default()
        };
        let mut outline = Points(vec![vec2i(0, 0), vec2i(640, 1280)]);
        let mut positions = Vec::new();
        gpos_table
            .apply_string(&buffer, &mut positions, &params, &mut outline, &mut NoMetrics)
            .unwrap();
        assert_eq!((positions[1].x_pos, positions[1].y_pos), (640, 1280));

        let mut outline = Points(vec![vec2i(0, 0)]);
        assert_eq!(
            gpos_table.apply_string(&buffer, &mut positions, &params, &mut outline, &mut NoMetrics),
            Err(LayoutError::Parse(ParseError::BadIndex))
        );
    }

    #[test]
    fn mark_to_mark_needs_preceding_mark() {
        let gdef_table = gdef_with_classes(&[40, 41], &[1, 3]);
        let gpos_table = gpos_table(
            &[lookup(6, 0, &[mark_mark_subtable(words(&[1, 5, 6]))])],
            Some(gdef_table),
        );
        let buffer = buffer(&[40, 41]);
        let positions = position(&gpos_table, &buffer, &PositioningParams::default()).unwrap();
        assert_eq!(positions[1], Position::default());
    }

    #[test]
    fn empty_buffer_is_invalid() {
        let gpos_table = gpos_table(&[], None);
        let mut positions = Vec::new();
        assert_eq!(
            gpos_table.apply_string(
                &GlyphBuffer::new(),
                &mut positions,
                &PositioningParams::default(),
                &mut NoOutlines,
                &mut NoMetrics
            ),
            Err(LayoutError::InvalidArgument)
        );
    }
}
