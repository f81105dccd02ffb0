//! The glyph stream that GSUB and GPOS lookups are applied to.
//!
//! Substitution reads from the input string and appends to the output string. At the end of
//! every lookup pass the two are swapped, so the output of one lookup is the input of the next.
//! Positioning leaves the glyphs alone and fills in a parallel array of [`Position`]s.

use std::cell::Cell;

use crate::error::LayoutError;
use crate::gdef::GlyphProperty;

/// Passed as `component` or `lig_id` to take the value from the current input glyph.
pub const INHERIT: u16 = 0xFFFF;

/// A glyph together with the metadata that travels with it through the lookups.
#[derive(Clone, Debug)]
pub struct GlyphItem {
    pub glyph_index: u16,
    /// Activation bits, matched against the bits of each lookup.
    pub properties: u32,
    pub cluster: u32,
    /// Index of the ligature component this glyph belongs to.
    pub component: u16,
    /// Identifies the ligature this glyph was formed into or attached to. Zero means none.
    pub lig_id: u16,
    pub(crate) gdef_property: Cell<Option<GlyphProperty>>,
}

/// Positioning adjustments for one glyph, in 26.6 pixels unless positioning is device
/// independent.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub x_pos: i32,
    pub y_pos: i32,
    pub x_advance: i32,
    pub y_advance: i32,
    /// The advance replaces the glyph's advance rather than adjusting it.
    pub new_advance: bool,
    /// Number of glyphs back to the glyph this one is attached to, if non-zero.
    pub back: u16,
}

pub struct GlyphBuffer {
    in_glyphs: Vec<GlyphItem>,
    out_glyphs: Vec<GlyphItem>,
    in_pos: usize,
    max_lig_id: u16,
}

impl GlyphItem {
    pub fn new(glyph_index: u16, properties: u32, cluster: u32) -> GlyphItem {
        GlyphItem {
            glyph_index,
            properties,
            cluster,
            component: 0,
            lig_id: 0,
            gdef_property: Cell::new(None),
        }
    }
}

impl GlyphBuffer {
    pub fn new() -> GlyphBuffer {
        GlyphBuffer {
            in_glyphs: Vec::new(),
            out_glyphs: Vec::new(),
            in_pos: 0,
            max_lig_id: 1,
        }
    }

    pub fn clear(&mut self) {
        self.in_glyphs.clear();
        self.out_glyphs.clear();
        self.in_pos = 0;
        self.max_lig_id = 1;
    }

    /// Append a glyph to the input string.
    pub fn add_glyph(&mut self, glyph_index: u16, properties: u32, cluster: u32) {
        self.in_glyphs
            .push(GlyphItem::new(glyph_index, properties, cluster));
    }

    pub fn len(&self) -> usize {
        self.in_glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_glyphs.is_empty()
    }

    pub fn in_glyphs(&self) -> &[GlyphItem] {
        &self.in_glyphs
    }

    pub fn out_glyphs(&self) -> &[GlyphItem] {
        &self.out_glyphs
    }

    pub fn in_pos(&self) -> usize {
        self.in_pos
    }

    /// The output position, which is always the length of the output string.
    pub fn out_pos(&self) -> usize {
        self.out_glyphs.len()
    }

    /// The input glyph at the current position.
    pub fn current(&self) -> Option<&GlyphItem> {
        self.in_glyphs.get(self.in_pos)
    }

    /// Replace `num_in` input glyphs starting at the current position with `glyphs`.
    ///
    /// The new glyphs take the activation bits and cluster of the current input glyph.
    /// `component` and `lig_id` are used as given, unless [`INHERIT`].
    pub fn add_output_glyphs(
        &mut self,
        num_in: usize,
        glyphs: &[u16],
        component: u16,
        lig_id: u16,
    ) -> Result<(), LayoutError> {
        if self.in_pos + num_in > self.in_glyphs.len() {
            return Err(LayoutError::InvalidArgument);
        }
        let current = self
            .in_glyphs
            .get(self.in_pos)
            .ok_or(LayoutError::InvalidArgument)?;
        let component = if component == INHERIT {
            current.component
        } else {
            component
        };
        let lig_id = if lig_id == INHERIT {
            current.lig_id
        } else {
            lig_id
        };
        let properties = current.properties;
        let cluster = current.cluster;

        self.out_glyphs
            .extend(glyphs.iter().map(|&glyph_index| GlyphItem {
                glyph_index,
                properties,
                cluster,
                component,
                lig_id,
                gdef_property: Cell::new(None),
            }));
        self.in_pos += num_in;
        Ok(())
    }

    /// Replace the current input glyph with a single glyph.
    pub fn add_output_glyph(
        &mut self,
        glyph_index: u16,
        component: u16,
        lig_id: u16,
    ) -> Result<(), LayoutError> {
        self.add_output_glyphs(1, &[glyph_index], component, lig_id)
    }

    /// Move the current input glyph to the output unchanged.
    pub fn copy_output_glyph(&mut self) -> Result<(), LayoutError> {
        let item = self
            .in_glyphs
            .get(self.in_pos)
            .ok_or(LayoutError::InvalidArgument)?
            .clone();
        self.out_glyphs.push(item);
        self.in_pos += 1;
        Ok(())
    }

    /// Make the output string the new input string.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.in_glyphs, &mut self.out_glyphs);
        self.out_glyphs.clear();
        self.in_pos = 0;
    }

    pub fn allocate_lig_id(&mut self) -> u16 {
        let lig_id = self.max_lig_id;
        self.max_lig_id = self.max_lig_id.wrapping_add(1);
        lig_id
    }

    /// Substitute an input glyph in place, as reverse chaining substitution does.
    pub(crate) fn replace_in_glyph(&mut self, index: usize, glyph_index: u16) {
        if let Some(item) = self.in_glyphs.get_mut(index) {
            item.glyph_index = glyph_index;
            item.gdef_property.set(None);
        }
    }

    pub(crate) fn set_in_pos(&mut self, in_pos: usize) {
        self.in_pos = in_pos;
    }
}

impl Default for GlyphBuffer {
    fn default() -> Self {
        GlyphBuffer::new()
    }
}
