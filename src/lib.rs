#![warn(rust_2018_idioms)]

//! OpenType Layout: loading and applying the GDEF, GSUB and GPOS tables of a font.
//!
//! Tables are loaded from a [tables::FontTableProvider] with [gdef::load_gdef],
//! [gsub::load_gsub] and [gpos::load_gpos]. Glyphs are placed in a [buffer::GlyphBuffer],
//! features are activated on the loaded tables and then each table is applied to the buffer's
//! string.

/// Reading and writing of binary data.
pub mod binary;
pub mod buffer;
pub mod context;
pub mod error;
pub mod gdef;
pub mod gpos;
pub mod gsub;
pub mod layout;
pub mod size;
pub mod tables;
pub mod tag;
/// Shared test code.
#[cfg(test)]
pub mod tests;
