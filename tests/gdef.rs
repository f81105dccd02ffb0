mod common;

use otlayout::binary::read::ReadScope;
use otlayout::error::LayoutError;
use otlayout::gdef::{load_gdef, GdefTable, GlyphProperty};
use otlayout::tables::{FontTableProvider, OffsetTableFontProvider};
use otlayout::tag;

use common::writer::{classdef_format2, gdef, sfnt};

fn load(font: &[u8]) -> Option<GdefTable> {
    let provider = OffsetTableFontProvider::new(ReadScope::new(font)).unwrap();
    load_gdef(&provider).unwrap()
}

#[test]
fn load_from_font() {
    let gdef_data = gdef(
        Some(classdef_format2(&[(10, 10, 1), (20, 21, 3), (30, 30, 2)])),
        Some(classdef_format2(&[(21, 21, 2)])),
    );
    let font = sfnt(&[(tag::GDEF, &gdef_data)]);
    let gdef_table = load(&font).unwrap();

    assert_eq!(gdef_table.glyph_property(10), GlyphProperty::BASE_GLYPH);
    assert_eq!(gdef_table.glyph_property(20), GlyphProperty::MARK);
    assert_eq!(gdef_table.glyph_property(30), GlyphProperty::LIGATURE);
    assert_eq!(gdef_table.glyph_property(40), GlyphProperty::empty());

    // the attachment classes are only consulted once loaded
    assert_eq!(gdef_table.glyph_property(21), GlyphProperty::MARK);
    gdef_table.load_mark_attach_class_def().unwrap();
    assert_eq!(gdef_table.glyph_property(21).bits(), 0x0200);
    assert!(gdef_table.glyph_property(21).is_mark());
}

#[test]
fn font_without_gdef() {
    let font = sfnt(&[(tag::GSUB, &[0, 1, 0, 0])]);
    let provider = OffsetTableFontProvider::new(ReadScope::new(&font)).unwrap();
    assert!(provider.has_table(tag::GSUB));
    assert!(load_gdef(&provider).unwrap().is_none());
}

#[test]
fn loaded_class_definition_cannot_be_rebuilt() {
    let gdef_data = gdef(Some(classdef_format2(&[(10, 10, 1)])), None);
    let font = sfnt(&[(tag::GDEF, &gdef_data)]);
    let mut gdef_table = load(&font).unwrap();
    assert_eq!(
        gdef_table.build_class_definition(100, &[5], &[1]),
        Err(LayoutError::InvalidArgument)
    );
}
