mod common;

use std::rc::Rc;

use otlayout::binary::read::ReadScope;
use otlayout::buffer::GlyphBuffer;
use otlayout::context::MAX_NESTING_LEVEL;
use otlayout::error::LayoutError;
use otlayout::gdef::load_gdef;
use otlayout::gsub::{load_gsub, FirstAlternate, GsubTable};
use otlayout::layout::DEFAULT_LANGUAGE_INDEX;
use otlayout::tables::OffsetTableFontProvider;
use otlayout::tag;

use common::writer::{
    classdef_format2, coverage_format1, gdef, layout_table, lookup, sfnt, table, Field,
};

fn load(font: &[u8]) -> GsubTable {
    let provider = OffsetTableFontProvider::new(ReadScope::new(font)).unwrap();
    let opt_gdef_table = load_gdef(&provider).unwrap().map(Rc::new);
    load_gsub(&provider, opt_gdef_table).unwrap().unwrap()
}

fn buffer(glyphs: &[u16]) -> GlyphBuffer {
    let mut buffer = GlyphBuffer::new();
    for (i, &glyph) in glyphs.iter().enumerate() {
        buffer.add_glyph(glyph, 1, i as u32);
    }
    buffer
}

fn glyph_indices(buffer: &GlyphBuffer) -> Vec<u16> {
    buffer
        .in_glyphs()
        .iter()
        .map(|item| item.glyph_index)
        .collect()
}

// f + i -> fi
fn ligature_subtable() -> Vec<u8> {
    let ligature = table(&[Field::Word(100), Field::Word(2), Field::Word(2)]);
    let ligature_set = table(&[Field::Word(1), Field::Offset(ligature)]);
    table(&[
        Field::Word(1),
        Field::Offset(coverage_format1(&[1])),
        Field::Word(1),
        Field::Offset(ligature_set),
    ])
}

fn ligature_font() -> Vec<u8> {
    let gsub_data = layout_table(
        &[(tag::LATN, &[])],
        &[(tag::LIGA, &[0])],
        &[lookup(4, 0x0008, &[ligature_subtable()])],
    );
    let gdef_data = gdef(Some(classdef_format2(&[(1, 2, 1), (30, 30, 3)])), None);
    sfnt(&[(tag::GDEF, &gdef_data), (tag::GSUB, &gsub_data)])
}

#[test]
fn ligature_from_font() {
    let font = ligature_font();
    let mut gsub_table = load(&font);
    assert!(gsub_table.gdef_table().is_some());
    let layout = gsub_table.layout();
    let script_index = layout.select_script(tag::LATN).unwrap();
    let feature_index = layout
        .select_feature(tag::LIGA, script_index, DEFAULT_LANGUAGE_INDEX)
        .unwrap()
        .unwrap();
    gsub_table.add_feature(feature_index, 1).unwrap();

    let mut buffer = buffer(&[1, 30, 2, 3]);
    gsub_table
        .apply_string(&mut buffer, &mut FirstAlternate)
        .unwrap();
    assert_eq!(glyph_indices(&buffer), vec![100, 30, 3]);

    let items = buffer.in_glyphs();
    assert_ne!(items[0].lig_id, 0);
    // the skipped mark follows the first component
    assert_eq!(items[1].lig_id, items[0].lig_id);
    assert_eq!(items[1].component, 0);
    assert_eq!(items[2].lig_id, 0);
}

#[test]
fn uncovered_input_is_unchanged() {
    let font = ligature_font();
    let mut gsub_table = load(&font);
    gsub_table.add_feature(0, 1).unwrap();

    let glyphs = [3, 2, 1, 4];
    let mut buffer = buffer(&glyphs);
    gsub_table
        .apply_string(&mut buffer, &mut FirstAlternate)
        .unwrap();
    assert_eq!(glyph_indices(&buffer), glyphs);

    gsub_table
        .apply_string(&mut buffer, &mut FirstAlternate)
        .unwrap();
    assert_eq!(glyph_indices(&buffer), glyphs);
    assert!(buffer.in_glyphs().iter().all(|item| item.lig_id == 0));
}

#[test]
fn font_without_gsub() {
    let gdef_data = gdef(None, None);
    let font = sfnt(&[(tag::GDEF, &gdef_data)]);
    let provider = OffsetTableFontProvider::new(ReadScope::new(&font)).unwrap();
    assert!(load_gsub(&provider, None).unwrap().is_none());
}

// A rule matching glyph 5 that applies lookup `lookup_index` to it.
fn chain_context_subtable(lookup_index: u16) -> Vec<u8> {
    table(&[
        Field::Word(3),
        Field::Word(0),
        Field::Word(1),
        Field::Offset(coverage_format1(&[5])),
        Field::Word(0),
        Field::Word(1),
        Field::Word(0),
        Field::Word(lookup_index),
    ])
}

fn gsub_font(lookups: &[Vec<u8>]) -> Vec<u8> {
    let gsub_data = layout_table(&[(tag::LATN, &[])], &[(tag::CALT, &[0])], lookups);
    sfnt(&[(tag::GSUB, &gsub_data)])
}

#[test]
fn nesting_depth_is_bounded() {
    // lookup 1 changes 5 to 6
    let single_subst = table(&[
        Field::Word(1),
        Field::Offset(coverage_format1(&[5])),
        Field::Int(1),
    ]);
    let font = gsub_font(&[
        lookup(6, 0, &[chain_context_subtable(1)]),
        lookup(1, 0, &[single_subst]),
    ]);

    let mut gsub_table = load(&font);
    gsub_table.add_feature(0, 1).unwrap();
    let mut glyphs = buffer(&[4, 5]);
    gsub_table
        .apply_string(&mut glyphs, &mut FirstAlternate)
        .unwrap();
    assert_eq!(glyph_indices(&glyphs), vec![4, 6]);

    gsub_table.set_max_nesting_level(2);
    let mut glyphs = buffer(&[4, 5]);
    gsub_table
        .apply_string(&mut glyphs, &mut FirstAlternate)
        .unwrap();
    assert_eq!(glyph_indices(&glyphs), vec![4, 6]);

    gsub_table.set_max_nesting_level(1);
    let mut glyphs = buffer(&[4, 5]);
    assert_eq!(
        gsub_table.apply_string(&mut glyphs, &mut FirstAlternate),
        Err(LayoutError::TooManyNestedContexts)
    );
}

#[test]
fn self_invoking_rule_fails() {
    let font = gsub_font(&[lookup(6, 0, &[chain_context_subtable(0)])]);

    for &max_nesting_level in &[1, 99, MAX_NESTING_LEVEL, 101] {
        let mut gsub_table = load(&font);
        gsub_table.add_feature(0, 1).unwrap();
        gsub_table.set_max_nesting_level(max_nesting_level);
        let mut glyphs = buffer(&[5]);
        assert_eq!(
            gsub_table.apply_string(&mut glyphs, &mut FirstAlternate),
            Err(LayoutError::TooManyNestedContexts)
        );
    }
}

#[test]
fn chain_backtrack_sees_earlier_substitutions() {
    // after 4, glyph 5 becomes 4
    let chain_context = table(&[
        Field::Word(3),
        Field::Word(1),
        Field::Offset(coverage_format1(&[4])),
        Field::Word(1),
        Field::Offset(coverage_format1(&[5])),
        Field::Word(0),
        Field::Word(1),
        Field::Word(0),
        Field::Word(1),
    ]);
    let single_subst = table(&[
        Field::Word(1),
        Field::Offset(coverage_format1(&[5])),
        Field::Int(-1),
    ]);
    let font = gsub_font(&[
        lookup(6, 0, &[chain_context]),
        lookup(1, 0, &[single_subst]),
    ]);
    let mut gsub_table = load(&font);
    gsub_table.add_feature(0, 1).unwrap();

    // each substituted glyph is the backtrack of the next one
    let mut glyphs = buffer(&[4, 5, 5, 5]);
    gsub_table
        .apply_string(&mut glyphs, &mut FirstAlternate)
        .unwrap();
    assert_eq!(glyph_indices(&glyphs), vec![4, 4, 4, 4]);

    let mut glyphs = buffer(&[3, 5, 5]);
    gsub_table
        .apply_string(&mut glyphs, &mut FirstAlternate)
        .unwrap();
    assert_eq!(glyph_indices(&glyphs), vec![3, 5, 5]);
}
