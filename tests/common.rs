pub mod writer {
    //! Builders for the binary tables used in tests.
    //!
    #![allow(dead_code)]

    use std::convert::TryFrom;

    /// A field of a table under construction.
    ///
    /// `Offset` fields are resolved by `table`, which stores the referenced data after the
    /// fields and writes its position relative to the start of the table.
    #[derive(Clone)]
    pub enum Field {
        Word(u16),
        Int(i16),
        Tag(u32),
        Offset(Vec<u8>),
        Null,
        Offset32(Vec<u8>),
    }

    pub fn table(fields: &[Field]) -> Vec<u8> {
        let header_len: usize = fields
            .iter()
            .map(|field| match field {
                Field::Tag(_) | Field::Offset32(_) => 4,
                _ => 2,
            })
            .sum();
        let mut data = Vec::with_capacity(header_len);
        let mut children = Vec::new();
        for field in fields {
            match field {
                Field::Word(value) => data.extend(value.to_be_bytes()),
                Field::Int(value) => data.extend(value.to_be_bytes()),
                Field::Tag(tag) => data.extend(tag.to_be_bytes()),
                Field::Null => data.extend(0u16.to_be_bytes()),
                Field::Offset(child) => {
                    let offset = u16::try_from(header_len + children.len()).unwrap();
                    data.extend(offset.to_be_bytes());
                    children.extend_from_slice(child);
                }
                Field::Offset32(child) => {
                    let offset = u32::try_from(header_len + children.len()).unwrap();
                    data.extend(offset.to_be_bytes());
                    children.extend_from_slice(child);
                }
            }
        }
        data.extend(children);
        data
    }

    /// Encode a sequence of 16-bit values big-endian.
    pub fn words(values: &[u16]) -> Vec<u8> {
        values.iter().flat_map(|value| value.to_be_bytes()).collect()
    }

    pub fn coverage_format1(glyphs: &[u16]) -> Vec<u8> {
        let mut data = words(&[1, glyphs.len() as u16]);
        data.extend(words(glyphs));
        data
    }

    pub fn coverage_format2(ranges: &[(u16, u16, u16)]) -> Vec<u8> {
        let mut data = words(&[2, ranges.len() as u16]);
        for &(start, end, start_coverage_index) in ranges {
            data.extend(words(&[start, end, start_coverage_index]));
        }
        data
    }

    pub fn classdef_format1(start_glyph: u16, classes: &[u16]) -> Vec<u8> {
        let mut data = words(&[1, start_glyph, classes.len() as u16]);
        data.extend(words(classes));
        data
    }

    pub fn classdef_format2(ranges: &[(u16, u16, u16)]) -> Vec<u8> {
        let mut data = words(&[2, ranges.len() as u16]);
        for &(start, end, class) in ranges {
            data.extend(words(&[start, end, class]));
        }
        data
    }

    /// A Lookup table with its subtables stored after the header.
    pub fn lookup(lookup_type: u16, lookup_flag: u16, subtables: &[Vec<u8>]) -> Vec<u8> {
        let mut fields = vec![
            Field::Word(lookup_type),
            Field::Word(lookup_flag),
            Field::Word(subtables.len() as u16),
        ];
        fields.extend(subtables.iter().cloned().map(Field::Offset));
        table(&fields)
    }

    /// A GSUB or GPOS table.
    ///
    /// Every language system of every script, including the default one, lists all of
    /// `features` in order. Each feature is a tag and the lookup indices it activates.
    pub fn layout_table(
        scripts: &[(u32, &[u32])],
        features: &[(u32, &[u16])],
        lookups: &[Vec<u8>],
    ) -> Vec<u8> {
        let langsys = || {
            let mut fields = vec![
                Field::Word(0),
                Field::Word(0xFFFF),
                Field::Word(features.len() as u16),
            ];
            fields.extend((0..features.len() as u16).map(Field::Word));
            table(&fields)
        };

        let mut script_list = vec![Field::Word(scripts.len() as u16)];
        for &(script_tag, languages) in scripts {
            let mut script = vec![
                Field::Offset(langsys()),
                Field::Word(languages.len() as u16),
            ];
            for &language_tag in languages {
                script.push(Field::Tag(language_tag));
                script.push(Field::Offset(langsys()));
            }
            script_list.push(Field::Tag(script_tag));
            script_list.push(Field::Offset(table(&script)));
        }

        let mut feature_list = vec![Field::Word(features.len() as u16)];
        for &(feature_tag, lookup_indices) in features {
            let mut feature = vec![Field::Word(0), Field::Word(lookup_indices.len() as u16)];
            feature.extend(lookup_indices.iter().copied().map(Field::Word));
            feature_list.push(Field::Tag(feature_tag));
            feature_list.push(Field::Offset(table(&feature)));
        }

        let mut lookup_list = vec![Field::Word(lookups.len() as u16)];
        lookup_list.extend(lookups.iter().cloned().map(Field::Offset));

        table(&[
            Field::Word(1),
            Field::Word(0),
            Field::Offset(table(&script_list)),
            Field::Offset(table(&feature_list)),
            Field::Offset(table(&lookup_list)),
        ])
    }

    /// A version 1.0 GDEF table with optional glyph class and mark attachment class tables.
    pub fn gdef(glyph_classdef: Option<Vec<u8>>, mark_attach_classdef: Option<Vec<u8>>) -> Vec<u8> {
        let optional = |data: Option<Vec<u8>>| data.map(Field::Offset).unwrap_or(Field::Null);
        table(&[
            Field::Word(1),
            Field::Word(0),
            optional(glyph_classdef),
            Field::Null,
            Field::Null,
            optional(mark_attach_classdef),
        ])
    }

    /// Wrap tables in a minimal TrueType font file.
    pub fn sfnt(tables: &[(u32, &[u8])]) -> Vec<u8> {
        let num_tables = tables.len() as u16;
        let mut data = Vec::new();
        data.extend(0x00010000u32.to_be_bytes());
        data.extend(words(&[num_tables, 0, 0, 0]));
        let mut offset = 12 + 16 * tables.len();
        for &(tag, table_data) in tables {
            data.extend(tag.to_be_bytes());
            data.extend(0u32.to_be_bytes()); // checksum
            data.extend((offset as u32).to_be_bytes());
            data.extend((table_data.len() as u32).to_be_bytes());
            offset += table_data.len();
        }
        for &(_tag, table_data) in tables {
            data.extend_from_slice(table_data);
        }
        data
    }
}
