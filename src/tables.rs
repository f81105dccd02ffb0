//! Locating tables inside an OpenType font file.

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::U32Be;
use crate::error::ParseError;
use crate::size;

use std::borrow::Cow;
use std::convert::TryFrom;

/// Magic value identifying a CFF font (`OTTO`)
pub const CFF_MAGIC: u32 = 0x4F54544F;

/// Magic number identifying TrueType 1.0
///
/// The version number 1.0 as a 16.16 fixed-point value, indicating TrueType glyph data.
pub const TTF_MAGIC: u32 = 0x00010000;

/// Source of raw table data.
///
/// The layout loaders only need table bytes by tag, so callers with their own font container
/// can implement this instead of going through `OffsetTable`.
pub trait FontTableProvider {
    /// Return data for the specified table if present
    fn table_data<'a>(&'a self, tag: u32) -> Result<Option<Cow<'a, [u8]>>, ParseError>;

    fn has_table(&self, tag: u32) -> bool;

    fn read_table_data<'a>(&'a self, tag: u32) -> Result<Cow<'a, [u8]>, ParseError> {
        self.table_data(tag)?.ok_or(ParseError::MissingTable(tag))
    }
}

/// OpenType Offset Table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>
#[derive(Clone)]
pub struct OffsetTable<'a> {
    pub sfnt_version: u32,
    pub search_range: u16,
    pub entry_selector: u16,
    pub range_shift: u16,
    pub table_records: ReadArray<'a, TableRecord>,
}

/// A `FontTableProvider` over a single font file held in memory.
pub struct OffsetTableFontProvider<'a> {
    scope: ReadScope<'a>,
    offset_table: OffsetTable<'a>,
}

/// An entry in the Offset Table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/otff#organization-of-an-opentype-font>
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Hash)]
pub struct TableRecord {
    pub table_tag: u32,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl ReadBinary for OffsetTable<'_> {
    type HostType<'a> = OffsetTable<'a>;

    fn read<'a>(ctxt: &mut ReadCtxt<'a>) -> Result<Self::HostType<'a>, ParseError> {
        let sfnt_version = ctxt.read_u32be()?;
        match sfnt_version {
            TTF_MAGIC | CFF_MAGIC => {
                let num_tables = ctxt.read_u16be()?;
                let search_range = ctxt.read_u16be()?;
                let entry_selector = ctxt.read_u16be()?;
                let range_shift = ctxt.read_u16be()?;
                let table_records = ctxt.read_array::<TableRecord>(usize::from(num_tables))?;
                Ok(OffsetTable {
                    sfnt_version,
                    search_range,
                    entry_selector,
                    range_shift,
                    table_records,
                })
            }
            _ => Err(ParseError::BadVersion),
        }
    }
}

impl<'a> OffsetTableFontProvider<'a> {
    /// Parse the offset table at the start of `scope`.
    pub fn new(scope: ReadScope<'a>) -> Result<Self, ParseError> {
        let offset_table = scope.read::<OffsetTable<'_>>()?;
        Ok(OffsetTableFontProvider {
            scope,
            offset_table,
        })
    }
}

impl<'a> FontTableProvider for OffsetTableFontProvider<'a> {
    fn table_data<'b>(&'b self, tag: u32) -> Result<Option<Cow<'b, [u8]>>, ParseError> {
        self.offset_table
            .read_table(&self.scope, tag)
            .map(|scope| scope.map(|scope| Cow::Borrowed(scope.data())))
    }

    fn has_table(&self, tag: u32) -> bool {
        self.offset_table.find_table_record(tag).is_some()
    }
}

impl ReadFrom for TableRecord {
    type ReadType = ((U32Be, U32Be), (U32Be, U32Be));

    fn read_from(((table_tag, checksum), (offset, length)): ((u32, u32), (u32, u32))) -> Self {
        TableRecord {
            table_tag,
            checksum,
            offset,
            length,
        }
    }
}

impl<'a> OffsetTable<'a> {
    pub fn find_table_record(&self, tag: u32) -> Option<TableRecord> {
        self.table_records
            .iter()
            .find(|table_record| table_record.table_tag == tag)
    }

    /// Locate the table with the given tag. Returns `None` if the font has no such table.
    pub fn read_table(
        &self,
        scope: &ReadScope<'a>,
        tag: u32,
    ) -> Result<Option<ReadScope<'a>>, ParseError> {
        match self.find_table_record(tag) {
            Some(table_record) => table_record.read_table(scope).map(Some),
            None => Ok(None),
        }
    }
}

impl TableRecord {
    pub const SIZE: usize = 4 * size::U32;

    pub fn read_table<'a>(&self, scope: &ReadScope<'a>) -> Result<ReadScope<'a>, ParseError> {
        let offset = usize::try_from(self.offset)?;
        let length = usize::try_from(self.length)?;
        scope.offset_length(offset, length)
    }
}

impl<T: FontTableProvider> FontTableProvider for Box<T> {
    fn table_data<'a>(&'a self, tag: u32) -> Result<Option<Cow<'a, [u8]>>, ParseError> {
        self.as_ref().table_data(tag)
    }

    fn has_table(&self, tag: u32) -> bool {
        self.as_ref().has_table(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::read::ReadScope;
    use crate::tag;
    use crate::tests::writer::sfnt;

    #[test]
    fn find_tables_by_tag() {
        let font = sfnt(&[(tag::GDEF, &[1, 2, 3, 4]), (tag::GSUB, &[5, 6])]);
        let provider = OffsetTableFontProvider::new(ReadScope::new(&font)).unwrap();

        assert!(provider.has_table(tag::GDEF));
        assert!(!provider.has_table(tag::GPOS));
        assert_eq!(
            provider.table_data(tag::GSUB).unwrap().as_deref(),
            Some(&[5u8, 6][..])
        );
        assert_eq!(provider.table_data(tag::GPOS).unwrap(), None);
        assert_eq!(
            provider.read_table_data(tag::GPOS),
            Err(ParseError::MissingTable(tag::GPOS))
        );
    }

    #[test]
    fn reject_unknown_sfnt_version() {
        let data = [0x74, 0x72, 0x75, 0x65, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(matches!(
            OffsetTableFontProvider::new(ReadScope::new(&data)),
            Err(ParseError::BadVersion)
        ));
    }
}
