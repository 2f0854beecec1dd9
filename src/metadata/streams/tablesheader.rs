use std::sync::Arc;

use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// The `#~` (or uncompressed `#-`) tables stream header, plus the location of every table.
pub struct TablesHeader<'a> {
    /// Major schema version, 2 for current metadata.
    pub major_version: u8,
    /// Minor schema version.
    pub minor_version: u8,
    /// Bit vector of present tables.
    pub valid: u64,
    /// Bit vector of sorted tables.
    pub sorted: u64,
    /// Row counts and column widths.
    pub info: TableInfoRef,
    data: &'a [u8],
    tables: Vec<Option<usize>>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the tables stream header and locate every present table.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a table extends past the stream and
    /// [`crate::Error::Malformed`] if no table is present.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;
        let info = Arc::new(TableInfo::new(data, valid)?);

        let mut offset = 24 + valid.count_ones() as usize * 4;
        if heap_sizes & 0x40 != 0 {
            // Extra data after the row counts in edit-and-continue images
            offset += 4;
        }

        let mut tables = vec![None; TableId::iter().count()];
        for table_id in TableId::iter() {
            let rows = info.rows(table_id);
            if rows == 0 {
                continue;
            }

            let Some(size) = (rows as usize).checked_mul(info.row_size(table_id)) else {
                return Err(OutOfBounds);
            };
            if offset + size > data.len() {
                return Err(OutOfBounds);
            }

            tables[table_id as usize] = Some(offset);
            offset += size;
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            data,
            tables,
        })
    }

    /// `true` if `table` has at least one row.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.tables[table as usize].is_some()
    }

    /// Row count of `table`.
    #[must_use]
    pub fn table_row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Typed view of the table for row type `T`, `None` if the table is empty.
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> Option<MetadataTable<'a, T>> {
        let offset = self.tables[T::TABLE_ID as usize]?;
        MetadataTable::new(
            &self.data[offset..],
            self.info.rows(T::TABLE_ID),
            self.info.clone(),
        )
        .ok()
    }

    /// All rows of the table for row type `T`; empty if the table is absent.
    ///
    /// # Errors
    /// Returns an error if a row cannot be decoded.
    pub fn rows<T: RowReadable>(&self) -> Result<Vec<T>> {
        match self.table::<T>() {
            Some(table) => table.rows(),
            None => Ok(Vec::new()),
        }
    }
}
