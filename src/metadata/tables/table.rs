use std::marker::PhantomData;

use crate::{
    metadata::tables::{TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// Typed reader for the rows of one metadata table.
pub trait RowReadable: Sized {
    /// The table this row type belongs to.
    const TABLE_ID: TableId;

    /// Read one row at `offset`, advancing `offset` past it.
    ///
    /// # Errors
    /// Returns an error if the row is truncated or contains an invalid coded index.
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self>;
}

/// View over the rows of one table inside the tables stream.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: usize,
    sizes: TableInfoRef,
    _row: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a table view over `data`, which starts at the first row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than `row_count` rows.
    pub fn new(data: &'a [u8], row_count: u32, sizes: TableInfoRef) -> Result<Self> {
        let row_size = sizes.row_size(T::TABLE_ID);
        let Some(table_size) = (row_count as usize).checked_mul(row_size) else {
            return Err(OutOfBounds);
        };
        if table_size > data.len() {
            return Err(OutOfBounds);
        }

        Ok(MetadataTable {
            data: &data[..table_size],
            row_count,
            row_size,
            sizes,
            _row: PhantomData,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Size in bytes of one row.
    #[must_use]
    pub fn row_size(&self) -> usize {
        self.row_size
    }

    /// Read the row with 1-based id `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `rid` is 0 or past the end of the table.
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count {
            return Err(OutOfBounds);
        }

        let mut offset = (rid as usize - 1) * self.row_size;
        T::row_read(self.data, &mut offset, rid, &self.sizes)
    }

    /// Iterate over all rows in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.row_count).map(move |rid| self.get(rid))
    }

    /// Read all rows.
    ///
    /// # Errors
    /// Returns the first error encountered.
    pub fn rows(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }
}
