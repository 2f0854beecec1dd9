use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::tables::{RowReadable, TableId, TableInfo},
    Result,
};

/// The single `Assembly` row of a manifest module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRaw {
    /// Row id.
    pub rid: u32,
    /// Hash algorithm id.
    pub hash_alg_id: u32,
    /// Version as (major, minor, build, revision).
    pub version: [u16; 4],
    /// `AssemblyFlags` bits.
    pub flags: u32,
    /// `#Blob` index of the public key.
    pub public_key: u32,
    /// `#Strings` index of the simple name.
    pub name: u32,
    /// `#Strings` index of the culture.
    pub culture: u32,
}

impl RowReadable for AssemblyRaw {
    const TABLE_ID: TableId = TableId::Assembly;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            hash_alg_id: read_le_at::<u32>(data, offset)?,
            version: [
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
            ],
            flags: read_le_at::<u32>(data, offset)?,
            public_key: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            culture: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

/// An `AssemblyRef` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRefRaw {
    /// Row id.
    pub rid: u32,
    /// Version as (major, minor, build, revision).
    pub version: [u16; 4],
    /// `AssemblyFlags` bits.
    pub flags: u32,
    /// `#Blob` index of the public key or token.
    pub public_key_or_token: u32,
    /// `#Strings` index of the simple name.
    pub name: u32,
    /// `#Strings` index of the culture.
    pub culture: u32,
    /// `#Blob` index of the hash value.
    pub hash_value: u32,
}

impl RowReadable for AssemblyRefRaw {
    const TABLE_ID: TableId = TableId::AssemblyRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            version: [
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
                read_le_at::<u16>(data, offset)?,
            ],
            flags: read_le_at::<u32>(data, offset)?,
            public_key_or_token: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            culture: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            hash_value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}
