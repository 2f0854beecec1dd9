use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::tables::{RowReadable, TableId, TableInfo},
    Result,
};

/// A `Field` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRaw {
    /// Row id.
    pub rid: u32,
    /// `FieldAttributes` bits.
    pub flags: u16,
    /// `#Strings` index of the name.
    pub name: u32,
    /// `#Blob` index of the field signature.
    pub signature: u32,
}

impl RowReadable for FieldRaw {
    const TABLE_ID: TableId = TableId::Field;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldRaw {
            rid,
            flags: read_le_at::<u16>(data, offset)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

/// A `FieldPtr` row, present in unoptimized (`#-`) metadata to reorder the `Field` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPtrRaw {
    /// Row id.
    pub rid: u32,
    /// The `Field` row this entry stands for.
    pub field: u32,
}

impl RowReadable for FieldPtrRaw {
    const TABLE_ID: TableId = TableId::FieldPtr;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldPtrRaw {
            rid,
            field: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
        })
    }
}

/// A `FieldLayout` row: the explicit offset of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLayoutRaw {
    /// Row id.
    pub rid: u32,
    /// Byte offset of the field inside its instance.
    pub field_offset: u32,
    /// `Field` row.
    pub field: u32,
}

impl RowReadable for FieldLayoutRaw {
    const TABLE_ID: TableId = TableId::FieldLayout;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(FieldLayoutRaw {
            rid,
            field_offset: read_le_at::<u32>(data, offset)?,
            field: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
        })
    }
}

/// A `ClassLayout` row: `Pack` and `Size` of a `StructLayoutAttribute`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLayoutRaw {
    /// Row id.
    pub rid: u32,
    /// Requested packing (0 = default).
    pub packing_size: u16,
    /// Requested size (0 = unset).
    pub class_size: u32,
    /// `TypeDef` row the layout applies to.
    pub parent: u32,
}

impl RowReadable for ClassLayoutRaw {
    const TABLE_ID: TableId = TableId::ClassLayout;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(ClassLayoutRaw {
            rid,
            packing_size: read_le_at::<u16>(data, offset)?,
            class_size: read_le_at::<u32>(data, offset)?,
            parent: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::tables::MetadataTable;

    #[test]
    fn crafted_short() {
        let sizes = Arc::new(TableInfo::from_rows(
            &[(TableId::Field, 2), (TableId::TypeDef, 1)],
            false,
            false,
            false,
        ));

        let data = vec![0x06, 0x00, 0x0A, 0x00, 0x01, 0x00];
        let row = MetadataTable::<FieldRaw>::new(&data, 1, sizes.clone())
            .unwrap()
            .get(1)
            .unwrap();
        assert_eq!(row.flags, 0x0006);
        assert_eq!(row.name, 0x0A);
        assert_eq!(row.signature, 1);

        let data = vec![0x08, 0x00, 0x00, 0x00, 0x02, 0x00];
        let row = MetadataTable::<FieldLayoutRaw>::new(&data, 1, sizes.clone())
            .unwrap()
            .get(1)
            .unwrap();
        assert_eq!(row.field_offset, 8);
        assert_eq!(row.field, 2);

        let data = vec![0x01, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01, 0x00];
        let row = MetadataTable::<ClassLayoutRaw>::new(&data, 1, sizes)
            .unwrap()
            .get(1)
            .unwrap();
        assert_eq!(row.packing_size, 1);
        assert_eq!(row.class_size, 16);
        assert_eq!(row.parent, 1);
    }

    #[test]
    fn crafted_long() {
        let sizes = Arc::new(TableInfo::from_rows(&[(TableId::Field, 0x1_0000)], true, false, true));

        let data = vec![
            0x01, 0x00, // flags
            0x01, 0x02, 0x03, 0x04, // name
            0x05, 0x06, 0x07, 0x08, // signature
        ];
        let row = MetadataTable::<FieldRaw>::new(&data, 1, sizes.clone())
            .unwrap()
            .get(1)
            .unwrap();
        assert_eq!(row.name, 0x0403_0201);
        assert_eq!(row.signature, 0x0807_0605);

        let data = vec![0x02, 0x00, 0x01, 0x00];
        let row = MetadataTable::<FieldPtrRaw>::new(&data, 1, sizes)
            .unwrap()
            .get(1)
            .unwrap();
        assert_eq!(row.field, 0x0001_0002);
    }
}
