use crate::{
    file::io::read_le_at_dyn,
    metadata::tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfo},
    Result,
};

/// A `MemberRef` row: a field or method of a type outside the current `TypeDef` table, or of
/// a constructed type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRefRaw {
    /// Row id.
    pub rid: u32,
    /// Declaring type (`TypeDef`, `TypeRef`, `TypeSpec`), `ModuleRef` or `MethodDef`.
    pub class: CodedIndex,
    /// `#Strings` index of the member name.
    pub name: u32,
    /// `#Blob` index of the member signature.
    pub signature: u32,
}

impl RowReadable for MemberRefRaw {
    const TABLE_ID: TableId = TableId::MemberRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            class: CodedIndex::read(data, offset, sizes, CodedIndexType::MemberRefParent)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

/// A `CustomAttribute` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomAttributeRaw {
    /// Row id.
    pub rid: u32,
    /// The annotated metadata item.
    pub parent: CodedIndex,
    /// The attribute constructor (`MethodDef` or `MemberRef`).
    pub constructor: CodedIndex,
    /// `#Blob` index of the encoded arguments.
    pub value: u32,
}

impl RowReadable for CustomAttributeRaw {
    const TABLE_ID: TableId = TableId::CustomAttribute;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            parent: CodedIndex::read(data, offset, sizes, CodedIndexType::HasCustomAttribute)?,
            constructor: CodedIndex::read(data, offset, sizes, CodedIndexType::CustomAttributeType)?,
            value: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}
