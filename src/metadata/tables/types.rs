use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    metadata::{
        tables::{CodedIndex, CodedIndexType, RowReadable, TableId, TableInfo},
        token::Token,
    },
    Result,
};

/// A `TypeRef` row: a type defined in another module or assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRefRaw {
    /// Row id.
    pub rid: u32,
    /// `AssemblyRef`, `ModuleRef`, `Module` or enclosing `TypeRef`.
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the name.
    pub type_name: u32,
    /// `#Strings` index of the namespace.
    pub type_namespace: u32,
}

impl RowReadable for TypeRefRaw {
    const TABLE_ID: TableId = TableId::TypeRef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            resolution_scope: CodedIndex::read(data, offset, sizes, CodedIndexType::ResolutionScope)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

/// A `TypeDef` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDefRaw {
    /// Row id.
    pub rid: u32,
    /// Token of this definition.
    pub token: Token,
    /// `TypeAttributes` bits.
    pub flags: u32,
    /// `#Strings` index of the name.
    pub type_name: u32,
    /// `#Strings` index of the namespace.
    pub type_namespace: u32,
    /// Base type, nil for `System.Object`, interfaces and `<Module>`.
    pub extends: CodedIndex,
    /// First row of this type's run in the `Field` (or `FieldPtr`) table.
    pub field_list: u32,
    /// First row of this type's run in the `MethodDef` (or `MethodPtr`) table.
    pub method_list: u32,
}

impl RowReadable for TypeDefRaw {
    const TABLE_ID: TableId = TableId::TypeDef;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeDefRaw {
            rid,
            token: TableId::TypeDef.token(rid),
            flags: read_le_at::<u32>(data, offset)?,
            type_name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            type_namespace: read_le_at_dyn(data, offset, sizes.is_large_str())?,
            extends: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeDefOrRef)?,
            field_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::Field))?,
            method_list: read_le_at_dyn(data, offset, sizes.is_large(TableId::MethodDef))?,
        })
    }
}

/// A `TypeSpec` row: a constructed type stored as a signature blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpecRaw {
    /// Row id.
    pub rid: u32,
    /// `#Blob` index of the type signature.
    pub signature: u32,
}

impl RowReadable for TypeSpecRaw {
    const TABLE_ID: TableId = TableId::TypeSpec;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(TypeSpecRaw {
            rid,
            signature: read_le_at_dyn(data, offset, sizes.is_large_blob())?,
        })
    }
}

/// A `NestedClass` row linking a nested `TypeDef` to its enclosing `TypeDef`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedClassRaw {
    /// Row id.
    pub rid: u32,
    /// `TypeDef` row of the nested type.
    pub nested_class: u32,
    /// `TypeDef` row of the enclosing type.
    pub enclosing_class: u32,
}

impl RowReadable for NestedClassRaw {
    const TABLE_ID: TableId = TableId::NestedClass;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(NestedClassRaw {
            rid,
            nested_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
            enclosing_class: read_le_at_dyn(data, offset, sizes.is_large(TableId::TypeDef))?,
        })
    }
}

/// A `GenericParam` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericParamRaw {
    /// Row id.
    pub rid: u32,
    /// Zero-based position in the owner's parameter list.
    pub number: u16,
    /// `GenericParamAttributes` bits.
    pub flags: u16,
    /// Owning `TypeDef` or `MethodDef`.
    pub owner: CodedIndex,
    /// `#Strings` index of the name.
    pub name: u32,
}

impl RowReadable for GenericParamRaw {
    const TABLE_ID: TableId = TableId::GenericParam;

    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self> {
        Ok(GenericParamRaw {
            rid,
            number: read_le_at::<u16>(data, offset)?,
            flags: read_le_at::<u16>(data, offset)?,
            owner: CodedIndex::read(data, offset, sizes, CodedIndexType::TypeOrMethodDef)?,
            name: read_le_at_dyn(data, offset, sizes.is_large_str())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::tables::MetadataTable;

    #[test]
    fn typedef_short() {
        let data = vec![
            0x09, 0x01, 0x10, 0x00, // flags
            0x42, 0x00, // type_name
            0x43, 0x00, // type_namespace
            0x05, 0x00, // extends
            0x03, 0x00, // field_list
            0x04, 0x00, // method_list
        ];

        let sizes = Arc::new(TableInfo::from_rows(
            &[(TableId::TypeDef, 1), (TableId::Field, 1), (TableId::MethodDef, 1)],
            false,
            false,
            false,
        ));
        let table = MetadataTable::<TypeDefRaw>::new(&data, 1, sizes).unwrap();
        let row = table.get(1).unwrap();

        assert_eq!(row.token.value(), 0x0200_0001);
        assert_eq!(row.flags, 0x0010_0109);
        assert_eq!(row.type_name, 0x42);
        assert_eq!(row.type_namespace, 0x43);
        assert_eq!(row.extends.tag, TableId::TypeRef);
        assert_eq!(row.extends.row, 1);
        assert_eq!(row.field_list, 3);
        assert_eq!(row.method_list, 4);

        assert!(table.get(0).is_err());
        assert!(table.get(2).is_err());
    }

    #[test]
    fn typeref_and_nested() {
        let sizes = Arc::new(TableInfo::from_rows(
            &[(TableId::TypeRef, 2), (TableId::AssemblyRef, 1), (TableId::TypeDef, 2)],
            false,
            false,
            false,
        ));

        let data = vec![
            0x06, 0x00, 0x10, 0x00, 0x20, 0x00, // AssemblyRef 1
            0x07, 0x00, 0x30, 0x00, 0x00, 0x00, // TypeRef 1
        ];
        let table = MetadataTable::<TypeRefRaw>::new(&data, 2, sizes.clone()).unwrap();
        let rows = table.rows().unwrap();
        assert_eq!(rows[0].resolution_scope.tag, TableId::AssemblyRef);
        assert_eq!(rows[0].type_namespace, 0x20);
        assert_eq!(rows[1].resolution_scope.token.value(), 0x0100_0001);

        let data = vec![0x02, 0x00, 0x01, 0x00];
        let table = MetadataTable::<NestedClassRaw>::new(&data, 1, sizes).unwrap();
        let row = table.get(1).unwrap();
        assert_eq!(row.nested_class, 2);
        assert_eq!(row.enclosing_class, 1);
    }

    #[test]
    fn truncated() {
        let sizes = Arc::new(TableInfo::from_rows(&[(TableId::TypeSpec, 3)], false, false, false));
        assert!(MetadataTable::<TypeSpecRaw>::new(&[0x01, 0x00, 0x02, 0x00], 3, sizes).is_err());
    }
}
