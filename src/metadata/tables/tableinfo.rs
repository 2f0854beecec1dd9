use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{CodedIndexType, TableId},
    Error::{NotSupported, OutOfBounds},
    Result,
};

/// Row counts of all tables plus the heap index widths of one tables stream.
///
/// Column widths in ECMA-335 depend on the number of rows of the referenced tables, so this
/// structure is needed to compute row sizes and to read any row.
#[derive(Clone, Default, Debug)]
pub struct TableInfo {
    rows: Vec<u32>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Shared [`TableInfo`].
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Read the row counts from a tables stream header.
    ///
    /// `data` is the complete `#~` stream, `valid_bitvec` the bit vector of present tables.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row counts are truncated and
    /// [`crate::Error::NotSupported`] if tables beyond `GenericParamConstraint` are present.
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        if valid_bitvec >> TableId::COUNT != 0 {
            return Err(NotSupported);
        }

        let mut rows = vec![0_u32; TableId::COUNT];
        let mut next_row_offset = 24;

        for table_id in TableId::iter() {
            if (valid_bitvec & (1 << table_id as usize)) == 0 {
                continue;
            }

            if data.len() < next_row_offset + 4 {
                return Err(OutOfBounds);
            }

            rows[table_id as usize] = read_le_at::<u32>(data, &mut next_row_offset)?;
        }

        let heap_size_flags = read_le::<u8>(&data[6..])?;
        let mut table_info = TableInfo {
            rows,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        };

        table_info.calculate_coded_index_bytes();

        Ok(table_info)
    }

    /// Build a [`TableInfo`] from explicit row counts.
    #[must_use]
    pub fn from_rows(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_guid: bool,
        large_blob: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![0; TableId::COUNT],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for (table, rows) in valid_tables {
            table_info.rows[*table as usize] = *rows;
        }

        table_info.calculate_coded_index_bytes();
        table_info
    }

    fn calculate_coded_index_bytes(&mut self) {
        for coded_index_type in CodedIndexType::iter() {
            let max_rows = coded_index_type
                .tables()
                .iter()
                .map(|table| self.rows[*table as usize])
                .max()
                .unwrap_or(0);

            let limit = 1_u32 << (16 - coded_index_type.tag_bits());
            self.coded_indexes[coded_index_type as usize] = if max_rows < limit { 2 } else { 4 };
        }
    }

    /// Row count of `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize]
    }

    /// `true` if indices into `table` are 4 bytes wide.
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize] > u32::from(u16::MAX)
    }

    /// `true` if `#Strings` indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// `true` if `#Blob` indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Width of a `#Strings` index.
    #[must_use]
    pub fn str_bytes(&self) -> usize {
        if self.is_large_index_str {
            4
        } else {
            2
        }
    }

    /// Width of a `#GUID` index.
    #[must_use]
    pub fn guid_bytes(&self) -> usize {
        if self.is_large_index_guid {
            4
        } else {
            2
        }
    }

    /// Width of a `#Blob` index.
    #[must_use]
    pub fn blob_bytes(&self) -> usize {
        if self.is_large_index_blob {
            4
        } else {
            2
        }
    }

    /// Width of a simple index into `table`.
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> usize {
        if self.is_large(table) {
            4
        } else {
            2
        }
    }

    /// Width of a coded index of kind `coded_index_type`.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> usize {
        usize::from(self.coded_indexes[coded_index_type as usize])
    }

    /// Size in bytes of one row of `table`.
    #[must_use]
    #[rustfmt::skip]
    pub fn row_size(&self, table: TableId) -> usize {
        let string = self.str_bytes();
        let guid = self.guid_bytes();
        let blob = self.blob_bytes();
        let index = |table: TableId| self.table_index_bytes(table);
        let coded = |kind: CodedIndexType| self.coded_index_bytes(kind);

        match table {
            TableId::Module => 2 + string + guid * 3,
            TableId::TypeRef => coded(CodedIndexType::ResolutionScope) + string * 2,
            TableId::TypeDef => {
                4 + string * 2
                    + coded(CodedIndexType::TypeDefOrRef)
                    + index(TableId::Field)
                    + index(TableId::MethodDef)
            }
            TableId::FieldPtr => index(TableId::Field),
            TableId::Field => 2 + string + blob,
            TableId::MethodPtr => index(TableId::MethodDef),
            TableId::MethodDef => 4 + 2 + 2 + string + blob + index(TableId::Param),
            TableId::ParamPtr => index(TableId::Param),
            TableId::Param => 2 + 2 + string,
            TableId::InterfaceImpl => index(TableId::TypeDef) + coded(CodedIndexType::TypeDefOrRef),
            TableId::MemberRef => coded(CodedIndexType::MemberRefParent) + string + blob,
            TableId::Constant => 2 + coded(CodedIndexType::HasConstant) + blob,
            TableId::CustomAttribute => {
                coded(CodedIndexType::HasCustomAttribute)
                    + coded(CodedIndexType::CustomAttributeType)
                    + blob
            }
            TableId::FieldMarshal => coded(CodedIndexType::HasFieldMarshal) + blob,
            TableId::DeclSecurity => 2 + coded(CodedIndexType::HasDeclSecurity) + blob,
            TableId::ClassLayout => 2 + 4 + index(TableId::TypeDef),
            TableId::FieldLayout => 4 + index(TableId::Field),
            TableId::StandAloneSig => blob,
            TableId::EventMap => index(TableId::TypeDef) + index(TableId::Event),
            TableId::EventPtr => index(TableId::Event),
            TableId::Event => 2 + string + coded(CodedIndexType::TypeDefOrRef),
            TableId::PropertyMap => index(TableId::TypeDef) + index(TableId::Property),
            TableId::PropertyPtr => index(TableId::Property),
            TableId::Property => 2 + string + blob,
            TableId::MethodSemantics => {
                2 + index(TableId::MethodDef) + coded(CodedIndexType::HasSemantics)
            }
            TableId::MethodImpl => index(TableId::TypeDef) + coded(CodedIndexType::MethodDefOrRef) * 2,
            TableId::ModuleRef => string,
            TableId::TypeSpec => blob,
            TableId::ImplMap => {
                2 + coded(CodedIndexType::MemberForwarded) + string + index(TableId::ModuleRef)
            }
            TableId::FieldRVA => 4 + index(TableId::Field),
            TableId::EncLog => 4 + 4,
            TableId::EncMap => 4,
            TableId::Assembly => 4 + 2 * 4 + 4 + blob + string * 2,
            TableId::AssemblyProcessor => 4,
            TableId::AssemblyOS => 4 * 3,
            TableId::AssemblyRef => 2 * 4 + 4 + blob + string * 2 + blob,
            TableId::AssemblyRefProcessor => 4 + index(TableId::AssemblyRef),
            TableId::AssemblyRefOS => 4 * 3 + index(TableId::AssemblyRef),
            TableId::File => 4 + string + blob,
            TableId::ExportedType => 4 + 4 + string * 2 + coded(CodedIndexType::Implementation),
            TableId::ManifestResource => 4 + 4 + string + coded(CodedIndexType::Implementation),
            TableId::NestedClass => index(TableId::TypeDef) * 2,
            TableId::GenericParam => 2 + 2 + coded(CodedIndexType::TypeOrMethodDef) + string,
            TableId::MethodSpec => coded(CodedIndexType::MethodDefOrRef) + blob,
            TableId::GenericParamConstraint => {
                index(TableId::GenericParam) + coded(CodedIndexType::TypeDefOrRef)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_indexes() {
        let info = TableInfo::from_rows(
            &[(TableId::TypeDef, 10), (TableId::Field, 20)],
            false,
            false,
            false,
        );

        assert_eq!(info.rows(TableId::TypeDef), 10);
        assert_eq!(info.coded_index_bytes(CodedIndexType::TypeDefOrRef), 2);
        assert_eq!(info.row_size(TableId::TypeDef), 4 + 2 + 2 + 2 + 2 + 2);
        assert_eq!(info.row_size(TableId::Field), 6);
        assert_eq!(info.row_size(TableId::Assembly), 22);
        assert_eq!(info.row_size(TableId::AssemblyRef), 20);
        assert_eq!(info.row_size(TableId::ClassLayout), 8);
    }

    #[test]
    fn large_indexes() {
        // 2 tag bits leave 14 bits for the row: 0x4000 rows need a 4 byte coded index
        let info = TableInfo::from_rows(&[(TableId::TypeRef, 0x4000)], true, true, true);

        assert_eq!(info.coded_index_bytes(CodedIndexType::TypeDefOrRef), 4);
        assert_eq!(info.coded_index_bytes(CodedIndexType::HasFieldMarshal), 2);
        assert_eq!(info.table_index_bytes(TableId::TypeRef), 2);
        assert_eq!(info.row_size(TableId::Field), 2 + 4 + 4);
        assert_eq!(info.row_size(TableId::Module), 2 + 4 + 12);

        let info = TableInfo::from_rows(&[(TableId::Field, 0x1_0000)], false, false, false);
        assert!(info.is_large(TableId::Field));
        assert_eq!(info.row_size(TableId::FieldLayout), 8);
    }

    #[test]
    fn from_stream_header() {
        #[rustfmt::skip]
        let data = [
            0x00, 0x00, 0x00, 0x00,
            0x02, 0x00, 0x01, 0x01,
            0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x03, 0x00, 0x00, 0x00,
        ];

        let info = TableInfo::new(&data, 0x04).unwrap();
        assert_eq!(info.rows(TableId::TypeDef), 3);
        assert!(info.is_large_str());
        assert!(!info.is_large_blob());

        assert!(matches!(TableInfo::new(&data, 0x0C), Err(OutOfBounds)));
        assert!(matches!(TableInfo::new(&data, 1 << 0x30), Err(NotSupported)));
    }
}
