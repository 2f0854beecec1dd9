//! Metadata tables (ECMA-335 II.22).
//!
//! [`TableInfo`] knows the row count of every table and derives the width of every column
//! kind from it, which is enough to compute the row size of *any* table. The table stream can
//! therefore be walked completely even though only the tables relevant for type layout have
//! typed row readers:
//!
//! - type identity: [`TypeDefRaw`], [`TypeRefRaw`], [`TypeSpecRaw`], [`NestedClassRaw`],
//!   [`GenericParamRaw`]
//! - field storage: [`FieldRaw`], [`FieldPtrRaw`], [`FieldLayoutRaw`], [`ClassLayoutRaw`]
//! - attributes: [`CustomAttributeRaw`], [`MemberRefRaw`]
//! - identity: [`AssemblyRaw`], [`AssemblyRefRaw`]

mod assembly;
mod attributes;
mod codedindex;
mod fields;
mod table;
mod tableinfo;
mod types;

pub use assembly::{AssemblyRaw, AssemblyRefRaw};
pub use attributes::{CustomAttributeRaw, MemberRefRaw};
pub use codedindex::{CodedIndex, CodedIndexType};
pub use fields::{ClassLayoutRaw, FieldLayoutRaw, FieldPtrRaw, FieldRaw};
pub use table::{MetadataTable, RowReadable};
pub use tableinfo::{TableInfo, TableInfoRef};
pub use types::{GenericParamRaw, NestedClassRaw, TypeDefRaw, TypeRefRaw, TypeSpecRaw};

use strum::{Display, EnumCount, EnumIter};

/// Identifiers of the ECMA-335 metadata tables that may appear in an assembly.
///
/// The discriminant is the table number used in tokens and in the `valid` bit vector of the
/// tables header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount, Display)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
}

impl TableId {
    /// Token for row `rid` of this table.
    #[must_use]
    pub fn token(self, rid: u32) -> crate::metadata::token::Token {
        crate::metadata::token::Token::from_parts(self as u8, rid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn ids_are_contiguous() {
        for (index, id) in TableId::iter().enumerate() {
            assert_eq!(id as usize, index);
        }
        assert_eq!(TableId::COUNT, 0x2D);
        assert_eq!(TableId::Field.token(3).value(), 0x0400_0003);
    }
}
