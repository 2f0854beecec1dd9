//! Built-in types with a fixed runtime representation.

use strum::{Display, EnumIter};

use crate::metadata::signatures::SignatureType;

/// The built-in types of the runtime.
///
/// `IntPtr`/`UIntPtr` are the only primitives whose display name is context dependent
/// (`nint`/`nuint` versus the raw struct name), see [`Primitive::is_native_integer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[allow(missing_docs)]
pub enum Primitive {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    IntPtr,
    UIntPtr,
    String,
    Object,
    TypedReference,
}

impl Primitive {
    /// Map a signature element type to a primitive.
    #[must_use]
    pub fn from_signature(signature: &SignatureType) -> Option<Primitive> {
        Some(match signature {
            SignatureType::Void => Primitive::Void,
            SignatureType::Boolean => Primitive::Boolean,
            SignatureType::Char => Primitive::Char,
            SignatureType::I1 => Primitive::SByte,
            SignatureType::U1 => Primitive::Byte,
            SignatureType::I2 => Primitive::Int16,
            SignatureType::U2 => Primitive::UInt16,
            SignatureType::I4 => Primitive::Int32,
            SignatureType::U4 => Primitive::UInt32,
            SignatureType::I8 => Primitive::Int64,
            SignatureType::U8 => Primitive::UInt64,
            SignatureType::R4 => Primitive::Single,
            SignatureType::R8 => Primitive::Double,
            SignatureType::I => Primitive::IntPtr,
            SignatureType::U => Primitive::UIntPtr,
            SignatureType::String => Primitive::String,
            SignatureType::Object => Primitive::Object,
            SignatureType::TypedByRef => Primitive::TypedReference,
            _ => return None,
        })
    }

    /// Map a full type name such as `System.Int32` to a primitive.
    #[must_use]
    pub fn from_full_name(full_name: &str) -> Option<Primitive> {
        let name = full_name.strip_prefix("System.")?;
        Some(match name {
            "Void" => Primitive::Void,
            "Boolean" => Primitive::Boolean,
            "Char" => Primitive::Char,
            "SByte" => Primitive::SByte,
            "Byte" => Primitive::Byte,
            "Int16" => Primitive::Int16,
            "UInt16" => Primitive::UInt16,
            "Int32" => Primitive::Int32,
            "UInt32" => Primitive::UInt32,
            "Int64" => Primitive::Int64,
            "UInt64" => Primitive::UInt64,
            "Single" => Primitive::Single,
            "Double" => Primitive::Double,
            "IntPtr" => Primitive::IntPtr,
            "UIntPtr" => Primitive::UIntPtr,
            "String" => Primitive::String,
            "Object" => Primitive::Object,
            "TypedReference" => Primitive::TypedReference,
            _ => return None,
        })
    }

    /// The `System` type name (`Int32`, `IntPtr`, ...).
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Primitive::Void => "Void",
            Primitive::Boolean => "Boolean",
            Primitive::Char => "Char",
            Primitive::SByte => "SByte",
            Primitive::Byte => "Byte",
            Primitive::Int16 => "Int16",
            Primitive::UInt16 => "UInt16",
            Primitive::Int32 => "Int32",
            Primitive::UInt32 => "UInt32",
            Primitive::Int64 => "Int64",
            Primitive::UInt64 => "UInt64",
            Primitive::Single => "Single",
            Primitive::Double => "Double",
            Primitive::IntPtr => "IntPtr",
            Primitive::UIntPtr => "UIntPtr",
            Primitive::String => "String",
            Primitive::Object => "Object",
            Primitive::TypedReference => "TypedReference",
        }
    }

    /// The language keyword, if the primitive has one independent of context.
    #[must_use]
    pub fn keyword(&self) -> Option<&'static str> {
        Some(match self {
            Primitive::Void => "void",
            Primitive::Boolean => "bool",
            Primitive::Char => "char",
            Primitive::SByte => "sbyte",
            Primitive::Byte => "byte",
            Primitive::Int16 => "short",
            Primitive::UInt16 => "ushort",
            Primitive::Int32 => "int",
            Primitive::UInt32 => "uint",
            Primitive::Int64 => "long",
            Primitive::UInt64 => "ulong",
            Primitive::Single => "float",
            Primitive::Double => "double",
            Primitive::String => "string",
            Primitive::Object => "object",
            Primitive::IntPtr | Primitive::UIntPtr | Primitive::TypedReference => return None,
        })
    }

    /// The native integer keyword (`nint`/`nuint`) for `IntPtr`/`UIntPtr`.
    #[must_use]
    pub fn native_keyword(&self) -> Option<&'static str> {
        match self {
            Primitive::IntPtr => Some("nint"),
            Primitive::UIntPtr => Some("nuint"),
            _ => None,
        }
    }

    /// `true` for `IntPtr` and `UIntPtr`.
    #[must_use]
    pub fn is_native_integer(&self) -> bool {
        matches!(self, Primitive::IntPtr | Primitive::UIntPtr)
    }

    /// `true` for the primitives stored as object references.
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(self, Primitive::String | Primitive::Object)
    }

    /// Storage size in bytes for a platform with the given pointer size.
    #[must_use]
    pub fn size(&self, pointer_size: u32) -> u32 {
        match self {
            Primitive::Void => 0,
            Primitive::Boolean | Primitive::SByte | Primitive::Byte => 1,
            Primitive::Char | Primitive::Int16 | Primitive::UInt16 => 2,
            Primitive::Int32 | Primitive::UInt32 | Primitive::Single => 4,
            Primitive::Int64 | Primitive::UInt64 | Primitive::Double => 8,
            Primitive::IntPtr | Primitive::UIntPtr | Primitive::String | Primitive::Object => {
                pointer_size
            }
            Primitive::TypedReference => pointer_size * 2,
        }
    }

    /// Field alignment in bytes; 8-byte values are only pointer aligned on 32-bit platforms.
    #[must_use]
    pub fn alignment(&self, pointer_size: u32) -> u32 {
        match self {
            Primitive::Void => 1,
            Primitive::TypedReference => pointer_size,
            _ => self.size(pointer_size).min(pointer_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn sizes() {
        assert_eq!(Primitive::Boolean.size(8), 1);
        assert_eq!(Primitive::Char.size(8), 2);
        assert_eq!(Primitive::Double.size(4), 8);
        assert_eq!(Primitive::Double.alignment(4), 4);
        assert_eq!(Primitive::Double.alignment(8), 8);
        assert_eq!(Primitive::IntPtr.size(4), 4);
        assert_eq!(Primitive::String.size(8), 8);
        assert_eq!(Primitive::TypedReference.size(8), 16);
    }

    #[test]
    fn names() {
        for primitive in Primitive::iter() {
            let full_name = format!("System.{}", primitive.type_name());
            assert_eq!(Primitive::from_full_name(&full_name), Some(primitive));
            assert_eq!(primitive.to_string(), primitive.type_name());
        }

        assert_eq!(Primitive::Int32.keyword(), Some("int"));
        assert_eq!(Primitive::IntPtr.keyword(), None);
        assert_eq!(Primitive::UIntPtr.native_keyword(), Some("nuint"));
        assert!(Primitive::from_full_name("System.Guid").is_none());
        assert!(Primitive::from_full_name("Int32").is_none());
    }

    #[test]
    fn signatures() {
        assert_eq!(
            Primitive::from_signature(&SignatureType::I),
            Some(Primitive::IntPtr)
        );
        assert_eq!(
            Primitive::from_signature(&SignatureType::TypedByRef),
            Some(Primitive::TypedReference)
        );
        assert!(Primitive::from_signature(&SignatureType::FnPtr).is_none());
    }
}
