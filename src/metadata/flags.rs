//! Attribute flag words of `TypeDef` and `Field` rows.

use bitflags::bitflags;

bitflags! {
    /// `TypeAttributes` (ECMA-335 II.23.1.15).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TypeAttributes: u32 {
        /// Visibility bits.
        const VISIBILITY_MASK = 0x0000_0007;
        /// Layout bits.
        const LAYOUT_MASK = 0x0000_0018;
        /// Fields are laid out sequentially.
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Fields carry explicit offsets.
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// The type is an interface.
        const INTERFACE = 0x0000_0020;
        /// The type is abstract.
        const ABSTRACT = 0x0000_0080;
        /// The type cannot be derived from.
        const SEALED = 0x0000_0100;
        /// The name is special.
        const SPECIAL_NAME = 0x0000_0400;
        /// Static initialization can run before first field access.
        const BEFORE_FIELD_INIT = 0x0010_0000;

        const _ = !0;
    }
}

impl TypeAttributes {
    /// Layout bits only: `0` auto, `0x08` sequential, `0x10` explicit.
    #[must_use]
    pub fn layout(&self) -> u32 {
        self.bits() & Self::LAYOUT_MASK.bits()
    }

    /// `true` for interfaces.
    #[must_use]
    pub fn is_interface(&self) -> bool {
        self.contains(Self::INTERFACE)
    }
}

bitflags! {
    /// `FieldAttributes` (ECMA-335 II.23.1.5).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FieldAttributes: u16 {
        /// Accessibility bits.
        const ACCESS_MASK = 0x0007;
        /// Accessible to everyone (within the access mask).
        const PUBLIC = 0x0006;
        /// Per-type rather than per-instance.
        const STATIC = 0x0010;
        /// Assignable only in constructors.
        const INIT_ONLY = 0x0020;
        /// Compile-time constant, no storage.
        const LITERAL = 0x0040;
        /// Reserved by the runtime (`value__` of enums).
        const RT_SPECIAL_NAME = 0x0400;
        /// The field has an RVA.
        const HAS_FIELD_RVA = 0x0100;

        const _ = !0;
    }
}

impl FieldAttributes {
    /// `true` if the access bits are exactly `Public`.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.bits() & Self::ACCESS_MASK.bits() == Self::PUBLIC.bits()
    }

    /// `true` for instance fields that occupy storage in an object or value.
    #[must_use]
    pub fn is_instance(&self) -> bool {
        !self.intersects(Self::STATIC | Self::LITERAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_layout_bits() {
        assert_eq!(TypeAttributes::from_bits_retain(0x0010_0109).layout(), 0x08);
        assert_eq!(TypeAttributes::from_bits_retain(0x0000_0111).layout(), 0x10);
        assert!(TypeAttributes::from_bits_retain(0x00A1).is_interface());
    }

    #[test]
    fn field_access() {
        assert!(FieldAttributes::from_bits_retain(0x0006).is_public());
        // FamORAssem (0x05) shares bits with Public but is not public
        assert!(!FieldAttributes::from_bits_retain(0x0005).is_public());
        assert!(!FieldAttributes::from_bits_retain(0x0007).is_public());
        assert!(FieldAttributes::from_bits_retain(0x0001).is_instance());
        assert!(!FieldAttributes::from_bits_retain(0x0056).is_instance());
        assert!(!FieldAttributes::from_bits_retain(0x0011).is_instance());
    }
}
