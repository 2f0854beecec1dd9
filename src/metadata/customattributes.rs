//! Custom attribute value blobs (ECMA-335 II.23.3), restricted to the attributes that change
//! how a field type is displayed.
//!
//! `System.Runtime.CompilerServices.NativeIntegerAttribute` marks `IntPtr`/`UIntPtr`
//! occurrences that were written as `nint`/`nuint` in source. Its parameterless constructor
//! means "every occurrence"; the `bool[]` constructor carries one flag per occurrence in
//! left-to-right order.

use crate::{file::parser::Parser, Result};

/// Namespace of the compiler-generated attributes.
pub const COMPILER_SERVICES_NAMESPACE: &str = "System.Runtime.CompilerServices";
/// Name of the native integer attribute.
pub const NATIVE_INTEGER_ATTRIBUTE: &str = "NativeIntegerAttribute";

const PROLOG: u16 = 0x0001;

/// Decoded `NativeIntegerAttribute` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeIntegerFlags {
    /// Every `IntPtr`/`UIntPtr` occurrence is a native integer.
    All,
    /// One flag per occurrence, in traversal order.
    Positions(Vec<bool>),
}

impl NativeIntegerFlags {
    /// Expand into one flag per occurrence for a type with `occurrences` native-sized integers.
    #[must_use]
    pub fn expand(&self, occurrences: usize) -> Vec<bool> {
        match self {
            NativeIntegerFlags::All => vec![true; occurrences],
            NativeIntegerFlags::Positions(flags) => flags.clone(),
        }
    }
}

/// Decode the value blob of a `NativeIntegerAttribute`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the prolog is wrong and
/// [`crate::Error::OutOfBounds`] if the flag array is truncated.
pub fn parse_native_integer_flags(blob: &[u8]) -> Result<NativeIntegerFlags> {
    let mut parser = Parser::new(blob);

    let prolog = parser.read_le::<u16>()?;
    if prolog != PROLOG {
        return Err(malformed_error!(
            "Invalid custom attribute prolog - 0x{:04X}",
            prolog
        ));
    }

    // Parameterless constructor: prolog plus a zero named argument count
    if parser.remaining() <= 2 {
        return Ok(NativeIntegerFlags::All);
    }

    let count = parser.read_le::<u32>()?;
    if count == u32::MAX {
        return Ok(NativeIntegerFlags::All);
    }

    let bytes = parser.read_bytes(count as usize)?;
    Ok(NativeIntegerFlags::Positions(
        bytes.iter().map(|value| *value != 0).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameterless() {
        assert_eq!(
            parse_native_integer_flags(&[0x01, 0x00, 0x00, 0x00]).unwrap(),
            NativeIntegerFlags::All
        );
        assert_eq!(NativeIntegerFlags::All.expand(3), vec![true, true, true]);
    }

    #[test]
    fn flag_array() {
        let blob = [0x01, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00];
        let flags = parse_native_integer_flags(&blob).unwrap();
        assert_eq!(
            flags,
            NativeIntegerFlags::Positions(vec![true, false, true])
        );
        assert_eq!(flags.expand(5), vec![true, false, true]);
    }

    #[test]
    fn invalid() {
        assert!(parse_native_integer_flags(&[0x02, 0x00, 0x00, 0x00]).is_err());
        assert!(parse_native_integer_flags(&[0x01, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01]).is_err());
        assert!(parse_native_integer_flags(&[0x01]).is_err());
    }
}
