//! Field and type specification signatures (ECMA-335 II.23.2).
//!
//! Only the type grammar is decoded into [`SignatureType`]; method signatures are parsed just
//! far enough to skip function pointer types. Custom modifiers are consumed and dropped, as
//! they never affect storage size.

use crate::{file::parser::Parser, metadata::token::Token, Error::RecursionLimit, Result};

const MAX_RECURSION_DEPTH: usize = 50;

/// Element type constants (`ELEMENT_TYPE_*`).
#[allow(missing_docs)]
pub mod element_type {
    pub const VOID: u8 = 0x01;
    pub const BOOLEAN: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0A;
    pub const U8: u8 = 0x0B;
    pub const R4: u8 = 0x0C;
    pub const R8: u8 = 0x0D;
    pub const STRING: u8 = 0x0E;
    pub const PTR: u8 = 0x0F;
    pub const BYREF: u8 = 0x10;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const VAR: u8 = 0x13;
    pub const ARRAY: u8 = 0x14;
    pub const GENERICINST: u8 = 0x15;
    pub const TYPEDBYREF: u8 = 0x16;
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const FNPTR: u8 = 0x1B;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
    pub const MVAR: u8 = 0x1E;
    pub const CMOD_REQD: u8 = 0x1F;
    pub const CMOD_OPT: u8 = 0x20;
    pub const SENTINEL: u8 = 0x41;
    pub const PINNED: u8 = 0x45;
}

/// Leading byte of a field signature.
pub const FIELD_SIGNATURE: u8 = 0x06;

/// A type as written in a signature blob.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum SignatureType {
    Void,
    Boolean,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    I,
    U,
    String,
    Object,
    TypedByRef,
    /// `valuetype` followed by a `TypeDef`, `TypeRef` or `TypeSpec` token.
    ValueType(Token),
    /// `class` followed by a `TypeDef`, `TypeRef` or `TypeSpec` token.
    Class(Token),
    Ptr(Box<SignatureType>),
    ByRef(Box<SignatureType>),
    /// Function pointer; the method signature is not retained.
    FnPtr,
    /// Single-dimensional zero-based array.
    SzArray(Box<SignatureType>),
    /// General array with an explicit rank.
    Array {
        element: Box<SignatureType>,
        rank: u32,
    },
    GenericInst {
        /// `true` for `valuetype` generic definitions.
        is_value_type: bool,
        definition: Token,
        arguments: Vec<SignatureType>,
    },
    /// Generic parameter of the enclosing type.
    Var(u32),
    /// Generic parameter of the enclosing method.
    MVar(u32),
}

impl SignatureType {
    /// `true` for the built-in types with fixed runtime representation.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            SignatureType::ValueType(_)
                | SignatureType::Class(_)
                | SignatureType::Ptr(_)
                | SignatureType::ByRef(_)
                | SignatureType::FnPtr
                | SignatureType::SzArray(_)
                | SignatureType::Array { .. }
                | SignatureType::GenericInst { .. }
                | SignatureType::Var(_)
                | SignatureType::MVar(_)
        )
    }
}

/// Parse a field signature blob (`FIELD CustomMod* Type`).
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the blob is not a field signature or contains an
/// unknown element type.
pub fn parse_field_signature(data: &[u8]) -> Result<SignatureType> {
    let mut parser = Parser::new(data);

    let head = parser.read_le::<u8>()?;
    if head != FIELD_SIGNATURE {
        return Err(malformed_error!(
            "Invalid field signature header - 0x{:02X}",
            head
        ));
    }

    parse_type(&mut parser, 0)
}

/// Parse a `TypeSpec` signature blob.
///
/// # Errors
/// Same as [`parse_field_signature`].
pub fn parse_type_spec_signature(data: &[u8]) -> Result<SignatureType> {
    let mut parser = Parser::new(data);
    parse_type(&mut parser, 0)
}

fn skip_custom_mods(parser: &mut Parser<'_>) -> Result<()> {
    while parser.has_more_data() {
        match parser.peek_byte()? {
            element_type::CMOD_REQD | element_type::CMOD_OPT => {
                parser.advance_by(1)?;
                parser.read_compressed_token()?;
            }
            _ => break,
        }
    }

    Ok(())
}

fn parse_type(parser: &mut Parser<'_>, depth: usize) -> Result<SignatureType> {
    if depth >= MAX_RECURSION_DEPTH {
        return Err(RecursionLimit(MAX_RECURSION_DEPTH));
    }

    skip_custom_mods(parser)?;

    let current_byte = parser.read_le::<u8>()?;
    let parsed = match current_byte {
        element_type::VOID => SignatureType::Void,
        element_type::BOOLEAN => SignatureType::Boolean,
        element_type::CHAR => SignatureType::Char,
        element_type::I1 => SignatureType::I1,
        element_type::U1 => SignatureType::U1,
        element_type::I2 => SignatureType::I2,
        element_type::U2 => SignatureType::U2,
        element_type::I4 => SignatureType::I4,
        element_type::U4 => SignatureType::U4,
        element_type::I8 => SignatureType::I8,
        element_type::U8 => SignatureType::U8,
        element_type::R4 => SignatureType::R4,
        element_type::R8 => SignatureType::R8,
        element_type::I => SignatureType::I,
        element_type::U => SignatureType::U,
        element_type::STRING => SignatureType::String,
        element_type::OBJECT => SignatureType::Object,
        element_type::TYPEDBYREF => SignatureType::TypedByRef,
        element_type::PTR => SignatureType::Ptr(Box::new(parse_type(parser, depth + 1)?)),
        element_type::BYREF => SignatureType::ByRef(Box::new(parse_type(parser, depth + 1)?)),
        element_type::PINNED => return parse_type(parser, depth + 1),
        element_type::VALUETYPE => SignatureType::ValueType(parser.read_compressed_token()?),
        element_type::CLASS => SignatureType::Class(parser.read_compressed_token()?),
        element_type::VAR => SignatureType::Var(parser.read_compressed_uint()?),
        element_type::MVAR => SignatureType::MVar(parser.read_compressed_uint()?),
        element_type::SZARRAY => SignatureType::SzArray(Box::new(parse_type(parser, depth + 1)?)),
        element_type::ARRAY => {
            let element = parse_type(parser, depth + 1)?;
            let rank = parser.read_compressed_uint()?;

            let num_sizes = parser.read_compressed_uint()?;
            for _ in 0..num_sizes {
                parser.read_compressed_uint()?;
            }

            let num_lo_bounds = parser.read_compressed_uint()?;
            for _ in 0..num_lo_bounds {
                parser.read_compressed_int()?;
            }

            SignatureType::Array {
                element: Box::new(element),
                rank,
            }
        }
        element_type::GENERICINST => {
            let kind = parser.read_le::<u8>()?;
            let is_value_type = match kind {
                element_type::VALUETYPE => true,
                element_type::CLASS => false,
                _ => {
                    return Err(malformed_error!(
                        "GENERICINST - Next byte is not TYPE_CLASS or TYPE_VALUE - {}",
                        kind
                    ))
                }
            };

            let definition = parser.read_compressed_token()?;
            let arg_count = parser.read_compressed_uint()?;

            let mut arguments = Vec::with_capacity(arg_count.min(64) as usize);
            for _ in 0..arg_count {
                arguments.push(parse_type(parser, depth + 1)?);
            }

            SignatureType::GenericInst {
                is_value_type,
                definition,
                arguments,
            }
        }
        element_type::FNPTR => {
            skip_method_signature(parser, depth + 1)?;
            SignatureType::FnPtr
        }
        _ => {
            return Err(malformed_error!(
                "Unsupported ELEMENT_TYPE - {}",
                current_byte
            ))
        }
    };

    Ok(parsed)
}

fn skip_method_signature(parser: &mut Parser<'_>, depth: usize) -> Result<()> {
    const GENERIC: u8 = 0x10;

    let calling_convention = parser.read_le::<u8>()?;
    if calling_convention & GENERIC != 0 {
        parser.read_compressed_uint()?;
    }

    let param_count = parser.read_compressed_uint()?;
    parse_type(parser, depth)?;

    for _ in 0..param_count {
        if parser.peek_byte()? == element_type::SENTINEL {
            parser.advance_by(1)?;
        }
        parse_type(parser, depth)?;
    }

    Ok(())
}
