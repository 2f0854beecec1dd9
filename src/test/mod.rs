//! Shared test fixtures: a PE/metadata image builder and signature helpers.

mod scenarios;

use std::path::Path;

pub use image::{
    compress_uint, FieldSpec, ImageBuilder, TypeSpecBuilder, ENUM_REF, OBJECT_REF, VALUE_TYPE_REF,
};

/// Element type bytes used in field signatures.
pub mod element {
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
    pub const I: u8 = 0x18;
    pub const U: u8 = 0x19;
    pub const OBJECT: u8 = 0x1C;
    pub const SZARRAY: u8 = 0x1D;
}

fn coded(table_tag: u32, rid: u32) -> Vec<u8> {
    let mut out = Vec::new();
    compress_uint((rid << 2) | table_tag, &mut out);
    out
}

/// `valuetype` referencing a `TypeDef` row.
pub fn value_type_def(rid: u32) -> Vec<u8> {
    let mut signature = vec![element::VALUETYPE];
    signature.extend(coded(0, rid));
    signature
}

/// `valuetype` referencing a `TypeRef` row.
pub fn value_type_ref(rid: u32) -> Vec<u8> {
    let mut signature = vec![element::VALUETYPE];
    signature.extend(coded(1, rid));
    signature
}

/// `class` referencing a `TypeDef` row.
pub fn class_def(rid: u32) -> Vec<u8> {
    let mut signature = vec![element::CLASS];
    signature.extend(coded(0, rid));
    signature
}

/// `class` referencing a `TypeRef` row.
pub fn class_ref(rid: u32) -> Vec<u8> {
    let mut signature = vec![element::CLASS];
    signature.extend(coded(1, rid));
    signature
}

/// Generic instantiation of a `TypeDef` (`tag` 0) or `TypeRef` (`tag` 1) definition.
pub fn generic_inst(is_value_type: bool, tag: u32, rid: u32, arguments: &[Vec<u8>]) -> Vec<u8> {
    let mut signature = vec![
        element::GENERICINST,
        if is_value_type {
            element::VALUETYPE
        } else {
            element::CLASS
        },
    ];
    signature.extend(coded(tag, rid));
    compress_uint(arguments.len() as u32, &mut signature);
    for argument in arguments {
        signature.extend_from_slice(argument);
    }
    signature
}

/// Write an image into `directory` as `<name>.dll`.
pub fn write_assembly(directory: &Path, name: &str, image: &ImageBuilder) {
    image
        .write_to(&directory.join(format!("{name}.dll")))
        .unwrap();
}
