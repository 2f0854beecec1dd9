//! ECMA-335 metadata reading.
//!
//! The reader is deliberately narrow: it decodes what is needed to reconstruct the storage
//! layout of types (type definitions and references, fields and their signatures, layout
//! tables, nesting, generic parameters and native integer attributes) and skips the rest of
//! the tables stream using the generic row size computation of [`tables::TableInfo`].
//!
//! [`assembly::AssemblyMetadata`] is the entry point:
//!
//! ```rust,no_run
//! use layoutscope::metadata::assembly::AssemblyMetadata;
//! use std::path::Path;
//!
//! let metadata = AssemblyMetadata::from_path(Path::new("bin/Debug/net8.0/MyLib.dll"))?;
//! if let Some(rid) = metadata.find_type("MyLib.Point") {
//!     println!("{} has {} fields", metadata.full_name(rid), metadata.type_def(rid).map_or(0, |t| t.fields.len()));
//! }
//! # Ok::<(), layoutscope::Error>(())
//! ```

pub mod assembly;
pub mod cor20header;
pub mod customattributes;
pub mod flags;
pub mod root;
pub mod signatures;
pub mod streams;
pub mod tables;
pub mod token;
