//! The type model shared by the loader, the formatter and the layout analyzer.
//!
//! Metadata rows are translated into [`TypeDefinition`]s owned by a [`TypeRegistry`]; field
//! types and requested types are expressed as [`TypeDescriptor`] values, a closed sum type
//! the formatter and analyzer match on exhaustively.
//!
//! # Examples
//!
//! ```rust
//! use layoutscope::typesystem::{corelib, Primitive, TypeDescriptor, TypeRegistry};
//!
//! let mut registry = TypeRegistry::new();
//! let guid = corelib::resolve(&mut registry, "System.Guid").unwrap();
//! assert!(guid.is_value_type());
//! assert_eq!(
//!     corelib::resolve(&mut registry, "System.Int32"),
//!     Some(TypeDescriptor::Primitive(Primitive::Int32))
//! );
//! ```

pub mod corelib;
mod descriptor;
mod primitives;
mod registry;

pub use descriptor::{DefId, TypeCategory, TypeDescriptor, TypeHandle};
pub use primitives::Primitive;
pub use registry::{FieldDefinition, LayoutKind, TypeDefinition, TypeRegistry};
