//! Memory layout of types.
//!
//! - [`runtime`] emulates where the runtime places fields and how large instances are
//! - [`Analyzer`] turns those placements into a [`Layout`] tree with rendered names
//! - [`padding`] flattens a layout into rows with synthetic padding at every level

mod analyzer;
mod model;
pub mod padding;
pub mod runtime;

pub use analyzer::Analyzer;
pub use model::{unpadded_size, Field, Layout, Padding};
pub use padding::{fields_with_paddings, Entry, LayoutEntry};
pub use runtime::{Platform, RuntimeLayout};
pub use crate::typesystem::LayoutKind;
