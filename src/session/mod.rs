//! Analysis sessions over build outputs.
//!
//! A [`SessionRegistry`] maps a [`SessionKey`] (the analyzed output plus the platform) to an
//! [`AnalysisSession`]. Each session copies the output directory to a private location, loads
//! assemblies from that copy through a [`LoadContext`], and watches the original so that a
//! rebuild invalidates it. The next request for the same key then opens a fresh session while
//! requests still holding the old one finish against the old copy.
//!
//! # Example
//!
//! ```rust,no_run
//! use layoutscope::layout::Platform;
//! use layoutscope::session::{AnalysisTarget, BuildSettings, SessionKey, SessionRegistry};
//! use std::path::Path;
//!
//! let registry = SessionRegistry::new();
//! let target = AnalysisTarget::from_path(
//!     Path::new("src/App/App.csproj"),
//!     &BuildSettings::default(),
//! );
//! let session = registry.get_or_open(&SessionKey::new(target, Platform::X64))?;
//! if let Some(layout) = session.load_and_analyze("App", "App.Models.Order")? {
//!     println!("{} bytes, {} padding", layout.total_size, layout.total_padding);
//! }
//! # Ok::<(), layoutscope::Error>(())
//! ```

mod analysis;
mod context;
mod project;
mod registry;
mod target;
mod typename;

pub use analysis::{AnalysisSession, SessionState};
pub use context::LoadContext;
pub use project::{
    parse_project_properties, read_project_properties, ProjectOutput, ProjectProperties,
    ResolvedOutput, ANY_CPU,
};
pub use registry::SessionRegistry;
pub use target::{AnalysisTarget, BuildSettings, SessionKey};
pub use typename::{TypeModifier, TypeName};
