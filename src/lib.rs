// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # layoutscope
//!
//! Memory layout inspection for .NET types. Given a compiled assembly (or the project that
//! produces it) and a type name, `layoutscope` computes the type's size, the offset and size
//! of every field, nested value type fields and the padding the runtime inserts between and
//! after them, and renders type names as syntax-highlightable token runs.
//!
//! Everything is computed from ECMA-335 metadata without a .NET runtime: assemblies are read
//! with [`goblin`](https://docs.rs/goblin) and the CoreCLR field placement rules are emulated
//! for x86, x64 and Arm64.
//!
//! ## Features
//!
//! - **Layout analysis** - auto, sequential and explicit layout, packing, class size
//!   overrides, object headers, generic instantiations and nested value types
//! - **Padding** - synthetic padding rows at every nesting level
//! - **Tokenized names** - C# spelling of type names (`int?`, `List<string>[,]`, `Outer.Inner`)
//!   split into keyword, namespace, class, struct, enum, identifier and symbol runs
//! - **Sessions** - private copies of build outputs that are invalidated on rebuild
//! - **Worker protocol** - a long-lived worker process answering `path|type,assembly` requests
//!   with sentinel framed JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layoutscope::prelude::*;
//! use std::path::Path;
//!
//! let registry = SessionRegistry::new();
//! let target = AnalysisTarget::from_path(
//!     Path::new("bin/Debug/net8.0/MyLib.dll"),
//!     &BuildSettings::default(),
//! );
//! let session = registry.get_or_open(&SessionKey::new(target, Platform::X64))?;
//!
//! if let Some(layout) = session.load_and_analyze("MyLib", "MyLib.Packet")? {
//!     println!("{} is {} bytes", layout.name.value(), layout.total_size);
//!     for entry in layout.fields_with_paddings() {
//!         println!("{entry:?}");
//!     }
//! }
//! # Ok::<(), layoutscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - ECMA-335 metadata reading (CLI header, streams, tables, signatures)
//! - [`typesystem`] - type descriptors and the per-session type registry
//! - [`formatting`] - span buffers and the tokenized name formatter
//! - [`layout`] - runtime placement rules, the layout analyzer and padding synthesis
//! - [`session`] - build output resolution, private copies, change watching, load contexts
//! - [`protocol`] - worker process, request/response framing and the client runner
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust,no_run
//! use layoutscope::{metadata::assembly::AssemblyMetadata, Error};
//!
//! match AssemblyMetadata::from_path(std::path::Path::new("native.dll")) {
//!     Ok(_) => println!("Loaded"),
//!     Err(Error::NotSupported) => println!("Not a .NET assembly"),
//!     Err(Error::Malformed { message, .. }) => println!("Malformed: {message}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use layoutscope::prelude::*;
///
/// let mut analyzer = Analyzer::new(Platform::X64);
/// let mut registry = TypeRegistry::new();
/// let guid = layoutscope::typesystem::corelib::resolve(&mut registry, "System.Guid").unwrap();
/// let layout = analyzer.analyze(&registry, &guid)?;
/// # Ok::<(), layoutscope::Error>(())
/// ```
pub mod prelude;

/// ECMA-335 metadata reading: CLI header, metadata root, heaps, tables and signatures.
pub mod metadata;

/// Type descriptors, definitions and the registry they live in.
pub mod typesystem;

/// Span buffers, tokenized strings and the type name formatter.
pub mod formatting;

/// Runtime placement rules, layout analysis and padding synthesis.
///
/// # Examples
///
/// ```rust
/// use layoutscope::layout::{Analyzer, Platform};
/// use layoutscope::typesystem::{corelib, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// let guid = corelib::resolve(&mut registry, "System.Guid").unwrap();
///
/// let mut analyzer = Analyzer::new(Platform::X64);
/// let layout = analyzer.analyze(&registry, &guid)?.unwrap();
/// assert_eq!(layout.total_size, 16);
/// assert_eq!(layout.name.value(), "Guid");
/// # Ok::<(), layoutscope::Error>(())
/// ```
pub mod layout;

/// Analysis sessions over build outputs.
pub mod session;

/// The worker process protocol and its client.
pub mod protocol;

/// `layoutscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `layoutscope` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the variants and
/// which operations produce them.
pub use error::Error;

/// Raw PE file access.
///
/// See [`file::File`] for loading images from disk or memory.
pub use file::File;

/// Cursor over metadata bytes with ECMA-335 compressed integer decoding.
pub use file::parser::Parser;
