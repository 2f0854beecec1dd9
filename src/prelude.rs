//! # layoutscope Prelude
//!
//! The most commonly used types of the layoutscope library. Import this module to get quick
//! access to everything needed to analyze a type, inspect its layout and talk to a worker.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all layoutscope operations
pub use crate::Error;

/// The result type used throughout layoutscope
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Metadata
// ================================================================================================

/// Decoded per-assembly metadata
pub use crate::metadata::assembly::AssemblyMetadata;

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

// ================================================================================================
// Type System
// ================================================================================================

/// Type descriptors, definitions and the registry owning them
pub use crate::typesystem::{
    DefId, FieldDefinition, LayoutKind, Primitive, TypeCategory, TypeDefinition, TypeDescriptor,
    TypeHandle, TypeRegistry,
};

// ================================================================================================
// Formatting
// ================================================================================================

/// Tokenized names and their formatter
pub use crate::formatting::{
    NameFormatter, NamespacePolicy, SpanBuilder, TokenKind, TokenSpan, TokenizedString,
};

// ================================================================================================
// Layout
// ================================================================================================

/// Layout analysis and its results
pub use crate::layout::{Analyzer, Entry, Field, Layout, LayoutEntry, Padding, Platform};

// ================================================================================================
// Sessions
// ================================================================================================

/// Analysis sessions over build outputs
pub use crate::session::{
    AnalysisSession, AnalysisTarget, BuildSettings, ProjectOutput, SessionKey, SessionRegistry,
    SessionState,
};

// ================================================================================================
// Protocol
// ================================================================================================

/// Worker process protocol
pub use crate::protocol::{HostRunner, Request, RunnerConfig, Worker, WorkerConfig};
