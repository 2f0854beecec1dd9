//! Syntax-highlightable type names.
//!
//! - [`SpanBuilder`] and [`BufferPool`] provide the low-allocation append buffers
//! - [`TokenizedString`] pairs text with [`TokenSpan`] runs of a [`TokenKind`]
//! - [`NameFormatter`] renders [`crate::typesystem::TypeDescriptor`]s the way C# spells them

mod names;
mod pool;
mod span_builder;
mod tokenized;

pub use names::{
    category_kind, classify, NameFormatter, NamespacePolicy, PrimitiveCache,
    TokenizedStringBuilder,
};
pub use pool::BufferPool;
pub use span_builder::SpanBuilder;
pub use tokenized::{TokenKind, TokenSpan, TokenizedString};
