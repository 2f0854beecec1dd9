//! Rendering type descriptors as tokenized display names.
//!
//! The rules follow how a C# programmer writes a type: built-ins use their keyword, arrays
//! list their bracket groups outer to inner, `Nullable<T>` becomes `T?` and generic
//! definitions lose their arity suffix.

use std::collections::HashMap;

use log::trace;

use crate::{
    formatting::{BufferPool, SpanBuilder, TokenKind, TokenSpan, TokenizedString},
    typesystem::{Primitive, TypeCategory, TypeDescriptor, TypeHandle},
};

/// Which namespaces are omitted from rendered names.
///
/// A namespace is left out when it is empty, equals `root`, or equals `root` followed by one
/// of the `collapsed` child namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespacePolicy {
    /// The reserved root namespace.
    pub root: String,
    /// Children of `root` that are rendered unqualified, relative to `root`.
    pub collapsed: Vec<String>,
}

impl Default for NamespacePolicy {
    fn default() -> Self {
        NamespacePolicy {
            root: "System".to_string(),
            collapsed: vec![
                "Collections".to_string(),
                "Collections.Generic".to_string(),
                "Collections.Concurrent".to_string(),
            ],
        }
    }
}

impl NamespacePolicy {
    /// A policy that qualifies every non-empty namespace.
    #[must_use]
    pub fn qualify_all() -> Self {
        NamespacePolicy {
            root: String::new(),
            collapsed: Vec::new(),
        }
    }

    /// `true` if names in `namespace` are prefixed with it.
    #[must_use]
    pub fn qualifies(&self, namespace: &str) -> bool {
        if namespace.is_empty() || self.root.is_empty() {
            return !namespace.is_empty();
        }

        let Some(rest) = namespace.strip_prefix(self.root.as_str()) else {
            return true;
        };
        if rest.is_empty() {
            return false;
        }

        match rest.strip_prefix('.') {
            Some(child) => !self.collapsed.iter().any(|collapsed| collapsed == child),
            None => true,
        }
    }
}

/// Rendered names and sizes of primitives, computed once per formatter.
///
/// `IntPtr` and `UIntPtr` are never stored: their rendering depends on the transform flags
/// of the field that uses them.
#[derive(Debug)]
pub struct PrimitiveCache {
    pointer_size: u32,
    entries: HashMap<Primitive, (TokenizedString, u32)>,
}

impl PrimitiveCache {
    /// Create an empty cache for a platform with the given pointer size.
    #[must_use]
    pub fn new(pointer_size: u32) -> Self {
        PrimitiveCache {
            pointer_size,
            entries: HashMap::new(),
        }
    }

    /// Pointer size the sizes are computed for.
    #[must_use]
    pub fn pointer_size(&self) -> u32 {
        self.pointer_size
    }

    /// Number of memoized primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing has been memoized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Name and size of `primitive`; `native` selects `nint`/`nuint` for native integers.
    pub fn lookup(
        &mut self,
        primitive: Primitive,
        native: bool,
        policy: &NamespacePolicy,
    ) -> (TokenizedString, u32) {
        let size = primitive.size(self.pointer_size);

        if primitive.is_native_integer() {
            return (render_primitive(primitive, native, policy), size);
        }

        if let Some(entry) = self.entries.get(&primitive) {
            return entry.clone();
        }

        trace!("Primitive cache miss for {primitive}");
        let entry = (render_primitive(primitive, false, policy), size);
        self.entries.insert(primitive, entry.clone());
        entry
    }
}

fn render_primitive(primitive: Primitive, native: bool, policy: &NamespacePolicy) -> TokenizedString {
    if native {
        if let Some(keyword) = primitive.native_keyword() {
            return TokenizedString::single(TokenKind::Keyword, keyword);
        }
    }

    match primitive.keyword() {
        Some(keyword) => TokenizedString::single(TokenKind::Keyword, keyword),
        None => {
            let mut name = TokenizedString::default();
            if policy.qualifies("System") {
                name.push(TokenKind::Namespace, "System");
                name.push(TokenKind::Symbol, ".");
            }
            name.push(TokenKind::Struct, primitive.type_name());
            name
        }
    }
}

/// Token kind of a named type of the given category.
#[must_use]
pub fn category_kind(category: TypeCategory) -> TokenKind {
    match category {
        TypeCategory::Struct => TokenKind::Struct,
        TypeCategory::Enum => TokenKind::Enum,
        TypeCategory::Class | TypeCategory::Interface => TokenKind::Class,
    }
}

/// Classification of a field type for [`crate::layout::Field::kind`].
///
/// Built-ins are keywords, except native integers rendered by their struct name; pointers and
/// arrays count as classes.
#[must_use]
pub fn classify(descriptor: &TypeDescriptor, transform_flags: &[bool]) -> TokenKind {
    match descriptor {
        TypeDescriptor::Primitive(primitive) => {
            let native = transform_flags.first().copied().unwrap_or(false);
            if primitive.keyword().is_some() || (primitive.is_native_integer() && native) {
                TokenKind::Keyword
            } else {
                TokenKind::Struct
            }
        }
        TypeDescriptor::Pointer(_) | TypeDescriptor::Array { .. } => TokenKind::Class,
        TypeDescriptor::GenericParameter { .. } => TokenKind::Identifier,
        TypeDescriptor::Generic { .. } | TypeDescriptor::Nested { .. } | TypeDescriptor::Named(_) => {
            descriptor
                .category()
                .map_or(TokenKind::Class, category_kind)
        }
    }
}

/// Accumulates text and token runs on pooled storage.
pub struct TokenizedStringBuilder<'a> {
    text: SpanBuilder<'a, u8>,
    tokens: SpanBuilder<'a, TokenSpan>,
}

impl<'a> TokenizedStringBuilder<'a> {
    /// Create a builder renting from the given pools.
    pub fn with_pools(text: &'a BufferPool<u8>, tokens: &'a BufferPool<TokenSpan>) -> Self {
        TokenizedStringBuilder {
            text: SpanBuilder::with_pool(text, 64),
            tokens: SpanBuilder::with_pool(tokens, 16),
        }
    }

    /// Append a run of one kind.
    pub fn push(&mut self, kind: TokenKind, text: &str) {
        if text.is_empty() {
            return;
        }
        self.text.append_str(text);
        for span in TokenSpan::split(kind, text.len()) {
            self.tokens.append(span);
        }
    }

    /// Append an already tokenized string.
    pub fn push_tokenized(&mut self, value: &TokenizedString) {
        self.text.append_str(value.value());
        self.tokens.append_slice(value.tokens());
    }

    /// Finish, releasing the pooled storage.
    #[must_use]
    pub fn finish(self) -> TokenizedString {
        let tokens = self.tokens.into_vec();
        let text = self.text.into_string();
        TokenizedString::from_parts_unchecked(text, tokens)
    }
}

/// Renders [`TypeDescriptor`]s into [`TokenizedString`]s.
///
/// One formatter belongs to one analyzer; it owns the primitive cache and the buffer pools.
///
/// # Examples
///
/// ```rust
/// use layoutscope::formatting::NameFormatter;
/// use layoutscope::typesystem::{Primitive, TypeDescriptor};
///
/// let mut formatter = NameFormatter::new(8);
/// let pointer = TypeDescriptor::Pointer(Box::new(Primitive::IntPtr.into()));
///
/// assert_eq!(formatter.format_type(&pointer, &[true]).value(), "nint*");
/// assert_eq!(formatter.format_type(&pointer, &[]).value(), "IntPtr*");
/// ```
#[derive(Debug)]
pub struct NameFormatter {
    policy: NamespacePolicy,
    cache: PrimitiveCache,
    text_pool: BufferPool<u8>,
    token_pool: BufferPool<TokenSpan>,
}

impl NameFormatter {
    /// Create a formatter with the default namespace policy.
    #[must_use]
    pub fn new(pointer_size: u32) -> Self {
        Self::with_policy(pointer_size, NamespacePolicy::default())
    }

    /// Create a formatter with a custom namespace policy.
    #[must_use]
    pub fn with_policy(pointer_size: u32, policy: NamespacePolicy) -> Self {
        NameFormatter {
            policy,
            cache: PrimitiveCache::new(pointer_size),
            text_pool: BufferPool::default(),
            token_pool: BufferPool::default(),
        }
    }

    /// The namespace policy.
    #[must_use]
    pub fn policy(&self) -> &NamespacePolicy {
        &self.policy
    }

    /// The primitive cache.
    #[must_use]
    pub fn cache(&self) -> &PrimitiveCache {
        &self.cache
    }

    /// Name and size of a primitive through the cache.
    pub fn primitive(&mut self, primitive: Primitive, native: bool) -> (TokenizedString, u32) {
        self.cache.lookup(primitive, native, &self.policy)
    }

    /// Render a type. `transform_flags` are consumed one per native integer occurrence.
    pub fn format_type(
        &mut self,
        descriptor: &TypeDescriptor,
        transform_flags: &[bool],
    ) -> TokenizedString {
        let NameFormatter {
            policy,
            cache,
            text_pool,
            token_pool,
        } = self;

        let mut builder = TokenizedStringBuilder::with_pools(text_pool, token_pool);
        let mut flags = transform_flags.iter().copied();
        let mut renderer = Renderer {
            builder: &mut builder,
            flags: &mut flags,
            cache,
            policy,
        };
        renderer.render(descriptor);
        builder.finish()
    }

    /// Render a field as `"<type> <name>"`.
    pub fn format_field(
        &mut self,
        descriptor: &TypeDescriptor,
        transform_flags: &[bool],
        name: &str,
    ) -> TokenizedString {
        let mut rendered = self.format_type(descriptor, transform_flags);
        rendered.push(TokenKind::Punctuation, " ");
        rendered.push(TokenKind::Identifier, name);
        rendered
    }
}

struct Renderer<'b, 'a, I: Iterator<Item = bool>> {
    builder: &'b mut TokenizedStringBuilder<'a>,
    flags: &'b mut I,
    cache: &'b mut PrimitiveCache,
    policy: &'b NamespacePolicy,
}

impl<I: Iterator<Item = bool>> Renderer<'_, '_, I> {
    fn render(&mut self, descriptor: &TypeDescriptor) {
        match descriptor {
            TypeDescriptor::Primitive(primitive) => {
                let native = primitive.is_native_integer() && self.flags.next().unwrap_or(false);
                let (name, _) = self.cache.lookup(*primitive, native, self.policy);
                self.builder.push_tokenized(&name);
            }
            TypeDescriptor::Pointer(inner) => {
                self.render(inner);
                self.builder.push(TokenKind::Symbol, "*");
            }
            TypeDescriptor::Array { .. } => {
                let mut ranks = Vec::new();
                let mut current = descriptor;
                while let TypeDescriptor::Array { element, rank } = current {
                    ranks.push(*rank);
                    current = element.as_ref();
                }

                self.render(current);
                for rank in ranks {
                    let commas = rank.max(1) as usize - 1;
                    let group = format!("[{}]", ",".repeat(commas));
                    self.builder.push(TokenKind::Punctuation, &group);
                }
            }
            TypeDescriptor::Generic {
                definition,
                arguments,
            } => {
                let nullable = definition.handle().is_some_and(TypeHandle::is_nullable);
                if nullable && arguments.len() == 1 {
                    self.render(&arguments[0]);
                    self.builder.push(TokenKind::Symbol, "?");
                    return;
                }

                self.render(definition);
                self.builder.push(TokenKind::Symbol, "<");
                for (index, argument) in arguments.iter().enumerate() {
                    if index > 0 {
                        self.builder.push(TokenKind::Symbol, ",");
                        self.builder.push(TokenKind::Punctuation, " ");
                    }
                    self.render(argument);
                }
                self.builder.push(TokenKind::Symbol, ">");
            }
            TypeDescriptor::Nested { declaring, handle } => {
                self.render(declaring);
                self.builder.push(TokenKind::Symbol, ".");
                self.builder
                    .push(category_kind(handle.category), handle.display_name());
            }
            TypeDescriptor::Named(handle) => {
                if self.policy.qualifies(&handle.namespace) {
                    self.builder.push(TokenKind::Namespace, &handle.namespace);
                    self.builder.push(TokenKind::Symbol, ".");
                }
                self.builder
                    .push(category_kind(handle.category), handle.display_name());
            }
            TypeDescriptor::GenericParameter { name, .. } => {
                self.builder.push(TokenKind::Identifier, name);
            }
        }
    }
}
