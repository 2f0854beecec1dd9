//! Arena of type definitions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    metadata::customattributes::NativeIntegerFlags,
    typesystem::{DefId, TypeCategory, TypeDescriptor, TypeHandle},
};

/// Requested field layout strategy of a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutKind {
    /// The runtime reorders fields freely.
    #[default]
    Auto,
    /// Fields are placed in declaration order.
    Sequential,
    /// Fields carry explicit offsets.
    Explicit,
}

impl LayoutKind {
    /// Decode the layout bits of `TypeAttributes`.
    #[must_use]
    pub fn from_type_attributes(layout_bits: u32) -> Self {
        match layout_bits {
            0x08 => LayoutKind::Sequential,
            0x10 => LayoutKind::Explicit,
            _ => LayoutKind::Auto,
        }
    }
}

/// An instance or static field of a [`TypeDefinition`].
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    /// Field name.
    pub name: String,
    /// Declared type, possibly referring to the owner's generic parameters.
    pub field_type: TypeDescriptor,
    /// `true` for public fields.
    pub is_public: bool,
    /// `true` for static and literal fields.
    pub is_static: bool,
    /// Offset declared through `FieldLayout` (explicit layout only).
    pub explicit_offset: Option<u32>,
    /// Native integer rendering hints from `NativeIntegerAttribute`.
    pub native_integers: Option<NativeIntegerFlags>,
}

impl FieldDefinition {
    /// An instance field.
    pub fn instance(name: impl Into<String>, field_type: TypeDescriptor, is_public: bool) -> Self {
        FieldDefinition {
            name: name.into(),
            field_type,
            is_public,
            is_static: false,
            explicit_offset: None,
            native_integers: None,
        }
    }

    /// Transform flags for the formatter, one per native integer occurrence.
    #[must_use]
    pub fn transform_flags(&self) -> Vec<bool> {
        match &self.native_integers {
            Some(flags) => flags.expand(self.field_type.native_integer_count()),
            None => Vec::new(),
        }
    }
}

/// A type definition loaded into a [`TypeRegistry`].
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    /// Position in the registry.
    pub id: DefId,
    /// Simple name of the defining assembly.
    pub assembly: String,
    /// Namespace, empty for nested types.
    pub namespace: String,
    /// Simple name with arity suffix.
    pub name: String,
    /// Value or reference classification.
    pub category: TypeCategory,
    /// Requested layout.
    pub layout: LayoutKind,
    /// `ClassLayout` packing size, `0` when unset.
    pub pack: u16,
    /// `ClassLayout` class size, `0` when unset.
    pub class_size: u32,
    /// Base class, `None` for `System.Object`, interfaces and the marker types.
    pub base: Option<TypeDescriptor>,
    /// Fields in declaration order.
    pub fields: Vec<FieldDefinition>,
    /// Generic parameter names.
    pub generic_params: Vec<String>,
    /// Enclosing type of a nested definition.
    pub declaring: Option<DefId>,
}

impl TypeDefinition {
    /// An empty definition; fields and base are filled in by the loader.
    pub fn new(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        category: TypeCategory,
    ) -> Self {
        TypeDefinition {
            id: DefId(usize::MAX),
            assembly: assembly.into(),
            namespace: namespace.into(),
            name: name.into(),
            category,
            layout: LayoutKind::Auto,
            pack: 0,
            class_size: 0,
            base: None,
            fields: Vec::new(),
            generic_params: Vec::new(),
            declaring: None,
        }
    }

    /// Builder helper: set the requested layout.
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutKind) -> Self {
        self.layout = layout;
        self
    }

    /// Builder helper: append an instance field.
    #[must_use]
    pub fn with_field(mut self, name: &str, field_type: impl Into<TypeDescriptor>) -> Self {
        self.fields
            .push(FieldDefinition::instance(name, field_type.into(), false));
        self
    }

    /// Builder helper: set the generic parameter names.
    #[must_use]
    pub fn with_generic_params(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|param| (*param).to_string()).collect();
        self
    }

    /// Instance fields in declaration order.
    pub fn instance_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(|field| !field.is_static)
    }

    /// `true` for generic definitions.
    #[must_use]
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }
}

/// Owner of all type definitions of one load context.
///
/// Definitions are addressed by [`DefId`] and found by `(assembly, full name)` where the full
/// name uses reflection syntax for nesting (`Namespace.Outer+Inner`).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    definitions: Vec<TypeDefinition>,
    names: HashMap<(String, String), DefId>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Register a definition and return its id. A definition registered under an existing
    /// `(assembly, full name)` shadows the older one for lookups.
    pub fn insert(&mut self, mut definition: TypeDefinition) -> DefId {
        let id = DefId(self.definitions.len());
        definition.id = id;
        self.definitions.push(definition);

        let full_name = self.full_name(id);
        self.names
            .insert((self.definitions[id.0].assembly.clone(), full_name), id);
        id
    }

    /// Register a batch of definitions whose `declaring` links point into the batch itself,
    /// in any order. Returns the id of the first one; the rest follow consecutively.
    pub fn extend(&mut self, definitions: Vec<TypeDefinition>) -> DefId {
        let first = self.definitions.len();
        for (offset, mut definition) in definitions.into_iter().enumerate() {
            definition.id = DefId(first + offset);
            self.definitions.push(definition);
        }

        for index in first..self.definitions.len() {
            let id = DefId(index);
            let full_name = self.full_name(id);
            self.names
                .insert((self.definitions[index].assembly.clone(), full_name), id);
        }
        DefId(first)
    }

    /// Drop every definition with an id of `len` or above. Ids handed out for them dangle
    /// afterwards; lookups by name no longer find them.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.definitions.len() {
            return;
        }

        self.definitions.truncate(len);
        self.names.clear();
        for index in 0..len {
            let id = DefId(index);
            let full_name = self.full_name(id);
            self.names
                .insert((self.definitions[index].assembly.clone(), full_name), id);
        }
    }

    /// The definition with the given id.
    #[must_use]
    pub fn get(&self, id: DefId) -> Option<&TypeDefinition> {
        self.definitions.get(id.0)
    }

    /// Mutable access for the loader's second pass.
    pub fn get_mut(&mut self, id: DefId) -> Option<&mut TypeDefinition> {
        self.definitions.get_mut(id.0)
    }

    /// Find a definition by assembly and full name.
    #[must_use]
    pub fn find(&self, assembly: &str, full_name: &str) -> Option<DefId> {
        self.names
            .get(&(assembly.to_string(), full_name.to_string()))
            .copied()
    }

    /// Find a definition by full name in any assembly, first registered wins.
    #[must_use]
    pub fn find_by_name(&self, full_name: &str) -> Option<DefId> {
        self.names
            .iter()
            .filter(|((_, name), _)| name == full_name)
            .map(|(_, id)| *id)
            .min()
    }

    /// Reflection-style full name of a definition.
    #[must_use]
    pub fn full_name(&self, id: DefId) -> String {
        let mut parts = Vec::new();
        let mut namespace = "";
        let mut current = self.get(id);

        while let Some(definition) = current {
            parts.push(definition.name.as_str());
            namespace = definition.namespace.as_str();
            current = match definition.declaring {
                Some(parent) if parts.len() <= self.definitions.len() => self.get(parent),
                _ => None,
            };
        }

        parts.reverse();
        let nested = parts.join("+");
        if namespace.is_empty() {
            nested
        } else {
            format!("{namespace}.{nested}")
        }
    }

    /// Handle of a definition.
    #[must_use]
    pub fn handle(&self, id: DefId) -> Option<TypeHandle> {
        self.get(id).map(|definition| {
            TypeHandle::new(
                definition.namespace.clone(),
                definition.name.clone(),
                definition.category,
                Some(id),
            )
        })
    }

    /// Descriptor naming a definition. Nested definitions become `Nested` chains and generic
    /// definitions are instantiated over their own parameters, so the result is open.
    #[must_use]
    pub fn descriptor(&self, id: DefId) -> Option<TypeDescriptor> {
        self.descriptor_at(id, 0)
    }

    /// Descriptor naming a definition without instantiating it, as used for the definition
    /// part of a [`TypeDescriptor::Generic`].
    #[must_use]
    pub fn named_descriptor(&self, id: DefId) -> Option<TypeDescriptor> {
        self.descriptor_at(id, 1)
    }

    fn descriptor_at(&self, id: DefId, depth: usize) -> Option<TypeDescriptor> {
        let definition = self.get(id)?;
        let handle = self.handle(id)?;

        let plain = match definition.declaring {
            Some(parent) if depth <= self.definitions.len() + 1 => {
                let declaring = self.descriptor_at(parent, depth + 1)?;
                TypeDescriptor::Nested {
                    declaring: Box::new(declaring),
                    handle,
                }
            }
            _ => TypeDescriptor::Named(handle),
        };

        if depth == 0 && definition.is_generic() {
            let arguments = definition
                .generic_params
                .iter()
                .enumerate()
                .map(|(index, name)| TypeDescriptor::GenericParameter {
                    index: u32::try_from(index).unwrap_or(u32::MAX),
                    name: name.clone(),
                })
                .collect();

            return Some(TypeDescriptor::Generic {
                definition: Box::new(plain),
                arguments,
            });
        }

        Some(plain)
    }

    /// Iterate over all definitions.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.definitions.iter()
    }
}
