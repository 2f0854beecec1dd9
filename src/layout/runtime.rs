//! Field placement as the CoreCLR type loader performs it.
//!
//! [`RuntimeLayout`] answers the two questions a managed runtime would answer through
//! reflection: where does each instance field live, and how large is an instance. The rules
//! emulated here:
//!
//! - Auto layout: GC references first, then the remaining primitives by descending size, then
//!   embedded value types in declaration order. Alignment is capped at the pointer size.
//! - Sequential layout: declaration order, alignment `min(natural, pack)` with a default
//!   pack of 8. A sequential type holding GC references falls back to auto layout.
//! - Explicit layout: `FieldLayout` offsets as declared.
//! - Value types round up to their largest field alignment; an empty value type is one byte;
//!   a `ClassLayout` size larger than the computed size wins.
//! - Reference types start their own fields after the pointer-aligned end of the base
//!   class's fields. An instance occupies the object header and the method table pointer
//!   plus the pointer-aligned field data, and never less than three pointers.

use std::{collections::HashMap, sync::Arc};

use log::trace;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::{
    typesystem::{
        DefId, LayoutKind, Primitive, TypeCategory, TypeDefinition, TypeDescriptor, TypeHandle,
        TypeRegistry,
    },
    Error::{LoadIsolation, NotSupported, RecursionLimit},
    Result,
};

/// Default packing when `ClassLayout` does not specify one.
pub const DEFAULT_PACK: u32 = 8;

const MAX_NESTING_DEPTH: usize = 64;

/// Target platform, selecting the pointer size.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// 32-bit x86.
    X86,
    /// 64-bit x86.
    #[default]
    X64,
    /// 64-bit ARM.
    Arm64,
}

impl Platform {
    /// Pointer size in bytes.
    #[must_use]
    pub fn pointer_size(self) -> u32 {
        match self {
            Platform::X86 => 4,
            Platform::X64 | Platform::Arm64 => 8,
        }
    }

    /// Smallest heap allocation: header, method table pointer and one pointer of data.
    #[must_use]
    pub fn min_object_size(self) -> u32 {
        self.pointer_size() * 3
    }
}

/// How a field type occupies storage inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Storage {
    /// Bytes occupied.
    pub size: u32,
    /// Natural alignment before packing.
    pub alignment: u32,
    /// The field is a GC-tracked reference.
    pub is_reference: bool,
    /// The field embeds a value type (not primitive, not enum).
    pub is_struct: bool,
    /// The field (or the struct it embeds) contains GC references.
    pub contains_references: bool,
}

/// An instance field with its position resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedField {
    /// Field name.
    pub name: String,
    /// Field type with the container's generic arguments substituted.
    pub field_type: TypeDescriptor,
    /// `true` for public fields.
    pub is_public: bool,
    /// Native integer rendering flags.
    pub transform_flags: Vec<bool>,
    /// Offset from the start of the value (value types) or of the field data (classes).
    pub offset: u32,
    /// Bytes occupied.
    pub size: u32,
    /// Offset declared through `FieldLayout`, relative to the type's own field area.
    pub explicit_offset: Option<u32>,
    /// Position in declaration order, base class fields first.
    pub declared: usize,
}

/// Resolved layout of a struct, enum or class instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeLayout {
    /// The definition laid out.
    pub definition: DefId,
    /// Value or reference classification.
    pub category: TypeCategory,
    /// Requested layout.
    pub requested: LayoutKind,
    /// Layout actually applied.
    pub effective: LayoutKind,
    /// Packing used, `DEFAULT_PACK` when unset.
    pub pack: u32,
    /// `ClassLayout` size, `0` when unset.
    pub class_size: u32,
    /// Instance fields, inherited ones included, in placement order.
    pub fields: Vec<PlacedField>,
    /// Value size of a value type, or end of the field data of a class.
    pub data_size: u32,
    /// Largest field alignment after packing.
    pub alignment: u32,
    /// Any field is or contains a GC reference.
    pub contains_references: bool,
    /// Heap allocation size of a class instance.
    pub heap_size: Option<u32>,
}

impl TypeLayout {
    /// The size the analyzer reports: heap size for classes, value size otherwise.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.heap_size.unwrap_or(self.data_size)
    }
}

fn align_up(value: u32, alignment: u32) -> u32 {
    let alignment = alignment.max(1);
    value.div_ceil(alignment) * alignment
}

struct Slot {
    index: usize,
    storage: Storage,
    alignment: u32,
}

/// Computes and memoizes [`TypeLayout`]s for one platform.
#[derive(Debug)]
pub struct RuntimeLayout {
    platform: Platform,
    cache: HashMap<TypeDescriptor, Arc<TypeLayout>>,
}

impl RuntimeLayout {
    /// Create a layout engine for `platform`.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        RuntimeLayout {
            platform,
            cache: HashMap::new(),
        }
    }

    /// The target platform.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Pointer size of the target platform.
    #[must_use]
    pub fn pointer_size(&self) -> u32 {
        self.platform.pointer_size()
    }

    /// Forget memoized layouts, e.g. when the registry they were computed from is replaced.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Storage of a field of type `descriptor`.
    ///
    /// # Errors
    /// [`crate::Error::LoadIsolation`] for unresolved value types, [`crate::Error::NotSupported`]
    /// for generic parameters, [`crate::Error::RecursionLimit`] for value types that contain
    /// themselves.
    pub fn storage_of(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
    ) -> Result<Storage> {
        self.storage_at(registry, descriptor, 0)
    }

    /// Layout of a named type instantiation.
    ///
    /// # Errors
    /// As [`RuntimeLayout::storage_of`], plus [`crate::Error::NotSupported`] if the descriptor
    /// does not name a type with fields.
    pub fn layout_of(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
    ) -> Result<Arc<TypeLayout>> {
        self.layout_at(registry, descriptor, 0)
    }

    fn storage_at(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
        depth: usize,
    ) -> Result<Storage> {
        let pointer = self.pointer_size();
        let reference = Storage {
            size: pointer,
            alignment: pointer,
            is_reference: true,
            is_struct: false,
            contains_references: true,
        };

        match descriptor {
            TypeDescriptor::Primitive(primitive) => Ok(Storage {
                size: primitive.size(pointer),
                alignment: match primitive {
                    Primitive::TypedReference => pointer,
                    _ => primitive.size(pointer).max(1),
                },
                is_reference: primitive.is_reference(),
                is_struct: false,
                contains_references: primitive.is_reference(),
            }),
            TypeDescriptor::Pointer(_) => Ok(Storage {
                is_reference: false,
                contains_references: false,
                ..reference
            }),
            TypeDescriptor::Array { .. } => Ok(reference),
            TypeDescriptor::GenericParameter { name, .. } => {
                trace!("Generic parameter {name} has no storage");
                Err(NotSupported)
            }
            TypeDescriptor::Generic { .. }
            | TypeDescriptor::Nested { .. }
            | TypeDescriptor::Named(_) => {
                let Some(handle) = descriptor.handle() else {
                    return Err(NotSupported);
                };

                match handle.category {
                    TypeCategory::Class | TypeCategory::Interface => Ok(reference),
                    TypeCategory::Enum => {
                        let definition = resolve(registry, handle)?;
                        let underlying = definition
                            .instance_fields()
                            .next()
                            .map(|field| field.field_type.clone())
                            .ok_or_else(|| {
                                malformed_error!("Enum {} has no value field", handle.name)
                            })?;
                        let storage = self.storage_at(registry, &underlying, depth + 1)?;
                        Ok(Storage {
                            is_struct: false,
                            ..storage
                        })
                    }
                    TypeCategory::Struct => {
                        let layout = self.layout_at(registry, descriptor, depth + 1)?;
                        Ok(Storage {
                            size: layout.data_size,
                            alignment: layout.alignment,
                            is_reference: false,
                            is_struct: true,
                            contains_references: layout.contains_references,
                        })
                    }
                }
            }
        }
    }

    fn layout_at(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
        depth: usize,
    ) -> Result<Arc<TypeLayout>> {
        if depth > MAX_NESTING_DEPTH {
            return Err(RecursionLimit(MAX_NESTING_DEPTH));
        }

        if let Some(layout) = self.cache.get(descriptor) {
            return Ok(layout.clone());
        }

        let handle = descriptor.handle().ok_or(NotSupported)?;
        let definition = resolve(registry, handle)?;
        let arguments: &[TypeDescriptor] = match descriptor {
            TypeDescriptor::Generic { arguments, .. } => arguments,
            _ => &[],
        };

        let layout = if definition.category.is_value_type() {
            self.value_layout(registry, definition, arguments, depth)?
        } else {
            self.class_layout(registry, definition, arguments, depth)?
        };

        trace!(
            "Laid out {descriptor}: {} fields, {} bytes",
            layout.fields.len(),
            layout.size()
        );

        let layout = Arc::new(layout);
        self.cache.insert(descriptor.clone(), layout.clone());
        Ok(layout)
    }

    fn collect_fields(
        definition: &TypeDefinition,
        arguments: &[TypeDescriptor],
        declared_base: usize,
    ) -> Vec<PlacedField> {
        definition
            .instance_fields()
            .enumerate()
            .map(|(index, field)| PlacedField {
                name: field.name.clone(),
                field_type: field.field_type.substitute(arguments),
                is_public: field.is_public,
                transform_flags: field.transform_flags(),
                offset: 0,
                size: 0,
                explicit_offset: field.explicit_offset,
                declared: declared_base + index,
            })
            .collect()
    }

    fn slots(
        &mut self,
        registry: &TypeRegistry,
        fields: &[PlacedField],
        depth: usize,
    ) -> Result<Vec<Slot>> {
        fields
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let storage = self.storage_at(registry, &field.field_type, depth)?;
                Ok(Slot {
                    index,
                    storage,
                    alignment: storage.alignment,
                })
            })
            .collect()
    }

    /// Place `fields` starting at `start`; returns the end of the placed data and the
    /// largest alignment applied.
    fn place(
        &self,
        definition: &TypeDefinition,
        effective: LayoutKind,
        pack: u32,
        fields: &mut [PlacedField],
        mut slots: Vec<Slot>,
        start: u32,
    ) -> Result<(u32, u32)> {
        let pointer = self.pointer_size();
        let cap = match effective {
            LayoutKind::Auto => pointer,
            LayoutKind::Sequential | LayoutKind::Explicit => pack,
        };
        for slot in &mut slots {
            slot.alignment = slot.alignment.min(cap).max(1);
        }

        if effective == LayoutKind::Auto {
            // GC references, then primitives by descending size, then embedded structs
            slots.sort_by_key(|slot| {
                let bucket = if slot.storage.is_reference {
                    0
                } else if slot.storage.is_struct {
                    2
                } else {
                    1
                };
                let size_order = if bucket == 1 {
                    u32::MAX - slot.storage.size
                } else {
                    0
                };
                (bucket, size_order)
            });
        }

        let mut cursor = start;
        let mut end = start;
        let mut alignment = 1;

        for slot in &slots {
            let field = &mut fields[slot.index];
            let offset = if effective == LayoutKind::Explicit {
                match field.explicit_offset {
                    Some(offset) => start + offset,
                    None => {
                        return Err(malformed_error!(
                            "Field {} of explicit layout type {} has no offset",
                            field.name,
                            definition.name
                        ))
                    }
                }
            } else {
                align_up(cursor, slot.alignment)
            };

            field.offset = offset;
            field.size = slot.storage.size;
            cursor = offset + slot.storage.size;
            end = end.max(cursor);
            alignment = alignment.max(slot.alignment);
        }

        Ok((end, alignment))
    }

    fn effective_kind(definition: &TypeDefinition, slots: &[Slot]) -> LayoutKind {
        let references = slots.iter().any(|slot| slot.storage.contains_references);
        match definition.layout {
            LayoutKind::Sequential if references => LayoutKind::Auto,
            kind => kind,
        }
    }

    fn pack_of(definition: &TypeDefinition) -> u32 {
        match u32::from(definition.pack) {
            0 => DEFAULT_PACK,
            pack => pack,
        }
    }

    fn value_layout(
        &mut self,
        registry: &TypeRegistry,
        definition: &TypeDefinition,
        arguments: &[TypeDescriptor],
        depth: usize,
    ) -> Result<TypeLayout> {
        let mut fields = Self::collect_fields(definition, arguments, 0);
        let slots = self.slots(registry, &fields, depth)?;
        let contains_references = slots.iter().any(|slot| slot.storage.contains_references);
        let effective = Self::effective_kind(definition, &slots);
        let pack = Self::pack_of(definition);

        let (end, alignment) =
            self.place(definition, effective, pack, &mut fields, slots, 0)?;

        let mut size = align_up(end, alignment);
        if definition.class_size > size {
            size = definition.class_size;
        }
        if size == 0 {
            size = 1;
        }

        sort_by_offset(&mut fields);

        Ok(TypeLayout {
            definition: definition.id,
            category: definition.category,
            requested: definition.layout,
            effective,
            pack,
            class_size: definition.class_size,
            fields,
            data_size: size,
            alignment,
            contains_references,
            heap_size: None,
        })
    }

    fn class_layout(
        &mut self,
        registry: &TypeRegistry,
        definition: &TypeDefinition,
        arguments: &[TypeDescriptor],
        depth: usize,
    ) -> Result<TypeLayout> {
        let pointer = self.pointer_size();

        let (mut inherited, base_end, base_references) = match &definition.base {
            Some(base @ TypeDescriptor::Primitive(_)) | Some(base @ TypeDescriptor::Pointer(_)) => {
                trace!("Base {base} of {} carries no fields", definition.name);
                (Vec::new(), 0, false)
            }
            Some(base) => {
                let base = base.substitute(arguments);
                let layout = self.layout_at(registry, &base, depth + 1)?;
                (
                    layout.fields.clone(),
                    layout.data_size,
                    layout.contains_references,
                )
            }
            None => (Vec::new(), 0, false),
        };

        let mut own = Self::collect_fields(definition, arguments, inherited.len());
        let slots = self.slots(registry, &own, depth)?;
        let contains_references =
            base_references || slots.iter().any(|slot| slot.storage.contains_references);
        let effective = Self::effective_kind(definition, &slots);
        let pack = Self::pack_of(definition);

        let start = if base_end == 0 {
            0
        } else {
            align_up(base_end, pointer)
        };
        let (mut end, _) = self.place(definition, effective, pack, &mut own, slots, start)?;
        if definition.class_size > 0 {
            end = end.max(start + definition.class_size);
        }

        inherited.append(&mut own);
        sort_by_offset(&mut inherited);

        let heap_size = align_up(2 * pointer + end, pointer).max(self.platform.min_object_size());

        Ok(TypeLayout {
            definition: definition.id,
            category: definition.category,
            requested: definition.layout,
            effective,
            pack,
            class_size: definition.class_size,
            fields: inherited,
            data_size: end,
            alignment: pointer,
            contains_references,
            heap_size: Some(heap_size),
        })
    }
}

fn resolve<'r>(registry: &'r TypeRegistry, handle: &TypeHandle) -> Result<&'r TypeDefinition> {
    handle
        .def
        .and_then(|id| registry.get(id))
        .ok_or_else(|| {
            LoadIsolation(if handle.namespace.is_empty() {
                handle.name.clone()
            } else {
                format!("{}.{}", handle.namespace, handle.name)
            })
        })
}

fn sort_by_offset(fields: &mut [PlacedField]) {
    fields.sort_by_key(|field| (field.offset, field.declared));
}
