//! Building [`Layout`] trees from the runtime placement model.

use log::debug;

use crate::{
    formatting::{classify, NameFormatter, NamespacePolicy, TokenizedString},
    layout::{
        runtime::{RuntimeLayout, TypeLayout},
        Field, Layout, Platform,
    },
    typesystem::{TypeCategory, TypeDescriptor, TypeRegistry},
    Error::RecursionLimit,
    Result,
};

const MAX_CHILD_DEPTH: usize = 64;

/// Computes layouts for types of one [`TypeRegistry`].
///
/// The analyzer owns the placement cache and the name formatter (with its primitive cache
/// and buffer pools), so one analyzer serves one load context. Call [`Analyzer::reset`]
/// before reusing it with a different registry.
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
/// assert_eq!(layout.total_padding, 0);
/// # Ok::<(), layoutscope::Error>(())
/// ```
#[derive(Debug)]
pub struct Analyzer {
    runtime: RuntimeLayout,
    formatter: NameFormatter,
}

impl Analyzer {
    /// Create an analyzer for `platform` with the default namespace policy.
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self::with_policy(platform, NamespacePolicy::default())
    }

    /// Create an analyzer with a custom namespace policy.
    #[must_use]
    pub fn with_policy(platform: Platform, policy: NamespacePolicy) -> Self {
        Analyzer {
            runtime: RuntimeLayout::new(platform),
            formatter: NameFormatter::with_policy(platform.pointer_size(), policy),
        }
    }

    /// The target platform.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.runtime.platform()
    }

    /// The name formatter.
    pub fn formatter(&mut self) -> &mut NameFormatter {
        &mut self.formatter
    }

    /// Drop memoized placements.
    pub fn reset(&mut self) {
        self.runtime.clear();
    }

    /// Compute the layout of `descriptor`.
    ///
    /// Returns `Ok(None)` for types without a structural layout: primitives, pointers,
    /// arrays, interfaces, generic parameters and uninstantiated generic definitions.
    ///
    /// # Errors
    /// [`crate::Error::LoadIsolation`] if the type or one of its field types or bases is not
    /// resolved, [`crate::Error::RecursionLimit`] for value types that embed themselves.
    pub fn analyze(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
    ) -> Result<Option<Layout>> {
        let Some(category) = descriptor.category() else {
            return Ok(None);
        };
        if category == TypeCategory::Interface || descriptor.is_open() {
            return Ok(None);
        }

        let placement = self.runtime.layout_of(registry, descriptor)?;
        let fields = self.fields_of(registry, &placement, 0)?;
        let (name, size) = self.get_name_and_size(registry, descriptor, &[])?;

        let layout = Layout::new(
            name,
            fields,
            size,
            category.is_value_type(),
            placement.requested,
            to_i32(placement.class_size),
            to_i32(placement.pack),
        );

        debug!(
            "Analyzed {descriptor}: {} fields, {} bytes, {} padding",
            layout.fields.len(),
            layout.total_size,
            layout.total_padding
        );
        Ok(Some(layout))
    }

    /// Instance fields of `descriptor` ordered by offset, embedded value types expanded.
    ///
    /// # Errors
    /// As [`Analyzer::analyze`].
    pub fn get_fields(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
    ) -> Result<Vec<Field>> {
        let placement = self.runtime.layout_of(registry, descriptor)?;
        self.fields_of(registry, &placement, 0)
    }

    /// Rendered name and size of a type.
    ///
    /// Classes report their heap allocation size, value types their value size; pointers,
    /// arrays, strings, objects, interfaces and unresolved class references report the
    /// pointer width.
    ///
    /// # Errors
    /// As [`Analyzer::analyze`].
    pub fn get_name_and_size(
        &mut self,
        registry: &TypeRegistry,
        descriptor: &TypeDescriptor,
        transform_flags: &[bool],
    ) -> Result<(TokenizedString, i32)> {
        let name = self.formatter.format_type(descriptor, transform_flags);
        let pointer = self.runtime.pointer_size();

        let size = match descriptor {
            TypeDescriptor::Primitive(primitive) => {
                let native = transform_flags.first().copied().unwrap_or(false);
                self.formatter.primitive(*primitive, native).1
            }
            TypeDescriptor::Pointer(_)
            | TypeDescriptor::Array { .. }
            | TypeDescriptor::GenericParameter { .. } => pointer,
            _ => match descriptor.handle() {
                Some(handle) if handle.category == TypeCategory::Class && handle.def.is_some() => {
                    self.runtime.layout_of(registry, descriptor)?.size()
                }
                Some(handle) if handle.category.is_value_type() => {
                    self.runtime.storage_of(registry, descriptor)?.size
                }
                _ => pointer,
            },
        };

        Ok((name, to_i32(size)))
    }

    fn fields_of(
        &mut self,
        registry: &TypeRegistry,
        placement: &TypeLayout,
        depth: usize,
    ) -> Result<Vec<Field>> {
        if depth > MAX_CHILD_DEPTH {
            return Err(RecursionLimit(MAX_CHILD_DEPTH));
        }

        let mut fields = Vec::with_capacity(placement.fields.len());
        for placed in &placement.fields {
            let field_type = &placed.field_type;
            let flags = &placed.transform_flags;

            let children = if field_type.category() == Some(TypeCategory::Struct) {
                let nested = self.runtime.layout_of(registry, field_type)?;
                Some(self.fields_of(registry, &nested, depth + 1)?)
            } else {
                None
            };

            fields.push(Field {
                offset: to_i32(placed.offset),
                size: to_i32(placed.size),
                type_and_name: self.formatter.format_field(field_type, flags, &placed.name),
                kind: classify(field_type, flags),
                is_public: placed.is_public,
                children,
            });
        }

        Ok(fields)
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        formatting::TokenKind,
        layout::padding::Entry,
        typesystem::{corelib, FieldDefinition, LayoutKind, Primitive, TypeDefinition},
    };

    fn register(registry: &mut TypeRegistry, definition: TypeDefinition) -> TypeDescriptor {
        let id = registry.insert(definition);
        registry.descriptor(id).unwrap()
    }

    fn names(layout: &Layout) -> Vec<(&str, i32)> {
        layout
            .fields
            .iter()
            .map(|field| (field.type_and_name.value(), field.offset))
            .collect()
    }

    #[test]
    fn fields_sorted_by_offset() {
        let mut registry = TypeRegistry::new();
        let mut point = TypeDefinition::new("Tests", "Geometry", "Point", TypeCategory::Struct)
            .with_layout(LayoutKind::Explicit);
        for (name, offset) in [("Y", 4), ("X", 0)] {
            let mut field = FieldDefinition::instance(name, Primitive::Int32.into(), true);
            field.explicit_offset = Some(offset);
            point.fields.push(field);
        }
        let point = register(&mut registry, point);

        let mut analyzer = Analyzer::new(Platform::X64);
        let layout = analyzer.analyze(&registry, &point).unwrap().unwrap();
        assert_eq!(names(&layout), vec![("int X", 0), ("int Y", 4)]);
        assert_eq!(layout.total_size, 8);
        assert_eq!(layout.total_padding, 0);
        assert!(layout.is_value_type);
        assert_eq!(layout.attribute_kind, LayoutKind::Explicit);
        assert_eq!(layout.attribute_pack, 8);
        assert_eq!(layout.name.value(), "Geometry.Point");
    }

    #[test]
    fn nested_value_types_have_children() {
        let mut registry = TypeRegistry::new();
        let when = corelib::resolve(&mut registry, "System.DateTimeOffset").unwrap();
        let day = corelib::resolve(&mut registry, "System.DayOfWeek").unwrap();
        let nullable = corelib::resolve(&mut registry, "System.Nullable`1").unwrap();
        let maybe = TypeDescriptor::Generic {
            definition: Box::new(nullable),
            arguments: vec![Primitive::Int32.into()],
        };

        let mut entry = TypeDefinition::new("Tests", "", "Entry", TypeCategory::Class);
        entry.base = Some(Primitive::Object.into());
        let entry = register(
            &mut registry,
            entry
                .with_field("when", when)
                .with_field("day", day)
                .with_field("count", maybe)
                .with_field("name", Primitive::String),
        );

        let mut analyzer = Analyzer::new(Platform::X64);
        let layout = analyzer.analyze(&registry, &entry).unwrap().unwrap();
        assert!(!layout.is_value_type);
        assert_eq!(
            names(&layout),
            vec![
                ("string name", 0),
                ("DayOfWeek day", 8),
                ("DateTimeOffset when", 16),
                ("int? count", 32)
            ]
        );

        let day = &layout.fields[1];
        assert_eq!(day.kind, TokenKind::Enum);
        assert!(day.children.is_none());

        let when = &layout.fields[2];
        let children = when.children.as_ref().unwrap();
        assert_eq!(children[0].type_and_name.value(), "short _offsetMinutes");
        assert!(children[1].children.is_some());

        let count = &layout.fields[3];
        assert_eq!(count.kind, TokenKind::Struct);
        let children = count.children.as_ref().unwrap();
        assert_eq!(children[0].type_and_name.value(), "bool hasValue");
        assert_eq!(children[1].offset, 4);

        // 16 header bytes + 40 bytes of field data
        assert_eq!(layout.total_size, 56);
        assert_eq!(layout.total_padding, 56 - (8 + 4 + 5 + 10));
    }

    #[test]
    fn padding_tiles_every_level() {
        let mut registry = TypeRegistry::new();
        let inner = register(
            &mut registry,
            TypeDefinition::new("Tests", "", "Inner", TypeCategory::Struct)
                .with_layout(LayoutKind::Sequential)
                .with_field("flag", Primitive::Boolean)
                .with_field("value", Primitive::Double),
        );
        let outer = register(
            &mut registry,
            TypeDefinition::new("Tests", "", "Outer", TypeCategory::Struct)
                .with_layout(LayoutKind::Sequential)
                .with_field("tag", Primitive::Byte)
                .with_field("inner", inner)
                .with_field("tail", Primitive::Int16),
        );

        let mut analyzer = Analyzer::new(Platform::X64);
        let layout = analyzer.analyze(&registry, &outer).unwrap().unwrap();
        assert_eq!(layout.total_size, 32);

        let rows = layout.fields_with_paddings();
        let top: i32 = rows.iter().filter(|row| row.level == 0).map(|row| row.size()).sum();
        assert_eq!(top, layout.total_size);

        let nested: i32 = rows.iter().filter(|row| row.level == 1).map(|row| row.size()).sum();
        assert_eq!(nested, 16);
        assert!(rows.iter().all(|row| !row.overlaps));
        assert!(matches!(rows.last().unwrap().entry, Entry::Padding(_)));
        assert_eq!(layout.total_padding, 32 - 12);
    }

    #[test]
    fn no_layout_for_unstructured_types() {
        let mut registry = TypeRegistry::new();
        let shape = register(
            &mut registry,
            TypeDefinition::new("Tests", "", "IShape", TypeCategory::Interface),
        );
        let pair = register(
            &mut registry,
            TypeDefinition::new("Tests", "", "Pair`1", TypeCategory::Struct)
                .with_generic_params(&["T"])
                .with_field(
                    "first",
                    TypeDescriptor::GenericParameter {
                        index: 0,
                        name: "T".into(),
                    },
                ),
        );

        let mut analyzer = Analyzer::new(Platform::X64);
        for descriptor in [
            Primitive::Int32.into(),
            TypeDescriptor::Pointer(Box::new(Primitive::Int32.into())),
            TypeDescriptor::Array {
                element: Box::new(Primitive::Byte.into()),
                rank: 0,
            },
            shape,
            pair,
        ] {
            assert!(analyzer.analyze(&registry, &descriptor).unwrap().is_none());
        }
    }

    #[test]
    fn sizes() {
        let mut registry = TypeRegistry::new();
        let guid = corelib::resolve(&mut registry, "System.Guid").unwrap();
        let mut analyzer = Analyzer::new(Platform::X86);

        let (name, size) = analyzer
            .get_name_and_size(&registry, &Primitive::IntPtr.into(), &[true])
            .unwrap();
        assert_eq!((name.value(), size), ("nint", 4));

        let (_, size) = analyzer.get_name_and_size(&registry, &guid, &[]).unwrap();
        assert_eq!(size, 16);

        let array = TypeDescriptor::Array {
            element: Box::new(guid),
            rank: 2,
        };
        let (name, size) = analyzer.get_name_and_size(&registry, &array, &[]).unwrap();
        assert_eq!((name.value(), size), ("Guid[,]", 4));
    }
}
