//! Layout computation through the public API, without any assembly on disk.

use layoutscope::{
    formatting::{NameFormatter, TokenKind},
    layout::{Analyzer, Entry, Platform},
    typesystem::{
        corelib, FieldDefinition, LayoutKind, Primitive, TypeCategory, TypeDefinition,
        TypeDescriptor, TypeRegistry,
    },
    Error,
};

fn register(registry: &mut TypeRegistry, definition: TypeDefinition) -> TypeDescriptor {
    let id = registry.insert(definition);
    registry.descriptor(id).unwrap()
}

fn explicit_field(name: &str, field_type: Primitive, offset: u32) -> FieldDefinition {
    let mut field = FieldDefinition::instance(name, field_type.into(), true);
    field.explicit_offset = Some(offset);
    field
}

#[test]
fn packed_sequential_struct() {
    let mut registry = TypeRegistry::new();
    let mut packet = TypeDefinition::new("Tests", "Net", "Packet", TypeCategory::Struct)
        .with_layout(LayoutKind::Sequential)
        .with_field("kind", Primitive::Byte)
        .with_field("length", Primitive::Int32);
    packet.pack = 1;
    let packet = register(&mut registry, packet);

    let mut analyzer = Analyzer::new(Platform::X64);
    let layout = analyzer.analyze(&registry, &packet).unwrap().unwrap();
    assert_eq!(layout.total_size, 5);
    assert_eq!(layout.total_padding, 0);
    assert_eq!(layout.attribute_pack, 1);
    assert_eq!(layout.fields[1].offset, 1);
    assert!(layout.fields_with_paddings().iter().all(|row| !row.is_padding()));
}

#[test]
fn explicit_union_counts_shared_bytes_once() {
    let mut registry = TypeRegistry::new();
    let mut union = TypeDefinition::new("Tests", "Interop", "Variant", TypeCategory::Struct)
        .with_layout(LayoutKind::Explicit);
    union.fields.push(explicit_field("Wide", Primitive::Int64, 0));
    union.fields.push(explicit_field("Narrow", Primitive::Int32, 0));
    union.fields.push(explicit_field("Tag", Primitive::Byte, 8));
    let union = register(&mut registry, union);

    let mut analyzer = Analyzer::new(Platform::X64);
    let layout = analyzer.analyze(&registry, &union).unwrap().unwrap();
    assert_eq!(layout.total_size, 16);
    assert_eq!(layout.total_padding, 16 - 9);

    let rows = layout.fields_with_paddings();
    let overlapping: Vec<i32> = rows
        .iter()
        .filter(|row| row.overlaps)
        .map(|row| row.offset)
        .collect();
    assert_eq!(overlapping, vec![0]);

    let covered: i32 = rows
        .iter()
        .filter(|row| !row.overlaps)
        .map(|row| row.size())
        .sum();
    assert_eq!(covered, layout.total_size);
}

#[test]
fn derived_class_follows_base_fields() {
    let mut registry = TypeRegistry::new();
    let mut shape = TypeDefinition::new("Tests", "Geometry", "Shape", TypeCategory::Class)
        .with_field("id", Primitive::Int32);
    shape.base = Some(Primitive::Object.into());
    let shape = register(&mut registry, shape);

    let mut circle = TypeDefinition::new("Tests", "Geometry", "Circle", TypeCategory::Class)
        .with_field("radius", Primitive::Double);
    circle.base = Some(shape);
    let circle = register(&mut registry, circle);

    let mut analyzer = Analyzer::new(Platform::X64);
    let layout = analyzer.analyze(&registry, &circle).unwrap().unwrap();
    let fields: Vec<(&str, i32)> = layout
        .fields
        .iter()
        .map(|field| (field.type_and_name.value(), field.offset))
        .collect();
    assert_eq!(fields, vec![("int id", 0), ("double radius", 8)]);
    assert_eq!(layout.total_size, 32);
    assert!(!layout.is_value_type);
}

#[test]
fn unresolved_field_type_is_reported() {
    let mut registry = TypeRegistry::new();
    let missing = TypeDescriptor::Named(layoutscope::typesystem::TypeHandle::new(
        "Elsewhere",
        "Missing",
        TypeCategory::Struct,
        None,
    ));
    let holder = register(
        &mut registry,
        TypeDefinition::new("Tests", "", "Holder", TypeCategory::Struct)
            .with_field("value", missing),
    );

    let mut analyzer = Analyzer::new(Platform::X64);
    match analyzer.analyze(&registry, &holder) {
        Err(Error::LoadIsolation(name)) => assert_eq!(name, "Elsewhere.Missing"),
        other => panic!("expected a load isolation error, got {other:?}"),
    }
}

#[test]
fn platform_changes_native_sizes() {
    let mut registry = TypeRegistry::new();
    let handle = register(
        &mut registry,
        TypeDefinition::new("Tests", "", "Handle", TypeCategory::Struct)
            .with_layout(LayoutKind::Sequential)
            .with_field("flags", Primitive::Byte)
            .with_field("native", Primitive::IntPtr),
    );

    let sizes: Vec<i32> = [Platform::X86, Platform::X64]
        .into_iter()
        .map(|platform| {
            Analyzer::new(platform)
                .analyze(&registry, &handle)
                .unwrap()
                .unwrap()
                .total_size
        })
        .collect();
    assert_eq!(sizes, vec![8, 16]);
}

#[test]
fn nullable_names() {
    let mut registry = TypeRegistry::new();
    let nullable = corelib::resolve(&mut registry, "System.Nullable`1").unwrap();
    let maybe = TypeDescriptor::Generic {
        definition: Box::new(nullable),
        arguments: vec![Primitive::Int32.into()],
    };

    let mut formatter = NameFormatter::new(8);
    let name = formatter.format_field(&maybe, &[], "count");
    assert_eq!(name.value(), "int? count");
    assert_eq!(name.iter().next(), Some((TokenKind::Keyword, "int")));

    let mut analyzer = Analyzer::new(Platform::X64);
    let layout = analyzer.analyze(&registry, &maybe).unwrap().unwrap();
    assert_eq!(layout.name.value(), "int?");
    assert_eq!(layout.total_size, 8);
    assert_eq!(layout.total_padding, 3);
    assert!(matches!(
        layout.fields_with_paddings()[1].entry,
        Entry::Padding(_)
    ));
}
