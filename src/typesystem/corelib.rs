//! Core library types known without their defining assembly.
//!
//! Build output directories rarely contain the framework assemblies, yet user types embed
//! `DateTime`, `Guid` or `int?` all the time. The definitions here mirror the private field
//! layout of the corresponding `System.Private.CoreLib` types and are registered on demand.

use log::debug;

use crate::typesystem::{
    LayoutKind, Primitive, TypeCategory, TypeDefinition, TypeDescriptor, TypeRegistry,
};

/// Assembly name the well-known definitions are registered under.
pub const CORELIB: &str = "System.Private.CoreLib";

const FACADES: &[&str] = &[CORELIB, "System.Runtime", "mscorlib", "netstandard"];

/// `true` for assemblies whose types are forwarded to the core library.
#[must_use]
pub fn is_corelib_assembly(name: &str) -> bool {
    FACADES.iter().any(|facade| facade.eq_ignore_ascii_case(name))
}

/// `true` if `full_name` is one of the types this module can define.
#[must_use]
pub fn is_well_known(full_name: &str) -> bool {
    Primitive::from_full_name(full_name).is_some() || definition(full_name).is_some()
}

/// Resolve a core library type by full name, registering its definition on first use.
///
/// Primitives come back as [`TypeDescriptor::Primitive`]; everything else as a named
/// descriptor pointing into `registry`.
pub fn resolve(registry: &mut TypeRegistry, full_name: &str) -> Option<TypeDescriptor> {
    if let Some(primitive) = Primitive::from_full_name(full_name) {
        return Some(TypeDescriptor::Primitive(primitive));
    }

    if let Some(id) = registry.find(CORELIB, full_name) {
        return registry.handle(id).map(TypeDescriptor::Named);
    }

    let mut definition = definition(full_name)?;
    if full_name == "System.DateTimeOffset" {
        let date_time = resolve(registry, "System.DateTime")?;
        definition = definition.with_field("_dateTime", date_time);
        definition = definition.with_field("_offsetMinutes", Primitive::Int16);
    }

    if definition.category.is_value_type() {
        let base = if definition.category == TypeCategory::Enum {
            "System.Enum"
        } else {
            "System.ValueType"
        };
        definition.base = resolve(registry, base);
    }

    debug!("Registering core library type {full_name}");
    let id = registry.insert(definition);
    registry.handle(id).map(TypeDescriptor::Named)
}

fn parameter(index: u32, name: &str) -> TypeDescriptor {
    TypeDescriptor::GenericParameter {
        index,
        name: name.to_string(),
    }
}

fn value_type(name: &str, layout: LayoutKind) -> TypeDefinition {
    TypeDefinition::new(CORELIB, "System", name, TypeCategory::Struct).with_layout(layout)
}

fn enumeration(name: &str) -> TypeDefinition {
    let mut definition = TypeDefinition::new(CORELIB, "System", name, TypeCategory::Enum)
        .with_field("value__", Primitive::Int32);
    definition.fields[0].is_public = true;
    definition
}

fn value_tuple(arity: u32) -> TypeDefinition {
    let names: Vec<String> = (1..=arity)
        .map(|index| {
            if index == 8 {
                "TRest".to_string()
            } else {
                format!("T{index}")
            }
        })
        .collect();
    let params: Vec<&str> = names.iter().map(String::as_str).collect();

    let mut definition = value_type(&format!("ValueTuple`{arity}"), LayoutKind::Auto)
        .with_generic_params(&params);
    for index in 0..arity {
        let field = if index == 7 {
            "Rest".to_string()
        } else {
            format!("Item{}", index + 1)
        };
        definition = definition.with_field(&field, parameter(index, params[index as usize]));
        if let Some(field) = definition.fields.last_mut() {
            field.is_public = true;
        }
    }
    definition
}

fn definition(full_name: &str) -> Option<TypeDefinition> {
    let definition = match full_name {
        "System.ValueType" | "System.Enum" => {
            let name = full_name.trim_start_matches("System.");
            TypeDefinition::new(CORELIB, "System", name, TypeCategory::Class)
        }
        "System.Nullable`1" => value_type("Nullable`1", LayoutKind::Sequential)
            .with_generic_params(&["T"])
            .with_field("hasValue", Primitive::Boolean)
            .with_field("value", parameter(0, "T")),
        "System.Collections.Generic.KeyValuePair`2" => TypeDefinition::new(
            CORELIB,
            "System.Collections.Generic",
            "KeyValuePair`2",
            TypeCategory::Struct,
        )
        .with_layout(LayoutKind::Sequential)
        .with_generic_params(&["TKey", "TValue"])
        .with_field("key", parameter(0, "TKey"))
        .with_field("value", parameter(1, "TValue")),
        "System.DateTime" => {
            value_type("DateTime", LayoutKind::Auto).with_field("_dateData", Primitive::UInt64)
        }
        "System.TimeSpan" => {
            value_type("TimeSpan", LayoutKind::Sequential).with_field("_ticks", Primitive::Int64)
        }
        "System.DateTimeOffset" => value_type("DateTimeOffset", LayoutKind::Auto),
        "System.Guid" => {
            let mut guid = value_type("Guid", LayoutKind::Sequential)
                .with_field("_a", Primitive::Int32)
                .with_field("_b", Primitive::Int16)
                .with_field("_c", Primitive::Int16);
            for name in ["_d", "_e", "_f", "_g", "_h", "_i", "_j", "_k"] {
                guid = guid.with_field(name, Primitive::Byte);
            }
            guid
        }
        "System.Decimal" => value_type("Decimal", LayoutKind::Sequential)
            .with_field("_flags", Primitive::Int32)
            .with_field("_hi32", Primitive::UInt32)
            .with_field("_lo64", Primitive::UInt64),
        "System.DayOfWeek" => enumeration("DayOfWeek"),
        "System.DateTimeKind" => enumeration("DateTimeKind"),
        _ => {
            let arity = full_name.strip_prefix("System.ValueTuple`")?.parse().ok()?;
            if !(1..=8).contains(&arity) {
                return None;
            }
            value_tuple(arity)
        }
    };

    Some(definition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_not_registered() {
        let mut registry = TypeRegistry::new();
        assert_eq!(
            resolve(&mut registry, "System.Int64"),
            Some(TypeDescriptor::Primitive(Primitive::Int64))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn registered_once() {
        let mut registry = TypeRegistry::new();
        let first = resolve(&mut registry, "System.DateTimeOffset").unwrap();
        let count = registry.len();
        let second = resolve(&mut registry, "System.DateTimeOffset").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), count);

        let id = registry.find(CORELIB, "System.DateTimeOffset").unwrap();
        let definition = registry.get(id).unwrap();
        assert_eq!(definition.category, TypeCategory::Struct);
        assert_eq!(definition.fields.len(), 2);
        assert!(registry.find(CORELIB, "System.DateTime").is_some());
        assert!(registry.find(CORELIB, "System.ValueType").is_some());
    }

    #[test]
    fn generic_definitions() {
        let mut registry = TypeRegistry::new();
        resolve(&mut registry, "System.ValueTuple`3").unwrap();
        let id = registry.find(CORELIB, "System.ValueTuple`3").unwrap();
        let tuple = registry.get(id).unwrap();
        assert_eq!(tuple.generic_params, vec!["T1", "T2", "T3"]);
        assert_eq!(tuple.fields[2].name, "Item3");
        assert!(tuple.fields[2].is_public);

        assert!(resolve(&mut registry, "System.ValueTuple`9").is_none());
        assert!(resolve(&mut registry, "System.Span`1").is_none());
    }

    #[test]
    fn enums_and_facades() {
        let mut registry = TypeRegistry::new();
        let day = resolve(&mut registry, "System.DayOfWeek").unwrap();
        assert_eq!(day.category(), Some(TypeCategory::Enum));
        assert!(is_corelib_assembly("System.Runtime"));
        assert!(is_corelib_assembly("MSCORLIB"));
        assert!(!is_corelib_assembly("Sample"));
        assert!(is_well_known("System.Guid"));
        assert!(is_well_known("System.String"));
        assert!(!is_well_known("System.Uri"));
    }
}
