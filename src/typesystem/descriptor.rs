//! The shape of a type as seen by the formatter and the layout analyzer.

use std::fmt;

use crate::typesystem::Primitive;

/// Classification of a named type, driving both token coloring and layout rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    /// Reference type.
    Class,
    /// Value type.
    Struct,
    /// Value type deriving from `System.Enum`.
    Enum,
    /// Interface; has no layout of its own.
    Interface,
}

impl TypeCategory {
    /// `true` for structs and enums.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        matches!(self, TypeCategory::Struct | TypeCategory::Enum)
    }
}

/// Index of a [`crate::typesystem::TypeDefinition`] inside its owning registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(pub usize);

/// A reference to a named type definition.
///
/// `def` is `None` when the definition could not be resolved inside the load context; such
/// handles can still be rendered, but asking for their layout fails.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    /// Namespace, empty for nested types and the global namespace.
    pub namespace: String,
    /// Simple name, including the `` `N `` arity suffix of generic definitions.
    pub name: String,
    /// Value or reference classification.
    pub category: TypeCategory,
    /// Resolved definition.
    pub def: Option<DefId>,
}

impl TypeHandle {
    /// Create a handle.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        category: TypeCategory,
        def: Option<DefId>,
    ) -> Self {
        TypeHandle {
            namespace: namespace.into(),
            name: name.into(),
            category,
            def,
        }
    }

    /// The name without its generic arity suffix.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self.name.rfind('`') {
            Some(tick) if self.name[tick + 1..].bytes().all(|b| b.is_ascii_digit()) => {
                &self.name[..tick]
            }
            _ => &self.name,
        }
    }

    /// `true` if this names `System.Nullable`1`.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.namespace == "System" && self.name == "Nullable`1"
    }
}

/// A type, structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    /// Built-in type.
    Primitive(Primitive),
    /// Unmanaged pointer to the inner type.
    Pointer(Box<TypeDescriptor>),
    /// Array of `element`. Rank `0` is the single-dimension zero-based vector (`T[]`), any
    /// other value is a general array of that rank. Jagged arrays nest.
    Array {
        /// Element type.
        element: Box<TypeDescriptor>,
        /// Array rank.
        rank: u32,
    },
    /// Instantiation of a generic definition.
    Generic {
        /// The definition, a `Named` or `Nested` descriptor.
        definition: Box<TypeDescriptor>,
        /// Type arguments in declaration order.
        arguments: Vec<TypeDescriptor>,
    },
    /// A type nested in `declaring`.
    Nested {
        /// Enclosing type.
        declaring: Box<TypeDescriptor>,
        /// The nested type itself.
        handle: TypeHandle,
    },
    /// A top-level named type.
    Named(TypeHandle),
    /// Type parameter of an uninstantiated generic definition.
    GenericParameter {
        /// Position in the declaring type's parameter list.
        index: u32,
        /// Declared name.
        name: String,
    },
}

impl TypeDescriptor {
    /// The handle of a `Named`, `Nested` or `Generic` descriptor.
    #[must_use]
    pub fn handle(&self) -> Option<&TypeHandle> {
        match self {
            TypeDescriptor::Named(handle) | TypeDescriptor::Nested { handle, .. } => Some(handle),
            TypeDescriptor::Generic { definition, .. } => definition.handle(),
            _ => None,
        }
    }

    /// The category of named types; `None` for primitives, pointers, arrays and parameters.
    #[must_use]
    pub fn category(&self) -> Option<TypeCategory> {
        self.handle().map(|handle| handle.category)
    }

    /// `true` for value types, primitive or named.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            TypeDescriptor::Primitive(primitive) => {
                !primitive.is_reference() && *primitive != Primitive::Void
            }
            _ => self.category().is_some_and(|category| category.is_value_type()),
        }
    }

    /// `true` if the type contains a generic parameter anywhere.
    #[must_use]
    pub fn is_open(&self) -> bool {
        match self {
            TypeDescriptor::GenericParameter { .. } => true,
            TypeDescriptor::Primitive(_) | TypeDescriptor::Named(_) => false,
            TypeDescriptor::Pointer(inner) => inner.is_open(),
            TypeDescriptor::Array { element, .. } => element.is_open(),
            TypeDescriptor::Generic {
                definition,
                arguments,
            } => definition.is_open() || arguments.iter().any(TypeDescriptor::is_open),
            TypeDescriptor::Nested { declaring, .. } => declaring.is_open(),
        }
    }

    /// Replace every generic parameter by the argument at its index.
    ///
    /// Parameters without a matching argument are kept.
    #[must_use]
    pub fn substitute(&self, arguments: &[TypeDescriptor]) -> TypeDescriptor {
        if arguments.is_empty() {
            return self.clone();
        }

        match self {
            TypeDescriptor::GenericParameter { index, .. } => arguments
                .get(*index as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeDescriptor::Primitive(_) | TypeDescriptor::Named(_) => self.clone(),
            TypeDescriptor::Pointer(inner) => {
                TypeDescriptor::Pointer(Box::new(inner.substitute(arguments)))
            }
            TypeDescriptor::Array { element, rank } => TypeDescriptor::Array {
                element: Box::new(element.substitute(arguments)),
                rank: *rank,
            },
            TypeDescriptor::Generic {
                definition,
                arguments: own,
            } => TypeDescriptor::Generic {
                definition: definition.clone(),
                arguments: own.iter().map(|arg| arg.substitute(arguments)).collect(),
            },
            TypeDescriptor::Nested { declaring, handle } => TypeDescriptor::Nested {
                declaring: Box::new(declaring.substitute(arguments)),
                handle: handle.clone(),
            },
        }
    }

    /// Number of `IntPtr`/`UIntPtr` occurrences, in the order the formatter visits them.
    #[must_use]
    pub fn native_integer_count(&self) -> usize {
        match self {
            TypeDescriptor::Primitive(primitive) => usize::from(primitive.is_native_integer()),
            TypeDescriptor::Pointer(inner) => inner.native_integer_count(),
            TypeDescriptor::Array { element, .. } => element.native_integer_count(),
            TypeDescriptor::Generic {
                definition,
                arguments,
            } => {
                definition.native_integer_count()
                    + arguments
                        .iter()
                        .map(TypeDescriptor::native_integer_count)
                        .sum::<usize>()
            }
            TypeDescriptor::Nested { declaring, .. } => declaring.native_integer_count(),
            TypeDescriptor::Named(_) | TypeDescriptor::GenericParameter { .. } => 0,
        }
    }
}

impl From<Primitive> for TypeDescriptor {
    fn from(primitive: Primitive) -> Self {
        TypeDescriptor::Primitive(primitive)
    }
}

impl From<TypeHandle> for TypeDescriptor {
    fn from(handle: TypeHandle) -> Self {
        TypeDescriptor::Named(handle)
    }
}

/// Reflection-style name (`System.Collections.Generic.List`1[System.Int32]`), used in logs.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Primitive(primitive) => write!(f, "System.{}", primitive.type_name()),
            TypeDescriptor::Pointer(inner) => write!(f, "{inner}*"),
            TypeDescriptor::Array { element, rank } => {
                write!(f, "{element}[")?;
                for _ in 1..*rank {
                    f.write_str(",")?;
                }
                f.write_str("]")
            }
            TypeDescriptor::Generic {
                definition,
                arguments,
            } => {
                write!(f, "{definition}[")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str("]")
            }
            TypeDescriptor::Nested { declaring, handle } => {
                write!(f, "{declaring}+{}", handle.name)
            }
            TypeDescriptor::Named(handle) => {
                if handle.namespace.is_empty() {
                    f.write_str(&handle.name)
                } else {
                    write!(f, "{}.{}", handle.namespace, handle.name)
                }
            }
            TypeDescriptor::GenericParameter { name, .. } => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(argument: TypeDescriptor) -> TypeDescriptor {
        TypeDescriptor::Generic {
            definition: Box::new(TypeDescriptor::Named(TypeHandle::new(
                "System.Collections.Generic",
                "List`1",
                TypeCategory::Class,
                None,
            ))),
            arguments: vec![argument],
        }
    }

    #[test]
    fn display_names() {
        let handle = TypeHandle::new("System", "Nullable`1", TypeCategory::Struct, None);
        assert_eq!(handle.display_name(), "Nullable");
        assert!(handle.is_nullable());

        let odd = TypeHandle::new("", "Weird`Name", TypeCategory::Class, None);
        assert_eq!(odd.display_name(), "Weird`Name");
    }

    #[test]
    fn substitution() {
        let open = list_of(TypeDescriptor::Pointer(Box::new(
            TypeDescriptor::GenericParameter {
                index: 0,
                name: "T".into(),
            },
        )));
        assert!(open.is_open());

        let closed = open.substitute(&[Primitive::IntPtr.into()]);
        assert!(!closed.is_open());
        assert_eq!(closed, list_of(TypeDescriptor::Pointer(Box::new(Primitive::IntPtr.into()))));
        assert_eq!(closed.native_integer_count(), 1);
        assert_eq!(
            closed.to_string(),
            "System.Collections.Generic.List`1[System.IntPtr*]"
        );
    }

    #[test]
    fn value_types() {
        assert!(TypeDescriptor::from(Primitive::Int32).is_value_type());
        assert!(!TypeDescriptor::from(Primitive::String).is_value_type());
        assert!(!list_of(Primitive::Int32.into()).is_value_type());
        assert!(TypeDescriptor::Named(TypeHandle::new(
            "System",
            "DayOfWeek",
            TypeCategory::Enum,
            None
        ))
        .is_value_type());
    }
}
