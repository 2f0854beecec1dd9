//! The isolated load context of one analysis session.
//!
//! A [`LoadContext`] is rooted at the private copy of a build output directory. Assemblies are
//! loaded from there on first use, by simple name, and their metadata translated into the
//! context's own [`TypeRegistry`]. References to assemblies that are not part of the output
//! (the framework, mostly) fall back to [`corelib`] for the well-known value types and
//! otherwise stay unresolved handles, which make the analyzer fail with
//! [`crate::Error::LoadIsolation`] only if their layout is actually needed.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info, warn};

use crate::{
    metadata::{
        assembly::{AssemblyMetadata, TypeDefInfo, TypeRefScope},
        signatures::SignatureType,
        token::Token,
    },
    session::typename::{TypeModifier, TypeName},
    typesystem::{
        corelib, DefId, FieldDefinition, LayoutKind, Primitive, TypeCategory, TypeDefinition,
        TypeDescriptor, TypeHandle, TypeRegistry,
    },
    Error::{LoadIsolation, NotFound, RecursionLimit},
    Result,
};

const MAX_SIGNATURE_DEPTH: usize = 64;

const TYPE_REF_TABLE: u8 = 0x01;
const TYPE_DEF_TABLE: u8 = 0x02;
const TYPE_SPEC_TABLE: u8 = 0x1B;

#[derive(Debug, Clone)]
enum AssemblyState {
    Loaded {
        name: String,
        path: PathBuf,
        /// Registry length when translation started.
        first: usize,
    },
    Missing,
}

/// The assembly currently being translated.
struct Scope<'m> {
    metadata: &'m AssemblyMetadata,
    assembly: String,
    first: usize,
}

impl Scope<'_> {
    fn def_id(&self, rid: u32) -> Result<DefId> {
        if rid == 0 || rid as usize > self.metadata.types.len() {
            return Err(malformed_error!(
                "TypeDef row {} out of range in {}",
                rid,
                self.assembly
            ));
        }
        Ok(DefId(self.first + rid as usize - 1))
    }
}

enum Lookup {
    Primitive(Primitive),
    Definition(DefId),
}

/// Type definitions loaded from one directory.
#[derive(Debug)]
pub struct LoadContext {
    root: PathBuf,
    registry: TypeRegistry,
    assemblies: HashMap<String, AssemblyState>,
}

impl LoadContext {
    /// An empty context loading assemblies from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LoadContext {
            root: root.into(),
            registry: TypeRegistry::new(),
            assemblies: HashMap::new(),
        }
    }

    /// The directory assemblies are loaded from.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The definitions loaded so far.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Simple names of the assemblies loaded so far.
    pub fn loaded_assemblies(&self) -> impl Iterator<Item = &str> {
        self.assemblies.values().filter_map(|state| match state {
            AssemblyState::Loaded { name, .. } => Some(name.as_str()),
            AssemblyState::Missing => None,
        })
    }

    /// Load an assembly by simple name and return the name it is registered under.
    ///
    /// # Errors
    /// [`crate::Error::LoadIsolation`] if no such assembly exists in the context root, or the
    /// metadata reader's error if the file is damaged.
    pub fn load_assembly(&mut self, name: &str) -> Result<String> {
        self.try_load(name)?.ok_or_else(|| {
            LoadIsolation(format!(
                "assembly {name} not found in {}",
                self.root.display()
            ))
        })
    }

    /// Resolve a reflection type name against `assembly`, loading it if needed.
    ///
    /// Unqualified generic arguments are looked up in `assembly` first, then in the core
    /// library.
    ///
    /// # Errors
    /// [`crate::Error::Format`] for malformed names, [`crate::Error::NotFound`] if the type
    /// does not exist and [`crate::Error::LoadIsolation`] if the assembly cannot be loaded.
    pub fn resolve_type(&mut self, assembly: &str, type_name: &str) -> Result<TypeDescriptor> {
        let parsed = TypeName::parse(type_name)?;
        let assembly = if corelib::is_corelib_assembly(assembly) {
            assembly.to_string()
        } else {
            self.load_assembly(assembly)?
        };
        self.resolve_name(&parsed, &assembly, 0)
    }

    fn resolve_name(
        &mut self,
        name: &TypeName,
        default_assembly: &str,
        depth: usize,
    ) -> Result<TypeDescriptor> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(RecursionLimit(MAX_SIGNATURE_DEPTH));
        }

        let assembly = name.assembly.as_deref().unwrap_or(default_assembly);
        let lookup = match self.lookup(assembly, &name.full_name)? {
            Some(lookup) => lookup,
            None if name.assembly.is_none() => self
                .lookup(corelib::CORELIB, &name.full_name)?
                .ok_or_else(|| NotFound(format!("{} in {assembly}", name.full_name)))?,
            None => return Err(NotFound(format!("{} in {assembly}", name.full_name))),
        };

        let mut descriptor = match lookup {
            Lookup::Primitive(primitive) => TypeDescriptor::Primitive(primitive),
            Lookup::Definition(id) if name.arguments.is_empty() => self
                .registry
                .descriptor(id)
                .ok_or_else(|| NotFound(name.full_name.clone()))?,
            Lookup::Definition(id) => {
                let definition = self
                    .registry
                    .named_descriptor(id)
                    .ok_or_else(|| NotFound(name.full_name.clone()))?;
                let mut arguments = Vec::with_capacity(name.arguments.len());
                for argument in &name.arguments {
                    arguments.push(self.resolve_name(argument, default_assembly, depth + 1)?);
                }
                TypeDescriptor::Generic {
                    definition: Box::new(definition),
                    arguments,
                }
            }
        };

        for modifier in &name.modifiers {
            descriptor = match modifier {
                TypeModifier::Pointer | TypeModifier::ByRef => {
                    TypeDescriptor::Pointer(Box::new(descriptor))
                }
                TypeModifier::Array(rank) => TypeDescriptor::Array {
                    element: Box::new(descriptor),
                    rank: *rank,
                },
            };
        }
        Ok(descriptor)
    }

    fn lookup(&mut self, assembly: &str, full_name: &str) -> Result<Option<Lookup>> {
        if let Some(primitive) = Primitive::from_full_name(full_name) {
            return Ok(Some(Lookup::Primitive(primitive)));
        }

        if corelib::is_corelib_assembly(assembly) {
            if corelib::resolve(&mut self.registry, full_name).is_none() {
                return Ok(None);
            }
            return Ok(self
                .registry
                .find(corelib::CORELIB, full_name)
                .map(Lookup::Definition));
        }

        let assembly = self.load_assembly(assembly)?;
        Ok(self
            .registry
            .find(&assembly, full_name)
            .map(Lookup::Definition))
    }

    fn probe(&self, name: &str) -> Result<Option<PathBuf>> {
        let mut executable = None;
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            let stem_matches = path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy().eq_ignore_ascii_case(name));
            let extension = path
                .extension()
                .map(|extension| extension.to_string_lossy().to_ascii_lowercase());
            match extension.as_deref() {
                Some("dll") if stem_matches => return Ok(Some(path)),
                Some("exe") if stem_matches => executable = Some(path),
                _ => {}
            }
        }
        Ok(executable)
    }

    fn try_load(&mut self, name: &str) -> Result<Option<String>> {
        let key = name.to_ascii_lowercase();
        match self.assemblies.get(&key) {
            Some(AssemblyState::Loaded { name, .. }) => return Ok(Some(name.clone())),
            Some(AssemblyState::Missing) => return Ok(None),
            None => {}
        }

        let Some(path) = self.probe(name)? else {
            debug!("Assembly {name} is not part of {}", self.root.display());
            self.assemblies.insert(key, AssemblyState::Missing);
            return Ok(None);
        };

        let metadata = match AssemblyMetadata::from_path(&path) {
            Ok(metadata) => metadata,
            Err(error) => {
                self.assemblies.insert(key, AssemblyState::Missing);
                return Err(error);
            }
        };

        let assembly = if metadata.name.is_empty() {
            name.to_string()
        } else {
            metadata.name.clone()
        };
        info!(
            "Loading {assembly} {} from {}",
            metadata
                .version
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join("."),
            path.display()
        );

        let first = self.registry.len();
        let state = AssemblyState::Loaded {
            name: assembly.clone(),
            path,
            first,
        };
        self.assemblies
            .insert(assembly.to_ascii_lowercase(), state.clone());
        self.assemblies.insert(key.clone(), state);

        if let Err(error) = self.translate(&metadata, &assembly) {
            warn!("Translating {assembly} failed, discarding its types: {error}");
            self.discard_from(first);
            self.assemblies
                .insert(assembly.to_ascii_lowercase(), AssemblyState::Missing);
            self.assemblies.insert(key, AssemblyState::Missing);
            return Err(error);
        }
        Ok(Some(assembly))
    }

    /// Forget every definition registered from `first` on, together with the assemblies that
    /// registered them, so they are translated again on next use.
    fn discard_from(&mut self, first: usize) {
        self.registry.truncate(first);
        self.assemblies.retain(|_, state| match state {
            AssemblyState::Loaded { first: start, .. } => *start < first,
            AssemblyState::Missing => true,
        });
    }

    /// Register every type of `metadata`, then fill in bases and fields. Types are registered
    /// before any reference is followed so cyclic references between assemblies resolve.
    fn translate(&mut self, metadata: &AssemblyMetadata, assembly: &str) -> Result<()> {
        let scope = Scope {
            metadata,
            assembly: assembly.to_string(),
            first: self.registry.len(),
        };

        let mut definitions = Vec::with_capacity(metadata.types.len());
        for info in &metadata.types {
            let mut definition = TypeDefinition::new(
                assembly,
                info.namespace.as_str(),
                info.name.as_str(),
                category_of(metadata, info),
            );
            definition.layout = LayoutKind::from_type_attributes(info.flags.layout());
            if let Some((pack, class_size)) = info.class_layout {
                definition.pack = pack;
                definition.class_size = class_size;
            }
            definition.generic_params.clone_from(&info.generic_params);
            definition.declaring = match info.enclosing {
                Some(rid) => Some(scope.def_id(rid)?),
                None => None,
            };
            definitions.push(definition);
        }
        self.registry.extend(definitions);

        for info in &metadata.types {
            let id = scope.def_id(info.rid)?;
            let category = self.registry.get(id).map(|definition| definition.category);

            let base = match info.extends {
                Some(token) if category != Some(TypeCategory::Interface) => Some(
                    self.token_descriptor(&scope, token, TypeCategory::Class, &info.generic_params, 0)?,
                ),
                _ => None,
            };

            let mut fields = Vec::with_capacity(info.fields.len());
            for rid in &info.fields {
                let Some(field) = metadata.field(*rid) else {
                    return Err(malformed_error!(
                        "Field row {} of {} out of range",
                        rid,
                        info.name
                    ));
                };

                fields.push(FieldDefinition {
                    name: field.name.clone(),
                    field_type: self.signature_descriptor(
                        &scope,
                        &field.signature,
                        &info.generic_params,
                        0,
                    )?,
                    is_public: field.flags.is_public(),
                    is_static: !field.flags.is_instance(),
                    explicit_offset: field.explicit_offset,
                    native_integers: field.native_integers.clone(),
                });
            }

            if let Some(definition) = self.registry.get_mut(id) {
                definition.base = base;
                definition.fields = fields;
            }
        }

        debug!(
            "Translated {} types of {assembly}, registry holds {}",
            metadata.types.len(),
            self.registry.len()
        );
        Ok(())
    }

    fn signature_descriptor(
        &mut self,
        scope: &Scope<'_>,
        signature: &SignatureType,
        generic_params: &[String],
        depth: usize,
    ) -> Result<TypeDescriptor> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(RecursionLimit(MAX_SIGNATURE_DEPTH));
        }
        if let Some(primitive) = Primitive::from_signature(signature) {
            return Ok(TypeDescriptor::Primitive(primitive));
        }

        let descriptor = match signature {
            SignatureType::Ptr(inner) | SignatureType::ByRef(inner) => TypeDescriptor::Pointer(
                Box::new(self.signature_descriptor(scope, inner, generic_params, depth + 1)?),
            ),
            SignatureType::FnPtr => {
                TypeDescriptor::Pointer(Box::new(TypeDescriptor::Primitive(Primitive::Void)))
            }
            SignatureType::SzArray(element) => TypeDescriptor::Array {
                element: Box::new(self.signature_descriptor(
                    scope,
                    element,
                    generic_params,
                    depth + 1,
                )?),
                rank: 0,
            },
            SignatureType::Array { element, rank } => TypeDescriptor::Array {
                element: Box::new(self.signature_descriptor(
                    scope,
                    element,
                    generic_params,
                    depth + 1,
                )?),
                rank: (*rank).max(1),
            },
            SignatureType::ValueType(token) => {
                self.token_descriptor(scope, *token, TypeCategory::Struct, generic_params, depth + 1)?
            }
            SignatureType::Class(token) => {
                self.token_descriptor(scope, *token, TypeCategory::Class, generic_params, depth + 1)?
            }
            SignatureType::GenericInst {
                is_value_type,
                definition,
                arguments,
            } => {
                let hint = if *is_value_type {
                    TypeCategory::Struct
                } else {
                    TypeCategory::Class
                };
                let definition =
                    self.token_descriptor(scope, *definition, hint, generic_params, depth + 1)?;

                let mut resolved = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    resolved.push(self.signature_descriptor(
                        scope,
                        argument,
                        generic_params,
                        depth + 1,
                    )?);
                }
                TypeDescriptor::Generic {
                    definition: Box::new(definition),
                    arguments: resolved,
                }
            }
            SignatureType::Var(index) => TypeDescriptor::GenericParameter {
                index: *index,
                name: generic_params
                    .get(*index as usize)
                    .cloned()
                    .unwrap_or_else(|| format!("T{index}")),
            },
            SignatureType::MVar(index) => TypeDescriptor::GenericParameter {
                index: *index,
                name: format!("!!{index}"),
            },
            other => {
                return Err(malformed_error!(
                    "Unexpected element in field signature - {:?}",
                    other
                ))
            }
        };
        Ok(descriptor)
    }

    fn token_descriptor(
        &mut self,
        scope: &Scope<'_>,
        token: Token,
        hint: TypeCategory,
        generic_params: &[String],
        depth: usize,
    ) -> Result<TypeDescriptor> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(RecursionLimit(MAX_SIGNATURE_DEPTH));
        }

        match token.table() {
            TYPE_DEF_TABLE => {
                let id = scope.def_id(token.row())?;
                self.registry
                    .named_descriptor(id)
                    .ok_or_else(|| malformed_error!("TypeDef {:?} is not registered", token))
            }
            TYPE_REF_TABLE => self.type_ref_descriptor(scope, token.row(), hint, depth + 1),
            TYPE_SPEC_TABLE => {
                let Some(signature) = scope.metadata.type_spec(token.row()) else {
                    return Err(malformed_error!("TypeSpec {:?} out of range", token));
                };
                self.signature_descriptor(scope, signature, generic_params, depth + 1)
            }
            _ => Err(malformed_error!("Invalid type token - {:?}", token)),
        }
    }

    fn type_ref_descriptor(
        &mut self,
        scope: &Scope<'_>,
        rid: u32,
        hint: TypeCategory,
        depth: usize,
    ) -> Result<TypeDescriptor> {
        if depth > MAX_SIGNATURE_DEPTH {
            return Err(RecursionLimit(MAX_SIGNATURE_DEPTH));
        }

        let metadata = scope.metadata;
        let Some(info) = metadata.type_ref(rid) else {
            return Err(malformed_error!("TypeRef row {} out of range", rid));
        };
        let full_name = metadata.type_ref_full_name(rid);

        let resolved = match metadata.type_ref_assembly(rid) {
            Some(assembly) => self.resolve_external(assembly, &full_name),
            None => self
                .registry
                .find(&scope.assembly, &full_name)
                .and_then(|id| self.registry.named_descriptor(id)),
        };
        if let Some(descriptor) = resolved {
            return Ok(descriptor);
        }

        let handle = TypeHandle::new(info.namespace.as_str(), info.name.as_str(), hint, None);
        match info.scope {
            TypeRefScope::Enclosing(parent) => {
                let declaring =
                    self.type_ref_descriptor(scope, parent, TypeCategory::Class, depth + 1)?;
                Ok(TypeDescriptor::Nested {
                    declaring: Box::new(declaring),
                    handle,
                })
            }
            _ => {
                debug!("Leaving {full_name} unresolved");
                Ok(TypeDescriptor::Named(handle))
            }
        }
    }

    /// A type of another assembly: from the context root if present there, else from the
    /// core library definitions.
    fn resolve_external(&mut self, assembly: &str, full_name: &str) -> Option<TypeDescriptor> {
        if !corelib::is_corelib_assembly(assembly) {
            match self.try_load(assembly) {
                Ok(Some(loaded)) => {
                    if let Some(id) = self.registry.find(&loaded, full_name) {
                        return self.registry.named_descriptor(id);
                    }
                }
                Ok(None) => {}
                Err(error) => warn!("Failed to load dependency {assembly}: {error}"),
            }
        }

        corelib::resolve(&mut self.registry, full_name)
    }
}

/// Category from the interface flag and the name of the base type.
fn category_of(metadata: &AssemblyMetadata, info: &TypeDefInfo) -> TypeCategory {
    if info.flags.is_interface() {
        return TypeCategory::Interface;
    }

    let base = match info.extends {
        Some(token) if token.table() == TYPE_REF_TABLE => metadata.type_ref_full_name(token.row()),
        Some(token) if token.table() == TYPE_DEF_TABLE => metadata.full_name(token.row()),
        _ => return TypeCategory::Class,
    };

    match base.as_str() {
        "System.Enum" => TypeCategory::Enum,
        "System.ValueType" if !(info.namespace == "System" && info.name == "Enum") => {
            TypeCategory::Struct
        }
        _ => TypeCategory::Class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{
        class_def, element, generic_inst, value_type_def, value_type_ref, write_assembly,
        FieldSpec, ImageBuilder, TypeSpecBuilder,
    };

    fn sample(directory: &Path) {
        let image = ImageBuilder::new()
            .assembly("Sample")
            .type_ref("Geometry", "Geometry", "Vector")
            .type_def(
                TypeSpecBuilder::value_type("Sample", "Point")
                    .sequential()
                    .field(FieldSpec::public("X", &[element::I4]))
                    .field(FieldSpec::public("Y", &[element::I4])),
            )
            .type_def(TypeSpecBuilder::enumeration("Sample", "Kind", &[element::U1]))
            .type_def(
                TypeSpecBuilder::class("Sample", "Shape")
                    .field(FieldSpec::private("origin", &value_type_def(2)))
                    .field(FieldSpec::private("kind", &value_type_def(3)))
                    .field(FieldSpec::private("next", &class_def(4)))
                    .field(FieldSpec::private("direction", &value_type_ref(4)))
                    .field(FieldSpec::static_field("Count", &[element::I4])),
            )
            .type_def(
                TypeSpecBuilder::value_type("Sample", "Box`1")
                    .generic(&["T"])
                    .field(FieldSpec::public("Value", &[element::VAR, 0])),
            )
            .type_def(
                TypeSpecBuilder::value_type("", "Cell")
                    .nested_in("Sample", "Shape")
                    .field(FieldSpec::public(
                        "Boxed",
                        &generic_inst(true, 0, 5, &[vec![element::I8]]),
                    )),
            );
        write_assembly(directory, "Sample", &image);
    }

    #[test]
    fn translate_definitions() {
        let scratch = tempfile::tempdir().unwrap();
        sample(scratch.path());

        let mut context = LoadContext::new(scratch.path());
        assert_eq!(context.load_assembly("sample").unwrap(), "Sample");
        assert_eq!(context.loaded_assemblies().collect::<Vec<_>>(), vec!["Sample"]);

        let registry = context.registry();
        let point = registry.find("Sample", "Sample.Point").unwrap();
        let definition = registry.get(point).unwrap();
        assert_eq!(definition.category, TypeCategory::Struct);
        assert_eq!(definition.layout, LayoutKind::Sequential);
        assert_eq!(definition.fields.len(), 2);

        let kind = registry.find("Sample", "Sample.Kind").unwrap();
        assert_eq!(registry.get(kind).unwrap().category, TypeCategory::Enum);

        let shape = registry.find("Sample", "Sample.Shape").unwrap();
        let shape = registry.get(shape).unwrap();
        assert_eq!(shape.category, TypeCategory::Class);
        assert_eq!(shape.base, Some(TypeDescriptor::Primitive(Primitive::Object)));
        assert_eq!(shape.instance_fields().count(), 4);
        assert_eq!(shape.fields[0].field_type.handle().unwrap().def, Some(point));

        // Geometry.dll is not in the output directory
        let direction = &shape.fields[3].field_type;
        assert_eq!(direction.handle().unwrap().def, None);
        assert_eq!(direction.category(), Some(TypeCategory::Struct));

        let cell = registry.find("Sample", "Sample.Shape+Cell").unwrap();
        let boxed = &registry.get(cell).unwrap().fields[0].field_type;
        assert_eq!(
            boxed.to_string(),
            "Sample.Box`1[System.Int64]"
        );
    }

    #[test]
    fn resolve_requested_names() {
        let scratch = tempfile::tempdir().unwrap();
        sample(scratch.path());
        let mut context = LoadContext::new(scratch.path());

        let point = context.resolve_type("Sample", "Sample.Point").unwrap();
        assert_eq!(point.to_string(), "Sample.Point");

        let open = context.resolve_type("Sample", "Sample.Box`1").unwrap();
        assert!(open.is_open());

        let closed = context
            .resolve_type(
                "Sample",
                "Sample.Box`1[[Sample.Point, Sample]]",
            )
            .unwrap();
        assert!(!closed.is_open());

        let nullable = context
            .resolve_type("Sample", "Sample.Box`1[System.Nullable`1[System.Int32]]")
            .unwrap();
        assert_eq!(
            nullable.to_string(),
            "Sample.Box`1[System.Nullable`1[System.Int32]]"
        );

        assert!(matches!(
            context.resolve_type("Sample", "Sample.Missing"),
            Err(NotFound(_))
        ));
        assert!(matches!(
            context.resolve_type("Absent", "Sample.Point"),
            Err(LoadIsolation(_))
        ));
        assert!(matches!(
            context.resolve_type("Sample", "Sample.Box`1[["),
            Err(crate::Error::Format(_))
        ));
    }

    #[test]
    fn dependencies_from_the_same_directory() {
        let scratch = tempfile::tempdir().unwrap();
        write_assembly(
            scratch.path(),
            "Geometry",
            &ImageBuilder::new().assembly("Geometry").type_def(
                TypeSpecBuilder::value_type("Geometry", "Vector")
                    .field(FieldSpec::public("X", &[element::R8]))
                    .field(FieldSpec::public("Y", &[element::R8])),
            ),
        );
        sample(scratch.path());

        let mut context = LoadContext::new(scratch.path());
        context.load_assembly("Sample").unwrap();

        let registry = context.registry();
        let shape = registry
            .get(registry.find("Sample", "Sample.Shape").unwrap())
            .unwrap();
        let vector = registry.find("Geometry", "Geometry.Vector").unwrap();
        assert_eq!(shape.fields[3].field_type.handle().unwrap().def, Some(vector));
    }

    #[test]
    fn failed_translation_leaves_no_types() {
        let scratch = tempfile::tempdir().unwrap();
        write_assembly(
            scratch.path(),
            "Sample",
            &ImageBuilder::new()
                .assembly("Sample")
                .type_def(
                    TypeSpecBuilder::value_type("Sample", "Bad")
                        .field(FieldSpec::public("Dangling", &value_type_def(99))),
                )
                .type_def(
                    TypeSpecBuilder::value_type("Sample", "Point")
                        .sequential()
                        .field(FieldSpec::public("X", &[element::I4]))
                        .field(FieldSpec::public("Y", &[element::I4])),
                ),
        );

        let mut context = LoadContext::new(scratch.path());
        assert!(matches!(
            context.resolve_type("Sample", "Sample.Point"),
            Err(crate::Error::Malformed { .. })
        ));
        assert!(context.registry().find("Sample", "Sample.Point").is_none());
        assert_eq!(context.loaded_assemblies().count(), 0);

        // Later requests fail too instead of seeing half translated types
        assert!(matches!(
            context.resolve_type("Sample", "Sample.Point"),
            Err(LoadIsolation(_))
        ));
        assert!(context.registry().find("Sample", "Sample.Point").is_none());
    }

    #[test]
    fn damaged_assembly() {
        let scratch = tempfile::tempdir().unwrap();
        fs::write(scratch.path().join("Broken.dll"), [0x4D, 0x5A, 0x00]).unwrap();

        let mut context = LoadContext::new(scratch.path());
        assert!(context.load_assembly("Broken").is_err());
        // Failed loads are not retried
        assert!(matches!(
            context.load_assembly("Broken"),
            Err(LoadIsolation(_))
        ));
    }
}
