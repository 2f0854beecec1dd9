//! The decoded, owned view of one assembly's metadata.
//!
//! [`AssemblyMetadata`] is what the load context keeps per loaded assembly: every string is
//! resolved, every field signature decoded, and the side tables that affect layout
//! (`ClassLayout`, `FieldLayout`, `NestedClass`, `GenericParam`, native integer attributes)
//! are folded into the type and field records they describe.

use std::{collections::HashMap, path::Path};

use crate::{
    file::File,
    metadata::{
        cor20header::Cor20Header,
        customattributes::{
            parse_native_integer_flags, NativeIntegerFlags, COMPILER_SERVICES_NAMESPACE,
            NATIVE_INTEGER_ATTRIBUTE,
        },
        flags::{FieldAttributes, TypeAttributes},
        root::Root,
        signatures::{parse_field_signature, parse_type_spec_signature, SignatureType},
        streams::{Blob, Strings, TablesHeader},
        tables::{
            AssemblyRaw, AssemblyRefRaw, ClassLayoutRaw, CustomAttributeRaw, FieldLayoutRaw,
            FieldPtrRaw, FieldRaw, GenericParamRaw, MemberRefRaw, NestedClassRaw, TableId,
            TypeDefRaw, TypeRefRaw, TypeSpecRaw,
        },
        token::Token,
    },
    Result,
};

/// A type definition with its fields and layout attributes resolved.
#[derive(Debug, Clone)]
pub struct TypeDefInfo {
    /// `TypeDef` row id.
    pub rid: u32,
    /// Type attribute flags.
    pub flags: TypeAttributes,
    /// Simple name, including the `` `N `` arity suffix for generic definitions.
    pub name: String,
    /// Namespace; empty for nested types.
    pub namespace: String,
    /// Base type token (`TypeDef`, `TypeRef` or `TypeSpec`).
    pub extends: Option<Token>,
    /// `Field` row ids owned by this type, in declaration order.
    pub fields: Vec<u32>,
    /// `TypeDef` row id of the enclosing type, for nested types.
    pub enclosing: Option<u32>,
    /// `(pack, class size)` from `ClassLayout`.
    pub class_layout: Option<(u16, u32)>,
    /// Generic parameter names, ordered by position.
    pub generic_params: Vec<String>,
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// `Field` row id.
    pub rid: u32,
    /// Field attribute flags.
    pub flags: FieldAttributes,
    /// Field name.
    pub name: String,
    /// Decoded field type.
    pub signature: SignatureType,
    /// Offset from `FieldLayout`, for explicit-layout types.
    pub explicit_offset: Option<u32>,
    /// Native integer rendering hints.
    pub native_integers: Option<NativeIntegerFlags>,
}

/// Where a `TypeRef` points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRefScope {
    /// Defined in the referenced assembly (simple name).
    Assembly(String),
    /// Nested in another `TypeRef` (row id).
    Enclosing(u32),
    /// Defined in the current module.
    CurrentModule,
}

/// A resolved `TypeRef` row.
#[derive(Debug, Clone)]
pub struct TypeRefInfo {
    /// `TypeRef` row id.
    pub rid: u32,
    /// Simple name.
    pub name: String,
    /// Namespace; empty for nested references.
    pub namespace: String,
    /// Resolution scope.
    pub scope: TypeRefScope,
}

/// A referenced assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyRefInfo {
    /// Simple name.
    pub name: String,
    /// Version as (major, minor, build, revision).
    pub version: [u16; 4],
}

/// Decoded metadata of one assembly.
#[derive(Debug, Clone)]
pub struct AssemblyMetadata {
    /// Simple assembly name; empty for modules without an `Assembly` row.
    pub name: String,
    /// Assembly version.
    pub version: [u16; 4],
    /// Metadata version string, e.g. `v4.0.30319`.
    pub runtime_version: String,
    /// `true` for PE32+ images.
    pub is_pe32_plus: bool,
    /// `true` if the image requires a 32-bit process.
    pub requires_32bit: bool,
    /// Type definitions by `rid - 1`.
    pub types: Vec<TypeDefInfo>,
    /// Fields by `rid - 1`.
    pub fields: Vec<FieldInfo>,
    /// Type references by `rid - 1`.
    pub type_refs: Vec<TypeRefInfo>,
    /// Type specifications by `rid - 1`.
    pub type_specs: Vec<SignatureType>,
    /// Assembly references by `rid - 1`.
    pub assembly_refs: Vec<AssemblyRefInfo>,
    names: HashMap<String, u32>,
}

fn heap_string(strings: &Strings<'_>, index: u32) -> Result<String> {
    Ok(strings.get(index as usize)?.to_string())
}

fn heap_blob<'a>(blob: Option<&Blob<'a>>, index: u32) -> Result<&'a [u8]> {
    match blob {
        Some(blob) => blob.get(index as usize),
        None => Err(malformed_error!("Metadata has no #Blob heap")),
    }
}

impl AssemblyMetadata {
    /// Load and decode an assembly from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or its metadata is damaged.
    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_file(&File::from_file(path)?)
    }

    /// Decode an assembly held in memory.
    ///
    /// # Errors
    /// Returns an error if the image or its metadata is damaged.
    pub fn from_mem(data: Vec<u8>) -> Result<Self> {
        Self::from_file(&File::from_mem(data)?)
    }

    /// Decode the metadata of a loaded PE file.
    ///
    /// # Errors
    /// Returns an error if the CLI header, metadata root or any required stream or table is
    /// damaged.
    pub fn from_file(file: &File) -> Result<Self> {
        let (clr_rva, clr_size) = file.clr()?;
        let cor20 = Cor20Header::read(file.data_slice(file.rva_to_offset(clr_rva)?, clr_size)?)?;

        let meta_offset = file.rva_to_offset(cor20.meta_data_rva as usize)?;
        let meta = file.data_slice(meta_offset, cor20.meta_data_size as usize)?;
        let root = Root::read(meta)?;

        let stream_bytes = |name: &str| {
            root.stream(name).map(|header| {
                &meta[header.offset as usize..(header.offset + header.size) as usize]
            })
        };

        let Some(tables_data) = stream_bytes("#~").or_else(|| stream_bytes("#-")) else {
            return Err(malformed_error!("Metadata has no table stream"));
        };
        let Some(strings_data) = stream_bytes("#Strings") else {
            return Err(malformed_error!("Metadata has no #Strings heap"));
        };

        let tables = TablesHeader::from(tables_data)?;
        let strings = Strings::from(strings_data)?;
        let blob = match stream_bytes("#Blob") {
            Some(data) => Some(Blob::from(data)?),
            None => None,
        };

        let (name, version) = match tables.rows::<AssemblyRaw>()?.first() {
            Some(assembly) => (heap_string(&strings, assembly.name)?, assembly.version),
            None => (String::new(), [0; 4]),
        };

        let assembly_refs = tables
            .rows::<AssemblyRefRaw>()?
            .iter()
            .map(|row| {
                Ok(AssemblyRefInfo {
                    name: heap_string(&strings, row.name)?,
                    version: row.version,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let type_refs = tables
            .rows::<TypeRefRaw>()?
            .iter()
            .map(|row| {
                let scope = match row.resolution_scope.tag {
                    TableId::AssemblyRef => {
                        let Some(assembly) =
                            assembly_refs.get((row.resolution_scope.row as usize).wrapping_sub(1))
                        else {
                            return Err(malformed_error!(
                                "TypeRef {} has an invalid AssemblyRef scope - {}",
                                row.rid,
                                row.resolution_scope.row
                            ));
                        };
                        TypeRefScope::Assembly(assembly.name.clone())
                    }
                    TableId::TypeRef => TypeRefScope::Enclosing(row.resolution_scope.row),
                    _ => TypeRefScope::CurrentModule,
                };

                Ok(TypeRefInfo {
                    rid: row.rid,
                    name: heap_string(&strings, row.type_name)?,
                    namespace: heap_string(&strings, row.type_namespace)?,
                    scope,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let type_specs = tables
            .rows::<TypeSpecRaw>()?
            .iter()
            .map(|row| parse_type_spec_signature(heap_blob(blob.as_ref(), row.signature)?))
            .collect::<Result<Vec<_>>>()?;

        let explicit_offsets: HashMap<u32, u32> = tables
            .rows::<FieldLayoutRaw>()?
            .into_iter()
            .map(|row| (row.field, row.field_offset))
            .collect();

        let typedef_rows = tables.rows::<TypeDefRaw>()?;
        let native_integers =
            Self::native_integer_fields(&tables, &strings, blob.as_ref(), &typedef_rows, &type_refs)?;

        let mut fields = tables
            .rows::<FieldRaw>()?
            .into_iter()
            .map(|row| {
                Ok(FieldInfo {
                    rid: row.rid,
                    flags: FieldAttributes::from_bits_retain(row.flags),
                    name: heap_string(&strings, row.name)?,
                    signature: parse_field_signature(heap_blob(blob.as_ref(), row.signature)?)?,
                    explicit_offset: explicit_offsets.get(&row.rid).copied(),
                    native_integers: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        for (field_rid, flags) in native_integers {
            if let Some(field) = fields.get_mut((field_rid as usize).wrapping_sub(1)) {
                field.native_integers = Some(flags);
            }
        }

        let field_ptrs = tables.rows::<FieldPtrRaw>()?;
        let field_run_end = if field_ptrs.is_empty() {
            fields.len() as u32 + 1
        } else {
            field_ptrs.len() as u32 + 1
        };

        let class_layouts: HashMap<u32, (u16, u32)> = tables
            .rows::<ClassLayoutRaw>()?
            .into_iter()
            .map(|row| (row.parent, (row.packing_size, row.class_size)))
            .collect();
        let enclosing: HashMap<u32, u32> = tables
            .rows::<NestedClassRaw>()?
            .into_iter()
            .map(|row| (row.nested_class, row.enclosing_class))
            .collect();

        let mut generic_params: HashMap<u32, Vec<(u16, String)>> = HashMap::new();
        for row in tables.rows::<GenericParamRaw>()? {
            if row.owner.tag == TableId::TypeDef {
                generic_params
                    .entry(row.owner.row)
                    .or_default()
                    .push((row.number, heap_string(&strings, row.name)?));
            }
        }

        let mut types = Vec::with_capacity(typedef_rows.len());
        for (index, row) in typedef_rows.iter().enumerate() {
            let run_end = typedef_rows
                .get(index + 1)
                .map_or(field_run_end, |next| next.field_list)
                .min(field_run_end);
            let run_start = row.field_list.max(1).min(run_end);

            let mut type_fields = Vec::with_capacity((run_end - run_start) as usize);
            for position in run_start..run_end {
                if field_ptrs.is_empty() {
                    type_fields.push(position);
                } else {
                    type_fields.push(field_ptrs[position as usize - 1].field);
                }
            }

            let mut params = generic_params.remove(&row.rid).unwrap_or_default();
            params.sort_by_key(|(number, _)| *number);

            types.push(TypeDefInfo {
                rid: row.rid,
                flags: TypeAttributes::from_bits_retain(row.flags),
                name: heap_string(&strings, row.type_name)?,
                namespace: heap_string(&strings, row.type_namespace)?,
                extends: if row.extends.is_null() {
                    None
                } else {
                    Some(row.extends.token)
                },
                fields: type_fields,
                enclosing: enclosing.get(&row.rid).copied(),
                class_layout: class_layouts.get(&row.rid).copied(),
                generic_params: params.into_iter().map(|(_, name)| name).collect(),
            });
        }

        let mut metadata = AssemblyMetadata {
            name,
            version,
            runtime_version: root.version.clone(),
            is_pe32_plus: file.is_pe32_plus(),
            requires_32bit: cor20.requires_32bit(),
            types,
            fields,
            type_refs,
            type_specs,
            assembly_refs,
            names: HashMap::new(),
        };

        let names = metadata
            .types
            .iter()
            .map(|info| (metadata.full_name(info.rid), info.rid))
            .collect();
        metadata.names = names;

        Ok(metadata)
    }

    fn native_integer_fields(
        tables: &TablesHeader<'_>,
        strings: &Strings<'_>,
        blob: Option<&Blob<'_>>,
        typedef_rows: &[TypeDefRaw],
        type_refs: &[TypeRefInfo],
    ) -> Result<Vec<(u32, NativeIntegerFlags)>> {
        let member_refs = tables.rows::<MemberRefRaw>()?;
        let is_attribute = |namespace: &str, name: &str| {
            namespace == COMPILER_SERVICES_NAMESPACE && name == NATIVE_INTEGER_ATTRIBUTE
        };

        let mut result = Vec::new();
        for attribute in tables.rows::<CustomAttributeRaw>()? {
            if attribute.parent.tag != TableId::Field {
                continue;
            }

            let declaring = match attribute.constructor.tag {
                TableId::MemberRef => member_refs
                    .get((attribute.constructor.row as usize).wrapping_sub(1))
                    .map(|member| (member.class.tag, member.class.row)),
                // The declaring type of a MethodDef owns the run its row falls into
                TableId::MethodDef => typedef_rows
                    .iter()
                    .rev()
                    .find(|row| row.method_list <= attribute.constructor.row)
                    .map(|row| (TableId::TypeDef, row.rid)),
                _ => None,
            };

            let matches = match declaring {
                Some((TableId::TypeRef, rid)) => type_refs
                    .get((rid as usize).wrapping_sub(1))
                    .is_some_and(|type_ref| is_attribute(&type_ref.namespace, &type_ref.name)),
                Some((TableId::TypeDef, rid)) => {
                    match typedef_rows.get((rid as usize).wrapping_sub(1)) {
                        Some(row) => is_attribute(
                            strings.get(row.type_namespace as usize)?,
                            strings.get(row.type_name as usize)?,
                        ),
                        None => false,
                    }
                }
                _ => false,
            };

            if matches {
                result.push((
                    attribute.parent.row,
                    parse_native_integer_flags(heap_blob(blob, attribute.value)?)?,
                ));
            }
        }

        Ok(result)
    }

    /// The type definition with row id `rid`.
    #[must_use]
    pub fn type_def(&self, rid: u32) -> Option<&TypeDefInfo> {
        self.types.get((rid as usize).wrapping_sub(1))
    }

    /// The field with row id `rid`.
    #[must_use]
    pub fn field(&self, rid: u32) -> Option<&FieldInfo> {
        self.fields.get((rid as usize).wrapping_sub(1))
    }

    /// The type reference with row id `rid`.
    #[must_use]
    pub fn type_ref(&self, rid: u32) -> Option<&TypeRefInfo> {
        self.type_refs.get((rid as usize).wrapping_sub(1))
    }

    /// The type specification with row id `rid`.
    #[must_use]
    pub fn type_spec(&self, rid: u32) -> Option<&SignatureType> {
        self.type_specs.get((rid as usize).wrapping_sub(1))
    }

    /// Reflection-style full name of a type definition: `Namespace.Outer+Inner`.
    #[must_use]
    pub fn full_name(&self, rid: u32) -> String {
        let mut parts = Vec::new();
        let mut current = self.type_def(rid);
        let mut namespace = "";

        // Nesting chains are bounded by the table size; guard against cycles anyway
        while let Some(info) = current {
            parts.push(info.name.as_str());
            namespace = info.namespace.as_str();
            current = match info.enclosing {
                Some(parent) if parts.len() <= self.types.len() => self.type_def(parent),
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

    /// Full name of a type reference, following enclosing references.
    #[must_use]
    pub fn type_ref_full_name(&self, rid: u32) -> String {
        let mut parts = Vec::new();
        let mut current = self.type_ref(rid);
        let mut namespace = "";

        while let Some(info) = current {
            parts.push(info.name.as_str());
            namespace = info.namespace.as_str();
            current = match info.scope {
                TypeRefScope::Enclosing(parent) if parts.len() <= self.type_refs.len() => {
                    self.type_ref(parent)
                }
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

    /// Assembly that defines the outermost type of a (possibly nested) type reference.
    #[must_use]
    pub fn type_ref_assembly(&self, rid: u32) -> Option<&str> {
        let mut current = self.type_ref(rid);
        let mut steps = 0;

        while let Some(info) = current {
            match &info.scope {
                TypeRefScope::Assembly(name) => return Some(name.as_str()),
                TypeRefScope::Enclosing(parent) if steps <= self.type_refs.len() => {
                    steps += 1;
                    current = self.type_ref(*parent);
                }
                _ => return None,
            }
        }

        None
    }

    /// Look up a type definition by full name (`Namespace.Outer+Inner`).
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<u32> {
        self.names.get(full_name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{FieldSpec, ImageBuilder, TypeSpecBuilder};

    #[test]
    fn decode_generated_image() {
        let image = ImageBuilder::new()
            .assembly("Sample")
            .type_def(
                TypeSpecBuilder::value_type("Geometry", "Point")
                    .sequential()
                    .field(FieldSpec::public("Y", &[0x08]))
                    .field(FieldSpec::public("X", &[0x08])),
            )
            .type_def(
                TypeSpecBuilder::class("Geometry", "Shape")
                    .field(FieldSpec::private("name", &[0x0E]))
                    .field(FieldSpec::static_field("Count", &[0x08])),
            )
            .build();

        let metadata = AssemblyMetadata::from_mem(image).unwrap();
        assert_eq!(metadata.name, "Sample");

        let point = metadata.find_type("Geometry.Point").unwrap();
        let info = metadata.type_def(point).unwrap();
        assert_eq!(info.fields.len(), 2);
        assert_eq!(info.flags.layout(), 0x08);

        let first = metadata.field(info.fields[0]).unwrap();
        assert_eq!(first.name, "Y");
        assert_eq!(first.signature, SignatureType::I4);
        assert!(first.flags.is_public());

        let shape = metadata.find_type("Geometry.Shape").unwrap();
        let info = metadata.type_def(shape).unwrap();
        assert_eq!(info.fields.len(), 2);
        assert!(!metadata.field(info.fields[1]).unwrap().flags.is_instance());

        assert!(metadata.find_type("Geometry.Missing").is_none());
        assert!(metadata.find_type("<Module>").is_some());
    }

    #[test]
    fn decode_explicit_and_nested() {
        let image = ImageBuilder::new()
            .assembly("Unions")
            .type_def(
                TypeSpecBuilder::value_type("Interop", "Outer")
                    .field(FieldSpec::public("A", &[0x08])),
            )
            .type_def(
                TypeSpecBuilder::value_type("", "Inner")
                    .explicit()
                    .class_layout(1, 16)
                    .nested_in("Interop", "Outer")
                    .field(FieldSpec::public("Low", &[0x08]).offset(0))
                    .field(FieldSpec::public("Whole", &[0x0A]).offset(0)),
            )
            .build();

        let metadata = AssemblyMetadata::from_mem(image).unwrap();
        let inner = metadata.find_type("Interop.Outer+Inner").unwrap();
        let info = metadata.type_def(inner).unwrap();

        assert_eq!(info.class_layout, Some((1, 16)));
        assert_eq!(info.flags.layout(), 0x10);
        assert!(info.enclosing.is_some());
        for field in &info.fields {
            assert_eq!(metadata.field(*field).unwrap().explicit_offset, Some(0));
        }
    }
}
