//! Context descriptors.
//!
//! A context descriptor describes a *declaration*: a module, an extension, a protocol, or a
//! nominal type. It is emitted once by the compiler and shared by every generic
//! instantiation of the declared type. Descriptors nest through their parent pointer, from
//! a type up to the module defining it.
//!
//! Decoding reads the flags word first; its kind selects which fixed fields and trailing
//! records follow. Counts and offsets are read verbatim: they are compile-time constants of
//! the declaration. Offsets that depend on a resilient superclass are only resolved by
//! [`crate::metadata::types`] through [`ClassDescriptor::metadata_bounds`].
//!
//! # Key Components
//!
//! - [`ContextDescriptor`] - Decoded descriptor of any kind
//! - [`TypeDescriptor`] - Common part of class, struct and enum descriptors
//! - [`ClassDescriptor`], [`StructDescriptor`], [`EnumDescriptor`] - Kind-specific parts
//! - [`GenericContext`] - Generic parameters and requirements
//! - [`FieldDescriptor`] - Reflection records naming the stored properties
//!
//! # Examples
//!
//! ```rust,no_run
//! use swiftscope::{Address, ContextDescriptor, ImageFile};
//! use std::path::Path;
//!
//! let image = ImageFile::from_file(Path::new("libFoo.so"))?;
//! for address in image.type_descriptors()? {
//!     let descriptor = ContextDescriptor::decode(image.snapshot(), image.platform(), address)?;
//!     println!("{:?} {}", descriptor.kind, descriptor.qualified_name(image.snapshot(), image.platform())?);
//! }
//! # Ok::<(), swiftscope::Error>(())
//! ```

mod class;
mod fields;
mod generic;
mod value;

pub use class::{
    ClassDescriptor, ClassMetadataBounds, ClassMetadataSize, MethodDescriptor,
    MethodOverrideDescriptor, ResilientSuperclass, VTableHeader,
};
pub use fields::{FieldDescriptor, FieldDescriptorKind, FieldRecord};
pub use generic::{
    GenericContext, GenericPackShape, GenericParam, GenericParamKind, GenericRequirement,
    GenericRequirementKind,
};
pub use value::{EnumDescriptor, StructDescriptor};

use crate::{
    file::MemoryReader,
    metadata::{
        address::Address,
        flags::{ContextDescriptorFlags, ContextDescriptorKind},
        layout::{descriptor, Platform},
        view::RawView,
    },
    Error::RecursionLimit,
    Result,
};

/// Upper bound for the nesting depth of contexts
pub const MAX_CONTEXT_DEPTH: usize = 64;

/// The kind-specific layout of a nominal type descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeLayout {
    /// A struct
    Struct(StructDescriptor),
    /// An enum
    Enum(EnumDescriptor),
    /// A class
    Class(ClassDescriptor),
}

/// The common part of class, struct and enum descriptors
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    /// Unqualified type name
    pub name: String,
    /// Metadata access function
    pub access_function: Option<Address>,
    /// Reflection field descriptor
    pub fields: Option<Address>,
    /// Kind-specific fields
    pub layout: TypeLayout,
}

/// Kind-specific contents of a context descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContextDetails {
    /// A module
    Module {
        /// Module name
        name: String,
    },
    /// An extension
    Extension {
        /// Mangled name of the extended type
        extended_context: Option<Address>,
    },
    /// An anonymous context
    Anonymous,
    /// A protocol
    Protocol {
        /// Protocol name
        name: String,
        /// Requirements in the requirement signature
        num_requirements_in_signature: u32,
        /// Witness table requirements
        num_requirements: u32,
    },
    /// An opaque result type
    OpaqueType,
    /// A class, struct or enum
    Type(TypeDescriptor),
}

/// A decoded context descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextDescriptor {
    /// Address of the descriptor
    pub address: Address,
    /// Flags word
    pub flags: ContextDescriptorFlags,
    /// Context kind
    pub kind: ContextDescriptorKind,
    /// Parent context descriptor
    pub parent: Option<Address>,
    /// Generic context; present if and only if the flags mark the context generic
    pub generic: Option<GenericContext>,
    /// Kind-specific contents
    pub details: ContextDetails,
}

impl ContextDescriptor {
    /// Decodes the context descriptor at `address`.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedKind`] for unknown context kinds, or an error if
    /// the descriptor can not be read.
    pub fn decode(reader: &dyn MemoryReader, platform: Platform, address: Address) -> Result<Self> {
        let view = RawView::new(reader, platform, address);

        let flags = ContextDescriptorFlags(view.read::<u32>(descriptor::FLAGS)?);
        let kind = flags.kind()?;
        let parent = view.relative_indirectable(descriptor::PARENT)?;

        let generic_at = |fixed_size: u64, type_prefix: bool| -> Result<Option<GenericContext>> {
            if !flags.is_generic() {
                return Ok(None);
            }

            let trailing = address.advance(fixed_size);
            if type_prefix {
                GenericContext::decode_type(reader, platform, trailing).map(Some)
            } else {
                GenericContext::decode(reader, platform, trailing).map(Some)
            }
        };

        let (generic, details) = match kind {
            ContextDescriptorKind::Module => (
                None,
                ContextDetails::Module {
                    name: view.relative_c_string(descriptor::MODULE_NAME)?,
                },
            ),
            ContextDescriptorKind::Extension => (
                generic_at(descriptor::EXTENSION_SIZE, false)?,
                ContextDetails::Extension {
                    extended_context: view.relative_direct(descriptor::EXTENSION_EXTENDED_CONTEXT)?,
                },
            ),
            ContextDescriptorKind::Anonymous => {
                (generic_at(descriptor::ANONYMOUS_SIZE, false)?, ContextDetails::Anonymous)
            }
            ContextDescriptorKind::Protocol => (
                None,
                ContextDetails::Protocol {
                    name: view.relative_c_string(descriptor::PROTOCOL_NAME)?,
                    num_requirements_in_signature: view
                        .read::<u32>(descriptor::PROTOCOL_NUM_REQUIREMENTS_IN_SIGNATURE)?,
                    num_requirements: view.read::<u32>(descriptor::PROTOCOL_NUM_REQUIREMENTS)?,
                },
            ),
            ContextDescriptorKind::OpaqueType => {
                (generic_at(descriptor::OPAQUE_TYPE_SIZE, false)?, ContextDetails::OpaqueType)
            }
            ContextDescriptorKind::Struct => {
                let generic = generic_at(descriptor::STRUCT_SIZE, true)?;
                let layout = TypeLayout::Struct(StructDescriptor::decode(&view)?);
                (generic, ContextDetails::Type(decode_type(&view, layout)?))
            }
            ContextDescriptorKind::Enum => {
                let generic = generic_at(descriptor::ENUM_SIZE, true)?;
                let layout = TypeLayout::Enum(EnumDescriptor::decode(&view)?);
                (generic, ContextDetails::Type(decode_type(&view, layout)?))
            }
            ContextDescriptorKind::Class => {
                let generic = generic_at(descriptor::CLASS_SIZE, true)?;
                let trailing = generic
                    .as_ref()
                    .map_or(address.advance(descriptor::CLASS_SIZE), |g| g.end);
                let layout =
                    TypeLayout::Class(ClassDescriptor::decode(&view, flags.type_flags(), trailing)?);
                (generic, ContextDetails::Type(decode_type(&view, layout)?))
            }
        };

        Ok(ContextDescriptor {
            address,
            flags,
            kind,
            parent,
            generic,
            details,
        })
    }

    /// Whether the context has generic parameters
    #[must_use]
    pub fn is_generic(&self) -> bool {
        self.flags.is_generic()
    }

    /// The generic context, if the context is generic
    #[must_use]
    pub fn generic_context(&self) -> Option<&GenericContext> {
        self.generic.as_ref()
    }

    /// The name of modules, protocols and types
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.details {
            ContextDetails::Module { name } | ContextDetails::Protocol { name, .. } => Some(name),
            ContextDetails::Type(ty) => Some(&ty.name),
            _ => None,
        }
    }

    /// The common type descriptor part, for classes, structs and enums
    #[must_use]
    pub fn type_descriptor(&self) -> Option<&TypeDescriptor> {
        match &self.details {
            ContextDetails::Type(ty) => Some(ty),
            _ => None,
        }
    }

    /// The class-specific part, for classes
    #[must_use]
    pub fn class(&self) -> Option<&ClassDescriptor> {
        match self.type_descriptor()?.layout {
            TypeLayout::Class(ref class) => Some(class),
            _ => None,
        }
    }

    /// The struct-specific part, for structs
    #[must_use]
    pub fn structure(&self) -> Option<&StructDescriptor> {
        match self.type_descriptor()?.layout {
            TypeLayout::Struct(ref structure) => Some(structure),
            _ => None,
        }
    }

    /// The enum-specific part, for enums
    #[must_use]
    pub fn enumeration(&self) -> Option<&EnumDescriptor> {
        match self.type_descriptor()?.layout {
            TypeLayout::Enum(ref enumeration) => Some(enumeration),
            _ => None,
        }
    }

    /// Number of stored properties of structs and classes
    #[must_use]
    pub fn num_fields(&self) -> Option<u32> {
        match self.type_descriptor()?.layout {
            TypeLayout::Struct(ref s) => Some(s.num_fields),
            TypeLayout::Class(ref c) => Some(c.num_fields),
            TypeLayout::Enum(_) => None,
        }
    }

    /// Decodes the parent context.
    ///
    /// # Errors
    /// Returns an error if the parent can not be decoded.
    pub fn parent_descriptor(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
    ) -> Result<Option<ContextDescriptor>> {
        match self.parent {
            Some(parent) => ContextDescriptor::decode(reader, platform, parent).map(Some),
            None => Ok(None),
        }
    }

    /// Decodes the reflection field descriptor of a type.
    ///
    /// # Errors
    /// Returns an error if the field descriptor can not be decoded.
    pub fn field_descriptor(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
    ) -> Result<Option<FieldDescriptor>> {
        match self.type_descriptor().and_then(|ty| ty.fields) {
            Some(fields) => FieldDescriptor::decode(reader, platform, fields).map(Some),
            None => Ok(None),
        }
    }

    /// The chain of contexts from this one up to its module, innermost first.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] if the chain is deeper than
    /// [`MAX_CONTEXT_DEPTH`], or an error if an ancestor can not be decoded.
    pub fn ancestry(&self, reader: &dyn MemoryReader, platform: Platform) -> Result<Vec<ContextDescriptor>> {
        let mut chain = vec![self.clone()];

        let mut next = self.parent;
        while let Some(parent) = next {
            if chain.len() > MAX_CONTEXT_DEPTH {
                return Err(RecursionLimit(MAX_CONTEXT_DEPTH));
            }

            let descriptor = ContextDescriptor::decode(reader, platform, parent)?;
            next = descriptor.parent;
            chain.push(descriptor);
        }

        Ok(chain)
    }

    /// The dotted name of the context, such as `Module.Outer.Inner`.
    ///
    /// Extensions and anonymous contexts contribute no component.
    ///
    /// # Errors
    /// See [`ContextDescriptor::ancestry`].
    pub fn qualified_name(&self, reader: &dyn MemoryReader, platform: Platform) -> Result<String> {
        let ancestry = self.ancestry(reader, platform)?;

        let components: Vec<&str> = ancestry
            .iter()
            .rev()
            .filter_map(ContextDescriptor::name)
            .collect();

        Ok(components.join("."))
    }

    /// Number of generic parameters introduced up to each generic depth.
    ///
    /// Element `d` is the `num_params` of the `d`-th generic context counted from the
    /// outermost one; because a context's parameters include those of its enclosing
    /// contexts, parameters at depth `d` start at flat index `counts[d - 1]`.
    ///
    /// # Errors
    /// See [`ContextDescriptor::ancestry`].
    pub fn generic_param_counts(&self, reader: &dyn MemoryReader, platform: Platform) -> Result<Vec<u16>> {
        if !self.is_generic() {
            return Ok(Vec::new());
        }

        let ancestry = self.ancestry(reader, platform)?;

        let mut counts: Vec<u16> = Vec::new();
        for context in ancestry.iter().rev() {
            let Some(generic) = context.generic_context() else {
                continue;
            };

            // Contexts adding no parameters (such as extensions) do not open a new depth.
            if generic.num_params > counts.last().copied().unwrap_or(0) {
                counts.push(generic.num_params);
            }
        }

        Ok(counts)
    }
}

fn decode_type(view: &RawView<'_>, layout: TypeLayout) -> Result<TypeDescriptor> {
    Ok(TypeDescriptor {
        name: view.relative_c_string(descriptor::TYPE_NAME)?,
        access_function: view.relative_direct(descriptor::TYPE_ACCESS_FUNCTION)?,
        fields: view.relative_direct(descriptor::TYPE_FIELDS)?,
        layout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::factories::{Builder, TypeSpec},
        Error,
    };

    #[test]
    fn module_and_protocol() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let protocol = builder.protocol(module, "Floating");
        let snapshot = builder.finish();

        let descriptor = ContextDescriptor::decode(&snapshot, Platform::LINUX_64, module).unwrap();
        assert_eq!(descriptor.kind, ContextDescriptorKind::Module);
        assert_eq!(descriptor.name(), Some("Boats"));
        assert_eq!(descriptor.parent, None);
        assert!(descriptor.type_descriptor().is_none());

        let descriptor = ContextDescriptor::decode(&snapshot, Platform::LINUX_64, protocol).unwrap();
        assert_eq!(descriptor.kind, ContextDescriptorKind::Protocol);
        assert_eq!(descriptor.parent, Some(module));
        assert_eq!(
            descriptor.qualified_name(&snapshot, Platform::LINUX_64).unwrap(),
            "Boats.Floating"
        );
    }

    #[test]
    fn nested_types_skip_extensions() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let outer = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Harbor",
            num_fields: 1,
            field_offset_vector_offset: 2,
            generic_params: 1,
            ..Default::default()
        });
        let extension = builder.extension(module, None, 1);
        let inner = builder.enum_descriptor(
            &TypeSpec {
                parent: Some(extension),
                name: "Berth",
                generic_params: 2,
                ..Default::default()
            },
            1,
            2,
        );
        let snapshot = builder.finish();

        let harbor = ContextDescriptor::decode(&snapshot, Platform::LINUX_64, outer).unwrap();
        assert!(harbor.is_generic());
        assert_eq!(harbor.generic_context().unwrap().num_params, 1);
        assert_eq!(harbor.num_fields(), Some(1));
        assert!(harbor.structure().unwrap().has_field_offset_vector());

        let berth = ContextDescriptor::decode(&snapshot, Platform::LINUX_64, inner).unwrap();
        assert_eq!(berth.kind, ContextDescriptorKind::Enum);
        assert_eq!(berth.num_fields(), None);
        assert_eq!(berth.enumeration().unwrap().num_cases(), 3);
        assert_eq!(berth.ancestry(&snapshot, Platform::LINUX_64).unwrap().len(), 3);
        assert_eq!(
            berth.qualified_name(&snapshot, Platform::LINUX_64).unwrap(),
            "Boats.Berth"
        );
        assert_eq!(
            berth.generic_param_counts(&snapshot, Platform::LINUX_64).unwrap(),
            [1, 2]
        );
        assert!(harbor
            .parent_descriptor(&snapshot, Platform::LINUX_64)
            .unwrap()
            .is_some());
    }

    #[test]
    fn non_generic_has_no_param_counts() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let snapshot = builder.finish();

        let descriptor = ContextDescriptor::decode(&snapshot, Platform::LINUX_64, boat).unwrap();
        assert!(descriptor.generic_context().is_none());
        assert!(descriptor
            .generic_param_counts(&snapshot, Platform::LINUX_64)
            .unwrap()
            .is_empty());
        assert!(descriptor
            .field_descriptor(&snapshot, Platform::LINUX_64)
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut builder = Builder::new(0x1000);
        let at = builder.here();
        builder.u32(0x1F).rel(None);
        let snapshot = builder.finish();

        assert!(matches!(
            ContextDescriptor::decode(&snapshot, Platform::LINUX_64, at),
            Err(Error::UnsupportedKind(0x1F))
        ));
    }

    #[test]
    fn cyclic_parents_hit_depth_limit() {
        let mut builder = Builder::new(0x1000);
        let at = builder.here();
        builder.u32(0x02).rel(Some(at));
        let snapshot = builder.finish();

        let descriptor = ContextDescriptor::decode(&snapshot, Platform::LINUX_64, at).unwrap();
        assert_eq!(descriptor.kind, ContextDescriptorKind::Anonymous);
        assert_eq!(descriptor.parent, Some(at));
        assert!(matches!(
            descriptor.qualified_name(&snapshot, Platform::LINUX_64),
            Err(Error::RecursionLimit(MAX_CONTEXT_DEPTH))
        ));
    }
}
