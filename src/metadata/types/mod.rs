//! Views over type metadata.
//!
//! A type handle points at the *metadata record* of one concrete type: one record exists
//! per generic instantiation. The first word of every record is its kind, which
//! [`Metadata`] reads once to select the layout applied to the rest of the record.
//!
//! # Key Components
//!
//! - [`Metadata`] - The kind-dispatched view returned by [`crate::Reflector::reflect`]
//! - [`StructMetadata`], [`EnumMetadata`] - Value type records
//! - [`ClassMetadata`] - Class records, bounds and vtables
//! - [`OtherMetadata`] - Every other kind: tuples, functions, existentials, ...
//! - [`ValueWitnessTable`] - Layout facts shared by all kinds
//! - [`ObjectModel`] - Host collaborator telling Swift classes from Objective-C ones
//!
//! # Memory Layout
//!
//! ```text
//!            value types                      classes
//!  -1 word   value witness table              value witness table
//!   0        kind                             kind or isa
//!  +1 word   nominal type descriptor          superclass
//!  ...       generic arguments                ... class header, descriptor ...
//!            field offsets (u32)              immediate members: generic arguments,
//!                                             field offsets (words), vtable
//! ```

mod class;
mod object;
mod value;
mod vwt;

pub use class::{ClassMetadata, VTable, VTableIter, VTableMethod, VTableSlot};
pub use object::{ObjectModel, PlatformObjectModel, LEGACY_SWIFT_CLASS_MASK, SWIFT_CLASS_MASK};
pub use value::{EnumMetadata, StructMetadata};
pub use vwt::{EnumValueWitnesses, ValueWitnessFunction, ValueWitnessTable};

use crate::{
    metadata::{
        address::{Address, TypeHandle},
        conformance::ConformanceDescriptor,
        descriptor::{ContextDescriptor, FieldDescriptor},
        kind::MetadataKind,
        mangling::ResolveEnvironment,
        reflector::Reflector,
        view::RawView,
    },
    Result,
};

/// State shared by every metadata view
#[derive(Clone, Copy)]
pub(crate) struct MetadataBase<'r> {
    reflector: &'r Reflector,
    handle: TypeHandle,
    kind: MetadataKind,
}

impl<'r> MetadataBase<'r> {
    pub(crate) fn reflector(&self) -> &'r Reflector {
        self.reflector
    }

    pub(crate) fn view(&self) -> RawView<'r> {
        RawView::new(
            self.reflector.reader(),
            self.reflector.platform(),
            self.handle.metadata_address(),
        )
    }

    pub(crate) fn vwt_address(&self) -> Result<Option<Address>> {
        let layout = self.reflector.platform().layout();
        self.view()
            .offset(layout.value_witnesses)
            .read_pointer(0)
    }

    pub(crate) fn vwt(&self) -> Result<ValueWitnessTable> {
        let Some(address) = self.vwt_address()? else {
            return Err(malformed_error!(
                "Metadata {} has no value witness table",
                self.handle
            ));
        };

        ValueWitnessTable::decode(self.reflector.reader(), self.reflector.platform(), address)
    }

    fn decode_descriptor(&self, address: Option<Address>) -> Result<Option<ContextDescriptor>> {
        address
            .map(|address| self.reflector.decode_descriptor(address))
            .transpose()
    }
}

impl std::fmt::Debug for MetadataBase<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metadata")
            .field("handle", &self.handle)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Metadata of a kind without a specialized view
#[derive(Clone, Copy, Debug)]
pub struct OtherMetadata<'r> {
    base: MetadataBase<'r>,
}

impl OtherMetadata<'_> {
    /// The metadata kind
    #[must_use]
    pub fn kind(&self) -> MetadataKind {
        self.base.kind
    }

    /// The originating type handle
    #[must_use]
    pub fn handle(&self) -> TypeHandle {
        self.base.handle
    }
}

/// A type's metadata record, interpreted according to its kind.
///
/// # Examples
///
/// ```rust,no_run
/// use swiftscope::{Metadata, ProcessMemory, Reflector, TypeHandle, Address};
///
/// // The caller guarantees that every address handed to the reflector is readable.
/// let reflector = Reflector::new(unsafe { ProcessMemory::new() });
/// let metadata = reflector.reflect(TypeHandle::new(Address(0x1_0000_4000)))?;
///
/// if let Metadata::Struct(ref structure) = metadata {
///     println!("{} fields at {:?}", structure.num_fields()?, metadata.field_offsets()?);
/// }
/// for argument in metadata.generic_types()? {
///     println!("generic argument {}", argument);
/// }
/// # Ok::<(), swiftscope::Error>(())
/// ```
#[derive(Clone, Copy, Debug)]
pub enum Metadata<'r> {
    /// A struct
    Struct(StructMetadata<'r>),
    /// An enum
    Enum(EnumMetadata<'r>),
    /// `Optional<Wrapped>`, laid out as an enum
    Optional(EnumMetadata<'r>),
    /// A class
    Class(ClassMetadata<'r>),
    /// Any other kind
    Other(OtherMetadata<'r>),
}

impl<'r> Metadata<'r> {
    pub(crate) fn decode(reflector: &'r Reflector, handle: TypeHandle) -> Result<Self> {
        let view = RawView::new(reflector.reader(), reflector.platform(), handle.metadata_address());
        let kind = MetadataKind::from_word(view.read_word(0)?)?;

        let base = MetadataBase {
            reflector,
            handle,
            kind,
        };

        Ok(match kind {
            MetadataKind::Struct => Metadata::Struct(StructMetadata::new(base)),
            MetadataKind::Enum => Metadata::Enum(EnumMetadata::new(base)),
            MetadataKind::Optional => Metadata::Optional(EnumMetadata::new(base)),
            MetadataKind::Class => Metadata::Class(ClassMetadata::new(base)),
            _ => Metadata::Other(OtherMetadata { base }),
        })
    }

    fn base(&self) -> &MetadataBase<'r> {
        match self {
            Metadata::Struct(metadata) => &metadata.base,
            Metadata::Enum(metadata) | Metadata::Optional(metadata) => &metadata.base,
            Metadata::Class(metadata) => &metadata.base,
            Metadata::Other(metadata) => &metadata.base,
        }
    }

    /// The metadata kind
    #[must_use]
    pub fn kind(&self) -> MetadataKind {
        self.base().kind
    }

    /// The originating type handle
    #[must_use]
    pub fn handle(&self) -> TypeHandle {
        self.base().handle
    }

    /// The class view, if this is class metadata
    #[must_use]
    pub fn as_class(&self) -> Option<&ClassMetadata<'r>> {
        match self {
            Metadata::Class(class) => Some(class),
            _ => None,
        }
    }

    /// The struct view, if this is struct metadata
    #[must_use]
    pub fn as_struct(&self) -> Option<&StructMetadata<'r>> {
        match self {
            Metadata::Struct(structure) => Some(structure),
            _ => None,
        }
    }

    /// The enum view, if this is enum or optional metadata
    #[must_use]
    pub fn as_enum(&self) -> Option<&EnumMetadata<'r>> {
        match self {
            Metadata::Enum(enumeration) | Metadata::Optional(enumeration) => Some(enumeration),
            _ => None,
        }
    }

    /// The value witness table, found one word before the address point.
    ///
    /// # Errors
    /// Returns an error if the table pointer is null or the table can not be read.
    pub fn vwt(&self) -> Result<ValueWitnessTable> {
        self.base().vwt()
    }

    /// The context descriptor of the type; `None` for kinds without one and for
    /// Objective-C classes.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn descriptor(&self) -> Result<Option<ContextDescriptor>> {
        match self {
            Metadata::Struct(structure) => structure.descriptor(),
            Metadata::Enum(enumeration) | Metadata::Optional(enumeration) => enumeration.descriptor(),
            Metadata::Class(class) => class.descriptor(),
            Metadata::Other(_) => Ok(None),
        }
    }

    /// The dotted name of the type, such as `Swift.Optional`.
    ///
    /// # Errors
    /// Returns an error if the descriptor or one of its parents can not be decoded.
    pub fn name(&self) -> Result<Option<String>> {
        let reflector = self.base().reflector;
        self.descriptor()?
            .map(|descriptor| descriptor.qualified_name(reflector.reader(), reflector.platform()))
            .transpose()
    }

    /// The reflection records naming the stored properties or cases.
    ///
    /// # Errors
    /// Returns an error if the descriptors can not be decoded.
    pub fn field_descriptor(&self) -> Result<Option<FieldDescriptor>> {
        let reflector = self.base().reflector;
        match self.descriptor()? {
            Some(descriptor) => descriptor.field_descriptor(reflector.reader(), reflector.platform()),
            None => Ok(None),
        }
    }

    /// Byte offsets of the stored properties from the start of a value or instance.
    ///
    /// Always empty for enums and optionals.
    ///
    /// # Errors
    /// Returns an error if the descriptor or the field offset vector can not be read.
    pub fn field_offsets(&self) -> Result<Vec<u64>> {
        match self {
            Metadata::Struct(structure) => structure.field_offsets(),
            Metadata::Class(class) => class.field_offsets(),
            Metadata::Enum(_) | Metadata::Optional(_) | Metadata::Other(_) => Ok(Vec::new()),
        }
    }

    /// Address of the generic argument vector; `None` if the type is not generic.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded, or if the bounds of a
    /// class with a resilient superclass can not be computed.
    pub fn generic_argument_pointer(&self) -> Result<Option<Address>> {
        match self.descriptor()? {
            Some(descriptor) if descriptor.is_generic() => self.generic_argument_pointer_of(&descriptor),
            _ => Ok(None),
        }
    }

    fn generic_argument_pointer_of(&self, descriptor: &ContextDescriptor) -> Result<Option<Address>> {
        match self {
            Metadata::Struct(structure) => Ok(Some(structure.generic_argument_pointer())),
            Metadata::Enum(enumeration) | Metadata::Optional(enumeration) => {
                Ok(Some(enumeration.generic_argument_pointer()))
            }
            Metadata::Class(class) => class.generic_argument_pointer_of(descriptor),
            Metadata::Other(_) => Ok(None),
        }
    }

    /// The generic arguments of this instantiation, in declaration order.
    ///
    /// Empty for non-generic types; the generic argument pointer is then never computed.
    ///
    /// # Errors
    /// Returns an error if the descriptor or an argument can not be read, or if an
    /// argument is null.
    pub fn generic_types(&self) -> Result<Vec<TypeHandle>> {
        let Some(descriptor) = self.descriptor()? else {
            return Ok(Vec::new());
        };
        let Some(generic) = descriptor.generic_context() else {
            return Ok(Vec::new());
        };
        let Some(pointer) = self.generic_argument_pointer_of(&descriptor)? else {
            return Ok(Vec::new());
        };

        let reflector = self.base().reflector;
        let word = reflector.platform().word();
        let arguments = RawView::new(reflector.reader(), reflector.platform(), pointer);

        (0..u64::from(generic.num_params))
            .map(|index| {
                arguments
                    .read_pointer(index * word)?
                    .map(TypeHandle::new)
                    .ok_or_else(|| {
                        malformed_error!(
                            "Generic argument {} of {} is null",
                            index,
                            self.handle()
                        )
                    })
            })
            .collect()
    }

    /// The metadata of every generic argument.
    ///
    /// # Errors
    /// See [`Metadata::generic_types`] and [`Reflector::reflect`].
    pub fn generic_metadata(&self) -> Result<Vec<Metadata<'r>>> {
        let reflector = self.base().reflector;
        self.generic_types()?
            .into_iter()
            .map(|handle| reflector.reflect(handle))
            .collect()
    }

    /// The protocol conformances of the type; empty if it has no context descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn conformances(&self) -> Result<Vec<ConformanceDescriptor>> {
        let reflector = self.base().reflector;
        Ok(match self.descriptor()? {
            Some(descriptor) => reflector.conformances_for(descriptor.address),
            None => Vec::new(),
        })
    }

    /// Resolves the mangled name at `name` against this type: its context descriptor and
    /// generic arguments. `None` if the type has no descriptor or the name is unresolvable.
    ///
    /// # Errors
    /// Returns an error if the name can not be read.
    pub fn type_of(&self, name: Address) -> Result<Option<TypeHandle>> {
        let descriptor = self.descriptor()?;
        self.type_of_in(descriptor.as_ref(), name)
    }

    pub(crate) fn type_of_in(&self, descriptor: Option<&ContextDescriptor>, name: Address) -> Result<Option<TypeHandle>> {
        let generic_arguments = match descriptor {
            Some(descriptor) if descriptor.is_generic() => self.generic_argument_pointer_of(descriptor)?,
            _ => None,
        };

        self.base().reflector.resolve_in(
            name,
            &ResolveEnvironment {
                context: descriptor,
                generic_arguments,
            },
        )
    }
}
