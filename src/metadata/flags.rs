//! Flag words of metadata and descriptor records.
//!
//! # Key Types
//! - [`ContextDescriptorFlags`], [`ContextDescriptorKind`]: the first word of every context descriptor
//! - [`TypeContextFlags`], [`MetadataInitialization`]: kind-specific flags of type descriptors
//! - [`GenericContextFlags`]: generic context header flags
//! - [`ClassFlags`]: class metadata flags
//! - [`ValueWitnessFlags`]: value witness table flags
//! - [`ConformanceFlags`]: protocol conformance descriptor flags
//! - [`MethodDescriptorFlags`], [`MethodDescriptorKind`]: vtable method descriptor flags
//! - [`FieldRecordFlags`]: reflection field record flags

use std::fmt;

use bitflags::bitflags;
use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{metadata::pointer::TypeReferenceKind, Error::UnsupportedKind, Result};

/// Bitmask for the context kind in [`ContextDescriptorFlags`]
pub const CONTEXT_KIND_MASK: u32 = 0x1F;
/// Bitmask for the metadata initialization kind in [`TypeContextFlags`]
pub const METADATA_INITIALIZATION_MASK: u16 = 0x3;
/// Bitmask for the resilient superclass reference kind in [`TypeContextFlags`]
pub const RESILIENT_SUPERCLASS_REFERENCE_KIND_MASK: u16 = 0x0E00;
/// Bitmask for the method kind in [`MethodDescriptorFlags`]
pub const METHOD_KIND_MASK: u32 = 0x0F;
/// Bitmask for the type reference kind in [`ConformanceFlags`]
pub const CONFORMANCE_TYPE_REFERENCE_KIND_MASK: u32 = 0x38;
/// Bitmask for the number of conditional requirements in [`ConformanceFlags`]
pub const CONFORMANCE_NUM_CONDITIONAL_REQUIREMENTS_MASK: u32 = 0xFF00;
/// Bitmask for the alignment in [`ValueWitnessFlags`]
pub const VALUE_WITNESS_ALIGNMENT_MASK: u32 = 0xFF;

/// Kind of a context descriptor
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum ContextDescriptorKind {
    /// A module
    Module = 0,
    /// An extension of a type
    Extension = 1,
    /// An anonymous context, such as a function body
    Anonymous = 2,
    /// A protocol
    Protocol = 3,
    /// An opaque result type
    OpaqueType = 4,
    /// A class
    Class = 16,
    /// A struct
    Struct = 17,
    /// An enum
    Enum = 18,
}

impl ContextDescriptorKind {
    /// Decodes a context kind.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedKind`] for unknown kinds.
    pub fn from_bits(bits: u32) -> Result<Self> {
        ContextDescriptorKind::iter()
            .find(|kind| *kind as u32 == bits)
            .ok_or(UnsupportedKind(u64::from(bits)))
    }

    /// Returns `true` for nominal type contexts: classes, structs and enums
    #[must_use]
    pub fn is_type(self) -> bool {
        matches!(
            self,
            ContextDescriptorKind::Class | ContextDescriptorKind::Struct | ContextDescriptorKind::Enum
        )
    }
}

/// The flags word at the start of every context descriptor.
///
/// Layout: bits 0-4 kind, bit 5 has-invertible-protocols, bit 6 unique, bit 7 generic,
/// bits 8-15 version, bits 16-31 kind-specific flags.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextDescriptorFlags(pub u32);

impl ContextDescriptorFlags {
    /// Context carries an invertible protocol set (`~Copyable`, `~Escapable`)
    pub const HAS_INVERTIBLE_PROTOCOLS: u32 = 0x20;
    /// Context is unique to its defining image
    pub const IS_UNIQUE: u32 = 0x40;
    /// Context has generic parameters
    pub const IS_GENERIC: u32 = 0x80;

    /// Kind of the context
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedKind`] for unknown kinds.
    pub fn kind(self) -> Result<ContextDescriptorKind> {
        ContextDescriptorKind::from_bits(self.0 & CONTEXT_KIND_MASK)
    }

    /// Whether the context has generic parameters
    #[must_use]
    pub fn is_generic(self) -> bool {
        self.0 & Self::IS_GENERIC != 0
    }

    /// Whether the context is unique
    #[must_use]
    pub fn is_unique(self) -> bool {
        self.0 & Self::IS_UNIQUE != 0
    }

    /// Whether the context carries an invertible protocol set
    #[must_use]
    pub fn has_invertible_protocols(self) -> bool {
        self.0 & Self::HAS_INVERTIBLE_PROTOCOLS != 0
    }

    /// Format version
    #[must_use]
    pub fn version(self) -> u8 {
        ((self.0 >> 8) & 0xFF) as u8
    }

    /// The upper 16 bits, interpreted per kind
    #[must_use]
    pub fn kind_specific(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// The kind-specific bits of a type context
    #[must_use]
    pub fn type_flags(self) -> TypeContextFlags {
        TypeContextFlags::from_bits_retain(self.kind_specific())
    }
}

impl fmt::Debug for ContextDescriptorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextDescriptorFlags")
            .field("kind", &(self.0 & CONTEXT_KIND_MASK))
            .field("generic", &self.is_generic())
            .field("unique", &self.is_unique())
            .field("version", &self.version())
            .field("kind_specific", &format_args!("0x{:04x}", self.kind_specific()))
            .finish()
    }
}

/// How the runtime initializes a type's metadata
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MetadataInitialization {
    /// Metadata is emitted statically
    None,
    /// A singleton initialization record follows the descriptor
    Singleton,
    /// A foreign initialization record follows the descriptor
    Foreign,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Kind-specific flags of class, struct and enum descriptors
    pub struct TypeContextFlags: u16 {
        /// Name is followed by import info (C/Objective-C imported types)
        const HAS_IMPORT_INFO = 1 << 2;
        /// Trailing list of prespecialized metadata
        const HAS_CANONICAL_METADATA_PRESPECIALIZATIONS = 1 << 3;
        /// Trailing layout string
        const HAS_LAYOUT_STRING = 1 << 4;
        /// Class is an actor
        const CLASS_IS_ACTOR = 1 << 7;
        /// Class is a default actor
        const CLASS_IS_DEFAULT_ACTOR = 1 << 8;
        /// Immediate members are laid out before the address point
        const CLASS_ARE_IMMEDIATE_MEMBERS_NEGATIVE = 1 << 12;
        /// Superclass is resilient; the metadata bounds are not known statically
        const CLASS_HAS_RESILIENT_SUPERCLASS = 1 << 13;
        /// Trailing method override table
        const CLASS_HAS_OVERRIDE_TABLE = 1 << 14;
        /// Trailing vtable descriptor
        const CLASS_HAS_VTABLE = 1 << 15;

        // Multi-bit fields, decoded by the accessors below
        const _ = !0;
    }
}

impl TypeContextFlags {
    /// The metadata initialization kind
    #[must_use]
    pub fn metadata_initialization(self) -> MetadataInitialization {
        match self.bits() & METADATA_INITIALIZATION_MASK {
            1 => MetadataInitialization::Singleton,
            2 => MetadataInitialization::Foreign,
            _ => MetadataInitialization::None,
        }
    }

    /// How the resilient superclass record references the superclass
    #[must_use]
    pub fn resilient_superclass_reference_kind(self) -> TypeReferenceKind {
        TypeReferenceKind::from_bits(
            u32::from((self.bits() & RESILIENT_SUPERCLASS_REFERENCE_KIND_MASK) >> 9),
        )
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Flags of a generic context header
    pub struct GenericContextFlags: u16 {
        /// Pack shape header and descriptors follow the requirements
        const HAS_TYPE_PACKS = 0x1;
        /// Conditional invertible protocol requirements follow
        const HAS_CONDITIONAL_INVERTED_PROTOCOLS = 0x2;
        /// Value parameters are present
        const HAS_VALUES = 0x4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Class metadata flags
    pub struct ClassFlags: u32 {
        /// Class was compiled before the stable ABI
        const IS_SWIFT_PRE_STABLE_ABI = 0x1;
        /// Instances use Swift reference counting
        const USES_SWIFT_REFCOUNTING = 0x2;
        /// Class has a custom Objective-C name
        const HAS_CUSTOM_OBJC_NAME = 0x4;
        /// Metadata is a static specialization
        const IS_STATICALLY_SPECIALIZED = 0x8;
        /// Metadata is the canonical static specialization
        const IS_CANONICAL_STATIC_SPECIALIZATION = 0x10;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Value witness table flags
    pub struct ValueWitnessFlags: u32 {
        /// Alignment minus one
        const ALIGNMENT_MASK = VALUE_WITNESS_ALIGNMENT_MASK;
        /// Copying requires more than a memcpy
        const IS_NON_POD = 0x0001_0000;
        /// Values do not fit into a fixed-size inline buffer
        const IS_NON_INLINE = 0x0002_0000;
        /// Type has spare bits usable by enclosing enums
        const HAS_SPARE_BITS = 0x0008_0000;
        /// Moving requires more than a memcpy
        const IS_NON_BITWISE_TAKABLE = 0x0010_0000;
        /// Enum value witnesses follow the table
        const HAS_ENUM_WITNESSES = 0x0020_0000;
        /// Layout is not yet complete
        const INCOMPLETE = 0x0040_0000;
        /// Type is not copyable
        const IS_NON_COPYABLE = 0x0080_0000;
        /// Borrowing requires more than a memcpy
        const IS_NON_BITWISE_BORROWABLE = 0x0100_0000;
    }
}

impl ValueWitnessFlags {
    /// Alignment mask (alignment minus one)
    #[must_use]
    pub fn alignment_mask(self) -> u64 {
        u64::from(self.bits() & VALUE_WITNESS_ALIGNMENT_MASK)
    }

    /// Alignment in bytes
    #[must_use]
    pub fn alignment(self) -> u64 {
        self.alignment_mask() + 1
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Protocol conformance descriptor flags
    pub struct ConformanceFlags: u32 {
        /// Conformance is declared outside both the type's and the protocol's module
        const IS_RETROACTIVE = 1 << 6;
        /// Conformance was synthesized and may be duplicated across images
        const IS_SYNTHESIZED_NON_UNIQUE = 1 << 7;
        /// Resilient witnesses follow the descriptor
        const HAS_RESILIENT_WITNESSES = 1 << 16;
        /// Generic witness table record follows the descriptor
        const HAS_GENERIC_WITNESS_TABLE = 1 << 17;
        /// Conformance of a protocol to a protocol
        const IS_CONFORMANCE_OF_PROTOCOL = 1 << 18;
        /// Conformance is isolated to a global actor
        const HAS_GLOBAL_ACTOR_ISOLATION = 1 << 19;

        // Multi-bit fields, decoded by the accessors below
        const _ = !0;
    }
}

impl ConformanceFlags {
    /// How the conforming type is referenced
    #[must_use]
    pub fn type_reference_kind(self) -> TypeReferenceKind {
        TypeReferenceKind::from_bits((self.bits() & CONFORMANCE_TYPE_REFERENCE_KIND_MASK) >> 3)
    }

    /// Number of conditional requirements
    #[must_use]
    pub fn num_conditional_requirements(self) -> u32 {
        (self.bits() & CONFORMANCE_NUM_CONDITIONAL_REQUIREMENTS_MASK) >> 8
    }
}

/// Kind of a vtable method
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum MethodDescriptorKind {
    /// Ordinary method
    Method = 0,
    /// Initializer
    Init = 1,
    /// Property getter
    Getter = 2,
    /// Property setter
    Setter = 3,
    /// `modify` coroutine
    ModifyCoroutine = 4,
    /// `read` coroutine
    ReadCoroutine = 5,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Flags of a vtable method descriptor
    pub struct MethodDescriptorFlags: u32 {
        /// Instance member (otherwise static/class)
        const IS_INSTANCE = 0x10;
        /// Dynamically replaceable
        const IS_DYNAMIC = 0x20;
        /// Async function
        const IS_ASYNC = 0x40;

        // Kind and pointer authentication discriminator
        const _ = !0;
    }
}

impl MethodDescriptorFlags {
    /// The method kind, or `None` for kinds newer than this crate
    #[must_use]
    pub fn kind(self) -> Option<MethodDescriptorKind> {
        let bits = self.bits() & METHOD_KIND_MASK;
        MethodDescriptorKind::iter().find(|kind| *kind as u32 == bits)
    }

    /// Pointer authentication discriminator
    #[must_use]
    pub fn extra_discriminator(self) -> u16 {
        (self.bits() >> 16) as u16
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Flags of a reflection field record
    pub struct FieldRecordFlags: u32 {
        /// Enum case stored out of line
        const IS_INDIRECT_CASE = 0x1;
        /// Mutable stored property
        const IS_VAR = 0x2;
        /// Compiler-generated field
        const IS_ARTIFICIAL = 0x4;
    }
}
