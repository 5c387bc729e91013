//! # swiftscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the swiftscope library. Import this module to get quick access to the essential
//! types for Swift metadata reflection.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all swiftscope operations
pub use crate::Error;

/// The result type used throughout swiftscope
pub use crate::Result;

// ================================================================================================
// Memory Sources
// ================================================================================================

/// The memory source abstraction and its implementations
pub use crate::{ImageFile, MemoryReader, ProcessMemory, Snapshot};

/// Foreign addresses and type handles
pub use crate::{Address, AddressRange, TypeHandle};

/// Target layouts
pub use crate::{Platform, PointerSize};

// ================================================================================================
// Reflection
// ================================================================================================

/// The reflection context and its configuration
pub use crate::{ReflectionConfig, Reflector, ReflectorBuilder};

/// Metadata records
pub use crate::{
    ClassMetadata, EnumMetadata, Metadata, MetadataKind, OtherMetadata, StructMetadata,
    ValueWitnessTable,
};

/// Context descriptors
pub use crate::{ContextDescriptor, ContextDescriptorKind, FieldDescriptor};

// ================================================================================================
// Conformances and Names
// ================================================================================================

/// Protocol conformances and the images they are found in
pub use crate::{ConformanceDescriptor, ImageEnumerator, ImageId, LoadedImage, StaticImages};

/// Mangled name resolution
pub use crate::{ResolveEnvironment, SymbolicResolver, TypeNameResolver};
