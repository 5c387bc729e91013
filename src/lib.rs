// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory
// - 'file/process.rs' reads the current process's address space

//! # swiftscope
//!
//! A reflection library for Swift runtime metadata. `swiftscope` interprets raw memory,
//! whether it belongs to the running process, a snapshot of another process or a binary image
//! mapped from disk, as the typed records the Swift runtime emits for every type: context
//! descriptors, value and class metadata, value witness tables, field descriptors and
//! protocol conformance records.
//!
//! # Architecture
//!
//! The library is organised in layers, each built on the one below:
//!
//! - **Memory** ([`MemoryReader`]): [`ProcessMemory`], [`Snapshot`] and [`ImageFile`]
//!   provide bytes at foreign addresses
//! - **Views** ([`RawView`], [`metadata::pointer`]): typed reads and relative pointer
//!   resolution over a [`Platform`]'s [`Layout`]
//! - **Descriptors** ([`ContextDescriptor`]): declarations, generic signatures, class
//!   layout and fields
//! - **Metadata** ([`Metadata`]): runtime type records and their questions
//! - **Reflection** ([`Reflector`]): the context every query flows through, owning the
//!   [`ConformanceRegistry`] and the [`MangledNameResolver`]
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use swiftscope::prelude::*;
//!
//! let reflector = Reflector::new(unsafe { ProcessMemory::new() });
//! let metadata = reflector.reflect(TypeHandle::new(Address(0x1_0000_8000)))?;
//!
//! match metadata {
//!     Metadata::Struct(structure) => {
//!         println!("struct with {} fields", structure.num_fields()?);
//!         println!("offsets: {:?}", structure.field_offsets()?);
//!     }
//!     Metadata::Class(class) => {
//!         println!("class, {} vtable slots", class.vtable()?.len());
//!     }
//!     other => println!("{:?}", other.kind()),
//! }
//! # Ok::<(), swiftscope::Error>(())
//! ```
//!
//! # Inspecting a binary image
//!
//! ```rust,no_run
//! use std::{path::Path, sync::Arc};
//! use swiftscope::{ImageFile, ImageId, Reflector, StaticImages};
//!
//! let image = ImageFile::from_file(Path::new("libBoats.dylib"))?;
//! let images = Arc::new(StaticImages::new());
//! if let Some(loaded) = image.image(ImageId(0)) {
//!     images.add(loaded);
//! }
//!
//! let reflector = Reflector::builder(image.into_snapshot())
//!     .platform(swiftscope::Platform::APPLE_64)
//!     .images(images)
//!     .build();
//! println!("{:?}", reflector);
//! # Ok::<(), swiftscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T, Error>`](Result):
//!
//! ```rust,no_run
//! use swiftscope::{Address, Error, Reflector, Snapshot};
//!
//! let reflector = Reflector::new(Snapshot::new());
//! match reflector.reflect_address(Address(0x1000)) {
//!     Ok(metadata) => println!("{:?}", metadata.kind()),
//!     Err(Error::InvalidAddress { address, .. }) => println!("unmapped: {}", address),
//!     Err(Error::UnsupportedKind(kind)) => println!("unknown kind {:#x}", kind),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
//!
//! # Thread Safety
//!
//! [`Reflector`] is `Send + Sync`. Its conformance registry and mangled name cache are
//! shared by every query, and no cache lock is held while foreign memory is decoded.
//!
//! ## Development and Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! cargo +nightly fuzz run metadata --release
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;
pub(crate) mod file;


/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use swiftscope::prelude::*;
///
/// let reflector = Reflector::new(Snapshot::new());
/// assert!(reflector.names().cache().is_empty());
/// ```
pub mod prelude;

/// Swift runtime metadata: layouts, descriptors, metadata records, conformances and names
pub mod metadata;

/// `swiftscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `swiftscope` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use swiftscope::{Address, Error, ImageFile};
///
/// match ImageFile::from_file(std::path::Path::new("libBoats.so")) {
///     Ok(image) => println!("{} sections", image.sections().len()),
///     Err(Error::NotSupported) => println!("File format not supported"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Memory sources and low-level reading
pub use file::{
    io::{read_le, read_le_at, ByteIO},
    memory::Snapshot,
    parser::Parser,
    physical::{ImageFile, ImageFormat, ImageSection},
    process::ProcessMemory,
    MemoryReader,
};

pub use metadata::{
    address::{Address, AddressRange, TypeHandle},
    config::ReflectionConfig,
    conformance::{
        ConformanceDescriptor, ConformanceRegistry, ImageEnumerator, ImageId, LoadedImage,
        StaticImages,
    },
    descriptor::{
        ClassDescriptor, ContextDescriptor, ContextDetails, EnumDescriptor, FieldDescriptor,
        FieldRecord, GenericContext, StructDescriptor, TypeDescriptor,
    },
    flags::{
        ClassFlags, ConformanceFlags, ContextDescriptorFlags, ContextDescriptorKind,
        FieldRecordFlags, TypeContextFlags, ValueWitnessFlags,
    },
    kind::MetadataKind,
    layout::{Layout, Platform, PointerSize},
    mangling::{
        CachedType, MangledName, MangledNameCache, MangledNameResolver, ResolveEnvironment,
        SymbolicResolver, TypeNameResolver,
    },
    pointer::TypeReferenceKind,
    reflector::{Reflector, ReflectorBuilder},
    types::{
        ClassMetadata, EnumMetadata, Metadata, ObjectModel, OtherMetadata, PlatformObjectModel,
        StructMetadata, VTable, VTableMethod, VTableSlot, ValueWitnessTable,
    },
    view::RawView,
};
