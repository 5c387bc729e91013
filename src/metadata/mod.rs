//! Swift runtime metadata decoding.
//!
//! This module contains the layered decoders interpreting foreign addresses as typed views
//! over the runtime's binary metadata records, from raw reads up to the [`Reflector`]
//! answering structural questions about types.
//!
//! # Key Components
//!
//! - [`address`] - Foreign addresses and type handles
//! - [`layout`] - Every offset of every record, per [`layout::Platform`]
//! - [`view`] and [`pointer`] - Typed reads and relative pointers
//! - [`kind`] and [`flags`] - Discriminants and flag words
//! - [`descriptor`] - Context descriptors: declarations, generics, class layout, fields
//! - [`types`] - Metadata records: structs, enums, classes, value witness tables
//! - [`conformance`] - Protocol conformance records and their registry
//! - [`mangling`] - Mangled type names, their resolution and cache
//! - [`reflector`] - The context every query flows through
//!
//! # Examples
//!
//! ```rust,no_run
//! use swiftscope::{Address, Metadata, ProcessMemory, Reflector, TypeHandle};
//!
//! let reflector = Reflector::new(unsafe { ProcessMemory::new() });
//! let metadata = reflector.reflect(TypeHandle::new(Address(0x1_0000_8000)))?;
//!
//! if let Some(name) = metadata.name()? {
//!     println!("{} ({:?})", name, metadata.kind());
//! }
//! for conformance in metadata.conformances()? {
//!     println!("  conforms to {:?}", conformance.protocol_name);
//! }
//! # Ok::<(), swiftscope::Error>(())
//! ```

/// Foreign addresses and type handles
pub mod address;
/// Reflection configuration
pub mod config;
/// Protocol conformance records and the conformance registry
pub mod conformance;
/// Context descriptors
pub mod descriptor;
/// Flag words of descriptors and metadata
pub mod flags;
/// Metadata kinds
pub mod kind;
/// Record layouts
pub mod layout;
/// Mangled names and their resolution
pub mod mangling;
/// Relative pointers
pub mod pointer;
/// The reflection context
pub mod reflector;
/// Type metadata views
pub mod types;
/// Typed reads at foreign addresses
pub mod view;

pub use reflector::Reflector;
