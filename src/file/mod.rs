//! Memory sources and binary image access.
//!
//! Every metadata record this crate decodes lives in memory it does not own. This module
//! abstracts over where that memory is and provides the low-level byte parsing used by the
//! decoders.
//!
//! # Architecture
//!
//! - **Memory sources** - The [`crate::file::MemoryReader`] trait, implemented by a live
//!   process reader and by sparse address-space snapshots
//! - **Image loading** - ELF and Mach-O images mapped into snapshots at their virtual
//!   addresses
//! - **Byte parsing** - Bounds-checked little-endian reads and a cursor parser
//!
//! # Key Components
//!
//! ## Memory Sources
//! - [`crate::file::MemoryReader`] - Trait for reading bytes at foreign addresses
//! - [`crate::file::process::ProcessMemory`] - Reads the current process directly
//! - [`crate::file::memory::Snapshot`] - Mapped byte regions with checked reads
//!
//! ## Images
//! - [`crate::file::physical::ImageFile`] - ELF/Mach-O image mapped into a snapshot
//!
//! ## Parsing Infrastructure
//! - [`crate::file::parser::Parser`] - Cursor-based parser for mangled names
//! - [`crate::file::io`] - Low-level little-endian reads
//!
//! # Examples
//!
//! ```rust,no_run
//! use swiftscope::{ImageFile, MemoryReader, Address};
//! use std::path::Path;
//!
//! let image = ImageFile::from_file(Path::new("libFoo.dylib"))?;
//! if let Some(section) = image.section("__swift5_proto") {
//!     let mut first = [0u8; 4];
//!     image.snapshot().read_into(section.range.start, &mut first)?;
//!     println!("first conformance record: {:02x?}", first);
//! }
//! # Ok::<(), swiftscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! All memory sources are `Send + Sync` and are read-only once constructed, so a single
//! source can back concurrent queries from many threads.

pub mod io;
pub mod parser;

pub(crate) mod memory;
pub(crate) mod physical;
pub(crate) mod process;

use crate::{metadata::address::Address, Result};

/// Source of bytes at foreign addresses.
///
/// This trait abstracts over where metadata lives: the current process, a snapshot of
/// another process, or a binary image mapped from disk. All implementations must be
/// thread-safe.
///
/// Implementations that can detect unmapped memory report it as
/// [`crate::Error::InvalidAddress`]; implementations that can not (such as
/// [`crate::ProcessMemory`]) make validity a precondition of their construction.
pub trait MemoryReader: Send + Sync {
    /// Fills `buf` with the bytes starting at `address`.
    ///
    /// # Arguments
    ///
    /// * `address` - The first address to read
    /// * `buf` - Destination; its length is the number of bytes read
    ///
    /// # Errors
    ///
    /// Returns an error if any byte of the requested range is not readable.
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<()>;
}

impl<T: MemoryReader + ?Sized> MemoryReader for std::sync::Arc<T> {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        (**self).read_into(address, buf)
    }
}

impl<T: MemoryReader + ?Sized> MemoryReader for &T {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        (**self).read_into(address, buf)
    }
}
