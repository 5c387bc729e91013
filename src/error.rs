use thiserror::Error;

use crate::metadata::address::Address;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Most queries in this crate are reads of memory the library does not own. Whether such a
/// read can fail depends on the [`crate::MemoryReader`] in use: a [`crate::Snapshot`] reports
/// unmapped reads as [`Error::InvalidAddress`], while [`crate::ProcessMemory`] trusts its caller
/// and never fails.
///
/// # Error Categories
///
/// ## Memory and Layout Errors
/// - [`Error::InvalidAddress`] - A read touched memory that is not mapped
/// - [`Error::Malformed`] - A record is structurally impossible
/// - [`Error::UnsupportedKind`] - Unknown metadata or context descriptor discriminant
/// - [`Error::RecursionLimit`] - A superclass chain exceeded the configured depth
///
/// ## Image Loading Errors
/// - [`Error::NotSupported`] - Unsupported binary image format
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - ELF/Mach-O parsing errors from goblin crate
///
/// # Examples
///
/// ```rust,no_run
/// use swiftscope::{Error, ImageFile};
/// use std::path::Path;
///
/// match ImageFile::from_file(Path::new("libFoo.so")) {
///     Ok(image) => println!("Loaded {} sections", image.sections().len()),
///     Err(Error::NotSupported) => eprintln!("Image format is not supported"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed image: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A read of `len` bytes at `address` touched memory that is not mapped.
    ///
    /// Only memory sources that know their own extent (such as [`crate::Snapshot`]) can
    /// report this. Reading live process memory through an invalid address is a
    /// precondition violation and is not detected.
    #[error("Read of {len} bytes at {address} is outside of mapped memory")]
    InvalidAddress {
        /// The first address of the failed read
        address: Address,
        /// The number of bytes requested
        len: usize,
    },

    /// A metadata record is damaged and could not be decoded.
    ///
    /// The error includes the source location where the malformation was detected for
    /// debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The discriminant of a metadata record or context descriptor is not known.
    ///
    /// Malformed or future-versioned records are expected in the wild, so this is reported
    /// instead of aborting.
    #[error("Unsupported metadata kind - 0x{0:x}")]
    UnsupportedKind(u64),

    /// This image type is not supported.
    #[error("This image type is not supported")]
    NotSupported,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during ELF/Mach-O parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Recursion limit reached.
    ///
    /// Walking a resilient superclass chain is bounded; a chain longer than the limit is
    /// treated as corrupt (most likely a cycle).
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}
