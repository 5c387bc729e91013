//! Low-level, bounds-checked little-endian reads over byte buffers.
//!
//! Swift metadata is always stored in the target's native byte order, and every platform
//! with a stable Swift ABI is little-endian, so only little-endian reads are provided.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Trait describing how a primitive is decoded from bytes
//! - [`crate::file::io::read_le`] - Read a value from the start of a buffer
//! - [`crate::file::io::read_le_at`] - Read a value at an offset, advancing the offset
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use swiftscope::file::io::read_le_at;
//!
//! let data = [0x01, 0x00, 0x02, 0x00, 0x03, 0x00, 0x00, 0x00];
//! let mut offset = 0;
//!
//! let first: u16 = read_le_at(&data, &mut offset)?;  // offset: 0 -> 2
//! let second: u16 = read_le_at(&data, &mut offset)?; // offset: 2 -> 4
//! let third: u32 = read_le_at(&data, &mut offset)?;  // offset: 4 -> 8
//!
//! assert_eq!((first, second, third), (1, 2, 3));
//! # Ok::<(), swiftscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All functions return [`crate::Error::Malformed`] when the buffer is too short. Callers
//! reading foreign memory translate buffer positions into addresses themselves, see
//! [`crate::metadata::view::RawView`].

use crate::Result;

/// Trait for implementing type-specific safe binary data reading operations.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait ByteIO: Sized + Copy {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Size of the encoded value in bytes
    const SIZE: usize;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_byte_io {
    ($($ty:ty),*) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }
            }
        )*
    };
}

impl_byte_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads T in little-endian from the start of a data buffer.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the buffer is shorter than `T`.
pub fn read_le<T: ByteIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads T in little-endian at `offset`, advancing the offset by the size of `T`.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let Some(end) = offset.checked_add(T::SIZE) else {
        return Err(malformed_error!("Offset overflow reading {} bytes", T::SIZE));
    };

    if end > data.len() {
        return Err(malformed_error!(
            "Buffer of {} bytes too short to read {} bytes at {}",
            data.len(),
            T::SIZE,
            offset
        ));
    }

    let Ok(bytes) = T::Bytes::try_from(&data[*offset..end]) else {
        return Err(malformed_error!("Failed to convert {} bytes", T::SIZE));
    };

    *offset = end;
    Ok(T::from_le_bytes(bytes))
}
