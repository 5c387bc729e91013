//! Typed lens over foreign memory.
//!
//! [`RawView`] pairs a base address with the [`MemoryReader`] that can read it and the
//! [`Platform`] that determines pointer width. Every decoder in this crate is a thin layer
//! of named accessors over a `RawView`: the offsets come from [`crate::metadata::layout`],
//! the reads from here. Nothing is copied out of the target memory until a field is
//! actually requested.

use std::fmt;

use crate::{
    file::{io::ByteIO, io::read_le, MemoryReader},
    metadata::{
        address::Address,
        layout::{Layout, Platform, PointerSize},
        pointer::{resolve_direct, resolve_indirectable},
    },
    Result,
};

/// Upper bound for names read with [`RawView::c_string`]
pub const MAX_C_STRING_LENGTH: usize = 4096;

/// A zero-copy view of a record at a foreign address.
///
/// # Examples
///
/// ```rust
/// use swiftscope::{Address, Platform, RawView, Snapshot};
///
/// let snapshot = Snapshot::from_bytes(Address(0x1000), vec![0x2a, 0, 0, 0, b'h', b'i', 0]);
/// let view = RawView::new(&snapshot, Platform::LINUX_64, Address(0x1000));
///
/// assert_eq!(view.read::<u32>(0)?, 42);
/// assert_eq!(view.c_string(4)?, "hi");
/// # Ok::<(), swiftscope::Error>(())
/// ```
#[derive(Clone, Copy)]
pub struct RawView<'a> {
    reader: &'a dyn MemoryReader,
    platform: Platform,
    address: Address,
}

impl<'a> RawView<'a> {
    /// Creates a view of the record at `address`
    #[must_use]
    pub fn new(reader: &'a dyn MemoryReader, platform: Platform, address: Address) -> Self {
        RawView {
            reader,
            platform,
            address,
        }
    }

    /// The base address of the viewed record
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The platform the record was laid out for
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Metadata layout of the platform
    #[must_use]
    pub fn layout(&self) -> Layout {
        self.platform.layout()
    }

    /// The memory source behind this view
    #[must_use]
    pub fn reader(&self) -> &'a dyn MemoryReader {
        self.reader
    }

    /// A view of the same memory `by` bytes further on
    #[must_use]
    pub fn advance(&self, by: u64) -> RawView<'a> {
        self.at(self.address.advance(by))
    }

    /// A view of the same memory `by` bytes away, in either direction
    #[must_use]
    pub fn offset(&self, by: i64) -> RawView<'a> {
        self.at(self.address.offset(by))
    }

    /// A view of another record in the same memory
    #[must_use]
    pub fn at(&self, address: Address) -> RawView<'a> {
        RawView::new(self.reader, self.platform, address)
    }

    /// Reads a little-endian value at `offset`.
    ///
    /// # Errors
    /// Returns an error if the memory can not be read.
    pub fn read<T: ByteIO>(&self, offset: u64) -> Result<T> {
        let mut buf = [0u8; 8];
        let bytes = &mut buf[..T::SIZE];
        self.reader.read_into(self.address.advance(offset), bytes)?;
        read_le::<T>(bytes)
    }

    /// Reads `len` raw bytes at `offset`.
    ///
    /// # Errors
    /// Returns an error if the memory can not be read.
    pub fn read_bytes(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut bytes = vec![0u8; len];
        self.reader.read_into(self.address.advance(offset), &mut bytes)?;
        Ok(bytes)
    }

    /// Reads a pointer-sized unsigned value at `offset`.
    ///
    /// # Errors
    /// Returns an error if the memory can not be read.
    pub fn read_word(&self, offset: u64) -> Result<u64> {
        match self.platform.pointer_size {
            PointerSize::Bit32 => Ok(u64::from(self.read::<u32>(offset)?)),
            PointerSize::Bit64 => self.read::<u64>(offset),
        }
    }

    /// Reads a pointer-sized signed value at `offset`.
    ///
    /// # Errors
    /// Returns an error if the memory can not be read.
    pub fn read_signed_word(&self, offset: u64) -> Result<i64> {
        match self.platform.pointer_size {
            PointerSize::Bit32 => Ok(i64::from(self.read::<i32>(offset)?)),
            PointerSize::Bit64 => self.read::<i64>(offset),
        }
    }

    /// Reads an absolute pointer at `offset`, mapping null to `None`.
    ///
    /// # Errors
    /// Returns an error if the memory can not be read.
    pub fn read_pointer(&self, offset: u64) -> Result<Option<Address>> {
        Ok(Address(self.read_word(offset)?).non_null())
    }

    /// Decodes a relative direct pointer stored at `offset`.
    ///
    /// # Errors
    /// Returns an error if the memory can not be read.
    pub fn relative_direct(&self, offset: u64) -> Result<Option<Address>> {
        let value = self.read::<i32>(offset)?;
        Ok(resolve_direct(self.address.advance(offset), value))
    }

    /// Decodes a relative indirectable pointer stored at `offset`.
    ///
    /// # Errors
    /// Returns an error if the field or the indirection slot can not be read.
    pub fn relative_indirectable(&self, offset: u64) -> Result<Option<Address>> {
        let value = self.read::<i32>(offset)?;
        resolve_indirectable(self.reader, self.platform, self.address.advance(offset), value)
    }

    /// Reads a NUL-terminated UTF-8 string starting at `offset`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; names in metadata are identifiers
    /// and are expected to be ASCII.
    ///
    /// # Errors
    /// Returns an error if the memory can not be read, or if no terminator is found within
    /// [`MAX_C_STRING_LENGTH`] bytes.
    pub fn c_string(&self, offset: u64) -> Result<String> {
        let start = self.address.advance(offset);
        let mut bytes = Vec::new();

        loop {
            let byte = self.at(start).read::<u8>(bytes.len() as u64)?;
            if byte == 0 {
                break;
            }

            bytes.push(byte);
            if bytes.len() >= MAX_C_STRING_LENGTH {
                return Err(malformed_error!("Unterminated string at {}", start));
            }
        }

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Reads the C string referenced by a relative direct pointer at `offset`.
    ///
    /// # Errors
    /// Returns an error if the pointer is null or the string can not be read.
    pub fn relative_c_string(&self, offset: u64) -> Result<String> {
        match self.relative_direct(offset)? {
            Some(target) => self.at(target).c_string(0),
            None => Err(malformed_error!(
                "Null string reference at {}",
                self.address.advance(offset)
            )),
        }
    }
}

impl fmt::Debug for RawView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawView")
            .field("address", &self.address)
            .field("platform", &self.platform)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{file::memory::Snapshot, Error};

    fn snapshot() -> Snapshot {
        let mut data = vec![0u8; 0x40];
        data[0..4].copy_from_slice(&0xdead_beef_u32.to_le_bytes());
        data[8..16].copy_from_slice(&0x1122_3344_5566_7788_u64.to_le_bytes());
        // Relative pointer at 0x10 to the string at 0x30
        data[0x10..0x14].copy_from_slice(&0x20_i32.to_le_bytes());
        data[0x30..0x36].copy_from_slice(b"Boat\0\0");
        Snapshot::from_bytes(Address(0x1000), data)
    }

    #[test]
    fn typed_reads() {
        let snapshot = snapshot();
        let view = RawView::new(&snapshot, Platform::LINUX_64, Address(0x1000));

        assert_eq!(view.read::<u32>(0).unwrap(), 0xdead_beef);
        assert_eq!(view.read::<u16>(0).unwrap(), 0xbeef);
        assert_eq!(view.read_word(8).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(view.advance(8).read::<u8>(0).unwrap(), 0x88);
        assert_eq!(view.read_pointer(0x18).unwrap(), None);
    }

    #[test]
    fn word_size_32() {
        let snapshot = snapshot();
        let view = RawView::new(&snapshot, Platform::LINUX_32, Address(0x1000));

        assert_eq!(view.read_word(8).unwrap(), 0x5566_7788);
        assert_eq!(view.read_signed_word(0).unwrap(), 0xdead_beef_u32 as i32 as i64);
    }

    #[test]
    fn relative_reads() {
        let snapshot = snapshot();
        let view = RawView::new(&snapshot, Platform::LINUX_64, Address(0x1000));

        assert_eq!(view.relative_direct(0x10).unwrap(), Some(Address(0x1030)));
        assert_eq!(view.relative_direct(0x14).unwrap(), None);
        assert_eq!(view.relative_c_string(0x10).unwrap(), "Boat");
        assert!(view.relative_c_string(0x14).is_err());
    }

    #[test]
    fn unmapped_reads() {
        let snapshot = snapshot();
        let view = RawView::new(&snapshot, Platform::LINUX_64, Address(0x1000));

        assert!(matches!(
            view.read::<u64>(0x3c),
            Err(Error::InvalidAddress { .. })
        ));
        assert!(view.offset(-4).read::<u32>(0).is_err());
    }

    #[test]
    fn unterminated_string() {
        let snapshot = Snapshot::from_bytes(Address(0x1000), vec![b'a'; MAX_C_STRING_LENGTH + 8]);
        let view = RawView::new(&snapshot, Platform::LINUX_64, Address(0x1000));
        assert!(view.c_string(0).is_err());

        let short = Snapshot::from_bytes(Address(0x1000), vec![b'a'; 8]);
        let view = RawView::new(&short, Platform::LINUX_64, Address(0x1000));
        assert!(matches!(view.c_string(0), Err(Error::InvalidAddress { .. })));
    }
}
