//! Foreign addresses and type handles.
//!
//! Every record this crate decodes lives in memory it does not own: the current process,
//! or a [`crate::Snapshot`] of some other address space. [`Address`] is the currency for
//! locations in that memory. It is a plain number with checked arithmetic and carries no
//! validity guarantee whatsoever.
//!
//! [`TypeHandle`] is the opaque identifier the runtime uses for a concrete type, which is the
//! address of the type's metadata record.

use std::fmt;
use std::ops::Range;

/// An address in foreign memory.
///
/// Addresses are never dereferenced directly; all reads go through a
/// [`crate::MemoryReader`], which decides whether the location is readable.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub u64);

impl Address {
    /// The null address
    pub const NULL: Address = Address(0);

    /// Creates a new address from a raw value
    #[must_use]
    pub fn new(value: u64) -> Self {
        Address(value)
    }

    /// Returns the raw address value
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns true if this is the null address
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Returns `None` for the null address, `Some(self)` otherwise
    #[must_use]
    pub fn non_null(self) -> Option<Address> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Moves the address forward by `bytes`, wrapping like pointer arithmetic on the target.
    #[must_use]
    pub fn advance(self, bytes: u64) -> Address {
        Address(self.0.wrapping_add(bytes))
    }

    /// Moves the address by a signed byte offset, as relative pointers and negative metadata
    /// prefixes require.
    #[must_use]
    pub fn offset(self, bytes: i64) -> Address {
        Address(self.0.wrapping_add_signed(bytes))
    }

    /// Returns the distance in bytes from `base` to this address, if this address is not
    /// below `base`.
    #[must_use]
    pub fn distance_from(self, base: Address) -> Option<u64> {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(value)
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{:x})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// A half-open range of foreign addresses, such as a section of a loaded image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AddressRange {
    /// First address in the range
    pub start: Address,
    /// One past the last address in the range
    pub end: Address,
}

impl AddressRange {
    /// Creates a range from a start address and a length in bytes
    #[must_use]
    pub fn new(start: Address, len: u64) -> Self {
        AddressRange {
            start,
            end: start.advance(len),
        }
    }

    /// Length of the range in bytes
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Returns `true` if the range covers no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `address` lies inside the range
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end
    }
}

impl From<Range<u64>> for AddressRange {
    fn from(range: Range<u64>) -> Self {
        AddressRange {
            start: Address(range.start),
            end: Address(range.end),
        }
    }
}

/// Opaque identifier of a concrete type known to the runtime.
///
/// A type handle is the address of the type's metadata record. Handles are not owned:
/// their lifetime is the lifetime of the image that defines the type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeHandle(pub Address);

impl TypeHandle {
    /// Creates a type handle from the address of a metadata record
    #[must_use]
    pub fn new(metadata: Address) -> Self {
        TypeHandle(metadata)
    }

    /// Address of the metadata record this handle refers to
    #[must_use]
    pub fn metadata_address(&self) -> Address {
        self.0
    }
}

impl From<Address> for TypeHandle {
    fn from(address: Address) -> Self {
        TypeHandle(address)
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHandle(0x{:x})", self.0 .0)
    }
}

impl fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
