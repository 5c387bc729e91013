//! Snapshot of a foreign address space.
//!
//! A [`Snapshot`] is a set of byte regions, each mapped at a virtual base address. It is the
//! [`crate::MemoryReader`] used for offline analysis of binary images (see
//! [`crate::ImageFile`]) and for building synthetic metadata in tests. Unlike live process
//! memory, a snapshot knows its own extent and reports reads of unmapped memory as
//! [`crate::Error::InvalidAddress`].

use std::collections::BTreeMap;

use super::MemoryReader;
use crate::{metadata::address::Address, Error::InvalidAddress, Result};

/// A sparse, read-only address space made of non-overlapping mapped regions.
///
/// # Examples
///
/// ```rust
/// use swiftscope::{Address, MemoryReader, Snapshot};
///
/// let mut snapshot = Snapshot::new();
/// snapshot.map(Address(0x1000), vec![0x2a, 0x00, 0x00, 0x00])?;
///
/// let mut buf = [0u8; 4];
/// snapshot.read_into(Address(0x1000), &mut buf)?;
/// assert_eq!(u32::from_le_bytes(buf), 42);
/// # Ok::<(), swiftscope::Error>(())
/// ```
#[derive(Clone, Debug, Default)]
pub struct Snapshot {
    /// Memory regions indexed by their base address.
    regions: BTreeMap<u64, Vec<u8>>,
}

impl Snapshot {
    /// Creates an empty snapshot
    #[must_use]
    pub fn new() -> Self {
        Snapshot {
            regions: BTreeMap::new(),
        }
    }

    /// Creates a snapshot holding a single region at `base`
    #[must_use]
    pub fn from_bytes(base: Address, data: Vec<u8>) -> Self {
        let mut regions = BTreeMap::new();
        regions.insert(base.0, data);
        Snapshot { regions }
    }

    /// Maps `data` at `base`.
    ///
    /// Empty regions are ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the region would overlap an existing one or wrap
    /// around the end of the address space.
    pub fn map(&mut self, base: Address, data: Vec<u8>) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }

        let Some(end) = base.0.checked_add(data.len() as u64) else {
            return Err(malformed_error!(
                "Region at {} with {} bytes wraps the address space",
                base,
                data.len()
            ));
        };

        if let Some((&prev_base, prev)) = self.regions.range(..end).next_back() {
            if prev_base + prev.len() as u64 > base.0 {
                return Err(malformed_error!(
                    "Region at {} overlaps region at 0x{:x}",
                    base,
                    prev_base
                ));
            }
        }

        self.regions.insert(base.0, data);
        Ok(())
    }

    /// Number of mapped regions
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Total number of mapped bytes
    #[must_use]
    pub fn mapped_len(&self) -> usize {
        self.regions.values().map(Vec::len).sum()
    }

    /// Returns `true` if `address` is mapped
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.find_region(address).is_some()
    }

    /// Finds the region containing an address and returns the region and offset.
    fn find_region(&self, address: Address) -> Option<(&[u8], usize)> {
        let (&base, data) = self.regions.range(..=address.0).next_back()?;

        #[allow(clippy::cast_possible_truncation)] // Offset bounded by region size
        let offset = (address.0 - base) as usize;
        if offset < data.len() {
            Some((data.as_slice(), offset))
        } else {
            None
        }
    }
}

impl MemoryReader for Snapshot {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        // Reads may span adjacent regions, e.g. consecutive sections of an image.
        let mut filled = 0;
        while filled < buf.len() {
            let current = address.advance(filled as u64);
            let Some((data, offset)) = self.find_region(current) else {
                return Err(InvalidAddress {
                    address,
                    len: buf.len(),
                });
            };

            let count = (data.len() - offset).min(buf.len() - filled);
            buf[filled..filled + count].copy_from_slice(&data[offset..offset + count]);
            filled += count;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_read() {
        let mut data = vec![0xCC_u8; 64];
        data[10..14].copy_from_slice(&[0xBB; 4]);
        let snapshot = Snapshot::from_bytes(Address(0x4000), data);

        let mut buf = [0u8; 4];
        snapshot.read_into(Address(0x400a), &mut buf).unwrap();
        assert_eq!(buf, [0xBB; 4]);

        snapshot.read_into(Address(0x4000), &mut buf).unwrap();
        assert_eq!(buf, [0xCC; 4]);

        assert_eq!(snapshot.mapped_len(), 64);
        assert_eq!(snapshot.region_count(), 1);
    }

    #[test]
    fn snapshot_unmapped() {
        let snapshot = Snapshot::from_bytes(Address(0x4000), vec![0; 16]);

        let mut buf = [0u8; 4];
        let result = snapshot.read_into(Address(0x3ffe), &mut buf);
        assert!(matches!(
            result,
            Err(InvalidAddress {
                address: Address(0x3ffe),
                len: 4
            })
        ));

        assert!(snapshot.read_into(Address(0x400e), &mut buf).is_err());
        assert!(snapshot.read_into(Address(u64::MAX), &mut buf).is_err());
        assert!(!snapshot.contains(Address(0x4010)));
        assert!(snapshot.contains(Address(0x400f)));
    }

    #[test]
    fn snapshot_spanning_read() {
        let mut snapshot = Snapshot::new();
        snapshot.map(Address(0x100), vec![1, 2]).unwrap();
        snapshot.map(Address(0x102), vec![3, 4]).unwrap();

        let mut buf = [0u8; 4];
        snapshot.read_into(Address(0x100), &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);

        snapshot.map(Address(0x200), vec![5]).unwrap();
        let mut buf = [0u8; 8];
        assert!(snapshot.read_into(Address(0x100), &mut buf).is_err());
    }

    #[test]
    fn snapshot_overlap_rejected() {
        let mut snapshot = Snapshot::new();
        snapshot.map(Address(0x100), vec![0; 0x10]).unwrap();

        assert!(snapshot.map(Address(0x108), vec![0; 4]).is_err());
        assert!(snapshot.map(Address(0xf8), vec![0; 0x10]).is_err());
        assert!(snapshot.map(Address(u64::MAX), vec![0; 2]).is_err());

        snapshot.map(Address(0x110), vec![0; 4]).unwrap();
        snapshot.map(Address(0x90), vec![]).unwrap();
        assert_eq!(snapshot.region_count(), 2);
    }

    #[test]
    fn snapshot_empty_read() {
        let snapshot = Snapshot::new();
        let mut buf = [0u8; 0];
        assert!(snapshot.read_into(Address(0x10), &mut buf).is_ok());
    }
}
