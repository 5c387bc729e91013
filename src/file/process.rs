//! Direct reads of the current process's address space.
//!
//! [`ProcessMemory`] is the memory source for in-process introspection: type handles and
//! metadata addresses are plain pointers into the running program. There is no way to
//! validate such a pointer, so the obligation is moved to the constructor.

use super::MemoryReader;
use crate::{metadata::address::Address, Result};

/// Reads metadata straight out of the current process.
///
/// Reads never fail; an invalid address is undefined behavior. Construct it only when every
/// address passed to the library is known to point at live, immutable runtime metadata.
#[derive(Debug)]
pub struct ProcessMemory {
    _private: (),
}

impl ProcessMemory {
    /// Creates a reader over the current process's memory.
    ///
    /// # Safety
    ///
    /// Every address later read through this reader must be valid for reads of the
    /// requested length for the duration of the read, and must not be concurrently
    /// written. Metadata emitted by the compiler and instantiated by the runtime satisfies
    /// this for as long as its owning image stays loaded.
    #[must_use]
    pub unsafe fn new() -> Self {
        ProcessMemory { _private: () }
    }
}

impl MemoryReader for ProcessMemory {
    fn read_into(&self, address: Address, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        #[allow(clippy::cast_possible_truncation)] // Addresses come from this process
        let source = address.0 as usize as *const u8;

        // SAFETY: `ProcessMemory::new` requires that every address read through this
        // reader is valid for `buf.len()` bytes. Unaligned reads are fine for byte copies.
        unsafe {
            std::ptr::copy_nonoverlapping(source, buf.as_mut_ptr(), buf.len());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_read_own_memory() {
        let data: Vec<u64> = vec![0x1122_3344_5566_7788, 42];
        let address = Address(data.as_ptr() as u64);

        // SAFETY: only addresses inside `data` are read below
        let reader = unsafe { ProcessMemory::new() };

        let mut buf = [0u8; 8];
        reader.read_into(address, &mut buf).unwrap();
        assert_eq!(u64::from_le_bytes(buf), 0x1122_3344_5566_7788);

        reader.read_into(address.advance(8), &mut buf).unwrap();
        assert_eq!(u64::from_le_bytes(buf), 42);
    }
}
