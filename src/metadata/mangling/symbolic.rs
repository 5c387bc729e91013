//! Extent of symbolic mangled names.
//!
//! Mangled type names in metadata are not plain C strings: they may embed *symbolic
//! references*, a control byte followed by a 32-bit relative offset (bytes `0x01..=0x17`)
//! or an absolute pointer (bytes `0x18..=0x1F`). The payload of a reference can contain
//! zero bytes, so the name ends at the first zero byte that is not part of a reference.

use crate::{
    file::MemoryReader,
    metadata::{address::Address, layout::Platform, view::RawView},
    Result,
};

/// Returns `true` for control bytes introducing a reference with a 32-bit relative offset
#[must_use]
pub fn is_relative_reference(byte: u8) -> bool {
    (0x01..=0x17).contains(&byte)
}

/// Returns `true` for control bytes introducing a reference with an absolute pointer
#[must_use]
pub fn is_absolute_reference(byte: u8) -> bool {
    (0x18..=0x1F).contains(&byte)
}

/// Length in bytes of the mangled name at `address`, excluding the terminator.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if no terminator is found within `max_length` bytes,
/// or an error if the name can not be read.
pub fn symbolic_name_length(
    reader: &dyn MemoryReader,
    platform: Platform,
    address: Address,
    max_length: usize,
) -> Result<usize> {
    let view = RawView::new(reader, platform, address);
    let mut length: u64 = 0;

    loop {
        let byte = view.read::<u8>(length)?;
        if byte == 0 {
            break;
        }

        length += 1;
        if is_relative_reference(byte) {
            length += 4;
        } else if is_absolute_reference(byte) {
            length += platform.word();
        }

        if length > max_length as u64 {
            return Err(malformed_error!(
                "Mangled name at {} exceeds {} bytes",
                address,
                max_length
            ));
        }
    }

    Ok(length as usize)
}
