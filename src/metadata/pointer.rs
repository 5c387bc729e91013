//! Relative pointers.
//!
//! Compiler-emitted records reference each other with 32-bit signed offsets measured from
//! the address of the field holding the offset. This keeps the records position-independent
//! and free of load-time relocations. Two flavours exist:
//!
//! - **Direct** - `target = field + offset`; an offset of zero means null.
//! - **Indirectable** - as direct, but if the low bit of the offset is set the target is a
//!   pointer-sized slot (typically in the GOT) holding the real address. Used for references
//!   that may cross image boundaries.
//!
//! Type references in conformance and type-record sections additionally carry a
//! [`TypeReferenceKind`], in the conformance flags or in the low bits of the offset.

use strum::{EnumCount, EnumIter};

use crate::{
    file::MemoryReader,
    metadata::{address::Address, layout::Platform, view::RawView},
    Result,
};

/// Resolves a relative direct pointer stored at `field`.
///
/// Returns `None` for a zero offset.
#[must_use]
pub fn resolve_direct(field: Address, offset: i32) -> Option<Address> {
    if offset == 0 {
        return None;
    }

    Some(field.offset(i64::from(offset)))
}

/// Resolves a relative indirectable pointer stored at `field`.
///
/// Returns `None` for a zero offset, or for an indirect reference whose slot holds null
/// (an unbound symbol in an image that has not been relocated).
///
/// # Errors
/// Returns an error if the indirection slot can not be read.
pub fn resolve_indirectable(
    reader: &dyn MemoryReader,
    platform: Platform,
    field: Address,
    offset: i32,
) -> Result<Option<Address>> {
    if offset == 0 {
        return Ok(None);
    }

    let target = field.offset(i64::from(offset & !1));
    if offset & 1 == 0 {
        return Ok(Some(target));
    }

    RawView::new(reader, platform, target).read_pointer(0)
}

/// How a type reference in a conformance record or a type metadata record is encoded.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum TypeReferenceKind {
    /// Relative pointer to a type context descriptor
    DirectTypeDescriptor = 0,
    /// Relative pointer to a slot holding a type context descriptor pointer
    IndirectTypeDescriptor = 1,
    /// Relative pointer to an Objective-C class name (C string)
    DirectObjCClassName = 2,
    /// Relative pointer to a slot holding an Objective-C class object
    IndirectObjCClass = 3,
}

impl TypeReferenceKind {
    /// Decodes the two-bit reference kind; higher bits are ignored
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => TypeReferenceKind::DirectTypeDescriptor,
            1 => TypeReferenceKind::IndirectTypeDescriptor,
            2 => TypeReferenceKind::DirectObjCClassName,
            _ => TypeReferenceKind::IndirectObjCClass,
        }
    }

    /// Returns `true` for the kinds naming an Objective-C class instead of a Swift type
    /// context descriptor
    #[must_use]
    pub fn is_objc(self) -> bool {
        matches!(
            self,
            TypeReferenceKind::DirectObjCClassName | TypeReferenceKind::IndirectObjCClass
        )
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::file::memory::Snapshot;

    #[test]
    fn direct_pointer() {
        let field = Address(0x1000);
        assert_eq!(resolve_direct(field, 0), None);
        assert_eq!(resolve_direct(field, 0x20), Some(Address(0x1020)));
        assert_eq!(resolve_direct(field, -0x10), Some(Address(0xff0)));
    }

    #[test]
    fn indirectable_pointer() {
        let mut snapshot = Snapshot::new();
        snapshot
            .map(Address(0x2000), 0x5000_u64.to_le_bytes().to_vec())
            .unwrap();
        snapshot
            .map(Address(0x2008), 0_u64.to_le_bytes().to_vec())
            .unwrap();

        let field = Address(0x1000);
        let platform = Platform::LINUX_64;

        let direct = resolve_indirectable(&snapshot, platform, field, 0x40).unwrap();
        assert_eq!(direct, Some(Address(0x1040)));

        let indirect = resolve_indirectable(&snapshot, platform, field, 0x1001).unwrap();
        assert_eq!(indirect, Some(Address(0x5000)));

        let unbound = resolve_indirectable(&snapshot, platform, field, 0x1009).unwrap();
        assert_eq!(unbound, None);

        assert_eq!(resolve_indirectable(&snapshot, platform, field, 0).unwrap(), None);
        assert!(resolve_indirectable(&snapshot, platform, field, 0x3001).is_err());
    }

    #[test]
    fn reference_kinds() {
        for kind in TypeReferenceKind::iter() {
            assert_eq!(TypeReferenceKind::from_bits(kind as u32), kind);
        }
        assert_eq!(TypeReferenceKind::COUNT, 4);
        assert_eq!(
            TypeReferenceKind::from_bits(0x5),
            TypeReferenceKind::IndirectTypeDescriptor
        );
        assert!(TypeReferenceKind::IndirectObjCClass.is_objc());
        assert!(!TypeReferenceKind::DirectTypeDescriptor.is_objc());
    }
}
