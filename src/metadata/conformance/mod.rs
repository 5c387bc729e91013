//! Protocol conformance records and their registry.
//!
//! Every image carries a section listing the protocol conformances it declares, as an
//! array of 32-bit relative pointers to conformance descriptors. A descriptor names the
//! protocol, references the conforming type (directly or through a slot, or by an
//! Objective-C class) and points at the witness table pattern.
//!
//! # Key Components
//!
//! - [`ConformanceDescriptor`] - A decoded conformance record
//! - [`ConformanceRegistry`] - Index of all conformances by conforming context descriptor
//! - [`ImageEnumerator`], [`LoadedImage`], [`StaticImages`] - The list of images to scan
//!
//! # Section Names
//!
//! | Format | Conformances | Type records |
//! |--------|--------------|--------------|
//! | ELF    | `swift5_protocol_conformances` | `swift5_type_metadata` |
//! | Mach-O | `__swift5_proto` | `__swift5_types` |

mod images;
mod registry;

pub use images::{ImageEnumerator, ImageId, LoadedImage, StaticImages};
pub use registry::ConformanceRegistry;

use tracing::trace;

use crate::{
    file::MemoryReader,
    metadata::{
        address::Address,
        descriptor::{ContextDescriptor, ContextDetails},
        flags::ConformanceFlags,
        layout::{descriptor, Platform},
        pointer::TypeReferenceKind,
        view::RawView,
    },
    Result,
};

/// Names of the protocol conformance section, per image format
pub const CONFORMANCE_SECTIONS: &[&str] = &["swift5_protocol_conformances", "__swift5_proto"];
/// Names of the type metadata records section, per image format
pub const TYPE_RECORD_SECTIONS: &[&str] = &["swift5_type_metadata", "__swift5_types"];

/// A decoded protocol conformance descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConformanceDescriptor {
    /// Address of the descriptor
    pub address: Address,
    /// The protocol's context descriptor; `None` if the reference is null or its slot
    /// can not be read
    pub protocol: Option<Address>,
    /// How the conforming type is referenced
    pub type_reference_kind: TypeReferenceKind,
    /// Target of the type reference: a descriptor, a slot, or an Objective-C name
    pub type_reference: Option<Address>,
    /// The conforming type's context descriptor; `None` for Objective-C references and
    /// unbound slots
    pub context_descriptor: Option<Address>,
    /// Witness table pattern
    pub witness_table_pattern: Option<Address>,
    /// Conformance flags
    pub flags: ConformanceFlags,
    /// Name of the protocol, if its descriptor is readable
    pub protocol_name: Option<String>,
}

impl ConformanceDescriptor {
    /// Decodes the conformance descriptor at `address`.
    ///
    /// # Errors
    /// Returns an error if the descriptor or the type reference's slot can not be read.
    /// An unreadable protocol leaves [`ConformanceDescriptor::protocol_name`] empty.
    pub fn decode(reader: &dyn MemoryReader, platform: Platform, address: Address) -> Result<Self> {
        let view = RawView::new(reader, platform, address);

        let flags = ConformanceFlags::from_bits_retain(view.read::<u32>(descriptor::CONFORMANCE_FLAGS)?);
        let type_reference_kind = flags.type_reference_kind();
        let type_reference = view.relative_direct(descriptor::CONFORMANCE_TYPE_REF)?;

        let context_descriptor = match (type_reference_kind, type_reference) {
            (TypeReferenceKind::DirectTypeDescriptor, reference) => reference,
            (TypeReferenceKind::IndirectTypeDescriptor, Some(slot)) => view.at(slot).read_pointer(0)?,
            _ => None,
        };

        // Cross-image protocols sit behind slots that may still hold unrelocated fixups;
        // the record is kept without a protocol name when they can not be followed
        let protocol = view
            .relative_indirectable(descriptor::CONFORMANCE_PROTOCOL)
            .unwrap_or_else(|error| {
                trace!(%address, %error, "unreadable protocol reference");
                None
            });
        let protocol_name = protocol.and_then(|protocol| {
            match ContextDescriptor::decode(reader, platform, protocol) {
                Ok(decoded) => match decoded.details {
                    ContextDetails::Protocol { name, .. } => Some(name),
                    _ => None,
                },
                Err(error) => {
                    trace!(%address, %protocol, %error, "unreadable protocol descriptor");
                    None
                }
            }
        });

        Ok(ConformanceDescriptor {
            address,
            protocol,
            type_reference_kind,
            type_reference,
            context_descriptor,
            witness_table_pattern: view.relative_direct(descriptor::CONFORMANCE_WITNESS_TABLE_PATTERN)?,
            flags,
            protocol_name,
        })
    }

    /// Declared outside both the type's and the protocol's module
    #[must_use]
    pub fn is_retroactive(&self) -> bool {
        self.flags.contains(ConformanceFlags::IS_RETROACTIVE)
    }

    /// Synthesized by the compiler; may be duplicated across images
    #[must_use]
    pub fn is_synthesized_non_unique(&self) -> bool {
        self.flags.contains(ConformanceFlags::IS_SYNTHESIZED_NON_UNIQUE)
    }

    /// Number of conditional requirements
    #[must_use]
    pub fn num_conditional_requirements(&self) -> u32 {
        self.flags.num_conditional_requirements()
    }

    /// Resilient witnesses follow the descriptor
    #[must_use]
    pub fn has_resilient_witnesses(&self) -> bool {
        self.flags.contains(ConformanceFlags::HAS_RESILIENT_WITNESSES)
    }

    /// The witness table is instantiated at runtime
    #[must_use]
    pub fn has_generic_witness_table(&self) -> bool {
        self.flags.contains(ConformanceFlags::HAS_GENERIC_WITNESS_TABLE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::{Builder, TypeSpec};

    #[test]
    fn direct_and_indirect_type_references() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let equatable = builder.protocol(module, "Equatable");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let slot = builder.slot(Some(boat));

        let direct = builder.conformance(
            Some(equatable),
            TypeReferenceKind::DirectTypeDescriptor,
            boat,
            (1 << 6) | (2 << 8),
        );
        let indirect = builder.conformance(
            Some(equatable),
            TypeReferenceKind::IndirectTypeDescriptor,
            slot,
            1 << 17,
        );
        let name = builder.cstring("NSObject");
        let objc = builder.conformance(None, TypeReferenceKind::DirectObjCClassName, name, 0);
        let snapshot = builder.finish();

        let platform = Platform::LINUX_64;

        let record = ConformanceDescriptor::decode(&snapshot, platform, direct).unwrap();
        assert_eq!(record.context_descriptor, Some(boat));
        assert_eq!(record.protocol, Some(equatable));
        assert_eq!(record.protocol_name.as_deref(), Some("Equatable"));
        assert!(record.is_retroactive());
        assert_eq!(record.num_conditional_requirements(), 2);
        assert!(!record.has_generic_witness_table());

        let record = ConformanceDescriptor::decode(&snapshot, platform, indirect).unwrap();
        assert_eq!(record.type_reference_kind, TypeReferenceKind::IndirectTypeDescriptor);
        assert_eq!(record.type_reference, Some(slot));
        assert_eq!(record.context_descriptor, Some(boat));
        assert!(record.has_generic_witness_table());

        let record = ConformanceDescriptor::decode(&snapshot, platform, objc).unwrap();
        assert_eq!(record.context_descriptor, None);
        assert_eq!(record.type_reference, Some(name));
        assert_eq!(record.protocol_name, None);
    }

    #[test]
    fn unrelocated_protocol_slot_keeps_record() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        // A chained-fixup value that was never bound to the protocol's address
        let slot = builder.slot(None);
        builder.patch_word(slot, 0x8010_0000_0000_1234);

        builder.align(4);
        let at = builder.here();
        builder
            .rel_indirect(slot)
            .rel(Some(boat))
            .rel(None)
            .u32((TypeReferenceKind::DirectTypeDescriptor as u32) << 3);
        let snapshot = builder.finish();

        let record = ConformanceDescriptor::decode(&snapshot, Platform::LINUX_64, at).unwrap();
        assert_eq!(record.protocol, Some(Address(0x8010_0000_0000_1234)));
        assert_eq!(record.protocol_name, None);
        assert_eq!(record.context_descriptor, Some(boat));
    }
}
