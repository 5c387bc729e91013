//! The host's object model.

use crate::{
    file::MemoryReader,
    metadata::{address::Address, layout::Platform, view::RawView},
    Result,
};

/// Bit in the Objective-C `data` word marking a class as defined in Swift (stable ABI)
pub const SWIFT_CLASS_MASK: u64 = 0x2;
/// Bit in the Objective-C `data` word marking a class as defined in Swift (pre-stable ABI)
pub const LEGACY_SWIFT_CLASS_MASK: u64 = 0x1;

/// Distinguishes host-native classes from runtime-native ones.
///
/// On platforms with Objective-C interop every Swift class is also an Objective-C class,
/// and class metadata may describe a pure Objective-C class whose Swift fields are
/// meaningless.
pub trait ObjectModel: Send + Sync {
    /// Whether class metadata starts with an isa pointer
    fn has_isa_header(&self, platform: Platform) -> bool;

    /// Whether the class metadata at `metadata` describes a class defined in Swift.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    fn is_swift_class(&self, reader: &dyn MemoryReader, platform: Platform, metadata: Address) -> Result<bool>;
}

/// The object model implied by a [`Platform`]: an Objective-C header exactly when the
/// platform has Objective-C interop, with Swift classes marked in the `data` word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlatformObjectModel {
    swift_class_mask: u64,
}

impl PlatformObjectModel {
    /// Object model of the stable ABI
    #[must_use]
    pub const fn new() -> Self {
        PlatformObjectModel {
            swift_class_mask: SWIFT_CLASS_MASK,
        }
    }

    /// Object model of runtimes predating the stable ABI
    #[must_use]
    pub const fn legacy() -> Self {
        PlatformObjectModel {
            swift_class_mask: LEGACY_SWIFT_CLASS_MASK,
        }
    }
}

impl Default for PlatformObjectModel {
    fn default() -> Self {
        PlatformObjectModel::new()
    }
}

impl ObjectModel for PlatformObjectModel {
    fn has_isa_header(&self, platform: Platform) -> bool {
        platform.objc_interop
    }

    fn is_swift_class(&self, reader: &dyn MemoryReader, platform: Platform, metadata: Address) -> Result<bool> {
        let Some(data) = platform.layout().class_data else {
            return Ok(true);
        };

        let data = RawView::new(reader, platform, metadata).read_word(data)?;
        Ok(data & self.swift_class_mask != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::{Builder, ClassMetadataSpec};

    #[test]
    fn data_word_marks_swift_classes() {
        let mut builder = Builder::with_platform(0x1000, Platform::APPLE_64);
        let swift = builder.class_metadata(&ClassMetadataSpec {
            data: 0x5000 | SWIFT_CLASS_MASK,
            ..Default::default()
        });
        let objc = builder.class_metadata(&ClassMetadataSpec {
            data: 0x5000,
            ..Default::default()
        });
        let snapshot = builder.finish();

        let model = PlatformObjectModel::new();
        assert!(model.is_swift_class(&snapshot, Platform::APPLE_64, swift).unwrap());
        assert!(!model.is_swift_class(&snapshot, Platform::APPLE_64, objc).unwrap());
        assert!(model.has_isa_header(Platform::APPLE_64));
    }

    #[test]
    fn without_interop_every_class_is_swift() {
        let snapshot = crate::Snapshot::new();
        let model = PlatformObjectModel::legacy();

        assert!(model
            .is_swift_class(&snapshot, Platform::LINUX_64, Address(0x1000))
            .unwrap());
        assert!(!model.has_isa_header(Platform::LINUX_64));
    }
}
