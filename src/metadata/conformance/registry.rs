//! Conformance index over all loaded images.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use rayon::prelude::*;
use tracing::{debug, trace};

use crate::{
    file::MemoryReader,
    metadata::{
        address::Address,
        conformance::{ConformanceDescriptor, ImageEnumerator, ImageId, LoadedImage},
        layout::{descriptor, Platform},
        view::RawView,
    },
};

#[derive(Debug, Default)]
struct RegistryState {
    /// Conformances by conforming context descriptor, in discovery order
    index: HashMap<Address, Vec<ConformanceDescriptor>>,
    /// Images whose conformance section has been scanned
    scanned: HashSet<ImageId>,
}

/// Index of protocol conformances, keyed by the conforming type's context descriptor.
///
/// The index is built lazily: every query first asks the [`ImageEnumerator`] for the
/// current image list and scans the images it has not seen yet, so conformances of images
/// loaded after the first query are found by later ones. The index only grows; a query
/// never returns fewer records than an earlier query for the same descriptor.
///
/// The lock is held only to pick pending images and to merge scan results, never while
/// scanning, so queries may be issued from inside a `rayon` pool. Two queries racing on the
/// same new image may both scan it; only the first merge is kept.
///
/// Records that can not be decoded are skipped. Records referencing their type through an
/// Objective-C class are skipped as well: they have no context descriptor to index under.
#[derive(Debug, Default)]
pub struct ConformanceRegistry {
    state: Mutex<RegistryState>,
}

impl ConformanceRegistry {
    /// Creates an empty registry
    #[must_use]
    pub fn new() -> Self {
        ConformanceRegistry {
            state: Mutex::new(RegistryState::default()),
        }
    }

    /// All known conformances of the type declared by `descriptor`, after scanning any
    /// images that appeared since the last query.
    pub fn conformances(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
        images: &dyn ImageEnumerator,
        descriptor: Address,
    ) -> Vec<ConformanceDescriptor> {
        self.refresh(reader, platform, images);
        lock!(self.state).index.get(&descriptor).cloned().unwrap_or_default()
    }

    /// Scans images that appeared since the last query; returns how many were merged
    pub fn refresh(&self, reader: &dyn MemoryReader, platform: Platform, images: &dyn ImageEnumerator) -> usize {
        let listed = images.images();
        let pending = {
            let state = lock!(self.state);
            let mut seen = HashSet::new();
            listed
                .into_iter()
                .filter(|image| !state.scanned.contains(&image.id) && seen.insert(image.id))
                .collect::<Vec<LoadedImage>>()
        };

        if pending.is_empty() {
            return 0;
        }

        let scans: Vec<(ImageId, Vec<ConformanceDescriptor>)> = pending
            .par_iter()
            .map(|image| (image.id, scan_image(reader, platform, image)))
            .collect();

        let mut state = lock!(self.state);
        let mut merged = 0;
        for (id, records) in scans {
            if !state.scanned.insert(id) {
                continue;
            }

            for record in records {
                if let Some(descriptor) = record.context_descriptor {
                    state.index.entry(descriptor).or_default().push(record);
                }
            }
            merged += 1;
        }

        merged
    }

    /// Number of scanned images
    pub fn scanned_images(&self) -> usize {
        lock!(self.state).scanned.len()
    }

    /// Number of indexed conformance records
    pub fn len(&self) -> usize {
        lock!(self.state).index.values().map(Vec::len).sum()
    }

    /// Returns `true` if no conformance has been indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn scan_image(reader: &dyn MemoryReader, platform: Platform, image: &LoadedImage) -> Vec<ConformanceDescriptor> {
    let mut records = Vec::new();
    let mut skipped = 0_usize;

    let mut record = image.conformances.start;
    while record.advance(descriptor::CONFORMANCE_RECORD_SIZE) <= image.conformances.end {
        match decode_record(reader, platform, record) {
            Ok(Some(conformance)) => records.push(conformance),
            Ok(None) => {}
            Err(error) => {
                skipped += 1;
                debug!(image = %image.name, %record, %error, "skipping undecodable conformance record");
            }
        }

        record = record.advance(descriptor::CONFORMANCE_RECORD_SIZE);
    }

    debug!(
        image = %image.name,
        id = %image.id,
        records = records.len(),
        skipped,
        "scanned conformance section"
    );
    records
}

fn decode_record(
    reader: &dyn MemoryReader,
    platform: Platform,
    record: Address,
) -> crate::Result<Option<ConformanceDescriptor>> {
    let Some(address) = RawView::new(reader, platform, record).relative_direct(0)? else {
        return Ok(None);
    };

    let conformance = ConformanceDescriptor::decode(reader, platform, address)?;
    if conformance.type_reference_kind.is_objc() {
        trace!(%address, kind = ?conformance.type_reference_kind, "skipping Objective-C conformance");
        return Ok(None);
    }
    if conformance.context_descriptor.is_none() {
        trace!(%address, "skipping conformance with unbound type reference");
        return Ok(None);
    }

    Ok(Some(conformance))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        file::memory::Snapshot,
        metadata::{
            address::AddressRange,
            conformance::StaticImages,
            pointer::TypeReferenceKind,
        },
        test::factories::{Builder, TypeSpec},
    };

    /// Lists its images verbatim, duplicates included
    struct Listing(Vec<LoadedImage>);

    impl ImageEnumerator for Listing {
        fn images(&self) -> Vec<LoadedImage> {
            self.0.clone()
        }
    }

    fn loaded(id: u64, conformances: AddressRange) -> LoadedImage {
        LoadedImage {
            id: ImageId(id),
            name: format!("image{id}"),
            conformances,
            type_records: None,
        }
    }

    #[test]
    fn index_by_descriptor() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let hashable = builder.protocol(module, "Hashable");
        let equatable = builder.protocol(module, "Equatable");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let slot = builder.slot(Some(boat));
        let objc_name = builder.cstring("NSObject");

        let records = [
            builder.conformance(Some(equatable), TypeReferenceKind::DirectTypeDescriptor, boat, 0),
            builder.conformance(Some(hashable), TypeReferenceKind::IndirectTypeDescriptor, slot, 0),
            builder.conformance(Some(equatable), TypeReferenceKind::DirectObjCClassName, objc_name, 0),
        ];
        let section = builder.conformance_section(&records);
        let snapshot = builder.finish();

        let images = StaticImages::new();
        images.add(loaded(0, section));

        let registry = ConformanceRegistry::new();
        let found = registry.conformances(&snapshot, Platform::LINUX_64, &images, boat);

        let names: Vec<_> = found.iter().filter_map(|c| c.protocol_name.as_deref()).collect();
        assert_eq!(names, ["Equatable", "Hashable"]);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.scanned_images(), 1);

        assert!(registry
            .conformances(&snapshot, Platform::LINUX_64, &images, module)
            .is_empty());
    }

    #[test]
    fn grows_with_new_images() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let equatable = builder.protocol(module, "Equatable");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let first = builder.conformance(Some(equatable), TypeReferenceKind::DirectTypeDescriptor, boat, 0);
        let first_section = builder.conformance_section(&[first]);
        let mut snapshot = builder.finish();

        let mut later = Builder::new(0x8000);
        let module = later.module("Extensions");
        let codable = later.protocol(module, "Codable");
        let second = later.conformance(Some(codable), TypeReferenceKind::DirectTypeDescriptor, boat, 1 << 6);
        let second_section = later.conformance_section(&[second]);
        later.finish_into(&mut snapshot);

        let images = Arc::new(StaticImages::new());
        images.add(loaded(0, first_section));

        let registry = ConformanceRegistry::new();
        let platform = Platform::LINUX_64;

        let before = registry.conformances(&snapshot, platform, images.as_ref(), boat);
        assert_eq!(before.len(), 1);

        images.add(loaded(1, second_section));
        let after = registry.conformances(&snapshot, platform, images.as_ref(), boat);
        assert_eq!(after.len(), 2);
        assert_eq!(after[0], before[0]);
        assert!(after[1].is_retroactive());

        assert_eq!(registry.refresh(&snapshot, platform, images.as_ref()), 0);
        assert_eq!(registry.scanned_images(), 2);
    }

    #[test]
    fn undecodable_records_are_skipped() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let equatable = builder.protocol(module, "Equatable");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let good = builder.conformance(Some(equatable), TypeReferenceKind::DirectTypeDescriptor, boat, 0);
        let section = builder.here();
        builder.i32(0x10_0000).i32(0);
        builder.rel(Some(good));
        let snapshot = builder.finish();

        let images = StaticImages::new();
        images.add(loaded(0, AddressRange::new(section, 12)));

        let registry = ConformanceRegistry::new();
        let found = registry.conformances(&snapshot, Platform::LINUX_64, &images, boat);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].address, good);
    }

    #[test]
    fn unmapped_image_is_marked_scanned() {
        let snapshot = Snapshot::new();
        let images = StaticImages::new();
        images.add(loaded(3, AddressRange::new(Address(0x4000), 8)));

        let registry = ConformanceRegistry::new();
        assert!(registry
            .conformances(&snapshot, Platform::LINUX_64, &images, Address(0x10))
            .is_empty());
        assert_eq!(registry.scanned_images(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn unreadable_protocol_is_still_indexed() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let slot = builder.slot(None);
        builder.patch_word(slot, 0x8010_0000_0000_1234);

        builder.align(4);
        let record = builder.here();
        builder
            .rel_indirect(slot)
            .rel(Some(boat))
            .rel(None)
            .u32((TypeReferenceKind::DirectTypeDescriptor as u32) << 3);
        let section = builder.conformance_section(&[record]);
        let snapshot = builder.finish();

        let images = StaticImages::new();
        images.add(loaded(0, section));

        let registry = ConformanceRegistry::new();
        let found = registry.conformances(&snapshot, Platform::LINUX_64, &images, boat);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].address, record);
        assert_eq!(found[0].protocol_name, None);
    }

    #[test]
    fn repeated_image_ids_are_scanned_once() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let equatable = builder.protocol(module, "Equatable");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let record = builder.conformance(Some(equatable), TypeReferenceKind::DirectTypeDescriptor, boat, 0);
        let section = builder.conformance_section(&[record]);
        let snapshot = builder.finish();

        let empty = AddressRange::new(Address(0x8000), 0);
        let images = Listing(vec![loaded(0, section), loaded(1, empty), loaded(0, section)]);

        let registry = ConformanceRegistry::new();
        assert_eq!(registry.refresh(&snapshot, Platform::LINUX_64, &images), 2);
        assert_eq!(registry.conformances(&snapshot, Platform::LINUX_64, &images, boat).len(), 1);
        assert_eq!(registry.scanned_images(), 2);
    }

    #[test]
    fn queries_from_rayon_workers() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let equatable = builder.protocol(module, "Equatable");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let record = builder.conformance(Some(equatable), TypeReferenceKind::DirectTypeDescriptor, boat, 0);
        let first = builder.conformance_section(&[record]);
        let second = builder.conformance_section(&[record]);
        let snapshot = builder.finish();

        let images = Listing((0..64).map(|id| loaded(id, if id % 2 == 0 { first } else { second })).collect());
        let registry = ConformanceRegistry::new();

        let counts: Vec<usize> = (0..256)
            .into_par_iter()
            .map(|_| registry.conformances(&snapshot, Platform::LINUX_64, &images, boat).len())
            .collect();

        assert!(counts.iter().all(|&count| count == 64));
        assert_eq!(registry.scanned_images(), 64);
        assert_eq!(registry.len(), 64);
    }
}
