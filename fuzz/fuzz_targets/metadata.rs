#![no_main]

use libfuzzer_sys::fuzz_target;
use swiftscope::{Address, ImageFile, Platform, Reflector, Snapshot, TypeHandle};

const BASE: u64 = 0x10_0000;

fuzz_target!(|data: &[u8]| {
    let _ = ImageFile::from_mem("fuzz", data);

    // Treat every word-aligned position as a candidate metadata address point
    let reflector = Reflector::builder(Snapshot::from_bytes(Address(BASE), data.to_vec()))
        .platform(Platform::LINUX_64)
        .build();
    for offset in (0..data.len().min(256)).step_by(8) {
        let Ok(metadata) = reflector.reflect(TypeHandle::new(Address(BASE + offset as u64))) else {
            continue;
        };
        let _ = metadata.name();
        let _ = metadata.field_offsets();
        let _ = metadata.generic_types();
        if let Some(class) = metadata.as_class() {
            if let Ok(vtable) = class.vtable() {
                let _ = vtable.iter().take(64).count();
            }
        }
    }
});
