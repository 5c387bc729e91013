//! Binary images loaded from disk.
//!
//! [`ImageFile`] memory-maps an ELF or Mach-O image, copies every allocated section into a
//! [`Snapshot`] at its link-time virtual address and remembers where the Swift metadata
//! sections are. Because conformance records, context descriptors and mangled names use
//! relative pointers, an image mapped at its preferred base is fully navigable without
//! applying relocations; only absolute pointers (for example indirect references through
//! the GOT) stay unresolved until the dynamic loader runs.

use std::{fs, path::Path};

use goblin::{
    elf::section_header::{SHF_ALLOC, SHF_TLS, SHT_NOBITS},
    mach::Mach,
    Object,
};
use memmap2::Mmap;

use super::{memory::Snapshot, MemoryReader};
use crate::{
    metadata::{
        address::{Address, AddressRange},
        conformance::{ImageId, LoadedImage, CONFORMANCE_SECTIONS, TYPE_RECORD_SECTIONS},
        layout::{Platform, PointerSize},
        pointer::TypeReferenceKind,
        view::RawView,
    },
    Error::{Error, FileError, NotSupported},
    Result,
};

/// Container format of an [`ImageFile`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormat {
    /// Executable and Linkable Format (Linux, Android, FreeBSD)
    Elf,
    /// Mach-O (Apple platforms)
    MachO,
}

/// A named, mapped section of an image
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSection {
    /// Section name as stored in the image
    pub name: String,
    /// Virtual address range of the section
    pub range: AddressRange,
}

/// A binary image mapped into a [`Snapshot`] for offline analysis.
///
/// # Examples
///
/// ```rust,no_run
/// use swiftscope::ImageFile;
/// use std::path::Path;
///
/// let image = ImageFile::from_file(Path::new("libFoo.so"))?;
/// for descriptor in image.type_descriptors()? {
///     println!("type context descriptor at {}", descriptor);
/// }
/// # Ok::<(), swiftscope::Error>(())
/// ```
#[derive(Debug)]
pub struct ImageFile {
    /// Display name, usually the file name
    name: String,
    /// Container format
    format: ImageFormat,
    /// Platform the image was compiled for
    platform: Platform,
    /// All allocated sections, mapped at their virtual addresses
    snapshot: Snapshot,
    /// Section table in image order
    sections: Vec<ImageSection>,
}

impl ImageFile {
    /// Loads an image from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be opened or mapped,
    /// [`crate::Error::NotSupported`] for formats other than ELF and thin Mach-O, and
    /// [`crate::Error::GoblinErr`] for images goblin can not parse.
    pub fn from_file(path: &Path) -> Result<ImageFile> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error(error.to_string())),
        };

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        Self::from_mem(&name, &mmap)
    }

    /// Parses an image from an in-memory buffer.
    ///
    /// # Errors
    /// See [`ImageFile::from_file`].
    pub fn from_mem(name: &str, data: &[u8]) -> Result<ImageFile> {
        if data.is_empty() {
            return Err(malformed_error!("Image {} is empty", name));
        }

        let mut image = match Object::parse(data)? {
            Object::Elf(elf) => {
                let pointer_size = if elf.is_64 {
                    PointerSize::Bit64
                } else {
                    PointerSize::Bit32
                };

                let mut image = ImageFile::empty(name, ImageFormat::Elf, Platform::new(pointer_size, false));
                for header in &elf.section_headers {
                    if header.sh_flags & u64::from(SHF_ALLOC) == 0
                        || header.sh_flags & u64::from(SHF_TLS) != 0
                        || header.sh_addr == 0
                        || header.sh_size == 0
                    {
                        continue;
                    }

                    let section_name = elf.shdr_strtab.get_at(header.sh_name).unwrap_or("");
                    let bytes = if header.sh_type == SHT_NOBITS {
                        zeroed(header.sh_size)?
                    } else {
                        file_range(data, header.sh_offset, header.sh_size)?.to_vec()
                    };

                    image.add_section(section_name, Address(header.sh_addr), bytes);
                }
                image
            }
            Object::Mach(Mach::Binary(macho)) => {
                let pointer_size = if macho.is_64 {
                    PointerSize::Bit64
                } else {
                    PointerSize::Bit32
                };

                let mut image = ImageFile::empty(name, ImageFormat::MachO, Platform::new(pointer_size, true));
                for segment in macho.segments.iter() {
                    for (section, section_data) in segment.sections()? {
                        if section.addr == 0 || section.size == 0 {
                            continue;
                        }

                        let section_name = section.name().unwrap_or("").to_string();
                        let bytes = if section_data.is_empty() {
                            zeroed(section.size)?
                        } else {
                            section_data.to_vec()
                        };

                        image.add_section(&section_name, Address(section.addr), bytes);
                    }
                }
                image
            }
            _ => return Err(NotSupported),
        };

        image.sections.sort_by_key(|s| s.range.start);
        Ok(image)
    }

    fn empty(name: &str, format: ImageFormat, platform: Platform) -> ImageFile {
        ImageFile {
            name: name.to_string(),
            format,
            platform,
            snapshot: Snapshot::new(),
            sections: Vec::new(),
        }
    }

    fn add_section(&mut self, name: &str, address: Address, bytes: Vec<u8>) {
        let range = AddressRange::new(address, bytes.len() as u64);
        match self.snapshot.map(address, bytes) {
            Ok(()) => self.sections.push(ImageSection {
                name: name.to_string(),
                range,
            }),
            Err(error) => {
                tracing::debug!(image = %self.name, section = name, %error, "skipping overlapping section");
            }
        }
    }

    /// Display name of the image
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Container format of the image
    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    /// Platform derived from the image header: pointer width, and Objective-C interop for
    /// Mach-O images
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The mapped sections
    #[must_use]
    pub fn sections(&self) -> &[ImageSection] {
        &self.sections
    }

    /// Finds a section by name
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&ImageSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// The snapshot holding all mapped sections
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Consumes the image, returning its snapshot
    #[must_use]
    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot
    }

    fn find_section(&self, names: &[&str]) -> Option<&ImageSection> {
        self.sections
            .iter()
            .find(|section| names.iter().any(|name| section.name == *name))
    }

    /// Describes this image for an [`crate::ImageEnumerator`].
    ///
    /// Returns `None` if the image carries no protocol conformance section.
    #[must_use]
    pub fn image(&self, id: ImageId) -> Option<LoadedImage> {
        let conformances = self.find_section(CONFORMANCE_SECTIONS)?;
        Some(LoadedImage {
            id,
            name: self.name.clone(),
            conformances: conformances.range,
            type_records: self.find_section(TYPE_RECORD_SECTIONS).map(|s| s.range),
        })
    }

    /// Lists the type context descriptors referenced by the image's type records section.
    ///
    /// Indirect records are followed through their pointer; records whose pointer has not
    /// been bound (zero before relocation) are skipped.
    ///
    /// # Errors
    /// Returns an error if a record points outside the mapped image.
    pub fn type_descriptors(&self) -> Result<Vec<Address>> {
        let Some(section) = self.find_section(TYPE_RECORD_SECTIONS) else {
            return Ok(Vec::new());
        };

        type_descriptors_in(&self.snapshot, self.platform, section.range)
    }
}

/// Decodes a type metadata records section: an array of 32-bit relative pointers whose low two
/// bits hold a [`TypeReferenceKind`].
pub(crate) fn type_descriptors_in(
    reader: &dyn MemoryReader,
    platform: Platform,
    records: AddressRange,
) -> Result<Vec<Address>> {
    let mut descriptors = Vec::new();
    let mut record = records.start;

    while record.advance(4) <= records.end {
        let view = RawView::new(reader, platform, record);
        let raw = view.read::<i32>(0)?;
        let kind = TypeReferenceKind::from_bits((raw & 0x3) as u32);
        let target = record.offset(i64::from(raw & !0x3));

        if raw != 0 {
            match kind {
                TypeReferenceKind::DirectTypeDescriptor => descriptors.push(target),
                TypeReferenceKind::IndirectTypeDescriptor => {
                    let pointer = RawView::new(reader, platform, target).read_pointer(0)?;
                    if let Some(descriptor) = pointer {
                        descriptors.push(descriptor);
                    }
                }
                _ => {}
            }
        }

        record = record.advance(4);
    }

    Ok(descriptors)
}

fn zeroed(size: u64) -> Result<Vec<u8>> {
    let size = usize::try_from(size).map_err(|_| malformed_error!("Section of {} bytes is too large", size))?;
    Ok(vec![0; size])
}

fn file_range(data: &[u8], offset: u64, size: u64) -> Result<&[u8]> {
    let start = usize::try_from(offset).map_err(|_| malformed_error!("Invalid section offset {}", offset))?;
    let len = usize::try_from(size).map_err(|_| malformed_error!("Invalid section size {}", size))?;

    match start.checked_add(len) {
        Some(end) if end <= data.len() => Ok(&data[start..end]),
        _ => Err(malformed_error!(
            "Section at file offset {} with {} bytes exceeds the file",
            offset,
            size
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_empty() {
        assert!(ImageFile::from_mem("empty", &[]).is_err());
    }

    #[test]
    fn reject_garbage() {
        let result = ImageFile::from_mem("garbage", &[0x11; 64]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_file() {
        let result = ImageFile::from_file(Path::new("/nonexistent/libMissing.so"));
        assert!(matches!(result, Err(FileError(_))));
    }

    #[test]
    fn file_range_bounds() {
        let data = [0u8; 16];
        assert_eq!(file_range(&data, 4, 8).unwrap().len(), 8);
        assert!(file_range(&data, 12, 8).is_err());
        assert!(file_range(&data, u64::MAX, 2).is_err());
    }

    #[test]
    fn type_records() {
        let mut snapshot = Snapshot::new();
        // Three records at 0x1000: direct to 0x2000, indirect via 0x3000, null
        let mut records = Vec::new();
        records.extend_from_slice(&(0x1000_i32).to_le_bytes());
        records.extend_from_slice(&((0x3000 - 0x1004) | 1_i32).to_le_bytes());
        records.extend_from_slice(&0_i32.to_le_bytes());
        snapshot.map(Address(0x1000), records).unwrap();
        snapshot
            .map(Address(0x3000), 0x2400_u64.to_le_bytes().to_vec())
            .unwrap();

        let descriptors = type_descriptors_in(
            &snapshot,
            Platform::LINUX_64,
            AddressRange::new(Address(0x1000), 12),
        )
        .unwrap();

        assert_eq!(descriptors, vec![Address(0x2000), Address(0x2400)]);
    }
}
