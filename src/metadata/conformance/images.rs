//! Enumeration of loaded images.

use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::metadata::address::AddressRange;

/// Identifier of a loaded image, unique for the lifetime of the image list
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImageId(pub u64);

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A loaded image and the location of its Swift metadata sections
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedImage {
    /// Identifier used to remember which images were scanned
    pub id: ImageId,
    /// Display name, usually the path of the image
    pub name: String,
    /// Protocol conformance records: 32-bit relative pointers to conformance descriptors
    pub conformances: AddressRange,
    /// Type metadata records, if the image has any
    pub type_records: Option<AddressRange>,
}

/// Source of the list of currently loaded images.
///
/// The list may grow between calls as images are loaded. An image keeps its
/// [`ImageId`] for as long as it is listed.
pub trait ImageEnumerator: Send + Sync {
    /// The images loaded right now
    fn images(&self) -> Vec<LoadedImage>;
}

impl<T: ImageEnumerator + ?Sized> ImageEnumerator for Arc<T> {
    fn images(&self) -> Vec<LoadedImage> {
        (**self).images()
    }
}

/// An appendable image list.
///
/// Serves snapshots and images loaded from disk, and models dynamic loading in tests:
/// images added after a query are picked up by the next one.
///
/// # Examples
///
/// ```rust
/// use swiftscope::{Address, AddressRange, ImageEnumerator, ImageId, LoadedImage, StaticImages};
///
/// let images = StaticImages::new();
/// images.add(LoadedImage {
///     id: ImageId(1),
///     name: "libBoats.so".to_string(),
///     conformances: AddressRange::new(Address(0x1000), 16),
///     type_records: None,
/// });
/// assert_eq!(images.images().len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct StaticImages {
    images: RwLock<Vec<LoadedImage>>,
}

impl StaticImages {
    /// Creates an empty list
    #[must_use]
    pub fn new() -> Self {
        StaticImages {
            images: RwLock::new(Vec::new()),
        }
    }

    /// Appends an image; an image already listed under the same id is replaced
    pub fn add(&self, image: LoadedImage) {
        let mut images = write_lock!(self.images);
        match images.iter_mut().find(|existing| existing.id == image.id) {
            Some(existing) => *existing = image,
            None => images.push(image),
        }
    }

    /// Next unused image id
    #[must_use]
    pub fn next_id(&self) -> ImageId {
        let images = read_lock!(self.images);
        ImageId(images.iter().map(|image| image.id.0 + 1).max().unwrap_or(0))
    }

    /// Number of listed images
    #[must_use]
    pub fn len(&self) -> usize {
        read_lock!(self.images).len()
    }

    /// Returns `true` if no image is listed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageEnumerator for StaticImages {
    fn images(&self) -> Vec<LoadedImage> {
        read_lock!(self.images).clone()
    }
}
