//! Cache of resolved mangled names.

use std::{collections::HashMap, sync::Mutex};

use crate::metadata::address::{Address, TypeHandle};

/// Outcome of a resolution, as remembered by the cache
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CachedType {
    /// The name resolved to this type
    Resolved(TypeHandle),
    /// The name could not be resolved; it will not be tried again
    Unresolvable,
}

impl CachedType {
    /// The resolved type, if any
    #[must_use]
    pub fn handle(self) -> Option<TypeHandle> {
        match self {
            CachedType::Resolved(handle) => Some(handle),
            CachedType::Unresolvable => None,
        }
    }
}

impl From<Option<TypeHandle>> for CachedType {
    fn from(value: Option<TypeHandle>) -> Self {
        value.map_or(CachedType::Unresolvable, CachedType::Resolved)
    }
}

/// Resolutions keyed by the address of the mangled name and the generic argument vector it
/// was resolved against.
///
/// A mangled name is immutable data of the image containing it, so an entry stays valid
/// for as long as that image is loaded. Entries are never evicted; if an image is unloaded
/// and another one is later mapped over the same range, stale entries may answer for the
/// new image's names.
///
/// Names outside of a generic context use `None` as their argument vector and thus have
/// exactly one entry. A name referring to a generic parameter (such as the type of a field
/// `var value: T`) has one entry per instantiation. Keying by the name's address alone
/// would let the first instantiation resolved answer for every later one.
///
/// The lock is held only for the lookup or the insertion itself, never while a name is
/// being resolved. Two threads missing on the same name may both resolve it; both write
/// the same outcome.
#[derive(Debug, Default)]
pub struct MangledNameCache {
    entries: Mutex<HashMap<(Address, Option<Address>), CachedType>>,
}

impl MangledNameCache {
    /// Creates an empty cache
    #[must_use]
    pub fn new() -> Self {
        MangledNameCache {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up the outcome for the name at `name` resolved against `generic_arguments`;
    /// `None` if it was never resolved
    pub fn get(&self, name: Address, generic_arguments: Option<Address>) -> Option<CachedType> {
        lock!(self.entries).get(&(name, generic_arguments)).copied()
    }

    /// Records the outcome for the name at `name` resolved against `generic_arguments`
    pub fn insert(&self, name: Address, generic_arguments: Option<Address>, entry: CachedType) {
        lock!(self.entries).insert((name, generic_arguments), entry);
    }

    /// Number of cached outcomes
    pub fn len(&self) -> usize {
        lock!(self.entries).len()
    }

    /// Returns `true` if nothing has been cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_and_negative_entries() {
        let cache = MangledNameCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(Address(0x10), None), None);

        let handle = TypeHandle::new(Address(0x8000));
        cache.insert(Address(0x10), None, CachedType::Resolved(handle));
        cache.insert(Address(0x20), None, CachedType::from(None));

        assert_eq!(cache.get(Address(0x10), None), Some(CachedType::Resolved(handle)));
        assert_eq!(cache.get(Address(0x20), None), Some(CachedType::Unresolvable));
        assert_eq!(cache.get(Address(0x20), None).and_then(CachedType::handle), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn instantiations_are_distinct() {
        let cache = MangledNameCache::new();
        let first = TypeHandle::new(Address(0x8000));
        let second = TypeHandle::new(Address(0x9000));

        cache.insert(Address(0x10), Some(Address(0x100)), CachedType::Resolved(first));
        cache.insert(Address(0x10), Some(Address(0x200)), CachedType::Resolved(second));

        assert_eq!(cache.get(Address(0x10), Some(Address(0x100))), Some(CachedType::Resolved(first)));
        assert_eq!(cache.get(Address(0x10), Some(Address(0x200))), Some(CachedType::Resolved(second)));
        assert_eq!(cache.get(Address(0x10), None), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn concurrent_inserts() {
        let cache = std::sync::Arc::new(MangledNameCache::new());

        let threads: Vec<_> = (0..4_u64)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.insert(
                            Address(t * 1000 + i),
                            None,
                            CachedType::Resolved(TypeHandle::new(Address(i))),
                        );
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(cache.len(), 400);
    }
}
