//! Mangled type names and their resolution.
//!
//! Field records, superclass references and generic requirements refer to types through
//! mangled names. This module measures such names in foreign memory, hands them to a
//! [`TypeNameResolver`] and caches the outcome per name address.
//!
//! # Key Components
//!
//! - [`MangledNameResolver`] - Cache-backed front end used by [`crate::Reflector`]
//! - [`TypeNameResolver`] - The name-to-type primitive, supplied by the host
//! - [`SymbolicResolver`] - Built-in primitive for symbolic references and generic parameters
//! - [`MangledNameCache`] - Resolutions keyed by name address
//! - [`symbolic_name_length`] - Extent of names embedding symbolic references

mod cache;
mod resolver;
mod symbolic;

pub use cache::{CachedType, MangledNameCache};
pub use resolver::{
    MangledName, ResolveEnvironment, SymbolicResolver, TypeNameResolver, SYMBOLIC_DIRECT_CONTEXT,
    SYMBOLIC_INDIRECT_CONTEXT,
};
pub use symbolic::{is_absolute_reference, is_relative_reference, symbolic_name_length};

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    file::MemoryReader,
    metadata::{
        address::{Address, TypeHandle},
        layout::Platform,
        view::RawView,
    },
    Result,
};

/// Resolves mangled names through a [`TypeNameResolver`], remembering every outcome.
///
/// Successful and failed resolutions are both cached, so the resolver is invoked at most
/// once per name address and generic argument vector (modulo concurrent misses). Names are only resolved in a
/// context: a lookup without one yields `None` and caches nothing.
pub struct MangledNameResolver {
    cache: MangledNameCache,
    resolver: Arc<dyn TypeNameResolver>,
    max_length: usize,
}

impl MangledNameResolver {
    /// Creates a resolver with an empty cache.
    ///
    /// ## Arguments
    /// * `resolver` - The name-to-type primitive
    /// * `max_length` - Upper bound for the length of a mangled name in bytes
    pub fn new(resolver: Arc<dyn TypeNameResolver>, max_length: usize) -> Self {
        MangledNameResolver {
            cache: MangledNameCache::new(),
            resolver,
            max_length,
        }
    }

    /// Resolves the mangled name at `name`.
    ///
    /// # Errors
    /// Returns an error if the name can not be read or is longer than the configured
    /// maximum. Errors are not cached.
    pub fn resolve(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
        name: Address,
        environment: &ResolveEnvironment<'_>,
    ) -> Result<Option<TypeHandle>> {
        let arguments = environment.generic_arguments;
        if let Some(entry) = self.cache.get(name, arguments) {
            trace!(%name, ?entry, "mangled name cache hit");
            return Ok(entry.handle());
        }

        if environment.context.is_none() {
            return Ok(None);
        }

        let length = symbolic_name_length(reader, platform, name, self.max_length)?;
        let bytes = RawView::new(reader, platform, name).read_bytes(0, length)?;

        let resolved = self.resolver.resolve(
            reader,
            platform,
            &MangledName {
                address: name,
                bytes: &bytes,
            },
            environment,
        )?;

        match resolved {
            Some(handle) => trace!(%name, metadata = %handle.metadata_address(), "resolved mangled name"),
            None => debug!(%name, mangled = %String::from_utf8_lossy(&bytes), "mangled name is unresolvable"),
        }

        self.cache.insert(name, arguments, resolved.into());
        Ok(resolved)
    }

    /// The cache of outcomes
    pub fn cache(&self) -> &MangledNameCache {
        &self.cache
    }
}

impl std::fmt::Debug for MangledNameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MangledNameResolver")
            .field("cached", &self.cache.len())
            .field("max_length", &self.max_length)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        metadata::descriptor::ContextDescriptor,
        test::factories::{Builder, TypeSpec},
    };

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
    }

    impl TypeNameResolver for Counting {
        fn resolve(
            &self,
            _reader: &dyn MemoryReader,
            _platform: Platform,
            name: &MangledName<'_>,
            _environment: &ResolveEnvironment<'_>,
        ) -> Result<Option<TypeHandle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((name.bytes == b"Si").then(|| TypeHandle::new(Address(0x7000))))
        }
    }

    #[test]
    fn outcomes_are_cached() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let boat = builder.struct_descriptor(&TypeSpec {
            parent: Some(module),
            name: "Boat",
            ..Default::default()
        });
        let int = builder.mangled(b"Si");
        let unknown = builder.mangled(b"7Unknown");
        let snapshot = builder.finish();

        let platform = Platform::LINUX_64;
        let context = ContextDescriptor::decode(&snapshot, platform, boat).unwrap();
        let environment = ResolveEnvironment {
            context: Some(&context),
            generic_arguments: None,
        };

        let primitive = Arc::new(Counting::default());
        let resolver = MangledNameResolver::new(primitive.clone(), 4096);

        for _ in 0..3 {
            assert_eq!(
                resolver.resolve(&snapshot, platform, int, &environment).unwrap(),
                Some(TypeHandle::new(Address(0x7000)))
            );
            assert_eq!(
                resolver.resolve(&snapshot, platform, unknown, &environment).unwrap(),
                None
            );
        }

        assert_eq!(primitive.calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cache().get(unknown, None), Some(CachedType::Unresolvable));
    }

    #[test]
    fn no_context_is_not_cached() {
        let mut builder = Builder::new(0x1000);
        let int = builder.mangled(b"Si");
        let snapshot = builder.finish();

        let primitive = Arc::new(Counting::default());
        let resolver = MangledNameResolver::new(primitive.clone(), 4096);

        let result = resolver
            .resolve(&snapshot, Platform::LINUX_64, int, &ResolveEnvironment::default())
            .unwrap();
        assert_eq!(result, None);
        assert!(resolver.cache().is_empty());
        assert_eq!(primitive.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unreadable_name_is_an_error() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let snapshot = builder.finish();

        let platform = Platform::LINUX_64;
        let context = ContextDescriptor::decode(&snapshot, platform, module).unwrap();
        let environment = ResolveEnvironment {
            context: Some(&context),
            generic_arguments: None,
        };

        let resolver = MangledNameResolver::new(Arc::new(SymbolicResolver::new()), 4096);
        assert!(resolver
            .resolve(&snapshot, platform, Address(0x9_0000), &environment)
            .is_err());
        assert!(resolver.cache().is_empty());
    }
}
