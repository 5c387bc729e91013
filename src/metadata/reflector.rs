//! The reflection context.
//!
//! A [`Reflector`] owns everything a query needs: the memory source, the target's layout,
//! the conformance registry, the mangled name cache and the host collaborators. The caches
//! live and die with the reflector; two reflectors over the same memory share nothing.

use std::sync::Arc;

use tracing::debug;

use crate::{
    file::MemoryReader,
    metadata::{
        address::{Address, TypeHandle},
        config::ReflectionConfig,
        conformance::{ConformanceDescriptor, ConformanceRegistry, ImageEnumerator, StaticImages},
        descriptor::ContextDescriptor,
        layout::Platform,
        mangling::{MangledNameResolver, ResolveEnvironment, SymbolicResolver, TypeNameResolver},
        types::{Metadata, ObjectModel, PlatformObjectModel},
    },
    Result,
};

/// Entry point for all metadata queries.
///
/// `Reflector` is `Send + Sync`; queries from several threads share its caches. Neither
/// cache lock is held while memory is decoded on behalf of another query.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use swiftscope::{ImageFile, ImageId, Reflector, StaticImages};
/// use std::path::Path;
///
/// let image = ImageFile::from_file(Path::new("libBoats.so"))?;
/// let images = Arc::new(StaticImages::new());
/// if let Some(loaded) = image.image(ImageId(0)) {
///     images.add(loaded);
/// }
///
/// let platform = image.platform();
/// let reflector = Reflector::builder(image.into_snapshot())
///     .platform(platform)
///     .images(images)
///     .build();
///
/// for conformance in reflector.conformances_for(swiftscope::Address(0x1_2340)) {
///     println!("{:?}", conformance.protocol_name);
/// }
/// # Ok::<(), swiftscope::Error>(())
/// ```
pub struct Reflector {
    reader: Arc<dyn MemoryReader>,
    config: ReflectionConfig,
    registry: ConformanceRegistry,
    names: MangledNameResolver,
    images: Arc<dyn ImageEnumerator>,
    object_model: Arc<dyn ObjectModel>,
}

impl Reflector {
    /// Creates a reflector with default collaborators: no images, a [`SymbolicResolver`]
    /// that knows no types, and the host platform's object model
    pub fn new<R: MemoryReader + 'static>(reader: R) -> Self {
        Reflector::builder(reader).build()
    }

    /// Starts assembling a reflector over `reader`
    pub fn builder<R: MemoryReader + 'static>(reader: R) -> ReflectorBuilder {
        ReflectorBuilder::new(Arc::new(reader))
    }

    /// Interprets the metadata a type handle points at.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedKind`] if the kind word is not a known metadata
    /// kind, or an error if it can not be read.
    pub fn reflect(&self, handle: TypeHandle) -> Result<Metadata<'_>> {
        Metadata::decode(self, handle).inspect_err(|error| {
            debug!(metadata = %handle, %error, "can not reflect metadata");
        })
    }

    /// Interprets the metadata at `address`.
    ///
    /// # Errors
    /// See [`Reflector::reflect`].
    pub fn reflect_address(&self, address: Address) -> Result<Metadata<'_>> {
        self.reflect(TypeHandle::new(address))
    }

    /// Decodes the context descriptor at `address`.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn decode_descriptor(&self, address: Address) -> Result<ContextDescriptor> {
        ContextDescriptor::decode(self.reader(), self.platform(), address)
    }

    /// The context descriptor of `metadata`; `None` for kinds without one.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn context_descriptor(&self, metadata: &Metadata<'_>) -> Result<Option<ContextDescriptor>> {
        metadata.descriptor()
    }

    /// Byte offsets of the stored properties of `metadata`.
    ///
    /// # Errors
    /// See [`Metadata::field_offsets`].
    pub fn field_offsets(&self, metadata: &Metadata<'_>) -> Result<Vec<u64>> {
        metadata.field_offsets()
    }

    /// Generic arguments of `metadata`, in declaration order.
    ///
    /// # Errors
    /// See [`Metadata::generic_types`].
    pub fn generic_types(&self, metadata: &Metadata<'_>) -> Result<Vec<TypeHandle>> {
        metadata.generic_types()
    }

    /// Protocol conformances of the type of `metadata`.
    ///
    /// # Errors
    /// Returns an error if the context descriptor can not be decoded.
    pub fn conformances(&self, metadata: &Metadata<'_>) -> Result<Vec<ConformanceDescriptor>> {
        metadata.conformances()
    }

    /// Protocol conformances of the type declared by `descriptor`, scanning any images
    /// loaded since the last query
    pub fn conformances_for(&self, descriptor: Address) -> Vec<ConformanceDescriptor> {
        self.registry
            .conformances(self.reader(), self.platform(), self.images.as_ref(), descriptor)
    }

    /// Resolves the mangled name at `name` in the generic environment of `metadata`.
    ///
    /// # Errors
    /// See [`Metadata::type_of`].
    pub fn resolve_mangled_name(&self, name: Address, metadata: &Metadata<'_>) -> Result<Option<TypeHandle>> {
        metadata.type_of(name)
    }

    /// Resolves the mangled name at `name` in an explicit environment.
    ///
    /// # Errors
    /// Returns an error if the name can not be read.
    pub fn resolve_in(&self, name: Address, environment: &ResolveEnvironment<'_>) -> Result<Option<TypeHandle>> {
        self.names
            .resolve(self.reader(), self.platform(), name, environment)
    }

    /// The memory source
    pub fn reader(&self) -> &dyn MemoryReader {
        self.reader.as_ref()
    }

    /// Layout of the target
    pub fn platform(&self) -> Platform {
        self.config.platform
    }

    /// The configuration
    pub fn config(&self) -> &ReflectionConfig {
        &self.config
    }

    /// The conformance registry
    pub fn registry(&self) -> &ConformanceRegistry {
        &self.registry
    }

    /// The mangled name resolver and its cache
    pub fn names(&self) -> &MangledNameResolver {
        &self.names
    }

    /// The host's object model
    pub fn object_model(&self) -> &dyn ObjectModel {
        self.object_model.as_ref()
    }
}

impl std::fmt::Debug for Reflector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reflector")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Reflector`].
///
/// Every collaborator has a default; only the memory source is required.
pub struct ReflectorBuilder {
    reader: Arc<dyn MemoryReader>,
    config: ReflectionConfig,
    images: Option<Arc<dyn ImageEnumerator>>,
    resolver: Option<Arc<dyn TypeNameResolver>>,
    object_model: Option<Arc<dyn ObjectModel>>,
}

impl ReflectorBuilder {
    fn new(reader: Arc<dyn MemoryReader>) -> Self {
        ReflectorBuilder {
            reader,
            config: ReflectionConfig::default(),
            images: None,
            resolver: None,
            object_model: None,
        }
    }

    /// Replaces the whole configuration
    #[must_use]
    pub fn config(mut self, config: ReflectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the target layout, keeping the configured limits
    #[must_use]
    pub fn platform(mut self, platform: Platform) -> Self {
        self.config.platform = platform;
        self
    }

    /// Sets the source of the loaded image list
    #[must_use]
    pub fn images(mut self, images: Arc<dyn ImageEnumerator>) -> Self {
        self.images = Some(images);
        self
    }

    /// Sets the name-to-type primitive
    #[must_use]
    pub fn resolver(mut self, resolver: Arc<dyn TypeNameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the object model
    #[must_use]
    pub fn object_model(mut self, object_model: Arc<dyn ObjectModel>) -> Self {
        self.object_model = Some(object_model);
        self
    }

    /// Creates the reflector
    #[must_use]
    pub fn build(self) -> Reflector {
        let resolver = self
            .resolver
            .unwrap_or_else(|| Arc::new(SymbolicResolver::new()));

        Reflector {
            reader: self.reader,
            names: MangledNameResolver::new(resolver, self.config.max_mangled_name_length),
            config: self.config,
            registry: ConformanceRegistry::new(),
            images: self.images.unwrap_or_else(|| Arc::new(StaticImages::new())),
            object_model: self
                .object_model
                .unwrap_or_else(|| Arc::new(PlatformObjectModel::new())),
        }
    }
}
