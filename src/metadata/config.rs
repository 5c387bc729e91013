//! Reflection configuration.

use crate::metadata::layout::Platform;

/// Default bound for resilient superclass chains
pub const DEFAULT_MAX_SUPERCLASS_DEPTH: usize = 64;
/// Default bound for the length of a mangled name in bytes
pub const DEFAULT_MAX_MANGLED_NAME_LENGTH: usize = 4096;

/// Settings of a [`crate::Reflector`].
///
/// # Examples
///
/// ```rust
/// use swiftscope::{Platform, ReflectionConfig};
///
/// let config = ReflectionConfig {
///     max_superclass_depth: 16,
///     ..ReflectionConfig::for_platform(Platform::APPLE_64)
/// };
/// assert!(config.platform.objc_interop);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReflectionConfig {
    /// Layout of the target's metadata
    pub platform: Platform,
    /// Longest chain of resilient superclasses walked before giving up
    pub max_superclass_depth: usize,
    /// Longest mangled name read before it is considered malformed
    pub max_mangled_name_length: usize,
}

impl ReflectionConfig {
    /// Default limits for `platform`
    #[must_use]
    pub const fn for_platform(platform: Platform) -> Self {
        ReflectionConfig {
            platform,
            max_superclass_depth: DEFAULT_MAX_SUPERCLASS_DEPTH,
            max_mangled_name_length: DEFAULT_MAX_MANGLED_NAME_LENGTH,
        }
    }
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        ReflectionConfig::for_platform(Platform::host())
    }
}
