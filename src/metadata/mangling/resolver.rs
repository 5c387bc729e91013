//! Name-to-type resolution primitives.
//!
//! Turning a mangled name into a type is the runtime's job: only the runtime knows every
//! type that was linked in and can instantiate generic metadata on demand. This crate
//! models that primitive as the [`TypeNameResolver`] trait. [`SymbolicResolver`] is a
//! built-in implementation covering the part of the grammar found in field and superclass
//! references:
//!
//! - symbolic references to context descriptors (`\x01` direct, `\x02` indirect),
//! - generic parameters (`x`, `q` followed by a parameter index),
//! - any other complete name that was registered up front (for example `Si` or `SS`).
//!
//! Names outside of that subset are reported as unresolvable.

use dashmap::DashMap;

use crate::{
    file::{io::read_le, parser::Parser, MemoryReader},
    metadata::{
        address::{Address, TypeHandle},
        descriptor::ContextDescriptor,
        layout::Platform,
        view::RawView,
    },
    Result,
};

/// Direct symbolic reference to a context descriptor
pub const SYMBOLIC_DIRECT_CONTEXT: u8 = 0x01;
/// Indirect symbolic reference to a context descriptor
pub const SYMBOLIC_INDIRECT_CONTEXT: u8 = 0x02;

/// The bytes of a mangled name and where they were read from
#[derive(Clone, Copy, Debug)]
pub struct MangledName<'a> {
    /// Address of the first byte; symbolic references are relative to their position
    pub address: Address,
    /// The name, without terminator
    pub bytes: &'a [u8],
}

/// The environment generic parameters in a mangled name are resolved against
#[derive(Clone, Copy, Debug, Default)]
pub struct ResolveEnvironment<'a> {
    /// Context descriptor of the type the name belongs to
    pub context: Option<&'a ContextDescriptor>,
    /// Generic argument vector of the instantiation
    pub generic_arguments: Option<Address>,
}

/// The runtime's name-to-type primitive.
///
/// Returning `Ok(None)` means the name does not denote a type known to the resolver; the
/// outcome is cached by [`crate::metadata::mangling::MangledNameResolver`] and the name
/// is not tried again. Errors are reserved for unreadable memory and are not cached.
pub trait TypeNameResolver: Send + Sync {
    /// Resolves `name` in `environment`.
    ///
    /// # Errors
    /// Returns an error if memory referenced by the name can not be read.
    fn resolve(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
        name: &MangledName<'_>,
        environment: &ResolveEnvironment<'_>,
    ) -> Result<Option<TypeHandle>>;
}

/// Resolves symbolic references and generic parameters, plus any registered names.
///
/// # Examples
///
/// ```rust
/// use swiftscope::{Address, SymbolicResolver, TypeHandle};
///
/// let resolver = SymbolicResolver::new();
/// resolver.register_name("Si", TypeHandle::new(Address(0x7000)));
/// resolver.register_context(Address(0x2000), TypeHandle::new(Address(0x8000)));
/// assert_eq!(resolver.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SymbolicResolver {
    names: DashMap<Vec<u8>, TypeHandle>,
    contexts: DashMap<Address, TypeHandle>,
}

impl SymbolicResolver {
    /// Creates a resolver that knows no types
    #[must_use]
    pub fn new() -> Self {
        SymbolicResolver {
            names: DashMap::new(),
            contexts: DashMap::new(),
        }
    }

    /// Registers the type denoted by a complete mangled name
    pub fn register_name(&self, mangled: impl Into<Vec<u8>>, handle: TypeHandle) {
        self.names.insert(mangled.into(), handle);
    }

    /// Registers the (non-generic) type declared by a context descriptor, the target of
    /// symbolic references
    pub fn register_context(&self, descriptor: Address, handle: TypeHandle) {
        self.contexts.insert(descriptor, handle);
    }

    /// Number of registered names and contexts
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len() + self.contexts.len()
    }

    /// Returns `true` if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn context(&self, descriptor: Address) -> Option<TypeHandle> {
        self.contexts.get(&descriptor).map(|entry| *entry.value())
    }

    fn symbolic_context(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
        name: &MangledName<'_>,
    ) -> Result<Option<TypeHandle>> {
        let offset = read_le::<i32>(&name.bytes[1..])?;
        let target = name.address.advance(1).offset(i64::from(offset));

        let descriptor = if name.bytes[0] == SYMBOLIC_DIRECT_CONTEXT {
            Some(target)
        } else {
            RawView::new(reader, platform, target).read_pointer(0)?
        };

        Ok(descriptor.and_then(|descriptor| self.context(descriptor)))
    }

    fn generic_parameter(
        reader: &dyn MemoryReader,
        platform: Platform,
        depth: u64,
        index: u64,
        environment: &ResolveEnvironment<'_>,
    ) -> Result<Option<TypeHandle>> {
        let (Some(context), Some(arguments)) = (environment.context, environment.generic_arguments) else {
            return Ok(None);
        };

        let counts = context.generic_param_counts(reader, platform)?;
        let Ok(depth) = usize::try_from(depth) else {
            return Ok(None);
        };
        let Some(&end) = counts.get(depth) else {
            return Ok(None);
        };

        let start = if depth == 0 { 0 } else { u64::from(counts[depth - 1]) };
        let flat = start.saturating_add(index);
        if flat >= u64::from(end) {
            return Ok(None);
        }

        let argument = RawView::new(reader, platform, arguments).read_pointer(flat * platform.word())?;
        Ok(argument.map(TypeHandle::new))
    }
}

impl TypeNameResolver for SymbolicResolver {
    fn resolve(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
        name: &MangledName<'_>,
        environment: &ResolveEnvironment<'_>,
    ) -> Result<Option<TypeHandle>> {
        match name.bytes {
            [SYMBOLIC_DIRECT_CONTEXT | SYMBOLIC_INDIRECT_CONTEXT, _, _, _, _] => {
                self.symbolic_context(reader, platform, name)
            }
            [b'x'] => Self::generic_parameter(reader, platform, 0, 0, environment),
            [b'q', rest @ ..] => match parse_generic_param_index(rest) {
                Some((depth, index)) => {
                    Self::generic_parameter(reader, platform, depth, index, environment)
                }
                None => Ok(None),
            },
            bytes => Ok(self.names.get(bytes).map(|entry| *entry.value())),
        }
    }
}

/// Parses a complete generic parameter index into `(depth, index)`.
///
/// ```text
/// generic-param-index ::= 'z'               depth 0, index 0
///                     ::= INDEX             depth 0, index N + 1
///                     ::= 'd' INDEX INDEX   depth M + 1, index N
/// INDEX               ::= '_'               0
///                     ::= NATURAL '_'       NATURAL + 1
/// ```
fn parse_generic_param_index(data: &[u8]) -> Option<(u64, u64)> {
    let mut parser = Parser::new(data);

    let result = match parser.peek_byte().ok()? {
        b'z' => {
            parser.advance_by(1).ok()?;
            (0, 0)
        }
        b'd' => {
            parser.advance_by(1).ok()?;
            let depth = parse_index(&mut parser)?.checked_add(1)?;
            (depth, parse_index(&mut parser)?)
        }
        _ => (0, parse_index(&mut parser)?.checked_add(1)?),
    };

    if parser.has_more_data() {
        return None;
    }

    Some(result)
}

fn parse_index(parser: &mut Parser<'_>) -> Option<u64> {
    if parser.peek_byte().ok()? == b'_' {
        parser.advance_by(1).ok()?;
        return Some(0);
    }

    let value = parser.read_natural().ok()??;
    if parser.peek_byte().ok()? != b'_' {
        return None;
    }
    parser.advance_by(1).ok()?;

    value.checked_add(1)
}
