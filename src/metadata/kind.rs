//! Metadata kind discriminants.

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{Error::UnsupportedKind, Result};

/// Largest value that is a kind discriminant; anything above is an isa pointer and marks a
/// class.
pub const LAST_ENUMERATED_KIND: u64 = 0x7FF;

/// The discriminant stored in the first word of every metadata record.
///
/// The high bits are flags: `0x100` marks non-type metadata, `0x200` non-heap metadata and
/// `0x400` runtime-private metadata.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum MetadataKind {
    /// Swift class; also every value above [`LAST_ENUMERATED_KIND`]
    Class = 0x0,
    /// Struct
    Struct = 0x200,
    /// Enum
    Enum = 0x201,
    /// `Optional<T>`, laid out as an enum
    Optional = 0x202,
    /// Foreign class, such as a Core Foundation type
    ForeignClass = 0x203,
    /// Foreign reference type imported from C++
    ForeignReferenceType = 0x204,
    /// Builtin type with no further structure
    Opaque = 0x300,
    /// Tuple
    Tuple = 0x301,
    /// Function type
    Function = 0x302,
    /// Existential (protocol composition)
    Existential = 0x303,
    /// Metatype
    Metatype = 0x304,
    /// Wrapper around an Objective-C class object
    ObjCClassWrapper = 0x305,
    /// Existential metatype
    ExistentialMetatype = 0x306,
    /// Extended existential with constraints
    ExtendedExistential = 0x307,
    /// Heap-allocated box for a captured local
    HeapLocalVariable = 0x400,
    /// Heap-allocated box for a captured local of generic type
    HeapGenericLocalVariable = 0x500,
    /// Boxed error
    ErrorObject = 0x501,
    /// Async task
    Task = 0x502,
    /// Async job
    Job = 0x503,
}

impl MetadataKind {
    /// Interprets the first word of a metadata record.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnsupportedKind`] for values that are neither a known kind nor
    /// an isa pointer.
    pub fn from_word(word: u64) -> Result<Self> {
        if word > LAST_ENUMERATED_KIND {
            return Ok(MetadataKind::Class);
        }

        MetadataKind::iter()
            .find(|kind| *kind as u64 == word)
            .ok_or(UnsupportedKind(word))
    }

    /// Returns `true` for kinds that carry a nominal type descriptor
    #[must_use]
    pub fn is_nominal(self) -> bool {
        matches!(
            self,
            MetadataKind::Class
                | MetadataKind::Struct
                | MetadataKind::Enum
                | MetadataKind::Optional
                | MetadataKind::ForeignClass
                | MetadataKind::ForeignReferenceType
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_kinds() {
        assert_eq!(MetadataKind::from_word(0x200).unwrap(), MetadataKind::Struct);
        assert_eq!(MetadataKind::from_word(0x202).unwrap(), MetadataKind::Optional);
        assert_eq!(MetadataKind::from_word(0x503).unwrap(), MetadataKind::Job);
        assert_eq!(MetadataKind::from_word(0).unwrap(), MetadataKind::Class);
        assert_eq!(MetadataKind::COUNT, 19);
    }

    #[test]
    fn isa_pointer_is_class() {
        assert_eq!(MetadataKind::from_word(0x800).unwrap(), MetadataKind::Class);
        assert_eq!(
            MetadataKind::from_word(0x7fff_1234_5678).unwrap(),
            MetadataKind::Class
        );
    }

    #[test]
    fn unknown_kind() {
        assert!(matches!(
            MetadataKind::from_word(0x7ff),
            Err(UnsupportedKind(0x7ff))
        ));
        assert!(matches!(
            MetadataKind::from_word(0x1),
            Err(UnsupportedKind(0x1))
        ));
    }

    #[test]
    fn nominal_kinds() {
        assert!(MetadataKind::Struct.is_nominal());
        assert!(MetadataKind::Class.is_nominal());
        assert!(!MetadataKind::Tuple.is_nominal());
    }
}
