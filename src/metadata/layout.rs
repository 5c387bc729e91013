//! Binary layout of the runtime's metadata records.
//!
//! Every byte offset used by the decoders is defined in this module and nowhere else, so
//! that ABI drift between platforms or runtime versions is a one-place change.
//!
//! Two kinds of records exist:
//!
//! - **Descriptors** (context descriptors, conformance records, field records) are emitted
//!   by the compiler into read-only sections and use 32-bit fields and relative pointers.
//!   Their layout does not depend on the platform; offsets are the constants in
//!   [`descriptor`].
//! - **Metadata** (type metadata, value witness tables) contain absolute pointers. Their
//!   layout depends on the pointer width and on whether classes carry an Objective-C object
//!   header; offsets are computed by [`Layout`] from a [`Platform`].

/// Width of a pointer on the target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerSize {
    /// 32-bit targets (armv7k, i386, wasm32)
    Bit32,
    /// 64-bit targets (x86_64, arm64)
    Bit64,
}

impl PointerSize {
    /// Size of a pointer in bytes
    #[must_use]
    pub const fn bytes(self) -> u64 {
        match self {
            PointerSize::Bit32 => 4,
            PointerSize::Bit64 => 8,
        }
    }
}

/// The facts about a target that change metadata layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Platform {
    /// Pointer width of the target
    pub pointer_size: PointerSize,
    /// Whether class metadata starts with an Objective-C compatible object header (isa,
    /// superclass, cache, data), as on Apple platforms
    pub objc_interop: bool,
}

impl Platform {
    /// 64-bit Linux, Android, Windows: no Objective-C interop
    pub const LINUX_64: Platform = Platform::new(PointerSize::Bit64, false);

    /// 32-bit targets without Objective-C interop
    pub const LINUX_32: Platform = Platform::new(PointerSize::Bit32, false);

    /// 64-bit Apple platforms: Objective-C interop
    pub const APPLE_64: Platform = Platform::new(PointerSize::Bit64, true);

    /// Creates a platform description
    #[must_use]
    pub const fn new(pointer_size: PointerSize, objc_interop: bool) -> Self {
        Platform {
            pointer_size,
            objc_interop,
        }
    }

    /// The platform this crate was compiled for
    #[must_use]
    pub const fn host() -> Self {
        let pointer_size = if cfg!(target_pointer_width = "32") {
            PointerSize::Bit32
        } else {
            PointerSize::Bit64
        };

        Platform::new(pointer_size, cfg!(target_vendor = "apple"))
    }

    /// Size of a pointer in bytes
    #[must_use]
    pub const fn word(&self) -> u64 {
        self.pointer_size.bytes()
    }

    /// The metadata layout for this platform
    #[must_use]
    pub const fn layout(&self) -> Layout {
        Layout::new(*self)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::host()
    }
}

/// Pointer-dependent offsets of metadata records, in bytes.
///
/// Offsets of class metadata fields are relative to the class's address point, which is
/// where a [`crate::TypeHandle`] points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    /// Size of a pointer
    pub word: u64,

    /// Value witness table pointer, relative to every metadata address point
    pub value_witnesses: i64,

    /// Nominal type descriptor pointer in struct and enum metadata
    pub value_description: u64,
    /// Size of the fixed struct/enum metadata header; generic arguments follow it
    pub value_header_size: u64,

    /// Superclass pointer in class metadata
    pub class_superclass: u64,
    /// Objective-C `data` word (rodata pointer plus Swift bits); only with interop
    pub class_data: Option<u64>,
    /// Class flags (`u32`)
    pub class_flags: u64,
    /// Instance address point (`u32`)
    pub class_instance_address_point: u64,
    /// Instance size (`u32`)
    pub class_instance_size: u64,
    /// Instance alignment mask (`u16`)
    pub class_instance_alignment_mask: u64,
    /// Reserved for the runtime (`u16`)
    pub class_runtime_reserved: u64,
    /// Total size of the class metadata object including prefix (`u32`)
    pub class_size: u64,
    /// Offset of the address point inside the class metadata object (`u32`)
    pub class_address_point: u64,
    /// Nominal type descriptor pointer in class metadata
    pub class_description: u64,
    /// Instance variable destroyer pointer
    pub class_ivar_destroyer: u64,
    /// Size of the fixed class metadata header after the address point
    pub class_header_size: u64,
    /// Words before the address point of a root class (destroyer, value witnesses)
    pub class_prefix_words: u32,

    /// Number of value witness function pointers preceding the size field
    pub vwt_function_count: u64,
    /// Value witness table `size` (word)
    pub vwt_size: u64,
    /// Value witness table `stride` (word)
    pub vwt_stride: u64,
    /// Value witness table flags (`u32`)
    pub vwt_flags: u64,
    /// Value witness table extra inhabitant count (`u32`)
    pub vwt_extra_inhabitant_count: u64,
    /// First of the three enum value witnesses, present with `HAS_ENUM_WITNESSES`
    pub vwt_enum_witnesses: u64,
}

impl Layout {
    /// Computes the metadata layout for `platform`
    #[must_use]
    pub const fn new(platform: Platform) -> Self {
        let word = platform.word();

        // Objective-C interop adds two cache words and the rodata word after the superclass.
        let (class_data, class_flags) = if platform.objc_interop {
            (Some(4 * word), 5 * word)
        } else {
            (None, 2 * word)
        };
        let class_description = class_flags + 24;
        let vwt_flags = 10 * word;

        Layout {
            word,
            value_witnesses: -(word as i64),
            value_description: word,
            value_header_size: 2 * word,
            class_superclass: word,
            class_data,
            class_flags,
            class_instance_address_point: class_flags + 4,
            class_instance_size: class_flags + 8,
            class_instance_alignment_mask: class_flags + 12,
            class_runtime_reserved: class_flags + 14,
            class_size: class_flags + 16,
            class_address_point: class_flags + 20,
            class_description,
            class_ivar_destroyer: class_description + word,
            class_header_size: class_description + 2 * word,
            class_prefix_words: 2,
            vwt_function_count: 8,
            vwt_size: 8 * word,
            vwt_stride: 9 * word,
            vwt_flags,
            vwt_extra_inhabitant_count: vwt_flags + 4,
            vwt_enum_witnesses: vwt_flags + 8,
        }
    }

    /// Size of the class metadata header in words; the positive size of a root class
    #[must_use]
    pub const fn class_header_words(&self) -> u32 {
        (self.class_header_size / self.word) as u32
    }
}

/// Offsets of compiler-emitted descriptor records, in bytes.
///
/// All fields are 32 bits wide; pointers are 32-bit relative offsets from the field's own
/// address (see [`crate::metadata::pointer`]).
pub mod descriptor {
    /// Context descriptor flags (`u32`)
    pub const FLAGS: u64 = 0;
    /// Parent context (relative, indirectable)
    pub const PARENT: u64 = 4;

    /// Module name (relative, C string)
    pub const MODULE_NAME: u64 = 8;
    /// Extended type of an extension (relative, mangled name)
    pub const EXTENSION_EXTENDED_CONTEXT: u64 = 8;
    /// Fixed size of an extension descriptor
    pub const EXTENSION_SIZE: u64 = 12;
    /// Fixed size of an anonymous context descriptor
    pub const ANONYMOUS_SIZE: u64 = 8;
    /// Protocol name (relative, C string)
    pub const PROTOCOL_NAME: u64 = 8;
    /// Number of requirements in the protocol's requirement signature (`u32`)
    pub const PROTOCOL_NUM_REQUIREMENTS_IN_SIGNATURE: u64 = 12;
    /// Number of protocol requirements (`u32`)
    pub const PROTOCOL_NUM_REQUIREMENTS: u64 = 16;
    /// Fixed size of an opaque type descriptor
    pub const OPAQUE_TYPE_SIZE: u64 = 8;

    /// Type name (relative, C string)
    pub const TYPE_NAME: u64 = 8;
    /// Metadata access function (relative)
    pub const TYPE_ACCESS_FUNCTION: u64 = 12;
    /// Field descriptor (relative)
    pub const TYPE_FIELDS: u64 = 16;

    /// Number of stored properties of a struct (`u32`)
    pub const STRUCT_NUM_FIELDS: u64 = 20;
    /// Field offset vector offset of a struct, in words (`u32`)
    pub const STRUCT_FIELD_OFFSET_VECTOR_OFFSET: u64 = 24;
    /// Fixed size of a struct descriptor
    pub const STRUCT_SIZE: u64 = 28;

    /// Payload case count (low 24 bits) and payload size offset (high 8 bits) (`u32`)
    pub const ENUM_NUM_PAYLOAD_CASES_AND_PAYLOAD_SIZE_OFFSET: u64 = 20;
    /// Number of cases without payload (`u32`)
    pub const ENUM_NUM_EMPTY_CASES: u64 = 24;
    /// Fixed size of an enum descriptor
    pub const ENUM_SIZE: u64 = 28;

    /// Superclass type (relative, mangled name)
    pub const CLASS_SUPERCLASS_TYPE: u64 = 20;
    /// Negative metadata size in words (`u32`), or the resilient metadata bounds (relative)
    /// when the class has a resilient superclass
    pub const CLASS_METADATA_NEGATIVE_SIZE: u64 = 24;
    /// Positive metadata size in words (`u32`), or extra class flags when the class has a
    /// resilient superclass
    pub const CLASS_METADATA_POSITIVE_SIZE: u64 = 28;
    /// Number of words of immediate members: field offsets, generic arguments, vtable
    pub const CLASS_NUM_IMMEDIATE_MEMBERS: u64 = 32;
    /// Number of stored properties (`u32`)
    pub const CLASS_NUM_FIELDS: u64 = 36;
    /// Field offset vector offset, in words (`u32`)
    pub const CLASS_FIELD_OFFSET_VECTOR_OFFSET: u64 = 40;
    /// Fixed size of a class descriptor
    pub const CLASS_SIZE: u64 = 44;

    /// Instantiation cache and default pattern preceding a type's generic header
    pub const TYPE_GENERIC_HEADER_PREFIX: u64 = 8;
    /// Generic context header: `num_params`, `num_requirements`, `num_key_arguments`, flags
    pub const GENERIC_HEADER_SIZE: u64 = 8;
    /// One generic requirement descriptor
    pub const GENERIC_REQUIREMENT_SIZE: u64 = 12;
    /// Pack shape header: `num_packs`, `num_shape_classes`
    pub const GENERIC_PACK_HEADER_SIZE: u64 = 4;
    /// One pack shape descriptor
    pub const GENERIC_PACK_DESCRIPTOR_SIZE: u64 = 8;

    /// Resilient superclass record (relative)
    pub const RESILIENT_SUPERCLASS_SIZE: u64 = 4;
    /// Foreign metadata initialization record
    pub const FOREIGN_INITIALIZATION_SIZE: u64 = 4;
    /// Singleton metadata initialization record
    pub const SINGLETON_INITIALIZATION_SIZE: u64 = 12;
    /// VTable descriptor header: offset and size in words
    pub const VTABLE_HEADER_SIZE: u64 = 8;
    /// One method descriptor: flags and implementation
    pub const METHOD_DESCRIPTOR_SIZE: u64 = 8;
    /// Override table header: number of entries
    pub const OVERRIDE_TABLE_HEADER_SIZE: u64 = 4;
    /// One method override descriptor
    pub const METHOD_OVERRIDE_SIZE: u64 = 12;

    /// Mangled type name of the described type (relative)
    pub const FIELD_DESCRIPTOR_MANGLED_TYPE_NAME: u64 = 0;
    /// Mangled superclass name (relative)
    pub const FIELD_DESCRIPTOR_SUPERCLASS: u64 = 4;
    /// Field descriptor kind (`u16`)
    pub const FIELD_DESCRIPTOR_KIND: u64 = 8;
    /// Size of one field record (`u16`)
    pub const FIELD_DESCRIPTOR_RECORD_SIZE: u64 = 10;
    /// Number of field records (`u32`)
    pub const FIELD_DESCRIPTOR_NUM_FIELDS: u64 = 12;
    /// Fixed size of a field descriptor; records follow
    pub const FIELD_DESCRIPTOR_SIZE: u64 = 16;
    /// Field record flags (`u32`)
    pub const FIELD_RECORD_FLAGS: u64 = 0;
    /// Field record mangled type name (relative)
    pub const FIELD_RECORD_MANGLED_TYPE_NAME: u64 = 4;
    /// Field record name (relative, C string)
    pub const FIELD_RECORD_NAME: u64 = 8;

    /// Protocol descriptor (relative, indirectable)
    pub const CONFORMANCE_PROTOCOL: u64 = 0;
    /// Conforming type reference (relative; meaning given by the flags' reference kind)
    pub const CONFORMANCE_TYPE_REF: u64 = 4;
    /// Witness table pattern (relative)
    pub const CONFORMANCE_WITNESS_TABLE_PATTERN: u64 = 8;
    /// Conformance flags (`u32`)
    pub const CONFORMANCE_FLAGS: u64 = 12;
    /// Size of one conformance section entry (relative pointer to a descriptor)
    pub const CONFORMANCE_RECORD_SIZE: u64 = 4;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_layout_objc() {
        let layout = Platform::APPLE_64.layout();

        assert_eq!(layout.class_superclass, 8);
        assert_eq!(layout.class_data, Some(32));
        assert_eq!(layout.class_flags, 40);
        assert_eq!(layout.class_instance_size, 48);
        assert_eq!(layout.class_size, 56);
        assert_eq!(layout.class_address_point, 60);
        assert_eq!(layout.class_description, 64);
        assert_eq!(layout.class_header_size, 80);
        assert_eq!(layout.class_header_words(), 10);
    }

    #[test]
    fn class_layout_linux() {
        let layout = Platform::LINUX_64.layout();

        assert_eq!(layout.class_data, None);
        assert_eq!(layout.class_flags, 16);
        assert_eq!(layout.class_instance_address_point, 20);
        assert_eq!(layout.class_instance_size, 24);
        assert_eq!(layout.class_instance_alignment_mask, 28);
        assert_eq!(layout.class_size, 32);
        assert_eq!(layout.class_address_point, 36);
        assert_eq!(layout.class_description, 40);
        assert_eq!(layout.class_header_words(), 7);
    }

    #[test]
    fn class_layout_32() {
        let layout = Platform::LINUX_32.layout();

        assert_eq!(layout.word, 4);
        assert_eq!(layout.class_flags, 8);
        assert_eq!(layout.class_description, 32);
        assert_eq!(layout.class_header_size, 40);
        assert_eq!(layout.value_header_size, 8);
        assert_eq!(layout.value_witnesses, -4);
    }

    #[test]
    fn value_witness_layout() {
        let layout = Platform::LINUX_64.layout();

        assert_eq!(layout.vwt_size, 64);
        assert_eq!(layout.vwt_stride, 72);
        assert_eq!(layout.vwt_flags, 80);
        assert_eq!(layout.vwt_extra_inhabitant_count, 84);
        assert_eq!(layout.vwt_enum_witnesses, 88);
        assert_eq!(layout.value_header_size, 16);
    }

    #[test]
    fn host_platform() {
        let host = Platform::host();
        assert_eq!(host.word() as usize, std::mem::size_of::<usize>());
        assert_eq!(Platform::default(), host);
    }
}
