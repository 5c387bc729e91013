//! Reflection field descriptors.
//!
//! The compiler emits one field descriptor per nominal type into the reflection metadata
//! section and points at it from the type's context descriptor. Each record names a stored
//! property (or enum case) and references its type by mangled name, which can be resolved
//! with [`crate::Reflector::resolve_mangled_name`].

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{
    file::MemoryReader,
    metadata::{
        address::Address,
        flags::FieldRecordFlags,
        layout::{descriptor, Platform},
        view::RawView,
    },
    Result,
};

/// Upper bound for records of one field descriptor
pub const MAX_FIELD_RECORDS: u32 = 0x10000;

/// Kind of declaration a field descriptor describes
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum FieldDescriptorKind {
    /// Struct
    Struct = 0,
    /// Class
    Class = 1,
    /// Enum with at most one payload case
    Enum = 2,
    /// Enum with several payload cases
    MultiPayloadEnum = 3,
    /// Protocol
    Protocol = 4,
    /// Class-bound protocol
    ClassProtocol = 5,
    /// Objective-C protocol
    ObjCProtocol = 6,
    /// Objective-C class
    ObjCClass = 7,
}

/// One stored property or enum case
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRecord {
    /// Address of the record
    pub address: Address,
    /// Record flags
    pub flags: FieldRecordFlags,
    /// Mangled name of the field's type; absent for cases without payload
    pub mangled_type_name: Option<Address>,
    /// Name of the field or case
    pub name: String,
}

impl FieldRecord {
    /// Whether the property is declared with `var`
    #[must_use]
    pub fn is_var(&self) -> bool {
        self.flags.contains(FieldRecordFlags::IS_VAR)
    }

    /// Whether the enum case is stored indirectly
    #[must_use]
    pub fn is_indirect_case(&self) -> bool {
        self.flags.contains(FieldRecordFlags::IS_INDIRECT_CASE)
    }
}

/// A decoded field descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Address of the descriptor
    pub address: Address,
    /// Mangled name of the described type
    pub mangled_type_name: Option<Address>,
    /// Mangled name of the superclass, for classes
    pub superclass: Option<Address>,
    /// Raw kind; see [`FieldDescriptor::kind`]
    pub raw_kind: u16,
    /// Field records in declaration order
    pub records: Vec<FieldRecord>,
}

impl FieldDescriptor {
    /// Decodes the field descriptor at `address`.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be read, uses an unexpected record size,
    /// or claims more than [`MAX_FIELD_RECORDS`] records.
    pub fn decode(reader: &dyn MemoryReader, platform: Platform, address: Address) -> Result<Self> {
        let view = RawView::new(reader, platform, address);

        let record_size = view.read::<u16>(descriptor::FIELD_DESCRIPTOR_RECORD_SIZE)?;
        let num_fields = view.read::<u32>(descriptor::FIELD_DESCRIPTOR_NUM_FIELDS)?;

        if num_fields > MAX_FIELD_RECORDS {
            return Err(malformed_error!(
                "Field descriptor at {} claims {} records",
                address,
                num_fields
            ));
        }
        if num_fields > 0 && u64::from(record_size) < descriptor::FIELD_RECORD_NAME + 4 {
            return Err(malformed_error!(
                "Field descriptor at {} has record size {}",
                address,
                record_size
            ));
        }

        let mut records = Vec::with_capacity(num_fields as usize);
        for index in 0..u64::from(num_fields) {
            let record =
                view.advance(descriptor::FIELD_DESCRIPTOR_SIZE + index * u64::from(record_size));

            let name = match record.relative_direct(descriptor::FIELD_RECORD_NAME)? {
                Some(target) => record.at(target).c_string(0)?,
                None => String::new(),
            };

            records.push(FieldRecord {
                address: record.address(),
                flags: FieldRecordFlags::from_bits_retain(
                    record.read::<u32>(descriptor::FIELD_RECORD_FLAGS)?,
                ),
                mangled_type_name: record.relative_direct(descriptor::FIELD_RECORD_MANGLED_TYPE_NAME)?,
                name,
            });
        }

        Ok(FieldDescriptor {
            address,
            mangled_type_name: view.relative_direct(descriptor::FIELD_DESCRIPTOR_MANGLED_TYPE_NAME)?,
            superclass: view.relative_direct(descriptor::FIELD_DESCRIPTOR_SUPERCLASS)?,
            raw_kind: view.read::<u16>(descriptor::FIELD_DESCRIPTOR_KIND)?,
            records,
        })
    }

    /// The descriptor kind, or `None` for kinds newer than this crate
    #[must_use]
    pub fn kind(&self) -> Option<FieldDescriptorKind> {
        FieldDescriptorKind::iter().find(|kind| *kind as u16 == self.raw_kind)
    }

    /// Names of the records in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|record| record.name.as_str())
    }
}
