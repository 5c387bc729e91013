//! Struct and enum descriptors.

use crate::{
    metadata::{layout::descriptor, view::RawView},
    Result,
};

/// Struct-specific part of a type context descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StructDescriptor {
    /// Number of stored properties
    pub num_fields: u32,
    /// Offset of the field offset vector in the metadata, in words
    pub field_offset_vector_offset: u32,
}

impl StructDescriptor {
    pub(crate) fn decode(view: &RawView<'_>) -> Result<Self> {
        Ok(StructDescriptor {
            num_fields: view.read::<u32>(descriptor::STRUCT_NUM_FIELDS)?,
            field_offset_vector_offset: view.read::<u32>(descriptor::STRUCT_FIELD_OFFSET_VECTOR_OFFSET)?,
        })
    }

    /// Whether the metadata carries a field offset vector
    #[must_use]
    pub fn has_field_offset_vector(&self) -> bool {
        self.field_offset_vector_offset != 0
    }
}

/// Enum-specific part of a type context descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumDescriptor {
    /// Number of cases with an associated value
    pub num_payload_cases: u32,
    /// Offset of the payload size in the metadata, in words; zero if absent
    pub payload_size_offset: u8,
    /// Number of cases without an associated value
    pub num_empty_cases: u32,
}

impl EnumDescriptor {
    pub(crate) fn decode(view: &RawView<'_>) -> Result<Self> {
        let packed = view.read::<u32>(descriptor::ENUM_NUM_PAYLOAD_CASES_AND_PAYLOAD_SIZE_OFFSET)?;

        Ok(EnumDescriptor {
            num_payload_cases: packed & 0x00FF_FFFF,
            payload_size_offset: (packed >> 24) as u8,
            num_empty_cases: view.read::<u32>(descriptor::ENUM_NUM_EMPTY_CASES)?,
        })
    }

    /// Total number of cases
    #[must_use]
    pub fn num_cases(&self) -> u32 {
        self.num_payload_cases.saturating_add(self.num_empty_cases)
    }
}
