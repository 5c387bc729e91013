//! Struct and enum metadata.

use crate::{
    metadata::{
        address::{Address, TypeHandle},
        descriptor::{ContextDescriptor, EnumDescriptor, StructDescriptor},
        kind::MetadataKind,
        types::{MetadataBase, ValueWitnessTable},
    },
    Result,
};

/// Metadata of a struct
#[derive(Clone, Copy, Debug)]
pub struct StructMetadata<'r> {
    pub(super) base: MetadataBase<'r>,
}

impl<'r> StructMetadata<'r> {
    pub(super) fn new(base: MetadataBase<'r>) -> Self {
        StructMetadata { base }
    }

    /// The metadata kind
    #[must_use]
    pub fn kind(&self) -> MetadataKind {
        self.base.kind
    }

    /// The originating type handle
    #[must_use]
    pub fn handle(&self) -> TypeHandle {
        self.base.handle
    }

    /// Address of the nominal type descriptor.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn description(&self) -> Result<Option<Address>> {
        let layout = self.base.reflector().platform().layout();
        self.base.view().read_pointer(layout.value_description)
    }

    /// The struct's context descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn descriptor(&self) -> Result<Option<ContextDescriptor>> {
        self.base.decode_descriptor(self.description()?)
    }

    fn struct_descriptor(&self) -> Result<Option<StructDescriptor>> {
        Ok(self
            .descriptor()?
            .and_then(|descriptor| descriptor.structure().copied()))
    }

    /// Number of stored properties; zero without a descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn num_fields(&self) -> Result<u32> {
        Ok(self.struct_descriptor()?.map_or(0, |s| s.num_fields))
    }

    /// Byte offsets of the stored properties, read from the `u32` field offset vector.
    ///
    /// # Errors
    /// Returns an error if the descriptor or the vector can not be read.
    pub fn field_offsets(&self) -> Result<Vec<u64>> {
        let Some(structure) = self.struct_descriptor()? else {
            return Ok(Vec::new());
        };
        if !structure.has_field_offset_vector() {
            return Ok(Vec::new());
        }

        let word = self.base.reflector().platform().word();
        let vector = self
            .base
            .view()
            .advance(u64::from(structure.field_offset_vector_offset) * word);

        (0..u64::from(structure.num_fields))
            .map(|index| vector.read::<u32>(index * 4).map(u64::from))
            .collect()
    }

    /// Address of the generic argument vector, directly after the metadata header
    #[must_use]
    pub fn generic_argument_pointer(&self) -> Address {
        let layout = self.base.reflector().platform().layout();
        self.base.view().advance(layout.value_header_size).address()
    }

    /// The value witness table.
    ///
    /// # Errors
    /// Returns an error if the table pointer is null or the table can not be read.
    pub fn vwt(&self) -> Result<ValueWitnessTable> {
        self.base.vwt()
    }
}

/// Metadata of an enum or an optional
#[derive(Clone, Copy, Debug)]
pub struct EnumMetadata<'r> {
    pub(super) base: MetadataBase<'r>,
}

impl<'r> EnumMetadata<'r> {
    pub(super) fn new(base: MetadataBase<'r>) -> Self {
        EnumMetadata { base }
    }

    /// The metadata kind: [`MetadataKind::Enum`] or [`MetadataKind::Optional`]
    #[must_use]
    pub fn kind(&self) -> MetadataKind {
        self.base.kind
    }

    /// The originating type handle
    #[must_use]
    pub fn handle(&self) -> TypeHandle {
        self.base.handle
    }

    /// Address of the nominal type descriptor.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn description(&self) -> Result<Option<Address>> {
        let layout = self.base.reflector().platform().layout();
        self.base.view().read_pointer(layout.value_description)
    }

    /// The enum's context descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn descriptor(&self) -> Result<Option<ContextDescriptor>> {
        self.base.decode_descriptor(self.description()?)
    }

    /// The enum-specific part of the descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn enum_descriptor(&self) -> Result<Option<EnumDescriptor>> {
        Ok(self
            .descriptor()?
            .and_then(|descriptor| descriptor.enumeration().copied()))
    }

    /// Number of cases with a payload.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn num_payload_cases(&self) -> Result<u32> {
        Ok(self.enum_descriptor()?.map_or(0, |e| e.num_payload_cases))
    }

    /// Number of cases without a payload.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn num_empty_cases(&self) -> Result<u32> {
        Ok(self.enum_descriptor()?.map_or(0, |e| e.num_empty_cases))
    }

    /// Address of the generic argument vector, directly after the metadata header
    #[must_use]
    pub fn generic_argument_pointer(&self) -> Address {
        let layout = self.base.reflector().platform().layout();
        self.base.view().advance(layout.value_header_size).address()
    }

    /// The value witness table, including the enum witnesses.
    ///
    /// # Errors
    /// Returns an error if the table pointer is null or the table can not be read.
    pub fn vwt(&self) -> Result<ValueWitnessTable> {
        self.base.vwt()
    }
}
