//! Value witness tables.

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{
    file::MemoryReader,
    metadata::{address::Address, flags::ValueWitnessFlags, layout::Platform, view::RawView},
    Result,
};

/// The value witness functions, in table order
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum ValueWitnessFunction {
    /// Copies a value from an inline buffer into another
    InitializeBufferWithCopyOfBuffer,
    /// Destroys a value
    Destroy,
    /// Copy-initializes a value
    InitializeWithCopy,
    /// Copy-assigns a value
    AssignWithCopy,
    /// Move-initializes a value
    InitializeWithTake,
    /// Move-assigns a value
    AssignWithTake,
    /// Reads the tag of a single-payload enum case
    GetEnumTagSinglePayload,
    /// Stores the tag of a single-payload enum case
    StoreEnumTagSinglePayload,
}

/// The enum witnesses appended to the table of enum types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnumValueWitnesses {
    /// Reads the case tag of a value
    pub get_enum_tag: Option<Address>,
    /// Projects the payload out of a value, destroying the tag
    pub destructive_project_enum_data: Option<Address>,
    /// Injects a case tag into a value
    pub destructive_inject_enum_tag: Option<Address>,
}

/// A decoded value witness table: layout facts and the addresses of the value operations.
///
/// Function addresses are opaque; they are never called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueWitnessTable {
    /// Address of the table
    pub address: Address,
    /// Witness functions, indexed by [`ValueWitnessFunction`]
    pub functions: [Option<Address>; ValueWitnessFunction::COUNT],
    /// Size of a value in bytes
    pub size: u64,
    /// Distance between array elements in bytes
    pub stride: u64,
    /// Flags
    pub flags: ValueWitnessFlags,
    /// Number of extra inhabitants
    pub extra_inhabitant_count: u32,
    /// Enum witnesses, present with [`ValueWitnessFlags::HAS_ENUM_WITNESSES`]
    pub enum_witnesses: Option<EnumValueWitnesses>,
}

impl ValueWitnessTable {
    /// Decodes the value witness table at `address`.
    ///
    /// # Errors
    /// Returns an error if the table can not be read.
    pub fn decode(reader: &dyn MemoryReader, platform: Platform, address: Address) -> Result<Self> {
        let view = RawView::new(reader, platform, address);
        let layout = view.layout();

        let mut functions = [None; ValueWitnessFunction::COUNT];
        for (index, function) in ValueWitnessFunction::iter().enumerate() {
            functions[function as usize] = view.read_pointer(index as u64 * layout.word)?;
        }

        let flags = ValueWitnessFlags::from_bits_retain(view.read::<u32>(layout.vwt_flags)?);
        let enum_witnesses = if flags.contains(ValueWitnessFlags::HAS_ENUM_WITNESSES) {
            let witnesses = view.advance(layout.vwt_enum_witnesses);
            Some(EnumValueWitnesses {
                get_enum_tag: witnesses.read_pointer(0)?,
                destructive_project_enum_data: witnesses.read_pointer(layout.word)?,
                destructive_inject_enum_tag: witnesses.read_pointer(2 * layout.word)?,
            })
        } else {
            None
        };

        Ok(ValueWitnessTable {
            address,
            functions,
            size: view.read_word(layout.vwt_size)?,
            stride: view.read_word(layout.vwt_stride)?,
            flags,
            extra_inhabitant_count: view.read::<u32>(layout.vwt_extra_inhabitant_count)?,
            enum_witnesses,
        })
    }

    /// Address of a witness function
    #[must_use]
    pub fn function(&self, function: ValueWitnessFunction) -> Option<Address> {
        self.functions[function as usize]
    }

    /// Alignment in bytes
    #[must_use]
    pub fn alignment(&self) -> u64 {
        self.flags.alignment()
    }

    /// Alignment mask (alignment minus one)
    #[must_use]
    pub fn alignment_mask(&self) -> u64 {
        self.flags.alignment_mask()
    }

    /// Copying requires more than a memcpy
    #[must_use]
    pub fn is_non_pod(&self) -> bool {
        self.flags.contains(ValueWitnessFlags::IS_NON_POD)
    }

    /// Values do not fit into an inline buffer
    #[must_use]
    pub fn is_non_inline(&self) -> bool {
        self.flags.contains(ValueWitnessFlags::IS_NON_INLINE)
    }

    /// Moving requires more than a memcpy
    #[must_use]
    pub fn is_non_bitwise_takable(&self) -> bool {
        self.flags.contains(ValueWitnessFlags::IS_NON_BITWISE_TAKABLE)
    }

    /// Layout is not yet complete
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.flags.contains(ValueWitnessFlags::INCOMPLETE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::Builder;

    #[test]
    fn class_reference_witnesses() {
        let mut builder = Builder::new(0x1000);
        let vwt = builder.vwt(8, 8, 0x0001_0007, 0x7FFF_FFFF);
        let snapshot = builder.finish();

        let table = ValueWitnessTable::decode(&snapshot, Platform::LINUX_64, vwt).unwrap();
        assert_eq!(table.size, 8);
        assert_eq!(table.stride, 8);
        assert_eq!(table.flags.bits(), 0x10007);
        assert_eq!(table.alignment(), 8);
        assert!(table.is_non_pod());
        assert!(!table.is_non_inline());
        assert_eq!(table.extra_inhabitant_count, 0x7FFF_FFFF);
        assert_eq!(table.enum_witnesses, None);
        assert_eq!(table.function(ValueWitnessFunction::Destroy), Some(Address(0xF001)));
        assert_eq!(
            table.function(ValueWitnessFunction::StoreEnumTagSinglePayload),
            Some(Address(0xF007))
        );
    }

    #[test]
    fn enum_witnesses_on_32_bit() {
        let mut builder = Builder::with_platform(0x1000, Platform::LINUX_32);
        let vwt = builder.vwt(1, 1, 0x0020_0000, 0);
        let snapshot = builder.finish();

        let table = ValueWitnessTable::decode(&snapshot, Platform::LINUX_32, vwt).unwrap();
        assert_eq!(table.size, 1);
        assert_eq!(table.alignment(), 1);
        let witnesses = table.enum_witnesses.unwrap();
        assert_eq!(witnesses.get_enum_tag, Some(Address(0xF100)));
        assert_eq!(witnesses.destructive_inject_enum_tag, Some(Address(0xF102)));
    }
}
