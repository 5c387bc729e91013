//! Generic context of a declaration.
//!
//! A generic context descriptor carries a small header followed by variable-length
//! trailing arrays:
//!
//! ```text
//! [type prefix]        instantiation cache, default pattern   (type descriptors only)
//! header               num_params, num_requirements, num_key_arguments, flags
//! params               one byte per parameter, padded to 4
//! requirements         12 bytes each
//! pack shapes          header + 8 bytes per pack              (HAS_TYPE_PACKS)
//! inverted protocols   set, counts, requirements              (HAS_CONDITIONAL_INVERTED_PROTOCOLS)
//! values               header + 4 bytes per value             (HAS_VALUES)
//! ```
//!
//! Whatever the declaration stores after its generic context (for classes: resilient
//! superclass, initialization records, vtable) starts at [`GenericContext::end`].

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{
    file::MemoryReader,
    metadata::{
        address::Address,
        flags::GenericContextFlags,
        layout::{descriptor, Platform},
        view::RawView,
    },
    Result,
};

/// Upper bound for parameters and requirements of one generic context
pub const MAX_GENERIC_PARAMS: u16 = 0x4000;

/// Kind of a generic parameter
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum GenericParamKind {
    /// Type parameter
    Type = 0,
    /// Type parameter pack
    TypePack = 1,
    /// Value parameter
    Value = 2,
}

/// One generic parameter descriptor byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GenericParam(pub u8);

impl GenericParam {
    /// The parameter kind, or `None` for kinds newer than this crate
    #[must_use]
    pub fn kind(self) -> Option<GenericParamKind> {
        let bits = self.0 & 0x3F;
        GenericParamKind::iter().find(|kind| *kind as u8 == bits)
    }

    /// Whether the parameter is passed as a key argument in the generic argument vector
    #[must_use]
    pub fn has_key_argument(self) -> bool {
        self.0 & 0x80 != 0
    }
}

/// Kind of a generic requirement
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter, EnumCount)]
pub enum GenericRequirementKind {
    /// Conformance to a protocol
    Protocol = 0,
    /// Same-type constraint
    SameType = 1,
    /// Superclass constraint
    BaseClass = 2,
    /// Implied by a same-type or base-class constraint
    SameConformance = 3,
    /// Same-shape constraint between packs
    SameShape = 4,
    /// Suppressed protocol (`~Copyable`)
    InvertedProtocols = 5,
    /// Layout constraint (`AnyObject`)
    Layout = 0x1F,
}

/// One generic requirement descriptor
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GenericRequirement {
    /// Address of the requirement record
    pub address: Address,
    /// Raw requirement flags
    pub flags: u32,
    /// Mangled name of the constrained parameter
    pub param: Option<Address>,
    /// Raw second operand: a relative pointer or a layout kind, depending on the kind
    pub content: i32,
}

impl GenericRequirement {
    /// The requirement kind, or `None` for kinds newer than this crate
    #[must_use]
    pub fn kind(&self) -> Option<GenericRequirementKind> {
        let bits = self.flags & 0x1F;
        GenericRequirementKind::iter().find(|kind| *kind as u32 == bits)
    }

    /// Whether the requirement contributes a witness table to the generic argument vector
    #[must_use]
    pub fn has_key_argument(&self) -> bool {
        self.flags & 0x80 != 0
    }

    /// Whether the constrained parameter is a pack
    #[must_use]
    pub fn is_pack_requirement(&self) -> bool {
        self.flags & 0x20 != 0
    }
}

/// One pack shape descriptor
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GenericPackShape {
    /// Metadata pack or witness table pack
    pub kind: u16,
    /// Index of the pack in the generic argument vector
    pub index: u16,
    /// Index of the shape class the pack belongs to
    pub shape_class: u16,
}

/// The decoded generic context of a declaration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericContext {
    /// Address of the generic context header
    pub header: Address,
    /// Number of generic parameters, including those of enclosing contexts
    pub num_params: u16,
    /// Number of generic requirements
    pub num_requirements: u16,
    /// Number of words of key arguments in the generic argument vector
    pub num_key_arguments: u16,
    /// Header flags
    pub flags: GenericContextFlags,
    /// Parameter descriptors
    pub params: Vec<GenericParam>,
    /// Requirement descriptors
    pub requirements: Vec<GenericRequirement>,
    /// Pack shape descriptors
    pub packs: Vec<GenericPackShape>,
    /// First address after all generic trailing objects
    pub end: Address,
}

impl GenericContext {
    /// Decodes a generic context whose base header starts at `header`.
    ///
    /// # Errors
    /// Returns an error if the context can not be read or declares more parameters or
    /// requirements than [`MAX_GENERIC_PARAMS`].
    pub fn decode(reader: &dyn MemoryReader, platform: Platform, header: Address) -> Result<Self> {
        let view = RawView::new(reader, platform, header);

        let num_params = view.read::<u16>(0)?;
        let num_requirements = view.read::<u16>(2)?;
        let num_key_arguments = view.read::<u16>(4)?;
        let flags = GenericContextFlags::from_bits_retain(view.read::<u16>(6)?);

        if num_params > MAX_GENERIC_PARAMS || num_requirements > MAX_GENERIC_PARAMS {
            return Err(malformed_error!(
                "Generic context at {} declares {} params and {} requirements",
                header,
                num_params,
                num_requirements
            ));
        }

        let mut cursor = descriptor::GENERIC_HEADER_SIZE;

        let params = view
            .read_bytes(cursor, usize::from(num_params))?
            .into_iter()
            .map(GenericParam)
            .collect();
        cursor = align4(cursor + u64::from(num_params));

        let requirements = read_requirements(&view, cursor, u64::from(num_requirements))?;
        cursor += u64::from(num_requirements) * descriptor::GENERIC_REQUIREMENT_SIZE;

        let mut packs = Vec::new();
        if flags.contains(GenericContextFlags::HAS_TYPE_PACKS) {
            let num_packs = view.read::<u16>(cursor)?;
            cursor += descriptor::GENERIC_PACK_HEADER_SIZE;

            for _ in 0..num_packs {
                packs.push(GenericPackShape {
                    kind: view.read::<u16>(cursor)?,
                    index: view.read::<u16>(cursor + 2)?,
                    shape_class: view.read::<u16>(cursor + 4)?,
                });
                cursor += descriptor::GENERIC_PACK_DESCRIPTOR_SIZE;
            }
        }

        if flags.contains(GenericContextFlags::HAS_CONDITIONAL_INVERTED_PROTOCOLS) {
            // A protocol set, one cumulative requirement count per protocol in the set,
            // then the requirements themselves.
            let protocols = view.read::<u16>(cursor)?;
            cursor += 2;

            let mut total = 0_u16;
            for _ in 0..protocols.count_ones() {
                total = view.read::<u16>(cursor)?;
                cursor += 2;
            }

            cursor = align4(cursor) + u64::from(total) * descriptor::GENERIC_REQUIREMENT_SIZE;
        }

        if flags.contains(GenericContextFlags::HAS_VALUES) {
            let num_values = view.read::<u32>(cursor)?;
            cursor += 4 + u64::from(num_values) * 4;
        }

        Ok(GenericContext {
            header,
            num_params,
            num_requirements,
            num_key_arguments,
            flags,
            params,
            requirements,
            packs,
            end: header.advance(cursor),
        })
    }

    /// Decodes the generic context of a type descriptor whose fixed part ends at
    /// `trailing`; the instantiation cache and default pattern precede the header.
    ///
    /// # Errors
    /// See [`GenericContext::decode`].
    pub fn decode_type(
        reader: &dyn MemoryReader,
        platform: Platform,
        trailing: Address,
    ) -> Result<Self> {
        Self::decode(
            reader,
            platform,
            trailing.advance(descriptor::TYPE_GENERIC_HEADER_PREFIX),
        )
    }

    /// Number of type parameters that occupy a slot in the generic argument vector
    #[must_use]
    pub fn num_key_params(&self) -> usize {
        self.params.iter().filter(|p| p.has_key_argument()).count()
    }
}

fn read_requirements(view: &RawView<'_>, start: u64, count: u64) -> Result<Vec<GenericRequirement>> {
    let mut requirements = Vec::with_capacity(count as usize);

    for index in 0..count {
        let record = view.advance(start + index * descriptor::GENERIC_REQUIREMENT_SIZE);
        requirements.push(GenericRequirement {
            address: record.address(),
            flags: record.read::<u32>(0)?,
            param: record.relative_direct(4)?,
            content: record.read::<i32>(8)?,
        });
    }

    Ok(requirements)
}

fn align4(offset: u64) -> u64 {
    (offset + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::Builder;

    #[test]
    fn two_params_one_requirement() {
        let mut builder = Builder::new(0x1000);
        let header = builder.here();
        builder.u16(2).u16(1).u16(3).u16(0);
        builder.bytes(&[0x80, 0x80]).align(4);
        builder.u32(0x80).i32(0).i32(0);
        let snapshot = builder.finish();

        let context = GenericContext::decode(&snapshot, Platform::LINUX_64, header).unwrap();
        assert_eq!(context.num_params, 2);
        assert_eq!(context.num_requirements, 1);
        assert_eq!(context.num_key_arguments, 3);
        assert_eq!(context.num_key_params(), 2);
        assert_eq!(context.params[0].kind(), Some(GenericParamKind::Type));
        assert_eq!(context.requirements[0].kind(), Some(GenericRequirementKind::Protocol));
        assert!(context.requirements[0].has_key_argument());
        assert_eq!(context.end, header.advance(8 + 4 + 12));
    }

    #[test]
    fn odd_param_count_is_padded() {
        let mut builder = Builder::new(0x1000);
        let header = builder.here();
        builder.u16(3).u16(0).u16(3).u16(0);
        builder.bytes(&[0x80; 3]).align(4);
        let snapshot = builder.finish();

        let context = GenericContext::decode(&snapshot, Platform::LINUX_64, header).unwrap();
        assert_eq!(context.params.len(), 3);
        assert_eq!(context.end, header.advance(12));
    }

    #[test]
    fn type_packs() {
        let mut builder = Builder::new(0x1000);
        let header = builder.here();
        builder.u16(1).u16(0).u16(2).u16(0x1);
        builder.bytes(&[0x81]).align(4);
        builder.u16(1).u16(1);
        builder.u16(0).u16(0).u16(0).u16(0);
        let snapshot = builder.finish();

        let context = GenericContext::decode(&snapshot, Platform::LINUX_64, header).unwrap();
        assert_eq!(context.params[0].kind(), Some(GenericParamKind::TypePack));
        assert_eq!(context.packs.len(), 1);
        assert_eq!(context.end, header.advance(8 + 4 + 4 + 8));
    }

    #[test]
    fn absurd_counts_rejected() {
        let mut builder = Builder::new(0x1000);
        let header = builder.here();
        builder.u16(0xFFFF).u16(0).u16(0).u16(0);
        let snapshot = builder.finish();

        assert!(GenericContext::decode(&snapshot, Platform::LINUX_64, header).is_err());
    }
}
