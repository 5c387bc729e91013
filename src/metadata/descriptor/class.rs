//! Class descriptors and class metadata bounds.
//!
//! A class descriptor is the largest of the type descriptors. After the common type fields
//! it records the metadata size (or, for classes inheriting from a resilient superclass, a
//! reference to bounds computed at runtime) and a sequence of optional trailing records in
//! fixed ABI order:
//!
//! 1. generic context (see [`crate::metadata::descriptor::GenericContext`])
//! 2. resilient superclass reference
//! 3. foreign or singleton metadata initialization
//! 4. vtable header and method descriptors
//! 5. override table header and override descriptors
//!
//! # Metadata bounds
//!
//! Class metadata grows in both directions from its address point. Each class appends its
//! *immediate members* (field offsets, generic arguments, vtable entries) after those of
//! its superclass. When the superclass is resilient its size is unknown at compile time, so
//! the position of a class's own members can only be found by walking the superclass chain
//! up to a class whose bounds are static. [`ClassDescriptor::metadata_bounds`] performs
//! that walk iteratively with a depth limit.

use crate::{
    file::MemoryReader,
    metadata::{
        address::Address,
        descriptor::ContextDescriptor,
        flags::{
            MetadataInitialization, MethodDescriptorFlags, MethodDescriptorKind, TypeContextFlags,
        },
        layout::{descriptor, Layout, Platform},
        pointer::TypeReferenceKind,
        view::RawView,
    },
    Error::RecursionLimit,
    Result,
};

/// Upper bound for vtable and override table sizes
pub const MAX_VTABLE_ENTRIES: u32 = 0x10000;

/// The extent of a class's metadata around its address point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassMetadataBounds {
    /// Byte offset of the class's immediate members from the address point
    pub immediate_members_offset: i64,
    /// Words before the address point
    pub negative_size: u32,
    /// Words from the address point onwards
    pub positive_size: u32,
}

impl ClassMetadataBounds {
    /// Bounds of a class without a Swift superclass: the heap metadata prefix and the
    /// class metadata header
    #[must_use]
    pub fn root(layout: &Layout) -> Self {
        let positive = layout.class_header_words();

        ClassMetadataBounds {
            immediate_members_offset: i64::from(positive) * layout.word as i64,
            negative_size: layout.class_prefix_words,
            positive_size: positive,
        }
    }

    /// Extends the bounds of a superclass by the immediate members of a subclass
    pub fn adjust_for_subclass(&mut self, are_members_negative: bool, num_members: u32, word: u64) {
        let word = word as i64;

        if are_members_negative {
            self.negative_size = self.negative_size.saturating_add(num_members);
            self.immediate_members_offset = -(i64::from(self.negative_size) * word);
        } else {
            self.immediate_members_offset = i64::from(self.positive_size) * word;
            self.positive_size = self.positive_size.saturating_add(num_members);
        }
    }

    /// Offset of the immediate members in words
    #[must_use]
    pub fn immediate_members_offset_in_words(&self, word: u64) -> i64 {
        self.immediate_members_offset / word as i64
    }
}

/// How the size of a class's metadata is recorded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClassMetadataSize {
    /// Bounds are known statically
    Static {
        /// Words before the address point
        negative_size: u32,
        /// Words from the address point onwards
        positive_size: u32,
    },
    /// The superclass is resilient; the runtime computes and stores the bounds
    Resilient {
        /// Cache the runtime fills with the computed bounds
        stored_bounds: Option<Address>,
        /// Extra class flags
        extra_flags: u32,
    },
}

/// The resilient superclass record of a class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResilientSuperclass {
    /// How the superclass is referenced
    pub kind: TypeReferenceKind,
    /// Raw target of the reference
    pub reference: Option<Address>,
    /// Context descriptor of the superclass, when it is a Swift class
    pub descriptor: Option<Address>,
}

/// A vtable method descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodDescriptor {
    /// Address of the descriptor
    pub address: Address,
    /// Method flags
    pub flags: MethodDescriptorFlags,
    /// Implementation, if the method is not abstract
    pub implementation: Option<Address>,
}

impl MethodDescriptor {
    /// The method kind
    #[must_use]
    pub fn kind(&self) -> Option<MethodDescriptorKind> {
        self.flags.kind()
    }
}

/// The vtable header of a class descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VTableHeader {
    /// Offset of the class's own vtable in its metadata, in words; relative to the
    /// immediate members when the superclass is resilient
    pub vtable_offset: u32,
    /// Number of vtable entries introduced by the class
    pub vtable_size: u32,
    /// Address of the first method descriptor
    pub methods: Address,
}

/// An entry of a class's override table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MethodOverrideDescriptor {
    /// Address of the descriptor
    pub address: Address,
    /// Context descriptor of the class declaring the overridden method
    pub class: Option<Address>,
    /// Method descriptor of the overridden method
    pub method: Option<Address>,
    /// Implementation of the override
    pub implementation: Option<Address>,
}

/// The class-specific part of a type context descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassDescriptor {
    /// Kind-specific flags of the class
    pub flags: TypeContextFlags,
    /// Mangled name of the superclass type, not resolved
    pub superclass_type: Option<Address>,
    /// Metadata size or resilient bounds reference
    pub metadata_size: ClassMetadataSize,
    /// Number of words of immediate members: field offsets, generic arguments, vtable
    pub num_immediate_members: u32,
    /// Number of stored properties
    pub num_fields: u32,
    /// Offset of the field offset vector in words, relative to the immediate members when
    /// the superclass is resilient
    pub field_offset_vector_offset: u32,
    /// Resilient superclass record
    pub resilient_superclass: Option<ResilientSuperclass>,
    /// VTable header
    pub vtable: Option<VTableHeader>,
    /// Number and location of override table entries
    pub overrides: Option<(u32, Address)>,
}

impl ClassDescriptor {
    /// Decodes the class fields of the descriptor viewed by `view`; `trailing` is the first
    /// address after its generic context.
    pub(crate) fn decode(view: &RawView<'_>, flags: TypeContextFlags, trailing: Address) -> Result<Self> {
        let superclass_type = view.relative_direct(descriptor::CLASS_SUPERCLASS_TYPE)?;

        let metadata_size = if flags.contains(TypeContextFlags::CLASS_HAS_RESILIENT_SUPERCLASS) {
            ClassMetadataSize::Resilient {
                stored_bounds: view.relative_direct(descriptor::CLASS_METADATA_NEGATIVE_SIZE)?,
                extra_flags: view.read::<u32>(descriptor::CLASS_METADATA_POSITIVE_SIZE)?,
            }
        } else {
            ClassMetadataSize::Static {
                negative_size: view.read::<u32>(descriptor::CLASS_METADATA_NEGATIVE_SIZE)?,
                positive_size: view.read::<u32>(descriptor::CLASS_METADATA_POSITIVE_SIZE)?,
            }
        };

        let mut trailer = view.at(trailing);

        let resilient_superclass = if flags.contains(TypeContextFlags::CLASS_HAS_RESILIENT_SUPERCLASS) {
            let kind = flags.resilient_superclass_reference_kind();
            let reference = trailer.relative_direct(0)?;
            let descriptor = match (kind, reference) {
                (TypeReferenceKind::DirectTypeDescriptor, Some(target)) => Some(target),
                (TypeReferenceKind::IndirectTypeDescriptor, Some(slot)) => trailer.at(slot).read_pointer(0)?,
                _ => None,
            };

            trailer = trailer.advance(descriptor::RESILIENT_SUPERCLASS_SIZE);
            Some(ResilientSuperclass {
                kind,
                reference,
                descriptor,
            })
        } else {
            None
        };

        trailer = match flags.metadata_initialization() {
            MetadataInitialization::None => trailer,
            MetadataInitialization::Foreign => trailer.advance(descriptor::FOREIGN_INITIALIZATION_SIZE),
            MetadataInitialization::Singleton => trailer.advance(descriptor::SINGLETON_INITIALIZATION_SIZE),
        };

        let vtable = if flags.contains(TypeContextFlags::CLASS_HAS_VTABLE) {
            let header = VTableHeader {
                vtable_offset: trailer.read::<u32>(0)?,
                vtable_size: trailer.read::<u32>(4)?,
                methods: trailer.address().advance(descriptor::VTABLE_HEADER_SIZE),
            };
            check_table_size(header.vtable_size, trailer.address())?;

            trailer = trailer.advance(
                descriptor::VTABLE_HEADER_SIZE
                    + u64::from(header.vtable_size) * descriptor::METHOD_DESCRIPTOR_SIZE,
            );
            Some(header)
        } else {
            None
        };

        let overrides = if flags.contains(TypeContextFlags::CLASS_HAS_OVERRIDE_TABLE) {
            let count = trailer.read::<u32>(0)?;
            check_table_size(count, trailer.address())?;
            Some((
                count,
                trailer.address().advance(descriptor::OVERRIDE_TABLE_HEADER_SIZE),
            ))
        } else {
            None
        };

        Ok(ClassDescriptor {
            flags,
            superclass_type,
            metadata_size,
            num_immediate_members: view.read::<u32>(descriptor::CLASS_NUM_IMMEDIATE_MEMBERS)?,
            num_fields: view.read::<u32>(descriptor::CLASS_NUM_FIELDS)?,
            field_offset_vector_offset: view.read::<u32>(descriptor::CLASS_FIELD_OFFSET_VECTOR_OFFSET)?,
            resilient_superclass,
            vtable,
            overrides,
        })
    }

    /// Whether the superclass is resilient
    #[must_use]
    pub fn has_resilient_superclass(&self) -> bool {
        self.flags
            .contains(TypeContextFlags::CLASS_HAS_RESILIENT_SUPERCLASS)
    }

    /// Whether immediate members are laid out before the address point
    #[must_use]
    pub fn are_immediate_members_negative(&self) -> bool {
        self.flags
            .contains(TypeContextFlags::CLASS_ARE_IMMEDIATE_MEMBERS_NEGATIVE)
    }

    /// Bounds recorded in the descriptor, or `None` if the superclass is resilient
    #[must_use]
    pub fn static_bounds(&self, word: u64) -> Option<ClassMetadataBounds> {
        let ClassMetadataSize::Static {
            negative_size,
            positive_size,
        } = self.metadata_size
        else {
            return None;
        };

        let offset_in_words = if self.are_immediate_members_negative() {
            -i64::from(negative_size)
        } else {
            i64::from(positive_size) - i64::from(self.num_immediate_members)
        };

        Some(ClassMetadataBounds {
            immediate_members_offset: offset_in_words * word as i64,
            negative_size,
            positive_size,
        })
    }

    /// Computes the metadata bounds of the class.
    ///
    /// Without a resilient superclass these are the descriptor's static bounds. Otherwise
    /// the chain of resilient superclasses is collected up to the first class with static
    /// bounds, or to a root (an Objective-C or absent superclass), and each class's
    /// immediate members are added from the root down.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] if more than `max_depth` resilient
    /// superclasses are chained, or an error if a superclass descriptor can not be decoded.
    pub fn metadata_bounds(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
        max_depth: usize,
    ) -> Result<ClassMetadataBounds> {
        let layout = platform.layout();
        if let Some(bounds) = self.static_bounds(layout.word) {
            return Ok(bounds);
        }

        let mut chain = vec![(self.are_immediate_members_negative(), self.num_immediate_members)];
        let mut next = self.resilient_superclass.and_then(|s| s.descriptor);

        let mut bounds = loop {
            let Some(address) = next else {
                break ClassMetadataBounds::root(&layout);
            };

            if chain.len() > max_depth {
                return Err(RecursionLimit(max_depth));
            }

            let superclass = ContextDescriptor::decode(reader, platform, address)?;
            let Some(class) = superclass.class() else {
                return Err(malformed_error!(
                    "Resilient superclass {} is not a class descriptor",
                    address
                ));
            };

            if let Some(bounds) = class.static_bounds(layout.word) {
                break bounds;
            }

            chain.push((class.are_immediate_members_negative(), class.num_immediate_members));
            next = class.resilient_superclass.and_then(|s| s.descriptor);
        };

        for (negative, members) in chain.into_iter().rev() {
            bounds.adjust_for_subclass(negative, members, layout.word);
        }

        Ok(bounds)
    }

    /// Offset of the generic argument vector from the metadata address point, in words
    #[must_use]
    pub fn generic_argument_offset(&self, bounds: &ClassMetadataBounds, word: u64) -> i64 {
        bounds.immediate_members_offset_in_words(word)
    }

    /// Offset of the field offset vector from the metadata address point, in words
    #[must_use]
    pub fn effective_field_offset_vector_offset(&self, bounds: &ClassMetadataBounds, word: u64) -> i64 {
        if self.has_resilient_superclass() {
            bounds.immediate_members_offset_in_words(word) + i64::from(self.field_offset_vector_offset)
        } else {
            i64::from(self.field_offset_vector_offset)
        }
    }

    /// Offset of the class's own vtable entries from the metadata address point, in words
    #[must_use]
    pub fn effective_vtable_offset(&self, bounds: &ClassMetadataBounds, word: u64) -> Option<i64> {
        let vtable = self.vtable?;

        if self.has_resilient_superclass() {
            Some(bounds.immediate_members_offset_in_words(word) + i64::from(vtable.vtable_offset))
        } else {
            Some(i64::from(vtable.vtable_offset))
        }
    }

    /// Decodes the method descriptors of the class's own vtable entries.
    ///
    /// # Errors
    /// Returns an error if a descriptor can not be read.
    pub fn methods(&self, reader: &dyn MemoryReader, platform: Platform) -> Result<Vec<MethodDescriptor>> {
        let Some(vtable) = self.vtable else {
            return Ok(Vec::new());
        };

        (0..u64::from(vtable.vtable_size))
            .map(|index| {
                let view = RawView::new(
                    reader,
                    platform,
                    vtable.methods.advance(index * descriptor::METHOD_DESCRIPTOR_SIZE),
                );

                Ok(MethodDescriptor {
                    address: view.address(),
                    flags: MethodDescriptorFlags::from_bits_retain(view.read::<u32>(0)?),
                    implementation: view.relative_direct(4)?,
                })
            })
            .collect()
    }

    /// Decodes the override table.
    ///
    /// # Errors
    /// Returns an error if an entry can not be read.
    pub fn method_overrides(
        &self,
        reader: &dyn MemoryReader,
        platform: Platform,
    ) -> Result<Vec<MethodOverrideDescriptor>> {
        let Some((count, first)) = self.overrides else {
            return Ok(Vec::new());
        };

        (0..u64::from(count))
            .map(|index| {
                let view = RawView::new(
                    reader,
                    platform,
                    first.advance(index * descriptor::METHOD_OVERRIDE_SIZE),
                );

                Ok(MethodOverrideDescriptor {
                    address: view.address(),
                    class: view.relative_indirectable(0)?,
                    method: view.relative_indirectable(4)?,
                    implementation: view.relative_direct(8)?,
                })
            })
            .collect()
    }
}

fn check_table_size(count: u32, at: Address) -> Result<()> {
    if count > MAX_VTABLE_ENTRIES {
        return Err(malformed_error!("Table at {} claims {} entries", at, count));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_bounds() {
        let bounds = ClassMetadataBounds::root(&Platform::APPLE_64.layout());
        assert_eq!(bounds.negative_size, 2);
        assert_eq!(bounds.positive_size, 10);
        assert_eq!(bounds.immediate_members_offset, 80);

        let bounds = ClassMetadataBounds::root(&Platform::LINUX_64.layout());
        assert_eq!(bounds.positive_size, 7);
        assert_eq!(bounds.immediate_members_offset, 56);
    }

    #[test]
    fn adjust_positive() {
        let mut bounds = ClassMetadataBounds::root(&Platform::APPLE_64.layout());
        bounds.adjust_for_subclass(false, 3, 8);
        assert_eq!(bounds.immediate_members_offset, 80);
        assert_eq!(bounds.positive_size, 13);

        bounds.adjust_for_subclass(false, 2, 8);
        assert_eq!(bounds.immediate_members_offset, 104);
        assert_eq!(bounds.positive_size, 15);
        assert_eq!(bounds.immediate_members_offset_in_words(8), 13);
    }

    #[test]
    fn adjust_negative() {
        let mut bounds = ClassMetadataBounds::root(&Platform::LINUX_64.layout());
        bounds.adjust_for_subclass(true, 4, 8);
        assert_eq!(bounds.negative_size, 6);
        assert_eq!(bounds.immediate_members_offset, -48);
        assert_eq!(bounds.positive_size, 7);
    }
}
