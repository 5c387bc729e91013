//! Class metadata and vtables.

use std::fmt;

use crate::{
    file::MemoryReader,
    metadata::{
        address::{Address, TypeHandle},
        descriptor::{ClassDescriptor, ClassMetadataBounds, ContextDescriptor, MethodDescriptor},
        flags::ClassFlags,
        kind::MetadataKind,
        layout::Platform,
        types::{Metadata, MetadataBase, ValueWitnessTable},
        view::RawView,
    },
    Result,
};

/// Metadata of a class.
///
/// On platforms with Objective-C interop the record starts with an Objective-C class
/// object; see [`crate::ObjectModel`].
#[derive(Clone, Copy, Debug)]
pub struct ClassMetadata<'r> {
    pub(super) base: MetadataBase<'r>,
}

impl<'r> ClassMetadata<'r> {
    pub(super) fn new(base: MetadataBase<'r>) -> Self {
        ClassMetadata { base }
    }

    /// The metadata kind, always [`MetadataKind::Class`]
    #[must_use]
    pub fn kind(&self) -> MetadataKind {
        self.base.kind
    }

    /// The originating type handle
    #[must_use]
    pub fn handle(&self) -> TypeHandle {
        self.base.handle
    }

    fn platform(&self) -> Platform {
        self.base.reflector().platform()
    }

    fn reader(&self) -> &'r dyn MemoryReader {
        self.base.reflector().reader()
    }

    /// The isa pointer; `None` on platforms without an Objective-C object header.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn isa_pointer(&self) -> Result<Option<Address>> {
        if !self
            .base
            .reflector()
            .object_model()
            .has_isa_header(self.platform())
        {
            return Ok(None);
        }

        self.base.view().read_pointer(0)
    }

    /// Whether the class is defined in Swift, as opposed to a pure Objective-C class whose
    /// Swift fields are meaningless.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn is_swift_class(&self) -> Result<bool> {
        self.base.reflector().object_model().is_swift_class(
            self.reader(),
            self.platform(),
            self.handle().metadata_address(),
        )
    }

    /// The superclass metadata recorded in the class metadata.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn superclass(&self) -> Result<Option<TypeHandle>> {
        let layout = self.platform().layout();
        Ok(self
            .base
            .view()
            .read_pointer(layout.class_superclass)?
            .map(TypeHandle::new))
    }

    /// Class flags.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn flags(&self) -> Result<ClassFlags> {
        let layout = self.platform().layout();
        Ok(ClassFlags::from_bits_retain(
            self.base.view().read::<u32>(layout.class_flags)?,
        ))
    }

    /// Offset of the address point inside an instance.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn instance_address_point(&self) -> Result<u32> {
        let layout = self.platform().layout();
        self.base.view().read::<u32>(layout.class_instance_address_point)
    }

    /// Size of an instance in bytes, including the object header.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn instance_size(&self) -> Result<u32> {
        let layout = self.platform().layout();
        self.base.view().read::<u32>(layout.class_instance_size)
    }

    /// Alignment mask of an instance.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn instance_alignment_mask(&self) -> Result<u16> {
        let layout = self.platform().layout();
        self.base
            .view()
            .read::<u16>(layout.class_instance_alignment_mask)
    }

    /// Total size of the metadata object in bytes, including the prefix before the
    /// address point.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn class_size(&self) -> Result<u32> {
        let layout = self.platform().layout();
        self.base.view().read::<u32>(layout.class_size)
    }

    /// Offset of the address point inside the metadata object, in bytes.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn class_address_point(&self) -> Result<u32> {
        let layout = self.platform().layout();
        self.base.view().read::<u32>(layout.class_address_point)
    }

    /// Address of the nominal type descriptor; `None` for Objective-C classes.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn description(&self) -> Result<Option<Address>> {
        if !self.is_swift_class()? {
            return Ok(None);
        }

        let layout = self.platform().layout();
        self.base.view().read_pointer(layout.class_description)
    }

    /// The instance variable destroyer.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn ivar_destroyer(&self) -> Result<Option<Address>> {
        let layout = self.platform().layout();
        self.base.view().read_pointer(layout.class_ivar_destroyer)
    }

    /// The class's context descriptor; `None` for Objective-C classes.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn descriptor(&self) -> Result<Option<ContextDescriptor>> {
        self.base.decode_descriptor(self.description()?)
    }

    fn class_descriptor(&self) -> Result<Option<ClassDescriptor>> {
        Ok(self
            .descriptor()?
            .and_then(|descriptor| descriptor.class().cloned()))
    }

    /// Number of stored properties; zero without a descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn num_fields(&self) -> Result<u32> {
        Ok(self.class_descriptor()?.map_or(0, |class| class.num_fields))
    }

    /// Number of words the class adds to its superclass's metadata: generic arguments,
    /// field offsets and vtable entries of its own members. Zero without a descriptor.
    ///
    /// # Errors
    /// Returns an error if the descriptor can not be decoded.
    pub fn num_members(&self) -> Result<u32> {
        Ok(self
            .class_descriptor()?
            .map_or(0, |class| class.num_immediate_members))
    }

    fn bounds_of(&self, class: &ClassDescriptor) -> Result<ClassMetadataBounds> {
        let reflector = self.base.reflector();
        class.metadata_bounds(
            reflector.reader(),
            reflector.platform(),
            reflector.config().max_superclass_depth,
        )
    }

    /// The metadata bounds, walking resilient superclasses as needed; `None` without a
    /// descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] if the resilient superclass chain is too
    /// deep, or an error if a descriptor can not be decoded.
    pub fn bounds(&self) -> Result<Option<ClassMetadataBounds>> {
        self.class_descriptor()?
            .map(|class| self.bounds_of(&class))
            .transpose()
    }

    fn word_offset(&self, words: i64) -> Address {
        let word = self.platform().word() as i64;
        self.handle().metadata_address().offset(words * word)
    }

    pub(super) fn generic_argument_pointer_of(&self, descriptor: &ContextDescriptor) -> Result<Option<Address>> {
        let Some(class) = descriptor.class() else {
            return Ok(None);
        };

        let bounds = self.bounds_of(class)?;
        let offset = class.generic_argument_offset(&bounds, self.platform().word());
        Ok(Some(self.word_offset(offset)))
    }

    /// Address of the generic argument vector; `None` if the class is not generic.
    ///
    /// # Errors
    /// See [`ClassMetadata::bounds`].
    pub fn generic_argument_pointer(&self) -> Result<Option<Address>> {
        match self.descriptor()? {
            Some(descriptor) if descriptor.is_generic() => self.generic_argument_pointer_of(&descriptor),
            _ => Ok(None),
        }
    }

    /// Byte offsets of the stored properties from the start of an instance.
    ///
    /// # Errors
    /// Returns an error if the descriptor, the bounds or the field offset vector can not
    /// be read.
    pub fn field_offsets(&self) -> Result<Vec<u64>> {
        let Some(class) = self.class_descriptor()? else {
            return Ok(Vec::new());
        };
        if class.num_fields == 0 {
            return Ok(Vec::new());
        }

        let word = self.platform().word();
        let bounds = self.bounds_of(&class)?;
        let vector = RawView::new(
            self.reader(),
            self.platform(),
            self.word_offset(class.effective_field_offset_vector_offset(&bounds, word)),
        );

        (0..u64::from(class.num_fields))
            .map(|index| vector.read_word(index * word))
            .collect()
    }

    /// The superclass: the metadata's superclass pointer, or, if that is null, the type
    /// the descriptor's superclass mangled name resolves to.
    ///
    /// # Errors
    /// Returns an error if the metadata, the descriptor or the mangled name can not be
    /// read.
    pub fn superclass_type(&self) -> Result<Option<TypeHandle>> {
        if let Some(superclass) = self.superclass()? {
            return Ok(Some(superclass));
        }

        let Some(descriptor) = self.descriptor()? else {
            return Ok(None);
        };
        let Some(name) = descriptor.class().and_then(|class| class.superclass_type) else {
            return Ok(None);
        };

        Metadata::Class(*self).type_of_in(Some(&descriptor), name)
    }

    /// All words from the end of the class header to the end of the metadata object:
    /// the members of every class in the hierarchy.
    ///
    /// # Errors
    /// Returns an error if the metadata can not be read.
    pub fn vtable(&self) -> Result<VTable<'r>> {
        let layout = self.platform().layout();
        let base = self.handle().metadata_address();

        let start = base.advance(layout.class_header_size);
        let end = base
            .offset(-i64::from(self.class_address_point()?))
            .advance(u64::from(self.class_size()?));

        Ok(VTable {
            reader: self.reader(),
            platform: self.platform(),
            start,
            end: end.max(start),
        })
    }

    /// The class's own vtable entries, paired with their method descriptors.
    ///
    /// # Errors
    /// Returns an error if the descriptor, the bounds or a slot can not be read.
    pub fn methods(&self) -> Result<Vec<VTableMethod>> {
        let Some(class) = self.class_descriptor()? else {
            return Ok(Vec::new());
        };

        let word = self.platform().word();
        let bounds = self.bounds_of(&class)?;
        let Some(offset) = class.effective_vtable_offset(&bounds, word) else {
            return Ok(Vec::new());
        };

        let descriptors = class.methods(self.reader(), self.platform())?;
        let first = self.word_offset(offset);

        descriptors
            .into_iter()
            .enumerate()
            .map(|(index, descriptor)| {
                let slot = first.advance(index as u64 * word);
                Ok(VTableMethod {
                    descriptor,
                    slot: VTableSlot::read(self.reader(), self.platform(), slot)?,
                })
            })
            .collect()
    }

    /// The value witness table.
    ///
    /// # Errors
    /// Returns an error if the table pointer is null or the table can not be read.
    pub fn vwt(&self) -> Result<ValueWitnessTable> {
        self.base.vwt()
    }
}

/// One word of a class's vtable region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VTableSlot {
    /// Address of the slot
    pub address: Address,
    /// Contents of the slot
    pub function: Option<Address>,
}

impl VTableSlot {
    fn read(reader: &dyn MemoryReader, platform: Platform, address: Address) -> Result<Self> {
        Ok(VTableSlot {
            address,
            function: RawView::new(reader, platform, address).read_pointer(0)?,
        })
    }
}

/// A vtable entry declared by the class itself
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VTableMethod {
    /// The method descriptor in the class's context descriptor
    pub descriptor: MethodDescriptor,
    /// The slot in the metadata
    pub slot: VTableSlot,
}

/// The vtable region of class metadata.
///
/// Iterating reads the slots lazily; every call to [`VTable::iter`] starts over from the
/// first slot.
#[derive(Clone, Copy)]
pub struct VTable<'r> {
    reader: &'r dyn MemoryReader,
    platform: Platform,
    start: Address,
    end: Address,
}

impl<'r> VTable<'r> {
    /// Number of slots
    #[must_use]
    pub fn len(&self) -> usize {
        (self.end.distance_from(self.start).unwrap_or(0) / self.platform.word()) as usize
    }

    /// Returns `true` if the region holds no slot
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the slot at `index`; `None` past the end.
    ///
    /// # Errors
    /// Returns an error if the slot can not be read.
    pub fn get(&self, index: usize) -> Result<Option<VTableSlot>> {
        if index >= self.len() {
            return Ok(None);
        }

        let address = self.start.advance(index as u64 * self.platform.word());
        VTableSlot::read(self.reader, self.platform, address).map(Some)
    }

    /// Iterates over the slots from the first
    #[must_use]
    pub fn iter(&self) -> VTableIter<'r> {
        VTableIter {
            table: *self,
            next: 0,
        }
    }
}

impl fmt::Debug for VTable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VTable")
            .field("start", &self.start)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}

impl<'r> IntoIterator for &VTable<'r> {
    type Item = Result<VTableSlot>;
    type IntoIter = VTableIter<'r>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the slots of a [`VTable`]
#[derive(Debug)]
pub struct VTableIter<'r> {
    table: VTable<'r>,
    next: usize,
}

impl Iterator for VTableIter<'_> {
    type Item = Result<VTableSlot>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.table.get(self.next).transpose()?;
        self.next += 1;
        Some(slot)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::{
        metadata::{
            address::{Address, TypeHandle},
            config::ReflectionConfig,
            layout::Platform,
            mangling::SymbolicResolver,
            pointer::TypeReferenceKind,
            reflector::Reflector,
        },
        test::factories::{Builder, ClassMetadataSpec, ClassSpec, TypeSpec},
        Error,
    };

    #[test]
    fn two_field_class() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let init = builder.here();
        builder.u32(0);
        let method = builder.here();
        builder.u32(0);

        // Two stored properties, an initializer and a method: four members
        let boat = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Boat",
                num_fields: 2,
                field_offset_vector_offset: 7,
                ..Default::default()
            },
            negative_size: 2,
            positive_size: 11,
            num_immediate_members: 4,
            vtable_offset: 9,
            methods: vec![(0x11, Some(init)), (0x10, Some(method))],
            ..Default::default()
        });
        let vwt = builder.vwt(8, 8, 0x0001_0007, 0x7FFF_FFFF);
        let metadata = builder.class_metadata(&ClassMetadataSpec {
            vwt: Some(vwt),
            flags: 0x2,
            instance_address_point: 0,
            instance_size: 48,
            instance_alignment_mask: 7,
            descriptor: Some(boat),
            members: vec![16, 32, 0xA000, 0xB000],
            ..Default::default()
        });
        let snapshot = builder.finish();

        let reflector = Reflector::builder(snapshot).platform(Platform::LINUX_64).build();
        let reflected = reflector.reflect_address(metadata).unwrap();
        let class = reflected.as_class().unwrap();

        assert_eq!(reflected.field_offsets().unwrap(), [16, 32]);
        assert_eq!(class.num_fields().unwrap(), 2);
        assert_eq!(class.num_members().unwrap(), 4);
        assert_eq!(class.instance_size().unwrap(), 48);
        assert_eq!(class.instance_alignment_mask().unwrap(), 7);
        assert_eq!(class.class_address_point().unwrap(), 16);
        assert_eq!(class.class_size().unwrap(), 16 + 56 + 32);
        assert_eq!(class.isa_pointer().unwrap(), None);
        assert!(class.is_swift_class().unwrap());
        assert_eq!(class.superclass().unwrap(), None);
        assert_eq!(class.ivar_destroyer().unwrap(), Some(Address(0xE000)));
        assert!(class
            .flags()
            .unwrap()
            .contains(crate::metadata::flags::ClassFlags::USES_SWIFT_REFCOUNTING));

        let vwt = class.vwt().unwrap();
        assert_eq!((vwt.size, vwt.stride, vwt.flags.bits()), (8, 8, 0x10007));

        let vtable = class.vtable().unwrap();
        assert_eq!(vtable.len(), 4);
        let slots: Vec<_> = vtable.iter().map(|slot| slot.unwrap().function).collect();
        assert_eq!(
            slots,
            [Some(Address(16)), Some(Address(32)), Some(Address(0xA000)), Some(Address(0xB000))]
        );
        // Restartable
        assert_eq!(vtable.iter().count(), 4);
        assert_eq!(vtable.get(4).unwrap(), None);

        let methods = class.methods().unwrap();
        assert_eq!(methods.len(), 2);
        assert_eq!(methods[0].slot.address, metadata.advance(72));
        assert_eq!(methods[0].slot.function, Some(Address(0xA000)));
        assert_eq!(methods[1].descriptor.implementation, Some(method));
    }

    #[test]
    fn members_count_fields_initializers_and_methods() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let init = builder.here();
        builder.u32(0);
        let sail = builder.here();
        builder.u32(0);

        let dinghy = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Dinghy",
                num_fields: 1,
                field_offset_vector_offset: 7,
                ..Default::default()
            },
            negative_size: 2,
            positive_size: 10,
            num_immediate_members: 3,
            vtable_offset: 8,
            methods: vec![(0x11, Some(init)), (0x10, Some(sail))],
            ..Default::default()
        });
        let metadata = builder.class_metadata(&ClassMetadataSpec {
            flags: 0x2,
            instance_size: 24,
            instance_alignment_mask: 7,
            descriptor: Some(dinghy),
            members: vec![16, 0xA000, 0xB000],
            ..Default::default()
        });
        let snapshot = builder.finish();

        let reflector = Reflector::builder(snapshot).platform(Platform::LINUX_64).build();
        let reflected = reflector.reflect_address(metadata).unwrap();
        let class = reflected.as_class().unwrap();

        assert_eq!(class.num_fields().unwrap(), 1);
        assert_eq!(class.num_members().unwrap(), 3);
        assert_eq!(reflected.field_offsets().unwrap(), [16]);
        assert_eq!(class.methods().unwrap().len(), 2);
    }

    #[test]
    fn generic_arguments_after_generic_superclass() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");

        // Root <- Mid<A, B> <- Leaf<X>: Mid adds two generic arguments, Leaf one
        let leaf = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Leaf",
                generic_params: 1,
                ..Default::default()
            },
            negative_size: 2,
            positive_size: 10,
            num_immediate_members: 1,
            ..Default::default()
        });
        let vwt = builder.vwt(8, 8, 0x0001_0007, 0);
        let metadata = builder.class_metadata(&ClassMetadataSpec {
            vwt: Some(vwt),
            superclass: Some(Address(0x9000)),
            descriptor: Some(leaf),
            members: vec![0xA1, 0xA2, 0xC0],
            ..Default::default()
        });
        let snapshot = builder.finish();

        let reflector = Reflector::builder(snapshot).platform(Platform::LINUX_64).build();
        let reflected = reflector.reflect_address(metadata).unwrap();

        assert_eq!(
            reflected.generic_argument_pointer().unwrap(),
            Some(metadata.advance(9 * 8))
        );
        assert_eq!(reflected.generic_types().unwrap(), [TypeHandle::new(Address(0xC0))]);
        assert_eq!(
            reflected.as_class().unwrap().superclass_type().unwrap(),
            Some(TypeHandle::new(Address(0x9000)))
        );
    }

    #[test]
    fn resilient_superclass_chain() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let root = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Root",
                ..Default::default()
            },
            negative_size: 2,
            positive_size: 9,
            num_immediate_members: 2,
            ..Default::default()
        });
        let root_name = builder.symbolic_ref(root);
        let leaf = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Leaf",
                num_fields: 1,
                field_offset_vector_offset: 1,
                generic_params: 1,
                ..Default::default()
            },
            superclass_name: Some(root_name),
            num_immediate_members: 2,
            resilient_superclass: Some((TypeReferenceKind::DirectTypeDescriptor, root)),
            ..Default::default()
        });
        let vwt = builder.vwt(8, 8, 0x0001_0007, 0);
        let root_metadata = builder.class_metadata(&ClassMetadataSpec {
            vwt: Some(vwt),
            descriptor: Some(root),
            members: vec![16, 24],
            ..Default::default()
        });
        let leaf_metadata = builder.class_metadata(&ClassMetadataSpec {
            vwt: Some(vwt),
            descriptor: Some(leaf),
            members: vec![16, 24, 0xC0, 32],
            ..Default::default()
        });
        let snapshot = builder.finish();

        let resolver = Arc::new(SymbolicResolver::new());
        resolver.register_context(root, TypeHandle::new(root_metadata));
        let reflector = Reflector::builder(snapshot)
            .platform(Platform::LINUX_64)
            .resolver(resolver)
            .build();

        let reflected = reflector.reflect_address(leaf_metadata).unwrap();
        let class = reflected.as_class().unwrap();

        let bounds = class.bounds().unwrap().unwrap();
        assert_eq!(bounds.positive_size, 11);
        assert_eq!(bounds.immediate_members_offset, 9 * 8);

        // Leaf's members: generic argument, then its field offset vector
        assert_eq!(reflected.generic_types().unwrap(), [TypeHandle::new(Address(0xC0))]);
        assert_eq!(reflected.field_offsets().unwrap(), [32]);
        assert_eq!(
            class.superclass_type().unwrap(),
            Some(TypeHandle::new(root_metadata))
        );
        assert_eq!(reflector.names().cache().len(), 1);
    }

    #[test]
    fn two_level_resilient_chain() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");

        // Root (static) <- Mid<A, B> (resilient) <- Leaf<X> (resilient)
        let root = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Root",
                ..Default::default()
            },
            negative_size: 2,
            positive_size: 9,
            num_immediate_members: 2,
            ..Default::default()
        });
        let mid = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Mid",
                generic_params: 2,
                ..Default::default()
            },
            num_immediate_members: 2,
            resilient_superclass: Some((TypeReferenceKind::DirectTypeDescriptor, root)),
            ..Default::default()
        });
        let leaf = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Leaf",
                num_fields: 1,
                field_offset_vector_offset: 1,
                generic_params: 1,
                ..Default::default()
            },
            num_immediate_members: 2,
            resilient_superclass: Some((TypeReferenceKind::DirectTypeDescriptor, mid)),
            ..Default::default()
        });
        let vwt = builder.vwt(8, 8, 0x0001_0007, 0);
        let metadata = builder.class_metadata(&ClassMetadataSpec {
            vwt: Some(vwt),
            descriptor: Some(leaf),
            members: vec![16, 24, 0xA1, 0xA2, 0xC0, 40],
            ..Default::default()
        });
        let snapshot = builder.finish();

        let reflector = Reflector::builder(snapshot).platform(Platform::LINUX_64).build();
        let reflected = reflector.reflect_address(metadata).unwrap();

        let bounds = reflected.as_class().unwrap().bounds().unwrap().unwrap();
        assert_eq!(bounds.immediate_members_offset, 11 * 8);
        assert_eq!(bounds.positive_size, 13);

        assert_eq!(
            reflected.generic_argument_pointer().unwrap(),
            Some(metadata.advance(11 * 8))
        );
        assert_eq!(reflected.generic_types().unwrap(), [TypeHandle::new(Address(0xC0))]);
        assert_eq!(reflected.field_offsets().unwrap(), [40]);
    }

    #[test]
    fn superclass_chain_too_deep() {
        let mut builder = Builder::new(0x1000);
        let module = builder.module("Boats");
        let base = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Base",
                ..Default::default()
            },
            negative_size: 2,
            positive_size: 7,
            ..Default::default()
        });
        let middle = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Middle",
                ..Default::default()
            },
            num_immediate_members: 1,
            resilient_superclass: Some((TypeReferenceKind::DirectTypeDescriptor, base)),
            ..Default::default()
        });
        let leaf = builder.class_descriptor(&ClassSpec {
            ty: TypeSpec {
                parent: Some(module),
                name: "Leaf",
                generic_params: 1,
                ..Default::default()
            },
            num_immediate_members: 1,
            resilient_superclass: Some((TypeReferenceKind::DirectTypeDescriptor, middle)),
            ..Default::default()
        });
        let metadata = builder.class_metadata(&ClassMetadataSpec {
            descriptor: Some(leaf),
            members: vec![0xB0, 0xC0],
            ..Default::default()
        });
        let snapshot = builder.finish();

        let reflector = Reflector::builder(snapshot)
            .config(ReflectionConfig {
                max_superclass_depth: 1,
                ..ReflectionConfig::for_platform(Platform::LINUX_64)
            })
            .build();
        let reflected = reflector.reflect_address(metadata).unwrap();

        assert!(matches!(
            reflected.generic_types(),
            Err(Error::RecursionLimit(1))
        ));
    }
}
