//! Defines the [`Slab`] struct and the slot layout.
//!
//! A slab is one fixed-size region obtained from a [`Provider`], cut into
//! `max` equal slots. Every slot is laid out as
//! ```text
//! +----------------------+-----------+
//! | object (obj_size)    | SlotMeta  |
//! +----------------------+-----------+
//! ^ handed out           ^ object + obj_size
//! ```
//! where [`SlotMeta`] holds the [`NodeId`] of the owning slab. This is what lets
//! the [`Cache`](crate::Cache) go from a released pointer to its slab without a search.
//! Since `obj_size` is arbitrary the trailer may be unaligned and is always
//! accessed with unaligned reads and writes.
//!
//! All the address arithmetic of the crate lives in this module.

use core::fmt::{self, Debug};
use core::mem::size_of;
use core::ptr::NonNull;

use static_assertions::assert_eq_size;
use tracing::{debug, error, instrument, Level};

use crate::error::{Error, Result};
use crate::heap::IndexHeap;
use crate::list::{Link, Linked, NodeId};
use crate::providers::Provider;
use crate::util::offset_from;

/// The ownership metadata trailing every object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct SlotMeta {
    pub slab: usize,
}

pub const META_SIZE: usize = size_of::<SlotMeta>();

assert_eq_size!(SlotMeta, usize);

pub struct Slab<P: Provider> {
    id: NodeId,
    obj_size: usize,
    slot_size: usize,
    max: usize,
    count: usize,
    free: IndexHeap,
    raw: NonNull<u8>,
    region_size: usize,
    provider: P,
    link: Link,
}

impl<P: Provider> Slab<P> {
    /// Creates an empty slab for objects of `obj_size` bytes over a fresh region of
    /// `region_size` bytes. `id` is written into the trailer of every slot handed out.
    ///
    /// Fails if `obj_size` is 0, if not even one slot fits into the region
    /// or if any of the allocations fail. Nothing is leaked on failure.
    #[instrument(level = "debug", skip(provider), err(Debug, level = Level::ERROR))]
    pub fn new(id: NodeId, obj_size: usize, region_size: usize, provider: P) -> Result<Self> {
        if obj_size == 0 {
            return Err(Error::ZeroSize);
        }
        let slot_size = match obj_size.checked_add(META_SIZE) {
            Some(size) if size <= region_size => size,
            _ => {
                return Err(Error::ObjectTooLarge {
                    obj_size,
                    region_size,
                })
            }
        };
        let max = region_size / slot_size;

        let free = IndexHeap::with_indices(max)?;

        let raw = provider.reserve(region_size).map_err(|()| {
            error!(region_size, "Couldn't reserve slab region.");
            Error::OutOfMemory { size: region_size }
        })?;
        debug!(?raw, slot_size, max, "Reserved slab region.");

        Ok(Slab {
            id,
            obj_size,
            slot_size,
            max,
            count: 0,
            free,
            raw,
            region_size,
            provider,
            link: Link::default(),
        })
    }

    /// Takes the lowest free slot, stamps its trailer with the slab id and returns
    /// a pointer to the object part or `None` if the slab is full.
    /// This operation has a time complexity of *O*(log max).
    pub fn acquire_slot(&mut self) -> Option<NonNull<u8>> {
        let index = self.free.pop_min()? as usize;
        debug_assert!(index < self.max);
        let obj = unsafe { self.slot(index) };
        unsafe {
            obj.as_ptr()
                .add(self.obj_size)
                .cast::<SlotMeta>()
                .write_unaligned(SlotMeta { slab: self.id.0 });
        }
        self.count += 1;
        Some(obj)
    }

    /// Returns the slot of the object pointed to by `obj` to the slab.
    /// Returns [`Error::ForeignPointer`] without touching the slab if `obj`
    /// does not point to the start of one of its slots.
    /// This operation has a time complexity of *O*(log max).
    ///
    /// # Safety
    /// `obj` must have been returned by [`acquire_slot`](Slab::acquire_slot) on this slab
    /// and must not have been released since. Double releases are not detected.
    ///
    /// # Panics
    /// Panics if the slab has no slot in use, which a double release can cause.
    pub unsafe fn release_slot(&mut self, obj: NonNull<u8>) -> Result<()> {
        if !self.contains(obj) {
            return Err(Error::ForeignPointer);
        }
        let offset = unsafe { offset_from(obj, self.raw) };
        if offset % self.slot_size != 0 {
            return Err(Error::ForeignPointer);
        }
        let index = offset / self.slot_size;
        self.free
            .insert(index as u64)
            .expect("Free slots can never outnumber the slab's capacity.");
        self.count -= 1;
        Ok(())
    }

    /// Returns whether `ptr` lies within the slotted part of the slab.
    #[inline]
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let start = self.raw.as_ptr() as usize;
        let addr = ptr.as_ptr() as usize;
        addr >= start && addr - start < self.max * self.slot_size
    }

    /// Reads the id of the slab owning the object pointed to by `obj`.
    ///
    /// # Safety
    /// `obj` must be a live object handed out by a slab with objects of `obj_size` bytes.
    #[inline]
    pub unsafe fn owner(obj: NonNull<u8>, obj_size: usize) -> NodeId {
        let meta = unsafe {
            obj.as_ptr()
                .add(obj_size)
                .cast::<SlotMeta>()
                .read_unaligned()
        };
        NodeId(meta.slab)
    }

    /// Returns a pointer to the object part of slot `index`.
    ///
    /// # Safety
    /// `index` must be less than `max`.
    #[inline(always)]
    unsafe fn slot(&self, index: usize) -> NonNull<u8> {
        unsafe { self.raw.add(index * self.slot_size) }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn obj_size(&self) -> usize {
        self.obj_size
    }

    #[inline]
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// The number of slots of the slab.
    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }

    /// The number of slots currently in use.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.max
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    #[inline]
    pub fn free_slots(&self) -> &IndexHeap {
        &self.free
    }
}

impl<P: Provider> Linked for Slab<P> {
    #[inline(always)]
    fn link(&self) -> &Link {
        &self.link
    }

    #[inline(always)]
    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

impl<P: Provider> Drop for Slab<P> {
    fn drop(&mut self) {
        debug!(id = ?self.id, raw = ?self.raw, "Releasing slab region.");
        unsafe { self.provider.release(self.raw, self.region_size) };
    }
}

impl<P: Provider> Debug for Slab<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slab")
            .field("id", &self.id)
            .field("obj_size", &self.obj_size)
            .field("slot_size", &self.slot_size)
            .field("max", &self.max)
            .field("count", &self.count)
            .field("raw", &self.raw)
            .field("link", &self.link)
            .finish()
    }
}
