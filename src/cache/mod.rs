//! A fixed-object-size slab cache.
//!
// For a general view of the cache's operational semantics see the [`crate`] level documentation.
//
// # Additional implementation notes
// The slabs live in an arena (`slabs`) and never move or get removed once
// the cache is built, so a `NodeId` doubles as the index into it. The three
// list headers are kept in an array indexed by `Bucket`, which makes the
// `ListId` stored in a slab's link the index of its header as well and lets
// `list::splice` find it without any help.

use core::fmt::{self, Debug};
use core::mem::size_of;
use core::ptr::NonNull;

use tracing::{debug, error, instrument, Level};

use crate::config::CacheConfig;
use crate::error::{Error, Result};
use crate::list::{splice, List, ListId, Linked, NodeId};
use crate::providers::{MmapProvider, Provider};
use crate::slab::Slab;

/// The fullness based groupings of the slabs of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// No slot in use.
    Free = 0,
    /// Some but not all slots in use.
    Partial = 1,
    /// Every slot in use.
    Full = 2,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Free, Bucket::Partial, Bucket::Full];

    #[inline(always)]
    const fn list_id(self) -> ListId {
        ListId(self as usize)
    }

    #[inline]
    fn from_list_id(id: ListId) -> Bucket {
        match id.0 {
            0 => Bucket::Free,
            1 => Bucket::Partial,
            2 => Bucket::Full,
            _ => unreachable!("The cache only has three lists."),
        }
    }
}

/// A snapshot of the occupancy of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Objects currently handed out.
    pub objects: usize,
    /// Objects the cache can hold at most.
    pub capacity: usize,
    pub free_slabs: usize,
    pub partial_slabs: usize,
    pub full_slabs: usize,
}

/// A cache of equal-size objects backed by a fixed set of slabs.
///
/// The cache is not thread-safe. It may be moved to another thread but
/// concurrent use requires external synchronization, e.g. wrapping it in a `Mutex`.
pub struct Cache<P: Provider + Clone = MmapProvider> {
    // Declared before `lists` so the slab regions go first on drop.
    slabs: Vec<Slab<P>>,
    lists: [List; 3],
    obj_size: usize,
    count: usize,
    max: usize,
}

impl Cache<MmapProvider> {
    /// Creates a cache for objects of `obj_size` bytes with the default [`CacheConfig`].
    pub fn new(obj_size: usize) -> Result<Self> {
        Cache::with_config(obj_size, CacheConfig::default())
    }

    pub fn with_config(obj_size: usize, config: CacheConfig) -> Result<Self> {
        Cache::with_provider(obj_size, config, MmapProvider::new())
    }
}

impl<P: Provider + Clone> Cache<P> {
    /// Creates a cache for objects of `obj_size` bytes whose slab regions come from `provider`.
    /// All `config.initial_slabs` slabs are created up front and start out free.
    ///
    /// Fails if the configuration or `obj_size` are invalid or if memory runs out,
    /// every slab created up to that point is released before returning.
    #[instrument(level = "info", skip(provider), err(Debug, level = Level::ERROR))]
    pub fn with_provider(obj_size: usize, config: CacheConfig, provider: P) -> Result<Self> {
        let region_size = config.region_size()?;

        let mut slabs = Vec::new();
        slabs
            .try_reserve_exact(config.initial_slabs)
            .map_err(|_| Error::OutOfMemory {
                size: config.initial_slabs.saturating_mul(size_of::<Slab<P>>()),
            })?;
        for i in 0..config.initial_slabs {
            slabs.push(Slab::new(NodeId(i), obj_size, region_size, provider.clone())?);
        }

        let mut lists = Bucket::ALL.map(|bucket| List::new(bucket.list_id()));
        for i in 0..slabs.len() {
            lists[Bucket::Free as usize].append(&mut slabs, NodeId(i));
        }

        let max = slabs.len() * slabs[0].max();
        debug!(slabs = slabs.len(), max, "Cache created.");

        Ok(Cache {
            slabs,
            lists,
            obj_size,
            count: 0,
            max,
        })
    }

    /// Hands out a slot for one object or returns [`Error::Exhausted`] if every slab is full.
    /// The cache never grows beyond its initial slabs.
    ///
    /// Slabs already being filled are preferred over free ones.
    /// This operation has a time complexity of *O*(log n) where n is the number of slots per slab.
    #[instrument(level = "debug", skip(self), ret(level = Level::DEBUG), err(Debug, level = Level::WARN))]
    pub fn allocate(&mut self) -> Result<NonNull<u8>> {
        let (id, from) = if let Some(id) = self.list(Bucket::Partial).tail() {
            (id, Bucket::Partial)
        } else if let Some(id) = self.list(Bucket::Free).tail() {
            (id, Bucket::Free)
        } else {
            return Err(Error::Exhausted);
        };

        let obj = self.slabs[id.0]
            .acquire_slot()
            .expect("Free and partial slabs always have a vacant slot.");

        if from == Bucket::Free {
            self.pop_tail_onto(Bucket::Free, Bucket::Partial);
        }
        // A single slot slab goes from free to full in one allocation.
        if self.slabs[id.0].is_full() {
            self.pop_tail_onto(Bucket::Partial, Bucket::Full);
        }

        self.count += 1;
        Ok(obj)
    }

    /// Gives the slot of `obj` back to the slab it came from.
    /// The slab is found through the trailer of `obj`, no search is involved.
    /// This operation has a time complexity of *O*(log n) where n is the number of slots per slab.
    ///
    /// # Safety
    /// `obj` must have been returned by [`allocate`](Cache::allocate) on this cache
    /// and must not have been released since. Neither double releases nor foreign
    /// pointers are detected reliably.
    #[instrument(level = "debug", skip(self))]
    pub unsafe fn release(&mut self, obj: NonNull<u8>) {
        let id = unsafe { Slab::<P>::owner(obj, self.obj_size) };
        debug_assert!(id.0 < self.slabs.len(), "Object {obj:?} carries an invalid slab id {id:?}.");
        let Some(slab) = self.slabs.get_mut(id.0) else {
            error!(?obj, ?id, "Object carries an invalid slab id, ignoring release.");
            return;
        };

        let released = unsafe { slab.release_slot(obj) };
        debug_assert!(released.is_ok(), "Object {obj:?} does not belong to slab {id:?}.");
        if let Err(err) = released {
            error!(?obj, ?id, %err, "Ignoring release.");
            return;
        }

        let now_free = slab.is_empty();
        let was_full = slab.link().owner() == Some(Bucket::Full.list_id());
        if now_free {
            self.transfer(id, Bucket::Free);
        } else if was_full {
            self.transfer(id, Bucket::Partial);
        }

        self.count -= 1;
    }

    /// Returns the bucket of the slab holding `obj`.
    ///
    /// # Safety
    /// `obj` must be a live object handed out by this cache.
    pub unsafe fn bucket_of(&self, obj: NonNull<u8>) -> Bucket {
        let id = unsafe { Slab::<P>::owner(obj, self.obj_size) };
        let owner = self.slabs[id.0]
            .link()
            .owner()
            .expect("Every slab of a cache is in one of its lists.");
        Bucket::from_list_id(owner)
    }

    /// Moves the tail of `from` to the end of `to`.
    fn pop_tail_onto(&mut self, from: Bucket, to: Bucket) {
        let Some(id) = self.lists[from as usize].pop(&mut self.slabs) else {
            return;
        };
        self.lists[to as usize].append(&mut self.slabs, id);
        debug!(?id, ?from, ?to, "Slab moved.");
    }

    /// Moves the slab `id` from wherever it is to the end of `to`.
    fn transfer(&mut self, id: NodeId, to: Bucket) {
        let from = self.slabs[id.0].link().owner().map(Bucket::from_list_id);
        splice(&mut self.lists, &mut self.slabs, id);
        self.lists[to as usize].append(&mut self.slabs, id);
        debug!(?id, ?from, ?to, "Slab moved.");
    }

    #[inline]
    fn list(&self, bucket: Bucket) -> &List {
        &self.lists[bucket as usize]
    }

    /// Iterates over the slabs in `bucket`, from the oldest member to the newest.
    pub fn slabs_in(&self, bucket: Bucket) -> impl Iterator<Item = &Slab<P>> + '_ {
        self.list(bucket)
            .iter(&self.slabs)
            .map(move |id| &self.slabs[id.0])
    }

    /// The number of objects currently handed out.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The number of objects the cache can hold at most.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max
    }

    #[inline]
    pub fn obj_size(&self) -> usize {
        self.obj_size
    }

    #[inline]
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            objects: self.count,
            capacity: self.max,
            free_slabs: self.list(Bucket::Free).len(),
            partial_slabs: self.list(Bucket::Partial).len(),
            full_slabs: self.list(Bucket::Full).len(),
        }
    }
}

// SAFETY: the cache exclusively owns every region its slabs point to,
// nothing else holds on to them, so moving it to another thread is fine
// as long as its provider can be moved too.
unsafe impl<P: Provider + Clone + Send> Send for Cache<P> {}

impl<P: Provider + Clone> Debug for Cache<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("obj_size", &self.obj_size)
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests;
