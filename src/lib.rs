//! A fixed-object-size slab allocator.
//!
//! The crate hands out and reclaims equal-size memory blocks in *O*(log n) time
//! (n being the number of slots per slab, so effectively constant) without
//! any lookup table on release. It is meant for pools of many same-size objects,
//! not for general-purpose variable-size allocation.
//!
//! # Usage
//! ```
//! use slab_cache::Cache;
//!
//! let mut cache = Cache::new(64).unwrap();
//! let obj = cache.allocate().unwrap();
//! unsafe {
//!     obj.as_ptr().write_bytes(0, 64);
//!     cache.release(obj);
//! }
//! assert!(cache.is_empty());
//! ```
//!
//! # Mode of operation
//! A [`Cache`] is built with a fixed number of [slabs](#slabs), all of them
//! empty and kept on the cache's free [list](#lists).
//! - On allocation the cache takes the most recently touched slab that is
//!   already being filled, falling back to a free one, and takes that
//!   slab's lowest free [slot](#slots). Slabs move between the free,
//!   partial and full lists as they fill up.
//! - On release the cache reads the owning slab straight out of the slot
//!   [trailer](#slots), gives the slot back and moves the slab to the list
//!   matching its new fill state.
//! - Once every slab is full [`Cache::allocate`] fails with
//!   [`Error::Exhausted`]. The cache never grows.
//!
//! Below is a list of the abstractions used by the cache:
//!
//! ## Slabs
//! A slab is one region of a fixed number of pages obtained from a
//! [provider](#providers). It is cut into equal slots and remembers its free
//! slots in an [`IndexHeap`], a min-heap of slot indices, which makes slot
//! reuse lowest-index-first.
//!
//! ## Slots
//! A slot is an object followed by a small trailer holding the id of the slab
//! the slot belongs to. The trailer is written when the slot is handed out,
//! so a released pointer leads back to its slab in constant time. This is also
//! why objects are not aligned beyond the alignment of the slot size.
//!
//! ## Lists
//! The slabs of a cache are threaded onto three intrusive doubly linked
//! lists, one per bucket (free, partial, full). A slab's links live inside the
//! slab itself together with the id of the list holding it, so it can be
//! spliced out of its list without searching for it. All handles are arena
//! indices, no list or slab ever owns another.
//!
//! ## Providers
//! A provider is where slab regions come from. The [`Cache`] is generic over its
//! provider, anything implementing [`Provider`] can be used, [`MmapProvider`]
//! (anonymous `mmap`) is the default.
//!
//! # Threads
//! Nothing in this crate synchronizes. A [`Cache`] can be sent to another
//! thread but sharing one requires external locking, e.g. a `Mutex<Cache>`.
//!
//! # Logging
//! The crate emits [`tracing`] events and spans, slab moves are logged at the
//! `debug` level. Install any subscriber to see them.
//!
//! [`IndexHeap`]: heap::IndexHeap
//! [`Provider`]: providers::Provider
//! [`MmapProvider`]: providers::MmapProvider

pub use crate::cache::{Bucket, Cache, CacheStats};
pub use crate::config::CacheConfig;
pub use crate::error::{Error, Result};

pub mod cache;
pub mod config;
pub mod error;
pub mod heap;
pub mod list;
pub mod providers;
pub mod slab;
pub mod util;
