//! The crate wide [`Error`] type.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The memory provider (or the global allocator, for heap arrays)
    /// could not hand out `size` bytes.
    #[error("out of memory: couldn't reserve {size} bytes")]
    OutOfMemory { size: usize },

    #[error("object size must be nonzero")]
    ZeroSize,

    /// Not even a single slot fits into one slab region.
    #[error("object size {obj_size} doesn't fit into a {region_size} byte slab")]
    ObjectTooLarge { obj_size: usize, region_size: usize },

    #[error("invalid cache configuration: {0}")]
    InvalidConfig(&'static str),

    /// Every slab of the cache is full. The cache never grows.
    #[error("cache exhausted, all slabs are full")]
    Exhausted,

    #[error("heap overflow, capacity {capacity} reached")]
    HeapOverflow { capacity: usize },

    /// The pointer was not handed out by the slab it was released to.
    #[error("pointer does not belong to this slab")]
    ForeignPointer,
}
