//! Construction parameters of a [`Cache`](crate::Cache).

use static_assertions::const_assert;

use crate::error::{Error, Result};
use crate::util::region_size;

/// How many slabs a cache creates up front, by default.
pub const INITIAL_SLABS: usize = 8;

/// The size of a slab region in pages, by default.
pub const SLAB_PAGES: usize = 2;

const_assert!(INITIAL_SLABS > 0);
const_assert!(SLAB_PAGES > 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// The number of slabs, which fixes the capacity of the cache for its whole lifetime.
    pub initial_slabs: usize,
    /// The size of every slab region in pages.
    pub slab_pages: usize,
}

impl CacheConfig {
    pub const fn new(initial_slabs: usize, slab_pages: usize) -> Self {
        CacheConfig {
            initial_slabs,
            slab_pages,
        }
    }

    /// Checks the configuration and returns the slab region size in bytes.
    pub fn region_size(&self) -> Result<usize> {
        if self.initial_slabs == 0 {
            return Err(Error::InvalidConfig("initial_slabs must be nonzero"));
        }
        if self.slab_pages == 0 {
            return Err(Error::InvalidConfig("slab_pages must be nonzero"));
        }
        region_size(self.slab_pages).ok_or(Error::InvalidConfig("slab region is too big"))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::new(INITIAL_SLABS, SLAB_PAGES)
    }
}
