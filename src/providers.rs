//! [`Provider`] trait and structures that implement it.
//!
//! The [`Provider`] trait allows users to change where the
//! [`Cache`](crate::Cache) gets the raw regions backing its slabs from.

use core::ptr::{self, NonNull};

use tracing::error;

/// A trait for types that hand out fixed-size raw memory regions.
///
/// # Safety
/// * regions returned by [`reserve`](Provider::reserve) must be zero-initialized,
///   page-aligned, valid for reads and writes of `size` bytes and must not overlap
///   any other live region.
/// * a region must stay valid until it is passed back to [`release`](Provider::release),
///   cloning or moving the provider must not invalidate it.
pub unsafe trait Provider {
    /// Reserves a region of exactly `size` bytes.
    /// Returns the start of the region or `Err(())` if the reservation failed.
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, ()>;

    /// Gives a region back to the provider.
    ///
    /// # Safety
    /// `ptr` must have been returned by [`reserve`](Provider::reserve) on this provider
    /// (or a clone of it) with the same `size`, and must not be used afterwards.
    unsafe fn release(&self, ptr: NonNull<u8>, size: usize);
}

/// A provider that maps anonymous private memory with [`libc::mmap`].
///
/// Fresh anonymous mappings are always zero-filled and page-aligned.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MmapProvider;

impl MmapProvider {
    #[inline(always)]
    pub const fn new() -> Self {
        MmapProvider
    }
}

unsafe impl Provider for MmapProvider {
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, ()> {
        if size == 0 {
            return Err(());
        }
        let result = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if result == libc::MAP_FAILED {
            error!(size, "mmap failed.");
            return Err(());
        }
        NonNull::new(result.cast()).ok_or(())
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        let ret = unsafe { libc::munmap(ptr.as_ptr().cast(), size) };
        debug_assert_eq!(ret, 0, "munmap() of a live region should never fail.");
    }
}

unsafe impl<T: Provider + ?Sized> Provider for &T {
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, ()> {
        (**self).reserve(size)
    }

    unsafe fn release(&self, ptr: NonNull<u8>, size: usize) {
        (**self).release(ptr, size)
    }
}
