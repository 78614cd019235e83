//! Utility functions.

use core::ptr::NonNull;

/// Returns the platform page size.
#[inline]
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    debug_assert!(size > 0, "sysconf(_SC_PAGESIZE) should never fail.");
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// Returns the size in bytes of a region spanning `pages` pages
/// or `None` if it can not be contained in a `usize`.
#[inline]
pub(crate) fn region_size(pages: usize) -> Option<usize> {
    pages
        .checked_mul(page_size())
        .filter(|&size| size as isize > 0)
}

/// Returns the distance in bytes from `base` to `ptr`.
///
/// # Safety
/// `ptr` must not lie before `base`.
#[inline(always)]
pub(crate) unsafe fn offset_from(ptr: NonNull<u8>, base: NonNull<u8>) -> usize {
    debug_assert!(ptr >= base);
    ptr.as_ptr() as usize - base.as_ptr() as usize
}
