//! The allocator abstraction accepted, but not defined, by the core.
//!
//! The pool treats a custom
//! allocator purely as an opaque collaborator handed to "allocator-aware"
//! callables; it does not ship a custom allocator implementation of its own.

/// An opaque allocator handed to allocator-aware submissions.
///
/// The default pool allocator ([`SystemAllocator`]) just goes through the
/// global allocator, the same path ordinary `Box`/`Arc` allocation already
/// takes; a caller with a real arena or slab allocator implements this trait
/// over it and passes it to [`crate::pool::Pool::with_allocator`].
pub trait Allocator: Send + Sync {
    /// Allocates `size` bytes with the given `align`, or returns `None` if
    /// the allocator cannot satisfy the request.
    fn allocate(&self, size: usize, align: usize) -> Option<*mut u8>;

    /// Deallocates a block previously returned by `allocate` with the same
    /// `size`/`align`.
    ///
    /// # Safety
    /// `ptr` must have been returned by a prior `allocate(size, align)` call
    /// on this same allocator, and not already deallocated.
    unsafe fn deallocate(&self, ptr: *mut u8, size: usize, align: usize);
}

/// The default allocator: a thin pass-through to the process's global
/// allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize, align: usize) -> Option<*mut u8> {
        let layout = std::alloc::Layout::from_size_align(size, align).ok()?;
        // Safety: `layout` has non-zero size whenever `size > 0`; callers
        // that need a zero-sized allocation should not call through here.
        if layout.size() == 0 {
            return Some(std::ptr::NonNull::dangling().as_ptr());
        }
        let ptr = unsafe { std::alloc::alloc(layout) };
        if ptr.is_null() { None } else { Some(ptr) }
    }

    unsafe fn deallocate(&self, ptr: *mut u8, size: usize, align: usize) {
        if size == 0 {
            return;
        }
        if let Ok(layout) = std::alloc::Layout::from_size_align(size, align) {
            unsafe { std::alloc::dealloc(ptr, layout) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_allocator_round_trips() {
        let alloc = SystemAllocator;
        let ptr = alloc.allocate(64, 8).expect("allocation should succeed");
        unsafe {
            std::ptr::write_bytes(ptr, 0xAB, 64);
            alloc.deallocate(ptr, 64, 8);
        }
    }
}
