//! Typed allocator capability over an `allocator_api2::Allocator`.
//!
//! `allocate_shared` rebinds the caller's allocator to the control-block
//! type and keeps a copy inside the block, so the block is freed through the
//! same allocator that produced it.

use crate::error::AllocFailure;
use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use tracing::debug;

pub use allocator_api2::alloc::{AllocError, Allocator, Global};

/// Allocates, constructs, destroys and frees arrays of `T` through `A`.
pub struct TypedAllocator<T, A = Global> {
    alloc: A,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedAllocator<T> {
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

impl<T> Default for TypedAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: Clone> Clone for TypedAllocator<T, A> {
    fn clone(&self) -> Self {
        Self::new_in(self.alloc.clone())
    }
}

impl<T, A: fmt::Debug> fmt::Debug for TypedAllocator<T, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedAllocator")
            .field("value", &core::any::type_name::<T>())
            .field("alloc", &self.alloc)
            .finish()
    }
}

impl<T, A> TypedAllocator<T, A> {
    pub fn new_in(alloc: A) -> Self {
        Self {
            alloc,
            _marker: PhantomData,
        }
    }

    pub fn inner(&self) -> &A {
        &self.alloc
    }

    pub fn into_inner(self) -> A {
        self.alloc
    }

    /// The same underlying allocator, typed for `U`.
    pub fn rebind<U>(self) -> TypedAllocator<U, A> {
        TypedAllocator::new_in(self.alloc)
    }

    /// Largest element count `allocate` could ever accept.
    pub fn max_size(&self) -> usize {
        match core::mem::size_of::<T>() {
            0 => usize::MAX,
            sz => isize::MAX as usize / sz,
        }
    }

    /// Writes `value` into uninitialized storage.
    ///
    /// # Safety
    /// `p` must be valid for writes and properly aligned for `T`.
    pub unsafe fn construct(&self, p: NonNull<T>, value: T) {
        p.as_ptr().write(value);
    }

    /// Runs `T`'s destructor in place without freeing the storage.
    ///
    /// # Safety
    /// `p` must point to an initialized `T` that is not used afterwards.
    pub unsafe fn destroy(&self, p: NonNull<T>) {
        ptr::drop_in_place(p.as_ptr());
    }
}

impl<T, A: Allocator> TypedAllocator<T, A> {
    /// Uninitialized storage for `n` values of `T`.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>, AllocFailure> {
        let layout = Layout::array::<T>(n).map_err(|_| AllocFailure::CapacityOverflow)?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        match self.alloc.allocate(layout) {
            Ok(p) => Ok(p.cast()),
            Err(AllocError) => {
                debug!(size = layout.size(), align = layout.align(), "allocation failed");
                Err(AllocFailure::Exhausted { layout })
            }
        }
    }

    /// Frees storage obtained from `allocate(n)`.
    ///
    /// # Safety
    /// `p` must come from `allocate(n)` on this allocator (or a clone of it)
    /// and must not be freed twice.
    pub unsafe fn deallocate(&self, p: NonNull<T>, n: usize) {
        let layout = Layout::array::<T>(n).expect("layout was valid when allocated");
        if layout.size() != 0 {
            self.alloc.deallocate(p.cast(), layout);
        }
    }
}
