//! Deleters: how an owning pointer disposes of the object it manages.

use core::ptr::NonNull;

/// Disposal policy for a `T` owned through a raw pointer.
pub trait Deleter<T: ?Sized> {
    /// Destroys the object behind `ptr` and releases its storage.
    ///
    /// # Safety
    /// `ptr` must be the pointer this deleter was paired with, and it must
    /// not be used or deleted again afterwards.
    unsafe fn delete(&mut self, ptr: NonNull<T>);
}

/// Frees objects that came from `Box` (including boxed slices).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DefaultDelete;

impl<T: ?Sized> Deleter<T> for DefaultDelete {
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        drop(Box::from_raw(ptr.as_ptr()));
    }
}

impl<T: ?Sized, F> Deleter<T> for F
where
    F: FnMut(NonNull<T>),
{
    #[inline]
    unsafe fn delete(&mut self, ptr: NonNull<T>) {
        self(ptr)
    }
}
