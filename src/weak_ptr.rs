//! WeakPtr: a non-owning observer of a `SharedPtr`'s control block.
//!
//! Keeps the control block (not the object) alive. `lock` upgrades to a
//! `SharedPtr` only while at least one strong owner remains.

use crate::control::{self, BlockPtr};
use crate::shared_ptr::SharedPtr;
use core::fmt;
use core::marker::PhantomData;
use core::ptr::NonNull;

pub struct WeakPtr<T: ?Sized> {
    ptr: Option<NonNull<T>>,
    pub(crate) block: Option<BlockPtr>,
    _marker: PhantomData<T>,
}

impl<T: ?Sized> WeakPtr<T> {
    /// Observes nothing; `lock` always yields an empty pointer.
    pub const fn new() -> Self {
        Self {
            ptr: None,
            block: None,
            _marker: PhantomData,
        }
    }

    /// Number of strong owners of the observed object; 0 when empty.
    pub fn use_count(&self) -> usize {
        control::strong_count(self.block)
    }

    /// Number of `WeakPtr`s sharing this control block.
    pub fn weak_count(&self) -> usize {
        control::weak_count(self.block)
    }

    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// A new strong owner, or an empty `SharedPtr` if the object is gone.
    pub fn lock(&self) -> SharedPtr<T> {
        match self.block {
            Some(b) if unsafe { b.as_ref() }.counts().strong.inc_if_live() => {
                SharedPtr::from_parts(self.ptr, Some(b))
            }
            _ => SharedPtr::empty(),
        }
    }

    pub fn reset(&mut self) {
        drop(core::mem::replace(self, Self::new()));
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }
}

impl<T: ?Sized> From<&SharedPtr<T>> for WeakPtr<T> {
    fn from(p: &SharedPtr<T>) -> Self {
        if let Some(b) = p.block {
            unsafe { b.as_ref() }.counts().weak.inc();
        }
        Self {
            ptr: p.ptr,
            block: p.block,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Clone for WeakPtr<T> {
    fn clone(&self) -> Self {
        if let Some(b) = self.block {
            unsafe { b.as_ref() }.counts().weak.inc();
        }
        Self {
            ptr: self.ptr,
            block: self.block,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for WeakPtr<T> {
    fn drop(&mut self) {
        if let Some(b) = self.block.take() {
            unsafe { control::release_weak(b) };
        }
    }
}

impl<T: ?Sized> Default for WeakPtr<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for WeakPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(WeakPtr)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_ptr::OwnerOrder;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Noisy(Rc<Cell<u32>>);
    impl Drop for Noisy {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn lock_succeeds_only_while_owned() {
        let drops = Rc::new(Cell::new(0));
        let sp = SharedPtr::new(Noisy(drops.clone()));
        let wp = SharedPtr::downgrade(&sp);
        assert_eq!(wp.use_count(), 1);
        assert_eq!(wp.weak_count(), 1);
        {
            let again = wp.lock();
            assert_eq!(sp.use_count(), 2);
            assert!(SharedPtr::ptr_eq(&again, &sp));
        }
        drop(sp);
        assert_eq!(drops.get(), 1);
        assert!(wp.expired());
        assert!(wp.lock().is_null());
        assert_eq!(wp.lock().use_count(), 0);
    }

    #[test]
    fn empty_weak_is_expired() {
        let wp: WeakPtr<u8> = WeakPtr::new();
        assert!(wp.expired());
        assert_eq!(wp.weak_count(), 0);
        assert!(wp.lock().is_null());
    }

    #[test]
    fn reset_and_swap() {
        let a = SharedPtr::new(1);
        let b = SharedPtr::new(2);
        let mut wa = SharedPtr::downgrade(&a);
        let mut wb = SharedPtr::downgrade(&b);
        wa.swap(&mut wb);
        assert_eq!(*wa.lock(), 2);
        assert_eq!(*wb.lock(), 1);
        assert!(!wa.owner_before(&wa.clone()));
        wa.reset();
        assert!(wa.expired());
        assert_eq!(b.weak_count(), 0);
        assert_eq!(a.weak_count(), 1);
    }

    #[test]
    fn destructor_dropping_last_weak_is_safe() {
        // The managed object holds the only weak reference to itself; the
        // block must survive dispose and be freed afterwards. Inside the
        // destructor the object is already expired and the weak count still
        // excludes the strong owners' reference.
        struct SelfRef {
            me: std::cell::RefCell<WeakPtr<SelfRef>>,
            seen: Rc<Cell<(usize, usize)>>,
        }
        impl Drop for SelfRef {
            fn drop(&mut self) {
                let me = self.me.borrow();
                self.seen.set((me.weak_count(), me.use_count()));
            }
        }

        let seen = Rc::new(Cell::new((usize::MAX, usize::MAX)));
        let sp = SharedPtr::new(SelfRef {
            me: std::cell::RefCell::new(WeakPtr::new()),
            seen: seen.clone(),
        });
        *sp.me.borrow_mut() = SharedPtr::downgrade(&sp);
        assert_eq!(sp.weak_count(), 1);
        drop(sp);
        assert_eq!(seen.get(), (1, 0));
    }
}
