//! UniquePtr and UniqueArray: sole ownership with a pluggable deleter.
//!
//! Unlike `Box`, the pointer may be null and the deleter is an arbitrary
//! `Deleter<T>`, so objects from foreign allocators can be owned too.

use crate::deleter::{DefaultDelete, Deleter};
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::mem::ManuallyDrop;
use core::ops::{Deref, DerefMut, Index, IndexMut};
use core::ptr::{self, NonNull};

pub struct UniquePtr<T: ?Sized, D: Deleter<T> = DefaultDelete> {
    ptr: Option<NonNull<T>>,
    deleter: D,
    _marker: PhantomData<T>,
}

impl<T> UniquePtr<T> {
    pub fn new(value: T) -> Self {
        Self::from(Box::new(value))
    }
}

impl<T: ?Sized> UniquePtr<T> {
    /// Gives the object back as a `Box`; `None` when null.
    pub fn into_box(self) -> Option<Box<T>> {
        let (ptr, _) = self.into_raw_parts();
        ptr.map(|p| unsafe { Box::from_raw(p.as_ptr()) })
    }

    /// Releases the current object and takes over `value`.
    pub fn reset_to(&mut self, value: Box<T>) {
        let p = unsafe { NonNull::new_unchecked(Box::into_raw(value)) };
        unsafe { self.reset_raw(Some(p)) };
    }

    /// Converting move, e.g. from a concrete type to a trait object.
    pub fn convert<U: ?Sized, F>(self, f: F) -> UniquePtr<U>
    where
        F: FnOnce(Box<T>) -> Box<U>,
    {
        match self.into_box() {
            Some(b) => UniquePtr::from(f(b)),
            None => UniquePtr::null(),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> UniquePtr<T, D> {
    pub fn null() -> Self
    where
        D: Default,
    {
        Self::null_with_deleter(D::default())
    }

    pub fn null_with_deleter(deleter: D) -> Self {
        Self {
            ptr: None,
            deleter,
            _marker: PhantomData,
        }
    }

    /// Takes ownership of `ptr`, to be released with `deleter`.
    ///
    /// # Safety
    /// `ptr` must be valid for `T` and deletable exactly once by `deleter`.
    pub unsafe fn from_raw_with_deleter(ptr: NonNull<T>, deleter: D) -> Self {
        Self {
            ptr: Some(ptr),
            deleter,
            _marker: PhantomData,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.ptr.map(|p| unsafe { &mut *p.as_ptr() })
    }

    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    pub fn get_deleter(&self) -> &D {
        &self.deleter
    }

    pub fn get_deleter_mut(&mut self) -> &mut D {
        &mut self.deleter
    }

    /// Gives up ownership without deleting; the caller now owns the object.
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.ptr.take()
    }

    /// Deletes the owned object, if any, and becomes null.
    pub fn reset(&mut self) {
        unsafe { self.reset_raw(None) };
    }

    /// Stores `ptr`, then deletes the previously owned object. The new
    /// pointer is in place before the deleter runs.
    ///
    /// # Safety
    /// `ptr` must be valid for `T` and deletable exactly once by the
    /// current deleter.
    pub unsafe fn reset_raw(&mut self, ptr: Option<NonNull<T>>) {
        let old = core::mem::replace(&mut self.ptr, ptr);
        if let Some(old) = old {
            debug_assert!(
                ptr.map_or(true, |p| p.cast::<u8>() != old.cast::<u8>()),
                "resetting a UniquePtr to the pointer it already owns"
            );
            self.deleter.delete(old);
        }
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    /// Splits into the raw pointer and the deleter without deleting.
    pub fn into_raw_parts(self) -> (Option<NonNull<T>>, D) {
        let this = ManuallyDrop::new(self);
        // `this` is never dropped, so the deleter is moved out exactly once.
        let deleter = unsafe { ptr::read(&this.deleter) };
        (this.ptr, deleter)
    }

    /// Converting move that keeps a custom deleter: `ptr_map` converts the
    /// pointer (typically an unsizing coercion such as
    /// `|p| p as NonNull<dyn Trait>`) and `deleter_map` converts the
    /// deleter. A null pointer stays null; `ptr_map` is not called.
    ///
    /// # Safety
    /// `ptr_map` must return a pointer to the same object, and the converted
    /// deleter must delete it exactly as the old deleter would have.
    pub unsafe fn convert_with<U, E, F, G>(self, ptr_map: F, deleter_map: G) -> UniquePtr<U, E>
    where
        U: ?Sized,
        E: Deleter<U>,
        F: FnOnce(NonNull<T>) -> NonNull<U>,
        G: FnOnce(D) -> E,
    {
        let (ptr, deleter) = self.into_raw_parts();
        UniquePtr {
            ptr: ptr.map(ptr_map),
            deleter: deleter_map(deleter),
            _marker: PhantomData,
        }
    }
}

fn thin<T: ?Sized>(p: Option<NonNull<T>>) -> usize {
    p.map_or(0, |p| p.cast::<u8>().as_ptr() as usize)
}

impl<T: ?Sized, D: Deleter<T>> Drop for UniquePtr<T, D> {
    fn drop(&mut self) {
        if let Some(p) = self.ptr.take() {
            unsafe { self.deleter.delete(p) };
        }
    }
}

impl<T: ?Sized> From<Box<T>> for UniquePtr<T> {
    fn from(value: Box<T>) -> Self {
        let p = unsafe { NonNull::new_unchecked(Box::into_raw(value)) };
        unsafe { Self::from_raw_with_deleter(p, DefaultDelete) }
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for UniquePtr<T, D> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for UniquePtr<T, D> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get().expect("dereferenced a null UniquePtr")
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for UniquePtr<T, D> {
    fn deref_mut(&mut self) -> &mut T {
        self.get_mut().expect("dereferenced a null UniquePtr")
    }
}

impl<T: ?Sized, D: Deleter<T>> PartialEq for UniquePtr<T, D> {
    fn eq(&self, other: &Self) -> bool {
        thin(self.ptr) == thin(other.ptr)
    }
}

impl<T: ?Sized, D: Deleter<T>> Eq for UniquePtr<T, D> {}

impl<T: ?Sized, D: Deleter<T>> PartialOrd for UniquePtr<T, D> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized, D: Deleter<T>> Ord for UniquePtr<T, D> {
    fn cmp(&self, other: &Self) -> Ordering {
        thin(self.ptr).cmp(&thin(other.ptr))
    }
}

impl<T: ?Sized, D: Deleter<T>> Hash for UniquePtr<T, D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        thin(self.ptr).hash(state);
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T>> fmt::Debug for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("UniquePtr").field(&v).finish(),
            None => f.write_str("UniquePtr(null)"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> fmt::Pointer for UniquePtr<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(thin(self.ptr) as *const u8), f)
    }
}

/// Sole owner of a slice. Elements are reached by index; there is no
/// dereference to a single element.
pub struct UniqueArray<T, D: Deleter<[T]> = DefaultDelete> {
    inner: UniquePtr<[T], D>,
}

impl<T> UniqueArray<T> {
    /// `n` default-initialized elements.
    pub fn new_default(n: usize) -> Self
    where
        T: Default,
    {
        Self::from((0..n).map(|_| T::default()).collect::<Vec<T>>())
    }

    pub fn into_boxed_slice(self) -> Option<Box<[T]>> {
        self.inner.into_box()
    }

    pub fn reset_to(&mut self, value: Box<[T]>) {
        self.inner.reset_to(value);
    }
}

impl<T, D: Deleter<[T]>> UniqueArray<T, D> {
    pub fn null() -> Self
    where
        D: Default,
    {
        Self {
            inner: UniquePtr::null(),
        }
    }

    /// # Safety
    /// `ptr` must be valid for `[T]` and deletable exactly once by `deleter`.
    pub unsafe fn from_raw_with_deleter(ptr: NonNull<[T]>, deleter: D) -> Self {
        Self {
            inner: UniquePtr::from_raw_with_deleter(ptr, deleter),
        }
    }

    /// Element count; 0 when null.
    pub fn len(&self) -> usize {
        self.inner.get().map_or(0, <[T]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_null(&self) -> bool {
        self.inner.is_null()
    }

    pub fn as_slice(&self) -> &[T] {
        self.inner.get().unwrap_or(&[])
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.inner.get_mut().unwrap_or(&mut [])
    }

    pub fn get_deleter(&self) -> &D {
        self.inner.get_deleter()
    }

    pub fn release(&mut self) -> Option<NonNull<[T]>> {
        self.inner.release()
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    /// # Safety
    /// Same contract as `UniquePtr::reset_raw`.
    pub unsafe fn reset_raw(&mut self, ptr: Option<NonNull<[T]>>) {
        self.inner.reset_raw(ptr);
    }

    pub fn swap(&mut self, other: &mut Self) {
        self.inner.swap(&mut other.inner);
    }

    pub fn into_raw_parts(self) -> (Option<NonNull<[T]>>, D) {
        self.inner.into_raw_parts()
    }
}

impl<T> From<Vec<T>> for UniqueArray<T> {
    fn from(value: Vec<T>) -> Self {
        Self::from(value.into_boxed_slice())
    }
}

impl<T> From<Box<[T]>> for UniqueArray<T> {
    fn from(value: Box<[T]>) -> Self {
        Self {
            inner: UniquePtr::from(value),
        }
    }
}

impl<T, D: Deleter<[T]> + Default> Default for UniqueArray<T, D> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T, D: Deleter<[T]>> Index<usize> for UniqueArray<T, D> {
    type Output = T;

    fn index(&self, i: usize) -> &T {
        let s = self.inner.get().expect("indexed a null UniqueArray");
        &s[i]
    }
}

impl<T, D: Deleter<[T]>> IndexMut<usize> for UniqueArray<T, D> {
    fn index_mut(&mut self, i: usize) -> &mut T {
        let s = self.inner.get_mut().expect("indexed a null UniqueArray");
        &mut s[i]
    }
}

impl<T: fmt::Debug, D: Deleter<[T]>> fmt::Debug for UniqueArray<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.get() {
            Some(s) => f.debug_tuple("UniqueArray").field(&s).finish(),
            None => f.write_str("UniqueArray(null)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn convert_with_maps_null_without_calling_the_pointer_map() {
        #[derive(Default)]
        struct Plain;
        impl Deleter<u32> for Plain {
            unsafe fn delete(&mut self, p: NonNull<u32>) {
                drop(Box::from_raw(p.as_ptr()));
            }
        }
        struct Wide(Plain);
        impl Deleter<[u32]> for Wide {
            unsafe fn delete(&mut self, p: NonNull<[u32]>) {
                self.0.delete(p.cast::<u32>());
            }
        }

        let null: UniquePtr<u32, Plain> = UniquePtr::null();
        let mapped: UniquePtr<[u32], Wide> = unsafe {
            null.convert_with(|_| unreachable!("null has no pointer to map"), Wide)
        };
        assert!(mapped.is_null());

        let raw = NonNull::from(Box::leak(Box::new(5u32)));
        let one = unsafe { UniquePtr::from_raw_with_deleter(raw, Plain) };
        let as_slice: UniquePtr<[u32], Wide> =
            unsafe { one.convert_with(|p| NonNull::slice_from_raw_parts(p, 1), Wide) };
        assert_eq!(as_slice.get(), Some(&[5u32][..]));
    }

    #[test]
    fn release_hands_ownership_to_the_caller() {
        let mut u = UniquePtr::new(String::from("kept"));
        let raw = u.release().unwrap();
        assert!(u.is_null());
        drop(u);
        let back = unsafe { Box::from_raw(raw.as_ptr()) };
        assert_eq!(*back, "kept");
    }

    #[test]
    fn reset_installs_new_pointer_before_deleting() {
        let log: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));
        let seen = log.clone();
        let deleter = move |p: NonNull<u32>| {
            let b = unsafe { Box::from_raw(p.as_ptr()) };
            seen.borrow_mut().push(*b);
        };
        let first = NonNull::from(Box::leak(Box::new(1u32)));
        let second = NonNull::from(Box::leak(Box::new(2u32)));
        let mut u = unsafe { UniquePtr::from_raw_with_deleter(first, deleter) };
        unsafe { u.reset_raw(Some(second)) };
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(*u, 2);
        u.reset();
        assert_eq!(*log.borrow(), vec![1, 2]);
        u.reset();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn into_raw_parts_keeps_the_deleter() {
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let deleter = move |p: NonNull<u8>| {
            c.set(c.get() + 1);
            drop(unsafe { Box::from_raw(p.as_ptr()) });
        };
        let p = NonNull::from(Box::leak(Box::new(9u8)));
        let u = unsafe { UniquePtr::from_raw_with_deleter(p, deleter) };
        let (raw, mut d) = u.into_raw_parts();
        assert_eq!(calls.get(), 0);
        unsafe { d.delete(raw.unwrap()) };
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn convert_to_trait_object() {
        let u = UniquePtr::new(5i32);
        let d: UniquePtr<dyn fmt::Debug> = u.convert(|b| b as Box<dyn fmt::Debug>);
        assert_eq!(format!("{:?}", d), "UniquePtr(5)");
        let null: UniquePtr<i32> = UniquePtr::null();
        assert!(null.convert(|b| b as Box<dyn fmt::Debug>).is_null());
    }

    #[test]
    #[should_panic(expected = "dereferenced a null UniquePtr")]
    fn deref_null_panics() {
        let u: UniquePtr<i32> = UniquePtr::default();
        let _v: i32 = *u;
    }

    #[test]
    fn array_indexing_and_reset() {
        let mut a = UniqueArray::from(vec![1, 2, 3]);
        a[1] = 20;
        assert_eq!(a.as_slice(), &[1, 20, 3]);
        assert_eq!(a.len(), 3);
        a.reset_to(vec![7].into_boxed_slice());
        assert_eq!(a[0], 7);
        a.reset();
        assert!(a.is_null());
        assert!(a.is_empty());
        let d: UniqueArray<u8> = UniqueArray::new_default(4);
        assert_eq!(d.as_slice(), &[0, 0, 0, 0]);
    }

    #[test]
    fn ordering_is_by_address() {
        let a = UniquePtr::new(1);
        let b = UniquePtr::new(1);
        assert_ne!(a, b);
        let null: UniquePtr<i32> = UniquePtr::null();
        assert!(null < a && null < b);
        assert_eq!(null, UniquePtr::null());
    }
}
