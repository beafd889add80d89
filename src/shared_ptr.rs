//! SharedPtr: single-threaded shared ownership through a control block.
//!
//! A `SharedPtr` is a (stored pointer, control block) pair. The stored pointer
//! is what `get`/`Deref` return; the control block decides when the managed
//! object dies. The two differ only for aliasing pointers, which share an
//! owner's lifetime while pointing at something inside it.
//!
//! Single-threaded: counts are plain `Cell`s and the type is `!Send`/`!Sync`.
//! Types that can own a managed object (values, deleters, allocators) must be
//! `'static` because the control block is type-erased.

use crate::alloc::{Allocator, Global, TypedAllocator};
use crate::compare::Compare;
use crate::control::{self, BlockPtr};
use crate::deleter::{DefaultDelete, Deleter};
use crate::error::{AllocFailure, BadWeakPtr};
use crate::unique_ptr::UniquePtr;
use crate::weak_ptr::WeakPtr;
use core::any::Any;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;
use core::ops::Deref;
use core::ptr::NonNull;

pub struct SharedPtr<T: ?Sized> {
    pub(crate) ptr: Option<NonNull<T>>,
    pub(crate) block: Option<BlockPtr>,
    _marker: PhantomData<T>,
}

/// Infallible constructors route allocation failure here, like `Box::new`.
fn alloc_failed(e: AllocFailure) -> ! {
    match e {
        AllocFailure::Exhausted { layout } => std::alloc::handle_alloc_error(layout),
        AllocFailure::CapacityOverflow => panic!("capacity overflow"),
    }
}

impl<T: ?Sized> SharedPtr<T> {
    pub(crate) fn from_parts(ptr: Option<NonNull<T>>, block: Option<BlockPtr>) -> Self {
        Self {
            ptr,
            block,
            _marker: PhantomData,
        }
    }

    /// A pointer that owns nothing and points nowhere.
    pub const fn empty() -> Self {
        Self {
            ptr: None,
            block: None,
            _marker: PhantomData,
        }
    }

    /// Takes ownership of `ptr`, to be released with `deleter`.
    ///
    /// # Safety
    /// `ptr` must be valid for `T` and deletable exactly once by `deleter`.
    pub unsafe fn from_raw_with_deleter<D>(ptr: NonNull<T>, deleter: D) -> Self
    where
        T: 'static,
        D: Deleter<T> + 'static,
    {
        match Self::from_raw_in(ptr, deleter, Global) {
            Ok(p) => p,
            Err(e) => alloc_failed(e),
        }
    }

    /// Like `from_raw_with_deleter`, allocating the control block with
    /// `alloc`. On failure the deleter has already released `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid for `T` and deletable exactly once by `deleter`.
    pub unsafe fn from_raw_in<D, A>(ptr: NonNull<T>, deleter: D, alloc: A) -> Result<Self, AllocFailure>
    where
        T: 'static,
        D: Deleter<T> + 'static,
        A: Allocator + 'static,
    {
        let block = control::new_ptr_block(ptr, deleter, alloc)?;
        Ok(Self::from_parts(Some(ptr), Some(block)))
    }

    /// Shares `owner`'s control block while pointing at `ptr`.
    ///
    /// # Safety
    /// `ptr` must stay valid for as long as `owner`'s managed object lives.
    pub unsafe fn aliasing<U: ?Sized>(owner: &SharedPtr<U>, ptr: NonNull<T>) -> Self {
        if let Some(b) = owner.block {
            b.as_ref().counts().strong.inc();
        }
        Self::from_parts(Some(ptr), owner.block)
    }

    /// Safe aliasing: shares `this`'s ownership while pointing at a part of
    /// the managed object. An empty pointer maps to an empty pointer.
    pub fn map<U: ?Sized, F>(this: &Self, f: F) -> SharedPtr<U>
    where
        F: for<'a> FnOnce(&'a T) -> &'a U,
    {
        match this.get() {
            Some(v) => {
                let part = NonNull::from(f(v));
                unsafe { SharedPtr::aliasing(this, part) }
            }
            None => SharedPtr::empty(),
        }
    }

    pub fn get(&self) -> Option<&T> {
        // Live as long as self holds a strong reference.
        self.ptr.map(|p| unsafe { &*p.as_ptr() })
    }

    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_none()
    }

    /// Number of `SharedPtr`s sharing this control block; 0 when empty.
    pub fn use_count(&self) -> usize {
        control::strong_count(self.block)
    }

    pub fn unique(&self) -> bool {
        self.use_count() == 1
    }

    /// Number of `WeakPtr`s observing this control block.
    pub fn weak_count(&self) -> usize {
        control::weak_count(self.block)
    }

    /// Releases ownership and becomes empty.
    pub fn reset(&mut self) {
        drop(core::mem::replace(self, Self::empty()));
    }

    /// Releases ownership and takes over `value` instead.
    pub fn reset_to(&mut self, value: Box<T>)
    where
        T: 'static,
    {
        drop(core::mem::replace(self, Self::from(value)));
    }

    /// Releases ownership and takes over `ptr`, to be released with
    /// `deleter`. The new object is in place before the old one goes.
    ///
    /// # Safety
    /// `ptr` must be valid for `T` and deletable exactly once by `deleter`.
    pub unsafe fn reset_raw_with_deleter<D>(&mut self, ptr: NonNull<T>, deleter: D)
    where
        T: 'static,
        D: Deleter<T> + 'static,
    {
        drop(core::mem::replace(self, Self::from_raw_with_deleter(ptr, deleter)));
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    pub fn downgrade(this: &Self) -> WeakPtr<T> {
        WeakPtr::from(this)
    }

    /// Whether both store the same address.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        thin(a.ptr) == thin(b.ptr)
    }
}

impl<T: 'static> SharedPtr<T> {
    /// Stores `value` and the counts in one allocation.
    pub fn new(value: T) -> Self {
        match allocate_shared(TypedAllocator::new(), value) {
            Ok(p) => p,
            Err(e) => alloc_failed(e),
        }
    }
}

fn thin<T: ?Sized>(p: Option<NonNull<T>>) -> usize {
    p.map_or(0, |p| p.cast::<u8>().as_ptr() as usize)
}

impl<T: ?Sized> Drop for SharedPtr<T> {
    fn drop(&mut self) {
        if let Some(b) = self.block.take() {
            unsafe { control::release_strong(b) };
        }
    }
}

impl<T: ?Sized> Clone for SharedPtr<T> {
    fn clone(&self) -> Self {
        if let Some(b) = self.block {
            unsafe { b.as_ref() }.counts().strong.inc();
        }
        Self::from_parts(self.ptr, self.block)
    }
}

impl<T: ?Sized> Default for SharedPtr<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for SharedPtr<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.get().expect("dereferenced an empty SharedPtr")
    }
}

impl<T: ?Sized> PartialEq for SharedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Eq for SharedPtr<T> {}

impl<T: ?Sized> PartialOrd for SharedPtr<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by stored address; empty pointers sort first.
impl<T: ?Sized> Ord for SharedPtr<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        thin(self.ptr).cmp(&thin(other.ptr))
    }
}

impl<T: ?Sized> Hash for SharedPtr<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        thin(self.ptr).hash(state);
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(v) => f.debug_tuple("SharedPtr").field(&v).finish(),
            None => f.write_str("SharedPtr(null)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&(thin(self.ptr) as *const u8), f)
    }
}

impl<T: ?Sized + 'static> From<Box<T>> for SharedPtr<T> {
    fn from(value: Box<T>) -> Self {
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(value)) };
        unsafe { Self::from_raw_with_deleter(ptr, DefaultDelete) }
    }
}

/// Takes over the object and the deleter; a null `UniquePtr` gives an
/// empty `SharedPtr`.
impl<T, D> From<UniquePtr<T, D>> for SharedPtr<T>
where
    T: ?Sized + 'static,
    D: Deleter<T> + 'static,
{
    fn from(value: UniquePtr<T, D>) -> Self {
        match value.into_raw_parts() {
            (Some(ptr), deleter) => unsafe { Self::from_raw_with_deleter(ptr, deleter) },
            (None, _) => Self::empty(),
        }
    }
}

/// Fails with `BadWeakPtr` when the object is already gone.
impl<T: ?Sized> TryFrom<&WeakPtr<T>> for SharedPtr<T> {
    type Error = BadWeakPtr;

    fn try_from(weak: &WeakPtr<T>) -> Result<Self, BadWeakPtr> {
        let p = weak.lock();
        if p.block.is_some() {
            Ok(p)
        } else {
            Err(BadWeakPtr)
        }
    }
}

/// Equivalent to `SharedPtr::new`.
pub fn make_shared<T: 'static>(value: T) -> SharedPtr<T> {
    SharedPtr::new(value)
}

/// Like `make_shared`, with the combined block allocated through `alloc`
/// (rebound to the block type). The allocator is stored in the block and
/// used again to free it.
pub fn allocate_shared<T, A>(alloc: TypedAllocator<T, A>, value: T) -> Result<SharedPtr<T>, AllocFailure>
where
    T: 'static,
    A: Allocator + 'static,
{
    let (block, ptr) = control::new_inline_block(value, alloc)?;
    Ok(SharedPtr::from_parts(Some(ptr), Some(block)))
}

/// Reinterprets the stored pointer as `U`, sharing ownership.
///
/// # Safety
/// The pointee must be a valid `U` for as long as the owner lives.
pub unsafe fn static_pointer_cast<U, T: ?Sized>(p: &SharedPtr<T>) -> SharedPtr<U> {
    match p.ptr {
        Some(ptr) => SharedPtr::aliasing(p, ptr.cast::<U>()),
        None => SharedPtr::empty(),
    }
}

/// Checked downcast sharing ownership; empty when the dynamic type differs.
pub fn dynamic_pointer_cast<U: Any>(p: &SharedPtr<dyn Any>) -> SharedPtr<U> {
    match p.get().and_then(|v| v.downcast_ref::<U>()) {
        Some(u) => {
            let ptr = NonNull::from(u);
            unsafe { SharedPtr::aliasing(p, ptr) }
        }
        None => SharedPtr::empty(),
    }
}

/// Shared borrows are already read-only in Rust, so removing constness is
/// a plain copy of the pointer.
pub fn const_pointer_cast<T: ?Sized>(p: &SharedPtr<T>) -> SharedPtr<T> {
    p.clone()
}

/// The deleter given at construction, if it is a `D`. `None` for
/// `make_shared` pointers and empty pointers.
pub fn get_deleter<D: Any, T: ?Sized>(p: &SharedPtr<T>) -> Option<&D> {
    let b = p.block?;
    // The block outlives `p`'s strong reference.
    unsafe { b.as_ref() }.deleter()?.downcast_ref::<D>()
}

/// Pointers whose ownership can be compared.
pub trait OwnerOrder {
    #[doc(hidden)]
    fn owner_addr(&self) -> usize;

    /// Ordering by control block, ignoring the stored pointer. Aliasing
    /// pointers of one owner are equivalent under it.
    fn owner_before<O: OwnerOrder + ?Sized>(&self, other: &O) -> bool {
        self.owner_addr() < other.owner_addr()
    }
}

impl<T: ?Sized> OwnerOrder for SharedPtr<T> {
    fn owner_addr(&self) -> usize {
        control::owner_addr(self.block)
    }
}

impl<T: ?Sized> OwnerOrder for WeakPtr<T> {
    fn owner_addr(&self) -> usize {
        control::owner_addr(self.block)
    }
}

/// Comparator ordering smart pointers by owner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct OwnerLess;

impl<P: OwnerOrder> Compare<P> for OwnerLess {
    fn compare(&self, a: &P, b: &P) -> Ordering {
        a.owner_addr().cmp(&b.owner_addr())
    }
}
