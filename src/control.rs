//! Control blocks shared by `SharedPtr` and `WeakPtr`.
//!
//! A block holds the strong/weak counts and knows how to destroy the managed
//! object (`dispose`) and how to free itself (`deallocator`). Teardown has two
//! phases:
//! - the last strong owner disposes the object, then gives up the single weak
//!   reference held on behalf of all strong owners;
//! - the last weak reference frees the block through the allocator stored
//!   inside it.
//!
//! `dispose` may run arbitrary destructors that drop other pointers to the
//! same block; the implicit weak reference keeps the block alive until
//! `dispose` has returned.
//!
//! Blocks are type-erased behind `NonNull<dyn ControlBlock>`, which requires
//! the managed type, the deleter and the allocator to be `'static`.

use crate::alloc::{Allocator, TypedAllocator};
use crate::count::Counts;
use crate::deleter::Deleter;
use crate::error::AllocFailure;
use core::any::Any;
use core::cell::UnsafeCell;
use core::mem::ManuallyDrop;
use core::ptr::{self, NonNull};
use tracing::trace;

pub(crate) type BlockPtr = NonNull<dyn ControlBlock>;

pub(crate) trait ControlBlock {
    fn counts(&self) -> &Counts;

    /// Destroys the managed object.
    ///
    /// # Safety
    /// Called exactly once, after the strong count reached zero.
    unsafe fn dispose(&self);

    /// The deleter supplied at construction, if any.
    fn deleter(&self) -> Option<&dyn Any>;

    /// Frees a block of this concrete type. Returned as a plain function so
    /// the block is never freed while a `&self` to it is live.
    fn deallocator(&self) -> unsafe fn(BlockPtr);
}

/// Block for an object allocated elsewhere and released by a deleter.
struct PtrBlock<T: ?Sized, D, A> {
    counts: Counts,
    ptr: NonNull<T>,
    deleter: UnsafeCell<ManuallyDrop<D>>,
    alloc: ManuallyDrop<A>,
}

impl<T, D, A> ControlBlock for PtrBlock<T, D, A>
where
    T: ?Sized + 'static,
    D: Deleter<T> + 'static,
    A: Allocator + 'static,
{
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn dispose(&self) {
        trace!(kind = "pointer", "disposing managed object");
        let deleter = &mut *self.deleter.get();
        deleter.delete(self.ptr);
    }

    fn deleter(&self) -> Option<&dyn Any> {
        // The deleter is only mutated inside `dispose`, after which no strong
        // owner is left to ask for it.
        let d: &D = unsafe { &*self.deleter.get() };
        Some(d as &dyn Any)
    }

    fn deallocator(&self) -> unsafe fn(BlockPtr) {
        free_ptr_block::<T, D, A>
    }
}

unsafe fn free_ptr_block<T, D, A>(block: BlockPtr)
where
    T: ?Sized + 'static,
    D: Deleter<T> + 'static,
    A: Allocator + 'static,
{
    trace!(kind = "pointer", "freeing control block");
    let this = block.cast::<PtrBlock<T, D, A>>();
    let b = &mut *this.as_ptr();
    ManuallyDrop::drop(b.deleter.get_mut());
    let alloc = ManuallyDrop::take(&mut b.alloc);
    TypedAllocator::<PtrBlock<T, D, A>, A>::new_in(alloc).deallocate(this, 1);
}

/// Block that stores the managed object inline (`make_shared`).
struct InlineBlock<T, A> {
    counts: Counts,
    alloc: ManuallyDrop<A>,
    value: UnsafeCell<ManuallyDrop<T>>,
}

impl<T: 'static, A: Allocator + 'static> ControlBlock for InlineBlock<T, A> {
    fn counts(&self) -> &Counts {
        &self.counts
    }

    unsafe fn dispose(&self) {
        trace!(kind = "inline", "disposing managed object");
        ManuallyDrop::drop(&mut *self.value.get());
    }

    fn deleter(&self) -> Option<&dyn Any> {
        None
    }

    fn deallocator(&self) -> unsafe fn(BlockPtr) {
        free_inline_block::<T, A>
    }
}

unsafe fn free_inline_block<T: 'static, A: Allocator + 'static>(block: BlockPtr) {
    trace!(kind = "inline", "freeing control block");
    let this = block.cast::<InlineBlock<T, A>>();
    let alloc = ManuallyDrop::take(&mut (*this.as_ptr()).alloc);
    TypedAllocator::<InlineBlock<T, A>, A>::new_in(alloc).deallocate(this, 1);
}

/// Allocates a block that will release `ptr` with `deleter`.
///
/// When the block cannot be allocated, `deleter` is run on `ptr` before the
/// error is returned, so ownership never leaks.
///
/// # Safety
/// `ptr` must be valid for `T` and deletable exactly once by `deleter`.
pub(crate) unsafe fn new_ptr_block<T, D, A>(
    ptr: NonNull<T>,
    mut deleter: D,
    alloc: A,
) -> Result<BlockPtr, AllocFailure>
where
    T: ?Sized + 'static,
    D: Deleter<T> + 'static,
    A: Allocator + 'static,
{
    let typed = TypedAllocator::<PtrBlock<T, D, A>, A>::new_in(alloc);
    let mem = match typed.allocate(1) {
        Ok(mem) => mem,
        Err(e) => {
            deleter.delete(ptr);
            return Err(e);
        }
    };
    mem.as_ptr().write(PtrBlock {
        counts: Counts::new(),
        ptr,
        deleter: UnsafeCell::new(ManuallyDrop::new(deleter)),
        alloc: ManuallyDrop::new(typed.into_inner()),
    });
    trace!(kind = "pointer", "control block created");
    let block: BlockPtr = mem;
    Ok(block)
}

/// Allocates one block holding both the counts and `value`. Returns the
/// block and a pointer to the stored value.
pub(crate) fn new_inline_block<T, A>(
    value: T,
    alloc: TypedAllocator<T, A>,
) -> Result<(BlockPtr, NonNull<T>), AllocFailure>
where
    T: 'static,
    A: Allocator + 'static,
{
    let typed = alloc.rebind::<InlineBlock<T, A>>();
    let mem = typed.allocate(1)?;
    unsafe {
        mem.as_ptr().write(InlineBlock {
            counts: Counts::new(),
            alloc: ManuallyDrop::new(typed.into_inner()),
            value: UnsafeCell::new(ManuallyDrop::new(value)),
        });
        // ManuallyDrop is transparent, so the cell's pointer is the value's.
        let value = UnsafeCell::raw_get(ptr::addr_of!((*mem.as_ptr()).value)).cast::<T>();
        trace!(kind = "inline", "control block created");
        let block: BlockPtr = mem;
        Ok((block, NonNull::new_unchecked(value)))
    }
}

/// Drops one strong reference; disposes the object and then drops the
/// strong owners' weak reference when it was the last.
///
/// # Safety
/// The caller must own one strong reference to a live block.
pub(crate) unsafe fn release_strong(block: BlockPtr) {
    let last = block.as_ref().counts().strong.dec();
    if last {
        block.as_ref().dispose();
        block.as_ref().counts().release_implicit();
        release_weak(block);
    }
}

/// Drops one weak reference and frees the block when it was the last.
///
/// # Safety
/// The caller must own one weak reference to a live block.
pub(crate) unsafe fn release_weak(block: BlockPtr) {
    let free = {
        let b = block.as_ref();
        if !b.counts().weak.dec() {
            return;
        }
        b.deallocator()
    };
    free(block);
}

/// Strong count of a block, 0 for none.
pub(crate) fn strong_count(block: Option<BlockPtr>) -> usize {
    block.map_or(0, |b| unsafe { b.as_ref() }.counts().strong.get())
}

/// Weak count of a block as users see it, 0 for none.
pub(crate) fn weak_count(block: Option<BlockPtr>) -> usize {
    block.map_or(0, |b| unsafe { b.as_ref() }.counts().user_weak())
}

/// Address identifying the block, used for owner-based ordering.
pub(crate) fn owner_addr(block: Option<BlockPtr>) -> usize {
    block.map_or(0, |b| b.cast::<u8>().as_ptr() as usize)
}
