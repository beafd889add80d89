// Shared helpers for the integration tests.
//
// - DropCounter: payload that records how many times it was dropped.
// - CountingAllocator: forwards to Global and tracks live allocations, so a
//   test can assert every block it caused was freed again.
// - FailingAllocator: refuses every request.
#![allow(dead_code)]

use stl_core::alloc::{AllocError, Allocator, Global};
use std::alloc::Layout;
use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;

#[derive(Debug)]
pub struct DropCounter {
    pub id: u32,
    drops: Rc<Cell<usize>>,
}

impl DropCounter {
    pub fn new(id: u32, drops: &Rc<Cell<usize>>) -> Self {
        Self {
            id,
            drops: drops.clone(),
        }
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[derive(Clone, Default)]
pub struct CountingAllocator {
    live: Rc<Cell<isize>>,
    total: Rc<Cell<usize>>,
}

impl CountingAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocations not yet returned.
    pub fn live(&self) -> isize {
        self.live.get()
    }

    /// Allocations ever made.
    pub fn total(&self) -> usize {
        self.total.get()
    }
}

unsafe impl Allocator for CountingAllocator {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let mem = Global.allocate(layout)?;
        self.live.set(self.live.get() + 1);
        self.total.set(self.total.get() + 1);
        Ok(mem)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.live.set(self.live.get() - 1);
        Global.deallocate(ptr, layout)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FailingAllocator;

unsafe impl Allocator for FailingAllocator {
    fn allocate(&self, _layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        Err(AllocError)
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {
        unreachable!("FailingAllocator never hands out memory")
    }
}

/// Deterministic pseudo-random stream for shuffling inputs.
pub fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}
