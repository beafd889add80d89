//! Error types shared by the containers, the allocator capability and the
//! smart pointers.

use crate::avl_tree::Handle;
use core::alloc::Layout;
use thiserror::Error;

/// Returned by unique containers when an equal key is already present.
/// The container is left unchanged.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    #[error("an equal key is already present")]
    DuplicateKey {
        /// Position of the element that blocked the insert.
        existing: Handle,
    },
}

/// Allocation failure surfaced by the allocator capability.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocFailure {
    #[error("allocator could not satisfy {layout:?}")]
    Exhausted { layout: Layout },
    #[error("requested element count overflows the address space")]
    CapacityOverflow,
}

/// Converting an expired `WeakPtr` into a `SharedPtr`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Default)]
#[error("bad_weak_ptr: the managed object has already been destroyed")]
pub struct BadWeakPtr;

/// Structural problem reported by `AvlTree::validate`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    #[error("keys out of order at in-order position {position}")]
    Order { position: usize },
    #[error("child does not point back at its parent")]
    ParentLink,
    #[error("root is not linked to the header")]
    HeaderLink,
    #[error("stored height {stored} differs from computed height {computed}")]
    Height { stored: u32, computed: u32 },
    #[error("balance factor {factor} outside -1..=1")]
    Balance { factor: i64 },
    #[error("node multiplicity {count} not allowed in this tree")]
    Multiplicity { count: usize },
    #[error("tracked length {tracked} differs from counted length {counted}")]
    Length { tracked: usize, counted: usize },
    #[error("{reachable} nodes reachable from the root but {stored} stored")]
    Unreachable { reachable: usize, stored: usize },
}
