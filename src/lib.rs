//! stl-core: AVL-balanced ordered containers and single-threaded
//! shared/weak/unique smart pointers.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the ordered containers and the smart pointers in small,
//!   verifiable layers so each piece can be reasoned about independently.
//! - Layers:
//!   - AvlTree<K, V, C>: structural engine. Nodes live in a slotmap arena and
//!     reference each other by generational key; a `Link::Header` value plays
//!     the header sentinel (parent of the root, `end` position). Returns
//!     stable `Handle`s and bidirectional `Cursor`s.
//!   - Set / MultiSet / Map / MultiMap: thin wrappers fixing the key
//!     multiplicity and the payload shape. Multi containers store a
//!     multiplicity counter per node; MultiMap keeps the values of one key in
//!     a list whose length equals that counter.
//!   - control: type-erased control blocks (counts + deleter + allocator).
//!   - SharedPtr / WeakPtr / UniquePtr: user-facing owners built on the
//!     control block and the `Deleter` trait.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (no atomics).
//! - All allocation happens before any link is rewritten, so allocation
//!   failure never leaves a half-linked tree or a half-built control block.
//! - Unique containers reject duplicates without mutating.
//! - Stale handles, and handles issued by another tree (clones included),
//!   resolve to `None`; they never alias a reused or foreign slot.
//!
//! Removal never moves payloads
//! - Erasing a node with two children relinks its in-order successor into
//!   the node's position instead of swapping payloads, so handles and the
//!   successor captured before an erase stay valid.
//!
//! Control block lifetime
//! - The strong owners collectively hold one weak reference. The last strong
//!   release disposes the object and then drops that weak reference; the
//!   last weak release frees the block through the allocator stored in it.
//!   A destructor that drops weak pointers to its own block therefore never
//!   frees the block under `dispose`.
//! - Reference-count overflow aborts, like `Rc`; underflow is a bug and
//!   panics.
//!
//! Invariant checking
//! - `AvlTree::validate` checks ordering, parent links, heights, balance,
//!   multiplicities and the tracked length. With the `invariant-checks`
//!   feature (and always in unit tests) it runs after every mutation.
//!
//! Notes and non-goals
//! - No atomic (thread-safe) reference counting.
//! - No node pooling; every node is a slot in the tree's arena.
//! - Comparators must be strict weak orderings; violating that is not
//!   detected and leaves lookups unspecified, never unsound.

pub mod alloc;
pub mod avl_tree;
mod avl_tree_proptest;
pub mod compare;
mod control;
mod count;
pub mod deleter;
pub mod error;
pub mod map;
pub mod set;
pub mod shared_ptr;
pub mod unique_ptr;
pub mod weak_ptr;

// Public surface
pub use alloc::TypedAllocator;
pub use avl_tree::{AvlTree, Cursor, Handle, Multiplicity, Release};
pub use compare::{Compare, Natural, Reversed};
pub use deleter::{DefaultDelete, Deleter};
pub use error::{AllocFailure, BadWeakPtr, InsertError, InvariantViolation};
pub use map::{Map, MultiMap};
pub use set::{MultiSet, Set};
pub use shared_ptr::{
    allocate_shared, const_pointer_cast, dynamic_pointer_cast, get_deleter, make_shared,
    static_pointer_cast, OwnerLess, OwnerOrder, SharedPtr,
};
pub use unique_ptr::{UniqueArray, UniquePtr};
pub use weak_ptr::WeakPtr;
