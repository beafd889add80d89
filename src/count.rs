//! Single-threaded use counts for the smart-pointer control block.

use core::cell::Cell;

/// Non-atomic reference counter.
#[derive(Debug)]
pub(crate) struct Counter {
    count: Cell<usize>,
}

impl Counter {
    pub(crate) fn new(initial: usize) -> Self {
        Self {
            count: Cell::new(initial),
        }
    }

    #[inline]
    pub(crate) fn get(&self) -> usize {
        self.count.get()
    }

    #[inline]
    pub(crate) fn inc(&self) {
        let n = self.count.get().wrapping_add(1);
        self.count.set(n);
        if n == 0 {
            // Follow Rc semantics: abort on overflow rather than continue unsafely.
            std::process::abort();
        }
    }

    /// Returns true if the count is now zero.
    #[inline]
    pub(crate) fn dec(&self) -> bool {
        let c = self.count.get();
        assert!(c > 0, "Counter underflow");
        let n = c - 1;
        self.count.set(n);
        n == 0
    }

    /// Increments only when the count is non-zero.
    #[inline]
    pub(crate) fn inc_if_live(&self) -> bool {
        if self.count.get() == 0 {
            return false;
        }
        self.inc();
        true
    }
}

/// Strong and weak counts of one control block.
///
/// The strong owners collectively hold one weak reference, so `weak` stays
/// above zero until the last strong owner has finished disposing the object.
/// `implicit` records whether that reference is still held; it outlives the
/// strong count, which reaches zero before `dispose` runs.
#[derive(Debug)]
pub(crate) struct Counts {
    pub(crate) strong: Counter,
    pub(crate) weak: Counter,
    implicit: Cell<bool>,
}

impl Counts {
    pub(crate) fn new() -> Self {
        Self {
            strong: Counter::new(1),
            weak: Counter::new(1),
            implicit: Cell::new(true),
        }
    }

    /// Marks the strong owners' weak reference as given up. The caller
    /// decrements `weak` right after.
    pub(crate) fn release_implicit(&self) {
        debug_assert!(self.implicit.get(), "implicit weak reference released twice");
        self.implicit.set(false);
    }

    /// Weak count as observed by users: excludes the reference held on
    /// behalf of the strong owners, including while the object is disposed.
    pub(crate) fn user_weak(&self) -> usize {
        self.weak.get() - usize::from(self.implicit.get())
    }
}
