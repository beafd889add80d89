//! Ordered sets over `AvlTree`: `Set` (unique keys) and `MultiSet`
//! (duplicates stored as a multiplicity on one node).

use crate::avl_tree::{self, AvlTree, Cursor, Handle, Multiplicity, Release};
use crate::compare::{Compare, Natural};
use crate::error::InsertError;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};

pub struct Set<T, C = Natural> {
    tree: AvlTree<T, (), C>,
}

impl<T: Ord> Set<T> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<T, C> Set<T, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: AvlTree::with_comparator(Multiplicity::Unique, cmp),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn height(&self) -> u32 {
        self.tree.height()
    }

    /// Ascending iteration; `.rev()` walks from the largest element.
    pub fn iter(&self) -> Iter<'_, T, C> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    pub fn begin(&self) -> Cursor<'_, T, (), C> {
        self.tree.first()
    }

    pub fn end(&self) -> Cursor<'_, T, (), C> {
        self.tree.end()
    }

    pub fn first(&self) -> Option<&T> {
        self.tree.first().key()
    }

    pub fn last(&self) -> Option<&T> {
        self.tree.last().key()
    }

    /// Element at `h`, `None` once it has been erased.
    pub fn resolve(&self, h: Handle) -> Option<&T> {
        self.tree.key(h)
    }

    pub fn cursor(&self, h: Handle) -> Option<Cursor<'_, T, (), C>> {
        self.tree.cursor(h)
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }
}

impl<T, C: Compare<T>> Set<T, C> {
    /// Inserts `value` unless an equal element exists, in which case the set
    /// is unchanged and the blocking element's handle is returned.
    pub fn insert(&mut self, value: T) -> Result<Handle, InsertError> {
        match self.tree.insert(value, ()) {
            (h, true) => Ok(h),
            (existing, false) => Err(InsertError::DuplicateKey { existing }),
        }
    }

    /// Inserts just before `hint` (`None` is `end`) when that keeps the
    /// order; otherwise behaves like `insert`.
    pub fn insert_hint(&mut self, hint: Option<Handle>, value: T) -> Result<Handle, InsertError> {
        match self.tree.insert_hint(hint, value, ()) {
            (h, true) => Ok(h),
            (existing, false) => Err(InsertError::DuplicateKey { existing }),
        }
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.get(q).is_some()
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q).key()
    }

    pub fn handle<Q>(&self, q: &Q) -> Option<Handle>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.get(q)
    }

    pub fn find<Q>(&self, q: &Q) -> Cursor<'_, T, (), C>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q)
    }

    /// 0 or 1.
    pub fn count<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.count(q)
    }

    pub fn lower_bound<Q>(&self, q: &Q) -> Cursor<'_, T, (), C>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.lower_bound(q)
    }

    pub fn upper_bound<Q>(&self, q: &Q) -> Cursor<'_, T, (), C>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.upper_bound(q)
    }

    pub fn equal_range<Q>(&self, q: &Q) -> (Cursor<'_, T, (), C>, Cursor<'_, T, (), C>)
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.equal_range(q)
    }

    /// Removes the element equal to `q`; returns how many were removed.
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.erase_key(q)
    }

    /// Removes and returns the element equal to `q`.
    pub fn take<Q>(&mut self, q: &Q) -> Option<T>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.get(q)?;
        self.erase_at(h)
    }

    /// Removes the element at `h`; `None` for a stale handle.
    pub fn erase_at(&mut self, h: Handle) -> Option<T> {
        self.tree.remove(h).map(|(k, _, _)| k)
    }

    /// Removes `[first, last)`; `None` for `last` means up to the end.
    pub fn erase_range(&mut self, first: Handle, last: Option<Handle>) -> usize {
        self.tree.erase_range(first, last)
    }

    pub fn pop_first(&mut self) -> Option<T> {
        let h = self.tree.first().handle()?;
        self.erase_at(h)
    }

    pub fn pop_last(&mut self) -> Option<T> {
        let h = self.tree.last().handle()?;
        self.erase_at(h)
    }
}

impl<T: Ord> Default for Set<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C: Clone> Clone for Set<T, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for Set<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, C> PartialEq for Set<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq, C> Eq for Set<T, C> {}

impl<T: PartialOrd, C> PartialOrd for Set<T, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord, C> Ord for Set<T, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash, C> Hash for Set<T, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for t in self {
            t.hash(state);
        }
    }
}

impl<T, C: Compare<T> + Default> FromIterator<T> for Set<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut s = Self::with_comparator(C::default());
        s.extend(iter);
        s
    }
}

/// Elements equal to one already present are dropped.
impl<T, C: Compare<T>> Extend<T> for Set<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            let _ = self.insert(v);
        }
    }
}

impl<'a, T, C> IntoIterator for &'a Set<T, C> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, C>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, C: Compare<T>> IntoIterator for Set<T, C> {
    type Item = T;
    type IntoIter = IntoIter<T, C>;
    fn into_iter(self) -> Self::IntoIter {
        IntoIter { set: self }
    }
}

pub struct Iter<'a, T, C = Natural> {
    inner: avl_tree::Iter<'a, T, (), C>,
}

impl<'a, T, C> Iterator for Iter<'a, T, C> {
    type Item = &'a T;
    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        self.inner.next().map(|(k, _, _)| k)
    }
}

impl<'a, T, C> DoubleEndedIterator for Iter<'a, T, C> {
    fn next_back(&mut self) -> Option<&'a T> {
        self.inner.next_back().map(|(k, _, _)| k)
    }
}

pub struct IntoIter<T, C = Natural> {
    set: Set<T, C>,
}

impl<T, C: Compare<T>> Iterator for IntoIter<T, C> {
    type Item = T;
    fn next(&mut self) -> Option<T> {
        self.set.pop_first()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.set.len(), Some(self.set.len()))
    }
}

impl<T, C: Compare<T>> DoubleEndedIterator for IntoIter<T, C> {
    fn next_back(&mut self) -> Option<T> {
        self.set.pop_last()
    }
}

impl<T, C: Compare<T>> ExactSizeIterator for IntoIter<T, C> {}

/// Ordered multiset. Equal elements share one node; the first inserted
/// instance is the one stored, later ones only raise its multiplicity.
pub struct MultiSet<T, C = Natural> {
    tree: AvlTree<T, (), C>,
}

impl<T: Ord> MultiSet<T> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<T, C> MultiSet<T, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: AvlTree::with_comparator(Multiplicity::Multi, cmp),
        }
    }

    /// Total number of elements, counting duplicates.
    pub fn len(&self) -> usize {
        self.tree.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of distinct elements.
    pub fn distinct_len(&self) -> usize {
        self.tree.node_count()
    }

    pub fn height(&self) -> u32 {
        self.tree.height()
    }

    /// Every element in order, each repeated by its multiplicity.
    pub fn iter(&self) -> MultiIter<'_, T, C> {
        MultiIter {
            inner: self.tree.iter(),
            front: None,
            back: None,
        }
    }

    /// Distinct elements with their multiplicities.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = (&T, usize)> + '_ {
        self.tree.iter().map(|(k, _, n)| (k, n))
    }

    pub fn begin(&self) -> Cursor<'_, T, (), C> {
        self.tree.first()
    }

    pub fn end(&self) -> Cursor<'_, T, (), C> {
        self.tree.end()
    }

    pub fn resolve(&self, h: Handle) -> Option<&T> {
        self.tree.key(h)
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }
}

impl<T, C: Compare<T>> MultiSet<T, C> {
    /// Always inserts; returns the handle of the node holding `value`.
    pub fn insert(&mut self, value: T) -> Handle {
        self.tree.insert(value, ()).0
    }

    pub fn insert_hint(&mut self, hint: Option<Handle>, value: T) -> Handle {
        self.tree.insert_hint(hint, value, ()).0
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.count(q)
    }

    pub fn contains<Q>(&self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.get(q).is_some()
    }

    pub fn find<Q>(&self, q: &Q) -> Cursor<'_, T, (), C>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q)
    }

    pub fn lower_bound<Q>(&self, q: &Q) -> Cursor<'_, T, (), C>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.lower_bound(q)
    }

    pub fn upper_bound<Q>(&self, q: &Q) -> Cursor<'_, T, (), C>
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.upper_bound(q)
    }

    pub fn equal_range<Q>(&self, q: &Q) -> (Cursor<'_, T, (), C>, Cursor<'_, T, (), C>)
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.equal_range(q)
    }

    /// Removes every instance of `q`; returns how many there were.
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.erase_key(q)
    }

    /// Removes a single instance of `q`.
    pub fn erase_one<Q>(&mut self, q: &Q) -> bool
    where
        T: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.erase_one(q)
    }

    /// Removes one instance of the element at `h`. Returns the stored element
    /// once its last instance is gone.
    pub fn erase_at(&mut self, h: Handle) -> Option<Release<T, ()>> {
        self.tree.release(h)
    }

    /// Removes every instance in `[first, last)`.
    pub fn erase_range(&mut self, first: Handle, last: Option<Handle>) -> usize {
        self.tree.erase_range(first, last)
    }
}

impl<T: Ord> Default for MultiSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C: Clone> Clone for MultiSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for MultiSet<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: PartialEq, C> PartialEq for MultiSet<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<T: Eq, C> Eq for MultiSet<T, C> {}

impl<T: PartialOrd, C> PartialOrd for MultiSet<T, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<T: Ord, C> Ord for MultiSet<T, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<T: Hash, C> Hash for MultiSet<T, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for (t, n) in self.entries() {
            t.hash(state);
            state.write_usize(n);
        }
    }
}

impl<T, C: Compare<T> + Default> FromIterator<T> for MultiSet<T, C> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut s = Self::with_comparator(C::default());
        s.extend(iter);
        s
    }
}

impl<T, C: Compare<T>> Extend<T> for MultiSet<T, C> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for v in iter {
            self.insert(v);
        }
    }
}

impl<'a, T, C> IntoIterator for &'a MultiSet<T, C> {
    type Item = &'a T;
    type IntoIter = MultiIter<'a, T, C>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator repeating each distinct element by its multiplicity.
pub struct MultiIter<'a, T, C = Natural> {
    inner: avl_tree::Iter<'a, T, (), C>,
    front: Option<(&'a T, usize)>,
    back: Option<(&'a T, usize)>,
}

fn take_one<'a, T>(slot: &mut Option<(&'a T, usize)>) -> Option<&'a T> {
    match slot {
        Some((t, n)) if *n > 0 => {
            *n -= 1;
            Some(*t)
        }
        _ => None,
    }
}

impl<'a, T, C> Iterator for MultiIter<'a, T, C> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some(t) = take_one(&mut self.front) {
                return Some(t);
            }
            match self.inner.next() {
                Some((t, _, n)) => self.front = Some((t, n)),
                None => return take_one(&mut self.back),
            }
        }
    }
}

impl<'a, T, C> DoubleEndedIterator for MultiIter<'a, T, C> {
    fn next_back(&mut self) -> Option<&'a T> {
        loop {
            if let Some(t) = take_one(&mut self.back) {
                return Some(t);
            }
            match self.inner.next_back() {
                Some((t, _, n)) => self.back = Some((t, n)),
                None => return take_one(&mut self.front),
            }
        }
    }
}
