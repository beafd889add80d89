//! Ordered maps over `AvlTree`: `Map` (unique keys) and `MultiMap`.
//!
//! A `MultiMap` node keeps every mapped value of its key in insertion order;
//! the node's multiplicity always equals the number of stored values.

use crate::avl_tree::{self, AvlTree, Cursor, Handle, Multiplicity};
use crate::compare::{Compare, Natural};
use crate::error::InsertError;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Index;

pub struct Map<K, V, C = Natural> {
    tree: AvlTree<K, V, C>,
}

impl<K: Ord, V> Map<K, V> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<K, V, C> Map<K, V, C> {
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

    pub fn iter(&self) -> Iter<'_, K, V, C> {
        Iter {
            inner: self.tree.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.tree.iter_mut(),
        }
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl DoubleEndedIterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl DoubleEndedIterator<Item = &mut V> + '_ {
        self.iter_mut().map(|(_, v)| v)
    }

    pub fn begin(&self) -> Cursor<'_, K, V, C> {
        self.tree.first()
    }

    pub fn end(&self) -> Cursor<'_, K, V, C> {
        self.tree.end()
    }

    pub fn first(&self) -> Option<(&K, &V)> {
        self.tree.first().entry()
    }

    pub fn last(&self) -> Option<(&K, &V)> {
        self.tree.last().entry()
    }

    pub fn resolve(&self, h: Handle) -> Option<(&K, &V)> {
        self.tree.entry(h)
    }

    pub fn resolve_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.tree.value_mut(h)
    }

    pub fn cursor(&self, h: Handle) -> Option<Cursor<'_, K, V, C>> {
        self.tree.cursor(h)
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }
}

impl<K, V, C: Compare<K>> Map<K, V, C> {
    /// Inserts `key -> value` unless the key is present; a duplicate leaves
    /// the map unchanged and reports the existing entry.
    pub fn insert(&mut self, key: K, value: V) -> Result<Handle, InsertError> {
        self.emplace_with(key, || value)
    }

    /// Like `insert`, but `make` runs only when the key is absent.
    pub fn emplace_with<F>(&mut self, key: K, make: F) -> Result<Handle, InsertError>
    where
        F: FnOnce() -> V,
    {
        let (hint, existing) = {
            let c = self.tree.lower_bound(&key);
            let equal = c
                .key()
                .is_some_and(|k| self.tree.comparator().compare(k, &key) == Ordering::Equal);
            (c.handle(), if equal { c.handle() } else { None })
        };
        if let Some(existing) = existing {
            return Err(InsertError::DuplicateKey { existing });
        }
        // `hint` is the first entry after `key`, so the hinted insert attaches
        // without another descent.
        Ok(self.tree.insert_hint(hint, key, make()).0)
    }

    pub fn insert_hint(&mut self, hint: Option<Handle>, key: K, value: V) -> Result<Handle, InsertError> {
        match self.tree.insert_hint(hint, key, value) {
            (h, true) => Ok(h),
            (existing, false) => Err(InsertError::DuplicateKey { existing }),
        }
    }

    /// Mutable access to `key`'s value, inserting `V::default()` first when
    /// the key is absent.
    pub fn get_or_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        let h = match self.emplace_with(key, V::default) {
            Ok(h) => h,
            Err(InsertError::DuplicateKey { existing }) => existing,
        };
        self.tree
            .value_mut(h)
            .expect("handle from emplace_with is live")
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q).value()
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q).entry()
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.get(q)?;
        self.tree.value_mut(h)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.get(q).is_some()
    }

    pub fn handle<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.get(q)
    }

    pub fn find<Q>(&self, q: &Q) -> Cursor<'_, K, V, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q)
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.count(q)
    }

    pub fn lower_bound<Q>(&self, q: &Q) -> Cursor<'_, K, V, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.lower_bound(q)
    }

    pub fn upper_bound<Q>(&self, q: &Q) -> Cursor<'_, K, V, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.upper_bound(q)
    }

    pub fn equal_range<Q>(&self, q: &Q) -> (Cursor<'_, K, V, C>, Cursor<'_, K, V, C>)
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.equal_range(q)
    }

    /// Removes `q`'s entry; returns how many entries were removed.
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.erase_key(q)
    }

    /// Removes `q`'s entry and returns its value.
    pub fn remove<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.get(q)?;
        self.erase_at(h).map(|(_, v)| v)
    }

    pub fn erase_at(&mut self, h: Handle) -> Option<(K, V)> {
        self.tree.remove(h).map(|(k, v, _)| (k, v))
    }

    pub fn erase_range(&mut self, first: Handle, last: Option<Handle>) -> usize {
        self.tree.erase_range(first, last)
    }

    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let h = self.tree.first().handle()?;
        self.erase_at(h)
    }

    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let h = self.tree.last().handle()?;
        self.erase_at(h)
    }
}

impl<K: Ord, V> Default for Map<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for Map<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for Map<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq, C> PartialEq for Map<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, C> Eq for Map<K, V, C> {}

impl<K: PartialOrd, V: PartialOrd, C> PartialOrd for Map<K, V, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord, V: Ord, C> Ord for Map<K, V, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K: Hash, V: Hash, C> Hash for Map<K, V, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for kv in self {
            kv.hash(state);
        }
    }
}

impl<K, V, C: Compare<K> + Default> FromIterator<(K, V)> for Map<K, V, C> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::with_comparator(C::default());
        m.extend(iter);
        m
    }
}

/// Pairs whose key is already present are dropped.
impl<K, V, C: Compare<K>> Extend<(K, V)> for Map<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            let _ = self.insert(k, v);
        }
    }
}

/// Panics when `q` is absent.
impl<K, V, C, Q> Index<&Q> for Map<K, V, C>
where
    K: Borrow<Q>,
    C: Compare<K> + Compare<Q>,
    Q: ?Sized,
{
    type Output = V;

    fn index(&self, q: &Q) -> &V {
        self.get(q).expect("key not present in Map")
    }
}

impl<'a, K, V, C> IntoIterator for &'a Map<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, C>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a mut Map<K, V, C> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

pub struct Iter<'a, K, V, C = Natural> {
    inner: avl_tree::Iter<'a, K, V, C>,
}

impl<'a, K, V, C> Iterator for Iter<'a, K, V, C> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v, _)| (k, v))
    }
}

impl<'a, K, V, C> DoubleEndedIterator for Iter<'a, K, V, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, v, _)| (k, v))
    }
}

pub struct IterMut<'a, K, V> {
    inner: avl_tree::IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, v, _)| (k, v))
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, v, _)| (k, v))
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {}

pub struct MultiMap<K, V, C = Natural> {
    tree: AvlTree<K, Vec<V>, C>,
}

impl<K: Ord, V> MultiMap<K, V> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }
}

impl<K, V, C> MultiMap<K, V, C> {
    pub fn with_comparator(cmp: C) -> Self {
        Self {
            tree: AvlTree::with_comparator(Multiplicity::Multi, cmp),
        }
    }

    /// Total number of values.
    pub fn len(&self) -> usize {
        self.tree.len()
    }
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Number of distinct keys.
    pub fn distinct_len(&self) -> usize {
        self.tree.node_count()
    }

    pub fn height(&self) -> u32 {
        self.tree.height()
    }

    /// Every `(key, value)` pair, keys ascending, values in insertion order.
    pub fn iter(&self) -> MultiIter<'_, K, V, C> {
        MultiIter {
            nodes: self.tree.iter(),
            front: None,
            back: None,
        }
    }

    /// Each key with all of its values.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = (&K, &[V])> + '_ {
        self.tree.iter().map(|(k, vs, _)| (k, vs.as_slice()))
    }

    pub fn begin(&self) -> Cursor<'_, K, Vec<V>, C> {
        self.tree.first()
    }

    pub fn end(&self) -> Cursor<'_, K, Vec<V>, C> {
        self.tree.end()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }

    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }
}

impl<K, V, C: Compare<K>> MultiMap<K, V, C> {
    /// Always inserts; `value` goes after any values already mapped to `key`.
    pub fn insert(&mut self, key: K, value: V) -> Handle {
        self.tree
            .insert_with(key, vec![value], |stored, mut added| stored.append(&mut added))
            .0
    }

    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.count(q)
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.get(q).is_some()
    }

    /// First value mapped to `q`.
    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.get_all(q).first()
    }

    /// All values mapped to `q`, empty when absent.
    pub fn get_all<Q>(&self, q: &Q) -> &[V]
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q).value().map_or(&[][..], Vec::as_slice)
    }

    pub fn handle<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.get(q)
    }

    pub fn find<Q>(&self, q: &Q) -> Cursor<'_, K, Vec<V>, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.find(q)
    }

    pub fn lower_bound<Q>(&self, q: &Q) -> Cursor<'_, K, Vec<V>, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.lower_bound(q)
    }

    pub fn upper_bound<Q>(&self, q: &Q) -> Cursor<'_, K, Vec<V>, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.upper_bound(q)
    }

    pub fn equal_range<Q>(
        &self,
        q: &Q,
    ) -> (Cursor<'_, K, Vec<V>, C>, Cursor<'_, K, Vec<V>, C>)
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.equal_range(q)
    }

    /// Removes every value of `q`; returns how many there were.
    pub fn erase<Q>(&mut self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        self.tree.erase_key(q)
    }

    /// Removes and returns the first value of `q`.
    pub fn erase_one<Q>(&mut self, q: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let h = self.tree.get(q)?;
        self.erase_at(h, 0)
    }

    /// Removes the `index`-th value of the key at `h`. The key's node goes
    /// away with its last value.
    pub fn erase_at(&mut self, h: Handle, index: usize) -> Option<V> {
        let values = self.tree.value_mut(h)?;
        if index >= values.len() {
            return None;
        }
        if values.len() > 1 {
            let v = values.remove(index);
            self.tree.release(h);
            debug_assert_eq!(self.tree.multiplicity(h), self.tree.value(h).map_or(0, Vec::len));
            return Some(v);
        }
        self.tree.remove(h).and_then(|(_, mut values, _)| values.pop())
    }

    /// Removes every value of the keys in `[first, last)`.
    pub fn erase_range(&mut self, first: Handle, last: Option<Handle>) -> usize {
        self.tree.erase_range(first, last)
    }
}

impl<K: Ord, V> Default for MultiMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone, C: Clone> Clone for MultiMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for MultiMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K: PartialEq, V: PartialEq, C> PartialEq for MultiMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}

impl<K: Eq, V: Eq, C> Eq for MultiMap<K, V, C> {}

impl<K: PartialOrd, V: PartialOrd, C> PartialOrd for MultiMap<K, V, C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.iter().partial_cmp(other.iter())
    }
}

impl<K: Ord, V: Ord, C> Ord for MultiMap<K, V, C> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.iter().cmp(other.iter())
    }
}

impl<K: Hash, V: Hash, C> Hash for MultiMap<K, V, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.len());
        for kv in self {
            kv.hash(state);
        }
    }
}

impl<K, V, C: Compare<K> + Default> FromIterator<(K, V)> for MultiMap<K, V, C> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::with_comparator(C::default());
        m.extend(iter);
        m
    }
}

impl<K, V, C: Compare<K>> Extend<(K, V)> for MultiMap<K, V, C> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<'a, K, V, C> IntoIterator for &'a MultiMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = MultiIter<'a, K, V, C>;
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Flattens each key's value list into `(key, value)` pairs.
pub struct MultiIter<'a, K, V, C = Natural> {
    nodes: avl_tree::Iter<'a, K, Vec<V>, C>,
    front: Option<(&'a K, core::slice::Iter<'a, V>)>,
    back: Option<(&'a K, core::slice::Iter<'a, V>)>,
}

impl<'a, K, V, C> Iterator for MultiIter<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((k, vs)) = &mut self.front {
                if let Some(v) = vs.next() {
                    return Some((*k, v));
                }
            }
            match self.nodes.next() {
                Some((k, vs, _)) => self.front = Some((k, vs.iter())),
                None => {
                    let (k, vs) = self.back.as_mut()?;
                    return vs.next().map(|v| (*k, v));
                }
            }
        }
    }
}

impl<'a, K, V, C> DoubleEndedIterator for MultiIter<'a, K, V, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((k, vs)) = &mut self.back {
                if let Some(v) = vs.next_back() {
                    return Some((*k, v));
                }
            }
            match self.nodes.next_back() {
                Some((k, vs, _)) => self.back = Some((k, vs.iter())),
                None => {
                    let (k, vs) = self.front.as_mut()?;
                    return vs.next_back().map(|v| (*k, v));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicates_and_keeps_first_value() {
        let mut m = Map::new();
        let h = m.insert("k", 1).unwrap();
        assert_eq!(m.insert("k", 2), Err(InsertError::DuplicateKey { existing: h }));
        assert_eq!(m.get("k"), Some(&1));
        assert_eq!(m["k"], 1);
    }

    #[test]
    fn emplace_with_is_lazy() {
        let mut m: Map<u32, String> = Map::new();
        let mut calls = 0;
        m.emplace_with(1, || {
            calls += 1;
            "one".into()
        })
        .unwrap();
        assert!(m
            .emplace_with(1, || {
                calls += 1;
                "uno".into()
            })
            .is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn get_or_default_acts_as_subscript() {
        let mut m: Map<&str, u32> = Map::new();
        *m.get_or_default("a") += 1;
        *m.get_or_default("a") += 1;
        *m.get_or_default("b") += 5;
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![(&"a", &2), (&"b", &5)]);
    }

    #[test]
    fn iteration_views_and_mutation() {
        let mut m: Map<i32, i32> = (0..5).map(|k| (k, k * k)).collect();
        for v in m.values_mut() {
            *v += 1;
        }
        assert_eq!(m.values().copied().collect::<Vec<_>>(), vec![1, 2, 5, 10, 17]);
        assert_eq!(m.keys().rev().copied().collect::<Vec<_>>(), vec![4, 3, 2, 1, 0]);
        assert_eq!(m.first(), Some((&0, &1)));
        assert_eq!(m.pop_last(), Some((4, 17)));
        assert_eq!(m.remove(&2), Some(5));
        assert_eq!(m.len(), 3);
    }

    #[test]
    #[should_panic(expected = "key not present in Map")]
    fn index_of_missing_key_panics() {
        let m: Map<i32, i32> = Map::new();
        let _ = m[&1];
    }

    #[test]
    fn multimap_keeps_values_in_insertion_order() {
        let mut mm = MultiMap::new();
        mm.insert(2, "b1");
        mm.insert(1, "a");
        mm.insert(2, "b2");
        mm.insert(2, "b3");
        assert_eq!(mm.count(&2), 3);
        assert_eq!(mm.get_all(&2), &["b1", "b2", "b3"]);
        assert_eq!(
            mm.iter().collect::<Vec<_>>(),
            vec![(&1, &"a"), (&2, &"b1"), (&2, &"b2"), (&2, &"b3")]
        );
        assert_eq!(mm.iter().rev().next(), Some((&2, &"b3")));
        assert_eq!(mm.erase_one(&2), Some("b1"));
        assert_eq!(mm.count(&2), 2);
        let h = mm.handle(&2).unwrap();
        assert_eq!(mm.erase_at(h, 1), Some("b3"));
        assert_eq!(mm.erase_at(h, 5), None);
        assert_eq!(mm.erase_at(h, 0), Some("b2"));
        assert_eq!(mm.count(&2), 0);
        assert_eq!(mm.len(), 1);
        assert_eq!(mm.erase(&1), 1);
        assert!(mm.is_empty());
    }

    #[test]
    fn multimap_iterates_from_both_ends_without_overlap() {
        let mm: MultiMap<u8, u8> = [(1, 10), (1, 11), (2, 20)].into_iter().collect();
        let mut it = mm.iter();
        assert_eq!(it.next_back(), Some((&2, &20)));
        assert_eq!(it.next_back(), Some((&1, &11)));
        assert_eq!(it.next(), Some((&1, &10)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next_back(), None);
    }
}
