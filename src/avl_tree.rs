//! AvlTree: the height-balanced search tree under every ordered container.
//!
//! Nodes live in a `SlotMap` arena and refer to each other by generational
//! key, so rotations only rewrite keys and a removed node can never be reached
//! through a stale handle. The header sentinel is the `Link::Header` value: it
//! is the parent of the root and the `end` position, and the header record
//! holds the root link (or `Link::Header` itself when the tree is empty).
//!
//! Equal keys either collapse into one node with a multiplicity count
//! (`Multiplicity::Multi`) or are rejected (`Multiplicity::Unique`).
//!
//! Arena slots are reserved before any link is rewritten, so a failed
//! allocation leaves the tree untouched.
//!
//! Every tree draws a process-wide id at construction (and on `clone`), and
//! each `Handle` carries the id of the tree that issued it. A handle from
//! another tree is treated exactly like a stale one.

use crate::compare::{Compare, Natural};
use crate::error::InvariantViolation;
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use tracing::trace;

new_key_type! {
    pub(crate) struct NodeKey;
}

/// Stable position of an element. Stays valid until that element's node is
/// removed; afterwards, and in any other tree, every lookup with it returns
/// `None`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle {
    tree: usize,
    key: NodeKey,
}

static NEXT_TREE_ID: AtomicUsize = AtomicUsize::new(1);

fn next_tree_id() -> usize {
    NEXT_TREE_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

/// Either the header sentinel or a real node.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Link {
    Header,
    Node(NodeKey),
}

/// Whether equal keys are merged into one counted node or rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Multiplicity {
    Unique,
    Multi,
}

#[derive(Clone, Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    count: usize,
    height: u32,
    left: Option<NodeKey>,
    right: Option<NodeKey>,
    parent: Link,
}

#[derive(Copy, Clone, Debug)]
struct Header {
    left: Link,
}

/// Outcome of giving back one instance of an element.
#[derive(Debug, PartialEq, Eq)]
pub enum Release<K, V> {
    Live { remaining: usize },
    Removed { key: K, value: V },
}

#[derive(Copy, Clone)]
enum Slot {
    Attach { parent: Link, left: bool },
    Equal(NodeKey),
}

pub struct AvlTree<K, V, C = Natural> {
    nodes: SlotMap<NodeKey, Node<K, V>>,
    header: Header,
    cmp: C,
    mode: Multiplicity,
    len: usize,
    id: usize,
}

/// The copy is a different tree: handles issued by `self` do not resolve
/// in it.
impl<K: Clone, V: Clone, C: Clone> Clone for AvlTree<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            header: self.header,
            cmp: self.cmp.clone(),
            mode: self.mode,
            len: self.len,
            id: next_tree_id(),
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    pub fn new(mode: Multiplicity) -> Self {
        Self::with_comparator(mode, Natural)
    }
}

impl<K, V, C> AvlTree<K, V, C> {
    pub fn with_comparator(mode: Multiplicity, cmp: C) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            header: Header { left: Link::Header },
            cmp,
            mode,
            len: 0,
            id: next_tree_id(),
        }
    }

    fn handle_for(&self, key: NodeKey) -> Handle {
        Handle { tree: self.id, key }
    }

    /// Arena key behind `h`, if `h` was issued by this tree and is still live.
    fn live(&self, h: Handle) -> Option<NodeKey> {
        (h.tree == self.id && self.nodes.contains_key(h.key)).then_some(h.key)
    }

    /// Number of elements, counting every instance of a multi key.
    pub fn len(&self) -> usize {
        self.len
    }
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn mode(&self) -> Multiplicity {
        self.mode
    }

    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Height of the tree; 0 when empty.
    pub fn height(&self) -> u32 {
        self.height_of(self.root())
    }

    pub fn first(&self) -> Cursor<'_, K, V, C> {
        Cursor::new(self, self.min_link())
    }

    pub fn last(&self) -> Cursor<'_, K, V, C> {
        Cursor::new(self, self.max_link())
    }

    /// The header position, one past the last element.
    pub fn end(&self) -> Cursor<'_, K, V, C> {
        Cursor::new(self, Link::Header)
    }

    pub fn cursor(&self, h: Handle) -> Option<Cursor<'_, K, V, C>> {
        self.live(h).map(|k| Cursor::new(self, Link::Node(k)))
    }

    pub fn contains_handle(&self, h: Handle) -> bool {
        self.live(h).is_some()
    }

    pub fn key(&self, h: Handle) -> Option<&K> {
        self.live(h).map(|k| &self.nodes[k].key)
    }

    pub fn value(&self, h: Handle) -> Option<&V> {
        self.live(h).map(|k| &self.nodes[k].value)
    }

    pub fn value_mut(&mut self, h: Handle) -> Option<&mut V> {
        let k = self.live(h)?;
        Some(&mut self.nodes[k].value)
    }

    pub fn entry(&self, h: Handle) -> Option<(&K, &V)> {
        self.live(h).map(|k| {
            let n = &self.nodes[k];
            (&n.key, &n.value)
        })
    }

    /// Multiplicity of the element at `h`; 0 for a stale or foreign handle.
    pub fn multiplicity(&self, h: Handle) -> usize {
        self.live(h).map_or(0, |k| self.nodes[k].count)
    }

    pub fn iter(&self) -> Iter<'_, K, V, C> {
        Iter::between(self, self.min_link(), Link::Header)
    }

    /// In-order mutable iteration over `(key, value, multiplicity)`.
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let mut rank: SecondaryMap<NodeKey, usize> = SecondaryMap::with_capacity(self.nodes.len());
        let mut at = self.min_link();
        let mut n = 0;
        while let Link::Node(k) = at {
            rank.insert(k, n);
            n += 1;
            at = self.next_link(at);
        }
        let mut ordered: Vec<Option<(&K, &mut V, usize)>> = (0..n).map(|_| None).collect();
        for (k, node) in self.nodes.iter_mut() {
            if let Some(&r) = rank.get(k) {
                ordered[r] = Some((&node.key, &mut node.value, node.count));
            }
        }
        IterMut {
            inner: ordered.into_iter().flatten().collect::<Vec<_>>().into_iter(),
        }
    }

    /// Destroys every node and resets the header to the empty state.
    pub fn clear(&mut self) {
        let nodes = self.nodes.len();
        self.header.left = Link::Header;
        self.len = 0;
        self.nodes.clear();
        trace!(nodes, "avl tree cleared");
    }

    fn root(&self) -> Option<NodeKey> {
        match self.header.left {
            Link::Header => None,
            Link::Node(k) => Some(k),
        }
    }

    fn height_of(&self, k: Option<NodeKey>) -> u32 {
        k.map_or(0, |k| self.nodes[k].height)
    }

    fn update_height(&mut self, k: NodeKey) {
        let n = &self.nodes[k];
        let h = 1 + self.height_of(n.left).max(self.height_of(n.right));
        self.nodes[k].height = h;
    }

    fn balance_factor(&self, k: NodeKey) -> i64 {
        let n = &self.nodes[k];
        i64::from(self.height_of(n.left)) - i64::from(self.height_of(n.right))
    }

    fn min_from(&self, mut k: NodeKey) -> NodeKey {
        while let Some(l) = self.nodes[k].left {
            k = l;
        }
        k
    }

    fn max_from(&self, mut k: NodeKey) -> NodeKey {
        while let Some(r) = self.nodes[k].right {
            k = r;
        }
        k
    }

    fn min_link(&self) -> Link {
        self.root()
            .map_or(Link::Header, |r| Link::Node(self.min_from(r)))
    }

    fn max_link(&self) -> Link {
        self.root()
            .map_or(Link::Header, |r| Link::Node(self.max_from(r)))
    }

    /// In-order successor. The header has no successor and maps to itself.
    pub(crate) fn next_link(&self, at: Link) -> Link {
        let Link::Node(k) = at else {
            return Link::Header;
        };
        if let Some(r) = self.nodes[k].right {
            return Link::Node(self.min_from(r));
        }
        let mut child = k;
        while let Link::Node(p) = self.nodes[child].parent {
            if self.nodes[p].left == Some(child) {
                return Link::Node(p);
            }
            child = p;
        }
        Link::Header
    }

    /// In-order predecessor. The predecessor of the header is the maximum;
    /// the predecessor of the minimum is the header.
    pub(crate) fn prev_link(&self, at: Link) -> Link {
        let Link::Node(k) = at else {
            return self.max_link();
        };
        if let Some(l) = self.nodes[k].left {
            return Link::Node(self.max_from(l));
        }
        let mut child = k;
        while let Link::Node(p) = self.nodes[child].parent {
            if self.nodes[p].right == Some(child) {
                return Link::Node(p);
            }
            child = p;
        }
        Link::Header
    }

    /// Points `parent`'s link to `old` at `new` instead.
    fn replace_child(&mut self, parent: Link, old: NodeKey, new: Option<NodeKey>) {
        match parent {
            Link::Header => self.header.left = new.map_or(Link::Header, Link::Node),
            Link::Node(p) => {
                let node = &mut self.nodes[p];
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    debug_assert_eq!(node.right, Some(old));
                    node.right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, x: NodeKey) -> NodeKey {
        let y = self.nodes[x]
            .right
            .expect("left rotation needs a right child");
        let parent = self.nodes[x].parent;
        let inner = self.nodes[y].left;
        self.replace_child(parent, x, Some(y));
        self.nodes[x].right = inner;
        if let Some(b) = inner {
            self.nodes[b].parent = Link::Node(x);
        }
        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Link::Node(y);
        self.nodes[y].parent = parent;
        self.update_height(x);
        self.update_height(y);
        y
    }

    fn rotate_right(&mut self, x: NodeKey) -> NodeKey {
        let y = self.nodes[x]
            .left
            .expect("right rotation needs a left child");
        let parent = self.nodes[x].parent;
        let inner = self.nodes[y].right;
        self.replace_child(parent, x, Some(y));
        self.nodes[x].left = inner;
        if let Some(b) = inner {
            self.nodes[b].parent = Link::Node(x);
        }
        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Link::Node(y);
        self.nodes[y].parent = parent;
        self.update_height(x);
        self.update_height(y);
        y
    }

    /// Restores the AVL property at `k` and returns the root of the
    /// (possibly rotated) subtree.
    fn rebalance(&mut self, k: NodeKey) -> NodeKey {
        self.update_height(k);
        match self.balance_factor(k) {
            2 => {
                let l = self.nodes[k]
                    .left
                    .expect("left-heavy node has a left child");
                if self.balance_factor(l) < 0 {
                    trace!(kind = "left-right", "avl rotation");
                    self.rotate_left(l);
                } else {
                    trace!(kind = "right", "avl rotation");
                }
                self.rotate_right(k)
            }
            -2 => {
                let r = self.nodes[k]
                    .right
                    .expect("right-heavy node has a right child");
                if self.balance_factor(r) > 0 {
                    trace!(kind = "right-left", "avl rotation");
                    self.rotate_right(r);
                } else {
                    trace!(kind = "left", "avl rotation");
                }
                self.rotate_left(k)
            }
            _ => k,
        }
    }

    /// Walks from `from` up to the header, fixing heights and rotating.
    fn retrace(&mut self, from: Link) {
        let mut at = from;
        while let Link::Node(k) = at {
            let top = self.rebalance(k);
            at = self.nodes[top].parent;
        }
    }

    fn attach(&mut self, parent: Link, left: bool, key: K, value: V) -> NodeKey {
        let k = self.nodes.insert(Node {
            key,
            value,
            count: 1,
            height: 1,
            left: None,
            right: None,
            parent,
        });
        match parent {
            Link::Header => self.header.left = Link::Node(k),
            Link::Node(p) if left => self.nodes[p].left = Some(k),
            Link::Node(p) => self.nodes[p].right = Some(k),
        }
        self.len += 1;
        k
    }

    fn merge_existing<F>(&mut self, k: NodeKey, value: V, merge: F) -> (Handle, bool)
    where
        F: FnOnce(&mut V, V),
    {
        match self.mode {
            Multiplicity::Unique => (self.handle_for(k), false),
            Multiplicity::Multi => {
                let node = &mut self.nodes[k];
                node.count += 1;
                merge(&mut node.value, value);
                self.len += 1;
                (Handle { tree: self.id, key: k }, true)
            }
        }
    }

    /// Detaches node `z` from the tree, rebalances, and hands the record back
    /// so its payload is dropped only after the structure is consistent.
    fn unlink(&mut self, z: NodeKey) -> Node<K, V> {
        let (zl, zr, zp) = {
            let n = &self.nodes[z];
            (n.left, n.right, n.parent)
        };
        let retrace_from = match (zl, zr) {
            (None, None) => {
                self.replace_child(zp, z, None);
                zp
            }
            (Some(c), None) | (None, Some(c)) => {
                self.replace_child(zp, z, Some(c));
                self.nodes[c].parent = zp;
                zp
            }
            (Some(l), Some(r)) => {
                let s = self.min_from(r);
                let from = if s == r {
                    Link::Node(s)
                } else {
                    let Link::Node(sp) = self.nodes[s].parent else {
                        unreachable!("successor below the right child has a node parent")
                    };
                    let sr = self.nodes[s].right;
                    self.nodes[sp].left = sr;
                    if let Some(x) = sr {
                        self.nodes[x].parent = Link::Node(sp);
                    }
                    self.nodes[s].right = Some(r);
                    self.nodes[r].parent = Link::Node(s);
                    Link::Node(sp)
                };
                self.nodes[s].left = Some(l);
                self.nodes[l].parent = Link::Node(s);
                self.nodes[s].parent = zp;
                self.replace_child(zp, z, Some(s));
                from
            }
        };
        let node = self
            .nodes
            .remove(z)
            .expect("unlinked node must be stored in the arena");
        self.len -= node.count;
        self.retrace(retrace_from);
        node
    }

    fn check_invariants(&self)
    where
        C: Compare<K>,
    {
        #[cfg(any(test, feature = "invariant-checks"))]
        if let Err(e) = self.validate() {
            panic!("AvlTree invariant violated: {e}");
        }
    }

    /// Checks ordering, parent links, heights, balance, multiplicities and
    /// the tracked length.
    pub fn validate(&self) -> Result<(), InvariantViolation>
    where
        C: Compare<K>,
    {
        let reachable = match self.header.left {
            Link::Header => 0,
            Link::Node(root) => {
                if self.nodes.get(root).map(|n| n.parent) != Some(Link::Header) {
                    return Err(InvariantViolation::HeaderLink);
                }
                self.validate_subtree(root)?.1
            }
        };
        if reachable != self.nodes.len() {
            return Err(InvariantViolation::Unreachable {
                reachable,
                stored: self.nodes.len(),
            });
        }

        let mut counted = 0;
        let mut prev: Option<&K> = None;
        let mut at = self.min_link();
        let mut position = 0;
        while let Link::Node(k) = at {
            let n = &self.nodes[k];
            if n.count == 0 || (self.mode == Multiplicity::Unique && n.count != 1) {
                return Err(InvariantViolation::Multiplicity { count: n.count });
            }
            if let Some(p) = prev {
                if self.cmp.compare(p, &n.key) != Ordering::Less {
                    return Err(InvariantViolation::Order { position });
                }
            }
            prev = Some(&n.key);
            counted += n.count;
            position += 1;
            at = self.next_link(at);
        }
        if counted != self.len {
            return Err(InvariantViolation::Length {
                tracked: self.len,
                counted,
            });
        }
        Ok(())
    }

    /// Returns (height, node count) of the subtree at `k`.
    fn validate_subtree(&self, k: NodeKey) -> Result<(u32, usize), InvariantViolation> {
        let n = &self.nodes[k];
        let mut heights = [0u32; 2];
        let mut size = 1;
        for (i, child) in [n.left, n.right].into_iter().enumerate() {
            if let Some(c) = child {
                if self.nodes.get(c).map(|cn| cn.parent) != Some(Link::Node(k)) {
                    return Err(InvariantViolation::ParentLink);
                }
                let (h, s) = self.validate_subtree(c)?;
                heights[i] = h;
                size += s;
            }
        }
        let computed = 1 + heights[0].max(heights[1]);
        if n.height != computed {
            return Err(InvariantViolation::Height {
                stored: n.height,
                computed,
            });
        }
        let factor = i64::from(heights[0]) - i64::from(heights[1]);
        if factor.abs() > 1 {
            return Err(InvariantViolation::Balance { factor });
        }
        Ok((computed, size))
    }
}

impl<K, V, C: Compare<K>> AvlTree<K, V, C> {
    /// Position of the node equal to `q`, or the header.
    fn search<Q>(&self, q: &Q) -> Link
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut cur = self.root();
        while let Some(k) = cur {
            let n = &self.nodes[k];
            match Compare::<Q>::compare(&self.cmp, q, n.key.borrow()) {
                Ordering::Less => cur = n.left,
                Ordering::Greater => cur = n.right,
                Ordering::Equal => return Link::Node(k),
            }
        }
        Link::Header
    }

    /// Cursor at the element equal to `q`, or at `end`.
    pub fn find<Q>(&self, q: &Q) -> Cursor<'_, K, V, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        Cursor::new(self, self.search(q))
    }

    pub fn get<Q>(&self, q: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        match self.search(q) {
            Link::Header => None,
            Link::Node(k) => Some(self.handle_for(k)),
        }
    }

    /// Multiplicity of `q`; 0 when absent.
    pub fn count<Q>(&self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        match self.search(q) {
            Link::Header => 0,
            Link::Node(k) => self.nodes[k].count,
        }
    }

    /// First element not ordered before `q`.
    pub fn lower_bound<Q>(&self, q: &Q) -> Cursor<'_, K, V, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut best = Link::Header;
        let mut cur = self.root();
        while let Some(k) = cur {
            let n = &self.nodes[k];
            if Compare::<Q>::compare(&self.cmp, n.key.borrow(), q) == Ordering::Less {
                cur = n.right;
            } else {
                best = Link::Node(k);
                cur = n.left;
            }
        }
        Cursor::new(self, best)
    }

    /// First element ordered after `q`.
    pub fn upper_bound<Q>(&self, q: &Q) -> Cursor<'_, K, V, C>
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        let mut best = Link::Header;
        let mut cur = self.root();
        while let Some(k) = cur {
            let n = &self.nodes[k];
            if Compare::<Q>::compare(&self.cmp, q, n.key.borrow()) == Ordering::Less {
                best = Link::Node(k);
                cur = n.left;
            } else {
                cur = n.right;
            }
        }
        Cursor::new(self, best)
    }

    /// `(lower_bound(q), upper_bound(q))`.
    pub fn equal_range<Q>(&self, q: &Q) -> (Cursor<'_, K, V, C>, Cursor<'_, K, V, C>)
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        (self.lower_bound(q), self.upper_bound(q))
    }

    /// Inserts `key`. Returns the element's handle and whether the tree grew:
    /// a duplicate bumps the multiplicity in `Multi` mode and is rejected
    /// without mutation in `Unique` mode.
    pub fn insert(&mut self, key: K, value: V) -> (Handle, bool) {
        self.insert_with(key, value, |_, _| {})
    }

    /// Like `insert`, but a `Multi` duplicate hands its value to `merge`
    /// together with the stored one.
    pub fn insert_with<F>(&mut self, key: K, value: V, merge: F) -> (Handle, bool)
    where
        F: FnOnce(&mut V, V),
    {
        let mut parent = Link::Header;
        let mut left = true;
        let mut cur = self.root();
        while let Some(k) = cur {
            let n = &self.nodes[k];
            match self.cmp.compare(&key, &n.key) {
                Ordering::Less => {
                    parent = Link::Node(k);
                    left = true;
                    cur = n.left;
                }
                Ordering::Greater => {
                    parent = Link::Node(k);
                    left = false;
                    cur = n.right;
                }
                Ordering::Equal => return self.merge_existing(k, value, merge),
            }
        }
        let k = self.attach(parent, left, key, value);
        self.retrace(parent);
        self.check_invariants();
        (self.handle_for(k), true)
    }

    /// Inserts `key` immediately before `hint` (`None` is `end`), attaching
    /// inside the hint's left subtree without a search from the root.
    ///
    /// The hint is checked against its neighbours; a wrong or stale hint
    /// falls back to `insert`, so ordering can never be broken by it.
    pub fn insert_hint(&mut self, hint: Option<Handle>, key: K, value: V) -> (Handle, bool) {
        let at = match hint {
            None => Link::Header,
            Some(h) => match self.live(h) {
                Some(k) => Link::Node(k),
                None => return self.insert(key, value),
            },
        };
        match self.hint_slot(at, &key) {
            Some(Slot::Attach { parent, left }) => {
                let k = self.attach(parent, left, key, value);
                self.retrace(parent);
                self.check_invariants();
                (self.handle_for(k), true)
            }
            Some(Slot::Equal(k)) => self.merge_existing(k, value, |_, _| {}),
            None => self.insert(key, value),
        }
    }

    fn hint_slot(&self, at: Link, key: &K) -> Option<Slot> {
        if let Link::Node(h) = at {
            match self.cmp.compare(key, &self.nodes[h].key) {
                Ordering::Less => {}
                Ordering::Equal => return Some(Slot::Equal(h)),
                Ordering::Greater => return None,
            }
        }
        match self.prev_link(at) {
            // `at` is the minimum (its left link is free) or the tree is empty.
            Link::Header => Some(Slot::Attach {
                parent: at,
                left: true,
            }),
            Link::Node(p) => match self.cmp.compare(key, &self.nodes[p].key) {
                Ordering::Greater => match at {
                    Link::Node(h) if self.nodes[h].left.is_none() => Some(Slot::Attach {
                        parent: Link::Node(h),
                        left: true,
                    }),
                    // `p` is the maximum of the hint's left subtree.
                    _ => Some(Slot::Attach {
                        parent: Link::Node(p),
                        left: false,
                    }),
                },
                Ordering::Equal => Some(Slot::Equal(p)),
                Ordering::Less => None,
            },
        }
    }

    /// Gives back one instance of the element at `h`; the node is removed
    /// when its multiplicity reaches zero. `None` for a stale or foreign
    /// handle.
    pub fn release(&mut self, h: Handle) -> Option<Release<K, V>> {
        let k = self.live(h)?;
        let node = &mut self.nodes[k];
        if node.count > 1 {
            node.count -= 1;
            let remaining = node.count;
            self.len -= 1;
            self.check_invariants();
            return Some(Release::Live { remaining });
        }
        let node = self.unlink(k);
        self.check_invariants();
        Some(Release::Removed {
            key: node.key,
            value: node.value,
        })
    }

    /// Removes the node at `h` with every instance it holds. Returns the
    /// payload and the multiplicity it had.
    pub fn remove(&mut self, h: Handle) -> Option<(K, V, usize)> {
        let k = self.live(h)?;
        let node = self.unlink(k);
        self.check_invariants();
        Some((node.key, node.value, node.count))
    }

    /// Removes one instance of `q`. Returns whether anything was removed.
    pub fn erase_one<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        match self.search(q) {
            Link::Header => false,
            Link::Node(k) => self.release(self.handle_for(k)).is_some(),
        }
    }

    /// Removes every instance of `q` and returns how many there were.
    pub fn erase_key<Q>(&mut self, q: &Q) -> usize
    where
        K: Borrow<Q>,
        C: Compare<Q>,
        Q: ?Sized,
    {
        match self.search(q) {
            Link::Header => 0,
            Link::Node(k) => self.remove(self.handle_for(k)).map_or(0, |(_, _, n)| n),
        }
    }

    /// Removes every node from `first` up to, not including, `last`
    /// (`None` is `end`). Returns the number of elements removed. Nothing is
    /// removed when either bound is stale or belongs to another tree.
    pub fn erase_range(&mut self, first: Handle, last: Option<Handle>) -> usize {
        let Some(first) = self.live(first) else {
            return 0;
        };
        let stop = match last {
            None => Link::Header,
            Some(h) => match self.live(h) {
                Some(k) => Link::Node(k),
                None => return 0,
            },
        };
        let mut at = Link::Node(first);
        let mut removed = 0;
        while let Link::Node(k) = at {
            if at == stop {
                break;
            }
            // Successor first: removal relinks nodes but never moves payloads,
            // so the successor stays valid.
            let next = self.next_link(at);
            removed += self.unlink(k).count;
            at = next;
        }
        self.check_invariants();
        removed
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for AvlTree<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Bidirectional position inside an `AvlTree`. Borrowing the tree keeps
/// every position valid for the cursor's lifetime.
pub struct Cursor<'a, K, V, C = Natural> {
    tree: &'a AvlTree<K, V, C>,
    at: Link,
}

impl<'a, K, V, C> Clone for Cursor<'a, K, V, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, K, V, C> Copy for Cursor<'a, K, V, C> {}

impl<'a, K, V, C> Cursor<'a, K, V, C> {
    fn new(tree: &'a AvlTree<K, V, C>, at: Link) -> Self {
        Self { tree, at }
    }

    pub fn is_end(&self) -> bool {
        self.at == Link::Header
    }

    pub fn handle(&self) -> Option<Handle> {
        match self.at {
            Link::Header => None,
            Link::Node(k) => Some(self.tree.handle_for(k)),
        }
    }

    pub fn key(&self) -> Option<&'a K> {
        self.entry().map(|(k, _)| k)
    }

    pub fn value(&self) -> Option<&'a V> {
        self.entry().map(|(_, v)| v)
    }

    pub fn entry(&self) -> Option<(&'a K, &'a V)> {
        let tree = self.tree;
        match self.at {
            Link::Header => None,
            Link::Node(k) => {
                let n = &tree.nodes[k];
                Some((&n.key, &n.value))
            }
        }
    }

    /// Multiplicity of the current element; 0 at `end`.
    pub fn multiplicity(&self) -> usize {
        match self.at {
            Link::Header => 0,
            Link::Node(k) => self.tree.nodes[k].count,
        }
    }

    /// Steps forward. Stepping past the last element lands on `end`;
    /// stepping from `end` stays there.
    pub fn move_next(&mut self) {
        self.at = self.tree.next_link(self.at);
    }

    /// Steps backward. From `end` this lands on the last element; stepping
    /// back from the first element lands on `end`.
    pub fn move_prev(&mut self) {
        self.at = self.tree.prev_link(self.at);
    }

    pub fn peek_next(&self) -> Self {
        let mut c = *self;
        c.move_next();
        c
    }

    pub fn peek_prev(&self) -> Self {
        let mut c = *self;
        c.move_prev();
        c
    }

    /// Iterates from this cursor up to, not including, `end`. If `end` comes
    /// before this cursor the walk stops at the last element.
    ///
    /// # Panics
    /// When `end` belongs to a different tree.
    pub fn until(&self, end: &Self) -> Iter<'a, K, V, C> {
        assert!(
            core::ptr::eq(self.tree, end.tree),
            "Cursor::until called with a cursor from another tree"
        );
        Iter::between(self.tree, self.at, end.at)
    }
}

impl<'a, K, V, C> PartialEq for Cursor<'a, K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.tree, other.tree) && self.at == other.at
    }
}

impl<'a, K, V, C> Eq for Cursor<'a, K, V, C> {}

impl<'a, K: fmt::Debug, V, C> fmt::Debug for Cursor<'a, K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key() {
            Some(k) => f.debug_tuple("Cursor").field(k).finish(),
            None => f.write_str("Cursor(end)"),
        }
    }
}

/// In-order iterator over `(key, value, multiplicity)`.
pub struct Iter<'a, K, V, C = Natural> {
    tree: &'a AvlTree<K, V, C>,
    front: Link,
    back: Link,
    done: bool,
}

impl<'a, K, V, C> Iter<'a, K, V, C> {
    fn between(tree: &'a AvlTree<K, V, C>, first: Link, end: Link) -> Self {
        let done = first == end || first == Link::Header;
        let back = if done { Link::Header } else { tree.prev_link(end) };
        Self {
            tree,
            front: first,
            back,
            done,
        }
    }

    fn yield_at(&self, at: Link) -> Option<(&'a K, &'a V, usize)> {
        let tree = self.tree;
        match at {
            Link::Header => None,
            Link::Node(k) => {
                let n = &tree.nodes[k];
                Some((&n.key, &n.value, n.count))
            }
        }
    }
}

impl<'a, K, V, C> Clone for Iter<'a, K, V, C> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree,
            front: self.front,
            back: self.back,
            done: self.done,
        }
    }
}

impl<'a, K, V, C> Iterator for Iter<'a, K, V, C> {
    type Item = (&'a K, &'a V, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let at = self.front;
        if at == self.back || at == Link::Header {
            self.done = true;
        } else {
            self.front = self.tree.next_link(at);
        }
        self.yield_at(at)
    }
}

impl<'a, K, V, C> DoubleEndedIterator for Iter<'a, K, V, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let at = self.back;
        if at == self.front || at == Link::Header {
            self.done = true;
        } else {
            self.back = self.tree.prev_link(at);
        }
        self.yield_at(at)
    }
}

/// In-order mutable iterator over `(key, value, multiplicity)`.
pub struct IterMut<'a, K, V> {
    inner: std::vec::IntoIter<(&'a K, &'a mut V, usize)>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V, usize);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<'a, K, V> ExactSizeIterator for IterMut<'a, K, V> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V, C>(t: &AvlTree<i32, V, C>) -> Vec<i32> {
        t.iter().map(|(k, _, _)| *k).collect()
    }

    /// Ascending inserts force repeated left rotations; the tree stays
    /// logarithmic and ordered.
    #[test]
    fn ascending_inserts_stay_balanced() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        for k in 0..1024 {
            assert!(t.insert(k, ()).1);
        }
        assert_eq!(t.len(), 1024);
        assert_eq!(t.height(), 11);
        assert_eq!(keys(&t), (0..1024).collect::<Vec<_>>());
        t.validate().unwrap();
    }

    #[test]
    fn double_rotations_on_zigzag_inserts() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        for k in [30, 10, 20] {
            t.insert(k, ());
        }
        // left-right case: 20 becomes the root
        assert_eq!(t.first().peek_next().key(), Some(&20));
        assert_eq!(t.height(), 2);

        let mut u = AvlTree::new(Multiplicity::Unique);
        for k in [10, 30, 20] {
            u.insert(k, ());
        }
        assert_eq!(u.height(), 2);
        assert_eq!(keys(&u), vec![10, 20, 30]);
    }

    #[test]
    fn unique_duplicate_is_rejected_without_mutation() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        let (h, inserted) = t.insert(7, "first");
        assert!(inserted);
        let (h2, inserted) = t.insert(7, "second");
        assert!(!inserted);
        assert_eq!(h, h2);
        assert_eq!(t.value(h), Some(&"first"));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn multi_duplicates_bump_multiplicity() {
        let mut t = AvlTree::new(Multiplicity::Multi);
        for _ in 0..3 {
            assert!(t.insert(3, ()).1);
        }
        assert_eq!(t.count(&3), 3);
        assert_eq!(t.node_count(), 1);
        assert_eq!(t.len(), 3);
        assert!(t.erase_one(&3));
        assert_eq!(t.count(&3), 2);
        assert_eq!(t.erase_key(&3), 2);
        assert_eq!(t.count(&3), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn insert_with_merges_values() {
        let mut t: AvlTree<&str, Vec<i32>> = AvlTree::new(Multiplicity::Multi);
        t.insert_with("k", vec![1], |a, mut b| a.append(&mut b));
        t.insert_with("k", vec![2], |a, mut b| a.append(&mut b));
        let h = t.get("k").unwrap();
        assert_eq!(t.value(h), Some(&vec![1, 2]));
        assert_eq!(t.multiplicity(h), 2);
    }

    /// Leaf, single-child and two-children removals, including the root.
    #[test]
    fn erase_covers_all_unlink_shapes() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        for k in [50, 30, 70, 20, 40, 60, 80, 35, 45, 65] {
            t.insert(k, ());
        }
        assert_eq!(t.erase_key(&20), 1);
        // 60 has only its right child 65
        assert_eq!(t.erase_key(&60), 1);
        assert_eq!(t.erase_key(&30), 1);
        // successor of 70 is its right child 80
        assert_eq!(t.erase_key(&70), 1);
        assert_eq!(t.erase_key(&50), 1);
        assert_eq!(keys(&t), vec![35, 40, 45, 65, 80]);
        assert_eq!(t.erase_key(&999), 0);
        t.validate().unwrap();
    }

    #[test]
    fn handles_survive_unrelated_erasure() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        let handles: Vec<Handle> = (0..64).map(|k| t.insert(k, k * 10).0).collect();
        for k in (0..64).step_by(2) {
            t.erase_key(&k);
        }
        for k in (1..64).step_by(2) {
            assert_eq!(t.value(handles[k as usize]), Some(&(k * 10)));
        }
        assert_eq!(t.value(handles[0]), None);
        assert!(t.cursor(handles[0]).is_none());
    }

    #[test]
    fn cursor_round_trips_and_end_behaviour() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        for k in [5, 3, 8, 1, 4, 7, 9] {
            t.insert(k, ());
        }
        let mut c = t.first();
        while !c.is_end() {
            assert_eq!(c.peek_next().peek_prev(), c);
            if c != t.first() {
                assert_eq!(c.peek_prev().peek_next(), c);
            }
            c.move_next();
        }
        assert_eq!(t.end().peek_prev().key(), Some(&9));
        assert!(t.end().peek_next().is_end());
        assert!(t.first().peek_prev().is_end());
    }

    #[test]
    fn bounds_and_equal_range() {
        let mut t = AvlTree::new(Multiplicity::Multi);
        for k in [10, 20, 20, 30] {
            t.insert(k, ());
        }
        assert_eq!(t.lower_bound(&20).key(), Some(&20));
        assert_eq!(t.upper_bound(&20).key(), Some(&30));
        assert_eq!(t.lower_bound(&15).key(), Some(&20));
        assert!(t.lower_bound(&31).is_end());
        let (lo, hi) = t.equal_range(&20);
        let run: Vec<_> = lo.until(&hi).map(|(k, _, n)| (*k, n)).collect();
        assert_eq!(run, vec![(20, 2)]);
        let (lo, hi) = t.equal_range(&25);
        assert_eq!(lo, hi);
        assert_eq!(lo.until(&hi).count(), 0);
    }

    #[test]
    fn hint_insert_uses_valid_hints_and_recovers_from_bad_ones() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        // appending at end with the end hint
        for k in 0..100 {
            let (_, inserted) = t.insert_hint(None, k * 2, ());
            assert!(inserted);
        }
        // correct hint: 51 goes right before 52
        let h52 = t.get(&52).unwrap();
        assert!(t.insert_hint(Some(h52), 51, ()).1);
        // wrong hint: 7 is nowhere near 52, falls back to a full insert
        assert!(t.insert_hint(Some(h52), 7, ()).1);
        // equal to hint: rejected in unique mode
        assert!(!t.insert_hint(Some(h52), 52, ()).1);
        // stale hint
        let h10 = t.get(&10).unwrap();
        t.erase_key(&10);
        assert!(t.insert_hint(Some(h10), 11, ()).1);
        t.validate().unwrap();
        let ks = keys(&t);
        assert!(ks.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(t.len(), 102);
    }

    #[test]
    fn erase_range_removes_half_open_interval() {
        let mut t = AvlTree::new(Multiplicity::Multi);
        for k in 0..20 {
            t.insert(k, ());
        }
        t.insert(5, ());
        let first = t.get(&5).unwrap();
        let last = t.get(&15);
        assert_eq!(t.erase_range(first, last), 11);
        assert_eq!(keys(&t), vec![0, 1, 2, 3, 4, 15, 16, 17, 18, 19]);
        let first = t.get(&17).unwrap();
        assert_eq!(t.erase_range(first, None), 3);
        assert_eq!(t.last().key(), Some(&16));
    }

    #[test]
    fn release_reports_liveness() {
        let mut t = AvlTree::new(Multiplicity::Multi);
        let (h, _) = t.insert("a", 1);
        t.insert("a", 2);
        assert_eq!(t.release(h), Some(Release::Live { remaining: 1 }));
        assert_eq!(
            t.release(h),
            Some(Release::Removed { key: "a", value: 1 })
        );
        assert_eq!(t.release(h), None);
    }

    #[test]
    fn clear_resets_header_and_iter_mut_visits_in_order() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        for k in [3, 1, 2] {
            t.insert(k, k);
        }
        let mut seen = Vec::new();
        for (k, v, _) in t.iter_mut() {
            *v *= 100;
            seen.push(*k);
        }
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(t.iter().map(|(_, v, _)| *v).collect::<Vec<_>>(), vec![100, 200, 300]);
        t.clear();
        assert!(t.is_empty());
        assert_eq!(t.height(), 0);
        assert!(t.first().is_end());
        assert_eq!(t.first(), t.end());
        t.insert(1, 1);
        assert_eq!(keys(&t), vec![1]);
    }

    #[test]
    fn reverse_iteration_and_custom_comparator() {
        let mut t = AvlTree::with_comparator(Multiplicity::Unique, crate::compare::Reversed(Natural));
        for k in [1, 5, 3] {
            t.insert(k, ());
        }
        assert_eq!(keys(&t), vec![5, 3, 1]);
        let back: Vec<i32> = t.iter().rev().map(|(k, _, _)| *k).collect();
        assert_eq!(back, vec![1, 3, 5]);
    }

    #[test]
    fn foreign_handles_resolve_nowhere() {
        let mut a = AvlTree::new(Multiplicity::Unique);
        let mut b = AvlTree::new(Multiplicity::Unique);
        let (ha, _) = a.insert(1, "a");
        let (hb, _) = b.insert(100, "b");
        assert_eq!(b.value(ha), None);
        assert!(b.cursor(ha).is_none());
        assert_eq!(b.multiplicity(ha), 0);
        assert_eq!(b.release(ha), None);
        assert_eq!(b.remove(ha), None);
        assert_eq!(b.erase_range(ha, None), 0);
        assert_eq!(b.erase_range(hb, Some(ha)), 0);
        assert_eq!(b.len(), 1);
        // a foreign hint is ignored rather than trusted
        assert!(b.insert_hint(Some(ha), 50, "c").1);
        assert_eq!(keys(&b), vec![50, 100]);
        assert_eq!(a.value(ha), Some(&"a"));

        // a clone is a different tree as well
        let c = a.clone();
        assert_eq!(c.value(ha), None);
        assert_eq!(c.value(c.get(&1).unwrap()), Some(&"a"));
    }

    #[test]
    fn erase_range_with_stale_last_removes_nothing() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        for k in 0..10 {
            t.insert(k, ());
        }
        let six = t.get(&6).unwrap();
        t.erase_key(&6);
        let two = t.get(&2).unwrap();
        assert_eq!(t.erase_range(two, Some(six)), 0);
        assert_eq!(t.len(), 9);
    }

    #[test]
    fn reversed_until_terminates_in_both_directions() {
        let mut t = AvlTree::new(Multiplicity::Unique);
        for k in 0..6 {
            t.insert(k, ());
        }
        let (late, early) = (t.find(&4), t.find(&1));
        let mut it = late.until(&early);
        assert_eq!(it.next().map(|(k, _, _)| *k), Some(4));
        assert_eq!(it.next().map(|(k, _, _)| *k), Some(5));
        assert!(it.next().is_none());
        assert!(it.next_back().is_none());

        let back: Vec<i32> = late.until(&early).rev().map(|(k, _, _)| *k).collect();
        assert_eq!(back, vec![0]);
    }

    #[test]
    #[should_panic(expected = "another tree")]
    fn until_rejects_cursors_from_another_tree() {
        let mut a = AvlTree::new(Multiplicity::Unique);
        let mut b = AvlTree::new(Multiplicity::Unique);
        a.insert(1, ());
        b.insert(1, ());
        let _ = a.first().until(&b.end());
    }
}
