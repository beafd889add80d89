#![cfg(test)]

// Property tests for AvlTree kept inside the crate so they can reach
// `validate` and handle internals without a feature gate.

use crate::avl_tree::{AvlTree, Handle, Multiplicity, Release};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};

// Pool-indexed operations shrink toward early keys and short op lists.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize),
    InsertHint(usize, usize),
    EraseOne(usize),
    EraseKey(usize),
    Release(usize),
    Bounds(i32),
    Walk,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<i32>, Vec<OpI>)> {
    proptest::collection::vec(-50i32..50, 1..=12).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            6 => idx.clone().prop_map(OpI::Insert),
            3 => (idx.clone(), idx.clone()).prop_map(|(i, h)| OpI::InsertHint(i, h)),
            2 => idx.clone().prop_map(OpI::EraseOne),
            2 => idx.clone().prop_map(OpI::EraseKey),
            2 => idx.clone().prop_map(OpI::Release),
            1 => (-60i32..60).prop_map(OpI::Bounds),
            1 => Just(OpI::Walk),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..120).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn model_len(model: &BTreeMap<i32, usize>) -> usize {
    model.values().sum()
}

// Property: a multi-mode tree behaves like a BTreeMap<key, multiplicity>.
// - every mutation leaves a valid AVL tree (checked by `validate`)
// - len, count and bounds agree with the model
// - forward and backward walks visit the model's keys in order
// - handles of live keys stay valid; handles of erased keys go stale
// - height stays within the AVL bound 1.44 * log2(n + 2)
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]
    #[test]
    fn prop_multi_tree_matches_model((pool, ops) in arb_scenario()) {
        let mut sut: AvlTree<i32, ()> = AvlTree::new(Multiplicity::Multi);
        let mut model: BTreeMap<i32, usize> = BTreeMap::new();
        let mut handles: HashMap<i32, Handle> = HashMap::new();
        let mut stale: Vec<Handle> = Vec::new();

        for op in ops {
            match op {
                OpI::Insert(i) => {
                    let k = pool[i];
                    let (h, inserted) = sut.insert(k, ());
                    prop_assert!(inserted);
                    if let Some(prev) = handles.insert(k, h) {
                        prop_assert_eq!(prev, h, "equal keys share one node");
                    }
                    *model.entry(k).or_default() += 1;
                }
                OpI::InsertHint(i, hi) => {
                    let k = pool[i];
                    let hint = handles.get(&pool[hi]).copied();
                    let (h, inserted) = sut.insert_hint(hint, k, ());
                    prop_assert!(inserted);
                    handles.insert(k, h);
                    *model.entry(k).or_default() += 1;
                }
                OpI::EraseOne(i) => {
                    let k = pool[i];
                    let expected = model.get(&k).copied().unwrap_or(0);
                    prop_assert_eq!(sut.erase_one(&k), expected > 0);
                    match expected {
                        0 => {}
                        1 => {
                            model.remove(&k);
                            stale.extend(handles.remove(&k));
                        }
                        _ => *model.get_mut(&k).unwrap() -= 1,
                    }
                }
                OpI::EraseKey(i) => {
                    let k = pool[i];
                    let expected = model.remove(&k).unwrap_or(0);
                    prop_assert_eq!(sut.erase_key(&k), expected);
                    stale.extend(handles.remove(&k));
                }
                OpI::Release(i) => {
                    let k = pool[i];
                    let Some(&h) = handles.get(&k) else { continue };
                    match sut.release(h) {
                        Some(Release::Live { remaining }) => {
                            let m = model.get_mut(&k).unwrap();
                            *m -= 1;
                            prop_assert_eq!(*m, remaining);
                        }
                        Some(Release::Removed { key, .. }) => {
                            prop_assert_eq!(key, k);
                            prop_assert_eq!(model.remove(&k), Some(1));
                            handles.remove(&k);
                            stale.push(h);
                        }
                        None => prop_assert!(false, "live handle must resolve"),
                    }
                }
                OpI::Bounds(q) => {
                    let lower = model.range(q..).next().map(|(k, _)| *k);
                    let upper = model.range(q + 1..).next().map(|(k, _)| *k);
                    prop_assert_eq!(sut.lower_bound(&q).key().copied(), lower);
                    prop_assert_eq!(sut.upper_bound(&q).key().copied(), upper);
                    prop_assert_eq!(sut.count(&q), model.get(&q).copied().unwrap_or(0));
                }
                OpI::Walk => {
                    let fwd: Vec<(i32, usize)> = sut.iter().map(|(k, _, n)| (*k, n)).collect();
                    let want: Vec<(i32, usize)> = model.iter().map(|(k, n)| (*k, *n)).collect();
                    prop_assert_eq!(&fwd, &want);
                    let mut back = Vec::new();
                    let mut c = sut.end();
                    loop {
                        c.move_prev();
                        match c.key() {
                            Some(k) => back.push(*k),
                            None => break,
                        }
                    }
                    back.reverse();
                    prop_assert_eq!(back, model.keys().copied().collect::<Vec<_>>());
                }
                OpI::Clear => {
                    sut.clear();
                    stale.extend(handles.drain().map(|(_, h)| h));
                    model.clear();
                }
            }

            prop_assert!(sut.validate().is_ok());
            prop_assert_eq!(sut.len(), model_len(&model));
            prop_assert_eq!(sut.node_count(), model.len());
            let bound = 1.45 * ((sut.node_count() + 2) as f64).log2();
            prop_assert!(f64::from(sut.height()) <= bound);
            for (k, h) in &handles {
                prop_assert_eq!(sut.key(*h), Some(k));
            }
            for h in &stale {
                prop_assert!(!sut.contains_handle(*h));
            }
        }
    }
}

// Property: a unique-mode tree rejects duplicates without mutation and
// matches a BTreeMap<key, value>.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_unique_tree_rejects_duplicates(keys in proptest::collection::vec(-30i32..30, 0..200)) {
        let mut sut: AvlTree<i32, usize> = AvlTree::new(Multiplicity::Unique);
        let mut model: BTreeMap<i32, usize> = BTreeMap::new();
        for (pos, k) in keys.into_iter().enumerate() {
            let (h, inserted) = sut.insert(k, pos);
            prop_assert_eq!(inserted, !model.contains_key(&k));
            model.entry(k).or_insert(pos);
            prop_assert_eq!(sut.value(h), model.get(&k));
        }
        prop_assert!(sut.validate().is_ok());
        let got: Vec<(i32, usize)> = sut.iter().map(|(k, v, _)| (*k, *v)).collect();
        let want: Vec<(i32, usize)> = model.into_iter().collect();
        prop_assert_eq!(got, want);
    }
}
