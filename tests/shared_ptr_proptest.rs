mod common;

use common::DropCounter;
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;
use stl_core::{make_shared, SharedPtr, WeakPtr};

// Model strong/weak pointers per object and assert the counts and the
// destruction point match.
proptest! {
    #[test]
    fn prop_shared_ptr_counts(objects in 1usize..=4, ops in proptest::collection::vec((0u8..=6u8, 0usize..100usize), 1..150)) {
        let drops: Vec<Rc<Cell<usize>>> = (0..objects).map(|_| Rc::new(Cell::new(0))).collect();
        // one seed owner per object
        let mut strong: Vec<Vec<SharedPtr<DropCounter>>> = (0..objects)
            .map(|i| vec![make_shared(DropCounter::new(i as u32, &drops[i]))])
            .collect();
        let mut weak: Vec<Vec<WeakPtr<DropCounter>>> = (0..objects)
            .map(|i| vec![SharedPtr::downgrade(&strong[i][0])])
            .collect();

        for (op, raw) in ops {
            let i = raw % objects;
            match op {
                // Clone a strong owner
                0 => {
                    if let Some(p) = strong[i].last() {
                        let c = p.clone();
                        strong[i].push(c);
                    }
                }
                // Drop a strong owner
                1 => {
                    strong[i].pop();
                }
                // Reset a strong owner in place, keeping the empty pointer
                2 => {
                    if let Some(mut p) = strong[i].pop() {
                        p.reset();
                        prop_assert!(p.is_null());
                        prop_assert_eq!(p.use_count(), 0);
                    }
                }
                // Downgrade
                3 => {
                    if let Some(p) = strong[i].last() {
                        weak[i].push(SharedPtr::downgrade(p));
                    }
                }
                // Drop a weak pointer
                4 => {
                    weak[i].pop();
                }
                // Lock: succeeds iff a strong owner remains
                5 => {
                    if let Some(w) = weak[i].last() {
                        let locked = w.lock();
                        prop_assert_eq!(locked.is_null(), strong[i].is_empty());
                        if !locked.is_null() {
                            prop_assert_eq!(locked.use_count(), strong[i].len() + 1);
                            prop_assert_eq!(locked.id as usize, i);
                            strong[i].push(locked);
                        }
                    }
                }
                // Clone a weak pointer
                6 => {
                    if let Some(w) = weak[i].last() {
                        let c = w.clone();
                        weak[i].push(c);
                    }
                }
                _ => unreachable!(),
            }

            // Counts after each step
            let n = strong[i].len();
            for p in &strong[i] {
                prop_assert_eq!(p.use_count(), n);
                prop_assert_eq!(p.weak_count(), weak[i].len());
            }
            for w in &weak[i] {
                prop_assert_eq!(w.use_count(), n);
                prop_assert_eq!(w.expired(), n == 0);
            }
            // Destroyed exactly once, and only after the last strong owner
            prop_assert_eq!(drops[i].get(), usize::from(n == 0));
        }

        drop(strong);
        drop(weak);
        for d in &drops {
            prop_assert_eq!(d.get(), 1);
        }
    }
}
