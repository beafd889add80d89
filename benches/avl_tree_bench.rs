use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use std::time::Duration;
use stl_core::{Map, MultiSet, Set};

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn bench_insert(c: &mut Criterion) {
    c.bench_function("avl_set_insert_10k", |b| {
        b.iter_batched(
            Set::<u64>::new,
            |mut s| {
                for x in lcg(1).take(10_000) {
                    let _ = s.insert(x);
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_insert_sequential_hinted(c: &mut Criterion) {
    c.bench_function("avl_set_insert_hint_10k", |b| {
        b.iter_batched(
            Set::<u64>::new,
            |mut s| {
                // Appending at the end: the hint is always `end`.
                for x in 0..10_000u64 {
                    let _ = s.insert_hint(None, x);
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_get_hit(c: &mut Criterion) {
    c.bench_function("avl_map_get_hit", |b| {
        let keys: Vec<_> = lcg(7).take(20_000).collect();
        let m: Map<u64, usize> = keys.iter().copied().enumerate().map(|(i, k)| (k, i)).collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = it.next().unwrap();
            black_box(m.get(k));
        })
    });
}

fn bench_get_miss(c: &mut Criterion) {
    c.bench_function("avl_map_get_miss", |b| {
        let m: Map<u64, usize> = lcg(11).take(10_000).enumerate().map(|(i, k)| (k, i)).collect();
        let mut miss = lcg(0xdead_beef);
        b.iter(|| {
            let k = miss.next().unwrap();
            black_box(m.get(&k));
        })
    });
}

fn bench_erase_reinsert(c: &mut Criterion) {
    c.bench_function("avl_set_erase_reinsert", |b| {
        let keys: Vec<_> = lcg(3).take(10_000).collect();
        let mut s: Set<u64> = keys.iter().copied().collect();
        let mut it = keys.iter().cycle();
        b.iter(|| {
            let k = *it.next().unwrap();
            s.erase(&k);
            let _ = s.insert(black_box(k));
        })
    });
}

fn bench_iterate(c: &mut Criterion) {
    c.bench_function("avl_multiset_iterate_10k", |b| {
        let m: MultiSet<u64> = lcg(5).take(10_000).map(|x| x % 1000).collect();
        b.iter(|| black_box(m.iter().fold(0u64, |acc, x| acc.wrapping_add(*x))))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(50)
        .measurement_time(Duration::from_secs(8))
        .warm_up_time(Duration::from_secs(2))
}

criterion_group! {
    name = benches;
    config = bench_config();
    targets = bench_insert, bench_insert_sequential_hinted, bench_get_hit, bench_get_miss,
        bench_erase_reinsert, bench_iterate
}
criterion_main!(benches);
