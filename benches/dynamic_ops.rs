//! Criterion benchmarks for the dynamic containers.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use dynbits::{Config, DynamicBitVec, DynamicBpTree};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Build a bitvector of `size` bits with the given one-density.
fn generate_bitvec(size: usize, density: f64, seed: u64) -> DynamicBitVec {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let threshold = (density * u64::MAX as f64) as u64;
    let words: Vec<u64> = (0..size.div_ceil(64))
        .map(|_| {
            let mut word = 0u64;
            for bit in 0..64 {
                if rng.gen::<u64>() < threshold {
                    word |= 1 << bit;
                }
            }
            word
        })
        .collect();
    DynamicBitVec::from_words(words, size, Config::BV)
}

fn generate_positions(count: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count).map(|_| rng.gen_range(0..max)).collect()
}

fn bench_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank");
    for size in [100_000, 1_000_000] {
        let bv = generate_bitvec(size, 0.5, 42);
        let queries = generate_positions(10_000, size, 123);
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(&bv, &queries),
            |b, (bv, queries)| {
                b.iter(|| {
                    let mut sum = 0usize;
                    for &q in queries.iter() {
                        sum += bv.rank(true, black_box(q)).unwrap();
                    }
                    sum
                })
            },
        );
    }
    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let mut group = c.benchmark_group("select");
    for size in [100_000, 1_000_000] {
        let bv = generate_bitvec(size, 0.5, 42);
        let ones = bv.count_ones();
        let queries: Vec<usize> = generate_positions(10_000, ones, 321)
            .into_iter()
            .map(|k| k + 1)
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &(&bv, &queries),
            |b, (bv, queries)| {
                b.iter(|| {
                    let mut sum = 0usize;
                    for &k in queries.iter() {
                        sum += bv.select(true, black_box(k)).unwrap();
                    }
                    sum
                })
            },
        );
    }
    group.finish();
}

fn bench_insert_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_delete");
    for size in [100_000, 1_000_000] {
        let positions = generate_positions(10_000, size, 7);
        group.bench_with_input(
            BenchmarkId::from_parameter(size),
            &positions,
            |b, positions| {
                b.iter_with_setup(
                    || generate_bitvec(size, 0.5, 42),
                    |mut bv| {
                        for &p in positions.iter() {
                            bv.insert(p, p & 1 == 1);
                            bv.remove(black_box(p));
                        }
                        bv
                    },
                )
            },
        );
    }
    group.finish();
}

fn bench_bp_navigation(c: &mut Criterion) {
    let mut group = c.benchmark_group("bp_navigation");
    for children in [10_000usize, 100_000] {
        let mut tree = DynamicBpTree::new();
        // Wide fan below the root; prepending keeps construction linear.
        for _ in 0..children {
            tree.insert_child(0, 1, 0);
        }
        // In a pure fan, the i-th child opens at bit 2(i-1)+1.
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let queries: Vec<usize> = (0..2_000)
            .map(|_| 2 * rng.gen_range(0..children) + 1)
            .collect();
        group.bench_with_input(
            BenchmarkId::from_parameter(children),
            &(&tree, &queries),
            |b, (tree, queries)| {
                b.iter(|| {
                    let mut sum = 0usize;
                    for &v in queries.iter() {
                        sum += tree.subtree_size(black_box(v)).unwrap();
                        sum += tree.parent(v).unwrap();
                    }
                    // One full-span search across every leaf.
                    sum += tree.subtree_size(0).unwrap();
                    sum
                })
            },
        );
    }
    group.finish();
}

fn bench_bp_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("bp_edits");
    group.bench_function("grow_and_shrink_1000", |b| {
        b.iter(|| {
            let mut tree = DynamicBpTree::new();
            for i in 1..=1000 {
                tree.insert_child(0, i, 0);
            }
            while tree.num_nodes() > 1 {
                let c = tree.child(0, 1).unwrap();
                tree.delete_node(black_box(c));
            }
            tree.num_nodes()
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_rank,
    bench_select,
    bench_insert_delete,
    bench_bp_navigation,
    bench_bp_edits
);
criterion_main!(benches);
