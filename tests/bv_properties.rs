//! Randomized and property-based tests for the dynamic bitvector, checked
//! against a plain `Vec<bool>` model.

use dynbits::{Config, DynamicBitVec};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Tiny leaves so splits, steals, and merges happen constantly.
fn small_config() -> Config {
    Config {
        min_leaf_blocks: 1,
        initial_leaf_blocks: 2,
        max_leaf_blocks: 4,
        blocks_per_chunk: 0,
    }
}

/// Same geometry with excess tracking switched on.
fn small_excess_config() -> Config {
    Config {
        min_leaf_blocks: 1,
        initial_leaf_blocks: 2,
        max_leaf_blocks: 4,
        blocks_per_chunk: 1,
    }
}

fn assert_matches_model(bv: &DynamicBitVec, model: &[bool]) {
    assert_eq!(bv.len(), model.len());
    for (i, &bit) in model.iter().enumerate() {
        assert_eq!(bv.get(i), Some(bit), "bit {} differs", i);
    }
    let ones = model.iter().filter(|&&b| b).count();
    assert_eq!(bv.count_ones(), ones);
    assert_eq!(bv.count_zeros(), model.len() - ones);
}

fn assert_rank_select_laws(bv: &DynamicBitVec, model: &[bool]) {
    for i in 0..=model.len() {
        let expected = model[..i].iter().filter(|&&b| b).count();
        assert_eq!(bv.rank(true, i), Some(expected), "rank1({})", i);
        assert_eq!(bv.rank(false, i), Some(i - expected), "rank0({})", i);
    }
    for bit in [false, true] {
        let total = model.iter().filter(|&&b| b == bit).count();
        for k in 1..=total {
            let pos = bv.select(bit, k).unwrap();
            assert_eq!(model[pos], bit, "select({}, {}) hit wrong bit", bit, k);
            assert_eq!(bv.rank(bit, pos), Some(k - 1), "rank/select inverse");
        }
        assert_eq!(bv.select(bit, total + 1), None);
    }
}

#[test]
fn random_ops_match_model() {
    for seed in [7u64, 42, 1234] {
        for config in [small_config(), small_excess_config()] {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut bv = DynamicBitVec::new(config);
            let mut model: Vec<bool> = Vec::new();

            for step in 0..6000 {
                match rng.gen_range(0..100) {
                    // Insert-heavy so the structure actually grows.
                    0..=49 => {
                        let pos = rng.gen_range(0..=model.len());
                        let bit = rng.gen();
                        bv.insert(pos, bit);
                        model.insert(pos, bit);
                    }
                    50..=74 if !model.is_empty() => {
                        let pos = rng.gen_range(0..model.len());
                        bv.remove(pos);
                        model.remove(pos);
                    }
                    75..=84 if !model.is_empty() => {
                        let pos = rng.gen_range(0..model.len());
                        bv.flip(pos);
                        model[pos] = !model[pos];
                    }
                    85..=94 if !model.is_empty() => {
                        let pos = rng.gen_range(0..model.len());
                        let bit = rng.gen();
                        bv.set(pos, bit);
                        model[pos] = bit;
                    }
                    _ => {
                        let bit = rng.gen();
                        bv.push(bit);
                        model.push(bit);
                    }
                }
                if step % 999 == 0 {
                    bv.check_invariants();
                }
            }
            bv.check_invariants();
            assert_matches_model(&bv, &model);
            assert_rank_select_laws(&bv, &model);
        }
    }
}

#[test]
fn drain_from_the_left_flushes_steal_and_merge() {
    // Insert 10 000 random bits, then delete position 0 until empty; every
    // leaf boundary goes through steal and the steal-then-merge escalation.
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for config in [small_config(), small_excess_config()] {
        let mut bv = DynamicBitVec::new(config);
        let mut ones = 0usize;
        for _ in 0..10_000 {
            let bit: bool = rng.gen();
            let pos = rng.gen_range(0..=bv.len());
            bv.insert(pos, bit);
            if bit {
                ones += 1;
            }
        }
        assert_eq!(bv.count_ones(), ones);
        let mut remaining = 10_000;
        while !bv.is_empty() {
            let first = bv.get(0).unwrap();
            bv.remove(0);
            if first {
                ones -= 1;
            }
            remaining -= 1;
            assert_eq!(bv.len(), remaining);
            assert_eq!(bv.count_ones(), ones);
            if remaining % 1024 == 0 {
                bv.check_invariants();
            }
        }
        bv.check_invariants();
    }
}

#[test]
fn drain_from_the_right() {
    let mut bv = DynamicBitVec::new(small_config());
    for i in 0..8000 {
        bv.push(i % 7 == 0);
    }
    while bv.pop().is_some() {
        if bv.len() % 1024 == 0 {
            bv.check_invariants();
        }
    }
    assert!(bv.is_empty());
}

#[test]
fn bulk_build_equals_incremental_build() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let len = 40_000;
    let mut words = vec![0u64; len / 64 + 1];
    for w in words.iter_mut() {
        *w = rng.gen();
    }
    let bulk = DynamicBitVec::from_words(words.clone(), len, Config::BV);
    bulk.check_invariants();

    let mut incremental = DynamicBitVec::new(Config::BV);
    for i in 0..len {
        incremental.push((words[i / 64] >> (i % 64)) & 1 == 1);
    }
    assert_eq!(bulk.len(), incremental.len());
    assert_eq!(bulk.count_ones(), incremental.count_ones());
    for i in (0..len).step_by(487) {
        assert_eq!(bulk.get(i), incremental.get(i), "bit {}", i);
    }
    let (bulk_words, bulk_len) = bulk.to_bits();
    let (inc_words, inc_len) = incremental.to_bits();
    assert_eq!(bulk_len, inc_len);
    assert_eq!(bulk_words, inc_words);
}

#[test]
fn flip_pattern_rank() {
    // Bits i mod 3 == 1 over 100 positions, then flip every fifth position:
    // rank(1, 100) counts the XOR of the two patterns.
    let mut words = vec![0u64; 2];
    for i in 0..100 {
        if i % 3 == 1 {
            words[i / 64] |= 1u64 << (i % 64);
        }
    }
    let mut bv = DynamicBitVec::from_words(words, 100, Config::BV);
    for i in (0..100).step_by(5) {
        bv.flip(i);
    }
    let expected = (0..100).filter(|i| (i % 3 == 1) ^ (i % 5 == 0)).count();
    assert_eq!(bv.rank(true, 100), Some(expected));
}

#[test]
fn excess_searches_stay_consistent_under_churn() {
    // Random balanced-parentheses style content: compare forward/backward
    // search against a naive scan.
    let mut rng = ChaCha8Rng::seed_from_u64(321);
    let mut bv = DynamicBitVec::new(small_excess_config());
    let mut model: Vec<bool> = Vec::new();

    // Grow a balanced sequence: every insert adds a matched pair.
    for _ in 0..900 {
        let pos = rng.gen_range(0..=model.len());
        // Only at positions where a pair keeps the sequence balanced; insert
        // "01" atomically.
        bv.insert(pos, true);
        bv.insert(pos, false);
        model.insert(pos, true);
        model.insert(pos, false);
    }
    bv.check_invariants();

    let naive_forward = |model: &[bool], p: usize, target: i64| -> Option<usize> {
        let mut running = 0i64;
        for (q, &b) in model.iter().enumerate().skip(p) {
            running += if b { -1 } else { 1 };
            if running == target {
                return Some(q);
            }
        }
        None
    };
    let naive_backward = |model: &[bool], p: usize, target: i64| -> Option<usize> {
        let mut running = 0i64;
        for q in (0..p).rev() {
            running += if model[q] { 1 } else { -1 };
            if running == target {
                return Some(q);
            }
        }
        None
    };

    for p in (0..model.len()).step_by(41) {
        if !model[p] {
            assert_eq!(
                bv.forward_search(p, 0),
                naive_forward(&model, p, 0),
                "forward from open at {}",
                p
            );
            if p > 0 {
                assert_eq!(
                    bv.backward_search(p, -1),
                    naive_backward(&model, p, -1),
                    "backward from {}",
                    p
                );
            }
        }
    }
}

proptest! {
    /// Building from pushes reproduces the input exactly, and rank sums to
    /// the position everywhere.
    #[test]
    fn prop_push_reproduces_bits(bits in prop::collection::vec(any::<bool>(), 0..600)) {
        let mut bv = DynamicBitVec::new(small_config());
        for &b in &bits {
            bv.push(b);
        }
        bv.check_invariants();
        for (i, &b) in bits.iter().enumerate() {
            prop_assert_eq!(bv.get(i), Some(b));
        }
        for i in 0..=bits.len() {
            let r1 = bv.rank(true, i).unwrap();
            let r0 = bv.rank(false, i).unwrap();
            prop_assert_eq!(r1 + r0, i);
        }
    }

    /// delete(i) undoes insert(i, b).
    #[test]
    fn prop_insert_delete_round_trip(
        bits in prop::collection::vec(any::<bool>(), 1..400),
        pos_ratio in 0.0..1.0f64,
        inserted in any::<bool>(),
    ) {
        let mut bv = DynamicBitVec::new(small_config());
        for &b in &bits {
            bv.push(b);
        }
        let before = bv.to_bits();
        let pos = (pos_ratio * bits.len() as f64) as usize;
        bv.insert(pos, inserted);
        prop_assert_eq!(bv.get(pos), Some(inserted));
        bv.remove(pos);
        bv.check_invariants();
        prop_assert_eq!(bv.to_bits(), before);
    }

    /// flip twice and set-to-current-value are identities.
    #[test]
    fn prop_flip_set_identities(
        bits in prop::collection::vec(any::<bool>(), 1..400),
        pos_ratio in 0.0..1.0f64,
    ) {
        let mut bv = DynamicBitVec::new(small_config());
        for &b in &bits {
            bv.push(b);
        }
        let before = bv.to_bits();
        let pos = ((pos_ratio * bits.len() as f64) as usize).min(bits.len() - 1);
        bv.flip(pos);
        bv.flip(pos);
        prop_assert_eq!(bv.to_bits(), before.clone());
        let current = bv.get(pos).unwrap();
        bv.set(pos, current);
        prop_assert_eq!(bv.to_bits(), before);
    }
}
