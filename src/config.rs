//! Leaf-geometry configuration for the dynamic bitvector.

use crate::WORD_BITS;

/// Leaf sizing for [`DynamicBitVec`](crate::DynamicBitVec), expressed in
/// 64-bit words.
///
/// Leaves hold between `min_leaf_blocks` and `max_leaf_blocks` words; a leaf
/// that grows to `max_leaf_blocks` splits in half, and a leaf that would
/// shrink below `min_leaf_blocks` bits steals from or merges with a
/// neighbor. Bulk construction cuts the input into leaves of
/// `initial_leaf_blocks` words.
///
/// `blocks_per_chunk` selects excess tracking: when non-zero, every chunk of
/// that many words carries a `(block_excess, min_excess, num_min)` summary
/// and the container maintains matching subtree aggregates, enabling the
/// forward/backward excess searches the balanced-parentheses layer is built
/// on. Zero disables tracking entirely.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Config {
    /// Minimum leaf size in words for non-root leaves.
    pub min_leaf_blocks: usize,
    /// Leaf size in words used by bulk construction.
    pub initial_leaf_blocks: usize,
    /// Leaf size in words at which a leaf splits.
    pub max_leaf_blocks: usize,
    /// Words per excess chunk; 0 disables excess tracking.
    pub blocks_per_chunk: usize,
}

impl Config {
    /// Geometry for plain bitvector workloads: 32/64/128 words, no excess
    /// tracking.
    pub const BV: Config = Config {
        min_leaf_blocks: 32,
        initial_leaf_blocks: 64,
        max_leaf_blocks: 128,
        blocks_per_chunk: 0,
    };

    /// Geometry for balanced-parentheses workloads: 16/32/64 words with
    /// 8-word excess chunks.
    pub const BP: Config = Config {
        min_leaf_blocks: 16,
        initial_leaf_blocks: 32,
        max_leaf_blocks: 64,
        blocks_per_chunk: 8,
    };

    /// Whether leaves and inner nodes maintain excess summaries.
    #[inline]
    pub fn excess_enabled(&self) -> bool {
        self.blocks_per_chunk != 0
    }

    /// Minimum leaf size in bits for non-root leaves.
    #[inline]
    pub(crate) fn min_leaf_bits(&self) -> usize {
        self.min_leaf_blocks * WORD_BITS
    }

    /// Check the geometry invariants; called by container constructors.
    ///
    /// # Panics
    ///
    /// Panics if `2*min > initial`, `initial > 2*max`, `min == 0`, or, with
    /// excess tracking enabled, if any of the three sizes (or half the
    /// maximum, the split point) is not a multiple of `blocks_per_chunk`.
    pub(crate) fn validate(&self) {
        assert!(self.min_leaf_blocks > 0, "leaf sizes invalid: min is zero");
        assert!(
            2 * self.min_leaf_blocks <= self.initial_leaf_blocks,
            "leaf sizes invalid: 2*min ({}) > initial ({})",
            2 * self.min_leaf_blocks,
            self.initial_leaf_blocks
        );
        assert!(
            self.initial_leaf_blocks <= 2 * self.max_leaf_blocks,
            "leaf sizes invalid: initial ({}) > 2*max ({})",
            self.initial_leaf_blocks,
            2 * self.max_leaf_blocks
        );
        if self.excess_enabled() {
            let chunk = self.blocks_per_chunk;
            assert!(
                self.min_leaf_blocks.is_multiple_of(chunk)
                    && self.initial_leaf_blocks.is_multiple_of(chunk)
                    && (self.max_leaf_blocks / 2).is_multiple_of(chunk),
                "leaf sizes invalid: chunk width {} must divide min, initial, and max/2",
                chunk
            );
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::BV
    }
}
