//! Excess summaries for balanced-parentheses support.
//!
//! In the parentheses encoding a `0` bit is an opening parenthesis and a `1`
//! bit is a closing one; the *excess* of a prefix is `#0 - #1`. Leaves
//! summarize fixed-width chunks of words as `(block_excess, min_excess,
//! num_min)` records, and inner tree nodes carry the same summary for their
//! whole subtree. Both are combined with the same sequential rule, so a
//! forward or backward search can skip any region whose minimum cannot reach
//! the target.

/// Excess contribution of a single bit scanned left to right.
#[inline]
pub(crate) fn step(bit: bool) -> i64 {
    if bit {
        -1
    } else {
        1
    }
}

/// Excess contribution of a single bit scanned right to left (signs flip).
#[inline]
pub(crate) fn backward_step(bit: bool) -> i64 {
    -step(bit)
}

/// Sentinel minimum for an empty region: above any reachable prefix excess,
/// whose first bit already forces the minimum to +1 or -1.
pub(crate) const EMPTY_MIN: i64 = 2;

/// Excess summary of one chunk of words within a leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExcessChunk {
    /// Net excess (`#0 - #1`) over the chunk's occupied bits.
    pub block_excess: i32,
    /// Minimum running prefix excess within the chunk, starting from 0 at
    /// the chunk's first bit; `2` when the chunk is empty.
    pub min_excess: i32,
    /// Number of positions at which the running excess attains `min_excess`.
    pub num_min: u32,
}

impl ExcessChunk {
    /// Summary of a chunk with no occupied bits.
    pub const EMPTY: ExcessChunk = ExcessChunk {
        block_excess: 0,
        min_excess: EMPTY_MIN as i32,
        num_min: 0,
    };
}

/// Excess summary of an ordered bit region (a leaf or a whole subtree).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Excess {
    /// Net excess (`#0 - #1`) over the region.
    pub block_excess: i64,
    /// Minimum running prefix excess, starting from 0 at the region's first
    /// bit; `2` when the region is empty.
    pub min_excess: i64,
    /// Number of positions attaining `min_excess`.
    pub num_min: u64,
}

impl Excess {
    /// Summary of an empty region.
    pub const EMPTY: Excess = Excess {
        block_excess: 0,
        min_excess: EMPTY_MIN,
        num_min: 0,
    };

    /// Widen a chunk record to a region summary.
    #[inline]
    pub fn from_chunk(chunk: &ExcessChunk) -> Excess {
        Excess {
            block_excess: chunk.block_excess as i64,
            min_excess: chunk.min_excess as i64,
            num_min: chunk.num_min as u64,
        }
    }

    /// Summary of `self` followed by `rhs`.
    ///
    /// The right-hand minima are shifted by the left-hand net excess; counts
    /// add when both sides attain the combined minimum. The empty sentinel is
    /// absorbing on either side because a non-empty region's minimum is at
    /// most 1.
    pub fn concat(&self, rhs: &Excess) -> Excess {
        let shifted_min = self.block_excess + rhs.min_excess;
        let min_excess = self.min_excess.min(shifted_min);
        let mut num_min = 0;
        if self.min_excess == min_excess {
            num_min += self.num_min;
        }
        if shifted_min == min_excess {
            num_min += rhs.num_min;
        }
        Excess {
            block_excess: self.block_excess + rhs.block_excess,
            min_excess,
            num_min,
        }
    }

    /// Minimum running excess of the region scanned right to left with
    /// flipped signs.
    ///
    /// Derived from the forward summary: every backward running value at
    /// position `i` equals the forward prefix excess before `i` minus the
    /// region total. The forward minimum also covers the full-region prefix,
    /// so the result may undershoot by that one candidate; callers treat the
    /// bound as admission-only and confirm by scanning.
    #[inline]
    pub(crate) fn backward_min(&self) -> i64 {
        self.min_excess.min(0) - self.block_excess
    }
}

/// Outcome of scanning part of a leaf for a target excess.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ExcessScan {
    /// Target reached at this bit position (leaf-local).
    Found(usize),
    /// Region exhausted; the running excess after consuming it.
    Continue(i64),
}
