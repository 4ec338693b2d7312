//! # dynbits
//!
//! Dynamic succinct data structures for Rust.
//!
//! This crate provides two coupled containers whose contents change at
//! runtime while staying within a small constant factor of the
//! information-theoretic space optimum:
//!
//! - [`DynamicBitVec`]: a bit sequence supporting point access and update,
//!   positional insert/delete, and rank/select, backed by a red-black tree of
//!   packed leaf buffers.
//! - [`DynamicBpTree`]: an ordered rooted tree encoded as balanced
//!   parentheses on top of a [`DynamicBitVec`] with per-chunk excess
//!   summaries, supporting parent/child navigation, subtree size, and
//!   structural node edits.
//!
//! ## Quick Start
//!
//! ```
//! use dynbits::{Config, DynamicBitVec};
//!
//! let mut bv = DynamicBitVec::new(Config::BV);
//! bv.insert(0, true);
//! bv.insert(0, false);
//! bv.insert(2, true);
//!
//! // Bits are now 0, 1, 1.
//! assert_eq!(bv.rank(true, 3), Some(2));
//! assert_eq!(bv.select(true, 2), Some(2));
//! ```
//!
//! Tree edits go through bit positions: a node is identified by the position
//! of its opening parenthesis.
//!
//! ```
//! use dynbits::DynamicBpTree;
//!
//! let mut tree = DynamicBpTree::new();
//! tree.insert_child(0, 1, 0);
//! tree.insert_child(0, 2, 0);
//! assert_eq!(tree.subtree_size(0), Some(3));
//! assert_eq!(tree.child(0, 2), Some(3));
//! ```

mod config;
mod error;
mod excess;
mod leaf;
mod tree;

pub mod bp;
pub mod query;

pub use bp::DynamicBpTree;
pub use config::Config;
pub use error::Error;
pub use excess::{Excess, ExcessChunk};
pub use leaf::LeafStore;
pub use tree::DynamicBitVec;

/// Width of a storage word in bits.
pub const WORD_BITS: usize = 64;
