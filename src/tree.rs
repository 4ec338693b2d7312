//! Dynamic bitvector backed by a red-black tree of packed leaves.
//!
//! The tree is stored in an arena of index handles; every inner node caches
//! the bit and one counts of its left subtree for positional navigation, and
//! (with excess tracking enabled) an [`Excess`] summary of its whole subtree
//! for forward/backward excess search. Leaves are [`LeafStore`] buffers that
//! split when they reach the configured maximum and steal from or merge with
//! a neighbor when a deletion would push them below the minimum.

use crate::config::Config;
use crate::excess::{Excess, ExcessScan};
use crate::leaf::LeafStore;
use crate::WORD_BITS;

type NodeId = usize;

/// Sentinel for absent parent/child links.
const NIL: NodeId = usize::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug)]
enum NodeKind {
    Inner {
        left: NodeId,
        right: NodeId,
        /// Total bits in the left subtree.
        bits_left: usize,
        /// Total set bits in the left subtree.
        ones_left: usize,
        /// Excess summary of the whole subtree under this node; unused
        /// (empty) when excess tracking is off.
        excess: Excess,
    },
    Leaf(LeafStore),
}

#[derive(Debug)]
struct Node {
    parent: NodeId,
    color: Color,
    kind: NodeKind,
}

/// What happened at the leaf a deletion descended into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LeafDeletion {
    DeletedZero,
    DeletedOne,
    /// The leaf sits at the minimum size and refused to shrink; the caller
    /// repairs by stealing or merging.
    Underflow,
}

/// A bit sequence with positional insert/delete, point update, and
/// rank/select, all in `O(log n)` amortized leaf operations.
///
/// Out-of-range positions are rejected: queries return `None` and mutations
/// leave the container untouched.
#[derive(Debug)]
pub struct DynamicBitVec {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: NodeId,
    len: usize,
    ones: usize,
    config: Config,
    /// Double-black repair recorded by a merge, run once the deletion unwind
    /// has settled every counter on the path.
    pending_fixup: Option<NodeId>,
}

impl DynamicBitVec {
    /// Create an empty bitvector.
    ///
    /// # Panics
    ///
    /// Panics if the configured leaf geometry is invalid.
    pub fn new(config: Config) -> Self {
        config.validate();
        let nodes = vec![Node {
            parent: NIL,
            color: Color::Black,
            kind: NodeKind::Leaf(LeafStore::new(config.blocks_per_chunk)),
        }];
        DynamicBitVec {
            nodes,
            free: Vec::new(),
            root: 0,
            len: 0,
            ones: 0,
            config,
            pending_fixup: None,
        }
    }

    /// Build from raw words, cutting the input into leaves of the configured
    /// initial size and assembling a balanced tree bottom-up.
    ///
    /// # Panics
    ///
    /// Panics if the geometry is invalid or `len` exceeds `words.len() * 64`.
    pub fn from_words(words: Vec<u64>, len: usize, config: Config) -> Self {
        config.validate();
        assert!(
            len <= words.len() * WORD_BITS,
            "len {} exceeds capacity {}",
            len,
            words.len() * WORD_BITS
        );

        let chunk = config.blocks_per_chunk;
        let words_per_leaf = config.initial_leaf_blocks;
        let total_words = len.div_ceil(WORD_BITS);

        let mut leaves = Vec::new();
        let mut start_w = 0;
        while start_w < total_words {
            let end_w = (start_w + words_per_leaf).min(total_words);
            let slice_len = (len - start_w * WORD_BITS).min((end_w - start_w) * WORD_BITS);
            leaves.push(LeafStore::from_words(
                words[start_w..end_w].to_vec(),
                slice_len,
                chunk,
            ));
            start_w = end_w;
        }

        // A short tail leaf would violate the minimum; even out the last two.
        if leaves.len() >= 2 && leaves.last().unwrap().len() < config.min_leaf_bits() {
            let tail = leaves.pop().unwrap();
            let mut prev = leaves.pop().unwrap();
            prev.concat(&tail);
            let mut keep = prev.word_count() / 2;
            if chunk != 0 {
                keep -= keep % chunk;
            }
            let right = prev.split_at(keep);
            debug_assert!(prev.len() >= config.min_leaf_bits());
            debug_assert!(right.len() >= config.min_leaf_bits());
            leaves.push(prev);
            leaves.push(right);
        }

        let mut bv = DynamicBitVec {
            nodes: Vec::with_capacity(2 * leaves.len().max(1)),
            free: Vec::new(),
            root: NIL,
            len: 0,
            ones: 0,
            config,
            pending_fixup: None,
        };

        if leaves.is_empty() {
            bv.root = bv.alloc(Node {
                parent: NIL,
                color: Color::Black,
                kind: NodeKind::Leaf(LeafStore::new(chunk)),
            });
            return bv;
        }

        let entries: Vec<(NodeId, usize, usize)> = leaves
            .into_iter()
            .map(|leaf| {
                let bits = leaf.len();
                let ones = leaf.num_ones();
                let id = bv.alloc(Node {
                    parent: NIL,
                    color: Color::Black,
                    kind: NodeKind::Leaf(leaf),
                });
                (id, bits, ones)
            })
            .collect();

        let (root, bits, ones, _bh) = bv.build_balanced(&entries);
        bv.root = root;
        bv.set_color(root, Color::Black);
        bv.len = bits;
        bv.ones = ones;
        bv
    }

    /// Assemble a balanced subtree over `entries`, returning
    /// `(id, bits, ones, black_height)`. Roots come back black; when sibling
    /// black heights differ by one, the taller left side is recolored red.
    fn build_balanced(&mut self, entries: &[(NodeId, usize, usize)]) -> (NodeId, usize, usize, usize) {
        if entries.len() == 1 {
            let (id, bits, ones) = entries[0];
            return (id, bits, ones, 1);
        }
        let mid = entries.len().div_ceil(2);
        let (l, lb, lo, mut lbh) = self.build_balanced(&entries[..mid]);
        let (r, rb, ro, rbh) = self.build_balanced(&entries[mid..]);
        if lbh == rbh + 1 {
            self.set_color(l, Color::Red);
            lbh -= 1;
        }
        debug_assert_eq!(lbh, rbh, "unbalanced bulk construction");
        let id = self.alloc(Node {
            parent: NIL,
            color: Color::Black,
            kind: NodeKind::Inner {
                left: l,
                right: r,
                bits_left: lb,
                ones_left: lo,
                excess: Excess::EMPTY,
            },
        });
        self.nodes[l].parent = id;
        self.nodes[r].parent = id;
        self.refresh_excess(id);
        (id, lb + rb, lo + ro, lbh + 1)
    }

    /// Number of bits stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no bits are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of set bits.
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.ones
    }

    /// Total number of unset bits.
    #[inline]
    pub fn count_zeros(&self) -> usize {
        self.len - self.ones
    }

    /// The active leaf geometry.
    #[inline]
    pub fn config(&self) -> Config {
        self.config
    }

    /// The bit at position `i`, or `None` when out of range.
    pub fn get(&self, i: usize) -> Option<bool> {
        if i >= self.len {
            return None;
        }
        let mut id = self.root;
        let mut i = i;
        loop {
            match &self.nodes[id].kind {
                NodeKind::Leaf(store) => return Some(store.get(i)),
                NodeKind::Inner {
                    left,
                    right,
                    bits_left,
                    ..
                } => {
                    if i < *bits_left {
                        id = *left;
                    } else {
                        i -= *bits_left;
                        id = *right;
                    }
                }
            }
        }
    }

    /// Set the bit at position `i`; out of range is a no-op.
    pub fn set(&mut self, i: usize, value: bool) {
        if i >= self.len {
            return;
        }
        let prev = self.set_at(self.root, i, value);
        if prev != value {
            if value {
                self.ones += 1;
            } else {
                self.ones -= 1;
            }
        }
    }

    /// Flip the bit at position `i`; out of range is a no-op.
    pub fn flip(&mut self, i: usize) {
        if i >= self.len {
            return;
        }
        if self.flip_at(self.root, i) {
            self.ones += 1;
        } else {
            self.ones -= 1;
        }
    }

    /// Count of `bit` values strictly before position `i` (`0 <= i <= len`).
    pub fn rank(&self, bit: bool, i: usize) -> Option<usize> {
        if i > self.len {
            return None;
        }
        let mut id = self.root;
        let mut i = i;
        let mut acc = 0;
        loop {
            match &self.nodes[id].kind {
                NodeKind::Leaf(store) => {
                    return Some(acc + if bit { store.rank1(i) } else { store.rank0(i) })
                }
                NodeKind::Inner {
                    left,
                    right,
                    bits_left,
                    ones_left,
                    ..
                } => {
                    if *bits_left <= i {
                        acc += if bit {
                            *ones_left
                        } else {
                            *bits_left - *ones_left
                        };
                        i -= *bits_left;
                        id = *right;
                    } else {
                        id = *left;
                    }
                }
            }
        }
    }

    /// Position of the `k`-th occurrence of `bit` (1-based), or `None` when
    /// fewer than `k` exist.
    pub fn select(&self, bit: bool, k: usize) -> Option<usize> {
        let total = if bit { self.ones } else { self.count_zeros() };
        if k == 0 || k > total {
            return None;
        }
        let mut id = self.root;
        let mut k = k;
        let mut acc = 0;
        loop {
            match &self.nodes[id].kind {
                NodeKind::Leaf(store) => {
                    return Some(acc + if bit { store.select1(k) } else { store.select0(k) })
                }
                NodeKind::Inner {
                    left,
                    right,
                    bits_left,
                    ones_left,
                    ..
                } => {
                    let in_left = if bit {
                        *ones_left
                    } else {
                        *bits_left - *ones_left
                    };
                    if in_left < k {
                        k -= in_left;
                        acc += *bits_left;
                        id = *right;
                    } else {
                        id = *left;
                    }
                }
            }
        }
    }

    /// Insert `value` at position `i` (`0 <= i <= len`); out of range is a
    /// no-op.
    pub fn insert(&mut self, i: usize, value: bool) {
        if i > self.len {
            return;
        }
        self.insert_at(self.root, i, value);
        self.len += 1;
        if value {
            self.ones += 1;
        }
    }

    /// Delete the bit at position `i`; out of range is a no-op.
    pub fn remove(&mut self, i: usize) {
        if i >= self.len {
            return;
        }
        let result = self.delete_at(self.root, i, self.len, true);
        debug_assert_ne!(result, LeafDeletion::Underflow);
        if let Some(child) = self.pending_fixup.take() {
            self.fix_double_black(child);
        }
        if result == LeafDeletion::DeletedOne {
            self.ones -= 1;
        }
        self.len -= 1;
    }

    /// Append a bit at the end.
    #[inline]
    pub fn push(&mut self, value: bool) {
        self.insert(self.len, value);
    }

    /// Remove and return the last bit.
    pub fn pop(&mut self) -> Option<bool> {
        if self.len == 0 {
            return None;
        }
        let last = self.get(self.len - 1);
        self.remove(self.len - 1);
        last
    }

    /// The full bit sequence as packed words plus its length.
    pub fn to_bits(&self) -> (Vec<u64>, usize) {
        let mut acc = LeafStore::new(0);
        self.collect_into(self.root, &mut acc);
        (acc.words().to_vec(), acc.len())
    }

    fn collect_into(&self, id: NodeId, acc: &mut LeafStore) {
        match &self.nodes[id].kind {
            NodeKind::Leaf(store) => acc.concat(store),
            NodeKind::Inner { left, right, .. } => {
                let (l, r) = (*left, *right);
                self.collect_into(l, acc);
                self.collect_into(r, acc);
            }
        }
    }

    /// Live memory footprint in bits: container header, every live node, and
    /// all leaf storage.
    pub fn space_used(&self) -> usize {
        std::mem::size_of::<Self>() * 8 + self.space_at(self.root)
    }

    fn space_at(&self, id: NodeId) -> usize {
        let node_bits = std::mem::size_of::<Node>() * 8;
        match &self.nodes[id].kind {
            NodeKind::Leaf(store) => {
                node_bits
                    + (store.word_count() * std::mem::size_of::<u64>()
                        + store.chunks().len() * std::mem::size_of::<crate::ExcessChunk>())
                        * 8
            }
            NodeKind::Inner { left, right, .. } => {
                node_bits + self.space_at(*left) + self.space_at(*right)
            }
        }
    }

    /// Debug rendering of the tree: total size and ones, then per node
    /// `(bits ones ...)` with leaves as `(len ones)`.
    pub fn tree_structure(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        write!(out, "{} {} ", self.len, self.ones).unwrap();
        self.structure_at(self.root, &mut out);
        out
    }

    fn structure_at(&self, id: NodeId, out: &mut String) {
        use std::fmt::Write;
        match &self.nodes[id].kind {
            NodeKind::Leaf(store) => {
                write!(out, "({} {})", store.len(), store.num_ones()).unwrap();
            }
            NodeKind::Inner {
                left,
                right,
                bits_left,
                ones_left,
                ..
            } => {
                write!(out, "({} {} ", bits_left, ones_left).unwrap();
                let (l, r) = (*left, *right);
                self.structure_at(l, out);
                self.structure_at(r, out);
                out.push(')');
            }
        }
    }

    // ------------------------------------------------------------------
    // Arena plumbing
    // ------------------------------------------------------------------

    fn alloc(&mut self, node: Node) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = node;
            id
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Return a node slot to the free list.
    fn free_node(&mut self, id: NodeId) {
        self.nodes[id] = Node {
            parent: NIL,
            color: Color::Black,
            kind: NodeKind::Leaf(LeafStore::new(0)),
        };
        self.free.push(id);
    }

    #[inline]
    fn is_leaf(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Leaf(_))
    }

    fn leaf_mut(&mut self, id: NodeId) -> &mut LeafStore {
        match &mut self.nodes[id].kind {
            NodeKind::Leaf(store) => store,
            NodeKind::Inner { .. } => unreachable!("expected leaf node"),
        }
    }

    fn take_leaf_store(&mut self, id: NodeId) -> LeafStore {
        match std::mem::replace(&mut self.nodes[id].kind, NodeKind::Leaf(LeafStore::new(0))) {
            NodeKind::Leaf(store) => store,
            NodeKind::Inner { .. } => unreachable!("expected leaf node"),
        }
    }

    fn inner_info(&self, id: NodeId) -> (NodeId, NodeId, usize, usize) {
        match &self.nodes[id].kind {
            NodeKind::Inner {
                left,
                right,
                bits_left,
                ones_left,
                ..
            } => (*left, *right, *bits_left, *ones_left),
            NodeKind::Leaf(_) => unreachable!("expected inner node"),
        }
    }

    fn inner_counts_mut(&mut self, id: NodeId) -> (&mut usize, &mut usize) {
        match &mut self.nodes[id].kind {
            NodeKind::Inner {
                bits_left,
                ones_left,
                ..
            } => (bits_left, ones_left),
            NodeKind::Leaf(_) => unreachable!("expected inner node"),
        }
    }

    /// Left child, or `NIL` for leaves.
    #[inline]
    fn left_of(&self, id: NodeId) -> NodeId {
        match &self.nodes[id].kind {
            NodeKind::Inner { left, .. } => *left,
            NodeKind::Leaf(_) => NIL,
        }
    }

    /// Right child, or `NIL` for leaves.
    #[inline]
    fn right_of(&self, id: NodeId) -> NodeId {
        match &self.nodes[id].kind {
            NodeKind::Inner { right, .. } => *right,
            NodeKind::Leaf(_) => NIL,
        }
    }

    #[inline]
    fn parent_of(&self, id: NodeId) -> NodeId {
        self.nodes[id].parent
    }

    /// Effective color: leaves and absent nodes count as black.
    #[inline]
    fn color_of(&self, id: NodeId) -> Color {
        if id == NIL || self.is_leaf(id) {
            Color::Black
        } else {
            self.nodes[id].color
        }
    }

    /// Recolor an inner node; silently ignored for leaves and `NIL`.
    fn set_color(&mut self, id: NodeId, color: Color) {
        if id != NIL && !self.is_leaf(id) {
            self.nodes[id].color = color;
        }
    }

    fn swap_colors(&mut self, a: NodeId, b: NodeId) {
        let (ca, cb) = (self.color_of(a), self.color_of(b));
        self.set_color(a, cb);
        self.set_color(b, ca);
    }

    /// Point `parent`'s link at `new_child` instead of `old_child`; `NIL`
    /// parent means the root moves.
    fn replace_child(&mut self, parent: NodeId, old_child: NodeId, new_child: NodeId) {
        if parent == NIL {
            self.root = new_child;
            return;
        }
        match &mut self.nodes[parent].kind {
            NodeKind::Inner { left, right, .. } => {
                if *left == old_child {
                    *left = new_child;
                } else {
                    debug_assert_eq!(*right, old_child);
                    *right = new_child;
                }
            }
            NodeKind::Leaf(_) => unreachable!("leaf cannot be a parent"),
        }
    }

    /// Subtree summary: cached for inner nodes, folded from chunk records
    /// for leaves.
    fn subtree_excess(&self, id: NodeId) -> Excess {
        match &self.nodes[id].kind {
            NodeKind::Inner { excess, .. } => *excess,
            NodeKind::Leaf(store) => store.excess_summary(),
        }
    }

    /// Recombine an inner node's subtree summary from its children.
    fn refresh_excess(&mut self, id: NodeId) {
        if !self.config.excess_enabled() {
            return;
        }
        let (left, right) = match &self.nodes[id].kind {
            NodeKind::Inner { left, right, .. } => (*left, *right),
            NodeKind::Leaf(_) => return,
        };
        let agg = self.subtree_excess(left).concat(&self.subtree_excess(right));
        if let NodeKind::Inner { excess, .. } = &mut self.nodes[id].kind {
            *excess = agg;
        }
    }

    // ------------------------------------------------------------------
    // Rotations
    // ------------------------------------------------------------------

    fn rotate_left(&mut self, id: NodeId) {
        let r = self.right_of(id);
        debug_assert_ne!(r, NIL);
        let r_left = self.left_of(r);

        // r's left subtree becomes id's right subtree.
        match &mut self.nodes[id].kind {
            NodeKind::Inner { right, .. } => *right = r_left,
            NodeKind::Leaf(_) => unreachable!(),
        }
        if r_left != NIL {
            self.nodes[r_left].parent = id;
        }

        // r takes id's place.
        let parent = self.nodes[id].parent;
        self.nodes[r].parent = parent;
        self.replace_child(parent, id, r);
        match &mut self.nodes[r].kind {
            NodeKind::Inner { left, .. } => *left = id,
            NodeKind::Leaf(_) => unreachable!(),
        }
        self.nodes[id].parent = r;

        // r's left subtree grew by id's: counters absorb id's left counts.
        let (id_bits, id_ones) = {
            let (_, _, b, o) = self.inner_info(id);
            (b, o)
        };
        let (rb, ro) = self.inner_counts_mut(r);
        *rb += id_bits;
        *ro += id_ones;

        self.refresh_excess(id);
        self.refresh_excess(r);
    }

    fn rotate_right(&mut self, id: NodeId) {
        let l = self.left_of(id);
        debug_assert_ne!(l, NIL);
        let l_right = self.right_of(l);

        match &mut self.nodes[id].kind {
            NodeKind::Inner { left, .. } => *left = l_right,
            NodeKind::Leaf(_) => unreachable!(),
        }
        if l_right != NIL {
            self.nodes[l_right].parent = id;
        }

        let parent = self.nodes[id].parent;
        self.nodes[l].parent = parent;
        self.replace_child(parent, id, l);
        match &mut self.nodes[l].kind {
            NodeKind::Inner { right, .. } => *right = id,
            NodeKind::Leaf(_) => unreachable!(),
        }
        self.nodes[id].parent = l;

        // id lost l's left subtree from its left counts.
        let (l_bits, l_ones) = {
            let (_, _, b, o) = self.inner_info(l);
            (b, o)
        };
        let (ib, io) = self.inner_counts_mut(id);
        *ib -= l_bits;
        *io -= l_ones;

        self.refresh_excess(id);
        self.refresh_excess(l);
    }

    // ------------------------------------------------------------------
    // Point updates
    // ------------------------------------------------------------------

    fn set_at(&mut self, id: NodeId, i: usize, value: bool) -> bool {
        let next = match &mut self.nodes[id].kind {
            NodeKind::Leaf(store) => return store.set(i, value),
            NodeKind::Inner {
                left,
                right,
                bits_left,
                ..
            } => {
                if i < *bits_left {
                    (*left, i, true)
                } else {
                    (*right, i - *bits_left, false)
                }
            }
        };
        let (child, ci, went_left) = next;
        let prev = self.set_at(child, ci, value);
        if went_left && prev != value {
            let (_, ones_left) = self.inner_counts_mut(id);
            if value {
                *ones_left += 1;
            } else {
                *ones_left -= 1;
            }
        }
        self.refresh_excess(id);
        prev
    }

    fn flip_at(&mut self, id: NodeId, i: usize) -> bool {
        let next = match &mut self.nodes[id].kind {
            NodeKind::Leaf(store) => return store.flip(i),
            NodeKind::Inner {
                left,
                right,
                bits_left,
                ..
            } => {
                if i < *bits_left {
                    (*left, i, true)
                } else {
                    (*right, i - *bits_left, false)
                }
            }
        };
        let (child, ci, went_left) = next;
        let now_one = self.flip_at(child, ci);
        if went_left {
            let (_, ones_left) = self.inner_counts_mut(id);
            if now_one {
                *ones_left += 1;
            } else {
                *ones_left -= 1;
            }
        }
        self.refresh_excess(id);
        now_one
    }

    // ------------------------------------------------------------------
    // Insertion
    // ------------------------------------------------------------------

    fn insert_at(&mut self, id: NodeId, i: usize, value: bool) {
        let next = match &mut self.nodes[id].kind {
            NodeKind::Leaf(store) => {
                store.insert(i, value);
                None
            }
            NodeKind::Inner {
                left,
                right,
                bits_left,
                ones_left,
                ..
            } => {
                if i < *bits_left {
                    *bits_left += 1;
                    if value {
                        *ones_left += 1;
                    }
                    Some((*left, i))
                } else {
                    Some((*right, i - *bits_left))
                }
            }
        };
        match next {
            None => {
                if self.leaf_store(id).word_count() >= self.config.max_leaf_blocks {
                    self.split_leaf(id);
                }
            }
            Some((child, ci)) => {
                self.insert_at(child, ci, value);
                self.refresh_excess(id);
            }
        }
    }

    /// Turn an overflowing leaf node into a red inner node over its two
    /// halves, then restore the red-black invariants.
    fn split_leaf(&mut self, id: NodeId) {
        let mut store = self.take_leaf_store(id);
        let right_store = store.split();
        let bits_left = store.len();
        let ones_left = store.num_ones();

        let l = self.alloc(Node {
            parent: id,
            color: Color::Black,
            kind: NodeKind::Leaf(store),
        });
        let r = self.alloc(Node {
            parent: id,
            color: Color::Black,
            kind: NodeKind::Leaf(right_store),
        });
        self.nodes[id].kind = NodeKind::Inner {
            left: l,
            right: r,
            bits_left,
            ones_left,
            excess: Excess::EMPTY,
        };
        self.nodes[id].color = Color::Red;
        self.refresh_excess(id);
        self.rebalance_after_insert(id);
    }

    fn rebalance_after_insert(&mut self, mut node: NodeId) {
        while node != self.root
            && self.color_of(node) == Color::Red
            && self.color_of(self.parent_of(node)) == Color::Red
        {
            let mut parent = self.parent_of(node);
            let grandparent = self.parent_of(parent);
            if parent == self.left_of(grandparent) {
                let uncle = self.right_of(grandparent);
                if self.color_of(uncle) == Color::Red {
                    self.set_color(uncle, Color::Black);
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    node = grandparent;
                } else {
                    if node == self.right_of(parent) {
                        self.rotate_left(parent);
                        node = parent;
                        parent = self.parent_of(node);
                    }
                    self.rotate_right(grandparent);
                    self.swap_colors(parent, grandparent);
                    node = parent;
                }
            } else {
                let uncle = self.left_of(grandparent);
                if self.color_of(uncle) == Color::Red {
                    self.set_color(uncle, Color::Black);
                    self.set_color(parent, Color::Black);
                    self.set_color(grandparent, Color::Red);
                    node = grandparent;
                } else {
                    if node == self.left_of(parent) {
                        self.rotate_right(parent);
                        node = parent;
                        parent = self.parent_of(node);
                    }
                    self.rotate_left(grandparent);
                    self.swap_colors(parent, grandparent);
                    node = parent;
                }
            }
        }
        let root = self.root;
        self.set_color(root, Color::Black);
    }

    // ------------------------------------------------------------------
    // Deletion
    // ------------------------------------------------------------------

    fn delete_at(
        &mut self,
        id: NodeId,
        i: usize,
        num_bits: usize,
        allow_underflow: bool,
    ) -> LeafDeletion {
        let min_bits = self.config.min_leaf_bits();

        if self.is_leaf(id) {
            let at_minimum = self.leaf_store(id).word_count() <= self.config.min_leaf_blocks;
            if !allow_underflow && id != self.root && at_minimum {
                return LeafDeletion::Underflow;
            }
            return if self.leaf_mut(id).remove(i) {
                LeafDeletion::DeletedOne
            } else {
                LeafDeletion::DeletedZero
            };
        }

        let (left, right, bits_left, _ones_left) = self.inner_info(id);

        if bits_left <= i {
            // Deleting in the right subtree.
            let result = self.delete_at(right, i - bits_left, num_bits - bits_left, allow_underflow);
            if result == LeafDeletion::Underflow {
                return result;
            }
            if num_bits - bits_left == min_bits {
                // The right subtree was a lone leaf at minimum size: steal
                // the left neighbor's last bit, or merge if it is minimal
                // too.
                match self.delete_at(left, bits_left - 1, bits_left, false) {
                    LeafDeletion::Underflow => {
                        debug_assert!(self.is_leaf(right));
                        let src = self.take_leaf_store(right);
                        let src_ones = src.num_ones();
                        self.free_node(right);
                        self.move_to_leaf(left, bits_left, src, src_ones, true);
                        self.splice_unary(id, left);
                        return result;
                    }
                    stolen => {
                        let one = stolen == LeafDeletion::DeletedOne;
                        self.insert_at(right, 0, one);
                        let (b, o) = self.inner_counts_mut(id);
                        *b -= 1;
                        if one {
                            *o -= 1;
                        }
                    }
                }
            }
            self.refresh_excess(id);
            result
        } else {
            // Deleting in the left subtree.
            let result = self.delete_at(left, i, bits_left, allow_underflow);
            if result == LeafDeletion::Underflow {
                return result;
            }
            if result == LeafDeletion::DeletedOne {
                let (_, o) = self.inner_counts_mut(id);
                *o -= 1;
            }
            if bits_left == min_bits {
                match self.delete_at(right, 0, num_bits - bits_left, false) {
                    LeafDeletion::Underflow => {
                        debug_assert!(self.is_leaf(left));
                        let src = self.take_leaf_store(left);
                        let src_ones = src.num_ones();
                        self.free_node(left);
                        self.move_to_leaf(right, 0, src, src_ones, false);
                        self.splice_unary(id, right);
                        return result;
                    }
                    stolen => {
                        let one = stolen == LeafDeletion::DeletedOne;
                        self.insert_at(left, bits_left - 1, one);
                        if one {
                            let (_, o) = self.inner_counts_mut(id);
                            *o += 1;
                        }
                        // Net bit count of the left subtree is unchanged.
                    }
                }
            } else {
                let (b, _) = self.inner_counts_mut(id);
                *b -= 1;
            }
            self.refresh_excess(id);
            result
        }
    }

    /// Splice a leaf's bits onto the boundary leaf of a subtree: its
    /// rightmost leaf's back (`insert_back`) or leftmost leaf's front.
    fn move_to_leaf(
        &mut self,
        id: NodeId,
        i: usize,
        src: LeafStore,
        src_ones: usize,
        insert_back: bool,
    ) {
        let src_bits = src.len();
        let next = match &mut self.nodes[id].kind {
            NodeKind::Leaf(_) => None,
            NodeKind::Inner {
                left,
                right,
                bits_left,
                ones_left,
                ..
            } => {
                if *bits_left <= i {
                    Some((*right, i - *bits_left))
                } else {
                    *bits_left += src_bits;
                    *ones_left += src_ones;
                    Some((*left, i))
                }
            }
        };
        match next {
            None => {
                if insert_back {
                    self.leaf_mut(id).concat(&src);
                } else {
                    let old = self.take_leaf_store(id);
                    let mut merged = src;
                    merged.concat(&old);
                    self.nodes[id].kind = NodeKind::Leaf(merged);
                }
            }
            Some((child, ci)) => {
                self.move_to_leaf(child, ci, src, src_ones, insert_back);
                self.refresh_excess(id);
            }
        }
    }

    /// Remove an inner node that has a single remaining child, lifting the
    /// child into its place. Records a double-black repair when a black node
    /// leaves a path.
    fn splice_unary(&mut self, id: NodeId, child: NodeId) {
        let parent = self.parent_of(id);
        let id_color = self.color_of(id);
        self.nodes[child].parent = parent;
        self.replace_child(parent, id, child);
        self.free_node(id);

        if parent == NIL {
            let root = self.root;
            self.set_color(root, Color::Black);
            return;
        }
        if id_color == Color::Red {
            return;
        }
        if !self.is_leaf(child) && self.color_of(child) == Color::Red {
            self.set_color(child, Color::Black);
            return;
        }
        debug_assert!(self.pending_fixup.is_none());
        self.pending_fixup = Some(child);
    }

    /// Resolve a path that is one black node short, walking up with the
    /// classic sibling cases. Runs only after all counters have settled, so
    /// the rotation counter fixes are exact.
    fn fix_double_black(&mut self, mut x: NodeId) {
        while x != self.root && self.color_of(x) == Color::Black {
            let parent = self.parent_of(x);
            if x == self.left_of(parent) {
                let mut s = self.right_of(parent);
                if self.color_of(s) == Color::Red {
                    self.set_color(s, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_left(parent);
                    s = self.right_of(parent);
                }
                if self.color_of(self.left_of(s)) == Color::Black
                    && self.color_of(self.right_of(s)) == Color::Black
                {
                    debug_assert!(!self.is_leaf(s), "deficit sibling cannot be a leaf");
                    self.set_color(s, Color::Red);
                    x = parent;
                } else {
                    if self.color_of(self.right_of(s)) == Color::Black {
                        let sl = self.left_of(s);
                        self.set_color(sl, Color::Black);
                        self.set_color(s, Color::Red);
                        self.rotate_right(s);
                        s = self.right_of(parent);
                    }
                    let pc = self.color_of(parent);
                    self.set_color(s, pc);
                    self.set_color(parent, Color::Black);
                    let sr = self.right_of(s);
                    self.set_color(sr, Color::Black);
                    self.rotate_left(parent);
                    x = self.root;
                }
            } else {
                let mut s = self.left_of(parent);
                if self.color_of(s) == Color::Red {
                    self.set_color(s, Color::Black);
                    self.set_color(parent, Color::Red);
                    self.rotate_right(parent);
                    s = self.left_of(parent);
                }
                if self.color_of(self.left_of(s)) == Color::Black
                    && self.color_of(self.right_of(s)) == Color::Black
                {
                    debug_assert!(!self.is_leaf(s), "deficit sibling cannot be a leaf");
                    self.set_color(s, Color::Red);
                    x = parent;
                } else {
                    if self.color_of(self.left_of(s)) == Color::Black {
                        let sr = self.right_of(s);
                        self.set_color(sr, Color::Black);
                        self.set_color(s, Color::Red);
                        self.rotate_left(s);
                        s = self.left_of(parent);
                    }
                    let pc = self.color_of(parent);
                    self.set_color(s, pc);
                    self.set_color(parent, Color::Black);
                    let sl = self.left_of(s);
                    self.set_color(sl, Color::Black);
                    self.rotate_right(parent);
                    x = self.root;
                }
            }
        }
        self.set_color(x, Color::Black);
    }

    // ------------------------------------------------------------------
    // Excess search
    // ------------------------------------------------------------------

    /// Forward excess search: the smallest `q >= p` where the running excess
    /// over `p..=q` equals `target`.
    ///
    /// Pruning is minimum-based, so the search is exact whenever the target
    /// lies at or below the running excess along the way, as parentheses
    /// navigation guarantees. Requires excess tracking.
    pub fn forward_search(&self, p: usize, target: i64) -> Option<usize> {
        if !self.config.excess_enabled() || p >= self.len {
            return None;
        }

        // Descend to the leaf holding position p.
        let mut id = self.root;
        let mut i = p;
        let mut offset = 0;
        while let NodeKind::Inner {
            left,
            right,
            bits_left,
            ..
        } = &self.nodes[id].kind
        {
            if i < *bits_left {
                id = *left;
            } else {
                i -= *bits_left;
                offset += *bits_left;
                id = *right;
            }
        }

        let mut running = match self.leaf_store(id).forward_search(i, 0, target) {
            ExcessScan::Found(b) => return Some(offset + b),
            ExcessScan::Continue(r) => r,
        };

        // Walk up, probing each right sibling subtree.
        let mut sub_start = offset;
        let mut cur = id;
        loop {
            let parent = self.parent_of(cur);
            if parent == NIL {
                return None;
            }
            let (pl, pr, pbl, _) = self.inner_info(parent);
            if cur == pl {
                let agg = self.subtree_excess(pr);
                if running + agg.min_excess <= target {
                    return self.descend_forward(pr, sub_start + pbl, running, target);
                }
                running += agg.block_excess;
            } else {
                sub_start -= pbl;
            }
            cur = parent;
        }
    }

    fn descend_forward(
        &self,
        mut id: NodeId,
        mut start: usize,
        mut running: i64,
        target: i64,
    ) -> Option<usize> {
        loop {
            match &self.nodes[id].kind {
                NodeKind::Leaf(store) => {
                    return match store.forward_search(0, running, target) {
                        ExcessScan::Found(b) => Some(start + b),
                        ExcessScan::Continue(_) => None,
                    }
                }
                NodeKind::Inner {
                    left,
                    right,
                    bits_left,
                    ..
                } => {
                    let lagg = self.subtree_excess(*left);
                    if running + lagg.min_excess <= target {
                        id = *left;
                    } else {
                        running += lagg.block_excess;
                        start += *bits_left;
                        id = *right;
                    }
                }
            }
        }
    }

    /// Backward excess search: scanning leftward from `p` (exclusive) with
    /// flipped signs, the largest `q < p` where the running excess first
    /// equals `target`. Requires excess tracking.
    pub fn backward_search(&self, p: usize, target: i64) -> Option<usize> {
        if !self.config.excess_enabled() || p == 0 || p > self.len {
            return None;
        }

        // Descend to the leaf holding position p - 1.
        let mut id = self.root;
        let mut i = p - 1;
        let mut offset = 0;
        while let NodeKind::Inner {
            left,
            right,
            bits_left,
            ..
        } = &self.nodes[id].kind
        {
            if i < *bits_left {
                id = *left;
            } else {
                i -= *bits_left;
                offset += *bits_left;
                id = *right;
            }
        }

        let mut running = match self.leaf_store(id).backward_search(i + 1, 0, target) {
            ExcessScan::Found(b) => return Some(offset + b),
            ExcessScan::Continue(r) => r,
        };

        // Walk up, probing each left sibling subtree.
        let mut sub_start = offset;
        let mut cur = id;
        loop {
            let parent = self.parent_of(cur);
            if parent == NIL {
                return None;
            }
            let (pl, pr, pbl, _) = self.inner_info(parent);
            if cur == pr {
                sub_start -= pbl;
                let agg = self.subtree_excess(pl);
                if running + agg.backward_min() <= target {
                    return self.descend_backward(pl, sub_start, running, target);
                }
                running -= agg.block_excess;
            }
            cur = parent;
        }
    }

    fn descend_backward(
        &self,
        mut id: NodeId,
        mut start: usize,
        mut running: i64,
        target: i64,
    ) -> Option<usize> {
        loop {
            match &self.nodes[id].kind {
                NodeKind::Leaf(store) => {
                    return match store.backward_search(store.len(), running, target) {
                        ExcessScan::Found(b) => Some(start + b),
                        ExcessScan::Continue(_) => None,
                    }
                }
                NodeKind::Inner {
                    left,
                    right,
                    bits_left,
                    ..
                } => {
                    let ragg = self.subtree_excess(*right);
                    if running + ragg.backward_min() <= target {
                        start += *bits_left;
                        id = *right;
                    } else {
                        running -= ragg.block_excess;
                        id = *left;
                    }
                }
            }
        }
    }

    fn leaf_store(&self, id: NodeId) -> &LeafStore {
        match &self.nodes[id].kind {
            NodeKind::Leaf(store) => store,
            NodeKind::Inner { .. } => unreachable!("expected leaf node"),
        }
    }

    // ------------------------------------------------------------------
    // Invariant checking (tests and debug builds)
    // ------------------------------------------------------------------

    /// Validate every structural invariant; panics on the first violation.
    #[doc(hidden)]
    pub fn check_invariants(&self) {
        assert_eq!(self.parent_of(self.root), NIL, "root has a parent");
        assert_eq!(self.color_of(self.root), Color::Black, "root not black");
        let (bits, ones, _bh, agg) = self.check_at(self.root);
        assert_eq!(bits, self.len, "total bits out of sync");
        assert_eq!(ones, self.ones, "total ones out of sync");
        if self.config.excess_enabled() {
            assert_eq!(
                agg.block_excess,
                bits as i64 - 2 * ones as i64,
                "excess total inconsistent with counts"
            );
        }
    }

    fn check_at(&self, id: NodeId) -> (usize, usize, usize, Excess) {
        match &self.nodes[id].kind {
            NodeKind::Leaf(store) => {
                assert_eq!(
                    store.tracks_excess(),
                    self.config.excess_enabled(),
                    "leaf chunk tracking out of sync with config"
                );
                if id != self.root {
                    assert!(
                        store.len() >= self.config.min_leaf_bits(),
                        "leaf below minimum: {} bits",
                        store.len()
                    );
                }
                assert!(
                    store.word_count() <= self.config.max_leaf_blocks,
                    "leaf above maximum: {} words",
                    store.word_count()
                );
                #[cfg(any(test, debug_assertions))]
                store.verify_chunks();
                let agg = if store.tracks_excess() {
                    store.excess_summary()
                } else {
                    Excess::EMPTY
                };
                (store.len(), store.num_ones(), 1, agg)
            }
            NodeKind::Inner {
                left,
                right,
                bits_left,
                ones_left,
                excess,
            } => {
                let (l, r) = (*left, *right);
                assert_eq!(self.parent_of(l), id, "left child parent link broken");
                assert_eq!(self.parent_of(r), id, "right child parent link broken");
                if self.color_of(id) == Color::Red {
                    assert_eq!(self.color_of(l), Color::Black, "red node with red child");
                    assert_eq!(self.color_of(r), Color::Black, "red node with red child");
                }
                let (lb, lo, lbh, lagg) = self.check_at(l);
                let (rb, ro, rbh, ragg) = self.check_at(r);
                assert_eq!(lb, *bits_left, "bits_left out of sync");
                assert_eq!(lo, *ones_left, "ones_left out of sync");
                assert_eq!(lbh, rbh, "black height mismatch");
                let agg = lagg.concat(&ragg);
                if self.config.excess_enabled() {
                    assert_eq!(*excess, agg, "subtree excess summary stale");
                }
                let own = if self.color_of(id) == Color::Black { 1 } else { 0 };
                (lb + rb, lo + ro, lbh + own, agg)
            }
        }
    }
}
