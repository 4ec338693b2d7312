//! Text formats for the two benchmark drivers.
//!
//! The `bv` format starts with an initial bit count `N`, then `N` lines of
//! `0`/`1`, then one query per line. The `bp` format is queries only; the
//! tree always starts as a lone root. Tokens are separated by single spaces.
//!
//! Lexical and arity errors abort parsing with a line-numbered
//! [`Error::Malformed`]. Range errors can only be judged against the
//! container's state at execution time; the executors treat them like the
//! containers do -- as rejected no-ops that produce no output line.

use crate::bp::DynamicBpTree;
use crate::error::Error;
use crate::tree::DynamicBitVec;
use crate::WORD_BITS;

/// One query against a dynamic bitvector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BvQuery {
    /// `insert <pos> <bit>`
    Insert { pos: usize, bit: bool },
    /// `delete <pos>`
    Delete { pos: usize },
    /// `flip <pos>`
    Flip { pos: usize },
    /// `rank <bit> <pos>`
    Rank { bit: bool, pos: usize },
    /// `select <bit> <k>`
    Select { bit: bool, k: usize },
}

/// Parsed `bv` input: initial bits plus the query list.
#[derive(Clone, Debug)]
pub struct BvInput {
    /// Initial bit sequence, packed.
    pub words: Vec<u64>,
    /// Number of initial bits.
    pub len: usize,
    /// Queries in input order.
    pub queries: Vec<BvQuery>,
}

/// One query against a balanced-parentheses tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BpQuery {
    /// `deletenode <v>`
    DeleteNode { v: usize },
    /// `insertchild <v> <i> <k>`
    InsertChild { v: usize, i: usize, k: usize },
    /// `child <v> <i>`
    Child { v: usize, i: usize },
    /// `subtree_size <v>`
    SubtreeSize { v: usize },
    /// `parent <v>`
    Parent { v: usize },
}

fn parse_number(token: Option<&str>, line: usize, what: &str) -> Result<usize, Error> {
    let token = token.ok_or_else(|| Error::malformed(line, format!("missing {}", what)))?;
    token
        .parse::<usize>()
        .map_err(|_| Error::malformed(line, format!("invalid {}: {:?}", what, token)))
}

fn parse_bit(token: Option<&str>, line: usize, what: &str) -> Result<bool, Error> {
    match token {
        Some("0") => Ok(false),
        Some("1") => Ok(true),
        Some(other) => Err(Error::malformed(
            line,
            format!("{} must be 0 or 1, got {:?}", what, other),
        )),
        None => Err(Error::malformed(line, format!("missing {}", what))),
    }
}

fn reject_extra(mut tokens: std::str::Split<'_, char>, line: usize) -> Result<(), Error> {
    match tokens.next() {
        Some(extra) => Err(Error::malformed(
            line,
            format!("unexpected trailing token {:?}", extra),
        )),
        None => Ok(()),
    }
}

/// Parse a complete `bv` input file.
pub fn parse_bv(input: &str) -> Result<BvInput, Error> {
    let mut lines = input.lines().enumerate();

    let (_, first) = lines
        .next()
        .ok_or_else(|| Error::malformed(1, "empty input"))?;
    let len = first
        .trim()
        .parse::<usize>()
        .map_err(|_| Error::malformed(1, format!("invalid bit count {:?}", first)))?;

    let mut words = vec![0u64; len.div_ceil(WORD_BITS)];
    for i in 0..len {
        let (no, line) = lines
            .next()
            .ok_or_else(|| Error::malformed(i + 2, "input ended before all initial bits"))?;
        if parse_bit(Some(line.trim()), no + 1, "initial bit")? {
            words[i / WORD_BITS] |= 1u64 << (i % WORD_BITS);
        }
    }

    let mut queries = Vec::new();
    for (no, line) in lines {
        if line.is_empty() {
            continue;
        }
        queries.push(parse_bv_query(line, no + 1)?);
    }
    Ok(BvInput { words, len, queries })
}

fn parse_bv_query(line: &str, no: usize) -> Result<BvQuery, Error> {
    let mut tokens = line.split(' ');
    let query = match tokens.next() {
        Some("insert") => BvQuery::Insert {
            pos: parse_number(tokens.next(), no, "position")?,
            bit: parse_bit(tokens.next(), no, "bit")?,
        },
        Some("delete") => BvQuery::Delete {
            pos: parse_number(tokens.next(), no, "position")?,
        },
        Some("flip") => BvQuery::Flip {
            pos: parse_number(tokens.next(), no, "position")?,
        },
        Some("rank") => BvQuery::Rank {
            bit: parse_bit(tokens.next(), no, "bit")?,
            pos: parse_number(tokens.next(), no, "position")?,
        },
        Some("select") => BvQuery::Select {
            bit: parse_bit(tokens.next(), no, "bit")?,
            k: parse_number(tokens.next(), no, "occurrence index")?,
        },
        other => {
            return Err(Error::malformed(
                no,
                format!("unknown query {:?}", other.unwrap_or("")),
            ))
        }
    };
    reject_extra(tokens, no)?;
    Ok(query)
}

/// Parse a complete `bp` input file.
pub fn parse_bp(input: &str) -> Result<Vec<BpQuery>, Error> {
    let mut queries = Vec::new();
    for (no, line) in input.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let no = no + 1;
        let mut tokens = line.split(' ');
        let query = match tokens.next() {
            Some("deletenode") => BpQuery::DeleteNode {
                v: parse_number(tokens.next(), no, "node")?,
            },
            Some("insertchild") => BpQuery::InsertChild {
                v: parse_number(tokens.next(), no, "node")?,
                i: parse_number(tokens.next(), no, "child index")?,
                k: parse_number(tokens.next(), no, "child count")?,
            },
            Some("child") => BpQuery::Child {
                v: parse_number(tokens.next(), no, "node")?,
                i: parse_number(tokens.next(), no, "child index")?,
            },
            Some("subtree_size") => BpQuery::SubtreeSize {
                v: parse_number(tokens.next(), no, "node")?,
            },
            Some("parent") => BpQuery::Parent {
                v: parse_number(tokens.next(), no, "node")?,
            },
            other => {
                return Err(Error::malformed(
                    no,
                    format!("unknown query {:?}", other.unwrap_or("")),
                ))
            }
        };
        reject_extra(tokens, no)?;
        queries.push(query);
    }
    Ok(queries)
}

/// Run `bv` queries in order, returning one value per answered `rank` or
/// `select`.
pub fn run_bv_queries(bv: &mut DynamicBitVec, queries: &[BvQuery]) -> Vec<usize> {
    let mut out = Vec::new();
    for query in queries {
        match *query {
            BvQuery::Insert { pos, bit } => bv.insert(pos, bit),
            BvQuery::Delete { pos } => bv.remove(pos),
            BvQuery::Flip { pos } => bv.flip(pos),
            BvQuery::Rank { bit, pos } => {
                if let Some(rank) = bv.rank(bit, pos) {
                    out.push(rank);
                }
            }
            BvQuery::Select { bit, k } => {
                if let Some(pos) = bv.select(bit, k) {
                    out.push(pos);
                }
            }
        }
    }
    out
}

/// Run `bp` queries in order, returning one value per answered `child`,
/// `subtree_size`, or `parent`.
pub fn run_bp_queries(tree: &mut DynamicBpTree, queries: &[BpQuery]) -> Vec<usize> {
    let mut out = Vec::new();
    for query in queries {
        match *query {
            BpQuery::DeleteNode { v } => {
                tree.delete_node(v);
            }
            BpQuery::InsertChild { v, i, k } => {
                tree.insert_child(v, i, k);
            }
            BpQuery::Child { v, i } => {
                if let Some(c) = tree.child(v, i) {
                    out.push(c);
                }
            }
            BpQuery::SubtreeSize { v } => {
                if let Some(size) = tree.subtree_size(v) {
                    out.push(size);
                }
            }
            BpQuery::Parent { v } => {
                if let Some(p) = tree.parent(v) {
                    out.push(p);
                }
            }
        }
    }
    out
}
