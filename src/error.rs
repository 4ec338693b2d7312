//! Error type for input parsing and leaf contract failures.

use thiserror::Error;

/// Errors surfaced by the query parsers and leaf-level operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A query file line that does not match the expected grammar.
    #[error("malformed input at line {line}: {reason}")]
    Malformed {
        /// 1-based line number in the input file.
        line: usize,
        /// Human-readable description of what failed to parse.
        reason: String,
    },

    /// Appending into an excess-tracking leaf whose length is not
    /// word-aligned. Chunk summaries are only maintained across word-aligned
    /// concatenation; callers that need arbitrary splicing go through the
    /// container's merge path instead.
    #[error("append into excess-tracking leaf at unaligned length {len}")]
    UnalignedAppend {
        /// Bit length of the destination leaf.
        len: usize,
    },
}

impl Error {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Error::Malformed {
            line,
            reason: reason.into(),
        }
    }
}
