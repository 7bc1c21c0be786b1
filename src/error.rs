//! Error types for array operations.

use std::fmt;

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of trie element an allocation was requested for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocKind {
    /// An interior block.
    Block,
    /// A leaf holding one payload.
    Leaf,
}

impl fmt::Display for AllocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocKind::Block => f.write_str("block"),
            AllocKind::Leaf => f.write_str("leaf"),
        }
    }
}

/// Errors reported by [`XArray`](crate::XArray).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The configuration was rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A block or leaf could not be allocated.
    #[error("Allocation failed: could not obtain a {kind}")]
    AllocationFailed {
        /// What was being allocated.
        kind: AllocKind,
    },
}
