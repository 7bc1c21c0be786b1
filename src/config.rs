//! Construction-time configuration.

use crate::error::{Error, Result};

/// Smallest supported number of index bits consumed per level.
pub const MIN_BRANCHING_BITS: u32 = 1;

/// Largest supported number of index bits consumed per level.
pub const MAX_BRANCHING_BITS: u32 = 8;

/// Default number of index bits consumed per level (64-way blocks).
pub const DEFAULT_BRANCHING_BITS: u32 = 6;

/// Configuration for an [`XArray`](crate::XArray).
///
/// None of these settings can change once the array is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// log2 of the block fan-out. Must lie in `1..=8`.
    pub branching_bits: u32,
    /// Recycle released blocks and leaves instead of freeing them.
    pub pooling: bool,
    /// Ceiling on live interior blocks (root excluded). `None` is unbounded.
    pub max_blocks: Option<usize>,
    /// Ceiling on live leaves. `None` is unbounded.
    pub max_leaves: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            branching_bits: DEFAULT_BRANCHING_BITS,
            pooling: false,
            max_blocks: None,
            max_leaves: None,
        }
    }
}

impl Config {
    /// Same as [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn branching_bits(mut self, bits: u32) -> Self {
        self.branching_bits = bits;
        self
    }

    pub fn pooling(mut self, enabled: bool) -> Self {
        self.pooling = enabled;
        self
    }

    pub fn max_blocks(mut self, limit: usize) -> Self {
        self.max_blocks = Some(limit);
        self
    }

    pub fn max_leaves(mut self, limit: usize) -> Self {
        self.max_leaves = Some(limit);
        self
    }

    /// Number of slots in every block.
    #[inline]
    pub fn fanout(&self) -> usize {
        1usize << self.branching_bits
    }

    /// Check the settings, returning [`Error::InvalidConfig`] on the first
    /// problem found.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_BRANCHING_BITS..=MAX_BRANCHING_BITS).contains(&self.branching_bits) {
            return Err(Error::InvalidConfig(format!(
                "branching_bits must be in {}..={}, got {}",
                MIN_BRANCHING_BITS, MAX_BRANCHING_BITS, self.branching_bits
            )));
        }
        if self.max_leaves == Some(0) {
            return Err(Error::InvalidConfig(
                "max_leaves of 0 would reject every insert".to_string(),
            ));
        }
        Ok(())
    }
}
