//! Trait for array index types (u16, u32, u64).

use std::fmt::Debug;

/// Unsigned integer types usable as an array index.
///
/// The width of the type fixes the index space and, together with the
/// configured branching bits, the depth of the trie.
pub trait TrieIndex: Copy + Ord + Debug + Sized {
    /// Number of bits in the index.
    const BITS: u32;

    /// Widen to `u64` for slot arithmetic.
    fn to_u64(self) -> u64;

    /// Largest representable index.
    fn max_index() -> Self;

    /// Slot selected by this index in a block at `shift`.
    #[inline(always)]
    fn slot_at(self, shift: u32, mask: u64) -> usize {
        ((self.to_u64() >> shift) & mask) as usize
    }
}

macro_rules! impl_trie_index {
    ($($t:ty),*) => {
        $(
            impl TrieIndex for $t {
                const BITS: u32 = <$t>::BITS;

                #[inline(always)]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline(always)]
                fn max_index() -> Self {
                    <$t>::MAX
                }
            }
        )*
    };
}

impl_trie_index!(u16, u32, u64);

/// Shift of the root block.
///
/// The lowest level always consumes exactly `bits`; the root absorbs any
/// remainder when `index_bits` is not a multiple of `bits`.
#[inline]
pub(crate) fn max_shift(index_bits: u32, bits: u32) -> u32 {
    if index_bits % bits == 0 {
        index_bits - bits
    } else {
        index_bits - index_bits % bits
    }
}

/// Number of block levels from root to leaf-holding blocks.
#[inline]
pub(crate) fn depth(index_bits: u32, bits: u32) -> u32 {
    index_bits.div_ceil(bits)
}
