//! # xarray
//!
//! A sparse array keyed by fixed-width unsigned integers, stored in a
//! fixed-arity radix trie ("block tree").
//!
//! Each trie level consumes `branching_bits` of the index, most significant
//! slice first. Interior blocks are created on demand and reclaimed as soon as
//! they become empty, so memory follows the number of populated entries
//! rather than the size of the index space.
//!
//! ## Example
//!
//! ```rust
//! use xarray::XArray;
//!
//! let mut array: XArray<&str> = XArray::new();
//! array.set(5, "five").unwrap();
//! array.set(0, "zero").unwrap();
//!
//! assert_eq!(array.get(5), Some(&"five"));
//! assert_eq!(array.iter().collect::<Vec<_>>(), vec![(0, &"zero"), (5, &"five")]);
//!
//! array.unset(0);
//! assert_eq!(array.get(0), None);
//! ```
//!
//! ## Threading
//!
//! An `XArray` has no internal locking. Callers sharing one across threads
//! must serialize access themselves.

#![deny(unsafe_op_in_unsafe_fn)]

mod block;
mod config;
mod error;
mod index;
mod iter;
mod pool;

pub use config::{Config, DEFAULT_BRANCHING_BITS, MAX_BRANCHING_BITS, MIN_BRANCHING_BITS};
pub use error::{AllocKind, Error, Result};
pub use index::TrieIndex;
pub use iter::{Cursor, Iter, Keys, Values};

use std::fmt;
use std::mem;

use tracing::{debug, trace, warn};

use block::{Block, BlockId, Leaf, LeafId, Slot};
use pool::Pool;

/// Callback run on a payload just before it is overwritten, unset or cleared.
type DestroyFn<T> = Box<dyn FnMut(&mut T)>;

/// Counters describing the current shape of an array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Populated indices.
    pub leaves: usize,
    /// Live interior blocks, root excluded.
    pub blocks: usize,
    /// Released blocks held for reuse.
    pub pooled_blocks: usize,
    /// Released leaves held for reuse.
    pub pooled_leaves: usize,
    /// Block levels between the root and a leaf, root included.
    pub depth: u32,
    /// Slots per block.
    pub fanout: usize,
    /// Approximate heap and inline bytes owned by the array.
    pub memory_bytes: usize,
}

/// A sparse array indexed by `I` (`u16`, `u32` or `u64`) holding values of
/// type `T`.
///
/// See the [crate docs](crate) for an overview.
pub struct XArray<T, I: TrieIndex = u32> {
    config: Config,
    blocks: Pool<Block>,
    leaves: Pool<Leaf<I, T>>,
    root: BlockId,
    /// Live blocks, root excluded.
    block_count: usize,
    leaf_count: usize,
    mask: u64,
    destroy: Option<DestroyFn<T>>,
}

impl<T, I: TrieIndex> XArray<T, I> {
    /// Create an empty array with the default [`Config`].
    pub fn new() -> Self {
        Self::build(Config::default(), None)
    }

    /// Create an empty array with the given configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, None))
    }

    /// Create an empty array that calls `destroy` on every payload exactly
    /// once before it is overwritten, unset, cleared or dropped with the
    /// array.
    pub fn with_destructor<F>(config: Config, destroy: F) -> Result<Self>
    where
        F: FnMut(&mut T) + 'static,
    {
        config.validate()?;
        Ok(Self::build(config, Some(Box::new(destroy))))
    }

    fn build(config: Config, destroy: Option<DestroyFn<T>>) -> Self {
        let bits = config.branching_bits;
        let top_shift = index::max_shift(I::BITS, bits);

        // The root sits in the block pool too, so the ceiling gets one extra.
        let mut blocks = Pool::new(
            AllocKind::Block,
            config.pooling,
            config.max_blocks.map(|limit| limit.saturating_add(1)),
        );
        let root = BlockId(blocks.insert(Block::root(config.fanout(), top_shift)));
        let leaves = Pool::new(AllocKind::Leaf, config.pooling, config.max_leaves);

        debug!(
            index_bits = I::BITS,
            branching_bits = bits,
            pooling = config.pooling,
            "created array"
        );

        Self {
            mask: (1u64 << bits) - 1,
            config,
            blocks,
            leaves,
            root,
            block_count: 0,
            leaf_count: 0,
            destroy,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of populated indices.
    #[inline]
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Number of live interior blocks, not counting the root.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Number of block levels from the root down to a leaf's block.
    #[inline]
    pub fn depth(&self) -> u32 {
        index::depth(I::BITS, self.config.branching_bits)
    }

    pub fn memory_usage(&self) -> usize {
        let slot_bytes = self.config.fanout() * mem::size_of::<Slot>();
        mem::size_of::<Self>()
            + self.blocks.memory_usage()
            + (self.blocks.live() + self.blocks.pooled()) * slot_bytes
            + self.leaves.memory_usage()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            leaves: self.leaf_count,
            blocks: self.block_count,
            pooled_blocks: self.blocks.pooled(),
            pooled_leaves: self.leaves.pooled(),
            depth: self.depth(),
            fanout: self.config.fanout(),
            memory_bytes: self.memory_usage(),
        }
    }

    /// Drop every pooled block and leaf. Returns `(blocks, leaves)` dropped.
    pub fn purge_pooled(&mut self) -> (usize, usize) {
        let blocks = self.blocks.purge();
        let leaves = self.leaves.purge();
        if blocks + leaves > 0 {
            debug!(blocks, leaves, "purged pooled items");
        }
        (blocks, leaves)
    }

    /// Purge pools and release spare bookkeeping capacity.
    pub fn shrink_to_fit(&mut self) {
        self.blocks.shrink_to_fit();
        self.leaves.shrink_to_fit();
    }

    /// Run the destroy callback on a live leaf's payload.
    ///
    /// Every path that gets rid of a payload (overwrite, unset, clear, drop)
    /// goes through here.
    fn retire(&mut self, leaf: LeafId) {
        if let Some(destroy) = self.destroy.as_mut() {
            if let Some(value) = self.leaves.get_mut(leaf.0).value.as_mut() {
                destroy(value);
            }
        }
    }

    /// Walk to the slot holding `index`: `(block, slot position, leaf)`.
    fn locate(&self, index: I) -> Option<(BlockId, usize, LeafId)> {
        let mut block_id = self.root;
        loop {
            let block = self.blocks.get(block_id.0);
            let pos = index.slot_at(block.shift, self.mask);
            match block.slots[pos] {
                Slot::Empty => return None,
                Slot::Block(child) => block_id = child,
                Slot::Leaf(leaf) => return Some((block_id, pos, leaf)),
            }
        }
    }

    /// Find or create the leaf for `index`, creating missing blocks on the
    /// way. An existing payload is retired before returning.
    ///
    /// On allocation failure every block created by this call is reclaimed
    /// again before the error is returned.
    fn leaf_for(&mut self, index: I) -> Result<LeafId> {
        let fanout = self.config.fanout();
        let bits = self.config.branching_bits;
        let mut block_id = self.root;

        loop {
            let block = self.blocks.get(block_id.0);
            let shift = block.shift;
            let pos = index.slot_at(shift, self.mask);
            let slot = block.slots[pos];

            match slot {
                Slot::Block(child) => block_id = child,
                Slot::Leaf(leaf) => {
                    self.retire(leaf);
                    return Ok(leaf);
                }
                Slot::Empty if shift == 0 => {
                    let parent = block_id;
                    let acquired = self.leaves.acquire(
                        || {
                            Ok(Leaf {
                                index,
                                block: parent,
                                value: None,
                            })
                        },
                        |leaf| {
                            leaf.index = index;
                            leaf.block = parent;
                        },
                    );
                    let leaf = match acquired {
                        Ok(id) => LeafId(id),
                        Err(err) => {
                            self.unwind(block_id, &err);
                            return Err(err);
                        }
                    };
                    self.blocks.get_mut(block_id.0).occupy(pos, Slot::Leaf(leaf));
                    self.leaf_count += 1;
                    return Ok(leaf);
                }
                Slot::Empty => {
                    let parent = block_id;
                    let child_shift = shift - bits;
                    let acquired = self.blocks.acquire(
                        || Block::try_new(fanout, parent, pos, child_shift),
                        |block| block.reset(parent, pos, child_shift),
                    );
                    let child = match acquired {
                        Ok(id) => BlockId(id),
                        Err(err) => {
                            self.unwind(block_id, &err);
                            return Err(err);
                        }
                    };
                    self.blocks.get_mut(block_id.0).occupy(pos, Slot::Block(child));
                    self.block_count += 1;
                    trace!(?index, shift = child_shift, "created block");
                    block_id = child;
                }
            }
        }
    }

    fn unwind(&mut self, from: BlockId, err: &Error) {
        let released = self.collapse(from);
        warn!(%err, released, "set failed, reclaimed partial path");
    }

    /// Release `from` and its ancestors while they are empty. The root is
    /// never released. Returns the number of blocks released.
    fn collapse(&mut self, from: BlockId) -> usize {
        let mut block_id = from;
        let mut released = 0;

        loop {
            let block = self.blocks.get(block_id.0);
            if block.used != 0 {
                break;
            }
            let Some(parent) = block.parent else {
                break;
            };
            let pos = block.parent_pos as usize;

            self.blocks.release(block_id.0, |_| {});
            self.block_count -= 1;
            released += 1;

            self.blocks.get_mut(parent.0).vacate(pos);
            block_id = parent;
        }

        if released > 0 {
            trace!(released, "collapsed empty blocks");
        }
        released
    }

    /// Store `value` at `index`, returning a mutable reference to it.
    ///
    /// If `index` was already populated the previous payload is passed to the
    /// destroy callback and dropped first.
    pub fn set(&mut self, index: I, value: T) -> Result<&mut T> {
        let leaf = self.leaf_for(index)?;
        Ok(self.leaves.get_mut(leaf.0).value.insert(value))
    }

    /// Populate `index` with `T::default()` for the caller to fill in through
    /// the returned reference.
    ///
    /// An existing payload is retired exactly as in [`XArray::set`].
    pub fn reserve(&mut self, index: I) -> Result<&mut T>
    where
        T: Default,
    {
        self.set(index, T::default())
    }

    pub fn get(&self, index: I) -> Option<&T> {
        let (_, _, leaf) = self.locate(index)?;
        self.leaves.get(leaf.0).value.as_ref()
    }

    pub fn get_mut(&mut self, index: I) -> Option<&mut T> {
        let (_, _, leaf) = self.locate(index)?;
        self.leaves.get_mut(leaf.0).value.as_mut()
    }

    #[inline]
    pub fn contains(&self, index: I) -> bool {
        self.locate(index).is_some()
    }

    /// Remove the entry at `index`, returning whether one was present.
    ///
    /// The payload goes through the destroy callback, then any block left
    /// empty is reclaimed, bottom-up.
    pub fn unset(&mut self, index: I) -> bool {
        let Some((block_id, pos, leaf)) = self.locate(index) else {
            return false;
        };

        self.retire(leaf);
        self.leaves.release(leaf.0, |leaf| leaf.value = None);
        self.leaf_count -= 1;

        self.blocks.get_mut(block_id.0).vacate(pos);
        self.collapse(block_id);
        true
    }

    /// Remove every entry.
    ///
    /// Each payload goes through the destroy callback once. Blocks and leaves
    /// are freed outright, even when pooling is enabled.
    ///
    /// Every slot is emptied as soon as its leaf or block is freed, so a
    /// panicking callback leaves a consistent array holding the entries not
    /// yet visited.
    pub fn clear(&mut self) {
        let (leaves, blocks) = (self.leaf_count, self.block_count);
        let mut block_id = self.root;
        let mut pos = 0usize;

        loop {
            let block = self.blocks.get(block_id.0);
            if pos < block.slots.len() {
                let slot = block.slots[pos];
                match slot {
                    Slot::Empty => pos += 1,
                    Slot::Block(child) => {
                        block_id = child;
                        pos = 0;
                    }
                    Slot::Leaf(leaf) => {
                        self.retire(leaf);
                        self.leaves.discard(leaf.0);
                        self.blocks.get_mut(block_id.0).vacate(pos);
                        self.leaf_count -= 1;
                        pos += 1;
                    }
                }
            } else {
                let Some(parent) = block.parent else {
                    break;
                };
                let parent_pos = block.parent_pos as usize;
                self.blocks.discard(block_id.0);
                self.blocks.get_mut(parent.0).vacate(parent_pos);
                self.block_count -= 1;
                pos = parent_pos + 1;
                block_id = parent;
            }
        }

        debug_assert_eq!(self.blocks.get(self.root.0).used, 0);
        debug_assert_eq!(self.leaf_count, 0);
        debug_assert_eq!(self.block_count, 0);
        if leaves > 0 {
            debug!(leaves, blocks, "cleared array");
        }
    }

    /// Scan for the first leaf at or after slot `pos` of `block_id`, in
    /// index order.
    fn scan_from(&self, mut block_id: BlockId, mut pos: usize) -> Option<Cursor<I>> {
        loop {
            let block = self.blocks.get(block_id.0);
            if pos < block.slots.len() {
                match block.slots[pos] {
                    Slot::Empty => pos += 1,
                    Slot::Block(child) => {
                        block_id = child;
                        pos = 0;
                    }
                    Slot::Leaf(leaf) => {
                        let index = self.leaves.get(leaf.0).index;
                        return Some(Cursor { leaf, index });
                    }
                }
            } else {
                let parent = block.parent?;
                pos = block.parent_pos as usize + 1;
                block_id = parent;
            }
        }
    }

    /// Cursor at the lowest populated index.
    pub fn begin(&self) -> Option<Cursor<I>> {
        self.scan_from(self.root, 0)
    }

    /// Cursor at the next populated index above `cursor`, or `None` past the
    /// last one.
    pub fn next_after(&self, cursor: Cursor<I>) -> Option<Cursor<I>> {
        let leaf = self.leaves.try_get(cursor.leaf.0)?;
        let pos = leaf.index.slot_at(0, self.mask) + 1;
        self.scan_from(leaf.block, pos)
    }

    /// Cursor at `index`, if populated.
    pub fn cursor(&self, index: I) -> Option<Cursor<I>> {
        let (_, _, leaf) = self.locate(index)?;
        Some(Cursor { leaf, index })
    }

    pub fn value(&self, cursor: Cursor<I>) -> Option<&T> {
        let leaf = self.leaves.try_get(cursor.leaf.0)?;
        if leaf.index != cursor.index {
            return None;
        }
        leaf.value.as_ref()
    }

    pub fn value_mut(&mut self, cursor: Cursor<I>) -> Option<&mut T> {
        let leaf = self.leaves.try_get_mut(cursor.leaf.0)?;
        if leaf.index != cursor.index {
            return None;
        }
        leaf.value.as_mut()
    }

    pub fn iter(&self) -> Iter<'_, T, I> {
        Iter {
            array: self,
            next: self.begin(),
            remaining: self.leaf_count,
        }
    }

    pub fn keys(&self) -> Keys<'_, T, I> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, T, I> {
        Values { inner: self.iter() }
    }

    /// Visit every entry in index order with mutable access to its value.
    pub fn for_each_mut(&mut self, mut f: impl FnMut(I, &mut T)) {
        let mut next = self.begin();
        while let Some(cursor) = next {
            if let Some(value) = self.value_mut(cursor) {
                f(cursor.index, value);
            }
            next = self.next_after(cursor);
        }
    }
}

impl<T, I: TrieIndex> Default for XArray<T, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, I: TrieIndex> Drop for XArray<T, I> {
    fn drop(&mut self) {
        self.clear();
        self.purge_pooled();
    }
}

impl<T: fmt::Debug, I: TrieIndex> fmt::Debug for XArray<T, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}


#[cfg(test)]
mod proptests;
