//! Trie elements: interior blocks, leaves, and the slots linking them.

use crate::error::{AllocKind, Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BlockId(pub(crate) u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct LeafId(pub(crate) u32);

/// Contents of one block slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Slot {
    #[default]
    Empty,
    Block(BlockId),
    Leaf(LeafId),
}

/// Interior trie node.
///
/// `shift` is the number of low index bits still unresolved below this block;
/// blocks at shift 0 hold leaves, all others hold blocks.
#[derive(Debug)]
pub(crate) struct Block {
    pub(crate) slots: Box<[Slot]>,
    /// Number of non-empty slots.
    pub(crate) used: u16,
    /// `None` only for the root.
    pub(crate) parent: Option<BlockId>,
    /// Slot this block occupies in its parent.
    pub(crate) parent_pos: u16,
    pub(crate) shift: u32,
}

impl Block {
    /// Root block, built once per array.
    pub(crate) fn root(fanout: usize, shift: u32) -> Self {
        Self {
            slots: vec![Slot::Empty; fanout].into_boxed_slice(),
            used: 0,
            parent: None,
            parent_pos: 0,
            shift,
        }
    }

    pub(crate) fn try_new(fanout: usize, parent: BlockId, parent_pos: usize, shift: u32) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(fanout)
            .map_err(|_| Error::AllocationFailed {
                kind: AllocKind::Block,
            })?;
        slots.resize(fanout, Slot::Empty);
        Ok(Self {
            slots: slots.into_boxed_slice(),
            used: 0,
            parent: Some(parent),
            parent_pos: parent_pos as u16,
            shift,
        })
    }

    /// Reinitialize a recycled block for a new position in the trie.
    pub(crate) fn reset(&mut self, parent: BlockId, parent_pos: usize, shift: u32) {
        debug_assert_eq!(self.used, 0, "recycled block still has children");
        self.slots.fill(Slot::Empty);
        self.used = 0;
        self.parent = Some(parent);
        self.parent_pos = parent_pos as u16;
        self.shift = shift;
    }

    /// Put `slot` into the empty position `pos`.
    #[inline]
    pub(crate) fn occupy(&mut self, pos: usize, slot: Slot) {
        debug_assert_eq!(self.slots[pos], Slot::Empty);
        self.slots[pos] = slot;
        self.used += 1;
    }

    #[inline]
    pub(crate) fn vacate(&mut self, pos: usize) {
        debug_assert_ne!(self.slots[pos], Slot::Empty);
        self.slots[pos] = Slot::Empty;
        self.used -= 1;
    }
}

/// Terminal trie node holding one payload.
#[derive(Debug)]
pub(crate) struct Leaf<I, T> {
    pub(crate) index: I,
    /// Block holding this leaf.
    pub(crate) block: BlockId,
    /// `Some` while the leaf is live; emptied when it goes back to the pool.
    pub(crate) value: Option<T>,
}
