//! Id-addressed storage for blocks and leaves, with optional recycling.
//!
//! Items are boxed and addressed by stable `u32` ids. Released ids go onto
//! one of two stacks:
//! - `recycled`: pooling is on, the allocation is kept and handed back out by
//!   the next [`Pool::acquire`].
//! - `vacant`: the allocation has been dropped, only the id is reused.

use std::mem;

use crate::error::{AllocKind, Error, Result};

struct Entry<T> {
    item: Option<Box<T>>,
    live: bool,
}

pub(crate) struct Pool<T> {
    entries: Vec<Entry<T>>,
    recycled: Vec<u32>,
    vacant: Vec<u32>,
    pooling: bool,
    /// Ceiling on live items.
    limit: Option<usize>,
    live: usize,
    kind: AllocKind,
}

impl<T> Pool<T> {
    pub(crate) fn new(kind: AllocKind, pooling: bool, limit: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            recycled: Vec::new(),
            vacant: Vec::new(),
            pooling,
            limit,
            live: 0,
            kind,
        }
    }

    #[inline]
    fn failed(&self) -> Error {
        Error::AllocationFailed { kind: self.kind }
    }

    /// Number of items currently handed out.
    #[inline]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    /// Number of released items held for reuse.
    #[inline]
    pub(crate) fn pooled(&self) -> usize {
        self.recycled.len()
    }

    /// Store `item` unconditionally, ignoring the ceiling.
    pub(crate) fn insert(&mut self, item: T) -> u32 {
        let entry = Entry {
            item: Some(Box::new(item)),
            live: true,
        };
        self.live += 1;
        match self.vacant.pop() {
            Some(id) => {
                self.entries[id as usize] = entry;
                id
            }
            None => {
                self.entries.push(entry);
                (self.entries.len() - 1) as u32
            }
        }
    }

    /// Hand out an item, reusing a recycled allocation when one exists.
    ///
    /// `reuse` reinitializes a recycled item; `fresh` builds a new one.
    pub(crate) fn acquire(
        &mut self,
        fresh: impl FnOnce() -> Result<T>,
        reuse: impl FnOnce(&mut T),
    ) -> Result<u32> {
        if self.limit.is_some_and(|limit| self.live >= limit) {
            return Err(self.failed());
        }

        if let Some(id) = self.recycled.pop() {
            let entry = &mut self.entries[id as usize];
            if let Some(item) = entry.item.as_deref_mut() {
                reuse(item);
                entry.live = true;
                self.live += 1;
                return Ok(id);
            }
        }

        let item = Box::new(fresh()?);
        let id = match self.vacant.pop() {
            Some(id) => id,
            None => {
                if self.entries.len() >= u32::MAX as usize {
                    return Err(self.failed());
                }
                self.entries.try_reserve(1).map_err(|_| self.failed())?;
                self.entries.push(Entry {
                    item: None,
                    live: false,
                });
                (self.entries.len() - 1) as u32
            }
        };
        self.entries[id as usize] = Entry {
            item: Some(item),
            live: true,
        };
        self.live += 1;
        Ok(id)
    }

    /// Give an item back. With pooling on, `scrub` runs and the allocation
    /// is kept for reuse; otherwise the item is dropped.
    pub(crate) fn release(&mut self, id: u32, scrub: impl FnOnce(&mut T)) {
        if !self.pooling {
            self.discard(id);
            return;
        }
        let entry = &mut self.entries[id as usize];
        debug_assert!(entry.live, "releasing a dead id");
        if let Some(item) = entry.item.as_deref_mut() {
            scrub(item);
        }
        entry.live = false;
        self.live -= 1;
        self.recycled.push(id);
    }

    /// Drop an item regardless of the pooling setting.
    pub(crate) fn discard(&mut self, id: u32) {
        let entry = &mut self.entries[id as usize];
        debug_assert!(entry.live, "discarding a dead id");
        entry.item = None;
        entry.live = false;
        self.live -= 1;
        self.vacant.push(id);
    }

    /// Live item at `id`.
    ///
    /// # Panics
    /// Panics if `id` is not live. Ids stored inside the trie always are.
    #[inline]
    pub(crate) fn get(&self, id: u32) -> &T {
        match self.try_get(id) {
            Some(item) => item,
            None => panic!("dangling {} id {id}", self.kind),
        }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: u32) -> &mut T {
        let kind = self.kind;
        match self.try_get_mut(id) {
            Some(item) => item,
            None => panic!("dangling {kind} id {id}"),
        }
    }

    #[inline]
    pub(crate) fn try_get(&self, id: u32) -> Option<&T> {
        let entry = self.entries.get(id as usize)?;
        if !entry.live {
            return None;
        }
        entry.item.as_deref()
    }

    #[inline]
    pub(crate) fn try_get_mut(&mut self, id: u32) -> Option<&mut T> {
        let entry = self.entries.get_mut(id as usize)?;
        if !entry.live {
            return None;
        }
        entry.item.as_deref_mut()
    }

    /// Drop every recycled allocation. Returns how many were dropped.
    pub(crate) fn purge(&mut self) -> usize {
        let purged = self.recycled.len();
        for id in self.recycled.drain(..) {
            self.entries[id as usize].item = None;
            self.vacant.push(id);
        }
        purged
    }

    /// Purge recycled items and trim vacant entries off the end.
    pub(crate) fn shrink_to_fit(&mut self) {
        self.purge();
        while self.entries.last().is_some_and(|e| e.item.is_none()) {
            self.entries.pop();
        }
        let len = self.entries.len() as u32;
        self.vacant.retain(|&id| id < len);
        self.entries.shrink_to_fit();
        self.vacant.shrink_to_fit();
        self.recycled.shrink_to_fit();
    }

    /// Bytes owned by the pool: id table, boxed items and free stacks.
    pub(crate) fn memory_usage(&self) -> usize {
        self.entries.capacity() * mem::size_of::<Entry<T>>()
            + (self.live + self.recycled.len()) * mem::size_of::<T>()
            + (self.recycled.capacity() + self.vacant.capacity()) * mem::size_of::<u32>()
    }
}
