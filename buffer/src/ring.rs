//! Block arena and cursors shared by every resize policy.
//!
//! Blocks live in an arena and are linked into a circle through `next`/`prev`
//! indices, so a [`BlockId`] stays valid until its block is released no matter
//! how many blocks are inserted or removed around it. Released arena slots are
//! recycled by later allocations.
//!
//! Structural changes only ever happen next to a cursor:
//!
//! ```text
//!   insert after write block          remove before read block
//!
//!        w        +new                     -old       r
//!   [DDDD] -> [....] -> [..DD]        [....] -> [DDDD] -> [DD..]
//! ```

use tracing::trace;

use crate::config::BufferConfig;

/// Stable index of a block inside a [`BlockRing`].
pub(crate) type BlockId = usize;

/// A position inside the ring.
///
/// `block` is `None` only while the ring holds no blocks. The offset is kept in
/// that state so the read and write cursors stay one slot apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub(crate) block: Option<BlockId>,
    pub(crate) offset: usize,
}

struct Block<T> {
    slots: Box<[T]>,
    next: BlockId,
    prev: BlockId,
}

/// Circular list of fixed-size blocks with a read and a write cursor.
///
/// The write cursor points at the last written slot; the read cursor points at
/// the next slot to read. Every slot outside the occupied region holds the
/// placeholder value.
///
/// Outside this crate the ring is read-only: policies observe its sizes, and
/// only the crate's own policies change its structure.
pub struct BlockRing<T> {
    arena: Vec<Option<Block<T>>>,
    vacant: Vec<BlockId>,
    block_count: usize,
    block_size: usize,
    maximum_buffer_size: usize,
    data_size: usize,
    placeholder: T,
    read: Cursor,
    write: Cursor,
    blocks_allocated: u64,
    blocks_released: u64,
}

impl<T: Copy> BlockRing<T> {
    /// Creates an empty ring. `config` must already be validated.
    pub(crate) fn new(config: &BufferConfig, placeholder: T) -> Self {
        Self {
            arena: Vec::new(),
            vacant: Vec::new(),
            block_count: 0,
            block_size: config.block_size,
            maximum_buffer_size: config.rounded_maximum(),
            data_size: 0,
            placeholder,
            read: Self::initial_read(),
            write: Self::initial_write(config.block_size),
            blocks_allocated: 0,
            blocks_released: 0,
        }
    }

    fn initial_read() -> Cursor {
        Cursor {
            block: None,
            offset: 0,
        }
    }

    fn initial_write(block_size: usize) -> Cursor {
        Cursor {
            block: None,
            offset: block_size - 1,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Ceiling on `buffer_size`, a whole number of blocks.
    pub fn maximum_buffer_size(&self) -> usize {
        self.maximum_buffer_size
    }

    /// Number of units currently held.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Allocated capacity in units.
    pub fn buffer_size(&self) -> usize {
        self.block_count * self.block_size
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }

    /// Allocated but unused capacity.
    pub fn slack(&self) -> usize {
        self.buffer_size() - self.data_size
    }

    pub fn placeholder(&self) -> T {
        self.placeholder
    }

    #[cfg(test)]
    pub(crate) fn read_cursor(&self) -> Cursor {
        self.read
    }

    #[cfg(test)]
    pub(crate) fn write_cursor(&self) -> Cursor {
        self.write
    }

    /// Blocks allocated over the ring's lifetime.
    pub fn blocks_allocated(&self) -> u64 {
        self.blocks_allocated
    }

    /// Blocks released over the ring's lifetime.
    pub fn blocks_released(&self) -> u64 {
        self.blocks_released
    }

    fn block(&self, id: BlockId) -> &Block<T> {
        self.arena[id]
            .as_ref()
            .expect("block ring: cursor references a released block")
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block<T> {
        self.arena[id]
            .as_mut()
            .expect("block ring: cursor references a released block")
    }

    fn next_block(&self, id: BlockId) -> BlockId {
        self.block(id).next
    }

    fn prev_block(&self, id: BlockId) -> BlockId {
        self.block(id).prev
    }

    /// Returns the position one slot after `cursor`, wrapping into the next
    /// block after the last offset.
    fn step(&self, cursor: Cursor) -> Cursor {
        if cursor.offset == self.block_size - 1 {
            Cursor {
                block: cursor.block.map(|id| self.next_block(id)),
                offset: 0,
            }
        } else {
            Cursor {
                block: cursor.block,
                offset: cursor.offset + 1,
            }
        }
    }

    /// Allocates a placeholder-filled block and links it after `anchor`.
    ///
    /// With no anchor the ring must be empty; the new block becomes the only
    /// one and both cursors point at it.
    fn insert_after(&mut self, anchor: Option<BlockId>) -> BlockId {
        let block = Block {
            slots: vec![self.placeholder; self.block_size].into_boxed_slice(),
            next: 0,
            prev: 0,
        };
        let id = match self.vacant.pop() {
            Some(id) => {
                self.arena[id] = Some(block);
                id
            }
            None => {
                self.arena.push(Some(block));
                self.arena.len() - 1
            }
        };

        match anchor {
            Some(prev) => {
                let next = self.next_block(prev);
                self.block_mut(prev).next = id;
                self.block_mut(next).prev = id;
                let block = self.block_mut(id);
                block.prev = prev;
                block.next = next;
            }
            None => {
                debug_assert_eq!(self.block_count, 0);
                let block = self.block_mut(id);
                block.prev = id;
                block.next = id;
                self.read.block = Some(id);
                self.write.block = Some(id);
            }
        }

        self.block_count += 1;
        self.blocks_allocated += 1;
        trace!(block = id, blocks = self.block_count, "block allocated");
        id
    }

    /// Unlinks `id` and returns its slots. Releasing the last block unsets
    /// both cursors.
    fn release(&mut self, id: BlockId) -> Box<[T]> {
        let block = self.arena[id]
            .take()
            .expect("block ring: released block twice");
        self.vacant.push(id);
        self.block_count -= 1;
        self.blocks_released += 1;

        if self.block_count == 0 {
            self.read.block = None;
            self.write.block = None;
        } else {
            self.block_mut(block.prev).next = block.next;
            self.block_mut(block.next).prev = block.prev;
        }

        trace!(block = id, blocks = self.block_count, "block released");
        block.slots
    }

    /// Advances the write cursor and stores `unit` there.
    ///
    /// The caller guarantees a free slot follows the write cursor.
    pub(crate) fn push(&mut self, unit: T) {
        self.write = self.step(self.write);
        let Cursor { block, offset } = self.write;
        let id = block.expect("block ring: write without a block");
        self.block_mut(id).slots[offset] = unit;
        self.data_size += 1;
    }

    /// Takes the unit under the read cursor, leaves the placeholder behind and
    /// advances the cursor.
    ///
    /// The caller guarantees the ring holds data.
    pub(crate) fn pop(&mut self) -> T {
        let Cursor { block, offset } = self.read;
        let id = block.expect("block ring: read without a block");
        let placeholder = self.placeholder;
        let unit = std::mem::replace(&mut self.block_mut(id).slots[offset], placeholder);
        self.data_size -= 1;
        self.read = self.step(self.read);
        unit
    }

    /// Units in FIFO order, starting at the read cursor.
    pub(crate) fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let mut cursor = self.read;
        (0..self.data_size).map(move |_| {
            let id = cursor.block.expect("block ring: data without a block");
            let unit = self.block(id).slots[cursor.offset];
            cursor = self.step(cursor);
            unit
        })
    }

    /// Drops every block and restores the initial cursors.
    pub(crate) fn clear(&mut self) {
        self.blocks_released += self.block_count as u64;
        self.arena.clear();
        self.vacant.clear();
        self.block_count = 0;
        self.data_size = 0;
        self.read = Self::initial_read();
        self.write = Self::initial_write(self.block_size);
    }

    /// Grows a saturated ring by one block, shifting data when needed.
    ///
    /// Expects `data_size == buffer_size`. With no blocks, allocates the first
    /// one. If the write cursor is inside its block, the read cursor sits on
    /// the next slot of that same block; the tail after the write cursor moves
    /// into the new block at the same offsets and the read cursor follows it.
    /// If the write cursor is on its block's last slot, the new block is
    /// linked in without moving anything.
    pub(crate) fn grow_shifting(&mut self) {
        let Some(write_block) = self.write.block else {
            self.insert_after(None);
            return;
        };
        debug_assert_eq!(self.data_size, self.buffer_size());

        let added = self.insert_after(Some(write_block));
        let split = self.write.offset + 1;
        if split < self.block_size {
            debug_assert_eq!(
                self.read,
                Cursor {
                    block: Some(write_block),
                    offset: split
                }
            );
            let placeholder = self.placeholder;
            for offset in split..self.block_size {
                let unit =
                    std::mem::replace(&mut self.block_mut(write_block).slots[offset], placeholder);
                self.block_mut(added).slots[offset] = unit;
            }
            self.read.block = Some(added);
        }
    }

    /// Removes one block when exactly one block of slack exists, shifting
    /// data when needed.
    ///
    /// Expects `slack() == block_size`. An empty ring loses its only block. If
    /// the read cursor is inside its block, the preceding block is the write
    /// block holding the newest `read.offset` units; those move into the free
    /// head of the read block and the write cursor follows. Otherwise the
    /// preceding block is empty and is dropped as is.
    pub(crate) fn shrink_shifting(&mut self) {
        let Some(read_block) = self.read.block else {
            return;
        };
        debug_assert_eq!(self.slack(), self.block_size);

        if self.data_size == 0 {
            self.release(read_block);
            return;
        }

        let removed = self.prev_block(read_block);
        let gap = self.read.offset;
        if gap > 0 {
            debug_assert_eq!(self.write.block, Some(removed));
            let slots = self.release(removed);
            self.block_mut(read_block).slots[..gap].copy_from_slice(&slots[..gap]);
            self.write.block = Some(read_block);
        } else {
            self.release(removed);
        }
    }

    /// Links a new block directly after the write block without moving data.
    ///
    /// Expects the write cursor to be about to leave its block's free tail, so
    /// the new block is the next one written. When the ring is empty and the
    /// write cursor sits on its block's last slot, the next unit lands at the
    /// start of the new block, so the read cursor moves there too.
    pub(crate) fn grow_after_write(&mut self) {
        let Some(write_block) = self.write.block else {
            self.insert_after(None);
            return;
        };

        let added = self.insert_after(Some(write_block));
        if self.data_size == 0 && self.write.offset == self.block_size - 1 {
            self.read = Cursor {
                block: Some(added),
                offset: 0,
            };
        }
    }

    /// Drops the block preceding the read block without moving data.
    ///
    /// Expects `slack() >= 2 * block_size`, which guarantees that block is
    /// drained. Never removes the last block; returns whether a block was
    /// removed. The write cursor can only sit in the dropped block when the
    /// ring is empty; it then moves to the new predecessor of the read block,
    /// keeping its last-slot offset.
    pub(crate) fn remove_before_read(&mut self) -> bool {
        let Some(read_block) = self.read.block else {
            return false;
        };
        if self.block_count < 2 {
            return false;
        }
        debug_assert!(self.slack() >= 2 * self.block_size);

        let removed = self.prev_block(read_block);
        if self.write.block == Some(removed) {
            debug_assert_eq!(self.data_size, 0);
            self.write.block = Some(self.prev_block(removed));
        }
        self.release(removed);
        true
    }

    /// Block contents in ring order starting at the read block.
    #[cfg(test)]
    pub(crate) fn blocks(&self) -> Vec<&[T]> {
        let Some(start) = self.read.block else {
            return Vec::new();
        };
        let mut blocks = Vec::with_capacity(self.block_count);
        let mut id = start;
        loop {
            blocks.push(&self.block(id).slots[..]);
            id = self.next_block(id);
            if id == start {
                return blocks;
            }
        }
    }
}
