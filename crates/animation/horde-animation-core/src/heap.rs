//! First-fit sub-allocator over a fixed address space.
//!
//! Addresses are element offsets into a flat buffer owned by a manager. The
//! allocator only hands out ranges; the manager grows its buffer to cover
//! [`HeapAllocator::one_past_highest_used_address`].

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Half-open range `[begin, end)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeapBlock {
    pub begin: u32,
    pub end: u32,
}

impl HeapBlock {
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end == self.begin
    }
}

#[derive(Clone, Debug)]
pub struct HeapAllocator {
    name: &'static str,
    capacity: u32,
    alignment: u32,
    /// Sorted by `begin`; neighbours never touch.
    free: Vec<HeapBlock>,
    used: u32,
}

impl HeapAllocator {
    pub fn new(name: &'static str, capacity: u32, alignment: u32) -> Self {
        let alignment = alignment.max(1);
        let capacity = capacity - capacity % alignment;
        let free = if capacity > 0 {
            vec![HeapBlock {
                begin: 0,
                end: capacity,
            }]
        } else {
            Vec::new()
        };
        Self {
            name,
            capacity,
            alignment,
            free,
            used: 0,
        }
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn used_space(&self) -> u32 {
        self.used
    }

    #[inline]
    pub fn free_space(&self) -> u32 {
        self.capacity - self.used
    }

    fn aligned(&self, size: u32) -> Option<u32> {
        let rem = size % self.alignment;
        if rem == 0 {
            Some(size)
        } else {
            size.checked_add(self.alignment - rem)
        }
    }

    /// First free block large enough, or `None`. A zero-size request yields an
    /// empty block.
    pub fn allocate(&mut self, size: u32) -> Option<HeapBlock> {
        if size == 0 {
            return Some(HeapBlock::default());
        }
        let size = self.aligned(size)?;
        let slot = self.free.iter().position(|b| b.len() >= size)?;
        let free = &mut self.free[slot];
        let block = HeapBlock {
            begin: free.begin,
            end: free.begin + size,
        };
        free.begin += size;
        if free.is_empty() {
            self.free.remove(slot);
        }
        self.used += size;
        Some(block)
    }

    pub fn try_allocate(&mut self, size: u32) -> CoreResult<HeapBlock> {
        self.allocate(size).ok_or(CoreError::HeapExhausted {
            heap: self.name,
            requested: size,
            capacity: self.capacity,
        })
    }

    /// Return a block, merging it with adjacent free ranges.
    pub fn release(&mut self, block: HeapBlock) -> CoreResult<()> {
        if block.is_empty() {
            return Ok(());
        }
        let invalid = CoreError::InvalidHeapRelease {
            heap: self.name,
            begin: block.begin,
            end: block.end,
        };
        if block.begin > block.end
            || block.end > self.capacity
            || block.begin % self.alignment != 0
            || block.len() % self.alignment != 0
        {
            return Err(invalid);
        }

        let at = self.free.partition_point(|b| b.begin < block.begin);
        let touches_prev = match at.checked_sub(1).map(|i| self.free[i]) {
            Some(prev) if prev.end > block.begin => return Err(invalid),
            Some(prev) => prev.end == block.begin,
            None => false,
        };
        let touches_next = match self.free.get(at) {
            Some(next) if next.begin < block.end => return Err(invalid),
            Some(next) => next.begin == block.end,
            None => false,
        };

        match (touches_prev, touches_next) {
            (true, true) => {
                let next_end = self.free[at].end;
                self.free[at - 1].end = next_end;
                self.free.remove(at);
            }
            (true, false) => self.free[at - 1].end = block.end,
            (false, true) => self.free[at].begin = block.begin,
            (false, false) => self.free.insert(at, block),
        }
        self.used -= block.len();
        Ok(())
    }

    /// End of the highest allocated block: the buffer length that covers
    /// every live allocation.
    pub fn one_past_highest_used_address(&self) -> u32 {
        match self.free.last() {
            Some(last) if last.end == self.capacity => last.begin,
            _ => self.capacity,
        }
    }
}
