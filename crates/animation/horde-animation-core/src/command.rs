//! Deferred sampling commands and the per-skeleton lists that collect them.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Maximum commands one instance may emit per tick. Command `n` of an instance
/// goes to pass `n`.
pub const PASS_COUNT: usize = 12;

/// One clip contribution, consumed by the GPU sampling pass.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct AnimationCommand {
    pub left_keyframe: u16,
    pub right_keyframe: u16,
    pub keyframe_weight: f32,
    /// Blend weight; always 1 in pass 0.
    pub weight: f32,
    pub blending_mode: i32,
    /// First transform of the clip instance in the clip sample buffer.
    pub clip_sample_index: i32,
    pub skeleton_matrix_index: i32,
    /// Inverse of frame 0, stored after the last sample.
    pub additive_reference_index: i32,
    pub skeleton_mask_index: i32,
}

/// Contiguous run of commands of one pass of one skeleton in the flat buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct AnimationCommandBatch {
    pub start: u32,
    pub count: u32,
    pub skeleton_hash: u32,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    #[error("pass {pass} is out of range (max {PASS_COUNT})")]
    PassOutOfRange { pass: usize },
    #[error("pass {pass} is full ({capacity} slots)")]
    PassFull { pass: usize, capacity: usize },
}

/// Fixed-capacity, multi-producer command store for one skeleton.
///
/// `dispatch` may be called concurrently through `&self`; each call reserves a
/// distinct slot with an atomic bump. Everything that reads commands takes
/// `&mut self`, so reads happen strictly after all producers are joined.
pub struct AnimationCommandList {
    pass_capacity: usize,
    lengths: [AtomicU32; PASS_COUNT],
    slots: Box<[UnsafeCell<AnimationCommand>]>,
}

// SAFETY: concurrent access only happens through `dispatch`, which writes to a
// slot index returned by `fetch_add` on the pass length. Every index is handed
// out once between two `clear` calls, so no two threads touch the same slot.
// Reads require `&mut self`.
unsafe impl Sync for AnimationCommandList {}

impl std::fmt::Debug for AnimationCommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationCommandList")
            .field("pass_capacity", &self.pass_capacity)
            .finish_non_exhaustive()
    }
}

fn allocate_slots(count: usize) -> Box<[UnsafeCell<AnimationCommand>]> {
    (0..count)
        .map(|_| UnsafeCell::new(AnimationCommand::default()))
        .collect()
}

impl AnimationCommandList {
    pub fn new(pass_capacity: usize) -> Self {
        Self {
            pass_capacity,
            lengths: Default::default(),
            slots: allocate_slots(pass_capacity * PASS_COUNT),
        }
    }

    #[inline]
    pub fn pass_capacity(&self) -> usize {
        self.pass_capacity
    }

    /// Reallocate every pass to `pass_capacity` slots. Pending commands are dropped.
    pub fn resize(&mut self, pass_capacity: usize) {
        self.pass_capacity = pass_capacity;
        self.slots = allocate_slots(pass_capacity * PASS_COUNT);
        self.clear();
    }

    pub fn dispatch(&self, pass: usize, command: AnimationCommand) -> Result<(), DispatchError> {
        if pass >= PASS_COUNT {
            return Err(DispatchError::PassOutOfRange { pass });
        }
        let slot = self.lengths[pass].fetch_add(1, Ordering::Relaxed) as usize;
        if slot >= self.pass_capacity {
            return Err(DispatchError::PassFull {
                pass,
                capacity: self.pass_capacity,
            });
        }
        // SAFETY: `slot` is unique to this call (see the `Sync` impl) and in bounds.
        unsafe {
            *self.slots[pass * self.pass_capacity + slot].get() = command;
        }
        Ok(())
    }

    /// Commands stored in `pass`. Rejected dispatches are not counted.
    pub fn len(&mut self, pass: usize) -> usize {
        (*self.lengths[pass].get_mut() as usize).min(self.pass_capacity)
    }

    pub fn is_empty(&mut self) -> bool {
        (0..PASS_COUNT).all(|p| self.len(p) == 0)
    }

    pub fn pass(&mut self, pass: usize) -> &[AnimationCommand] {
        let len = self.len(pass);
        let start = pass * self.pass_capacity;
        let cells = &self.slots[start..start + len];
        // SAFETY: `UnsafeCell<T>` has the same layout as `T`, and `&mut self`
        // guarantees no dispatch is in flight.
        unsafe { std::slice::from_raw_parts(cells.as_ptr() as *const AnimationCommand, len) }
    }

    pub fn clear(&mut self) {
        for len in &mut self.lengths {
            *len.get_mut() = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_32_bytes() {
        assert_eq!(std::mem::size_of::<AnimationCommand>(), 32);
    }

    #[test]
    fn dispatch_fills_passes_until_full() {
        let mut list = AnimationCommandList::new(2);
        let cmd = AnimationCommand {
            weight: 1.0,
            ..Default::default()
        };
        assert!(list.dispatch(0, cmd).is_ok());
        assert!(list.dispatch(0, cmd).is_ok());
        assert_eq!(
            list.dispatch(0, cmd),
            Err(DispatchError::PassFull {
                pass: 0,
                capacity: 2
            })
        );
        assert_eq!(
            list.dispatch(PASS_COUNT, cmd),
            Err(DispatchError::PassOutOfRange { pass: PASS_COUNT })
        );
        assert_eq!(list.pass(0).len(), 2);
        assert!(list.pass(1).is_empty());
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn concurrent_dispatch_keeps_every_command() {
        let mut list = AnimationCommandList::new(64);
        std::thread::scope(|s| {
            for t in 0..4 {
                let list = &list;
                s.spawn(move || {
                    for i in 0..16 {
                        let cmd = AnimationCommand {
                            clip_sample_index: t * 100 + i,
                            ..Default::default()
                        };
                        list.dispatch(0, cmd).unwrap();
                    }
                });
            }
        });
        let mut seen: Vec<i32> = list.pass(0).iter().map(|c| c.clip_sample_index).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 64);
    }
}
