//! Per-skeleton command lists and the flat command buffer they are packed into.

use hashbrown::HashMap;

use crate::buffer::{required_buffer_size, GpuBuffer};
use crate::command::{AnimationCommand, AnimationCommandBatch, AnimationCommandList, PASS_COUNT};
use crate::error::CoreResult;

pub const COMMAND_BUFFER_CHUNK: usize = 2048;
pub const PASS_CAPACITY_CHUNK: usize = 64;

#[derive(Debug)]
pub struct AnimationCommandBufferManager {
    lists: HashMap<u32, AnimationCommandList>,
    commands: GpuBuffer<AnimationCommand>,
}

impl Default for AnimationCommandBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationCommandBufferManager {
    pub fn new() -> Self {
        Self {
            lists: HashMap::new(),
            commands: GpuBuffer::new("animation commands"),
        }
    }

    /// Make sure every pass of the skeleton's list holds `required` commands.
    /// A list is created on first use.
    pub fn resize_command_list_if_required(&mut self, skeleton_hash: u32, required: usize) {
        match self.lists.get_mut(&skeleton_hash) {
            Some(list) => {
                if let Some(capacity) =
                    required_buffer_size(list.pass_capacity(), required, PASS_CAPACITY_CHUNK)
                {
                    list.resize(capacity);
                }
            }
            None => {
                let capacity = required_buffer_size(0, required, PASS_CAPACITY_CHUNK)
                    .unwrap_or(PASS_CAPACITY_CHUNK);
                self.lists
                    .insert(skeleton_hash, AnimationCommandList::new(capacity));
            }
        }
    }

    pub fn remove_command_list(&mut self, skeleton_hash: u32) {
        self.lists.remove(&skeleton_hash);
    }

    #[inline]
    pub fn command_list(&self, skeleton_hash: u32) -> Option<&AnimationCommandList> {
        self.lists.get(&skeleton_hash)
    }

    #[inline]
    pub fn command_lists(&self) -> &HashMap<u32, AnimationCommandList> {
        &self.lists
    }

    pub fn command_list_mut(&mut self, skeleton_hash: u32) -> Option<&mut AnimationCommandList> {
        self.lists.get_mut(&skeleton_hash)
    }

    /// Pack every non-empty pass into the flat buffer, skeletons in ascending
    /// hash order, emitting one batch per pass, then clear the lists.
    pub fn push_commands(&mut self, batches: &mut Vec<AnimationCommandBatch>) -> CoreResult<usize> {
        let mut keys: Vec<u32> = self.lists.keys().copied().collect();
        keys.sort_unstable();

        let mut total = 0usize;
        for list in self.lists.values_mut() {
            total += (0..PASS_COUNT).map(|p| list.len(p)).sum::<usize>();
        }
        self.commands
            .resize_if_required(total, COMMAND_BUFFER_CHUNK, false);

        let mut offset = 0usize;
        for key in keys {
            let Some(list) = self.lists.get_mut(&key) else {
                continue;
            };
            for pass in 0..PASS_COUNT {
                let commands = list.pass(pass);
                if commands.is_empty() {
                    continue;
                }
                self.commands.set_data(commands, offset)?;
                batches.push(AnimationCommandBatch {
                    start: offset as u32,
                    count: commands.len() as u32,
                    skeleton_hash: key,
                });
                offset += commands.len();
            }
            list.clear();
        }
        Ok(offset)
    }

    #[inline]
    pub fn commands(&self) -> &GpuBuffer<AnimationCommand> {
        &self.commands
    }
}
