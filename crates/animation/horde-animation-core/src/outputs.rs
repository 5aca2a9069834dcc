use serde::{Deserialize, Serialize};

use crate::command::AnimationCommandBatch;
use crate::context::ClipEventMap;
use crate::managers::{SkeletonInstanceBatch, SkinnedMeshBatch};

/// Everything the dispatch stage needs from one tick.
///
/// Instance batches are only rebuilt when instances were attached or
/// detached; `*_changed` tells whether they differ from the previous tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FrameOutputs {
    pub command_batches: Vec<AnimationCommandBatch>,
    pub skeleton_batches: Vec<SkeletonInstanceBatch>,
    pub skinned_mesh_batches: Vec<SkinnedMeshBatch>,
    pub skeleton_batches_changed: bool,
    pub skinned_mesh_batches_changed: bool,
    #[serde(skip)]
    pub events: ClipEventMap,
    /// Commands rejected this tick because an instance exceeded the pass count.
    pub dropped_commands: u32,
}

impl FrameOutputs {
    pub fn clear(&mut self) {
        self.command_batches.clear();
        self.events.clear();
        self.skeleton_batches_changed = false;
        self.skinned_mesh_batches_changed = false;
        self.dropped_commands = 0;
    }

    /// Total commands written to the flat command buffer.
    pub fn command_count(&self) -> usize {
        self.command_batches.iter().map(|b| b.count as usize).sum()
    }
}
