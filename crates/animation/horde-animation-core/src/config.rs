//! Core configuration for horde-animation-core.

use serde::{Deserialize, Serialize};

/// Configuration for engine sizing and evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address space of the clip sample heap, in transforms.
    pub clip_heap_capacity: u32,
    /// Address space of the skeleton matrix heap, in transforms.
    pub skeleton_heap_capacity: u32,
    /// Address space of the skin matrix heap, in transforms.
    pub skin_heap_capacity: u32,

    /// Threads used to evaluate (skeleton, controller) batches. 0 or 1 runs on
    /// the calling thread.
    pub worker_threads: usize,

    /// Validate definitions when they are attached. Evaluation trusts indices
    /// afterwards, so disabling this is only sound for builder-produced data.
    pub validate_definitions: bool,

    /// Initial capacity hints.
    pub instance_capacity_hint: usize,
    pub event_capacity_hint: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            clip_heap_capacity: 256 * 1024 * 1024,
            skeleton_heap_capacity: 128 * 1024 * 1024,
            skin_heap_capacity: 128 * 1024 * 1024,
            worker_threads: 1,
            validate_definitions: true,
            instance_capacity_hint: 1024,
            event_capacity_hint: 64,
        }
    }
}
