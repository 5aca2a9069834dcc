//! Buffer managers mapping live data to stable offsets in flat GPU buffers.

pub mod clip;
pub mod command;
pub mod skeleton;
pub mod skinning;

pub use clip::{sample_clip_instance_matrices, ClipBufferManager, ClipInstance};
pub use command::AnimationCommandBufferManager;
pub use skeleton::{SkeletonBufferManager, SkeletonInstanceBatch};
pub use skinning::{SkinnedMeshBatch, SkinnedMeshBone, SkinnedMeshInstance, SkinningBufferManager};
