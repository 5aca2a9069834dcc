//! Immutable, pointer-free definitions shared by content hash.
//!
//! Every definition carries a content hash computed when it is constructed or
//! loaded. Mutating public fields afterwards leaves the hash stale until
//! `rehash()` is called; `validate()` rejects stale hashes.

pub mod asset;
pub mod clip;
pub mod controller;
pub mod mask;
pub mod skeleton;
pub mod skinned_mesh;

pub use asset::ControllerAsset;
pub use clip::{Clip, ClipEvent, WrapMode, MAX_SAMPLE_COUNT};
pub use controller::{
    AnimatorControllerDefinition, BlendTree, BlendTreeNode, BlendTreeType, BlendingMode, CompareOp,
    Condition, InterruptionSource, Layer, Motion, MotionClip, MotionKind, Parameter, ParameterFlags,
    ParameterType, State, StateMachine, Transition,
};
pub use mask::SkeletonMaskDefinition;
pub use skeleton::SkeletonDefinition;
pub use skinned_mesh::SkinnedMeshDefinition;

use crate::error::{CoreError, CoreResult};

pub(crate) fn check_hash(kind: &'static str, stored: u32, computed: u32) -> CoreResult<()> {
    if stored == 0 {
        return Err(CoreError::invalid(kind, "content hash was never computed"));
    }
    if stored != computed {
        return Err(CoreError::invalid(
            kind,
            format!("stale content hash {stored:08X} (content hashes to {computed:08X})"),
        ));
    }
    Ok(())
}

pub(crate) fn check_len(kind: &'static str, what: &str, len: usize, expected: usize) -> CoreResult<()> {
    if len != expected {
        return Err(CoreError::invalid(
            kind,
            format!("{what} has {len} entries, expected {expected}"),
        ));
    }
    Ok(())
}
