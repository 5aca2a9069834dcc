//! Builders turning authoring data into runtime definitions.
//!
//! Each builder finishes by computing the content hash of what it produced,
//! so building the same authoring data twice yields equal hashes.

pub mod clip;
pub mod controller;
pub mod skeleton;

pub use clip::{ClipAuthoring, ClipBuilder, EventAuthoring, Keyframe, TrackAuthoring};
pub use controller::{
    BlendTreeAuthoring, BlendTreeChildAuthoring, ChildMachineTransitions, ConditionAuthoring,
    ConditionMode, ControllerAuthoring, ControllerBuilder, LayerAuthoring, MotionAuthoring,
    ParameterAuthoring, StateAuthoring, StateMachineAuthoring, TransitionAuthoring,
    TransitionSettings, TransitionTarget,
};
pub use skeleton::{
    BoneAuthoring, MaskAuthoring, MaskBoneAuthoring, MeshBoneAuthoring, SkeletonAuthoring,
    SkeletonBuilder, SkeletonMaskBuilder, SkinnedMeshAuthoring, SkinnedMeshBuilder,
};
