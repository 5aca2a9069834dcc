//! Horde Animation Core (engine-agnostic)
//!
//! Data-oriented crowd animation: every tick the [`Engine`] advances one
//! animator state machine per instance on the CPU and emits a compact list of
//! clip-sampling commands, grouped into blend passes. A GPU pipeline (not part
//! of this crate) replays the commands against resident sample buffers to
//! produce skeleton and skin matrices.
//!
//! Layout:
//! - `definition`: immutable, content-hashed skeletons, masks, meshes, clips
//!   and flattened controllers;
//! - `builder`: authoring data to definitions (state machine flattening,
//!   curve sampling);
//! - `evaluate` / `animator` / `context`: per-instance state machine stepping
//!   and command emission;
//! - `managers`: reference-counted residency of every GPU-facing buffer;
//! - `engine`: instance lifecycle and the per-tick driver.

pub mod animator;
pub mod buffer;
pub mod builder;
pub mod command;
pub mod config;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod evaluate;
pub mod hash;
pub mod heap;
pub mod ids;
pub mod keyframe;
pub mod layer_state;
pub mod managers;
pub mod math;
pub mod outputs;
pub mod parameters;
pub mod refcount;

// Re-exports for consumers (adapters)
pub use builder::{
    ClipAuthoring, ClipBuilder, ControllerAuthoring, ControllerBuilder, MaskAuthoring,
    SkeletonAuthoring, SkeletonBuilder, SkeletonMaskBuilder, SkinnedMeshAuthoring,
    SkinnedMeshBuilder,
};
pub use command::{AnimationCommand, AnimationCommandBatch, AnimationCommandList, PASS_COUNT};
pub use config::Config;
pub use context::{ClipEventMap, EntityClipEvent};
pub use definition::{
    AnimatorControllerDefinition, BlendingMode, Clip, ClipEvent, ControllerAsset, ParameterType,
    SkeletonDefinition, SkeletonMaskDefinition, SkinnedMeshDefinition, WrapMode,
};
pub use engine::{BatchKey, Engine};
pub use error::{BuildError, CoreError, CoreResult};
pub use hash::StringHash;
pub use heap::{HeapAllocator, HeapBlock};
pub use ids::InstanceId;
pub use layer_state::LayerState;
pub use managers::{SkeletonInstanceBatch, SkinnedMeshBatch, SkinnedMeshInstance};
pub use math::AffineTransform;
pub use outputs::FrameOutputs;
pub use parameters::{ParametersMut, Variant};
