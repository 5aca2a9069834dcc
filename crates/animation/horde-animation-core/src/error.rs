//! Error types for the crowd animation core

use crate::hash::StringHash;
use crate::ids::InstanceId;

/// Errors raised at the structural-change boundary (attach, detach, parameter
/// access, buffer writes). The per-tick hot path never produces these.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CoreError {
    /// Instance id was never spawned or was despawned
    #[error("Unknown instance: {id:?}")]
    UnknownInstance { id: InstanceId },

    /// Animator or skinned mesh attached before a skeleton
    #[error("Instance {id:?} has no skeleton attached")]
    SkeletonNotAttached { id: InstanceId },

    /// Parameter or layer access on an instance without animator
    #[error("Instance {id:?} has no animator attached")]
    AnimatorNotAttached { id: InstanceId },

    /// Slot already occupied on the instance
    #[error("Instance {id:?} already has a {what} attached")]
    AlreadyAttached { id: InstanceId, what: &'static str },

    /// Definition failed structural validation
    #[error("Invalid {kind} definition: {reason}")]
    InvalidDefinition { kind: &'static str, reason: String },

    /// No parameter with that name on the controller
    #[error("Unknown parameter: {name}")]
    UnknownParameter { name: StringHash },

    /// Typed setter does not match the declared parameter type
    #[error("Parameter {name} is {actual}, not {expected}")]
    ParameterTypeMismatch {
        name: StringHash,
        expected: &'static str,
        actual: &'static str,
    },

    /// Fixed-capacity heap cannot satisfy the request
    #[error("Heap '{heap}' exhausted: requested {requested} (capacity {capacity})")]
    HeapExhausted {
        heap: &'static str,
        requested: u32,
        capacity: u32,
    },

    /// Released block was not allocated or overlaps a free block
    #[error("Invalid release of [{begin}, {end}) in heap '{heap}'")]
    InvalidHeapRelease {
        heap: &'static str,
        begin: u32,
        end: u32,
    },

    /// Write past the end of a staging buffer
    #[error("Buffer '{buffer}' overflow: write of {len} at {start} exceeds {capacity}")]
    BufferOverflow {
        buffer: &'static str,
        start: usize,
        len: usize,
        capacity: usize,
    },

    /// Detach of a skinned mesh the instance does not carry
    #[error("Instance {id:?} has no skinned mesh {mesh:08X}")]
    UnknownSkinnedMesh { id: InstanceId, mesh: u32 },

    /// Serialization error
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },
}

impl CoreError {
    pub(crate) fn invalid(kind: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            kind,
            reason: reason.into(),
        }
    }

    /// Check if the caller can retry after fixing state (e.g. freeing
    /// instances or attaching a skeleton first).
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SkeletonNotAttached { .. }
                | Self::AnimatorNotAttached { .. }
                | Self::AlreadyAttached { .. }
                | Self::UnknownParameter { .. }
                | Self::ParameterTypeMismatch { .. }
                | Self::HeapExhausted { .. }
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::UnknownInstance { .. }
            | Self::SkeletonNotAttached { .. }
            | Self::AnimatorNotAttached { .. }
            | Self::AlreadyAttached { .. }
            | Self::UnknownSkinnedMesh { .. } => "lifecycle",
            Self::InvalidDefinition { .. } => "definition",
            Self::UnknownParameter { .. } | Self::ParameterTypeMismatch { .. } => "parameter",
            Self::HeapExhausted { .. }
            | Self::InvalidHeapRelease { .. }
            | Self::BufferOverflow { .. } => "memory",
            Self::Serialization { .. } => "serialization",
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            reason: err.to_string(),
        }
    }
}

/// Errors from the authoring builders.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum BuildError {
    #[error("Unknown state '{name}' in state machine '{machine}'")]
    UnknownState { machine: String, name: String },

    #[error("Unknown state machine '{name}'")]
    UnknownStateMachine { name: String },

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },

    #[error("Unknown bone '{path}'")]
    UnknownBone { path: String },

    /// Only 1D blend trees can be evaluated
    #[error("Unsupported blend tree '{name}': {reason}")]
    UnsupportedBlendTree { name: String, reason: String },

    #[error("Too many states in layer '{layer}': {count} (max {max})")]
    TooManyStates {
        layer: String,
        count: usize,
        max: usize,
    },

    #[error("Invalid authoring data: {reason}")]
    Invalid { reason: String },
}

impl BuildError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

impl From<CoreError> for BuildError {
    fn from(err: CoreError) -> Self {
        Self::Invalid {
            reason: err.to_string(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
