use std::sync::Arc;

use bevy::prelude::*;
use horde_animation_core::{ControllerAsset, InstanceId, SkeletonDefinition, SkinnedMeshDefinition};

/// Makes the entity a crowd member animated with this skeleton.
#[derive(Component, Clone, Debug)]
pub struct CrowdSkeleton(pub Arc<SkeletonDefinition>);

/// Animator controller driving the entity's skeleton. Ignored without a
/// [`CrowdSkeleton`].
#[derive(Component, Clone, Debug)]
pub struct CrowdAnimator(pub Arc<ControllerAsset>);

/// Skinned mesh deformed by the entity's skeleton.
#[derive(Component, Clone, Debug)]
pub struct CrowdSkinnedMesh(pub Arc<SkinnedMeshDefinition>);

/// Engine handle of a registered crowd member. Inserted by the plugin.
#[derive(Component, Copy, Clone, Debug, PartialEq, Eq)]
pub struct CrowdInstance(pub InstanceId);
