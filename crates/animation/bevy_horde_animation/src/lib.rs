//! Bevy adapter for `horde-animation-core`.
//!
//! Entities opt in by carrying a [`CrowdSkeleton`] and, optionally, a
//! [`CrowdAnimator`] and [`CrowdSkinnedMesh`]. The plugin mirrors them into a
//! single [`HordeEngine`] resource, ticks it on `FixedUpdate` and publishes the
//! frame for the render side in [`PublishedFrame`].

use bevy::prelude::*;
use horde_animation_core::{Config, Engine};

pub mod components;
pub mod resources;
pub mod systems;

pub use components::{CrowdAnimator, CrowdInstance, CrowdSkeleton, CrowdSkinnedMesh};
pub use resources::{FixedDt, InstanceIndex, PublishedFrame};
pub use systems::{sync_animator, sync_skinned_mesh, ClipEventFired, ParameterValue, SetCrowdParameter};

#[derive(Resource)]
pub struct HordeEngine(pub Engine);

/// Adds the engine resource and the fixed-step attach, parameter and tick
/// systems.
#[derive(Default)]
pub struct CrowdAnimationPlugin {
    pub config: Config,
}

impl Plugin for CrowdAnimationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(HordeEngine(Engine::new(self.config.clone())))
            .init_resource::<FixedDt>()
            .init_resource::<InstanceIndex>()
            .init_resource::<PublishedFrame>()
            .add_event::<SetCrowdParameter>()
            .add_event::<ClipEventFired>()
            .add_systems(
                FixedUpdate,
                (
                    systems::detach_removed_system,
                    systems::attach_instances_system,
                    systems::attach_late_components_system,
                    systems::apply_parameters_system,
                    systems::tick_engine_system,
                )
                    .chain(),
            );
    }
}
