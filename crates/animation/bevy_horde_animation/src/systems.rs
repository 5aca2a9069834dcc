use std::sync::Arc;

use bevy::prelude::*;
use horde_animation_core::{
    ControllerAsset, CoreResult, Engine, InstanceId, SkinnedMeshDefinition, StringHash,
};

use crate::components::{CrowdAnimator, CrowdInstance, CrowdSkeleton, CrowdSkinnedMesh};
use crate::resources::{FixedDt, InstanceIndex, PublishedFrame};
use crate::HordeEngine;

/// Value written by [`SetCrowdParameter`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParameterValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    /// Sets a trigger; it is released after the next tick.
    Trigger,
}

/// Write one animator parameter of a crowd member.
#[derive(Event, Clone, Debug)]
pub struct SetCrowdParameter {
    pub entity: Entity,
    pub name: String,
    pub value: ParameterValue,
}

/// A clip event crossed by a crowd member during the last tick.
#[derive(Event, Copy, Clone, Debug, PartialEq)]
pub struct ClipEventFired {
    pub entity: Entity,
    pub name: StringHash,
    pub int_value: i32,
    pub float_value: f32,
}

fn warn_on_err(entity: Entity, what: &str, result: CoreResult<()>) {
    if let Err(err) = result {
        log::warn!("crowd entity {entity:?}: {what} failed: {err}");
    }
}

/// Register newly spawned crowd members: skeleton first, then the mesh and
/// animator that depend on it.
pub fn attach_instances_system(
    mut commands: Commands,
    mut eng: ResMut<HordeEngine>,
    mut index: ResMut<InstanceIndex>,
    added: Query<
        (Entity, &CrowdSkeleton, Option<&CrowdSkinnedMesh>, Option<&CrowdAnimator>),
        Added<CrowdSkeleton>,
    >,
) {
    let engine = &mut eng.0;
    for (entity, skeleton, mesh, animator) in added.iter() {
        if index.instance(entity).is_some() {
            continue;
        }
        let id = engine.spawn();
        if let Err(err) = engine.attach_skeleton(id, skeleton.0.clone()) {
            log::warn!("crowd entity {entity:?}: skeleton rejected: {err}");
            warn_on_err(entity, "despawn", engine.despawn(id));
            continue;
        }
        if let Some(mesh) = mesh {
            warn_on_err(entity, "skinned mesh attach", engine.attach_skinned_mesh(id, mesh.0.clone()));
        }
        if let Some(animator) = animator {
            warn_on_err(entity, "animator attach", engine.attach_animator(id, animator.0.clone()));
        }
        index.insert(entity, id);
        commands.entity(entity).insert(CrowdInstance(id));
    }
}

/// Attach meshes and animators added to entities that are already
/// registered.
pub fn attach_late_components_system(
    mut eng: ResMut<HordeEngine>,
    meshes: Query<(Entity, &CrowdInstance, &CrowdSkinnedMesh), Added<CrowdSkinnedMesh>>,
    animators: Query<(Entity, &CrowdInstance, &CrowdAnimator), Added<CrowdAnimator>>,
) {
    let engine = &mut eng.0;
    // Entities registered this tick match `Added` as well.
    for (entity, instance, mesh) in meshes.iter() {
        if let Err(err) = sync_skinned_mesh(engine, instance.0, &mesh.0) {
            log::warn!("crowd entity {entity:?}: skinned mesh attach failed: {err}");
        }
    }
    for (entity, instance, animator) in animators.iter() {
        if let Err(err) = sync_animator(engine, instance.0, &animator.0) {
            log::warn!("crowd entity {entity:?}: animator attach failed: {err}");
        }
    }
}

/// Attach `mesh` unless it already is. Returns whether it was attached.
pub fn sync_skinned_mesh(
    engine: &mut Engine,
    id: InstanceId,
    mesh: &Arc<SkinnedMeshDefinition>,
) -> CoreResult<bool> {
    if engine.skinned_meshes(id)?.contains(&mesh.hash()) {
        return Ok(false);
    }
    engine.attach_skinned_mesh(id, mesh.clone())?;
    Ok(true)
}

/// Make `asset` the instance's controller, replacing a different one.
/// Returns whether the engine was changed.
pub fn sync_animator(engine: &mut Engine, id: InstanceId, asset: &Arc<ControllerAsset>) -> CoreResult<bool> {
    if engine.animator(id)?.map(|a| a.hash()) == Some(asset.hash()) {
        return Ok(false);
    }
    engine.detach_animator(id)?;
    engine.attach_animator(id, asset.clone())?;
    Ok(true)
}

/// Mirror component removals and entity despawns into the engine.
pub fn detach_removed_system(
    mut commands: Commands,
    mut eng: ResMut<HordeEngine>,
    mut index: ResMut<InstanceIndex>,
    mut removed_skeletons: RemovedComponents<CrowdSkeleton>,
    mut removed_animators: RemovedComponents<CrowdAnimator>,
    mut removed_meshes: RemovedComponents<CrowdSkinnedMesh>,
    meshes: Query<&CrowdSkinnedMesh>,
) {
    let engine = &mut eng.0;

    // Animator and mesh removals first: their instance may be despawned below.
    for entity in removed_animators.read() {
        if let Some(id) = index.instance(entity) {
            warn_on_err(entity, "animator detach", engine.detach_animator(id));
        }
    }
    for entity in removed_meshes.read() {
        let Some(id) = index.instance(entity) else {
            continue;
        };
        // The component is gone; detach every mesh no longer carried.
        let kept = meshes.get(entity).ok().map(|m| m.0.hash());
        detach_meshes_except(engine, entity, id, kept);
    }

    for entity in removed_skeletons.read() {
        let Some(id) = index.remove(entity) else {
            continue;
        };
        warn_on_err(entity, "despawn", engine.despawn(id));
        if let Some(mut e) = commands.get_entity(entity) {
            e.remove::<CrowdInstance>();
        }
    }
}

fn detach_meshes_except(engine: &mut Engine, entity: Entity, id: InstanceId, kept: Option<u32>) {
    let attached = match engine.skinned_meshes(id) {
        Ok(meshes) => meshes,
        Err(err) => {
            log::warn!("crowd entity {entity:?}: {err}");
            return;
        }
    };
    for mesh in attached.into_iter().filter(|m| Some(*m) != kept) {
        warn_on_err(entity, "skinned mesh detach", engine.detach_skinned_mesh(id, mesh));
    }
}

pub fn apply_parameters_system(
    mut eng: ResMut<HordeEngine>,
    index: Res<InstanceIndex>,
    mut events: EventReader<SetCrowdParameter>,
) {
    for ev in events.read() {
        let Some(id) = index.instance(ev.entity) else {
            log::debug!("parameter '{}' for unregistered entity {:?}", ev.name, ev.entity);
            continue;
        };
        let result = eng.0.parameters_mut(id).and_then(|mut params| {
            let name = ev.name.as_str();
            match ev.value {
                ParameterValue::Float(v) => params.set_float(name, v),
                ParameterValue::Int(v) => params.set_int(name, v),
                ParameterValue::Bool(v) => params.set_bool(name, v),
                ParameterValue::Trigger => params.set_trigger(name),
            }
        });
        warn_on_err(ev.entity, "parameter write", result);
    }
}

/// Fixed timestep tick: advance the engine, publish its outputs and forward
/// clip events to the entities that crossed them.
pub fn tick_engine_system(
    mut eng: ResMut<HordeEngine>,
    dt: Res<FixedDt>,
    index: Res<InstanceIndex>,
    mut published: ResMut<PublishedFrame>,
    mut fired: EventWriter<ClipEventFired>,
) {
    let out = match eng.0.update(dt.0) {
        Ok(out) => out,
        Err(err) => {
            log::error!("crowd tick failed: {err}");
            return;
        }
    };
    if out.dropped_commands > 0 {
        log::warn!("{} animation commands dropped this tick", out.dropped_commands);
    }

    for (name, events) in out.events.iter() {
        for ev in events {
            let Some(entity) = index.entity(ev.instance) else {
                continue;
            };
            fired.send(ClipEventFired {
                entity,
                name: *name,
                int_value: ev.int_value,
                float_value: ev.float_value,
            });
        }
    }

    published.frame.clone_from(out);
    published.tick += 1;
}
