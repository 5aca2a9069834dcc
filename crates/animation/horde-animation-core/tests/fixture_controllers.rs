use std::sync::Arc;

use horde_animation_core::builder::{ClipAuthoring, ControllerAuthoring, MaskAuthoring, SkeletonAuthoring};
use horde_animation_core::hash::mask_instance_hash;
use horde_animation_core::{
    ClipBuilder, ControllerAsset, ControllerBuilder, Engine, InstanceId, SkeletonBuilder,
    SkeletonDefinition, SkeletonMaskBuilder, SkinnedMeshAuthoring, SkinnedMeshBuilder,
    SkinnedMeshDefinition, StringHash,
};
use horde_test_fixtures::{clips, controllers, masks, meshes, skeletons};

const DT: f32 = 1.0 / 30.0;

const IDLE: u16 = 0;
const LOCOMOTION: u16 = 1;
const JUMP: u16 = 2;

struct Humanoid {
    skeleton: Arc<SkeletonDefinition>,
    mesh: Arc<SkinnedMeshDefinition>,
    asset: Arc<ControllerAsset>,
}

fn build_controller(authoring: ControllerAuthoring) -> ControllerAsset {
    let mut builder = ControllerBuilder::new(authoring);
    for name in controllers::clips("humanoid").unwrap() {
        let clip: ClipAuthoring = clips::load(&name).unwrap();
        let clip = ClipBuilder::from_authoring(&clip).unwrap().build().unwrap();
        builder = builder.clip(name, Arc::new(clip));
    }
    for name in controllers::masks("humanoid").unwrap() {
        let mask: MaskAuthoring = masks::load(&name).unwrap();
        builder = builder.mask(name, Arc::new(SkeletonMaskBuilder::from_authoring(&mask).build()));
    }
    builder.build().unwrap()
}

fn humanoid() -> Humanoid {
    let skeleton: SkeletonAuthoring = skeletons::load("humanoid").unwrap();
    let skeleton = Arc::new(SkeletonBuilder::from_authoring(&skeleton).build().unwrap());
    let mesh: SkinnedMeshAuthoring = meshes::load("body").unwrap();
    let mesh = Arc::new(SkinnedMeshBuilder::from_authoring(&mesh).build(&skeleton));
    let asset = Arc::new(build_controller(controllers::load("humanoid").unwrap()));
    Humanoid {
        skeleton,
        mesh,
        asset,
    }
}

fn spawn(engine: &mut Engine, h: &Humanoid) -> InstanceId {
    let id = engine.spawn();
    engine.attach_skeleton(id, h.skeleton.clone()).unwrap();
    engine.attach_skinned_mesh(id, h.mesh.clone()).unwrap();
    engine.attach_animator(id, h.asset.clone()).unwrap();
    id
}

fn base_state(engine: &Engine, id: InstanceId) -> u16 {
    engine.layer_states(id).unwrap()[0].current_state
}

/// it should rebuild the same authoring into the same controller hash
#[test]
fn fixture_rebuild_is_stable() {
    let from_loader = build_controller(controllers::load("humanoid").unwrap());
    let json = controllers::json("humanoid").unwrap();
    let from_json = build_controller(ControllerAuthoring::from_json(&json).unwrap());
    assert_eq!(from_loader.hash(), from_json.hash());
    assert_eq!(from_loader.clips.len(), 5);
    assert_eq!(from_loader.masks.len(), 1);
    from_loader.validate().unwrap();
}

/// it should flatten the airborne sub-machine into the base layer
#[test]
fn humanoid_layout() {
    let h = humanoid();
    let def = &h.asset.definition;
    assert_eq!(def.layers.len(), 2);
    let base = &def.layers[0].state_machine;
    assert_eq!(base.states.len(), 3);
    assert_eq!(base.initial_state, IDLE);
    assert_eq!(base.states[JUMP as usize].name, StringHash::new("jump"));
    // the any-state entry into the airborne machine
    assert!(base
        .global_transitions
        .iter()
        .any(|t| t.destination == JUMP));
    assert_ne!(def.layers[1].skeleton_mask, 0);
}

/// it should start every parameter at its declared default
#[test]
fn parameters_start_at_defaults() {
    let h = humanoid();
    let mut engine = Engine::default();
    let id = spawn(&mut engine, &h);
    let params = engine.parameters_mut(id).unwrap();
    assert_eq!(params.int("stance").unwrap(), 1);
    assert_eq!(params.float("speed").unwrap(), 0.0);
    assert!(!params.bool("wave").unwrap());
}

/// it should blend into locomotion and emit footsteps while moving
#[test]
fn locomotion_emits_footsteps() {
    let h = humanoid();
    let mut engine = Engine::default();
    let id = spawn(&mut engine, &h);
    engine.update(DT).unwrap();
    assert_eq!(base_state(&engine, id), IDLE);

    engine.parameters_mut(id).unwrap().set_float("speed", 2.0).unwrap();
    let mut footsteps = 0;
    for _ in 0..60 {
        let out = engine.update(DT).unwrap();
        footsteps += out
            .events
            .get(&StringHash::new("footstep"))
            .map_or(0, Vec::len);
    }
    assert_eq!(base_state(&engine, id), LOCOMOTION);
    assert!(footsteps >= 2, "footsteps={footsteps}");
}

/// it should jump on the trigger and fall back to idle through the exit
#[test]
fn jump_round_trip() {
    let h = humanoid();
    let mut engine = Engine::default();
    let id = spawn(&mut engine, &h);
    engine.update(DT).unwrap();

    engine.parameters_mut(id).unwrap().set_trigger("jump").unwrap();
    engine.update(DT).unwrap();
    let layer = engine.layer_states(id).unwrap()[0];
    assert!(layer.in_transition());
    assert_eq!(layer.destination_state, JUMP);

    let mut landed = false;
    let mut seen_jump = false;
    for _ in 0..60 {
        let out = engine.update(DT).unwrap();
        landed |= out.events.contains_key(&StringHash::new("land"));
        seen_jump |= base_state(&engine, id) == JUMP;
    }
    assert!(seen_jump);
    assert!(landed);
    assert_eq!(base_state(&engine, id), IDLE);
}

/// it should sample the gesture layer through the upper-body mask slot
#[test]
fn wave_uses_upper_body_mask() {
    let h = humanoid();
    let mut engine = Engine::default();
    let id = spawn(&mut engine, &h);

    // The resting gesture state has no motion.
    assert_eq!(engine.update(DT).unwrap().command_count(), 1);

    let mask_hash = h.asset.definition.layers[1].skeleton_mask;
    let slot = engine
        .skeleton_buffers()
        .mask_slot(mask_instance_hash(mask_hash, h.skeleton.hash()))
        .unwrap();
    assert_eq!(engine.skeleton_buffers().masks().as_slice()[slot as usize], 0b0011_1110);

    engine.parameters_mut(id).unwrap().set_bool("wave", true).unwrap();
    let out = engine.update(DT).unwrap();
    assert_eq!(out.command_count(), 2);
    let commands = &engine.command_buffers().commands().as_slice()[..2];
    assert_eq!(commands[0].skeleton_mask_index, 0);
    assert_eq!(commands[1].skeleton_mask_index, slot as i32);
}

/// it should publish one skinned mesh instance per spawned humanoid
#[test]
fn skinned_mesh_batches_cover_every_instance() {
    let h = humanoid();
    let mut engine = Engine::default();
    let ids: Vec<_> = (0..3).map(|_| spawn(&mut engine, &h)).collect();
    let out = engine.update(DT).unwrap();
    assert!(out.skinned_mesh_batches_changed);
    assert_eq!(out.skinned_mesh_batches.len(), 1);
    assert_eq!(out.skinned_mesh_batches[0].instances.len(), 3);
    assert_eq!(out.skinned_mesh_batches[0].bone_count, 6);
    assert_eq!(engine.skinned_mesh_reference_count(h.mesh.hash()), 3);

    engine.despawn(ids[0]).unwrap();
    let out = engine.update(DT).unwrap();
    assert_eq!(out.skinned_mesh_batches[0].instances.len(), 2);
}
