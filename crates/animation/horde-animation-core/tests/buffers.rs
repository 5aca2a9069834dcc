use std::sync::Arc;

use glam::{Quat, Vec3};
use horde_animation_core::buffer::required_buffer_size;
use horde_animation_core::builder::{
    ControllerAuthoring, ControllerBuilder, LayerAuthoring, MotionAuthoring, StateAuthoring,
    StateMachineAuthoring,
};
use horde_animation_core::hash::{instance_hash, mask_instance_hash};
use horde_animation_core::managers::skeleton::SKELETON_MATRIX_CHUNK;
use horde_animation_core::managers::ClipBufferManager;
use horde_animation_core::{
    BlendingMode, Clip, ClipBuilder, ControllerAsset, CoreError, Engine, HeapAllocator,
    SkeletonBuilder, SkeletonDefinition, SkeletonMaskBuilder, SkeletonMaskDefinition, StringHash,
    WrapMode,
};

fn skeleton() -> Arc<SkeletonDefinition> {
    Arc::new(
        SkeletonBuilder::new()
            .bone("hips", None, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
            .bone("hips/spine", Some("hips"), Vec3::Y, Quat::IDENTITY, Vec3::ONE)
            .bone("hips/spine/head", Some("hips/spine"), Vec3::Y, Quat::IDENTITY, Vec3::ONE)
            .bone("hips/leg", Some("hips"), -Vec3::Y, Quat::IDENTITY, Vec3::ONE)
            .build()
            .unwrap(),
    )
}

fn upper_body() -> Arc<SkeletonMaskDefinition> {
    Arc::new(
        SkeletonMaskBuilder::new()
            .bone("hips/spine", true)
            .bone("hips/spine/head", true)
            .bone("hips/leg", false)
            .build(),
    )
}

fn clip(name: &str) -> Arc<Clip> {
    Arc::new(
        ClipBuilder::new(name, 10.0, 1.0)
            .rotation("hips/spine", |t| Quat::from_rotation_x(t))
            .build()
            .unwrap(),
    )
}

/// Two layers: an unmasked base and a masked upper-body layer. The base layer
/// takes `name` so that controllers hash apart.
fn masked_controller(name: &str, clip: &Arc<Clip>, mask: &Arc<SkeletonMaskDefinition>) -> Arc<ControllerAsset> {
    let layer = |layer_name: &str, mask: Option<&str>| LayerAuthoring {
        name: layer_name.into(),
        blending_mode: BlendingMode::Override,
        default_weight: 1.0,
        mask: mask.map(str::to_owned),
        state_machine: StateMachineAuthoring {
            name: "root".into(),
            states: vec![StateAuthoring::new("play", Some(MotionAuthoring::Clip("clip".into())))],
            ..Default::default()
        },
    };
    let authoring = ControllerAuthoring {
        name: name.into(),
        parameters: Vec::new(),
        layers: vec![layer(name, None), layer("upper", Some("upper"))],
        parameters_record_size: None,
        parameters_type_hash: None,
    };
    Arc::new(
        ControllerBuilder::new(authoring)
            .clip("clip", clip.clone())
            .mask("upper", mask.clone())
            .build()
            .unwrap(),
    )
}

/// it should grow in whole chunks and shrink only past one spare chunk
#[test]
fn chunked_growth_rule() {
    assert_eq!(required_buffer_size(0, 0, 64), Some(64));
    assert_eq!(required_buffer_size(64, 63, 64), None);
    assert_eq!(required_buffer_size(64, 64, 64), Some(128));
    assert_eq!(required_buffer_size(256, 100, 64), Some(128));
    assert_eq!(required_buffer_size(256, 200, 64), None);
}

/// it should collapse masks per skeleton and share slots between controllers
#[test]
fn mask_slots_are_derived_once_per_skeleton() {
    let skel = skeleton();
    let mask = upper_body();
    let c = clip("sway");
    let first = masked_controller("first", &c, &mask);
    let second = masked_controller("second", &c, &mask);

    let mut engine = Engine::default();
    for ctrl in [&first, &second] {
        let id = engine.spawn();
        engine.attach_skeleton(id, skel.clone()).unwrap();
        engine.attach_animator(id, ctrl.clone()).unwrap();
    }

    let buffers = engine.skeleton_buffers();
    // slot 0 is the implicit all-bones mask
    assert_eq!(buffers.mask_slots().len(), 2);
    let slot = buffers
        .mask_slot(mask_instance_hash(mask.hash(), skel.hash()))
        .unwrap();
    assert_eq!(slot, 1);
    assert_eq!(buffers.masks().as_slice()[0], !0u64);
    assert_eq!(buffers.masks().as_slice()[1], 0b0110);

    let out = engine.update(0.1).unwrap();
    assert_eq!(out.command_count(), 4);
    let commands = &engine.command_buffers().commands().as_slice()[..4];
    let mut masks: Vec<i32> = commands.iter().map(|c| c.skeleton_mask_index).collect();
    masks.sort_unstable();
    assert_eq!(masks, vec![0, 0, 1, 1]);
}

/// it should keep one clip instance per (clip, skeleton) pair
#[test]
fn clip_instances_are_shared_and_laid_out_per_bone() {
    let skel = skeleton();
    let mask = upper_body();
    let c = clip("sway");
    let first = masked_controller("first", &c, &mask);
    let second = masked_controller("second", &c, &mask);
    assert_ne!(first.hash(), second.hash());

    let mut engine = Engine::default();
    let a = engine.spawn();
    let b = engine.spawn();
    engine.attach_skeleton(a, skel.clone()).unwrap();
    engine.attach_skeleton(b, skel.clone()).unwrap();
    engine.attach_animator(a, first).unwrap();
    engine.attach_animator(b, second).unwrap();

    let clips = engine.clip_buffers();
    assert_eq!(clips.reference_count(c.hash(), skel.hash()), 2);
    let instance = clips.instance(instance_hash(c.hash(), skel.hash())).unwrap();
    assert_eq!(instance.sample_count, 11);
    assert_eq!(instance.bone_count, 4);
    // samples plus the additive reference block, aligned to 4
    assert_eq!(instance.block.len(), 11 * 4 + 4);
    assert_eq!(instance.additive_reference_index(), instance.block.begin as i32 + 44);

    engine.detach_animator(a).unwrap();
    assert_eq!(engine.clip_buffers().reference_count(c.hash(), skel.hash()), 1);
    engine.detach_animator(b).unwrap();
    assert_eq!(engine.clip_buffers().reference_count(c.hash(), skel.hash()), 0);
    assert!(engine.clip_buffers().instances().is_empty());
}

/// it should size the matrix buffer to the heap high-water mark in chunks
#[test]
fn skeleton_matrices_follow_high_water_mark() {
    let skel = skeleton();
    let mut engine = Engine::default();
    let ids: Vec<_> = (0..3).map(|_| engine.spawn()).collect();
    for id in &ids {
        engine.attach_skeleton(*id, skel.clone()).unwrap();
    }
    assert_eq!(engine.skeleton_heap().one_past_highest_used_address(), 12);
    assert_eq!(engine.skeleton_buffers().matrices().len(), SKELETON_MATRIX_CHUNK);

    // Releasing a middle block leaves the high-water mark in place.
    engine.detach_skeleton(ids[1]).unwrap();
    assert_eq!(engine.skeleton_heap().one_past_highest_used_address(), 12);
    // The hole is reused by the next skeleton.
    let d = engine.spawn();
    engine.attach_skeleton(d, skel.clone()).unwrap();
    assert_eq!(engine.skeleton_matrix_index(d).unwrap(), Some(4));

    engine.detach_skeleton(ids[2]).unwrap();
    assert_eq!(engine.skeleton_heap().one_past_highest_used_address(), 8);
    assert_eq!(engine.skeleton_reference_count(skel.hash()), 2);
}

/// it should refuse allocations beyond a fixed heap capacity
#[test]
fn heap_exhaustion_is_recoverable() {
    let mut heap = HeapAllocator::new("tiny", 8, 1);
    let a = heap.try_allocate(6).unwrap();
    let err = heap.try_allocate(4).unwrap_err();
    assert!(err.is_recoverable());
    heap.release(a).unwrap();
    assert!(heap.try_allocate(8).is_ok());
    assert_eq!(heap.free_space(), 0);
}

/// it should refuse to make resident a clip whose keyframes overflow 16 bits
#[test]
fn overlong_clip_is_rejected_before_sampling() {
    let skel = skeleton();
    // 2300s at 30fps: 69001 samples.
    let long = Clip::new(
        StringHash::new("crowd_loop"),
        30.0,
        2300.0,
        WrapMode::Loop,
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
        Vec::new(),
    );
    let mut clips = ClipBufferManager::new(1 << 20);
    let err = clips.retain_clip_instance(&long, &skel).unwrap_err();
    assert!(matches!(err, CoreError::InvalidDefinition { .. }));
    assert!(clips.instances().is_empty());
    assert_eq!(clips.heap().used_space(), 0);
}
