use std::sync::Arc;

use glam::{Quat, Vec3};
use horde_animation_core::builder::{
    ConditionMode, ControllerAuthoring, ControllerBuilder, LayerAuthoring, MotionAuthoring,
    ParameterAuthoring, StateAuthoring, StateMachineAuthoring, TransitionAuthoring,
    TransitionSettings,
};
use horde_animation_core::definition::{InterruptionSource, Transition};
use horde_animation_core::evaluate::{active_transition, exit_time_reached, update_layer};
use horde_animation_core::{
    BlendingMode, ClipBuilder, ControllerAsset, Engine, LayerState, ParameterType, SkeletonBuilder,
    StringHash, Variant, WrapMode,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn settings(duration: f32) -> TransitionSettings {
    TransitionSettings {
        duration,
        ..Default::default()
    }
}

/// Controller whose every state plays the same 2s looping clip.
fn controller(states: Vec<StateAuthoring>, globals: Vec<TransitionAuthoring>, bools: &[&str]) -> ControllerAsset {
    let clip = Arc::new(
        ClipBuilder::new("two_seconds", 10.0, 2.0)
            .wrap_mode(WrapMode::Loop)
            .translation("root", |t| Vec3::new(t, 0.0, 0.0))
            .build()
            .unwrap(),
    );
    let authoring = ControllerAuthoring {
        name: "test".into(),
        parameters: bools
            .iter()
            .map(|name| ParameterAuthoring::new(*name, ParameterType::Bool))
            .collect(),
        layers: vec![LayerAuthoring {
            name: "base".into(),
            blending_mode: BlendingMode::Override,
            default_weight: 1.0,
            mask: None,
            state_machine: StateMachineAuthoring {
                name: "root".into(),
                states,
                any_state_transitions: globals,
                ..Default::default()
            },
        }],
        parameters_record_size: None,
        parameters_type_hash: None,
    };
    ControllerBuilder::new(authoring).clip("clip", clip).build().unwrap()
}

fn state(name: &str) -> StateAuthoring {
    StateAuthoring::new(name, Some(MotionAuthoring::Clip("clip".into())))
}

struct Harness {
    asset: ControllerAsset,
    params: Vec<Variant>,
    layer: LayerState,
}

impl Harness {
    fn new(asset: ControllerAsset) -> Self {
        let params = asset
            .definition
            .parameters
            .iter()
            .map(|p| p.default_value)
            .collect();
        Self {
            asset,
            params,
            layer: LayerState::default(),
        }
    }

    fn set(&mut self, name: &str, value: bool) {
        let index = self
            .asset
            .definition
            .parameter_index(StringHash::new(name))
            .unwrap();
        self.params[index] = Variant::from_bool(value);
    }

    fn step(&mut self, dt: f32) -> LayerState {
        let def = &self.asset.definition;
        update_layer(&mut self.layer, &def.layers[0], &def.motions, &self.params, dt);
        self.layer
    }
}

/// it should detect exit time crossings in normalized time
#[test]
fn exit_time_crossing() {
    let t = Transition {
        has_exit_time: true,
        exit_time: 0.5,
        ..Default::default()
    };
    assert!(exit_time_reached(&t, 2.0, 0.9, 1.1));
    assert!(!exit_time_reached(&t, 2.0, 1.1, 1.3));
    // later loops cross again
    assert!(exit_time_reached(&t, 2.0, 4.9, 5.1));
    // zero length motions always pass
    assert!(exit_time_reached(&t, 0.0, 0.0, 0.0));

    let once = Transition {
        exit_time: 1.5,
        ..t
    };
    assert!(!exit_time_reached(&once, 2.0, 0.9, 1.1));
    assert!(exit_time_reached(&once, 2.0, 2.9, 3.1));
}

/// it should leave a state once its exit time is crossed
#[test]
fn exit_time_triggers_transition() {
    let asset = controller(
        vec![
            state("a").transition(TransitionAuthoring::to_state("b").with_settings(TransitionSettings {
                has_exit_time: true,
                exit_time: 0.5,
                ..Default::default()
            })),
            state("b"),
        ],
        Vec::new(),
        &[],
    );
    let mut h = Harness::new(asset);
    assert_eq!(h.step(0.9).current_state, 0);
    let s = h.step(0.2);
    assert_eq!(s.current_state, 1);
    assert!(s.current_state_changed());
}

/// it should accumulate looping state time without wrapping
#[test]
fn looping_time_is_unbounded() {
    let mut h = Harness::new(controller(vec![state("a")], Vec::new(), &[]));
    for _ in 0..3 {
        h.step(1.5);
    }
    approx(h.layer.current_time, 4.5, 1e-5);
    assert!(h.layer.is_initialized());
    assert_eq!(h.layer.weight(), 1.0);
}

/// it should not restart the playing state from an any-state transition
#[test]
fn any_state_self_transition_is_suppressed() {
    let global = TransitionAuthoring::to_state("a").when("reset", ConditionMode::If, 0.0);
    let mut h = Harness::new(controller(vec![state("a")], vec![global.clone()], &["reset"]));
    h.set("reset", true);
    let s = h.step(0.1);
    assert!(!s.in_transition());
    assert!(!s.current_state_changed());
    approx(s.current_time, 0.1, 1e-6);

    let allowed = global.with_settings(TransitionSettings {
        can_transition_to_self: true,
        ..Default::default()
    });
    let mut h = Harness::new(controller(vec![state("a")], vec![allowed], &["reset"]));
    h.step(0.5);
    h.set("reset", true);
    let s = h.step(0.1);
    assert!(s.current_state_changed());
    approx(s.current_time, 0.1, 1e-6);
}

/// it should let earlier source transitions interrupt an ordered blend
#[test]
fn ordered_source_interruption() {
    let build = |source: InterruptionSource| {
        controller(
            vec![
                state("a")
                    .transition(
                        TransitionAuthoring::to_state("c")
                            .when("to_c", ConditionMode::If, 0.0)
                            .with_settings(settings(0.5)),
                    )
                    .transition(
                        TransitionAuthoring::to_state("b")
                            .when("to_b", ConditionMode::If, 0.0)
                            .with_settings(TransitionSettings {
                                duration: 1.0,
                                interruption_source: source,
                                ..Default::default()
                            }),
                    ),
                state("b"),
                state("c"),
            ],
            Vec::new(),
            &["to_b", "to_c"],
        )
    };

    let mut h = Harness::new(build(InterruptionSource::Source));
    h.set("to_b", true);
    let s = h.step(0.1);
    assert!(s.in_transition());
    assert_eq!(s.destination_state, 1);

    h.set("to_c", true);
    let s = h.step(0.1);
    assert!(s.in_transition());
    assert_eq!(s.destination_state, 2);
    assert_eq!(s.current_state, 0);
    assert!(s.destination_state_changed());

    let mut h = Harness::new(build(InterruptionSource::None));
    h.set("to_b", true);
    h.step(0.1);
    h.set("to_c", true);
    assert_eq!(h.step(0.1).destination_state, 1);
}

/// it should redirect a blend from the destination's own transitions
#[test]
fn destination_interruption_tracks_owner() {
    let asset = controller(
        vec![
            state("a").transition(
                TransitionAuthoring::to_state("b")
                    .when("to_b", ConditionMode::If, 0.0)
                    .with_settings(TransitionSettings {
                        duration: 1.0,
                        interruption_source: InterruptionSource::Destination,
                        ..Default::default()
                    }),
            ),
            state("b").transition(
                TransitionAuthoring::to_state("c")
                    .when("to_c", ConditionMode::If, 0.0)
                    .with_settings(settings(1.0)),
            ),
            state("c"),
        ],
        Vec::new(),
        &["to_b", "to_c"],
    );
    let mut h = Harness::new(asset);
    h.set("to_b", true);
    h.step(0.1);
    h.set("to_c", true);
    let s = h.step(0.1);

    assert!(s.is_active_transition_from_destination());
    assert_eq!(s.transition_owner, 1);
    assert_eq!(s.current_state, 0);
    let machine = &h.asset.definition.layers[0].state_machine;
    assert_eq!(active_transition(machine, &s).map(|t| t.destination), Some(2));
}

/// it should skip an any-state transition towards the state being blended to
#[test]
fn any_state_skips_inflight_destination() {
    let asset = controller(
        vec![
            state("a").transition(
                TransitionAuthoring::to_state("b")
                    .when("to_b", ConditionMode::If, 0.0)
                    .with_settings(settings(1.0)),
            ),
            state("b"),
        ],
        vec![TransitionAuthoring::to_state("b")
            .when("panic", ConditionMode::If, 0.0)
            .with_settings(settings(0.5))],
        &["to_b", "panic"],
    );
    let mut h = Harness::new(asset);
    h.set("to_b", true);
    h.step(0.1);
    h.set("panic", true);
    let s = h.step(0.1);
    assert!(!s.is_active_transition_global());
    approx(s.transition_time, 0.2, 1e-5);
}

/// it should clear triggers after the tick that consumed them
#[test]
fn triggers_release_after_update() {
    let skeleton = Arc::new(
        SkeletonBuilder::new()
            .bone("root", None, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE)
            .build()
            .unwrap(),
    );
    let clip = Arc::new(
        ClipBuilder::new("pose", 10.0, 1.0)
            .translation("root", |_| Vec3::ZERO)
            .build()
            .unwrap(),
    );
    let authoring = ControllerAuthoring {
        name: "jumper".into(),
        parameters: vec![ParameterAuthoring::new("jump", ParameterType::Trigger)],
        layers: vec![LayerAuthoring {
            name: "base".into(),
            blending_mode: BlendingMode::Override,
            default_weight: 1.0,
            mask: None,
            state_machine: StateMachineAuthoring {
                name: "root".into(),
                states: vec![
                    StateAuthoring::new("idle", Some(MotionAuthoring::Clip("pose".into()))).transition(
                        TransitionAuthoring::to_state("air").when("jump", ConditionMode::If, 0.0),
                    ),
                    StateAuthoring::new("air", Some(MotionAuthoring::Clip("pose".into()))).transition(
                        TransitionAuthoring::to_state("idle").when("jump", ConditionMode::If, 0.0),
                    ),
                ],
                ..Default::default()
            },
        }],
        parameters_record_size: None,
        parameters_type_hash: None,
    };
    let asset = Arc::new(ControllerBuilder::new(authoring).clip("pose", clip).build().unwrap());

    let mut engine = Engine::default();
    let id = engine.spawn();
    engine.attach_skeleton(id, skeleton).unwrap();
    engine.attach_animator(id, asset).unwrap();
    engine.parameters_mut(id).unwrap().set_trigger("jump").unwrap();

    engine.update(0.1).unwrap();
    assert_eq!(engine.layer_states(id).unwrap()[0].current_state, 1);
    assert!(!engine.parameters_mut(id).unwrap().bool("jump").unwrap());

    // Without a new trigger the machine stays put.
    engine.update(0.1).unwrap();
    assert_eq!(engine.layer_states(id).unwrap()[0].current_state, 1);
}
