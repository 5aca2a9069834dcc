//! Per-layer state machine evaluation.
//!
//! Everything here is a pure function of the layer definition, the motion
//! pool, the parameter snapshot and the mutable [`LayerState`]. Indices are
//! trusted; definitions are validated when they are attached.

use crate::definition::{
    BlendTree, BlendTreeType, CompareOp, Condition, InterruptionSource, Layer, Motion, State,
    StateMachine, Transition, WrapMode,
};
use crate::layer_state::{LayerState, LayerStateFlags};
use crate::parameters::Variant;

/// Tolerance of float equality conditions.
pub const FLOAT_EQUALITY_EPSILON: f32 = 0.01;

/// Upper bound on chained interruptions within a single update.
pub const MAX_INTERRUPTIONS_PER_UPDATE: usize = 16;

#[inline]
fn param(params: &[Variant], index: u16) -> Variant {
    params.get(index as usize).copied().unwrap_or_default()
}

pub fn evaluate_condition(condition: &Condition, params: &[Variant]) -> bool {
    let value = param(params, condition.parameter);
    let rhs = condition.value;
    match condition.op {
        CompareOp::If | CompareOp::Trigger => value.as_bool(),
        CompareOp::IfNot => !value.as_bool(),
        CompareOp::IntGreater => value.as_int() > rhs.as_int(),
        CompareOp::IntLess => value.as_int() < rhs.as_int(),
        CompareOp::IntEquals => value.as_int() == rhs.as_int(),
        CompareOp::IntNotEqual => value.as_int() != rhs.as_int(),
        CompareOp::IntGreaterOrEqual => value.as_int() >= rhs.as_int(),
        CompareOp::IntLessOrEqual => value.as_int() <= rhs.as_int(),
        CompareOp::FloatGreater => value.as_float() > rhs.as_float(),
        CompareOp::FloatLess => value.as_float() < rhs.as_float(),
        CompareOp::FloatGreaterOrEqual => value.as_float() >= rhs.as_float(),
        CompareOp::FloatLessOrEqual => value.as_float() <= rhs.as_float(),
        CompareOp::FloatEquals => {
            (value.as_float() - rhs.as_float()).abs() <= FLOAT_EQUALITY_EPSILON
        }
        CompareOp::FloatNotEqual => {
            (value.as_float() - rhs.as_float()).abs() > FLOAT_EQUALITY_EPSILON
        }
    }
}

/// All conditions must hold. An empty list holds.
pub fn evaluate_conditions(conditions: &[Condition], params: &[Variant]) -> bool {
    conditions.iter().all(|c| evaluate_condition(c, params))
}

/// Inclusive crossing test that works in both time directions.
#[inline]
pub fn overlaps(previous: f32, current: f32, t: f32) -> bool {
    if previous > current {
        t >= current && t <= previous
    } else {
        t >= previous && t <= current
    }
}

/// Crossing of `t` in `[0, 1)` by the wrapped image of `[previous, current]`.
fn overlaps_wrapped(previous: f32, current: f32, t: f32) -> bool {
    let (lo, hi) = if previous > current {
        (current, previous)
    } else {
        (previous, current)
    };
    let span = hi - lo;
    if span >= 1.0 {
        return true;
    }
    let start = lo - lo.floor();
    let end = start + span;
    overlaps(start, end, t) || overlaps(start, end, t + 1.0)
}

#[inline]
pub fn motion_length(state: &State, motions: &[Motion]) -> f32 {
    state
        .motion
        .map_or(0.0, |m| motions[m as usize].average_length)
}

/// Wrap mode of the state's motion. A state without motion behaves as Once.
#[inline]
pub fn motion_wrap_mode(state: &State, motions: &[Motion]) -> WrapMode {
    state
        .motion
        .map_or(WrapMode::Once, |m| motions[m as usize].wrap_mode)
}

#[inline]
pub fn state_speed(state: &State, params: &[Variant]) -> f32 {
    match state.speed_parameter {
        Some(p) => param(params, p).as_float() * state.speed,
        None => state.speed,
    }
}

/// Advance a state's playback time. Looping motions accumulate without bound;
/// non-looping ones clamp to `[-length, length]`.
pub fn update_state_time(
    state: &State,
    motions: &[Motion],
    params: &[Variant],
    dt: f32,
    time: f32,
) -> f32 {
    let advanced = time + dt * state_speed(state, params);
    match motion_wrap_mode(state, motions) {
        WrapMode::Loop => advanced,
        WrapMode::Once => {
            let length = motion_length(state, motions);
            advanced.clamp(-length, length)
        }
    }
}

/// Exit-time gate over the interval `[previous, current]` (seconds).
pub fn exit_time_reached(transition: &Transition, motion_length: f32, previous: f32, current: f32) -> bool {
    if !transition.has_exit_time {
        return true;
    }
    if motion_length <= 0.0 {
        return true;
    }
    let p = previous / motion_length;
    let c = current / motion_length;
    if transition.exit_time >= 1.0 {
        overlaps(p, c, transition.exit_time)
    } else {
        overlaps_wrapped(p, c, transition.exit_time)
    }
}

pub fn evaluate_transition(
    transition: &Transition,
    params: &[Variant],
    motion_length: f32,
    previous: f32,
    current: f32,
) -> bool {
    evaluate_conditions(&transition.conditions, params)
        && exit_time_reached(transition, motion_length, previous, current)
}

/// First transition in declaration order that fires, skipping `skip`.
fn find_transition(
    transitions: &[Transition],
    params: &[Variant],
    motion_length: f32,
    previous: f32,
    current: f32,
    skip: Option<usize>,
) -> Option<usize> {
    transitions.iter().enumerate().position(|(i, t)| {
        Some(i) != skip && evaluate_transition(t, params, motion_length, previous, current)
    })
}

/// First any-state transition whose conditions hold. A transition towards the
/// state already playing, or already being blended to, is skipped unless it
/// allows self transitions.
pub fn find_global_transition(
    machine: &StateMachine,
    state: &LayerState,
    params: &[Variant],
) -> Option<usize> {
    machine.global_transitions.iter().position(|t| {
        let targets_self = t.destination == state.current_state
            || (state.in_transition() && t.destination == state.destination_state);
        if targets_self && !t.can_transition_to_self {
            return false;
        }
        evaluate_conditions(&t.conditions, params)
    })
}

pub fn start_transition(
    state: &mut LayerState,
    index: usize,
    destination: u16,
    owner: u16,
    offset: f32,
) {
    state.destination_state = destination;
    state.destination_time = offset;
    state.transition_time = 0.0;
    state.active_transition = index as u16;
    state.transition_owner = owner;
    state.flags.remove(LayerStateFlags::TRANSITION_FLAGS);
    state.flags.insert(LayerStateFlags::IN_TRANSITION | LayerStateFlags::DESTINATION_STATE_CHANGED);
}

/// Transition currently blending, if the layer is in one.
pub fn active_transition<'a>(machine: &'a StateMachine, state: &LayerState) -> Option<&'a Transition> {
    if !state.in_transition() {
        return None;
    }
    let index = state.active_transition as usize;
    if state.is_active_transition_global() {
        machine.global_transitions.get(index)
    } else {
        machine
            .states
            .get(state.transition_owner as usize)?
            .transitions
            .get(index)
    }
}

/// Duration in seconds; non-fixed durations are normalized to the source motion.
pub fn transition_duration(transition: &Transition, source_length: f32) -> f32 {
    if transition.has_fixed_duration {
        transition.duration
    } else {
        transition.duration * source_length
    }
}

fn commit_transition(state: &mut LayerState) {
    state.current_state = state.destination_state;
    state.current_time = state.destination_time;
    state.flags.insert(LayerStateFlags::CURRENT_STATE_CHANGED);
    state.flags.remove(LayerStateFlags::TRANSITION_FLAGS);
}

fn initialize_if_needed(state: &mut LayerState, layer: &Layer) {
    if state.is_initialized() {
        return;
    }
    state.current_state = layer.state_machine.initial_state;
    state.set_weight(layer.default_weight);
    state.current_time = 0.0;
    state.flags.remove(LayerStateFlags::TRANSITION_FLAGS);
    state.flags.insert(LayerStateFlags::INITIALIZED);
}

#[derive(Copy, Clone)]
enum Scan {
    Source,
    Destination,
}

/// Try to redirect the active transition according to its interruption
/// source. Returns true when a new transition was started.
pub fn evaluate_interrupt_transitions(
    transition: &Transition,
    machine: &StateMachine,
    motions: &[Motion],
    params: &[Variant],
    state: &mut LayerState,
    source_previous: f32,
    destination_previous: f32,
) -> bool {
    let scans: &[Scan] = match transition.interruption_source {
        InterruptionSource::None => return false,
        InterruptionSource::Source => &[Scan::Source],
        InterruptionSource::Destination => &[Scan::Destination],
        InterruptionSource::SourceThenDestination => &[Scan::Source, Scan::Destination],
        InterruptionSource::DestinationThenSource => &[Scan::Destination, Scan::Source],
    };

    let owned_by_source = !state.is_active_transition_global()
        && !state.is_active_transition_from_destination()
        && state.transition_owner == state.current_state;

    for scan in scans {
        match scan {
            Scan::Source => {
                let source_index = state.current_state;
                let source = &machine.states[source_index as usize];
                let (limit, skip) = match (owned_by_source, transition.ordered_interruption) {
                    (true, true) => (state.active_transition as usize, None),
                    (true, false) => (source.transitions.len(), Some(state.active_transition as usize)),
                    (false, _) => (source.transitions.len(), None),
                };
                let limit = limit.min(source.transitions.len());
                if let Some(i) = find_transition(
                    &source.transitions[..limit],
                    params,
                    motion_length(source, motions),
                    source_previous,
                    state.current_time,
                    skip,
                ) {
                    let next = &source.transitions[i];
                    let offset =
                        next.offset * motion_length(&machine.states[next.destination as usize], motions);
                    start_transition(state, i, next.destination, source_index, offset);
                    return true;
                }
            }
            Scan::Destination => {
                let destination_index = state.destination_state;
                let destination = &machine.states[destination_index as usize];
                if let Some(i) = find_transition(
                    &destination.transitions,
                    params,
                    motion_length(destination, motions),
                    destination_previous,
                    state.destination_time,
                    None,
                ) {
                    let next = &destination.transitions[i];
                    let offset =
                        next.offset * motion_length(&machine.states[next.destination as usize], motions);
                    start_transition(state, i, next.destination, destination_index, offset);
                    state
                        .flags
                        .insert(LayerStateFlags::ACTIVE_TRANSITION_FROM_DESTINATION);
                    return true;
                }
            }
        }
    }
    false
}

/// Advance one layer by `dt`.
pub fn update_layer(
    state: &mut LayerState,
    layer: &Layer,
    motions: &[Motion],
    params: &[Variant],
    dt: f32,
) {
    initialize_if_needed(state, layer);
    state.flags.remove(LayerStateFlags::UPDATE_FLAGS);

    let machine = &layer.state_machine;
    let current = &machine.states[state.current_state as usize];
    let current_previous = state.current_time;
    state.current_time = update_state_time(current, motions, params, dt, current_previous);

    if let Some(i) = find_global_transition(machine, state, params) {
        let t = &machine.global_transitions[i];
        let offset = t.offset * motion_length(&machine.states[t.destination as usize], motions);
        start_transition(state, i, t.destination, state.current_state, offset);
        state.flags.insert(LayerStateFlags::ACTIVE_TRANSITION_GLOBAL);
    }

    if !state.in_transition() {
        if let Some(i) = find_transition(
            &current.transitions,
            params,
            motion_length(current, motions),
            current_previous,
            state.current_time,
            None,
        ) {
            let t = &current.transitions[i];
            let offset = t.offset * motion_length(&machine.states[t.destination as usize], motions);
            start_transition(state, i, t.destination, state.current_state, offset);
        }
    }

    let mut interruptions = 0;
    while state.in_transition() {
        let Some(transition) = active_transition(machine, state) else {
            state.flags.remove(LayerStateFlags::TRANSITION_FLAGS);
            break;
        };
        let destination = &machine.states[transition.destination as usize];
        let destination_previous = state.destination_time;
        state.destination_time =
            update_state_time(destination, motions, params, dt, destination_previous);
        state.transition_time += dt;

        let source_length = motion_length(&machine.states[state.current_state as usize], motions);
        if state.transition_time >= transition_duration(transition, source_length) {
            commit_transition(state);
            break;
        }

        if interruptions >= MAX_INTERRUPTIONS_PER_UPDATE {
            log::debug!("interruption chain capped at {MAX_INTERRUPTIONS_PER_UPDATE}");
            break;
        }
        if !evaluate_interrupt_transitions(
            transition,
            machine,
            motions,
            params,
            state,
            current_previous,
            destination_previous,
        ) {
            break;
        }
        interruptions += 1;
    }
}

/// Normalized progress of the active transition in `[0, 1]`.
pub fn transition_progress(state: &LayerState, machine: &StateMachine, motions: &[Motion]) -> f32 {
    let Some(t) = active_transition(machine, state) else {
        return 0.0;
    };
    let source_length = motion_length(&machine.states[state.current_state as usize], motions);
    let duration = transition_duration(t, source_length);
    if duration <= 0.0 {
        1.0
    } else {
        (state.transition_time / duration).clamp(0.0, 1.0)
    }
}

/// Nodes of a 1D blend tree that currently carry weight.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BlendRange {
    pub left: usize,
    pub right: usize,
    pub left_weight: f32,
    pub right_weight: f32,
}

impl BlendRange {
    /// `(node, weight)` pairs, one per distinct active node.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> {
        let second = (self.left != self.right).then_some((self.right, self.right_weight));
        std::iter::once((self.left, self.left_weight)).chain(second)
    }

    pub fn weight(&self, node: usize) -> f32 {
        self.iter()
            .find(|(n, _)| *n == node)
            .map_or(0.0, |(_, w)| w)
    }
}

/// Locate the blend parameter between two neighbouring nodes and interpolate.
/// Values outside the node range clamp to the end node. 2D trees are not
/// evaluated and yield `None`.
pub fn compute_blend_tree_weights(tree: &BlendTree, params: &[Variant]) -> Option<BlendRange> {
    if tree.ty != BlendTreeType::Simple1D || tree.nodes.is_empty() {
        return None;
    }
    let x = param(params, tree.horizontal_parameter).as_float();
    let n = tree.nodes.len();
    let first_above = tree
        .nodes
        .iter()
        .position(|node| x < node.position.x)
        .unwrap_or(n);
    let right = first_above.min(n - 1);
    let left = first_above.saturating_sub(1).min(n - 1);
    if left == right {
        return Some(BlendRange {
            left,
            right,
            left_weight: 1.0,
            right_weight: 0.0,
        });
    }
    let a = tree.nodes[left].position.x;
    let b = tree.nodes[right].position.x;
    let t = if b - a > f32::EPSILON {
        ((x - a) / (b - a)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Some(BlendRange {
        left,
        right,
        left_weight: 1.0 - t,
        right_weight: t,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlaps_both_directions() {
        assert!(overlaps(0.2, 0.6, 0.5));
        assert!(overlaps(0.6, 0.2, 0.5));
        assert!(overlaps(0.5, 0.6, 0.5));
        assert!(!overlaps(0.6, 0.7, 0.5));
    }

    #[test]
    fn wrapped_crossing_handles_loop_boundary() {
        assert!(overlaps_wrapped(0.9, 1.1, 0.0));
        assert!(overlaps_wrapped(0.9, 1.1, 0.95));
        assert!(!overlaps_wrapped(0.9, 1.1, 0.5));
        assert!(overlaps_wrapped(1.45, 1.55, 0.5));
        assert!(overlaps_wrapped(0.0, 2.0, 0.3));
    }

    #[test]
    fn float_equality_uses_epsilon() {
        let c = Condition {
            parameter: 0,
            op: CompareOp::FloatEquals,
            value: Variant::from_float(1.0),
        };
        assert!(evaluate_condition(&c, &[Variant::from_float(1.005)]));
        assert!(!evaluate_condition(&c, &[Variant::from_float(1.02)]));
        let ne = Condition {
            op: CompareOp::FloatNotEqual,
            ..c
        };
        assert!(evaluate_condition(&ne, &[Variant::from_float(1.02)]));
    }
}
