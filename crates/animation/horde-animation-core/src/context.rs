//! Turns motion evaluation into deferred sampling commands and clip events.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::command::{AnimationCommand, AnimationCommandList};
use crate::definition::{BlendTree, BlendingMode, Clip, Motion, MotionClip, MotionKind, WrapMode};
use crate::evaluate::compute_blend_tree_weights;
use crate::hash::{instance_hash, mask_instance_hash, StringHash};
use crate::ids::InstanceId;
use crate::keyframe::ClipKeyframe;
use crate::managers::ClipInstance;
use crate::parameters::Variant;

/// Contributions lighter than this are not sampled.
pub const MIN_CONTRIBUTION_WEIGHT: f32 = 0.01;

/// Payload of a clip event delivered to one instance.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityClipEvent {
    pub instance: InstanceId,
    pub int_value: i32,
    pub float_value: f32,
}

/// Events of one tick, keyed by event name.
pub type ClipEventMap = HashMap<StringHash, Vec<EntityClipEvent>>;

/// Multi-producer event sink, drained after every batch has finished.
#[derive(Debug, Default)]
pub struct ClipEventQueue {
    inner: Mutex<ClipEventMap>,
}

impl ClipEventQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn push(&self, name: StringHash, event: EntityClipEvent) {
        self.inner.lock().entry(name).or_default().push(event);
    }

    pub fn drain(&mut self) -> ClipEventMap {
        std::mem::take(self.inner.get_mut())
    }
}

/// The instance being sampled.
#[derive(Copy, Clone, Debug)]
pub struct AnimationTarget {
    pub instance: InstanceId,
    pub skeleton_hash: u32,
    pub skeleton_matrix_index: i32,
    /// Commands emitted so far this tick; selects the next pass.
    pub command_count: u32,
}

impl AnimationTarget {
    pub fn new(instance: InstanceId, skeleton_hash: u32, skeleton_matrix_index: i32) -> Self {
        Self {
            instance,
            skeleton_hash,
            skeleton_matrix_index,
            command_count: 0,
        }
    }
}

/// How a motion contributes: weight, blend mode and mask of its layer.
#[derive(Copy, Clone, Debug)]
pub struct Contribution {
    pub weight: f32,
    pub blending_mode: BlendingMode,
    pub mask_hash: u32,
}

/// Read-only view of everything one (skeleton, controller) batch needs to
/// emit commands. Shared across threads; the command list and event queue
/// take concurrent appends.
pub struct AnimationContext<'a> {
    pub motions: &'a [Motion],
    pub clips: &'a HashMap<u32, Arc<Clip>>,
    pub clip_instances: &'a HashMap<u32, ClipInstance>,
    pub mask_slots: &'a HashMap<u32, u32>,
    pub commands: &'a AnimationCommandList,
    pub events: &'a ClipEventQueue,
    pub dropped_commands: &'a AtomicU32,
}

impl<'a> AnimationContext<'a> {
    /// Sample `motion` over the state-time interval `[previous, current]`.
    pub fn evaluate_motion(
        &self,
        target: &mut AnimationTarget,
        motion: u16,
        params: &[Variant],
        previous: f32,
        current: f32,
        contribution: Contribution,
    ) {
        let Some(m) = self.motions.get(motion as usize) else {
            return;
        };
        match &m.kind {
            MotionKind::Clip(clip) => {
                self.evaluate_clip(target, m, clip, previous, current, contribution)
            }
            MotionKind::BlendTree(tree) => {
                self.evaluate_blend_tree(target, tree, params, previous, current, contribution)
            }
        }
    }

    fn evaluate_blend_tree(
        &self,
        target: &mut AnimationTarget,
        tree: &BlendTree,
        params: &[Variant],
        previous: f32,
        current: f32,
        contribution: Contribution,
    ) {
        let Some(range) = compute_blend_tree_weights(tree, params) else {
            return;
        };
        for (node_index, node_weight) in range.iter() {
            let weight = contribution.weight * node_weight;
            if weight < MIN_CONTRIBUTION_WEIGHT {
                continue;
            }
            let node = &tree.nodes[node_index];
            self.evaluate_motion(
                target,
                node.motion,
                params,
                previous * node.time_scale,
                current * node.time_scale,
                Contribution {
                    weight,
                    ..contribution
                },
            );
        }
    }

    fn evaluate_clip(
        &self,
        target: &mut AnimationTarget,
        motion: &Motion,
        clip: &MotionClip,
        previous: f32,
        current: f32,
        contribution: Contribution,
    ) {
        if clip.clip == 0 {
            return;
        }
        let Some(instance) = self
            .clip_instances
            .get(&instance_hash(clip.clip, target.skeleton_hash))
        else {
            return;
        };

        let keyframe = ClipKeyframe::new(
            current,
            motion.average_length,
            clip.frame_rate,
            clip.sample_count,
            motion.wrap_mode,
        );
        let mask_slot = self
            .mask_slots
            .get(&mask_instance_hash(contribution.mask_hash, target.skeleton_hash))
            .copied()
            .unwrap_or(0);

        let pass = target.command_count as usize;
        let command = AnimationCommand {
            left_keyframe: keyframe.left,
            right_keyframe: keyframe.right,
            keyframe_weight: keyframe.weight,
            weight: if pass == 0 { 1.0 } else { contribution.weight },
            blending_mode: contribution.blending_mode as i32,
            clip_sample_index: instance.block.begin as i32,
            skeleton_matrix_index: target.skeleton_matrix_index,
            additive_reference_index: instance.additive_reference_index(),
            skeleton_mask_index: mask_slot as i32,
        };
        if let Err(err) = self.commands.dispatch(pass, command) {
            self.dropped_commands.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "instance {:?}: dropped command for clip {:08X}: {err}",
                target.instance,
                clip.clip
            );
        }
        target.command_count += 1;

        if let Some(definition) = self.clips.get(&clip.clip) {
            self.emit_events(target, definition, motion.wrap_mode, motion.average_length, previous, current);
        }
    }

    fn emit_events(
        &self,
        target: &AnimationTarget,
        clip: &Clip,
        wrap_mode: WrapMode,
        length: f32,
        previous: f32,
        current: f32,
    ) {
        if clip.events.is_empty() || previous == current {
            return;
        }
        for event in &clip.events {
            if event_crossed(wrap_mode, length, previous, current, event.time) {
                self.events.push(
                    event.name,
                    EntityClipEvent {
                        instance: target.instance,
                        int_value: event.int_value,
                        float_value: event.float_value,
                    },
                );
            }
        }
    }
}

/// Half-open sweep: `(previous, current]` forwards, `[current, previous)`
/// backwards. A tick that ends on `t` owns it; the next one does not.
#[inline]
fn swept(previous: f32, current: f32, t: f32) -> bool {
    if previous > current {
        t >= current && t < previous
    } else {
        t > previous && t <= current
    }
}

/// Whether clip time `t` is crossed while state time moves from `previous`
/// to `current`. Looping clips compare modulo `length`. An event at 0 also
/// fires when the state is entered at exactly 0.
pub fn event_crossed(wrap_mode: WrapMode, length: f32, previous: f32, current: f32, t: f32) -> bool {
    if previous == current {
        return false;
    }
    if previous == 0.0 && t == 0.0 && current > 0.0 {
        return true;
    }
    if length <= 0.0 {
        return swept(previous, current, t);
    }
    match wrap_mode {
        WrapMode::Once => swept(
            previous.clamp(0.0, length),
            current.clamp(0.0, length),
            t,
        ),
        WrapMode::Loop => {
            let backwards = previous > current;
            let (lo, hi) = if backwards {
                (current, previous)
            } else {
                (previous, current)
            };
            if hi - lo >= length {
                return true;
            }
            let start = WrapMode::Loop.wrap(lo, length);
            let end = start + (hi - lo);
            let (from, to) = if backwards { (end, start) } else { (start, end) };
            swept(from, to, t) || swept(from, to, t + length)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looping_events_fire_across_the_wrap() {
        assert!(event_crossed(WrapMode::Loop, 1.0, 0.95, 1.05, 0.0));
        assert!(event_crossed(WrapMode::Loop, 1.0, 2.45, 2.55, 0.5));
        assert!(event_crossed(WrapMode::Loop, 1.0, 2.55, 2.45, 0.5));
        assert!(!event_crossed(WrapMode::Loop, 1.0, 2.55, 2.65, 0.5));
    }

    #[test]
    fn once_events_clamp_to_clip() {
        assert!(event_crossed(WrapMode::Once, 1.0, 0.9, 1.5, 1.0));
        assert!(!event_crossed(WrapMode::Once, 1.0, 1.2, 1.5, 0.5));
        // Parked at the end: no refire.
        assert!(!event_crossed(WrapMode::Once, 1.0, 1.0, 1.3, 1.0));
    }

    #[test]
    fn boundary_belongs_to_the_tick_that_reaches_it() {
        assert!(event_crossed(WrapMode::Loop, 1.0, 0.25, 0.5, 0.5));
        assert!(!event_crossed(WrapMode::Loop, 1.0, 0.5, 0.75, 0.5));
        // Loop seam: 1.0 and the next tick's 0 are the same instant.
        assert!(event_crossed(WrapMode::Loop, 1.0, 0.75, 1.0, 0.0));
        assert!(!event_crossed(WrapMode::Loop, 1.0, 1.0, 1.25, 0.0));
        // Backwards the lower end is owned.
        assert!(event_crossed(WrapMode::Loop, 1.0, -0.25, -0.5, 0.5));
        assert!(!event_crossed(WrapMode::Loop, 1.0, -0.5, -0.75, 0.5));
    }

    #[test]
    fn event_at_zero_fires_on_entry() {
        assert!(event_crossed(WrapMode::Once, 1.0, 0.0, 0.1, 0.0));
        assert!(event_crossed(WrapMode::Loop, 1.0, 0.0, 0.1, 0.0));
        assert!(!event_crossed(WrapMode::Loop, 1.0, 0.1, 0.2, 0.0));
    }
}
