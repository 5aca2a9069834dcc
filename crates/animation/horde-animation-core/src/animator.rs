//! Per-instance animator tick: advance every layer, then emit the commands of
//! the current and destination states weighted by transition progress.

use crate::context::{AnimationContext, AnimationTarget, Contribution, MIN_CONTRIBUTION_WEIGHT};
use crate::definition::AnimatorControllerDefinition;
use crate::evaluate::{transition_progress, update_layer};
use crate::layer_state::LayerState;
use crate::parameters::{read_parameters, release_triggers, ParameterRecord, ParameterValues};

/// Advance `layers` by `dt` and dispatch the resulting sampling commands.
///
/// Time intervals passed to the context are the state times before and after
/// the layer update. A state entered this tick samples from its entry time.
pub fn update_animator(
    controller: &AnimatorControllerDefinition,
    layers: &mut [LayerState],
    record: &mut ParameterRecord,
    context: &AnimationContext<'_>,
    target: &mut AnimationTarget,
    params: &mut ParameterValues,
    dt: f32,
) {
    read_parameters(controller, record, params);
    let motions = controller.motions.as_slice();

    for (layer, state) in controller.layers.iter().zip(layers.iter_mut()) {
        let previous_current = state.current_time;
        let previous_destination = state.destination_time;

        update_layer(state, layer, motions, params, dt);

        let current_previous = if state.current_state_changed() {
            state.current_time
        } else {
            previous_current
        };
        let destination_previous = if state.destination_state_changed() {
            state.destination_time
        } else {
            previous_destination
        };

        let weight = state.weight();
        if weight < MIN_CONTRIBUTION_WEIGHT {
            continue;
        }

        let machine = &layer.state_machine;
        let progress = if state.in_transition() {
            transition_progress(state, machine, motions)
        } else {
            0.0
        };
        let contribution = |w: f32| Contribution {
            weight: w,
            blending_mode: layer.blending_mode,
            mask_hash: layer.skeleton_mask,
        };

        let current_weight = (1.0 - progress) * weight;
        if current_weight >= MIN_CONTRIBUTION_WEIGHT {
            if let Some(motion) = machine.states[state.current_state as usize].motion {
                context.evaluate_motion(
                    target,
                    motion,
                    params,
                    current_previous,
                    state.current_time,
                    contribution(current_weight),
                );
            }
        }

        let destination_weight = progress * weight;
        if state.in_transition() && destination_weight >= MIN_CONTRIBUTION_WEIGHT {
            if let Some(motion) = machine.states[state.destination_state as usize].motion {
                context.evaluate_motion(
                    target,
                    motion,
                    params,
                    destination_previous,
                    state.destination_time,
                    contribution(destination_weight),
                );
            }
        }
    }

    release_triggers(controller, record);
}
