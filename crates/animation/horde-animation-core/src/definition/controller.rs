//! Flattened animator controller.
//!
//! Hierarchical authoring graphs are resolved by the builder into one flat
//! state array per layer with direct state-to-state transitions. All
//! cross-references are indices; `validate` checks each of them so the
//! evaluation path can index without further checks.

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{check_hash, WrapMode};
use crate::error::{CoreError, CoreResult};
use crate::hash::{ContentHasher, StringHash};
use crate::parameters::Variant;

const KIND: &str = "animator controller";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterType {
    Float,
    Int,
    Bool,
    Trigger,
}

impl ParameterType {
    pub fn name(self) -> &'static str {
        match self {
            ParameterType::Float => "float",
            ParameterType::Int => "int",
            ParameterType::Bool => "bool",
            ParameterType::Trigger => "trigger",
        }
    }

    /// Bytes occupied in the parameter record.
    pub fn byte_size(self) -> u32 {
        match self {
            ParameterType::Float | ParameterType::Int => 4,
            ParameterType::Bool | ParameterType::Trigger => 1,
        }
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ParameterFlags: u8 {
        /// Reset to false at the end of every tick.
        const AUTO_RELEASE = 1 << 0;
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: StringHash,
    pub ty: ParameterType,
    #[serde(default)]
    pub flags: ParameterFlags,
    /// Byte offset into the instance parameter record.
    pub offset: u32,
    #[serde(default)]
    pub default_value: Variant,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum BlendingMode {
    #[default]
    Override = 0,
    Additive = 1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    If,
    IfNot,
    IntGreater,
    IntLess,
    IntEquals,
    IntNotEqual,
    IntGreaterOrEqual,
    IntLessOrEqual,
    FloatGreater,
    FloatLess,
    FloatEquals,
    FloatNotEqual,
    FloatGreaterOrEqual,
    FloatLessOrEqual,
    Trigger,
}

impl CompareOp {
    /// Whether this operator reads a parameter of type `ty`.
    pub fn accepts(self, ty: ParameterType) -> bool {
        use CompareOp::*;
        match self {
            If | IfNot | Trigger => matches!(ty, ParameterType::Bool | ParameterType::Trigger),
            IntGreater | IntLess | IntEquals | IntNotEqual | IntGreaterOrEqual
            | IntLessOrEqual => ty == ParameterType::Int,
            FloatGreater | FloatLess | FloatEquals | FloatNotEqual | FloatGreaterOrEqual
            | FloatLessOrEqual => ty == ParameterType::Float,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub parameter: u16,
    pub op: CompareOp,
    #[serde(default)]
    pub value: Variant,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterruptionSource {
    #[default]
    None,
    Source,
    Destination,
    SourceThenDestination,
    DestinationThenSource,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub destination: u16,
    /// Normalized entry point into the destination motion.
    pub offset: f32,
    /// Seconds.
    pub duration: f32,
    pub has_exit_time: bool,
    /// Normalized exit time; values >= 1 require the unwrapped time to cross.
    pub exit_time: f32,
    pub has_fixed_duration: bool,
    pub can_transition_to_self: bool,
    pub interruption_source: InterruptionSource,
    pub ordered_interruption: bool,
    pub conditions: Vec<Condition>,
}

impl Default for Transition {
    fn default() -> Self {
        Self {
            destination: 0,
            offset: 0.0,
            duration: 0.0,
            has_exit_time: false,
            exit_time: 0.0,
            has_fixed_duration: true,
            can_transition_to_self: false,
            interruption_source: InterruptionSource::None,
            ordered_interruption: true,
            conditions: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub name: StringHash,
    pub speed: f32,
    /// Float parameter scaling `speed`.
    pub speed_parameter: Option<u16>,
    pub motion: Option<u16>,
    pub transitions: Vec<Transition>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMachine {
    pub states: Vec<State>,
    /// Any-state transitions, evaluated before the current state's own.
    pub global_transitions: Vec<Transition>,
    pub initial_state: u16,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: StringHash,
    pub blending_mode: BlendingMode,
    pub default_weight: f32,
    /// Content hash of the layer's skeleton mask, 0 for none.
    pub skeleton_mask: u32,
    pub state_machine: StateMachine,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionClip {
    /// Content hash of the clip, 0 for an empty slot.
    pub clip: u32,
    pub frame_rate: f32,
    pub sample_count: u32,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendTreeType {
    #[default]
    Simple1D,
    /// Declared but never evaluated.
    SimpleDirectional2D,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendTreeNode {
    pub motion: u16,
    pub position: Vec2,
    pub time_scale: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendTree {
    pub ty: BlendTreeType,
    pub horizontal_parameter: u16,
    pub vertical_parameter: Option<u16>,
    /// Sorted by `position.x` for 1D trees.
    pub nodes: Vec<BlendTreeNode>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MotionKind {
    Clip(MotionClip),
    BlendTree(BlendTree),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Motion {
    pub average_length: f32,
    pub wrap_mode: WrapMode,
    pub kind: MotionKind,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimatorControllerDefinition {
    pub name: StringHash,
    pub parameters: Vec<Parameter>,
    /// Indices of AUTO_RELEASE parameters.
    pub trigger_parameters: Vec<u16>,
    pub layers: Vec<Layer>,
    pub motions: Vec<Motion>,
    pub parameters_record_size: u32,
    /// Stable identifier of the parameter record layout.
    pub parameters_type_hash: u64,
    #[serde(skip)]
    hash: u32,
}

impl AnimatorControllerDefinition {
    pub fn new(
        name: StringHash,
        parameters: Vec<Parameter>,
        layers: Vec<Layer>,
        motions: Vec<Motion>,
        parameters_record_size: u32,
        parameters_type_hash: u64,
    ) -> Self {
        let trigger_parameters = parameters
            .iter()
            .enumerate()
            .filter(|(_, p)| p.flags.contains(ParameterFlags::AUTO_RELEASE))
            .map(|(i, _)| i as u16)
            .collect();
        let mut controller = Self {
            name,
            parameters,
            trigger_parameters,
            layers,
            motions,
            parameters_record_size,
            parameters_type_hash,
            hash: 0,
        };
        controller.finalize();
        controller
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut controller: Self = serde_json::from_str(json)?;
        controller.finalize();
        Ok(controller)
    }

    /// Apply the base-layer weight floor and recompute the content hash.
    pub fn finalize(&mut self) -> u32 {
        if let Some(base) = self.layers.first_mut() {
            base.default_weight = base.default_weight.max(1.0);
        }
        self.rehash()
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn rehash(&mut self) -> u32 {
        self.hash = self.compute_hash();
        self.hash
    }

    pub fn parameter_index(&self, name: StringHash) -> Option<usize> {
        self.parameters.iter().position(|p| p.name == name)
    }

    /// Content hashes of every clip referenced by the motion pool.
    pub fn clip_hashes(&self) -> impl Iterator<Item = u32> + '_ {
        self.motions.iter().filter_map(|m| match &m.kind {
            MotionKind::Clip(c) if c.clip != 0 => Some(c.clip),
            _ => None,
        })
    }

    /// Distinct non-zero skeleton mask hashes used by the layers.
    pub fn mask_hashes(&self) -> Vec<u32> {
        let mut masks: Vec<u32> = self
            .layers
            .iter()
            .map(|l| l.skeleton_mask)
            .filter(|m| *m != 0)
            .collect();
        masks.sort_unstable();
        masks.dedup();
        masks
    }

    pub fn compute_hash(&self) -> u32 {
        let mut h = ContentHasher::default();
        h.write_bytes(&self.parameters_type_hash.to_le_bytes())
            .write_u32(self.parameters_record_size);

        h.write_u32(self.parameters.len() as u32);
        for p in &self.parameters {
            h.write_pod(&p.name)
                .write_u32(p.ty as u32)
                .write_bytes(&[p.flags.bits()])
                .write_u32(p.offset)
                .write_pod(&p.default_value);
        }

        h.write_u32(self.layers.len() as u32);
        for layer in &self.layers {
            h.write_pod(&layer.name)
                .write_i32(layer.blending_mode as i32)
                .write_f32(layer.default_weight)
                .write_u32(layer.skeleton_mask);
            let sm = &layer.state_machine;
            h.write_u32(sm.initial_state as u32);
            h.write_u32(sm.states.len() as u32);
            for state in &sm.states {
                h.write_pod(&state.name)
                    .write_f32(state.speed)
                    .write_i32(state.speed_parameter.map_or(-1, i32::from))
                    .write_i32(state.motion.map_or(-1, i32::from));
                hash_transitions(&mut h, &state.transitions);
            }
            hash_transitions(&mut h, &sm.global_transitions);
        }

        h.write_u32(self.motions.len() as u32);
        for motion in &self.motions {
            h.write_f32(motion.average_length)
                .write_u32(motion.wrap_mode as u32);
            match &motion.kind {
                MotionKind::Clip(c) => {
                    h.write_u32(0)
                        .write_u32(c.clip)
                        .write_f32(c.frame_rate)
                        .write_u32(c.sample_count);
                }
                MotionKind::BlendTree(tree) => {
                    h.write_u32(1)
                        .write_u32(tree.ty as u32)
                        .write_u32(tree.horizontal_parameter as u32)
                        .write_i32(tree.vertical_parameter.map_or(-1, i32::from));
                    h.write_u32(tree.nodes.len() as u32);
                    for n in &tree.nodes {
                        h.write_u32(n.motion as u32)
                            .write_pod(&n.position)
                            .write_f32(n.time_scale);
                    }
                }
            }
        }
        h.finish()
    }

    pub fn validate(&self) -> CoreResult<()> {
        let param_count = self.parameters.len();
        for p in &self.parameters {
            if p.offset + p.ty.byte_size() > self.parameters_record_size {
                return Err(CoreError::invalid(
                    KIND,
                    format!(
                        "parameter {} at offset {} overruns the {}-byte record",
                        p.name, p.offset, self.parameters_record_size
                    ),
                ));
            }
        }
        for &t in &self.trigger_parameters {
            if t as usize >= param_count {
                return Err(CoreError::invalid(
                    KIND,
                    format!("trigger parameter index {t} out of range"),
                ));
            }
        }

        if self.layers.is_empty() {
            return Err(CoreError::invalid(KIND, "controller has no layers"));
        }
        for (li, layer) in self.layers.iter().enumerate() {
            self.validate_state_machine(li, &layer.state_machine)?;
        }
        for (mi, motion) in self.motions.iter().enumerate() {
            self.validate_motion(mi, motion)?;
        }
        check_hash(KIND, self.hash, self.compute_hash())
    }

    fn validate_state_machine(&self, layer: usize, sm: &StateMachine) -> CoreResult<()> {
        let n = sm.states.len();
        if n == 0 {
            return Err(CoreError::invalid(KIND, format!("layer {layer} has no states")));
        }
        if sm.initial_state as usize >= n {
            return Err(CoreError::invalid(
                KIND,
                format!("layer {layer} initial state {} out of range", sm.initial_state),
            ));
        }
        for (si, state) in sm.states.iter().enumerate() {
            if let Some(m) = state.motion {
                if m as usize >= self.motions.len() {
                    return Err(CoreError::invalid(
                        KIND,
                        format!("layer {layer} state {si} motion {m} out of range"),
                    ));
                }
            }
            if let Some(p) = state.speed_parameter {
                self.expect_parameter(p, ParameterType::Float, "speed multiplier")?;
            }
            for t in &state.transitions {
                self.validate_transition(layer, n, t)?;
            }
        }
        for t in &sm.global_transitions {
            self.validate_transition(layer, n, t)?;
        }
        Ok(())
    }

    fn validate_transition(&self, layer: usize, states: usize, t: &Transition) -> CoreResult<()> {
        if t.destination as usize >= states {
            return Err(CoreError::invalid(
                KIND,
                format!("layer {layer} transition to state {} out of range", t.destination),
            ));
        }
        for c in &t.conditions {
            let Some(p) = self.parameters.get(c.parameter as usize) else {
                return Err(CoreError::invalid(
                    KIND,
                    format!("condition parameter {} out of range", c.parameter),
                ));
            };
            if !c.op.accepts(p.ty) {
                return Err(CoreError::invalid(
                    KIND,
                    format!("condition {:?} cannot compare {} parameter {}", c.op, p.ty.name(), p.name),
                ));
            }
        }
        Ok(())
    }

    fn validate_motion(&self, index: usize, motion: &Motion) -> CoreResult<()> {
        let MotionKind::BlendTree(tree) = &motion.kind else {
            return Ok(());
        };
        if tree.ty != BlendTreeType::Simple1D {
            return Err(CoreError::invalid(
                KIND,
                format!("motion {index}: {:?} blend trees are not supported", tree.ty),
            ));
        }
        self.expect_parameter(tree.horizontal_parameter, ParameterType::Float, "blend")?;
        if tree
            .nodes
            .windows(2)
            .any(|w| w[0].position.x > w[1].position.x)
        {
            return Err(CoreError::invalid(
                KIND,
                format!("motion {index}: blend tree nodes are not sorted by position"),
            ));
        }
        for node in &tree.nodes {
            if node.motion as usize >= self.motions.len() {
                return Err(CoreError::invalid(
                    KIND,
                    format!("motion {index}: child motion {} out of range", node.motion),
                ));
            }
        }
        // Blend tree nesting must terminate.
        let mut stack = vec![(index, 0usize)];
        while let Some((m, depth)) = stack.pop() {
            if depth > self.motions.len() {
                return Err(CoreError::invalid(
                    KIND,
                    format!("motion {index}: blend tree references itself"),
                ));
            }
            if let MotionKind::BlendTree(t) = &self.motions[m].kind {
                stack.extend(t.nodes.iter().map(|n| (n.motion as usize, depth + 1)));
            }
        }
        Ok(())
    }

    fn expect_parameter(&self, index: u16, ty: ParameterType, role: &str) -> CoreResult<()> {
        match self.parameters.get(index as usize) {
            Some(p) if p.ty == ty => Ok(()),
            Some(p) => Err(CoreError::invalid(
                KIND,
                format!("{role} parameter {} must be {}, found {}", p.name, ty.name(), p.ty.name()),
            )),
            None => Err(CoreError::invalid(
                KIND,
                format!("{role} parameter index {index} out of range"),
            )),
        }
    }
}

fn hash_transitions(h: &mut ContentHasher, transitions: &[Transition]) {
    h.write_u32(transitions.len() as u32);
    for t in transitions {
        h.write_u32(t.destination as u32)
            .write_f32(t.offset)
            .write_f32(t.duration)
            .write_bool(t.has_exit_time)
            .write_f32(t.exit_time)
            .write_bool(t.has_fixed_duration)
            .write_bool(t.can_transition_to_self)
            .write_u32(t.interruption_source as u32)
            .write_bool(t.ordered_interruption);
        h.write_u32(t.conditions.len() as u32);
        for c in &t.conditions {
            h.write_u32(c.parameter as u32)
                .write_u32(c.op as u32)
                .write_pod(&c.value);
        }
    }
}
