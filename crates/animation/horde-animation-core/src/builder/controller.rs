//! Controller builder: flattens hierarchical state machines.
//!
//! Authoring controllers nest state machines and route transitions through
//! sub-machine entries and exits. The runtime only knows direct
//! state-to-state transitions, so every authoring transition is expanded
//! here into the concrete transitions it can resolve to:
//! - a transition to a sub-machine becomes one transition per entry
//!   transition of that machine, plus one to its default state;
//! - an exit becomes the parent's transitions registered for the exited
//!   machine (re-entering the root when there is no parent).
//!
//! Conditions along an expansion chain are AND-combined. Timing settings come
//! from the innermost transition of the chain that carries them.

use std::sync::Arc;

use glam::Vec2;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

use crate::definition::{
    AnimatorControllerDefinition, BlendTree, BlendTreeNode, BlendTreeType, BlendingMode, Clip,
    CompareOp, Condition, ControllerAsset, InterruptionSource, Layer, Motion, MotionClip,
    MotionKind, Parameter, ParameterFlags, ParameterType, SkeletonMaskDefinition, State,
    StateMachine, Transition, WrapMode,
};
use crate::error::BuildError;
use crate::hash::StringHash;
use crate::parameters::Variant;

/// Bound on nested entry/exit expansion, catching cyclic routing.
const MAX_EXPANSION_DEPTH: usize = 32;
const PARAMETER_STRIDE: u32 = 4;
const MIN_TIME_SCALE: f32 = 1e-4;

fn one() -> f32 {
    1.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterAuthoring {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParameterType,
    /// Interpreted according to `ty`; non-zero is true for bools.
    #[serde(default)]
    pub default: f32,
    /// Byte offset in the parameter record; packed at 4-byte stride when absent.
    #[serde(default)]
    pub offset: Option<u32>,
}

impl ParameterAuthoring {
    pub fn new(name: impl Into<String>, ty: ParameterType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: 0.0,
            offset: None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionMode {
    If,
    IfNot,
    Greater,
    Less,
    Equals,
    NotEqual,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConditionAuthoring {
    pub parameter: String,
    pub mode: ConditionMode,
    #[serde(default)]
    pub threshold: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionTarget {
    State(String),
    StateMachine(String),
    Exit,
}

/// Timing and interruption settings of a state transition.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionSettings {
    pub duration: f32,
    pub offset: f32,
    pub has_exit_time: bool,
    pub exit_time: f32,
    pub has_fixed_duration: bool,
    pub can_transition_to_self: bool,
    pub interruption_source: InterruptionSource,
    pub ordered_interruption: bool,
}

impl Default for TransitionSettings {
    fn default() -> Self {
        let t = Transition::default();
        Self {
            duration: t.duration,
            offset: t.offset,
            has_exit_time: t.has_exit_time,
            exit_time: t.exit_time,
            has_fixed_duration: t.has_fixed_duration,
            can_transition_to_self: t.can_transition_to_self,
            interruption_source: t.interruption_source,
            ordered_interruption: t.ordered_interruption,
        }
    }
}

/// Entry and sub-machine transitions usually carry no settings; state and
/// any-state transitions usually do.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionAuthoring {
    pub target: TransitionTarget,
    #[serde(default)]
    pub conditions: Vec<ConditionAuthoring>,
    #[serde(default)]
    pub settings: Option<TransitionSettings>,
    #[serde(default)]
    pub mute: bool,
}

impl TransitionAuthoring {
    pub fn to_state(name: impl Into<String>) -> Self {
        Self::new(TransitionTarget::State(name.into()))
    }

    pub fn to_state_machine(name: impl Into<String>) -> Self {
        Self::new(TransitionTarget::StateMachine(name.into()))
    }

    pub fn exit() -> Self {
        Self::new(TransitionTarget::Exit)
    }

    fn new(target: TransitionTarget) -> Self {
        Self {
            target,
            conditions: Vec::new(),
            settings: None,
            mute: false,
        }
    }

    pub fn when(mut self, parameter: impl Into<String>, mode: ConditionMode, threshold: f32) -> Self {
        self.conditions.push(ConditionAuthoring {
            parameter: parameter.into(),
            mode,
            threshold,
        });
        self
    }

    pub fn with_settings(mut self, settings: TransitionSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendTreeChildAuthoring {
    pub motion: MotionAuthoring,
    #[serde(default)]
    pub position: Vec2,
    #[serde(default = "one")]
    pub time_scale: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendTreeAuthoring {
    pub name: String,
    #[serde(default)]
    pub ty: BlendTreeType,
    pub parameter: String,
    #[serde(default)]
    pub parameter_y: Option<String>,
    pub children: Vec<BlendTreeChildAuthoring>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MotionAuthoring {
    /// Clip registered on the builder under this name.
    Clip(String),
    BlendTree(BlendTreeAuthoring),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateAuthoring {
    pub name: String,
    #[serde(default = "one")]
    pub speed: f32,
    #[serde(default)]
    pub speed_parameter: Option<String>,
    #[serde(default)]
    pub motion: Option<MotionAuthoring>,
    #[serde(default)]
    pub transitions: Vec<TransitionAuthoring>,
}

impl StateAuthoring {
    pub fn new(name: impl Into<String>, motion: Option<MotionAuthoring>) -> Self {
        Self {
            name: name.into(),
            speed: 1.0,
            speed_parameter: None,
            motion,
            transitions: Vec::new(),
        }
    }

    pub fn transition(mut self, transition: TransitionAuthoring) -> Self {
        self.transitions.push(transition);
        self
    }
}

/// Transitions leaving a child machine through its exit node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildMachineTransitions {
    pub state_machine: String,
    pub transitions: Vec<TransitionAuthoring>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMachineAuthoring {
    pub name: String,
    #[serde(default)]
    pub states: Vec<StateAuthoring>,
    #[serde(default)]
    pub state_machines: Vec<StateMachineAuthoring>,
    /// Falls back to the first own state.
    #[serde(default)]
    pub default_state: Option<String>,
    #[serde(default)]
    pub entry_transitions: Vec<TransitionAuthoring>,
    #[serde(default)]
    pub any_state_transitions: Vec<TransitionAuthoring>,
    #[serde(default)]
    pub state_machine_transitions: Vec<ChildMachineTransitions>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerAuthoring {
    pub name: String,
    #[serde(default)]
    pub blending_mode: BlendingMode,
    #[serde(default)]
    pub default_weight: f32,
    /// Mask registered on the builder under this name.
    #[serde(default)]
    pub mask: Option<String>,
    pub state_machine: StateMachineAuthoring,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControllerAuthoring {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterAuthoring>,
    pub layers: Vec<LayerAuthoring>,
    #[serde(default)]
    pub parameters_record_size: Option<u32>,
    #[serde(default)]
    pub parameters_type_hash: Option<u64>,
}

impl ControllerAuthoring {
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::invalid(e.to_string()))
    }
}

struct ParameterTable {
    parameters: Vec<Parameter>,
    index: HashMap<String, u16>,
}

impl ParameterTable {
    fn index(&self, name: &str) -> Result<u16, BuildError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| BuildError::UnknownParameter { name: name.to_owned() })
    }

    fn condition(&self, c: &ConditionAuthoring) -> Result<Condition, BuildError> {
        use ConditionMode::*;
        use ParameterType::{Bool, Float, Int, Trigger};

        let parameter = self.index(&c.parameter)?;
        let ty = self.parameters[parameter as usize].ty;
        let float = Variant::from_float(c.threshold);
        let int = Variant::from_int(c.threshold as i32);
        let (op, value) = match (c.mode, ty) {
            (If, Bool | Trigger) => (CompareOp::If, Variant::default()),
            (IfNot, Bool | Trigger) => (CompareOp::IfNot, Variant::default()),
            (Greater, Float) => (CompareOp::FloatGreater, float),
            (Greater, Int) => (CompareOp::IntGreater, int),
            (Less, Float) => (CompareOp::FloatLess, float),
            (Less, Int) => (CompareOp::IntLess, int),
            (Equals, Float) => (CompareOp::FloatEquals, float),
            (Equals, Int) => (CompareOp::IntEquals, int),
            (NotEqual, Float) => (CompareOp::FloatNotEqual, float),
            (NotEqual, Int) => (CompareOp::IntNotEqual, int),
            (mode, ty) => {
                return Err(BuildError::invalid(format!(
                    "condition {mode:?} cannot test {} parameter '{}'",
                    ty.name(),
                    c.parameter
                )))
            }
        };
        Ok(Condition {
            parameter,
            op,
            value,
        })
    }
}

/// Controller-wide motion pool. Clips are shared by content hash; blend trees
/// are stored before their children.
struct MotionPool<'c> {
    clips: &'c HashMap<String, Arc<Clip>>,
    motions: Vec<Motion>,
    clip_motions: HashMap<u32, u16>,
    used_clips: Vec<Arc<Clip>>,
}

impl<'c> MotionPool<'c> {
    fn reserve(&mut self, motion: Motion) -> Result<u16, BuildError> {
        let index = u16::try_from(self.motions.len())
            .map_err(|_| BuildError::invalid("more than 65535 motions"))?;
        self.motions.push(motion);
        Ok(index)
    }

    fn add(&mut self, motion: &MotionAuthoring, params: &ParameterTable) -> Result<u16, BuildError> {
        match motion {
            MotionAuthoring::Clip(name) => {
                let clip = self
                    .clips
                    .get(name)
                    .ok_or_else(|| BuildError::invalid(format!("unknown clip '{name}'")))?;
                if let Some(index) = self.clip_motions.get(&clip.hash()) {
                    return Ok(*index);
                }
                let index = self.reserve(Motion {
                    average_length: clip.length,
                    wrap_mode: clip.wrap_mode,
                    kind: MotionKind::Clip(MotionClip {
                        clip: clip.hash(),
                        frame_rate: clip.frame_rate,
                        sample_count: clip.sample_count(),
                    }),
                })?;
                self.clip_motions.insert(clip.hash(), index);
                self.used_clips.push(clip.clone());
                Ok(index)
            }
            MotionAuthoring::BlendTree(tree) => self.add_blend_tree(tree, params),
        }
    }

    fn add_blend_tree(&mut self, tree: &BlendTreeAuthoring, params: &ParameterTable) -> Result<u16, BuildError> {
        if tree.ty != BlendTreeType::Simple1D {
            return Err(BuildError::UnsupportedBlendTree {
                name: tree.name.clone(),
                reason: format!("{:?} blend trees are not evaluated", tree.ty),
            });
        }
        let horizontal_parameter = params.index(&tree.parameter)?;
        let vertical_parameter = tree
            .parameter_y
            .as_deref()
            .map(|p| params.index(p))
            .transpose()?;

        let index = self.reserve(Motion {
            average_length: 0.0,
            wrap_mode: WrapMode::Loop,
            kind: MotionKind::BlendTree(BlendTree {
                ty: tree.ty,
                horizontal_parameter,
                vertical_parameter,
                nodes: Vec::new(),
            }),
        })?;

        let mut nodes = Vec::with_capacity(tree.children.len());
        let mut total_length = 0.0;
        for child in &tree.children {
            let motion = self.add(&child.motion, params)?;
            let length = self.motions[motion as usize].average_length;
            total_length += if child.time_scale.abs() > MIN_TIME_SCALE {
                length / child.time_scale.abs()
            } else {
                length
            };
            nodes.push(BlendTreeNode {
                motion,
                position: child.position,
                time_scale: child.time_scale,
            });
        }
        nodes.sort_by(|a, b| a.position.x.total_cmp(&b.position.x));

        let slot = &mut self.motions[index as usize];
        if !nodes.is_empty() {
            slot.average_length = total_length / nodes.len() as f32;
        }
        if let MotionKind::BlendTree(bt) = &mut slot.kind {
            bt.nodes = nodes;
        }
        Ok(index)
    }
}

struct MachineInfo<'a> {
    authoring: &'a StateMachineAuthoring,
    parent: Option<usize>,
    children: Vec<usize>,
}

/// Flattening context of one layer.
struct LayerFlattener<'a, 'p> {
    layer: &'a str,
    params: &'p ParameterTable,
    machines: Vec<MachineInfo<'a>>,
    /// Flattened states with the machine declaring them.
    states: Vec<(usize, &'a StateAuthoring)>,
}

impl<'a, 'p> LayerFlattener<'a, 'p> {
    fn new(layer: &'a LayerAuthoring, params: &'p ParameterTable) -> Self {
        let mut flattener = Self {
            layer: &layer.name,
            params,
            machines: Vec::new(),
            states: Vec::new(),
        };
        flattener.collect(&layer.state_machine, None);
        flattener
    }

    /// Own states first, then child machines, depth first.
    fn collect(&mut self, machine: &'a StateMachineAuthoring, parent: Option<usize>) -> usize {
        let id = self.machines.len();
        self.machines.push(MachineInfo {
            authoring: machine,
            parent,
            children: Vec::new(),
        });
        self.states.extend(machine.states.iter().map(|s| (id, s)));
        for child in &machine.state_machines {
            let child_id = self.collect(child, Some(id));
            self.machines[id].children.push(child_id);
        }
        id
    }

    fn resolve_state(&self, machine: usize, name: &str) -> Result<u16, BuildError> {
        self.states
            .iter()
            .position(|(m, s)| *m == machine && s.name == name)
            .or_else(|| self.states.iter().position(|(_, s)| s.name == name))
            .map(|i| i as u16)
            .ok_or_else(|| BuildError::UnknownState {
                machine: self.machines[machine].authoring.name.clone(),
                name: name.to_owned(),
            })
    }

    fn resolve_machine(&self, machine: usize, name: &str) -> Result<usize, BuildError> {
        self.machines[machine]
            .children
            .iter()
            .copied()
            .find(|c| self.machines[*c].authoring.name == name)
            .or_else(|| self.machines.iter().position(|m| m.authoring.name == name))
            .ok_or_else(|| BuildError::UnknownStateMachine { name: name.to_owned() })
    }

    fn default_state(&self, machine: usize) -> Result<Option<u16>, BuildError> {
        match &self.machines[machine].authoring.default_state {
            Some(name) => self.resolve_state(machine, name).map(Some),
            None => Ok(self
                .states
                .iter()
                .position(|(m, _)| *m == machine)
                .map(|i| i as u16)),
        }
    }

    fn expand(
        &self,
        transition: &'a TransitionAuthoring,
        machine: usize,
        chain: &mut Vec<&'a TransitionAuthoring>,
        out: &mut Vec<Transition>,
    ) -> Result<(), BuildError> {
        if transition.mute {
            return Ok(());
        }
        if chain.len() >= MAX_EXPANSION_DEPTH {
            return Err(BuildError::invalid(format!(
                "layer '{}': transitions route through more than {MAX_EXPANSION_DEPTH} entries or exits",
                self.layer
            )));
        }
        chain.push(transition);
        let result = match &transition.target {
            TransitionTarget::State(name) => self
                .resolve_state(machine, name)
                .and_then(|d| self.make_transition(chain, d))
                .map(|t| out.push(t)),
            TransitionTarget::StateMachine(name) => self
                .resolve_machine(machine, name)
                .and_then(|target| self.enter(target, chain, out)),
            TransitionTarget::Exit => self.exit(machine, chain, out),
        };
        chain.pop();
        result
    }

    fn enter(
        &self,
        machine: usize,
        chain: &mut Vec<&'a TransitionAuthoring>,
        out: &mut Vec<Transition>,
    ) -> Result<(), BuildError> {
        let authoring: &'a StateMachineAuthoring = self.machines[machine].authoring;
        for entry in &authoring.entry_transitions {
            self.expand(entry, machine, chain, out)?;
        }
        if let Some(default) = self.default_state(machine)? {
            out.push(self.make_transition(chain, default)?);
        }
        Ok(())
    }

    fn exit(
        &self,
        machine: usize,
        chain: &mut Vec<&'a TransitionAuthoring>,
        out: &mut Vec<Transition>,
    ) -> Result<(), BuildError> {
        let Some(parent) = self.machines[machine].parent else {
            return self.enter(machine, chain, out);
        };
        let name = &self.machines[machine].authoring.name;
        let parent_authoring: &'a StateMachineAuthoring = self.machines[parent].authoring;
        for group in &parent_authoring.state_machine_transitions {
            if &group.state_machine != name {
                continue;
            }
            for transition in &group.transitions {
                self.expand(transition, parent, chain, out)?;
            }
        }
        Ok(())
    }

    fn make_transition(&self, chain: &[&'a TransitionAuthoring], destination: u16) -> Result<Transition, BuildError> {
        let settings = chain
            .iter()
            .rev()
            .find_map(|t| t.settings)
            .unwrap_or_default();
        let mut conditions = Vec::new();
        for transition in chain {
            for c in &transition.conditions {
                conditions.push(self.params.condition(c)?);
            }
        }
        Ok(Transition {
            destination,
            offset: settings.offset,
            duration: settings.duration,
            has_exit_time: settings.has_exit_time,
            exit_time: settings.exit_time,
            has_fixed_duration: settings.has_fixed_duration,
            can_transition_to_self: settings.can_transition_to_self,
            interruption_source: settings.interruption_source,
            ordered_interruption: settings.ordered_interruption,
            conditions,
        })
    }

    fn build(&self, motions: &mut MotionPool<'_>) -> Result<StateMachine, BuildError> {
        let max = usize::from(u16::MAX);
        if self.states.len() > max {
            return Err(BuildError::TooManyStates {
                layer: self.layer.to_owned(),
                count: self.states.len(),
                max,
            });
        }

        let mut chain = Vec::new();
        let mut states = Vec::with_capacity(self.states.len());
        for (machine, state) in &self.states {
            let motion = state
                .motion
                .as_ref()
                .map(|m| motions.add(m, self.params))
                .transpose()?;
            let speed_parameter = state
                .speed_parameter
                .as_deref()
                .map(|p| self.params.index(p))
                .transpose()?;
            let mut transitions = Vec::new();
            for transition in &state.transitions {
                self.expand(transition, *machine, &mut chain, &mut transitions)?;
            }
            states.push(State {
                name: StringHash::new(&state.name),
                speed: state.speed,
                speed_parameter,
                motion,
                transitions,
            });
        }

        let mut global_transitions = Vec::new();
        for (id, machine) in self.machines.iter().enumerate() {
            let authoring: &'a StateMachineAuthoring = machine.authoring;
            for transition in &authoring.any_state_transitions {
                self.expand(transition, id, &mut chain, &mut global_transitions)?;
            }
        }

        let initial_state = self.default_state(0)?.ok_or_else(|| {
            BuildError::invalid(format!("layer '{}' has no states", self.layer))
        })?;
        Ok(StateMachine {
            states,
            global_transitions,
            initial_state,
        })
    }
}

/// Builds a [`ControllerAsset`] from [`ControllerAuthoring`] plus the clips
/// and masks it names.
#[derive(Clone, Debug)]
pub struct ControllerBuilder {
    authoring: ControllerAuthoring,
    clips: HashMap<String, Arc<Clip>>,
    masks: HashMap<String, Arc<SkeletonMaskDefinition>>,
}

impl ControllerBuilder {
    pub fn new(authoring: ControllerAuthoring) -> Self {
        Self {
            authoring,
            clips: HashMap::new(),
            masks: HashMap::new(),
        }
    }

    pub fn clip(mut self, name: impl Into<String>, clip: Arc<Clip>) -> Self {
        self.clips.insert(name.into(), clip);
        self
    }

    pub fn mask(mut self, name: impl Into<String>, mask: Arc<SkeletonMaskDefinition>) -> Self {
        self.masks.insert(name.into(), mask);
        self
    }

    fn parameters(&self) -> Result<(ParameterTable, u32, u64), BuildError> {
        let mut parameters = Vec::with_capacity(self.authoring.parameters.len());
        let mut index = HashMap::with_capacity(self.authoring.parameters.len());
        let mut next_offset = 0u32;
        let mut layout = Vec::new();

        for (i, p) in self.authoring.parameters.iter().enumerate() {
            let i = u16::try_from(i).map_err(|_| BuildError::invalid("more than 65535 parameters"))?;
            if index.insert(p.name.clone(), i).is_some() {
                return Err(BuildError::invalid(format!("duplicate parameter '{}'", p.name)));
            }
            let offset = p.offset.unwrap_or(next_offset);
            let end = offset + p.ty.byte_size();
            next_offset = next_offset.max(end.div_ceil(PARAMETER_STRIDE) * PARAMETER_STRIDE);

            let (flags, default_value) = match p.ty {
                ParameterType::Float => (ParameterFlags::empty(), Variant::from_float(p.default)),
                ParameterType::Int => (ParameterFlags::empty(), Variant::from_int(p.default as i32)),
                ParameterType::Bool => (ParameterFlags::empty(), Variant::from_bool(p.default != 0.0)),
                ParameterType::Trigger => (ParameterFlags::AUTO_RELEASE, Variant::default()),
            };
            parameters.push(Parameter {
                name: StringHash::new(&p.name),
                ty: p.ty,
                flags,
                offset,
                default_value,
            });

            layout.extend_from_slice(p.name.as_bytes());
            layout.push(0);
            layout.push(p.ty as u8);
        }

        let record_size = self.authoring.parameters_record_size.unwrap_or(next_offset);
        let type_hash = self
            .authoring
            .parameters_type_hash
            .unwrap_or_else(|| xxh3_64(&layout));
        Ok((ParameterTable { parameters, index }, record_size, type_hash))
    }

    pub fn build(&self) -> Result<ControllerAsset, BuildError> {
        let (params, record_size, type_hash) = self.parameters()?;
        let mut motions = MotionPool {
            clips: &self.clips,
            motions: Vec::new(),
            clip_motions: HashMap::new(),
            used_clips: Vec::new(),
        };

        let mut layers = Vec::with_capacity(self.authoring.layers.len());
        let mut used_masks = Vec::new();
        for layer in &self.authoring.layers {
            let skeleton_mask = match &layer.mask {
                None => 0,
                Some(name) => {
                    let mask = self
                        .masks
                        .get(name)
                        .ok_or_else(|| BuildError::invalid(format!("unknown skeleton mask '{name}'")))?;
                    used_masks.push(mask.clone());
                    mask.hash()
                }
            };
            let state_machine = LayerFlattener::new(layer, &params).build(&mut motions)?;
            layers.push(Layer {
                name: StringHash::new(&layer.name),
                blending_mode: layer.blending_mode,
                default_weight: layer.default_weight,
                skeleton_mask,
                state_machine,
            });
        }

        let definition = AnimatorControllerDefinition::new(
            StringHash::new(&self.authoring.name),
            params.parameters,
            layers,
            motions.motions,
            record_size,
            type_hash,
        );
        let asset = ControllerAsset::new(definition, motions.used_clips, used_masks);
        asset.validate()?;
        Ok(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(duration: f32) -> TransitionSettings {
        TransitionSettings {
            duration,
            ..Default::default()
        }
    }

    fn layer(machine: StateMachineAuthoring) -> LayerAuthoring {
        LayerAuthoring {
            name: "base".into(),
            blending_mode: BlendingMode::Override,
            default_weight: 1.0,
            mask: None,
            state_machine: machine,
        }
    }

    #[test]
    fn parameters_pack_at_four_byte_stride() {
        let authoring = ControllerAuthoring {
            name: "c".into(),
            parameters: vec![
                ParameterAuthoring::new("speed", ParameterType::Float),
                ParameterAuthoring::new("grounded", ParameterType::Bool),
                ParameterAuthoring::new("jump", ParameterType::Trigger),
            ],
            layers: vec![layer(StateMachineAuthoring {
                name: "root".into(),
                states: vec![StateAuthoring::new("idle", None)],
                ..Default::default()
            })],
            parameters_record_size: None,
            parameters_type_hash: None,
        };
        let asset = ControllerBuilder::new(authoring).build().unwrap();
        let def = &asset.definition;
        let offsets: Vec<u32> = def.parameters.iter().map(|p| p.offset).collect();
        assert_eq!(offsets, vec![0, 4, 8]);
        assert_eq!(def.parameters_record_size, 12);
        assert_eq!(def.trigger_parameters, vec![2]);
        assert_ne!(def.parameters_type_hash, 0);
    }

    #[test]
    fn sub_machine_transition_expands_entries_and_default() {
        let sub = StateMachineAuthoring {
            name: "combat".into(),
            states: vec![
                StateAuthoring::new("guard", None),
                StateAuthoring::new("attack", None)
                    .transition(TransitionAuthoring::exit().with_settings(settings(0.1))),
            ],
            default_state: Some("guard".into()),
            entry_transitions: vec![TransitionAuthoring::to_state("attack").when(
                "aggressive",
                ConditionMode::If,
                0.0,
            )],
            ..Default::default()
        };
        let root = StateMachineAuthoring {
            name: "root".into(),
            states: vec![StateAuthoring::new("idle", None).transition(
                TransitionAuthoring::to_state_machine("combat")
                    .when("alert", ConditionMode::If, 0.0)
                    .with_settings(settings(0.2)),
            )],
            state_machines: vec![sub],
            state_machine_transitions: vec![ChildMachineTransitions {
                state_machine: "combat".into(),
                transitions: vec![TransitionAuthoring::to_state("idle")],
            }],
            ..Default::default()
        };
        let authoring = ControllerAuthoring {
            name: "c".into(),
            parameters: vec![
                ParameterAuthoring::new("alert", ParameterType::Bool),
                ParameterAuthoring::new("aggressive", ParameterType::Bool),
            ],
            layers: vec![layer(root)],
            parameters_record_size: None,
            parameters_type_hash: None,
        };
        let asset = ControllerBuilder::new(authoring).build().unwrap();
        let sm = &asset.definition.layers[0].state_machine;

        // idle, guard, attack
        assert_eq!(sm.states.len(), 3);
        let idle = &sm.states[0];
        assert_eq!(idle.transitions.len(), 2);
        assert_eq!(idle.transitions[0].destination, 2);
        assert_eq!(idle.transitions[0].conditions.len(), 2);
        assert_eq!(idle.transitions[1].destination, 1);
        assert_eq!(idle.transitions[1].conditions.len(), 1);
        assert_eq!(idle.transitions[1].duration, 0.2);

        // attack --exit--> parent's transitions for combat --> idle
        let attack = &sm.states[2];
        assert_eq!(attack.transitions.len(), 1);
        assert_eq!(attack.transitions[0].destination, 0);
        assert_eq!(attack.transitions[0].duration, 0.1);
    }

    #[test]
    fn two_dimensional_trees_are_rejected() {
        let authoring = ControllerAuthoring {
            name: "c".into(),
            parameters: vec![
                ParameterAuthoring::new("x", ParameterType::Float),
                ParameterAuthoring::new("y", ParameterType::Float),
            ],
            layers: vec![layer(StateMachineAuthoring {
                name: "root".into(),
                states: vec![StateAuthoring::new(
                    "move",
                    Some(MotionAuthoring::BlendTree(BlendTreeAuthoring {
                        name: "locomotion".into(),
                        ty: BlendTreeType::SimpleDirectional2D,
                        parameter: "x".into(),
                        parameter_y: Some("y".into()),
                        children: Vec::new(),
                    })),
                )],
                ..Default::default()
            })],
            parameters_record_size: None,
            parameters_type_hash: None,
        };
        let err = ControllerBuilder::new(authoring).build().unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedBlendTree { .. }));
    }

    #[test]
    fn unknown_state_is_reported() {
        let authoring = ControllerAuthoring {
            name: "c".into(),
            parameters: Vec::new(),
            layers: vec![layer(StateMachineAuthoring {
                name: "root".into(),
                states: vec![StateAuthoring::new("idle", None)
                    .transition(TransitionAuthoring::to_state("nowhere"))],
                ..Default::default()
            })],
            parameters_record_size: None,
            parameters_type_hash: None,
        };
        let err = ControllerBuilder::new(authoring).build().unwrap_err();
        assert_eq!(
            err,
            BuildError::UnknownState {
                machine: "root".into(),
                name: "nowhere".into()
            }
        );
    }
}
