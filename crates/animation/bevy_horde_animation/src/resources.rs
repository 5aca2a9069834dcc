use bevy::prelude::*;
use hashbrown::HashMap;
use horde_animation_core::{FrameOutputs, InstanceId};

/// Fixed timestep configuration (seconds per tick).
#[derive(Resource)]
pub struct FixedDt(pub f32);

impl Default for FixedDt {
    fn default() -> Self {
        Self(1.0 / 60.0)
    }
}

/// Two-way map between entities and engine instances.
#[derive(Resource, Default, Debug)]
pub struct InstanceIndex {
    by_entity: HashMap<Entity, InstanceId>,
    by_instance: HashMap<InstanceId, Entity>,
}

impl InstanceIndex {
    pub fn insert(&mut self, entity: Entity, id: InstanceId) {
        self.by_entity.insert(entity, id);
        self.by_instance.insert(id, entity);
    }

    pub fn remove(&mut self, entity: Entity) -> Option<InstanceId> {
        let id = self.by_entity.remove(&entity)?;
        self.by_instance.remove(&id);
        Some(id)
    }

    pub fn instance(&self, entity: Entity) -> Option<InstanceId> {
        self.by_entity.get(&entity).copied()
    }

    pub fn entity(&self, id: InstanceId) -> Option<Entity> {
        self.by_instance.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.by_entity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_entity.is_empty()
    }
}

/// Copy of the last tick's outputs for the dispatch stage.
#[derive(Resource, Default, Debug)]
pub struct PublishedFrame {
    pub frame: FrameOutputs,
    pub tick: u64,
}
