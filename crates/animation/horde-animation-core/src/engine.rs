//! Engine: instance lifecycle, definition residency and the per-tick update.
//!
//! Methods:
//! - spawn/despawn, attach/detach of skeletons, animators and skinned meshes
//! - parameter and layer access
//! - update (evaluate batches → pack commands → drain events → publish batches)

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::animator::update_animator;
use crate::config::Config;
use crate::context::{AnimationContext, AnimationTarget, ClipEventQueue};
use crate::definition::{ControllerAsset, SkeletonDefinition, SkinnedMeshDefinition};
use crate::error::{CoreError, CoreResult};
use crate::hash::instance_hash;
use crate::heap::{HeapAllocator, HeapBlock};
use crate::ids::{IdAllocator, InstanceId};
use crate::layer_state::LayerState;
use crate::managers::{
    AnimationCommandBufferManager, ClipBufferManager, ClipInstance, SkeletonBufferManager,
    SkeletonInstanceBatch, SkinnedMeshBatch, SkinnedMeshInstance, SkinningBufferManager,
};
use crate::outputs::FrameOutputs;
use crate::parameters::{ParameterRecord, ParameterValues, ParametersMut};
use crate::refcount::RefCounts;

const MATRIX_HEAP_ALIGNMENT: u32 = 1;

/// Instances sharing a skeleton and a controller are evaluated together.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchKey {
    pub skeleton_hash: u32,
    pub controller_hash: u32,
}

#[derive(Debug)]
struct AnimatorMember {
    id: InstanceId,
    layer_states: Vec<LayerState>,
    record: ParameterRecord,
    skeleton_matrix_index: i32,
}

#[derive(Debug)]
struct AnimatorBatch {
    key: BatchKey,
    asset: Arc<ControllerAsset>,
    members: Vec<AnimatorMember>,
    index: HashMap<InstanceId, usize>,
}

impl AnimatorBatch {
    fn new(key: BatchKey, asset: Arc<ControllerAsset>) -> Self {
        Self {
            key,
            asset,
            members: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn insert(&mut self, member: AnimatorMember) {
        self.index.insert(member.id, self.members.len());
        self.members.push(member);
    }

    fn remove(&mut self, id: InstanceId) -> Option<AnimatorMember> {
        let slot = self.index.remove(&id)?;
        let member = self.members.swap_remove(slot);
        if let Some(moved) = self.members.get(slot) {
            self.index.insert(moved.id, slot);
        }
        Some(member)
    }

    fn member_mut(&mut self, id: InstanceId) -> Option<&mut AnimatorMember> {
        let slot = *self.index.get(&id)?;
        self.members.get_mut(slot)
    }
}

#[derive(Debug)]
struct SkeletonSlot {
    skeleton: Arc<SkeletonDefinition>,
    block: HeapBlock,
}

#[derive(Debug)]
struct MeshSlot {
    mesh: Arc<SkinnedMeshDefinition>,
    block: HeapBlock,
}

#[derive(Debug, Default)]
struct Instance {
    skeleton: Option<SkeletonSlot>,
    animator: Option<BatchKey>,
    meshes: SmallVec<[MeshSlot; 2]>,
}

/// State shared read-only by every batch during a tick.
struct TickShared<'a> {
    clip_instances: &'a HashMap<u32, ClipInstance>,
    mask_slots: &'a HashMap<u32, u32>,
    command_buffers: &'a AnimationCommandBufferManager,
    events: &'a ClipEventQueue,
    dropped_commands: &'a AtomicU32,
}

fn evaluate_batch(batch: &mut AnimatorBatch, shared: &TickShared<'_>, dt: f32) {
    let skeleton_hash = batch.key.skeleton_hash;
    let Some(commands) = shared.command_buffers.command_list(skeleton_hash) else {
        log::warn!("no command list for skeleton {skeleton_hash:08X}; batch skipped");
        return;
    };
    let asset = &batch.asset;
    let controller = &asset.definition;
    let context = AnimationContext {
        motions: &controller.motions,
        clips: asset.clip_map(),
        clip_instances: shared.clip_instances,
        mask_slots: shared.mask_slots,
        commands,
        events: shared.events,
        dropped_commands: shared.dropped_commands,
    };
    let mut params = ParameterValues::new();
    for member in batch.members.iter_mut() {
        let mut target = AnimationTarget::new(member.id, skeleton_hash, member.skeleton_matrix_index);
        update_animator(
            controller,
            &mut member.layer_states,
            &mut member.record,
            &context,
            &mut target,
            &mut params,
            dt,
        );
    }
}

/// Crowd animation engine.
#[derive(Debug)]
pub struct Engine {
    cfg: Config,
    ids: IdAllocator,
    instances: HashMap<InstanceId, Instance>,
    batches: HashMap<BatchKey, AnimatorBatch>,

    // Residency
    clip_buffers: ClipBufferManager,
    skeleton_buffers: SkeletonBufferManager,
    command_buffers: AnimationCommandBufferManager,
    skinning_buffers: SkinningBufferManager,
    skeleton_heap: HeapAllocator,
    skin_heap: HeapAllocator,
    skeleton_counts: RefCounts<u32>,
    animator_counts: RefCounts<u32>,
    controller_counts: RefCounts<u32>,
    mesh_counts: RefCounts<u32>,
    controllers: HashMap<u32, Arc<ControllerAsset>>,

    // Publishing
    skeleton_batches_dirty: bool,
    skinned_mesh_batches_dirty: bool,
    skeleton_version: u64,
    skin_version: u64,

    // Per-tick outputs
    events: ClipEventQueue,
    dropped_commands: AtomicU32,
    outputs: FrameOutputs,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Engine {
    pub fn new(cfg: Config) -> Self {
        Self {
            ids: IdAllocator::new(),
            instances: HashMap::with_capacity(cfg.instance_capacity_hint),
            batches: HashMap::new(),
            clip_buffers: ClipBufferManager::new(cfg.clip_heap_capacity),
            skeleton_buffers: SkeletonBufferManager::new(),
            command_buffers: AnimationCommandBufferManager::new(),
            skinning_buffers: SkinningBufferManager::new(),
            skeleton_heap: HeapAllocator::new(
                "skeleton matrices",
                cfg.skeleton_heap_capacity,
                MATRIX_HEAP_ALIGNMENT,
            ),
            skin_heap: HeapAllocator::new("skin matrices", cfg.skin_heap_capacity, MATRIX_HEAP_ALIGNMENT),
            skeleton_counts: Default::default(),
            animator_counts: Default::default(),
            controller_counts: Default::default(),
            mesh_counts: Default::default(),
            controllers: HashMap::new(),
            skeleton_batches_dirty: true,
            skinned_mesh_batches_dirty: true,
            skeleton_version: 0,
            skin_version: 0,
            events: ClipEventQueue::with_capacity(cfg.event_capacity_hint),
            dropped_commands: AtomicU32::new(0),
            outputs: FrameOutputs::default(),
            cfg,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    // --- Instances ---

    pub fn spawn(&mut self) -> InstanceId {
        let id = self.ids.alloc_instance();
        self.instances.insert(id, Instance::default());
        id
    }

    /// Detach everything from `id` and forget it.
    pub fn despawn(&mut self, id: InstanceId) -> CoreResult<()> {
        if !self.instances.contains_key(&id) {
            return Err(CoreError::UnknownInstance { id });
        }
        self.detach_skeleton(id)?;
        self.instances.remove(&id);
        Ok(())
    }

    #[inline]
    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    #[inline]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    fn instance(&self, id: InstanceId) -> CoreResult<&Instance> {
        self.instances.get(&id).ok_or(CoreError::UnknownInstance { id })
    }

    fn instance_mut(&mut self, id: InstanceId) -> CoreResult<&mut Instance> {
        self.instances
            .get_mut(&id)
            .ok_or(CoreError::UnknownInstance { id })
    }

    fn check<T>(&self, kind: &'static str, result: CoreResult<T>) -> CoreResult<T> {
        if let Err(err) = &result {
            log::warn!("rejected {kind}: {err}");
        }
        result
    }

    // --- Skeletons ---

    pub fn attach_skeleton(&mut self, id: InstanceId, skeleton: Arc<SkeletonDefinition>) -> CoreResult<()> {
        if self.instance(id)?.skeleton.is_some() {
            return Err(CoreError::AlreadyAttached { id, what: "skeleton" });
        }
        if self.cfg.validate_definitions {
            self.check("skeleton", skeleton.validate())?;
        }

        let block = self
            .skeleton_heap
            .try_allocate(skeleton.bone_count() as u32)?;
        if let Err(err) = self.skeleton_buffers.push_shared_skeleton_data(&skeleton) {
            self.skeleton_heap.release(block)?;
            return Err(err);
        }
        self.skeleton_buffers
            .resize_matrices(self.skeleton_heap.one_past_highest_used_address() as usize);

        let hash = skeleton.hash();
        self.skeleton_counts.increment(hash);
        self.command_buffers
            .resize_command_list_if_required(hash, self.skeleton_counts.count(hash) as usize + 1);

        self.instance_mut(id)?.skeleton = Some(SkeletonSlot { skeleton, block });
        self.skeleton_batches_dirty = true;
        Ok(())
    }

    /// Detach the skeleton, detaching the animator and every skinned mesh
    /// first. A no-op when no skeleton is attached.
    pub fn detach_skeleton(&mut self, id: InstanceId) -> CoreResult<()> {
        self.detach_animator(id)?;
        let meshes: SmallVec<[u32; 2]> = self
            .instance(id)?
            .meshes
            .iter()
            .map(|m| m.mesh.hash())
            .collect();
        for mesh in meshes {
            self.detach_skinned_mesh(id, mesh)?;
        }

        let Some(slot) = self.instance_mut(id)?.skeleton.take() else {
            return Ok(());
        };
        self.skeleton_heap.release(slot.block)?;
        self.skeleton_buffers
            .resize_matrices(self.skeleton_heap.one_past_highest_used_address() as usize);

        let hash = slot.skeleton.hash();
        if self.skeleton_counts.decrement(hash) {
            self.command_buffers.remove_command_list(hash);
        } else {
            self.command_buffers
                .resize_command_list_if_required(hash, self.skeleton_counts.count(hash) as usize + 1);
        }
        self.skeleton_batches_dirty = true;
        Ok(())
    }

    /// First skeleton matrix of the instance, if a skeleton is attached.
    pub fn skeleton_matrix_index(&self, id: InstanceId) -> CoreResult<Option<u32>> {
        Ok(self.instance(id)?.skeleton.as_ref().map(|s| s.block.begin))
    }

    // --- Animators ---

    pub fn attach_animator(&mut self, id: InstanceId, asset: Arc<ControllerAsset>) -> CoreResult<()> {
        let instance = self.instance(id)?;
        let Some(slot) = instance.skeleton.as_ref() else {
            return Err(CoreError::SkeletonNotAttached { id });
        };
        if instance.animator.is_some() {
            return Err(CoreError::AlreadyAttached { id, what: "animator" });
        }
        let skeleton = slot.skeleton.clone();
        let skeleton_matrix_index = slot.block.begin as i32;
        if self.cfg.validate_definitions {
            self.check("animator controller", asset.validate())?;
        }

        let key = BatchKey {
            skeleton_hash: skeleton.hash(),
            controller_hash: asset.hash(),
        };
        let pair = instance_hash(key.controller_hash, key.skeleton_hash);
        if !self.animator_counts.contains(pair) {
            self.retain_controller_data(&asset, &skeleton)?;
            self.controller_counts.increment(key.controller_hash);
            self.controllers
                .entry(key.controller_hash)
                .or_insert_with(|| asset.clone());
        }
        self.animator_counts.increment(pair);

        let member = AnimatorMember {
            id,
            layer_states: vec![LayerState::default(); asset.definition.layers.len()],
            record: ParameterRecord::for_controller(&asset.definition),
            skeleton_matrix_index,
        };
        self.batches
            .entry(key)
            .or_insert_with(|| AnimatorBatch::new(key, asset))
            .insert(member);
        self.instance_mut(id)?.animator = Some(key);
        Ok(())
    }

    /// Sample every clip for the skeleton and collapse every mask. Undoes the
    /// clip retains on failure.
    fn retain_controller_data(
        &mut self,
        asset: &ControllerAsset,
        skeleton: &SkeletonDefinition,
    ) -> CoreResult<()> {
        let mut retained: SmallVec<[u32; 16]> = SmallVec::new();
        let mut failure = None;
        for clip in &asset.clips {
            match self.clip_buffers.retain_clip_instance(clip, skeleton) {
                Ok(_) => retained.push(clip.hash()),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if failure.is_none() {
            for mask in &asset.masks {
                if let Err(err) = self.skeleton_buffers.push_skeleton_mask(skeleton, mask) {
                    failure = Some(err);
                    break;
                }
            }
        }
        let Some(err) = failure else {
            return Ok(());
        };
        for clip in retained {
            self.clip_buffers
                .release_clip_instance(clip, skeleton.hash())?;
        }
        Err(err)
    }

    /// A no-op when no animator is attached.
    pub fn detach_animator(&mut self, id: InstanceId) -> CoreResult<()> {
        let Some(key) = self.instance_mut(id)?.animator.take() else {
            return Ok(());
        };
        if let Some(batch) = self.batches.get_mut(&key) {
            batch.remove(id);
            if batch.members.is_empty() {
                self.batches.remove(&key);
            }
        }

        let pair = instance_hash(key.controller_hash, key.skeleton_hash);
        if !self.animator_counts.decrement(pair) {
            return Ok(());
        }
        if let Some(asset) = self.controllers.get(&key.controller_hash).cloned() {
            for clip in &asset.clips {
                self.clip_buffers
                    .release_clip_instance(clip.hash(), key.skeleton_hash)?;
            }
        }
        if self.controller_counts.decrement(key.controller_hash) {
            self.controllers.remove(&key.controller_hash);
            log::debug!("controller {:08X} no longer referenced", key.controller_hash);
        }
        Ok(())
    }

    pub fn parameters_mut(&mut self, id: InstanceId) -> CoreResult<ParametersMut<'_>> {
        let key = self
            .instance(id)?
            .animator
            .ok_or(CoreError::AnimatorNotAttached { id })?;
        let batch = self
            .batches
            .get_mut(&key)
            .ok_or(CoreError::AnimatorNotAttached { id })?;
        let slot = *batch
            .index
            .get(&id)
            .ok_or(CoreError::AnimatorNotAttached { id })?;
        Ok(ParametersMut::new(
            &batch.asset.definition,
            &mut batch.members[slot].record,
        ))
    }

    pub fn layer_states(&self, id: InstanceId) -> CoreResult<&[LayerState]> {
        let key = self
            .instance(id)?
            .animator
            .ok_or(CoreError::AnimatorNotAttached { id })?;
        self.batches
            .get(&key)
            .and_then(|b| b.index.get(&id).map(|slot| &b.members[*slot]))
            .map(|m| m.layer_states.as_slice())
            .ok_or(CoreError::AnimatorNotAttached { id })
    }

    /// Override a layer's weight, clamped to `[0, 1]`. Layers are initialized
    /// lazily, so a weight set before the first update is replaced by the
    /// layer default.
    pub fn set_layer_weight(&mut self, id: InstanceId, layer: usize, weight: f32) -> CoreResult<()> {
        let key = self
            .instance(id)?
            .animator
            .ok_or(CoreError::AnimatorNotAttached { id })?;
        let state = self
            .batches
            .get_mut(&key)
            .and_then(|b| b.member_mut(id))
            .and_then(|m| m.layer_states.get_mut(layer))
            .ok_or(CoreError::AnimatorNotAttached { id })?;
        state.set_weight(weight);
        Ok(())
    }

    /// Controller attached to `id`, if any.
    pub fn animator(&self, id: InstanceId) -> CoreResult<Option<&Arc<ControllerAsset>>> {
        Ok(self
            .instance(id)?
            .animator
            .and_then(|key| self.batches.get(&key))
            .map(|b| &b.asset))
    }

    // --- Skinned meshes ---

    pub fn attach_skinned_mesh(&mut self, id: InstanceId, mesh: Arc<SkinnedMeshDefinition>) -> CoreResult<()> {
        let instance = self.instance(id)?;
        let Some(slot) = instance.skeleton.as_ref() else {
            return Err(CoreError::SkeletonNotAttached { id });
        };
        if instance.meshes.iter().any(|m| m.mesh.hash() == mesh.hash()) {
            return Err(CoreError::AlreadyAttached { id, what: "skinned mesh" });
        }
        if self.cfg.validate_definitions {
            let skeleton = slot.skeleton.clone();
            self.check(
                "skinned mesh",
                mesh.validate().and_then(|_| mesh.validate_against(&skeleton)),
            )?;
        }

        let block = self.skin_heap.try_allocate(mesh.bone_count() as u32)?;
        if let Err(err) = self.skinning_buffers.push_skinned_mesh_bones(&mesh) {
            self.skin_heap.release(block)?;
            return Err(err);
        }
        self.skinning_buffers
            .resize_skin_matrices(self.skin_heap.one_past_highest_used_address() as usize);
        self.mesh_counts.increment(mesh.hash());

        self.instance_mut(id)?.meshes.push(MeshSlot { mesh, block });
        self.skinned_mesh_batches_dirty = true;
        Ok(())
    }

    pub fn detach_skinned_mesh(&mut self, id: InstanceId, mesh_hash: u32) -> CoreResult<()> {
        let instance = self.instance_mut(id)?;
        let Some(position) = instance.meshes.iter().position(|m| m.mesh.hash() == mesh_hash) else {
            return Err(CoreError::UnknownSkinnedMesh { id, mesh: mesh_hash });
        };
        let slot = instance.meshes.remove(position);
        self.skin_heap.release(slot.block)?;
        self.skinning_buffers
            .resize_skin_matrices(self.skin_heap.one_past_highest_used_address() as usize);
        self.mesh_counts.decrement(mesh_hash);
        self.skinned_mesh_batches_dirty = true;
        Ok(())
    }

    /// Content hashes of the meshes attached to `id`, in attach order.
    pub fn skinned_meshes(&self, id: InstanceId) -> CoreResult<SmallVec<[u32; 2]>> {
        Ok(self.instance(id)?.meshes.iter().map(|m| m.mesh.hash()).collect())
    }

    // --- Tick ---

    /// Advance every animator by `dt` seconds and publish the frame.
    pub fn update(&mut self, dt: f32) -> CoreResult<&FrameOutputs> {
        self.outputs.clear();
        *self.dropped_commands.get_mut() = 0;

        let Self {
            cfg,
            batches,
            clip_buffers,
            skeleton_buffers,
            command_buffers,
            events,
            dropped_commands,
            ..
        } = &mut *self;

        {
            let shared = TickShared {
                clip_instances: clip_buffers.instances(),
                mask_slots: skeleton_buffers.mask_slots(),
                command_buffers,
                events,
                dropped_commands,
            };
            let mut work: Vec<&mut AnimatorBatch> = batches.values_mut().collect();
            work.sort_unstable_by_key(|b| b.key);

            let threads = cfg.worker_threads.max(1).min(work.len());
            if threads > 1 {
                let per_thread = work.len().div_ceil(threads);
                let shared = &shared;
                std::thread::scope(|s| {
                    for chunk in work.chunks_mut(per_thread) {
                        s.spawn(move || {
                            for batch in chunk.iter_mut() {
                                evaluate_batch(batch, shared, dt);
                            }
                        });
                    }
                });
            } else {
                for batch in work {
                    evaluate_batch(batch, &shared, dt);
                }
            }
        }

        self.command_buffers
            .push_commands(&mut self.outputs.command_batches)?;
        self.outputs.events = self.events.drain();
        self.outputs.dropped_commands = self.dropped_commands.load(Ordering::Relaxed);
        if self.outputs.dropped_commands > 0 {
            log::warn!(
                "{} animation commands dropped this tick",
                self.outputs.dropped_commands
            );
        }

        self.publish_skeleton_batches()?;
        self.publish_skinned_mesh_batches()?;
        Ok(&self.outputs)
    }

    fn publish_skeleton_batches(&mut self) -> CoreResult<()> {
        if !self.skeleton_batches_dirty {
            return Ok(());
        }
        let mut ids: Vec<InstanceId> = self.instances.keys().copied().collect();
        ids.sort_unstable();

        let mut groups: HashMap<u32, SkeletonInstanceBatch> = HashMap::new();
        for id in ids {
            let Some(slot) = self.instances.get(&id).and_then(|i| i.skeleton.as_ref()) else {
                continue;
            };
            let hash = slot.skeleton.hash();
            groups
                .entry(hash)
                .or_insert_with(|| SkeletonInstanceBatch {
                    skeleton_hash: hash,
                    bone_count: slot.skeleton.bone_count() as u32,
                    bone_parent_offset: self.skeleton_buffers.bone_parent_offset(hash).unwrap_or(0),
                    instance_buffer_start: 0,
                    instances: Vec::new(),
                })
                .instances
                .push(slot.block.begin);
        }
        let mut batches: Vec<SkeletonInstanceBatch> = groups.into_values().collect();
        batches.sort_unstable_by_key(|b| b.skeleton_hash);

        self.skeleton_version += 1;
        self.skeleton_buffers
            .push_skeleton_instances(&mut batches, self.skeleton_version)?;
        self.outputs.skeleton_batches = batches;
        self.outputs.skeleton_batches_changed = true;
        self.skeleton_batches_dirty = false;
        Ok(())
    }

    fn publish_skinned_mesh_batches(&mut self) -> CoreResult<()> {
        if !self.skinned_mesh_batches_dirty {
            return Ok(());
        }
        let mut ids: Vec<InstanceId> = self.instances.keys().copied().collect();
        ids.sort_unstable();

        let mut groups: HashMap<u32, SkinnedMeshBatch> = HashMap::new();
        for id in ids {
            let Some(instance) = self.instances.get(&id) else {
                continue;
            };
            let Some(skeleton) = instance.skeleton.as_ref() else {
                continue;
            };
            for slot in &instance.meshes {
                let hash = slot.mesh.hash();
                groups
                    .entry(hash)
                    .or_insert_with(|| SkinnedMeshBatch {
                        mesh_hash: hash,
                        bone_count: slot.mesh.bone_count() as u32,
                        mesh_bone_offset: self.skinning_buffers.mesh_bone_offset(hash).unwrap_or(0),
                        instance_buffer_start: 0,
                        instances: Vec::new(),
                    })
                    .instances
                    .push(SkinnedMeshInstance {
                        skin_matrix_index: slot.block.begin,
                        skeleton_matrix_index: skeleton.block.begin,
                    });
            }
        }
        let mut batches: Vec<SkinnedMeshBatch> = groups.into_values().collect();
        batches.sort_unstable_by_key(|b| b.mesh_hash);

        self.skin_version += 1;
        self.skinning_buffers
            .push_skinned_mesh_instances(&mut batches, self.skin_version)?;
        self.outputs.skinned_mesh_batches = batches;
        self.outputs.skinned_mesh_batches_changed = true;
        self.skinned_mesh_batches_dirty = false;
        Ok(())
    }

    // --- Buffer views ---

    #[inline]
    pub fn outputs(&self) -> &FrameOutputs {
        &self.outputs
    }

    #[inline]
    pub fn clip_buffers(&self) -> &ClipBufferManager {
        &self.clip_buffers
    }

    #[inline]
    pub fn skeleton_buffers(&self) -> &SkeletonBufferManager {
        &self.skeleton_buffers
    }

    #[inline]
    pub fn command_buffers(&self) -> &AnimationCommandBufferManager {
        &self.command_buffers
    }

    #[inline]
    pub fn skinning_buffers(&self) -> &SkinningBufferManager {
        &self.skinning_buffers
    }

    #[inline]
    pub fn skeleton_heap(&self) -> &HeapAllocator {
        &self.skeleton_heap
    }

    #[inline]
    pub fn skin_heap(&self) -> &HeapAllocator {
        &self.skin_heap
    }

    /// Number of skinned mesh instances sharing `mesh_hash`.
    pub fn skinned_mesh_reference_count(&self, mesh_hash: u32) -> u32 {
        self.mesh_counts.count(mesh_hash)
    }

    /// Number of instances with skeleton `skeleton_hash`.
    pub fn skeleton_reference_count(&self, skeleton_hash: u32) -> u32 {
        self.skeleton_counts.count(skeleton_hash)
    }

    /// Whether a controller is resident for at least one skeleton.
    pub fn is_controller_resident(&self, controller_hash: u32) -> bool {
        self.controllers.contains_key(&controller_hash)
    }
}
