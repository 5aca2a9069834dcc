//! Skeleton-side GPU data: output matrices, bone parents, masks and the
//! per-batch instance index lists.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::buffer::GpuBuffer;
use crate::definition::{SkeletonDefinition, SkeletonMaskDefinition};
use crate::error::CoreResult;
use crate::hash::mask_instance_hash;
use crate::math::AffineTransform;

pub const SKELETON_MATRIX_CHUNK: usize = 2048;
pub const SKELETON_INSTANCE_CHUNK: usize = 256;
pub const BONE_PARENT_CHUNK: usize = 64;
pub const SKELETON_MASK_CHUNK: usize = 16;

/// Live instances of one skeleton.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonInstanceBatch {
    pub skeleton_hash: u32,
    pub bone_count: u32,
    pub bone_parent_offset: u32,
    /// Where `instances` starts in the instance buffer.
    pub instance_buffer_start: u32,
    /// First skeleton matrix of each instance.
    pub instances: Vec<u32>,
}

#[derive(Debug)]
pub struct SkeletonBufferManager {
    matrices: GpuBuffer<AffineTransform>,
    instances: GpuBuffer<u32>,
    instances_version: Option<u64>,
    bone_parents: GpuBuffer<i32>,
    bone_parent_offsets: HashMap<u32, u32>,
    bone_parents_len: usize,
    masks: GpuBuffer<u64>,
    mask_slots: HashMap<u32, u32>,
}

impl Default for SkeletonBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SkeletonBufferManager {
    pub fn new() -> Self {
        let mut masks = GpuBuffer::with_len("skeleton masks", SKELETON_MASK_CHUNK);
        masks.as_mut_slice()[0] = !0u64;
        let mut mask_slots = HashMap::new();
        mask_slots.insert(0, 0);
        Self {
            matrices: GpuBuffer::new("skeleton matrices"),
            instances: GpuBuffer::new("skeleton instances"),
            instances_version: None,
            bone_parents: GpuBuffer::new("bone parents"),
            bone_parent_offsets: HashMap::new(),
            bone_parents_len: 0,
            masks,
            mask_slots,
        }
    }

    /// Upload the bone parent table of `skeleton` once. Returns its offset.
    pub fn push_shared_skeleton_data(&mut self, skeleton: &SkeletonDefinition) -> CoreResult<u32> {
        if let Some(offset) = self.bone_parent_offsets.get(&skeleton.hash()) {
            return Ok(*offset);
        }
        let offset = self.bone_parents_len;
        let end = offset + skeleton.bone_count();
        self.bone_parents
            .resize_if_required(end, BONE_PARENT_CHUNK, true);
        self.bone_parents
            .set_data(&skeleton.parent_indices, offset)?;
        self.bone_parents_len = end;
        self.bone_parent_offsets
            .insert(skeleton.hash(), offset as u32);
        Ok(offset as u32)
    }

    pub fn bone_parent_offset(&self, skeleton_hash: u32) -> Option<u32> {
        self.bone_parent_offsets.get(&skeleton_hash).copied()
    }

    /// Collapse `mask` against `skeleton` into a mask slot, reusing an
    /// existing slot for the same pair.
    pub fn push_skeleton_mask(
        &mut self,
        skeleton: &SkeletonDefinition,
        mask: &SkeletonMaskDefinition,
    ) -> CoreResult<u32> {
        let key = mask_instance_hash(mask.hash(), skeleton.hash());
        if let Some(slot) = self.mask_slots.get(&key) {
            return Ok(*slot);
        }
        let slot = self.mask_slots.len();
        self.masks
            .resize_if_required(slot + 1, SKELETON_MASK_CHUNK, true);
        self.masks.set_data(&[mask.bitmask_for(skeleton)], slot)?;
        self.mask_slots.insert(key, slot as u32);
        Ok(slot as u32)
    }

    /// Slot of a mask instance; `0` (no mask) maps to the all-bones slot.
    #[inline]
    pub fn mask_slot(&self, mask_instance_hash: u32) -> Option<u32> {
        self.mask_slots.get(&mask_instance_hash).copied()
    }

    pub fn mask_slots(&self) -> &HashMap<u32, u32> {
        &self.mask_slots
    }

    /// Size the matrix output buffer to cover `required` transforms. Contents
    /// are rewritten every frame, so nothing is copied.
    pub fn resize_matrices(&mut self, required: usize) -> bool {
        self.matrices
            .resize_if_required(required, SKELETON_MATRIX_CHUNK, false)
    }

    /// Pack instance matrix indices of every batch. Skipped when `version`
    /// was already uploaded. Returns true when the buffer was rewritten.
    pub fn push_skeleton_instances(
        &mut self,
        batches: &mut [SkeletonInstanceBatch],
        version: u64,
    ) -> CoreResult<bool> {
        if self.instances_version == Some(version) {
            return Ok(false);
        }
        let total: usize = batches.iter().map(|b| b.instances.len()).sum();
        self.instances
            .resize_if_required(total, SKELETON_INSTANCE_CHUNK, false);
        let mut offset = 0usize;
        for batch in batches.iter_mut() {
            self.instances.set_data(&batch.instances, offset)?;
            batch.instance_buffer_start = offset as u32;
            offset += batch.instances.len();
        }
        self.instances_version = Some(version);
        Ok(true)
    }

    pub fn matrices(&self) -> &GpuBuffer<AffineTransform> {
        &self.matrices
    }

    pub fn instances(&self) -> &GpuBuffer<u32> {
        &self.instances
    }

    pub fn bone_parents(&self) -> &GpuBuffer<i32> {
        &self.bone_parents
    }

    pub fn masks(&self) -> &GpuBuffer<u64> {
        &self.masks
    }
}
