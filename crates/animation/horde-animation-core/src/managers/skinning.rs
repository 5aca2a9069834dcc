//! Skinned mesh GPU data: per-mesh bind poses and per-instance skin matrices.

use bytemuck::{Pod, Zeroable};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::buffer::GpuBuffer;
use crate::definition::SkinnedMeshDefinition;
use crate::error::CoreResult;
use crate::math::AffineTransform;

pub const SKIN_MATRIX_CHUNK: usize = 8 * 1024;
pub const SKINNED_MESH_INSTANCE_CHUNK: usize = 2048;
pub const MESH_BONE_CHUNK: usize = 64;

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SkinnedMeshBone {
    pub bind_pose: AffineTransform,
    pub skeleton_bone_index: i32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable, Serialize, Deserialize)]
pub struct SkinnedMeshInstance {
    pub skin_matrix_index: u32,
    pub skeleton_matrix_index: u32,
}

/// Live instances of one skinned mesh.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinnedMeshBatch {
    pub mesh_hash: u32,
    pub bone_count: u32,
    pub mesh_bone_offset: u32,
    pub instance_buffer_start: u32,
    pub instances: Vec<SkinnedMeshInstance>,
}

#[derive(Debug)]
pub struct SkinningBufferManager {
    skin_matrices: GpuBuffer<AffineTransform>,
    mesh_bones: GpuBuffer<SkinnedMeshBone>,
    mesh_bone_offsets: HashMap<u32, u32>,
    mesh_bones_len: usize,
    instances: GpuBuffer<SkinnedMeshInstance>,
    instances_version: Option<u64>,
}

impl Default for SkinningBufferManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SkinningBufferManager {
    pub fn new() -> Self {
        Self {
            skin_matrices: GpuBuffer::new("skin matrices"),
            mesh_bones: GpuBuffer::new("skinned mesh bones"),
            mesh_bone_offsets: HashMap::new(),
            mesh_bones_len: 0,
            instances: GpuBuffer::new("skinned mesh instances"),
            instances_version: None,
        }
    }

    /// Upload the bind poses of `mesh` once. Returns their offset.
    pub fn push_skinned_mesh_bones(&mut self, mesh: &SkinnedMeshDefinition) -> CoreResult<u32> {
        if let Some(offset) = self.mesh_bone_offsets.get(&mesh.hash()) {
            return Ok(*offset);
        }
        let bones: Vec<SkinnedMeshBone> = mesh
            .bind_poses
            .iter()
            .zip(&mesh.skeleton_bone_indices)
            .map(|(bind_pose, index)| SkinnedMeshBone {
                bind_pose: *bind_pose,
                skeleton_bone_index: *index,
                _pad: [0; 3],
            })
            .collect();
        let offset = self.mesh_bones_len;
        let end = offset + bones.len();
        self.mesh_bones
            .resize_if_required(end, MESH_BONE_CHUNK, true);
        self.mesh_bones.set_data(&bones, offset)?;
        self.mesh_bones_len = end;
        self.mesh_bone_offsets.insert(mesh.hash(), offset as u32);
        Ok(offset as u32)
    }

    pub fn mesh_bone_offset(&self, mesh_hash: u32) -> Option<u32> {
        self.mesh_bone_offsets.get(&mesh_hash).copied()
    }

    /// Size the skin matrix output buffer. Rebuilt every frame, never copied.
    pub fn resize_skin_matrices(&mut self, required: usize) -> bool {
        self.skin_matrices
            .resize_if_required(required, SKIN_MATRIX_CHUNK, false)
    }

    pub fn push_skinned_mesh_instances(
        &mut self,
        batches: &mut [SkinnedMeshBatch],
        version: u64,
    ) -> CoreResult<bool> {
        if self.instances_version == Some(version) {
            return Ok(false);
        }
        let total: usize = batches.iter().map(|b| b.instances.len()).sum();
        self.instances
            .resize_if_required(total, SKINNED_MESH_INSTANCE_CHUNK, false);
        let mut offset = 0usize;
        for batch in batches.iter_mut() {
            self.instances.set_data(&batch.instances, offset)?;
            batch.instance_buffer_start = offset as u32;
            offset += batch.instances.len();
        }
        self.instances_version = Some(version);
        Ok(true)
    }

    pub fn skin_matrices(&self) -> &GpuBuffer<AffineTransform> {
        &self.skin_matrices
    }

    pub fn mesh_bones(&self) -> &GpuBuffer<SkinnedMeshBone> {
        &self.mesh_bones
    }

    pub fn instances(&self) -> &GpuBuffer<SkinnedMeshInstance> {
        &self.instances
    }
}
