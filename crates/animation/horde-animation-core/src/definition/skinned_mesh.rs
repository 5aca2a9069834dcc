use serde::{Deserialize, Serialize};

use super::{check_hash, check_len};
use crate::definition::SkeletonDefinition;
use crate::error::{CoreError, CoreResult};
use crate::hash::ContentHasher;
use crate::math::AffineTransform;

const KIND: &str = "skinned mesh";

/// Skin bones of a mesh: the skeleton bone each one follows and its bind pose.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkinnedMeshDefinition {
    /// Skeleton bone per skin bone, -1 when the skeleton lacks it.
    pub skeleton_bone_indices: Vec<i32>,
    pub bind_poses: Vec<AffineTransform>,
    #[serde(skip)]
    hash: u32,
}

impl SkinnedMeshDefinition {
    pub fn new(skeleton_bone_indices: Vec<i32>, bind_poses: Vec<AffineTransform>) -> Self {
        let mut mesh = Self {
            skeleton_bone_indices,
            bind_poses,
            hash: 0,
        };
        mesh.rehash();
        mesh
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut mesh: Self = serde_json::from_str(json)?;
        mesh.rehash();
        Ok(mesh)
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn rehash(&mut self) -> u32 {
        self.hash = self.compute_hash();
        self.hash
    }

    pub fn compute_hash(&self) -> u32 {
        let mut h = ContentHasher::default();
        h.write_slice(&self.bind_poses)
            .write_slice(&self.skeleton_bone_indices);
        h.finish()
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bind_poses.len()
    }

    pub fn validate(&self) -> CoreResult<()> {
        check_len(
            KIND,
            "skeleton_bone_indices",
            self.skeleton_bone_indices.len(),
            self.bind_poses.len(),
        )?;
        check_hash(KIND, self.hash, self.compute_hash())
    }

    /// Check every referenced bone exists in `skeleton`.
    pub fn validate_against(&self, skeleton: &SkeletonDefinition) -> CoreResult<()> {
        let n = skeleton.bone_count() as i32;
        match self
            .skeleton_bone_indices
            .iter()
            .find(|&&i| i < -1 || i >= n)
        {
            Some(bad) => Err(CoreError::invalid(
                KIND,
                format!("skeleton bone index {bad} out of range for {n} bones"),
            )),
            None => Ok(()),
        }
    }
}
