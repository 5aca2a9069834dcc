use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{check_hash, check_len};
use crate::error::{CoreError, CoreResult};
use crate::hash::{ContentHasher, StringHash};
use crate::math::AffineTransform;

const KIND: &str = "skeleton";

/// Bone hierarchy plus default local pose.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonDefinition {
    pub bone_ids: Vec<StringHash>,
    /// Parent bone per bone, -1 for roots.
    pub parent_indices: Vec<i32>,
    pub default_translations: Vec<Vec3>,
    pub default_rotations: Vec<Quat>,
    pub default_scales: Vec<Vec3>,
    #[serde(skip)]
    hash: u32,
}

impl SkeletonDefinition {
    pub fn new(
        bone_ids: Vec<StringHash>,
        parent_indices: Vec<i32>,
        default_translations: Vec<Vec3>,
        default_rotations: Vec<Quat>,
        default_scales: Vec<Vec3>,
    ) -> Self {
        let mut skeleton = Self {
            bone_ids,
            parent_indices,
            default_translations,
            default_rotations,
            default_scales,
            hash: 0,
        };
        skeleton.rehash();
        skeleton
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut skeleton: Self = serde_json::from_str(json)?;
        skeleton.rehash();
        Ok(skeleton)
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
        h.write_slice(&self.bone_ids)
            .write_slice(&self.parent_indices)
            .write_slice(&self.default_rotations)
            .write_slice(&self.default_translations)
            .write_slice(&self.default_scales);
        h.finish()
    }

    #[inline]
    pub fn bone_count(&self) -> usize {
        self.bone_ids.len()
    }

    pub fn bone_index(&self, id: StringHash) -> Option<usize> {
        self.bone_ids.iter().position(|b| *b == id)
    }

    /// Default local pose of a bone.
    pub fn default_pose(&self, bone: usize) -> AffineTransform {
        AffineTransform::from_trs(
            self.default_translations[bone],
            self.default_rotations[bone],
            self.default_scales[bone],
        )
    }

    pub fn validate(&self) -> CoreResult<()> {
        let n = self.bone_count();
        check_len(KIND, "parent_indices", self.parent_indices.len(), n)?;
        check_len(KIND, "default_translations", self.default_translations.len(), n)?;
        check_len(KIND, "default_rotations", self.default_rotations.len(), n)?;
        check_len(KIND, "default_scales", self.default_scales.len(), n)?;

        for (bone, &parent) in self.parent_indices.iter().enumerate() {
            if parent < -1 || parent >= n as i32 {
                return Err(CoreError::invalid(
                    KIND,
                    format!("bone {bone} has parent {parent} out of range"),
                ));
            }
        }

        // Walking up from any bone must reach a root within n steps.
        for bone in 0..n {
            let mut cursor = self.parent_indices[bone];
            let mut steps = 0;
            while cursor >= 0 {
                steps += 1;
                if steps > n {
                    return Err(CoreError::invalid(
                        KIND,
                        format!("bone {bone} is part of a parent cycle"),
                    ));
                }
                cursor = self.parent_indices[cursor as usize];
            }
        }

        check_hash(KIND, self.hash, self.compute_hash())
    }
}
