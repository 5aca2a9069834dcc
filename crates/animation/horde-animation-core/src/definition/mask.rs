use serde::{Deserialize, Serialize};

use super::{check_hash, check_len};
use crate::definition::SkeletonDefinition;
use crate::error::CoreResult;
use crate::hash::{ContentHasher, StringHash};

const KIND: &str = "skeleton mask";

/// Number of bones a collapsed mask can address. Bones at or past this index
/// are never masked.
pub const MASK_BITS: usize = 64;

/// Per-bone enable set restricting which bones a layer affects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SkeletonMaskDefinition {
    pub bone_ids: Vec<StringHash>,
    pub active: Vec<bool>,
    #[serde(skip)]
    hash: u32,
}

impl SkeletonMaskDefinition {
    pub fn new(bone_ids: Vec<StringHash>, active: Vec<bool>) -> Self {
        let mut mask = Self {
            bone_ids,
            active,
            hash: 0,
        };
        mask.rehash();
        mask
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut mask: Self = serde_json::from_str(json)?;
        mask.rehash();
        Ok(mask)
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
        let active: Vec<u8> = self.active.iter().map(|a| *a as u8).collect();
        let mut h = ContentHasher::default();
        h.write_slice(&self.bone_ids).write_slice(&active);
        h.finish()
    }

    pub fn is_active(&self, bone: StringHash) -> bool {
        self.bone_ids
            .iter()
            .zip(&self.active)
            .any(|(id, active)| *active && *id == bone)
    }

    /// Collapse to one bit per skeleton bone. Bit `i` is set when skeleton bone
    /// `i` is listed and active; bones past [`MASK_BITS`] are dropped.
    pub fn bitmask_for(&self, skeleton: &SkeletonDefinition) -> u64 {
        if skeleton.bone_count() > MASK_BITS {
            log::warn!(
                "skeleton mask {:08X}: skeleton {:08X} has {} bones, bones past {} stay unmasked",
                self.hash,
                skeleton.hash(),
                skeleton.bone_count(),
                MASK_BITS
            );
        }
        skeleton
            .bone_ids
            .iter()
            .take(MASK_BITS)
            .enumerate()
            .filter(|(_, id)| self.is_active(**id))
            .fold(0u64, |bits, (i, _)| bits | (1u64 << i))
    }

    pub fn validate(&self) -> CoreResult<()> {
        check_len(KIND, "active", self.active.len(), self.bone_ids.len())?;
        check_hash(KIND, self.hash, self.compute_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3};

    #[test]
    fn bitmask_follows_skeleton_order() {
        let ids: Vec<StringHash> = ["root", "hip", "leg"].iter().map(|n| StringHash::new(n)).collect();
        let skeleton = SkeletonDefinition::new(
            ids.clone(),
            vec![-1, 0, 1],
            vec![Vec3::ZERO; 3],
            vec![Quat::IDENTITY; 3],
            vec![Vec3::ONE; 3],
        );
        let mask = SkeletonMaskDefinition::new(vec![ids[2], ids[0], ids[1]], vec![true, true, false]);
        assert_eq!(mask.bitmask_for(&skeleton), 0b101);
    }

    #[test]
    fn bones_past_mask_width_are_dropped() {
        let ids: Vec<StringHash> = (0..70).map(|i| StringHash::new(&format!("bone{i}"))).collect();
        let parents: Vec<i32> = (0..70).map(|i| i - 1).collect();
        let skeleton = SkeletonDefinition::new(
            ids.clone(),
            parents,
            vec![Vec3::ZERO; 70],
            vec![Quat::IDENTITY; 70],
            vec![Vec3::ONE; 70],
        );
        let mask = SkeletonMaskDefinition::new(vec![ids[2], ids[66]], vec![true, true]);
        assert_eq!(mask.bitmask_for(&skeleton), 1u64 << 2);
    }
}
