use std::sync::Arc;

use hashbrown::HashMap;

use super::{AnimatorControllerDefinition, Clip, SkeletonMaskDefinition};
use crate::error::{CoreError, CoreResult};

const KIND: &str = "controller asset";

/// A controller together with the clips and masks it references, ready to be
/// attached to instances.
#[derive(Clone, Debug)]
pub struct ControllerAsset {
    pub definition: AnimatorControllerDefinition,
    pub clips: Vec<Arc<Clip>>,
    pub masks: Vec<Arc<SkeletonMaskDefinition>>,
    clip_map: HashMap<u32, Arc<Clip>>,
}

impl ControllerAsset {
    pub fn new(
        definition: AnimatorControllerDefinition,
        clips: Vec<Arc<Clip>>,
        masks: Vec<Arc<SkeletonMaskDefinition>>,
    ) -> Self {
        let mut unique: Vec<Arc<Clip>> = Vec::with_capacity(clips.len());
        let mut clip_map = HashMap::with_capacity(clips.len());
        for clip in clips {
            if clip_map.insert(clip.hash(), clip.clone()).is_none() {
                unique.push(clip);
            }
        }
        let mut masks = masks;
        masks.sort_by_key(|m| m.hash());
        masks.dedup_by_key(|m| m.hash());
        Self {
            definition,
            clips: unique,
            masks,
            clip_map,
        }
    }

    #[inline]
    pub fn hash(&self) -> u32 {
        self.definition.hash()
    }

    #[inline]
    pub fn clip(&self, clip_hash: u32) -> Option<&Arc<Clip>> {
        self.clip_map.get(&clip_hash)
    }

    #[inline]
    pub fn clip_map(&self) -> &HashMap<u32, Arc<Clip>> {
        &self.clip_map
    }

    pub fn mask(&self, mask_hash: u32) -> Option<&Arc<SkeletonMaskDefinition>> {
        self.masks.iter().find(|m| m.hash() == mask_hash)
    }

    /// Validate the controller, its clips and masks, and that every
    /// referenced clip and mask is bundled.
    pub fn validate(&self) -> CoreResult<()> {
        self.definition.validate()?;
        for clip in &self.clips {
            clip.validate()?;
        }
        for mask in &self.masks {
            mask.validate()?;
        }
        if let Some(missing) = self
            .definition
            .clip_hashes()
            .find(|h| !self.clip_map.contains_key(h))
        {
            return Err(CoreError::invalid(
                KIND,
                format!("clip {missing:08X} is referenced but not bundled"),
            ));
        }
        if let Some(missing) = self
            .definition
            .mask_hashes()
            .into_iter()
            .find(|h| self.mask(*h).is_none())
        {
            return Err(CoreError::invalid(
                KIND,
                format!("skeleton mask {missing:08X} is referenced but not bundled"),
            ));
        }
        Ok(())
    }
}
