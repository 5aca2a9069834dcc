//! Resident clip samples, one block per (clip, skeleton) pair.

use hashbrown::HashMap;

use crate::buffer::GpuBuffer;
use crate::definition::{Clip, SkeletonDefinition};
use crate::error::CoreResult;
use crate::hash::instance_hash;
use crate::heap::{HeapAllocator, HeapBlock};
use crate::math::AffineTransform;
use crate::refcount::RefCounts;

pub const CLIP_SAMPLE_CHUNK: usize = 16 * 1024;
pub const CLIP_HEAP_ALIGNMENT: u32 = 4;

/// Placement of a sampled clip inside the clip sample buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClipInstance {
    pub clip_hash: u32,
    pub skeleton_hash: u32,
    pub bone_count: u32,
    pub sample_count: u32,
    pub block: HeapBlock,
}

impl ClipInstance {
    /// First transform of sample `keyframe`.
    #[inline]
    pub fn sample_index(&self, keyframe: u16) -> i32 {
        (self.block.begin + keyframe as u32 * self.bone_count) as i32
    }

    /// First transform of the inverse-frame-0 block used by additive layers.
    #[inline]
    pub fn additive_reference_index(&self) -> i32 {
        (self.block.begin + self.bone_count * self.sample_count) as i32
    }
}

/// Sample every skeleton bone of every frame. Bones the clip does not animate
/// take the skeleton's default pose. One extra block holds the inverse of
/// frame 0.
pub fn sample_clip_instance_matrices(clip: &Clip, skeleton: &SkeletonDefinition) -> Vec<AffineTransform> {
    let bones = skeleton.bone_count();
    let samples = clip.sample_count() as usize;
    let t_stride = clip.translation_bindings.len();
    let r_stride = clip.rotation_bindings.len();
    let s_stride = clip.scale_bindings.len();

    let bindings: Vec<(Option<usize>, Option<usize>, Option<usize>)> = skeleton
        .bone_ids
        .iter()
        .map(|id| {
            (
                clip.translation_binding(*id),
                clip.rotation_binding(*id),
                clip.scale_binding(*id),
            )
        })
        .collect();

    let mut out = vec![AffineTransform::IDENTITY; bones * (samples + 1)];
    for frame in 0..samples {
        for (bone, (t, r, s)) in bindings.iter().enumerate() {
            let translation = t.map_or(skeleton.default_translations[bone], |b| {
                clip.translations[frame * t_stride + b]
            });
            let rotation = r.map_or(skeleton.default_rotations[bone], |b| {
                clip.rotations[frame * r_stride + b]
            });
            let scale = s.map_or(skeleton.default_scales[bone], |b| {
                clip.scales[frame * s_stride + b]
            });
            out[frame * bones + bone] = AffineTransform::from_trs(translation, rotation, scale);
        }
    }
    for bone in 0..bones {
        out[samples * bones + bone] = out[bone].inverse();
    }
    out
}

#[derive(Debug)]
pub struct ClipBufferManager {
    heap: HeapAllocator,
    samples: GpuBuffer<AffineTransform>,
    instances: HashMap<u32, ClipInstance>,
    counts: RefCounts<u32>,
}

impl ClipBufferManager {
    pub fn new(heap_capacity: u32) -> Self {
        Self {
            heap: HeapAllocator::new("clip samples", heap_capacity, CLIP_HEAP_ALIGNMENT),
            samples: GpuBuffer::new("clip samples"),
            instances: HashMap::new(),
            counts: RefCounts::default(),
        }
    }

    /// Reference `clip` for `skeleton`, sampling it into the buffer on first
    /// use. Returns true when the instance was newly created.
    pub fn retain_clip_instance(&mut self, clip: &Clip, skeleton: &SkeletonDefinition) -> CoreResult<bool> {
        let key = instance_hash(clip.hash(), skeleton.hash());
        if self.counts.contains(key) {
            self.counts.increment(key);
            return Ok(false);
        }
        clip.check_sample_count()?;

        let matrices = sample_clip_instance_matrices(clip, skeleton);
        let block = self.heap.try_allocate(matrices.len() as u32)?;
        self.samples.resize_if_required(
            self.heap.one_past_highest_used_address() as usize,
            CLIP_SAMPLE_CHUNK,
            true,
        );
        if let Err(err) = self.samples.set_data(&matrices, block.begin as usize) {
            self.heap.release(block)?;
            return Err(err);
        }

        self.instances.insert(
            key,
            ClipInstance {
                clip_hash: clip.hash(),
                skeleton_hash: skeleton.hash(),
                bone_count: skeleton.bone_count() as u32,
                sample_count: clip.sample_count(),
                block,
            },
        );
        self.counts.increment(key);
        log::debug!(
            "clip {:08X} resident for skeleton {:08X} at [{}, {})",
            clip.hash(),
            skeleton.hash(),
            block.begin,
            block.end
        );
        Ok(true)
    }

    /// Drop one reference. Returns true when the samples were freed.
    pub fn release_clip_instance(&mut self, clip_hash: u32, skeleton_hash: u32) -> CoreResult<bool> {
        let key = instance_hash(clip_hash, skeleton_hash);
        if !self.counts.decrement(key) {
            return Ok(false);
        }
        if let Some(instance) = self.instances.remove(&key) {
            self.heap.release(instance.block)?;
            self.samples.resize_if_required(
                self.heap.one_past_highest_used_address() as usize,
                CLIP_SAMPLE_CHUNK,
                true,
            );
            log::debug!("clip {clip_hash:08X} released for skeleton {skeleton_hash:08X}");
        }
        Ok(true)
    }

    #[inline]
    pub fn instance(&self, instance_hash: u32) -> Option<&ClipInstance> {
        self.instances.get(&instance_hash)
    }

    #[inline]
    pub fn instances(&self) -> &HashMap<u32, ClipInstance> {
        &self.instances
    }

    pub fn reference_count(&self, clip_hash: u32, skeleton_hash: u32) -> u32 {
        self.counts.count(instance_hash(clip_hash, skeleton_hash))
    }

    #[inline]
    pub fn samples(&self) -> &GpuBuffer<AffineTransform> {
        &self.samples
    }

    #[inline]
    pub fn heap(&self) -> &HeapAllocator {
        &self.heap
    }
}
