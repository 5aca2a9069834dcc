use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::{check_hash, check_len};
use crate::error::{CoreError, CoreResult};
use crate::hash::{ContentHasher, StringHash};

const KIND: &str = "clip";

/// Keyframe indices are 16-bit on the GPU.
pub const MAX_SAMPLE_COUNT: u32 = u16::MAX as u32 + 1;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    Loop,
    Once,
}

impl WrapMode {
    /// Map an unbounded state time into the clip's `[0, length]` range.
    pub fn wrap(self, time: f32, length: f32) -> f32 {
        if length <= 0.0 {
            return 0.0;
        }
        match self {
            WrapMode::Loop => {
                let m = time % length;
                if m < 0.0 {
                    m + length
                } else {
                    m
                }
            }
            WrapMode::Once => time.clamp(0.0, length),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipEvent {
    pub name: StringHash,
    pub time: f32,
    pub int_value: i32,
    pub float_value: f32,
}

/// Pre-sampled local transforms of the bound bones.
///
/// Samples are laid out frame-major: `translations[frame * translation_bindings.len() + binding]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: StringHash,
    pub frame_rate: f32,
    pub length: f32,
    pub wrap_mode: WrapMode,
    pub translation_bindings: Vec<StringHash>,
    pub rotation_bindings: Vec<StringHash>,
    pub scale_bindings: Vec<StringHash>,
    pub translations: Vec<Vec3>,
    pub rotations: Vec<Quat>,
    pub scales: Vec<Vec3>,
    pub events: Vec<ClipEvent>,
    #[serde(skip)]
    hash: u32,
}

/// `ceil(frame_rate * length)`
#[inline]
pub fn frame_count(frame_rate: f32, length: f32) -> u32 {
    (frame_rate * length).ceil().max(0.0) as u32
}

#[inline]
pub fn sample_count(frame_rate: f32, length: f32) -> u32 {
    frame_count(frame_rate, length) + 1
}

/// How far the last sampled frame overshoots the clip end, in frames.
#[inline]
pub fn last_frame_error(frame_rate: f32, length: f32) -> f32 {
    frame_count(frame_rate, length) as f32 - length * frame_rate
}

impl Clip {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: StringHash,
        frame_rate: f32,
        length: f32,
        wrap_mode: WrapMode,
        translation_bindings: Vec<StringHash>,
        rotation_bindings: Vec<StringHash>,
        scale_bindings: Vec<StringHash>,
        translations: Vec<Vec3>,
        rotations: Vec<Quat>,
        scales: Vec<Vec3>,
        events: Vec<ClipEvent>,
    ) -> Self {
        let mut clip = Self {
            name,
            frame_rate,
            length,
            wrap_mode,
            translation_bindings,
            rotation_bindings,
            scale_bindings,
            translations,
            rotations,
            scales,
            events,
            hash: 0,
        };
        clip.rehash();
        clip
    }

    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut clip: Self = serde_json::from_str(json)?;
        clip.rehash();
        Ok(clip)
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
        h.write_f32(self.frame_rate)
            .write_f32(self.length)
            .write_u32(self.wrap_mode as u32)
            .write_slice(&self.translation_bindings)
            .write_slice(&self.rotation_bindings)
            .write_slice(&self.scale_bindings)
            .write_slice(&self.translations)
            .write_slice(&self.scales)
            .write_slice(&self.rotations);
        h.write_u32(self.events.len() as u32);
        for e in &self.events {
            h.write_pod(&e.name)
                .write_f32(e.time)
                .write_i32(e.int_value)
                .write_f32(e.float_value);
        }
        h.finish()
    }

    #[inline]
    pub fn frame_count(&self) -> u32 {
        frame_count(self.frame_rate, self.length)
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        sample_count(self.frame_rate, self.length)
    }

    #[inline]
    pub fn last_frame_error(&self) -> f32 {
        last_frame_error(self.frame_rate, self.length)
    }

    pub fn translation_binding(&self, bone: StringHash) -> Option<usize> {
        self.translation_bindings.iter().position(|b| *b == bone)
    }

    pub fn rotation_binding(&self, bone: StringHash) -> Option<usize> {
        self.rotation_bindings.iter().position(|b| *b == bone)
    }

    pub fn scale_binding(&self, bone: StringHash) -> Option<usize> {
        self.scale_bindings.iter().position(|b| *b == bone)
    }

    /// Fails when a keyframe index would not fit the command's 16-bit fields.
    pub fn check_sample_count(&self) -> CoreResult<()> {
        let samples = self.sample_count();
        if samples > MAX_SAMPLE_COUNT {
            return Err(CoreError::invalid(
                KIND,
                format!("{samples} samples exceed the limit of {MAX_SAMPLE_COUNT}"),
            ));
        }
        Ok(())
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(self.frame_rate > 0.0) || !self.frame_rate.is_finite() {
            return Err(CoreError::invalid(
                KIND,
                format!("frame rate {} must be positive", self.frame_rate),
            ));
        }
        if !(self.length >= 0.0) || !self.length.is_finite() {
            return Err(CoreError::invalid(
                KIND,
                format!("length {} must be non-negative", self.length),
            ));
        }
        self.check_sample_count()?;
        let samples = self.sample_count() as usize;
        check_len(
            KIND,
            "translations",
            self.translations.len(),
            samples * self.translation_bindings.len(),
        )?;
        check_len(
            KIND,
            "rotations",
            self.rotations.len(),
            samples * self.rotation_bindings.len(),
        )?;
        check_len(
            KIND,
            "scales",
            self.scales.len(),
            samples * self.scale_bindings.len(),
        )?;
        check_hash(KIND, self.hash, self.compute_hash())
    }
}
