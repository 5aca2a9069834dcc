//! Sample-pair lookup for a clip time.

use crate::definition::WrapMode;

/// Two neighbouring samples and the interpolation weight between them.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ClipKeyframe {
    pub left: u16,
    pub right: u16,
    pub weight: f32,
}

impl ClipKeyframe {
    /// Keyframe of an unbounded state `time` within a clip of `length` seconds
    /// sampled at `frame_rate` into `sample_count` samples.
    pub fn new(time: f32, length: f32, frame_rate: f32, sample_count: u32, wrap_mode: WrapMode) -> Self {
        if sample_count == 0 || length <= 0.0 {
            return Self::default();
        }
        let frame = wrap_mode.wrap(time, length) * frame_rate;
        let last = sample_count - 1;
        let left = (frame.floor().max(0.0) as u32).min(last);
        let right = match wrap_mode {
            WrapMode::Loop => (left + 1) % sample_count,
            WrapMode::Once => (left + 1).min(last),
        };
        Self {
            left: left as u16,
            right: right as u16,
            weight: frame - frame.floor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_wraps_right_sample() {
        // 1s at 4fps: samples 0..=4
        let k = ClipKeyframe::new(0.99, 1.0, 4.0, 5, WrapMode::Loop);
        assert_eq!((k.left, k.right), (3, 4));
        assert!((k.weight - 0.96).abs() < 1e-4);

        let k = ClipKeyframe::new(1.25, 1.0, 4.0, 5, WrapMode::Loop);
        assert_eq!((k.left, k.right), (1, 2));
        assert!(k.weight.abs() < 1e-4);
    }

    #[test]
    fn once_clamps_at_end() {
        let k = ClipKeyframe::new(5.0, 1.0, 4.0, 5, WrapMode::Once);
        assert_eq!((k.left, k.right), (4, 4));
        let k = ClipKeyframe::new(-1.0, 1.0, 4.0, 5, WrapMode::Once);
        assert_eq!((k.left, k.right), (0, 1));
        assert_eq!(k.weight, 0.0);
    }

    #[test]
    fn empty_clip_is_zero() {
        assert_eq!(ClipKeyframe::new(0.3, 0.0, 30.0, 1, WrapMode::Loop), ClipKeyframe::default());
    }
}
