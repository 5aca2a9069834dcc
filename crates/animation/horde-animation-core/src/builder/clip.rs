//! Clip builder: samples continuous curves at the clip frame rate.

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::definition::clip::{frame_count, last_frame_error, sample_count};
use crate::definition::{Clip, ClipEvent, WrapMode, MAX_SAMPLE_COUNT};
use crate::error::BuildError;
use crate::hash::StringHash;

type Curve<T> = Box<dyn Fn(f32) -> T + Send + Sync>;

/// Values that can be sampled from linear keyframe tracks.
trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
    /// Extrapolating blend used for the final sample.
    fn extrapolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }

    fn extrapolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }

    fn extrapolate(a: Self, b: Self, t: f32) -> Self {
        Quat::from_vec4(Vec4::from(a).lerp(Vec4::from(b), t)).normalize()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}

/// Linear keyframe track bound to a bone path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackAuthoring<T> {
    pub path: String,
    pub keys: Vec<Keyframe<T>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventAuthoring {
    pub name: String,
    pub time: f32,
    #[serde(default)]
    pub int_value: i32,
    #[serde(default)]
    pub float_value: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipAuthoring {
    pub name: String,
    pub frame_rate: f32,
    pub length: f32,
    #[serde(default)]
    pub wrap_mode: WrapMode,
    #[serde(default)]
    pub translations: Vec<TrackAuthoring<Vec3>>,
    #[serde(default)]
    pub rotations: Vec<TrackAuthoring<Quat>>,
    #[serde(default)]
    pub scales: Vec<TrackAuthoring<Vec3>>,
    #[serde(default)]
    pub events: Vec<EventAuthoring>,
}

fn keyframe_curve<T>(track: &TrackAuthoring<T>) -> Result<Curve<T>, BuildError>
where
    T: Interpolate + Send + Sync + 'static,
{
    if track.keys.is_empty() {
        return Err(BuildError::invalid(format!("track '{}' has no keys", track.path)));
    }
    let mut keys = track.keys.clone();
    keys.sort_by(|a, b| a.time.total_cmp(&b.time));
    Ok(Box::new(move |t: f32| {
        let after = keys.partition_point(|k| k.time <= t);
        if after == 0 {
            return keys[0].value;
        }
        let a = &keys[after - 1];
        match keys.get(after) {
            Some(b) => {
                let span = b.time - a.time;
                let u = if span > 0.0 { (t - a.time) / span } else { 0.0 };
                T::interpolate(a.value, b.value, u)
            }
            None => a.value,
        }
    }))
}

/// Samples `frame_count` frames at `frame / frame_rate` plus one final frame
/// extrapolated so that interpolating towards it lands on the value at
/// `length` exactly.
pub struct ClipBuilder {
    name: String,
    frame_rate: f32,
    length: f32,
    wrap_mode: WrapMode,
    translations: Vec<(String, Curve<Vec3>)>,
    rotations: Vec<(String, Curve<Quat>)>,
    scales: Vec<(String, Curve<Vec3>)>,
    events: Vec<EventAuthoring>,
}

impl ClipBuilder {
    pub fn new(name: impl Into<String>, frame_rate: f32, length: f32) -> Self {
        Self {
            name: name.into(),
            frame_rate,
            length,
            wrap_mode: WrapMode::Loop,
            translations: Vec::new(),
            rotations: Vec::new(),
            scales: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn from_authoring(authoring: &ClipAuthoring) -> Result<Self, BuildError> {
        let mut builder = Self::new(authoring.name.clone(), authoring.frame_rate, authoring.length)
            .wrap_mode(authoring.wrap_mode);
        for track in &authoring.translations {
            builder
                .translations
                .push((track.path.clone(), keyframe_curve(track)?));
        }
        for track in &authoring.rotations {
            let normalized = TrackAuthoring {
                path: track.path.clone(),
                keys: track
                    .keys
                    .iter()
                    .map(|k| Keyframe {
                        time: k.time,
                        value: k.value.normalize(),
                    })
                    .collect(),
            };
            builder
                .rotations
                .push((track.path.clone(), keyframe_curve(&normalized)?));
        }
        for track in &authoring.scales {
            builder.scales.push((track.path.clone(), keyframe_curve(track)?));
        }
        builder.events = authoring.events.clone();
        Ok(builder)
    }

    pub fn wrap_mode(mut self, wrap_mode: WrapMode) -> Self {
        self.wrap_mode = wrap_mode;
        self
    }

    pub fn translation(
        mut self,
        path: impl Into<String>,
        curve: impl Fn(f32) -> Vec3 + Send + Sync + 'static,
    ) -> Self {
        let curve: Curve<Vec3> = Box::new(curve);
        self.translations.push((path.into(), curve));
        self
    }

    pub fn rotation(
        mut self,
        path: impl Into<String>,
        curve: impl Fn(f32) -> Quat + Send + Sync + 'static,
    ) -> Self {
        let curve: Curve<Quat> = Box::new(curve);
        self.rotations.push((path.into(), curve));
        self
    }

    pub fn scale(
        mut self,
        path: impl Into<String>,
        curve: impl Fn(f32) -> Vec3 + Send + Sync + 'static,
    ) -> Self {
        let curve: Curve<Vec3> = Box::new(curve);
        self.scales.push((path.into(), curve));
        self
    }

    pub fn event(mut self, name: impl Into<String>, time: f32, int_value: i32, float_value: f32) -> Self {
        self.events.push(EventAuthoring {
            name: name.into(),
            time,
            int_value,
            float_value,
        });
        self
    }

    fn sample<T: Interpolate>(&self, curves: &[(String, Curve<T>)]) -> Vec<T> {
        let frames = frame_count(self.frame_rate, self.length) as usize;
        let error = last_frame_error(self.frame_rate, self.length);
        let stride = curves.len();
        let mut out = Vec::with_capacity((frames + 1) * stride);
        for frame in 0..frames {
            let t = frame as f32 / self.frame_rate;
            out.extend(curves.iter().map(|(_, curve)| curve(t)));
        }
        for (binding, (_, curve)) in curves.iter().enumerate() {
            let at_length = curve(self.length);
            let last = if frames > 0 && error < 1.0 {
                let previous = out[(frames - 1) * stride + binding];
                T::extrapolate(previous, at_length, 1.0 / (1.0 - error))
            } else {
                at_length
            };
            out.push(last);
        }
        out
    }

    pub fn build(&self) -> Result<Clip, BuildError> {
        if !(self.frame_rate > 0.0) {
            return Err(BuildError::invalid(format!(
                "clip '{}': frame rate {} must be positive",
                self.name, self.frame_rate
            )));
        }
        if !(self.length >= 0.0) {
            return Err(BuildError::invalid(format!(
                "clip '{}': length {} must be non-negative",
                self.name, self.length
            )));
        }
        let samples = sample_count(self.frame_rate, self.length);
        if samples > MAX_SAMPLE_COUNT {
            return Err(BuildError::invalid(format!(
                "clip '{}': {samples} samples exceed the limit of {MAX_SAMPLE_COUNT}",
                self.name
            )));
        }
        let clip = Clip::new(
            StringHash::new(&self.name),
            self.frame_rate,
            self.length,
            self.wrap_mode,
            bindings_of(&self.translations),
            bindings_of(&self.rotations),
            bindings_of(&self.scales),
            self.sample(&self.translations),
            self.sample(&self.rotations),
            self.sample(&self.scales),
            self.events
                .iter()
                .map(|e| ClipEvent {
                    name: StringHash::new(&e.name),
                    time: e.time,
                    int_value: e.int_value,
                    float_value: e.float_value,
                })
                .collect(),
        );
        Ok(clip)
    }
}

fn bindings_of<T>(curves: &[(String, Curve<T>)]) -> Vec<StringHash> {
    curves.iter().map(|(path, _)| StringHash::new(path)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "left={a} right={b}");
    }

    #[test]
    fn rejects_clips_past_keyframe_range() {
        let err = ClipBuilder::new("crowd_loop", 30.0, 2300.0)
            .translation("root", |t| Vec3::new(t, 0.0, 0.0))
            .build()
            .err()
            .expect("too many samples");
        assert!(matches!(err, BuildError::Invalid { .. }));
    }

    #[test]
    fn samples_frames_plus_one() {
        let clip = ClipBuilder::new("walk", 30.0, 1.0)
            .translation("root", |t| Vec3::new(t, 0.0, 0.0))
            .build()
            .unwrap();
        assert_eq!(clip.sample_count(), 31);
        assert_eq!(clip.translations.len(), 31);
        approx(clip.translations[15].x, 0.5);
        approx(clip.translations[30].x, 1.0);
    }

    #[test]
    fn last_frame_lands_on_length_when_interpolated() {
        // 1.01s at 30fps: 31 frames, the last one overshooting by 0.7 frames.
        let clip = ClipBuilder::new("walk", 30.0, 1.01)
            .translation("root", |t| Vec3::new(t, 0.0, 0.0))
            .build()
            .unwrap();
        let n = clip.sample_count() as usize;
        let before = clip.translations[n - 2].x;
        let last = clip.translations[n - 1].x;
        let w = 1.0 - clip.last_frame_error();
        approx(before + (last - before) * w, 1.01);
    }

    #[test]
    fn keyframe_tracks_interpolate_linearly() {
        let authoring = ClipAuthoring {
            name: "bob".into(),
            frame_rate: 10.0,
            length: 1.0,
            wrap_mode: WrapMode::Loop,
            translations: vec![TrackAuthoring {
                path: "root".into(),
                keys: vec![
                    Keyframe { time: 0.0, value: Vec3::ZERO },
                    Keyframe { time: 1.0, value: Vec3::new(0.0, 2.0, 0.0) },
                ],
            }],
            rotations: Vec::new(),
            scales: Vec::new(),
            events: vec![EventAuthoring {
                name: "step".into(),
                time: 0.5,
                int_value: 1,
                float_value: 0.0,
            }],
        };
        let clip = ClipBuilder::from_authoring(&authoring).unwrap().build().unwrap();
        approx(clip.translations[5].y, 1.0);
        assert_eq!(clip.events[0].name, StringHash::new("step"));
    }

    #[test]
    fn same_authoring_rebuilds_to_same_hash() {
        let build = || {
            ClipBuilder::new("wave", 24.0, 0.5)
                .rotation("arm", |t| Quat::from_rotation_z(t))
                .build()
                .unwrap()
        };
        assert_eq!(build().hash(), build().hash());
        assert_ne!(build().hash(), 0);
    }
}
