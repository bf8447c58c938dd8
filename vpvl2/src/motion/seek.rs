use std::collections::BTreeMap;

use cgmath::{ElementWise, One, Quaternion, Rad, Vector3, VectorSpace, Zero};

use crate::{
    bezier_curve::BezierCurveFactory,
    utils::{lerp_f32, slerp_shortest},
};

use super::{
    interpolation::coefficient,
    keyframe::{BoneKeyframe, CameraKeyframe, Keyframe, LightKeyframe, ModelKeyframe, MorphKeyframe},
    track::{Bracket, KeyframeTrack},
};

/// Samples a track at a fractional frame time. `seek` returns `None` for a track without
/// keyframes; callers skip such tracks.
pub trait Seek {
    type Frame;

    fn find(&self, frame_index: u32) -> Option<Self::Frame>;

    fn seek(&self, time: f32, curve_factory: &dyn BezierCurveFactory) -> Option<Self::Frame>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneFrameTransform {
    pub translation: Vector3<f32>,
    pub orientation: Quaternion<f32>,
    pub enable_physics: bool,
}

impl Default for BoneFrameTransform {
    fn default() -> Self {
        Self {
            translation: Vector3::zero(),
            orientation: Quaternion::one(),
            enable_physics: true,
        }
    }
}

impl From<&BoneKeyframe> for BoneFrameTransform {
    fn from(v: &BoneKeyframe) -> Self {
        Self {
            translation: v.translation,
            orientation: v.orientation,
            enable_physics: v.enable_physics,
        }
    }
}

impl BoneFrameTransform {
    pub fn lerp(&self, other: &Self, amount: f32) -> Self {
        Self {
            translation: self.translation.lerp(other.translation, amount),
            orientation: slerp_shortest(self.orientation, other.orientation, amount),
            enable_physics: if amount < 0.5f32 {
                self.enable_physics
            } else {
                other.enable_physics
            },
        }
    }
}

impl Seek for KeyframeTrack<BoneKeyframe> {
    type Frame = BoneFrameTransform;

    fn find(&self, frame_index: u32) -> Option<Self::Frame> {
        KeyframeTrack::find(self, frame_index).map(|keyframe| keyframe.into())
    }

    fn seek(&self, time: f32, bezier_factory: &dyn BezierCurveFactory) -> Option<Self::Frame> {
        match self.search_closest(time) {
            Bracket::Empty => None,
            Bracket::Single(keyframe) => Some(keyframe.into()),
            Bracket::Between(prev_frame, next_frame) => {
                let coef =
                    coefficient(prev_frame.frame_index(), next_frame.frame_index(), time);
                let interpolation = &next_frame.interpolation;
                let amounts = interpolation
                    .translation
                    .map(|point| point.curve_value(coef, bezier_factory));
                let translation = prev_frame.translation
                    + (next_frame.translation - prev_frame.translation).mul_element_wise(amounts);
                let amount = interpolation
                    .orientation
                    .curve_value(coef, bezier_factory);
                let orientation =
                    slerp_shortest(prev_frame.orientation, next_frame.orientation, amount);
                Some(BoneFrameTransform {
                    translation,
                    orientation,
                    enable_physics: prev_frame.enable_physics && next_frame.enable_physics,
                })
            }
        }
    }
}

impl Seek for KeyframeTrack<MorphKeyframe> {
    type Frame = f32;

    fn find(&self, frame_index: u32) -> Option<Self::Frame> {
        KeyframeTrack::find(self, frame_index).map(|keyframe| keyframe.weight)
    }

    fn seek(&self, time: f32, _curve_factory: &dyn BezierCurveFactory) -> Option<Self::Frame> {
        match self.search_closest(time) {
            Bracket::Empty => None,
            Bracket::Single(keyframe) => Some(keyframe.weight),
            Bracket::Between(prev_frame, next_frame) => {
                let coef =
                    coefficient(prev_frame.frame_index(), next_frame.frame_index(), time);
                Some(lerp_f32(prev_frame.weight, next_frame.weight, coef))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    pub look_at: Vector3<f32>,
    pub angle: Vector3<f32>,
    pub fov: Rad<f32>,
    pub distance: f32,
    pub perspective: bool,
}

impl From<&CameraKeyframe> for CameraTransform {
    fn from(v: &CameraKeyframe) -> Self {
        Self {
            look_at: v.look_at,
            angle: v.angle,
            fov: v.fov,
            distance: v.distance,
            perspective: v.is_perspective,
        }
    }
}

impl Seek for KeyframeTrack<CameraKeyframe> {
    type Frame = CameraTransform;

    fn find(&self, frame_index: u32) -> Option<Self::Frame> {
        KeyframeTrack::find(self, frame_index).map(|keyframe| keyframe.into())
    }

    fn seek(&self, time: f32, bezier_factory: &dyn BezierCurveFactory) -> Option<Self::Frame> {
        match self.search_closest(time) {
            Bracket::Empty => None,
            Bracket::Single(keyframe) => Some(keyframe.into()),
            Bracket::Between(prev_frame, next_frame) => {
                let coef =
                    coefficient(prev_frame.frame_index(), next_frame.frame_index(), time);
                let interpolation = &next_frame.interpolation;
                let look_at_amounts = interpolation
                    .lookat
                    .map(|point| point.curve_value(coef, bezier_factory));
                let look_at = prev_frame.look_at
                    + (next_frame.look_at - prev_frame.look_at).mul_element_wise(look_at_amounts);
                let angle = prev_frame.angle.lerp(
                    next_frame.angle,
                    interpolation.angle.curve_value(coef, bezier_factory),
                );
                let fov = Rad(lerp_f32(
                    prev_frame.fov.0,
                    next_frame.fov.0,
                    interpolation.fov.curve_value(coef, bezier_factory),
                ));
                let distance = lerp_f32(
                    prev_frame.distance,
                    next_frame.distance,
                    interpolation.distance.curve_value(coef, bezier_factory),
                );
                Some(CameraTransform {
                    look_at,
                    angle,
                    fov,
                    distance,
                    perspective: prev_frame.is_perspective,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightFrame {
    pub color: Vector3<f32>,
    pub direction: Vector3<f32>,
}

impl Seek for KeyframeTrack<LightKeyframe> {
    type Frame = LightFrame;

    fn find(&self, frame_index: u32) -> Option<Self::Frame> {
        KeyframeTrack::find(self, frame_index).map(|keyframe| LightFrame {
            color: keyframe.color,
            direction: keyframe.direction,
        })
    }

    fn seek(&self, time: f32, _curve_factory: &dyn BezierCurveFactory) -> Option<Self::Frame> {
        match self.search_closest(time) {
            Bracket::Empty => None,
            Bracket::Single(keyframe) => Some(LightFrame {
                color: keyframe.color,
                direction: keyframe.direction,
            }),
            Bracket::Between(prev_frame, next_frame) => {
                let coef =
                    coefficient(prev_frame.frame_index(), next_frame.frame_index(), time);
                Some(LightFrame {
                    color: prev_frame.color.lerp(next_frame.color, coef),
                    direction: prev_frame.direction.lerp(next_frame.direction, coef),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelFrame {
    pub visible: bool,
    pub constraint_states: BTreeMap<String, bool>,
    pub enable_physics: bool,
}

impl From<&ModelKeyframe> for ModelFrame {
    fn from(v: &ModelKeyframe) -> Self {
        Self {
            visible: v.visible,
            constraint_states: v.constraint_states.clone(),
            enable_physics: v.enable_physics,
        }
    }
}

impl Seek for KeyframeTrack<ModelKeyframe> {
    type Frame = ModelFrame;

    fn find(&self, frame_index: u32) -> Option<Self::Frame> {
        KeyframeTrack::find(self, frame_index).map(|keyframe| keyframe.into())
    }

    /// Model state does not interpolate; the previous keyframe holds until the next one.
    fn seek(&self, time: f32, _curve_factory: &dyn BezierCurveFactory) -> Option<Self::Frame> {
        match self.search_closest(time) {
            Bracket::Empty => None,
            Bracket::Single(keyframe) | Bracket::Between(keyframe, _) => Some(keyframe.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, InnerSpace, Rotation3};

    use super::*;
    use crate::{bezier_curve::BezierCurveCache, motion::interpolation::KeyframeInterpolationPoint};

    fn bone(frame_index: u32, translation: Vector3<f32>) -> BoneKeyframe {
        BoneKeyframe::new(frame_index, translation, Quaternion::one())
    }

    #[test]
    fn test_bone_track_clamps_at_both_ends() {
        let cache = BezierCurveCache::default();
        let mut track = KeyframeTrack::new("center");
        track.insert(bone(10, Vector3::new(1f32, 0f32, 0f32)));
        track.insert(bone(50, Vector3::new(5f32, 0f32, 0f32)));
        assert_eq!(track.seek(0f32, &cache), track.seek(10f32, &cache));
        assert_eq!(track.seek(100f32, &cache), track.seek(50f32, &cache));
        assert_eq!(
            Some(Vector3::new(5f32, 0f32, 0f32)),
            track.seek(100f32, &cache).map(|f| f.translation)
        );
    }

    #[test]
    fn test_bone_track_linear_translation() {
        let cache = BezierCurveCache::default();
        let mut track = KeyframeTrack::new("center");
        track.insert(bone(0, Vector3::new(0f32, 0f32, 0f32)));
        track.insert(bone(30, Vector3::new(3f32, 6f32, -9f32)));
        for i in 0..=30 {
            let t = i as f32;
            let frame = track.seek(t, &cache).unwrap();
            let expected = Vector3::new(3f32, 6f32, -9f32) * (t / 30f32);
            assert!((frame.translation - expected).magnitude2() < 1e-8);
        }
    }

    #[test]
    fn test_bone_track_rotation_uses_slerp() {
        let cache = BezierCurveCache::default();
        let mut track = KeyframeTrack::new("arm");
        track.insert(BoneKeyframe::new(0, Vector3::zero(), Quaternion::one()));
        track.insert(BoneKeyframe::new(
            10,
            Vector3::zero(),
            Quaternion::from_angle_z(Deg(90f32)),
        ));
        let frame = track.seek(5f32, &cache).unwrap();
        let expected = Quaternion::from_angle_z(Deg(45f32));
        assert!((frame.orientation.s - expected.s).abs() < 1e-5);
        assert!((frame.orientation.v.z - expected.v.z).abs() < 1e-5);
    }

    #[test]
    fn test_bone_track_eased_curve() {
        let cache = BezierCurveCache::default();
        let mut track = KeyframeTrack::new("center");
        track.insert(bone(0, Vector3::zero()));
        let mut next = bone(10, Vector3::new(10f32, 0f32, 0f32));
        next.interpolation.translation.x = KeyframeInterpolationPoint::new(&[127, 0, 127, 0]);
        track.insert(next);
        let frame = track.seek(5f32, &cache).unwrap();
        assert!(frame.translation.x < 5f32);
        assert_eq!(0f32, frame.translation.y);
    }

    #[test]
    fn test_single_and_empty_tracks() {
        let cache = BezierCurveCache::default();
        let mut track: KeyframeTrack<MorphKeyframe> = KeyframeTrack::new("blink");
        assert_eq!(None, track.seek(0f32, &cache));
        track.insert(MorphKeyframe {
            frame_index: 7,
            weight: 0.75f32,
        });
        for t in [0f32, 7f32, 100f32, 1e7f32] {
            assert_eq!(Some(0.75f32), track.seek(t, &cache));
        }
    }

    #[test]
    fn test_model_track_is_stepped() {
        let cache = BezierCurveCache::default();
        let mut track = KeyframeTrack::new("");
        track.insert(ModelKeyframe {
            frame_index: 0,
            visible: true,
            constraint_states: BTreeMap::new(),
            enable_physics: true,
        });
        track.insert(ModelKeyframe {
            frame_index: 10,
            visible: false,
            constraint_states: BTreeMap::new(),
            enable_physics: true,
        });
        assert_eq!(Some(true), track.seek(9.9f32, &cache).map(|f| f.visible));
        assert_eq!(Some(false), track.seek(10f32, &cache).map(|f| f.visible));
    }
}
