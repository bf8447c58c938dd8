use std::collections::BTreeMap;

use cgmath::{Deg, Quaternion, Rad, Vector3};
use vpvl2_loader::motion::{
    MotionBoneKeyframe, MotionCameraKeyframe, MotionLightKeyframe, MotionModelKeyframe,
    MotionModelKeyframeConstraintState, MotionMorphKeyframe,
};

use crate::{
    error::Vpvl2Error,
    utils::{f32x3_to_vec3, f32x4_to_quat},
};

use super::interpolation::{BoneKeyframeInterpolation, CameraKeyframeInterpolation};

pub trait Keyframe: Clone {
    fn frame_index(&self) -> u32;

    fn with_frame_index(self, frame_index: u32) -> Self;
}

macro_rules! impl_keyframe {
    ($typ: ty) => {
        impl Keyframe for $typ {
            fn frame_index(&self) -> u32 {
                self.frame_index
            }

            fn with_frame_index(mut self, frame_index: u32) -> Self {
                self.frame_index = frame_index;
                self
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoneKeyframe {
    pub frame_index: u32,
    pub translation: Vector3<f32>,
    pub orientation: Quaternion<f32>,
    pub interpolation: BoneKeyframeInterpolation,
    pub enable_physics: bool,
}

impl_keyframe!(BoneKeyframe);

impl BoneKeyframe {
    pub fn new(frame_index: u32, translation: Vector3<f32>, orientation: Quaternion<f32>) -> Self {
        Self {
            frame_index,
            translation,
            orientation,
            interpolation: BoneKeyframeInterpolation::default(),
            enable_physics: true,
        }
    }

    /// Converts a decoded keyframe. A zero length quaternion cannot be normalized and is rejected.
    pub fn from_raw(name: &str, v: &MotionBoneKeyframe) -> Result<Self, Vpvl2Error> {
        let orientation = f32x4_to_quat(v.orientation);
        let magnitude = cgmath::InnerSpace::magnitude(orientation);
        if !magnitude.is_finite() || magnitude <= f32::EPSILON {
            return Err(Vpvl2Error::invalid_motion(format!(
                "bone keyframe {} of \"{}\" has a degenerate orientation",
                v.frame_index, name
            )));
        }
        Ok(Self {
            frame_index: v.frame_index,
            translation: f32x3_to_vec3(v.translation),
            orientation: orientation / magnitude,
            interpolation: v.interpolation.into(),
            enable_physics: v.is_physics_simulation_enabled,
        })
    }

    pub fn to_raw(&self) -> MotionBoneKeyframe {
        MotionBoneKeyframe {
            frame_index: self.frame_index,
            translation: self.translation.into(),
            orientation: [
                self.orientation.v.x,
                self.orientation.v.y,
                self.orientation.v.z,
                self.orientation.s,
            ],
            interpolation: self.interpolation.to_raw(),
            is_physics_simulation_enabled: self.enable_physics,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MorphKeyframe {
    pub frame_index: u32,
    pub weight: f32,
}

impl_keyframe!(MorphKeyframe);

impl From<&MotionMorphKeyframe> for MorphKeyframe {
    fn from(v: &MotionMorphKeyframe) -> Self {
        Self {
            frame_index: v.frame_index,
            weight: v.weight,
        }
    }
}

impl MorphKeyframe {
    pub fn to_raw(&self) -> MotionMorphKeyframe {
        MotionMorphKeyframe {
            frame_index: self.frame_index,
            weight: self.weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CameraKeyframe {
    pub frame_index: u32,
    pub look_at: Vector3<f32>,
    pub angle: Vector3<f32>,
    pub distance: f32,
    pub fov: Rad<f32>,
    pub is_perspective: bool,
    pub interpolation: CameraKeyframeInterpolation,
}

impl_keyframe!(CameraKeyframe);

impl From<&MotionCameraKeyframe> for CameraKeyframe {
    fn from(v: &MotionCameraKeyframe) -> Self {
        Self {
            frame_index: v.frame_index,
            look_at: f32x3_to_vec3(v.look_at),
            angle: f32x3_to_vec3(v.angle),
            distance: v.distance,
            fov: Deg(v.fov).into(),
            is_perspective: v.is_perspective_view,
            interpolation: v.interpolation.into(),
        }
    }
}

impl CameraKeyframe {
    pub fn to_raw(&self) -> MotionCameraKeyframe {
        MotionCameraKeyframe {
            frame_index: self.frame_index,
            look_at: self.look_at.into(),
            angle: self.angle.into(),
            distance: self.distance,
            fov: Deg::from(self.fov).0,
            interpolation: self.interpolation.to_raw(),
            is_perspective_view: self.is_perspective,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LightKeyframe {
    pub frame_index: u32,
    pub color: Vector3<f32>,
    pub direction: Vector3<f32>,
}

impl_keyframe!(LightKeyframe);

impl From<&MotionLightKeyframe> for LightKeyframe {
    fn from(v: &MotionLightKeyframe) -> Self {
        Self {
            frame_index: v.frame_index,
            color: f32x3_to_vec3(v.color),
            direction: f32x3_to_vec3(v.direction),
        }
    }
}

impl LightKeyframe {
    pub fn to_raw(&self) -> MotionLightKeyframe {
        MotionLightKeyframe {
            frame_index: self.frame_index,
            color: self.color.into(),
            direction: self.direction.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelKeyframe {
    pub frame_index: u32,
    pub visible: bool,
    /// IK enable state keyed by the name of the bone owning the chain.
    pub constraint_states: BTreeMap<String, bool>,
    pub enable_physics: bool,
}

impl_keyframe!(ModelKeyframe);

impl From<&MotionModelKeyframe> for ModelKeyframe {
    fn from(v: &MotionModelKeyframe) -> Self {
        Self {
            frame_index: v.frame_index,
            visible: v.visible,
            constraint_states: v
                .constraint_states
                .iter()
                .map(|state: &MotionModelKeyframeConstraintState| {
                    (state.bone_name.clone(), state.enabled)
                })
                .collect(),
            enable_physics: v.is_physics_simulation_enabled,
        }
    }
}

impl ModelKeyframe {
    pub fn to_raw(&self) -> MotionModelKeyframe {
        MotionModelKeyframe {
            frame_index: self.frame_index,
            visible: self.visible,
            constraint_states: self
                .constraint_states
                .iter()
                .map(|(bone_name, enabled)| MotionModelKeyframeConstraintState {
                    bone_name: bone_name.clone(),
                    enabled: *enabled,
                })
                .collect(),
            is_physics_simulation_enabled: self.enable_physics,
        }
    }
}
