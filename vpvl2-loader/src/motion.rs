use serde::{Deserialize, Serialize};

use crate::common::DEFAULT_INTERPOLATION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MotionFormatType {
    /// Legacy fixed-width keyframe records.
    #[default]
    Vmd,
    /// Extended records with per-track identifiers.
    Mvd,
}

/// Keyframes of one named target as they came out of a file. Order is not
/// guaranteed and a frame index may appear more than once; the last one wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTrackData<K> {
    pub name: String,
    pub keyframes: Vec<K>,
}

impl<K> MotionTrackData<K> {
    pub fn new(name: &str, keyframes: Vec<K>) -> Self {
        Self {
            name: name.to_owned(),
            keyframes,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Motion {
    pub target_model_name: String,
    pub format: MotionFormatType,
    pub bone_tracks: Vec<MotionTrackData<MotionBoneKeyframe>>,
    pub morph_tracks: Vec<MotionTrackData<MotionMorphKeyframe>>,
    pub camera_keyframes: Vec<MotionCameraKeyframe>,
    pub light_keyframes: Vec<MotionLightKeyframe>,
    pub model_keyframes: Vec<MotionModelKeyframe>,
}

impl Motion {
    pub fn num_keyframes(&self) -> usize {
        self.bone_tracks
            .iter()
            .map(|track| track.keyframes.len())
            .sum::<usize>()
            + self
                .morph_tracks
                .iter()
                .map(|track| track.keyframes.len())
                .sum::<usize>()
            + self.camera_keyframes.len()
            + self.light_keyframes.len()
            + self.model_keyframes.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionBoneKeyframeInterpolation {
    pub translation_x: [u8; 4],
    pub translation_y: [u8; 4],
    pub translation_z: [u8; 4],
    pub orientation: [u8; 4],
}

impl Default for MotionBoneKeyframeInterpolation {
    fn default() -> Self {
        Self {
            translation_x: DEFAULT_INTERPOLATION,
            translation_y: DEFAULT_INTERPOLATION,
            translation_z: DEFAULT_INTERPOLATION,
            orientation: DEFAULT_INTERPOLATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionBoneKeyframe {
    pub frame_index: u32,
    pub translation: [f32; 3],
    /// Quaternion stored as `[x, y, z, w]`.
    pub orientation: [f32; 4],
    pub interpolation: MotionBoneKeyframeInterpolation,
    pub is_physics_simulation_enabled: bool,
}

impl Default for MotionBoneKeyframe {
    fn default() -> Self {
        Self {
            frame_index: 0,
            translation: [0f32; 3],
            orientation: [0f32, 0f32, 0f32, 1f32],
            interpolation: MotionBoneKeyframeInterpolation::default(),
            is_physics_simulation_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionMorphKeyframe {
    pub frame_index: u32,
    pub weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionCameraKeyframeInterpolation {
    pub lookat_x: [u8; 4],
    pub lookat_y: [u8; 4],
    pub lookat_z: [u8; 4],
    pub angle: [u8; 4],
    pub fov: [u8; 4],
    pub distance: [u8; 4],
}

impl Default for MotionCameraKeyframeInterpolation {
    fn default() -> Self {
        Self {
            lookat_x: DEFAULT_INTERPOLATION,
            lookat_y: DEFAULT_INTERPOLATION,
            lookat_z: DEFAULT_INTERPOLATION,
            angle: DEFAULT_INTERPOLATION,
            fov: DEFAULT_INTERPOLATION,
            distance: DEFAULT_INTERPOLATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionCameraKeyframe {
    pub frame_index: u32,
    pub look_at: [f32; 3],
    /// Euler angles in radians.
    pub angle: [f32; 3],
    pub distance: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub interpolation: MotionCameraKeyframeInterpolation,
    pub is_perspective_view: bool,
}

impl Default for MotionCameraKeyframe {
    fn default() -> Self {
        Self {
            frame_index: 0,
            look_at: [0f32, 10f32, 0f32],
            angle: [0f32; 3],
            distance: 45f32,
            fov: 30f32,
            interpolation: MotionCameraKeyframeInterpolation::default(),
            is_perspective_view: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionLightKeyframe {
    pub frame_index: u32,
    pub color: [f32; 3],
    pub direction: [f32; 3],
}

impl Default for MotionLightKeyframe {
    fn default() -> Self {
        Self {
            frame_index: 0,
            color: [0.6f32; 3],
            direction: [-0.5f32, -1f32, 0.5f32],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionModelKeyframeConstraintState {
    /// Name of the bone owning the IK chain.
    pub bone_name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionModelKeyframe {
    pub frame_index: u32,
    pub visible: bool,
    pub constraint_states: Vec<MotionModelKeyframeConstraintState>,
    pub is_physics_simulation_enabled: bool,
}

impl Default for MotionModelKeyframe {
    fn default() -> Self {
        Self {
            frame_index: 0,
            visible: true,
            constraint_states: vec![],
            is_physics_simulation_enabled: true,
        }
    }
}
