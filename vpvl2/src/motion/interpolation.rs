use cgmath::{Vector2, Vector3};
use vpvl2_loader::motion::{MotionBoneKeyframeInterpolation, MotionCameraKeyframeInterpolation};

use crate::bezier_curve::BezierCurveFactory;

/// Progress of `time` between two frame indices, `0` when they coincide.
pub fn coefficient(prev_frame_index: u32, next_frame_index: u32, time: f32) -> f32 {
    if next_frame_index <= prev_frame_index {
        0f32
    } else {
        let interval = (next_frame_index - prev_frame_index) as f32;
        ((time - prev_frame_index as f32) / interval).clamp(0f32, 1f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyframeInterpolationPoint {
    pub control_point1: Vector2<u8>,
    pub control_point2: Vector2<u8>,
    pub is_linear: bool,
}

impl Default for KeyframeInterpolationPoint {
    fn default() -> Self {
        Self {
            control_point1: Vector2::new(20, 20),
            control_point2: Vector2::new(107, 107),
            is_linear: true,
        }
    }
}

impl From<[u8; 4]> for KeyframeInterpolationPoint {
    fn from(v: [u8; 4]) -> Self {
        Self::new(&v)
    }
}

impl KeyframeInterpolationPoint {
    pub fn is_linear_interpolation(interpolation: &[u8; 4]) -> bool {
        interpolation[0] == interpolation[1] && interpolation[2] == interpolation[3]
    }

    /// Keeps the control points as given. `is_linear` only selects the fast path.
    pub fn new(interpolation: &[u8; 4]) -> Self {
        Self {
            control_point1: Vector2::new(interpolation[0], interpolation[1]),
            control_point2: Vector2::new(interpolation[2], interpolation[3]),
            is_linear: Self::is_linear_interpolation(interpolation),
        }
    }

    pub fn bezier_control_point(&self) -> [u8; 4] {
        [
            self.control_point1[0],
            self.control_point1[1],
            self.control_point2[0],
            self.control_point2[1],
        ]
    }

    /// Eases a linear progress `amount` in `[0, 1]`.
    pub fn curve_value(&self, amount: f32, bezier_factory: &dyn BezierCurveFactory) -> f32 {
        if self.is_linear {
            amount.clamp(0f32, 1f32)
        } else {
            bezier_factory
                .get_or_new(self.control_point1, self.control_point2)
                .value(amount)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneKeyframeInterpolation {
    pub translation: Vector3<KeyframeInterpolationPoint>,
    pub orientation: KeyframeInterpolationPoint,
}

impl Default for BoneKeyframeInterpolation {
    fn default() -> Self {
        Self {
            translation: Vector3::new(
                KeyframeInterpolationPoint::default(),
                KeyframeInterpolationPoint::default(),
                KeyframeInterpolationPoint::default(),
            ),
            orientation: KeyframeInterpolationPoint::default(),
        }
    }
}

impl From<MotionBoneKeyframeInterpolation> for BoneKeyframeInterpolation {
    fn from(v: MotionBoneKeyframeInterpolation) -> Self {
        Self {
            translation: Vector3::new(
                v.translation_x.into(),
                v.translation_y.into(),
                v.translation_z.into(),
            ),
            orientation: v.orientation.into(),
        }
    }
}

impl BoneKeyframeInterpolation {
    pub fn to_raw(&self) -> MotionBoneKeyframeInterpolation {
        MotionBoneKeyframeInterpolation {
            translation_x: self.translation.x.bezier_control_point(),
            translation_y: self.translation.y.bezier_control_point(),
            translation_z: self.translation.z.bezier_control_point(),
            orientation: self.orientation.bezier_control_point(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraKeyframeInterpolation {
    pub lookat: Vector3<KeyframeInterpolationPoint>,
    pub angle: KeyframeInterpolationPoint,
    pub fov: KeyframeInterpolationPoint,
    pub distance: KeyframeInterpolationPoint,
}

impl Default for CameraKeyframeInterpolation {
    fn default() -> Self {
        Self {
            lookat: [KeyframeInterpolationPoint::default(); 3].into(),
            angle: KeyframeInterpolationPoint::default(),
            fov: KeyframeInterpolationPoint::default(),
            distance: KeyframeInterpolationPoint::default(),
        }
    }
}

impl From<MotionCameraKeyframeInterpolation> for CameraKeyframeInterpolation {
    fn from(v: MotionCameraKeyframeInterpolation) -> Self {
        Self {
            lookat: Vector3::new(v.lookat_x.into(), v.lookat_y.into(), v.lookat_z.into()),
            angle: v.angle.into(),
            fov: v.fov.into(),
            distance: v.distance.into(),
        }
    }
}

impl CameraKeyframeInterpolation {
    pub fn to_raw(&self) -> MotionCameraKeyframeInterpolation {
        MotionCameraKeyframeInterpolation {
            lookat_x: self.lookat.x.bezier_control_point(),
            lookat_y: self.lookat.y.bezier_control_point(),
            lookat_z: self.lookat.z.bezier_control_point(),
            angle: self.angle.bezier_control_point(),
            fov: self.fov.bezier_control_point(),
            distance: self.distance.bezier_control_point(),
        }
    }
}

#[test]
fn test_coefficient() {
    assert_eq!(0f32, coefficient(10, 10, 10f32));
    assert_eq!(0.25f32, coefficient(10, 50, 20f32));
    assert_eq!(1f32, coefficient(10, 50, 80f32));
}

#[test]
fn test_linear_detection() {
    assert!(KeyframeInterpolationPoint::new(&[20, 20, 107, 107]).is_linear);
    assert!(KeyframeInterpolationPoint::new(&[0, 0, 127, 127]).is_linear);
    assert!(!KeyframeInterpolationPoint::new(&[64, 0, 64, 127]).is_linear);
}

#[test]
fn test_linear_curve_keeps_control_points() {
    let point = KeyframeInterpolationPoint::new(&[0, 0, 127, 127]);
    assert!(point.is_linear);
    assert_eq!([0, 0, 127, 127], point.bezier_control_point());
    let cache = crate::bezier_curve::BezierCurveCache::default();
    assert_eq!(0.3f32, point.curve_value(0.3f32, &cache));
    let interpolation = BoneKeyframeInterpolation::from(MotionBoneKeyframeInterpolation {
        translation_x: [0, 0, 127, 127],
        ..Default::default()
    });
    assert_eq!([0, 0, 127, 127], interpolation.to_raw().translation_x);
}
