use cgmath::{
    Deg, ElementWise, InnerSpace, Matrix3, Matrix4, Quaternion, Rad, Rotation3, SquareMatrix,
    Vector3, Vector4, Zero,
};

use crate::{motion::seek::CameraTransform, utils::rigid_invert};

/// Camera state sampled from the camera motion, with the derived view matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    look_at: Vector3<f32>,
    angle: Vector3<f32>,
    distance: f32,
    fov: Rad<f32>,
    perspective: bool,
    view_matrix: Matrix4<f32>,
    position: Vector3<f32>,
    direction: Vector3<f32>,
}

impl Default for CameraState {
    fn default() -> Self {
        let mut camera = Self {
            look_at: Self::INITIAL_LOOK_AT,
            angle: Vector3::zero(),
            distance: Self::INITIAL_DISTANCE,
            fov: Rad::from(Deg(Self::INITIAL_FOV)),
            perspective: true,
            view_matrix: Matrix4::identity(),
            position: Vector3::zero(),
            direction: Vector3::unit_z(),
        };
        camera.update();
        camera
    }
}

impl CameraState {
    pub const ANGLE_SCALE_FACTOR: Vector3<f32> = Vector3::new(-1f32, 1f32, 1f32);
    pub const INITIAL_LOOK_AT: Vector3<f32> = Vector3::new(0f32, 10f32, 0f32);
    pub const INITIAL_DISTANCE: f32 = 45f32;
    pub const INITIAL_FOV: f32 = 30f32;
    pub const ZFAR: f32 = 10000f32;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, transform: &CameraTransform) {
        self.look_at = transform.look_at;
        self.angle = transform.angle;
        self.distance = transform.distance;
        self.fov = Rad(transform.fov.0.max(Rad::from(Deg(1f32)).0));
        self.perspective = transform.perspective;
        self.update();
    }

    fn update(&mut self) {
        let angle = self.angle.mul_element_wise(Self::ANGLE_SCALE_FACTOR);
        let x = Quaternion::from_angle_x(Rad(angle.x));
        let y = Quaternion::from_angle_y(Rad(angle.y));
        let z = Quaternion::from_angle_z(Rad(angle.z));
        let view_orientation = Matrix3::from(z * x * y);
        self.view_matrix =
            Matrix4::from(view_orientation) * Matrix4::from_translation(-self.look_at);
        self.view_matrix[3] += Vector4::new(0f32, 0f32, self.distance, 0f32);
        let position = rigid_invert(&self.view_matrix)[3].truncate();
        if self.distance > 0f32 {
            self.direction = (self.look_at - position).normalize();
        } else if self.distance < 0f32 {
            self.direction = (position - self.look_at).normalize();
        }
        self.position = position;
    }

    pub fn look_at(&self) -> Vector3<f32> {
        self.look_at
    }

    pub fn angle(&self) -> Vector3<f32> {
        self.angle
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn fov(&self) -> Rad<f32> {
        self.fov
    }

    pub fn is_perspective(&self) -> bool {
        self.perspective
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view_matrix
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.direction
    }

    pub fn projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        let aspect = aspect.max(f32::EPSILON);
        if self.perspective {
            cgmath::perspective(self.fov, aspect, 0.5f32, Self::ZFAR)
        } else {
            let inverse_distance = 1f32 / self.distance.abs().max(f32::EPSILON);
            let mut projection_matrix = Matrix4::identity();
            projection_matrix[0][0] = 2f32 * (1f32 / aspect).max(1f32) * inverse_distance;
            projection_matrix[1][1] = 2f32 * aspect.max(1f32) * inverse_distance;
            projection_matrix[2][2] = 2f32 / (Self::ZFAR - 0.5f32);
            projection_matrix
        }
    }
}

#[test]
fn test_default_camera_looks_at_initial_point() {
    let camera = CameraState::new();
    assert!((camera.position() - Vector3::new(0f32, 10f32, -45f32)).magnitude() < 1e-4);
    assert!((camera.direction() - Vector3::unit_z()).magnitude() < 1e-4);
}
