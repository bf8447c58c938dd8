use cgmath::{InnerSpace, Vector3};

use crate::motion::seek::LightFrame;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    color: Vector3<f32>,
    direction: Vector3<f32>,
}

impl Default for LightState {
    fn default() -> Self {
        Self {
            color: Self::INITIAL_COLOR,
            direction: Self::INITIAL_DIRECTION,
        }
    }
}

impl LightState {
    pub const INITIAL_COLOR: Vector3<f32> = Vector3::new(0.6f32, 0.6f32, 0.6f32);
    pub const INITIAL_DIRECTION: Vector3<f32> = Vector3::new(-0.5f32, -1.0f32, 0.5f32);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn apply(&mut self, frame: &LightFrame) {
        self.color = frame.color;
        // a zero direction would leave shading undefined
        if frame.direction.magnitude2() > f32::EPSILON {
            self.direction = frame.direction;
        }
    }

    pub fn color(&self) -> Vector3<f32> {
        self.color
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.direction
    }
}
