use crate::{
    error::Vpvl2Error,
    physics_engine::SimulationMode,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BezierSolverConfig {
    /// Tolerance on `|X(s) - u|` when solving the curve parameter.
    pub epsilon: f32,
    pub max_iterations: u32,
}

impl Default for BezierSolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5f32,
            max_iterations: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Keyframe rate of motions. Elapsed time is measured in frames of this rate.
    pub motion_fps: f32,
    pub physics_fps: f32,
    pub max_sub_steps: u32,
    /// Length of a crossfade between two motions in the same slot, in frames.
    pub smooth_transition_frames: f32,
    pub bezier: BezierSolverConfig,
    pub ik_epsilon: f32,
    pub gravity: [f32; 3],
    pub simulation_mode: SimulationMode,
    pub remove_finished_motions: bool,
    pub undo_limit: usize,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            motion_fps: 30f32,
            physics_fps: 120f32,
            max_sub_steps: 8,
            smooth_transition_frames: 20f32,
            bezier: BezierSolverConfig::default(),
            ik_epsilon: 1e-4f32,
            gravity: [0f32, -9.8f32, 0f32],
            simulation_mode: SimulationMode::EnableAnytime,
            remove_finished_motions: true,
            undo_limit: 64,
        }
    }
}

impl SceneConfig {
    pub fn with_physics_fps(mut self, physics_fps: f32) -> Self {
        self.physics_fps = physics_fps;
        self
    }

    pub fn with_smooth_transition_frames(mut self, frames: f32) -> Self {
        self.smooth_transition_frames = frames;
        self
    }

    pub fn with_bezier(mut self, epsilon: f32, max_iterations: u32) -> Self {
        self.bezier = BezierSolverConfig {
            epsilon,
            max_iterations,
        };
        self
    }

    pub fn with_simulation_mode(mut self, mode: SimulationMode) -> Self {
        self.simulation_mode = mode;
        self
    }

    /// Motion frames covered by one physics step.
    pub fn step_frame(&self) -> f32 {
        self.motion_fps / self.physics_fps
    }

    pub fn frames_to_seconds(&self, frames: f32) -> f32 {
        frames / self.motion_fps
    }

    pub fn validate(&self) -> Result<(), Vpvl2Error> {
        if !(self.motion_fps > 0f32) || !(self.physics_fps > 0f32) {
            return Err(Vpvl2Error::configuration(format!(
                "frame rates must be positive (motion {}, physics {})",
                self.motion_fps, self.physics_fps
            )));
        }
        if self.max_sub_steps == 0 {
            return Err(Vpvl2Error::configuration(
                "max_sub_steps must be at least 1".to_owned(),
            ));
        }
        if self.smooth_transition_frames < 0f32 {
            return Err(Vpvl2Error::configuration(format!(
                "negative smooth transition window {}",
                self.smooth_transition_frames
            )));
        }
        if !(self.bezier.epsilon > 0f32) || self.bezier.max_iterations == 0 {
            return Err(Vpvl2Error::configuration(
                "bezier solver needs a positive epsilon and at least one iteration".to_owned(),
            ));
        }
        Ok(())
    }
}

#[test]
fn test_default_config_is_valid() {
    let config = SceneConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(0.25f32, config.step_frame());
    assert_eq!(1f32, config.frames_to_seconds(30f32));
}

#[test]
fn test_invalid_config() {
    let config = SceneConfig::default().with_physics_fps(0f32);
    assert_eq!(
        Some(crate::error::ErrorKind::Configuration),
        config.validate().err().map(|e| e.kind())
    );
    let config = SceneConfig::default().with_bezier(0f32, 4);
    assert!(config.validate().is_err());
}
