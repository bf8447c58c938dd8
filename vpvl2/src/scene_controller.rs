use std::sync::Arc;

use vpvl2_loader::model::Model as RawModel;

use crate::{
    camera::CameraState,
    clock::FrameClock,
    config::SceneConfig,
    diagnostics::{Diagnostics, LogDiagnostics},
    error::Vpvl2Error,
    event_publisher::{Event, EventPublisher, EventQueue, ModelEventPayload, MotionEventPayload},
    light::LightState,
    model::Model,
    motion::Motion,
    physics_engine::{PhysicsEngine, RapierPhysicsEngine, SimulationMode},
    player::{MotionConfiguration, MotionOptions, MotionPlayer},
    render_snapshot::RenderSnapshot,
};

pub type ModelHandle = u32;

const TARGET: &str = "vpvl2::scene_controller";

#[derive(Debug, Clone, Copy, Default)]
struct HandleAllocator(u32);

impl HandleAllocator {
    fn next(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }
}

/// Owns the models of a scene and runs the per tick pipeline: advance every player, blend and
/// resolve poses, exchange transforms with the physics engine, then publish a
/// [`RenderSnapshot`].
pub struct SceneController<P = RapierPhysicsEngine, D = LogDiagnostics> {
    config: SceneConfig,
    models: Vec<(ModelHandle, Model)>,
    handle_allocator: HandleAllocator,
    camera_player: Option<MotionPlayer>,
    light_player: Option<MotionPlayer>,
    camera: CameraState,
    light: LightState,
    physics_engine: P,
    diagnostics: D,
    events: EventQueue,
    snapshot: RenderSnapshot,
    clock: FrameClock,
    tracing: bool,
}

impl SceneController<RapierPhysicsEngine, LogDiagnostics> {
    pub fn with_rapier(config: SceneConfig) -> Result<Self, Vpvl2Error> {
        let physics_engine = RapierPhysicsEngine::new(config.gravity, config.physics_fps);
        Self::new(config, physics_engine, LogDiagnostics)
    }
}

impl<P, D> SceneController<P, D>
where
    P: PhysicsEngine,
    D: Diagnostics,
{
    pub fn new(config: SceneConfig, physics_engine: P, diagnostics: D) -> Result<Self, Vpvl2Error> {
        config.validate()?;
        Ok(Self {
            clock: FrameClock::new(config.motion_fps),
            config,
            models: vec![],
            handle_allocator: HandleAllocator::default(),
            camera_player: None,
            light_player: None,
            camera: CameraState::default(),
            light: LightState::default(),
            physics_engine,
            diagnostics,
            events: EventQueue::new(),
            snapshot: RenderSnapshot::default(),
            tracing: false,
        })
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn physics_engine(&self) -> &P {
        &self.physics_engine
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut D {
        &mut self.diagnostics
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn light(&self) -> &LightState {
        &self.light
    }

    pub fn snapshot(&self) -> &RenderSnapshot {
        &self.snapshot
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain()
    }

    pub fn simulation_mode(&self) -> SimulationMode {
        self.config.simulation_mode
    }

    pub fn set_simulation_mode(&mut self, value: SimulationMode) {
        self.config.simulation_mode = value;
    }

    /// Marks the host as scrubbing the timeline, which `EnableTracing` simulates through.
    pub fn set_tracing(&mut self, value: bool) {
        self.tracing = value;
    }

    pub fn is_playing(&self) -> bool {
        self.models
            .iter()
            .any(|(_, model)| !model.motion_manager().is_empty())
            || self.camera_player.is_some()
            || self.light_player.is_some()
    }

    fn is_physics_simulation_enabled(&self) -> bool {
        self.config
            .simulation_mode
            .is_enabled(self.is_playing(), self.tracing)
    }

    pub fn model(&self, handle: ModelHandle) -> Option<&Model> {
        self.models
            .iter()
            .find(|(h, _)| *h == handle)
            .map(|(_, model)| model)
    }

    pub fn model_mut(&mut self, handle: ModelHandle) -> Option<&mut Model> {
        self.models
            .iter_mut()
            .find(|(h, _)| *h == handle)
            .map(|(_, model)| model)
    }

    fn model_or_not_found(&mut self, handle: ModelHandle) -> Result<&mut Model, Vpvl2Error> {
        self.model_mut(handle)
            .ok_or_else(|| Vpvl2Error::not_found("model", &handle.to_string()))
    }

    pub fn find_model_by_name(&self, name: &str) -> Option<ModelHandle> {
        self.models
            .iter()
            .find(|(_, model)| model.name() == name || model.name_en() == name)
            .map(|(handle, _)| *handle)
    }

    /// Model handles in transform order.
    pub fn model_handles(&self) -> impl Iterator<Item = ModelHandle> + '_ {
        self.models.iter().map(|(handle, _)| *handle)
    }

    /// Builds a model and registers its rigid bodies and joints. Nothing is kept on failure.
    pub fn add_model(&mut self, raw: &RawModel) -> Result<ModelHandle, Vpvl2Error> {
        let model = Model::new(raw)?;
        Ok(self.add_model_object(model))
    }

    pub fn add_model_object(&mut self, mut model: Model) -> ModelHandle {
        model.attach_physics(&mut self.physics_engine);
        model.reset_physics(&mut self.physics_engine);
        let handle = self.handle_allocator.next();
        self.diagnostics.info(
            TARGET,
            format!(
                "model \"{}\" added with {} bones and {} rigid bodies",
                model.name(),
                model.bones().len(),
                model.rigid_bodies().len()
            ),
        );
        self.events.publish(Event::ModelAdded(ModelEventPayload {
            model: handle,
            name: model.name().to_owned(),
        }));
        self.models.push((handle, model));
        handle
    }

    pub fn delete_model(&mut self, handle: ModelHandle) -> Result<Model, Vpvl2Error> {
        let index = self
            .models
            .iter()
            .position(|(h, _)| *h == handle)
            .ok_or_else(|| Vpvl2Error::not_found("model", &handle.to_string()))?;
        let (_, mut model) = self.models.remove(index);
        model.detach_physics(&mut self.physics_engine);
        self.events.publish(Event::ModelDeleted(ModelEventPayload {
            model: handle,
            name: model.name().to_owned(),
        }));
        Ok(model)
    }

    fn motion_event(model: Option<ModelHandle>, slot: &str) -> MotionEventPayload {
        MotionEventPayload {
            model,
            slot: slot.to_owned(),
            frame_index: 0f32,
        }
    }

    pub fn add_motion(
        &mut self,
        handle: ModelHandle,
        slot: &str,
        motion: Arc<Motion>,
        options: MotionOptions,
    ) -> Result<(), Vpvl2Error> {
        if motion.is_camera_and_light_motion() {
            return Err(Vpvl2Error::invalid_motion(
                "a camera and light motion cannot drive a model".to_owned(),
            ));
        }
        let transition_frames = self.config.smooth_transition_frames;
        let model = self.model_or_not_found(handle)?;
        let (missing_bones, missing_morphs) = model.missing_motion_targets(&motion);
        let model_name = model.name().to_owned();
        model.add_motion(slot, motion, options, transition_frames);
        for bone in missing_bones {
            self.diagnostics.warn(
                TARGET,
                format!("model \"{}\" has no bone \"{}\"", model_name, bone),
            );
        }
        for morph in missing_morphs {
            self.diagnostics.warn(
                TARGET,
                format!("model \"{}\" has no morph \"{}\"", model_name, morph),
            );
        }
        self.events
            .publish(Event::MotionAdded(Self::motion_event(Some(handle), slot)));
        Ok(())
    }

    pub fn change_motion(
        &mut self,
        handle: ModelHandle,
        slot: &str,
        motion: Arc<Motion>,
    ) -> Result<(), Vpvl2Error> {
        let transition_frames = self.config.smooth_transition_frames;
        self.model_or_not_found(handle)?
            .motion_manager_mut()
            .change_motion(slot, motion, transition_frames)?;
        self.events
            .publish(Event::MotionChanged(Self::motion_event(Some(handle), slot)));
        Ok(())
    }

    pub fn delete_motion(&mut self, handle: ModelHandle, slot: &str) -> Result<(), Vpvl2Error> {
        let removed = self
            .model_or_not_found(handle)?
            .motion_manager_mut()
            .delete_motion(slot)?;
        let mut payload = Self::motion_event(Some(handle), slot);
        payload.frame_index = removed
            .current()
            .map(|player| player.current_frame_index())
            .unwrap_or(0f32);
        self.events.publish(Event::MotionDeleted(payload));
        Ok(())
    }

    pub fn configure_motion(
        &mut self,
        handle: ModelHandle,
        slot: &str,
        configuration: &MotionConfiguration,
    ) -> Result<(), Vpvl2Error> {
        self.model_or_not_found(handle)?
            .motion_manager_mut()
            .configure_motion(slot, configuration)?;
        self.events
            .publish(Event::MotionConfigured(Self::motion_event(Some(handle), slot)));
        Ok(())
    }

    /// Replaces the camera motion and returns the previous one.
    pub fn set_camera_motion(
        &mut self,
        motion: Option<Arc<Motion>>,
        options: MotionOptions,
    ) -> Option<Arc<Motion>> {
        let last = self.camera_player.take().map(|player| player.motion().clone());
        self.camera_player = motion.map(|motion| MotionPlayer::new(motion, options));
        if self.camera_player.is_none() {
            self.camera.reset();
        }
        self.events
            .publish(Event::CameraMotionSet(Self::motion_event(None, "camera")));
        last
    }

    pub fn set_light_motion(
        &mut self,
        motion: Option<Arc<Motion>>,
        options: MotionOptions,
    ) -> Option<Arc<Motion>> {
        let last = self.light_player.take().map(|player| player.motion().clone());
        self.light_player = motion.map(|motion| MotionPlayer::new(motion, options));
        if self.light_player.is_none() {
            self.light.reset();
        }
        self.events
            .publish(Event::LightMotionSet(Self::motion_event(None, "light")));
        last
    }

    /// Teleports every rigid body onto its bone and clears its velocities.
    pub fn reset_physics(&mut self) {
        for (_, model) in &self.models {
            model.reset_physics(&mut self.physics_engine);
        }
        self.events.publish(Event::PhysicsReset);
    }

    /// Splits the elapsed frames into physics sized steps. Returns the number of whole steps,
    /// the remainder, and how many steps the caller asked for in total.
    fn split_sub_steps(&self, elapsed: f32) -> (u32, f32, u32) {
        let step = self.config.step_frame();
        let whole = (elapsed / step).floor();
        let remainder = elapsed - whole * step;
        let whole = whole.min(u32::MAX as f32) as u32;
        let requested = whole.saturating_add(u32::from(remainder > step * 1e-4f32));
        (whole, remainder, requested)
    }

    /// Advances the players by `advance` frames and the simulation by `step` frames.
    fn perform_sub_step(&mut self, advance: f32, step: f32) {
        for (_, model) in &mut self.models {
            model.motion_manager_mut().advance(advance);
        }
        if let Some(player) = &mut self.camera_player {
            player.advance(advance);
        }
        if let Some(player) = &mut self.light_player {
            player.advance(advance);
        }
        let simulate = self.is_physics_simulation_enabled();
        let ik_epsilon = self.config.ik_epsilon;
        for (_, model) in &mut self.models {
            let pose = model.sample_pose();
            model.update_pose(&pose, ik_epsilon);
            if simulate {
                model.synchronize_to_simulation(&mut self.physics_engine);
            }
        }
        if simulate {
            self.physics_engine
                .step_simulation(self.config.frames_to_seconds(step));
            for (_, model) in &mut self.models {
                model.synchronize_from_simulation(&self.physics_engine);
            }
        }
    }

    fn collect_finished_motions(&mut self) {
        if !self.config.remove_finished_motions {
            return;
        }
        for (handle, model) in &mut self.models {
            for finished in model.motion_manager_mut().collect_finished() {
                if finished.player.options().enable_re_position && !finished.superseded {
                    model.commit_re_position(finished.player.motion());
                }
                self.events.publish(Event::MotionFinished(MotionEventPayload {
                    model: Some(*handle),
                    slot: finished.slot,
                    frame_index: finished.player.current_frame_index(),
                }));
            }
        }
    }

    /// Advances the scene by `elapsed_frames` motion frames. Negative or non finite input
    /// counts as zero, which still resolves poses and rebuilds the snapshot.
    pub fn update(&mut self, elapsed_frames: f32) -> &RenderSnapshot {
        let elapsed = if elapsed_frames.is_finite() {
            elapsed_frames.max(0f32)
        } else {
            0f32
        };
        let (whole, remainder, requested) = self.split_sub_steps(elapsed);
        let performed = requested.min(self.config.max_sub_steps);
        if performed < requested {
            self.diagnostics.warn(
                TARGET,
                format!(
                    "dropping {} of {} physics sub steps",
                    requested - performed,
                    requested
                ),
            );
            self.events.publish(Event::SubStepsDropped {
                requested,
                performed,
            });
        }
        if performed == 0 {
            self.perform_sub_step(0f32, 0f32);
        }
        let step = self.config.step_frame();
        let mut advanced = 0f32;
        for index in 0..performed {
            let delta = if index < whole { step } else { remainder };
            // players always cover the whole elapsed time; only the simulation loses the overflow
            let advance = if index + 1 == performed {
                (elapsed - advanced).max(0f32)
            } else {
                delta
            };
            advanced += advance;
            self.perform_sub_step(advance, delta);
        }
        self.collect_finished_motions();
        if let Some(transform) = self.camera_player.as_ref().and_then(|p| p.sample_camera()) {
            self.camera.apply(&transform);
        }
        if let Some(frame) = self.light_player.as_ref().and_then(|p| p.sample_light()) {
            self.light.apply(&frame);
        }
        self.snapshot.rebuild(
            self.models.iter().map(|(handle, model)| (*handle, model)),
            &self.camera,
            &self.light,
        );
        &self.snapshot
    }

    /// Like [`Self::update`], measuring the elapsed time with the controller's clock.
    pub fn update_with_clock(&mut self) -> &RenderSnapshot {
        let elapsed = self.clock.tick();
        self.update(elapsed)
    }

    pub fn reset_clock(&mut self) {
        self.clock.reset();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{One, Quaternion, Vector3};
    use vpvl2_loader::model::ModelBone;

    use super::*;
    use crate::{
        config::BezierSolverConfig, diagnostics::BufferedDiagnostics, error::ErrorKind,
        motion::keyframe::BoneKeyframe, physics_engine::NullPhysicsEngine,
    };

    fn controller() -> SceneController<NullPhysicsEngine, BufferedDiagnostics> {
        SceneController::new(
            SceneConfig::default(),
            NullPhysicsEngine::new(),
            BufferedDiagnostics::new(false),
        )
        .unwrap()
    }

    fn raw_model() -> RawModel {
        RawModel {
            name_ja: "stick".to_owned(),
            bones: vec![ModelBone::new("センター", [0f32; 3], -1)],
            ..Default::default()
        }
    }

    fn walk() -> Arc<Motion> {
        let mut motion = Motion::empty(BezierSolverConfig::default());
        motion.add_bone_keyframe(
            "センター",
            BoneKeyframe::new(0, Vector3::new(0f32, 0f32, 0f32), Quaternion::one()),
        );
        motion.add_bone_keyframe(
            "センター",
            BoneKeyframe::new(10, Vector3::new(0f32, 0f32, 10f32), Quaternion::one()),
        );
        motion.add_bone_keyframe("missing", BoneKeyframe::new(0, Vector3::new(0f32, 0f32, 0f32), Quaternion::one()));
        Arc::new(motion)
    }

    #[test]
    fn test_sub_steps_are_capped() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let mut controller = controller();
        controller.add_model(&raw_model())?;
        controller.update(2.6f32);
        // 10 whole steps of a quarter frame plus a remainder, capped at 8
        assert!((controller.physics_engine().elapsed() - 8f32 / 120f32).abs() < 1e-5);
        assert_eq!(1, controller.diagnostics().count(log::Level::Warn));
        let dropped = controller
            .drain_events()
            .into_iter()
            .any(|event| matches!(event, Event::SubStepsDropped { requested: 11, performed: 8 }));
        assert!(dropped);
        Ok(())
    }

    #[test]
    fn test_capped_update_keeps_motion_time() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let mut controller = controller();
        let handle = controller.add_model(&raw_model())?;
        let mut motion = Motion::empty(BezierSolverConfig::default());
        motion.add_bone_keyframe(
            "センター",
            BoneKeyframe::new(0, Vector3::new(0f32, 0f32, 0f32), Quaternion::one()),
        );
        motion.add_bone_keyframe(
            "センター",
            BoneKeyframe::new(100, Vector3::new(100f32, 0f32, 0f32), Quaternion::one()),
        );
        controller.add_motion(handle, "base", Arc::new(motion), MotionOptions::default())?;
        let snapshot = controller.update(4f32);
        let x = snapshot.model(handle).unwrap().world_transform(0).unwrap().w.x;
        assert!((x - 4f32).abs() < 1e-4);
        let slot = controller.model(handle).unwrap().motion_manager().slot("base").unwrap();
        assert!((slot.current().unwrap().current_frame_index() - 4f32).abs() < 1e-4);
        assert!((controller.physics_engine().elapsed() - 8f32 / 120f32).abs() < 1e-5);
        assert_eq!(1, controller.diagnostics().count(log::Level::Warn));
        Ok(())
    }

    #[test]
    fn test_once_motion_re_positions_model() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let mut controller = controller();
        let handle = controller.add_model(&raw_model())?;
        controller.add_motion(handle, "base", walk(), MotionOptions::default().once(true).re_position(true))?;
        assert_eq!(1, controller.diagnostics().count(log::Level::Warn));
        for _ in 0..6 {
            controller.update(2f32);
        }
        let model = controller.model(handle).unwrap();
        assert!(model.motion_manager().is_empty());
        assert_eq!(
            Vector3::new(0f32, 0f32, 10f32),
            crate::utils::mat4_translation(model.base_transform())
        );
        Ok(())
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let mut controller = controller();
        let err = controller
            .add_motion(3, "base", walk(), MotionOptions::default())
            .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
        assert!(controller.delete_model(3).is_err());
        assert!(controller.drain_events().is_empty());
    }
}
