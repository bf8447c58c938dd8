use std::sync::Arc;

use cgmath::{InnerSpace, One, Quaternion, Vector3};
use vpvl2::{
    config::BezierSolverConfig,
    diagnostics::BufferedDiagnostics,
    event_publisher::Event,
    loader::model::{Model as RawModel, ModelBone},
    motion::{interpolation::KeyframeInterpolationPoint, keyframe::BoneKeyframe, Motion},
    physics_engine::{NullPhysicsEngine, SimulationMode},
    player::MotionOptions,
    SceneConfig, SceneController,
};

use crate::init_logger;

fn two_bone_model() -> RawModel {
    let mut child = ModelBone::new("child", [0f32, 1f32, 0f32], -1);
    child.parent_inherent_bone_index = 0;
    child.inherent_coefficient = 0.5f32;
    child.flags.has_inherent_translation = true;
    RawModel {
        name_ja: "pair".to_owned(),
        bones: vec![ModelBone::new("root", [0f32; 3], -1), child],
        ..Default::default()
    }
}

fn controller(config: SceneConfig) -> SceneController<NullPhysicsEngine, BufferedDiagnostics> {
    SceneController::new(config, NullPhysicsEngine::new(), BufferedDiagnostics::new(true))
        .unwrap()
}

fn root_motion(config: BezierSolverConfig, keyframes: &[(u32, f32)]) -> Arc<Motion> {
    let mut motion = Motion::empty(config);
    for (frame_index, z) in keyframes {
        motion.add_bone_keyframe(
            "root",
            BoneKeyframe::new(*frame_index, Vector3::new(0f32, 0f32, *z), Quaternion::one()),
        );
    }
    Arc::new(motion)
}

#[test]
fn test_inherited_translation_is_weighted() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let config = SceneConfig::default();
    let mut controller = controller(config.clone());
    let handle = controller.add_model(&two_bone_model())?;
    controller.add_motion(
        handle,
        "base",
        root_motion(config.bezier, &[(0, 10f32)]),
        MotionOptions::default(),
    )?;
    let snapshot = controller.update(0f32);
    let model = snapshot.model(handle).unwrap();
    let root = model.world_transform(0).unwrap().w.truncate();
    let child = model.world_transform(1).unwrap().w.truncate();
    assert!((root - Vector3::new(0f32, 0f32, 10f32)).magnitude() < 1e-5);
    assert!((child - Vector3::new(0f32, 1f32, 5f32)).magnitude() < 1e-5);
    Ok(())
}

#[test]
fn test_events_follow_mutations() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let config = SceneConfig::default();
    let mut controller = controller(config.clone());
    let handle = controller.add_model(&two_bone_model())?;
    let motion = root_motion(config.bezier, &[(0, 0f32), (30, 10f32)]);
    controller.add_motion(handle, "base", motion.clone(), MotionOptions::default())?;
    controller.change_motion(handle, "base", motion)?;
    controller.delete_motion(handle, "base")?;
    assert!(controller.delete_motion(handle, "base").is_err());
    controller.delete_model(handle)?;
    let events = controller.drain_events();
    assert_eq!(5, events.len());
    assert!(matches!(events[0], Event::ModelAdded(_)));
    assert!(matches!(events[1], Event::MotionAdded(_)));
    assert!(matches!(events[2], Event::MotionChanged(_)));
    assert!(matches!(events[3], Event::MotionDeleted(_)));
    assert!(matches!(events[4], Event::ModelDeleted(_)));
    assert!(controller.update(1f32).models.is_empty());
    Ok(())
}

#[test]
fn test_bezier_epsilon_does_not_change_pose() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let mut positions = vec![];
    for (epsilon, max_iterations) in [(1e-7f32, 32), (1e-3f32, 4)] {
        let config = SceneConfig::default().with_bezier(epsilon, max_iterations);
        let mut controller = controller(config.clone());
        let handle = controller.add_model(&two_bone_model())?;
        let mut motion = Motion::empty(config.bezier);
        let mut keyframe =
            BoneKeyframe::new(30, Vector3::new(0f32, 0f32, 30f32), Quaternion::one());
        keyframe.interpolation.translation.z = KeyframeInterpolationPoint::new(&[64, 0, 64, 127]);
        motion.add_bone_keyframe(
            "root",
            BoneKeyframe::new(0, Vector3::new(0f32, 0f32, 0f32), Quaternion::one()),
        );
        motion.add_bone_keyframe("root", keyframe);
        controller.add_motion(handle, "base", Arc::new(motion), MotionOptions::default())?;
        let mut samples = vec![];
        for _ in 0..6 {
            let snapshot = controller.update(5f32);
            samples.push(snapshot.model(handle).unwrap().world_transform(0).unwrap().w.z);
        }
        positions.push(samples);
    }
    for (tight, loose) in positions[0].iter().zip(positions[1].iter()) {
        assert!((tight - loose).abs() < 0.1f32, "{} {}", tight, loose);
    }
    assert!(positions[0].windows(2).all(|w| w[0] <= w[1]));
    Ok(())
}

#[test]
fn test_physics_mode_gates_stepping() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let mut controller =
        controller(SceneConfig::default().with_simulation_mode(SimulationMode::EnablePlaying));
    let handle = controller.add_model(&two_bone_model())?;
    controller.update(1f32);
    assert_eq!(0f32, controller.physics_engine().elapsed());
    let motion = root_motion(BezierSolverConfig::default(), &[(0, 0f32), (10, 1f32)]);
    controller.add_motion(handle, "base", motion, MotionOptions::default())?;
    controller.update(1f32);
    assert!(controller.physics_engine().elapsed() > 0f32);
    Ok(())
}

#[test]
fn test_once_motion_fades_out_without_jump() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let config = SceneConfig::default();
    let mut controller = controller(config.clone());
    let handle = controller.add_model(&two_bone_model())?;
    let wave = root_motion(config.bezier, &[(0, 10f32), (8, 10f32)]);
    let idle = root_motion(config.bezier, &[(0, 0f32), (60, 0f32)]);
    controller.add_motion(
        handle,
        "base",
        wave,
        MotionOptions::default().once(true).re_position(true),
    )?;
    controller.change_motion(handle, "base", idle)?;
    let mut zs = vec![];
    for _ in 0..24 {
        let snapshot = controller.update(1f32);
        zs.push(snapshot.model(handle).unwrap().world_transform(0).unwrap().w.z);
    }
    for (tick, pair) in zs.windows(2).enumerate() {
        assert!((pair[0] - pair[1]).abs() < 0.5f32 + 1e-4, "jump at {}: {:?}", tick, zs);
    }
    assert!((zs[0] - 9.5f32).abs() < 1e-4);
    assert!(zs[23].abs() < 1e-4);
    let finished = controller
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, Event::MotionFinished(_)))
        .count();
    assert_eq!(1, finished);
    // the superseded motion does not move the model
    let base = controller.model(handle).unwrap().base_transform().w;
    assert_eq!(0f32, base.z);
    Ok(())
}
