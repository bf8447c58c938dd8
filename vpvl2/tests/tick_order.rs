use std::sync::Arc;

use cgmath::{InnerSpace, One, Quaternion, Vector3};
use nalgebra::Isometry3;
use vpvl2::{
    diagnostics::NullDiagnostics,
    loader::model::{Model as RawModel, ModelBone, ModelRigidBody, ModelRigidBodyTransformType},
    motion::{keyframe::BoneKeyframe, Motion},
    physics_engine::{
        JointDescriptor, PhysicsBodyHandle, PhysicsEngine, PhysicsJointHandle, RigidBodyDescriptor,
    },
    player::MotionOptions,
    SceneConfig, SceneController,
};

use crate::init_logger;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    KinematicTarget(usize, [f32; 3]),
    Step,
}

struct RecordedBody {
    transform: Isometry3<f32>,
    kinematic: bool,
}

/// Logs what the controller pushes and moves every dynamic body by a fixed offset per step.
#[derive(Default)]
struct RecordingPhysics {
    bodies: Vec<RecordedBody>,
    calls: Vec<Call>,
    drift: [f32; 3],
}

impl PhysicsEngine for RecordingPhysics {
    fn add_rigid_body(&mut self, descriptor: &RigidBodyDescriptor) -> PhysicsBodyHandle {
        self.bodies.push(RecordedBody {
            transform: descriptor.initial_transform,
            kinematic: descriptor.kinematic,
        });
        PhysicsBodyHandle(self.bodies.len() - 1)
    }

    fn add_joint(&mut self, _descriptor: &JointDescriptor) -> Option<PhysicsJointHandle> {
        None
    }

    fn remove_rigid_body(&mut self, _handle: PhysicsBodyHandle) {}

    fn remove_joint(&mut self, _handle: PhysicsJointHandle) {}

    fn set_kinematic(&mut self, handle: PhysicsBodyHandle, value: bool) {
        self.bodies[handle.0].kinematic = value;
    }

    fn is_kinematic(&self, handle: PhysicsBodyHandle) -> bool {
        self.bodies[handle.0].kinematic
    }

    fn set_kinematic_target(&mut self, handle: PhysicsBodyHandle, target: &Isometry3<f32>) {
        let t = target.translation.vector;
        self.calls.push(Call::KinematicTarget(handle.0, [t.x, t.y, t.z]));
        self.bodies[handle.0].transform = *target;
    }

    fn reset_rigid_body(&mut self, handle: PhysicsBodyHandle, transform: &Isometry3<f32>) {
        self.bodies[handle.0].transform = *transform;
    }

    fn step_simulation(&mut self, _seconds: f32) {
        self.calls.push(Call::Step);
        let [x, y, z] = self.drift;
        for body in self.bodies.iter_mut().filter(|body| !body.kinematic) {
            body.transform = Isometry3::translation(x, y, z) * body.transform;
        }
    }

    fn world_transform(&self, handle: PhysicsBodyHandle) -> Option<Isometry3<f32>> {
        self.bodies.get(handle.0).map(|body| body.transform)
    }
}

fn rigged_model() -> RawModel {
    RawModel {
        name_ja: "hair".to_owned(),
        bones: vec![
            ModelBone::new("センター", [0f32; 3], -1),
            ModelBone::new("hair", [0f32, 1f32, 0f32], 0),
            ModelBone::new("hair tip", [0f32, 2f32, 0f32], 1),
        ],
        rigid_bodies: vec![
            ModelRigidBody {
                name_ja: "head".to_owned(),
                bone_index: 0,
                ..Default::default()
            },
            ModelRigidBody {
                name_ja: "hair".to_owned(),
                bone_index: 1,
                origin: [0f32, 1f32, 0f32],
                transform_type: ModelRigidBodyTransformType::FromSimulationToBone,
                ..Default::default()
            },
        ],
        ..Default::default()
    }
}

#[test]
fn test_physics_sees_sampled_pose_and_skinning_sees_physics(
) -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let physics = RecordingPhysics {
        drift: [1f32, 0f32, 0f32],
        ..Default::default()
    };
    let mut controller = SceneController::new(SceneConfig::default(), physics, NullDiagnostics)?;
    let handle = controller.add_model(&rigged_model())?;
    let mut motion = Motion::empty(controller.config().bezier);
    motion.add_bone_keyframe(
        "センター",
        BoneKeyframe::new(0, Vector3::new(0f32, 0f32, 10f32), Quaternion::one()),
    );
    controller.add_motion(handle, "base", Arc::new(motion), MotionOptions::default())?;
    let snapshot = controller.update(0.25f32);
    let hair = snapshot.model(handle).unwrap().world_transform(1).unwrap().w.truncate();
    let tip = snapshot.model(handle).unwrap().world_transform(2).unwrap().w.truncate();

    let calls = &controller.physics_engine().calls;
    assert_eq!(
        &[Call::KinematicTarget(0, [0f32, 0f32, 10f32]), Call::Step],
        calls.as_slice()
    );
    // animated position would be (0, 1, 10); the simulated body started at (0, 1, 0)
    assert!((hair - Vector3::new(1f32, 1f32, 0f32)).magnitude() < 1e-5);
    assert!((tip - Vector3::new(1f32, 2f32, 0f32)).magnitude() < 1e-5);
    Ok(())
}

#[test]
fn test_every_sub_step_pushes_before_stepping() -> Result<(), Box<dyn std::error::Error + 'static>> {
    init_logger();
    let mut controller =
        SceneController::new(SceneConfig::default(), RecordingPhysics::default(), NullDiagnostics)?;
    controller.add_model(&rigged_model())?;
    controller.update(1f32);
    let calls = &controller.physics_engine().calls;
    assert_eq!(8, calls.len());
    for pair in calls.chunks(2) {
        assert!(matches!(pair[0], Call::KinematicTarget(0, _)));
        assert_eq!(Call::Step, pair[1]);
    }
    Ok(())
}
