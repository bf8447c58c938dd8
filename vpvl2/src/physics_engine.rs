use std::f32::consts::PI;

use nalgebra::Isometry3;
use rapier3d::prelude::{
    BroadPhase, CCDSolver, ColliderBuilder, ColliderSet, GenericJoint, Group, ImpulseJointHandle,
    ImpulseJointSet, IntegrationParameters, InteractionGroups, IslandManager, JointAxis,
    MultibodyJointSet, NarrowPhase, PhysicsPipeline, RigidBodyBuilder, RigidBodyHandle,
    RigidBodySet, RigidBodyType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulationMode {
    Disable,
    #[default]
    EnableAnytime,
    /// Steps only while motions are playing.
    EnablePlaying,
    /// Steps while playing and while the host scrubs the timeline.
    EnableTracing,
}

impl SimulationMode {
    pub fn is_enabled(&self, playing: bool, tracing: bool) -> bool {
        match self {
            SimulationMode::Disable => false,
            SimulationMode::EnableAnytime => true,
            SimulationMode::EnablePlaying => playing,
            SimulationMode::EnableTracing => playing || tracing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicsBodyHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhysicsJointHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RigidBodyShape {
    Sphere { radius: f32 },
    Box { half_extents: [f32; 3] },
    /// Capsule along the Y axis. `height` excludes the caps.
    Capsule { radius: f32, height: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RigidBodyDescriptor {
    pub name: String,
    pub shape: RigidBodyShape,
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
    pub collision_group: u8,
    pub collision_mask: u16,
    /// World transform at bind pose.
    pub initial_transform: Isometry3<f32>,
    pub kinematic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JointDescriptor {
    pub name: String,
    pub body_a: PhysicsBodyHandle,
    pub body_b: PhysicsBodyHandle,
    /// World transform of the joint frame at bind pose.
    pub transform: Isometry3<f32>,
    pub linear_lower_limit: [f32; 3],
    pub linear_upper_limit: [f32; 3],
    pub angular_lower_limit: [f32; 3],
    pub angular_upper_limit: [f32; 3],
    pub linear_stiffness: [f32; 3],
    pub angular_stiffness: [f32; 3],
}

/// Rigid body simulation collaborator. Models register their bodies at load, then the scene
/// controller drives it once per sub-step.
pub trait PhysicsEngine {
    fn add_rigid_body(&mut self, descriptor: &RigidBodyDescriptor) -> PhysicsBodyHandle;
    /// Returns `None` when either body is unknown to the engine.
    fn add_joint(&mut self, descriptor: &JointDescriptor) -> Option<PhysicsJointHandle>;
    fn remove_rigid_body(&mut self, handle: PhysicsBodyHandle);
    fn remove_joint(&mut self, handle: PhysicsJointHandle);
    fn set_kinematic(&mut self, handle: PhysicsBodyHandle, value: bool);
    fn is_kinematic(&self, handle: PhysicsBodyHandle) -> bool;
    fn set_kinematic_target(&mut self, handle: PhysicsBodyHandle, target: &Isometry3<f32>);
    /// Teleports the body and clears its velocities and forces.
    fn reset_rigid_body(&mut self, handle: PhysicsBodyHandle, transform: &Isometry3<f32>);
    fn step_simulation(&mut self, seconds: f32);
    fn world_transform(&self, handle: PhysicsBodyHandle) -> Option<Isometry3<f32>>;
}

#[derive(Debug, Clone, Copy)]
struct BodySlot {
    handle: RigidBodyHandle,
    initial_transform: Isometry3<f32>,
}

pub struct RapierPhysicsEngine {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    gravity: nalgebra::Vector3<f32>,
    integration_parameters: IntegrationParameters,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    ccd_solver: CCDSolver,
    dt_residual: f32,
    bodies: Vec<Option<BodySlot>>,
    joints: Vec<Option<ImpulseJointHandle>>,
}

impl Default for RapierPhysicsEngine {
    fn default() -> Self {
        Self::new([0f32, -9.8f32, 0f32], 120f32)
    }
}

impl RapierPhysicsEngine {
    pub fn new(gravity: [f32; 3], physics_fps: f32) -> Self {
        let mut it = IntegrationParameters::default();
        it.set_inv_dt(physics_fps);
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            gravity: nalgebra::vector![gravity[0], gravity[1], gravity[2]],
            integration_parameters: it,
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            dt_residual: 0f32,
            bodies: vec![],
            joints: vec![],
        }
    }

    pub fn num_rigid_bodies(&self) -> usize {
        self.rigid_body_set.len()
    }

    pub fn num_joints(&self) -> usize {
        self.impulse_joint_set.len()
    }

    fn slot(&self, handle: PhysicsBodyHandle) -> Option<&BodySlot> {
        self.bodies.get(handle.0).and_then(Option::as_ref)
    }

    fn body_mut(&mut self, handle: PhysicsBodyHandle) -> Option<&mut rapier3d::dynamics::RigidBody> {
        let inner = self.slot(handle)?.handle;
        self.rigid_body_set.get_mut(inner)
    }

    fn build_joint(
        descriptor: &JointDescriptor,
        initial_a: &Isometry3<f32>,
        initial_b: &Isometry3<f32>,
    ) -> GenericJoint {
        fn limit(
            joint: &mut GenericJoint,
            axis: JointAxis,
            min: f32,
            max: f32,
            max_limit: f32,
            stiffness: f32,
        ) {
            let range = max - min;
            if range > 0f32 && range < max_limit {
                joint.set_limits(axis, [min, max]);
                if stiffness > 0f32 {
                    joint.set_motor(axis, 0f32, 0f32, stiffness, 10f32);
                }
            } else {
                joint.lock_axes(axis.into());
            }
        }

        let mut joint = GenericJoint::default();
        joint.set_local_frame1(initial_a.inverse() * descriptor.transform);
        joint.set_local_frame2(initial_b.inverse() * descriptor.transform);
        let linear = [JointAxis::X, JointAxis::Y, JointAxis::Z];
        let angular = [JointAxis::AngX, JointAxis::AngY, JointAxis::AngZ];
        for (i, axis) in linear.into_iter().enumerate() {
            limit(
                &mut joint,
                axis,
                descriptor.linear_lower_limit[i],
                descriptor.linear_upper_limit[i],
                100f32,
                descriptor.linear_stiffness[i],
            );
        }
        for (i, axis) in angular.into_iter().enumerate() {
            limit(
                &mut joint,
                axis,
                descriptor.angular_lower_limit[i],
                descriptor.angular_upper_limit[i],
                PI * 2f32,
                descriptor.angular_stiffness[i],
            );
        }
        joint
    }
}

impl PhysicsEngine for RapierPhysicsEngine {
    fn add_rigid_body(&mut self, descriptor: &RigidBodyDescriptor) -> PhysicsBodyHandle {
        let body_type = if descriptor.kinematic {
            RigidBodyType::KinematicPositionBased
        } else {
            RigidBodyType::Dynamic
        };
        let body = RigidBodyBuilder::new(body_type)
            .position(descriptor.initial_transform)
            .angular_damping(descriptor.angular_damping)
            .linear_damping(descriptor.linear_damping)
            .build();
        let handle = self.rigid_body_set.insert(body);
        let builder = match descriptor.shape {
            RigidBodyShape::Sphere { radius } => ColliderBuilder::ball(radius),
            RigidBodyShape::Box { half_extents } => {
                ColliderBuilder::cuboid(half_extents[0], half_extents[1], half_extents[2])
            }
            RigidBodyShape::Capsule { radius, height } => {
                ColliderBuilder::capsule_y(height / 2f32, radius)
            }
        };
        let collider = builder
            .mass(descriptor.mass)
            .friction(descriptor.friction)
            .restitution(descriptor.restitution)
            .collision_groups(InteractionGroups::new(
                Group::from_bits_truncate(1u32 << descriptor.collision_group.min(15)),
                Group::from_bits_truncate(descriptor.collision_mask as u32),
            ))
            .build();
        self.collider_set
            .insert_with_parent(collider, handle, &mut self.rigid_body_set);
        self.bodies.push(Some(BodySlot {
            handle,
            initial_transform: descriptor.initial_transform,
        }));
        PhysicsBodyHandle(self.bodies.len() - 1)
    }

    fn add_joint(&mut self, descriptor: &JointDescriptor) -> Option<PhysicsJointHandle> {
        let a = *self.slot(descriptor.body_a)?;
        let b = *self.slot(descriptor.body_b)?;
        let joint = Self::build_joint(descriptor, &a.initial_transform, &b.initial_transform);
        let handle = self
            .impulse_joint_set
            .insert(a.handle, b.handle, joint, true);
        self.joints.push(Some(handle));
        Some(PhysicsJointHandle(self.joints.len() - 1))
    }

    fn remove_rigid_body(&mut self, handle: PhysicsBodyHandle) {
        if let Some(slot) = self.bodies.get_mut(handle.0).and_then(Option::take) {
            self.rigid_body_set.remove(
                slot.handle,
                &mut self.island_manager,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                true,
            );
        }
    }

    fn remove_joint(&mut self, handle: PhysicsJointHandle) {
        if let Some(inner) = self.joints.get_mut(handle.0).and_then(Option::take) {
            self.impulse_joint_set.remove(inner, true);
        }
    }

    fn set_kinematic(&mut self, handle: PhysicsBodyHandle, value: bool) {
        if let Some(body) = self.body_mut(handle) {
            if body.is_kinematic() != value {
                let body_type = if value {
                    RigidBodyType::KinematicPositionBased
                } else {
                    RigidBodyType::Dynamic
                };
                body.set_body_type(body_type, true);
            }
        }
    }

    fn is_kinematic(&self, handle: PhysicsBodyHandle) -> bool {
        self.slot(handle)
            .and_then(|slot| self.rigid_body_set.get(slot.handle))
            .map(|body| body.is_kinematic())
            .unwrap_or(true)
    }

    fn set_kinematic_target(&mut self, handle: PhysicsBodyHandle, target: &Isometry3<f32>) {
        if let Some(body) = self.body_mut(handle) {
            if body.is_kinematic() {
                body.set_next_kinematic_position(*target);
            }
        }
    }

    fn reset_rigid_body(&mut self, handle: PhysicsBodyHandle, transform: &Isometry3<f32>) {
        if let Some(body) = self.body_mut(handle) {
            body.set_position(*transform, true);
            body.set_linvel(nalgebra::vector![0f32, 0f32, 0f32], true);
            body.set_angvel(nalgebra::vector![0f32, 0f32, 0f32], true);
            body.reset_forces(true);
        }
    }

    fn step_simulation(&mut self, seconds: f32) {
        let dt = self.integration_parameters.dt;
        // absorbs rounding so a step of exactly dt is not carried over as residual
        let total = seconds + self.dt_residual + dt * 1e-4f32;
        let it_count = total.div_euclid(dt) as u32;
        self.dt_residual = (total.rem_euclid(dt) - dt * 1e-4f32).max(0f32);
        for _ in 0..it_count {
            self.physics_pipeline.step(
                &self.gravity,
                &self.integration_parameters,
                &mut self.island_manager,
                &mut self.broad_phase,
                &mut self.narrow_phase,
                &mut self.rigid_body_set,
                &mut self.collider_set,
                &mut self.impulse_joint_set,
                &mut self.multibody_joint_set,
                &mut self.ccd_solver,
                None,
                &(),
                &(),
            )
        }
    }

    fn world_transform(&self, handle: PhysicsBodyHandle) -> Option<Isometry3<f32>> {
        self.slot(handle)
            .and_then(|slot| self.rigid_body_set.get(slot.handle))
            .map(|body| *body.position())
    }
}

#[derive(Debug, Clone, Copy)]
struct NullBody {
    transform: Isometry3<f32>,
    kinematic: bool,
}

/// Keeps bodies where they were put. Dynamic bodies never move.
#[derive(Debug, Clone, Default)]
pub struct NullPhysicsEngine {
    bodies: Vec<Option<NullBody>>,
    num_joints: usize,
    elapsed: f32,
}

impl NullPhysicsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds stepped so far.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }
}

impl PhysicsEngine for NullPhysicsEngine {
    fn add_rigid_body(&mut self, descriptor: &RigidBodyDescriptor) -> PhysicsBodyHandle {
        self.bodies.push(Some(NullBody {
            transform: descriptor.initial_transform,
            kinematic: descriptor.kinematic,
        }));
        PhysicsBodyHandle(self.bodies.len() - 1)
    }

    fn add_joint(&mut self, descriptor: &JointDescriptor) -> Option<PhysicsJointHandle> {
        let known = |handle: PhysicsBodyHandle| {
            self.bodies
                .get(handle.0)
                .map(Option::is_some)
                .unwrap_or(false)
        };
        if known(descriptor.body_a) && known(descriptor.body_b) {
            self.num_joints += 1;
            Some(PhysicsJointHandle(self.num_joints - 1))
        } else {
            None
        }
    }

    fn remove_rigid_body(&mut self, handle: PhysicsBodyHandle) {
        if let Some(body) = self.bodies.get_mut(handle.0) {
            *body = None;
        }
    }

    fn remove_joint(&mut self, _handle: PhysicsJointHandle) {}

    fn set_kinematic(&mut self, handle: PhysicsBodyHandle, value: bool) {
        if let Some(Some(body)) = self.bodies.get_mut(handle.0) {
            body.kinematic = value;
        }
    }

    fn is_kinematic(&self, handle: PhysicsBodyHandle) -> bool {
        self.bodies
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|body| body.kinematic)
            .unwrap_or(true)
    }

    fn set_kinematic_target(&mut self, handle: PhysicsBodyHandle, target: &Isometry3<f32>) {
        if let Some(Some(body)) = self.bodies.get_mut(handle.0) {
            if body.kinematic {
                body.transform = *target;
            }
        }
    }

    fn reset_rigid_body(&mut self, handle: PhysicsBodyHandle, transform: &Isometry3<f32>) {
        if let Some(Some(body)) = self.bodies.get_mut(handle.0) {
            body.transform = *transform;
        }
    }

    fn step_simulation(&mut self, seconds: f32) {
        self.elapsed += seconds;
    }

    fn world_transform(&self, handle: PhysicsBodyHandle) -> Option<Isometry3<f32>> {
        self.bodies
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|body| body.transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere(y: f32, kinematic: bool) -> RigidBodyDescriptor {
        RigidBodyDescriptor {
            name: "ball".to_owned(),
            shape: RigidBodyShape::Sphere { radius: 0.5f32 },
            mass: 1f32,
            linear_damping: 0f32,
            angular_damping: 0f32,
            friction: 0.5f32,
            restitution: 0f32,
            collision_group: 0,
            collision_mask: 0,
            initial_transform: Isometry3::translation(0f32, y, 0f32),
            kinematic,
        }
    }

    #[test]
    fn test_dynamic_body_falls() {
        let mut engine = RapierPhysicsEngine::new([0f32, -9.8f32, 0f32], 60f32);
        let handle = engine.add_rigid_body(&sphere(10f32, false));
        for _ in 0..30 {
            engine.step_simulation(1f32 / 60f32);
        }
        let y = engine.world_transform(handle).unwrap().translation.vector.y;
        assert!(y < 9f32, "y = {}", y);
    }

    #[test]
    fn test_kinematic_body_follows_target() {
        let mut engine = RapierPhysicsEngine::new([0f32, -9.8f32, 0f32], 60f32);
        let handle = engine.add_rigid_body(&sphere(0f32, true));
        assert!(engine.is_kinematic(handle));
        engine.set_kinematic_target(handle, &Isometry3::translation(1f32, 2f32, 3f32));
        engine.step_simulation(1f32 / 60f32);
        let t = engine.world_transform(handle).unwrap().translation.vector;
        assert!((t - nalgebra::vector![1f32, 2f32, 3f32]).norm() < 1e-4f32);
        engine.remove_rigid_body(handle);
        assert_eq!(None, engine.world_transform(handle));
        assert_eq!(0, engine.num_rigid_bodies());
    }

    #[test]
    fn test_joint_needs_both_bodies() {
        let mut engine = NullPhysicsEngine::new();
        let a = engine.add_rigid_body(&sphere(0f32, true));
        let b = engine.add_rigid_body(&sphere(1f32, false));
        let mut joint = JointDescriptor {
            name: "hinge".to_owned(),
            body_a: a,
            body_b: b,
            transform: Isometry3::identity(),
            linear_lower_limit: [0f32; 3],
            linear_upper_limit: [0f32; 3],
            angular_lower_limit: [0f32; 3],
            angular_upper_limit: [0f32; 3],
            linear_stiffness: [0f32; 3],
            angular_stiffness: [0f32; 3],
        };
        assert!(engine.add_joint(&joint).is_some());
        joint.body_b = PhysicsBodyHandle(7);
        assert!(engine.add_joint(&joint).is_none());
        assert!(SimulationMode::EnableTracing.is_enabled(false, true));
        assert!(!SimulationMode::EnablePlaying.is_enabled(false, true));
    }
}
