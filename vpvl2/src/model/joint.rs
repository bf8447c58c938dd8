use nalgebra::Isometry3;
use vpvl2_loader::{
    common::resolve_index,
    model::{ModelJoint, ModelJointType},
};

use crate::{
    error::Vpvl2Error,
    physics_engine::{JointDescriptor, PhysicsEngine, PhysicsJointHandle},
};

use super::{
    rigid_body::{raw_isometry, RigidBodySet},
    RigidBodyIndex,
};

#[derive(Debug, Clone)]
pub struct Joint {
    pub name: String,
    pub name_en: String,
    pub typ: ModelJointType,
    pub rigid_body_a: RigidBodyIndex,
    pub rigid_body_b: RigidBodyIndex,
    world_transform: Isometry3<f32>,
    origin: ModelJoint,
    physics_joint: Option<PhysicsJointHandle>,
}

impl Joint {
    fn from_raw(
        handle: usize,
        joint: &ModelJoint,
        num_rigid_bodies: usize,
    ) -> Result<Self, Vpvl2Error> {
        let mut name = joint.name_ja.clone();
        if name.is_empty() {
            name = format!("Joint{}", handle);
        }
        let resolve = |index: i32| match resolve_index(index, num_rigid_bodies) {
            Ok(Some(rigid_body)) => Ok(rigid_body),
            _ => Err(Vpvl2Error::invalid_joints(format!(
                "joint \"{}\" refers to rigid body {}",
                name, index
            ))),
        };
        let rigid_body_a = resolve(joint.rigid_body_a_index)?;
        let rigid_body_b = resolve(joint.rigid_body_b_index)?;
        Ok(Self {
            name_en: joint.name_en.clone(),
            typ: joint.typ,
            rigid_body_a,
            rigid_body_b,
            world_transform: raw_isometry(joint.origin, joint.orientation),
            origin: joint.clone(),
            physics_joint: None,
            name,
        })
    }

    pub fn physics_joint(&self) -> Option<PhysicsJointHandle> {
        self.physics_joint
    }

    /// Registers the joint once both of its bodies are in the engine.
    pub fn attach(&mut self, rigid_bodies: &RigidBodySet, physics_engine: &mut dyn PhysicsEngine) {
        if self.physics_joint.is_some() {
            return;
        }
        let body_a = rigid_bodies
            .get(self.rigid_body_a)
            .and_then(|rigid_body| rigid_body.physics_body());
        let body_b = rigid_bodies
            .get(self.rigid_body_b)
            .and_then(|rigid_body| rigid_body.physics_body());
        if let (Some(body_a), Some(body_b)) = (body_a, body_b) {
            self.physics_joint = physics_engine.add_joint(&JointDescriptor {
                name: self.name.clone(),
                body_a,
                body_b,
                transform: self.world_transform,
                linear_lower_limit: self.origin.linear_lower_limit,
                linear_upper_limit: self.origin.linear_upper_limit,
                angular_lower_limit: self.origin.angular_lower_limit,
                angular_upper_limit: self.origin.angular_upper_limit,
                linear_stiffness: self.origin.linear_stiffness,
                angular_stiffness: self.origin.angular_stiffness,
            });
        }
    }

    pub fn detach(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        if let Some(handle) = self.physics_joint.take() {
            physics_engine.remove_joint(handle);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JointSet {
    joints: Vec<Joint>,
}

impl JointSet {
    pub fn new(origin: &[ModelJoint], rigid_bodies: &RigidBodySet) -> Result<Self, Vpvl2Error> {
        let joints = origin
            .iter()
            .enumerate()
            .map(|(handle, joint)| Joint::from_raw(handle, joint, rigid_bodies.len()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { joints })
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Joint> {
        self.joints.iter()
    }

    pub fn attach_all(&mut self, rigid_bodies: &RigidBodySet, physics_engine: &mut dyn PhysicsEngine) {
        for joint in &mut self.joints {
            joint.attach(rigid_bodies, physics_engine);
        }
    }

    pub fn detach_all(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        for joint in &mut self.joints {
            joint.detach(physics_engine);
        }
    }
}

#[cfg(test)]
mod tests {
    use vpvl2_loader::model::{ModelBone, ModelRigidBody};

    use super::*;
    use crate::{error::ErrorKind, model::bone::BoneSet, physics_engine::NullPhysicsEngine};

    #[test]
    fn test_joint_links_attached_bodies() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let bones = BoneSet::new(&[ModelBone::new("root", [0f32; 3], -1)])?;
        let mut rigid_bodies = RigidBodySet::new(
            &[ModelRigidBody::default(), ModelRigidBody::default()],
            &bones,
        )?;
        let raw = ModelJoint {
            name_ja: "link".to_owned(),
            rigid_body_a_index: 0,
            rigid_body_b_index: 1,
            ..Default::default()
        };
        let mut joints = JointSet::new(&[raw.clone()], &rigid_bodies)?;
        let mut engine = NullPhysicsEngine::new();
        joints.attach_all(&rigid_bodies, &mut engine);
        assert!(joints.iter().all(|joint| joint.physics_joint().is_none()));
        rigid_bodies.attach_all(&mut engine);
        joints.attach_all(&rigid_bodies, &mut engine);
        assert!(joints.iter().all(|joint| joint.physics_joint().is_some()));

        let bad = ModelJoint {
            rigid_body_b_index: 2,
            ..raw
        };
        let err = JointSet::new(&[bad], &rigid_bodies).unwrap_err();
        assert_eq!(ErrorKind::InvalidJoints, err.kind());
        Ok(())
    }
}
