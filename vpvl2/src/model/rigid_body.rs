use std::collections::HashSet;

use cgmath::Matrix4;
use nalgebra::Isometry3;
use vpvl2_loader::{
    common::resolve_index,
    model::{ModelRigidBody, ModelRigidBodyShapeType, ModelRigidBodyTransformType},
};

use crate::{
    error::Vpvl2Error,
    physics_engine::{PhysicsBodyHandle, PhysicsEngine, RigidBodyDescriptor, RigidBodyShape},
    utils::{euler_to_quat, f32x3_to_vec3, from_isometry, to_isometry, to_na_quat},
};

use super::{bone::BoneSet, BoneIndex, RigidBodyIndex};

pub(crate) fn raw_isometry(origin: [f32; 3], orientation: [f32; 3]) -> Isometry3<f32> {
    Isometry3::from_parts(
        nalgebra::Translation3::new(origin[0], origin[1], origin[2]),
        to_na_quat(euler_to_quat(f32x3_to_vec3(orientation))),
    )
}

#[derive(Debug, Clone)]
pub struct RigidBody {
    pub name: String,
    pub name_en: String,
    pub bone: Option<BoneIndex>,
    pub transform_type: ModelRigidBodyTransformType,
    initial_world_transform: Isometry3<f32>,
    descriptor: RigidBodyDescriptor,
    physics_body: Option<PhysicsBodyHandle>,
}

impl RigidBody {
    fn from_raw(
        handle: RigidBodyIndex,
        rigid_body: &ModelRigidBody,
        bones: &BoneSet,
    ) -> Result<Self, Vpvl2Error> {
        let mut name = rigid_body.name_ja.clone();
        if name.is_empty() {
            name = format!("RigidBody{}", handle);
        }
        let bone = resolve_index(rigid_body.bone_index, bones.len()).map_err(|idx| {
            Vpvl2Error::invalid_rigid_bodies(format!(
                "rigid body \"{}\" refers to bone {}",
                name, idx
            ))
        })?;
        let size = rigid_body.size;
        let shape = match rigid_body.shape_type {
            ModelRigidBodyShapeType::Sphere => RigidBodyShape::Sphere { radius: size[0] },
            ModelRigidBodyShapeType::Box => RigidBodyShape::Box { half_extents: size },
            ModelRigidBodyShapeType::Capsule => RigidBodyShape::Capsule {
                radius: size[0],
                height: size[1],
            },
        };
        let is_to_simulation =
            rigid_body.transform_type == ModelRigidBodyTransformType::FromBoneToSimulation;
        let initial_world_transform = raw_isometry(rigid_body.origin, rigid_body.orientation);
        let descriptor = RigidBodyDescriptor {
            name: name.clone(),
            shape,
            mass: if is_to_simulation { 0f32 } else { rigid_body.mass },
            linear_damping: rigid_body.linear_damping,
            angular_damping: rigid_body.angular_damping,
            friction: rigid_body.friction,
            restitution: rigid_body.restitution,
            collision_group: rigid_body.collision_group_id.clamp(0, 15) as u8,
            collision_mask: (rigid_body.collision_mask & 0xffff) as u16,
            initial_transform: initial_world_transform,
            kinematic: is_to_simulation,
        };
        Ok(Self {
            name,
            name_en: rigid_body.name_en.clone(),
            bone,
            transform_type: rigid_body.transform_type,
            initial_world_transform,
            descriptor,
            physics_body: None,
        })
    }

    pub fn physics_body(&self) -> Option<PhysicsBodyHandle> {
        self.physics_body
    }

    pub fn initial_world_transform(&self) -> &Isometry3<f32> {
        &self.initial_world_transform
    }

    pub fn is_to_simulation(&self) -> bool {
        self.transform_type == ModelRigidBodyTransformType::FromBoneToSimulation
    }

    pub fn is_from_simulation(&self) -> bool {
        !self.is_to_simulation()
    }

    pub fn attach(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        if self.physics_body.is_none() {
            self.physics_body = Some(physics_engine.add_rigid_body(&self.descriptor));
        }
    }

    pub fn detach(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        if let Some(handle) = self.physics_body.take() {
            physics_engine.remove_rigid_body(handle);
        }
    }

    /// Where the body sits when it follows the animated bone.
    fn follow_transform(&self, skinning_transform: Matrix4<f32>) -> Isometry3<f32> {
        to_isometry(skinning_transform) * self.initial_world_transform
    }
}

#[derive(Debug, Clone, Default)]
pub struct RigidBodySet {
    rigid_bodies: Vec<RigidBody>,
    /// Bones whose world transform comes from the simulation.
    simulated_bones: HashSet<BoneIndex>,
}

impl RigidBodySet {
    pub fn new(origin: &[ModelRigidBody], bones: &BoneSet) -> Result<Self, Vpvl2Error> {
        let rigid_bodies = origin
            .iter()
            .enumerate()
            .map(|(handle, rigid_body)| RigidBody::from_raw(handle, rigid_body, bones))
            .collect::<Result<Vec<_>, _>>()?;
        let simulated_bones = rigid_bodies
            .iter()
            .filter(|rigid_body| rigid_body.is_from_simulation())
            .filter_map(|rigid_body| rigid_body.bone)
            .collect();
        Ok(Self {
            rigid_bodies,
            simulated_bones,
        })
    }

    pub fn len(&self) -> usize {
        self.rigid_bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigid_bodies.is_empty()
    }

    pub fn get(&self, handle: RigidBodyIndex) -> Option<&RigidBody> {
        self.rigid_bodies.get(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RigidBody> {
        self.rigid_bodies.iter()
    }

    pub fn simulated_bones(&self) -> &HashSet<BoneIndex> {
        &self.simulated_bones
    }

    pub fn attach_all(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        for rigid_body in &mut self.rigid_bodies {
            rigid_body.attach(physics_engine);
        }
    }

    pub fn detach_all(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        for rigid_body in &mut self.rigid_bodies {
            rigid_body.detach(physics_engine);
        }
    }

    /// Switches bodies between kinematic and dynamic and pushes kinematic targets. Bodies follow
    /// their bone when they are bone driven, or when the bone or the whole model has physics off.
    pub fn synchronize_to_simulation(
        &self,
        bones: &BoneSet,
        physics_enabled: bool,
        physics_engine: &mut dyn PhysicsEngine,
    ) {
        for rigid_body in &self.rigid_bodies {
            let (Some(handle), Some(bone)) = (
                rigid_body.physics_body,
                rigid_body.bone.and_then(|bone| bones.get(bone)),
            ) else {
                continue;
            };
            let kinematic =
                rigid_body.is_to_simulation() || !physics_enabled || !bone.enable_physics;
            physics_engine.set_kinematic(handle, kinematic);
            if kinematic {
                physics_engine.set_kinematic_target(
                    handle,
                    &rigid_body.follow_transform(bone.matrices.skinning_transform),
                );
            }
        }
    }

    /// Writes simulated transforms into their bones and refreshes the descendants that are not
    /// simulated themselves.
    pub fn synchronize_from_simulation(
        &self,
        bones: &mut BoneSet,
        base_transform: &Matrix4<f32>,
        physics_engine: &dyn PhysicsEngine,
    ) {
        let mut moved = HashSet::new();
        for rigid_body in self.rigid_bodies.iter().filter(|r| r.is_from_simulation()) {
            let (Some(handle), Some(bone_index)) = (rigid_body.physics_body, rigid_body.bone)
            else {
                continue;
            };
            if physics_engine.is_kinematic(handle) {
                continue;
            }
            let Some(world) = physics_engine.world_transform(handle) else {
                continue;
            };
            let Some(bone) = bones.get_mut(bone_index) else {
                continue;
            };
            let mut skinning_transform =
                from_isometry(&(world * rigid_body.initial_world_transform.inverse()));
            if rigid_body.transform_type
                == ModelRigidBodyTransformType::FromBoneOrientationAndSimulationToBone
            {
                // keep the animated position and take only the simulated orientation
                let mut world_transform =
                    skinning_transform * Matrix4::from_translation(bone.origin);
                world_transform.w = bone.matrices.world_transform.w;
                skinning_transform = world_transform * Matrix4::from_translation(-bone.origin);
            }
            bone.update_matrices_by_skinning(skinning_transform);
            moved.insert(bone_index);
        }
        if !moved.is_empty() {
            bones.update_descendants(&moved, &self.simulated_bones, base_transform);
        }
    }

    /// Teleports every body onto its bone.
    pub fn reset(&self, bones: &BoneSet, physics_engine: &mut dyn PhysicsEngine) {
        for rigid_body in &self.rigid_bodies {
            let Some(handle) = rigid_body.physics_body else {
                continue;
            };
            let transform = rigid_body
                .bone
                .and_then(|bone| bones.get(bone))
                .map(|bone| rigid_body.follow_transform(bone.matrices.skinning_transform))
                .unwrap_or(rigid_body.initial_world_transform);
            physics_engine.reset_rigid_body(handle, &transform);
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{SquareMatrix, Vector3};
    use vpvl2_loader::model::ModelBone;

    use super::*;
    use crate::{error::ErrorKind, physics_engine::NullPhysicsEngine, utils::mat4_translation};

    fn hair() -> (Vec<ModelBone>, Vec<ModelRigidBody>) {
        let bones = vec![
            ModelBone::new("head", [0f32, 10f32, 0f32], -1),
            ModelBone::new("hair", [0f32, 9f32, 0f32], 0),
            ModelBone::new("hair tip", [0f32, 8f32, 0f32], 1),
        ];
        let rigid_bodies = vec![
            ModelRigidBody {
                name_ja: "head".to_owned(),
                bone_index: 0,
                origin: [0f32, 10f32, 0f32],
                ..Default::default()
            },
            ModelRigidBody {
                name_ja: "hair".to_owned(),
                bone_index: 1,
                origin: [0f32, 9f32, 0f32],
                transform_type: ModelRigidBodyTransformType::FromSimulationToBone,
                ..Default::default()
            },
        ];
        (bones, rigid_bodies)
    }

    #[test]
    fn test_bone_index_out_of_range() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let (bones, mut rigid_bodies) = hair();
        let bones = BoneSet::new(&bones)?;
        rigid_bodies[1].bone_index = 5;
        let err = RigidBodySet::new(&rigid_bodies, &bones).unwrap_err();
        assert_eq!(ErrorKind::InvalidRigidBodies, err.kind());
        Ok(())
    }

    #[test]
    fn test_simulated_bone_pulls_descendants() -> Result<(), Box<dyn std::error::Error + 'static>>
    {
        let (bones, rigid_bodies) = hair();
        let mut bones = BoneSet::new(&bones)?;
        bones.update_all_local();
        bones.update_all_matrices(&Matrix4::identity());
        let mut set = RigidBodySet::new(&rigid_bodies, &bones)?;
        let mut engine = NullPhysicsEngine::new();
        set.attach_all(&mut engine);
        set.synchronize_to_simulation(&bones, true, &mut engine);
        let hair_body = set.get(1).unwrap().physics_body().unwrap();
        assert!(!engine.is_kinematic(hair_body));
        assert!(engine.is_kinematic(set.get(0).unwrap().physics_body().unwrap()));
        engine.reset_rigid_body(hair_body, &Isometry3::translation(1f32, 9f32, 0f32));
        set.synchronize_from_simulation(&mut bones, &Matrix4::identity(), &engine);
        let tip = mat4_translation(&bones.get(2).unwrap().matrices.world_transform);
        assert_eq!(Vector3::new(1f32, 8f32, 0f32), tip);
        set.synchronize_to_simulation(&bones, false, &mut engine);
        assert!(engine.is_kinematic(hair_body));
        Ok(())
    }
}
