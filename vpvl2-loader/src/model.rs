use serde::{Deserialize, Serialize};

use crate::common::NULL_INDEX;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    pub name_ja: String,
    pub name_en: String,
    pub comment: String,
    pub bones: Vec<ModelBone>,
    pub morphs: Vec<ModelMorph>,
    /// Constraints stored outside of bones, as legacy models do.
    pub constraints: Vec<ModelConstraint>,
    pub rigid_bodies: Vec<ModelRigidBody>,
    pub joints: Vec<ModelJoint>,
}

impl Model {
    pub fn find_bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|bone| bone.name_ja == name)
    }

    /// Every constraint of the model in declaration order: standalone ones first, then the ones
    /// attached to bones in bone order.
    pub fn all_constraints(&self) -> Vec<(Option<usize>, &ModelConstraint)> {
        self.constraints
            .iter()
            .map(|constraint| (None, constraint))
            .chain(
                self.bones
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, bone)| bone.constraint.as_ref().map(|c| (Some(idx), c))),
            )
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBoneFlags {
    pub is_rotatable: bool,
    pub is_movable: bool,
    pub is_visible: bool,
    pub has_constraint: bool,
    pub has_local_inherent: bool,
    pub has_inherent_orientation: bool,
    pub has_inherent_translation: bool,
    pub has_fixed_axis: bool,
    pub has_local_axes: bool,
    pub is_affected_by_physics_simulation: bool,
}

impl ModelBoneFlags {
    /// Decodes the 16 bit flag field of the extended model format.
    pub fn from_raw(u: u16) -> ModelBoneFlags {
        ModelBoneFlags {
            is_rotatable: (u / 2) % 2 != 0,
            is_movable: (u / 4) % 2 != 0,
            is_visible: (u / 8) % 2 != 0,
            has_constraint: (u / 32) % 2 != 0,
            has_local_inherent: (u / 128) % 2 != 0,
            has_inherent_orientation: (u / 256) % 2 != 0,
            has_inherent_translation: (u / 512) % 2 != 0,
            has_fixed_axis: (u / 1024) % 2 != 0,
            has_local_axes: (u / 2048) % 2 != 0,
            is_affected_by_physics_simulation: (u / 4096) % 2 != 0,
        }
    }
}

#[test]
fn test_model_bone_flags_from_value() {
    let f = ModelBoneFlags::from_raw(33 | 512);
    assert!(f.has_constraint);
    assert!(f.has_inherent_translation);
    assert!(!f.has_inherent_orientation);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelBone {
    pub name_ja: String,
    pub name_en: String,
    pub origin: [f32; 3],
    pub parent_bone_index: i32,
    pub parent_inherent_bone_index: i32,
    pub inherent_coefficient: f32,
    pub fixed_axis: [f32; 3],
    pub local_x_axis: [f32; 3],
    pub local_z_axis: [f32; 3],
    pub stage_index: i32,
    pub flags: ModelBoneFlags,
    pub constraint: Option<ModelConstraint>,
}

impl Default for ModelBone {
    fn default() -> Self {
        Self {
            name_ja: String::new(),
            name_en: String::new(),
            origin: [0f32; 3],
            parent_bone_index: NULL_INDEX,
            parent_inherent_bone_index: NULL_INDEX,
            inherent_coefficient: 1f32,
            fixed_axis: [0f32; 3],
            local_x_axis: [1f32, 0f32, 0f32],
            local_z_axis: [0f32, 0f32, 1f32],
            stage_index: 0,
            flags: ModelBoneFlags {
                is_rotatable: true,
                is_movable: false,
                is_visible: true,
                ..Default::default()
            },
            constraint: None,
        }
    }
}

impl ModelBone {
    pub fn new(name: &str, origin: [f32; 3], parent_bone_index: i32) -> Self {
        Self {
            name_ja: name.to_owned(),
            origin,
            parent_bone_index,
            ..Default::default()
        }
    }

    pub fn has_inherent(&self) -> bool {
        self.flags.has_inherent_orientation || self.flags.has_inherent_translation
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConstraintJoint {
    pub bone_index: i32,
    pub has_angle_limit: bool,
    pub lower_limit: [f32; 3],
    pub upper_limit: [f32; 3],
}

/// An IK chain. `target_bone_index` is the bone holding the goal position and
/// `effector_bone_index` the chain end that should reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConstraint {
    pub name: String,
    pub effector_bone_index: i32,
    pub target_bone_index: i32,
    pub num_iterations: i32,
    pub angle_limit: f32,
    pub joints: Vec<ModelConstraintJoint>,
}

impl Default for ModelConstraint {
    fn default() -> Self {
        Self {
            name: String::new(),
            effector_bone_index: NULL_INDEX,
            target_bone_index: NULL_INDEX,
            num_iterations: 40,
            angle_limit: 1f32,
            joints: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelMorphCategory {
    #[default]
    Base,
    Eyebrow,
    Eye,
    Lip,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelMorphType {
    #[default]
    Vertex,
    Bone,
    Group,
    Uv,
    Material,
    Flip,
    Impulse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMorphBone {
    pub bone_index: i32,
    pub translation: [f32; 3],
    pub orientation: [f32; 4],
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMorphGroup {
    pub morph_index: i32,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelMorph {
    pub name_ja: String,
    pub name_en: String,
    pub category: ModelMorphCategory,
    pub typ: ModelMorphType,
    pub bones: Vec<ModelMorphBone>,
    pub groups: Vec<ModelMorphGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelRigidBodyShapeType {
    #[default]
    Sphere,
    Box,
    Capsule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelRigidBodyTransformType {
    #[default]
    FromBoneToSimulation,
    FromSimulationToBone,
    FromBoneOrientationAndSimulationToBone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRigidBody {
    pub name_ja: String,
    pub name_en: String,
    pub bone_index: i32,
    pub collision_group_id: i32,
    pub collision_mask: i32,
    pub shape_type: ModelRigidBodyShapeType,
    pub size: [f32; 3],
    /// World space position of the body at bind pose.
    pub origin: [f32; 3],
    /// Euler angles in radians.
    pub orientation: [f32; 3],
    pub mass: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub restitution: f32,
    pub friction: f32,
    pub transform_type: ModelRigidBodyTransformType,
}

impl Default for ModelRigidBody {
    fn default() -> Self {
        Self {
            name_ja: String::new(),
            name_en: String::new(),
            bone_index: NULL_INDEX,
            collision_group_id: 0,
            collision_mask: 0xffff,
            shape_type: ModelRigidBodyShapeType::Sphere,
            size: [1f32; 3],
            origin: [0f32; 3],
            orientation: [0f32; 3],
            mass: 1f32,
            linear_damping: 0.5f32,
            angular_damping: 0.5f32,
            restitution: 0f32,
            friction: 0.5f32,
            transform_type: ModelRigidBodyTransformType::FromBoneToSimulation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelJointType {
    #[default]
    Generic6dofSpringConstraint,
    Generic6dofConstraint,
    Point2pointConstraint,
    ConeTwistConstraint,
    SliderConstraint,
    HingeConstraint,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelJoint {
    pub name_ja: String,
    pub name_en: String,
    pub typ: ModelJointType,
    pub rigid_body_a_index: i32,
    pub rigid_body_b_index: i32,
    pub origin: [f32; 3],
    pub orientation: [f32; 3],
    pub linear_lower_limit: [f32; 3],
    pub linear_upper_limit: [f32; 3],
    pub angular_lower_limit: [f32; 3],
    pub angular_upper_limit: [f32; 3],
    pub linear_stiffness: [f32; 3],
    pub angular_stiffness: [f32; 3],
}
