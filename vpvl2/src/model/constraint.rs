use std::collections::HashSet;

use cgmath::{InnerSpace, Matrix4, Quaternion, Rad, Rotation3, Vector3};
use vpvl2_loader::{common::resolve_index, model::ModelConstraint};

use crate::{
    error::Vpvl2Error,
    utils::{f32x3_to_vec3, normalize_or_identity, rigid_invert},
};

use super::{bone::BoneSet, Bone, BoneIndex};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintLink {
    pub bone: BoneIndex,
    /// Euler limits as `(lower, upper)` in radians.
    pub limits: Option<(Vector3<f32>, Vector3<f32>)>,
}

impl ConstraintLink {
    /// Hinge links rotate about their local X axis only.
    fn is_hinge(&self) -> bool {
        self.limits
            .map(|(lower, upper)| {
                lower.y == 0f32 && upper.y == 0f32 && lower.z == 0f32 && upper.z == 0f32
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintResult {
    pub iterations: u32,
    pub distance: f32,
}

/// CCD IK chain. `target` holds the goal position and `effector` is the chain end.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub target: BoneIndex,
    pub effector: BoneIndex,
    pub links: Vec<ConstraintLink>,
    pub num_iterations: u32,
    pub angle_limit: f32,
    pub enabled: bool,
}

impl Constraint {
    pub(crate) fn from_raw(
        owner: Option<BoneIndex>,
        constraint: &ModelConstraint,
        bones: &BoneSet,
    ) -> Result<Self, Vpvl2Error> {
        let len = bones.len();
        let resolve = |index: i32, what: &str| -> Result<BoneIndex, Vpvl2Error> {
            match resolve_index(index, len) {
                Ok(Some(handle)) => Ok(handle),
                _ => Err(Vpvl2Error::invalid_bones(format!(
                    "constraint \"{}\" has an invalid {} bone index {}",
                    constraint.name, what, index
                ))),
            }
        };
        let target = match owner {
            Some(owner) if constraint.target_bone_index < 0 => owner,
            _ => resolve(constraint.target_bone_index, "target")?,
        };
        let effector = resolve(constraint.effector_bone_index, "effector")?;
        let mut name = constraint.name.clone();
        if name.is_empty() {
            name = bones
                .get(target)
                .map(|bone| bone.name.clone())
                .unwrap_or_else(|| format!("Constraint{}", target));
        }
        let mut seen = HashSet::new();
        let mut links = vec![];
        for joint in &constraint.joints {
            let bone = resolve(joint.bone_index, "link")?;
            if bone == target {
                return Err(Vpvl2Error::configuration(format!(
                    "constraint \"{}\" contains its own target in the chain",
                    name
                )));
            }
            if !seen.insert(bone) {
                return Err(Vpvl2Error::configuration(format!(
                    "constraint \"{}\" links bone {} twice",
                    name, bone
                )));
            }
            links.push(ConstraintLink {
                bone,
                limits: joint.has_angle_limit.then(|| {
                    (
                        f32x3_to_vec3(joint.lower_limit),
                        f32x3_to_vec3(joint.upper_limit),
                    )
                }),
            });
        }
        Ok(Self {
            name,
            target,
            effector,
            links,
            num_iterations: constraint.num_iterations.max(0) as u32,
            angle_limit: constraint.angle_limit,
            enabled: true,
        })
    }

    fn distance(&self, bones: &BoneSet, target_position: Vector3<f32>) -> f32 {
        bones
            .get(self.effector)
            .map(|bone| (bone.world_translation() - target_position).magnitude())
            .unwrap_or(0f32)
    }

    fn snapshot(&self, bones: &BoneSet) -> Vec<Option<Quaternion<f32>>> {
        self.links
            .iter()
            .map(|link| bones.get(link.bone).and_then(|bone| bone.constraint_orientation))
            .collect()
    }

    fn restore(
        &self,
        bones: &mut BoneSet,
        snapshot: &[Option<Quaternion<f32>>],
        base_transform: &Matrix4<f32>,
    ) {
        for (link, orientation) in self.links.iter().zip(snapshot) {
            if let Some(bone) = bones.get_mut(link.bone) {
                bone.constraint_orientation = *orientation;
            }
        }
        let mut links = self.links.iter().map(|link| link.bone).collect::<Vec<_>>();
        let order = bones.transform_order();
        links.sort_by_key(|handle| order.iter().position(|h| h == handle));
        for handle in links {
            bones.update_subtree(handle, base_transform);
        }
    }

    /// Rotation axis for a link in its local frame, or `None` when the link cannot help.
    fn solve_axis(link: &ConstraintLink, bone: &Bone, cross: Vector3<f32>) -> Option<Vector3<f32>> {
        let fixed = bone
            .fixed_axis
            .or_else(|| link.is_hinge().then(Vector3::unit_x));
        match fixed {
            Some(axis) => {
                let sign = cross.dot(axis);
                if sign.abs() <= f32::EPSILON {
                    None
                } else if sign < 0f32 {
                    Some(-axis)
                } else {
                    Some(axis)
                }
            }
            None if cross.magnitude2() > f32::EPSILON => Some(cross.normalize()),
            None => None,
        }
    }

    fn solve_link(
        &self,
        link: &ConstraintLink,
        bones: &mut BoneSet,
        target_position: Vector3<f32>,
        base_transform: &Matrix4<f32>,
    ) {
        let Some(effector_position) = bones.get(self.effector).map(|bone| bone.world_translation())
        else {
            return;
        };
        let Some(bone) = bones.get(link.bone) else {
            return;
        };
        let inv_transform = rigid_invert(&bone.matrices.world_transform);
        let local_effector = (inv_transform * effector_position.extend(1f32)).truncate();
        let local_target = (inv_transform * target_position.extend(1f32)).truncate();
        if local_effector.magnitude2() <= f32::EPSILON || local_target.magnitude2() <= f32::EPSILON
        {
            return;
        }
        let effector_direction = local_effector.normalize();
        let target_direction = local_target.normalize();
        let angle = effector_direction
            .dot(target_direction)
            .clamp(-1f32, 1f32)
            .acos()
            .min(self.angle_limit);
        if angle <= 1e-6f32 {
            return;
        }
        let cross = effector_direction.cross(target_direction);
        let Some(axis) = Self::solve_axis(link, bone, cross) else {
            return;
        };
        let current = bone
            .constraint_orientation
            .unwrap_or(bone.local_user_orientation);
        let mut orientation =
            normalize_or_identity(current * Quaternion::from_axis_angle(axis, Rad(angle)));
        if let Some((lower, upper)) = &link.limits {
            orientation = Bone::constrain_orientation(orientation, upper, lower);
        }
        if let Some(bone) = bones.get_mut(link.bone) {
            bone.constraint_orientation = Some(orientation);
        }
        bones.update_subtree(link.bone, base_transform);
    }

    /// Runs CCD until the effector is within `epsilon` of the target. The best iteration is kept
    /// when later ones move the effector away.
    pub fn solve(
        &self,
        bones: &mut BoneSet,
        base_transform: &Matrix4<f32>,
        epsilon: f32,
    ) -> ConstraintResult {
        let Some(target_position) = bones.get(self.target).map(|bone| bone.world_translation())
        else {
            return ConstraintResult {
                iterations: 0,
                distance: 0f32,
            };
        };
        let mut best_distance = self.distance(bones, target_position);
        let mut best = self.snapshot(bones);
        let mut iterations = 0;
        while iterations < self.num_iterations && best_distance >= epsilon {
            for link in &self.links {
                self.solve_link(link, bones, target_position, base_transform);
            }
            iterations += 1;
            let distance = self.distance(bones, target_position);
            if distance < best_distance {
                best_distance = distance;
                best = self.snapshot(bones);
            }
        }
        if self.distance(bones, target_position) > best_distance {
            self.restore(bones, &best, base_transform);
        }
        ConstraintResult {
            iterations,
            distance: best_distance,
        }
    }

    pub fn link_bones(&self) -> impl Iterator<Item = BoneIndex> + '_ {
        self.links.iter().map(|link| link.bone)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new(
        origin: &[(Option<BoneIndex>, &ModelConstraint)],
        bones: &BoneSet,
    ) -> Result<Self, Vpvl2Error> {
        let constraints = origin
            .iter()
            .map(|(owner, constraint)| Constraint::from_raw(*owner, constraint, bones))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { constraints })
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Constraint> {
        self.constraints.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.constraints.iter()
    }

    /// Finds a chain by the name of the bone holding its goal.
    pub fn find_by_target_name_mut(
        &mut self,
        bones: &BoneSet,
        name: &str,
    ) -> Option<&mut Constraint> {
        let target = bones.find_index(name)?;
        self.constraints
            .iter_mut()
            .find(|constraint| constraint.target == target)
    }

    pub fn set_all_enabled(&mut self, value: bool) {
        for constraint in &mut self.constraints {
            constraint.enabled = value;
        }
    }

    /// Solves every enabled chain in declaration order and returns the bones they rotated.
    pub fn solve_all(
        &self,
        bones: &mut BoneSet,
        base_transform: &Matrix4<f32>,
        epsilon: f32,
    ) -> HashSet<BoneIndex> {
        let mut moved = HashSet::new();
        for constraint in self.constraints.iter().filter(|c| c.enabled) {
            constraint.solve(bones, base_transform, epsilon);
            moved.extend(constraint.link_bones());
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use cgmath::SquareMatrix;
    use vpvl2_loader::model::{ModelBone, ModelConstraintJoint};

    use super::*;
    use crate::error::ErrorKind;

    fn arm() -> Vec<ModelBone> {
        vec![
            ModelBone::new("base", [0f32, 0f32, 0f32], -1),
            ModelBone::new("shoulder", [0f32, 0f32, 0f32], 0),
            ModelBone::new("elbow", [0f32, 1f32, 0f32], 1),
            ModelBone::new("wrist", [0f32, 2f32, 0f32], 2),
            ModelBone::new("goal", [1f32, 1f32, 0f32], -1),
        ]
    }

    fn constraint(links: &[i32]) -> ModelConstraint {
        ModelConstraint {
            name: "arm IK".to_owned(),
            target_bone_index: 4,
            effector_bone_index: 3,
            joints: links
                .iter()
                .map(|bone_index| ModelConstraintJoint {
                    bone_index: *bone_index,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_two_link_chain_converges() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let mut bones = BoneSet::new(&arm())?;
        bones.update_all_local();
        bones.update_all_matrices(&Matrix4::identity());
        let raw = constraint(&[2, 1]);
        let constraint = Constraint::from_raw(None, &raw, &bones)?;
        let result = constraint.solve(&mut bones, &Matrix4::identity(), 1e-4f32);
        assert!(result.distance < 1e-2f32, "distance {}", result.distance);
        let wrist = bones.get(3).unwrap().world_translation();
        assert!((wrist - Vector3::new(1f32, 1f32, 0f32)).magnitude() < 1e-2f32);
        assert!(bones.get(1).unwrap().constraint_orientation.is_some());
        Ok(())
    }

    #[test]
    fn test_invalid_chains() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let bones = BoneSet::new(&arm())?;
        let err = Constraint::from_raw(None, &constraint(&[2, 9]), &bones).unwrap_err();
        assert_eq!(ErrorKind::InvalidBones, err.kind());
        let err = Constraint::from_raw(None, &constraint(&[2, 4]), &bones).unwrap_err();
        assert_eq!(ErrorKind::Configuration, err.kind());
        let err = Constraint::from_raw(None, &constraint(&[2, 2]), &bones).unwrap_err();
        assert_eq!(ErrorKind::Configuration, err.kind());
        Ok(())
    }

    #[test]
    fn test_hinge_limit_keeps_rotation_on_x() {
        let orientation = Quaternion::from_angle_y(Rad(0.5f32));
        let limited = Bone::constrain_orientation(
            orientation,
            &Vector3::new(3f32, 0f32, 0f32),
            &Vector3::new(-3f32, 0f32, 0f32),
        );
        assert!((limited - Quaternion::new(1f32, 0f32, 0f32, 0f32)).magnitude() < 1e-5f32);
    }
}
