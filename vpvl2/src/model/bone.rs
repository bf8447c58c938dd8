use std::collections::{HashMap, HashSet, VecDeque};

use cgmath::{
    Euler, InnerSpace, Matrix4, One, Quaternion, Rad, SquareMatrix, Vector3, Zero,
};
use vpvl2_loader::{
    common::resolve_index,
    model::{ModelBone, ModelBoneFlags},
};

use crate::{
    error::Vpvl2Error,
    motion::seek::BoneFrameTransform,
    utils::{f32x3_to_vec3, mat4_translation, normalize_or_identity, scale_rotation},
};

use super::BoneIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrices {
    pub world_transform: Matrix4<f32>,
    pub local_transform: Matrix4<f32>,
    pub skinning_transform: Matrix4<f32>,
}

impl Default for Matrices {
    fn default() -> Self {
        Self {
            world_transform: Matrix4::identity(),
            local_transform: Matrix4::identity(),
            skinning_transform: Matrix4::identity(),
        }
    }
}

/// Inheritance ("付与") from another bone of the same model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inherent {
    pub source: BoneIndex,
    pub coefficient: f32,
    pub orientation: bool,
    pub translation: bool,
    /// Inherit the full local transform of the source instead of its user transform.
    pub local: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    pub name_en: String,
    pub handle: BoneIndex,
    pub origin: Vector3<f32>,
    pub parent: Option<BoneIndex>,
    pub children: Vec<BoneIndex>,
    pub inherent: Option<Inherent>,
    pub fixed_axis: Option<Vector3<f32>>,
    pub flags: ModelBoneFlags,
    pub local_user_translation: Vector3<f32>,
    pub local_user_orientation: Quaternion<f32>,
    pub local_morph_translation: Vector3<f32>,
    pub local_morph_orientation: Quaternion<f32>,
    pub local_inherent_translation: Vector3<f32>,
    pub local_inherent_orientation: Quaternion<f32>,
    /// Orientation chosen by an IK solver this step, replacing the user orientation.
    pub constraint_orientation: Option<Quaternion<f32>>,
    pub local_translation: Vector3<f32>,
    pub local_orientation: Quaternion<f32>,
    pub enable_physics: bool,
    pub matrices: Matrices,
}

impl Bone {
    pub const NAME_ROOT_PARENT_IN_JAPANESE: &'static str = "全ての親";
    pub const NAME_CENTER_IN_JAPANESE: &'static str = "センター";
    pub const NAME_LEFT_IN_JAPANESE: &'static str = "左";
    pub const NAME_RIGHT_IN_JAPANESE: &'static str = "右";

    fn from_raw(handle: BoneIndex, bone: &ModelBone, len: usize) -> Result<Self, Vpvl2Error> {
        let mut name = bone.name_ja.clone();
        if name.is_empty() {
            name = format!("Bone{}", handle);
        }
        let parent = resolve_index(bone.parent_bone_index, len).map_err(|idx| {
            Vpvl2Error::configuration(format!(
                "bone \"{}\" refers to missing parent {}",
                name, idx
            ))
        })?;
        if parent == Some(handle) {
            return Err(Vpvl2Error::invalid_bones(format!(
                "bone \"{}\" is its own parent",
                name
            )));
        }
        let inherent = if bone.has_inherent() {
            let source = resolve_index(bone.parent_inherent_bone_index, len).map_err(|idx| {
                Vpvl2Error::configuration(format!(
                    "bone \"{}\" inherits from missing bone {}",
                    name, idx
                ))
            })?;
            source.map(|source| Inherent {
                source,
                coefficient: bone.inherent_coefficient,
                orientation: bone.flags.has_inherent_orientation,
                translation: bone.flags.has_inherent_translation,
                local: bone.flags.has_local_inherent,
            })
        } else {
            None
        };
        let fixed_axis = Some(f32x3_to_vec3(bone.fixed_axis))
            .filter(|axis| bone.flags.has_fixed_axis && axis.magnitude2() > f32::EPSILON)
            .map(|axis| axis.normalize());
        Ok(Self {
            name,
            name_en: bone.name_en.clone(),
            handle,
            origin: f32x3_to_vec3(bone.origin),
            parent,
            children: vec![],
            inherent,
            fixed_axis,
            flags: bone.flags,
            local_user_translation: Vector3::zero(),
            local_user_orientation: Quaternion::one(),
            local_morph_translation: Vector3::zero(),
            local_morph_orientation: Quaternion::one(),
            local_inherent_translation: Vector3::zero(),
            local_inherent_orientation: Quaternion::one(),
            constraint_orientation: None,
            local_translation: Vector3::zero(),
            local_orientation: Quaternion::one(),
            enable_physics: true,
            matrices: Matrices::default(),
        })
    }

    pub fn world_translation(&self) -> Vector3<f32> {
        mat4_translation(&self.matrices.world_transform)
    }

    pub fn set_user_transform(&mut self, frame: &BoneFrameTransform) {
        self.local_user_translation = frame.translation;
        self.local_user_orientation = normalize_or_identity(frame.orientation);
        self.enable_physics = frame.enable_physics;
    }

    pub fn reset_user_transform(&mut self) {
        self.local_user_translation = Vector3::zero();
        self.local_user_orientation = Quaternion::one();
        self.enable_physics = true;
    }

    pub fn reset_morph_transform(&mut self) {
        self.local_morph_translation = Vector3::zero();
        self.local_morph_orientation = Quaternion::one();
    }

    /// Orientation the bone passes on to bones inheriting from it.
    fn inheritable_orientation(&self) -> Quaternion<f32> {
        match self.inherent {
            Some(inherent) if inherent.local => self.local_orientation,
            _ => {
                self.constraint_orientation
                    .unwrap_or(self.local_user_orientation)
                    * self.local_inherent_orientation
            }
        }
    }

    fn inheritable_translation(&self) -> Vector3<f32> {
        match self.inherent {
            Some(inherent) if inherent.local => self.local_translation,
            _ => self.local_user_translation + self.local_inherent_translation,
        }
    }

    /// Composes the local transform from user, morph, IK and inherited parts.
    /// `source` is the inheritable orientation and translation of the inheritance source.
    fn update_local(&mut self, source: Option<(Quaternion<f32>, Vector3<f32>)>) {
        self.local_inherent_orientation = Quaternion::one();
        self.local_inherent_translation = Vector3::zero();
        if let (Some(inherent), Some((orientation, translation))) = (self.inherent, source) {
            if inherent.orientation {
                self.local_inherent_orientation =
                    scale_rotation(orientation, inherent.coefficient);
            }
            if inherent.translation {
                self.local_inherent_translation = translation * inherent.coefficient;
            }
        }
        let orientation = self
            .constraint_orientation
            .unwrap_or(self.local_user_orientation);
        self.local_orientation = normalize_or_identity(
            self.local_morph_orientation * orientation * self.local_inherent_orientation,
        );
        self.local_translation = self.local_user_translation
            + self.local_inherent_translation
            + self.local_morph_translation;
    }

    /// `parent` is the world transform and bind origin of the parent bone.
    fn update_matrices(
        &mut self,
        parent: Option<(Matrix4<f32>, Vector3<f32>)>,
        base_transform: &Matrix4<f32>,
    ) {
        let local_transform = Matrix4::from_translation(self.local_translation)
            * Matrix4::from(self.local_orientation);
        self.matrices.world_transform = match parent {
            Some((world_transform, origin)) => {
                world_transform * Matrix4::from_translation(self.origin - origin) * local_transform
            }
            None => base_transform * Matrix4::from_translation(self.origin) * local_transform,
        };
        self.matrices.local_transform = local_transform;
        self.matrices.skinning_transform =
            self.matrices.world_transform * Matrix4::from_translation(-self.origin);
    }

    /// Overwrites the world transform from a simulated skinning transform.
    pub fn update_matrices_by_skinning(&mut self, skinning_transform: Matrix4<f32>) {
        self.matrices.skinning_transform = skinning_transform;
        self.matrices.world_transform = skinning_transform * Matrix4::from_translation(self.origin);
    }

    pub fn constrain_orientation(
        orientation: Quaternion<f32>,
        upper_limit: &Vector3<f32>,
        lower_limit: &Vector3<f32>,
    ) -> Quaternion<f32> {
        let euler = Euler::from(orientation);
        let clamped = Euler::new(
            Rad(euler.x.0.clamp(lower_limit.x, upper_limit.x)),
            Rad(euler.y.0.clamp(lower_limit.y, upper_limit.y)),
            Rad(euler.z.0.clamp(lower_limit.z, upper_limit.z)),
        );
        Quaternion::from(clamped)
    }
}

/// Index addressed bone arena with the evaluation orders computed at load.
#[derive(Debug, Clone)]
pub struct BoneSet {
    bones: Vec<Bone>,
    bones_by_name: HashMap<String, BoneIndex>,
    /// Parents before children.
    transform_order: Vec<BoneIndex>,
    /// Inheritance sources before the bones inheriting from them.
    inherent_order: Vec<BoneIndex>,
    inherent_dependents: HashMap<BoneIndex, Vec<BoneIndex>>,
}

impl BoneSet {
    pub fn new(origin_bones: &[ModelBone]) -> Result<Self, Vpvl2Error> {
        let len = origin_bones.len();
        let mut bones = origin_bones
            .iter()
            .enumerate()
            .map(|(handle, bone)| Bone::from_raw(handle, bone, len))
            .collect::<Result<Vec<_>, _>>()?;
        let mut bones_by_name = HashMap::new();
        for bone in &bones {
            bones_by_name.entry(bone.name.clone()).or_insert(bone.handle);
            if !bone.name_en.is_empty() {
                bones_by_name
                    .entry(bone.name_en.clone())
                    .or_insert(bone.handle);
            }
        }
        let parents = bones.iter().map(|bone| bone.parent).collect::<Vec<_>>();
        for (handle, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                bones[*parent].children.push(handle);
            }
        }
        let transform_order = Self::topological_order(len, |handle| parents[handle])
            .map_err(|handle| {
                Vpvl2Error::configuration(format!(
                    "parent relation of bone \"{}\" forms a cycle",
                    bones[handle].name
                ))
            })?;
        let sources = bones
            .iter()
            .map(|bone| bone.inherent.map(|inherent| inherent.source))
            .collect::<Vec<_>>();
        let inherent_order = Self::topological_order(len, |handle| sources[handle])
            .map_err(|handle| {
                Vpvl2Error::configuration(format!(
                    "inheritance of bone \"{}\" forms a cycle",
                    bones[handle].name
                ))
            })?;
        let mut inherent_dependents: HashMap<BoneIndex, Vec<BoneIndex>> = HashMap::new();
        for (handle, source) in sources.iter().enumerate() {
            if let Some(source) = source {
                inherent_dependents.entry(*source).or_default().push(handle);
            }
        }
        Ok(Self {
            bones,
            bones_by_name,
            transform_order,
            inherent_order,
            inherent_dependents,
        })
    }

    /// Kahn's algorithm over single-predecessor edges. Returns a bone on a cycle on failure.
    fn topological_order<F>(len: usize, predecessor: F) -> Result<Vec<BoneIndex>, BoneIndex>
    where
        F: Fn(BoneIndex) -> Option<BoneIndex>,
    {
        let mut in_degree = vec![0usize; len];
        let mut successors = vec![vec![]; len];
        for handle in 0..len {
            if let Some(pred) = predecessor(handle) {
                in_degree[handle] += 1;
                successors[pred].push(handle);
            }
        }
        let mut queue = (0..len)
            .filter(|handle| in_degree[*handle] == 0)
            .collect::<VecDeque<_>>();
        let mut order = Vec::with_capacity(len);
        while let Some(handle) = queue.pop_front() {
            order.push(handle);
            for next in &successors[handle] {
                in_degree[*next] -= 1;
                if in_degree[*next] == 0 {
                    queue.push_back(*next);
                }
            }
        }
        if order.len() == len {
            Ok(order)
        } else {
            Err((0..len).find(|h| in_degree[*h] > 0).unwrap_or(0))
        }
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    pub fn get(&self, bone: BoneIndex) -> Option<&Bone> {
        self.bones.get(bone)
    }

    pub fn get_mut(&mut self, bone: BoneIndex) -> Option<&mut Bone> {
        self.bones.get_mut(bone)
    }

    pub fn find(&self, name: &str) -> Option<&Bone> {
        self.bones_by_name
            .get(name)
            .and_then(|idx| self.bones.get(*idx))
    }

    pub fn find_index(&self, name: &str) -> Option<BoneIndex> {
        self.bones_by_name.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bone> {
        self.bones.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Bone> {
        self.bones.iter_mut()
    }

    pub fn transform_order(&self) -> &[BoneIndex] {
        &self.transform_order
    }

    pub fn inherent_order(&self) -> &[BoneIndex] {
        &self.inherent_order
    }

    /// First bone without a parent, the one re-positioning moves.
    pub fn root(&self) -> Option<BoneIndex> {
        self.bones
            .iter()
            .find(|bone| bone.parent.is_none())
            .map(|bone| bone.handle)
    }

    /// Whether `ancestor` is `bone` or one of its parents.
    pub fn is_ancestor(&self, ancestor: BoneIndex, bone: BoneIndex) -> bool {
        let mut current = Some(bone);
        while let Some(handle) = current {
            if handle == ancestor {
                return true;
            }
            current = self.bones.get(handle).and_then(|bone| bone.parent);
        }
        false
    }

    pub fn reset_user_transform(&mut self) {
        for bone in &mut self.bones {
            bone.reset_user_transform();
            bone.constraint_orientation = None;
        }
    }

    pub fn reset_morph_transform(&mut self) {
        for bone in &mut self.bones {
            bone.reset_morph_transform();
        }
    }

    fn update_local(&mut self, handle: BoneIndex) {
        let source = self.bones[handle]
            .inherent
            .and_then(|inherent| self.bones.get(inherent.source))
            .map(|source| (source.inheritable_orientation(), source.inheritable_translation()));
        self.bones[handle].update_local(source);
    }

    fn update_matrices(&mut self, handle: BoneIndex, base_transform: &Matrix4<f32>) {
        let parent = self.bones[handle]
            .parent
            .and_then(|parent| self.bones.get(parent))
            .map(|parent| (parent.matrices.world_transform, parent.origin));
        self.bones[handle].update_matrices(parent, base_transform);
    }

    pub fn update_all_local(&mut self) {
        for idx in 0..self.inherent_order.len() {
            let handle = self.inherent_order[idx];
            self.update_local(handle);
        }
    }

    pub fn update_all_matrices(&mut self, base_transform: &Matrix4<f32>) {
        for idx in 0..self.transform_order.len() {
            let handle = self.transform_order[idx];
            self.update_matrices(handle, base_transform);
        }
    }

    /// Recomputes the local transform of `bone` and the world transforms of its subtree.
    pub fn update_subtree(&mut self, bone: BoneIndex, base_transform: &Matrix4<f32>) {
        self.update_local(bone);
        let mut stack = vec![bone];
        while let Some(handle) = stack.pop() {
            self.update_matrices(handle, base_transform);
            stack.extend(self.bones[handle].children.iter().rev().copied());
        }
    }

    /// Re-resolves bones inheriting (directly or not) from `moved`, then refreshes the world
    /// transforms of every affected subtree.
    pub fn update_dependents(&mut self, moved: &HashSet<BoneIndex>, base_transform: &Matrix4<f32>) {
        let mut dirty = moved.clone();
        for idx in 0..self.inherent_order.len() {
            let handle = self.inherent_order[idx];
            let source_moved = self.bones[handle]
                .inherent
                .map(|inherent| dirty.contains(&inherent.source))
                .unwrap_or(false);
            if source_moved {
                self.update_local(handle);
                dirty.insert(handle);
            }
        }
        let mut refreshed = HashSet::new();
        for idx in 0..self.transform_order.len() {
            let handle = self.transform_order[idx];
            let parent_refreshed = self.bones[handle]
                .parent
                .map(|parent| refreshed.contains(&parent))
                .unwrap_or(false);
            if dirty.contains(&handle) || parent_refreshed {
                self.update_matrices(handle, base_transform);
                refreshed.insert(handle);
            }
        }
    }

    /// Refreshes descendants of `bones` that are not in `skip`, keeping the bones themselves.
    pub fn update_descendants(
        &mut self,
        bones: &HashSet<BoneIndex>,
        skip: &HashSet<BoneIndex>,
        base_transform: &Matrix4<f32>,
    ) {
        let mut refreshed: HashSet<BoneIndex> = bones.clone();
        for idx in 0..self.transform_order.len() {
            let handle = self.transform_order[idx];
            if bones.contains(&handle) || skip.contains(&handle) {
                continue;
            }
            let parent_refreshed = self.bones[handle]
                .parent
                .map(|parent| refreshed.contains(&parent))
                .unwrap_or(false);
            if parent_refreshed {
                self.update_matrices(handle, base_transform);
                refreshed.insert(handle);
            }
        }
    }

    pub fn inherent_dependents_of(&self, bone: BoneIndex) -> &[BoneIndex] {
        self.inherent_dependents
            .get(&bone)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
