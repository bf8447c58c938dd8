use std::{collections::HashSet, sync::Arc};

use cgmath::{Matrix4, SquareMatrix};
use vpvl2_loader::model::Model as RawModel;

use crate::{
    error::Vpvl2Error,
    motion::Motion,
    physics_engine::PhysicsEngine,
    player::{MotionManager, MotionOptions, Pose, PoseLayout},
};

use super::{
    bone::{Bone, BoneSet},
    constraint::ConstraintSet,
    joint::JointSet,
    morph::MorphSet,
    rigid_body::RigidBodySet,
};

/// A loaded model: its bone graph, IK chains, morphs and physics bodies, plus the motions
/// playing on it.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    name_en: String,
    comment: String,
    bones: BoneSet,
    constraints: ConstraintSet,
    morphs: MorphSet,
    rigid_bodies: RigidBodySet,
    joints: JointSet,
    layout: PoseLayout,
    motion_manager: MotionManager,
    base_transform: Matrix4<f32>,
    visible: bool,
    physics_enabled: bool,
}

impl Model {
    pub fn new(raw: &RawModel) -> Result<Self, Vpvl2Error> {
        let mut bones = BoneSet::new(&raw.bones)?;
        let constraints = ConstraintSet::new(&raw.all_constraints(), &bones)?;
        let morphs = MorphSet::new(&raw.morphs, &bones)?;
        let rigid_bodies = RigidBodySet::new(&raw.rigid_bodies, &bones)?;
        let joints = JointSet::new(&raw.joints, &rigid_bodies)?;
        let layout = PoseLayout::new(
            bones.iter().map(|bone| bone.name.as_str()),
            morphs.iter().map(|morph| morph.name.as_str()),
        );
        let base_transform = Matrix4::identity();
        bones.update_all_local();
        bones.update_all_matrices(&base_transform);
        let mut name = raw.name_ja.clone();
        if name.is_empty() {
            name = raw.name_en.clone();
        }
        Ok(Self {
            name,
            name_en: raw.name_en.clone(),
            comment: raw.comment.clone(),
            bones,
            constraints,
            morphs,
            rigid_bodies,
            joints,
            layout,
            motion_manager: MotionManager::new(),
            base_transform,
            visible: true,
            physics_enabled: true,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn name_en(&self) -> &str {
        &self.name_en
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn bones(&self) -> &BoneSet {
        &self.bones
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn morphs(&self) -> &MorphSet {
        &self.morphs
    }

    pub fn rigid_bodies(&self) -> &RigidBodySet {
        &self.rigid_bodies
    }

    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    pub fn layout(&self) -> &PoseLayout {
        &self.layout
    }

    pub fn motion_manager(&self) -> &MotionManager {
        &self.motion_manager
    }

    pub fn motion_manager_mut(&mut self) -> &mut MotionManager {
        &mut self.motion_manager
    }

    pub fn base_transform(&self) -> &Matrix4<f32> {
        &self.base_transform
    }

    pub fn set_base_transform(&mut self, value: Matrix4<f32>) {
        self.base_transform = value;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, value: bool) {
        self.visible = value;
    }

    pub fn is_physics_enabled(&self) -> bool {
        self.physics_enabled
    }

    pub fn set_physics_enabled(&mut self, value: bool) {
        self.physics_enabled = value;
    }

    pub fn contains_bone(&self, name: &str) -> bool {
        self.bones.find(name).is_some()
    }

    pub fn contains_morph(&self, name: &str) -> bool {
        self.morphs.contains(name)
    }

    pub fn find_bone(&self, name: &str) -> Option<&Bone> {
        self.bones.find(name)
    }

    /// Names of bone and morph tracks in `motion` this model has no counterpart for.
    pub fn missing_motion_targets(&self, motion: &Motion) -> (Vec<String>, Vec<String>) {
        motion.test_all_missing_model_objects(self)
    }

    pub fn add_motion(
        &mut self,
        slot: &str,
        motion: Arc<Motion>,
        options: MotionOptions,
        transition_frames: f32,
    ) {
        self.motion_manager
            .add_motion(slot, motion, options, transition_frames);
    }

    pub fn sample_pose(&self) -> Pose {
        self.motion_manager.sample(&self.layout)
    }

    /// Applies a blended pose and resolves morphs, inheritance, world transforms and IK.
    pub fn update_pose(&mut self, pose: &Pose, ik_epsilon: f32) {
        self.bones.reset_user_transform();
        self.bones.reset_morph_transform();
        for (handle, transform) in pose.bones.iter().enumerate() {
            if let (Some(transform), Some(bone)) = (transform, self.bones.get_mut(handle)) {
                bone.set_user_transform(transform);
            }
        }
        self.morphs.reset();
        for (handle, weight) in pose.morphs.iter().enumerate() {
            if let Some(weight) = weight {
                self.morphs.set_weight(handle, *weight);
            }
        }
        self.morphs.resolve();
        self.morphs.apply_bone_morphs(&mut self.bones);
        self.constraints.set_all_enabled(true);
        if let Some(frame) = &pose.model {
            self.visible = frame.visible;
            self.physics_enabled = frame.enable_physics;
            for (name, enabled) in &frame.constraint_states {
                if let Some(constraint) = self
                    .constraints
                    .find_by_target_name_mut(&self.bones, name)
                {
                    constraint.enabled = *enabled;
                }
            }
        }
        self.bones.update_all_local();
        self.bones.update_all_matrices(&self.base_transform);
        let moved: HashSet<_> =
            self.constraints
                .solve_all(&mut self.bones, &self.base_transform, ik_epsilon);
        if !moved.is_empty() {
            self.bones.update_dependents(&moved, &self.base_transform);
        }
    }

    pub fn attach_physics(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        self.rigid_bodies.attach_all(physics_engine);
        self.joints.attach_all(&self.rigid_bodies, physics_engine);
    }

    pub fn detach_physics(&mut self, physics_engine: &mut dyn PhysicsEngine) {
        self.joints.detach_all(physics_engine);
        self.rigid_bodies.detach_all(physics_engine);
    }

    pub fn synchronize_to_simulation(&self, physics_engine: &mut dyn PhysicsEngine) {
        self.rigid_bodies
            .synchronize_to_simulation(&self.bones, self.physics_enabled, physics_engine);
    }

    pub fn synchronize_from_simulation(&mut self, physics_engine: &dyn PhysicsEngine) {
        if self.physics_enabled {
            self.rigid_bodies.synchronize_from_simulation(
                &mut self.bones,
                &self.base_transform,
                physics_engine,
            );
        }
    }

    pub fn reset_physics(&self, physics_engine: &mut dyn PhysicsEngine) {
        self.rigid_bodies.reset(&self.bones, physics_engine);
    }

    /// The bone re-positioning moves: the root parent or center bone by name, else the first
    /// root of the hierarchy.
    pub fn re_position_bone(&self) -> Option<&Bone> {
        self.bones
            .find(Bone::NAME_ROOT_PARENT_IN_JAPANESE)
            .or_else(|| self.bones.find(Bone::NAME_CENTER_IN_JAPANESE))
            .or_else(|| self.bones.root().and_then(|handle| self.bones.get(handle)))
    }

    /// Moves the base transform by the displacement `motion` gives the re-position bone on its
    /// final frame, so a following motion continues from there.
    pub fn commit_re_position(&mut self, motion: &Motion) -> bool {
        let Some(name) = self.re_position_bone().map(|bone| bone.name.clone()) else {
            return false;
        };
        match motion.find_bone_transform(&name, motion.max_frame_index() as f32) {
            Some(transform) => {
                self.base_transform =
                    self.base_transform * Matrix4::from_translation(transform.translation);
                true
            }
            None => false,
        }
    }

    pub fn world_transforms(&self) -> impl Iterator<Item = &Matrix4<f32>> {
        self.bones.iter().map(|bone| &bone.matrices.world_transform)
    }

    pub fn skinning_transforms(&self) -> impl Iterator<Item = &Matrix4<f32>> {
        self.bones
            .iter()
            .map(|bone| &bone.matrices.skinning_transform)
    }
}
