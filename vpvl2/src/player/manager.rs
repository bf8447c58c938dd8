use std::sync::Arc;

use crate::{error::Vpvl2Error, motion::Motion};

use super::{
    options::{MotionConfiguration, MotionOptions},
    player::MotionPlayer,
    pose::{Pose, PoseLayout},
    slot::MotionSlot,
};

#[derive(Debug, Clone)]
pub struct FinishedMotion {
    pub slot: String,
    pub player: MotionPlayer,
    /// Faded out under a newer player of the same slot instead of ending on its own.
    pub superseded: bool,
}

/// Motion slots of one model, layered by ascending priority.
#[derive(Debug, Clone, Default)]
pub struct MotionManager {
    slots: Vec<MotionSlot>,
}

impl MotionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[MotionSlot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&MotionSlot> {
        self.slots.iter().find(|slot| slot.name() == name)
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut MotionSlot> {
        self.slots.iter_mut().find(|slot| slot.name() == name)
    }

    fn sort_slots(&mut self) {
        self.slots.sort_by_key(|slot| slot.options().priority);
    }

    pub fn add_motion(
        &mut self,
        slot_name: &str,
        motion: Arc<Motion>,
        options: MotionOptions,
        transition_frames: f32,
    ) {
        match self.slot_mut(slot_name) {
            Some(slot) if options.enable_smooth_transition && !slot.is_empty() => {
                slot.push(MotionPlayer::fading(motion, options, transition_frames));
            }
            Some(slot) => slot.replace(MotionPlayer::new(motion, options)),
            None => self
                .slots
                .push(MotionSlot::new(slot_name, MotionPlayer::new(motion, options))),
        }
        self.sort_slots();
    }

    /// Swaps the motion of an existing slot, always crossfading.
    pub fn change_motion(
        &mut self,
        slot_name: &str,
        motion: Arc<Motion>,
        transition_frames: f32,
    ) -> Result<(), Vpvl2Error> {
        let slot = self
            .slot_mut(slot_name)
            .ok_or_else(|| Vpvl2Error::not_found("motion slot", slot_name))?;
        let mut options = *slot.options();
        options.enable_smooth_transition = true;
        if slot.is_empty() {
            slot.push(MotionPlayer::new(motion, options));
        } else {
            slot.push(MotionPlayer::fading(motion, options, transition_frames));
        }
        Ok(())
    }

    pub fn delete_motion(&mut self, slot_name: &str) -> Result<MotionSlot, Vpvl2Error> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.name() == slot_name)
            .ok_or_else(|| Vpvl2Error::not_found("motion slot", slot_name))?;
        Ok(self.slots.remove(index))
    }

    pub fn configure_motion(
        &mut self,
        slot_name: &str,
        configuration: &MotionConfiguration,
    ) -> Result<(), Vpvl2Error> {
        self.slot_mut(slot_name)
            .ok_or_else(|| Vpvl2Error::not_found("motion slot", slot_name))?
            .configure(configuration);
        if configuration.priority.is_some() {
            self.sort_slots();
        }
        Ok(())
    }

    pub fn advance(&mut self, delta: f32) {
        for slot in &mut self.slots {
            slot.advance(delta);
        }
    }

    pub fn sample(&self, layout: &PoseLayout) -> Pose {
        let mut pose = Pose::new(layout.num_bones(), layout.num_morphs());
        for slot in &self.slots {
            if let Some(slot_pose) = slot.sample(layout) {
                let options = slot.options();
                pose.combine(&slot_pose, options.blend_mode, options.blend_weight);
            }
        }
        pose
    }

    /// Detaches finished players. Slots left without players are removed.
    pub fn collect_finished(&mut self) -> Vec<FinishedMotion> {
        let mut finished = vec![];
        for slot in &mut self.slots {
            let superseded = slot.take_superseded().into_iter().map(|player| (player, true));
            let ended = slot.take_finished().into_iter().map(|player| (player, false));
            let name = slot.name();
            finished.extend(superseded.chain(ended).map(|(player, superseded)| FinishedMotion {
                slot: name.to_owned(),
                player,
                superseded,
            }));
        }
        self.slots.retain(|slot| !slot.is_empty());
        finished
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{One, Quaternion, Vector3};

    use super::*;
    use crate::{
        config::BezierSolverConfig,
        error::ErrorKind,
        motion::keyframe::{BoneKeyframe, MorphKeyframe},
        player::BlendMode,
    };

    fn constant(bone: &str, x: f32) -> Arc<Motion> {
        let mut motion = Motion::empty(BezierSolverConfig::default());
        motion.add_bone_keyframe(
            bone,
            BoneKeyframe::new(0, Vector3::new(x, 0f32, 0f32), Quaternion::one()),
        );
        motion.add_bone_keyframe(
            bone,
            BoneKeyframe::new(100, Vector3::new(x, 0f32, 0f32), Quaternion::one()),
        );
        Arc::new(motion)
    }

    fn layout() -> PoseLayout {
        PoseLayout::new(["センター", "頭"], ["あ"])
    }

    fn center_x(manager: &MotionManager) -> Option<f32> {
        manager.sample(&layout()).bones[0].map(|f| f.translation.x)
    }

    fn ramp(bone: &str, frames: u32) -> Arc<Motion> {
        let mut motion = Motion::empty(BezierSolverConfig::default());
        motion.add_bone_keyframe(
            bone,
            BoneKeyframe::new(0, Vector3::new(0f32, 0f32, 0f32), Quaternion::one()),
        );
        motion.add_bone_keyframe(
            bone,
            BoneKeyframe::new(frames, Vector3::new(frames as f32, 0f32, 0f32), Quaternion::one()),
        );
        Arc::new(motion)
    }

    #[test]
    fn test_smooth_transition_converges() {
        let mut manager = MotionManager::new();
        let walk = ramp("センター", 100);
        manager.add_motion("base", constant("センター", 0f32), MotionOptions::default(), 20f32);
        manager.add_motion("base", walk.clone(), MotionOptions::default(), 20f32);
        assert_eq!(2, manager.slot("base").unwrap().players().len());
        assert_eq!(Some(0f32), center_x(&manager));
        manager.advance(10f32);
        // halfway: the new motion is at frame 10 with half the weight
        assert!((center_x(&manager).unwrap() - 5f32).abs() < 1e-4);
        manager.advance(10f32);
        let expected = walk.find_bone_transform("センター", 20f32).unwrap();
        assert!((center_x(&manager).unwrap() - expected.translation.x).abs() < 1e-4);
        assert_eq!(1, manager.slot("base").unwrap().players().len());
    }

    #[test]
    fn test_finished_player_stays_under_fade() {
        let mut manager = MotionManager::new();
        manager.add_motion(
            "base",
            constant("センター", 10f32),
            MotionOptions::default().once(true),
            20f32,
        );
        manager.advance(90f32);
        manager.change_motion("base", constant("センター", 0f32), 20f32).unwrap();
        manager.advance(15f32);
        assert!(manager.slot("base").unwrap().players()[0].is_finished());
        assert!(manager.collect_finished().is_empty());
        assert!((center_x(&manager).unwrap() - 2.5f32).abs() < 1e-4);
        manager.advance(5f32);
        let finished = manager.collect_finished();
        assert_eq!(1, finished.len());
        assert!(finished[0].superseded);
        assert_eq!(Some(0f32), center_x(&manager));
    }

    #[test]
    fn test_hard_cut_without_smooth() {
        let mut manager = MotionManager::new();
        manager.add_motion("base", constant("センター", 0f32), MotionOptions::default(), 20f32);
        manager.add_motion(
            "base",
            constant("センター", 10f32),
            MotionOptions::default().smooth(false),
            20f32,
        );
        assert_eq!(1, manager.slot("base").unwrap().players().len());
        assert_eq!(Some(10f32), center_x(&manager));
    }

    #[test]
    fn test_priority_layering() {
        let mut manager = MotionManager::new();
        manager.add_motion(
            "upper",
            constant("センター", 10f32),
            MotionOptions::part().priority(5),
            20f32,
        );
        manager.add_motion(
            "lower",
            constant("センター", 2f32),
            MotionOptions::part().priority(1),
            20f32,
        );
        assert_eq!("lower", manager.slots()[0].name());
        assert_eq!(Some(10f32), center_x(&manager));
        manager
            .configure_motion(
                "upper",
                &MotionConfiguration {
                    blend_weight: Some(0.5f32),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(Some(6f32), center_x(&manager));
        manager
            .configure_motion(
                "upper",
                &MotionConfiguration {
                    blend_mode: Some(BlendMode::Add),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(Some(7f32), center_x(&manager));
    }

    #[test]
    fn test_missing_slot_is_not_found() {
        let mut manager = MotionManager::new();
        let err = manager
            .change_motion("none", constant("センター", 0f32), 20f32)
            .unwrap_err();
        assert_eq!(ErrorKind::NotFound, err.kind());
        assert!(manager.delete_motion("none").is_err());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_part_motion_leaves_other_bones() {
        let mut motion = Motion::empty(BezierSolverConfig::default());
        motion.add_morph_keyframe(
            "あ",
            MorphKeyframe {
                frame_index: 0,
                weight: 1f32,
            },
        );
        let mut manager = MotionManager::new();
        manager.add_motion("face", Arc::new(motion.clone()), MotionOptions::part(), 20f32);
        let pose = manager.sample(&layout());
        assert_eq!(None, pose.bones[1]);
        assert_eq!(Some(1f32), pose.morphs[0]);
        manager.add_motion("body", Arc::new(motion), MotionOptions::default(), 20f32);
        assert!(manager.sample(&layout()).bones[1].is_some());
    }

    #[test]
    fn test_collect_finished_removes_empty_slots() {
        let mut manager = MotionManager::new();
        manager.add_motion(
            "once",
            constant("センター", 1f32),
            MotionOptions::default().once(true),
            20f32,
        );
        manager.advance(50f32);
        assert!(manager.collect_finished().is_empty());
        manager.advance(60f32);
        let finished = manager.collect_finished();
        assert_eq!(1, finished.len());
        assert_eq!("once", finished[0].slot);
        assert!(!finished[0].superseded);
        assert!(manager.is_empty());
    }
}
