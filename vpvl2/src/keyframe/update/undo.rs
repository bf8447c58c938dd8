use std::collections::VecDeque;

use crate::{
    config::SceneConfig,
    error::Vpvl2Error,
    motion::{
        keyframe::{BoneKeyframe, MorphKeyframe},
        Motion,
    },
};

use super::{
    bone::BoneKeyframeUpdater,
    morph::MorphKeyframeUpdater,
    updater::{AddKeyframe, KeyframeUpdater, RemoveKeyframe},
};

#[derive(Debug, Clone, PartialEq)]
pub enum KeyframeCommand {
    AddBone(BoneKeyframeUpdater),
    RemoveBone(BoneKeyframeUpdater),
    AddMorph(MorphKeyframeUpdater),
    RemoveMorph(MorphKeyframeUpdater),
}

impl KeyframeCommand {
    pub fn add_bone(motion: &Motion, name: &str, keyframe: BoneKeyframe) -> Self {
        Self::AddBone(motion.build_updater_add(name, keyframe))
    }

    pub fn remove_bone(motion: &Motion, name: &str, frame_index: u32) -> Result<Self, Vpvl2Error> {
        <Motion as RemoveKeyframe<BoneKeyframe>>::build_updater_remove(motion, name, frame_index)
            .map(Self::RemoveBone)
            .ok_or_else(|| {
                Vpvl2Error::not_found("bone keyframe", &format!("{}@{}", name, frame_index))
            })
    }

    pub fn add_morph(motion: &Motion, name: &str, keyframe: MorphKeyframe) -> Self {
        Self::AddMorph(motion.build_updater_add(name, keyframe))
    }

    pub fn remove_morph(motion: &Motion, name: &str, frame_index: u32) -> Result<Self, Vpvl2Error> {
        <Motion as RemoveKeyframe<MorphKeyframe>>::build_updater_remove(motion, name, frame_index)
            .map(Self::RemoveMorph)
            .ok_or_else(|| {
                Vpvl2Error::not_found("morph keyframe", &format!("{}@{}", name, frame_index))
            })
    }

    fn updater(&mut self) -> &mut dyn KeyframeUpdater {
        match self {
            Self::AddBone(updater) | Self::RemoveBone(updater) => updater,
            Self::AddMorph(updater) | Self::RemoveMorph(updater) => updater,
        }
    }
}

/// Bounded history of keyframe edits. Pushing a new command clears the redo side.
#[derive(Debug, Clone)]
pub struct UndoStack {
    undo: VecDeque<KeyframeCommand>,
    redo: Vec<KeyframeCommand>,
    limit: usize,
}

impl UndoStack {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: vec![],
            limit: limit.max(1),
        }
    }

    pub fn from_config(config: &SceneConfig) -> Self {
        Self::new(config.undo_limit)
    }

    pub fn push_and_apply(&mut self, mut command: KeyframeCommand, motion: &mut Motion) {
        command.updater().apply(motion);
        self.redo.clear();
        self.undo.push_back(command);
        while self.undo.len() > self.limit {
            self.undo.pop_front();
        }
    }

    pub fn undo(&mut self, motion: &mut Motion) -> bool {
        match self.undo.pop_back() {
            Some(mut command) => {
                command.updater().revert(motion);
                self.redo.push(command);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self, motion: &mut Motion) -> bool {
        match self.redo.pop() {
            Some(mut command) => {
                command.updater().apply(motion);
                self.undo.push_back(command);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{One, Quaternion, Vector3};

    use super::*;
    use crate::config::BezierSolverConfig;

    fn bone(frame_index: u32, x: f32) -> BoneKeyframe {
        BoneKeyframe::new(frame_index, Vector3::new(x, 0f32, 0f32), Quaternion::one())
    }

    #[test]
    fn test_undo_redo_replaced_keyframe() {
        let mut motion = Motion::empty(BezierSolverConfig::default());
        motion.add_bone_keyframe("センター", bone(10, 1f32));
        motion.set_dirty(false);
        let mut stack = UndoStack::new(8);
        let command = KeyframeCommand::add_bone(&motion, "センター", bone(10, 5f32));
        if let KeyframeCommand::AddBone(updater) = &command {
            assert!(updater.updated());
        }
        stack.push_and_apply(command, &mut motion);
        assert_eq!(
            Some(5f32),
            motion.find_bone_keyframe("センター", 10).map(|k| k.translation.x)
        );
        assert!(motion.is_dirty());
        assert!(stack.undo(&mut motion));
        assert_eq!(
            Some(1f32),
            motion.find_bone_keyframe("センター", 10).map(|k| k.translation.x)
        );
        assert!(!motion.is_dirty());
        assert!(stack.redo(&mut motion));
        assert_eq!(
            Some(5f32),
            motion.find_bone_keyframe("センター", 10).map(|k| k.translation.x)
        );
        assert!(!stack.redo(&mut motion));
    }

    #[test]
    fn test_remove_and_limit() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let mut motion = Motion::empty(BezierSolverConfig::default());
        let mut stack = UndoStack::new(2);
        for frame_index in 0..3 {
            let command = KeyframeCommand::add_morph(
                &motion,
                "あ",
                MorphKeyframe {
                    frame_index,
                    weight: 1f32,
                },
            );
            stack.push_and_apply(command, &mut motion);
        }
        assert_eq!(2, stack.undo_len());
        let command = KeyframeCommand::remove_morph(&motion, "あ", 2)?;
        stack.push_and_apply(command, &mut motion);
        assert_eq!(1, motion.max_frame_index());
        assert!(KeyframeCommand::remove_morph(&motion, "あ", 2).is_err());
        assert!(stack.undo(&mut motion));
        assert_eq!(2, motion.max_frame_index());
        Ok(())
    }
}
