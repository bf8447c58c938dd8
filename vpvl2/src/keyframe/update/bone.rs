use crate::motion::{keyframe::BoneKeyframe, Motion};

use super::updater::{AddKeyframe, KeyframeUpdater, RemoveKeyframe};

#[derive(Debug, Clone, PartialEq)]
pub struct BoneKeyframeUpdater {
    pub name: String,
    pub frame_index: u32,
    /// Keyframe placed by the edit, `None` for a removal.
    pub added: Option<BoneKeyframe>,
    /// Keyframe occupying the frame before the edit.
    pub removed: Option<BoneKeyframe>,
    pub was_dirty: bool,
}

impl KeyframeUpdater for BoneKeyframeUpdater {
    fn updated(&self) -> bool {
        self.added.is_some() && self.removed.is_some()
    }

    fn frame_index(&self) -> u32 {
        self.frame_index
    }

    fn apply(&mut self, motion: &mut Motion) {
        self.was_dirty = motion.is_dirty();
        match &self.added {
            Some(keyframe) => {
                let old = motion.add_bone_keyframe(&self.name, keyframe.clone());
                if old.is_none() && self.updated() {
                    log::warn!(
                        "No existing keyframe at {} when updating bone {}",
                        self.frame_index,
                        self.name
                    );
                }
            }
            None => {
                let _ = motion.remove_bone_keyframe(&self.name, self.frame_index);
            }
        }
    }

    fn revert(&mut self, motion: &mut Motion) {
        match &self.removed {
            Some(keyframe) => {
                let _ = motion.add_bone_keyframe(&self.name, keyframe.clone());
            }
            None => {
                let _ = motion.remove_bone_keyframe(&self.name, self.frame_index);
            }
        }
        motion.set_dirty(self.was_dirty);
    }
}

impl AddKeyframe<BoneKeyframe> for Motion {    type ObjectUpdater = BoneKeyframeUpdater;

    fn build_updater_add(&self, name: &str, keyframe: BoneKeyframe) -> BoneKeyframeUpdater {
        BoneKeyframeUpdater {
            name: name.to_owned(),
            frame_index: keyframe.frame_index,
            removed: self.find_bone_keyframe(name, keyframe.frame_index).cloned(),
            added: Some(keyframe),
            was_dirty: false,
        }
    }
}

impl RemoveKeyframe<BoneKeyframe> for Motion {
    type ObjectUpdater = BoneKeyframeUpdater;

    fn build_updater_remove(&self, name: &str, frame_index: u32) -> Option<BoneKeyframeUpdater> {
        let keyframe = self.find_bone_keyframe(name, frame_index)?;
        Some(BoneKeyframeUpdater {
            name: name.to_owned(),
            frame_index,
            added: None,
            removed: Some(keyframe.clone()),
            was_dirty: false,
        })
    }
}
