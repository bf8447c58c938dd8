use crate::motion::{keyframe::MorphKeyframe, Motion};

use super::updater::{AddKeyframe, KeyframeUpdater, RemoveKeyframe};

#[derive(Debug, Clone, PartialEq)]
pub struct MorphKeyframeUpdater {
    pub name: String,
    pub frame_index: u32,
    pub added: Option<MorphKeyframe>,
    pub removed: Option<MorphKeyframe>,
    pub was_dirty: bool,
}

impl KeyframeUpdater for MorphKeyframeUpdater {
    fn updated(&self) -> bool {
        self.added.is_some() && self.removed.is_some()
    }

    fn frame_index(&self) -> u32 {
        self.frame_index
    }

    fn apply(&mut self, motion: &mut Motion) {
        self.was_dirty = motion.is_dirty();
        if let Some(keyframe) = &self.added {
            let _ = motion.add_morph_keyframe(&self.name, keyframe.clone());
        } else {
            let _ = motion.remove_morph_keyframe(&self.name, self.frame_index);
        }
    }

    fn revert(&mut self, motion: &mut Motion) {
        if let Some(keyframe) = &self.removed {
            let _ = motion.add_morph_keyframe(&self.name, keyframe.clone());
        } else {
            let _ = motion.remove_morph_keyframe(&self.name, self.frame_index);
        }
        motion.set_dirty(self.was_dirty);
    }
}

impl AddKeyframe<MorphKeyframe> for Motion {
    type ObjectUpdater = MorphKeyframeUpdater;

    fn build_updater_add(&self, name: &str, keyframe: MorphKeyframe) -> MorphKeyframeUpdater {
        MorphKeyframeUpdater {
            name: name.to_owned(),
            frame_index: keyframe.frame_index,
            removed: self.find_morph_keyframe(name, keyframe.frame_index).cloned(),
            added: Some(keyframe),
            was_dirty: false,
        }
    }
}

impl RemoveKeyframe<MorphKeyframe> for Motion {
    type ObjectUpdater = MorphKeyframeUpdater;

    fn build_updater_remove(&self, name: &str, frame_index: u32) -> Option<MorphKeyframeUpdater> {
        self.find_morph_keyframe(name, frame_index)
            .map(|keyframe| MorphKeyframeUpdater {
                name: name.to_owned(),
                frame_index,
                added: None,
                removed: Some(keyframe.clone()),
                was_dirty: false,
            })
    }
}
