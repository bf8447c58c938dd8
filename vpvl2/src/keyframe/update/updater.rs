use crate::motion::Motion;

/// One reversible keyframe edit. `apply` performs the edit and `revert` restores the motion to
/// the state it had before.
pub trait KeyframeUpdater {
    /// The edit replaced a keyframe that already existed.
    fn updated(&self) -> bool;

    fn frame_index(&self) -> u32;

    fn apply(&mut self, motion: &mut Motion);

    fn revert(&mut self, motion: &mut Motion);
}

pub trait AddKeyframe<K> {
    type ObjectUpdater: KeyframeUpdater;

    fn build_updater_add(&self, name: &str, keyframe: K) -> Self::ObjectUpdater;
}

pub trait RemoveKeyframe<K> {
    type ObjectUpdater: KeyframeUpdater;

    /// `None` when there is no keyframe at `frame_index`.
    fn build_updater_remove(&self, name: &str, frame_index: u32) -> Option<Self::ObjectUpdater>;
}
