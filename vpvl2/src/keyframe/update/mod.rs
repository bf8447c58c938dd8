mod bone;
mod morph;
mod undo;
mod updater;

pub use bone::BoneKeyframeUpdater;
pub use morph::MorphKeyframeUpdater;
pub use undo::{KeyframeCommand, UndoStack};
pub use updater::{AddKeyframe, KeyframeUpdater, RemoveKeyframe};
