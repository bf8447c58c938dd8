mod manager;
mod options;
mod player;
mod pose;
mod slot;

pub use manager::{FinishedMotion, MotionManager};
pub use options::{BlendMode, MotionConfiguration, MotionOptions};
pub use player::{MotionPlayer, PlayerState};
pub use pose::{Pose, PoseLayout};
pub use slot::MotionSlot;
