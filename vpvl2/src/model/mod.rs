pub type BoneIndex = usize;
pub type MorphIndex = usize;
pub type ConstraintIndex = usize;
pub type RigidBodyIndex = usize;
pub type JointIndex = usize;

pub mod bone;
pub mod constraint;
pub mod joint;
pub mod model;
pub mod morph;
pub mod rigid_body;

pub use bone::{Bone, BoneSet};
pub use constraint::{Constraint, ConstraintSet};
pub use model::Model;
pub use morph::{Morph, MorphSet};
pub use rigid_body::{RigidBody, RigidBodySet};
