pub mod interpolation;
pub mod keyframe;
mod motion;
pub mod seek;
pub mod track;

pub use motion::Motion;
