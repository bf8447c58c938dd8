pub mod common;
pub mod loader;
pub mod model;
pub mod motion;
