#![allow(unknown_lints)]

pub mod bezier_curve;
pub mod camera;
pub mod clock;
pub mod command;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod event_publisher;
pub mod keyframe;
pub mod light;
pub mod model;
pub mod motion;
pub mod physics_engine;
pub mod player;
pub mod render_snapshot;
pub mod scene_controller;
mod utils;

pub use vpvl2_loader as loader;

pub use config::SceneConfig;
pub use error::{ErrorKind, Vpvl2Error};
pub use scene_controller::{ModelHandle, SceneController};
