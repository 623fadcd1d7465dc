pub mod actions;
pub mod camera;
pub mod classifier;
pub mod command;
pub mod config;
pub mod controller;
pub mod dataset;
pub mod detector;
pub mod gesture_map;
pub mod landmarks;
pub mod recorder;
pub mod reload;
pub mod sidecar;
pub mod status;
pub mod swipe;
pub mod types;
