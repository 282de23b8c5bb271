//! Input loaders for the demo binary.

pub mod scene_csv;

pub use scene_csv::{load_scene, read_features};
