//! Post-tracking solve support.
//!
//! - Keyframe pair selection
//! - Reprojection-based weighting
//! - Solve pipeline operations driving the backend solver

pub mod keyframes;
pub mod pipeline;
pub mod weighting;

pub use keyframes::{pick_keyframes, LONGEST_TRACKS, SHRINK_THRESHOLD};
pub use pipeline::{auto_solve, refine_solution, reset_solution, set_keyframes, Outcome};
pub use weighting::{compute_weights, temporal_taper, RefineConfig, WeightingStats};
