//! Track maintenance passes run by the session between tracking steps.
//!
//! - Feature acquisition with overlap filtering
//! - Mean motion estimation
//! - Short-track pruning and jump-cut splitting

pub mod dedup;
pub mod health;
pub mod motion;

pub use dedup::{acquire_and_filter, overlapping_new_tracks, AcquisitionReport, DetectionConfig};
pub use health::{
    detect_and_split_jumps, detect_jumps, prune_short_tracks, short_tracks, split_track, AnalysisWindow,
    HealthConfig, JumpInterval,
};
pub use motion::{MotionEstimator, FALLBACK_MEAN_MOTION};
