//! Mean inter-frame marker motion, used to normalize jump-cut thresholds.

use crate::store::{Frame, TrackStore};

/// Mean motion reported when no track moved between the two frames.
/// Same units as marker coordinates; large enough that nothing is cut.
pub const FALLBACK_MEAN_MOTION: f64 = 10.0;

/// Estimates the mean marker displacement between two frames.
///
/// Only editable tracks with unmuted markers on both frames contribute.
/// Tracks that did not move at all are treated as pinned and skipped, so a
/// handful of static markers cannot drag the mean towards zero.
#[derive(Debug, Clone, Copy)]
pub struct MotionEstimator {
    fallback: f64,
}

impl MotionEstimator {
    pub fn new() -> Self {
        Self {
            fallback: FALLBACK_MEAN_MOTION,
        }
    }

    pub fn with_fallback(fallback: f64) -> Self {
        Self { fallback }
    }

    /// Mean displacement between `frame_a` and `frame_b`.
    pub fn estimate_motion(&self, store: &TrackStore, frame_a: Frame, frame_b: Frame) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;

        for track in store.tracks().filter(|t| t.is_editable()) {
            let (Some(a), Some(b)) = (track.active_marker_at(frame_a), track.active_marker_at(frame_b))
            else {
                continue;
            };
            let d = (b.co - a.co).norm();
            if d > 0.0 {
                total += d;
                count += 1;
            }
        }

        if count > 0 {
            total / count as f64
        } else {
            self.fallback
        }
    }
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new()
    }
}
