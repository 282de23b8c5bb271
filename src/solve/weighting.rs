//! Reprojection-based track weighting for solve refinement.
//!
//! Each marker on a reconstructed frame is weighted by how well the track's
//! bundle reprojects onto it, relative to a target error. Weights fade in
//! and out over `smooth_frames` at the ends of a track's active span.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::ClipProjection;
use crate::store::{Frame, TrackStore};

/// Refinement parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    /// Reprojection error, in pixels, that still earns full weight.
    pub target_error: f64,
    /// Taper length at both ends of a track, in frames.
    pub smooth_frames: f64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            target_error: 0.3,
            smooth_frames: 25.0,
        }
    }
}

impl RefineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.target_error < 0.01 {
            bail!("target error {} below 0.01", self.target_error);
        }
        if self.smooth_frames < 1.0 {
            bail!("smooth frames {} below 1", self.smooth_frames);
        }
        Ok(())
    }
}

/// Temporal taper of a marker at `frame` on a track spanning `[start, end]`.
///
/// 1 well inside the span, falling linearly to 0 at the span ends.
pub fn temporal_taper(frame: Frame, start: Frame, end: Frame, smooth: f64) -> f64 {
    let (f, start, end) = (frame as f64, start as f64, end as f64);
    if f > start + smooth && f < end - smooth {
        return 1.0;
    }

    let dt = (0.5 * (end - start)).min(smooth);
    if dt > 0.0 {
        let t0 = ((f - start) / dt).min(1.0);
        let t1 = ((end - f) / dt).min(1.0);
        t0.min(t1).max(0.0)
    } else {
        0.0
    }
}

/// Weight of one marker given its reprojection distance in pixels.
fn marker_weight(distance: f64, taper: f64, target_error: f64) -> f64 {
    if distance == 0.0 {
        1.0
    } else {
        (taper * target_error / distance).min(1.0)
    }
}

/// Counts from one weighting pass.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct WeightingStats {
    /// Reconstructed frames visited.
    pub frames: usize,
    /// Markers that received a weight.
    pub weighted: usize,
    /// Markers forced to zero by a degenerate reprojection.
    pub degenerate: usize,
}

/// Recompute weights of every reconstructed track on every reconstructed
/// camera frame. Locked and hidden tracks are weighted too: a weight is
/// solver input, not an edit of the track. Weights are recorded per frame;
/// earlier frames keep their values.
pub fn compute_weights(
    store: &mut TrackStore,
    projection: &ClipProjection,
    target_error: f64,
    smooth_frames: f64,
) -> WeightingStats {
    let cameras = store.reconstruction.cameras().to_vec();
    let mut stats = WeightingStats::default();

    for camera in &cameras {
        stats.frames += 1;

        for track in store.tracks_mut() {
            let Some(bundle) = track.bundle else {
                continue;
            };
            let (Some(marker), Some((start, end))) = (track.marker_at(camera.frame), track.span()) else {
                continue;
            };

            let weight = match projection.reproject(&bundle, &camera.matrix) {
                Some(reprojected) => {
                    let observed = projection.marker_to_pixels(&marker.co, &track.offset);
                    let taper = temporal_taper(camera.frame, start, end, smooth_frames);
                    marker_weight((observed - reprojected).norm(), taper, target_error)
                }
                None => {
                    stats.degenerate += 1;
                    0.0
                }
            };
            track.set_weight_at(camera.frame, weight);
            stats.weighted += 1;
        }
    }

    debug!(
        "compute_weights: {} frames, {} markers, {} degenerate",
        stats.frames, stats.weighted, stats.degenerate
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CameraIntrinsics, CameraPose, Reconstruction, TrackId};
    use nalgebra::{Matrix4, Vector2, Vector3};

    fn projection() -> ClipProjection {
        ClipProjection::new(1920, 1080, CameraIntrinsics::centered(1000.0, 1920, 1080))
    }

    fn store_with_cameras(frames: &[Frame]) -> TrackStore {
        let mut store = TrackStore::new();
        let cameras = frames
            .iter()
            .map(|&f| CameraPose::new(f, Matrix4::identity()))
            .collect();
        store.reconstruction = Reconstruction::new(cameras, 0.0);
        store
    }

    /// Track at `co` over `frames` with `bundle`.
    fn add_track(
        store: &mut TrackStore,
        frames: std::ops::RangeInclusive<Frame>,
        co: Vector2<f64>,
        bundle: Option<Vector3<f64>>,
    ) -> TrackId {
        let id = store.new_track();
        let track = store.get_mut(id).unwrap();
        for f in frames {
            track.insert_marker(f, co);
        }
        track.bundle = bundle;
        id
    }

    #[test]
    fn test_taper_is_one_at_midpoint() {
        assert_eq!(temporal_taper(50, 0, 100, 25.0), 1.0);
    }

    #[test]
    fn test_taper_fades_at_ends() {
        assert_eq!(temporal_taper(0, 0, 100, 25.0), 0.0);
        assert!((temporal_taper(10, 0, 100, 25.0) - 0.4).abs() < 1e-12);
        assert!((temporal_taper(95, 0, 100, 25.0) - 0.2).abs() < 1e-12);
        // Short track: the taper length is half the span.
        assert!((temporal_taper(2, 0, 10, 25.0) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_taper_on_zero_length_span() {
        assert_eq!(temporal_taper(5, 5, 5, 25.0), 0.0);
    }

    #[test]
    fn test_exact_reprojection_has_full_weight_regardless_of_taper() {
        let mut store = store_with_cameras(&[5]);
        // Span starts at the camera frame, so the taper is zero.
        let id = add_track(&mut store, 5..=15, Vector2::new(0.5, 0.5), Some(Vector3::new(0.0, 0.0, -10.0)));

        compute_weights(&mut store, &projection(), 0.3, 25.0);
        assert_eq!(store.get(id).unwrap().weight_at(5), Some(1.0));
    }

    #[test]
    fn test_weight_scales_with_reprojection_error() {
        let mut store = store_with_cameras(&[5]);
        let co = Vector2::new(963.0 / 1920.0, 0.5);
        let id = add_track(&mut store, 0..=10, co, Some(Vector3::new(0.0, 0.0, -10.0)));

        compute_weights(&mut store, &projection(), 0.3, 25.0);
        let weight = store.get(id).unwrap().weight_at(5).unwrap();
        assert!((weight - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_tapered_end_with_error_has_zero_weight() {
        let mut store = store_with_cameras(&[5]);
        let co = Vector2::new(963.0 / 1920.0, 0.5);
        let id = add_track(&mut store, 5..=15, co, Some(Vector3::new(0.0, 0.0, -10.0)));

        compute_weights(&mut store, &projection(), 0.3, 25.0);
        assert_eq!(store.get(id).unwrap().weight_at(5), Some(0.0));
    }

    #[test]
    fn test_zero_depth_yields_zero_weight() {
        let mut store = store_with_cameras(&[5]);
        let id = add_track(&mut store, 0..=10, Vector2::new(0.5, 0.5), Some(Vector3::new(1.0, 1.0, 0.0)));

        let stats = compute_weights(&mut store, &projection(), 0.3, 25.0);
        assert_eq!(store.get(id).unwrap().weight_at(5), Some(0.0));
        assert_eq!(stats.degenerate, 1);
    }

    #[test]
    fn test_history_kept_per_frame_and_unsolved_tracks_skipped() {
        let mut store = store_with_cameras(&[4, 5, 20]);
        let solved = add_track(&mut store, 0..=10, Vector2::new(0.5, 0.5), Some(Vector3::new(0.0, 0.0, -10.0)));
        let unsolved = add_track(&mut store, 0..=10, Vector2::new(0.5, 0.5), None);

        let stats = compute_weights(&mut store, &projection(), 0.3, 25.0);

        assert_eq!(stats, WeightingStats { frames: 3, weighted: 2, degenerate: 0 });
        let history = store.get(solved).unwrap().weight_history();
        assert_eq!(history.keys().copied().collect::<Vec<_>>(), vec![4, 5]);
        assert!(store.get(unsolved).unwrap().weight_history().is_empty());
    }

    #[test]
    fn test_locked_and_hidden_tracks_are_weighted() {
        let mut store = store_with_cameras(&[5]);
        let bundle = Some(Vector3::new(0.0, 0.0, -10.0));
        let locked = add_track(&mut store, 0..=10, Vector2::new(0.5, 0.5), bundle);
        let hidden = add_track(&mut store, 0..=10, Vector2::new(963.0 / 1920.0, 0.5), bundle);
        store.get_mut(locked).unwrap().locked = true;
        store.get_mut(hidden).unwrap().hidden = true;

        let stats = compute_weights(&mut store, &projection(), 0.3, 25.0);

        assert_eq!(stats.weighted, 2);
        assert_eq!(store.get(locked).unwrap().weight_at(5), Some(1.0));
        let weight = store.get(hidden).unwrap().weight_at(5).unwrap();
        assert!((weight - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_config_validation() {
        assert!(RefineConfig::default().validate().is_ok());
        let bad = RefineConfig {
            target_error: 0.001,
            ..RefineConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
