//! Feature acquisition with overlap filtering.
//!
//! The detector knows nothing about existing tracks, so every acquisition
//! re-detects features that are already being tracked. New features landing
//! within `delete_threshold` of a live marker on the current frame are
//! dropped again in one batch delete.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::{DetectParams, Placement, VisionBackend};
use crate::store::{Clip, Frame, TrackId, TrackStore};

/// Detector settings. Distances are percentages of the clip width so that
/// presets do not depend on clip resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum feature strength in `[0, 1]`.
    pub threshold: f64,
    /// Margin from the image edges, percent of clip width.
    pub margin_pct: f64,
    /// Minimum distance between detected features, percent of clip width.
    pub distance_pct: f64,
    /// How close a new feature may come to an existing marker, percent.
    pub delete_threshold_pct: f64,
    pub placement: Placement,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            margin_pct: 5.0,
            distance_pct: 8.0,
            delete_threshold_pct: 8.0,
            placement: Placement::WholeFrame,
        }
    }
}

impl DetectionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            bail!("detection threshold {} outside [0, 1]", self.threshold);
        }
        if !(0.0..=100.0).contains(&self.margin_pct) {
            bail!("detection margin {}% outside [0, 100]", self.margin_pct);
        }
        if !(1.0..=100.0).contains(&self.distance_pct) {
            bail!("detection distance {}% outside [1, 100]", self.distance_pct);
        }
        if !(1.0..=100.0).contains(&self.delete_threshold_pct) {
            bail!("new marker threshold {}% outside [1, 100]", self.delete_threshold_pct);
        }
        Ok(())
    }

    /// Detector parameters for a clip `width` pixels wide.
    pub fn detect_params(&self, width: u32) -> DetectParams {
        let width = width as f64;
        DetectParams {
            threshold: self.threshold,
            min_distance_px: self.distance_pct / 100.0 * width,
            margin_px: self.margin_pct / 100.0 * width,
            placement: self.placement,
        }
    }

    /// Overlap threshold in normalized marker units.
    pub fn delete_threshold(&self) -> f64 {
        self.delete_threshold_pct / 100.0
    }
}

/// Counts reported by one acquisition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub detected: usize,
    pub deleted: usize,
}

impl AcquisitionReport {
    pub fn added(&self) -> usize {
        self.detected - self.deleted
    }
}

/// New tracks (selected, with a marker on `frame`) that duplicate an
/// existing live marker on `frame`.
///
/// A new track is marked as soon as any existing marker lies within
/// `threshold`; the closest match is not searched for.
pub fn overlapping_new_tracks(store: &TrackStore, frame: Frame, threshold: f64) -> Vec<TrackId> {
    let mut fresh = Vec::new();
    let mut existing = Vec::new();

    for track in store.tracks().filter(|t| t.is_editable()) {
        let Some(marker) = track.marker_at(frame) else {
            continue;
        };
        if track.selected {
            fresh.push((track.id, marker.co));
        } else if !marker.muted {
            existing.push(marker.co);
        }
    }

    fresh
        .into_iter()
        .filter(|(_, co)| existing.iter().any(|old| (old - co).norm() <= threshold))
        .map(|(id, _)| id)
        .collect()
}

/// Detect features on `frame` and delete the ones that overlap live tracks.
pub fn acquire_and_filter<B: VisionBackend + ?Sized>(
    clip: &mut Clip,
    backend: &mut B,
    frame: Frame,
    config: &DetectionConfig,
) -> Result<AcquisitionReport> {
    clip.tracking.deselect_all();
    backend.detect_features(clip, frame, &config.detect_params(clip.width))?;

    let detected = clip
        .tracking
        .tracks()
        .filter(|t| t.selected && t.is_editable() && t.marker_at(frame).is_some())
        .count();

    let to_delete = overlapping_new_tracks(&clip.tracking, frame, config.delete_threshold());
    let deleted = clip.tracking.delete_tracks(&to_delete);

    let report = AcquisitionReport { detected, deleted };
    info!(
        "acquire_and_filter: frame {} detected={} added={}",
        frame,
        report.detected,
        report.added()
    );
    Ok(report)
}
