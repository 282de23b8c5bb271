//! Track health maintenance: short-track pruning and jump-cut splitting.
//!
//! Both passes run over the analysis window, the frames tracked since the
//! previous tick. They only touch tracks that are neither hidden nor locked.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::{Frame, TrackDirection, TrackId, TrackStore};

use super::motion::MotionEstimator;

/// Thresholds for the health passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Dormant tracks shorter than this many frames are deleted.
    pub min_track_length: Frame,
    /// A marker moving more than this factor times the mean motion is a jump cut.
    pub jump_cut_factor: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            min_track_length: 50,
            jump_cut_factor: 5.0,
        }
    }
}

impl HealthConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.min_track_length) {
            bail!("minimum track length {} outside [1, 1000]", self.min_track_length);
        }
        if !(0.0..=50.0).contains(&self.jump_cut_factor) {
            bail!("jump cut factor {} outside [0, 50]", self.jump_cut_factor);
        }
        Ok(())
    }
}

/// Frames `(last_frame, current_frame]`, walked in tracking direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisWindow {
    pub last_frame: Frame,
    pub current_frame: Frame,
    pub direction: TrackDirection,
}

impl AnalysisWindow {
    /// Window of `length` frames ending at `current_frame`.
    pub fn ending_at(current_frame: Frame, length: u32, direction: TrackDirection) -> Self {
        Self {
            last_frame: current_frame - direction.step() * length as Frame,
            current_frame,
            direction,
        }
    }

    /// Consecutive `(previous, frame)` pairs for every frame in the window.
    pub fn frame_pairs(&self) -> impl Iterator<Item = (Frame, Frame)> {
        let step = self.direction.step();
        let count = ((self.current_frame - self.last_frame) * step).max(0);
        let last_frame = self.last_frame;
        (1..=count).map(move |i| {
            let frame = last_frame + i * step;
            (frame - step, frame)
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Short Tracks
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks that went dormant before `last_frame` without reaching `min_length`.
///
/// A track with a marker on `last_frame` is still alive and never listed;
/// single-marker tracks are fresh detections and are left alone.
pub fn short_tracks(store: &TrackStore, last_frame: Frame, min_length: Frame) -> Vec<TrackId> {
    store
        .tracks()
        .filter(|t| t.is_editable() && t.num_markers() > 1)
        .filter(|t| t.marker_at(last_frame).is_none() && t.length() < min_length)
        .map(|t| t.id)
        .collect()
}

/// Delete short dormant tracks. Returns the number deleted.
pub fn prune_short_tracks(store: &mut TrackStore, last_frame: Frame, min_length: Frame) -> usize {
    let to_delete = short_tracks(store, last_frame, min_length);
    let deleted = store.delete_tracks(&to_delete);
    if deleted > 0 {
        info!("prune_short_tracks: {} tracks deleted", deleted);
    }
    deleted
}

// ─────────────────────────────────────────────────────────────────────────────
// Jump Cuts
// ─────────────────────────────────────────────────────────────────────────────

/// First and last frame at which a track exceeded the allowed motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpInterval {
    pub first: Frame,
    pub last: Frame,
}

impl JumpInterval {
    /// Frames around the split point that are too ambiguous to keep.
    pub fn skip(&self) -> Frame {
        (self.first - self.last).abs()
    }
}

/// Scan the window for markers that moved more than `jump_cut_factor`
/// times the mean motion of their frame pair.
pub fn detect_jumps(
    store: &TrackStore,
    window: &AnalysisWindow,
    jump_cut_factor: f64,
    estimator: &MotionEstimator,
) -> BTreeMap<TrackId, JumpInterval> {
    let mut jumps: BTreeMap<TrackId, JumpInterval> = BTreeMap::new();

    for (last, frame) in window.frame_pairs() {
        let mean = estimator.estimate_motion(store, last, frame);
        let allowed = mean * jump_cut_factor;

        for track in store.tracks().filter(|t| t.is_editable()) {
            let (Some(m0), Some(m1)) = (track.marker_at(frame), track.marker_at(last)) else {
                continue;
            };
            if (m0.co - m1.co).norm() > allowed {
                jumps
                    .entry(track.id)
                    .and_modify(|j| j.last = frame)
                    .or_insert(JumpInterval { first: frame, last: frame });
            }
        }
    }
    jumps
}

/// Split `id` at `split_frame`.
///
/// The original track keeps everything before the split, its marker on
/// `split_frame` is muted and the track is hidden; later markers are
/// removed. A new track receives the markers from `split_frame` up to
/// `boundary`, the sequence end in tracking direction, except those closer
/// than `skip` frames to the split. Returns the new track, or `None` when
/// nothing was left to continue with.
pub fn split_track(
    store: &mut TrackStore,
    id: TrackId,
    split_frame: Frame,
    skip: Frame,
    direction: TrackDirection,
    boundary: Frame,
) -> Option<TrackId> {
    let step = direction.step();
    let original = store.get_mut(id)?;

    let tail: Vec<(Frame, _)> = original
        .markers()
        .iter()
        .filter(|m| (m.frame - split_frame) * step >= 0)
        .map(|m| (m.frame, m.co))
        .collect();

    for &(frame, _) in &tail {
        if frame == split_frame {
            if let Some(marker) = original.marker_at_mut(frame) {
                marker.muted = true;
            }
        } else {
            original.remove_marker(frame);
        }
    }
    original.hidden = true;

    let kept: Vec<_> = tail
        .into_iter()
        .filter(|(frame, _)| (frame - split_frame).abs() >= skip)
        .filter(|(frame, _)| (boundary - frame) * step >= 0)
        .collect();
    if kept.is_empty() {
        return None;
    }

    let new_id = store.new_track();
    let continuation = store.get_mut(new_id)?;
    for (frame, co) in kept {
        continuation.insert_marker(frame, co);
    }
    Some(new_id)
}

/// Detect jump cuts over the window and split every offending track at the
/// first excess frame. Continuations end at `boundary`. Returns the number
/// of tracks cut.
pub fn detect_and_split_jumps(
    store: &mut TrackStore,
    window: &AnalysisWindow,
    jump_cut_factor: f64,
    estimator: &MotionEstimator,
    boundary: Frame,
) -> usize {
    let jumps = detect_jumps(store, window, jump_cut_factor, estimator);

    for (&id, interval) in &jumps {
        let continuation = split_track(
            store,
            id,
            interval.first,
            interval.skip(),
            window.direction,
            boundary,
        );
        debug!(
            "jump cut: {} split at frame {} skip {} -> {:?}",
            id,
            interval.first,
            interval.skip(),
            continuation
        );
    }

    if !jumps.is_empty() {
        info!("detect_and_split_jumps: {} tracks cut", jumps.len());
    }
    jumps.len()
}
