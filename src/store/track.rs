//! Track - a persistent feature identity made of per-frame markers.
//!
//! A Track owns its markers, kept sorted by frame. Frames need not be
//! contiguous: a gap means the feature was not tracked on that frame.
//! Besides its markers a track carries the flags the host exposes
//! (selection, hidden, locked), the solver outputs (bundle) and the
//! per-frame weight history written by the weighting passes.

use std::collections::BTreeMap;

use nalgebra::{Vector2, Vector3};

use super::types::{Frame, TrackId};

/// One frame's observation of a track, in normalized clip space.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub frame: Frame,
    pub co: Vector2<f64>,
    pub muted: bool,
}

impl Marker {
    pub fn new(frame: Frame, co: Vector2<f64>) -> Self {
        Self {
            frame,
            co,
            muted: false,
        }
    }
}

/// A tracked feature.
#[derive(Debug, Clone)]
pub struct Track {
    /// Unique identifier of this track.
    pub id: TrackId,

    /// Markers in ascending frame order.
    markers: Vec<Marker>,

    pub selected: bool,
    pub hidden: bool,
    pub locked: bool,

    /// Current solve weight.
    pub weight: f64,

    /// Weight keyed by frame; every weighting pass appends here.
    weight_history: BTreeMap<Frame, f64>,

    /// Solved 3D position, if the track was reconstructed.
    pub bundle: Option<Vector3<f64>>,

    /// Offset added to marker coordinates when comparing against reprojection.
    pub offset: Vector2<f64>,
}

impl Track {
    /// Create an empty, visible, unselected track.
    pub fn new(id: TrackId) -> Self {
        Self {
            id,
            markers: Vec::new(),
            selected: false,
            hidden: false,
            locked: false,
            weight: 1.0,
            weight_history: BTreeMap::new(),
            bundle: None,
            offset: Vector2::zeros(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Markers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn num_markers(&self) -> usize {
        self.markers.len()
    }

    /// Find the marker at `frame`, if any.
    pub fn marker_at(&self, frame: Frame) -> Option<&Marker> {
        self.markers
            .binary_search_by_key(&frame, |m| m.frame)
            .ok()
            .map(|idx| &self.markers[idx])
    }

    pub fn marker_at_mut(&mut self, frame: Frame) -> Option<&mut Marker> {
        match self.markers.binary_search_by_key(&frame, |m| m.frame) {
            Ok(idx) => Some(&mut self.markers[idx]),
            Err(_) => None,
        }
    }

    /// Marker at `frame` only if it is not muted.
    pub fn active_marker_at(&self, frame: Frame) -> Option<&Marker> {
        self.marker_at(frame).filter(|m| !m.muted)
    }

    /// Insert a marker at `frame`, replacing the coordinate of an existing one.
    ///
    /// A replaced marker keeps its mute state.
    pub fn insert_marker(&mut self, frame: Frame, co: Vector2<f64>) -> &mut Marker {
        let idx = match self.markers.binary_search_by_key(&frame, |m| m.frame) {
            Ok(idx) => {
                self.markers[idx].co = co;
                idx
            }
            Err(idx) => {
                self.markers.insert(idx, Marker::new(frame, co));
                idx
            }
        };
        &mut self.markers[idx]
    }

    /// Remove the marker at `frame`. Returns the removed marker.
    pub fn remove_marker(&mut self, frame: Frame) -> Option<Marker> {
        self.markers
            .binary_search_by_key(&frame, |m| m.frame)
            .ok()
            .map(|idx| self.markers.remove(idx))
    }

    /// Frames of all markers, in ascending order.
    pub fn marker_frames(&self) -> impl Iterator<Item = Frame> + '_ {
        self.markers.iter().map(|m| m.frame)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Span
    // ─────────────────────────────────────────────────────────────────────────

    /// A track without any unmuted marker is dead: it takes no part in
    /// motion estimation and is never continued.
    pub fn is_dead(&self) -> bool {
        self.markers.iter().all(|m| m.muted)
    }

    /// First unmuted marker frame, falling back to the first marker.
    pub fn span_start(&self) -> Option<Frame> {
        self.markers
            .iter()
            .find(|m| !m.muted)
            .or_else(|| self.markers.first())
            .map(|m| m.frame)
    }

    /// Last unmuted marker frame. A fully muted track reports one frame
    /// before its last marker so that its length stays below its extent.
    pub fn span_end(&self) -> Option<Frame> {
        match self.markers.iter().rev().find(|m| !m.muted) {
            Some(m) => Some(m.frame),
            None => self.markers.last().map(|m| m.frame - 1),
        }
    }

    /// Active span `[start, end]`.
    pub fn span(&self) -> Option<(Frame, Frame)> {
        Some((self.span_start()?, self.span_end()?))
    }

    /// Span end minus span start; zero for a track with no markers.
    pub fn length(&self) -> Frame {
        self.span().map(|(start, end)| end - start).unwrap_or(0)
    }

    /// Whether automated passes may mutate this track.
    pub fn is_editable(&self) -> bool {
        !self.hidden && !self.locked
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Weights
    // ─────────────────────────────────────────────────────────────────────────

    /// Set the current weight and record it at `frame`.
    pub fn set_weight_at(&mut self, frame: Frame, weight: f64) {
        self.weight = weight;
        self.weight_history.insert(frame, weight);
    }

    /// Weight recorded at `frame`.
    pub fn weight_at(&self, frame: Frame) -> Option<f64> {
        self.weight_history.get(&frame).copied()
    }

    pub fn weight_history(&self) -> &BTreeMap<Frame, f64> {
        &self.weight_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with_frames(frames: &[Frame]) -> Track {
        let mut track = Track::new(TrackId::new(0));
        for &f in frames {
            track.insert_marker(f, Vector2::new(f as f64 * 0.01, 0.5));
        }
        track
    }

    #[test]
    fn test_markers_stay_sorted() {
        let track = track_with_frames(&[5, 1, 3, 2]);
        let frames: Vec<Frame> = track.marker_frames().collect();
        assert_eq!(frames, vec![1, 2, 3, 5]);
        assert!(track.marker_at(4).is_none());
        assert_eq!(track.marker_at(3).unwrap().frame, 3);
    }

    #[test]
    fn test_insert_replaces_coordinate() {
        let mut track = track_with_frames(&[1]);
        track.marker_at_mut(1).unwrap().muted = true;
        track.insert_marker(1, Vector2::new(0.9, 0.9));

        assert_eq!(track.num_markers(), 1);
        let marker = track.marker_at(1).unwrap();
        assert_eq!(marker.co, Vector2::new(0.9, 0.9));
        assert!(marker.muted);
    }

    #[test]
    fn test_span_ignores_muted_ends() {
        let mut track = track_with_frames(&[0, 1, 2, 3, 4]);
        track.marker_at_mut(0).unwrap().muted = true;
        track.marker_at_mut(4).unwrap().muted = true;

        assert_eq!(track.span(), Some((1, 3)));
        assert_eq!(track.length(), 2);
        assert!(track.active_marker_at(4).is_none());
    }

    #[test]
    fn test_fully_muted_track_is_dead() {
        let mut track = track_with_frames(&[10, 11, 12]);
        for f in 10..=12 {
            track.marker_at_mut(f).unwrap().muted = true;
        }

        assert!(track.is_dead());
        assert_eq!(track.span(), Some((10, 11)));
        assert_eq!(track.length(), 1);
    }

    #[test]
    fn test_empty_track() {
        let track = Track::new(TrackId::new(3));
        assert!(track.is_dead());
        assert_eq!(track.span(), None);
        assert_eq!(track.length(), 0);
    }

    #[test]
    fn test_weight_history_is_preserved() {
        let mut track = track_with_frames(&[0, 1]);
        track.set_weight_at(0, 0.25);
        track.set_weight_at(1, 0.75);

        assert_eq!(track.weight, 0.75);
        assert_eq!(track.weight_at(0), Some(0.25));
        assert_eq!(track.weight_at(1), Some(0.75));
        assert_eq!(track.weight_history().len(), 2);
    }
}
