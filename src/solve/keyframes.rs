//! Keyframe pair selection for solver initialization.
//!
//! The pair is chosen inside the frame range covered by the longest tracks,
//! then pulled away from its ends where tracking tends to be least reliable.

use std::cmp::Reverse;

use crate::store::{Frame, Scene, TrackStore};

/// Number of longest tracks whose spans constrain the keyframe pair.
pub const LONGEST_TRACKS: usize = 12;

/// Intervals wider than this are shrunk by a quarter on each side.
pub const SHRINK_THRESHOLD: Frame = 20;

/// Pick the two keyframes `(frame_a, frame_b)`.
///
/// Uses the spans of the [`LONGEST_TRACKS`] longest tracks (all tracks if
/// there are fewer) together with the first and last usable scene frames.
/// Returns `None` when the store has no track with markers.
pub fn pick_keyframes(store: &TrackStore, scene: &Scene) -> Option<(Frame, Frame)> {
    let mut spans: Vec<(Frame, Frame)> = store.tracks().filter_map(|t| t.span()).collect();
    if spans.is_empty() {
        return None;
    }
    spans.sort_by_key(|&(start, end)| Reverse(end - start));
    spans.truncate(LONGEST_TRACKS);

    let starts = spans.iter().map(|&(start, _)| start);
    let ends = spans.iter().map(|&(_, end)| end);

    let mut frame_a = starts.chain([scene.frame_start + 1]).max()?;
    let mut frame_b = ends.chain([scene.frame_end - 1]).min()?;

    let delta = frame_b - frame_a;
    if delta > SHRINK_THRESHOLD {
        frame_a += delta / 4;
        frame_b -= delta / 4;
    }
    Some((frame_a, frame_b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn add_span(store: &mut TrackStore, start: Frame, end: Frame) {
        let id = store.new_track();
        let track = store.get_mut(id).unwrap();
        for f in start..=end {
            track.insert_marker(f, Vector2::new(0.5, 0.5));
        }
    }

    fn store_with_spans(n: usize, start: Frame, end: Frame) -> TrackStore {
        let mut store = TrackStore::new();
        for _ in 0..n {
            add_span(&mut store, start, end);
        }
        store
    }

    #[test]
    fn test_empty_store_has_no_keyframes() {
        assert_eq!(pick_keyframes(&TrackStore::new(), &Scene::new(0, 100)), None);
    }

    #[test]
    fn test_short_interval_is_not_shrunk() {
        let store = store_with_spans(12, 10, 30);
        assert_eq!(pick_keyframes(&store, &Scene::new(0, 100)), Some((10, 30)));
    }

    #[test]
    fn test_delta_21_shrinks_without_inverting() {
        let store = store_with_spans(12, 10, 31);
        let (a, b) = pick_keyframes(&store, &Scene::new(0, 100)).unwrap();
        assert_eq!((a, b), (15, 26));
        assert!(a < b);
    }

    #[test]
    fn test_delta_80_shrinks_by_quarter() {
        let store = store_with_spans(12, 10, 90);
        let (a, b) = pick_keyframes(&store, &Scene::new(0, 100)).unwrap();
        assert_eq!((a, b), (30, 70));
        assert!(a < b);
    }

    #[test]
    fn test_only_longest_tracks_count() {
        let mut store = store_with_spans(12, 0, 100);
        add_span(&mut store, 50, 55);
        let picked = pick_keyframes(&store, &Scene::new(-10, 200)).unwrap();
        assert_eq!(picked, (25, 75));
    }

    #[test]
    fn test_scene_bounds_clamp_interval() {
        let store = store_with_spans(3, 0, 100);
        let picked = pick_keyframes(&store, &Scene::new(10, 50)).unwrap();
        // [11, 49] has delta 38, shrunk by 9 on each side.
        assert_eq!(picked, (20, 40));
    }
}
