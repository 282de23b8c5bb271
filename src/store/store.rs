//! TrackStore - container for tracks plus the reconstruction they feed.
//!
//! The store owns every track; tracks own their markers; the reconstruction
//! owns its cameras. Components borrow the store for the duration of one
//! call and refer to tracks by `TrackId` across calls.
//!
//! Tracks are kept in creation order. Because ids are assigned
//! monotonically, that order is also ascending by id, which lets lookups
//! binary-search.

use super::reconstruction::Reconstruction;
use super::track::Track;
use super::types::{Frame, TrackId};

/// All tracking data of a clip.
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: Vec<Track>,

    /// Counter for generating unique track IDs.
    next_track_id: u64,

    /// Latest camera solve.
    pub reconstruction: Reconstruction,

    /// Keyframe pair used to initialize the solver.
    pub keyframes: Option<(Frame, Frame)>,

    /// Whether the solver should choose its own keyframes.
    pub use_keyframe_selection: bool,
}

impl TrackStore {
    pub fn new() -> Self {
        Self {
            use_keyframe_selection: true,
            ..Default::default()
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Track Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create and add a new empty track. Returns its ID.
    pub fn new_track(&mut self) -> TrackId {
        let id = TrackId::new(self.next_track_id);
        self.next_track_id += 1;
        self.tracks.push(Track::new(id));
        id
    }

    fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.binary_search_by_key(&id, |t| t.id).ok()
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.index_of(id).map(|idx| &self.tracks[idx])
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        let idx = self.index_of(id)?;
        Some(&mut self.tracks[idx])
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn tracks_mut(&mut self) -> impl Iterator<Item = &mut Track> {
        self.tracks.iter_mut()
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batch Selection
    // ─────────────────────────────────────────────────────────────────────────

    pub fn select_all(&mut self) {
        for track in &mut self.tracks {
            track.selected = true;
        }
    }

    pub fn deselect_all(&mut self) {
        for track in &mut self.tracks {
            track.selected = false;
        }
    }

    pub fn selected_ids(&self) -> Vec<TrackId> {
        self.tracks
            .iter()
            .filter(|t| t.selected)
            .map(|t| t.id)
            .collect()
    }

    /// Delete every selected track. Returns the number of deleted tracks.
    pub fn delete_selected(&mut self) -> usize {
        let before = self.tracks.len();
        self.tracks.retain(|t| !t.selected);
        before - self.tracks.len()
    }

    /// Select exactly `ids` and delete them in one batch.
    pub fn delete_tracks(&mut self, ids: &[TrackId]) -> usize {
        self.deselect_all();
        for &id in ids {
            if let Some(track) = self.get_mut(id) {
                track.selected = true;
            }
        }
        self.delete_selected()
    }

    pub fn unhide_all(&mut self) {
        for track in &mut self.tracks {
            track.hidden = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    fn store_with_tracks(n: usize) -> (TrackStore, Vec<TrackId>) {
        let mut store = TrackStore::new();
        let ids = (0..n)
            .map(|i| {
                let id = store.new_track();
                store
                    .get_mut(id)
                    .unwrap()
                    .insert_marker(0, Vector2::new(i as f64 * 0.1, 0.0));
                id
            })
            .collect();
        (store, ids)
    }

    #[test]
    fn test_new_track_ids_are_sequential() {
        let (store, ids) = store_with_tracks(3);
        assert_eq!(ids, vec![TrackId::new(0), TrackId::new(1), TrackId::new(2)]);
        assert_eq!(store.len(), 3);
        assert!(store.use_keyframe_selection);
    }

    #[test]
    fn test_delete_tracks_batch() {
        let (mut store, ids) = store_with_tracks(4);
        let deleted = store.delete_tracks(&[ids[1], ids[3]]);

        assert_eq!(deleted, 2);
        assert_eq!(store.track_ids(), vec![ids[0], ids[2]]);
        assert!(store.get(ids[1]).is_none());
        assert!(store.selected_ids().is_empty());
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let (mut store, ids) = store_with_tracks(2);
        store.delete_tracks(&[ids[1]]);
        let id = store.new_track();
        assert_eq!(id, TrackId::new(2));
        assert!(store.get(id).is_some());
    }

    #[test]
    fn test_select_and_unhide_all() {
        let (mut store, ids) = store_with_tracks(3);
        store.get_mut(ids[0]).unwrap().hidden = true;
        store.select_all();
        assert_eq!(store.selected_ids().len(), 3);

        store.deselect_all();
        store.unhide_all();
        assert!(store.tracks().all(|t| !t.selected && !t.hidden));
    }
}
