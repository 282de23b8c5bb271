//! Core ID and frame types for the track store.

/// Scene frame number. Signed so that backward tracking can step below the
/// start frame without wrapping.
pub type Frame = i32;

/// Unique identifier for a Track within a TrackStore.
///
/// TrackIds are assigned sequentially when tracks are created and are never
/// reused, so a deleted track's id stays dangling instead of silently
/// pointing at a newer track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl TrackId {
    /// Create a new TrackId with the given value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Track.{:03}", self.0)
    }
}

/// Direction in which markers are propagated through the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum TrackDirection {
    #[default]
    Forward,
    Backward,
}

impl TrackDirection {
    /// Signed frame increment for one step in this direction.
    pub fn step(self) -> Frame {
        match self {
            Self::Forward => 1,
            Self::Backward => -1,
        }
    }

    pub fn is_backward(self) -> bool {
        self == Self::Backward
    }
}
