//! Track Store: tracks, markers and the camera reconstruction.
//!
//! Pure data with no tracking logic. The host object graph
//! (clip → tracking → tracks → markers, reconstruction → cameras) is held as
//! plain ownership: the clip owns the store, the store owns the tracks and
//! the reconstruction, and cross references go through `TrackId`.

pub mod clip;
pub mod reconstruction;
#[allow(clippy::module_inception)]
pub mod store;
pub mod track;
pub mod types;

pub use clip::{Clip, Scene};
pub use reconstruction::{CameraIntrinsics, CameraPose, Reconstruction};
pub use store::TrackStore;
pub use track::{Marker, Track};
pub use types::{Frame, TrackDirection, TrackId};
