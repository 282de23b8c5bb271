//! Clip and scene context the tracking session runs against.

use super::reconstruction::CameraIntrinsics;
use super::store::TrackStore;
use super::types::Frame;

/// A movie clip with its tracking data.
#[derive(Debug)]
pub struct Clip {
    pub width: u32,
    pub height: u32,
    pub camera: CameraIntrinsics,
    pub tracking: TrackStore,
}

impl Clip {
    pub fn new(width: u32, height: u32, camera: CameraIntrinsics) -> Self {
        Self {
            width,
            height,
            camera,
            tracking: TrackStore::new(),
        }
    }
}

/// Frame range of the scene plus the frame the playhead sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scene {
    pub frame_start: Frame,
    pub frame_end: Frame,
    pub frame_current: Frame,
}

impl Scene {
    pub fn new(frame_start: Frame, frame_end: Frame) -> Self {
        Self {
            frame_start,
            frame_end,
            frame_current: frame_start,
        }
    }

    /// Same range with the playhead moved to `frame`.
    pub fn at(self, frame: Frame) -> Self {
        Self {
            frame_current: frame,
            ..self
        }
    }

    /// Position of `frame` within the scene range, in `[0, 1]` for frames
    /// inside it. A zero-length scene reports 0.
    pub fn fraction(&self, frame: Frame) -> f64 {
        let total = self.frame_end - self.frame_start;
        if total == 0 {
            return 0.0;
        }
        (frame - self.frame_start) as f64 / total as f64
    }
}
