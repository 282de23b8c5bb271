//! Vision backend: the detector, tracker and solver the session drives.
//!
//! The session only relies on the contract below. Each call runs to
//! completion synchronously and reports failure through `Result`; callers
//! never retry.

pub mod synthetic;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::store::{Clip, Frame, TrackDirection};

pub use synthetic::{BackendStats, CameraPath, Glitch, SyntheticBackend, SyntheticFeature, SyntheticScene};

/// Where the detector may place new features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Placement {
    #[default]
    WholeFrame,
    InsideAnnotation,
    OutsideAnnotation,
}

/// Feature detector parameters, already converted to pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectParams {
    /// Minimum feature strength in `[0, 1]`.
    pub threshold: f64,
    /// Minimum pixel distance between two detected features.
    pub min_distance_px: f64,
    /// Pixel margin from the image edges.
    pub margin_px: f64,
    pub placement: Placement,
}

/// How far a single tracker invocation propagates markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackExtent {
    OneFrame,
    /// Up to this many frames, stopping early where a feature is lost.
    Frames(u32),
}

impl TrackExtent {
    pub fn frames(self) -> u32 {
        match self {
            Self::OneFrame => 1,
            Self::Frames(n) => n,
        }
    }
}

/// Host services consumed by the tracking session.
pub trait VisionBackend {
    /// Detect features on `frame`, adding each as a new selected track with
    /// one marker at `frame`.
    fn detect_features(&mut self, clip: &mut Clip, frame: Frame, params: &DetectParams) -> Result<()>;

    /// Propagate the markers of every selected, visible, unlocked track from
    /// `frame` in `direction`.
    fn track_markers(
        &mut self,
        clip: &mut Clip,
        frame: Frame,
        direction: TrackDirection,
        extent: TrackExtent,
    ) -> Result<()>;

    /// Solve camera motion, replacing `clip.tracking.reconstruction` and the
    /// track bundles.
    fn solve_camera(&mut self, clip: &mut Clip) -> Result<()>;
}

impl<B: VisionBackend + ?Sized> VisionBackend for Box<B> {
    fn detect_features(&mut self, clip: &mut Clip, frame: Frame, params: &DetectParams) -> Result<()> {
        (**self).detect_features(clip, frame, params)
    }

    fn track_markers(
        &mut self,
        clip: &mut Clip,
        frame: Frame,
        direction: TrackDirection,
        extent: TrackExtent,
    ) -> Result<()> {
        (**self).track_markers(clip, frame, direction, extent)
    }

    fn solve_camera(&mut self, clip: &mut Clip) -> Result<()> {
        (**self).solve_camera(clip)
    }
}
