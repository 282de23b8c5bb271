//! Session state machine types.

use crate::store::{Frame, Scene, TrackDirection};
use crate::tracking::AnalysisWindow;

/// Why a session completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The current frame reached the scene boundary. Triggers auto-solve.
    SequenceEnd,
    /// No track was left to continue. Auto-solve is skipped.
    NoActiveTracks,
}

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
    Completed(CompletionReason),
    Cancelled,
    /// A backend call failed.
    Failed,
}

impl SessionPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed(_) | Self::Cancelled | Self::Failed)
    }
}

/// Per-session counters, owned by the controller while it runs.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub start_frame: Frame,
    pub current_frame: Frame,
    pub direction: TrackDirection,
    pub iteration_count: u32,
    /// Fraction of the way from the start frame to the boundary, negative
    /// when tracking backward.
    pub progress: f64,
    pub cancel_requested: bool,
}

impl SessionState {
    pub fn new(start_frame: Frame, direction: TrackDirection) -> Self {
        Self {
            start_frame,
            current_frame: start_frame,
            direction,
            iteration_count: 0,
            progress: 0.0,
            cancel_requested: false,
        }
    }

    /// Last frame of the sequence in the tracking direction.
    pub fn boundary(&self, scene: &Scene) -> Frame {
        match self.direction {
            TrackDirection::Forward => scene.frame_end,
            TrackDirection::Backward => scene.frame_start,
        }
    }

    pub fn reached_boundary(&self, scene: &Scene) -> bool {
        (self.boundary(scene) - self.current_frame) * self.direction.step() <= 0
    }

    /// Recompute and return `progress`. Starting on the boundary reports 0.
    pub fn update_progress(&mut self, scene: &Scene) -> f64 {
        let total = (self.boundary(scene) - self.start_frame).abs();
        self.progress = if total == 0 {
            0.0
        } else {
            (self.current_frame - self.start_frame) as f64 / total as f64
        };
        self.progress
    }

    /// Frames tracked since the previous tick.
    pub fn analysis_window(&self, frames: u32) -> AnalysisWindow {
        AnalysisWindow::ending_at(self.current_frame, frames, self.direction)
    }

    /// Move `frames` frames on, stopping at the boundary.
    pub fn advance(&mut self, frames: u32, scene: &Scene) {
        let step = self.direction.step();
        let boundary = self.boundary(scene);
        let remaining = ((boundary - self.current_frame) * step).max(0);
        self.current_frame += step * (frames as Frame).min(remaining);
        self.iteration_count += 1;
    }
}
