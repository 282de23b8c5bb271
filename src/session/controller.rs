//! SessionController - the autotracking state machine.
//!
//! A session runs as a sequence of ticks. Each tick handles exactly one
//! tracking step:
//! 1. Prunes short dormant tracks and splits jump cuts in the last window
//! 2. Detects new features, dropping those that duplicate live tracks
//! 3. Selects the tracks that can be continued
//! 4. Asks the backend tracker to advance them and re-arms the tick source
//!
//! Reaching the sequence boundary completes the session and, if enabled,
//! runs the solve pipeline. Running out of tracks completes it without
//! solving.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Result};
use tracing::{debug, info, warn};

use crate::backend::VisionBackend;
use crate::solve::{auto_solve, Outcome};
use crate::store::{Clip, Frame, Scene, TrackStore};
use crate::tracking::{acquire_and_filter, detect_and_split_jumps, prune_short_tracks, MotionEstimator};

use super::config::AutotrackConfig;
use super::handle::{SessionHandle, SessionStatus};
use super::progress::ProgressDisplay;
use super::state::{CompletionReason, SessionPhase, SessionState};
use super::ticker::TickSource;

/// What a tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Tracked one step; the next tick is armed.
    Continue,
    Completed(CompletionReason),
    Cancelled,
    /// No session was running.
    Inactive,
}

impl TickOutcome {
    /// Whether the driver should stop ticking.
    pub fn is_final(self) -> bool {
        self != Self::Continue
    }
}

/// Select every track the tracker may continue from `frame`.
///
/// Visible, unlocked, not dead, and either brand new (fewer than two
/// markers) or holding an unmuted marker on `frame`. Returns the number
/// selected.
pub fn select_active_tracks(store: &mut TrackStore, frame: Frame) -> usize {
    store.deselect_all();

    let mut selected = 0;
    for track in store.tracks_mut().filter(|t| t.is_editable() && !t.is_dead()) {
        if track.num_markers() < 2 || track.active_marker_at(frame).is_some() {
            track.selected = true;
            selected += 1;
        }
    }

    info!("select_active_tracks: {} tracks selected", selected);
    selected
}

/// Drives one autotracking session at a time.
pub struct SessionController<B> {
    backend: B,
    config: AutotrackConfig,
    estimator: MotionEstimator,

    /// Shared with observers on other threads.
    handle: Arc<SessionHandle>,

    phase: SessionPhase,

    /// Present only while a session runs.
    state: Option<SessionState>,

    /// Scene range captured at start.
    scene: Scene,

    ticker: Option<Box<dyn TickSource>>,
    display: Option<Box<dyn ProgressDisplay>>,
}

impl<B: VisionBackend> SessionController<B> {
    pub fn new(backend: B, config: AutotrackConfig) -> Self {
        Self {
            backend,
            config,
            estimator: MotionEstimator::new(),
            handle: SessionHandle::new(),
            phase: SessionPhase::Idle,
            state: None,
            scene: Scene::new(0, 0),
            ticker: None,
            display: None,
        }
    }

    pub fn handle(&self) -> Arc<SessionHandle> {
        Arc::clone(&self.handle)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &AutotrackConfig {
        &self.config
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.state.as_ref()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a session at the scene's current frame.
    ///
    /// Registers the tick source (armed for the first tick) and the optional
    /// progress display until the session terminates.
    pub fn start(
        &mut self,
        scene: Scene,
        mut ticker: Box<dyn TickSource>,
        display: Option<Box<dyn ProgressDisplay>>,
    ) -> Result<()> {
        if self.phase == SessionPhase::Running {
            bail!("an autotrack session is already running");
        }
        self.config.validate()?;

        let state = SessionState::new(scene.frame_current, self.config.direction);
        info!(
            "autotrack started at frame {} ({:?}), scene [{}, {}]",
            state.start_frame, state.direction, scene.frame_start, scene.frame_end
        );

        self.handle.clear_cancel();
        self.scene = scene;
        self.state = Some(state);
        self.phase = SessionPhase::Running;
        ticker.arm();
        self.ticker = Some(ticker);
        self.display = display;
        self.handle.publish(self.status(0));
        Ok(())
    }

    /// Request cancellation; honored at the top of the next tick.
    pub fn cancel(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.cancel_requested = true;
        }
    }

    /// Run one tick against `clip`.
    ///
    /// A backend error fails the session after the cleanup path has run and
    /// is returned to the caller.
    pub fn tick(&mut self, clip: &mut Clip) -> Result<TickOutcome> {
        if self.phase != SessionPhase::Running {
            return Ok(TickOutcome::Inactive);
        }
        let Some(state) = self.state.as_mut() else {
            return Ok(TickOutcome::Inactive);
        };

        if state.cancel_requested || self.handle.is_cancel_requested() {
            info!("autotrack cancelled at frame {}", state.current_frame);
            self.finish(clip, SessionPhase::Cancelled);
            return Ok(TickOutcome::Cancelled);
        }

        if let Some(ticker) = self.ticker.as_mut() {
            ticker.disarm();
        }

        let progress = state.update_progress(&self.scene);
        if let Some(display) = self.display.as_mut() {
            display.draw(self.scene.fraction(state.start_frame), progress);
        }

        if state.reached_boundary(&self.scene) {
            info!("autotrack reached frame {}, end of sequence", state.current_frame);
            return self.complete(clip, CompletionReason::SequenceEnd);
        }

        let t = Instant::now();
        match self.step(clip) {
            Ok(true) => {
                self.handle.publish(self.status(clip.tracking.len()));
                debug!("tick took {:.1}ms", t.elapsed().as_secs_f64() * 1000.0);
                Ok(TickOutcome::Continue)
            }
            Ok(false) => {
                info!("autotrack: no active tracks left, stopping");
                self.complete(clip, CompletionReason::NoActiveTracks)
            }
            Err(e) => {
                warn!("autotrack failed: {:#}", e);
                self.finish(clip, SessionPhase::Failed);
                Err(e)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tick Steps
    // ─────────────────────────────────────────────────────────────────────────

    /// Maintenance, acquisition and one tracker call. Returns `false` when
    /// there was nothing left to track.
    fn step(&mut self, clip: &mut Clip) -> Result<bool> {
        let Some(state) = self.state.as_ref() else {
            return Ok(false);
        };
        let frames = self.config.frames_per_tick();
        let current = state.current_frame;
        let iteration = state.iteration_count;
        let direction = state.direction;
        let window = state.analysis_window(frames);
        let boundary = state.boundary(&self.scene);
        debug!("tick {}: tracking frame {}", iteration, current);

        prune_short_tracks(&mut clip.tracking, window.last_frame, self.config.health.min_track_length);
        detect_and_split_jumps(
            &mut clip.tracking,
            &window,
            self.config.health.jump_cut_factor,
            &self.estimator,
            boundary,
        );

        if self.config.should_acquire(iteration) {
            acquire_and_filter(clip, &mut self.backend, current, &self.config.detection)?;
        }

        if select_active_tracks(&mut clip.tracking, current) == 0 {
            return Ok(false);
        }

        self.backend
            .track_markers(clip, current, direction, self.config.track_extent())?;

        if let Some(state) = self.state.as_mut() {
            state.advance(frames, &self.scene);
        }
        if let Some(ticker) = self.ticker.as_mut() {
            ticker.arm();
        }
        Ok(true)
    }

    /// Complete the session and run the solve pipeline when the whole
    /// sequence was tracked.
    fn complete(&mut self, clip: &mut Clip, reason: CompletionReason) -> Result<TickOutcome> {
        self.finish(clip, SessionPhase::Completed(reason));

        if reason == CompletionReason::SequenceEnd && self.config.auto_solve {
            match auto_solve(clip, &mut self.backend, &self.scene, self.config.refine_step()) {
                Ok(Outcome::Finished) => info!(
                    "auto solve finished, solve error {:.4}",
                    clip.tracking.reconstruction.average_error
                ),
                Ok(Outcome::Cancelled) => warn!("auto solve cancelled: nothing to solve"),
                Err(e) => {
                    warn!("auto solve failed: {:#}", e);
                    self.phase = SessionPhase::Failed;
                    self.handle.set_phase(SessionPhase::Failed);
                    return Err(e);
                }
            }
        }
        Ok(TickOutcome::Completed(reason))
    }

    /// Cleanup shared by every terminal transition: show all tracks, leave
    /// nothing selected, release the tick source and the display.
    fn finish(&mut self, clip: &mut Clip, phase: SessionPhase) {
        clip.tracking.unhide_all();
        clip.tracking.deselect_all();
        if let Some(mut ticker) = self.ticker.take() {
            ticker.disarm();
        }
        self.display = None;

        self.phase = phase;
        self.handle.publish(self.status(clip.tracking.len()));
        self.state = None;
    }

    fn status(&self, num_tracks: usize) -> SessionStatus {
        let (current_frame, iteration_count, progress) = self
            .state
            .as_ref()
            .map(|s| (s.current_frame, s.iteration_count, s.progress))
            .unwrap_or_default();
        SessionStatus {
            phase: self.phase,
            current_frame,
            iteration_count,
            progress,
            num_tracks,
        }
    }
}
