//! Blocking session driver.
//!
//! Plays the role of the host event loop: waits for the controller's tick
//! source and runs one tick per received activation. The receive timeout
//! keeps the loop responsive to cancellation requested through the
//! session handle while no tick is pending.

use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;
use tracing::info;

use crate::backend::VisionBackend;
use crate::store::{Clip, Scene};

use super::controller::{SessionController, TickOutcome};
use super::progress::ProgressDisplay;
use super::state::SessionPhase;
use super::ticker::ChannelTicker;

/// Timeout for waiting on the next tick.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Start a session on `clip` and tick it until it terminates.
///
/// Returns the final phase. A failing tick returns its error.
pub fn run_session<B: VisionBackend>(
    controller: &mut SessionController<B>,
    clip: &mut Clip,
    scene: Scene,
    display: Option<Box<dyn ProgressDisplay>>,
) -> Result<SessionPhase> {
    let ticker = ChannelTicker::new();
    let ticks = ticker.receiver();
    controller.start(scene, Box::new(ticker), display)?;

    loop {
        match ticks.recv_timeout(RECV_TIMEOUT) {
            Ok(()) => {
                if controller.tick(clip)?.is_final() {
                    break;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // Nothing pending: only a cancellation can move us on.
                if controller.handle().is_cancel_requested() {
                    controller.tick(clip)?;
                    break;
                }
                if controller.phase() != SessionPhase::Running {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                info!("tick source released");
                break;
            }
        }
    }

    let status = controller.handle().status();
    info!(
        "autotrack session ended: {:?} at frame {} after {} iterations, {} tracks",
        status.phase, status.current_frame, status.iteration_count, status.num_tracks
    );
    Ok(controller.phase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backend::{SyntheticBackend, SyntheticFeature, SyntheticScene};
    use crate::session::{AutotrackConfig, CompletionReason, SessionHandle};
    use nalgebra::Vector3;

    fn scene() -> SyntheticScene {
        SyntheticScene::new(
            (0..8)
                .map(|i| SyntheticFeature::new(Vector3::new(-6.0 + 3.0 * (i % 4) as f64, if i < 4 { -2.0 } else { 2.0 }, -10.0)))
                .collect(),
        )
    }

    fn controller(auto_solve: bool) -> (SessionController<SyntheticBackend>, Clip) {
        let backend = SyntheticBackend::new(scene());
        let clip = backend.scene().clip();
        let config = AutotrackConfig {
            auto_solve,
            ..AutotrackConfig::default()
        };
        (SessionController::new(backend, config), clip)
    }

    /// Requests cancellation once progress passes a threshold.
    struct CancelAt {
        handle: Arc<SessionHandle>,
        at: f64,
    }

    impl ProgressDisplay for CancelAt {
        fn draw(&mut self, _start: f64, progress: f64) {
            if progress >= self.at {
                self.handle.request_cancel();
            }
        }
    }

    #[test]
    fn test_runs_to_completion_with_solve() {
        let (mut controller, mut clip) = controller(true);
        let phase = run_session(&mut controller, &mut clip, Scene::new(0, 20), None).unwrap();

        assert_eq!(phase, SessionPhase::Completed(CompletionReason::SequenceEnd));
        assert_eq!(controller.backend().stats.solve_calls, 2);
        assert!(clip.tracking.reconstruction.is_valid());
        assert_eq!(controller.handle().status().current_frame, 20);
    }

    #[test]
    fn test_cancel_requested_mid_session() {
        let (mut controller, mut clip) = controller(true);
        let display = CancelAt {
            handle: controller.handle(),
            at: 0.5,
        };
        let phase = run_session(&mut controller, &mut clip, Scene::new(0, 20), Some(Box::new(display))).unwrap();

        assert_eq!(phase, SessionPhase::Cancelled);
        // The tick that saw progress 0.5 still ran to completion.
        assert_eq!(controller.handle().status().current_frame, 11);
        assert_eq!(controller.backend().stats.solve_calls, 0);
        assert!(clip.tracking.tracks().all(|t| !t.hidden && !t.selected));
    }

    #[test]
    fn test_backend_error_is_returned() {
        let backend = SyntheticBackend::new(scene()).fail_tracking_at(2);
        let mut clip = backend.scene().clip();
        let mut controller = SessionController::new(backend, AutotrackConfig::default());

        assert!(run_session(&mut controller, &mut clip, Scene::new(0, 20), None).is_err());
        assert_eq!(controller.phase(), SessionPhase::Failed);
    }
}
