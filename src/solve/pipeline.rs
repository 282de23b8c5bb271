//! Solve operations run after tracking: keyframe selection, an unweighted
//! solve and a reprojection-weighted refinement.
//!
//! Missing preconditions are not errors: the operation reports
//! [`Outcome::Cancelled`] and leaves the store untouched. Backend failures
//! propagate as errors.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::backend::VisionBackend;
use crate::geometry::ClipProjection;
use crate::store::{Clip, Frame, Scene, TrackStore};

use super::keyframes::pick_keyframes;
use super::weighting::{compute_weights, RefineConfig};

/// Result of a host-facing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Finished,
    Cancelled,
}

/// Pick keyframes and store them for the solver, disabling its own
/// keyframe selection.
pub fn set_keyframes(store: &mut TrackStore, scene: &Scene) -> Outcome {
    let Some((frame_a, frame_b)) = pick_keyframes(store, scene) else {
        warn!("set_keyframes: no tracks to pick keyframes from");
        return Outcome::Cancelled;
    };
    store.keyframes = Some((frame_a, frame_b));
    store.use_keyframe_selection = false;
    info!("set_keyframes: keyframes {} and {}", frame_a, frame_b);
    Outcome::Finished
}

/// Reset every weight to 1 and solve.
///
/// Weights are reset on the reconstructed frames, or on every marker frame
/// when there is no reconstruction yet.
pub fn reset_solution<B: VisionBackend + ?Sized>(clip: &mut Clip, backend: &mut B) -> Result<Outcome> {
    let store = &mut clip.tracking;
    let frames: Option<Vec<Frame>> = store
        .reconstruction
        .is_valid()
        .then(|| store.reconstruction.cameras().iter().map(|c| c.frame).collect());

    for track in store.tracks_mut() {
        let marker_frames: Vec<Frame> = match &frames {
            Some(frames) => frames
                .iter()
                .copied()
                .filter(|&f| track.marker_at(f).is_some())
                .collect(),
            None => track.marker_frames().collect(),
        };
        for frame in marker_frames {
            track.set_weight_at(frame, 1.0);
        }
    }

    backend.solve_camera(clip).context("unweighted solve failed")?;
    info!(
        "reset_solution: solve error {:.4}",
        clip.tracking.reconstruction.average_error
    );
    Ok(Outcome::Finished)
}

/// Weight tracks by reprojection error and solve again.
pub fn refine_solution<B: VisionBackend + ?Sized>(
    clip: &mut Clip,
    backend: &mut B,
    config: &RefineConfig,
) -> Result<Outcome> {
    if !clip.tracking.reconstruction.is_valid() {
        warn!("refine_solution: no reconstruction to refine");
        return Ok(Outcome::Cancelled);
    }

    let projection = ClipProjection::from_clip(clip);
    let before = clip.tracking.reconstruction.average_error;
    compute_weights(
        &mut clip.tracking,
        &projection,
        config.target_error,
        config.smooth_frames,
    );

    backend.solve_camera(clip).context("weighted solve failed")?;
    info!(
        "refine_solution: solve error {:.4} -> {:.4}",
        before, clip.tracking.reconstruction.average_error
    );
    Ok(Outcome::Finished)
}

/// Full pipeline run when a session reaches the end of the sequence.
pub fn auto_solve<B: VisionBackend + ?Sized>(
    clip: &mut Clip,
    backend: &mut B,
    scene: &Scene,
    refine: Option<&RefineConfig>,
) -> Result<Outcome> {
    if set_keyframes(&mut clip.tracking, scene) == Outcome::Cancelled {
        return Ok(Outcome::Cancelled);
    }
    reset_solution(clip, backend)?;
    match refine {
        Some(config) => refine_solution(clip, backend, config),
        None => Ok(Outcome::Finished),
    }
}
