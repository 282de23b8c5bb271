use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autotrack::backend::{SyntheticBackend, SyntheticScene};
use autotrack::io::load_scene;
use autotrack::session::{run_session, AutotrackConfig, LogProgress, SessionController};
use autotrack::store::{Frame, Scene};

/// Last frame of the demo sequence when none is given.
const DEFAULT_FRAME_END: Frame = 120;

/// Features in the generated scene.
const RANDOM_FEATURES: usize = 200;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Usage: autotrack [scene.csv] [frame_end]
    let scene_path = std::env::args().nth(1);
    let frame_end: Frame = match std::env::args().nth(2) {
        Some(arg) => arg
            .parse()
            .with_context(|| format!("invalid frame_end '{}'", arg))?,
        None => DEFAULT_FRAME_END,
    };

    let synthetic = match &scene_path {
        Some(path) => load_scene(path)?,
        None => SyntheticScene::random(42, RANDOM_FEATURES, 0, frame_end),
    };
    info!(
        "Loaded scene with {} features ({}), frames 0..={}",
        synthetic.features.len(),
        scene_path.as_deref().unwrap_or("random"),
        frame_end
    );

    let backend = SyntheticBackend::new(synthetic);
    let mut clip = backend.scene().clip();
    let mut controller = SessionController::new(backend, AutotrackConfig::default());

    let phase = run_session(
        &mut controller,
        &mut clip,
        Scene::new(0, frame_end),
        Some(Box::new(LogProgress::default())),
    )?;

    let store = &clip.tracking;
    let total_length: i64 = store.tracks().map(|t| t.length() as i64).sum();
    let mean_length = if store.is_empty() {
        0.0
    } else {
        total_length as f64 / store.len() as f64
    };
    info!(
        "Finished ({:?}): {} tracks, mean length {:.1} frames",
        phase,
        store.len(),
        mean_length
    );

    let recon = &store.reconstruction;
    if let Some((first, last)) = recon.frame_range() {
        info!(
            "Reconstruction: {} cameras over frames {}..={}, average error {:.4} px, keyframes {:?}",
            recon.cameras().len(),
            first,
            last,
            recon.average_error,
            store.keyframes
        );
    }

    let stats = &controller.backend().stats;
    info!(
        "Backend calls: detect={}, track={}, solve={}",
        stats.detect_calls, stats.track_calls, stats.solve_calls
    );
    Ok(())
}
