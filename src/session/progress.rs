//! Progress display hook.
//!
//! The session reports `(start, progress)` once per tick. `start` is the
//! position of the start frame within the scene, `progress` the signed
//! fraction covered towards the boundary. Displays are purely
//! observational.

use tracing::debug;

/// Receives progress updates from a running session.
pub trait ProgressDisplay {
    fn draw(&mut self, start: f64, progress: f64);
}

/// Geometry of a drawn progress bar.
#[derive(Debug, Clone, PartialEq)]
pub struct BarLayout {
    /// Outline `(x0, y0, x1, y1)`.
    pub outline: (f64, f64, f64, f64),
    /// Filled horizontal span, from the start marker to the current position.
    pub filled: (f64, f64),
    pub label: String,
}

/// Horizontal progress bar in screen units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressBar {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            x: 10.0,
            y: 24.0,
            width: 200.0,
            height: 16.0,
        }
    }
}

impl ProgressBar {
    /// Fill from the start marker towards the right end when tracking
    /// forward, towards the left end when tracking backward.
    pub fn layout(&self, start: f64, progress: f64) -> BarLayout {
        let (x0, y0) = (self.x, self.y);
        let (x1, y1) = (x0 + self.width, y0 + self.height);

        let xs = x0 + (x1 - x0) * start;
        let xi = if progress > 0.0 {
            xs + (x1 - xs) * progress
        } else {
            xs - (x0 - xs) * progress
        };

        BarLayout {
            outline: (x0, y0, x1, y1),
            filled: (xs, xi),
            label: format!("{}%", (100.0 * progress.abs()) as i64),
        }
    }
}

/// Display that logs each bar update at debug level.
#[derive(Debug, Default)]
pub struct LogProgress {
    bar: ProgressBar,
}

impl LogProgress {
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl ProgressDisplay for LogProgress {
    fn draw(&mut self, start: f64, progress: f64) {
        let layout = self.bar.layout(start, progress);
        debug!(
            "progress {} [{:.1} .. {:.1}]",
            layout.label, layout.filled.0, layout.filled.1
        );
    }
}
