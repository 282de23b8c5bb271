//! Autotracking session: configuration, state machine and drivers.
//!
//! The `SessionController` runs one tracking step per tick. Ticks come from
//! a `TickSource`; `run_session` drives them from a channel until the
//! session terminates. Other threads observe and cancel through the
//! `SessionHandle`.

pub mod config;
pub mod controller;
pub mod driver;
pub mod handle;
pub mod progress;
pub mod state;
pub mod ticker;

pub use config::{AutotrackConfig, TrackingStep};
pub use controller::{select_active_tracks, SessionController, TickOutcome};
pub use driver::run_session;
pub use handle::{SessionHandle, SessionStatus};
pub use progress::{BarLayout, LogProgress, ProgressBar, ProgressDisplay};
pub use state::{CompletionReason, SessionPhase, SessionState};
pub use ticker::{ChannelTicker, TickSource};
