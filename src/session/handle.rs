//! Session handle shared between the session driver and other threads.
//!
//! The controller itself is single-threaded. Other threads interact with a
//! running session only through this handle: they may request cancellation
//! and read the latest status snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::Frame;

use super::state::SessionPhase;

/// Snapshot of a session, published by the controller after every tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub current_frame: Frame,
    pub iteration_count: u32,
    pub progress: f64,
    /// Tracks in the store when the snapshot was taken.
    pub num_tracks: usize,
}

/// Cancellation flag plus status, shareable across threads.
pub struct SessionHandle {
    /// Set by any thread; observed by the controller at the top of a tick.
    cancel_requested: AtomicBool,

    /// Latest status. Written by the controller, read by observers.
    status: RwLock<SessionStatus>,
}

impl SessionHandle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Ask the session to cancel at its next tick.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Clear a stale request before a new session starts.
    pub fn clear_cancel(&self) {
        self.cancel_requested.store(false, Ordering::SeqCst);
    }

    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub fn phase(&self) -> SessionPhase {
        self.status.read().phase
    }

    pub(crate) fn publish(&self, status: SessionStatus) {
        *self.status.write() = status;
    }

    pub(crate) fn set_phase(&self, phase: SessionPhase) {
        self.status.write().phase = phase;
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self {
            cancel_requested: AtomicBool::new(false),
            status: RwLock::new(SessionStatus::default()),
        }
    }
}
