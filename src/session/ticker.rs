//! Tick sources that schedule session activations.
//!
//! A session re-arms its tick source at the end of every tick that did not
//! terminate, so at most one tick is ever pending.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Recurring activation source owned by a running session.
pub trait TickSource {
    /// Schedule the next tick.
    fn arm(&mut self);

    /// Drop any pending tick and stop scheduling.
    fn disarm(&mut self);

    fn is_armed(&self) -> bool;
}

/// Tick source backed by a single-slot channel.
///
/// `arm` posts one tick; the driver blocks on [`ChannelTicker::receiver`].
pub struct ChannelTicker {
    sender: Sender<()>,
    receiver: Receiver<()>,
    armed: bool,
}

impl ChannelTicker {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self {
            sender,
            receiver,
            armed: false,
        }
    }

    /// Receiving end for the driver loop.
    pub fn receiver(&self) -> Receiver<()> {
        self.receiver.clone()
    }
}

impl Default for ChannelTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for ChannelTicker {
    fn arm(&mut self) {
        self.armed = true;
        match self.sender.try_send(()) {
            // A tick is already pending.
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => self.armed = false,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
        while self.receiver.try_recv().is_ok() {}
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}
