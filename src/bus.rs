//! Cross-view signal bus
//!
//! Signals are payload-light broadcasts telling every mounted view to re-read
//! the timer store. Each timer signal carries the store version the writer
//! committed before publishing, so a reader that has already applied that
//! version (or a newer one) can drop it.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, trace};

pub const SIGNAL_TOGGLE_REQUESTED: &str = "timer-toggle-requested";
pub const SIGNAL_TOGGLE_CONFIRMED: &str = "timer-toggle-confirmed";
pub const SIGNAL_STOP_REQUESTED: &str = "timer-stop-requested";
pub const SIGNAL_STORAGE: &str = "storage";

/// A named broadcast on the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "signal", rename_all = "kebab-case")]
pub enum Signal {
    ToggleRequested { version: u64 },
    ToggleConfirmed { version: u64 },
    StopRequested { version: u64 },
    StorageChanged { key: String },
}

impl Signal {
    /// Event name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Signal::ToggleRequested { .. } => SIGNAL_TOGGLE_REQUESTED,
            Signal::ToggleConfirmed { .. } => SIGNAL_TOGGLE_CONFIRMED,
            Signal::StopRequested { .. } => SIGNAL_STOP_REQUESTED,
            Signal::StorageChanged { .. } => SIGNAL_STORAGE,
        }
    }

    /// Store version the signal refers to, if any
    pub fn version(&self) -> Option<u64> {
        match self {
            Signal::ToggleRequested { version }
            | Signal::ToggleConfirmed { version }
            | Signal::StopRequested { version } => Some(*version),
            Signal::StorageChanged { .. } => None,
        }
    }

    /// Whether a reader that already applied `seen_version` should act on this
    pub fn is_newer_than(&self, seen_version: u64) -> bool {
        self.version().map_or(true, |version| version > seen_version)
    }
}

/// Broadcast channel shared by every view
#[derive(Debug, Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<Signal>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    pub fn publish(&self, signal: Signal) {
        trace!("Publishing signal {}", signal.name());
        if self.tx.send(signal).is_err() {
            debug!("No views listening for signals");
        }
    }

    /// Announce a committed toggle: request first, then the confirmation
    pub fn publish_toggle(&self, version: u64) {
        self.publish(Signal::ToggleRequested { version });
        self.publish(Signal::ToggleConfirmed { version });
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}
