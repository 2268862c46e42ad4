//! Mutation status shown next to the entry form.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Error,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    status: SyncStatus,
    in_flight: usize,
}

/// State machine `Idle → Syncing → (Idle | Error)`.
///
/// Mutations may overlap: the tracker stays in `Syncing` until the last one in
/// flight resolves. `Error` is sticky: only a new attempt leaves it, and a
/// success of an overlapping mutation does not clear it.
#[derive(Debug)]
pub struct SyncTracker {
    state: Mutex<TrackerState>,
    publisher: watch::Sender<SyncStatus>,
}

impl Default for SyncTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTracker {
    pub fn new() -> Self {
        let (publisher, _) = watch::channel(SyncStatus::Idle);
        Self {
            state: Mutex::new(TrackerState::default()),
            publisher,
        }
    }

    pub fn status(&self) -> SyncStatus {
        *self.publisher.borrow()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.publisher.subscribe()
    }

    /// A mutation is about to be sent.
    pub fn begin(&self) {
        self.apply(|state| {
            state.in_flight += 1;
            state.status = SyncStatus::Syncing;
        });
    }

    /// A mutation resolved successfully.
    pub fn succeed(&self) {
        self.apply(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            if state.status == SyncStatus::Syncing && state.in_flight == 0 {
                state.status = SyncStatus::Idle;
            }
        });
    }

    /// A mutation was rejected.
    pub fn fail(&self) {
        self.apply(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
            state.status = SyncStatus::Error;
        });
    }

    fn apply(&self, f: impl FnOnce(&mut TrackerState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.status;
        f(&mut state);
        if state.status != before {
            tracing::debug!("sync status {} -> {}", before.as_str(), state.status.as_str());
            self.publisher.send_replace(state.status);
        }
    }
}
