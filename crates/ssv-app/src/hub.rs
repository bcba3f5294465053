//! Fan-out of published state to every subscriber.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use parking_lot::Mutex;
use ssv_state::StateSnapshot;

/// Why a request produced no snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureNotice {
    pub message: String,
    /// The server rejected our credentials; front ends should send the user to login.
    pub unauthorized: bool,
}

/// One item of the state stream.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    Snapshot(Arc<StateSnapshot>),
    /// A request failed; the previous snapshot is still the current state.
    Failed(FailureNotice),
    /// The session ended; there is no current state.
    Ended,
}

impl StateUpdate {
    pub fn snapshot(&self) -> Option<&Arc<StateSnapshot>> {
        match self {
            StateUpdate::Snapshot(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Default)]
struct HubInner {
    subscribers: Vec<Sender<StateUpdate>>,
    /// Last snapshot or end marker, replayed to new subscribers.
    latest: Option<StateUpdate>,
}

/// Single producer, many consumers. Failures are broadcast but never replayed.
#[derive(Default)]
pub struct SnapshotHub {
    inner: Mutex<HubInner>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        let (tx, rx) = mpsc::channel();
        let mut inner = self.inner.lock();
        if let Some(latest) = &inner.latest {
            // the receiver is alive; this cannot fail
            let _ = tx.send(latest.clone());
        }
        inner.subscribers.push(tx);
        SnapshotStream { rx }
    }

    /// Send `update` to every live subscriber, dropping the ones that hung up.
    pub fn publish(&self, update: StateUpdate) {
        let mut inner = self.inner.lock();
        inner
            .subscribers
            .retain(|tx| tx.send(update.clone()).is_ok());
        if !matches!(update, StateUpdate::Failed(_)) {
            inner.latest = Some(update);
        }
    }

    pub fn latest_snapshot(&self) -> Option<Arc<StateSnapshot>> {
        self.inner
            .lock()
            .latest
            .as_ref()
            .and_then(StateUpdate::snapshot)
            .cloned()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }
}

/// Receiving end of a subscription.
pub struct SnapshotStream {
    rx: Receiver<StateUpdate>,
}

impl SnapshotStream {
    /// Block until the next update; `None` once the publisher is gone.
    pub fn recv(&self) -> Option<StateUpdate> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<StateUpdate> {
        match self.rx.recv_timeout(timeout) {
            Ok(update) => Some(update),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_recv(&self) -> Option<StateUpdate> {
        self.rx.try_recv().ok()
    }

    /// Everything already queued, without blocking.
    pub fn drain(&self) -> Vec<StateUpdate> {
        self.rx.try_iter().collect()
    }
}

impl Iterator for SnapshotStream {
    type Item = StateUpdate;

    fn next(&mut self) -> Option<StateUpdate> {
        self.recv()
    }
}
