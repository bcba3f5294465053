//! Threaded front door of the state engine.
//!
//! `StateService` runs a `SessionEngine` on one worker thread behind a
//! single-slot queue. A submitted request replaces any request that has not
//! started yet, so a burst of UI changes collapses into the newest one.
//!
//! Every submission gets a generation number. When a request finishes while
//! a newer one is already waiting, its snapshot is stale and is dropped
//! instead of published; the engine keeps the state it built, which becomes
//! the base the newer request is diffed against.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use ssv_client::DataSource;
use ssv_core::JobId;
use ssv_state::{StateRequest, StateSnapshot};
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::engine::{EngineOutcome, SessionEngine};
use crate::error::{AppError, AppResult};
use crate::hub::{FailureNotice, SnapshotHub, SnapshotStream, StateUpdate};

struct Pending {
    generation: u64,
    request: StateRequest,
}

#[derive(Default)]
struct QueueState {
    pending: Option<Pending>,
    in_flight: Option<u64>,
    /// Generation of the newest submission (or initialize).
    latest_generation: u64,
    session_open: bool,
    shutdown: bool,
}

impl QueueState {
    fn is_busy(&self) -> bool {
        self.pending.is_some() || self.in_flight.is_some()
    }

    fn bump_generation(&mut self) -> u64 {
        self.latest_generation += 1;
        self.latest_generation
    }
}

struct Shared {
    engine: Mutex<SessionEngine>,
    queue: Mutex<QueueState>,
    queue_changed: Condvar,
    hub: SnapshotHub,
}

pub struct StateService {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl StateService {
    /// Start the worker thread. No session is open until `initialize`.
    pub fn new(source: Arc<dyn DataSource>, config: ServiceConfig) -> AppResult<Self> {
        config.validate()?;
        let shared = Arc::new(Shared {
            engine: Mutex::new(SessionEngine::new(source, config)),
            queue: Mutex::new(QueueState::default()),
            queue_changed: Condvar::new(),
            hub: SnapshotHub::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("ssv-state-worker".to_string())
            .spawn(move || worker_loop(&worker_shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    /// Open a session for `job_id` and return a stream starting at its bootstrap snapshot.
    ///
    /// Any pending request is discarded and an in-flight one will not be
    /// published. Runs on the caller's thread.
    pub fn initialize(&self, job_id: JobId) -> AppResult<SnapshotStream> {
        {
            let mut queue = self.shared.queue.lock();
            if let Some(dropped) = queue.pending.take() {
                debug!(generation = dropped.generation, "discarding pending request");
            }
            queue.bump_generation();
            queue.session_open = false;
        }

        let snapshot = self.shared.engine.lock().bootstrap(job_id)?;

        {
            let mut queue = self.shared.queue.lock();
            queue.session_open = true;
            self.shared
                .hub
                .publish(StateUpdate::Snapshot(Arc::new(snapshot)));
        }
        Ok(self.shared.hub.subscribe())
    }

    pub fn subscribe(&self) -> SnapshotStream {
        self.shared.hub.subscribe()
    }

    pub fn latest_snapshot(&self) -> Option<Arc<StateSnapshot>> {
        self.shared.hub.latest_snapshot()
    }

    /// Queue `request`, replacing any request that has not started yet.
    ///
    /// Never blocks on network work.
    pub fn submit(&self, request: StateRequest) {
        let mut queue = self.shared.queue.lock();
        if queue.shutdown {
            return;
        }
        if !queue.session_open {
            warn!("no open session, request dropped");
            return;
        }
        let generation = queue.bump_generation();
        if let Some(replaced) = queue.pending.replace(Pending {
            generation,
            request,
        }) {
            debug!(
                replaced = replaced.generation,
                generation, "pending request superseded"
            );
        }
        self.shared.queue_changed.notify_all();
    }

    /// Block until nothing is pending or in flight.
    pub fn wait_idle(&self) {
        let mut queue = self.shared.queue.lock();
        while queue.is_busy() {
            self.shared.queue_changed.wait(&mut queue);
        }
    }

    /// Like `wait_idle`, giving up after `timeout`. Returns whether the queue drained.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut queue = self.shared.queue.lock();
        while queue.is_busy() {
            if self
                .shared
                .queue_changed
                .wait_until(&mut queue, deadline)
                .timed_out()
            {
                return !queue.is_busy();
            }
        }
        true
    }
}

impl Drop for StateService {
    fn drop(&mut self) {
        self.shared.queue.lock().shutdown = true;
        self.shared.queue_changed.notify_all();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("state worker panicked");
        }
    }
}

fn worker_loop(shared: &Shared) {
    while let Some(pending) = next_request(shared) {
        let result = {
            let mut engine = shared.engine.lock();
            // a newer submission or an initialize may have landed while we waited
            if shared.queue.lock().latest_generation != pending.generation {
                None
            } else {
                Some(engine.process(&pending.request))
            }
        };
        finish(shared, pending.generation, result);
    }
    debug!("state worker stopped");
}

fn next_request(shared: &Shared) -> Option<Pending> {
    let mut queue = shared.queue.lock();
    loop {
        if queue.shutdown {
            return None;
        }
        if let Some(pending) = queue.pending.take() {
            queue.in_flight = Some(pending.generation);
            return Some(pending);
        }
        shared.queue_changed.wait(&mut queue);
    }
}

fn finish(shared: &Shared, generation: u64, result: Option<AppResult<EngineOutcome>>) {
    let mut queue = shared.queue.lock();
    let current = queue.latest_generation == generation;
    match result {
        None => debug!(generation, "request superseded before it started"),
        Some(Ok(EngineOutcome::Snapshot(snapshot))) if current => {
            info!(
                generation,
                samples = snapshot.ordered_sample_names().len(),
                "publishing snapshot"
            );
            shared
                .hub
                .publish(StateUpdate::Snapshot(Arc::new(snapshot)));
        }
        Some(Ok(EngineOutcome::Snapshot(_))) => {
            debug!(generation, "newer request waiting, stale snapshot dropped");
        }
        Some(Ok(EngineOutcome::Ended)) => {
            queue.session_open = false;
            if let Some(dropped) = queue.pending.take() {
                warn!(
                    generation = dropped.generation,
                    "request submitted after end of session dropped"
                );
            }
            shared.hub.publish(StateUpdate::Ended);
        }
        Some(Err(AppError::SessionEnded)) => {
            warn!(generation, "request submitted after end of session dropped");
        }
        Some(Err(e)) if !current => {
            debug!(generation, error = %e, "superseded request failed, not reported");
        }
        Some(Err(e)) => {
            error!(generation, error = %e, "request failed");
            shared.hub.publish(StateUpdate::Failed(FailureNotice {
                message: e.to_string(),
                unauthorized: e.is_unauthorized(),
            }));
        }
    }
    queue.in_flight = None;
    shared.queue_changed.notify_all();
}
