//! Dispatch queue: at most `pool_size` concurrent fetches over an unbounded FIFO.
//!
//! The queue owns a fixed pool of fetch workers. A request enqueued while a
//! worker is idle is dispatched at once; otherwise it waits in FIFO order
//! until a worker reports `Finished`, at which point that worker is handed
//! the oldest waiting request before it goes back to the idle pool.
//!
//! All state lives behind one mutex. Worker notifications are relayed under
//! that same lock and only reach a request while its assignment is bound, so
//! once `cancel` returns the request sees nothing more. A canceled worker
//! stays busy until its own `Finished` arrives.
//!
//! The queue is an explicitly constructed value; clones share the same pool.

mod sink;
mod state;


pub use sink::EventSink;

use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::{FetchqConfig, DEFAULT_TIMEOUT_SECS};
use crate::request::{Descriptor, FetchEvent, RequestId};
use crate::worker::{CurlWorker, FetchWorker, TransportOptions, WorkerId};

use sink::Ticket;
use state::DispatchState;

/// Point-in-time view of the queue, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub pool_size: usize,
    /// Waiting requests, next to be served first.
    pub pending: Vec<RequestId>,
    /// Workers with no assignment.
    pub idle: usize,
    /// Bound (worker, request) pairs, ordered by worker.
    pub assigned: Vec<(WorkerId, RequestId)>,
    /// Workers whose request was canceled and that have not finished yet.
    pub detached: usize,
}

pub(crate) struct QueueShared {
    state: Mutex<DispatchState>,
    /// Timeout handed to new request handles; immutable, so kept outside the lock.
    default_timeout: Duration,
}

impl QueueShared {
    fn lock(&self) -> MutexGuard<'_, DispatchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn relay(self: &Arc<Self>, worker: WorkerId, ticket: Ticket, event: FetchEvent) {
        let weak = Arc::downgrade(self);
        self.lock().relay(worker, ticket, event, &weak);
    }
}

#[derive(Clone)]
pub struct DispatchQueue {
    shared: Arc<QueueShared>,
}

impl DispatchQueue {
    /// Builds a queue over a fixed worker pool. The pool must not be empty.
    /// New requests default to a `DEFAULT_TIMEOUT_SECS` timeout.
    pub fn new(workers: Vec<Box<dyn FetchWorker>>) -> Result<Self> {
        Self::with_default_timeout(workers, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Like `new`, with the timeout new request handles start from.
    pub fn with_default_timeout(
        workers: Vec<Box<dyn FetchWorker>>,
        default_timeout: Duration,
    ) -> Result<Self> {
        anyhow::ensure!(!workers.is_empty(), "dispatch queue needs at least one worker");
        tracing::debug!(pool_size = workers.len(), ?default_timeout, "dispatch queue created");
        Ok(Self {
            shared: Arc::new(QueueShared {
                state: Mutex::new(DispatchState::new(workers)),
                default_timeout,
            }),
        })
    }

    /// Builds a queue of `CurlWorker`s sized by `cfg.effective_pool_size()`;
    /// new requests default to `cfg.timeout()`.
    pub fn with_curl_workers(cfg: &FetchqConfig) -> Result<Self> {
        let options = TransportOptions::from_config(cfg);
        let workers = (0..cfg.effective_pool_size())
            .map(|i| {
                CurlWorker::spawn(i, options.clone()).map(|w| Box::new(w) as Box<dyn FetchWorker>)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::with_default_timeout(workers, cfg.timeout())
    }

    pub fn pool_size(&self) -> usize {
        self.shared.lock().pool_size()
    }

    /// Timeout new `FetchRequest` handles on this queue start with.
    pub fn default_timeout(&self) -> Duration {
        self.shared.default_timeout
    }

    /// Queues `request`, dispatching it immediately when a worker is idle.
    /// Enqueueing a request that is already queued or in flight is ignored.
    pub fn enqueue(&self, request: Arc<Descriptor>) {
        let weak = Arc::downgrade(&self.shared);
        self.shared.lock().enqueue(request, &weak);
    }

    /// Cancels `id`. A queued request is removed and never notified; an
    /// in-flight one is unbound from its worker and the worker is asked to
    /// abort. Unknown or already finished ids are ignored. Returns whether
    /// the request was still tracked.
    pub fn cancel(&self, id: RequestId) -> bool {
        self.shared.lock().cancel(id)
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.shared.lock().snapshot()
    }
}
