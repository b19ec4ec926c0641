//! Fetch workers: the pooled units that perform one request at a time.
//!
//! The dispatch queue only talks to workers through the `FetchWorker`
//! trait. `CurlWorker` is the production implementation; tests plug in
//! scripted workers that emit notifications on demand.

mod curl_worker;
mod transfer;

#[cfg(test)]
pub(crate) mod scripted;

pub use curl_worker::{CurlWorker, TransportOptions};
pub use crate::queue::EventSink;

use std::fmt;

use crate::request::RequestParams;

/// Smallest pool the default sizing will produce.
pub const MIN_POOL_SIZE: usize = 4;

/// Index of a worker within its queue's fixed pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub(crate) usize);

impl WorkerId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// One concurrent fetch slot.
///
/// The queue calls these methods while holding its lock, so none of them may
/// block or emit through the sink synchronously. Per assignment the worker
/// must emit zero or more progress events, at most one terminal event, and
/// then exactly one `Finished`, also after `abort()`.
pub trait FetchWorker: Send {
    /// Prepares the next fetch (target, referer, method, cookies, timeout).
    fn configure(&mut self, params: &RequestParams);

    /// Starts the configured fetch in the background; notifications go to `sink`.
    fn start(&mut self, sink: EventSink);

    /// Asks the in-flight fetch to stop. `Finished` must still follow.
    fn abort(&mut self);
}

/// Default pool size: the host's available parallelism, at least `MIN_POOL_SIZE`.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .max(MIN_POOL_SIZE)
}
