//! Production fetch worker: a long-lived OS thread performing transfers with libcurl.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::config::FetchqConfig;
use crate::error::FetchError;
use crate::queue::EventSink;
use crate::request::{FetchEvent, RequestParams};

use super::transfer;
use super::FetchWorker;

/// Transport settings shared by every worker of a pool.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub connect_timeout: Duration,
    pub follow_redirects: bool,
    pub max_redirects: u32,
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self::from_config(&FetchqConfig::default())
    }
}

impl TransportOptions {
    pub fn from_config(cfg: &FetchqConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            follow_redirects: cfg.follow_redirects,
            max_redirects: cfg.max_redirects,
            user_agent: cfg.user_agent.clone(),
        }
    }
}

/// One unit of work handed to the worker thread.
struct Job {
    params: Option<RequestParams>,
    sink: EventSink,
    abort: Arc<AtomicBool>,
}

/// Fetch worker backed by a dedicated thread. `start` hands the configured
/// request to the thread and returns; `abort` raises a flag the transfer
/// checks from its progress callback.
pub struct CurlWorker {
    name: String,
    params: Option<RequestParams>,
    abort: Arc<AtomicBool>,
    jobs: mpsc::Sender<Job>,
}

impl CurlWorker {
    /// Spawns the worker thread. The thread exits when the worker is dropped.
    pub fn spawn(index: usize, options: TransportOptions) -> Result<Self> {
        let name = format!("fetchq-worker-{}", index);
        let (jobs, rx) = mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                for job in rx {
                    run_job(&options, job);
                }
            })
            .with_context(|| format!("spawn {}", name))?;
        Ok(Self {
            name,
            params: None,
            abort: Arc::new(AtomicBool::new(false)),
            jobs,
        })
    }
}

impl FetchWorker for CurlWorker {
    fn configure(&mut self, params: &RequestParams) {
        self.params = Some(params.clone());
    }

    fn start(&mut self, sink: EventSink) {
        // Fresh flag per assignment so an earlier abort cannot hit this fetch.
        self.abort = Arc::new(AtomicBool::new(false));
        let job = Job {
            params: self.params.take(),
            sink,
            abort: Arc::clone(&self.abort),
        };
        if let Err(mpsc::SendError(job)) = self.jobs.send(job) {
            tracing::error!(worker = %self.name, "worker thread gone; failing assignment");
            // Emitting here would re-enter the queue lock.
            std::thread::spawn(move || {
                if let Some(params) = job.params {
                    job.sink.emit(FetchEvent::Error {
                        message: "fetch worker unavailable".to_string(),
                        details: None,
                        url: params.url,
                    });
                }
                job.sink.emit(FetchEvent::Finished);
            });
        }
    }

    fn abort(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
    }
}

impl Drop for CurlWorker {
    fn drop(&mut self) {
        self.abort.store(true, Ordering::Relaxed);
    }
}

fn run_job(options: &TransportOptions, job: Job) {
    let Job { params, sink, abort } = job;
    match params {
        Some(params) => {
            let url = params.url.clone();
            tracing::debug!(%url, method = ?params.method, "fetch started");
            match transfer::perform(options, &params, &abort, |event| sink.emit(event)) {
                Ok(body) => {
                    tracing::debug!(%url, bytes = body.data.len(), "fetch completed");
                    sink.emit(body.into_event(url));
                }
                Err(FetchError::Aborted) => {
                    tracing::debug!(%url, "fetch aborted");
                }
                Err(e) => {
                    tracing::debug!(%url, error = %e, "fetch failed");
                    sink.emit(FetchEvent::Error {
                        message: e.to_string(),
                        details: e.details(),
                        url,
                    });
                }
            }
        }
        None => {
            tracing::warn!("worker started without a configured request");
        }
    }
    sink.emit(FetchEvent::Finished);
}
