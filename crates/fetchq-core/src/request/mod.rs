//! User-facing request handle.
//!
//! A `FetchRequest` owns the request parameters and re-exposes the
//! notifications of whichever worker ends up serving it. Each load builds a
//! fresh `Descriptor` (new identity, frozen parameters) and enqueues it on
//! the dispatch queue; `stop()` and `Drop` cancel it.

mod cookies;
mod descriptor;
mod events;

pub use cookies::CookieJar;
pub use descriptor::{Descriptor, Method, RequestId, RequestParams};
pub use events::FetchEvent;

pub(crate) use events::EventHub;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use crate::error::FetchError;
use crate::queue::DispatchQueue;

pub struct FetchRequest {
    queue: DispatchQueue,
    hub: Arc<EventHub>,
    cookie_jar: Option<CookieJar>,
    method: Method,
    timeout: Duration,
    attributes: Vec<(String, String)>,
    files: Vec<(String, PathBuf)>,
    current: Option<RequestId>,
    url: Option<Url>,
}

impl FetchRequest {
    /// New idle handle bound to `queue`, using the queue's default timeout.
    /// Nothing is enqueued until a load call.
    pub fn new(queue: &DispatchQueue) -> Self {
        Self {
            queue: queue.clone(),
            hub: Arc::new(EventHub::default()),
            cookie_jar: None,
            method: Method::Get,
            timeout: queue.default_timeout(),
            attributes: Vec::new(),
            files: Vec::new(),
            current: None,
            url: None,
        }
    }

    pub fn set_cookie_jar(&mut self, jar: CookieJar) {
        self.cookie_jar = Some(jar);
    }

    pub fn cookie_jar(&self) -> Option<&CookieJar> {
        self.cookie_jar.as_ref()
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Drops every attribute and file added so far.
    pub fn clear_attributes(&mut self) {
        self.attributes.clear();
        self.files.clear();
    }

    pub fn add_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.push((name.into(), value.into()));
    }

    /// Adds a file part. A POST carrying files is sent as `multipart/form-data`;
    /// GET loads ignore files. The file is read when the fetch runs.
    pub fn add_attribute_file(&mut self, name: impl Into<String>, path: impl Into<PathBuf>) {
        self.files.push((name.into(), path.into()));
    }

    /// Receiver for every notification of this handle, across reloads.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<FetchEvent> {
        self.hub.subscribe()
    }

    /// URL of the most recent load.
    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Message of the last `Error` notification, cleared by each load.
    pub fn last_error(&self) -> Option<String> {
        self.hub.last_error()
    }

    /// Low-level cause of the last error (curl error code and text, or the
    /// server's status line), cleared by each load.
    pub fn last_error_details(&self) -> Option<String> {
        self.hub.last_error_details()
    }

    /// Id of the descriptor built by the most recent load.
    pub fn current_id(&self) -> Option<RequestId> {
        self.current
    }

    /// Stops any previous load and enqueues a new one. Returns immediately;
    /// results arrive on the subscribers.
    pub fn load_async(&mut self, url: Url, referer: Option<Url>) -> RequestId {
        self.stop();
        self.hub.clear_error();
        let params = RequestParams {
            url: url.clone(),
            referer,
            method: self.method,
            cookie_jar: self.cookie_jar.clone(),
            timeout: self.timeout,
            attributes: self.attributes.clone(),
            files: self.files.clone(),
        };
        let descriptor = Descriptor::with_hub(params, Arc::clone(&self.hub));
        let id = descriptor.id();
        self.current = Some(id);
        self.url = Some(url);
        self.queue.enqueue(descriptor);
        id
    }

    /// Loads and waits for the outcome without blocking the async runtime.
    pub async fn load(&mut self, url: Url, referer: Option<Url>) -> Result<Vec<u8>, FetchError> {
        self.stop();
        let mut rx = self.hub.subscribe();
        self.load_async(url, referer);
        let mut outcome = Outcome::default();
        while let Some(event) = rx.recv().await {
            if outcome.push(event) {
                return outcome.finish();
            }
        }
        Err(FetchError::Canceled)
    }

    /// Loads and blocks the calling thread until the outcome is known.
    /// Must not be called from within an async runtime.
    pub fn load_sync(&mut self, url: Url, referer: Option<Url>) -> Result<Vec<u8>, FetchError> {
        self.stop();
        let mut rx = self.hub.subscribe();
        self.load_async(url, referer);
        let mut outcome = Outcome::default();
        while let Some(event) = rx.blocking_recv() {
            if outcome.push(event) {
                return outcome.finish();
            }
        }
        Err(FetchError::Canceled)
    }

    /// Cancels the current load, whether still queued or in flight.
    pub fn stop(&mut self) {
        if let Some(id) = self.current.take() {
            self.queue.cancel(id);
        }
    }
}

impl Drop for FetchRequest {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Folds the notifications of one load into its result.
#[derive(Debug, Default)]
struct Outcome {
    data: Option<Vec<u8>>,
    error: Option<String>,
}

impl Outcome {
    /// Returns true once `Finished` has been seen.
    fn push(&mut self, event: FetchEvent) -> bool {
        match event {
            FetchEvent::DownloadComplete { data, .. } => self.data = Some(data),
            FetchEvent::DownloadCompleteText { text, .. } => self.data = Some(text.into_bytes()),
            FetchEvent::Error { message, .. } => self.error = Some(message),
            FetchEvent::UploadProgress { .. } | FetchEvent::DownloadProgress { .. } => {}
            FetchEvent::Finished => return true,
        }
        false
    }

    fn finish(self) -> Result<Vec<u8>, FetchError> {
        match (self.data, self.error) {
            (_, Some(message)) => Err(FetchError::Transport(message)),
            (Some(data), None) => Ok(data),
            (None, None) => Err(FetchError::NoResult),
        }
    }
}
