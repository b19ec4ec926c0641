//! Notifications re-emitted by a request and the subscriber hub that fans them out.

use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use url::Url;

/// Notification delivered to the subscribers of a request. A dispatched,
/// uncanceled request sees zero or more progress events, exactly one
/// terminal event (`DownloadComplete`, `DownloadCompleteText` or `Error`)
/// and finally `Finished`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// Response body as raw bytes.
    DownloadComplete { data: Vec<u8>, url: Url },
    /// Response body decoded as text.
    DownloadCompleteText { text: String, url: Url },
    /// Upload progress in percent.
    UploadProgress { percent: u8, url: Url },
    /// Download progress in percent.
    DownloadProgress { percent: u8, url: Url },
    /// Transport error, verbatim from the worker. `details` carries the
    /// low-level cause (curl error code, server status line) when known.
    Error {
        message: String,
        details: Option<String>,
        url: Url,
    },
    /// Last event of an assignment.
    Finished,
}

impl FetchEvent {
    /// True for the success-or-error outcome of a fetch.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FetchEvent::DownloadComplete { .. }
                | FetchEvent::DownloadCompleteText { .. }
                | FetchEvent::Error { .. }
        )
    }

    /// Short name of the notification kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchEvent::DownloadComplete { .. } => "download_complete",
            FetchEvent::DownloadCompleteText { .. } => "download_complete_text",
            FetchEvent::UploadProgress { .. } => "upload_progress",
            FetchEvent::DownloadProgress { .. } => "download_progress",
            FetchEvent::Error { .. } => "error",
            FetchEvent::Finished => "finished",
        }
    }
}

/// Subscriber list of one request handle. Shared by every descriptor the
/// handle builds, so subscriptions survive reloads.
#[derive(Debug, Default)]
pub(crate) struct EventHub {
    listeners: Mutex<Vec<mpsc::UnboundedSender<FetchEvent>>>,
    last_error: Mutex<Option<LastError>>,
}

#[derive(Debug, Clone)]
struct LastError {
    message: String,
    details: Option<String>,
}

impl EventHub {
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<FetchEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Non-blocking fan-out; subscribers whose receiver is gone are dropped.
    pub(crate) fn deliver(&self, event: &FetchEvent) {
        if let FetchEvent::Error { message, details, .. } = event {
            *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(LastError {
                message: message.clone(),
                details: details.clone(),
            });
        }
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|e| e.message.clone())
    }

    pub(crate) fn last_error_details(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(|e| e.details.clone())
    }

    pub(crate) fn clear_error(&self) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    #[cfg(test)]
    pub(crate) fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
