//! Scripted worker for tests: records every call and hands the sink to the
//! test, which then emits notifications explicitly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::queue::{DispatchQueue, EventSink};
use crate::request::{FetchEvent, RequestParams};

use super::FetchWorker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Configure(usize, Url),
    Start(usize, Url),
    Abort(usize),
}

#[derive(Debug, Default)]
pub(crate) struct Recorder {
    calls: Mutex<Vec<Call>>,
    sinks: Mutex<HashMap<usize, EventSink>>,
    params: Mutex<HashMap<usize, RequestParams>>,
}

impl Recorder {
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// URLs in the order their fetches were started.
    pub(crate) fn started(&self) -> Vec<Url> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Start(_, url) => Some(url),
                _ => None,
            })
            .collect()
    }

    /// Worker currently (or last) serving `url`.
    pub(crate) fn worker_for(&self, url: &Url) -> usize {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                Call::Start(w, u) if &u == url => Some(w),
                _ => None,
            })
            .expect("url was never started")
    }

    pub(crate) fn aborts(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Abort(w) => Some(w),
                _ => None,
            })
            .collect()
    }

    /// Sink of the latest assignment of `worker`.
    pub(crate) fn sink(&self, worker: usize) -> EventSink {
        self.sinks.lock().unwrap().get(&worker).cloned().expect("worker never started")
    }

    pub(crate) fn params(&self, worker: usize) -> RequestParams {
        self.params.lock().unwrap().get(&worker).cloned().expect("worker never configured")
    }

    /// Emits a text completion followed by `Finished` from `worker`.
    pub(crate) fn complete(&self, worker: usize, text: &str) {
        let sink = self.sink(worker);
        let url = self.params(worker).url;
        sink.emit(FetchEvent::DownloadCompleteText {
            text: text.to_string(),
            url,
        });
        sink.emit(FetchEvent::Finished);
    }
}

pub(crate) struct ScriptedWorker {
    index: usize,
    recorder: Arc<Recorder>,
    url: Option<Url>,
}

impl FetchWorker for ScriptedWorker {
    fn configure(&mut self, params: &RequestParams) {
        self.url = Some(params.url.clone());
        self.recorder.calls.lock().unwrap().push(Call::Configure(self.index, params.url.clone()));
        self.recorder.params.lock().unwrap().insert(self.index, params.clone());
    }

    fn start(&mut self, sink: EventSink) {
        let url = self.url.clone().expect("start before configure");
        self.recorder.calls.lock().unwrap().push(Call::Start(self.index, url));
        self.recorder.sinks.lock().unwrap().insert(self.index, sink);
    }

    fn abort(&mut self) {
        self.recorder.calls.lock().unwrap().push(Call::Abort(self.index));
    }
}

/// Queue over `n` scripted workers plus the recorder observing them.
pub(crate) fn scripted_queue(n: usize) -> (DispatchQueue, Arc<Recorder>) {
    scripted_queue_with_timeout(n, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

pub(crate) fn scripted_queue_with_timeout(
    n: usize,
    default_timeout: Duration,
) -> (DispatchQueue, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let workers = (0..n)
        .map(|index| {
            Box::new(ScriptedWorker {
                index,
                recorder: Arc::clone(&recorder),
                url: None,
            }) as Box<dyn FetchWorker>
        })
        .collect();
    (
        DispatchQueue::with_default_timeout(workers, default_timeout).unwrap(),
        recorder,
    )
}

pub(crate) fn url(path: &str) -> Url {
    Url::parse(&format!("http://example.com/{}", path)).unwrap()
}

/// Everything currently buffered on a subscriber.
pub(crate) fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<FetchEvent>) -> Vec<FetchEvent> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}
