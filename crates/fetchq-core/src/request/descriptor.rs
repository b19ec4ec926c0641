//! Request descriptor: the immutable unit of work tracked by the dispatch queue.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

use super::cookies::CookieJar;
use super::events::{EventHub, FetchEvent};

/// Identity of one enqueued descriptor. Allocated per descriptor, so two
/// loads of the same URL are distinct requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl RequestId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RequestId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// HTTP method used by a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

/// Everything a worker needs to perform one fetch.
#[derive(Debug, Clone)]
pub struct RequestParams {
    pub url: Url,
    pub referer: Option<Url>,
    pub method: Method,
    pub cookie_jar: Option<CookieJar>,
    /// Whole-transfer limit; zero means no limit.
    pub timeout: Duration,
    /// Form attributes: query pairs for GET, urlencoded body for POST.
    pub attributes: Vec<(String, String)>,
    /// Files uploaded as `name` parts of a multipart POST. Ignored for GET.
    pub files: Vec<(String, PathBuf)>,
}

impl RequestParams {
    /// Plain GET without referer, cookies, attributes or timeout.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            referer: None,
            method: Method::Get,
            cookie_jar: None,
            timeout: Duration::ZERO,
            attributes: Vec::new(),
            files: Vec::new(),
        }
    }

    /// URL actually requested: GET attributes are appended to the query string.
    pub fn effective_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.method == Method::Get && !self.attributes.is_empty() {
            url.query_pairs_mut().extend_pairs(self.attributes.iter());
        }
        url
    }

    /// True when the POST body must be `multipart/form-data`.
    pub fn is_multipart(&self) -> bool {
        self.method == Method::Post && !self.files.is_empty()
    }

    /// `application/x-www-form-urlencoded` body for POST, None for GET and
    /// for multipart POSTs.
    pub fn form_body(&self) -> Option<String> {
        if self.is_multipart() {
            return None;
        }
        match self.method {
            Method::Get => None,
            Method::Post => Some(
                url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(self.attributes.iter())
                    .finish(),
            ),
        }
    }
}

/// A request as seen by the dispatch queue. Parameters are frozen at
/// construction; notifications go to the subscribers of its hub.
#[derive(Debug)]
pub struct Descriptor {
    id: RequestId,
    params: RequestParams,
    hub: Arc<EventHub>,
}

impl Descriptor {
    /// Descriptor with its own subscriber hub.
    pub fn new(params: RequestParams) -> Arc<Self> {
        Self::with_hub(params, Arc::new(EventHub::default()))
    }

    pub(crate) fn with_hub(params: RequestParams, hub: Arc<EventHub>) -> Arc<Self> {
        Arc::new(Self {
            id: RequestId::next(),
            params,
            hub,
        })
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn params(&self) -> &RequestParams {
        &self.params
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<FetchEvent> {
        self.hub.subscribe()
    }

    pub(crate) fn deliver(&self, event: &FetchEvent) {
        self.hub.deliver(event);
    }
}
