pub mod config;
pub mod logging;

pub mod error;
pub mod queue;
pub mod request;
pub mod worker;

pub use error::FetchError;
pub use queue::{DispatchQueue, QueueSnapshot};
pub use request::{CookieJar, Descriptor, FetchEvent, FetchRequest, Method, RequestId, RequestParams};
pub use worker::{default_pool_size, CurlWorker, EventSink, FetchWorker, WorkerId};
