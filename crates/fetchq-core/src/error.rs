//! Transport error type reported by fetch workers and the request helpers.

use thiserror::Error;

/// Failure of a single fetch. Workers report it through the `Error`
/// notification as its `Display` text plus `details()`; the blocking and
/// async load helpers return it directly.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, DNS, TLS, ...).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Multipart body could not be assembled.
    #[error("{0}")]
    Form(#[from] curl::FormError),
    /// Server answered with a non-2xx status. `status_line` is the final
    /// response's status line when one was received.
    #[error("HTTP {code}")]
    Http { code: u32, status_line: Option<String> },
    /// Target or referer could not be parsed.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Transfer was stopped through `abort()`.
    #[error("fetch aborted")]
    Aborted,
    /// Request was canceled before it produced a result.
    #[error("request canceled")]
    Canceled,
    /// Fetch finished without a success or error notification.
    #[error("fetch finished without a result")]
    NoResult,
    /// Error notification relayed from the worker.
    #[error("{0}")]
    Transport(String),
}

impl FetchError {
    /// Low-level description behind the message: libcurl error code and
    /// text, or the server's status line.
    pub fn details(&self) -> Option<String> {
        match self {
            FetchError::Curl(e) => Some(match e.extra_description() {
                Some(extra) => format!("curl error {}: {}; {}", e.code(), e.description(), extra),
                None => format!("curl error {}: {}", e.code(), e.description()),
            }),
            FetchError::Form(e) => Some(format!("curl form error {}: {}", e.code(), e.description())),
            FetchError::Http { status_line, .. } => status_line.clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_displays_code_and_details_status_line() {
        let err = FetchError::Http {
            code: 404,
            status_line: Some("HTTP/1.1 404 Not Found".into()),
        };
        assert_eq!(err.to_string(), "HTTP 404");
        assert_eq!(err.details().as_deref(), Some("HTTP/1.1 404 Not Found"));
    }

    #[test]
    fn curl_error_details_carry_the_code() {
        let err = FetchError::Curl(curl::Error::new(7));
        let details = err.details().unwrap();
        assert!(details.starts_with("curl error 7: "), "got {:?}", details);
    }

    #[test]
    fn plain_errors_have_no_details() {
        assert!(FetchError::Aborted.details().is_none());
        assert!(FetchError::Transport("x".into()).details().is_none());
    }
}
