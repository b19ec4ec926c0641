//! One HTTP transfer with libcurl: request setup, body capture, progress,
//! cookies and abort.

use curl::easy::Form;
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

use crate::error::FetchError;
use crate::request::{CookieJar, FetchEvent, Method, RequestParams};

use super::curl_worker::TransportOptions;

/// Response body plus the content type of the final response.
#[derive(Debug)]
pub(super) struct Body {
    pub(super) data: Vec<u8>,
    pub(super) content_type: Option<String>,
}

impl Body {
    /// Terminal notification for this body: text when the content type is
    /// textual and the bytes are valid UTF-8, raw bytes otherwise.
    pub(super) fn into_event(self, url: Url) -> FetchEvent {
        if self.content_type.as_deref().is_some_and(is_textual) {
            match String::from_utf8(self.data) {
                Ok(text) => FetchEvent::DownloadCompleteText { text, url },
                Err(e) => FetchEvent::DownloadComplete {
                    data: e.into_bytes(),
                    url,
                },
            }
        } else {
            FetchEvent::DownloadComplete {
                data: self.data,
                url,
            }
        }
    }
}

/// True for `text/*` and the JSON / XML / form families.
pub(super) fn is_textual(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime.starts_with("text/")
        || mime == "application/json"
        || mime == "application/xml"
        || mime == "application/javascript"
        || mime == "application/x-www-form-urlencoded"
        || mime.ends_with("+json")
        || mime.ends_with("+xml")
}

/// Value of header `name` in a raw header line, case-insensitive.
fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let (k, v) = line.split_once(':')?;
    if k.trim().eq_ignore_ascii_case(name) {
        Some(v.trim())
    } else {
        None
    }
}

/// What the transfer keeps from the response headers.
///
/// Every status line (redirect, `100 Continue`, final) starts a new header
/// block and resets the status and content type. `Set-Cookie` lines go to
/// the jar as they arrive, so cookies from intermediate responses are kept.
#[derive(Debug, Default)]
pub(super) struct ResponseHead {
    pub(super) status_line: Option<String>,
    pub(super) content_type: Option<String>,
}

impl ResponseHead {
    pub(super) fn push_line(&mut self, line: &str, jar: Option<&CookieJar>) {
        if line.starts_with("HTTP/") {
            self.status_line = Some(line.to_string());
            self.content_type = None;
        } else if let Some(v) = header_value(line, "content-type") {
            self.content_type = Some(v.to_string());
        } else if let Some(v) = header_value(line, "set-cookie") {
            if let Some(jar) = jar {
                jar.store_set_cookie(v);
            }
        }
    }
}

/// Converts curl's byte counters to percent; None while the total is unknown.
fn percent(now: f64, total: f64) -> Option<u8> {
    if total <= 0.0 {
        return None;
    }
    Some(((now / total) * 100.0).clamp(0.0, 100.0) as u8)
}

/// Remembers the last reported percentages so each value is emitted once.
#[derive(Debug, Default)]
pub(super) struct ProgressTracker {
    download: Option<u8>,
    upload: Option<u8>,
}

impl ProgressTracker {
    /// Returns (download, upload) percentages that changed since the last call.
    pub(super) fn update(
        &mut self,
        dltotal: f64,
        dlnow: f64,
        ultotal: f64,
        ulnow: f64,
    ) -> (Option<u8>, Option<u8>) {
        let download = percent(dlnow, dltotal).filter(|p| self.download != Some(*p));
        if download.is_some() {
            self.download = download;
        }
        let upload = percent(ulnow, ultotal).filter(|p| self.upload != Some(*p));
        if upload.is_some() {
            self.upload = upload;
        }
        (download, upload)
    }
}

/// Performs the fetch described by `params`. Progress notifications are
/// passed to `on_progress`; the terminal outcome is returned. When `abort`
/// is raised the transfer stops at the next progress callback and
/// `FetchError::Aborted` is returned.
pub(super) fn perform<F>(
    options: &TransportOptions,
    params: &RequestParams,
    abort: &AtomicBool,
    mut on_progress: F,
) -> Result<Body, FetchError>
where
    F: FnMut(FetchEvent),
{
    let mut easy = curl::easy::Easy::new();
    easy.url(params.effective_url().as_str())?;
    easy.useragent(&options.user_agent)?;
    easy.follow_location(options.follow_redirects)?;
    if options.follow_redirects {
        easy.max_redirections(options.max_redirects)?;
    }
    easy.connect_timeout(options.connect_timeout)?;
    if !params.timeout.is_zero() {
        easy.timeout(params.timeout)?;
    }
    if let Some(referer) = &params.referer {
        easy.referer(referer.as_str())?;
    }
    if let Some(jar) = &params.cookie_jar {
        if let Some(cookie) = jar.header_value() {
            easy.cookie(&cookie)?;
        }
        // In-memory cookie engine: cookies set by a redirect are sent on the next hop.
        easy.cookie_file("")?;
    }
    match params.method {
        Method::Get => easy.get(true)?,
        Method::Post if params.is_multipart() => easy.httppost(multipart_form(params)?)?,
        Method::Post => {
            easy.post(true)?;
            let body = params.form_body().unwrap_or_default();
            easy.post_fields_copy(body.as_bytes())?;
        }
    }
    easy.progress(true)?;

    let url = params.url.clone();
    let mut data: Vec<u8> = Vec::new();
    let mut response = ResponseHead::default();
    let mut tracker = ProgressTracker::default();

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Ok(s) = str::from_utf8(line) {
                response.push_line(s.trim_end(), params.cookie_jar.as_ref());
            }
            true
        })?;
        transfer.write_function(|chunk| {
            data.extend_from_slice(chunk);
            Ok(chunk.len())
        })?;
        transfer.progress_function(|dltotal, dlnow, ultotal, ulnow| {
            if abort.load(Ordering::Relaxed) {
                return false;
            }
            let (download, upload) = tracker.update(dltotal, dlnow, ultotal, ulnow);
            if let Some(percent) = upload {
                on_progress(FetchEvent::UploadProgress {
                    percent,
                    url: url.clone(),
                });
            }
            if let Some(percent) = download {
                on_progress(FetchEvent::DownloadProgress {
                    percent,
                    url: url.clone(),
                });
            }
            true
        })?;
        let result = transfer.perform();
        if abort.load(Ordering::Relaxed) {
            return Err(FetchError::Aborted);
        }
        result?;
    }

    // file:// and similar schemes report 0.
    let code = easy.response_code()?;
    if code != 0 && !(200..300).contains(&code) {
        return Err(FetchError::Http {
            code,
            status_line: response.status_line,
        });
    }

    Ok(Body {
        data,
        content_type: response.content_type,
    })
}

/// Multipart body: attributes as text parts, then one part per file.
fn multipart_form(params: &RequestParams) -> Result<Form, FetchError> {
    let mut form = Form::new();
    for (name, value) in &params.attributes {
        form.part(name).contents(value.as_bytes()).add()?;
    }
    for (name, path) in &params.files {
        form.part(name).file(path).add()?;
    }
    Ok(form)
}
