//! Shared cookie store handed to workers through `RequestParams`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Name → value cookie store shared between requests (clones share storage).
/// Workers send its contents as the `Cookie` header and store every
/// `Set-Cookie` of the response back into it.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    inner: Arc<Mutex<BTreeMap<String, String>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.lock().remove(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Value for a `Cookie` request header, or None when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        let cookies = self.lock();
        if cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = cookies.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        Some(pairs.join("; "))
    }

    /// Stores the cookie from a `Set-Cookie` header value. Attributes after the
    /// first `;` are ignored except `Max-Age=0`, which deletes the cookie.
    pub fn store_set_cookie(&self, header_value: &str) {
        let mut parts = header_value.split(';');
        let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let expired = parts.any(|attr| {
            attr.split_once('=')
                .map(|(k, v)| k.trim().eq_ignore_ascii_case("max-age") && v.trim() == "0")
                .unwrap_or(false)
        });
        if expired {
            self.remove(name);
        } else {
            self.set(name, value.trim());
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
