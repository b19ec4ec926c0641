//! `fetchq get <url>...` – fetch URLs through one dispatch queue and report each outcome.

use anyhow::{Context, Result};
use fetchq_core::config::FetchqConfig;
use fetchq_core::{DispatchQueue, FetchError, FetchRequest, Method};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use url::Url;

/// Request settings shared by every URL of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GetOptions {
    pub method: Method,
    pub referer: Option<Url>,
    pub timeout: Option<Duration>,
    pub attributes: Vec<(String, String)>,
    pub files: Vec<(String, PathBuf)>,
    pub json: bool,
}

impl GetOptions {
    pub fn parse(
        post: bool,
        referer: Option<&str>,
        timeout_secs: Option<u64>,
        attrs: &[String],
        files: &[String],
        json: bool,
    ) -> Result<Self> {
        let referer = referer
            .map(|r| Url::parse(r).with_context(|| format!("invalid referer: {}", r)))
            .transpose()?;
        let attributes = attrs
            .iter()
            .map(|a| {
                a.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .with_context(|| format!("attribute must be NAME=VALUE: {}", a))
            })
            .collect::<Result<Vec<_>>>()?;
        let files = files
            .iter()
            .map(|f| {
                f.split_once('=')
                    .map(|(k, v)| (k.to_string(), PathBuf::from(v)))
                    .with_context(|| format!("file must be NAME=PATH: {}", f))
            })
            .collect::<Result<Vec<_>>>()?;
        anyhow::ensure!(
            post || files.is_empty(),
            "--file needs --post (files are sent as multipart/form-data)"
        );
        Ok(Self {
            method: if post { Method::Post } else { Method::Get },
            referer,
            timeout: timeout_secs.map(Duration::from_secs),
            attributes,
            files,
            json,
        })
    }
}

/// Outcome of one URL, printed as text or JSON.
#[derive(Debug, Serialize)]
struct FetchReport {
    #[serde(skip)]
    index: usize,
    url: String,
    ok: bool,
    bytes: Option<usize>,
    error: Option<String>,
    elapsed_ms: u64,
}

impl FetchReport {
    fn new(index: usize, url: &Url, result: Result<Vec<u8>, FetchError>, elapsed: Duration) -> Self {
        let (bytes, error) = match result {
            Ok(body) => (Some(body.len()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            index,
            url: url.to_string(),
            ok: error.is_none(),
            bytes,
            error,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    fn text_line(&self) -> String {
        match (&self.bytes, &self.error) {
            (Some(bytes), _) => format!("OK    {}  {} bytes  {} ms", self.url, bytes, self.elapsed_ms),
            (None, Some(e)) => format!("FAIL  {}  {}  {} ms", self.url, e, self.elapsed_ms),
            (None, None) => format!("FAIL  {}", self.url),
        }
    }
}

pub async fn run_get(
    cfg: &FetchqConfig,
    workers: Option<usize>,
    urls: &[String],
    opts: &GetOptions,
) -> Result<()> {
    let targets = urls
        .iter()
        .map(|u| Url::parse(u).with_context(|| format!("invalid URL: {}", u)))
        .collect::<Result<Vec<_>>>()?;

    let mut cfg = cfg.clone();
    if workers.is_some() {
        cfg.pool_size = workers;
    }
    let queue = DispatchQueue::with_curl_workers(&cfg)?;
    tracing::info!(
        urls = targets.len(),
        pool_size = queue.pool_size(),
        "fetching"
    );

    let mut tasks = tokio::task::JoinSet::new();
    for (index, url) in targets.into_iter().enumerate() {
        let queue = queue.clone();
        let opts = opts.clone();
        tasks.spawn(async move {
            let started = Instant::now();
            let mut request = FetchRequest::new(&queue);
            request.set_method(opts.method);
            if let Some(timeout) = opts.timeout {
                request.set_timeout(timeout);
            }
            for (name, value) in &opts.attributes {
                request.add_attribute(name.as_str(), value.as_str());
            }
            for (name, path) in &opts.files {
                request.add_attribute_file(name.as_str(), path.as_path());
            }
            let result = request.load(url.clone(), opts.referer.clone()).await;
            FetchReport::new(index, &url, result, started.elapsed())
        });
    }

    let mut reports = Vec::with_capacity(urls.len());
    while let Some(res) = tasks.join_next().await {
        reports.push(res.map_err(|e| anyhow::anyhow!("fetch task join: {}", e))?);
    }
    reports.sort_by_key(|r| r.index);

    for report in &reports {
        if opts.json {
            println!("{}", serde_json::to_string(report)?);
        } else {
            println!("{}", report.text_line());
        }
    }

    let failed = reports.iter().filter(|r| !r.ok).count();
    if failed > 0 {
        anyhow::bail!("{} of {} fetches failed", failed, reports.len());
    }
    Ok(())
}
