//! Page fetching — bounded-concurrency downloads with a per-fetch timeout.
//!
//! Every page gets its own slot in the output, in page order. A failed page is `None`;
//! failures never abort the batch.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Only connection-level failures are retried, and only once.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Connection-level failures may succeed on a second attempt. A timeout is final:
    /// the page is missing once `timeout` has elapsed, never later.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

/// Anything that can turn a page URL into raw image bytes.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Production page source backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpPageSource {
    client: Client,
    timeout: Duration,
}

impl HttpPageSource {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            timeout,
        })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                FetchError::Timeout(self.timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        };

        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response.bytes().await.map_err(classify)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Maximum number of fetches in flight at once.
    pub concurrency: usize,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_FETCH_CONCURRENCY,
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Fetches every URL concurrently (at most `options.concurrency` at a time) and waits
/// for all of them. Output slot `i` holds the bytes for `urls[i]`, or `None` when the
/// URL was absent or the fetch failed.
pub async fn fetch_all(
    source: &dyn PageSource,
    urls: Vec<Option<String>>,
    options: FetchOptions,
) -> Vec<Option<Bytes>> {
    stream::iter(urls)
        .map(|url| async move {
            let url = url?;
            match fetch_with_retry(source, &url, options).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!("Failed to fetch {url}: {e}");
                    None
                }
            }
        })
        .buffered(options.concurrency.max(1))
        .collect()
        .await
}

async fn fetch_with_retry(
    source: &dyn PageSource,
    url: &str,
    options: FetchOptions,
) -> Result<Bytes, FetchError> {
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(options.timeout, source.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(options.timeout)),
        };

        match result {
            Err(e) if e.is_transient() && attempt < options.max_retries => {
                attempt += 1;
                debug!("Retrying {url} after transient error: {e}");
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves fixed bodies; unknown URLs are 404s.
    struct StaticSource(HashMap<String, Bytes>);

    #[async_trait]
    impl PageSource for StaticSource {
        async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
            self.0.get(url).cloned().ok_or(FetchError::Status(404))
        }
    }

    fn urls(list: &[Option<&str>]) -> Vec<Option<String>> {
        list.iter().map(|u| u.map(String::from)).collect()
    }

    #[tokio::test]
    async fn test_fetch_all_keeps_slot_order() {
        let source = StaticSource(HashMap::from([
            ("a".to_string(), Bytes::from_static(b"A")),
            ("c".to_string(), Bytes::from_static(b"C")),
        ]));
        let out = fetch_all(
            &source,
            urls(&[Some("a"), None, Some("missing"), Some("c")]),
            FetchOptions::default(),
        )
        .await;
        assert_eq!(
            out,
            vec![
                Some(Bytes::from_static(b"A")),
                None,
                None,
                Some(Bytes::from_static(b"C")),
            ]
        );
    }

    struct SlowSource {
        slow_url: &'static str,
    }

    #[async_trait]
    impl PageSource for SlowSource {
        async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
            if url == self.slow_url {
                tokio::time::sleep(Duration::from_secs(120)).await;
            }
            Ok(Bytes::from(url.to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_fetch_degrades_to_none() {
        let source = SlowSource { slow_url: "slow" };
        let options = FetchOptions {
            timeout: Duration::from_secs(30),
            ..FetchOptions::default()
        };
        let out = fetch_all(&source, urls(&[Some("fast"), Some("slow")]), options).await;
        assert_eq!(out[0], Some(Bytes::from_static(b"fast")));
        assert_eq!(out[1], None);
    }

    struct HungSource {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for HungSource {
        async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Bytes::from_static(b"late"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_page_is_missing_after_one_timeout() {
        let source = HungSource {
            calls: AtomicU32::new(0),
        };
        let options = FetchOptions::default();
        let start = tokio::time::Instant::now();
        let out = fetch_all(&source, urls(&[Some("p1")]), options).await;

        assert_eq!(out, vec![None]);
        let elapsed = start.elapsed();
        assert!(elapsed >= options.timeout, "gave up early after {elapsed:?}");
        assert!(
            elapsed < options.timeout + Duration::from_secs(1),
            "hung page held the batch for {elapsed:?}"
        );
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    /// Fails with a network error on the first call per URL, then succeeds.
    struct FlakySource {
        calls: Mutex<HashMap<String, u32>>,
        status_error: bool,
    }

    #[async_trait]
    impl PageSource for FlakySource {
        async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(url.to_string()).or_insert(0);
            *n += 1;
            if *n == 1 {
                if self.status_error {
                    return Err(FetchError::Status(503));
                }
                return Err(FetchError::Network("connection reset".to_string()));
            }
            Ok(Bytes::from_static(b"ok"))
        }
    }

    #[tokio::test]
    async fn test_transient_error_is_retried_once() {
        let source = FlakySource {
            calls: Mutex::new(HashMap::new()),
            status_error: false,
        };
        let out = fetch_all(&source, urls(&[Some("p1")]), FetchOptions::default()).await;
        assert_eq!(out[0], Some(Bytes::from_static(b"ok")));
        assert_eq!(source.calls.lock().unwrap()["p1"], 2);
    }

    #[tokio::test]
    async fn test_status_error_is_not_retried() {
        let source = FlakySource {
            calls: Mutex::new(HashMap::new()),
            status_error: true,
        };
        let out = fetch_all(&source, urls(&[Some("p1")]), FetchOptions::default()).await;
        assert_eq!(out[0], None);
        assert_eq!(source.calls.lock().unwrap()["p1"], 1);
    }

    struct AlwaysDown {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PageSource for AlwaysDown {
        async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(FetchError::Network("unreachable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let source = AlwaysDown {
            calls: AtomicU32::new(0),
        };
        let out = fetch_all(&source, urls(&[Some("p1")]), FetchOptions::default()).await;
        assert_eq!(out[0], None);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1 + DEFAULT_MAX_RETRIES);
    }

    /// Records the peak number of concurrent fetches.
    struct CountingSource {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageSource for CountingSource {
        async fn fetch(&self, _url: &str) -> Result<Bytes, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"x"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_run_concurrently_within_limit() {
        let source = CountingSource {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        };
        let options = FetchOptions {
            concurrency: 3,
            ..FetchOptions::default()
        };
        let list: Vec<Option<String>> = (0..10).map(|i| Some(format!("p{i}"))).collect();
        let out = fetch_all(&source, list, options).await;

        assert!(out.iter().all(Option::is_some));
        let peak = source.peak.load(Ordering::SeqCst);
        assert!(peak > 1, "fetches should overlap, peak was {peak}");
        assert!(peak <= 3, "limit exceeded, peak was {peak}");
    }

    /// Serves `/page.jpg`, `/missing.jpg` (404) and `/slow.jpg` on an ephemeral port.
    async fn spawn_page_server() -> String {
        use axum::{http::StatusCode, routing::get, Router};

        let app = Router::new()
            .route("/page.jpg", get(|| async { &b"jpeg-bytes"[..] }))
            .route("/missing.jpg", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/slow.jpg",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(10)).await;
                    &b"late"[..]
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_http_source_returns_body_on_success() {
        let base = spawn_page_server().await;
        let source = HttpPageSource::new(Duration::from_secs(5)).unwrap();
        let bytes = source.fetch(&format!("{base}/page.jpg")).await.unwrap();
        assert_eq!(bytes, Bytes::from_static(b"jpeg-bytes"));
    }

    #[tokio::test]
    async fn test_http_source_maps_error_status() {
        let base = spawn_page_server().await;
        let source = HttpPageSource::new(Duration::from_secs(5)).unwrap();
        let err = source.fetch(&format!("{base}/missing.jpg")).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(404)), "got {err:?}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_http_source_maps_client_timeout() {
        let base = spawn_page_server().await;
        let timeout = Duration::from_millis(200);
        let source = HttpPageSource::new(timeout).unwrap();
        let err = source.fetch(&format!("{base}/slow.jpg")).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout(t) if t == timeout), "got {err:?}");
    }

    #[tokio::test]
    async fn test_http_source_pages_degrade_in_batch() {
        let base = spawn_page_server().await;
        let source = HttpPageSource::new(Duration::from_millis(200)).unwrap();
        let options = FetchOptions {
            timeout: Duration::from_millis(200),
            ..FetchOptions::default()
        };
        let list = vec![
            Some(format!("{base}/page.jpg")),
            Some(format!("{base}/missing.jpg")),
            Some(format!("{base}/slow.jpg")),
        ];
        let out = fetch_all(&source, list, options).await;
        assert_eq!(out, vec![Some(Bytes::from_static(b"jpeg-bytes")), None, None]);
    }

    #[test]
    fn test_transient_classification() {
        assert!(FetchError::Network("x".into()).is_transient());
        assert!(!FetchError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!FetchError::Status(500).is_transient());
    }
}
