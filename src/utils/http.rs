// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// Statuses worth another attempt.
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Anything that can turn a URL into a response body.
///
/// Adapters only talk to the network through this trait, so tests can
/// substitute canned pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and return the body as text. Non-success statuses are errors.
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

/// Whether a status should be retried.
pub fn is_retryable_status(status: StatusCode) -> bool {
    RETRYABLE_STATUSES.contains(&status.as_u16())
}

/// Only safe, idempotent reads are retried.
pub fn is_retryable_method(method: &Method) -> bool {
    *method == Method::GET || *method == Method::HEAD
}

/// Exponential backoff: `base * 2^attempt`.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// reqwest-backed fetcher with bounded retries.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retries: u32,
    backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self::with_client(
            create_async_client(config)?,
            config.retries,
            Duration::from_millis(config.backoff_ms),
        ))
    }

    pub fn with_client(client: reqwest::Client, retries: u32, backoff: Duration) -> Self {
        Self {
            client,
            retries,
            backoff,
        }
    }

    /// Send a request, retrying transient failures for GET/HEAD.
    pub async fn send(&self, method: Method, url: &str) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            let can_retry = is_retryable_method(&method) && attempt < self.retries;
            match self.client.request(method.clone(), url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if can_retry && is_retryable_status(response.status()) => {
                    log::debug!(
                        "{} {} returned {}, retry {}/{}",
                        method,
                        url,
                        response.status(),
                        attempt + 1,
                        self.retries
                    );
                }
                Ok(response) => {
                    return Err(AppError::HttpStatus {
                        url: url.to_string(),
                        status: response.status().as_u16(),
                    });
                }
                Err(e) if can_retry && (e.is_connect() || e.is_timeout()) => {
                    log::debug!(
                        "{} {} failed: {}, retry {}/{}",
                        method,
                        url,
                        e,
                        attempt + 1,
                        self.retries
                    );
                }
                Err(e) => return Err(e.into()),
            }

            tokio::time::sleep(backoff_delay(self.backoff, attempt)).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.send(Method::GET, url).await?;
        Ok(response.text().await?)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answers the n-th connection with `statuses[n]` (200 once exhausted).
    async fn scripted_server(statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses.get(n).copied().unwrap_or(200);

                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(k) => request.extend_from_slice(&buf[..k]),
                    }
                }

                let body = if status == 200 { "ok" } else { "nope" };
                let response = format!(
                    "HTTP/1.1 {status} Scripted\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}/feed"), hits)
    }

    fn fetcher(retries: u32) -> HttpFetcher {
        HttpFetcher::with_client(reqwest::Client::new(), retries, Duration::from_millis(1))
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::GATEWAY_TIMEOUT));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
        assert!(!is_retryable_status(StatusCode::NOT_IMPLEMENTED));
    }

    #[test]
    fn test_only_reads_are_retried() {
        assert!(is_retryable_method(&Method::GET));
        assert!(is_retryable_method(&Method::HEAD));
        assert!(!is_retryable_method(&Method::POST));
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(400);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(800));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(1600));
    }

    #[test]
    fn test_client_builds_from_defaults() {
        assert!(HttpFetcher::new(&HttpConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_host_errors_after_retries() {
        let fetcher = HttpFetcher::with_client(
            reqwest::Client::new(),
            1,
            Duration::from_millis(1),
        );
        let result = fetcher.fetch_text("http://127.0.0.1:9/feed").await;
        assert!(matches!(result, Err(AppError::Http(_))));
    }

    #[tokio::test]
    async fn test_transient_statuses_are_retried_until_success() {
        let (url, hits) = scripted_server(vec![503, 429, 200]).await;
        assert_eq!(fetcher(2).fetch_text(&url).await.unwrap(), "ok");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let (url, hits) = scripted_server(vec![404]).await;
        let err = fetcher(3).fetch_text(&url).await.unwrap_err();
        assert!(matches!(err, AppError::HttpStatus { status: 404, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_capped() {
        let (url, hits) = scripted_server(vec![503; 10]).await;
        let err = fetcher(2).fetch_text(&url).await.unwrap_err();
        assert!(matches!(err, AppError::HttpStatus { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_writes_are_not_retried() {
        let (url, hits) = scripted_server(vec![503, 200]).await;
        let err = fetcher(2).send(Method::POST, &url).await.unwrap_err();
        assert!(matches!(err, AppError::HttpStatus { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
