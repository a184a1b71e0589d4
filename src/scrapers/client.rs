//! Page retrieval with bounded time, bounded size, and retry.
//!
//! # Architecture
//!
//! - [`PageSource`]: core trait, fetch one URL
//! - [`HttpPageSource`]: reqwest-backed implementation
//! - [`RetryFetch`]: decorator that retries transient failures of any [`PageSource`]
//!
//! # Retry Strategy
//!
//! Only errors for which [`FetchError::is_transient`] holds are retried. The
//! delay before attempt `n` is:
//!
//! ```text
//! delay = min(base_delay * 2^(n-1), max_delay) + random_jitter(0..250ms)
//! ```

use crate::config::FetchConfig;
use crate::error::FetchError;
use rand::{Rng, rng};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Raw response of a successful retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub url: String,
    /// `Content-Type` header as sent by the server, if any.
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Anything that can retrieve a page by URL.
pub trait PageSource {
    /// Fetch `url`, returning the body of a 2xx response.
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// HTTP(S) retrieval through a shared reqwest client.
///
/// The client carries the request timeout, so no call can block indefinitely.
/// Bodies are streamed chunk by chunk and rejected as soon as they pass
/// `max_body_bytes`.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    max_body_bytes: usize,
}

impl HttpPageSource {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        Self::with_timeout(config, config.timeout())
    }

    fn with_timeout(config: &FetchConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

impl PageSource for HttpPageSource {
    #[instrument(level = "info", skip(self))]
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || FetchError::BodyTooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };
        if let Some(len) = response.content_length() {
            if len > self.max_body_bytes as u64 {
                return Err(too_large());
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), ?content_type, "Downloaded page");
        Ok(FetchedPage {
            url: url.to_string(),
            content_type,
            body,
        })
    }
}

/// Wrapper that adds exponential backoff retry to any [`PageSource`].
pub struct RetryFetch<T> {
    inner: T,
    /// Attempts after the first one.
    max_retries: usize,
    /// Delay before the first retry; doubles with each attempt.
    base_delay: Duration,
    max_delay: Duration,
}

impl<T> RetryFetch<T>
where
    T: PageSource,
{
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> PageSource for RetryFetch<T>
where
    T: PageSource,
{
    #[instrument(level = "info", skip(self))]
    async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.get(url).await {
                Ok(page) => {
                    if attempt > 0 {
                        info!(attempt, "Fetch succeeded after retry");
                    }
                    return Ok(page);
                }
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if !e.is_transient() {
                        warn!(error = %e, "Fetch failed with a permanent error; not retrying");
                        return Err(e);
                    }
                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "Fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "Fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
