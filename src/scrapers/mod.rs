//! Homepage scraping: the first pipeline stage.
//!
//! Each configured source goes through two steps:
//!
//! 1. **Retrieval**: [`client::PageSource::get`] downloads the page, with a
//!    timeout, a body size limit, and retry on transient failures
//! 2. **Extraction**: [`extract::extract_record`] turns the document into a
//!    [`SourceRecord`]
//!
//! # Failure Handling
//!
//! | Failure | Outcome |
//! |---------|---------|
//! | Fetch error, `best-effort` | source recorded with empty fields, warning logged |
//! | Fetch error, `fail-fast` | run aborts with the first failing source's error |
//! | Parse error | source recorded with empty fields, warning logged |
//!
//! Sources are fetched concurrently, but the batch always lists them in
//! configured order, and `fail-fast` always reports the earliest failing
//! source in that order.

pub mod client;
pub mod extract;

use crate::config::FetchPolicy;
use crate::error::FetchError;
use crate::models::{PipelineBatch, SourceRecord};
use client::PageSource;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, instrument, warn};

/// Fetches every configured source into a [`PipelineBatch`].
#[derive(Debug)]
pub struct Fetcher<S> {
    source: S,
    policy: FetchPolicy,
    concurrency: usize,
}

impl<S> Fetcher<S>
where
    S: PageSource,
{
    pub fn new(source: S, policy: FetchPolicy, concurrency: usize) -> Self {
        Self {
            source,
            policy,
            concurrency: concurrency.max(1),
        }
    }

    /// Retrieve and extract one source. Parse errors degrade to an empty record.
    #[instrument(level = "info", skip(self))]
    async fn fetch_one(&self, url: &str) -> Result<SourceRecord, FetchError> {
        let page = self.source.get(url).await?;
        debug!(url = %page.url, bytes = page.body.len(), "Fetched source");

        match extract::extract_record(url, &page) {
            Ok(record) => {
                info!(
                    links = record.links.len(),
                    titles = record.titles.len(),
                    descriptions = record.descriptions.len(),
                    "Extracted source fields"
                );
                Ok(record)
            }
            Err(e) => {
                warn!(error = %e, "Could not parse source; recording empty fields");
                Ok(SourceRecord::empty(url))
            }
        }
    }

    /// Produce one record per source, in the order given.
    #[instrument(level = "info", skip_all, fields(sources = sources.len(), policy = ?self.policy))]
    pub async fn fetch_batch(&self, sources: &[String]) -> Result<PipelineBatch, FetchError> {
        let results: Vec<Result<SourceRecord, FetchError>> = stream::iter(sources)
            .map(|url| self.fetch_one(url))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut records = Vec::with_capacity(results.len());
        let mut failed = 0usize;
        for (url, result) in sources.iter().zip(results) {
            match result {
                Ok(record) => records.push(record),
                Err(e) => match self.policy {
                    FetchPolicy::FailFast => {
                        warn!(%url, error = %e, "Source failed; aborting run");
                        return Err(e);
                    }
                    FetchPolicy::BestEffort => {
                        warn!(%url, error = %e, "Source failed; recording empty fields");
                        failed += 1;
                        records.push(SourceRecord::empty(url.as_str()));
                    }
                },
            }
        }

        let batch = PipelineBatch::new(records);
        let (links, titles, descriptions) = batch.field_totals();
        info!(
            records = batch.len(),
            failed,
            links,
            titles,
            descriptions,
            "Fetched batch"
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use client::FetchedPage;
    use std::collections::HashMap;
    use std::time::Duration;

    /// Serves canned pages by URL, optionally slower for some URLs so that
    /// completion order differs from request order.
    #[derive(Default)]
    struct StubSource {
        pages: HashMap<String, Result<FetchedPage, FetchError>>,
        delays: HashMap<String, Duration>,
    }

    impl StubSource {
        fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(
                url.to_string(),
                Ok(FetchedPage {
                    url: url.to_string(),
                    content_type: Some("text/html".into()),
                    body: html.as_bytes().to_vec(),
                }),
            );
            self
        }

        fn failing(mut self, url: &str, status: u16) -> Self {
            self.pages.insert(
                url.to_string(),
                Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                }),
            );
            self
        }

        fn slow(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }
    }

    impl PageSource for StubSource {
        async fn get(&self, url: &str) -> Result<FetchedPage, FetchError> {
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            self.pages.get(url).cloned().unwrap_or_else(|| {
                Err(FetchError::Connect {
                    url: url.to_string(),
                    reason: "no stub".into(),
                })
            })
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_follows_configured_order() {
        let stub = StubSource::default()
            .page("https://a.example/", "<title>A</title>")
            .page("https://b.example/", "<title>B</title>")
            .page("https://c.example/", "<title>C</title>")
            .slow("https://a.example/", Duration::from_millis(300))
            .slow("https://b.example/", Duration::from_millis(100));
        let fetcher = Fetcher::new(stub, FetchPolicy::BestEffort, 3);
        let sources = urls(&["https://a.example/", "https://b.example/", "https://c.example/"]);

        let batch = fetcher.fetch_batch(&sources).await.unwrap();

        assert_eq!(batch.len(), 3);
        assert_eq!(batch.sources(), sources);
        let titles: Vec<_> = batch.records.iter().map(|r| r.titles[0].as_str()).collect();
        assert_eq!(titles, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_best_effort_records_failed_source_as_empty() {
        let stub = StubSource::default()
            .page("https://a.example/", "<title>A</title><a href='/x'>x</a>")
            .failing("https://b.example/", 500);
        let fetcher = Fetcher::new(stub, FetchPolicy::BestEffort, 2);
        let sources = urls(&["https://a.example/", "https://b.example/"]);

        let batch = fetcher.fetch_batch(&sources).await.unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.records[0].links, vec![Some("/x".to_string())]);
        assert_eq!(batch.records[1], SourceRecord::empty("https://b.example/"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fail_fast_reports_first_failure_in_configured_order() {
        let stub = StubSource::default()
            .page("https://a.example/", "<title>A</title>")
            .failing("https://b.example/", 404)
            .failing("https://c.example/", 500)
            .slow("https://b.example/", Duration::from_millis(500));
        let fetcher = Fetcher::new(stub, FetchPolicy::FailFast, 3);
        let sources = urls(&["https://a.example/", "https://b.example/", "https://c.example/"]);

        let err = fetcher.fetch_batch(&sources).await.unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                url: "https://b.example/".into(),
                status: 404
            }
        );
    }

    #[tokio::test]
    async fn test_unparseable_source_degrades_to_empty_record() {
        let mut stub = StubSource::default();
        stub.pages.insert(
            "https://img.example/".into(),
            Ok(FetchedPage {
                url: "https://img.example/".into(),
                content_type: Some("image/png".into()),
                body: vec![0x89, b'P', b'N', b'G'],
            }),
        );
        let fetcher = Fetcher::new(stub, FetchPolicy::FailFast, 1);

        let batch = fetcher
            .fetch_batch(&urls(&["https://img.example/"]))
            .await
            .unwrap();
        assert_eq!(batch.records, vec![SourceRecord::empty("https://img.example/")]);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let stub = StubSource::default().page("https://a.example/", "<title>A</title>");
        let fetcher = Fetcher::new(stub, FetchPolicy::BestEffort, 0);
        let batch = fetcher
            .fetch_batch(&urls(&["https://a.example/"]))
            .await
            .unwrap();
        assert_eq!(batch.len(), 1);
    }
}
