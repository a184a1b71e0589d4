//! Orchestration of one run: fetch, sanitize, record.
//!
//! Each stage receives the previous stage's complete output as a plain
//! argument. Nothing is shared between stages besides the
//! [`PipelineBatch`] value being passed along.

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::models::PipelineBatch;
use crate::outputs::json::ArtifactPaths;
use crate::recorder::Recorder;
use crate::sanitizer::sanitize_batch;
use crate::scrapers::Fetcher;
use crate::scrapers::client::PageSource;
use crate::versioning::VersionStore;
use chrono::{DateTime, Local};
use tracing::{info, instrument};

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub timestamp: String,
    pub sources: usize,
    pub links: usize,
    pub titles: usize,
    pub descriptions: usize,
    pub artifacts: ArtifactPaths,
}

fn check_shape(stage: &'static str, batch: &PipelineBatch, sources: &[String]) {
    debug_assert_eq!(
        batch.sources(),
        sources,
        "{stage} changed the source list"
    );
    info!(stage, records = batch.len(), "Stage complete");
}

/// Execute the pipeline once with the given collaborators.
#[instrument(level = "info", skip_all, fields(sources = config.sources.len()))]
pub async fn run<S, V>(
    config: &PipelineConfig,
    page_source: S,
    store: V,
    captured_at: DateTime<Local>,
) -> Result<RunSummary, PipelineError>
where
    S: PageSource,
    V: VersionStore,
{
    config.validate()?;
    let sources = &config.sources;

    let fetcher = Fetcher::new(page_source, config.fetch.policy, config.fetch.concurrency);
    let raw = fetcher.fetch_batch(sources).await?;
    check_shape("fetch", &raw, sources);

    let clean = sanitize_batch(raw);
    check_shape("sanitize", &clean, sources);

    let recorder = Recorder::new(store, &config.output_dir);
    info!(output_dir = %recorder.output_dir().display(), "Recording batch");
    let recorded = recorder.record(&clean, sources, captured_at).await?;

    let (links, titles, descriptions) = clean.field_totals();
    Ok(RunSummary {
        timestamp: recorded.metadata.timestamp,
        sources: clean.len(),
        links,
        titles,
        descriptions,
        artifacts: recorded.artifacts,
    })
}
