//! # headline_etl
//!
//! A small extract-transform-load pipeline for news homepages. Each run
//! scrapes the configured sources, strips punctuation from what it extracted,
//! writes the result next to a timestamped metadata record, and hands both
//! files to DVC.
//!
//! ## Usage
//!
//! ```sh
//! headline_etl -c pipeline.yaml -o ./data
//! ```
//!
//! ## Architecture
//!
//! The pipeline is strictly linear, one batch at a time:
//! 1. **Fetch**: download each source homepage and extract links, titles and
//!    meta descriptions (sources fetched concurrently, results kept in order)
//! 2. **Sanitize**: remove every non-word, non-whitespace character from
//!    every extracted string
//! 3. **Record**: write `processed_data.json` and `metadata.json`, then
//!    `dvc add` both and `dvc push`
//!
//! Scheduling is left to cron, a systemd timer or a workflow engine. Runs
//! overwrite their artifacts, so retrying a failed run is safe.
//!
//! ## Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | run completed and was pushed |
//! | 2 | configuration error |
//! | 3 | a source could not be fetched (`fail-fast` only) |
//! | 4 | artifacts could not be written; nothing was pushed |
//! | 5 | artifacts were written but DVC tracking or push failed |

use chrono::Local;
use clap::Parser;
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod error;
mod models;
mod outputs;
mod pipeline;
mod recorder;
mod sanitizer;
mod scrapers;
mod utils;
mod versioning;

use cli::Cli;
use config::PipelineConfig;
use error::{ConfigError, PipelineError};
use pipeline::RunSummary;
use scrapers::client::{HttpPageSource, RetryFetch};
use utils::ensure_writable_dir;
use versioning::DvcStore;

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "headline_etl starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    match execute(&args).await {
        Ok(summary) => {
            let elapsed = start_time.elapsed();
            info!(
                ?elapsed,
                timestamp = %summary.timestamp,
                sources = summary.sources,
                links = summary.links,
                titles = summary.titles,
                descriptions = summary.descriptions,
                processed_data = %summary.artifacts.processed_data.display(),
                metadata = %summary.artifacts.metadata.display(),
                "Execution complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(
                category = e.category(),
                error = %e,
                elapsed = ?start_time.elapsed(),
                "Pipeline run aborted"
            );
            ExitCode::from(e.exit_code())
        }
    }
}

async fn execute(args: &Cli) -> Result<RunSummary, PipelineError> {
    let mut config = PipelineConfig::load(args.config.as_deref()).await?;
    args.apply(&mut config);
    config.validate()?;
    info!(
        sources = ?config.sources,
        output_dir = %config.output_dir.display(),
        policy = ?config.fetch.policy,
        "Configuration ready"
    );

    // Fail on an unusable output directory before touching the network.
    ensure_writable_dir(&config.output_dir).await?;

    let http = HttpPageSource::new(&config.fetch).map_err(ConfigError::HttpClient)?;
    let page_source = RetryFetch::new(http, config.fetch.max_retries, config.fetch.base_delay());
    let store = DvcStore::new(&config.versioning);

    pipeline::run(&config, page_source, store, Local::now()).await
}
