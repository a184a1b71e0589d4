//! Command-line interface definitions for headline_etl.
//!
//! Flags override values loaded from the YAML config file. Most flags can
//! also be set through environment variables, which is convenient when the
//! binary runs under a scheduler.

use crate::config::{FetchPolicy, PipelineConfig};
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for a single pipeline run.
///
/// # Examples
///
/// ```sh
/// # Stock sources, artifacts in the current directory
/// headline_etl
///
/// # Custom sources and output directory
/// headline_etl -s https://www.dawn.com/ -s https://www.bbc.com/ -o ./data
///
/// # Settings from a file, abort on the first unreachable source
/// headline_etl -c pipeline.yaml --fetch-policy fail-fast
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, env = "HEADLINE_ETL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Source URL to scrape; repeat to scrape several (replaces configured sources)
    #[arg(short, long = "source")]
    pub sources: Vec<String>,

    /// Directory for processed_data.json and metadata.json
    #[arg(short, long, env = "HEADLINE_ETL_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// How to handle a source that cannot be fetched
    #[arg(long, value_enum)]
    pub fetch_policy: Option<FetchPolicy>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// DVC executable to invoke
    #[arg(long, env = "DVC_PROGRAM")]
    pub dvc_program: Option<String>,

    /// DVC remote to push to
    #[arg(long, env = "DVC_REMOTE")]
    pub dvc_remote: Option<String>,
}

impl Cli {
    /// Apply flags that were given on top of `config`.
    pub fn apply(&self, config: &mut PipelineConfig) {
        if !self.sources.is_empty() {
            config.sources = self.sources.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(policy) = self.fetch_policy {
            config.fetch.policy = policy;
        }
        if let Some(secs) = self.timeout_secs {
            config.fetch.timeout_secs = secs;
        }
        if let Some(program) = &self.dvc_program {
            config.versioning.program = program.clone();
        }
        if let Some(remote) = &self.dvc_remote {
            config.versioning.remote = Some(remote.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_no_arguments() {
        // Flags with env fallbacks depend on the test environment.
        let cli = Cli::parse_from(["headline_etl"]);
        assert!(cli.sources.is_empty());
        assert!(cli.fetch_policy.is_none());
        assert!(cli.timeout_secs.is_none());

        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.sources, PipelineConfig::default().sources);
        assert_eq!(config.fetch, PipelineConfig::default().fetch);
    }

    #[test]
    fn test_cli_without_flags_leaves_config_unchanged() {
        let cli = Cli {
            config: None,
            sources: vec![],
            output_dir: None,
            fetch_policy: None,
            timeout_secs: None,
            dvc_program: None,
            dvc_remote: None,
        };

        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_cli_repeated_sources_replace_config() {
        let cli = Cli::parse_from([
            "headline_etl",
            "--source",
            "https://a.example/",
            "-s",
            "https://b.example/",
        ]);

        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.sources, vec!["https://a.example/", "https://b.example/"]);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "headline_etl",
            "-o",
            "/tmp/out",
            "--fetch-policy",
            "fail-fast",
            "--timeout-secs",
            "7",
            "--dvc-program",
            "/opt/dvc/bin/dvc",
            "--dvc-remote",
            "s3store",
        ]);

        let mut config = PipelineConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(config.fetch.policy, FetchPolicy::FailFast);
        assert_eq!(config.fetch.timeout_secs, 7);
        assert_eq!(config.versioning.program, "/opt/dvc/bin/dvc");
        assert_eq!(config.versioning.remote.as_deref(), Some("s3store"));
    }

    #[test]
    fn test_cli_rejects_unknown_policy() {
        let res = Cli::try_parse_from(["headline_etl", "--fetch-policy", "sometimes"]);
        assert!(res.is_err());
    }
}
