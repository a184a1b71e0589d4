//! Pipeline configuration.
//!
//! Settings come from an optional YAML file and are then overridden by CLI
//! flags (see [`crate::cli::Cli`]). Every field has a default, so an empty
//! file or no file at all yields a working configuration that scrapes the
//! two stock homepages.
//!
//! ```yaml
//! sources:
//!   - https://www.dawn.com/
//!   - https://www.bbc.com/
//! output_dir: ./data
//! fetch:
//!   timeout_secs: 30
//!   policy: fail-fast
//! versioning:
//!   remote: storage
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};
use url::Url;

pub const DEFAULT_SOURCES: [&str; 2] = ["https://www.dawn.com/", "https://www.bbc.com/"];

/// What to do when a single source cannot be fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    /// Record the source with empty fields and keep going.
    #[default]
    BestEffort,
    /// Abort the run with the first failing source's error.
    FailFast,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Homepages to scrape, in output order.
    pub sources: Vec<String>,
    /// Directory receiving `processed_data.json` and `metadata.json`.
    pub output_dir: PathBuf,
    pub fetch: FetchConfig,
    pub versioning: VersioningConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            output_dir: PathBuf::from("."),
            fetch: FetchConfig::default(),
            versioning: VersioningConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout, covering connect through the last body byte.
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure.
    pub max_retries: usize,
    /// First backoff delay; doubles per attempt.
    pub base_delay_ms: u64,
    /// Responses larger than this are rejected.
    pub max_body_bytes: usize,
    /// Sources fetched at the same time.
    pub concurrency: usize,
    pub policy: FetchPolicy,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 2,
            base_delay_ms: 500,
            max_body_bytes: 10 * 1024 * 1024,
            concurrency: 4,
            policy: FetchPolicy::BestEffort,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// DVC executable name or path.
    pub program: String,
    /// Working directory for DVC commands. Defaults to the process directory.
    pub repo_dir: Option<PathBuf>,
    /// Remote passed to `dvc push -r`. Uses the repository default when unset.
    pub remote: Option<String>,
    /// Upper bound for each DVC invocation.
    pub timeout_secs: u64,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            program: "dvc".to_string(),
            repo_dir: None,
            remote: None,
            timeout_secs: 600,
        }
    }
}

impl VersioningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PipelineConfig {
    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, or return defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let config = Self::from_yaml(&text, path)?;
        info!(path = %path.display(), sources = config.sources.len(), "Loaded configuration");
        Ok(config)
    }

    /// Check the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        for source in &self.sources {
            validate_source(source)?;
        }
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "fetch.timeout_secs",
            });
        }
        if self.fetch.concurrency == 0 {
            return Err(ConfigError::Zero {
                field: "fetch.concurrency",
            });
        }
        if self.fetch.max_body_bytes == 0 {
            return Err(ConfigError::Zero {
                field: "fetch.max_body_bytes",
            });
        }
        if self.versioning.timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "versioning.timeout_secs",
            });
        }
        Ok(())
    }
}

fn validate_source(source: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidSource {
        url: source.to_string(),
        reason,
    };
    let url = Url::parse(source).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme `{other}`"))),
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Result<PipelineConfig, ConfigError> {
        PipelineConfig::from_yaml(yaml, Path::new("test.yaml"))
    }

    #[test]
    fn test_defaults_scrape_stock_sources() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.sources,
            vec!["https://www.dawn.com/", "https://www.bbc.com/"]
        );
        assert_eq!(config.fetch.policy, FetchPolicy::BestEffort);
        assert_eq!(config.versioning.program, "dvc");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        assert_eq!(parse("").unwrap(), PipelineConfig::default());
        assert_eq!(parse("  \n").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = parse(
            r#"
sources:
  - https://example.com/
fetch:
  policy: fail-fast
  timeout_secs: 5
versioning:
  remote: storage
"#,
        )
        .unwrap();

        assert_eq!(config.sources, vec!["https://example.com/"]);
        assert_eq!(config.fetch.policy, FetchPolicy::FailFast);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(5));
        assert_eq!(config.fetch.max_retries, FetchConfig::default().max_retries);
        assert_eq!(config.versioning.remote.as_deref(), Some("storage"));
        assert_eq!(config.versioning.program, "dvc");
        assert_eq!(config.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let err = parse("sources: [unterminated").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_rejects_empty_source_list() {
        let config = PipelineConfig {
            sources: vec![],
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoSources)));
    }

    #[test]
    fn test_rejects_non_http_sources() {
        for bad in ["ftp://example.com/", "not a url", "file:///etc/passwd"] {
            let config = PipelineConfig {
                sources: vec![bad.to_string()],
                ..PipelineConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidSource { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = PipelineConfig::default();
        config.fetch.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "fetch.timeout_secs"
            })
        ));
    }

    #[tokio::test]
    async fn test_load_without_path_uses_defaults() {
        let config = PipelineConfig::load(None).await.unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = PipelineConfig::load(Some(&missing)).await.unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[tokio::test]
    async fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.yaml");
        std::fs::write(&path, "output_dir: /srv/data\n").unwrap();

        let config = PipelineConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.output_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.sources.len(), 2);
    }
}
