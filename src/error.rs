//! Error taxonomy for a pipeline run.
//!
//! Each stage owns its own error type:
//!
//! | Error | Raised by | Handling |
//! |-------|-----------|----------|
//! | [`ConfigError`] | config loading | fatal before any network call |
//! | [`FetchError`] | page retrieval | per [`FetchPolicy`](crate::config::FetchPolicy) |
//! | [`ParseError`] | HTML extraction | absorbed, source degrades to empty fields |
//! | [`WriteError`] | artifact writes | fatal, nothing is published |
//! | [`PublishError`] | DVC hand-off | fatal, artifacts stay on disk |
//!
//! [`PipelineError`] wraps the fatal ones so `main` can report a category and
//! pick an exit code.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no sources configured")]
    NoSources,

    #[error("invalid source URL `{url}`: {reason}")]
    InvalidSource { url: String, reason: String },

    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Network or HTTP-level failure while retrieving one source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("response from {url} exceeded {limit} bytes")]
    BodyTooLarge { url: String, limit: usize },
}

impl FetchError {
    /// Build a [`FetchError`] from a reqwest transport error.
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            FetchError::Timeout { url }
        } else if err.is_connect() {
            FetchError::Connect {
                url,
                reason: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            FetchError::Status {
                url,
                status: status.as_u16(),
            }
        } else {
            FetchError::Request {
                url,
                reason: err.to_string(),
            }
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Timeouts, connection failures, transport errors, `429` and `5xx`
    /// responses are transient. Other statuses and oversized bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connect { .. } | FetchError::Request { .. } => {
                true
            }
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::BodyTooLarge { .. } => false,
        }
    }
}

/// A document that could not be turned into fields. Never leaves the fetcher.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("content type `{0}` is not a text document")]
    NotText(String),

    #[error("selector `{selector}` rejected: {reason}")]
    Selector {
        selector: &'static str,
        reason: String,
    },
}

/// Local durable-write failure.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to serialize {artifact}: {source}")]
    Serialize {
        artifact: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure reported by a [`VersionStore`](crate::versioning::VersionStore) call.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("`{program}` could not be started: {source}")]
    ToolUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` did not finish within {after:?}")]
    TimedOut { command: String, after: Duration },

    #[error("cannot resolve {path} against the current directory: {source}")]
    ResolvePath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// External versioning failure, naming the step that failed.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("tracking {path} failed: {source}")]
    Track {
        path: PathBuf,
        #[source]
        source: VersionError,
    },

    #[error("pushing tracked artifacts failed: {source}")]
    Push {
        #[source]
        source: VersionError,
    },
}

/// Outcome of the recorder stage when it does not complete.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

/// Any error that terminates a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("write error: {0}")]
    Write(#[from] WriteError),

    #[error("publish error: {0}")]
    Publish(#[from] PublishError),
}

impl From<RecordError> for PipelineError {
    fn from(err: RecordError) -> Self {
        match err {
            RecordError::Write(e) => PipelineError::Write(e),
            RecordError::Publish(e) => PipelineError::Publish(e),
        }
    }
}

impl PipelineError {
    /// Short category used in logs.
    pub fn category(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "config",
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Write(_) => "write",
            PipelineError::Publish(_) => "publish",
        }
    }

    /// Process exit code for this failure category.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_) => 2,
            PipelineError::Fetch(_) => 3,
            PipelineError::Write(_) => 4,
            PipelineError::Publish(_) => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let url = "https://example.com/".to_string();
        assert!(FetchError::Timeout { url: url.clone() }.is_transient());
        assert!(
            FetchError::Connect {
                url: url.clone(),
                reason: "refused".into()
            }
            .is_transient()
        );
        assert!(
            FetchError::Status {
                url: url.clone(),
                status: 503
            }
            .is_transient()
        );
        assert!(
            FetchError::Status {
                url: url.clone(),
                status: 429
            }
            .is_transient()
        );
        assert!(
            !FetchError::Status {
                url: url.clone(),
                status: 404
            }
            .is_transient()
        );
        assert!(
            !FetchError::BodyTooLarge {
                url,
                limit: 10
            }
            .is_transient()
        );
    }

    #[test]
    fn test_record_error_maps_to_distinct_categories() {
        let write: PipelineError = RecordError::Write(WriteError::Io {
            path: PathBuf::from("processed_data.json"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
        .into();
        let publish: PipelineError = RecordError::Publish(PublishError::Push {
            source: VersionError::Failed {
                command: "dvc push".into(),
                code: Some(1),
                stderr: "no remote".into(),
            },
        })
        .into();

        assert_eq!(write.category(), "write");
        assert_eq!(publish.category(), "publish");
        assert_ne!(write.exit_code(), publish.exit_code());
    }

    #[test]
    fn test_version_error_message_mentions_exit_status() {
        let err = VersionError::Failed {
            command: "dvc add metadata.json".into(),
            code: Some(255),
            stderr: "not a dvc repository".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("status 255"));
        assert!(msg.contains("not a dvc repository"));

        let killed = VersionError::Failed {
            command: "dvc push".into(),
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("a signal"));
    }
}
