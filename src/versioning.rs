//! Hand-off of written artifacts to an external versioning tool.
//!
//! The pipeline only needs two operations, captured by [`VersionStore`]:
//!
//! | Operation | DVC command | Called |
//! |-----------|-------------|--------|
//! | `track(path)` | `dvc add <path>` | once per artifact |
//! | `publish()` | `dvc push [-r <remote>]` | once, after every artifact is tracked |
//!
//! [`DvcStore`] runs these as subprocesses. Exit status is always checked,
//! stderr is kept for the error message, and every invocation is bounded by
//! a timeout. A child still running when its timeout fires is killed.

use crate::config::VersioningConfig;
use crate::error::VersionError;
use crate::utils::truncate_for_log;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Register artifacts with a versioned store and push them to its remote.
pub trait VersionStore {
    /// Register a new or changed artifact.
    async fn track(&self, path: &Path) -> Result<(), VersionError>;

    /// Push everything registered so far to the remote store.
    async fn publish(&self) -> Result<(), VersionError>;
}

impl<T: VersionStore + ?Sized> VersionStore for &T {
    async fn track(&self, path: &Path) -> Result<(), VersionError> {
        (**self).track(path).await
    }

    async fn publish(&self) -> Result<(), VersionError> {
        (**self).publish().await
    }
}

/// [`VersionStore`] backed by the `dvc` command-line tool.
#[derive(Debug, Clone)]
pub struct DvcStore {
    program: String,
    repo_dir: Option<PathBuf>,
    remote: Option<String>,
    timeout: Duration,
}

impl DvcStore {
    pub fn new(config: &VersioningConfig) -> Self {
        Self {
            program: config.program.clone(),
            repo_dir: config.repo_dir.clone(),
            remote: config.remote.clone(),
            timeout: config.timeout(),
        }
    }

    /// Path as the tool should see it. The tool runs in `repo_dir` when one
    /// is set, so relative paths are anchored to this process's directory.
    fn tool_path(&self, path: &Path) -> Result<PathBuf, VersionError> {
        if self.repo_dir.is_none() || path.is_absolute() {
            return Ok(path.to_path_buf());
        }
        std::path::absolute(path).map_err(|source| VersionError::ResolvePath {
            path: path.to_path_buf(),
            source,
        })
    }

    fn push_args(&self) -> Vec<String> {
        let mut args = vec!["push".to_string()];
        if let Some(remote) = &self.remote {
            args.push("-r".to_string());
            args.push(remote.clone());
        }
        args
    }

    /// Run the tool with `args` and fail unless it exits successfully.
    #[instrument(level = "info", skip(self), fields(program = %self.program))]
    async fn run(&self, args: &[String]) -> Result<(), VersionError> {
        let command_line = format!("{} {}", self.program, args.join(" "));
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.repo_dir {
            command.current_dir(dir);
        }

        let t0 = Instant::now();
        let child = command
            .spawn()
            .map_err(|source| VersionError::ToolUnavailable {
                program: self.program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| VersionError::ToolUnavailable {
                program: self.program.clone(),
                source,
            })?,
            Err(_) => {
                warn!(command = %command_line, after = ?self.timeout, "Versioning command timed out");
                return Err(VersionError::TimedOut {
                    command: command_line,
                    after: self.timeout,
                });
            }
        };

        let elapsed_ms = t0.elapsed().as_millis();
        if output.status.success() {
            debug!(
                command = %command_line,
                elapsed_ms,
                stdout = %truncate_for_log(&String::from_utf8_lossy(&output.stdout), 300),
                "Versioning command succeeded"
            );
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                command = %command_line,
                elapsed_ms,
                code = ?output.status.code(),
                stderr = %truncate_for_log(&stderr, 300),
                "Versioning command failed"
            );
            Err(VersionError::Failed {
                command: command_line,
                code: output.status.code(),
                stderr,
            })
        }
    }
}

impl VersionStore for DvcStore {
    #[instrument(level = "info", skip(self), fields(path = %path.display()))]
    async fn track(&self, path: &Path) -> Result<(), VersionError> {
        let path = self.tool_path(path)?;
        self.run(&["add".to_string(), path.display().to_string()])
            .await?;
        info!("Tracked artifact");
        Ok(())
    }

    #[instrument(level = "info", skip(self), fields(remote = ?self.remote))]
    async fn publish(&self) -> Result<(), VersionError> {
        self.run(&self.push_args()).await?;
        info!("Pushed tracked artifacts");
        Ok(())
    }
}
