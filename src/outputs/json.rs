//! JSON artifact writing.
//!
//! Both artifacts live at fixed names in the output directory and are
//! replaced on every run:
//!
//! ```text
//! output_dir/
//! ├── processed_data.json   # PipelineBatch
//! └── metadata.json         # RunMetadata
//! ```
//!
//! # Staging
//!
//! Each artifact is serialized and written to a hidden `.<name>.tmp` sibling
//! first. Only when every staged file is complete are they renamed over the
//! final names. A failed run therefore never leaves a half-written artifact,
//! and stale staging files are removed.

use crate::error::WriteError;
use crate::models::{PipelineBatch, RunMetadata};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument, warn};

pub const PROCESSED_DATA_FILE: &str = "processed_data.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Final locations of the written artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub processed_data: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            processed_data: dir.join(PROCESSED_DATA_FILE),
            metadata: dir.join(METADATA_FILE),
        }
    }

    /// Artifacts in the order they are tracked.
    pub fn all(&self) -> [&Path; 2] {
        [&self.processed_data, &self.metadata]
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

fn to_json<T: Serialize>(value: &T, artifact: &'static str) -> Result<Vec<u8>, WriteError> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| WriteError::Serialize { artifact, source })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Write `bytes` to the staging sibling of `path` and flush it to disk.
async fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf, WriteError> {
    let staged = staging_path(path);
    let io_err = |source| WriteError::Io {
        path: staged.clone(),
        source,
    };
    let mut file = fs::File::create(&staged).await.map_err(io_err)?;
    tokio::io::AsyncWriteExt::write_all(&mut file, bytes)
        .await
        .map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    Ok(staged)
}

async fn discard(staged: &[PathBuf]) {
    for path in staged {
        if let Err(e) = fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove staging file");
            }
        }
    }
}

/// Serialize `batch` and `metadata` into `output_dir`, replacing prior artifacts.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir.display()))]
pub async fn write_artifacts(
    batch: &PipelineBatch,
    metadata: &RunMetadata,
    output_dir: &Path,
) -> Result<ArtifactPaths, WriteError> {
    let paths = ArtifactPaths::in_dir(output_dir);
    let contents = [
        (&paths.processed_data, to_json(batch, PROCESSED_DATA_FILE)?),
        (&paths.metadata, to_json(metadata, METADATA_FILE)?),
    ];

    fs::create_dir_all(output_dir)
        .await
        .map_err(|source| WriteError::Io {
            path: output_dir.to_path_buf(),
            source,
        })?;

    let mut staged = Vec::with_capacity(contents.len());
    for (path, bytes) in &contents {
        match stage(path, bytes).await {
            Ok(p) => staged.push(p),
            Err(e) => {
                discard(&staged).await;
                discard(&[staging_path(path)]).await;
                return Err(e);
            }
        }
    }

    for (i, ((path, bytes), staged_path)) in contents.iter().zip(&staged).enumerate() {
        if let Err(source) = fs::rename(staged_path, path).await {
            discard(&staged[i..]).await;
            return Err(WriteError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
        info!(path = %path.display(), bytes = bytes.len(), "Wrote artifact");
    }

    Ok(paths)
}
