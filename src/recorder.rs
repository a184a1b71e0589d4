//! The last pipeline stage: persist the sanitized batch, then version it.
//!
//! Order of operations:
//!
//! 1. Build [`RunMetadata`] from the capture time and the configured sources
//! 2. Write both JSON artifacts (see [`crate::outputs::json`])
//! 3. `track` each artifact, then `publish` once
//!
//! A write failure returns before step 3, so nothing is tracked or pushed.
//! A versioning failure is reported as [`RecordError::Publish`] with the
//! step that failed; the artifacts from step 2 remain on disk.

use crate::error::{PublishError, RecordError};
use crate::models::{PipelineBatch, RunMetadata};
use crate::outputs::json::{ArtifactPaths, write_artifacts};
use crate::versioning::VersionStore;
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

/// Result of a completed recorder stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRun {
    pub metadata: RunMetadata,
    pub artifacts: ArtifactPaths,
}

#[derive(Debug)]
pub struct Recorder<V> {
    store: V,
    output_dir: PathBuf,
}

impl<V> Recorder<V>
where
    V: VersionStore,
{
    pub fn new(store: V, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[instrument(level = "info", skip_all, fields(records = batch.len(), output_dir = %self.output_dir.display()))]
    pub async fn record(
        &self,
        batch: &PipelineBatch,
        sources: &[String],
        captured_at: DateTime<Local>,
    ) -> Result<RecordedRun, RecordError> {
        let metadata = RunMetadata::new(captured_at, sources);
        info!(timestamp = %metadata.timestamp, "Recording run");

        let artifacts = write_artifacts(batch, &metadata, &self.output_dir)
            .await
            .inspect_err(|e| error!(error = %e, "Artifact write failed; skipping versioning"))?;

        for path in artifacts.all() {
            self.store
                .track(path)
                .await
                .map_err(|source| PublishError::Track {
                    path: path.to_path_buf(),
                    source,
                })
                .inspect_err(|e| error!(error = %e, "Tracking failed"))?;
        }
        self.store
            .publish()
            .await
            .map_err(|source| PublishError::Push { source })
            .inspect_err(|e| error!(error = %e, "Push failed"))?;

        info!(timestamp = %metadata.timestamp, "Run recorded and published");
        Ok(RecordedRun {
            metadata,
            artifacts,
        })
    }
}
