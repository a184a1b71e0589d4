//! Data that flows between the pipeline stages.
//!
//! - [`SourceRecord`]: fields extracted from one source homepage
//! - [`PipelineBatch`]: one record per configured source, in configured order
//! - [`RunMetadata`]: capture time and source list for a single run
//!
//! The JSON shape of these types is the artifact schema:
//!
//! ```text
//! processed_data.json
//! [
//!   {
//!     "source": "https://www.dawn.com/",
//!     "links": ["httpswwwdawncomnews", null, ...],
//!     "titles": ["DAWNCOM  Todays Paper"],
//!     "descriptions": ["Latest news from Pakistan"]
//!   },
//!   ...
//! ]
//!
//! metadata.json
//! { "timestamp": "20250511_060000", "sources": ["https://www.dawn.com/", ...] }
//! ```

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Format of [`RunMetadata::timestamp`]. Lexicographic order matches time order.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Fields extracted from one configured source.
///
/// The three sequences have independent lengths, determined by how many
/// matching elements the fetched page contains. Zero is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// The configured URL this record was fetched from.
    pub source: String,
    /// `href` of every `<a>` in document order. `None` where an anchor had no `href`.
    pub links: Vec<Option<String>>,
    /// Text of every `<title>` element.
    pub titles: Vec<String>,
    /// `content` of every `<meta name="description">` element.
    pub descriptions: Vec<String>,
}

impl SourceRecord {
    /// A record with no extracted fields, used when a source fails or cannot be parsed.
    pub fn empty(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// Ordered records for one run, threaded through every stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineBatch {
    pub records: Vec<SourceRecord>,
}

impl PipelineBatch {
    pub fn new(records: Vec<SourceRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Source URLs in batch order.
    pub fn sources(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.source.as_str()).collect()
    }

    /// Entry totals per field: `(links, titles, descriptions)`.
    pub fn field_totals(&self) -> (usize, usize, usize) {
        self.records.iter().fold((0, 0, 0), |(l, t, d), r| {
            (l + r.links.len(), t + r.titles.len(), d + r.descriptions.len())
        })
    }
}

/// Per-run record stored next to the processed data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Capture time formatted with [`TIMESTAMP_FORMAT`].
    pub timestamp: String,
    /// The configured sources, in order.
    pub sources: Vec<String>,
}

impl RunMetadata {
    pub fn new(captured_at: DateTime<Local>, sources: &[String]) -> Self {
        Self {
            timestamp: captured_at.format(TIMESTAMP_FORMAT).to_string(),
            sources: sources.to_vec(),
        }
    }
}
