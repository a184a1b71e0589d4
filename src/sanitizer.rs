//! Punctuation stripping for extracted fields.
//!
//! Every string in `links`, `titles` and `descriptions` keeps only word
//! characters (Unicode letters, marks, digits, connector punctuation such as
//! `_`) and whitespace. The filter is applied to each string independently,
//! so records and sequences keep their shape.
//!
//! This is lossy for URLs: `https://example.com/a?b=1` becomes
//! `httpsexamplecomab1`. Downstream consumers get tokens, not links.
//!
//! `\w` follows Unicode TR18 as implemented by the `regex` crate, which is
//! not the same line every regex engine draws: combining marks are word
//! characters and survive, while other numerics such as `²` are dropped.
//! `x²e` followed by U+0301 becomes `xe` followed by U+0301.

use crate::models::{PipelineBatch, SourceRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{info, instrument};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Remove every character that is neither a word character nor whitespace.
pub fn sanitize_text(text: &str) -> String {
    NON_WORD.replace_all(text, "").into_owned()
}

fn sanitize_record(record: SourceRecord) -> SourceRecord {
    SourceRecord {
        source: record.source,
        links: record
            .links
            .into_iter()
            .map(|link| link.map(|l| sanitize_text(&l)))
            .collect(),
        titles: record.titles.iter().map(|t| sanitize_text(t)).collect(),
        descriptions: record
            .descriptions
            .iter()
            .map(|d| sanitize_text(d))
            .collect(),
    }
}

/// Sanitize every field string of every record.
///
/// Source order, the `source` key of each record, and the length of every
/// sequence are preserved. Absent links stay absent.
#[instrument(level = "info", skip_all, fields(records = batch.len()))]
pub fn sanitize_batch(batch: PipelineBatch) -> PipelineBatch {
    let sanitized = PipelineBatch::new(batch.records.into_iter().map(sanitize_record).collect());
    let (links, titles, descriptions) = sanitized.field_totals();
    info!(links, titles, descriptions, "Sanitized batch");
    sanitized
}
