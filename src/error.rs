//! Error types for the TFR pipeline.
//!
//! [`TfrError`] ends a run. [`Skip`] is the recoverable outcome of a single
//! identifier or notice: the batch logs it, counts it, and moves on.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Run-level failure. Anything surfacing as a `TfrError` aborts the run.
#[derive(Debug, Error)]
pub enum TfrError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("listing endpoint {url} returned status {status}")]
    ListingStatus { url: String, status: u16 },

    #[error("listing could not be parsed: {0}")]
    ListingParse(String),

    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Why an identifier or a notice was left out of the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Skip {
    /// The detail endpoint answered with a non-success status (404 included).
    DetailStatus { status: u16 },
    /// Connection, TLS or body read failure.
    Transport(String),
    /// The request exceeded the per-request timeout.
    Timeout,
    /// The detail document is not well-formed XML.
    MalformedDocument(String),
    /// The detail document parsed but holds no notice element.
    NoNotices,
    /// Neither the listing nor the document yields an identifier.
    MissingIdentity,
    /// The worker task for this identifier panicked or was cancelled.
    TaskFailed(String),
}

impl Skip {
    /// Short stable label, used as the aggregation key in [`SkipReport`].
    pub fn kind(&self) -> &'static str {
        match self {
            Skip::DetailStatus { .. } => "detail_status",
            Skip::Transport(_) => "transport",
            Skip::Timeout => "timeout",
            Skip::MalformedDocument(_) => "malformed_document",
            Skip::NoNotices => "no_notices",
            Skip::MissingIdentity => "missing_identity",
            Skip::TaskFailed(_) => "task_failed",
        }
    }

    pub(crate) fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Skip::Timeout
        } else {
            Skip::Transport(err.to_string())
        }
    }
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Skip::DetailStatus { status } => write!(f, "detail endpoint returned status {status}"),
            Skip::Transport(msg) => write!(f, "transport error: {msg}"),
            Skip::Timeout => write!(f, "request timed out"),
            Skip::MalformedDocument(msg) => write!(f, "malformed detail document: {msg}"),
            Skip::NoNotices => write!(f, "detail document contains no notice"),
            Skip::MissingIdentity => write!(f, "notice identifier could not be resolved"),
            Skip::TaskFailed(msg) => write!(f, "worker task failed: {msg}"),
        }
    }
}

/// Per-run tally of skips, keyed by [`Skip::kind`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SkipReport {
    counts: BTreeMap<&'static str, usize>,
}

impl SkipReport {
    pub fn record(&mut self, skip: &Skip) {
        *self.counts.entry(skip.kind()).or_default() += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_report_counts_by_kind() {
        let mut report = SkipReport::default();
        report.record(&Skip::DetailStatus { status: 404 });
        report.record(&Skip::DetailStatus { status: 500 });
        report.record(&Skip::Timeout);

        assert_eq!(report.total(), 3);
        assert_eq!(report.count("detail_status"), 2);
        assert_eq!(report.count("timeout"), 1);
        assert_eq!(report.count("transport"), 0);
    }

    #[test]
    fn test_skip_display_mentions_status() {
        let msg = Skip::DetailStatus { status: 404 }.to_string();
        assert!(msg.contains("404"));
    }
}
