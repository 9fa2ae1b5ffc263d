use thiserror::Error;

/// Failures the core can surface to callers. Per-record problems (bad
/// timestamps, non-numeric amounts) are never errors — they coerce to
/// defaults and show up only in diagnostic counts.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Every fallback tier failed. The message stays generic so the upstream
    /// source is never named to a caller.
    #[error("analytics service temporarily unavailable")]
    SourceUnavailable,

    #[error("malformed tabular payload: {0}")]
    MalformedInput(String),
}

impl From<csv::Error> for CoreError {
    fn from(err: csv::Error) -> Self {
        CoreError::MalformedInput(err.to_string())
    }
}
