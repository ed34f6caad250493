//! PBIX extraction errors

/// Errors raised while reading a PBIX package
///
/// Only `Io`, `NotZipContainer` and `TooManyEntries` can escape the
/// extractor (they are raised when the package is opened). Everything else
/// is confined to the strategy that hit it.
#[derive(Debug, thiserror::Error)]
pub enum PbixError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a ZIP container")]
    NotZipContainer,

    #[error("ZIP error: {0}")]
    Zip(String),

    #[error("package has too many entries: {entries} (limit: {max_entries})")]
    TooManyEntries { entries: usize, max_entries: usize },

    #[error("entry '{path}' is too large: {size} bytes (limit: {limit} bytes)")]
    EntryTooLarge { path: String, size: u64, limit: u64 },

    #[error("total uncompressed size would exceed {limit} bytes")]
    TotalTooLarge { limit: u64 },

    #[error("no {0} entry in package")]
    EntryNotFound(String),

    #[error("failed to read entry '{path}': {reason}")]
    EntryRead { path: String, reason: String },

    #[error("invalid JSON in '{path}': {reason}")]
    InvalidJson { path: String, reason: String },

    #[error("invalid scan pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl PbixError {
    /// True when the error only means an optional entry is absent
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::EntryNotFound(_))
    }
}
