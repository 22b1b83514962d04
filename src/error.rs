use chrono::NaiveDate;
use std::path::PathBuf;

/// A single source file could not be read or parsed. The file is skipped and
/// the rest of the batch continues.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed session document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The structural tier could not make sense of a binary archive.
/// Always answered by falling through to the raw heuristic tier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("structural decoding is not compiled in")]
    Unavailable,

    #[error("truncated varint at offset {offset}")]
    TruncatedVarint { offset: usize },

    #[error("varint longer than 10 bytes at offset {offset}")]
    VarintOverflow { offset: usize },

    #[error("field wants {wanted} bytes at offset {offset}, only {available} left")]
    Truncated {
        offset: usize,
        wanted: u64,
        available: usize,
    },

    #[error("field number 0 at offset {offset}")]
    ZeroField { offset: usize },

    #[error("invalid wire type {wire_type} at offset {offset}")]
    InvalidWireType { wire_type: u8, offset: usize },

    #[error("unbalanced group at offset {offset}")]
    UnbalancedGroup { offset: usize },

    #[error("nesting deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// Writing one day's artifact failed. Fatal for that date only.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("{date}: could not create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        date: NaiveDate,
        #[source]
        source: std::io::Error,
    },

    #[error("{date}: could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        date: NaiveDate,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{date}: {} has no recoverable watermark and the foreign-artifact policy is reject",
        path.display()
    )]
    ForeignArtifact { path: PathBuf, date: NaiveDate },
}
