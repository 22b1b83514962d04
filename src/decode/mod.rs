//! Source format decoders.
//!
//! Each decoder turns one file into at most one [`Session`]. `Ok(None)` means
//! the file held nothing worth filing (no messages, no recoverable text, or no
//! usable date) and is not an error.

pub mod binary;
pub mod line_records;
pub mod markdown_export;
pub mod session_document;
#[cfg(feature = "structural")]
pub mod wire;

use crate::error::DecodeError;
use crate::record::Session;
use serde_json::Value;
use std::path::Path;

pub use binary::BinaryArchiveDecoder;
pub use line_records::LineRecordDecoder;
pub use session_document::SessionDocumentDecoder;

pub type DecodeResult = Result<Option<Session>, DecodeError>;

pub trait SessionDecoder {
    /// Human-readable name used in diagnostics.
    fn name(&self) -> &'static str;

    fn decode(&self, path: &Path) -> DecodeResult;
}

/// The on-disk shapes a source file can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceFormat {
    LineRecords,
    SessionDocument,
    BinaryArchive,
}

impl SourceFormat {
    pub fn decoder(self) -> &'static dyn SessionDecoder {
        match self {
            SourceFormat::LineRecords => &LineRecordDecoder,
            SourceFormat::SessionDocument => &SessionDocumentDecoder,
            SourceFormat::BinaryArchive => &BinaryArchiveDecoder,
        }
    }
}

/// Text carried by a `content` value: either a plain string or a list of
/// parts, where a part is a string or an object with a `text` field.
pub(crate) fn flatten_text(content: &Value, separator: &str) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(s) => Some(s.as_str()),
                Value::Object(obj) => obj.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(separator),
        _ => String::new(),
    }
}

/// Tool arguments as shown in the transcript.
pub(crate) fn display_args(args: &Value) -> String {
    match args {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}
