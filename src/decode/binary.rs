//! Recovery of readable text from binary session archives with no schema.
//!
//! Two tiers, tried in order:
//! 1. structural: rebuild the message tree from the wire layout and keep the
//!    string leaves that look like prose;
//! 2. raw heuristic: scan the bytes for long printable runs and keep the ones
//!    that contain enough common English words.
//!
//! Archives carry no timestamp readable without a schema, so the session is
//! dated by the file's modification time.

use super::{DecodeResult, SessionDecoder};
use crate::error::{DecodeError, WireError};
use crate::record::{CanonicalRecord, Fragment, Session, SourceMethod};
use crate::utils::modified_local;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// A structural leaf must be longer than this (in chars) to count as text.
pub const MIN_LEAF_CHARS: usize = 20;

/// Distinct common words a printable run needs before it is believed.
pub const MIN_COMMON_WORDS: usize = 3;

const COMMON_WORDS: [&str; 10] = [
    " the ", " you ", " and ", " that ", " have ", " for ", " not ", " with ", " this ", " from ",
];

static PRINTABLE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x20-\x7E\n]{30,}").expect("valid printable-run regex"));

#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryArchiveDecoder;

impl SessionDecoder for BinaryArchiveDecoder {
    fn name(&self) -> &'static str {
        "binary archive"
    }

    fn decode(&self, path: &Path) -> DecodeResult {
        let io_err = |source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        };
        let modified = modified_local(path).map_err(io_err)?;
        let bytes = std::fs::read(path).map_err(io_err)?;

        let Some((segments, method)) = recover_text(&bytes) else {
            debug!(path = %path.display(), "no recoverable text in archive");
            return Ok(None);
        };
        debug!(
            path = %path.display(),
            segments = segments.len(),
            method = method.label(),
            "recovered archive text"
        );

        let records = segments
            .into_iter()
            .map(|text| CanonicalRecord::Fragment(Fragment { text }))
            .collect();
        Ok(Some(Session::new(modified, records, method, path)))
    }
}

/// Run both tiers in order. `None` when neither finds anything.
pub fn recover_text(bytes: &[u8]) -> Option<(Vec<String>, SourceMethod)> {
    choose_tier(structural_segments(bytes), bytes)
}

fn choose_tier(
    structural: Result<Vec<String>, WireError>,
    bytes: &[u8],
) -> Option<(Vec<String>, SourceMethod)> {
    match structural {
        Ok(segments) if !segments.is_empty() => {
            return Some((segments, SourceMethod::StructuralDecode));
        }
        Ok(_) => debug!("structural decode found no text leaves"),
        Err(e) => debug!("structural decode failed: {e}"),
    }

    let segments = heuristic_segments(bytes);
    (!segments.is_empty()).then_some((segments, SourceMethod::RawHeuristic))
}

#[cfg(feature = "structural")]
pub fn structural_segments(bytes: &[u8]) -> Result<Vec<String>, WireError> {
    let tree = super::wire::decode_message(bytes)?;
    Ok(text_leaves(&tree))
}

#[cfg(not(feature = "structural"))]
pub fn structural_segments(_bytes: &[u8]) -> Result<Vec<String>, WireError> {
    Err(WireError::Unavailable)
}

/// Every string or UTF-8 byte leaf that passes [`is_text_leaf`].
#[cfg(feature = "structural")]
pub fn text_leaves(tree: &super::wire::WireValue) -> Vec<String> {
    use super::wire::Scalar;

    tree.fold(Vec::new(), &mut |mut found: Vec<String>, leaf: &Scalar| {
        let candidate = match leaf {
            Scalar::Text(text) => Some(text.as_str()),
            Scalar::Bytes(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        };
        if let Some(text) = candidate
            && is_text_leaf(text)
        {
            found.push(text.to_owned());
        }
        found
    })
}

pub fn is_text_leaf(text: &str) -> bool {
    text.chars().count() > MIN_LEAF_CHARS && text.chars().any(char::is_whitespace)
}

/// Printable runs of 30+ characters that read like English prose.
pub fn heuristic_segments(bytes: &[u8]) -> Vec<String> {
    let text: String = bytes.utf8_chunks().map(|chunk| chunk.valid()).collect();
    PRINTABLE_RUN
        .find_iter(&text)
        .map(|m| m.as_str().trim())
        .filter(|run| is_plausible_prose(run))
        .map(str::to_owned)
        .collect()
}

pub fn is_plausible_prose(run: &str) -> bool {
    run.contains(' ') && common_word_hits(run) >= MIN_COMMON_WORDS
}

/// How many distinct entries of the common-word list occur in `run`.
pub fn common_word_hits(run: &str) -> usize {
    let lower = run.to_ascii_lowercase();
    COMMON_WORDS.iter().filter(|w| lower.contains(*w)).count()
}
