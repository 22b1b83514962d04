//! Recovery of "what has already been exported" from an artifact's own text.
//!
//! No cursor is persisted anywhere else. The last `**Timestamp:**` and
//! `### Message N:` markers within the final [`TAIL_BYTES`] of the file are
//! the watermark. Markers further back are never seen, however large the
//! artifact grows.

use regex::Regex;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;
use tracing::warn;

pub const TAIL_BYTES: u64 = 10 * 1024;

static TIMESTAMP_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Timestamp:\*\* ([\d\-T:]+)").expect("valid timestamp marker regex")
});
static INDEX_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"### Message (\d+):").expect("valid index marker regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Watermark {
    /// Rendered timestamp of the last message written. `None` means no delta
    /// can be computed, not that the artifact is empty.
    pub last_timestamp: Option<String>,
    pub last_index: usize,
}

/// Read the watermark of the artifact at `path`.
/// A missing or unreadable file yields the empty watermark.
pub fn recover(path: &Path) -> Watermark {
    if !path.exists() {
        return Watermark::default();
    }
    match read_tail(path, TAIL_BYTES) {
        Ok(tail) => scan(&tail),
        Err(e) => {
            warn!(path = %path.display(), "could not read artifact tail: {e}");
            Watermark::default()
        }
    }
}

fn read_tail(path: &Path, max: u64) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    file.seek(SeekFrom::Start(len.saturating_sub(max)))?;
    let mut buf = Vec::with_capacity(max.min(len) as usize);
    file.read_to_end(&mut buf)?;
    // The seek may land inside a multi-byte character.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Last occurrence of each marker in `text`.
pub fn scan(text: &str) -> Watermark {
    let last_timestamp = TIMESTAMP_MARKER
        .captures_iter(text)
        .last()
        .map(|c| c[1].to_owned());
    let last_index = INDEX_MARKER
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<usize>().ok())
        .last()
        .unwrap_or(0);
    Watermark {
        last_timestamp,
        last_index,
    }
}
