//! Source-independent representation of extracted conversation content.
//!
//! Every decoder turns one source file into a [`Session`] of
//! [`CanonicalRecord`]s. Records are either real messages with a [`Role`]
//! or anonymous text [`Fragment`]s recovered from binary archives.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::path::{Path, PathBuf};

/// Format of every timestamp written to an artifact. Fixed width, so
/// lexicographic order matches chronological order.
pub const RENDERED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

// ---------------------------------------------------------------------------
// Role / tool calls
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// A tool invocation as recorded by the assistant. Rendered, never executed.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    /// Arguments, already serialized for display.
    pub args: String,
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// A timestamp as found in a source file: the raw text plus, when it parses,
/// the UTC instant it denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timestamp {
    raw: String,
    instant: Option<NaiveDateTime>,
}

impl Timestamp {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let instant = parse_instant(&raw);
        Self { raw, instant }
    }

    /// The instant in UTC, if the raw text was a recognizable ISO-8601 form.
    pub fn instant(&self) -> Option<NaiveDateTime> {
        self.instant
    }

    /// The form written after `**Timestamp:**` in an artifact.
    /// Unparsable timestamps are passed through verbatim.
    pub fn rendered(&self) -> String {
        match self.instant {
            Some(instant) => instant.format(RENDERED_FORMAT).to_string(),
            None => self.raw.clone(),
        }
    }
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

fn parse_instant(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One conversational message from a structured source.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Assistant reasoning trace, when the source recorded one.
    pub thinking: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub timestamp: Option<Timestamp>,
}

/// Text recovered from a binary archive. No role and no timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalRecord {
    Message(Message),
    Fragment(Fragment),
}

impl CanonicalRecord {
    pub fn timestamp(&self) -> Option<&Timestamp> {
        match self {
            CanonicalRecord::Message(m) => m.timestamp.as_ref(),
            CanonicalRecord::Fragment(_) => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            CanonicalRecord::Message(m) => Some(m.role),
            CanonicalRecord::Fragment(_) => None,
        }
    }
}

/// Stable sort by rendered timestamp; records without one sort first.
pub fn sort_by_timestamp(records: &mut [CanonicalRecord]) {
    records.sort_by_cached_key(|r| r.timestamp().map(Timestamp::rendered));
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// How a session's records were obtained. Shown to the reader of the
/// transcript so heuristically recovered text is never mistaken for a
/// faithful message log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SourceMethod {
    LineRecords,
    SessionDocument,
    StructuralDecode,
    RawHeuristic,
    /// Re-read from a transcript this tool (or an earlier version) wrote.
    MarkdownExport,
}

impl SourceMethod {
    pub fn label(self) -> &'static str {
        match self {
            SourceMethod::LineRecords => "Line-delimited log",
            SourceMethod::SessionDocument => "Session document",
            SourceMethod::StructuralDecode => "Binary structural decode",
            SourceMethod::RawHeuristic => "Raw heuristic fallback",
            SourceMethod::MarkdownExport => "Markdown export",
        }
    }
}

/// The records recovered from one source file.
#[derive(Debug, Clone)]
pub struct Session {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub records: Vec<CanonicalRecord>,
    pub method: SourceMethod,
    pub source: PathBuf,
}

impl Session {
    pub fn new(
        started_at: NaiveDateTime,
        records: Vec<CanonicalRecord>,
        method: SourceMethod,
        source: &Path,
    ) -> Self {
        Self {
            date: started_at.date(),
            start_time: started_at.time(),
            records,
            method,
            source: source.to_path_buf(),
        }
    }

    pub fn count(&self) -> usize {
        self.records.len()
    }

    pub fn started_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    /// `HHMMSS`, as shown in session headings.
    pub fn start_label(&self) -> String {
        self.start_time.format("%H%M%S").to_string()
    }
}
