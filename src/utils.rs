use crate::aggregate::DateFilter;
use crate::merge::ForeignArtifactPolicy;
use crate::sources::SourceSelector;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

/// Artifacts modified more recently than this are left alone in incremental mode.
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(3600);

/// Configuration required to run the extraction.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    pub output_dir: PathBuf,
    pub roots: SourceRoots,
    pub source: SourceSelector,
    pub dates: DateFilter,
    pub project: Option<String>,
    pub limit: Option<usize>,
    pub incremental: bool,
    pub freshness: Duration,
    pub on_foreign_artifact: ForeignArtifactPolicy,
}

/// Where each source format lives on disk.
#[derive(Clone, Debug)]
pub struct SourceRoots {
    /// Parent of one directory per project, each holding `*.jsonl` logs.
    pub claude_projects: PathBuf,
    /// Searched recursively for `session-*.json` documents.
    pub gemini_sessions: PathBuf,
    /// Flat directory of `*.pb` archives.
    pub gemini_archives: PathBuf,
}

impl SourceRoots {
    pub fn under_home(home: &Path) -> Self {
        Self {
            claude_projects: home.join(".claude/projects"),
            gemini_sessions: home.join(".gemini/tmp"),
            gemini_archives: home.join(".gemini/antigravity/conversations"),
        }
    }
}

/// Modification time of `path` as local wall-clock time.
pub fn modified_local(path: &Path) -> std::io::Result<NaiveDateTime> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(DateTime::<Local>::from(modified).naive_local())
}

static DATE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("valid date token regex"));

/// First `YYYY-MM-DD` token in the file name that is a real calendar date.
pub fn date_in_file_name(path: &Path) -> Option<NaiveDate> {
    let name = path.file_name()?.to_str()?;
    DATE_TOKEN
        .find_iter(name)
        .find_map(|m| NaiveDate::parse_from_str(m.as_str(), "%Y-%m-%d").ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_token_is_found_anywhere_in_the_name() {
        let path = Path::new("/tmp/chats/session-2026-01-22T10-30-abc.json");
        assert_eq!(
            date_in_file_name(path),
            NaiveDate::from_ymd_opt(2026, 1, 22)
        );
    }

    #[test]
    fn impossible_dates_are_ignored() {
        assert_eq!(date_in_file_name(Path::new("session-2026-13-40.json")), None);
        assert_eq!(date_in_file_name(Path::new("session.json")), None);
    }
}
