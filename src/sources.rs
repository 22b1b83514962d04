//! Where session files are found, and which artifact each source feeds.

use crate::decode::SourceFormat;
use crate::merge::ArtifactLabel;
use crate::utils::SourceRoots;
use serde::Deserialize;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Which sources a run reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceSelector {
    #[default]
    All,
    Claude,
    Gemini,
}

impl SourceSelector {
    pub fn sources(self) -> &'static [Source] {
        match self {
            SourceSelector::All => &[Source::Claude, Source::Gemini],
            SourceSelector::Claude => &[Source::Claude],
            SourceSelector::Gemini => &[Source::Gemini],
        }
    }
}

/// A producer of session files. Each source writes one artifact per day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Claude,
    Gemini,
}

impl Source {
    pub fn label(self) -> ArtifactLabel {
        match self {
            Source::Claude => ArtifactLabel {
                slug: "claude",
                title: "Claude Code",
            },
            Source::Gemini => ArtifactLabel {
                slug: "gemini",
                title: "Gemini (Aggregated)",
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Discovery<'a> {
    /// Case-insensitive fragment a Claude project directory name must contain.
    pub project: Option<&'a str>,
    /// Cap on each Gemini file list.
    pub limit: Option<usize>,
}

/// Files to decode for `source`, sorted by path.
pub fn discover(
    source: Source,
    roots: &SourceRoots,
    options: &Discovery<'_>,
) -> Vec<(PathBuf, SourceFormat)> {
    match source {
        Source::Claude => claude_logs(&roots.claude_projects, options.project)
            .into_iter()
            .map(|p| (p, SourceFormat::LineRecords))
            .collect(),
        Source::Gemini => {
            let mut sessions = gemini_sessions(&roots.gemini_sessions);
            let mut archives = gemini_archives(&roots.gemini_archives);
            if let Some(limit) = options.limit {
                sessions.truncate(limit);
                archives.truncate(limit);
            }
            sessions
                .into_iter()
                .map(|p| (p, SourceFormat::SessionDocument))
                .chain(archives.into_iter().map(|p| (p, SourceFormat::BinaryArchive)))
                .collect()
        }
    }
}

/// Every non-empty `*.jsonl` under each project directory, subagent logs included.
pub fn claude_logs(projects_root: &Path, project: Option<&str>) -> Vec<PathBuf> {
    let wanted = project.map(str::to_lowercase);
    let mut found = Vec::new();

    for project_dir in WalkDir::new(projects_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_dir())
    {
        if let Some(wanted) = &wanted {
            let name = project_dir.file_name().to_string_lossy().to_lowercase();
            if !name.contains(wanted.as_str()) {
                debug!(project = %name, "skipping project outside filter");
                continue;
            }
        }
        found.extend(
            files_under(project_dir.path(), None)
                .filter(|e| has_extension(e, "jsonl"))
                .filter(|e| e.metadata().is_ok_and(|m| m.len() > 0))
                .map(DirEntry::into_path),
        );
    }

    found.sort();
    found
}

/// `session-*.json` anywhere under `root`.
pub fn gemini_sessions(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = files_under(root, None)
        .filter(|e| {
            has_extension(e, "json")
                && e.file_name()
                    .to_str()
                    .is_some_and(|n| n.starts_with("session-"))
        })
        .map(DirEntry::into_path)
        .collect();
    found.sort();
    found
}

/// `*.pb` directly inside `root`.
pub fn gemini_archives(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = files_under(root, Some(1))
        .filter(|e| has_extension(e, "pb"))
        .map(DirEntry::into_path)
        .collect();
    found.sort();
    found
}

// A missing root yields an error entry from walkdir; flatten drops it.
fn files_under(root: &Path, max_depth: Option<usize>) -> impl Iterator<Item = DirEntry> {
    let mut walk = WalkDir::new(root).min_depth(1);
    if let Some(depth) = max_depth {
        walk = walk.max_depth(depth);
    }
    walk.into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
}

fn has_extension(entry: &DirEntry, ext: &str) -> bool {
    entry.path().extension() == Some(OsStr::new(ext))
}
