//! Per-day write decisions: create, append the delta, or replace.
//!
//! ```text
//! incremental && modified < freshness ago  -> SkippedFresh (nothing read)
//! no artifact (or empty)                  -> Created
//! watermark recovered                     -> Appended | NoNewActivity
//! index markers but no timestamp          -> NoNewActivity
//! artifact without markers                -> Overwrote (after .backup) | ForeignArtifact
//! ```
//!
//! There is no locking. Two runs writing the same day at once can interleave.

use crate::aggregate::{DailyAggregate, DayRecord};
use crate::error::WriteError;
use crate::render;
use crate::watermark;
use chrono::{DateTime, Local, NaiveDate};
use serde::Deserialize;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// What to do with an existing artifact whose watermark cannot be read
/// (hand-edited, truncated, or written by something else).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ForeignArtifactPolicy {
    /// Copy it to `<name>.backup`, then write a fresh artifact.
    #[default]
    Backup,
    /// Leave it untouched and report an error for that date.
    Reject,
}

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub incremental: bool,
    pub freshness: Duration,
    pub on_foreign_artifact: ForeignArtifactPolicy,
}

/// How the artifact label appears in file names and headers.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactLabel {
    /// File name suffix: `{date}-{slug}.md`.
    pub slug: &'static str,
    /// Shown in the artifact header.
    pub title: &'static str,
}

impl ArtifactLabel {
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!("{}-{}.md", date.format("%Y-%m-%d"), self.slug)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    Saved(PathBuf),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Created {
        file: String,
        messages: usize,
    },
    Appended {
        file: String,
        messages: usize,
    },
    NoNewActivity {
        file: String,
        last_sync: String,
    },
    Overwrote {
        file: String,
        messages: usize,
        backup: BackupStatus,
    },
    SkippedFresh {
        file: String,
        age: Duration,
    },
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Created { file, messages } => {
                write!(f, "Created {file} with {messages} messages")
            }
            WriteOutcome::Appended { file, messages } => {
                write!(f, "Appended {messages} new messages to {file}")
            }
            WriteOutcome::NoNewActivity { file, last_sync } => {
                write!(f, "No new activity for {file} (last sync: {last_sync})")
            }
            WriteOutcome::Overwrote {
                file,
                messages,
                backup,
            } => {
                write!(f, "Overwrote {file} with {messages} messages")?;
                match backup {
                    BackupStatus::Saved(path) => write!(
                        f,
                        " (backup saved to {})",
                        path.file_name().unwrap_or_default().to_string_lossy()
                    ),
                    BackupStatus::Failed(reason) => write!(f, " (backup failed: {reason})"),
                }
            }
            WriteOutcome::SkippedFresh { file, age } => write!(
                f,
                "Skipped {file} (already current, modified {} min ago)",
                age.as_secs() / 60
            ),
        }
    }
}

/// Bring the artifact at `path` up to date with `day`.
pub fn merge_day(
    path: &Path,
    label: ArtifactLabel,
    day: &DailyAggregate,
    options: &MergeOptions,
    now: DateTime<Local>,
) -> Result<WriteOutcome, WriteError> {
    let file = label.file_name(day.date);

    if options.incremental
        && let Some(age) = fresh_age(path, now.into(), options.freshness)
    {
        debug!(%file, age_secs = age.as_secs(), "artifact is fresh, skipping");
        return Ok(WriteOutcome::SkippedFresh { file, age });
    }

    let mark = watermark::recover(path);
    if let Some(last_sync) = mark.last_timestamp {
        return append_delta(path, label, day, &last_sync, mark.last_index, now);
    }
    if mark.last_index > 0 {
        // Our own blocks, but none of them timestamped: no delta is computable.
        debug!(%file, last_index = mark.last_index, "artifact has no timestamp markers");
        return Ok(WriteOutcome::NoNewActivity {
            file,
            last_sync: "N/A".to_owned(),
        });
    }

    let has_content = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
    if !has_content {
        let messages = write_fresh(path, label, day, now)?;
        info!(%file, messages, "created artifact");
        return Ok(WriteOutcome::Created { file, messages });
    }

    let backup = match options.on_foreign_artifact {
        ForeignArtifactPolicy::Reject => {
            return Err(WriteError::ForeignArtifact {
                path: path.to_path_buf(),
                date: day.date,
            });
        }
        ForeignArtifactPolicy::Backup => back_up(path),
    };
    let messages = write_fresh(path, label, day, now)?;
    info!(%file, messages, "replaced artifact without watermark");
    Ok(WriteOutcome::Overwrote {
        file,
        messages,
        backup,
    })
}

/// Age of the artifact if it was modified within `window` of `now`.
pub fn fresh_age(path: &Path, now: SystemTime, window: Duration) -> Option<Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    // A clock that moved backwards makes the file look brand new.
    let age = now.duration_since(modified).unwrap_or_default();
    (age < window).then_some(age)
}

fn append_delta(
    path: &Path,
    label: ArtifactLabel,
    day: &DailyAggregate,
    last_sync: &str,
    last_index: usize,
    now: DateTime<Local>,
) -> Result<WriteOutcome, WriteError> {
    let file = label.file_name(day.date);
    let fresh: Vec<DayRecord<'_>> = day
        .ordered_records()
        .into_iter()
        .filter(|r| r.marker_timestamp().is_some_and(|ts| ts.as_str() > last_sync))
        .collect();

    if fresh.is_empty() {
        return Ok(WriteOutcome::NoNewActivity {
            file,
            last_sync: last_sync.to_owned(),
        });
    }

    let write_err = |source| WriteError::Write {
        path: path.to_path_buf(),
        date: day.date,
        source,
    };
    let handle = OpenOptions::new()
        .append(true)
        .open(path)
        .map_err(write_err)?;
    let mut writer = BufWriter::new(handle);
    render::write_update_banner(&mut writer, now).map_err(write_err)?;
    let messages = render::write_records(&mut writer, &fresh, last_index + 1, day.spans_sessions())
        .map_err(write_err)?;
    writer.flush().map_err(write_err)?;

    info!(%file, messages, "appended to artifact");
    Ok(WriteOutcome::Appended { file, messages })
}

fn write_fresh(
    path: &Path,
    label: ArtifactLabel,
    day: &DailyAggregate,
    now: DateTime<Local>,
) -> Result<usize, WriteError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
            path: parent.to_path_buf(),
            date: day.date,
            source,
        })?;
    }

    let write_err = |source| WriteError::Write {
        path: path.to_path_buf(),
        date: day.date,
        source,
    };
    let records = day.ordered_records();
    let mut writer = BufWriter::new(File::create(path).map_err(write_err)?);
    render::write_header(&mut writer, label.title, day.date, records.len(), now)
        .map_err(write_err)?;
    let written = render::write_records(&mut writer, &records, 1, day.spans_sessions())
        .map_err(write_err)?;
    writer.flush().map_err(write_err)?;
    Ok(written)
}

fn back_up(path: &Path) -> BackupStatus {
    let mut backup = path.as_os_str().to_owned();
    backup.push(".backup");
    let backup = PathBuf::from(backup);
    match fs::copy(path, &backup) {
        Ok(_) => BackupStatus::Saved(backup),
        Err(e) => {
            warn!(path = %path.display(), "backup failed, overwriting anyway: {e}");
            BackupStatus::Failed(e.to_string())
        }
    }
}
