//! One extraction run: discover, decode, group by day, merge each day.
//!
//! Failures are isolated. A file that cannot be decoded is skipped with a
//! warning; a date that cannot be written becomes an error line in the
//! report while the remaining dates carry on.

use crate::aggregate::{self, DailyAggregate};
use crate::decode::markdown_export;
use crate::error::WriteError;
use crate::merge::{self, ArtifactLabel, MergeOptions, WriteOutcome};
use crate::output::OutputTree;
use crate::record::Session;
use crate::sources::{self, Discovery, Source};
use crate::utils::ExtractConfig;
use chrono::{Local, NaiveDate};
use eyre::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Result of one date for one source.
#[derive(Debug)]
pub struct DateResult {
    pub source: Source,
    pub outcome: Result<WriteOutcome, WriteError>,
}

impl fmt::Display for DateResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Ok(outcome) => write!(f, "{outcome}"),
            Err(e) => write!(f, "Error: {e}"),
        }
    }
}

/// A line for the user. Errors go to stderr and are never silenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    Result(String),
    Error(String),
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub results: Vec<DateResult>,
    /// Source files that failed to decode.
    pub unreadable_files: usize,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let (mut created, mut appended, mut unchanged, mut overwritten, mut skipped, mut errors) =
            (0, 0, 0, 0, 0, 0);
        for result in &self.results {
            match &result.outcome {
                Ok(WriteOutcome::Created { .. }) => created += 1,
                Ok(WriteOutcome::Appended { .. }) => appended += 1,
                Ok(WriteOutcome::NoNewActivity { .. }) => unchanged += 1,
                Ok(WriteOutcome::Overwrote { .. }) => overwritten += 1,
                Ok(WriteOutcome::SkippedFresh { .. }) => skipped += 1,
                Err(_) => errors += 1,
            }
        }

        let mut summary = format!(
            "Done. {created} created, {appended} appended, {unchanged} unchanged, \
             {overwritten} overwritten, {skipped} skipped."
        );
        if errors > 0 {
            summary.push_str(&format!(" Completed with {errors} error(s)."));
        }
        if self.unreadable_files > 0 {
            summary.push_str(&format!(
                " {} source file(s) could not be read.",
                self.unreadable_files
            ));
        }
        summary
    }

    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_err())
    }

    /// One line per date, prefixed with the source. With `quiet` only the
    /// failures remain.
    pub fn lines(&self, quiet: bool) -> Vec<ReportLine> {
        self.results
            .iter()
            .filter_map(|result| {
                let line = format!("[{}] {result}", result.source.label().slug);
                match result.outcome {
                    Err(_) => Some(ReportLine::Error(line)),
                    Ok(_) if quiet => None,
                    Ok(_) => Some(ReportLine::Result(line)),
                }
            })
            .collect()
    }
}

/// The main entry point for the business logic.
pub fn execute(config: &ExtractConfig) -> Result<RunReport> {
    let tree = prepare_output(config)?;
    let discovery = Discovery {
        project: config.project.as_deref(),
        limit: config.limit,
    };

    let mut report = RunReport::default();
    for &source in config.source.sources() {
        let (sessions, failed) = load_sessions(source, config, &discovery);
        report.unreadable_files += failed;
        merge_sessions(&tree, source, source.label(), sessions, config, &mut report);
    }

    Ok(report)
}

/// File the blocks of an existing Markdown transcript into the daily Claude
/// artifacts, through the same merge path as a normal run.
pub fn reprocess(config: &ExtractConfig, transcript: &Path) -> Result<RunReport> {
    let sessions = markdown_export::split_by_day(transcript)
        .wrap_err_with(|| format!("Failed to read transcript: {}", transcript.display()))?;
    let tree = prepare_output(config)?;

    let label = ArtifactLabel {
        title: "Claude Code (Reprocessed)",
        ..Source::Claude.label()
    };
    let mut report = RunReport::default();
    merge_sessions(&tree, Source::Claude, label, sessions, config, &mut report);
    Ok(report)
}

/// A note per artifact that already exists for `date`, with its size in KiB.
pub fn update_notices(config: &ExtractConfig, date: NaiveDate) -> Vec<String> {
    let tree = OutputTree::new(&config.output_dir);
    config
        .source
        .sources()
        .iter()
        .filter_map(|source| tree.existing(&source.label().file_name(date)))
        .map(|path| {
            let size_kb = fs::metadata(&path).map_or(0, |m| m.len() / 1024);
            let name = path.file_name().unwrap_or_default().to_string_lossy();
            format!("Note: Updating existing file: {name} ({size_kb}K)")
        })
        .collect()
}

fn prepare_output(config: &ExtractConfig) -> Result<OutputTree> {
    fs::create_dir_all(&config.output_dir).wrap_err_with(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_dir.display()
        )
    })?;
    Ok(OutputTree::new(&config.output_dir))
}

fn merge_sessions(
    tree: &OutputTree,
    source: Source,
    label: ArtifactLabel,
    sessions: Vec<Session>,
    config: &ExtractConfig,
    report: &mut RunReport,
) {
    let options = MergeOptions {
        incremental: config.incremental,
        freshness: config.freshness,
        on_foreign_artifact: config.on_foreign_artifact,
    };
    let days: Vec<DailyAggregate> = aggregate::group_by_date(sessions)
        .into_iter()
        .filter(|day| config.dates.matches(day.date))
        .collect();
    info!(source = label.slug, days = days.len(), "merging days");

    for day in &days {
        let path = tree.resolve(&label.file_name(day.date));
        let outcome = merge::merge_day(&path, label, day, &options, Local::now());
        if let Err(e) = &outcome {
            error!(date = %day.date, "write failed: {e}");
        }
        report.results.push(DateResult { source, outcome });
    }
}

fn load_sessions(
    source: Source,
    config: &ExtractConfig,
    discovery: &Discovery<'_>,
) -> (Vec<Session>, usize) {
    let files = sources::discover(source, &config.roots, discovery);
    info!(source = source.label().slug, files = files.len(), "found source files");

    let mut sessions = Vec::new();
    let mut failed = 0;
    for (path, format) in files {
        let decoder = format.decoder();
        match decoder.decode(&path) {
            Ok(Some(session)) => sessions.push(session),
            Ok(None) => debug!(path = %path.display(), decoder = decoder.name(), "nothing to file"),
            Err(e) => {
                failed += 1;
                warn!(decoder = decoder.name(), "skipping file: {e}");
            }
        }
    }
    (sessions, failed)
}
