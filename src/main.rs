use chat_history_export::aggregate::DateFilter;
use chat_history_export::utils::{self, ExtractConfig, SourceRoots};
use chat_history_export::pipeline::{self, ReportLine};
use chat_history_export::{ForeignArtifactPolicy, SourceSelector};
use chrono::{Local, NaiveDate};
use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

/// Export AI assistant chat history to one Markdown file per source per day.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Which sources to read.
    #[arg(long, value_enum, default_value_t = SourceSelector::All)]
    source: SourceSelector,

    /// Only export this date (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Only export today's date.
    #[arg(long, conflicts_with = "date")]
    today: bool,

    /// Only export dates on or after this one (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    after: Option<NaiveDate>,

    /// Only export dates on or before this one (YYYY-MM-DD).
    #[arg(long, value_name = "DATE", value_parser = parse_date)]
    before: Option<NaiveDate>,

    /// Only read Claude projects whose directory name contains this text.
    #[arg(long, value_name = "FRAGMENT")]
    project: Option<String>,

    /// Leave artifacts modified within the last hour untouched.
    #[arg(long)]
    incremental: bool,

    /// Read at most N Gemini session documents and N archives.
    #[arg(long, value_name = "N")]
    limit: Option<usize>,

    /// Directory to write artifacts into.
    /// Defaults to ./chat-history if not set in config.
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/chat-history-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Re-split an existing Claude Markdown transcript into daily artifacts
    /// instead of reading the source directories.
    #[arg(long, value_name = "PATH", conflicts_with_all = ["source", "project", "limit"])]
    file: Option<PathBuf>,

    /// What to do with an existing artifact that has no readable watermark.
    #[arg(long, value_enum, value_name = "POLICY")]
    on_foreign_artifact: Option<ForeignArtifactPolicy>,

    /// Log each file decoded and each decision taken.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Print nothing but errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    output_dir: Option<PathBuf>,
    claude_projects_dir: Option<PathBuf>,
    gemini_sessions_dir: Option<PathBuf>,
    gemini_archives_dir: Option<PathBuf>,
    on_foreign_artifact: Option<ForeignArtifactPolicy>,
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got {s:?} ({e})"))
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("chat-history-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let fallback = match (verbose, quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "warn",
    };
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Resolve output_dir (CLI > Config > Default)
    let output_dir = cli
        .output_dir
        .or(file_cfg.output_dir)
        .unwrap_or_else(|| PathBuf::from("chat-history"));

    // 3. Resolve source roots (Config > Home)
    let home = dirs::home_dir()
        .ok_or_else(|| eyre!("Could not determine the home directory."))?;
    let defaults = SourceRoots::under_home(&home);
    let roots = SourceRoots {
        claude_projects: file_cfg
            .claude_projects_dir
            .unwrap_or(defaults.claude_projects),
        gemini_sessions: file_cfg
            .gemini_sessions_dir
            .unwrap_or(defaults.gemini_sessions),
        gemini_archives: file_cfg
            .gemini_archives_dir
            .unwrap_or(defaults.gemini_archives),
    };

    // 4. Resolve the date filter (--today is --date <local today>)
    let exact = cli
        .date
        .or_else(|| cli.today.then(|| Local::now().date_naive()));
    let dates = DateFilter::new(exact, cli.after, cli.before);

    // 5. Build the Extract Config
    let config = ExtractConfig {
        output_dir,
        roots,
        source: cli.source,
        dates,
        project: cli.project,
        limit: cli.limit,
        incremental: cli.incremental,
        freshness: utils::FRESHNESS_WINDOW,
        on_foreign_artifact: cli
            .on_foreign_artifact
            .or(file_cfg.on_foreign_artifact)
            .unwrap_or_default(),
    };

    // 6. Run the Business Logic
    if cli.today && !cli.quiet {
        for note in pipeline::update_notices(&config, Local::now().date_naive()) {
            eprintln!("{note}");
        }
    }
    let report = match &cli.file {
        Some(transcript) => pipeline::reprocess(&config, transcript)?,
        None => pipeline::execute(&config)?,
    };

    for line in report.lines(cli.quiet) {
        match line {
            ReportLine::Result(line) => println!("{line}"),
            ReportLine::Error(line) => eprintln!("{line}"),
        }
    }
    if !cli.quiet {
        eprintln!("{}", report.summary());
    }

    if report.has_errors() {
        return Err(eyre!("Some dates could not be written."));
    }
    Ok(())
}
