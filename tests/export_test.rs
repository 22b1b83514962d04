use chat_history_export::aggregate::DateFilter;
use chat_history_export::utils::FRESHNESS_WINDOW;
use chat_history_export::{
    ExtractConfig, ForeignArtifactPolicy, RunReport, SourceRoots, SourceSelector, WriteOutcome,
    execute, reprocess,
};
use chrono::{Local, NaiveDate, TimeZone};
use filetime::FileTime;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Workspace {
    _dir: TempDir,
    config: ExtractConfig,
}

impl Workspace {
    fn new(source: SourceSelector) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = ExtractConfig {
            output_dir: root.join("out"),
            roots: SourceRoots {
                claude_projects: root.join("claude/projects"),
                gemini_sessions: root.join("gemini/tmp"),
                gemini_archives: root.join("gemini/conversations"),
            },
            source,
            dates: DateFilter::Any,
            project: None,
            limit: None,
            incremental: false,
            freshness: FRESHNESS_WINDOW,
            on_foreign_artifact: ForeignArtifactPolicy::Backup,
        };
        Self { _dir: dir, config }
    }

    fn claude_log(&self) -> PathBuf {
        self.config
            .roots
            .claude_projects
            .join("-home-me-webshop/5f1c.jsonl")
    }

    fn artifact(&self, name: &str) -> PathBuf {
        let month = &name[..7];
        self.config.output_dir.join(month).join(name)
    }

    fn run(&self) -> RunReport {
        execute(&self.config).unwrap()
    }
}

fn claude_line(ts: &str, role: &str, text: &str) -> String {
    format!(
        r#"{{"type":"{role}","timestamp":"{ts}","message":{{"content":[{{"type":"text","text":"{text}"}}]}}}}"#
    )
}

fn append_lines(path: &Path, lines: &[String]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .unwrap();
    for line in lines {
        writeln!(file, "{line}").unwrap();
    }
}

fn indices(text: &str) -> Vec<usize> {
    text.lines()
        .filter_map(|l| l.strip_prefix("### Message "))
        .filter_map(|l| l.split(':').next()?.parse().ok())
        .collect()
}

fn only_outcome(report: &RunReport) -> &WriteOutcome {
    assert_eq!(report.results.len(), 1, "expected a single date");
    report.results[0].outcome.as_ref().unwrap()
}

// ---------------------------------------------------------------------------
// Claude logs
// ---------------------------------------------------------------------------

#[test]
fn rerun_without_new_activity_leaves_artifact_untouched() {
    let ws = Workspace::new(SourceSelector::Claude);
    append_lines(
        &ws.claude_log(),
        &[
            claude_line("2026-01-22T12:00:00.120Z", "user", "hello"),
            claude_line("2026-01-22T12:00:04.800Z", "assistant", "hi there"),
        ],
    );

    let first = ws.run();
    assert!(matches!(
        only_outcome(&first),
        WriteOutcome::Created { messages: 2, .. }
    ));
    let artifact = ws.artifact("2026-01-22-claude.md");
    let bytes = fs::read(&artifact).unwrap();

    let second = ws.run();
    assert!(matches!(
        only_outcome(&second),
        WriteOutcome::NoNewActivity { .. }
    ));
    assert_eq!(fs::read(&artifact).unwrap(), bytes);
}

#[test]
fn new_lines_are_appended_with_continuing_indices() {
    let ws = Workspace::new(SourceSelector::Claude);
    append_lines(
        &ws.claude_log(),
        &[
            claude_line("2026-01-22T12:00:00Z", "user", "first question"),
            claude_line("2026-01-22T12:00:05Z", "assistant", "first answer"),
        ],
    );
    ws.run();

    append_lines(
        &ws.claude_log(),
        &[
            claude_line("2026-01-22T12:10:00Z", "user", "second question"),
            claude_line("2026-01-22T12:10:07Z", "assistant", "second answer"),
            claude_line("2026-01-22T12:11:00Z", "user", "thanks"),
        ],
    );
    let report = ws.run();
    assert!(matches!(
        only_outcome(&report),
        WriteOutcome::Appended { messages: 3, .. }
    ));

    let text = fs::read_to_string(ws.artifact("2026-01-22-claude.md")).unwrap();
    assert_eq!(indices(&text), vec![1, 2, 3, 4, 5]);
    assert_eq!(text.matches("## [Incremental Update: ").count(), 1);
    assert_eq!(text.matches("first answer").count(), 1);

    let third = ws.run();
    assert!(matches!(
        only_outcome(&third),
        WriteOutcome::NoNewActivity { .. }
    ));
}

#[test]
fn date_filter_limits_which_days_are_written() {
    let mut ws = Workspace::new(SourceSelector::Claude);
    append_lines(
        &ws.claude_log(),
        &[claude_line("2026-01-22T12:00:00Z", "user", "tuesday")],
    );
    append_lines(
        &ws.config
            .roots
            .claude_projects
            .join("-home-me-webshop/9a0b.jsonl"),
        &[claude_line("2026-01-23T12:00:00Z", "user", "wednesday")],
    );
    ws.config.dates = DateFilter::Exact(NaiveDate::from_ymd_opt(2026, 1, 23).unwrap());

    let report = ws.run();
    assert!(matches!(
        only_outcome(&report),
        WriteOutcome::Created { messages: 1, .. }
    ));
    assert!(ws.artifact("2026-01-23-claude.md").exists());
    assert!(!ws.artifact("2026-01-22-claude.md").exists());
}

#[test]
fn hand_written_artifact_is_backed_up_before_rewrite() {
    let ws = Workspace::new(SourceSelector::Claude);
    append_lines(
        &ws.claude_log(),
        &[claude_line("2026-01-22T12:00:00Z", "user", "hello")],
    );
    let artifact = ws.artifact("2026-01-22-claude.md");
    fs::create_dir_all(artifact.parent().unwrap()).unwrap();
    fs::write(&artifact, "# My notes\n\nNothing machine readable here.\n").unwrap();

    let report = ws.run();
    assert!(matches!(
        only_outcome(&report),
        WriteOutcome::Overwrote { messages: 1, .. }
    ));
    let backup = artifact.with_file_name("2026-01-22-claude.md.backup");
    assert_eq!(
        fs::read_to_string(backup).unwrap(),
        "# My notes\n\nNothing machine readable here.\n"
    );
    assert!(fs::read_to_string(&artifact).unwrap().contains("hello"));
}

#[test]
fn one_unwritable_date_does_not_stop_the_others() {
    let ws = Workspace::new(SourceSelector::Claude);
    append_lines(
        &ws.claude_log(),
        &[claude_line("2026-01-22T12:00:00Z", "user", "tuesday")],
    );
    append_lines(
        &ws.config
            .roots
            .claude_projects
            .join("-home-me-webshop/9a0b.jsonl"),
        &[claude_line("2026-01-23T12:00:00Z", "user", "wednesday")],
    );
    // A directory squatting on the artifact path makes that date unwritable.
    fs::create_dir_all(ws.artifact("2026-01-22-claude.md")).unwrap();

    let report = ws.run();
    assert!(report.has_errors());
    assert_eq!(report.results.len(), 2);
    let err = report.results[0].outcome.as_ref().unwrap_err();
    assert!(err.to_string().starts_with("2026-01-22: "));
    assert!(matches!(
        report.results[1].outcome,
        Ok(WriteOutcome::Created { messages: 1, .. })
    ));
    assert!(
        fs::read_to_string(ws.artifact("2026-01-23-claude.md"))
            .unwrap()
            .contains("wednesday")
    );
}

#[test]
fn relocated_artifact_keeps_being_updated_in_place() {
    let ws = Workspace::new(SourceSelector::Claude);
    append_lines(
        &ws.claude_log(),
        &[claude_line("2026-01-22T12:00:00Z", "user", "hello")],
    );
    ws.run();

    let moved = ws.config.output_dir.join("archive/2026-01-22-claude.md");
    fs::create_dir_all(moved.parent().unwrap()).unwrap();
    fs::rename(ws.artifact("2026-01-22-claude.md"), &moved).unwrap();

    append_lines(
        &ws.claude_log(),
        &[claude_line("2026-01-22T12:30:00Z", "assistant", "welcome back")],
    );
    let report = ws.run();
    assert!(matches!(
        only_outcome(&report),
        WriteOutcome::Appended { messages: 1, .. }
    ));
    assert!(fs::read_to_string(&moved).unwrap().contains("welcome back"));
    assert!(!ws.artifact("2026-01-22-claude.md").exists());
}

// ---------------------------------------------------------------------------
// Gemini documents and archives
// ---------------------------------------------------------------------------

#[test]
fn session_document_without_start_time_is_dated_by_file_name() {
    let ws = Workspace::new(SourceSelector::Gemini);
    let doc = ws
        .config
        .roots
        .gemini_sessions
        .join("a1b2/chats/session-2026-01-22T09-15-ab12.json");
    fs::create_dir_all(doc.parent().unwrap()).unwrap();
    fs::write(
        &doc,
        r#"{"messages":[
            {"type":"user","content":"what changed?"},
            {"type":"gemini","content":"Two files.","toolCalls":[{"name":"read_file","args":{"path":"a.rs"}}]}
        ]}"#,
    )
    .unwrap();

    let report = ws.run();
    assert!(matches!(
        only_outcome(&report),
        WriteOutcome::Created { messages: 2, .. }
    ));
    let text = fs::read_to_string(ws.artifact("2026-01-22-gemini.md")).unwrap();
    assert!(text.contains("## Full Conversation from Gemini (Aggregated)"));
    assert!(text.contains("- `read_file`: {\"path\":\"a.rs\"}"));
}

#[test]
fn archive_falls_back_to_heuristic_text_and_is_dated_by_mtime() {
    let ws = Workspace::new(SourceSelector::Gemini);
    let archive = ws.config.roots.gemini_archives.join("c0ffee.pb");
    fs::create_dir_all(archive.parent().unwrap()).unwrap();
    let mut bytes = vec![0x0f, 0xff];
    bytes.extend_from_slice(b"we agreed that the migration for the orders table is done");
    bytes.extend_from_slice(&[0x00, 0x02]);
    fs::write(&archive, &bytes).unwrap();

    let modified = Local.with_ymd_and_hms(2026, 1, 20, 12, 0, 0).unwrap();
    filetime::set_file_mtime(&archive, FileTime::from_unix_time(modified.timestamp(), 0))
        .unwrap();

    let report = ws.run();
    assert!(matches!(
        only_outcome(&report),
        WriteOutcome::Created { messages: 1, .. }
    ));
    let text = fs::read_to_string(ws.artifact("2026-01-20-gemini.md")).unwrap();
    assert!(text.contains("### Message 1: Fragment"));
    assert!(text.contains("we agreed that the migration for the orders table is done"));
}

#[test]
fn archive_only_day_reruns_as_no_new_activity() {
    let ws = Workspace::new(SourceSelector::Gemini);
    let archive = ws.config.roots.gemini_archives.join("beef.pb");
    fs::create_dir_all(archive.parent().unwrap()).unwrap();
    let mut bytes = vec![0x0f, 0xff];
    bytes.extend_from_slice(b"we agreed that the release notes for the billing service are done");
    fs::write(&archive, &bytes).unwrap();
    let modified = Local.with_ymd_and_hms(2026, 1, 21, 9, 0, 0).unwrap();
    filetime::set_file_mtime(&archive, FileTime::from_unix_time(modified.timestamp(), 0))
        .unwrap();

    let first = ws.run();
    assert!(matches!(
        only_outcome(&first),
        WriteOutcome::Created { messages: 1, .. }
    ));
    let artifact = ws.artifact("2026-01-21-gemini.md");
    let bytes = fs::read(&artifact).unwrap();

    let second = ws.run();
    assert!(matches!(
        only_outcome(&second),
        WriteOutcome::NoNewActivity { .. }
    ));
    assert_eq!(fs::read(&artifact).unwrap(), bytes);
    assert!(!artifact.with_file_name("2026-01-21-gemini.md.backup").exists());
}

#[test]
fn unreadable_file_does_not_stop_the_run() {
    let ws = Workspace::new(SourceSelector::Gemini);
    let chats = ws.config.roots.gemini_sessions.join("h/chats");
    fs::create_dir_all(&chats).unwrap();
    fs::write(chats.join("session-broken.json"), "{ not json").unwrap();
    fs::write(
        chats.join("session-good.json"),
        r#"{"startTime":"2026-01-22T12:00:00Z","messages":[
            {"type":"user","content":"still here","timestamp":"2026-01-22T12:00:01Z"}
        ]}"#,
    )
    .unwrap();

    let report = ws.run();
    assert_eq!(report.unreadable_files, 1);
    assert!(!report.has_errors());
    assert!(matches!(
        only_outcome(&report),
        WriteOutcome::Created { messages: 1, .. }
    ));
}

#[test]
fn missing_source_roots_produce_an_empty_report() {
    let ws = Workspace::new(SourceSelector::All);
    let report = ws.run();
    assert!(report.results.is_empty());
    assert!(ws.config.output_dir.is_dir());
}

// ---------------------------------------------------------------------------
// Reprocessing an existing transcript
// ---------------------------------------------------------------------------

const TRANSCRIPT: &str = "\
# Complete Chat Session Export

### Message 1: User

**Timestamp:** 2026-01-21T22:00:00

**Content:**

can you look at the flaky test

---

### Message 2: Assistant

**Timestamp:** 2026-01-22T08:15:00

**Content:**

the fixture reused a port

---

";

#[test]
fn transcript_is_split_into_daily_artifacts() {
    let ws = Workspace::new(SourceSelector::Claude);
    let transcript = ws.config.output_dir.with_file_name("old-export.md");
    fs::write(&transcript, TRANSCRIPT).unwrap();

    let report = reprocess(&ws.config, &transcript).unwrap();
    assert_eq!(report.results.len(), 2);
    assert!(!report.has_errors());

    let monday = fs::read_to_string(ws.artifact("2026-01-21-claude.md")).unwrap();
    assert!(monday.contains("## Full Conversation from Claude Code (Reprocessed)"));
    assert!(monday.contains("can you look at the flaky test"));
    assert!(!monday.contains("reused a port"));

    let tuesday = fs::read_to_string(ws.artifact("2026-01-22-claude.md")).unwrap();
    assert_eq!(indices(&tuesday), vec![1]);
    assert!(tuesday.contains("the fixture reused a port"));

    let again = reprocess(&ws.config, &transcript).unwrap();
    assert!(
        again
            .results
            .iter()
            .all(|r| matches!(r.outcome, Ok(WriteOutcome::NoNewActivity { .. })))
    );
}

#[test]
fn missing_transcript_is_an_error() {
    let ws = Workspace::new(SourceSelector::Claude);
    let missing = ws.config.output_dir.with_file_name("nope.md");
    let err = reprocess(&ws.config, &missing).unwrap_err();
    assert!(err.to_string().starts_with("Failed to read transcript: "));
}
