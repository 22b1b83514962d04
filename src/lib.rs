//! # chat-history-export
//!
//! A CLI tool that collects AI coding-assistant conversations from the local
//! files the assistants leave behind and files them into one Markdown
//! document per source per day.
//!
//! ## What it does
//!
//! Three on-disk shapes are understood:
//!
//! - line-delimited JSON logs (Claude Code, `~/.claude/projects/**/*.jsonl`),
//! - single-file JSON session documents (Gemini CLI, `~/.gemini/tmp/**/session-*.json`),
//! - binary archives with no schema (`~/.gemini/antigravity/conversations/*.pb`),
//!   recovered structurally where possible and by printable-text heuristics
//!   otherwise.
//!
//! Every session is normalized into the same record model, grouped by the
//! calendar day it started on, and rendered as `YYYY-MM/YYYY-MM-DD-{source}.md`.
//! Source files are only ever read.
//!
//! ## Incremental export
//!
//! Artifacts carry their own progress. On repeated runs the last message
//! timestamp and index are read back from the tail of the existing file and
//! only newer messages are appended under an `Incremental Update` banner.
//! Files without those markers are backed up to `.backup` before being
//! rewritten (or left alone, with `--on-foreign-artifact reject`).
//!
//! ## Usage
//!
//! ```sh
//! # Everything, into ./chat-history
//! chat-history-export
//!
//! # Today's Claude sessions for one project
//! chat-history-export --source claude --today --project webshop
//!
//! # File an old Claude export into the daily transcripts
//! chat-history-export --file ~/old-session-export.md
//! ```
//!
//! Preferences can be persisted in `~/.config/chat-history-export/config.toml`.

pub mod aggregate;
pub mod decode;
pub mod error;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod render;
pub mod sources;
pub mod utils;
pub mod watermark;

pub use error::{DecodeError, WireError, WriteError};
pub use merge::{ForeignArtifactPolicy, WriteOutcome};
pub use pipeline::{RunReport, execute, reprocess};
pub use sources::SourceSelector;
pub use utils::{ExtractConfig, SourceRoots};
