//! Markdown text of an artifact.
//!
//! The `### Message N:` and `**Timestamp:**` lines are read back by
//! [`crate::watermark`] and must not change shape.

use crate::aggregate::DayRecord;
use crate::record::{CanonicalRecord, Message, SourceMethod};
use chrono::{DateTime, Local, NaiveDate};
use std::io::{self, Write};

pub fn write_header<W: Write>(
    writer: &mut W,
    label: &str,
    date: NaiveDate,
    message_count: usize,
    generated_at: DateTime<Local>,
) -> io::Result<()> {
    writeln!(writer, "# Complete Chat Session Export")?;
    writeln!(writer, "## Full Conversation from {label}")?;
    writeln!(writer)?;
    writeln!(writer, "**Date:** {}", date.format("%Y-%m-%d"))?;
    writeln!(writer, "**Platform:** {label}")?;
    writeln!(writer, "**Total Messages:** {message_count}")?;
    writeln!(
        writer,
        "**Export Generated:** {}",
        generated_at.format("%Y-%m-%dT%H:%M:%S%.6f")
    )?;
    writeln!(writer)?;
    writeln!(writer, "---")?;
    writeln!(writer)?;
    writeln!(writer, "## Full Conversation Transcript")?;
    writeln!(writer)?;
    Ok(())
}

/// Marks the start of records appended by a later run.
pub fn write_update_banner<W: Write>(writer: &mut W, at: DateTime<Local>) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer)?;
    writeln!(writer, "---")?;
    writeln!(writer, "## [Incremental Update: {}]", at.format("%H:%M:%S"))?;
    writeln!(writer)?;
    Ok(())
}

/// Write `records` as consecutive blocks numbered from `first_index`.
/// With `session_headings`, a heading opens every run of records that comes
/// from a different session than the previous one.
/// Returns the number of blocks written.
pub fn write_records<W: Write>(
    writer: &mut W,
    records: &[DayRecord<'_>],
    first_index: usize,
    session_headings: bool,
) -> io::Result<usize> {
    let mut current_session = None;
    for (offset, entry) in records.iter().enumerate() {
        if session_headings && current_session != Some(entry.session_number) {
            write_session_heading(writer, entry)?;
            current_session = Some(entry.session_number);
        }
        write_record(writer, first_index + offset, entry)?;
    }
    Ok(records.len())
}

fn write_session_heading<W: Write>(writer: &mut W, entry: &DayRecord<'_>) -> io::Result<()> {
    let session = entry.session;
    writeln!(
        writer,
        "## Session {} [{}] (Started: {})",
        entry.session_number,
        session.method.label(),
        session.start_label()
    )?;
    writeln!(writer)?;
    match session.method {
        SourceMethod::RawHeuristic => writeln!(
            writer,
            "> **Note:** Extracted using raw text heuristics. Output may be fragmented."
        )?,
        SourceMethod::StructuralDecode => writeln!(
            writer,
            "> **Note:** Extracted from a binary archive without a schema. Structure is flattened."
        )?,
        _ => return Ok(()),
    }
    writeln!(writer)
}

pub fn write_record<W: Write>(
    writer: &mut W,
    index: usize,
    entry: &DayRecord<'_>,
) -> io::Result<()> {
    match entry.record {
        CanonicalRecord::Message(message) => write_message(writer, index, message),
        CanonicalRecord::Fragment(fragment) => {
            writeln!(writer, "### Message {index}: Fragment")?;
            writeln!(writer)?;
            if let Some(timestamp) = entry.marker_timestamp() {
                writeln!(writer, "**Timestamp:** {timestamp}")?;
                writeln!(writer)?;
            }
            writeln!(writer, "{}", fragment.text)?;
            writeln!(writer)?;
            writeln!(writer, "---")?;
            writeln!(writer)
        }
    }
}

fn write_message<W: Write>(writer: &mut W, index: usize, message: &Message) -> io::Result<()> {
    let timestamp = message
        .timestamp
        .as_ref()
        .map(|ts| ts.rendered())
        .unwrap_or_else(|| "N/A".to_owned());

    writeln!(writer, "### Message {index}: {}", message.role.label())?;
    writeln!(writer)?;
    writeln!(writer, "**Timestamp:** {timestamp}")?;
    writeln!(writer)?;

    if let Some(thinking) = &message.thinking {
        writeln!(writer, "**Thinking Block:**")?;
        writeln!(writer)?;
        writeln!(writer, "```")?;
        writeln!(writer, "{thinking}")?;
        writeln!(writer, "```")?;
        writeln!(writer)?;
    }

    if !message.content.is_empty() {
        writeln!(writer, "**Content:**")?;
        writeln!(writer)?;
        writeln!(writer, "{}", message.content)?;
        writeln!(writer)?;
    }

    if !message.tool_calls.is_empty() {
        writeln!(writer, "**Tool Calls:**")?;
        for call in &message.tool_calls {
            writeln!(writer, "- `{}`: {}", call.name, call.args)?;
        }
        writeln!(writer)?;
    }

    writeln!(writer, "---")?;
    writeln!(writer)
}
