//! Line-delimited conversation logs (one JSON record per line).
//!
//! Lines are independent: a malformed line is skipped and the rest of the
//! file is still read. Only `user` and `assistant` records become messages.

use super::{DecodeResult, SessionDecoder, display_args, flatten_text, non_empty};
use crate::error::DecodeError;
use crate::record::{
    CanonicalRecord, Message, Role, Session, SourceMethod, Timestamp, ToolCall, sort_by_timestamp,
};
use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct LineRecordDecoder;

#[derive(Deserialize)]
struct LogLine {
    #[serde(rename = "type")]
    kind: Option<String>,
    timestamp: Option<String>,
    message: Option<LogMessage>,
}

#[derive(Deserialize)]
struct LogMessage {
    #[serde(default)]
    content: Value,
}

impl SessionDecoder for LineRecordDecoder {
    fn name(&self) -> &'static str {
        "line-delimited log"
    }

    fn decode(&self, path: &Path) -> DecodeResult {
        let file = File::open(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut started: Option<NaiveDateTime> = None;
        let mut records = Vec::new();

        for (lineno, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(path = %path.display(), "read stopped at line {}: {e}", lineno + 1);
                    break;
                }
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry: LogLine = match serde_json::from_slice(&line) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(path = %path.display(), "skipping line {}: {e}", lineno + 1);
                    continue;
                }
            };

            let timestamp = entry.timestamp.as_deref().map(Timestamp::parse);
            if started.is_none() {
                started = timestamp.as_ref().and_then(Timestamp::instant);
            }
            if let Some(message) = entry.into_message(timestamp) {
                records.push(CanonicalRecord::Message(message));
            }
        }

        let Some(started) = started else {
            debug!(path = %path.display(), "no parseable timestamp, session cannot be dated");
            return Ok(None);
        };
        if records.is_empty() {
            return Ok(None);
        }

        sort_by_timestamp(&mut records);
        Ok(Some(Session::new(
            started,
            records,
            SourceMethod::LineRecords,
            path,
        )))
    }
}

impl LogLine {
    fn into_message(self, timestamp: Option<Timestamp>) -> Option<Message> {
        let role = match self.kind.as_deref() {
            Some("user") => Role::User,
            Some("assistant") => Role::Assistant,
            _ => return None,
        };
        let content = self.message?.content;

        match role {
            Role::User => {
                let text = non_empty(flatten_text(&content, ""))?;
                Some(Message {
                    role,
                    content: text,
                    thinking: None,
                    tool_calls: Vec::new(),
                    timestamp,
                })
            }
            Role::Assistant => {
                let parts = AssistantParts::collect(&content);
                let thinking = non_empty(parts.thinking.join("\n"));
                let text = non_empty(parts.text.join("\n\n"));
                if thinking.is_none() && text.is_none() {
                    return None;
                }
                Some(Message {
                    role,
                    content: text.unwrap_or_default(),
                    thinking,
                    tool_calls: parts.tool_calls,
                    timestamp,
                })
            }
        }
    }
}

#[derive(Default)]
struct AssistantParts {
    thinking: Vec<String>,
    text: Vec<String>,
    tool_calls: Vec<ToolCall>,
}

impl AssistantParts {
    fn collect(content: &Value) -> Self {
        let mut parts = Self::default();
        let items = match content {
            Value::String(s) => {
                parts.text.push(s.clone());
                return parts;
            }
            Value::Array(items) => items,
            _ => return parts,
        };

        for item in items.iter().filter_map(Value::as_object) {
            if let Some(thinking) = item.get("thinking").and_then(Value::as_str) {
                parts.thinking.push(thinking.to_owned());
            }
            if let Some(text) = item.get("text").and_then(Value::as_str) {
                parts.text.push(text.to_owned());
            }
            if item.get("type").and_then(Value::as_str) == Some("tool_use") {
                parts.tool_calls.push(ToolCall {
                    name: item
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown")
                        .to_owned(),
                    args: item.get("input").map(display_args).unwrap_or_default(),
                });
            }
        }
        parts
    }
}
