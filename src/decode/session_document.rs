//! Single-file session documents (one JSON object per session).
//!
//! Dated by, in order: the document's `startTime`, a `YYYY-MM-DD` token in
//! the file name, the file's modification time.

use super::{DecodeResult, SessionDecoder, display_args, flatten_text, non_empty};
use crate::error::DecodeError;
use crate::record::{CanonicalRecord, Message, Role, Session, SourceMethod, Timestamp, ToolCall};
use crate::utils::{date_in_file_name, modified_local};
use chrono::{NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionDocumentDecoder;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionDocument {
    start_time: Option<String>,
    #[serde(default)]
    messages: Vec<DocumentMessage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: Value,
    timestamp: Option<String>,
    #[serde(default)]
    thoughts: Option<Vec<Thought>>,
    #[serde(default)]
    tool_calls: Option<Vec<DocumentToolCall>>,
}

#[derive(Deserialize)]
struct Thought {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize)]
struct DocumentToolCall {
    name: Option<String>,
    #[serde(default)]
    args: Value,
}

impl SessionDecoder for SessionDocumentDecoder {
    fn name(&self) -> &'static str {
        "session document"
    }

    fn decode(&self, path: &Path) -> DecodeResult {
        let raw = std::fs::read_to_string(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let doc: SessionDocument = serde_json::from_str(&raw).map_err(|source| {
            DecodeError::Json {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let records: Vec<_> = doc
            .messages
            .into_iter()
            .filter_map(DocumentMessage::into_message)
            .map(CanonicalRecord::Message)
            .collect();
        if records.is_empty() {
            return Ok(None);
        }

        let started = session_start(doc.start_time.as_deref(), path)?;
        Ok(Some(Session::new(
            started,
            records,
            SourceMethod::SessionDocument,
            path,
        )))
    }
}

fn session_start(start_time: Option<&str>, path: &Path) -> Result<NaiveDateTime, DecodeError> {
    if let Some(instant) = start_time.and_then(|raw| Timestamp::parse(raw).instant()) {
        return Ok(instant);
    }
    if let Some(date) = date_in_file_name(path) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    modified_local(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })
}

impl DocumentMessage {
    fn into_message(self) -> Option<Message> {
        let role = match self.kind.as_deref() {
            Some("user") => Role::User,
            Some("gemini" | "assistant" | "model") => Role::Assistant,
            _ => return None,
        };
        let timestamp = self.timestamp.map(Timestamp::parse);
        let content = non_empty(flatten_text(&self.content, "\n\n"));

        match role {
            Role::User => Some(Message {
                role,
                content: content?,
                thinking: None,
                tool_calls: Vec::new(),
                timestamp,
            }),
            Role::Assistant => {
                let thinking = non_empty(
                    self.thoughts
                        .unwrap_or_default()
                        .into_iter()
                        .map(|t| t.description.unwrap_or_default())
                        .collect::<Vec<_>>()
                        .join("\n"),
                );
                let tool_calls: Vec<ToolCall> = self
                    .tool_calls
                    .unwrap_or_default()
                    .into_iter()
                    .map(|call| ToolCall {
                        name: call.name.unwrap_or_else(|| "unknown".to_owned()),
                        args: display_args(&call.args),
                    })
                    .collect();
                if content.is_none() && thinking.is_none() && tool_calls.is_empty() {
                    return None;
                }
                Some(Message {
                    role,
                    content: content.unwrap_or_default(),
                    thinking,
                    tool_calls,
                    timestamp,
                })
            }
        }
    }
}
