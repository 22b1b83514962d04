//! Re-reading a Markdown transcript so it can be filed into daily artifacts.
//!
//! Accepts the block layout written by [`crate::render`]: message headings,
//! a `**Timestamp:**` line, optional thinking and content sections. One
//! [`Session`] is produced per calendar day; blocks without a parseable
//! timestamp have no day to go to and are dropped.

use crate::error::DecodeError;
use crate::record::{CanonicalRecord, Message, Role, Session, SourceMethod, Timestamp};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static MESSAGE_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"### Message \d+: (User|Assistant)").expect("valid message heading regex")
});
static TIMESTAMP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Timestamp:\*\* ([\d\-T:]+)").expect("valid timestamp line regex")
});
static CONTENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\*\*Content:\*\*\n\n(.*?)(?:\n\n---|\z)").expect("valid content regex")
});
static THINKING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\*\*Thinking Block:\*\*\n\n```\n(.*?)\n```").expect("valid thinking regex")
});

/// Split the transcript at `path` into one session per day, in date order.
pub fn split_by_day(path: &Path) -> Result<Vec<Session>, DecodeError> {
    let text = std::fs::read_to_string(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(split_text(&text, path))
}

fn split_text(text: &str, path: &Path) -> Vec<Session> {
    let headings: Vec<_> = MESSAGE_HEADING.captures_iter(text).collect();

    let mut by_day: BTreeMap<NaiveDate, Vec<CanonicalRecord>> = BTreeMap::new();
    let mut undated = 0usize;
    for (i, caps) in headings.iter().enumerate() {
        let Some(heading) = caps.get(0) else {
            continue;
        };
        let end = headings
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let block = &text[heading.end()..end];
        let role = if &caps[1] == "User" {
            Role::User
        } else {
            Role::Assistant
        };

        let Some(timestamp) = TIMESTAMP_LINE
            .captures(block)
            .map(|c| Timestamp::parse(&c[1]))
            .filter(|ts| ts.instant().is_some())
        else {
            undated += 1;
            continue;
        };
        let Some(date) = timestamp.instant().map(|at| at.date()) else {
            continue;
        };

        let content = CONTENT
            .captures(block)
            .map(|c| c[1].trim().to_owned())
            .unwrap_or_default();
        let thinking = THINKING
            .captures(block)
            .map(|c| c[1].trim().to_owned())
            .filter(|t| !t.is_empty());

        by_day
            .entry(date)
            .or_default()
            .push(CanonicalRecord::Message(Message {
                role,
                content,
                thinking,
                tool_calls: Vec::new(),
                timestamp: Some(timestamp),
            }));
    }
    if undated > 0 {
        debug!(path = %path.display(), undated, "dropped blocks without a timestamp");
    }

    by_day
        .into_values()
        .filter_map(|records| {
            let started = records.iter().filter_map(|r| r.timestamp()?.instant()).min()?;
            Some(Session::new(
                started,
                records,
                SourceMethod::MarkdownExport,
                path,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
# Complete Chat Session Export
## Full Conversation from Claude Code

---

## Full Conversation Transcript

### Message 1: User

**Timestamp:** 2026-01-21T23:59:58

**Content:**

late night question

---

### Message 2: Assistant

**Timestamp:** 2026-01-22T00:00:03

**Thinking Block:**

```
it is past midnight
```

**Content:**

early answer
over two lines

---

### Message 3: User

**Timestamp:** N/A

**Content:**

lost in time

---

";

    fn contents(session: &Session) -> Vec<&str> {
        session
            .records
            .iter()
            .filter_map(|r| match r {
                CanonicalRecord::Message(m) => Some(m.content.as_str()),
                CanonicalRecord::Fragment(_) => None,
            })
            .collect()
    }

    #[test]
    fn blocks_are_filed_by_their_own_date() {
        let sessions = split_text(EXPORT, Path::new("export.md"));
        assert_eq!(sessions.len(), 2);

        assert_eq!(sessions[0].date, NaiveDate::from_ymd_opt(2026, 1, 21).unwrap());
        assert_eq!(contents(&sessions[0]), ["late night question"]);

        assert_eq!(sessions[1].date, NaiveDate::from_ymd_opt(2026, 1, 22).unwrap());
        assert_eq!(sessions[1].start_label(), "000003");
        assert_eq!(contents(&sessions[1]), ["early answer\nover two lines"]);
        let CanonicalRecord::Message(answer) = &sessions[1].records[0] else {
            panic!("expected a message");
        };
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.thinking.as_deref(), Some("it is past midnight"));
    }

    #[test]
    fn text_without_blocks_yields_nothing() {
        assert!(split_text("# just notes\n", Path::new("notes.md")).is_empty());
    }
}
