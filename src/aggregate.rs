//! Grouping of sessions into calendar days.

use crate::record::{CanonicalRecord, RENDERED_FORMAT, Session, Timestamp};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// All sessions filed under one date, ordered by start time.
#[derive(Debug, Clone)]
pub struct DailyAggregate {
    pub date: NaiveDate,
    pub sessions: Vec<Session>,
}

/// A record in day order, with the session it came from.
#[derive(Debug, Clone, Copy)]
pub struct DayRecord<'a> {
    /// 1-based position of the session within the day.
    pub session_number: usize,
    pub session: &'a Session,
    pub record: &'a CanonicalRecord,
}

impl DayRecord<'_> {
    /// The timestamp written into this record's block. Fragments carry their
    /// session's start, so a day of fragments still leaves a watermark.
    pub fn marker_timestamp(&self) -> Option<String> {
        match self.record {
            CanonicalRecord::Message(message) => {
                message.timestamp.as_ref().map(Timestamp::rendered)
            }
            CanonicalRecord::Fragment(_) => Some(self.session_start()),
        }
    }

    fn session_start(&self) -> String {
        self.session.started_at().format(RENDERED_FORMAT).to_string()
    }
}

impl DailyAggregate {
    pub fn record_count(&self) -> usize {
        self.sessions.iter().map(Session::count).sum()
    }

    pub fn spans_sessions(&self) -> bool {
        self.sessions.len() > 1
    }

    /// Every record of the day in timestamp order. Ties keep session order,
    /// then file order. Records without a timestamp are placed at their
    /// session's start.
    pub fn ordered_records(&self) -> Vec<DayRecord<'_>> {
        let mut records: Vec<DayRecord<'_>> = self
            .sessions
            .iter()
            .enumerate()
            .flat_map(|(i, session)| {
                session.records.iter().map(move |record| DayRecord {
                    session_number: i + 1,
                    session,
                    record,
                })
            })
            .collect();
        records
            .sort_by_cached_key(|r| r.marker_timestamp().unwrap_or_else(|| r.session_start()));
        records
    }
}

/// Group sessions by date; dates ascend, sessions within a date ascend by
/// start time with discovery order breaking ties.
pub fn group_by_date(sessions: Vec<Session>) -> Vec<DailyAggregate> {
    let mut by_date: BTreeMap<NaiveDate, Vec<Session>> = BTreeMap::new();
    for session in sessions {
        by_date.entry(session.date).or_default().push(session);
    }
    by_date
        .into_iter()
        .map(|(date, mut sessions)| {
            sessions.sort_by_key(|s| s.start_time);
            DailyAggregate { date, sessions }
        })
        .collect()
}

/// Which dates a run should touch. Bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
    #[default]
    Any,
    Exact(NaiveDate),
    Range {
        after: Option<NaiveDate>,
        before: Option<NaiveDate>,
    },
}

impl DateFilter {
    /// `exact` takes precedence over the range bounds.
    pub fn new(
        exact: Option<NaiveDate>,
        after: Option<NaiveDate>,
        before: Option<NaiveDate>,
    ) -> Self {
        match (exact, after, before) {
            (Some(date), _, _) => DateFilter::Exact(date),
            (None, None, None) => DateFilter::Any,
            (None, after, before) => DateFilter::Range { after, before },
        }
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            DateFilter::Any => true,
            DateFilter::Exact(wanted) => date == wanted,
            DateFilter::Range { after, before } => {
                after.is_none_or(|a| date >= a) && before.is_none_or(|b| date <= b)
            }
        }
    }
}
