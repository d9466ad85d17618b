use crate::error::Error;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::fmt;

/// Start or end of an event: a zoned instant or a whole day
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTime {
    DateTime(DateTime<FixedOffset>),
    Date(NaiveDate),
}

impl EventTime {
    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
            EventTime::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// Normalized event built from one Notion entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Notion page id, kept for logging only
    pub source_id: String,
    pub summary: String,
    /// Link back to the Notion page
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
}

/// Reference to an event the calendar accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

impl CreatedEvent {
    /// Best human-facing reference for logs
    pub fn reference(&self) -> &str {
        self.html_link.as_deref().unwrap_or(&self.id)
    }
}

/// A Notion entry that could not be turned into a draft
#[derive(Debug)]
pub struct RejectedRecord {
    pub record_id: String,
    pub error: Error,
}

/// Result of one source query: valid drafts in source order plus rejects
#[derive(Debug, Default)]
pub struct SourceBatch {
    pub drafts: Vec<EventDraft>,
    pub rejected: Vec<RejectedRecord>,
}
