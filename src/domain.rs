use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    SessionBlock,
    Break,
    Contribution,
}

impl EntryKind {
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::SessionBlock => "block",
            EntryKind::Break => "break",
            EntryKind::Contribution => "contribution",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryColor {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
}

impl EntryColor {
    pub fn new(text: impl Into<String>, background: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            background: Some(background.into()),
        }
    }
}

/// Start timestamp plus a duration in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: NaiveDateTime,
    pub duration_minutes: i64,
}

impl TimeSpan {
    pub fn between(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            duration_minutes: (end - start).num_minutes(),
        }
    }

    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::minutes(self.duration_minutes)
    }

    pub fn day(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn intersects(&self, other: &TimeSpan) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    pub fn shifted(&self, delta: Duration) -> Self {
        Self {
            start: self.start + delta,
            duration_minutes: self.duration_minutes,
        }
    }

    /// Minutes since midnight of the start day.
    pub fn start_minute_of_day(&self) -> i64 {
        i64::from(self.start.hour()) * 60 + i64::from(self.start.minute())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub kind: EntryKind,
    pub title: String,
    pub slot_title: Option<String>,
    pub code: Option<String>,
    pub session_code: Option<String>,
    pub description: Option<String>,
    /// `None` when the server sent dates that could not be parsed.
    pub span: Option<TimeSpan>,
    pub color: Option<EntryColor>,
    pub parent_id: Option<String>,
    pub resource_id: Option<String>,
    pub attachment_count: usize,
}

impl Entry {
    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn is_child_of(&self, parent_id: &str) -> bool {
        self.parent_id.as_deref() == Some(parent_id)
    }

    pub fn start(&self) -> Option<NaiveDateTime> {
        self.span.map(|span| span.start)
    }

    pub fn end(&self) -> Option<NaiveDateTime> {
        self.span.map(|span| span.end())
    }

    pub fn day(&self) -> Option<NaiveDate> {
        self.span.map(|span| span.day())
    }

    pub fn display_title(&self) -> &str {
        match &self.slot_title {
            Some(slot_title) if !slot_title.trim().is_empty() => slot_title,
            _ => &self.title,
        }
    }

    pub fn overlaps(&self, other: &Entry) -> bool {
        match (&self.span, &other.span) {
            (Some(left), Some(right)) => left.intersects(right),
            _ => false,
        }
    }
}

pub fn has_children(entry: &Entry, entries: &[Entry]) -> bool {
    entries.iter().any(|other| other.is_child_of(&entry.id))
}

/// Entries other than `entry` whose time range intersects it.
pub fn concurrent_entries<'a>(entry: &Entry, entries: &'a [Entry]) -> Vec<&'a Entry> {
    entries
        .iter()
        .filter(|other| other.id != entry.id && entry.overlaps(other))
        .collect()
}

pub fn format_minutes(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn format_span(span: Option<&TimeSpan>) -> String {
    match span {
        Some(span) => format!(
            "{} {}-{}",
            span.start.format("%Y-%m-%d"),
            span.start.format("%H:%M"),
            span.end().format("%H:%M")
        ),
        None => "(invalid dates)".to_string(),
    }
}
