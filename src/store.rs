use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::changes::{Change, ChangeLog};
use crate::domain::{Entry, EntryColor, TimeSpan};
use crate::navigation::Navigation;
use crate::normalize::normalize;
use crate::payload::TimetablePayload;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    Compact,
    Full,
}

impl DisplayMode {
    pub fn is_compact(self) -> bool {
        self == DisplayMode::Compact
    }

    pub fn toggled(self) -> Self {
        match self {
            DisplayMode::Compact => DisplayMode::Full,
            DisplayMode::Full => DisplayMode::Compact,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Load {
        data: TimetablePayload,
    },
    Move {
        entry_id: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
        #[serde(default)]
        resource_id: Option<String>,
    },
    Resize {
        entry_id: String,
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    Recolor {
        entry_id: String,
        color: EntryColor,
    },
    Select {
        #[serde(default)]
        entry_id: Option<String>,
    },
    Undo,
    Redo,
    SetDisplayMode {
        mode: DisplayMode,
    },
    ToggleDisplayMode,
    ScrollNavbar {
        offset: usize,
    },
    ResizeWindow {
        width: u16,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EditError {
    #[error("entry not found: {0}")]
    UnknownEntry(String),
    #[error("entry {entry_id} would end before it starts ({minutes} minutes)")]
    NonPositiveDuration { entry_id: String, minutes: i64 },
}

/// A top-level entry of one day together with its (effective) children.
#[derive(Debug, Clone, PartialEq)]
pub struct DayEntry {
    pub entry: Entry,
    pub children: Vec<Entry>,
}

impl DayEntry {
    /// The block followed by its children, the shape the layout engine consumes.
    pub fn flatten(&self) -> impl Iterator<Item = &Entry> {
        std::iter::once(&self.entry).chain(self.children.iter())
    }
}

/// Timetable state for one page/session: server entries, edit history,
/// selection and view settings. Owned by whoever drives the UI.
#[derive(Debug, Clone, Default)]
pub struct TimetableStore {
    top_level: Vec<Entry>,
    children: Vec<Entry>,
    changes: ChangeLog,
    selected_id: Option<String>,
    display_mode: DisplayMode,
    navigation: Navigation,
}

impl TimetableStore {
    pub fn new(display_mode: DisplayMode, navigation: Navigation) -> Self {
        Self {
            display_mode,
            navigation,
            ..Self::default()
        }
    }

    /// Applies an action. Returns whether anything changed; rejected edits and
    /// out-of-range undo/redo leave the state as it was.
    pub fn dispatch(&mut self, action: Action) -> bool {
        let result = match action {
            Action::Load { data } => {
                self.load(&data);
                Ok(true)
            }
            Action::Move {
                entry_id,
                start,
                end,
                resource_id,
            } => self.move_entry(&entry_id, start, end, resource_id).map(|_| true),
            Action::Resize {
                entry_id,
                start,
                end,
            } => self.resize_entry(&entry_id, start, end).map(|_| true),
            Action::Recolor { entry_id, color } => {
                self.recolor_entry(&entry_id, color).map(|_| true)
            }
            Action::Select { entry_id } => Ok(self.select(entry_id.as_deref())),
            Action::Undo => Ok(self.undo()),
            Action::Redo => Ok(self.redo()),
            Action::SetDisplayMode { mode } => {
                let changed = self.display_mode != mode;
                self.display_mode = mode;
                Ok(changed)
            }
            Action::ToggleDisplayMode => {
                self.display_mode = self.display_mode.toggled();
                Ok(true)
            }
            Action::ScrollNavbar { offset } => {
                let before = self.navigation;
                let total_days = self.days().len();
                self.navigation.scroll(offset, total_days);
                Ok(before != self.navigation)
            }
            Action::ResizeWindow { width } => {
                let before = self.navigation;
                let total_days = self.days().len();
                self.navigation.resize(width, total_days);
                Ok(before != self.navigation)
            }
        };

        match result {
            Ok(changed) => changed,
            Err(err) => {
                debug!("rejected edit: {err}");
                false
            }
        }
    }

    /// Replaces the server entries. The edit history is kept so local edits
    /// survive a refresh.
    pub fn load(&mut self, payload: &TimetablePayload) {
        let (top_level, children) = normalize(payload);
        info!(
            "loaded {} top-level and {} child entries ({} changes kept)",
            top_level.len(),
            children.len(),
            self.changes.len()
        );
        self.top_level = top_level;
        self.children = children;
        let stale_selection = self
            .selected_id
            .as_deref()
            .is_some_and(|id| self.base_entry(id).is_none());
        if stale_selection {
            self.selected_id = None;
        }
    }

    pub fn move_entry(
        &mut self,
        entry_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
        resource_id: Option<String>,
    ) -> Result<(), EditError> {
        let entry = self.require_effective(entry_id)?;
        let span = positive_span(entry_id, start, end)?;
        self.changes.push(Change::moved(&entry, span, resource_id));
        Ok(())
    }

    pub fn resize_entry(
        &mut self,
        entry_id: &str,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<(), EditError> {
        let entry = self.require_effective(entry_id)?;
        let span = positive_span(entry_id, start, end)?;
        self.changes.push(Change::resized(&entry, span));
        Ok(())
    }

    pub fn recolor_entry(&mut self, entry_id: &str, color: EntryColor) -> Result<(), EditError> {
        let entry = self.require_effective(entry_id)?;
        self.changes.push(Change::recolored(&entry, color));
        Ok(())
    }

    pub fn select(&mut self, entry_id: Option<&str>) -> bool {
        let next = match entry_id {
            Some(id) if self.base_entry(id).is_some() => Some(id.to_string()),
            Some(id) => {
                debug!("ignoring selection of unknown entry {id}");
                return false;
            }
            None => None,
        };
        let changed = self.selected_id != next;
        self.selected_id = next;
        changed
    }

    pub fn undo(&mut self) -> bool {
        self.changes.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.changes.redo()
    }

    pub fn changes(&self) -> &ChangeLog {
        &self.changes
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_id.as_deref()
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    pub fn navigation(&self) -> Navigation {
        self.navigation
    }

    /// Server entries with every applied change folded in, in log order.
    pub fn effective_entries(&self) -> (Vec<Entry>, Vec<Entry>) {
        let mut top_level = self.top_level.clone();
        let mut children = self.children.clone();

        for change in self.changes.applied() {
            if let Some(block) = top_level.iter_mut().find(|e| e.id == change.entry_id) {
                if let Some(shift) = change.apply(block) {
                    for child in children.iter_mut().filter(|c| c.is_child_of(&change.entry_id)) {
                        child.span = child.span.map(|span| span.shifted(shift));
                    }
                }
            } else if let Some(child) = children.iter_mut().find(|e| e.id == change.entry_id) {
                change.apply(child);
            }
        }

        (top_level, children)
    }

    pub fn effective_entry(&self, entry_id: &str) -> Option<Entry> {
        let (top_level, children) = self.effective_entries();
        top_level
            .into_iter()
            .chain(children)
            .find(|entry| entry.id == entry_id)
    }

    pub fn selected_entry(&self) -> Option<Entry> {
        self.selected_id
            .as_deref()
            .and_then(|id| self.effective_entry(id))
    }

    /// Effective top-level entries grouped by their start day, children nested
    /// under their block. Entries without a valid span are left out.
    pub fn day_entries(&self) -> BTreeMap<NaiveDate, Vec<DayEntry>> {
        let (top_level, children) = self.effective_entries();
        let mut days: BTreeMap<NaiveDate, Vec<DayEntry>> = BTreeMap::new();

        for entry in top_level {
            let Some(day) = entry.day() else {
                continue;
            };
            let mut nested = children
                .iter()
                .filter(|child| child.is_child_of(&entry.id) && child.span.is_some())
                .cloned()
                .collect::<Vec<_>>();
            sort_by_start(&mut nested);
            days.entry(day).or_default().push(DayEntry {
                entry,
                children: nested,
            });
        }

        for entries in days.values_mut() {
            entries.sort_by(|left, right| {
                left.entry
                    .start()
                    .cmp(&right.entry.start())
                    .then_with(|| left.entry.id.cmp(&right.entry.id))
            });
        }

        days
    }

    pub fn days(&self) -> Vec<NaiveDate> {
        self.day_entries().into_keys().collect()
    }

    /// Hour window to draw for `day`: one hour of headroom before the first
    /// entry, up to the hour the last entry ends in.
    pub fn hour_bounds(&self, day: NaiveDate, show_all_timeslots: bool) -> (u32, u32) {
        if show_all_timeslots {
            return (0, 24);
        }

        let day_entries = self.day_entries();
        let spans = day_entries
            .get(&day)
            .into_iter()
            .flatten()
            .flat_map(|day_entry| day_entry.flatten())
            .filter_map(|entry| entry.span)
            .collect::<Vec<TimeSpan>>();

        let Some(first_hour) = spans.iter().map(|span| span.start.hour()).min() else {
            return (0, 24);
        };
        let last_hour = spans
            .iter()
            .map(|span| end_hour(day, span))
            .max()
            .unwrap_or(24);

        (first_hour.saturating_sub(1), last_hour.max(first_hour + 1))
    }

    pub fn can_undo(&self) -> bool {
        self.changes.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.changes.can_redo()
    }

    fn base_entry(&self, entry_id: &str) -> Option<&Entry> {
        self.top_level
            .iter()
            .chain(self.children.iter())
            .find(|entry| entry.id == entry_id)
    }

    fn require_effective(&self, entry_id: &str) -> Result<Entry, EditError> {
        self.effective_entry(entry_id)
            .ok_or_else(|| EditError::UnknownEntry(entry_id.to_string()))
    }
}

fn positive_span(
    entry_id: &str,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<TimeSpan, EditError> {
    let span = TimeSpan::between(start, end);
    if span.duration_minutes <= 0 {
        return Err(EditError::NonPositiveDuration {
            entry_id: entry_id.to_string(),
            minutes: span.duration_minutes,
        });
    }
    Ok(span)
}

fn end_hour(day: NaiveDate, span: &TimeSpan) -> u32 {
    let end = span.end();
    if end.date() > day {
        return 24;
    }
    if end.minute() > 0 || end.second() > 0 {
        (end.hour() + 1).min(24)
    } else {
        end.hour()
    }
}

fn sort_by_start(entries: &mut [Entry]) {
    entries.sort_by(|left, right| {
        left.start()
            .cmp(&right.start())
            .then_with(|| left.id.cmp(&right.id))
    });
}
