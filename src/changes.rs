use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::{Entry, EntryColor, TimeSpan};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub span: Option<TimeSpan>,
    pub resource_id: Option<String>,
}

impl Position {
    pub fn of(entry: &Entry) -> Self {
        Self {
            span: entry.span,
            resource_id: entry.resource_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeKind {
    Move {
        before: Position,
        after: Position,
    },
    Resize {
        before: Option<TimeSpan>,
        after: TimeSpan,
    },
    Recolor {
        before: Option<EntryColor>,
        after: EntryColor,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub entry_id: String,
    #[serde(flatten)]
    pub kind: ChangeKind,
}

impl Change {
    pub fn moved(entry: &Entry, span: TimeSpan, resource_id: Option<String>) -> Self {
        Self {
            entry_id: entry.id.clone(),
            kind: ChangeKind::Move {
                before: Position::of(entry),
                after: Position {
                    span: Some(span),
                    resource_id,
                },
            },
        }
    }

    pub fn resized(entry: &Entry, span: TimeSpan) -> Self {
        Self {
            entry_id: entry.id.clone(),
            kind: ChangeKind::Resize {
                before: entry.span,
                after: span,
            },
        }
    }

    pub fn recolored(entry: &Entry, color: EntryColor) -> Self {
        Self {
            entry_id: entry.id.clone(),
            kind: ChangeKind::Recolor {
                before: entry.color.clone(),
                after: color,
            },
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            ChangeKind::Move { .. } => "move",
            ChangeKind::Resize { .. } => "resize",
            ChangeKind::Recolor { .. } => "recolor",
        }
    }

    /// Applies the change to `entry` and returns how far its start moved, if it
    /// was a move. Blocks use the shift to carry their children along.
    pub fn apply(&self, entry: &mut Entry) -> Option<Duration> {
        match &self.kind {
            ChangeKind::Move { after, .. } => {
                let previous = entry.span;
                entry.span = after.span;
                entry.resource_id = after.resource_id.clone();
                match (previous, after.span) {
                    (Some(previous), Some(next)) if previous.start != next.start => {
                        Some(next.start - previous.start)
                    }
                    _ => None,
                }
            }
            ChangeKind::Resize { after, .. } => {
                entry.span = Some(*after);
                None
            }
            ChangeKind::Recolor { after, .. } => {
                entry.color = Some(after.clone());
                None
            }
        }
    }
}

/// Linear edit history. Changes below `current` are applied; the rest can be redone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeLog {
    changes: Vec<Change>,
    current: usize,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.truncate(self.current);
        self.changes.push(change);
        self.current = self.changes.len();
    }

    pub fn undo(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if self.current >= self.changes.len() {
            return false;
        }
        self.current += 1;
        true
    }

    pub fn applied(&self) -> &[Change] {
        &self.changes[..self.current]
    }

    pub fn current_change_idx(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.current > 0
    }

    pub fn can_redo(&self) -> bool {
        self.current < self.changes.len()
    }

    /// Last applied change, the one the next undo reverts.
    pub fn last_applied(&self) -> Option<&Change> {
        self.applied().last()
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::tests::{at, entry};
    use crate::domain::{EntryColor, TimeSpan};

    use super::{Change, ChangeLog};

    fn recolor(id: &str, background: &str) -> Change {
        let target = entry(id, None, at(9, 0), at(10, 0));
        Change::recolored(&target, EntryColor::new("#000000", background))
    }

    #[test]
    fn undo_and_redo_stay_within_bounds() {
        let mut log = ChangeLog::new();
        assert!(!log.undo());
        assert!(!log.redo());

        log.push(recolor("a", "#111111"));
        log.push(recolor("a", "#222222"));
        assert_eq!(log.current_change_idx(), 2);

        assert!(log.undo());
        assert!(log.undo());
        assert!(!log.undo());
        assert_eq!(log.current_change_idx(), 0);
        assert_eq!(log.len(), 2);

        assert!(log.redo());
        assert!(log.redo());
        assert!(!log.redo());
        assert_eq!(log.current_change_idx(), 2);
    }

    #[test]
    fn new_edit_after_undo_discards_redo_history() {
        let mut log = ChangeLog::new();
        log.push(recolor("a", "#111111"));
        log.push(recolor("a", "#222222"));
        log.push(recolor("a", "#333333"));
        log.undo();
        log.undo();

        log.push(recolor("b", "#444444"));
        assert_eq!(log.len(), 2);
        assert!(!log.can_redo());
        assert_eq!(log.last_applied().map(|c| c.entry_id.as_str()), Some("b"));
    }

    #[test]
    fn move_reports_start_shift() {
        let mut target = entry("a", None, at(9, 0), at(10, 0));
        let change = Change::moved(&target, TimeSpan::between(at(9, 30), at(10, 30)), None);
        let shift = change.apply(&mut target);
        assert_eq!(shift.map(|d| d.num_minutes()), Some(30));
        assert_eq!(target.start(), Some(at(9, 30)));
        assert_eq!(change.label(), "move");
    }
}
