use std::collections::HashSet;

use crate::domain::{Entry, TimeSpan, concurrent_entries, has_children};

pub const DEFAULT_BLOCK_WIDTH_PERCENT: f64 = 10.0;
pub const DEFAULT_COLUMN_PADDING_PX: i32 = 10;
const ENTRY_MARGIN_PX: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutSettings {
    pub compact: bool,
    /// Number of day columns rendered side by side.
    pub day_columns: usize,
    pub block_width_percent: f64,
    pub column_padding_px: i32,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            compact: true,
            day_columns: 1,
            block_width_percent: DEFAULT_BLOCK_WIDTH_PERCENT,
            column_padding_px: DEFAULT_COLUMN_PADDING_PX,
        }
    }
}

/// Horizontal placement of one entry inside its day column.
///
/// Widths and offsets are percentages of the day column; `width_adjust_px`
/// is a fixed pixel correction (margins and inter-column padding) on top.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryLayout {
    pub entry_id: String,
    pub column_index: usize,
    pub columns: usize,
    pub width_percent: f64,
    pub left_percent: f64,
    pub width_adjust_px: i32,
}

struct Slot<'a> {
    entry: &'a Entry,
    span: TimeSpan,
    friends: Vec<usize>,
    column: usize,
    columns: usize,
    width: f64,
    left: f64,
}

/// Lays out one day's entries (blocks and their children, flattened).
///
/// `all_entries` is the set used to decide whether an entry has anything
/// running at the same time; it is usually every effective entry of the event.
/// Entries without a valid span are not placed. The result is ordered by
/// start time, then longer entries first, then id.
pub fn layout_day(
    day_entries: &[Entry],
    all_entries: &[Entry],
    settings: &LayoutSettings,
) -> Vec<EntryLayout> {
    pack(day_entries)
        .iter()
        .map(|slot| place(slot, day_entries, all_entries, settings))
        .collect()
}

fn pack(entries: &[Entry]) -> Vec<Slot<'_>> {
    let mut slots = entries
        .iter()
        .filter_map(|entry| {
            entry.span.map(|span| Slot {
                entry,
                span,
                friends: Vec::new(),
                column: 0,
                columns: 1,
                width: 100.0,
                left: 0.0,
            })
        })
        .collect::<Vec<_>>();

    slots.sort_by(|left, right| {
        left.span
            .start
            .cmp(&right.span.start)
            .then_with(|| right.span.end().cmp(&left.span.end()))
            .then_with(|| left.entry.id.cmp(&right.entry.id))
    });

    for i in 0..slots.len() {
        for j in (i + 1)..slots.len() {
            if slots[i].span.intersects(&slots[j].span) {
                slots[i].friends.push(j);
                slots[j].friends.push(i);
            }
        }
    }

    let mut placed = vec![false; slots.len()];
    for i in 0..slots.len() {
        let taken = slots[i]
            .friends
            .iter()
            .filter(|&&friend| placed[friend])
            .map(|&friend| slots[friend].column)
            .collect::<HashSet<_>>();
        slots[i].column = (0..).find(|column| !taken.contains(column)).unwrap_or(0);
        placed[i] = true;
    }

    let mut sized = vec![false; slots.len()];
    for i in 0..slots.len() {
        if sized[i] {
            continue;
        }
        let group = overlap_group(&slots, i);
        let columns = group.iter().map(|&k| slots[k].column).max().unwrap_or(0) + 1;
        for k in group {
            slots[k].columns = columns;
            sized[k] = true;
        }
    }

    for i in 0..slots.len() {
        let width = 100.0 / slots[i].columns as f64;
        let left = slots[i].column as f64 * width;
        let rightmost_friend = slots[i]
            .friends
            .iter()
            .map(|&friend| slots[friend].column)
            .max()
            .unwrap_or(0);
        slots[i].left = left;
        // nothing to the right: stretch to the edge
        slots[i].width = if rightmost_friend <= slots[i].column {
            100.0 - left
        } else {
            width
        };
    }

    slots
}

/// Every slot reachable from `start` through overlaps, `start` included.
fn overlap_group(slots: &[Slot<'_>], start: usize) -> Vec<usize> {
    let mut seen = vec![false; slots.len()];
    let mut stack = vec![start];
    let mut group = Vec::new();
    seen[start] = true;

    while let Some(index) = stack.pop() {
        group.push(index);
        for &friend in &slots[index].friends {
            if !seen[friend] {
                seen[friend] = true;
                stack.push(friend);
            }
        }
    }

    group
}

fn place(
    slot: &Slot<'_>,
    day_entries: &[Entry],
    all_entries: &[Entry],
    settings: &LayoutSettings,
) -> EntryLayout {
    let margin = if slot.column == 0 { 0 } else { ENTRY_MARGIN_PX };
    let mut layout = EntryLayout {
        entry_id: slot.entry.id.clone(),
        column_index: slot.column,
        columns: slot.columns,
        width_percent: slot.width,
        left_percent: slot.left,
        width_adjust_px: -margin,
    };

    if concurrent_entries(slot.entry, all_entries).is_empty() {
        let day_columns = settings.day_columns.max(1);
        layout.width_percent = 100.0 * day_columns as f64;
        layout.width_adjust_px = settings.column_padding_px * (day_columns as i32 - 1) - margin;
        return layout;
    }

    if slot.entry.is_child() {
        layout.width_adjust_px = 0;
        if settings.compact && slot.columns > 1 {
            let block_width = settings.block_width_percent;
            let width = (100.0 - block_width) / (slot.columns - 1) as f64;
            layout.width_percent = width;
            layout.left_percent = block_width + width * slot.column.saturating_sub(1) as f64;
        }
        return layout;
    }

    if settings.compact && has_children(slot.entry, day_entries) {
        layout.width_percent = settings.block_width_percent;
    }

    layout
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use crate::domain::Entry;
    use crate::domain::tests::{at, entry};

    use super::{EntryLayout, LayoutSettings, layout_day};

    fn find<'a>(layouts: &'a [EntryLayout], id: &str) -> &'a EntryLayout {
        layouts
            .iter()
            .find(|layout| layout.entry_id == id)
            .expect("entry should be laid out")
    }

    fn block_with_talk() -> Vec<Entry> {
        vec![
            entry("s1", None, at(9, 0), at(10, 0)),
            entry("c1", Some("s1"), at(9, 15), at(9, 45)),
        ]
    }

    #[test]
    fn lone_entries_take_full_width_in_every_mode() {
        let entries = vec![
            entry("b1", None, at(12, 0), at(13, 0)),
            entry("s1", None, at(9, 0), at(10, 0)),
        ];
        for compact in [true, false] {
            let settings = LayoutSettings {
                compact,
                day_columns: 3,
                ..LayoutSettings::default()
            };
            let layouts = layout_day(&entries, &entries, &settings);
            for layout in &layouts {
                assert_eq!(layout.width_percent, 300.0);
                assert_eq!(layout.width_adjust_px, 20);
                assert_eq!(layout.column_index, 0);
            }
        }
    }

    #[test]
    fn compact_mode_squeezes_blocks_and_widens_children() {
        let entries = block_with_talk();
        let layouts = layout_day(&entries, &entries, &LayoutSettings::default());

        let block = find(&layouts, "s1");
        assert_eq!(block.width_percent, 10.0);
        assert_eq!(block.left_percent, 0.0);

        let talk = find(&layouts, "c1");
        assert_eq!(talk.column_index, 1);
        assert_eq!(talk.columns, 2);
        assert_eq!(talk.width_percent, 90.0);
        assert_eq!(talk.left_percent, 10.0);
        assert_eq!(talk.width_adjust_px, 0);
    }

    #[test]
    fn full_mode_keeps_packed_columns() {
        let entries = block_with_talk();
        let settings = LayoutSettings {
            compact: false,
            ..LayoutSettings::default()
        };
        let layouts = layout_day(&entries, &entries, &settings);

        let block = find(&layouts, "s1");
        assert_eq!(block.width_percent, 50.0);
        let talk = find(&layouts, "c1");
        assert_eq!(talk.width_percent, 50.0);
        assert_eq!(talk.left_percent, 50.0);
    }

    #[test]
    fn overlapping_children_share_the_space_next_to_their_block() {
        let entries = vec![
            entry("s1", None, at(9, 0), at(10, 0)),
            entry("c1", Some("s1"), at(9, 0), at(9, 40)),
            entry("c2", Some("s1"), at(9, 20), at(10, 0)),
        ];
        let layouts = layout_day(&entries, &entries, &LayoutSettings::default());

        let first = find(&layouts, "c1");
        let second = find(&layouts, "c2");
        assert_eq!((first.column_index, second.column_index), (1, 2));
        assert_eq!(first.width_percent, 45.0);
        assert_eq!(first.left_percent, 10.0);
        assert_eq!(second.left_percent, 55.0);
    }

    #[test]
    fn concurrency_is_checked_against_the_whole_event() {
        let next_day = Duration::days(1);
        let lunch = entry("b1", None, at(12, 0), at(13, 0));
        let day_entries = vec![lunch.clone()];
        let settings = LayoutSettings {
            day_columns: 2,
            ..LayoutSettings::default()
        };

        // same hours on another day never count as concurrent
        let other_day = entry("b2", None, at(12, 0) + next_day, at(13, 0) + next_day);
        let event = vec![lunch.clone(), other_day];
        let layouts = layout_day(&day_entries, &event, &settings);
        assert_eq!(find(&layouts, "b1").width_percent, 200.0);
        assert_eq!(find(&layouts, "b1").width_adjust_px, 10);

        // an overlapping entry outside this day's list still blocks full width
        let parallel = entry("s9", None, at(12, 30), at(13, 30));
        let event = vec![lunch, parallel];
        let layouts = layout_day(&day_entries, &event, &settings);
        let lunch_layout = find(&layouts, "b1");
        assert_eq!(lunch_layout.width_percent, 100.0);
        assert_eq!(lunch_layout.width_adjust_px, 0);
        assert_eq!(layouts.len(), 1);
    }

    #[test]
    fn layout_does_not_depend_on_input_order() {
        let mut entries = vec![
            entry("s1", None, at(9, 0), at(11, 0)),
            entry("c1", Some("s1"), at(9, 0), at(9, 40)),
            entry("c2", Some("s1"), at(9, 20), at(10, 0)),
            entry("c3", Some("s1"), at(10, 0), at(10, 30)),
            entry("b1", None, at(10, 45), at(11, 30)),
        ];
        let settings = LayoutSettings::default();
        let forward = layout_day(&entries, &entries, &settings);
        entries.reverse();
        let backward = layout_day(&entries, &entries, &settings);
        assert_eq!(forward, backward);
        assert_eq!(forward, layout_day(&entries, &entries, &settings));
    }
}
