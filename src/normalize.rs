use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::warn;

use crate::domain::{Entry, EntryColor, EntryKind, TimeSpan};
use crate::payload::{RawDateTime, RawEntry, RawEntryType, TimetablePayload};

const TIME_FORMATS: [&str; 2] = ["%H:%M:%S", "%H:%M"];

/// Flattens the nested day/block payload into top-level entries and child entries.
///
/// Children carry the id of the block that contained them in `parent_id`.
/// Records with unknown entry types are skipped together with their children.
/// Dates that cannot be parsed leave the entry without a span instead of
/// failing the whole load.
pub fn normalize(payload: &TimetablePayload) -> (Vec<Entry>, Vec<Entry>) {
    let mut top_level = Vec::new();
    let mut children = Vec::new();

    for (day_key, blocks) in payload {
        for raw in blocks.values() {
            let Some(block) = entry_from_raw(raw, None) else {
                warn!(
                    "skipping entry {} on {day_key}: unsupported entry type",
                    raw.id
                );
                continue;
            };

            for raw_child in raw.entries.values() {
                match entry_from_raw(raw_child, Some(&block.id)) {
                    Some(child) => children.push(child),
                    None => warn!(
                        "skipping child {} of {}: unsupported entry type",
                        raw_child.id, block.id
                    ),
                }
            }

            top_level.push(block);
        }
    }

    (top_level, children)
}

fn entry_from_raw(raw: &RawEntry, parent_id: Option<&str>) -> Option<Entry> {
    let kind = match raw.entry_type {
        RawEntryType::Session => EntryKind::SessionBlock,
        RawEntryType::Break => EntryKind::Break,
        RawEntryType::Contribution => EntryKind::Contribution,
        RawEntryType::Other => return None,
    };

    let span = match (parse_timestamp(&raw.start_date), parse_timestamp(&raw.end_date)) {
        (Some(start), Some(end)) => Some(TimeSpan::between(start, end)),
        _ => {
            warn!(
                "entry {} has malformed dates ({} {} / {} {})",
                raw.id, raw.start_date.date, raw.start_date.time, raw.end_date.date, raw.end_date.time
            );
            None
        }
    };

    let color = if kind == EntryKind::Contribution {
        None
    } else {
        Some(EntryColor {
            text: raw.text_color.clone(),
            background: raw.color.clone(),
        })
    };

    Some(Entry {
        id: raw.id.clone(),
        kind,
        title: raw.title.clone().unwrap_or_default(),
        slot_title: raw.slot_title.clone(),
        code: raw.code.clone(),
        session_code: raw.session_code.clone(),
        description: raw.description.clone(),
        span,
        color,
        parent_id: parent_id.map(str::to_string),
        resource_id: None,
        attachment_count: raw.attachments.as_ref().map_or(0, |attachments| attachments.count()),
    })
}

pub fn parse_timestamp(raw: &RawDateTime) -> Option<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(raw.date.trim(), "%Y-%m-%d").ok()?;
    let time = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(raw.time.trim(), format).ok())?;
    Some(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use crate::domain::EntryKind;
    use crate::domain::tests::at;
    use crate::payload::{RawDateTime, TimetablePayload, parse_payload};

    use super::{normalize, parse_timestamp};

    const SAMPLE: &str = r##"{
        "20240501": {
            "s1": {
                "id": "s1",
                "title": "Plenary",
                "entryType": "Session",
                "startDate": {"date": "2024-05-01", "time": "09:00:00"},
                "endDate": {"date": "2024-05-01", "time": "10:00:00"},
                "color": "#ff0000",
                "textColor": "#ffffff",
                "entries": {
                    "c1": {
                        "id": "c1",
                        "title": "Opening",
                        "entryType": "Contribution",
                        "startDate": {"date": "2024-05-01", "time": "09:15:00"},
                        "endDate": {"date": "2024-05-01", "time": "09:45:00"}
                    }
                }
            },
            "b1": {
                "id": "b1",
                "title": "Coffee",
                "entryType": "Break",
                "startDate": {"date": "2024-05-01", "time": "not a time"},
                "endDate": {"date": "2024-05-01", "time": "10:30"},
                "color": "#00ff00"
            }
        }
    }"##;

    #[test]
    fn empty_payload_yields_no_entries() {
        let (top_level, children) = normalize(&TimetablePayload::new());
        assert!(top_level.is_empty());
        assert!(children.is_empty());
    }

    #[test]
    fn flattens_children_with_parent_ids() {
        let payload = parse_payload(SAMPLE).expect("sample should parse");
        let (top_level, children) = normalize(&payload);

        assert_eq!(top_level.len(), 2);
        assert_eq!(children.len(), 1);

        let block = top_level.iter().find(|e| e.id == "s1").expect("block");
        assert_eq!(block.kind, EntryKind::SessionBlock);
        assert_eq!(block.start(), Some(at(9, 0)));
        assert_eq!(block.span.map(|s| s.duration_minutes), Some(60));
        let color = block.color.as_ref().expect("blocks carry colors");
        assert_eq!(color.background.as_deref(), Some("#ff0000"));
        assert_eq!(color.text.as_deref(), Some("#ffffff"));

        let child = &children[0];
        assert_eq!(child.parent_id.as_deref(), Some("s1"));
        assert_eq!(child.kind, EntryKind::Contribution);
        assert!(child.color.is_none());
        assert_eq!(child.span.map(|s| s.duration_minutes), Some(30));
    }

    #[test]
    fn tolerates_malformed_dates() {
        let payload = parse_payload(SAMPLE).expect("sample should parse");
        let (top_level, _) = normalize(&payload);
        let coffee = top_level.iter().find(|e| e.id == "b1").expect("break kept");
        assert!(coffee.span.is_none());
        assert_eq!(coffee.kind, EntryKind::Break);
    }

    #[test]
    fn null_dates_and_children_do_not_abort_the_load() {
        let payload = parse_payload(
            r##"{
                "20240501": {
                    "b1": {
                        "id": "b1",
                        "title": "Coffee",
                        "entryType": "Break",
                        "startDate": null,
                        "endDate": {"date": "2024-05-01", "time": null},
                        "entries": null
                    },
                    "s1": {
                        "id": "s1",
                        "title": "Plenary",
                        "entryType": "Session",
                        "startDate": {"date": "2024-05-01", "time": "09:00:00"},
                        "endDate": {"date": "2024-05-01", "time": "10:00:00"},
                        "color": "#ff0000",
                        "entries": null
                    }
                }
            }"##,
        )
        .expect("nulls should be tolerated");
        let (top_level, children) = normalize(&payload);

        assert_eq!(top_level.len(), 2);
        assert!(children.is_empty());
        let coffee = top_level.iter().find(|e| e.id == "b1").expect("break kept");
        assert!(coffee.span.is_none());
        let plenary = top_level.iter().find(|e| e.id == "s1").expect("block kept");
        assert_eq!(plenary.start(), Some(at(9, 0)));
    }

    #[test]
    fn accepts_times_without_seconds() {
        let raw = RawDateTime {
            date: "2024-05-01".to_string(),
            time: "09:30".to_string(),
        };
        assert_eq!(parse_timestamp(&raw), Some(at(9, 30)));
        assert_eq!(parse_timestamp(&RawDateTime::default()), None);
    }
}
