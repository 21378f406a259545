use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};

/// Timetable data as served by the event backend: day key -> entry key -> record.
pub type TimetablePayload = BTreeMap<String, BTreeMap<String, RawEntry>>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slot_title: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub session_code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub entry_type: RawEntryType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub start_date: RawDateTime,
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_date: RawDateTime,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub text_color: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entries: BTreeMap<String, RawEntry>,
    #[serde(default)]
    pub attachments: Option<RawAttachments>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RawEntryType {
    Session,
    Break,
    Contribution,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawDateTime {
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawAttachments {
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: Vec<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub folders: Vec<serde_json::Value>,
}

impl RawAttachments {
    pub fn count(&self) -> usize {
        self.files.len() + self.folders.len()
    }
}

pub fn parse_payload(raw: &str) -> Result<TimetablePayload, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Treats an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::{RawEntryType, parse_payload};

    #[test]
    fn parses_nested_blocks_and_numeric_ids() {
        let payload = parse_payload(
            r##"{
                "20240501": {
                    "s1": {
                        "id": "s1",
                        "title": "Plenary",
                        "entryType": "Session",
                        "startDate": {"date": "2024-05-01", "time": "09:00:00"},
                        "endDate": {"date": "2024-05-01", "time": "10:00:00"},
                        "color": "#ff0000",
                        "textColor": "#ffffff",
                        "attachments": {"files": [1, 2], "folders": [{}]},
                        "entries": {
                            "c7": {
                                "id": 7,
                                "title": "Opening talk",
                                "entryType": "Contribution",
                                "startDate": {"date": "2024-05-01", "time": "09:15:00"},
                                "endDate": {"date": "2024-05-01", "time": "09:45:00"}
                            }
                        }
                    },
                    "x1": {"id": "x1", "entryType": "Poster"}
                }
            }"##,
        )
        .expect("payload should parse");

        let day = payload.get("20240501").expect("day present");
        let block = day.get("s1").expect("block present");
        assert_eq!(block.entry_type, RawEntryType::Session);
        assert_eq!(block.attachments.as_ref().map(|a| a.count()), Some(3));
        assert_eq!(block.entries.get("c7").map(|c| c.id.as_str()), Some("7"));
        assert_eq!(day.get("x1").map(|e| e.entry_type), Some(RawEntryType::Other));
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let payload = parse_payload(
            r#"{
                "20240501": {
                    "b1": {
                        "id": "b1",
                        "entryType": "Break",
                        "startDate": null,
                        "endDate": {"date": "2024-05-01", "time": null},
                        "entries": null,
                        "attachments": {"files": null, "folders": null}
                    }
                }
            }"#,
        )
        .expect("nulls should not fail the load");

        let coffee = payload
            .get("20240501")
            .and_then(|day| day.get("b1"))
            .expect("break present");
        assert!(coffee.start_date.date.is_empty());
        assert_eq!(coffee.end_date.date, "2024-05-01");
        assert!(coffee.end_date.time.is_empty());
        assert!(coffee.entries.is_empty());
        assert_eq!(coffee.attachments.as_ref().map(|a| a.count()), Some(0));
    }
}
