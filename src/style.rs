use crate::domain::{Entry, has_children};

const CHILD_ALPHA: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryRole {
    Parent,
    Child,
    Plain,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryStyle {
    pub text: Option<String>,
    pub background: Option<String>,
    pub border: Option<String>,
    pub role: EntryRole,
    pub tooltip: Option<String>,
}

/// Colors and role of an entry. Children have no colors of their own and take
/// their block's, with a translucent background.
pub fn entry_style(entry: &Entry, entries: &[Entry]) -> EntryStyle {
    if let Some(parent_id) = &entry.parent_id {
        let parent_color = entries
            .iter()
            .find(|other| &other.id == parent_id)
            .and_then(|parent| parent.color.as_ref());
        let background = parent_color
            .and_then(|color| color.background.as_deref())
            .and_then(make_translucent);
        return EntryStyle {
            text: parent_color.and_then(|color| color.text.clone()),
            border: background.clone(),
            background,
            role: EntryRole::Child,
            tooltip: None,
        };
    }

    let background = entry
        .color
        .as_ref()
        .and_then(|color| color.background.clone());
    let is_parent = has_children(entry, entries);
    EntryStyle {
        text: entry.color.as_ref().and_then(|color| color.text.clone()),
        border: background.clone(),
        background,
        role: if is_parent {
            EntryRole::Parent
        } else {
            EntryRole::Plain
        },
        tooltip: is_parent.then(|| entry.title.clone()),
    }
}

pub fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

pub fn make_translucent(hex: &str) -> Option<String> {
    let (r, g, b) = parse_hex_color(hex)?;
    Some(format!("rgba({r}, {g}, {b}, {CHILD_ALPHA})"))
}

#[cfg(test)]
mod tests {
    use crate::domain::EntryColor;
    use crate::domain::tests::{at, entry};

    use super::{EntryRole, entry_style, make_translucent, parse_hex_color};

    #[test]
    fn children_inherit_translucent_parent_colors() {
        let mut block = entry("s1", None, at(9, 0), at(10, 0));
        block.color = Some(EntryColor::new("#ffffff", "#ff0000"));
        let talk = entry("c1", Some("s1"), at(9, 15), at(9, 45));
        let entries = vec![block.clone(), talk.clone()];

        let block_style = entry_style(&block, &entries);
        assert_eq!(block_style.role, EntryRole::Parent);
        assert_eq!(block_style.background.as_deref(), Some("#ff0000"));
        assert_eq!(block_style.tooltip.as_deref(), Some("Entry s1"));

        let talk_style = entry_style(&talk, &entries);
        assert_eq!(talk_style.role, EntryRole::Child);
        assert_eq!(talk_style.text.as_deref(), Some("#ffffff"));
        assert_eq!(talk_style.background.as_deref(), Some("rgba(255, 0, 0, 0.8)"));
        assert_eq!(talk_style.tooltip, None);
    }

    #[test]
    fn rejects_malformed_hex() {
        assert_eq!(parse_hex_color("#0a0B0c"), Some((10, 11, 12)));
        assert_eq!(parse_hex_color("red"), None);
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(make_translucent("#zzzzzz"), None);
    }
}
