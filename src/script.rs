use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::store::Action;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse action on line {line}: {source}")]
    Decode {
        line: usize,
        source: serde_json::Error,
    },
}

/// Reads a JSON-lines file of actions. Blank lines and `#` comments are skipped.
pub fn load_script(path: &Path) -> Result<Vec<Action>, ScriptError> {
    parse_script(&fs::read_to_string(path)?)
}

pub fn parse_script(raw: &str) -> Result<Vec<Action>, ScriptError> {
    let mut actions = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let action = serde_json::from_str(trimmed).map_err(|source| ScriptError::Decode {
            line: index + 1,
            source,
        })?;
        actions.push(action);
    }
    Ok(actions)
}
