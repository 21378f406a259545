use std::env;
use std::fs;
use std::path::PathBuf;

use log::debug;
use thiserror::Error;

use crate::payload::{TimetablePayload, parse_payload};

pub const PAYLOAD_ENV: &str = "CHRONOS_TIMETABLE_PAYLOAD";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no timetable data selected: pass --payload <path> or set CHRONOS_TIMETABLE_PAYLOAD")]
    Unconfigured,
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse timetable data from {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where timetable data comes from. The store only ever sees the decoded payload.
pub trait TimetableSource {
    fn describe(&self) -> String;
    fn fetch(&self) -> Result<TimetablePayload, SourceError>;
}

#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TimetableSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<TimetablePayload, SourceError> {
        debug!("reading timetable data from {}", self.path.display());
        let raw = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.path.clone(),
            source,
        })?;
        parse_payload(&raw).map_err(|source| SourceError::Decode {
            path: self.path.clone(),
            source,
        })
    }
}

pub fn resolve_payload_path(cli_path: Option<PathBuf>) -> Result<PathBuf, SourceError> {
    if let Some(path) = cli_path {
        return Ok(path);
    }

    if let Some(path) = env::var_os(PAYLOAD_ENV) {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return Ok(path);
        }
    }

    Err(SourceError::Unconfigured)
}
