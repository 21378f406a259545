use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::EntryColor;
use crate::layout::{DEFAULT_BLOCK_WIDTH_PERCENT, DEFAULT_COLUMN_PADDING_PX, LayoutSettings};
use crate::navigation::{DEFAULT_MIN_COLUMN_WIDTH, DEFAULT_NUM_DAYS, Navigation};
use crate::store::DisplayMode;

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("io error: {0}")]
	Io(#[from] std::io::Error),
	#[error("failed to parse config: {0}")]
	TomlDecode(#[from] toml::de::Error),
	#[error("failed to encode config: {0}")]
	TomlEncode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub display_mode: DisplayMode,
	pub block_width_percent: f64,
	pub column_padding_px: i32,
	pub day_columns: usize,
	pub show_all_timeslots: bool,
	pub num_days: usize,
	pub min_column_width: u16,
	pub move_step_minutes: i64,
	pub palette: Vec<EntryColor>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			display_mode: DisplayMode::Compact,
			block_width_percent: DEFAULT_BLOCK_WIDTH_PERCENT,
			column_padding_px: DEFAULT_COLUMN_PADDING_PX,
			day_columns: 1,
			show_all_timeslots: false,
			num_days: DEFAULT_NUM_DAYS,
			min_column_width: DEFAULT_MIN_COLUMN_WIDTH,
			move_step_minutes: 5,
			palette: default_palette(),
		}
	}
}

impl Config {
	pub fn layout_settings(&self, display_mode: DisplayMode) -> LayoutSettings {
		LayoutSettings {
			compact: display_mode.is_compact(),
			day_columns: self.day_columns.max(1),
			block_width_percent: self.block_width_percent.clamp(0.0, 100.0),
			column_padding_px: self.column_padding_px,
		}
	}

	pub fn navigation(&self) -> Navigation {
		Navigation::new(self.num_days, self.min_column_width)
	}
}

fn default_palette() -> Vec<EntryColor> {
	[
		("#ffffff", "#1f78b4"),
		("#ffffff", "#33a02c"),
		("#000000", "#fdbf6f"),
		("#ffffff", "#e31a1c"),
		("#ffffff", "#6a3d9a"),
		("#000000", "#a6cee3"),
	]
	.into_iter()
	.map(|(text, background)| EntryColor::new(text, background))
	.collect()
}

pub fn resolve_config_path(cli_path: Option<PathBuf>) -> PathBuf {
	if let Some(path) = cli_path {
		return path;
	}

	if let Some(path) = env::var_os("CHRONOS_TIMETABLE_CONFIG") {
		let path = PathBuf::from(path);
		if !path.as_os_str().is_empty() {
			return path;
		}
	}

	config_dir().join(CONFIG_FILE)
}

/// Missing files are not an error: the defaults apply.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
	let raw = match fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Config::default()),
		Err(err) => return Err(err.into()),
	};

	Ok(toml::from_str(&raw)?)
}

pub fn save_config(path: &Path, config: &Config) -> Result<(), ConfigError> {
	if let Some(parent) = path.parent() {
		if !parent.as_os_str().is_empty() {
			fs::create_dir_all(parent)?;
		}
	}

	fs::write(path, toml::to_string_pretty(config)?)?;
	Ok(())
}

fn config_dir() -> PathBuf {
	#[cfg(target_os = "windows")]
	{
		if let Some(path) = env::var_os("APPDATA") {
			return PathBuf::from(path).join("chronos_timetable");
		}
	}

	if let Some(path) = env::var_os("XDG_CONFIG_HOME") {
		return PathBuf::from(path).join("chronos_timetable");
	}

	if let Some(path) = env::var_os("HOME") {
		return PathBuf::from(path).join(".config").join("chronos_timetable");
	}

	PathBuf::from(".chronos_timetable")
}
