mod changes;
mod config;
mod domain;
mod layout;
mod navigation;
mod normalize;
mod payload;
mod script;
mod source;
mod store;
mod style;
mod ui;

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use log::{debug, info};

use crate::config::{load_config, resolve_config_path, save_config, Config};
use crate::domain::{format_span, Entry};
use crate::layout::layout_day;
use crate::script::load_script;
use crate::source::{resolve_payload_path, FileSource, TimetableSource};
use crate::store::{Action, DisplayMode, TimetableStore};
use crate::ui::run_dashboard;

#[derive(Debug, Parser)]
#[command(name = "chronos-timetable", about = "Conference timetable viewer and editor")]
struct Cli {
	/// Timetable JSON as served by the event backend.
	#[arg(long)]
	payload: Option<PathBuf>,
	#[arg(long)]
	config: Option<PathBuf>,
	#[arg(short, long, action = ArgAction::Count)]
	verbose: u8,
	#[arg(long)]
	log_file: Option<PathBuf>,
	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
	InitConfig,
	Dashboard,
	Days,
	Entries {
		#[arg(long)]
		day: Option<String>,
	},
	Layout {
		#[arg(long)]
		day: Option<String>,
		#[arg(long, conflicts_with = "full")]
		compact: bool,
		#[arg(long)]
		full: bool,
		#[arg(long)]
		columns: Option<usize>,
	},
	Apply {
		#[arg(long)]
		script: PathBuf,
		#[arg(long)]
		day: Option<String>,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let command = cli.command.unwrap_or(Command::Dashboard);

	// the dashboard owns the terminal, so it only logs to a file
	if !matches!(command, Command::Dashboard) || cli.log_file.is_some() {
		init_logging(cli.verbose, cli.log_file.as_deref())?;
	}

	let config_path = resolve_config_path(cli.config);
	if let Command::InitConfig = command {
		if config_path.exists() {
			println!("config already exists at {}", config_path.display());
		} else {
			save_config(&config_path, &Config::default())?;
			println!("initialized config at {}", config_path.display());
		}
		return Ok(());
	}

	let config = load_config(&config_path)?;
	debug!("using config {} ({config:?})", config_path.display());

	let source = FileSource::new(resolve_payload_path(cli.payload)?);
	let mut store = TimetableStore::new(config.display_mode, config.navigation());
	store.dispatch(Action::Load {
		data: source.fetch()?,
	});
	info!("timetable loaded from {}", source.describe());

	match command {
		Command::InitConfig => {}
		Command::Dashboard => {
			run_dashboard(&mut store, &source, &config)?;
		}
		Command::Days => {
			print_days(&store, &config);
		}
		Command::Entries { day } => {
			let day = parse_day(day.as_deref())?;
			print_entries(&store, day);
		}
		Command::Layout {
			day,
			compact,
			full,
			columns,
		} => {
			let mode = if full {
				DisplayMode::Full
			} else if compact {
				DisplayMode::Compact
			} else {
				store.display_mode()
			};
			let day = match parse_day(day.as_deref())? {
				Some(day) => Some(day),
				None => store.days().first().copied(),
			};
			let Some(day) = day else {
				println!("no timetable entries");
				return Ok(());
			};
			print_layout(&store, &config, day, mode, columns);
		}
		Command::Apply { script, day } => {
			let day = parse_day(day.as_deref())?;
			apply_script(&mut store, &script)?;
			print_entries(&store, day);
		}
	}

	Ok(())
}

fn init_logging(verbosity: u8, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
	let default_level = match verbosity {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	};

	let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
	builder.format_timestamp_millis();
	if let Some(path) = log_file {
		let file = fs::File::create(path)?;
		builder.target(env_logger::Target::Pipe(Box::new(file)));
	}
	builder.init();
	Ok(())
}

fn parse_day(input: Option<&str>) -> Result<Option<NaiveDate>, Box<dyn Error>> {
	match input {
		Some(raw) => Ok(Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)),
		None => Ok(None),
	}
}

fn print_days(store: &TimetableStore, config: &Config) {
	let days = store.day_entries();
	if days.is_empty() {
		println!("no timetable entries");
		return;
	}

	for (day, entries) in &days {
		let children = entries.iter().map(|entry| entry.children.len()).sum::<usize>();
		let (first_hour, last_hour) = store.hour_bounds(*day, config.show_all_timeslots);
		println!(
			"{} | {} entries | {} contributions | {first_hour:02}:00-{last_hour:02}:00",
			day.format("%Y-%m-%d"),
			entries.len(),
			children
		);
	}
}

fn print_entries(store: &TimetableStore, day: Option<NaiveDate>) {
	let days = store.day_entries();
	let mut printed = false;

	for (date, entries) in &days {
		if day.is_some_and(|day| day != *date) {
			continue;
		}
		println!("{}", date.format("%Y-%m-%d"));
		for day_entry in entries {
			println!("  {}", entry_line(&day_entry.entry));
			for child in &day_entry.children {
				println!("    {}", entry_line(child));
			}
		}
		printed = true;
	}

	if !printed {
		println!("no timetable entries");
	}
}

fn entry_line(entry: &Entry) -> String {
	let color = entry
		.color
		.as_ref()
		.and_then(|color| color.background.as_deref())
		.map(|background| format!(" [{background}]"))
		.unwrap_or_default();
	format!(
		"{} | {} | {} | {}{}",
		entry.id,
		entry.kind.label(),
		format_span(entry.span.as_ref()),
		entry.display_title(),
		color
	)
}

fn print_layout(
	store: &TimetableStore,
	config: &Config,
	day: NaiveDate,
	mode: DisplayMode,
	columns: Option<usize>,
) {
	let mut settings = config.layout_settings(mode);
	if let Some(columns) = columns {
		settings.day_columns = columns.max(1);
	}

	let (top_level, children) = store.effective_entries();
	let all_entries = top_level.into_iter().chain(children).collect::<Vec<_>>();
	let day_entries = store
		.day_entries()
		.remove(&day)
		.unwrap_or_default()
		.iter()
		.flat_map(|day_entry| day_entry.flatten())
		.cloned()
		.collect::<Vec<_>>();

	if day_entries.is_empty() {
		println!("no entries on {}", day.format("%Y-%m-%d"));
		return;
	}

	println!("layout for {} ({mode:?})", day.format("%Y-%m-%d"));
	for layout in layout_day(&day_entries, &all_entries, &settings) {
		let title = day_entries
			.iter()
			.find(|entry| entry.id == layout.entry_id)
			.map(|entry| entry.display_title().to_string())
			.unwrap_or_default();
		println!(
			"{} | col {}/{} | left {:.1}% | width {:.1}% {:+}px | {}",
			layout.entry_id,
			layout.column_index + 1,
			layout.columns,
			layout.left_percent,
			layout.width_percent,
			layout.width_adjust_px,
			title
		);
	}
}

fn apply_script(store: &mut TimetableStore, path: &Path) -> Result<(), Box<dyn Error>> {
	let actions = load_script(path)?;
	let total = actions.len();
	let mut applied = 0;
	for action in actions {
		debug!("dispatching {action:?}");
		if store.dispatch(action) {
			applied += 1;
		}
	}

	let changes = store.changes();
	println!(
		"applied {applied} of {total} actions | history {}/{}",
		changes.current_change_idx(),
		changes.len()
	);
	for change in changes.applied() {
		println!("  {} {}", change.label(), change.entry_id);
	}

	Ok(())
}
