use std::collections::BTreeMap;
use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use log::{info, warn};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};

use crate::config::Config;
use crate::domain::{format_minutes, format_span, Entry, EntryColor};
use crate::layout::{layout_day, EntryLayout};
use crate::source::TimetableSource;
use crate::store::{Action, TimetableStore};
use crate::style::{entry_style, parse_hex_color, EntryRole, EntryStyle};

const TIME_GUTTER_WIDTH: u16 = 6;
const DETAILS_WIDTH: u16 = 38;
const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const FALLBACK_BLOCK_COLOR: Color = Color::Rgb(52, 78, 120);
const FALLBACK_CHILD_COLOR: Color = Color::Rgb(42, 45, 52);

pub fn run_dashboard(
	store: &mut TimetableStore,
	source: &dyn TimetableSource,
	config: &Config,
) -> Result<(), Box<dyn Error>> {
	enable_raw_mode()?;
	let mut stdout = io::stdout();
	stdout.execute(EnterAlternateScreen)?;
	let backend = CrosstermBackend::new(stdout);
	let mut terminal = Terminal::new(backend)?;

	if let Ok(size) = terminal.size() {
		store.dispatch(Action::ResizeWindow {
			width: timeline_width(size.width),
		});
	}

	let result = run_event_loop(&mut terminal, store, source, config);

	disable_raw_mode()?;
	execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
	terminal.show_cursor()?;

	result
}

fn run_event_loop(
	terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
	store: &mut TimetableStore,
	source: &dyn TimetableSource,
	config: &Config,
) -> Result<(), Box<dyn Error>> {
	let mut app = App::new(config);

	loop {
		let view = build_view(&app, store, config);
		terminal.draw(|frame| draw_dashboard(frame, &app, store, &view))?;

		if !event::poll(StdDuration::from_millis(250))? {
			continue;
		}

		match event::read()? {
			CEvent::Key(key) if key.kind == KeyEventKind::Press => {
				if handle_key(&mut app, key, store, source, config, &view) {
					break;
				}
			}
			CEvent::Resize(width, _) => {
				store.dispatch(Action::ResizeWindow {
					width: timeline_width(width),
				});
			}
			_ => {}
		}
	}

	Ok(())
}

fn timeline_width(terminal_width: u16) -> u16 {
	terminal_width.saturating_sub(DETAILS_WIDTH + TIME_GUTTER_WIDTH)
}

fn handle_key(
	app: &mut App,
	key: KeyEvent,
	store: &mut TimetableStore,
	source: &dyn TimetableSource,
	config: &Config,
	view: &ViewModel,
) -> bool {
	let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
	match key.code {
		KeyCode::Char('q') | KeyCode::Esc => return true,
		KeyCode::Char('z') if ctrl => undo(app, store),
		KeyCode::Char('y') if ctrl => redo(app, store),
		KeyCode::Char('u') => undo(app, store),
		KeyCode::Char('r') => redo(app, store),
		KeyCode::Left | KeyCode::Char('h') => {
			let offset = store.navigation().offset.saturating_sub(1);
			store.dispatch(Action::ScrollNavbar { offset });
		}
		KeyCode::Right | KeyCode::Char('l') => {
			let offset = store.navigation().offset + 1;
			store.dispatch(Action::ScrollNavbar { offset });
		}
		KeyCode::Up | KeyCode::Char('k') => move_selection(app, store, view, -1),
		KeyCode::Down | KeyCode::Char('j') => move_selection(app, store, view, 1),
		KeyCode::Char('K') => shift_selected(app, store, -config.move_step_minutes),
		KeyCode::Char('J') => shift_selected(app, store, config.move_step_minutes),
		KeyCode::Char('+') | KeyCode::Char('=') => resize_selected(app, store, config.move_step_minutes),
		KeyCode::Char('-') => resize_selected(app, store, -config.move_step_minutes),
		KeyCode::Char('c') => recolor_selected(app, store, &config.palette),
		KeyCode::Char('m') => {
			store.dispatch(Action::ToggleDisplayMode);
			app.status = format!("display mode: {:?}", store.display_mode()).to_lowercase();
		}
		KeyCode::Char('a') => {
			app.show_all_timeslots = !app.show_all_timeslots;
		}
		KeyCode::Char('R') => reload(app, store, source),
		_ => {}
	}

	false
}

fn undo(app: &mut App, store: &mut TimetableStore) {
	let label = store.changes().last_applied().map(|change| change.label());
	app.status = match (store.dispatch(Action::Undo), label) {
		(true, Some(label)) => format!("undid {label}"),
		_ => "nothing to undo".to_string(),
	};
}

fn redo(app: &mut App, store: &mut TimetableStore) {
	app.status = if store.dispatch(Action::Redo) {
		let label = store.changes().last_applied().map_or("change", |change| change.label());
		format!("redid {label}")
	} else {
		"nothing to redo".to_string()
	};
}

fn move_selection(app: &mut App, store: &mut TimetableStore, view: &ViewModel, delta: i32) {
	if view.rows.is_empty() {
		return;
	}

	let next = match store
		.selected_id()
		.and_then(|id| view.rows.iter().position(|row| row == id))
	{
		Some(index) => (index as i32 + delta).clamp(0, view.rows.len() as i32 - 1) as usize,
		None if delta < 0 => view.rows.len() - 1,
		None => 0,
	};

	store.dispatch(Action::Select {
		entry_id: Some(view.rows[next].clone()),
	});
	app.status.clear();
}

fn shift_selected(app: &mut App, store: &mut TimetableStore, minutes: i64) {
	let Some((entry, span)) = selected_with_span(app, store) else {
		return;
	};

	let delta = Duration::minutes(minutes);
	let moved = store.dispatch(Action::Move {
		entry_id: entry.id.clone(),
		start: span.start + delta,
		end: span.end() + delta,
		resource_id: entry.resource_id.clone(),
	});
	app.status = if moved {
		format!("moved {} to {}", entry.display_title(), (span.start + delta).format("%H:%M"))
	} else {
		format!("could not move {}", entry.display_title())
	};
}

fn resize_selected(app: &mut App, store: &mut TimetableStore, minutes: i64) {
	let Some((entry, span)) = selected_with_span(app, store) else {
		return;
	};

	let resized = store.dispatch(Action::Resize {
		entry_id: entry.id.clone(),
		start: span.start,
		end: span.end() + Duration::minutes(minutes),
	});
	app.status = if resized {
		format!(
			"{} now lasts {}",
			entry.display_title(),
			format_minutes(span.duration_minutes + minutes)
		)
	} else {
		format!("{} cannot get any shorter", entry.display_title())
	};
}

fn recolor_selected(app: &mut App, store: &mut TimetableStore, palette: &[EntryColor]) {
	let Some(selected) = store.selected_entry() else {
		app.status = "select an entry first".to_string();
		return;
	};
	if palette.is_empty() {
		app.status = "no palette configured".to_string();
		return;
	}

	// children are drawn in their block's colors, so recolor the block
	let target = match &selected.parent_id {
		Some(parent_id) => match store.effective_entry(parent_id) {
			Some(parent) => parent,
			None => selected,
		},
		None => selected,
	};

	let next = target
		.color
		.as_ref()
		.and_then(|current| palette.iter().position(|color| color == current))
		.map_or(0, |index| (index + 1) % palette.len());

	if store.dispatch(Action::Recolor {
		entry_id: target.id.clone(),
		color: palette[next].clone(),
	}) {
		app.status = format!("recolored {}", target.display_title());
	}
}

fn reload(app: &mut App, store: &mut TimetableStore, source: &dyn TimetableSource) {
	match source.fetch() {
		Ok(data) => {
			store.dispatch(Action::Load { data });
			info!("reloaded timetable from {}", source.describe());
			app.status = format!("reloaded {}", source.describe());
		}
		Err(err) => {
			warn!("reload failed: {err}");
			app.status = format!("reload failed: {err}");
		}
	}
}

fn selected_with_span(app: &mut App, store: &TimetableStore) -> Option<(Entry, crate::domain::TimeSpan)> {
	let Some(entry) = store.selected_entry() else {
		app.status = "select an entry first".to_string();
		return None;
	};
	let Some(span) = entry.span else {
		app.status = format!("{} has no valid time", entry.display_title());
		return None;
	};
	Some((entry, span))
}

fn build_view(app: &App, store: &TimetableStore, config: &Config) -> ViewModel {
	let settings = config.layout_settings(store.display_mode());
	let (top_level, children) = store.effective_entries();
	let all_entries = top_level.into_iter().chain(children).collect::<Vec<_>>();
	let day_entries = store.day_entries();
	let days = day_entries.keys().copied().collect::<Vec<_>>();
	let visible = store.navigation().visible_range(days.len());

	let mut columns = Vec::new();
	let mut rows = Vec::new();
	let mut hours: Option<(u32, u32)> = None;

	for day in &days[visible] {
		let entries = day_entries
			.get(day)
			.into_iter()
			.flatten()
			.flat_map(|day_entry| day_entry.flatten())
			.cloned()
			.collect::<Vec<_>>();
		let layouts = layout_day(&entries, &all_entries, &settings);
		rows.extend(entries.iter().map(|entry| entry.id.clone()));

		let (first, last) = store.hour_bounds(*day, app.show_all_timeslots);
		hours = Some(match hours {
			Some((lo, hi)) => (lo.min(first), hi.max(last)),
			None => (first, last),
		});

		columns.push(DayColumn {
			day: *day,
			entries,
			layouts,
		});
	}

	ViewModel {
		columns,
		rows,
		all_entries,
		hours: hours.unwrap_or((0, 24)),
		total_days: days.len(),
	}
}

fn draw_dashboard(frame: &mut Frame, app: &App, store: &TimetableStore, view: &ViewModel) {
	let layout = Layout::default()
		.direction(Direction::Vertical)
		.constraints([Constraint::Min(10), Constraint::Length(4)])
		.split(frame.area());

	let body = Layout::default()
		.direction(Direction::Horizontal)
		.constraints([
			Constraint::Length(TIME_GUTTER_WIDTH),
			Constraint::Min(20),
			Constraint::Length(DETAILS_WIDTH),
		])
		.split(layout[0]);

	render_time_gutter(frame, body[0], view.hours);
	render_day_columns(frame, body[1], store, view);
	render_details_panel(frame, body[2], store, view);
	render_footer(frame, layout[1], app, store, view);
}

fn render_time_gutter(frame: &mut Frame, area: Rect, hours: (u32, u32)) {
	let inner = Rect::new(area.x, area.y + 1, area.width, area.height.saturating_sub(2));
	let scale = TimeScale::new(hours, inner);
	let mut labels = vec![Line::from(""); usize::from(inner.height)];
	for hour in hours.0..hours.1 {
		let row = scale.row(i64::from(hour) * 60) - inner.y;
		if let Some(line) = labels.get_mut(usize::from(row)) {
			*line = Line::styled(format!("{hour:02}:00"), Style::default().fg(Color::DarkGray));
		}
	}
	frame.render_widget(Paragraph::new(labels), inner);
}

fn render_day_columns(frame: &mut Frame, area: Rect, store: &TimetableStore, view: &ViewModel) {
	if view.columns.is_empty() {
		let empty = Paragraph::new("no timetable entries")
			.block(Block::default().borders(Borders::ALL).title("Timetable"));
		frame.render_widget(empty, area);
		return;
	}

	let count = view.columns.len() as u32;
	let areas = Layout::default()
		.direction(Direction::Horizontal)
		.constraints(view.columns.iter().map(|_| Constraint::Ratio(1, count)).collect::<Vec<_>>())
		.split(area);

	for (column, column_area) in view.columns.iter().zip(areas.iter()) {
		render_day_column(frame, *column_area, store, view, column);
	}
}

fn render_day_column(
	frame: &mut Frame,
	area: Rect,
	store: &TimetableStore,
	view: &ViewModel,
	column: &DayColumn,
) {
	let selected_id = store.selected_id();
	let holds_selection = selected_id.is_some_and(|id| column.entries.iter().any(|entry| entry.id == id));
	let block = Block::default()
		.borders(Borders::ALL)
		.title(column.day.format("%a %d %b").to_string())
		.border_style(border_style(holds_selection));
	let inner = block.inner(area);
	frame.render_widget(block, area);

	let scale = TimeScale::new(view.hours, inner);
	let by_id = column
		.entries
		.iter()
		.map(|entry| (entry.id.as_str(), entry))
		.collect::<BTreeMap<_, _>>();

	let mut placed = column
		.layouts
		.iter()
		.filter_map(|layout| by_id.get(layout.entry_id.as_str()).map(|entry| (layout, *entry)))
		.collect::<Vec<_>>();
	// blocks underneath, children on top
	placed.sort_by_key(|(_, entry)| entry.is_child());

	for (layout, entry) in placed {
		let Some(rect) = entry_rect(inner, &scale, layout, entry) else {
			continue;
		};
		let style = entry_style(entry, &view.all_entries);
		let is_selected = selected_id == Some(entry.id.as_str());
		render_entry(frame, rect, entry, &style, is_selected);
	}
}

fn entry_rect(inner: Rect, scale: &TimeScale, layout: &EntryLayout, entry: &Entry) -> Option<Rect> {
	let span = entry.span?;
	if inner.width == 0 || inner.height == 0 {
		return None;
	}

	let width_cells = f64::from(inner.width);
	let left = ((width_cells * layout.left_percent / 100.0).round() as u16).min(inner.width - 1);
	let width = ((width_cells * layout.width_percent.min(100.0) / 100.0).round() as u16)
		.max(1)
		.min(inner.width - left);

	let start = span.start_minute_of_day();
	let top = scale.row(start);
	let bottom = scale.row(start + span.duration_minutes);
	let height = bottom.saturating_sub(top).max(1).min(inner.y + inner.height - top);
	if height == 0 {
		return None;
	}

	Some(Rect::new(inner.x + left, top, width, height))
}

fn render_entry(frame: &mut Frame, area: Rect, entry: &Entry, style: &EntryStyle, is_selected: bool) {
	let fallback = if style.role == EntryRole::Child {
		FALLBACK_CHILD_COLOR
	} else {
		FALLBACK_BLOCK_COLOR
	};
	let background = style
		.background
		.as_deref()
		.and_then(color_from_css)
		.unwrap_or(fallback);
	let text = style
		.text
		.as_deref()
		.and_then(color_from_css)
		.unwrap_or(Color::White);

	let mut entry_style = Style::default().fg(text).bg(background);
	if is_selected {
		entry_style = entry_style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
	}

	let mut lines = vec![Line::from(entry.display_title().to_string())];
	if let (Some(start), Some(end)) = (entry.start(), entry.end()) {
		lines.push(Line::from(format!("{}-{}", start.format("%H:%M"), end.format("%H:%M"))));
	}

	frame.render_widget(Clear, area);
	frame.render_widget(Paragraph::new(lines).style(entry_style), area);
}

fn render_details_panel(frame: &mut Frame, area: Rect, store: &TimetableStore, view: &ViewModel) {
	let mut lines = Vec::new();
	match store.selected_entry() {
		Some(entry) => {
			lines.push(Line::from(Span::styled(
				entry.title.clone(),
				Style::default().add_modifier(Modifier::BOLD),
			)));
			lines.push(Line::from(format!("type: {}", entry.kind.label())));
			lines.push(Line::from(format!("time: {}", format_span(entry.span.as_ref()))));
			if let Some(span) = entry.span {
				lines.push(Line::from(format!("duration: {}", format_minutes(span.duration_minutes))));
			}
			if let Some(slot_title) = &entry.slot_title {
				lines.push(Line::from(format!("slot: {slot_title}")));
			}
			if let Some(code) = entry.code.as_ref().or(entry.session_code.as_ref()) {
				lines.push(Line::from(format!("code: {code}")));
			}
			if let Some(parent) = entry
				.parent_id
				.as_ref()
				.and_then(|id| view.all_entries.iter().find(|other| &other.id == id))
			{
				lines.push(Line::from(format!("in: {}", parent.display_title())));
			}
			let style = entry_style(&entry, &view.all_entries);
			if let Some(background) = &style.background {
				lines.push(Line::from(format!("color: {background}")));
			}
			if let Some(tooltip) = &style.tooltip {
				lines.push(Line::from(format!("tooltip: {tooltip}")));
			}
			if entry.attachment_count > 0 {
				lines.push(Line::from(format!("attachments: {}", entry.attachment_count)));
			}
			if let Some(resource_id) = &entry.resource_id {
				lines.push(Line::from(format!("resource: {resource_id}")));
			}
			if let Some(description) = entry.description.as_ref().filter(|d| !d.trim().is_empty()) {
				lines.push(Line::from(""));
				lines.push(Line::from(description.clone()));
			}
		}
		None => lines.push(Line::from("no entry selected")),
	}

	let changes = store.changes();
	lines.push(Line::from(""));
	lines.push(Line::from(format!(
		"history: {}/{}",
		changes.current_change_idx(),
		changes.len()
	)));
	for change in changes.applied().iter().rev().take(5) {
		lines.push(Line::styled(
			format!("  {} {}", change.label(), change.entry_id),
			Style::default().fg(Color::DarkGray),
		));
	}

	let panel = Paragraph::new(lines)
		.wrap(Wrap { trim: true })
		.block(Block::default().borders(Borders::ALL).title("Entry"));
	frame.render_widget(panel, area);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, store: &TimetableStore, view: &ViewModel) {
	let navigation = store.navigation();
	let visible = navigation.visible_range(view.total_days);
	let summary = format!(
		"days {}-{} of {} | {:?} | undo {} | redo {}",
		visible.start + 1,
		visible.end,
		view.total_days,
		store.display_mode(),
		if store.can_undo() { "yes" } else { "no" },
		if store.can_redo() { "yes" } else { "no" },
	);

	let footer_lines = vec![
		Line::from("j/k select | J/K move | +/- resize | c color | u/^z undo | r/^y redo | m mode | a all hours | h/l days | R reload | q quit"),
		Line::from(if app.status.is_empty() {
			summary
		} else {
			format!("{summary} | {}", app.status)
		}),
	];

	let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
	frame.render_widget(footer, area);
}

fn color_from_css(value: &str) -> Option<Color> {
	if let Some((r, g, b)) = parse_hex_color(value) {
		return Some(Color::Rgb(r, g, b));
	}

	let channels = value.strip_prefix("rgba(")?.strip_suffix(')')?;
	let mut parts = channels.split(',').map(str::trim);
	let r = parts.next()?.parse().ok()?;
	let g = parts.next()?.parse().ok()?;
	let b = parts.next()?.parse().ok()?;
	Some(Color::Rgb(r, g, b))
}

fn border_style(focused: bool) -> Style {
	if focused {
		Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)
	} else {
		Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
	}
}

/// Maps minutes of the day onto terminal rows of a column.
struct TimeScale {
	first_minute: i64,
	last_minute: i64,
	top: u16,
	height: u16,
}

impl TimeScale {
	fn new(hours: (u32, u32), area: Rect) -> Self {
		let first_minute = i64::from(hours.0) * 60;
		let last_minute = (i64::from(hours.1) * 60).max(first_minute + 60);
		Self {
			first_minute,
			last_minute,
			top: area.y,
			height: area.height,
		}
	}

	fn row(&self, minute: i64) -> u16 {
		let minute = minute.clamp(self.first_minute, self.last_minute);
		let offset = (minute - self.first_minute) * i64::from(self.height)
			/ (self.last_minute - self.first_minute);
		self.top + offset.min(i64::from(self.height.saturating_sub(1))) as u16
	}
}

struct App {
	show_all_timeslots: bool,
	status: String,
}

impl App {
	fn new(config: &Config) -> Self {
		Self {
			show_all_timeslots: config.show_all_timeslots,
			status: String::new(),
		}
	}
}

struct DayColumn {
	day: NaiveDate,
	entries: Vec<Entry>,
	layouts: Vec<EntryLayout>,
}

struct ViewModel {
	columns: Vec<DayColumn>,
	rows: Vec<String>,
	all_entries: Vec<Entry>,
	hours: (u32, u32),
	total_days: usize,
}

#[cfg(test)]
mod tests {
	use ratatui::layout::Rect;
	use ratatui::style::Color;

	use super::{color_from_css, TimeScale};

	#[test]
	fn parses_hex_and_rgba_colors() {
		assert_eq!(color_from_css("#ff8000"), Some(Color::Rgb(255, 128, 0)));
		assert_eq!(color_from_css("rgba(1, 2, 3, 0.8)"), Some(Color::Rgb(1, 2, 3)));
		assert_eq!(color_from_css("blue"), None);
	}

	#[test]
	fn time_scale_maps_hours_to_rows() {
		let scale = TimeScale::new((8, 12), Rect::new(0, 2, 10, 16));
		assert_eq!(scale.row(8 * 60), 2);
		assert_eq!(scale.row(9 * 60), 6);
		assert_eq!(scale.row(11 * 60 + 45), 17);
		assert_eq!(scale.row(0), 2);
		assert_eq!(scale.row(24 * 60), 17);
	}
}
