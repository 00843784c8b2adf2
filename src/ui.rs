//! Terminal User Interface for coolwatch.
//!
//! This module provides a real-time dashboard using `ratatui` that displays:
//!
//! - Status bar with site, poll time and alarm counts
//! - Container list with per-channel severity colors and flashing
//! - Threshold editor for the selected container
//! - Notifications from saves, resets and failed reads
//!
//! # Controls
//!
//! - `q` or `Esc`: Quit
//! - `Up`/`Down`: Select container
//! - `Tab`: Next quantity, `Left`/`Right`: Previous/next level
//! - Digits, `.`, `-`: Type a level value (applied live, no cascading)
//! - `Enter`: Commit the value (cascades neighbouring levels)
//! - `s`: Save thresholds, `r`: Reset to built-in thresholds
//! - `y`/`n`: Answer the audible alarm prompt

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use tracing::warn;

use crate::alarm::SoundConsent;
use crate::app::{App, ContainerView, NotificationLevel};
use crate::error::Result;
use crate::thresholds::{LevelKey, Quantity, Severity, LEVEL_COUNT};

/// Half period of the flashing effect.
const FLASH_PERIOD: Duration = Duration::from_millis(500);

/// Time between two alarm beeps.
const BEEP_PERIOD: Duration = Duration::from_secs(1);

/// Selection and typing state of the dashboard.
#[derive(Default)]
struct UiState {
    selected: usize,
    quantity: usize,
    level: usize,
    /// Text typed into the focused level, if any
    input: Option<String>,
}

impl UiState {
    /// Quantity and level the editor cursor points at.
    fn target(&self, app: &App) -> Option<(Quantity, LevelKey)> {
        let view = app.views.get(self.selected)?;
        let quantities = view.thresholds.quantities();
        if quantities.is_empty() {
            return None;
        }
        let quantity = quantities[self.quantity % quantities.len()];
        Some((quantity, quantity.kind().keys()[self.level % LEVEL_COUNT]))
    }

    fn clamp(&mut self, app: &App) {
        if app.views.is_empty() {
            self.selected = 0;
        } else if self.selected >= app.views.len() {
            self.selected = app.views.len() - 1;
        }
    }
}

/// Run the TUI event loop.
///
/// This takes ownership of the App and terminal, running until the user
/// presses `q` or `Esc`, or the `running` flag is set to false.
///
/// # Arguments
///
/// * `app` - Application instance
/// * `running` - Atomic flag to signal shutdown
/// * `interval` - Time between snapshot polls
pub fn run(mut app: App, running: Arc<AtomicBool>, interval: Duration) -> Result<()> {
    enable_raw_mode()?;
    if let Err(e) = std::io::stdout().execute(EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e.into());
    }

    let result = run_tui_loop(&mut app, &running, interval);

    // Always clean up terminal state
    let _ = disable_raw_mode();
    let _ = std::io::stdout().execute(LeaveAlternateScreen);

    result
}

/// Inner TUI loop - separated to ensure cleanup happens on any exit path.
fn run_tui_loop(app: &mut App, running: &Arc<AtomicBool>, interval: Duration) -> Result<()> {
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut terminal = Terminal::new(backend)?;
    let mut ui = UiState::default();

    let started = Instant::now();
    let mut last_poll = Instant::now();
    let mut last_beep: Option<Instant> = None;

    // Initial poll
    app.tick()?;

    while running.load(Ordering::Relaxed) {
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !handle_key(app, &mut ui, key) {
                    running.store(false, Ordering::Relaxed);
                }
            }
        }

        if last_poll.elapsed() >= interval {
            app.tick()?;
            ui.clamp(app);
            last_poll = Instant::now();
        }

        if app.should_beep() {
            if last_beep.map_or(true, |t| t.elapsed() >= BEEP_PERIOD) {
                beep();
                last_beep = Some(Instant::now());
            }
        } else {
            last_beep = None;
        }

        let flash_on = (started.elapsed().as_millis() / FLASH_PERIOD.as_millis()) % 2 == 0;
        terminal.draw(|f| draw_ui(f, app, &ui, flash_on))?;
    }

    Ok(())
}

/// Ring the terminal bell.
fn beep() {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(b"\x07");
    let _ = stdout.flush();
}

/// Apply a key press. Returns `false` when the dashboard should quit.
fn handle_key(app: &mut App, ui: &mut UiState, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }

    if app.consent == SoundConsent::Pending {
        match key.code {
            KeyCode::Char('y') => {
                app.consent = SoundConsent::Granted;
                return true;
            }
            KeyCode::Char('n') => {
                app.consent = SoundConsent::Declined;
                return true;
            }
            _ => {}
        }
    }

    match key.code {
        KeyCode::Char(c) if c.is_ascii_digit() || c == '.' || c == '-' => {
            ui.input.get_or_insert_with(String::new).push(c);
            apply_live(app, ui);
        }
        KeyCode::Backspace => {
            if let Some(input) = ui.input.as_mut() {
                input.pop();
                apply_live(app, ui);
            }
        }
        KeyCode::Enter => commit_input(app, ui),
        KeyCode::Esc if ui.input.is_some() => commit_input(app, ui),
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Up => {
            commit_input(app, ui);
            ui.selected = ui.selected.saturating_sub(1);
        }
        KeyCode::Down => {
            commit_input(app, ui);
            if ui.selected + 1 < app.views.len() {
                ui.selected += 1;
            }
        }
        KeyCode::Tab => {
            commit_input(app, ui);
            ui.quantity = ui.quantity.wrapping_add(1);
        }
        KeyCode::Left => {
            commit_input(app, ui);
            ui.level = ui.level.checked_sub(1).unwrap_or(LEVEL_COUNT - 1);
        }
        KeyCode::Right => {
            commit_input(app, ui);
            ui.level = (ui.level + 1) % LEVEL_COUNT;
        }
        KeyCode::Char('s') => {
            commit_input(app, ui);
            app.save_thresholds(ui.selected);
        }
        KeyCode::Char('r') => {
            ui.input = None;
            app.reset_thresholds(ui.selected);
        }
        _ => {}
    }
    true
}

/// Push the typed text into the focused level without cascading.
fn apply_live(app: &mut App, ui: &UiState) {
    let (Some(input), Some((quantity, key))) = (ui.input.as_deref(), ui.target(app)) else {
        return;
    };
    if let Ok(value) = input.parse::<f64>() {
        app.change_threshold(ui.selected, quantity, key, value);
    }
}

/// Leave the focused level: cascade with the typed value, or with the
/// stored one when the text does not parse.
fn commit_input(app: &mut App, ui: &mut UiState) {
    let Some(input) = ui.input.take() else {
        return;
    };
    let Some((quantity, key)) = ui.target(app) else {
        return;
    };
    let stored = app
        .views
        .get(ui.selected)
        .and_then(|v| v.thresholds.get(quantity))
        .and_then(|b| b.get(key));
    if let Some(value) = input.parse::<f64>().ok().or(stored) {
        app.commit_threshold(ui.selected, quantity, key, value);
    }
}

/// Dashboard color for a severity.
fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::CriticalLow | Severity::CriticalHigh => Color::Red,
        Severity::AlarmLow => Color::Rgb(255, 215, 0),
        Severity::Normal => Color::Green,
        Severity::AlarmHigh => Color::Rgb(255, 165, 0),
        Severity::Neutral => Color::White,
        Severity::Unknown => Color::DarkGray,
    }
}

/// Main UI drawing function.
fn draw_ui(f: &mut Frame, app: &App, ui: &UiState, flash_on: bool) {
    let size = f.area();
    let ask_consent = app.consent == SoundConsent::Pending;

    let mut constraints = vec![Constraint::Length(3)];
    if ask_consent {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(10));
    constraints.push(Constraint::Length(8));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(size);

    let mut chunk_idx = 0;

    draw_status_bar(f, app, chunks[chunk_idx]);
    chunk_idx += 1;

    if ask_consent {
        draw_consent_prompt(f, chunks[chunk_idx]);
        chunk_idx += 1;
    }

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(chunks[chunk_idx]);
    chunk_idx += 1;

    draw_containers(f, app, ui, flash_on, body[0]);
    draw_editor(f, app, ui, body[1]);
    draw_notifications(f, app, chunks[chunk_idx]);
}

/// Draw the top status bar.
fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let sound = match app.consent {
        SoundConsent::Granted if app.should_beep() => "🔊 ALARM",
        SoundConsent::Granted => "🔈 armed",
        SoundConsent::Declined => "🔇 muted",
        SoundConsent::Pending => "🔇 awaiting consent",
    };
    let status_text = match &app.last_update {
        Some(time) => format!(
            " ❄ coolwatch | {} | {} | Containers: {} | Flashing: {} | Critical: {} | Sound: {} | [q]uit",
            if app.site.is_empty() { "-" } else { app.site.as_str() },
            time,
            app.views.len(),
            app.flashing_count(),
            app.critical_count(),
            sound,
        ),
        None => " ❄ coolwatch | Waiting for snapshot... | [q]uit".to_string(),
    };

    let bg = if app.critical_count() > 0 {
        Color::Red
    } else {
        Color::DarkGray
    };
    let status = Paragraph::new(status_text)
        .style(Style::default().fg(Color::White).bg(bg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("Status"),
        );

    f.render_widget(status, area);
}

/// Draw the one-time audible alarm consent prompt.
fn draw_consent_prompt(f: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new("Play an audible alarm while a container is critically high? [y]es / [n]o")
        .style(Style::default().fg(Color::Black).bg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("⚠ Sound")
                .border_style(Style::default().fg(Color::Yellow)),
        );
    f.render_widget(paragraph, area);
}

/// One list entry per container, channels colored by severity.
fn container_item(view: &ContainerView, selected: bool, flash_on: bool) -> ListItem<'static> {
    let state = view.evaluation.state;
    let kind = view
        .evaluation
        .container_type
        .map(|t| t.label())
        .unwrap_or("Unknown type");

    let mut spans = vec![
        Span::raw(if selected { "▶ " } else { "  " }),
        Span::styled(
            format!("{:<12}", view.container.name),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(" {:<18} {:<8}", kind, view.container.status.as_str())),
    ];
    for channel in &view.evaluation.channels {
        let severity = channel.classification.severity;
        let value = channel
            .value
            .map(|v| format!("{:.1}{}", v, channel.quantity.unit()))
            .unwrap_or_else(|| "--".to_string());
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("{}:{}", channel.label, value),
            Style::default().fg(severity_color(severity)),
        ));
    }

    let style = if state.should_flash && flash_on {
        let bg = if state.is_critically_high {
            Color::Red
        } else {
            Color::Rgb(90, 60, 0)
        };
        Style::default().bg(bg).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    ListItem::new(Line::from(spans)).style(style)
}

/// Draw the container list.
fn draw_containers(f: &mut Frame, app: &App, ui: &UiState, flash_on: bool, area: Rect) {
    let border_color = if app.critical_count() > 0 && flash_on {
        Color::Red
    } else if app.flashing_count() > 0 {
        Color::Yellow
    } else {
        Color::White
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("Containers")
        .border_style(Style::default().fg(border_color));

    if app.views.is_empty() {
        f.render_widget(Paragraph::new("No containers in snapshot").block(block), area);
        return;
    }

    let items: Vec<ListItem> = app
        .views
        .iter()
        .enumerate()
        .map(|(i, view)| container_item(view, i == ui.selected, flash_on))
        .collect();
    f.render_widget(List::new(items).block(block), area);
}

/// Draw the threshold editor of the selected container.
fn draw_editor(f: &mut Frame, app: &App, ui: &UiState, area: Rect) {
    let Some(view) = app.views.get(ui.selected) else {
        let empty = Paragraph::new("Select a container").block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("Thresholds"),
        );
        f.render_widget(empty, area);
        return;
    };

    let title = format!(
        "Thresholds {} [{}{}]",
        view.container.name,
        view.source.as_str(),
        if view.edited { ", unsaved" } else { "" }
    );
    let target = ui.target(app);

    let mut lines = Vec::new();
    for (quantity, band) in view.thresholds.iter() {
        let selected_quantity = target.map(|(q, _)| q) == Some(quantity);
        lines.push(Line::from(Span::styled(
            format!("{} ({})", quantity, quantity.unit()),
            if selected_quantity {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            },
        )));

        for key in quantity.kind().keys() {
            let focused = selected_quantity && target.map(|(_, k)| k) == Some(key);
            let value = match (&ui.input, focused) {
                (Some(input), true) => format!("{input}_"),
                _ => band
                    .get(key)
                    .map(|v| format!("{v:.2}"))
                    .unwrap_or_else(|| "--".to_string()),
            };
            let style = if focused {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(format!("{:<13} {:>8}", key.as_str(), value), style),
            ]));
        }
        if !band.is_ordered() {
            lines.push(Line::from(Span::styled(
                "  out of order, press Enter to commit",
                Style::default().fg(Color::Yellow),
            )));
        }
    }
    if lines.is_empty() {
        lines.push(Line::from("No thresholds for this container type"));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Tab quantity  ←/→ level  Enter commit  [s]ave  [r]eset",
        Style::default().fg(Color::Gray),
    )));

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title(title),
    );
    f.render_widget(paragraph, area);
}

/// Draw the most recent notifications.
fn draw_notifications(f: &mut Frame, app: &App, area: Rect) {
    let rows = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .notifications
        .iter()
        .rev()
        .take(rows)
        .map(|n| {
            let (icon, color) = match n.level {
                NotificationLevel::Info => ("✓", Color::Green),
                NotificationLevel::Error => ("✗", Color::Red),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} {} ", icon, n.time), Style::default().fg(color)),
                Span::raw(n.message.clone()),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title("Notifications"),
    );
    f.render_widget(list, area);
}

/// Run in headless mode (no TUI, just logging to stdout).
///
/// # Arguments
///
/// * `app` - Application instance
/// * `running` - Atomic flag to signal shutdown
/// * `interval` - Time between snapshot polls
pub fn run_headless(mut app: App, running: Arc<AtomicBool>, interval: Duration) -> Result<()> {
    let csv_file = app.config.csv_file.clone();
    if app.consent == SoundConsent::Pending {
        // Nobody to ask
        app.consent = SoundConsent::Declined;
    }

    println!("coolwatch - Cooling Container Alarm Dashboard");
    println!("=============================================");
    println!("Snapshot: {}", app.config.snapshot);
    println!("Logging to: {}", csv_file);
    println!("Interval: {} seconds", interval.as_secs());
    println!("Press Ctrl+C to stop.\n");

    let mut reported = 0;
    while running.load(Ordering::Relaxed) {
        app.tick()?;

        for view in &app.views {
            let state = view.evaluation.state;
            let channels = view
                .evaluation
                .channels
                .iter()
                .map(|c| match c.value {
                    Some(v) => format!("{} {:.1}{} {}", c.label, v, c.quantity.unit(), c.classification.severity),
                    None => format!("{} -- {}", c.label, c.classification.severity),
                })
                .collect::<Vec<_>>()
                .join(", ");
            println!(
                "[{}] {:<12} {:<8} thresholds:{:<7} flash:{:<5} critical:{:<5} | {}",
                app.last_update.as_deref().unwrap_or("-"),
                view.container.name,
                view.container.status.as_str(),
                view.source.as_str(),
                state.should_flash,
                state.is_critically_high,
                channels,
            );
            if state.is_critically_high {
                warn!(container = %view.container.name, "critically high reading");
            }
        }

        for notification in app.notifications_after(reported) {
            println!("  -> {}", notification.message);
        }
        reported = app.notified_total();

        if app.should_beep() {
            beep();
        }

        std::thread::sleep(interval);
    }

    println!("\nStopped. Alarms logged to {}", csv_file);
    Ok(())
}
