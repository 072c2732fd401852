use chrono::{DateTime, Local};
use clap::{CommandFactory, Parser};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::{info, warn};
use notify_rust::{Notification, Timeout, Urgency};
use rand::prelude::IndexedRandom;
use ratatui::{prelude::*, widgets::*};
use std::{
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    process,
    sync::{Arc, Condvar, Mutex, MutexGuard},
    thread,
    time::{Duration, Instant},
};
use thiserror::Error;

// ============================================================================
// Type Aliases & Constants
// ============================================================================

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
const TICK_RATE: Duration = Duration::from_millis(250);
const APP_NAME: &str = "HydroBuddy";
const LOG_FILE: &str = "hydration_log.txt";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";
const NOTIFICATION_TIMEOUT_MS: u32 = 10_000;
const DEFAULT_INTERVAL_SECS: u64 = 15 * 60;
const MIN_INTERVAL_MINUTES: u64 = 1;
const MAX_INTERVAL_MINUTES: u64 = 120;
const LOG_VIEW_LINES: usize = 50;

const MESSAGES: &[&str] = &[
    "Stay hydrated! Drink some water! 💧",
    "Your body needs water! Drink up! 🌊",
    "Don't forget to hydrate, it's important! 💦",
    "Drink water, it's great for your skin and energy! ✨",
    "Time to hydrate! Your body will thank you! 😄",
];

// Sound played with each reminder: the bundled alert if present, otherwise
// whatever system sound is installed.
const SOUND_CANDIDATES: &[&str] = &[
    "MGS_Alert.mp3",
    "/usr/share/sounds/freedesktop/stereo/complete.oga",
    "/usr/share/sounds/sound-icons/guitar-11.wav",
];

const PLAYERS: &[(&str, &[&str])] = &[
    ("paplay", &[]),
    ("mpv", &["--no-video", "--really-quiet"]),
    ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
    ("aplay", &["-q"]),
];

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Clone, Debug)]
#[command(author, version, about = "🚰 HydroBuddy - A Hydration Reminder")]
struct Args {
    /// Mode to run in: gui (default), cli, or help
    mode: Option<String>,
    /// Minutes between reminders (1-120)
    #[arg(short, long)]
    interval: Option<u64>,
    /// Sound file played with each reminder
    #[arg(short, long)]
    sound: Option<PathBuf>,
    /// Disable the audio alert
    #[arg(long)]
    no_sound: bool,
    /// Reminder log file
    #[arg(short, long)]
    log_file: Option<PathBuf>,
}

#[derive(PartialEq, Clone, Debug)]
enum Mode {
    Gui,
    Cli,
    Help,
    Unknown(String),
}

fn parse_mode(arg: Option<&str>) -> Mode {
    match arg.map(str::to_ascii_lowercase).as_deref() {
        None | Some("gui") => Mode::Gui,
        Some("cli") => Mode::Cli,
        Some("help") => Mode::Help,
        Some(other) => Mode::Unknown(other.to_string()),
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Per-step failures of a reminder. All of these are caught at the action
/// boundary and reported; none of them stops the scheduling loop.
#[derive(Debug, Error)]
enum ReminderError {
    #[error("notification failed: {0}")]
    Notification(String),
    #[error("log write failed: {0}")]
    LogWrite(io::Error),
    #[error("audio playback failed: {0}")]
    Audio(String),
    #[error("reminders are already running")]
    AlreadyRunning,
}

// ============================================================================
// Reminder Action
// ============================================================================

fn pick_message() -> &'static str {
    MESSAGES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(MESSAGES[0])
}

/// The fixed sequence executed per reminder: pick a message, show a desktop
/// notification, append a log line, play the alert sound. Each step is
/// best-effort; failures are collected rather than propagated.
struct ReminderAction {
    log_path: PathBuf,
    sound_path: Option<PathBuf>,
}

impl ReminderAction {
    fn fire(&self, count: u64) -> Vec<ReminderError> {
        let message = pick_message();
        info!("reminder {count}: {message}");

        let mut failures = Vec::new();
        if let Err(e) = self.notify(count, message) {
            warn!("{e}");
            failures.push(e);
        }
        if let Err(e) = self.append_log() {
            warn!("{e}");
            failures.push(e);
        }
        if let Err(e) = self.play_sound() {
            warn!("{e}");
            failures.push(e);
        }
        failures
    }

    fn notify(&self, count: u64, message: &str) -> std::result::Result<(), ReminderError> {
        Notification::new()
            .summary(&format!("Hydration Reminder {count}"))
            .body(message)
            .appname(APP_NAME)
            .icon("dialog-information")
            .urgency(Urgency::Normal)
            .timeout(Timeout::Milliseconds(NOTIFICATION_TIMEOUT_MS))
            .show()
            .map(|_| ())
            .map_err(|e| ReminderError::Notification(e.to_string()))
    }

    fn append_log(&self) -> std::result::Result<(), ReminderError> {
        // Append mode so an overlapping manual reminder cannot corrupt the file.
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .map_err(ReminderError::LogWrite)?;
        writeln!(file, "Reminder sent at {}", Local::now().format(TIMESTAMP_FMT))
            .map_err(ReminderError::LogWrite)
    }

    /// Plays the configured sound to completion, blocking this action only.
    fn play_sound(&self) -> std::result::Result<(), ReminderError> {
        let Some(path) = &self.sound_path else {
            return Ok(());
        };
        if !path.exists() {
            return Err(ReminderError::Audio(format!(
                "sound file not found: {}",
                path.display()
            )));
        }

        for (player, extra) in PLAYERS {
            let status = process::Command::new(player)
                .args(*extra)
                .arg(path)
                .stdout(process::Stdio::null())
                .stderr(process::Stdio::null())
                .status();

            match status {
                Ok(s) if s.success() => return Ok(()),
                Ok(s) => return Err(ReminderError::Audio(format!("{player} exited with {s}"))),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(ReminderError::Audio(format!("{player}: {e}"))),
            }
        }

        Err(ReminderError::Audio(
            "no audio player available (tried paplay, mpv, ffplay, aplay)".into(),
        ))
    }
}

fn default_sound() -> Option<PathBuf> {
    SOUND_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn read_log_tail(path: &Path, max_lines: usize) -> io::Result<Vec<String>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    let skip = lines.len().saturating_sub(max_lines);
    Ok(lines[skip..].to_vec())
}

fn clear_log(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

// ============================================================================
// Scheduler / Loop Controller
// ============================================================================

#[derive(Clone)]
struct ReminderState {
    running: bool,
    // Worker generation, bumped on every start(). A worker whose generation
    // no longer matches has been superseded by a restart and must exit even
    // if `running` is set again.
    epoch: u64,
    interval_secs: u64,
    count: u64,
    next_due: Option<DateTime<Local>>,
    last_errors: Vec<String>,
}

/// Drives the repeating wait-then-fire cycle on a background thread. All
/// foreground controls go through the shared state handle; the in-flight wait
/// is a condvar timeout, so `stop()` interrupts it immediately instead of
/// being polled for.
#[derive(Clone)]
struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    state: Mutex<ReminderState>,
    wake: Condvar,
    action: ReminderAction,
}

impl Controller {
    fn new(action: ReminderAction) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(ReminderState {
                    running: false,
                    epoch: 0,
                    interval_secs: DEFAULT_INTERVAL_SECS,
                    count: 0,
                    next_due: None,
                    last_errors: Vec::new(),
                }),
                wake: Condvar::new(),
                action,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ReminderState> {
        self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn snapshot(&self) -> ReminderState {
        self.lock().clone()
    }

    fn log_path(&self) -> &Path {
        &self.inner.action.log_path
    }

    fn start(&self) -> std::result::Result<(), ReminderError> {
        let epoch = {
            let mut st = self.lock();
            if st.running {
                return Err(ReminderError::AlreadyRunning);
            }
            st.running = true;
            st.epoch += 1;
            st.epoch
        };
        let ctrl = self.clone();
        thread::spawn(move || ctrl.run_loop(epoch));
        Ok(())
    }

    /// Idempotent: stopping a stopped controller is a no-op.
    fn stop(&self) {
        let mut st = self.lock();
        st.running = false;
        st.next_due = None;
        self.inner.wake.notify_all();
    }

    /// Clamps to 1-120 minutes and returns the stored value in seconds.
    /// Takes effect on the next wait period, not an in-progress one.
    fn set_interval_minutes(&self, minutes: u64) -> u64 {
        let clamped = minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES);
        if clamped != minutes {
            warn!("interval {minutes}m out of range, clamped to {clamped}m");
        }
        let secs = clamped * 60;
        self.lock().interval_secs = secs;
        secs
    }

    /// Manual out-of-band reminder. While stopped it leaves all shared state
    /// untouched (failures still reach the console log); while running this
    /// counts as an extra reminder and may overlap an in-flight scheduled one.
    fn fire_now(&self) -> Vec<ReminderError> {
        let (count, running) = {
            let mut st = self.lock();
            if st.running {
                st.count += 1;
            }
            (st.count, st.running)
        };
        let failures = self.inner.action.fire(count);
        if running {
            self.lock().last_errors = failures.iter().map(|e| e.to_string()).collect();
        }
        failures
    }

    fn run_loop(&self, epoch: u64) {
        info!("reminder loop started");
        loop {
            let mut st = self.lock();
            if !st.running || st.epoch != epoch {
                break;
            }

            // Interval is read once per cycle; changes apply to the next wait.
            let deadline = Instant::now() + Duration::from_secs(st.interval_secs);
            st.next_due = Some(Local::now() + chrono::Duration::seconds(st.interval_secs as i64));
            while st.running && st.epoch == epoch {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                let (guard, _) = self
                    .inner
                    .wake
                    .wait_timeout(st, deadline - now)
                    .unwrap_or_else(|p| p.into_inner());
                st = guard;
            }
            if !st.running || st.epoch != epoch {
                break;
            }

            st.count += 1;
            let count = st.count;
            drop(st);

            let failures = self.inner.action.fire(count);
            self.lock().last_errors = failures.iter().map(|e| e.to_string()).collect();
        }
        info!("reminder loop stopped");
    }
}

// ============================================================================
// CLI Mode
// ============================================================================

fn run_cli(controller: &Controller) -> Result<()> {
    println!("🚰 Starting command-line hydration reminders...");
    println!("Press Ctrl+C to stop.");
    controller.start()?;
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

// ============================================================================
// UI State & Event Handlers
// ============================================================================

#[derive(PartialEq, Clone, Copy)]
enum View {
    Main,
    Log,
    Help,
}

struct Ui {
    controller: Controller,
    view: View,
    minimized: bool,
    confirm_clear: bool,
    log_lines: Vec<String>,
    status_line: Option<String>,
}

impl Ui {
    fn new(controller: Controller) -> Self {
        Self {
            controller,
            view: View::Main,
            minimized: false,
            confirm_clear: false,
            log_lines: Vec::new(),
            status_line: None,
        }
    }

    fn refresh_log(&mut self) {
        match read_log_tail(self.controller.log_path(), LOG_VIEW_LINES) {
            Ok(lines) => self.log_lines = lines,
            Err(e) => {
                self.log_lines.clear();
                self.status_line = Some(format!("Error reading log file: {e}"));
            }
        }
    }
}

fn handle_input(key: event::KeyEvent, ui: &mut Ui) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if ui.confirm_clear {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                match clear_log(ui.controller.log_path()) {
                    Ok(()) => ui.status_line = Some("Log cleared".into()),
                    Err(e) => ui.status_line = Some(format!("Could not clear log: {e}")),
                }
                ui.refresh_log();
                ui.confirm_clear = false;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => ui.confirm_clear = false,
            _ => {}
        }
        return false;
    }

    if matches!(key.code, KeyCode::Char('m') | KeyCode::Char('M')) {
        ui.minimized = !ui.minimized;
        return false;
    }

    if ui.minimized {
        return false;
    }

    match ui.view {
        View::Log => handle_log_view(key, ui),
        View::Help => handle_help_view(key, ui),
        View::Main => handle_main_view(key, ui),
    }
}

fn handle_main_view(key: event::KeyEvent, ui: &mut Ui) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char(' ') | KeyCode::Char('s') => toggle_running(ui),
        KeyCode::Enter | KeyCode::Char('n') => {
            // Off-thread so a slow notification or sound never blocks the UI.
            let ctrl = ui.controller.clone();
            thread::spawn(move || {
                ctrl.fire_now();
            });
            ui.status_line = Some("Manual reminder sent".into());
        }
        KeyCode::Up | KeyCode::Char('+') | KeyCode::Char('k') => adjust_interval(ui, 1),
        KeyCode::Down | KeyCode::Char('-') | KeyCode::Char('j') => adjust_interval(ui, -1),
        KeyCode::Char('l') => {
            ui.view = View::Log;
            ui.refresh_log();
        }
        KeyCode::Char('h') | KeyCode::Char('?') => ui.view = View::Help,
        _ => {}
    }
    false
}

fn handle_log_view(key: event::KeyEvent, ui: &mut Ui) -> bool {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Char('l') => ui.view = View::Main,
        KeyCode::Char('r') => {
            ui.refresh_log();
            ui.status_line = Some("Log refreshed".into());
        }
        KeyCode::Char('c') => ui.confirm_clear = true,
        _ => {}
    }
    false
}

fn handle_help_view(key: event::KeyEvent, ui: &mut Ui) -> bool {
    if matches!(
        key.code,
        KeyCode::Char('q') | KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('?')
    ) {
        ui.view = View::Main;
    }
    false
}

fn toggle_running(ui: &mut Ui) {
    if ui.controller.snapshot().running {
        ui.controller.stop();
        ui.status_line = Some("Reminders stopped".into());
    } else {
        match ui.controller.start() {
            Ok(()) => ui.status_line = Some("Reminders started".into()),
            Err(e) => ui.status_line = Some(e.to_string()),
        }
    }
}

fn adjust_interval(ui: &mut Ui, delta: i64) {
    let minutes = (ui.controller.snapshot().interval_secs / 60) as i64 + delta;
    let stored = ui.controller.set_interval_minutes(minutes.max(1) as u64);
    ui.status_line = Some(format!("Interval set to {} minutes", stored / 60));
}

// ============================================================================
// UI Rendering
// ============================================================================

fn render_ui(f: &mut Frame, ui: &Ui) {
    if ui.minimized {
        render_minimized(f, ui);
    } else {
        match ui.view {
            View::Main => render_main(f, ui),
            View::Log => render_log(f, ui),
            View::Help => render_help(f),
        }
    }
}

fn render_minimized(f: &mut Frame, ui: &Ui) {
    let area = centered_rect(40, 30, f.size());
    let snap = ui.controller.snapshot();
    let (status, color) = running_status(&snap);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            status,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(format!("Reminders sent: {}", snap.count)),
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled(
            "Press M to restore",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let widget = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(titled_block(" 🚰 HYDROBUDDY (Minimized) "));
    f.render_widget(widget, area);
}

fn render_main(f: &mut Frame, ui: &Ui) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(9),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(f.size());

    let header = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            " 🚰 HYDROBUDDY ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
    f.render_widget(header, chunks[0]);

    let snap = ui.controller.snapshot();
    let (status, color) = running_status(&snap);
    let next = snap
        .next_due
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "Not scheduled".into());

    let mut lines = vec![
        Line::from(""),
        field_line("Reminder Status", status.to_string(), color),
        field_line("Reminders Sent", snap.count.to_string(), Color::White),
        field_line(
            "Interval",
            format!("{} minutes", snap.interval_secs / 60),
            Color::White,
        ),
        field_line("Next Reminder", next, Color::White),
    ];

    for err in &snap.last_errors {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  ⚠ {err}"),
            Style::default().fg(Color::Red),
        )));
    }

    if let Some(status_line) = &ui.status_line {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {status_line}"),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    f.render_widget(Paragraph::new(lines), chunks[1]);

    f.render_widget(
        Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .title(" Next Reminder "),
            )
            .gauge_style(Style::default().fg(color).bg(Color::Black))
            .percent(wait_progress(&snap)),
        chunks[2],
    );

    let controls = vec![
        Line::from(vec![
            span_key("Space"),
            Span::raw(" Start/Stop  •  "),
            span_key("Enter"),
            Span::raw(" Send Now  •  "),
            span_key("↑↓"),
            Span::raw(" Interval  •  "),
            span_key("L"),
            Span::raw(" Log"),
        ]),
        Line::from(vec![
            span_key("H"),
            Span::raw(" Help  •  "),
            span_key("M"),
            Span::raw(" Minimize  •  "),
            span_key("Q"),
            Span::raw(" Quit"),
        ]),
    ];
    f.render_widget(
        Paragraph::new(controls)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}

fn render_log(f: &mut Frame, ui: &Ui) {
    let area = centered_rect(80, 85, f.size());

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "📜 REMINDER HISTORY",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "  r: Refresh  •  c: Clear  •  l/Esc: Close",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
        Line::from(""),
    ];

    if ui.confirm_clear {
        lines.push(Line::from(Span::styled(
            "  ⚠️  Clear the reminder history? (y/n)",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(""));
    }

    if ui.log_lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "  No log file found. Start sending reminders to create one.",
            Style::default().fg(Color::Gray),
        )));
    } else {
        for entry in &ui.log_lines {
            lines.push(Line::from(format!("  {entry}")));
        }
    }

    f.render_widget(
        Paragraph::new(lines).block(titled_block(" Reminder History ")),
        area,
    );
}

fn render_help(f: &mut Frame) {
    let area = centered_rect(70, 85, f.size());

    let help_text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "⌨️  KEYBOARD SHORTCUTS",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  Reminders:"),
        help_line("Space / S", "Start or stop the reminder loop"),
        help_line("Enter / N", "Send a reminder now"),
        help_line("↑↓ / +-", "Adjust interval by one minute"),
        Line::from(""),
        Line::from("  Navigation:"),
        help_line("L", "Open reminder history"),
        help_line("M", "Minimize to compact view"),
        help_line("H / ?", "Toggle help"),
        Line::from(""),
        Line::from("  History View:"),
        help_line("R", "Refresh the log"),
        help_line("C", "Clear the log (asks to confirm)"),
        Line::from(""),
        Line::from("  General:"),
        help_line("Q / Esc", "Exit / Go back"),
        help_line("Ctrl+C", "Force quit"),
        Line::from(""),
        Line::from(Span::styled(
            "💧 Stay hydrated!",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    f.render_widget(
        Paragraph::new(help_text).block(titled_block(" Help ")),
        area,
    );
}

fn running_status(snap: &ReminderState) -> (&'static str, Color) {
    if snap.running {
        ("Running", Color::Green)
    } else {
        ("Stopped", Color::Red)
    }
}

fn wait_progress(snap: &ReminderState) -> u16 {
    let Some(next) = snap.next_due else {
        return 0;
    };
    let total = snap.interval_secs as i64;
    if total == 0 {
        return 0;
    }
    let remaining = (next - Local::now()).num_seconds().clamp(0, total);
    (((total - remaining) * 100) / total) as u16
}

fn field_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("  {label}: ")),
        Span::styled(value, Style::default().fg(color).add_modifier(Modifier::BOLD)),
    ])
}

fn span_key(text: &str) -> Span<'_> {
    Span::styled(
        text,
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )
}

fn help_line<'a>(key: &'a str, desc: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::raw("    "),
        Span::styled(key, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {desc}")),
    ])
}

fn titled_block(title: &str) -> Block<'_> {
    Block::default()
        .title(title)
        .title_alignment(Alignment::Center)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan))
}

fn centered_rect(w: u16, h: u16, r: Rect) -> Rect {
    let v = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h) / 2),
            Constraint::Percentage(h),
            Constraint::Percentage((100 - h) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w) / 2),
            Constraint::Percentage(w),
            Constraint::Percentage((100 - w) / 2),
        ])
        .split(v[1])[1]
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    // Unrecognized flags behave like unknown modes: report, show usage, exit
    // cleanly. Help and version land here too and exit 0.
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print()?;
            return Ok(());
        }
    };

    match parse_mode(args.mode.as_deref()) {
        Mode::Help => {
            Args::command().print_help()?;
            Ok(())
        }
        Mode::Unknown(other) => {
            println!("Unknown mode: {other}\n");
            Args::command().print_help()?;
            Ok(())
        }
        mode => {
            let sound_path = if args.no_sound {
                None
            } else {
                args.sound.clone().or_else(default_sound)
            };
            if sound_path.is_none() && !args.no_sound {
                warn!("no sound file found, reminders will be silent");
            }

            let action = ReminderAction {
                log_path: args.log_file.clone().unwrap_or_else(|| PathBuf::from(LOG_FILE)),
                sound_path,
            };
            let controller = Controller::new(action);
            if let Some(minutes) = args.interval {
                controller.set_interval_minutes(minutes);
            }

            if mode == Mode::Cli {
                return run_cli(&controller);
            }

            // A GUI startup failure (no usable terminal) falls back to CLI
            // mode instead of exiting.
            match init_terminal() {
                Ok(mut terminal) => {
                    let res = run_tui(&mut terminal, &controller);
                    restore_terminal(&mut terminal)?;
                    res
                }
                Err(e) => {
                    warn!("terminal UI unavailable ({e}), falling back to CLI mode");
                    run_cli(&controller)
                }
            }
        }
    }
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_tui(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &Controller,
) -> Result<()> {
    let mut ui = Ui::new(controller.clone());

    loop {
        terminal.draw(|f| render_ui(f, &ui))?;

        if event::poll(TICK_RATE)? {
            if let Event::Key(key) = event::read()? {
                if handle_input(key, &mut ui) {
                    ui.controller.stop();
                    return Ok(());
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_action(dir: &TempDir) -> ReminderAction {
        ReminderAction {
            log_path: dir.path().join("hydration_log.txt"),
            sound_path: None,
        }
    }

    fn test_controller(dir: &TempDir) -> Controller {
        Controller::new(test_action(dir))
    }

    // Points at a missing sound file so every fire reports an audio failure.
    fn failing_controller(dir: &TempDir) -> Controller {
        Controller::new(ReminderAction {
            log_path: dir.path().join("hydration_log.txt"),
            sound_path: Some(dir.path().join("missing.mp3")),
        })
    }

    fn log_line_count(path: &Path) -> usize {
        read_log_tail(path, usize::MAX).unwrap().len()
    }

    #[test]
    fn default_interval_is_fifteen_minutes() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        assert_eq!(ctrl.snapshot().interval_secs, 900);
    }

    #[test]
    fn interval_is_stored_in_seconds() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        assert_eq!(ctrl.set_interval_minutes(1), 60);
        assert_eq!(ctrl.set_interval_minutes(15), 900);
        assert_eq!(ctrl.set_interval_minutes(120), 7200);
        assert_eq!(ctrl.snapshot().interval_secs, 7200);
    }

    #[test]
    fn out_of_range_interval_is_clamped() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        assert_eq!(ctrl.set_interval_minutes(0), 60);
        assert_eq!(ctrl.snapshot().interval_secs, 60);
        assert_eq!(ctrl.set_interval_minutes(121), 7200);
        assert_eq!(ctrl.snapshot().interval_secs, 7200);
        assert_eq!(ctrl.set_interval_minutes(u64::MAX), 7200);
    }

    #[test]
    fn start_sets_running_and_double_start_fails() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        assert!(!ctrl.snapshot().running);

        ctrl.start().unwrap();
        assert!(ctrl.snapshot().running);
        assert!(matches!(ctrl.start(), Err(ReminderError::AlreadyRunning)));

        ctrl.stop();
        assert!(!ctrl.snapshot().running);
    }

    #[test]
    fn stop_when_stopped_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        ctrl.stop();
        ctrl.stop();
        assert!(!ctrl.snapshot().running);
    }

    #[test]
    fn stop_during_wait_prevents_any_fire() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        ctrl.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        ctrl.stop();
        assert!(!ctrl.snapshot().running);

        // The worker observed the stop mid-wait; no tick ever fired.
        thread::sleep(Duration::from_millis(300));
        let snap = ctrl.snapshot();
        assert_eq!(snap.count, 0);
        assert!(snap.next_due.is_none());
        assert_eq!(log_line_count(ctrl.log_path()), 0);
    }

    #[test]
    fn controller_can_be_restarted_after_stop() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        ctrl.start().unwrap();
        ctrl.stop();
        thread::sleep(Duration::from_millis(100));
        ctrl.start().unwrap();
        assert!(ctrl.snapshot().running);
        ctrl.stop();
    }

    #[test]
    fn restart_never_leaves_a_stale_worker() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);

        // Tight stop/start toggles: each stop may race the next start, which
        // previously resurrected the superseded worker instead of retiring it.
        for _ in 0..100 {
            ctrl.start().unwrap();
            ctrl.stop();
        }

        ctrl.lock().interval_secs = 1;
        ctrl.start().unwrap();
        thread::sleep(Duration::from_millis(2600));
        let count = ctrl.snapshot().count;
        ctrl.stop();

        // A single worker produces at most ~2 ticks in 2.6s at a 1s interval;
        // any surviving duplicate would multiply that.
        assert!((1..=3).contains(&count), "tick rate not that of one worker: {count}");
    }

    #[test]
    fn tick_fires_only_after_one_full_interval() {
        let dir = TempDir::new().unwrap();
        let ctrl = test_controller(&dir);
        ctrl.lock().interval_secs = 1;
        ctrl.start().unwrap();

        thread::sleep(Duration::from_millis(400));
        assert_eq!(ctrl.snapshot().count, 0, "fired before the interval elapsed");

        thread::sleep(Duration::from_millis(1100));
        let snap = ctrl.snapshot();
        ctrl.stop();
        assert_eq!(snap.count, 1);
        assert_eq!(log_line_count(ctrl.log_path()), 1);
    }

    #[test]
    fn fire_appends_exactly_one_line_despite_failures() {
        let dir = TempDir::new().unwrap();
        let action = ReminderAction {
            log_path: dir.path().join("hydration_log.txt"),
            sound_path: Some(dir.path().join("missing.mp3")),
        };

        let failures = action.fire(1);
        assert!(
            failures.iter().any(|e| matches!(e, ReminderError::Audio(_))),
            "missing sound file should be reported"
        );
        assert_eq!(log_line_count(&action.log_path), 1);

        action.fire(2);
        assert_eq!(log_line_count(&action.log_path), 2);
    }

    #[test]
    fn log_lines_carry_a_timestamp() {
        let dir = TempDir::new().unwrap();
        let action = test_action(&dir);
        action.append_log().unwrap();

        let lines = read_log_tail(&action.log_path, 10).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Reminder sent at "));
    }

    #[test]
    fn message_is_always_from_the_fixed_set() {
        for _ in 0..100 {
            assert!(MESSAGES.contains(&pick_message()));
        }
    }

    #[test]
    fn fire_now_while_stopped_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let ctrl = failing_controller(&dir);
        let failures = ctrl.fire_now();
        assert!(!failures.is_empty());

        let snap = ctrl.snapshot();
        assert_eq!(snap.count, 0);
        assert!(snap.last_errors.is_empty(), "stopped fire_now wrote shared state");
        assert_eq!(log_line_count(ctrl.log_path()), 1);
    }

    #[test]
    fn fire_now_while_running_counts_as_a_reminder() {
        let dir = TempDir::new().unwrap();
        let ctrl = failing_controller(&dir);
        ctrl.start().unwrap();
        ctrl.fire_now();
        let snap = ctrl.snapshot();
        ctrl.stop();
        assert_eq!(snap.count, 1);
        assert!(!snap.last_errors.is_empty(), "running fire_now should surface failures");
        assert_eq!(log_line_count(ctrl.log_path()), 1);
    }

    #[test]
    fn clear_log_removes_an_existing_file() {
        let dir = TempDir::new().unwrap();
        let action = test_action(&dir);
        for _ in 0..10 {
            action.append_log().unwrap();
        }
        assert_eq!(log_line_count(&action.log_path), 10);

        clear_log(&action.log_path).unwrap();
        assert_eq!(log_line_count(&action.log_path), 0);
    }

    #[test]
    fn clear_log_on_a_missing_file_succeeds() {
        let dir = TempDir::new().unwrap();
        clear_log(&dir.path().join("nope.txt")).unwrap();
    }

    #[test]
    fn read_log_tail_returns_the_last_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.txt");
        let body: String = (0..60).map(|i| format!("line {i}\n")).collect();
        fs::write(&path, body).unwrap();

        let tail = read_log_tail(&path, 50).unwrap();
        assert_eq!(tail.len(), 50);
        assert_eq!(tail[0], "line 10");
        assert_eq!(tail[49], "line 59");
    }

    #[test]
    fn read_log_tail_of_a_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_log_tail(&dir.path().join("nope.txt"), 50).unwrap().is_empty());
    }

    #[test]
    fn mode_parsing() {
        assert_eq!(parse_mode(None), Mode::Gui);
        assert_eq!(parse_mode(Some("gui")), Mode::Gui);
        assert_eq!(parse_mode(Some("GUI")), Mode::Gui);
        assert_eq!(parse_mode(Some("cli")), Mode::Cli);
        assert_eq!(parse_mode(Some("Cli")), Mode::Cli);
        assert_eq!(parse_mode(Some("help")), Mode::Help);
        assert_eq!(parse_mode(Some("tui")), Mode::Unknown("tui".to_string()));
    }

    #[test]
    fn unknown_flags_are_not_fatal_parse_errors() {
        // main() turns every parse error into printed usage plus a clean exit.
        let err = Args::try_parse_from(["hydrobuddy", "--bogus"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);

        let err = Args::try_parse_from(["hydrobuddy", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);

        let args = Args::try_parse_from(["hydrobuddy", "cli", "--interval", "30"]).unwrap();
        assert_eq!(parse_mode(args.mode.as_deref()), Mode::Cli);
        assert_eq!(args.interval, Some(30));
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ReminderError::AlreadyRunning.to_string(),
            "reminders are already running"
        );
        assert_eq!(
            ReminderError::Audio("boom".into()).to_string(),
            "audio playback failed: boom"
        );
        assert!(
            ReminderError::Notification("no bus".into())
                .to_string()
                .contains("notification failed")
        );
    }
}
