//! RiskView Neonatal Monitor: interactive Ratatui console
//!
//! Layout:
//!   ┌─── header ──────────────────────────────────────────────────────────┐
//!   │  [1] Dashboard  [2] Predict  [3] History            theme: dark     │
//!   ├─── body (per screen) ───────────────────────────────────────────────┤
//!   │  Dashboard: statistics | recent predictions                         │
//!   │  Predict:   vital signs form | assessment                           │
//!   │  History:   risk trend chart over the current page's records        │
//!   ├─────────────────────────────────────────────────────────────────────┤
//!   │  Detail: request status, inline errors, notices                     │
//!   ├─────────────────────────────────────────────────────────────────────┤
//!   │  footer (key bindings)                                              │
//!   └─────────────────────────────────────────────────────────────────────┘
//!
//! Talks to the in-memory service unless `RISKVIEW_API_URL` is set.
//! `RISKVIEW_CONFIG` names an optional TOML configuration file.

use std::{
    io,
    path::PathBuf,
    sync::{
        mpsc::{self, Receiver, Sender},
        Arc,
    },
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, Wrap},
    Frame, Terminal,
};
use tokio::runtime::{Handle, Runtime};

use riskview_client::HttpRiskApi;
use riskview_config::AppConfig;
use riskview_contracts::{
    error::RiskViewResult,
    preference::{PreferenceOrigin, ThemeMode},
    query::QueryStatus,
    risk::RiskLevel,
};
use riskview_core::{
    classifier::{format_percent, reference_lines},
    controller::Dispatch,
    prediction::submit,
    traits::{PreferenceStorage, RiskApi},
    HistoryView, PredictionForm, PredictionPanel, QueryController, RefreshOutcome, ViewAggregator,
    ViewDisplay, Vital,
};
use riskview_mock::MockRiskApi;
use riskview_prefs::{terminal_prefers_dark, FilePreferenceStorage, InMemoryPreferenceStorage, PreferenceStore};

const API_URL_ENV: &str = "RISKVIEW_API_URL";
const CONFIG_ENV: &str = "RISKVIEW_CONFIG";

/// Patient shown when the console opens.
const DEFAULT_PATIENT: &str = "P1001";

const FINE_STEP: f64 = 1.0;
const COARSE_STEP: f64 = 5.0;

// ── Screens ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Dashboard,
    Predict,
    History,
}

impl Screen {
    const ALL: [Screen; 3] = [Screen::Dashboard, Screen::Predict, Screen::History];

    fn name(self) -> &'static str {
        match self {
            Screen::Dashboard => "Dashboard",
            Screen::Predict => "Predict",
            Screen::History => "History",
        }
    }

    fn next(self) -> Self {
        match self {
            Screen::Dashboard => Screen::Predict,
            Screen::Predict => Screen::History,
            Screen::History => Screen::Dashboard,
        }
    }
}

/// Form rows on the Predict screen: the patient id, then each vital.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    PatientId,
    Vital(Vital),
}

impl Field {
    fn all() -> impl Iterator<Item = Field> {
        std::iter::once(Field::PatientId).chain(Vital::ALL.into_iter().map(Field::Vital))
    }
}

// ── Palette ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Palette {
    text: Color,
    muted: Color,
    accent: Color,
    background: Color,
    border: Color,
}

impl Palette {
    fn for_mode(mode: ThemeMode) -> Self {
        match mode {
            ThemeMode::Dark => Palette {
                text: Color::White,
                muted: Color::Gray,
                accent: Color::Cyan,
                background: Color::Black,
                border: Color::DarkGray,
            },
            ThemeMode::Light => Palette {
                text: Color::Black,
                muted: Color::DarkGray,
                accent: Color::Blue,
                background: Color::White,
                border: Color::Gray,
            },
        }
    }

    fn block<'a>(&self, title: impl Into<Line<'a>>) -> Block<'a> {
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(self.border))
            .title(title)
    }
}

fn level_color(level: RiskLevel) -> Color {
    match level {
        RiskLevel::Low => Color::Green,
        RiskLevel::Moderate => Color::Yellow,
        RiskLevel::High => Color::LightRed,
        RiskLevel::Critical => Color::Red,
    }
}

fn level_style(level: RiskLevel) -> Style {
    let style = Style::default().fg(level_color(level));
    if level.is_elevated() {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

// ── Background results ────────────────────────────────────────────────────────

/// Work finished on the runtime, handed back to the draw loop.
enum Outcome {
    Refreshed(RiskViewResult<RefreshOutcome>),
    Predicted(RiskViewResult<PredictionPanel>),
}

#[derive(Debug, Clone)]
struct Notice {
    text: String,
    is_error: bool,
}

impl Notice {
    fn info(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: true }
    }
}

// ── App state ─────────────────────────────────────────────────────────────────

struct App<A: RiskApi> {
    runtime: Handle,
    api: Arc<A>,
    /// Where requests go, for the header.
    backend: String,
    config: AppConfig,

    screen: Screen,
    prefs: PreferenceStore,
    notice: Option<Notice>,

    aggregator: ViewAggregator<A>,
    history: HistoryView<A>,

    form: PredictionForm,
    field: Field,
    panel: Option<PredictionPanel>,
    submitting: bool,
    /// A submission landed since the history page was fetched.
    history_stale: bool,

    outcomes_tx: Sender<Outcome>,
    outcomes_rx: Receiver<Outcome>,
}

impl<A: RiskApi> App<A> {
    fn new(runtime: Handle, api: Arc<A>, backend: String, config: AppConfig, prefs: PreferenceStore) -> Self {
        let settings = config.query_settings();
        let aggregator = ViewAggregator::new(
            Arc::clone(&api),
            QueryController::new(Arc::clone(&api), settings.clone()),
        );
        let history = HistoryView::new(QueryController::new(Arc::clone(&api), settings), DEFAULT_PATIENT);
        let mut form = PredictionForm::new();
        form.set_patient_id(DEFAULT_PATIENT);
        let (outcomes_tx, outcomes_rx) = mpsc::channel();

        Self {
            runtime,
            api,
            backend,
            config,
            screen: Screen::Dashboard,
            prefs,
            notice: None,
            aggregator,
            history,
            form,
            field: Field::Vital(Vital::HeartRate),
            panel: None,
            submitting: false,
            history_stale: false,
            outcomes_tx,
            outcomes_rx,
        }
    }

    fn palette(&self) -> Palette {
        Palette::for_mode(self.prefs.mode())
    }

    /// Typing goes to the patient id while its row is focused.
    fn editing(&self) -> bool {
        self.screen == Screen::Predict && self.field == Field::PatientId
    }

    fn select(&mut self, screen: Screen) {
        self.screen = screen;
        self.notice = None;
        if screen == Screen::History {
            self.open_history();
        }
    }

    // ── Dashboard ──

    fn refresh_dashboard(&self) {
        let aggregator = self.aggregator.clone();
        let tx = self.outcomes_tx.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(Outcome::Refreshed(aggregator.refresh().await));
        });
    }

    // ── Predict ──

    fn move_field(&mut self, forward: bool) {
        let fields: Vec<Field> = Field::all().collect();
        let index = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        let next = if forward {
            (index + 1) % fields.len()
        } else {
            (index + fields.len() - 1) % fields.len()
        };
        self.field = fields[next];
    }

    fn adjust(&mut self, delta: f64) {
        if let Field::Vital(vital) = self.field {
            self.form.adjust(vital, delta);
        }
    }

    fn submit_prediction(&mut self) {
        if self.submitting {
            return;
        }
        self.submitting = true;
        self.notice = None;
        let api = Arc::clone(&self.api);
        let form = self.form.clone();
        let tx = self.outcomes_tx.clone();
        self.runtime.spawn(async move {
            let _ = tx.send(Outcome::Predicted(submit(api.as_ref(), &form).await));
        });
    }

    // ── History ──

    /// Follow the form's patient id, then request the current page.
    fn open_history(&mut self) {
        let patient_id = self.form.patient_id().trim();
        if !patient_id.is_empty() && patient_id != self.history.patient_id() {
            let controller = QueryController::new(Arc::clone(&self.api), self.config.query_settings());
            self.history = HistoryView::new(controller, patient_id);
            self.history_stale = false;
        }
        let loaded = self.history.controller().state().key.is_some();
        let result = if self.history_stale && loaded {
            self.history.retry()
        } else {
            self.history.load()
        };
        self.history_stale = false;
        self.report(result);
    }

    fn report(&mut self, result: RiskViewResult<Dispatch>) {
        match result {
            Ok(_) => self.notice = None,
            Err(e) => self.notice = Some(Notice::error(e.to_string())),
        }
    }

    // ── Events ──

    fn drain_outcomes(&mut self) {
        while let Ok(outcome) = self.outcomes_rx.try_recv() {
            match outcome {
                Outcome::Refreshed(Ok(RefreshOutcome::Refreshed(aggregate))) => {
                    self.notice = aggregate.error.map(Notice::error);
                }
                Outcome::Refreshed(Ok(RefreshOutcome::InFlight)) => {
                    self.notice = Some(Notice::info("Refresh already in progress"));
                }
                Outcome::Refreshed(Err(e)) => self.notice = Some(Notice::error(e.to_string())),
                Outcome::Predicted(result) => {
                    self.submitting = false;
                    match result {
                        Ok(panel) => {
                            self.panel = Some(panel);
                            self.history_stale = true;
                            self.notice = None;
                        }
                        Err(e) => self.notice = Some(Notice::error(e.to_string())),
                    }
                }
            }
        }
    }

    /// Returns `false` when the console should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return false;
        }

        match key.code {
            KeyCode::Esc => return false,
            KeyCode::Tab => {
                self.select(self.screen.next());
                return true;
            }
            _ => {}
        }

        if self.editing() {
            match key.code {
                KeyCode::Char(c) if !c.is_whitespace() => {
                    let mut id = self.form.patient_id().to_string();
                    id.push(c);
                    self.form.set_patient_id(id);
                }
                KeyCode::Backspace => {
                    let mut id = self.form.patient_id().to_string();
                    id.pop();
                    self.form.set_patient_id(id);
                }
                KeyCode::Up => self.move_field(false),
                KeyCode::Down => self.move_field(true),
                KeyCode::Enter => self.submit_prediction(),
                _ => {}
            }
            return true;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => return false,
            KeyCode::Char('1') => self.select(Screen::Dashboard),
            KeyCode::Char('2') => self.select(Screen::Predict),
            KeyCode::Char('3') => self.select(Screen::History),
            KeyCode::Char('t') | KeyCode::Char('T') => {
                self.prefs.toggle();
            }
            _ => match self.screen {
                Screen::Dashboard => {
                    if let KeyCode::Char('r') | KeyCode::Char('R') = key.code {
                        self.refresh_dashboard();
                    }
                }
                Screen::Predict => {
                    let step = if key.modifiers.contains(KeyModifiers::SHIFT) {
                        COARSE_STEP
                    } else {
                        FINE_STEP
                    };
                    match key.code {
                        KeyCode::Up => self.move_field(false),
                        KeyCode::Down => self.move_field(true),
                        KeyCode::Left => self.adjust(-step),
                        KeyCode::Right => self.adjust(step),
                        KeyCode::Enter => self.submit_prediction(),
                        KeyCode::Char('h') | KeyCode::Char('H') => self.select(Screen::History),
                        _ => {}
                    }
                }
                Screen::History => {
                    let result = match key.code {
                        KeyCode::Left => self.history.previous_page(),
                        KeyCode::Right => self.history.next_page(),
                        KeyCode::Home => self.history.jump_to_page(1),
                        KeyCode::End => self.history.jump_to_page(u32::MAX),
                        KeyCode::Char('f') | KeyCode::Char('F') => {
                            let filter = self.history.time_filter().next();
                            self.history.set_time_filter(filter)
                        }
                        KeyCode::Char('r') | KeyCode::Char('R') => self.history.retry(),
                        _ => return true,
                    };
                    self.report(result);
                }
            },
        }
        true
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

fn ui<A: RiskApi>(f: &mut Frame, app: &App<A>) {
    let full = f.area();
    let palette = app.palette();

    f.render_widget(
        Block::default().style(Style::default().bg(palette.background).fg(palette.text)),
        full,
    );

    let outer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(10),   // screen body
            Constraint::Length(6), // detail
            Constraint::Length(3), // footer
        ])
        .split(full);

    render_header(f, outer_chunks[0], app);
    match app.screen {
        Screen::Dashboard => render_dashboard(f, outer_chunks[1], app),
        Screen::Predict => render_predict(f, outer_chunks[1], app),
        Screen::History => render_history(f, outer_chunks[1], app),
    }
    render_detail(f, outer_chunks[2], app);
    render_footer(f, outer_chunks[3], app);
}

fn render_header<A: RiskApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    let palette = app.palette();
    let title_style = Style::default().fg(palette.accent).add_modifier(Modifier::BOLD);

    let mut spans: Vec<Span> = vec![Span::styled("RiskView Neonatal Monitor    ", title_style)];

    for (index, screen) in Screen::ALL.iter().enumerate() {
        let style = if app.screen == *screen {
            Style::default()
                .fg(palette.background)
                .bg(palette.accent)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };
        spans.push(Span::styled(format!("[{}] {}  ", index + 1, screen.name()), style));
    }

    let state = app.prefs.state();
    let origin = match state.origin {
        PreferenceOrigin::User => "chosen",
        PreferenceOrigin::System => "system",
    };
    spans.push(Span::styled(
        format!("  theme: {} ({origin})  {}", state.mode.as_str(), truncate(&app.backend, 32)),
        Style::default().fg(palette.muted),
    ));

    let header = Paragraph::new(Line::from(spans)).block(palette.block(""));
    f.render_widget(header, area);
}

fn render_dashboard<A: RiskApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    let palette = app.palette();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    let Some(snapshot) = app.aggregator.latest() else {
        let text = if app.aggregator.is_refreshing() {
            "Loading dashboard..."
        } else {
            "No data yet. Press [r] to refresh."
        };
        f.render_widget(
            Paragraph::new(text).style(Style::default().fg(palette.muted)).block(palette.block(" Statistics ")),
            chunks[0],
        );
        f.render_widget(palette.block(" Recent Predictions "), chunks[1]);
        return;
    };

    let stats = &snapshot.stats;
    let label = Style::default().fg(palette.muted);
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Total predictions   ", label),
            Span::raw(stats.total_predictions.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Patients            ", label),
            Span::raw(stats.distinct_patients.to_string()),
        ]),
        Line::from(vec![
            Span::styled("High-risk patients  ", label),
            Span::styled(stats.high_risk.to_string(), level_style(RiskLevel::High)),
        ]),
        Line::from(vec![
            Span::styled("Alerts triggered    ", label),
            Span::raw(stats.alerts_triggered.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Average risk        ", label),
            Span::raw(stats.average_risk.map(format_percent).unwrap_or_else(|| "n/a".to_string())),
        ]),
        Line::from(""),
    ];

    for level in RiskLevel::ALL {
        let count = stats.distribution.get(&level).copied().unwrap_or(0);
        lines.push(Line::from(vec![
            Span::styled(format!("{:<10}", level.label()), level_style(level)),
            Span::styled("█".repeat(count), Style::default().fg(level_color(level))),
            Span::raw(format!(" {count}")),
        ]));
    }

    let system = &snapshot.system_status;
    let health = if system.is_healthy() { Color::Green } else { Color::Yellow };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled("Model  ", label),
        Span::styled(system.model_status.clone(), Style::default().fg(health)),
        Span::styled("   Alerts  ", label),
        Span::styled(system.alert_system.clone(), Style::default().fg(health)),
    ]));

    f.render_widget(
        Paragraph::new(lines).block(palette.block(" Statistics ")),
        chunks[0],
    );

    let rows: Vec<Row> = snapshot
        .recent_predictions
        .iter()
        .map(|prediction| {
            let record = &prediction.record;
            Row::new(vec![
                Cell::from(record.id.clone()),
                Cell::from(record.timestamp.with_timezone(&chrono::Local).format("%m-%d %H:%M").to_string()),
                Cell::from(Span::styled(prediction.level.label(), level_style(prediction.level))),
                Cell::from(format_percent(record.risk_score)),
                Cell::from(if record.alert_triggered { "alert" } else { "" }),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Min(5),
        ],
    )
    .header(
        Row::new(vec!["Patient", "Time", "Level", "Risk", "Alert"])
            .style(Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)),
    )
    .block(palette.block(" Recent Predictions "));
    f.render_widget(table, chunks[1]);
}

fn render_predict<A: RiskApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    let palette = app.palette();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let mut lines: Vec<Line> = Vec::new();
    for field in Field::all() {
        let focused = field == app.field;
        let marker = if focused { "▶ " } else { "  " };
        let name_style = if focused {
            Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(palette.text)
        };

        match field {
            Field::PatientId => {
                let cursor = if focused { "_" } else { "" };
                lines.push(Line::from(vec![
                    Span::styled(format!("{marker}{:<18}", "Patient ID"), name_style),
                    Span::raw(format!("{}{cursor}", app.form.patient_id())),
                ]));
            }
            Field::Vital(vital) => {
                let value = app.form.value(vital);
                let (low, high) = vital.normal_range();
                let value_style = if vital.is_normal(value) {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                };
                lines.push(Line::from(vec![
                    Span::styled(format!("{marker}{:<18}", vital.label()), name_style),
                    Span::styled(format!("{value:>5.0} "), value_style),
                    Span::styled(
                        format!("{:<8} normal {low:.0}-{high:.0}", vital.unit()),
                        Style::default().fg(palette.muted),
                    ),
                ]));
            }
        }
        lines.push(Line::from(""));
    }

    f.render_widget(
        Paragraph::new(lines).block(palette.block(" Vital Signs ")),
        chunks[0],
    );

    let result = match &app.panel {
        _ if app.submitting => Paragraph::new("Submitting...").style(Style::default().fg(palette.muted)),
        None => Paragraph::new("Press [Enter] to request a risk assessment.")
            .style(Style::default().fg(palette.muted)),
        Some(panel) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("Risk: {}", panel.headline),
                    level_style(panel.level),
                )),
                Line::from(""),
                Line::from(vec![
                    Span::styled("Status: ", Style::default().fg(palette.muted)),
                    Span::styled(
                        panel.alert_status,
                        if panel.result.alert_triggered {
                            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)
                        } else {
                            Style::default().fg(Color::Green)
                        },
                    ),
                ]),
            ];
            if let Some(notice) = panel.alert_notice {
                lines.push(Line::from(notice));
            }
            if let Some(explanation) = &panel.result.explanation {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Explanation", Style::default().fg(palette.muted))));
                lines.push(Line::from(explanation.clone()));
            }
            Paragraph::new(lines).wrap(Wrap { trim: true })
        }
    };
    f.render_widget(result.block(palette.block(" Assessment ")), chunks[1]);
}

fn render_history<A: RiskApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    let palette = app.palette();
    let snapshot = app.history.snapshot();
    let title = format!(" Risk Trend: {} ", snapshot.patient_id);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let placeholder = match &snapshot.display {
        ViewDisplay::Loading => Some(("Loading history...".to_string(), palette.muted)),
        ViewDisplay::Failed { message } => Some((message.clone(), Color::Red)),
        ViewDisplay::Empty => Some((
            "No prediction history available for this patient.".to_string(),
            palette.muted,
        )),
        ViewDisplay::Ready => None,
    };
    if let Some((text, color)) = placeholder {
        f.render_widget(
            Paragraph::new(text).style(Style::default().fg(color)).block(palette.block(title)),
            area,
        );
        return;
    }

    let series: Vec<(f64, f64)> = snapshot
        .chart
        .iter()
        .enumerate()
        .map(|(index, point)| (index as f64, point.risk * 100.0))
        .collect();
    let x_max = (series.len().saturating_sub(1)).max(1) as f64;
    let thresholds: Vec<(RiskLevel, [(f64, f64); 2])> = snapshot
        .reference_lines
        .iter()
        .map(|(level, bound)| (*level, [(0.0, bound * 100.0), (x_max, bound * 100.0)]))
        .collect();

    let mut datasets: Vec<Dataset> = thresholds
        .iter()
        .map(|(level, line)| {
            Dataset::default()
                .name(level.label())
                .marker(symbols::Marker::Dot)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(level_color(*level)))
                .data(line)
        })
        .collect();
    datasets.push(
        Dataset::default()
            .name("risk %")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(palette.accent))
            .data(&series),
    );

    let first = snapshot.chart.first().map(|p| p.label()).unwrap_or_default();
    let last = snapshot.chart.last().map(|p| p.label()).unwrap_or_default();
    let chart = Chart::new(datasets)
        .block(palette.block(title))
        .x_axis(
            Axis::default()
                .style(Style::default().fg(palette.muted))
                .bounds([0.0, x_max])
                .labels(vec![first, last]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(palette.muted))
                .bounds([0.0, 100.0])
                .labels(vec!["0%", "50%", "100%"]),
        );
    f.render_widget(chart, chunks[0]);

    let rows: Vec<Row> = snapshot
        .rows
        .iter()
        .map(|row| {
            let record = &row.record;
            Row::new(vec![
                Cell::from(record.timestamp.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string()),
                Cell::from(Span::styled(row.level.label(), level_style(row.level))),
                Cell::from(format_percent(record.risk_score)),
                Cell::from(if record.alert_triggered { "alert" } else { "" }),
                Cell::from(truncate(record.explanation.as_deref().unwrap_or(""), 60)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(6),
            Constraint::Min(10),
        ],
    )
    .header(
        Row::new(vec!["Time", "Level", "Risk", "Alert", "Explanation"])
            .style(Style::default().fg(palette.accent).add_modifier(Modifier::BOLD)),
    )
    .block(palette.block(" Records "));
    f.render_widget(table, chunks[1]);
}

fn render_detail<A: RiskApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    let palette = app.palette();
    let label = Style::default().fg(palette.muted);
    let mut lines: Vec<Line> = Vec::new();

    match app.screen {
        Screen::Dashboard => {
            let state = app.aggregator.controller().state();
            lines.push(Line::from(vec![
                Span::styled("Feed: ", label),
                Span::raw(status_text(state.status, app.aggregator.is_refreshing())),
            ]));
            if let Some(snapshot) = app.aggregator.latest() {
                lines.push(Line::from(vec![
                    Span::styled("Refreshed at: ", label),
                    Span::raw(
                        snapshot
                            .refreshed_at
                            .with_timezone(&chrono::Local)
                            .format("%H:%M:%S")
                            .to_string(),
                    ),
                ]));
                if let Some(error) = snapshot.error {
                    lines.push(Line::from(Span::styled(error, Style::default().fg(Color::Red))));
                }
            }
        }
        Screen::Predict => {
            lines.push(Line::from(Span::styled(
                "Values outside the normal range are shown in red.",
                label,
            )));
            let bands: Vec<String> = reference_lines()
                .iter()
                .map(|(level, bound)| format!("{} from {}", level.label(), format_percent(*bound)))
                .collect();
            lines.push(Line::from(Span::styled(
                format!("Risk levels: LOW below {}", bands.join(", ")),
                label,
            )));
        }
        Screen::History => {
            let snapshot = app.history.snapshot();
            let pages = if snapshot.show_pagination {
                format!("Page {} of {}", snapshot.page, snapshot.page_count)
            } else {
                format!("Page {}", snapshot.page)
            };
            lines.push(Line::from(vec![
                Span::raw(pages),
                Span::styled("   Window: ", label),
                Span::raw(snapshot.time_filter.label()),
                Span::styled("   Status: ", label),
                Span::raw(status_text(snapshot.status, false)),
            ]));
            if let (Some(error), false) = (&snapshot.error, snapshot.rows.is_empty()) {
                lines.push(Line::from(Span::styled(error.clone(), Style::default().fg(Color::Red))));
            }
        }
    }

    if let Some(notice) = &app.notice {
        let color = if notice.is_error { Color::Red } else { palette.accent };
        lines.push(Line::from(Span::styled(notice.text.clone(), Style::default().fg(color))));
    }

    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: true }).block(palette.block(" Detail ")),
        area,
    );
}

fn status_text(status: QueryStatus, refreshing: bool) -> &'static str {
    match (status, refreshing) {
        (_, true) | (QueryStatus::Loading, _) => "loading",
        (QueryStatus::Idle, _) => "idle",
        (QueryStatus::Success, _) => "up to date",
        (QueryStatus::Error, _) => "error",
    }
}

fn render_footer<A: RiskApi>(f: &mut Frame, area: Rect, app: &App<A>) {
    let palette = app.palette();
    let key = Style::default().fg(palette.accent);
    let mut spans: Vec<Span> = vec![
        Span::styled(" [1-3/Tab] ", key),
        Span::raw("Screen  "),
        Span::styled("[t] ", key),
        Span::raw("Theme  "),
    ];

    let hints: &[(&str, &str)] = match app.screen {
        Screen::Dashboard => &[("[r] ", "Refresh  ")],
        Screen::Predict if app.editing() => &[("[type] ", "Patient ID  "), ("[↑↓] ", "Field  "), ("[Enter] ", "Submit  ")],
        Screen::Predict => &[
            ("[↑↓] ", "Field  "),
            ("[←→/Shift] ", "Adjust  "),
            ("[Enter] ", "Submit  "),
            ("[h] ", "History  "),
        ],
        Screen::History => &[
            ("[←→] ", "Page  "),
            ("[Home/End] ", "First/Last  "),
            ("[f] ", "Window  "),
            ("[r] ", "Retry  "),
        ],
    };
    for (keys, action) in hints {
        spans.push(Span::styled(*keys, key));
        spans.push(Span::raw(*action));
    }

    spans.push(Span::styled(if app.editing() { "[Esc] " } else { "[q] " }, key));
    spans.push(Span::raw("Quit"));

    let footer = Paragraph::new(Line::from(spans)).block(palette.block(""));
    f.render_widget(footer, area);
}

// ── Utility helpers ───────────────────────────────────────────────────────────

/// Truncate a string to at most `max` chars, appending "…" if truncated.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

// ── Startup ───────────────────────────────────────────────────────────────────

fn open_preferences(config: &AppConfig) -> PreferenceStore {
    let storage: Box<dyn PreferenceStorage> = match config.preference_path() {
        Some(path) => Box::new(FilePreferenceStorage::new(path)),
        None => Box::new(InMemoryPreferenceStorage::new()),
    };
    PreferenceStore::initialize(storage, terminal_prefers_dark())
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("riskview-tui: {message}");
    std::process::exit(1);
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

// ── Main event loop ───────────────────────────────────────────────────────────

fn run<A: RiskApi>(mut app: App<A>) -> io::Result<()> {
    let mut terminal = setup_terminal()?;
    app.refresh_dashboard();

    loop {
        app.drain_outcomes();
        terminal.draw(|f| ui(f, &app))?;

        // Short poll so background results show up promptly.
        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !app.handle_key(key) {
                    break;
                }
            }
        }
    }

    restore_terminal(&mut terminal)
}

fn main() -> io::Result<()> {
    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        default_hook(info);
    }));

    let runtime = Runtime::new()?;
    let _guard = runtime.enter();

    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = AppConfig::load_or_default(config_path.as_deref()).unwrap_or_else(|e| fail(e));
    let prefs = open_preferences(&config);

    match std::env::var(API_URL_ENV) {
        Ok(url) => {
            config.api.base_url = url;
            let api = HttpRiskApi::from_config(&config).unwrap_or_else(|e| fail(e));
            let backend = api.base_url().to_string();
            run(App::new(runtime.handle().clone(), Arc::new(api), backend, config, prefs))
        }
        Err(_) => run(App::new(
            runtime.handle().clone(),
            Arc::new(MockRiskApi::new()),
            "in-memory service".to_string(),
            config,
            prefs,
        )),
    }
}
