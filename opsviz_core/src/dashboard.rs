//! OpsViz TUI Dashboard Module
//! ===========================
//!
//! Terminal rendition of the console: the health orb, the mounted scene's
//! frame counters and one sparkline per telemetry series. Uses Ratatui for
//! rendering and Crossbeam for delivering packets from the engine.
//!
//! Enable with the `dashboard` feature flag.

use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::Duration;

use crossbeam::channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Row, Sparkline, Table},
    Frame, Terminal,
};

use crate::metrics::{summarize, SeriesSummary, Trend};
use crate::pulse::HealthStatus;
use crate::scene::SceneKind;
use crate::telemetry::TimeSeriesSample;

/// Sparkline samples kept per series.
const HISTORY: usize = 48;

// =============================================================================
// CONSOLE PACKET (Sent from the engine to the dashboard)
// =============================================================================

/// One labelled series in a packet.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesReading {
    /// Preset key, e.g. `dashboard.power`
    pub key: String,
    pub samples: Vec<TimeSeriesSample>,
}

/// Snapshot of the console sent to the TUI.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolePacket {
    /// Scene time of the mounted scene
    pub timestamp: f64,
    pub scene: SceneKind,
    /// Frames the scene has advanced
    pub ticks: u64,
    pub status: HealthStatus,
    pub pulsing: bool,
    /// Wall clock label
    pub clock: String,
    pub series: Vec<SeriesReading>,
}

impl Default for ConsolePacket {
    fn default() -> Self {
        Self {
            timestamp: 0.0,
            scene: SceneKind::Factory,
            ticks: 0,
            status: HealthStatus::Good,
            pulsing: false,
            clock: String::new(),
            series: Vec::new(),
        }
    }
}

/// Per-series state kept between packets
#[derive(Debug, Clone)]
struct SeriesPanel {
    key: String,
    history: VecDeque<u64>,
    summary: Option<SeriesSummary>,
}

// =============================================================================
// CONSOLE DASHBOARD
// =============================================================================

/// TUI Dashboard for the operations console.
pub struct ConsoleDashboard {
    rx: Receiver<ConsolePacket>,
    panels: Vec<SeriesPanel>,
    latest_packet: ConsolePacket,
    pulse_history: VecDeque<u64>,
    frame_count: usize,
}

impl ConsoleDashboard {
    /// Create a new dashboard with the packet receiver channel.
    pub fn new(rx: Receiver<ConsolePacket>) -> Self {
        Self {
            rx,
            panels: Vec::new(),
            latest_packet: ConsolePacket::default(),
            pulse_history: VecDeque::with_capacity(HISTORY),
            frame_count: 0,
        }
    }

    /// Folds a packet into the dashboard state.
    pub fn ingest(&mut self, packet: ConsolePacket) {
        for reading in &packet.series {
            let panel = match self.panels.iter().position(|p| p.key == reading.key) {
                Some(i) => &mut self.panels[i],
                None => {
                    self.panels.push(SeriesPanel {
                        key: reading.key.clone(),
                        history: VecDeque::with_capacity(HISTORY),
                        summary: None,
                    });
                    let last = self.panels.len() - 1;
                    &mut self.panels[last]
                }
            };

            // A regenerated series replaces the history wholesale
            panel.history = reading
                .samples
                .iter()
                .rev()
                .take(HISTORY)
                .rev()
                .map(|s| s.value.round() as u64)
                .collect();
            panel.summary = summarize(&reading.samples);
        }

        self.pulse_history.push_back(if packet.pulsing { 1 } else { 0 });
        if self.pulse_history.len() > HISTORY {
            self.pulse_history.pop_front();
        }

        self.latest_packet = packet;
    }

    /// Drains every pending packet without blocking.
    pub fn drain(&mut self) -> usize {
        let mut received = 0;
        while let Ok(packet) = self.rx.try_recv() {
            self.ingest(packet);
            received += 1;
        }
        received
    }

    /// Run the TUI main loop (blocks until 'q' pressed)
    pub fn run(&mut self) -> io::Result<()> {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore terminal even if the loop failed
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
        loop {
            self.drain();

            terminal.draw(|f| self.ui(f))?;
            self.frame_count += 1;

            // Handle input (non-blocking with 50ms timeout)
            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn status_color(status: HealthStatus) -> Color {
        match status {
            HealthStatus::Optimal => Color::Green,
            HealthStatus::Good => Color::Cyan,
            HealthStatus::Warning => Color::Yellow,
            HealthStatus::Critical => Color::Red,
        }
    }

    /// Render the UI
    fn ui(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(5), // Health + scene
                Constraint::Min(6),    // Series sparklines
                Constraint::Length(self.panels.len() as u16 + 3), // Summary table
                Constraint::Length(1), // Footer
            ])
            .split(f.area());

        let packet = &self.latest_packet;

        // === HEADER ===
        let header = Paragraph::new(Line::from(vec![
            Span::styled("OpsViz Operations Console", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  |  "),
            Span::styled(packet.clock.clone(), Style::default().fg(Color::Cyan)),
            Span::raw("  |  "),
            Span::raw(format!("Frame: {}", self.frame_count)),
        ]))
        .block(Block::default().borders(Borders::BOTTOM));
        f.render_widget(header, chunks[0]);

        // === HEALTH + SCENE ===
        let top = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(33),
                Constraint::Percentage(34),
                Constraint::Percentage(33),
            ])
            .split(chunks[1]);

        let color = Self::status_color(packet.status);
        let mut style = Style::default().fg(color);
        if packet.pulsing {
            style = style.add_modifier(Modifier::BOLD);
        }
        let orb = Paragraph::new(format!("{} {}", if packet.pulsing { "◉" } else { "●" }, packet.status.label()))
            .style(style)
            .block(Block::default().title("Health").borders(Borders::ALL));
        f.render_widget(orb, top[0]);

        let pulse_ratio = if self.pulse_history.is_empty() {
            0.0
        } else {
            self.pulse_history.iter().sum::<u64>() as f64 / self.pulse_history.len() as f64
        };
        let duty = Gauge::default()
            .block(Block::default().title("Pulse Duty").borders(Borders::ALL))
            .gauge_style(Style::default().fg(color))
            .percent((pulse_ratio * 100.0) as u16);
        f.render_widget(duty, top[1]);

        let scene = Paragraph::new(format!("{}  t={:.2}s  ticks={}", packet.scene, packet.timestamp, packet.ticks))
            .style(Style::default().fg(Color::Cyan))
            .block(Block::default().title("Scene").borders(Borders::ALL));
        f.render_widget(scene, top[2]);

        // === SPARKLINES ===
        if !self.panels.is_empty() {
            let constraints: Vec<Constraint> = self
                .panels
                .iter()
                .map(|_| Constraint::Ratio(1, self.panels.len() as u32))
                .collect();
            let rows = Layout::default()
                .direction(Direction::Vertical)
                .constraints(constraints)
                .split(chunks[2]);

            for (panel, area) in self.panels.iter().zip(rows.iter()) {
                let data: Vec<u64> = panel.history.iter().copied().collect();
                let sparkline = Sparkline::default()
                    .block(Block::default().title(panel.key.as_str()).borders(Borders::ALL))
                    .data(&data)
                    .style(Style::default().fg(Color::Cyan));
                f.render_widget(sparkline, *area);
            }
        }

        // === SUMMARY TABLE ===
        let header_cells = ["Series", "Latest", "Min", "Max", "Trend"]
            .iter()
            .map(|h| Span::styled(*h, Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells).height(1);

        let rows: Vec<Row> = self
            .panels
            .iter()
            .filter_map(|panel| panel.summary.as_ref().map(|s| (panel, s)))
            .map(|(panel, s)| {
                let trend_color = match s.trend {
                    Trend::Up => Color::Green,
                    Trend::Down => Color::Red,
                    Trend::Stable => Color::Gray,
                };
                Row::new(vec![
                    Span::raw(panel.key.clone()),
                    Span::raw(format!("{:.1}", s.latest)),
                    Span::raw(format!("{:.1}", s.min)),
                    Span::raw(format!("{:.1}", s.max)),
                    Span::styled(
                        format!("{} {:+.1}%", s.trend.arrow(), s.change_percent),
                        Style::default().fg(trend_color),
                    ),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Length(32),
                Constraint::Length(8),
                Constraint::Length(8),
                Constraint::Length(8),
                Constraint::Length(12),
            ],
        )
        .header(header)
        .block(Block::default().title("Series").borders(Borders::ALL));
        f.render_widget(table, chunks[3]);

        // === FOOTER ===
        let footer = Paragraph::new("Press 'q' to quit").style(Style::default().fg(Color::DarkGray));
        f.render_widget(footer, chunks[4]);
    }
}

// =============================================================================
// TESTS
// =============================================================================
