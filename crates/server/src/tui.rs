use std::collections::VecDeque;

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table};

use crate::link::LinkStats;
use crate::sandbox::{CharacterRow, SandboxStats};

const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn color(self) -> Color {
        match self {
            LogLevel::Info => Color::White,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }
}

#[derive(Debug, Default)]
pub struct TuiState {
    log: VecDeque<(LogLevel, String)>,
}

impl TuiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log_info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn log_warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn log_error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&mut self, level: LogLevel, message: String) {
        if self.log.len() >= MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back((level, message));
    }
}

pub fn render(frame: &mut Frame, state: &TuiState, stats: &SandboxStats) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(stats.characters.len() as u16 + 3),
            Constraint::Length(4),
            Constraint::Min(4),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], stats);
    render_status(frame, chunks[1], stats);
    render_characters(frame, chunks[2], &stats.characters);
    render_network(frame, chunks[3], stats);
    render_log(frame, chunks[4], state);
    render_help(frame, chunks[5]);
}

fn render_header(frame: &mut Frame, area: Rect, stats: &SandboxStats) {
    let uptime = format_duration(stats.uptime_secs);
    let title = format!(" Sidearm Sandbox - Uptime: {} ", uptime);

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let mut text = format!(
        "Tick: {}  |  Sim: {:.1}s  |  Entities: {} (mirrored {})  |  Kills: {}",
        stats.tick, stats.sim_time, stats.entity_count, stats.mirrored_count, stats.kills
    );
    if stats.paused {
        text.push_str("  |  PAUSED");
    }

    let paragraph = Paragraph::new(text)
        .block(block)
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

/// Share of the authority's entities the observer currently mirrors.
fn render_status(frame: &mut Frame, area: Rect, stats: &SandboxStats) {
    let block = Block::default()
        .title(" Observer ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Green));

    let ratio = if stats.entity_count == 0 {
        1.0
    } else {
        stats.mirrored_count as f64 / stats.entity_count as f64
    };
    let gauge = Gauge::default()
        .block(block)
        .gauge_style(Style::default().fg(Color::Green))
        .ratio(ratio.min(1.0))
        .label(format!("{}/{} mirrored", stats.mirrored_count, stats.entity_count));

    frame.render_widget(gauge, area);
}

fn render_characters(frame: &mut Frame, area: Rect, characters: &[CharacterRow]) {
    let block = Block::default()
        .title(" Characters ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Magenta));

    let header = Row::new(["Id", "Seat", "Team", "Health", "Mirror", "Weapon", "State", "Ammo", "K/D"])
        .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));

    let rows = characters.iter().map(|row| {
        let health_color = if row.dying {
            Color::DarkGray
        } else if row.health < 30.0 {
            Color::Red
        } else {
            Color::White
        };
        let mut state = row.weapon_state.to_string();
        if row.lunging {
            state.push_str(" (lunge)");
        }
        Row::new([
            Cell::from(row.id.to_string()),
            Cell::from(row.role.as_str()),
            Cell::from(row.team.to_string()),
            Cell::from(format!("{:.0}", row.health)).style(Style::default().fg(health_color)),
            Cell::from(row.mirror_health.map_or_else(|| "-".to_string(), |h| format!("{:.0}", h))),
            Cell::from(row.weapon.clone()),
            Cell::from(state),
            Cell::from(format!("{}/{}", row.clip, row.ammo)),
            Cell::from(format!("{}/{}", row.score.kills, row.score.deaths)),
        ])
    });

    let widths = [
        Constraint::Length(5),
        Constraint::Length(7),
        Constraint::Length(5),
        Constraint::Length(7),
        Constraint::Length(7),
        Constraint::Length(16),
        Constraint::Length(18),
        Constraint::Length(9),
        Constraint::Length(6),
    ];
    let table = Table::new(rows, widths).header(header).block(block);
    frame.render_widget(table, area);
}

fn render_network(frame: &mut Frame, area: Rect, stats: &SandboxStats) {
    let block = Block::default()
        .title(format!(" Link ({}ms) ", stats.latency_ms))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    let lines = vec![
        link_line("Uplink: ", &stats.uplink),
        link_line("Downlink: ", &stats.downlink),
    ];

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, area);
}

fn link_line(label: &'static str, link: &LinkStats) -> Line<'static> {
    Line::from(vec![
        Span::styled(label, Style::default().fg(Color::Gray)),
        Span::styled(
            format!(
                "{} sent / {} delivered / {} in flight ({})",
                link.messages_sent,
                link.messages_delivered,
                link.in_flight,
                format_bytes(link.bytes_sent)
            ),
            Style::default().fg(Color::White),
        ),
    ])
}

fn render_log(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .title(" Events ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Blue));

    let visible = area.height.saturating_sub(2) as usize;
    let lines: Vec<Line> = state
        .log
        .iter()
        .skip(state.log.len().saturating_sub(visible))
        .map(|(level, message)| {
            Line::from(Span::styled(message.clone(), Style::default().fg(level.color())))
        })
        .collect();

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Controls ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let text = Paragraph::new("q/ESC quit  |  p pause  |  r reset duel")
        .block(block)
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        );

    frame.render_widget(text, area);
}

fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{}B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1}KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_duration(3725), "01:02:05");
        assert_eq!(format_bytes(512), "512B");
        assert_eq!(format_bytes(2048), "2.0KB");
    }

    #[test]
    fn test_log_is_capped() {
        let mut state = TuiState::new();
        for i in 0..MAX_LOG_LINES + 10 {
            state.log_info(format!("line {}", i));
        }
        assert_eq!(state.log.len(), MAX_LOG_LINES);
        assert_eq!(state.log.front().map(|(_, m)| m.as_str()), Some("line 10"));
    }
}
