use std::collections::VecDeque;

use city_core::{DisplayMapping, ProjectionPhase, Session, TrainingKey};
use city_proto::{group_troops, StatePayload, TroopCategory};
use ratatui::layout::{Constraint, Direction, Layout, Margin};
use ratatui::prelude::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

/// Resources always shown in the header, in this order. Other keys follow.
pub const HEADER_RESOURCES: [&str; 5] = ["wood", "stone", "iron", "food", "gold"];

const SLIDER_WIDTH: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Buildings,
    Training,
}

/// One selectable training slider: a troop type at one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingRow {
    pub category: TroopCategory,
    pub troop_type: String,
    pub owned: u64,
    pub level: u32,
}

impl TrainingRow {
    pub fn key(&self) -> TrainingKey {
        TrainingKey::new(self.troop_type.clone(), self.level)
    }
}

pub struct ViewState {
    pub focus: Focus,
    pub building_index: usize,
    pub training_index: usize,
    pub show_raw: bool,
    pub logs: VecDeque<String>,
    pub max_logs: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            focus: Focus::Buildings,
            building_index: 0,
            training_index: 0,
            show_raw: false,
            logs: VecDeque::new(),
            max_logs: 8,
        }
    }
}

impl ViewState {
    pub fn push_log<S: Into<String>>(&mut self, line: S) {
        let mut text: String = line.into();
        while text.ends_with('\n') || text.ends_with('\r') {
            text.pop();
        }
        if text.is_empty() {
            return;
        }
        self.logs.push_front(text);
        while self.logs.len() > self.max_logs {
            self.logs.pop_back();
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Buildings => Focus::Training,
            Focus::Training => Focus::Buildings,
        };
    }

    /// Moves the selection of the focused list, clamped to `len`.
    pub fn move_selection(&mut self, delta: isize, len: usize) {
        let index = match self.focus {
            Focus::Buildings => &mut self.building_index,
            Focus::Training => &mut self.training_index,
        };
        if len == 0 {
            *index = 0;
            return;
        }
        let next = (*index as isize + delta).clamp(0, len as isize - 1);
        *index = next as usize;
    }

    pub fn clamp_selection(&mut self, buildings: usize, training: usize) {
        self.building_index = self.building_index.min(buildings.saturating_sub(1));
        self.training_index = self.training_index.min(training.saturating_sub(1));
    }
}

/// Sliders in display order: Barracks, Range, Stables; each troop at levels
/// `1..=max_levels`.
pub fn training_rows(payload: Option<&StatePayload>, max_levels: u32) -> Vec<TrainingRow> {
    let Some(payload) = payload else {
        return Vec::new();
    };
    let groups = group_troops(payload.troops());
    let mut rows = Vec::new();
    for category in TroopCategory::ALL {
        for troop in groups.get(category) {
            if troop.troop_type.code.is_empty() {
                continue;
            }
            for level in 1..=max_levels {
                rows.push(TrainingRow {
                    category,
                    troop_type: troop.troop_type.code.clone(),
                    owned: troop.quantity,
                    level,
                });
            }
        }
    }
    rows
}

/// First eight characters of an id followed by an ellipsis.
pub fn short_id(id: Option<&str>) -> String {
    match id {
        Some(id) if !id.is_empty() => {
            let prefix: String = id.chars().take(8).collect();
            format!("{}…", prefix)
        }
        _ => String::new(),
    }
}

/// Whole number with comma thousands separators.
pub fn format_amount(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

/// Header resources first, then any other keys in name order. Missing header
/// resources render as `-`.
pub fn resource_entries(display: Option<&DisplayMapping>) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = HEADER_RESOURCES
        .iter()
        .map(|key| {
            let value = display
                .and_then(|mapping| mapping.get(*key))
                .map(|amount| format_amount(*amount))
                .unwrap_or_else(|| "-".to_string());
            (key.to_string(), value)
        })
        .collect();
    if let Some(mapping) = display {
        for (key, amount) in mapping {
            if !HEADER_RESOURCES.contains(&key.as_str()) {
                entries.push((key.clone(), format_amount(*amount)));
            }
        }
    }
    entries
}

fn slider(value: u32, max: u32) -> String {
    let filled = if max == 0 {
        0
    } else {
        (u64::from(value.min(max)) * u64::from(SLIDER_WIDTH) / u64::from(max)) as usize
    };
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(SLIDER_WIDTH as usize - filled)
    )
}

pub fn draw_ui(frame: &mut Frame, session: &Session, view: &ViewState, rows: &[TrainingRow]) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(8),
            Constraint::Length(4),
            Constraint::Length(7),
        ])
        .split(frame.size());

    draw_header(frame, chunks[0], session);
    if view.show_raw {
        draw_raw_state(frame, chunks[1], session);
    } else {
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(chunks[1]);
        draw_buildings(frame, body[0], session, view);
        draw_training(frame, body[1], session, view, rows);
    }
    draw_status(frame, chunks[2], session);
    draw_logs(frame, chunks[3], view);
}

fn render_block(frame: &mut Frame, area: Rect, block: Block, paragraph: Paragraph) {
    frame.render_widget(block, area);
    frame.render_widget(
        paragraph,
        area.inner(&Margin {
            vertical: 1,
            horizontal: 1,
        }),
    );
}

fn draw_header(frame: &mut Frame, area: Rect, session: &Session) {
    let payload = session.payload();
    let player = short_id(payload.and_then(|p| p.player_id.as_deref()));
    let city = short_id(session.city_id());
    let server_time = payload
        .and_then(|p| p.server_time.clone())
        .unwrap_or_else(|| "-".to_string());

    let (status, color) = if session.is_busy() {
        ("Loading…", Color::Yellow)
    } else {
        match session.projection_phase() {
            ProjectionPhase::Projecting => ("Live", Color::Green),
            ProjectionPhase::Idle => ("Idle", Color::DarkGray),
        }
    };

    let display = session.displayed_resources();
    let mut resource_spans = Vec::new();
    for (key, value) in resource_entries(display.as_ref()) {
        resource_spans.push(Span::raw(format!("{}: ", key)));
        resource_spans.push(Span::styled(
            value,
            Style::default().add_modifier(Modifier::BOLD),
        ));
        resource_spans.push(Span::raw("  "));
    }

    let lines = vec![
        Line::from(vec![
            Span::styled(status, Style::default().fg(color)),
            Span::raw(format!(" | Player: {} | City: {}", player, city)),
        ]),
        Line::from(format!("Server time: {}", server_time)),
        Line::from(resource_spans),
    ];
    let block = Block::default().borders(Borders::ALL).title("City Dashboard");
    render_block(
        frame,
        area,
        block,
        Paragraph::new(lines).wrap(Wrap { trim: true }),
    );
}

fn focused_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title)
}

fn draw_buildings(frame: &mut Frame, area: Rect, session: &Session, view: &ViewState) {
    let focused = view.focus == Focus::Buildings;
    let buildings = session.payload().map(|p| p.buildings()).unwrap_or(&[]);
    let lines: Vec<Line> = if buildings.is_empty() {
        vec![Line::from("No buildings loaded. Press r to refresh.")]
    } else {
        buildings
            .iter()
            .enumerate()
            .map(|(index, building)| {
                let code = &building.building_type.code;
                let produces = building
                    .building_type
                    .production_resource
                    .as_deref()
                    .unwrap_or("-");
                let selected = focused && index == view.building_index;
                let upgradable = !code.is_empty() && !session.is_busy();
                let marker = if selected { "> " } else { "  " };
                let style = if !upgradable {
                    Style::default().fg(Color::DarkGray)
                } else if selected {
                    Style::default().fg(Color::Yellow)
                } else {
                    Style::default()
                };
                Line::from(Span::styled(
                    format!(
                        "{}{} | lvl {} | produces {}",
                        marker, code, building.level, produces
                    ),
                    style,
                ))
            })
            .collect()
    };
    render_block(
        frame,
        area,
        focused_block("Buildings", focused),
        Paragraph::new(lines).wrap(Wrap { trim: false }),
    );
}

fn draw_training(
    frame: &mut Frame,
    area: Rect,
    session: &Session,
    view: &ViewState,
    rows: &[TrainingRow],
) {
    let focused = view.focus == Focus::Training;
    let max = session.training().max_per_level();
    let mut lines = Vec::new();

    for category in TroopCategory::ALL {
        lines.push(Line::from(Span::styled(
            category.section_title(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
        let mut any = false;
        for (index, row) in rows.iter().enumerate() {
            if row.category != category {
                continue;
            }
            any = true;
            if row.level == 1 {
                lines.push(Line::from(format!(
                    "  {}/{} | owned qty {}",
                    row.category, row.troop_type, row.owned
                )));
            }
            let value = session.training().quantity(&row.key());
            let selected = focused && index == view.training_index;
            let trainable = value >= 1 && !session.is_busy();
            let marker = if selected { ">" } else { " " };
            let style = if selected {
                Style::default().fg(Color::Yellow)
            } else if trainable {
                Style::default()
            } else {
                Style::default().fg(Color::DarkGray)
            };
            lines.push(Line::from(Span::styled(
                format!(
                    "  {} Lvl {} {} {:>3}",
                    marker,
                    row.level,
                    slider(value, max),
                    value
                ),
                style,
            )));
        }
        if !any {
            lines.push(Line::from("  No troop types in this category."));
        }
    }

    render_block(
        frame,
        area,
        focused_block("Training", focused),
        Paragraph::new(lines).wrap(Wrap { trim: false }),
    );
}

fn draw_raw_state(frame: &mut Frame, area: Rect, session: &Session) {
    let text = match session.raw_state() {
        Some(raw) => serde_json::to_string_pretty(raw).unwrap_or_else(|err| err.to_string()),
        None => "No data yet. Press r to refresh.".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title("Raw State");
    render_block(frame, area, block, Paragraph::new(text));
}

fn draw_status(frame: &mut Frame, area: Rect, session: &Session) {
    let line = match session.last_error() {
        Some(error) => Line::from(vec![
            Span::styled("Error: ", Style::default().fg(Color::Red)),
            Span::raw(error.to_string()),
        ]),
        None => Line::from(vec![
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(" refresh  "),
            Span::styled("tab", Style::default().fg(Color::Yellow)),
            Span::raw(" focus  "),
            Span::styled("enter", Style::default().fg(Color::Yellow)),
            Span::raw(" upgrade/train  "),
            Span::styled("+/- [/]", Style::default().fg(Color::Yellow)),
            Span::raw(" quantity  "),
            Span::styled("v", Style::default().fg(Color::Yellow)),
            Span::raw(" raw  "),
            Span::styled("q", Style::default().fg(Color::Yellow)),
            Span::raw(" exit"),
        ]),
    };
    let block = Block::default().borders(Borders::ALL).title("Status");
    render_block(
        frame,
        area,
        block,
        Paragraph::new(line).wrap(Wrap { trim: true }),
    );
}

fn draw_logs(frame: &mut Frame, area: Rect, view: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("Logs");
    let lines: Vec<Line> = view
        .logs
        .iter()
        .map(|entry| Line::from(Span::raw(entry)))
        .collect();
    render_block(
        frame,
        area,
        block,
        Paragraph::new(lines).wrap(Wrap { trim: false }),
    );
}
