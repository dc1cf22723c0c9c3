//! Drawing. Every function here is a pure view of `AppState`; input handling
//! lives in `app`.

pub mod theme;

use std::time::Instant;

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;
use unicode_width::UnicodeWidthStr;

use crate::app::AppState;
use crate::selection::{FlashItem, SelectionState};
use theme::Theme;

const BUTTON_WIDTH: u16 = 16;
const BUTTON_HEIGHT: u16 = 3;
/// Headline, a blank row, then the button.
const CENTER_BOX_HEIGHT: u16 = 2 + BUTTON_HEIGHT;
/// Flashes at or above this size are drawn bold.
const LARGE_FLASH_SIZE: f32 = 32.0;

pub struct ScreenLayout {
    pub shortcuts: Rect,
    pub play: Rect,
    pub headline: Rect,
    pub button: Rect,
    pub history: Rect,
    pub status: Rect,
}

pub fn screen_layout(area: Rect) -> ScreenLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(CENTER_BOX_HEIGHT),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(area);
    let play = chunks[1];

    let box_height = CENTER_BOX_HEIGHT.min(play.height);
    let top = play.y + play.height.saturating_sub(box_height) / 2;
    let headline = Rect::new(play.x, top, play.width, box_height.min(1));
    let button_width = BUTTON_WIDTH.min(play.width);
    let button = Rect::new(
        play.x + (play.width - button_width) / 2,
        top + box_height.min(2),
        button_width,
        box_height.saturating_sub(2),
    );

    ScreenLayout {
        shortcuts: chunks[0],
        play,
        headline,
        button,
        history: chunks[2],
        status: chunks[3],
    }
}

pub fn render(frame: &mut Frame, app: &AppState) {
    let size = frame.size();
    let theme = app.theme();
    frame.render_widget(
        Block::default().style(Style::default().bg(theme.background)),
        size,
    );
    let layout = screen_layout(size);

    let shortcuts = Paragraph::new(shortcut_line(app).line)
        .alignment(Alignment::Center)
        .style(Style::default().bg(theme.highlight));
    frame.render_widget(shortcuts, layout.shortcuts);

    render_flashes(frame, layout.play, app.selection().flashes(), theme, Instant::now());

    frame.render_widget(Clear, layout.headline);
    let headline = Paragraph::new(app.headline().to_string())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(theme.background)
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(headline, layout.headline);

    let button = Paragraph::new(app.selection().state().button_label())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(theme.primary)
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .style(Style::default().bg(theme.primary)),
        );
    frame.render_widget(Clear, layout.button);
    frame.render_widget(button, layout.button);

    render_history(frame, layout.history, app, theme);

    let status = Paragraph::new(app.status_text())
        .alignment(Alignment::Center)
        .style(
            Style::default()
                .bg(theme.surface)
                .fg(theme.text)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(status, layout.status);
}

fn render_flashes(frame: &mut Frame, area: Rect, flashes: &[FlashItem], theme: &Theme, now: Instant) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    for flash in flashes {
        let Some(rect) = flash_rect(area, flash) else {
            continue;
        };
        let mut style = Style::default().fg(theme.muted).bg(theme.background);
        if flash.size >= LARGE_FLASH_SIZE {
            style = style.add_modifier(Modifier::BOLD);
        }
        if flash.progress(now) > 0.5 {
            style = style.add_modifier(Modifier::DIM);
        }
        frame.render_widget(Paragraph::new(Span::styled(flash.text.clone(), style)), rect);
    }
}

/// Cell area for a flash, clipped to the play area.
fn flash_rect(area: Rect, flash: &FlashItem) -> Option<Rect> {
    let offset_x = (f32::from(area.width) * flash.x_percent / 100.0) as u16;
    let offset_y = (f32::from(area.height) * flash.y_percent / 100.0) as u16;
    if offset_x >= area.width || offset_y >= area.height {
        return None;
    }
    let width = (flash.text.width() as u16).min(area.width - offset_x);
    if width == 0 {
        return None;
    }
    Some(Rect::new(area.x + offset_x, area.y + offset_y, width, 1))
}

fn render_history(frame: &mut Frame, area: Rect, app: &AppState, theme: &Theme) {
    let history = app.selection().history();
    if history.is_empty() {
        return;
    }
    let chip = Style::default()
        .bg(theme.accent)
        .fg(theme.background)
        .add_modifier(Modifier::BOLD);
    let mut spans = Vec::new();
    for (index, item) in history.iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled("  ", Style::default().bg(theme.background)));
        }
        spans.push(Span::styled(format!(" {item} "), chip));
    }
    let strip = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: false })
        .style(Style::default().bg(theme.background));
    frame.render_widget(strip, area);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortcutAction {
    Advance,
    Reload,
    Quit,
}

struct ShortcutSegment {
    start: u16,
    end: u16,
    action: ShortcutAction,
}

pub struct ShortcutLineData {
    pub line: Line<'static>,
    segments: Vec<ShortcutSegment>,
    total_width: u16,
}

impl ShortcutLineData {
    /// Action under `column`, given the line is drawn centered in `area`.
    pub fn action_at(&self, column: u16, area: Rect) -> Option<ShortcutAction> {
        if self.segments.is_empty() || self.total_width == 0 || area.width == 0 {
            return None;
        }
        let text_width = self.total_width.min(area.width);
        let start_x = area.x + (area.width - text_width) / 2;
        if column < start_x || column >= start_x + text_width {
            return None;
        }
        let relative = column - start_x;
        self.segments
            .iter()
            .find(|segment| relative >= segment.start && relative < segment.end)
            .map(|segment| segment.action)
    }
}

pub fn shortcut_line(app: &AppState) -> ShortcutLineData {
    shortcut_line_for(app.selection().state(), app.theme())
}

fn shortcut_line_for(state: SelectionState, theme: &Theme) -> ShortcutLineData {
    let shortcuts = [
        ("Space", state.button_label(), ShortcutAction::Advance),
        ("r", "Reload", ShortcutAction::Reload),
        ("q", "Exit", ShortcutAction::Quit),
    ];
    let key_style = Style::default()
        .fg(theme.primary)
        .bg(theme.highlight)
        .add_modifier(Modifier::BOLD);
    let label_style = Style::default().fg(theme.background).bg(theme.highlight);

    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut segments = Vec::new();
    let mut cursor: u16 = 0;
    for (index, (key, label, action)) in shortcuts.into_iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled(" | ", label_style));
            cursor = cursor.saturating_add(3);
        }
        let label = format!(" {label}");
        let entry_start = cursor;
        let entry_end = entry_start
            .saturating_add(key.width() as u16)
            .saturating_add(label.width() as u16);
        spans.push(Span::styled(key, key_style));
        spans.push(Span::styled(label, label_style));
        segments.push(ShortcutSegment {
            start: entry_start,
            end: entry_end,
            action,
        });
        cursor = entry_end;
    }
    ShortcutLineData {
        line: Line::from(spans),
        segments,
        total_width: cursor,
    }
}
