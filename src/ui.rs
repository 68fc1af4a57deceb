use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

use crate::app::App;
use crate::dom::{Document, LayoutLine};
use crate::models::{ElementId, FocusArea};
use crate::selector::Matchable;
use crate::theme::Theme;

/// Splits the frame into the document pane and the one-line status bar.
fn split(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);
    (chunks[0], chunks[1])
}

/// The cells the document is laid out in; its viewport has this size.
pub fn document_area(area: Rect) -> Rect {
    let (pane, _) = split(area);
    Block::default().borders(Borders::ALL).inner(pane)
}

pub fn draw(f: &mut Frame, app: &App, theme: &Theme) {
    let (pane, status) = split(f.area());
    let host = &app.host;

    let title = match (&host.current_page, &host.sidebar_page) {
        (Some(page), Some(side)) => format!(" {page} | {side} "),
        (Some(page), None) => format!(" {page} "),
        (None, Some(side)) => format!(" Journals | {side} "),
        (None, None) => " Journals ".to_string(),
    };
    let border = if host.focus == FocusArea::HintCapture { theme.focus_border } else { theme.blurred_border };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border));
    let inner = block.inner(pane);
    f.render_widget(block, pane);

    render_document(f.buffer_mut(), inner, app, theme);
    render_markers(f.buffer_mut(), inner, app, theme);
    render_status(f, status, app, theme);
}

fn render_document(buf: &mut Buffer, area: Rect, app: &App, theme: &Theme) {
    let doc = &app.host.document;
    let scroll = doc.scroll_top();

    for line in doc.lines() {
        let row = line.top - scroll;
        if row < 0 || row >= i32::from(area.height) {
            continue;
        }
        let y = area.y + row as u16;

        if let Some(style) = row_style(line, app, theme) {
            buf.set_style(Rect { x: area.x, y, width: area.width, height: 1 }, style);
        }
        if line.has_block_children && line.indent >= 2 {
            let bullet = if line.collapsed { "▸" } else { "▾" };
            put(buf, area, line.indent - 2, y, bullet, theme.collapsed);
        }
        for span in &line.spans {
            let style = span_style(doc, span.element, theme);
            put(buf, area, span.x, y, &span.text, style);
        }
    }
}

fn row_style(line: &LayoutLine, app: &App, theme: &Theme) -> Option<Style> {
    if app.host.editing == Some(line.block) {
        Some(theme.editing)
    } else if app.host.selected == Some(line.block) {
        Some(theme.selection)
    } else {
        None
    }
}

/// Style of a text run, taken from the nearest styled element above it.
fn span_style(doc: &Document, element: ElementId, theme: &Theme) -> Style {
    let mut current = Some(element);
    while let Some(id) = current {
        let Some(node) = doc.node(id) else { break };
        if node.has_class("page-ref") {
            return theme.link;
        }
        if node.has_class("recent-item") {
            return theme.recent_item;
        }
        if node.has_class("page-title") {
            return theme.page_title;
        }
        if !node.is_inline() {
            break;
        }
        current = node.parent;
    }
    Style::default().fg(theme.text)
}

fn render_markers(buf: &mut Buffer, area: Rect, app: &App, theme: &Theme) {
    let typed = app.session.pending_input().chars().count();
    for marker in app.session.markers() {
        if marker.y < 0 || marker.y >= i32::from(area.height) {
            continue;
        }
        let y = area.y + marker.y as u16;
        let split = marker.label.char_indices().nth(typed).map_or(marker.label.len(), |(i, _)| i);
        let (done, rest) = marker.label.split_at(split);
        let done_width = done.chars().count() as i32;
        put(buf, area, marker.x, y, &done.to_uppercase(), theme.hint_typed);
        put(buf, area, marker.x + done_width, y, &rest.to_uppercase(), theme.hint);
    }
}

/// Writes `text` at a column relative to `area`, clipped to its right edge.
fn put(buf: &mut Buffer, area: Rect, x: i32, y: u16, text: &str, style: Style) {
    if text.is_empty() || x < 0 || x >= i32::from(area.width) {
        return;
    }
    let max = (i32::from(area.width) - x) as usize;
    buf.set_stringn(area.x + x as u16, y, text, max, style);
}

fn render_status(f: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let host = &app.host;
    let mut spans = Vec::new();

    if app.session.is_active() {
        spans.push(Span::styled(" HINT ", theme.mode_badge));
        spans.push(Span::raw(format!(" {}", app.session.pending_input())));
    } else if host.focus == FocusArea::Editing {
        spans.push(Span::styled(" EDIT ", theme.mode_badge));
        spans.push(Span::styled(" enter/esc to finish", theme.footer));
    }

    if let Some(msg) = host.message() {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(msg.to_string(), theme.message));
    } else if !app.session.is_active() && host.focus != FocusArea::Editing {
        let help = host
            .palette
            .commands()
            .iter()
            .map(|c| format!("{} {}", c.shortcut, c.label.trim_start_matches("Link Hints: ")))
            .chain(["j/k scroll".to_string(), "J/K select".to_string(), "q quit".to_string()])
            .collect::<Vec<_>>()
            .join(" · ");
        spans.push(Span::styled(format!(" {help}"), theme.footer));
    }

    f.render_widget(Paragraph::new(Line::from(spans)).style(Style::default().fg(theme.text_secondary)), area);
}
