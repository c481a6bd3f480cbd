//! Footer: status line and key hints.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::tui::state::{AppState, Mode};
use crate::tui::style::Styles;
use crate::view::View;

/// Footer height in lines.
pub const FOOTER_HEIGHT: u16 = 2;

fn hint(spans: &mut Vec<Span<'static>>, key: &str, label: &str) {
    spans.push(Span::styled(key.to_string(), Styles::key()));
    spans.push(Span::raw(format!(" {}  ", label)));
}

fn hint_line(state: &AppState) -> Line<'static> {
    let mut spans = Vec::new();
    match state.mode {
        Mode::Navigation => {
            hint(&mut spans, "Space", "tag");
            hint(&mut spans, "C", "cancel");
            hint(&mut spans, "K", "terminate");
            hint(&mut spans, "Esc", "back");
            if !state.selection.is_empty() {
                spans.push(Span::styled(
                    format!("[{} tagged]", state.selection.len()),
                    Styles::tagged(),
                ));
            }
        }
        _ => {
            for view in View::all() {
                let style = if *view == state.view.view {
                    Styles::sort_header()
                } else {
                    Styles::default()
                };
                spans.push(Span::styled(view.key_hint(), Styles::key()));
                spans.push(Span::raw(" "));
                spans.push(Span::styled(view.name().to_string(), style));
                spans.push(Span::raw("  "));
            }
            hint(&mut spans, "Space", "pause");
            hint(&mut spans, "h", "help");
            hint(&mut spans, "q", "quit");
        }
    }
    Line::from(spans)
}

fn status_line(state: &AppState) -> Line<'static> {
    if let Some(banner) = state.reconnect_banner() {
        return Line::from(Span::styled(banner, Styles::critical()));
    }
    if let Some(message) = &state.status_message {
        return Line::from(Span::styled(message.clone(), Styles::warning()));
    }
    Line::default()
}

/// Renders the footer.
pub fn render_footer(frame: &mut Frame, area: Rect, state: &AppState) {
    let chunks = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).split(area);
    frame.render_widget(Paragraph::new(status_line(state)), chunks[0]);
    frame.render_widget(Paragraph::new(hint_line(state)), chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Instant;

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn banner_wins_over_status() {
        let mut state = AppState::new(&Config::default(), "local".to_string());
        state.status_message = Some("refresh interval: 1s".to_string());
        assert_eq!(text(&status_line(&state)), "refresh interval: 1s");

        state.scheduler.connection_lost(Instant::now());
        assert!(text(&status_line(&state)).starts_with("Connection lost"));
    }

    #[test]
    fn navigation_hints_show_tag_count() {
        let mut state = AppState::new(&Config::default(), "local".to_string());
        state.mode = Mode::Navigation;
        state.selection.toggle(4);
        assert!(text(&hint_line(&state)).ends_with("[1 tagged]"));
    }
}
