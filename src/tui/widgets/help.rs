//! Help popup listing the key bindings.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::tui::input::help_entries;

fn help_lines() -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (section, entries) in help_entries() {
        if !lines.is_empty() {
            lines.push(Line::from(""));
        }
        lines.push(Line::from(Span::styled(
            section,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )));
        let key_width = entries.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        for (keys, description) in entries {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {:<width$}", keys, width = key_width),
                    Style::default().fg(Color::Yellow),
                ),
                Span::raw(format!("  {}", description)),
            ]));
        }
    }
    lines
}

/// Renders the help popup centered on screen.
pub fn render_help(frame: &mut Frame, area: Rect) {
    let lines = help_lines();
    let popup_width = (area.width * 70 / 100).clamp(40, 80).min(area.width);
    let popup_height = (lines.len() as u16 + 3).min(area.height);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" Help ")
        .title_bottom(" any key to close ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    frame.render_widget(Paragraph::new(lines).block(block), popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_section_has_a_heading() {
        let lines = help_lines();
        let headings: Vec<String> = lines
            .iter()
            .filter(|l| l.spans.len() == 1 && !l.spans[0].content.is_empty())
            .map(|l| l.spans[0].content.to_string())
            .collect();
        assert_eq!(headings, vec!["Dashboard", "Browsing", "Navigation"]);
    }
}
