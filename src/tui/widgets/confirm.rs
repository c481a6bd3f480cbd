//! Confirmation popup for cancel / terminate.

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::tui::state::ControlAction;

fn title(action: ControlAction) -> &'static str {
    match action {
        ControlAction::Cancel => " Cancel queries ",
        ControlAction::Terminate => " Terminate backends ",
    }
}

/// Renders a centered confirmation popup listing `pids`.
pub fn render_confirm(frame: &mut Frame, area: Rect, action: ControlAction, pids: &[i32]) {
    let popup_width = (area.width * 50 / 100).clamp(40, 70).min(area.width);
    let popup_height = area.height.clamp(7, 9);

    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(title(action))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let list = pids
        .iter()
        .map(i32::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let content = vec![
        Line::from(Span::styled(
            format!(
                "{} {} backend{}?",
                action.verb(),
                pids.len(),
                if pids.len() == 1 { "" } else { "s" }
            ),
            Style::default().fg(Color::White),
        )),
        Line::from(Span::styled(list, Style::default().fg(Color::Yellow))),
        Line::from(""),
        Line::from(vec![
            Span::styled("y", Style::default().fg(Color::Yellow)),
            Span::styled(" → confirm, ", Style::default().fg(Color::DarkGray)),
            Span::styled("any other key", Style::default().fg(Color::Yellow)),
            Span::styled(" → abort", Style::default().fg(Color::DarkGray)),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(Color::White));
    frame.render_widget(paragraph, inner);
}
