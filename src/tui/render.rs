//! Main rendering logic for TUI.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};

use super::state::{AppState, Mode};
use super::widgets::{
    FOOTER_HEIGHT, header_lines, render_activity, render_confirm, render_footer, render_header,
    render_help,
};

/// Main render function.
pub fn render(frame: &mut Frame, state: &mut AppState) {
    let area = frame.area();
    let header = header_lines(state);

    let chunks = Layout::vertical([
        Constraint::Length(header.len() as u16),
        Constraint::Min(3),
        Constraint::Length(FOOTER_HEIGHT),
    ])
    .split(area);

    render_header(frame, chunks[0], header);
    render_activity(frame, chunks[1], state);
    render_footer(frame, chunks[2], state);

    // Popups last, over everything.
    match &state.mode {
        Mode::Confirmation { action, pids } => render_confirm(frame, area, *action, pids),
        Mode::Help { .. } => render_help(frame, area),
        Mode::Browsing | Mode::Navigation => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::model::{ProcessRow, ServerStats, Snapshot};
    use crate::tui::state::ControlAction;
    use chrono::{TimeZone, Utc};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen(state: &mut AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
        terminal.draw(|frame| render(frame, state)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn state() -> AppState {
        let mut state = AppState::new(&Config::default(), "db:5432".to_string());
        let processes = (1..=40)
            .map(|pid| ProcessRow {
                pid,
                state: "active".to_string(),
                query: Some(format!("SELECT {}", pid)),
                ..ProcessRow::default()
            })
            .collect();
        state.current = Some(Snapshot::new(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            ServerStats::default(),
            processes,
            Vec::new(),
        ));
        state.rows = state
            .current
            .as_ref()
            .unwrap()
            .processes
            .iter()
            .map(|p| crate::rates::DeltaRow {
                process: p.clone(),
                ..Default::default()
            })
            .collect();
        state
    }

    #[test]
    fn draws_table_and_sets_page_size() {
        let mut st = state();
        let text = screen(&mut st);
        assert!(text.contains("RUNNING QUERIES [40]"));
        assert!(text.contains("SELECT 1"));
        assert!(st.table.page_size > 0 && st.table.page_size < 30);
    }

    #[test]
    fn confirmation_popup_lists_pids() {
        let mut st = state();
        st.mode = Mode::Confirmation {
            action: ControlAction::Terminate,
            pids: vec![3, 5],
        };
        let text = screen(&mut st);
        assert!(text.contains("Terminate backends"));
        assert!(text.contains("3, 5"));
    }
}
