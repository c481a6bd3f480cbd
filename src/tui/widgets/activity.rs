//! Activity table widget.

use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Row, Table, TableState};

use crate::tui::navigable::NavigableTable;
use crate::tui::state::AppState;
use crate::tui::style::Styles;
use crate::view::common::{ActivityLine, ActivityTable};
use crate::view::{QueryDisplay, build_activity_view, page};

/// Splits `text` into lines of at most `width` characters.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for source in text.lines() {
        let chars: Vec<char> = source.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
        }
        for chunk in chars.chunks(width) {
            lines.push(chunk.iter().collect());
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Width left for the query column after the fixed columns and spacing.
fn query_width(total: u16, widths: &[u16]) -> usize {
    let fixed: u16 = widths.iter().sum::<u16>() + widths.len() as u16;
    total.saturating_sub(fixed).max(10) as usize
}

fn build_row<'a>(
    line: &'a ActivityLine,
    display: QueryDisplay,
    query_width: usize,
    max_height: u16,
    tagged: bool,
) -> Row<'a> {
    let line_style = Styles::for_class(line.class);
    let mut cells: Vec<Cell<'a>> = line
        .cells
        .iter()
        .map(|cell| {
            let style = cell.class.map_or(line_style, Styles::for_class);
            Cell::from(Span::styled(cell.text.as_str(), style))
        })
        .collect();

    let mut height = 1u16;
    if display == QueryDisplay::Truncated {
        cells.push(Cell::from(Span::styled(line.query.as_str(), line_style)));
    } else {
        let wrapped = wrap(&line.query, query_width);
        height = (wrapped.len() as u16).clamp(1, max_height.max(1));
        let text = Text::from(wrapped.into_iter().map(Line::from).collect::<Vec<_>>());
        cells.push(Cell::from(text).style(line_style));
    }

    let mut out = Row::new(cells).height(height);
    if tagged {
        out = out.style(Styles::tagged());
    }
    out
}

fn header_row(table: &ActivityTable) -> Row<'static> {
    let mut cells: Vec<Cell<'static>> = table
        .columns
        .iter()
        .map(|c| {
            let style = if c.sorted {
                Styles::sort_header()
            } else {
                Styles::table_header()
            };
            Cell::from(c.label).style(style)
        })
        .collect();
    cells.push(Cell::from("Query"));
    Row::new(cells).style(Styles::table_header())
}

/// Renders the active view; sets the page size from the area height.
pub fn render_activity(frame: &mut Frame, area: Rect, state: &mut AppState) {
    // Title line and column header.
    state.table.page_size = area.height.saturating_sub(2).max(1) as usize;
    state.resolve_cursor();

    let rows = state.visible_rows();
    let model = build_activity_view(&rows, &state.view, state.host_stats);
    let display = state.view.query_display;
    let widths = model.widths();
    let q_width = query_width(area.width, &widths);
    let page_size = state.table.page();
    let offset = state.table.offset;

    let visible = page(&model.lines, offset, page_size);
    let body: Vec<Row> = visible
        .iter()
        .map(|line| {
            build_row(
                line,
                display,
                q_width,
                page_size as u16,
                state.selection.contains(line.pid),
            )
        })
        .collect();

    let mut constraints: Vec<Constraint> =
        widths.iter().map(|w| Constraint::Length(*w)).collect();
    constraints.push(Constraint::Min(10));

    let table = Table::new(body, constraints)
        .header(header_row(&model))
        .block(
            Block::default()
                .borders(Borders::TOP)
                .title(model.title.as_str())
                .title_style(Styles::table_header()),
        )
        .row_highlight_style(Styles::selected());

    let mut table_state = TableState::default();
    if state.mode.is_navigation() && !visible.is_empty() {
        let start = offset.min(model.lines.len().saturating_sub(page_size));
        table_state.select(Some(state.table.selected.saturating_sub(start)));
    }
    frame.render_stateful_widget(table, area, &mut table_state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_splits_on_width_and_newlines() {
        assert_eq!(wrap("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap("ab\n\ncd", 10), vec!["ab", "", "cd"]);
        assert_eq!(wrap("", 5), vec![""]);
        assert_eq!(wrap("äöü", 2), vec!["äö", "ü"]);
    }

    #[test]
    fn query_width_has_a_floor() {
        assert_eq!(query_width(100, &[7, 10, 10]), 70);
        assert_eq!(query_width(20, &[7, 10, 10]), 10);
    }
}
