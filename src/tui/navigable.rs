//! Cursor movement over the activity table.

use crate::view::clamp_offset;

/// Cursor movement over a table whose rows are tracked by entity.
///
/// Every move drops the tracked entity so the next resolve goes by position;
/// bounds are applied there too, in [`TableCursor::resolve`].
pub trait NavigableTable {
    fn selected(&self) -> usize;
    fn selected_mut(&mut self) -> &mut usize;
    fn clear_tracked(&mut self);
    /// Rows moved by one page step.
    fn page(&self) -> usize;

    /// Moves by `rows`, negative meaning up.
    fn move_by(&mut self, rows: isize) {
        let selected = self.selected();
        *self.selected_mut() = if rows < 0 {
            selected.saturating_sub(rows.unsigned_abs())
        } else {
            selected.saturating_add(rows as usize)
        };
        self.clear_tracked();
    }

    fn select_up(&mut self) {
        self.move_by(-1);
    }

    fn select_down(&mut self) {
        self.move_by(1);
    }

    fn page_up(&mut self) {
        self.move_by(-(self.page() as isize));
    }

    fn page_down(&mut self) {
        self.move_by(self.page() as isize);
    }

    fn home(&mut self) {
        self.move_by(isize::MIN);
    }

    fn end(&mut self) {
        self.move_by(isize::MAX);
    }
}

/// Cursor and scroll offset of the activity table.
///
/// The cursor follows its pid across refreshes while the pid stays visible;
/// otherwise it keeps its position.
#[derive(Debug, Clone, Default)]
pub struct TableCursor {
    pub selected: usize,
    /// First visible row.
    pub offset: usize,
    /// Rows that fit on screen; set by the renderer.
    pub page_size: usize,
    tracked: Option<i32>,
}

impl NavigableTable for TableCursor {
    fn selected(&self) -> usize {
        self.selected
    }

    fn selected_mut(&mut self) -> &mut usize {
        &mut self.selected
    }

    fn clear_tracked(&mut self) {
        self.tracked = None;
    }

    fn page(&self) -> usize {
        self.page_size.max(1)
    }
}

impl TableCursor {
    /// Pid under the cursor after the last resolve.
    pub fn focused(&self) -> Option<i32> {
        self.tracked
    }

    /// Re-anchors on the tracked pid, then clamps the cursor to `pids` and
    /// scrolls so it stays visible.
    pub fn resolve(&mut self, pids: &[i32]) {
        if let Some(i) = self
            .tracked
            .and_then(|pid| pids.iter().position(|p| *p == pid))
        {
            self.selected = i;
        }
        self.selected = self.selected.min(pids.len().saturating_sub(1));
        self.tracked = pids.get(self.selected).copied();

        let page = self.page();
        if self.selected < self.offset {
            self.offset = self.selected;
        } else if self.selected >= self.offset + page {
            self.offset = self.selected + 1 - page;
        }
        self.offset = clamp_offset(self.offset, pids.len(), page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(page_size: usize) -> TableCursor {
        TableCursor {
            page_size,
            ..TableCursor::default()
        }
    }

    #[test]
    fn end_and_home_clamp() {
        let pids: Vec<i32> = (1..=25).collect();
        let mut c = cursor(10);
        c.end();
        c.resolve(&pids);
        assert_eq!(c.selected, 24);
        assert_eq!(c.offset, 15);
        assert_eq!(c.focused(), Some(25));

        c.home();
        c.resolve(&pids);
        assert_eq!((c.selected, c.offset), (0, 0));
    }

    #[test]
    fn cursor_follows_pid_after_reorder() {
        let mut c = cursor(5);
        c.select_down();
        c.resolve(&[10, 20, 30]);
        assert_eq!(c.focused(), Some(20));

        c.resolve(&[30, 10, 20]);
        assert_eq!(c.selected, 2);

        c.resolve(&[30, 10]);
        assert_eq!(c.selected, 1);
        assert_eq!(c.focused(), Some(10));
    }

    #[test]
    fn offset_stays_in_bounds_for_any_moves() {
        let moves: [fn(&mut TableCursor); 6] = [
            |c| c.select_up(),
            |c| c.select_down(),
            |c| c.page_up(),
            |c| c.page_down(),
            |c| c.home(),
            |c| c.end(),
        ];
        for len in [0usize, 1, 6, 7, 8, 40] {
            let pids: Vec<i32> = (0..len as i32).collect();
            let mut c = cursor(7);
            for step in 0..200 {
                moves[(step * 5 + len) % moves.len()](&mut c);
                c.resolve(&pids);
                assert!(c.offset <= len.saturating_sub(7));
                assert!(c.selected < len.max(1));
                if len > 0 {
                    assert!(c.selected >= c.offset && c.selected < c.offset + 7);
                }
            }
        }
    }

    #[test]
    fn page_moves_by_page_size() {
        let pids: Vec<i32> = (0..50).collect();
        let mut c = cursor(12);
        c.page_down();
        c.resolve(&pids);
        assert_eq!(c.selected, 12);
        c.page_down();
        c.page_up();
        c.select_up();
        c.resolve(&pids);
        assert_eq!(c.selected, 11);
    }

    #[test]
    fn shrinking_list_pulls_offset_back() {
        let pids: Vec<i32> = (0..30).collect();
        let mut c = cursor(10);
        c.end();
        c.resolve(&pids);
        assert_eq!(c.offset, 20);

        c.resolve(&pids[..12]);
        assert_eq!(c.offset, 2);
        assert_eq!(c.selected, 11);
    }
}
