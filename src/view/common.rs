//! Activity table model handed from the view layer to the renderer.
//!
//! Text and colour classes only; `tui::style` turns a [`StyleClass`] into a
//! terminal style, so the table can be checked without a terminal.

/// Colour class of a whole line or of a single cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StyleClass {
    #[default]
    Normal,
    /// Idle in transaction, short durations, non-lock waits.
    Warning,
    /// Lock waits, long durations, exclusive lock modes, busy CPU.
    Critical,
    /// Active state.
    Active,
    /// Idle sessions.
    Dimmed,
    /// Parallel workers.
    Accent,
}

/// Text of one fixed-width column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextCell {
    pub text: String,
    /// `None` takes the line's class.
    pub class: Option<StyleClass>,
}

impl TextCell {
    pub fn plain(text: String) -> Self {
        Self { text, class: None }
    }

    pub fn colored(text: String, class: StyleClass) -> Self {
        Self {
            text,
            class: Some(class),
        }
    }
}

/// Fixed column heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnHeader {
    pub label: &'static str,
    pub width: u16,
    /// Rows are ordered by this column.
    pub sorted: bool,
}

/// One backend: the fixed cells, then its query text.
#[derive(Debug, Clone)]
pub struct ActivityLine {
    pub pid: i32,
    /// One per entry of [`ActivityTable::columns`].
    pub cells: Vec<TextCell>,
    /// Rendered per query-display mode; the renderer wraps it.
    pub query: String,
    pub class: StyleClass,
}

/// The activity table for the active view, all pages.
#[derive(Debug, Clone)]
pub struct ActivityTable {
    pub title: String,
    /// Fixed columns, PID first; the query column follows them.
    pub columns: Vec<ColumnHeader>,
    pub lines: Vec<ActivityLine>,
}

impl ActivityTable {
    pub fn widths(&self) -> Vec<u16> {
        self.columns.iter().map(|c| c.width).collect()
    }

    /// Index of the sorted column among the fixed ones.
    pub fn sorted_column(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.sorted)
    }
}
