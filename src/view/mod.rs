//! UI-agnostic view model.
//!
//! [`activity`] turns the latest delta rows into a [`common::ActivityTable`]
//! according to the [`ViewState`]; the TUI then maps the view model to
//! ratatui widgets, and CSV export reads the same filtered rows.

pub mod activity;
pub mod columns;
pub mod common;

use regex::Regex;

use crate::capability::DurationMode;

pub use activity::{ActivityRow, build_activity_view, clamp_offset, page, select_rows};
pub use columns::{Column, ColumnSet};

/// Which backends the table lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum View {
    /// Non-idle backends.
    #[default]
    Running,
    /// Backends waiting for a lock.
    Waiting,
    /// Backends holding a lock others wait for.
    Blocking,
}

impl View {
    pub fn all() -> &'static [View] {
        &[View::Running, View::Waiting, View::Blocking]
    }

    pub fn name(self) -> &'static str {
        match self {
            View::Running => "RUNNING QUERIES",
            View::Waiting => "WAITING QUERIES",
            View::Blocking => "BLOCKING QUERIES",
        }
    }

    /// Function key shown in the footer.
    pub fn key_hint(self) -> &'static str {
        match self {
            View::Running => "F1",
            View::Waiting => "F2",
            View::Blocking => "F3",
        }
    }

    /// Lock views show lock columns instead of host process columns.
    pub fn is_lock_view(self) -> bool {
        !matches!(self, View::Running)
    }
}

/// Numeric sort key; every key sorts descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortKey {
    Cpu,
    Mem,
    Read,
    Write,
    /// Accumulated TIME+.
    Time,
    /// The duration-mode value, longest first.
    #[default]
    Duration,
}

impl SortKey {
    /// Column whose header carries the sort marker.
    pub fn column(self) -> Column {
        match self {
            SortKey::Cpu => Column::Cpu,
            SortKey::Mem => Column::Mem,
            SortKey::Read => Column::Read,
            SortKey::Write => Column::Write,
            SortKey::Time => Column::Time,
            SortKey::Duration => Column::Duration,
        }
    }
}

/// How query text is rendered. Never affects filtering or sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryDisplay {
    /// Whole query, wrapped over several lines.
    Full,
    /// One line, cut at the table edge.
    #[default]
    Truncated,
    /// Re-indented one clause per line.
    Indented,
}

impl QueryDisplay {
    /// Next mode in the `v` key cycle.
    pub fn next(self) -> Self {
        match self {
            QueryDisplay::Full => QueryDisplay::Truncated,
            QueryDisplay::Truncated => QueryDisplay::Indented,
            QueryDisplay::Indented => QueryDisplay::Full,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            QueryDisplay::Full => "full",
            QueryDisplay::Truncated => "truncated",
            QueryDisplay::Indented => "indented",
        }
    }

    /// Parses a label as accepted by `--query-display`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "full" => Some(QueryDisplay::Full),
            "truncated" => Some(QueryDisplay::Truncated),
            "indented" => Some(QueryDisplay::Indented),
            _ => None,
        }
    }
}

/// Runtime display parameters for the activity table.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub view: View,
    pub sort_key: SortKey,
    /// Lifecycle timestamp behind the DURATION column; bound into the
    /// server query through the capability profile.
    pub duration_mode: DurationMode,
    pub query_display: QueryDisplay,
    pub columns: ColumnSet,
    /// Seconds; `0` disables the predicate.
    pub min_duration: f64,
    /// Case-insensitive database name filter.
    pub dbname_filter: Option<Regex>,
}

impl ViewState {
    /// The filter source text as sent to the server.
    pub fn dbname_pattern(&self) -> Option<&str> {
        self.dbname_filter.as_ref().map(Regex::as_str)
    }

    /// Key the rows are actually ordered by: the chosen key while its column
    /// is on screen, DURATION otherwise (lock views, no host stats).
    pub fn effective_sort_key(&self, host_stats: bool) -> SortKey {
        let column = self.sort_key.column();
        if column.applies_to(self.view) && (host_stats || !column.needs_host_stats()) {
            self.sort_key
        } else {
            SortKey::Duration
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_display_cycles_through_all_modes() {
        let mut mode = QueryDisplay::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(mode, QueryDisplay::default());
        assert_eq!(seen.len(), 3);
        assert_eq!(QueryDisplay::from_label("indented"), Some(QueryDisplay::Indented));
        assert_eq!(QueryDisplay::from_label("wrapped"), None);
    }

    #[test]
    fn host_sort_keys_fall_back_to_duration() {
        let mut state = ViewState {
            sort_key: SortKey::Cpu,
            ..ViewState::default()
        };
        assert_eq!(state.effective_sort_key(true), SortKey::Cpu);
        assert_eq!(state.effective_sort_key(false), SortKey::Duration);

        state.view = View::Waiting;
        assert_eq!(state.effective_sort_key(true), SortKey::Duration);

        state.sort_key = SortKey::Time;
        assert_eq!(state.effective_sort_key(false), SortKey::Time);
        assert_eq!(ViewState::default().sort_key, SortKey::Duration);
    }

    #[test]
    fn lock_views() {
        assert!(!View::Running.is_lock_view());
        assert!(View::Waiting.is_lock_view());
        assert!(View::Blocking.is_lock_view());
    }
}
