//! Optional activity table columns.
//!
//! PID and the query text are always shown; everything else can be hidden
//! with `--hide`.

use std::collections::BTreeSet;

use super::View;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Database,
    AppName,
    User,
    Client,
    Cpu,
    Mem,
    Read,
    Write,
    Time,
    Duration,
    Wait,
    Relation,
    Type,
    Mode,
    IoWait,
    Xmin,
    State,
}

impl Column {
    /// Display order between PID and the query.
    pub const ALL: &'static [Column] = &[
        Column::Database,
        Column::AppName,
        Column::User,
        Column::Client,
        Column::Xmin,
        Column::Relation,
        Column::Type,
        Column::Mode,
        Column::Cpu,
        Column::Mem,
        Column::Read,
        Column::Write,
        Column::Time,
        Column::Duration,
        Column::Wait,
        Column::IoWait,
        Column::State,
    ];

    /// Name accepted by `--hide`.
    pub fn name(self) -> &'static str {
        match self {
            Column::Database => "database",
            Column::AppName => "appname",
            Column::User => "user",
            Column::Client => "client",
            Column::Cpu => "cpu",
            Column::Mem => "mem",
            Column::Read => "read",
            Column::Write => "write",
            Column::Time => "time",
            Column::Duration => "duration",
            Column::Wait => "wait",
            Column::Relation => "relation",
            Column::Type => "type",
            Column::Mode => "mode",
            Column::IoWait => "iowait",
            Column::Xmin => "xmin",
            Column::State => "state",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(name))
    }

    pub fn header(self) -> &'static str {
        match self {
            Column::Database => "DATABASE",
            Column::AppName => "APP",
            Column::User => "USER",
            Column::Client => "CLIENT",
            Column::Cpu => "CPU%",
            Column::Mem => "MEM%",
            Column::Read => "READ/s",
            Column::Write => "WRITE/s",
            Column::Time => "TIME+",
            Column::Duration => "DURATION",
            Column::Wait => "WAIT",
            Column::Relation => "RELATION",
            Column::Type => "TYPE",
            Column::Mode => "MODE",
            Column::IoWait => "IOW",
            Column::Xmin => "XMIN",
            Column::State => "STATE",
        }
    }

    pub fn width(self) -> u16 {
        match self {
            Column::Database | Column::AppName | Column::User => 16,
            Column::Client => 15,
            Column::Cpu | Column::Mem => 6,
            Column::Read | Column::Write => 9,
            Column::Time | Column::Duration => 10,
            Column::Wait => 12,
            Column::Relation => 16,
            Column::Type => 13,
            Column::Mode => 20,
            Column::IoWait => 3,
            Column::Xmin => 10,
            Column::State => 17,
        }
    }

    /// Host process columns only make sense for running backends, lock
    /// columns only for the lock views.
    pub fn applies_to(self, view: View) -> bool {
        match self {
            Column::Cpu
            | Column::Mem
            | Column::Read
            | Column::Write
            | Column::IoWait
            | Column::Wait
            | Column::Xmin => !view.is_lock_view(),
            Column::Relation | Column::Type | Column::Mode => view.is_lock_view(),
            _ => true,
        }
    }

    /// Columns fed by host process stats.
    pub fn needs_host_stats(self) -> bool {
        matches!(
            self,
            Column::Cpu | Column::Mem | Column::Read | Column::Write | Column::IoWait
        )
    }
}

/// Visible column set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    hidden: BTreeSet<Column>,
}

impl ColumnSet {
    pub fn hide(&mut self, column: Column) {
        self.hidden.insert(column);
    }

    pub fn show(&mut self, column: Column) {
        self.hidden.remove(&column);
    }

    pub fn is_visible(&self, column: Column) -> bool {
        !self.hidden.contains(&column)
    }

    /// Visible columns for a view, in display order.
    pub fn for_view(&self, view: View, host_stats: bool) -> Vec<Column> {
        Column::ALL
            .iter()
            .copied()
            .filter(|c| self.is_visible(*c))
            .filter(|c| c.applies_to(view))
            .filter(|c| host_stats || !c.needs_host_stats())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for column in Column::ALL {
            assert_eq!(Column::from_name(column.name()), Some(*column));
        }
        assert_eq!(Column::from_name("CPU"), Some(Column::Cpu));
        assert_eq!(Column::from_name("pid"), None);
    }

    #[test]
    fn running_view_has_process_columns() {
        let cols = ColumnSet::default().for_view(View::Running, true);
        assert!(cols.contains(&Column::Cpu));
        assert!(cols.contains(&Column::IoWait));
        assert!(!cols.contains(&Column::Relation));
    }

    #[test]
    fn lock_views_have_lock_columns() {
        let cols = ColumnSet::default().for_view(View::Blocking, true);
        assert!(cols.contains(&Column::Relation));
        assert!(cols.contains(&Column::Mode));
        assert!(!cols.contains(&Column::Read));
    }

    #[test]
    fn hidden_and_unavailable_columns_drop_out() {
        let mut set = ColumnSet::default();
        set.hide(Column::Client);
        let cols = set.for_view(View::Running, false);
        assert!(!cols.contains(&Column::Client));
        assert!(!cols.contains(&Column::Cpu));
        assert!(cols.contains(&Column::Time));

        set.show(Column::Client);
        assert!(set.is_visible(Column::Client));
    }
}
