//! Activity table: filter, sort, paginate and format delta rows.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::fmt::{self, FmtStyle};
use crate::model::LockRow;
use crate::rates::DeltaRow;

use super::common::{ActivityLine, ActivityTable, ColumnHeader, StyleClass, TextCell};
use super::{Column, QueryDisplay, SortKey, View, ViewState};

/// A delta row selected for the active view, with its lock entry in the
/// lock views.
#[derive(Debug, Clone, Copy)]
pub struct ActivityRow<'a> {
    pub delta: &'a DeltaRow,
    pub lock: Option<&'a LockRow>,
}

impl ActivityRow<'_> {
    pub fn pid(&self) -> i32 {
        self.delta.process.pid
    }
}

/// Filters rows for the active view and sorts them by the active key.
///
/// `host_stats` says whether host process columns are filled; sorting on a
/// column that is not shown falls back to DURATION.
pub fn select_rows<'a>(
    rows: &'a [DeltaRow],
    locks: &'a [LockRow],
    state: &ViewState,
    host_stats: bool,
) -> Vec<ActivityRow<'a>> {
    let mut lock_by_pid: HashMap<i32, &LockRow> = HashMap::new();
    for lock in locks {
        let relevant = match state.view {
            View::Running => false,
            View::Waiting => lock.is_waiting(),
            View::Blocking => lock.is_blocking(),
        };
        if relevant {
            lock_by_pid.entry(lock.pid).or_insert(lock);
        }
    }

    let mut selected: Vec<ActivityRow<'a>> = rows
        .iter()
        .filter_map(|delta| {
            let lock = lock_by_pid.get(&delta.process.pid).copied();
            let in_view = match state.view {
                View::Running => {
                    !delta.process.state.is_empty() && !delta.process.is_idle()
                }
                View::Waiting | View::Blocking => lock.is_some(),
            };
            (in_view && passes_filters(delta, state)).then_some(ActivityRow { delta, lock })
        })
        .collect();

    sort_rows(&mut selected, state.effective_sort_key(host_stats));
    selected
}

/// Min-duration and dbname predicates, re-applied after the server did.
fn passes_filters(delta: &DeltaRow, state: &ViewState) -> bool {
    if state.min_duration > 0.0
        && !delta
            .process
            .duration
            .is_some_and(|d| d >= state.min_duration)
    {
        return false;
    }
    match &state.dbname_filter {
        Some(re) => delta
            .process
            .database
            .as_deref()
            .is_some_and(|db| re.is_match(db)),
        None => true,
    }
}

/// Value a row sorts by; `None` sorts below every number.
pub fn sort_value(delta: &DeltaRow, key: SortKey) -> Option<f64> {
    match key {
        SortKey::Cpu => delta.cpu,
        SortKey::Mem => delta.mem,
        SortKey::Read => delta.read,
        SortKey::Write => delta.write,
        SortKey::Time => Some(delta.time_plus),
        SortKey::Duration => delta.process.duration,
    }
}

/// Descending by key, ties by ascending pid.
fn sort_rows(rows: &mut [ActivityRow<'_>], key: SortKey) {
    rows.sort_by(|a, b| {
        let va = sort_value(a.delta, key);
        let vb = sort_value(b.delta, key);
        let by_value = match (va, vb) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_value.then_with(|| a.pid().cmp(&b.pid()))
    });
}

/// Keeps a scroll offset within `[0, max(0, len - page_size)]`.
pub fn clamp_offset(offset: usize, len: usize, page_size: usize) -> usize {
    offset.min(len.saturating_sub(page_size))
}

/// Rows visible at `offset` for a page of `page_size` rows.
pub fn page<T>(rows: &[T], offset: usize, page_size: usize) -> &[T] {
    let start = clamp_offset(offset, rows.len(), page_size);
    let end = (start + page_size).min(rows.len());
    &rows[start..end]
}

// ========== Style classification helpers ==========

fn styled_cpu_class(cpu: Option<f64>) -> StyleClass {
    match cpu {
        Some(c) if c > 80.0 => StyleClass::Critical,
        Some(c) if c > 50.0 => StyleClass::Warning,
        _ => StyleClass::Normal,
    }
}

fn styled_state_class(state: &str) -> StyleClass {
    match state {
        "active" => StyleClass::Active,
        "idle in transaction" | "idle in transaction (aborted)" => StyleClass::Warning,
        "idle" => StyleClass::Dimmed,
        _ => StyleClass::Normal,
    }
}

/// Yellow under three seconds, red from there on.
pub fn styled_duration_class(secs: f64) -> StyleClass {
    if secs < 3.0 {
        StyleClass::Warning
    } else {
        StyleClass::Critical
    }
}

fn styled_mode_class(mode: &str) -> StyleClass {
    match mode {
        "AccessExclusiveLock" | "ExclusiveLock" => StyleClass::Critical,
        "ShareRowExclusiveLock" | "ShareUpdateExclusiveLock" | "RowExclusiveLock" => {
            StyleClass::Warning
        }
        _ => StyleClass::Normal,
    }
}

// ========== Cells ==========

/// Query text as shown for the display mode. Parallel workers are marked
/// under their leader's query.
pub fn query_text(delta: &DeltaRow, display: QueryDisplay) -> String {
    let raw = delta.process.query.as_deref().unwrap_or_default();
    let text = match display {
        QueryDisplay::Full | QueryDisplay::Truncated => fmt::normalize_for_display(raw),
        QueryDisplay::Indented => fmt::indent_query(raw),
    };
    if delta.process.is_parallel_worker {
        format!("\\_ {}", text)
    } else {
        text
    }
}

fn cell(row: &ActivityRow<'_>, column: Column) -> TextCell {
    let delta = row.delta;
    let process = &delta.process;
    let width = column.width() as usize;
    let text = |s: &str| TextCell::plain(fmt::truncate(s, width));

    match column {
        Column::Database => text(process.database.as_deref().unwrap_or_default()),
        Column::AppName => text(&process.application_name),
        Column::User => text(process.user.as_deref().unwrap_or_default()),
        Column::Client => text(process.client.as_deref().unwrap_or("local")),
        Column::Cpu => TextCell::colored(fmt::format_percent(delta.cpu), styled_cpu_class(delta.cpu)),
        Column::Mem => TextCell::plain(fmt::format_percent(delta.mem)),
        Column::Read => TextCell::plain(fmt::format_io_rate(delta.read)),
        Column::Write => TextCell::plain(fmt::format_io_rate(delta.write)),
        Column::Time => TextCell::plain(fmt::format_elapsed(delta.time_plus)),
        Column::Duration => match process.duration {
            Some(secs) => TextCell::colored(fmt::format_elapsed(secs), styled_duration_class(secs)),
            None => TextCell::plain(String::new()),
        },
        Column::Wait => {
            let label = process.wait.label();
            if label.is_empty() {
                TextCell::plain(label)
            } else {
                let style = if process.wait.is_lock_wait() {
                    StyleClass::Critical
                } else {
                    StyleClass::Warning
                };
                TextCell::colored(fmt::truncate(&label, width), style)
            }
        }
        Column::Relation => text(row.lock.and_then(|l| l.relation.as_deref()).unwrap_or_default()),
        Column::Type => text(row.lock.map(|l| l.lock_type.as_str()).unwrap_or_default()),
        Column::Mode => {
            let mode = row.lock.map(|l| l.mode.as_str()).unwrap_or_default();
            TextCell::colored(fmt::truncate(mode, width), styled_mode_class(mode))
        }
        Column::IoWait => match delta.io_wait {
            Some(true) => TextCell::colored("Y".to_string(), StyleClass::Critical),
            Some(false) => TextCell::plain("N".to_string()),
            None => TextCell::plain(String::new()),
        },
        Column::Xmin => TextCell::plain(process.xmin.map(|x| x.to_string()).unwrap_or_default()),
        Column::State => TextCell::colored(
            fmt::short_state(&process.state).to_string(),
            styled_state_class(&process.state),
        ),
    }
}

fn row_style(delta: &DeltaRow) -> StyleClass {
    if delta.process.is_idle() {
        StyleClass::Dimmed
    } else if delta.process.is_parallel_worker {
        StyleClass::Accent
    } else {
        StyleClass::Normal
    }
}

// ========== Build function ==========

/// Builds the activity table for already selected rows.
///
/// `host_stats` says whether host process columns can be filled at all.
pub fn build_activity_view(
    rows: &[ActivityRow<'_>],
    state: &ViewState,
    host_stats: bool,
) -> ActivityTable {
    let columns = state.columns.for_view(state.view, host_stats);
    let sorted = state.effective_sort_key(host_stats).column();

    let mut headers = Vec::with_capacity(columns.len() + 1);
    headers.push(ColumnHeader {
        label: "PID",
        width: 7,
        sorted: false,
    });
    headers.extend(columns.iter().map(|c| ColumnHeader {
        label: c.header(),
        width: c.width(),
        sorted: *c == sorted,
    }));

    let lines = rows
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(columns.len() + 1);
            cells.push(TextCell::plain(row.pid().to_string()));
            cells.extend(columns.iter().map(|c| cell(row, *c)));
            ActivityLine {
                pid: row.pid(),
                cells,
                query: query_text(row.delta, state.query_display),
                class: row_style(row.delta),
            }
        })
        .collect();

    let mut title = format!(
        " {} [{}] duration: {} ",
        state.view.name(),
        rows.len(),
        state.duration_mode.label()
    );
    if state.min_duration > 0.0 {
        title.push_str(&format!("[>= {}s] ", state.min_duration));
    }
    if let Some(pattern) = state.dbname_pattern() {
        title.push_str(&format!("(dbname: {}) ", pattern));
    }

    ActivityTable {
        title,
        columns: headers,
        lines,
    }
}

/// Formatted byte figure for callers outside the table.
pub fn format_size(bytes: Option<i64>) -> String {
    bytes
        .and_then(|b| u64::try_from(b).ok())
        .map(|b| fmt::format_bytes(b, FmtStyle::Detail))
        .unwrap_or_else(|| "N/A".to_string())
}
