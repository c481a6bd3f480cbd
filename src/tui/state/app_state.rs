//! Main application state and the refresh cycle.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::collector::{LockScope, SourceError};
use crate::config::{Config, HeaderSections};
use crate::export::CsvExporter;
use crate::model::{LockRow, Snapshot};
use crate::provider::{FetchRequest, SnapshotSource};
use crate::rates::{DeltaEngine, DeltaRow, ServerRates};
use crate::scheduler::{Due, Scheduler};
use crate::tui::navigable::TableCursor;
use crate::view::{ActivityRow, View, ViewState, select_rows};

use super::{ControlAction, Mode, Selection};

/// Dashboard state threaded through refresh, delta, view model and render.
pub struct AppState {
    /// Active view, sort and display parameters.
    pub view: ViewState,
    pub scheduler: Scheduler,
    pub mode: Mode,
    /// Tagged pids for batch actions.
    pub selection: Selection,
    /// Cursor and scroll offset of the activity table.
    pub table: TableCursor,
    /// Header sections currently shown.
    pub header: HeaderSections,
    /// Snapshot before `current`, kept for server rates.
    pub previous: Option<Snapshot>,
    /// Latest good snapshot; stays displayed while reconnecting.
    pub current: Option<Snapshot>,
    /// Delta rows of `current`.
    pub rows: Vec<DeltaRow>,
    pub server_rates: Option<ServerRates>,
    deltas: DeltaEngine,
    /// Whether host process columns can be filled.
    pub host_stats: bool,
    /// Where the dashboard is connected, for the header.
    pub target: String,
    /// Version label of the connected server.
    pub server_version: Option<String>,
    /// Transient message shown in the footer until the next key.
    pub status_message: Option<String>,
    /// Last reconnect failure, shown while reconnecting.
    pub reconnect_error: Option<String>,
    /// `current` predates a connection loss.
    pub stale: bool,
    exporter: Option<CsvExporter>,
}

impl AppState {
    pub fn new(config: &Config, target: String) -> Self {
        Self {
            view: ViewState {
                duration_mode: config.duration_mode,
                query_display: config.query_display,
                columns: config.columns.clone(),
                min_duration: config.min_duration,
                dbname_filter: config.dbname_filter.clone(),
                ..ViewState::default()
            },
            scheduler: Scheduler::new(config.refresh, config.skip_db_size),
            mode: Mode::default(),
            selection: Selection::default(),
            table: TableCursor::default(),
            header: config.header,
            previous: None,
            current: None,
            rows: Vec::new(),
            server_rates: None,
            deltas: DeltaEngine::new(),
            host_stats: false,
            target,
            server_version: None,
            status_message: None,
            reconnect_error: None,
            stale: false,
            exporter: None,
        }
    }

    /// Appends every refreshed view to `exporter`.
    pub fn with_exporter(mut self, exporter: CsvExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Adopts the profile and host access of a freshly connected source.
    pub fn connected(&mut self, source: &dyn SnapshotSource) {
        self.server_version = source.profile().map(|p| p.version().to_string());
        self.host_stats = source.has_host_stats();
    }

    /// Lock rows of the current snapshot.
    pub fn locks(&self) -> &[LockRow] {
        self.current
            .as_ref()
            .map(|s| s.locks.as_slice())
            .unwrap_or_default()
    }

    /// Rows of the active view, filtered and sorted.
    pub fn visible_rows(&self) -> Vec<ActivityRow<'_>> {
        select_rows(&self.rows, self.locks(), &self.view, self.host_stats)
    }

    pub fn visible_pids(&self) -> Vec<i32> {
        self.visible_rows().iter().map(ActivityRow::pid).collect()
    }

    /// Clamps cursor and scroll to the rows now visible.
    pub fn resolve_cursor(&mut self) {
        let pids = self.visible_pids();
        self.table.resolve(&pids);
    }

    /// Pid under the cursor while navigating.
    pub fn focused_pid(&self) -> Option<i32> {
        if self.mode.is_navigation() {
            self.table.focused()
        } else {
            None
        }
    }

    /// Pids a control action applies to: the tagged set when non-empty,
    /// otherwise the focused row.
    pub fn action_targets(&self) -> Vec<i32> {
        if self.selection.is_empty() {
            self.focused_pid().into_iter().collect()
        } else {
            self.selection.pids()
        }
    }

    /// Switches the active view; lock views need a fresh fetch.
    pub fn set_view(&mut self, view: View) {
        if self.view.view != view {
            self.view.view = view;
            self.scheduler.request_refresh();
            self.resolve_cursor();
        }
    }

    /// Runs whatever the scheduler says is due at `now`.
    pub fn tick(&mut self, source: &mut dyn SnapshotSource, now: Instant) {
        match self.scheduler.poll(now) {
            Due::Idle => {}
            Due::Fetch => self.refresh(source, now),
            Due::Reconnect => self.reconnect(source, now),
        }
    }

    fn lock_scope(&self) -> Option<LockScope> {
        match self.view.view {
            View::Running => None,
            View::Waiting => Some(LockScope::WaitingOnly),
            View::Blocking => Some(LockScope::BlockingGraph),
        }
    }

    fn refresh(&mut self, source: &mut dyn SnapshotSource, now: Instant) {
        let skip_size = self.scheduler.skip_size(now);
        let request = FetchRequest {
            min_duration: self.view.min_duration,
            duration_mode: self.view.duration_mode,
            dbname_filter: self.view.dbname_pattern(),
            locks: self.lock_scope(),
            skip_size,
        };

        match source.fetch(&request) {
            Ok(snapshot) => {
                self.apply(snapshot);
                self.scheduler.fetched(now, !skip_size);
            }
            Err(SourceError::ConnectionLost(msg)) => {
                warn!(error = %msg, "connection lost");
                self.scheduler.connection_lost(now);
                self.stale = true;
                self.reconnect_error = Some(msg);
            }
            Err(e) => {
                warn!(error = %e, "refresh failed");
                self.status_message = Some(e.to_string());
                self.scheduler.fetched(now, false);
            }
        }
    }

    /// Installs a new snapshot and derives everything shown from it.
    fn apply(&mut self, snapshot: Snapshot) {
        if self.stale {
            self.deltas.reset();
            self.current = None;
        }
        self.rows = self.deltas.compute(self.current.as_ref(), &snapshot);
        self.server_rates = self
            .current
            .as_ref()
            .and_then(|prev| ServerRates::compute(prev, &snapshot));

        let dropped = self.selection.retain_present(&snapshot.pids());
        if dropped > 0 {
            debug!(dropped, "untagged vanished pids");
        }
        self.previous = self.current.replace(snapshot);
        self.stale = false;
        self.reconnect_error = None;

        self.export();
        self.resolve_cursor();
    }

    fn export(&mut self) {
        let (Some(exporter), Some(current)) = (self.exporter.as_mut(), self.current.as_ref())
        else {
            return;
        };
        let rows = select_rows(&self.rows, &current.locks, &self.view, self.host_stats);
        if let Err(e) = exporter.write_snapshot(current.collected_at, &rows) {
            warn!(path = %exporter.path().display(), error = %e, "CSV export failed");
            self.status_message = Some(e.to_string());
        }
    }

    fn reconnect(&mut self, source: &mut dyn SnapshotSource, now: Instant) {
        match source.reconnect() {
            Ok(()) => {
                let previous_version = self.server_version.take();
                self.connected(source);
                info!(
                    version = self.server_version.as_deref().unwrap_or("unknown"),
                    "reconnected"
                );
                if self.server_version != previous_version {
                    self.status_message = Some(format!(
                        "reconnected to PostgreSQL {}",
                        self.server_version.as_deref().unwrap_or("?")
                    ));
                }
                self.scheduler.reconnected();
            }
            Err(e) => {
                self.scheduler.reconnect_failed(now);
                debug!(
                    attempt = self.scheduler.reconnect_attempt().unwrap_or(0),
                    error = %e,
                    "reconnect failed"
                );
                self.reconnect_error = Some(e.to_string());
            }
        }
    }

    /// Applies `action` to every pid independently and summarizes the
    /// outcome in the status line.
    pub fn run_action(
        &mut self,
        source: &mut dyn SnapshotSource,
        action: ControlAction,
        pids: &[i32],
    ) {
        let mut failures = Vec::new();
        for &pid in pids {
            let result = match action {
                ControlAction::Cancel => source.cancel_backend(pid),
                ControlAction::Terminate => source.terminate_backend(pid),
            };
            if let Err(e) = result {
                failures.push(e.to_string());
            }
        }

        let done = pids.len() - failures.len();
        let mut message = format!(
            "{} {} of {} backend{}",
            action.past_tense(),
            done,
            pids.len(),
            if pids.len() == 1 { "" } else { "s" }
        );
        if !failures.is_empty() {
            message.push_str(": ");
            message.push_str(&failures.join(", "));
        }
        self.status_message = Some(message);
        self.selection.clear();
        self.scheduler.request_refresh();
    }

    /// Footer banner while the connection is down.
    pub fn reconnect_banner(&self) -> Option<String> {
        if !self.scheduler.is_reconnecting() {
            return None;
        }
        let attempt = self.scheduler.reconnect_attempt().unwrap_or(0);
        let reason = self.reconnect_error.as_deref().unwrap_or("connection lost");
        Some(if attempt == 0 {
            format!("Connection lost ({}), reconnecting...", reason)
        } else {
            format!(
                "Connection lost ({}), reconnect attempt {} failed, retrying...",
                reason, attempt
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability;
    use crate::model::{LockLink, ProcessRow, ServerStats};
    use crate::provider::{RecordedAction, ScriptedSource};
    use chrono::{DateTime, TimeZone, Utc};
    use std::time::Duration;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn process(pid: i32, state: &str) -> ProcessRow {
        ProcessRow {
            pid,
            state: state.to_string(),
            database: Some("app".to_string()),
            duration: Some(1.0),
            query: Some("SELECT 1".to_string()),
            ..ProcessRow::default()
        }
    }

    fn snapshot(secs: i64, pids: &[i32]) -> Snapshot {
        Snapshot::new(
            at(secs),
            ServerStats::default(),
            pids.iter().map(|&p| process(p, "active")).collect(),
            Vec::new(),
        )
    }

    fn source(version: i32) -> ScriptedSource {
        let profile = capability::resolve_num(version, "", false).unwrap();
        ScriptedSource::new(profile)
    }

    fn state(source: &ScriptedSource) -> AppState {
        let mut state = AppState::new(&Config::default(), "localhost:5432".to_string());
        state.connected(source);
        state.table.page_size = 10;
        state
    }

    #[test]
    fn first_tick_fetches_running_view_without_locks() {
        let mut src = source(160000);
        src.push_snapshot(snapshot(0, &[3, 1, 2]));
        let mut st = state(&src);

        st.tick(&mut src, Instant::now());
        assert_eq!(st.rows.len(), 3);
        assert_eq!(st.visible_pids(), vec![1, 2, 3]);
        assert_eq!(src.requests[0].locks, None);
        assert!(!src.requests[0].skip_size);
        assert_eq!(st.server_version.as_deref(), Some("16.0"));
    }

    #[test]
    fn lock_views_request_their_scope() {
        let mut src = source(160000);
        let mut snap = snapshot(0, &[1, 2]);
        snap.locks = vec![LockRow {
            pid: 2,
            relation: Some("t".to_string()),
            mode: "ExclusiveLock".to_string(),
            lock_type: "relation".to_string(),
            link: LockLink::WaitingOn(vec![1]),
        }];
        src.push_snapshot(snapshot(0, &[1, 2]));
        src.push_snapshot(snap);
        let mut st = state(&src);
        let t0 = Instant::now();

        st.tick(&mut src, t0);
        st.set_view(View::Waiting);
        st.tick(&mut src, t0 + Duration::from_millis(5));
        assert_eq!(src.requests[1].locks, Some(LockScope::WaitingOnly));
        assert_eq!(st.visible_pids(), vec![2]);
    }

    #[test]
    fn selection_pruned_after_refresh() {
        let mut src = source(160000);
        src.push_snapshot(snapshot(0, &[1, 2, 3]));
        src.push_snapshot(snapshot(2, &[1, 3]));
        let mut st = state(&src);
        let t0 = Instant::now();

        st.tick(&mut src, t0);
        st.selection.toggle(2);
        st.selection.toggle(3);
        st.tick(&mut src, t0 + Duration::from_secs(2));

        let present = st.current.as_ref().unwrap().pids();
        assert!(st.selection.pids().iter().all(|p| present.contains(p)));
        assert_eq!(st.selection.pids(), vec![3]);
    }

    #[test]
    fn tagged_set_wins_over_focused_row() {
        let mut src = source(160000);
        src.push_snapshot(snapshot(0, &[1, 2, 3]));
        let mut st = state(&src);
        st.tick(&mut src, Instant::now());

        st.mode = Mode::Navigation;
        st.resolve_cursor();
        assert_eq!(st.action_targets(), vec![1]);

        st.selection.toggle(3);
        st.selection.toggle(2);
        assert_eq!(st.action_targets(), vec![2, 3]);

        st.mode = Mode::Browsing;
        st.selection.clear();
        assert!(st.action_targets().is_empty());
    }

    #[test]
    fn batch_failure_does_not_stop_remaining_pids() {
        let mut src = source(160000);
        src.failing_pids.insert(2);
        let mut st = state(&src);

        st.run_action(&mut src, ControlAction::Terminate, &[1, 2, 3]);
        assert_eq!(
            src.actions,
            vec![
                RecordedAction::Terminate(1),
                RecordedAction::Terminate(2),
                RecordedAction::Terminate(3),
            ]
        );
        let status = st.status_message.clone().unwrap();
        assert!(status.starts_with("terminated 2 of 3 backends"));
        assert!(status.contains("pid 2: no such backend"));
    }

    #[test]
    fn connection_loss_keeps_stale_snapshot_and_reconnect_adopts_new_version() {
        let mut src = source(90600);
        src.push_snapshot(snapshot(0, &[1]));
        src.push_error(SourceError::ConnectionLost("server closed".to_string()));
        src.push_reconnect(Err(SourceError::ConnectionLost("refused".to_string())));
        src.push_reconnect(Ok(capability::resolve_num(150004, "", false).unwrap()));
        src.push_snapshot(snapshot(30, &[7]));
        let mut st = state(&src);
        let t0 = Instant::now();

        st.tick(&mut src, t0);
        assert_eq!(st.server_version.as_deref(), Some("9.6.0"));

        let t1 = t0 + Duration::from_secs(2);
        st.tick(&mut src, t1);
        assert!(st.stale);
        assert!(st.scheduler.is_reconnecting());
        assert_eq!(st.visible_pids(), vec![1]);
        assert!(st.reconnect_banner().unwrap().contains("server closed"));

        st.tick(&mut src, t1 + Duration::from_secs(1));
        assert_eq!(st.scheduler.reconnect_attempt(), Some(1));
        assert!(st.reconnect_banner().unwrap().contains("refused"));

        st.tick(&mut src, t1 + Duration::from_secs(10));
        assert!(!st.scheduler.is_reconnecting());
        assert_eq!(st.server_version.as_deref(), Some("15.4"));

        st.tick(&mut src, t1 + Duration::from_secs(10));
        assert!(!st.stale);
        assert_eq!(st.visible_pids(), vec![7]);
        assert!(st.previous.is_none());
        assert!(st.reconnect_banner().is_none());
    }

    #[test]
    fn query_errors_surface_as_status() {
        let mut src = source(160000);
        src.push_error(SourceError::Query("syntax error".to_string()));
        let mut st = state(&src);
        let t0 = Instant::now();
        st.tick(&mut src, t0);
        assert!(st.status_message.as_deref().unwrap().contains("syntax error"));
        assert!(!st.scheduler.is_reconnecting());
        assert_eq!(st.scheduler.poll(t0), Due::Idle);
    }

    #[test]
    fn export_writes_visible_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.csv");
        let mut src = source(160000);
        let mut snap = snapshot(0, &[1]);
        snap.processes.push(process(2, "idle"));
        src.push_snapshot(snap);
        let mut st = state(&src).with_exporter(CsvExporter::open(&path).unwrap());

        st.tick(&mut src, Instant::now());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.lines().nth(1).unwrap().contains(";\"1\";"));
    }
}
