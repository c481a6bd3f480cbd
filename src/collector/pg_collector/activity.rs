//! Process rows from `pg_stat_activity`.

use postgres::Row;

use crate::capability::DurationMode;
use crate::model::{ProcessRow, WaitInfo};

use super::decode::decode_query;
use super::queries::build_activity_query;
use super::{ActivitySource, SourceError};

/// Idle marker used in `current_query` before the `state` column existed.
const IDLE_MARKER: &str = "<IDLE>";

/// Derives a state label from a legacy `current_query` value.
///
/// Returns the state and whether the text is a real query (idle markers are
/// not). Anything that is not a literal idle marker is `active`.
pub fn label_legacy_state(raw: &str) -> (&'static str, bool) {
    match raw {
        "<IDLE>" => ("idle", false),
        "<IDLE> in transaction" => ("idle in transaction", false),
        "<IDLE> in transaction (aborted)" => ("idle in transaction (aborted)", false),
        _ => ("active", true),
    }
}

/// Parallel worker detection; only tiers with `backend_type` can tell.
fn is_parallel_worker(backend_type: Option<&str>, query: Option<&str>) -> bool {
    backend_type == Some("parallel worker") && query.is_some()
}

impl ActivitySource {
    /// Fetches backend rows.
    ///
    /// `min_duration` of `0` disables the duration predicate; `dbname_filter`
    /// is a case-insensitive regular expression on the database name.
    pub fn fetch_processes(
        &mut self,
        min_duration: f64,
        mode: DurationMode,
        dbname_filter: Option<&str>,
    ) -> Result<Vec<ProcessRow>, SourceError> {
        let result = {
            let (client, profile) = self.session()?;
            let query = build_activity_query(profile, mode);
            let has_state = profile.has_state();
            client
                .query(query.as_str(), &[&min_duration, &dbname_filter])
                .map(|rows| {
                    rows.iter()
                        .map(|row| process_from_row(row, has_state))
                        .collect::<Vec<_>>()
                })
        };
        result.map_err(|e| self.fail(&e))
    }
}

fn process_from_row(row: &Row, has_state: bool) -> ProcessRow {
    let encoding: Option<String> = row.try_get("encoding").unwrap_or_default();
    let raw_query: Option<Vec<u8>> = row.try_get("query").unwrap_or_default();
    let mut query = raw_query.map(|bytes| decode_query(&bytes, encoding.as_deref()));

    let state = if has_state {
        row.try_get::<_, Option<String>>("state")
            .unwrap_or_default()
            .unwrap_or_default()
    } else {
        let (state, is_query) = label_legacy_state(query.as_deref().unwrap_or(IDLE_MARKER));
        if !is_query {
            query = None;
        }
        state.to_string()
    };

    let waiting: Option<bool> = row.try_get("waiting").unwrap_or_default();
    let wait_event: Option<String> = row.try_get("wait_event").unwrap_or_default();
    let wait = match (waiting, wait_event) {
        (_, Some(name)) => WaitInfo::Event {
            kind: row.try_get("wait_event_type").unwrap_or_default(),
            name,
        },
        (Some(true), None) => WaitInfo::Waiting,
        _ => WaitInfo::None,
    };

    let backend_type: Option<String> = row.try_get("backend_type").unwrap_or_default();

    ProcessRow {
        pid: row.get("pid"),
        xmin: row.try_get("xmin").unwrap_or_default(),
        database: row.try_get("database").unwrap_or_default(),
        user: row.try_get("usename").unwrap_or_default(),
        client: row.try_get("client").unwrap_or_default(),
        application_name: row.try_get("application_name").unwrap_or_default(),
        is_parallel_worker: is_parallel_worker(backend_type.as_deref(), query.as_deref()),
        query,
        state,
        wait,
        duration: row.try_get("duration").unwrap_or_default(),
        leader_pid: row.try_get("leader_pid").unwrap_or_default(),
        backend_start: row.try_get("backend_start").unwrap_or_default(),
    }
}
