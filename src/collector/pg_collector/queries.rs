//! SQL query builders for the statistics views.
//!
//! Builders only splice identifiers and expressions taken from the
//! [`ServerProfile`]; user input is always bound as a parameter.

use crate::capability::{DurationMode, ServerProfile, TempFileSource, WaitColumn};

/// Builds the `pg_stat_activity` query.
///
/// Parameters: `$1` minimum duration in seconds (`0` disables the
/// predicate), `$2` dbname regular expression (`NULL` disables filtering).
pub(super) fn build_activity_query(profile: &ServerProfile, mode: DurationMode) -> String {
    let pid = profile.pid_column();
    let query = profile.query_column();
    let duration_column = profile.duration_column(mode);

    let xmin_expr = if profile.has_xmin() {
        "a.backend_xmin::text::bigint"
    } else {
        "NULL::bigint"
    };
    let application_name_expr = if profile.has_application_name() {
        "COALESCE(a.application_name, '')"
    } else {
        "''::text"
    };
    let state_expr = if profile.has_state() {
        "a.state"
    } else {
        "NULL::text"
    };
    let (waiting_expr, wait_event_expr) = match profile.wait_column() {
        WaitColumn::Boolean => ("a.waiting", "NULL::text"),
        WaitColumn::Event => ("NULL::boolean", "a.wait_event"),
    };
    let wait_event_type_expr = if profile.has_wait_event_type() {
        "a.wait_event_type"
    } else {
        "NULL::text"
    };
    let backend_type_expr = if profile.has_backend_type() {
        "a.backend_type"
    } else {
        "NULL::text"
    };
    let leader_pid_expr = if profile.has_leader_pid() {
        "a.leader_pid"
    } else {
        "NULL::integer"
    };
    // Checkpointer, walwriter & co. show up in pg_stat_activity from 10 on.
    let backend_filter = if profile.has_backend_type() {
        "AND a.backend_type IN ('client backend', 'parallel worker', 'autovacuum worker')"
    } else {
        ""
    };

    format!(
        r#"
            SELECT
                a.{pid} AS pid,
                {xmin_expr} AS xmin,
                a.datname::text AS database,
                a.usename::text AS usename,
                a.client_addr::text AS client,
                {application_name_expr} AS application_name,
                textsend(a.{query}) AS query,
                {state_expr} AS state,
                {waiting_expr} AS waiting,
                {wait_event_expr} AS wait_event,
                {wait_event_type_expr} AS wait_event_type,
                EXTRACT(EPOCH FROM (NOW() - a.{duration_column}))::float8 AS duration,
                EXTRACT(EPOCH FROM a.backend_start)::float8 AS backend_start,
                {backend_type_expr} AS backend_type,
                {leader_pid_expr} AS leader_pid,
                pg_encoding_to_char(d.encoding)::text AS encoding
            FROM pg_stat_activity a
            LEFT JOIN pg_database d ON d.oid = a.datid
            WHERE a.{pid} <> pg_backend_pid()
              {backend_filter}
              AND ($2::text IS NULL OR a.datname ~* $2::text)
              AND ($1::float8 = 0
                   OR EXTRACT(EPOCH FROM (NOW() - a.{duration_column})) >= $1::float8)
        "#
    )
}

/// Predicate matching two `pg_locks` rows on the same lockable object.
fn same_lock_object(profile: &ServerProfile, a: &str, b: &str) -> String {
    let mut columns = vec![
        "database",
        "relation",
        "page",
        "tuple",
        "transactionid",
        "classid",
        "objid",
        "objsubid",
    ];
    if profile.has_virtualxid() {
        columns.push("virtualxid");
    }

    let mut predicate = format!("{a}.locktype = {b}.locktype");
    for column in columns {
        predicate.push_str(&format!(
            "\n                  AND {a}.{column} IS NOT DISTINCT FROM {b}.{column}"
        ));
    }
    predicate
}

fn relation_expr(alias: &str) -> String {
    format!("CASE WHEN {alias}.relation IS NULL THEN NULL ELSE {alias}.relation::regclass::text END")
}

/// Builds the query for ungranted lock requests and the pids holding them.
pub(super) fn build_waiting_locks_query(profile: &ServerProfile) -> String {
    let relation = relation_expr("w");
    let holders = if profile.has_blocking_pids() {
        "pg_blocking_pids(w.pid)".to_string()
    } else {
        format!(
            "ARRAY(SELECT DISTINCT h.pid FROM pg_locks h
                  WHERE h.granted AND h.pid <> w.pid
                  AND {})",
            same_lock_object(profile, "h", "w")
        )
    };

    format!(
        r#"
            SELECT
                w.pid AS pid,
                {relation} AS relation,
                w.mode::text AS mode,
                w.locktype::text AS locktype,
                {holders} AS linked
            FROM pg_locks w
            WHERE NOT w.granted
              AND w.pid IS NOT NULL
              AND w.pid <> pg_backend_pid()
        "#
    )
}

/// Builds the query for granted locks that other backends wait for.
pub(super) fn build_blocking_locks_query(profile: &ServerProfile) -> String {
    let relation = relation_expr("h");
    let same = same_lock_object(profile, "h", "w");

    if profile.has_blocking_pids() {
        format!(
            r#"
            SELECT
                h.pid AS pid,
                {relation} AS relation,
                h.mode::text AS mode,
                h.locktype::text AS locktype,
                array_agg(DISTINCT w.pid) AS linked
            FROM pg_locks w
            JOIN pg_locks h
              ON h.granted
              AND h.pid = ANY(pg_blocking_pids(w.pid))
              AND {same}
            WHERE NOT w.granted
            GROUP BY h.pid, h.relation, h.mode, h.locktype
        "#
        )
    } else {
        format!(
            r#"
            SELECT
                h.pid AS pid,
                {relation} AS relation,
                h.mode::text AS mode,
                h.locktype::text AS locktype,
                ARRAY(SELECT DISTINCT w.pid FROM pg_locks w
                      WHERE NOT w.granted AND w.pid <> h.pid
                      AND {same}) AS linked
            FROM pg_locks h
            WHERE h.granted
              AND h.pid IS NOT NULL
              AND EXISTS (SELECT 1 FROM pg_locks w
                          WHERE NOT w.granted AND w.pid <> h.pid
                          AND {same})
        "#
        )
    }
}

/// Builds the server-wide statistics query.
///
/// Parameter: `$1` dbname regular expression (`NULL` disables filtering).
/// With `skip_size` the expensive `pg_database_size` aggregate is replaced
/// by `NULL` and the caller substitutes its cached value.
pub(super) fn build_server_stats_query(profile: &ServerProfile, skip_size: bool) -> String {
    let pid = profile.pid_column();
    let query = profile.query_column();

    let (active, idle, idle_in_xact, idle_in_xact_aborted) = if profile.has_state() {
        (
            "state = 'active'".to_string(),
            "state = 'idle'".to_string(),
            "state = 'idle in transaction'".to_string(),
            "state = 'idle in transaction (aborted)'".to_string(),
        )
    } else {
        (
            format!("{query} NOT LIKE '<IDLE>%'"),
            format!("{query} = '<IDLE>'"),
            format!("{query} = '<IDLE> in transaction'"),
            format!("{query} = '<IDLE> in transaction (aborted)'"),
        )
    };
    let waiting = match profile.wait_column() {
        WaitColumn::Boolean => "waiting",
        WaitColumn::Event => "wait_event_type = 'Lock'",
    };
    let client = if profile.has_backend_type() {
        "backend_type = 'client backend'".to_string()
    } else {
        "true".to_string()
    };
    let autovacuum = if profile.has_backend_type() {
        "backend_type = 'autovacuum worker'".to_string()
    } else {
        format!("{query} LIKE 'autovacuum:%'")
    };
    let count_of = |predicate: &str| {
        format!("COALESCE(sum(CASE WHEN {predicate} THEN 1 ELSE 0 END), 0)::bigint")
    };
    let logical = if profile.has_logical_replication_workers() {
        count_of("backend_type = 'logical replication worker'")
    } else {
        "NULL::bigint".to_string()
    };
    let parallel = if profile.has_parallel_workers() {
        count_of("backend_type = 'parallel worker'")
    } else {
        "NULL::bigint".to_string()
    };

    let tuples = if profile.has_tuple_counters() {
        "COALESCE(sum(tup_inserted), 0)::bigint AS tup_inserted,
                COALESCE(sum(tup_updated), 0)::bigint AS tup_updated,
                COALESCE(sum(tup_deleted), 0)::bigint AS tup_deleted,
                COALESCE(sum(tup_returned), 0)::bigint AS tup_returned"
    } else {
        "0::bigint AS tup_inserted,
                0::bigint AS tup_updated,
                0::bigint AS tup_deleted,
                0::bigint AS tup_returned"
    };

    let size = if skip_size {
        "NULL::bigint".to_string()
    } else {
        let exclude = profile
            .excluded_size_database()
            .map(|db| format!(" AND datname <> '{db}'"))
            .unwrap_or_default();
        format!(
            "(SELECT sum(pg_database_size(datname))::bigint FROM pg_database
              WHERE datallowconn{exclude} AND ($1::text IS NULL OR datname ~* $1::text))"
        )
    };

    let setting = |enabled: bool, name: &str| {
        if enabled {
            format!("current_setting('{name}')::bigint")
        } else {
            "NULL::bigint".to_string()
        }
    };
    let autovacuum_max = setting(profile.has_autovacuum_max_workers(), "autovacuum_max_workers");
    let max_logical = setting(
        profile.has_logical_replication_workers(),
        "max_logical_replication_workers",
    );
    let max_parallel = setting(profile.has_parallel_workers(), "max_parallel_workers");
    let max_worker = setting(profile.has_max_worker_processes(), "max_worker_processes");

    let c_active = count_of(&format!("{client} AND {active}"));
    let c_idle = count_of(&format!("{client} AND {idle}"));
    let c_idle_xact = count_of(&format!("{client} AND {idle_in_xact}"));
    let c_idle_xact_aborted = count_of(&format!("{client} AND {idle_in_xact_aborted}"));
    let c_waiting = count_of(&format!("{client} AND {waiting}"));
    let c_total = count_of(&client);
    let c_autovacuum = count_of(&autovacuum);

    format!(
        r#"
            WITH db AS (
                SELECT
                    COALESCE(sum(xact_commit), 0)::bigint AS xact_commit,
                    COALESCE(sum(xact_rollback), 0)::bigint AS xact_rollback,
                    COALESCE(sum(blks_read), 0)::bigint AS blks_read,
                    COALESCE(sum(blks_hit), 0)::bigint AS blks_hit,
                    {tuples}
                FROM pg_stat_database
                WHERE ($1::text IS NULL OR datname ~* $1::text)
            ),
            act AS (
                SELECT
                    {c_active} AS active_connections,
                    {c_idle} AS idle,
                    {c_idle_xact} AS idle_in_transaction,
                    {c_idle_xact_aborted} AS idle_in_transaction_aborted,
                    {c_waiting} AS waiting,
                    {c_total} AS total_connections,
                    {c_autovacuum} AS autovacuum_workers,
                    {logical} AS logical_replication_workers,
                    {parallel} AS parallel_workers
                FROM pg_stat_activity
                WHERE {pid} <> pg_backend_pid()
            )
            SELECT
                db.*,
                act.*,
                {size} AS total_size,
                current_setting('max_connections')::bigint AS max_connections,
                {autovacuum_max} AS autovacuum_max_workers,
                {max_logical} AS max_logical_replication_workers,
                {max_parallel} AS max_parallel_workers,
                {max_worker} AS max_worker_processes,
                EXTRACT(EPOCH FROM (NOW() - pg_postmaster_start_time()))::float8 AS uptime,
                EXTRACT(EPOCH FROM NOW())::float8 AS epoch
            FROM db, act
        "#
    )
}

/// Builds the temporary-file query, if the server supports one.
pub(super) fn build_temp_files_query(profile: &ServerProfile) -> Option<String> {
    match profile.temp_file_source() {
        TempFileSource::Unavailable => None,
        TempFileSource::LsTmpDir => Some(
            r#"
            SELECT count(*)::bigint AS temp_files,
                   COALESCE(sum(t.size), 0)::bigint AS temp_bytes
            FROM pg_tablespace ts
            CROSS JOIN LATERAL pg_ls_tmpdir(ts.oid) t
            WHERE ts.spcname <> 'pg_global'
        "#
            .to_string(),
        ),
        TempFileSource::ListDir => {
            let ls = if profile.has_ls_dir_missing_ok() {
                "pg_ls_dir('base/pgsql_tmp', true, false)"
            } else {
                "pg_ls_dir('base/pgsql_tmp')"
            };
            Some(format!(
                r#"
            SELECT count(*)::bigint AS temp_files,
                   COALESCE(sum((pg_stat_file('base/pgsql_tmp/' || f)).size), 0)::bigint AS temp_bytes
            FROM {ls} AS f
        "#
            ))
        }
    }
}

pub(super) const WAL_SENDERS_QUERY: &str = "SELECT count(*)::bigint FROM pg_stat_replication";

pub(super) const WAL_RECEIVERS_QUERY: &str = "SELECT count(*)::bigint FROM pg_stat_wal_receiver";

pub(super) const REPLICATION_SLOTS_QUERY: &str =
    "SELECT count(*)::bigint FROM pg_replication_slots";

pub(super) const TEMP_FILES_TIMEOUT: &str = "SET statement_timeout TO '400ms'";

pub(super) const RESET_STATEMENT_TIMEOUT: &str = "RESET statement_timeout";

pub(super) const CANCEL_BACKEND_QUERY: &str = "SELECT pg_cancel_backend($1)";

pub(super) const TERMINATE_BACKEND_QUERY: &str = "SELECT pg_terminate_backend($1)";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::resolve_num;

    fn profile(num: i32) -> ServerProfile {
        resolve_num(num, "", false).unwrap()
    }

    #[test]
    fn activity_query_binds_duration_column() {
        let q = build_activity_query(&profile(150000), DurationMode::Transaction);
        assert!(q.contains("NOW() - a.xact_start"));
        assert!(!q.contains("a.query_start"));
        assert!(q.contains("a.leader_pid"));
        assert!(q.contains("a.backend_type IN"));
    }

    #[test]
    fn legacy_activity_query_uses_old_columns() {
        let q = build_activity_query(&profile(90104), DurationMode::Query);
        assert!(q.contains("a.procpid AS pid"));
        assert!(q.contains("textsend(a.current_query)"));
        assert!(q.contains("NULL::text AS state"));
        assert!(q.contains("a.waiting AS waiting"));
        assert!(q.contains("NULL::integer AS leader_pid"));
        assert!(!q.contains("backend_type IN"));
    }

    #[test]
    fn xmin_only_from_94() {
        assert!(build_activity_query(&profile(90300), DurationMode::Query).contains("NULL::bigint AS xmin"));
        assert!(build_activity_query(&profile(90400), DurationMode::Query).contains("backend_xmin"));
    }

    #[test]
    fn lock_queries_pick_blocking_strategy() {
        assert!(build_waiting_locks_query(&profile(90600)).contains("pg_blocking_pids(w.pid)"));
        assert!(!build_waiting_locks_query(&profile(90500)).contains("pg_blocking_pids"));
        assert!(build_blocking_locks_query(&profile(130000)).contains("array_agg(DISTINCT w.pid)"));
        assert!(build_blocking_locks_query(&profile(90200)).contains("EXISTS"));
        assert!(!build_waiting_locks_query(&profile(80200)).contains("virtualxid"));
    }

    #[test]
    fn size_can_be_skipped_or_restricted() {
        let skipped = build_server_stats_query(&profile(150000), true);
        assert!(skipped.contains("NULL::bigint AS total_size"));
        assert!(!skipped.contains("pg_database_size"));

        let managed = resolve_num(150000, "", true).unwrap();
        let q = build_server_stats_query(&managed, false);
        assert!(q.contains("pg_database_size"));
        assert!(q.contains("datname <> 'rdsadmin'"));
    }

    #[test]
    fn server_stats_query_states_follow_tier() {
        let legacy = build_server_stats_query(&profile(90100), false);
        assert!(legacy.contains("current_query = '<IDLE> in transaction'"));
        assert!(legacy.contains("NULL::bigint AS parallel_workers"));

        let modern = build_server_stats_query(&profile(110000), false);
        assert!(modern.contains("state = 'idle in transaction (aborted)'"));
        assert!(modern.contains("current_setting('max_parallel_workers')"));
    }

    #[test]
    fn temp_files_query_by_version() {
        assert!(build_temp_files_query(&profile(90000)).is_none());
        assert!(build_temp_files_query(&profile(90400)).unwrap().contains("pg_ls_dir('base/pgsql_tmp')"));
        assert!(build_temp_files_query(&profile(90600)).unwrap().contains("true, false"));
        assert!(build_temp_files_query(&profile(120000)).unwrap().contains("pg_ls_tmpdir"));
        assert!(build_temp_files_query(&resolve_num(150000, "", true).unwrap()).is_none());
    }
}
