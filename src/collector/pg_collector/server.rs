//! Server-wide statistics.

use postgres::error::SqlState;
use postgres::Row;
use tracing::{debug, info};

use crate::model::{ServerStats, TempFileInfo};

use super::queries::{
    REPLICATION_SLOTS_QUERY, RESET_STATEMENT_TIMEOUT, TEMP_FILES_TIMEOUT, WAL_RECEIVERS_QUERY,
    WAL_SENDERS_QUERY, build_server_stats_query, build_temp_files_query,
};
use super::{ActivitySource, SourceError, format_postgres_error};

/// Outcome of a metric that may legitimately be unavailable.
enum Optional<T> {
    Value(T),
    /// Skipped for this refresh.
    Unavailable,
    /// Disabled for the rest of the session.
    Disabled,
}

impl ActivitySource {
    /// Fetches instance-level counters.
    ///
    /// With `skip_size_recompute` the total database size is not recomputed
    /// and `cached_total_size` is reported instead.
    pub fn fetch_server_stats(
        &mut self,
        skip_size_recompute: bool,
        cached_total_size: Option<i64>,
        dbname_filter: Option<&str>,
    ) -> Result<ServerStats, SourceError> {
        let result = {
            let (client, profile) = self.session()?;
            let query = build_server_stats_query(profile, skip_size_recompute);
            client.query_one(query.as_str(), &[&dbname_filter])
        };
        let row = result.map_err(|e| self.fail(&e))?;

        let mut stats = stats_from_row(&row);
        if skip_size_recompute {
            stats.total_size = cached_total_size;
        }

        let (wal_senders, wal_receivers, replication_slots) = match self.profile.as_ref() {
            Some(p) => (
                p.has_wal_senders(),
                p.has_wal_receivers(),
                p.has_replication_slot_count(),
            ),
            None => (false, false, false),
        };

        if wal_senders {
            stats.wal_senders = self.optional_count(WAL_SENDERS_QUERY)?;
        }
        if wal_receivers && !self.options().skip_walreceiver && !self.failed.wal_receivers {
            stats.wal_receivers = match self.optional_query(WAL_RECEIVERS_QUERY, false, |row| {
                row.get::<_, i64>(0)
            })? {
                Optional::Value(count) => Some(count),
                Optional::Unavailable => None,
                Optional::Disabled => {
                    self.failed.wal_receivers = true;
                    info!("WAL receiver information is not available on this platform, metric disabled");
                    None
                }
            };
        }
        if replication_slots {
            stats.replication_slots = self.optional_count(REPLICATION_SLOTS_QUERY)?;
        }
        stats.temp_files = self.fetch_temp_files()?;

        Ok(stats)
    }

    /// Temporary files under a short statement timeout. A privilege error or
    /// a timeout disables the metric for the session.
    fn fetch_temp_files(&mut self) -> Result<Option<TempFileInfo>, SourceError> {
        if self.options().skip_tempfiles || self.failed.temp_files {
            return Ok(None);
        }
        let Some(query) = self.profile.as_ref().and_then(build_temp_files_query) else {
            return Ok(None);
        };

        self.execute(TEMP_FILES_TIMEOUT)?;
        let outcome = self.optional_query(&query, true, |row| TempFileInfo {
            files: row.get("temp_files"),
            bytes: row.get("temp_bytes"),
        });
        self.execute(RESET_STATEMENT_TIMEOUT)?;

        Ok(match outcome? {
            Optional::Value(info) => Some(info),
            Optional::Unavailable => None,
            Optional::Disabled => {
                self.failed.temp_files = true;
                info!("temporary file statistics unavailable (privilege or timeout), metric disabled");
                None
            }
        })
    }

    fn optional_count(&mut self, query: &str) -> Result<Option<i64>, SourceError> {
        Ok(match self.optional_query(query, false, |row| row.get::<_, i64>(0))? {
            Optional::Value(count) => Some(count),
            Optional::Unavailable | Optional::Disabled => None,
        })
    }

    /// Runs a single-row query whose failure must not fail the refresh.
    ///
    /// Connection loss still propagates. `timeout_disables` treats a
    /// statement timeout like a privilege error.
    fn optional_query<T>(
        &mut self,
        query: &str,
        timeout_disables: bool,
        map: impl FnOnce(&Row) -> T,
    ) -> Result<Optional<T>, SourceError> {
        let result = {
            let (client, _) = self.session()?;
            client.query_one(query, &[])
        };
        match result {
            Ok(row) => Ok(Optional::Value(map(&row))),
            Err(e) => match e.code() {
                Some(code)
                    if *code == SqlState::INSUFFICIENT_PRIVILEGE
                        || *code == SqlState::FEATURE_NOT_SUPPORTED
                        || (timeout_disables && *code == SqlState::QUERY_CANCELED) =>
                {
                    Ok(Optional::Disabled)
                }
                Some(_) => {
                    debug!(error = %format_postgres_error(&e), "optional metric unavailable");
                    Ok(Optional::Unavailable)
                }
                None => match self.fail(&e) {
                    err @ SourceError::ConnectionLost(_) => Err(err),
                    err => {
                        debug!(error = %err, "optional metric unreadable");
                        Ok(Optional::Unavailable)
                    }
                },
            },
        }
    }

    fn execute(&mut self, statement: &str) -> Result<(), SourceError> {
        let result = {
            let (client, _) = self.session()?;
            client.batch_execute(statement)
        };
        result.map_err(|e| self.fail(&e))
    }
}

fn stats_from_row(row: &Row) -> ServerStats {
    ServerStats {
        xact_commit: row.get("xact_commit"),
        xact_rollback: row.get("xact_rollback"),
        blks_read: row.get("blks_read"),
        blks_hit: row.get("blks_hit"),
        tup_inserted: row.get("tup_inserted"),
        tup_updated: row.get("tup_updated"),
        tup_deleted: row.get("tup_deleted"),
        tup_returned: row.get("tup_returned"),
        total_size: row.try_get("total_size").unwrap_or_default(),
        active_connections: row.get("active_connections"),
        idle: row.get("idle"),
        idle_in_transaction: row.get("idle_in_transaction"),
        idle_in_transaction_aborted: row.get("idle_in_transaction_aborted"),
        waiting: row.get("waiting"),
        total_connections: row.get("total_connections"),
        max_connections: row.get("max_connections"),
        autovacuum_workers: row.get("autovacuum_workers"),
        autovacuum_max_workers: row.try_get("autovacuum_max_workers").unwrap_or_default(),
        logical_replication_workers: row
            .try_get("logical_replication_workers")
            .unwrap_or_default(),
        max_logical_replication_workers: row
            .try_get("max_logical_replication_workers")
            .unwrap_or_default(),
        parallel_workers: row.try_get("parallel_workers").unwrap_or_default(),
        max_parallel_workers: row.try_get("max_parallel_workers").unwrap_or_default(),
        max_worker_processes: row.try_get("max_worker_processes").unwrap_or_default(),
        wal_senders: None,
        wal_receivers: None,
        replication_slots: None,
        temp_files: None,
        uptime: row.try_get("uptime").unwrap_or_default(),
        epoch: row.try_get("epoch").unwrap_or_default(),
    }
}
