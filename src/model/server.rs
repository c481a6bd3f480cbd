//! Server-wide statistics.

/// Temporary file usage across tablespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TempFileInfo {
    pub files: i64,
    pub bytes: i64,
}

/// Instance-level counters gathered once per refresh.
///
/// `None` marks a metric the server version or the connection's privileges
/// cannot provide.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerStats {
    pub xact_commit: i64,
    pub xact_rollback: i64,
    pub blks_read: i64,
    pub blks_hit: i64,
    pub tup_inserted: i64,
    pub tup_updated: i64,
    pub tup_deleted: i64,
    pub tup_returned: i64,
    pub total_size: Option<i64>,

    pub active_connections: i64,
    pub idle: i64,
    pub idle_in_transaction: i64,
    pub idle_in_transaction_aborted: i64,
    pub waiting: i64,
    pub total_connections: i64,
    pub max_connections: i64,

    pub autovacuum_workers: i64,
    pub autovacuum_max_workers: Option<i64>,
    pub logical_replication_workers: Option<i64>,
    pub max_logical_replication_workers: Option<i64>,
    pub parallel_workers: Option<i64>,
    pub max_parallel_workers: Option<i64>,
    pub max_worker_processes: Option<i64>,
    pub wal_senders: Option<i64>,
    pub wal_receivers: Option<i64>,
    pub replication_slots: Option<i64>,
    pub temp_files: Option<TempFileInfo>,

    /// Seconds since postmaster start.
    pub uptime: f64,
    /// Server clock as a Unix epoch.
    pub epoch: f64,
}

impl ServerStats {
    /// Committed plus rolled back transactions.
    pub fn xact_count(&self) -> i64 {
        self.xact_commit + self.xact_rollback
    }
}
