//! Live snapshot source: the server connection plus local host stats.

use chrono::Utc;
use tracing::debug;

use crate::capability::ServerProfile;
use crate::collector::{ActionError, ActivitySource, HostStatsProvider, SourceError};
use crate::model::Snapshot;

use super::{FetchRequest, SnapshotSource};

/// Collects snapshots from a live server.
///
/// Host stats come from `host` only while the server runs on this machine
/// and its files are visible; otherwise the snapshot carries none.
pub struct LiveSource<H: HostStatsProvider> {
    source: ActivitySource,
    host: H,
    /// Last computed total database size, reused between recomputes.
    cached_size: Option<i64>,
}

impl<H: HostStatsProvider> LiveSource<H> {
    /// Wraps a source; call [`SnapshotSource::reconnect`] to connect.
    pub fn new(source: ActivitySource, host: H) -> Self {
        Self {
            source,
            host,
            cached_size: None,
        }
    }

    fn sample_host(&self, snapshot: &mut Snapshot) {
        for process in &snapshot.processes {
            if let Some(stats) = self.host.process(process.pid) {
                snapshot.host.insert(process.pid, stats);
            }
        }
        snapshot.system = self.host.system();
        debug!(
            sampled = snapshot.host.len(),
            backends = snapshot.processes.len(),
            "host stats"
        );
    }
}

impl<H: HostStatsProvider> SnapshotSource for LiveSource<H> {
    fn profile(&self) -> Option<&ServerProfile> {
        self.source.profile()
    }

    fn has_host_stats(&self) -> bool {
        self.source.has_local_access()
    }

    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<Snapshot, SourceError> {
        let server = self.source.fetch_server_stats(
            request.skip_size,
            self.cached_size,
            request.dbname_filter,
        )?;
        let processes = self.source.fetch_processes(
            request.min_duration,
            request.duration_mode,
            request.dbname_filter,
        )?;
        let locks = match request.locks {
            Some(scope) => self.source.fetch_locks(scope)?,
            None => Vec::new(),
        };

        if !request.skip_size {
            self.cached_size = server.total_size;
        }

        let mut snapshot = Snapshot::new(Utc::now(), server, processes, locks);
        if self.has_host_stats() {
            self.sample_host(&mut snapshot);
        }
        Ok(snapshot)
    }

    fn reconnect(&mut self) -> Result<(), SourceError> {
        self.source.connect().map(|_| ())
    }

    fn cancel_backend(&mut self, pid: i32) -> Result<(), ActionError> {
        self.source.cancel_backend(pid)
    }

    fn terminate_backend(&mut self, pid: i32) -> Result<(), ActionError> {
        self.source.terminate_backend(pid)
    }
}
