//! Point-in-time capture of one refresh cycle.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::{HostProcessStats, LockRow, ProcessRow, ServerStats, SystemInfo};

/// Consistent result of one fetch cycle.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub collected_at: DateTime<Utc>,
    pub server: ServerStats,
    pub processes: Vec<ProcessRow>,
    pub locks: Vec<LockRow>,
    /// Host samples keyed by pid; empty when host stats are unavailable.
    pub host: HashMap<i32, HostProcessStats>,
    pub system: Option<SystemInfo>,
}

impl Snapshot {
    /// Builds a snapshot, keeping only the first row seen for each pid.
    pub fn new(
        collected_at: DateTime<Utc>,
        server: ServerStats,
        processes: Vec<ProcessRow>,
        locks: Vec<LockRow>,
    ) -> Self {
        let mut seen = HashSet::with_capacity(processes.len());
        let processes = processes
            .into_iter()
            .filter(|row| seen.insert(row.pid))
            .collect();

        Self {
            collected_at,
            server,
            processes,
            locks,
            host: HashMap::new(),
            system: None,
        }
    }

    pub fn pids(&self) -> HashSet<i32> {
        self.processes.iter().map(|p| p.pid).collect()
    }

    /// Seconds elapsed since `earlier`, saturating at zero.
    pub fn elapsed_since(&self, earlier: &Snapshot) -> f64 {
        let ms = (self.collected_at - earlier.collected_at).num_milliseconds();
        if ms > 0 { ms as f64 / 1000.0 } else { 0.0 }
    }
}
