//! Delta engine: per-backend rates and accumulated time from two snapshots.
//!
//! Rates need two consecutive observations of the same backend identity.
//! The identity is the pid plus its start evidence (backend start epoch from
//! the server, process start time from the host); a change in either for the
//! same pid means the pid was reused and the backend is treated as new.

use std::collections::HashMap;

use crate::collector::procfs::CLK_TCK;
use crate::model::{HostProcessStats, ProcessRow, Snapshot};

/// Compute i64 delta, returning `None` on counter regression (stats reset).
pub fn di64(curr: i64, prev: i64) -> Option<i64> {
    (curr >= prev).then_some(curr - prev)
}

/// Compute u64 delta; a counter that went backwards reads as zero.
pub fn du64(curr: u64, prev: u64) -> u64 {
    curr.saturating_sub(prev)
}

/// A process row with derived metrics.
///
/// Rate fields are `None` until the backend was seen in two consecutive
/// snapshots, or when host stats are unavailable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeltaRow {
    pub process: ProcessRow,
    /// CPU usage in percent of one core.
    pub cpu: Option<f64>,
    /// Resident memory in percent of host memory.
    pub mem: Option<f64>,
    /// Bytes read per second.
    pub read: Option<f64>,
    /// Bytes written per second.
    pub write: Option<f64>,
    /// Seconds this backend identity has been continuously observed.
    pub time_plus: f64,
    pub io_wait: Option<bool>,
}

impl DeltaRow {
    pub fn pid(&self) -> i32 {
        self.process.pid
    }
}

#[derive(Debug, Clone, Copy)]
struct Tracked {
    time_plus: f64,
}

/// Holds the TIME+ accumulators between ticks.
#[derive(Debug, Default)]
pub struct DeltaEngine {
    tracked: HashMap<i32, Tracked>,
}

impl DeltaEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets accumulated time, e.g. after the retained snapshots are dropped.
    pub fn reset(&mut self) {
        self.tracked.clear();
    }

    /// Derives one row per process of `current`.
    ///
    /// Pids absent from `current` are dropped; pids new in `current` (or
    /// reused since `previous`) start with blank rates and zero TIME+.
    pub fn compute(&mut self, previous: Option<&Snapshot>, current: &Snapshot) -> Vec<DeltaRow> {
        let elapsed = previous.map_or(0.0, |prev| current.elapsed_since(prev));
        let prev_rows: HashMap<i32, &ProcessRow> = previous
            .map(|prev| prev.processes.iter().map(|p| (p.pid, p)).collect())
            .unwrap_or_default();
        let mem_total = current.system.map(|s| s.mem_total).filter(|&t| t > 0);

        let mut tracked = HashMap::with_capacity(current.processes.len());
        let rows = current
            .processes
            .iter()
            .map(|process| {
                let pid = process.pid;
                let host = current.host.get(&pid);
                let prev_host = previous.and_then(|prev| prev.host.get(&pid));
                let continued = prev_rows
                    .get(&pid)
                    .is_some_and(|prev| same_backend(prev, process, prev_host, host));

                let time_plus = if continued {
                    self.tracked.get(&pid).map_or(0.0, |t| t.time_plus) + elapsed
                } else {
                    0.0
                };
                tracked.insert(pid, Tracked { time_plus });

                let mut row = DeltaRow {
                    process: process.clone(),
                    time_plus,
                    io_wait: host.and_then(|h| h.io_wait),
                    ..DeltaRow::default()
                };
                if continued && elapsed > 0.0 {
                    if let (Some(prev), Some(curr)) = (prev_host, host) {
                        fill_rates(&mut row, prev, curr, elapsed, mem_total);
                    }
                }
                row
            })
            .collect();

        self.tracked = tracked;
        rows
    }
}

/// True unless start evidence shows the pid now belongs to another backend.
fn same_backend(
    prev: &ProcessRow,
    curr: &ProcessRow,
    prev_host: Option<&HostProcessStats>,
    curr_host: Option<&HostProcessStats>,
) -> bool {
    if let (Some(a), Some(b)) = (prev.backend_start, curr.backend_start) {
        if a != b {
            return false;
        }
    }
    if let (Some(a), Some(b)) = (prev_host, curr_host) {
        if a.start_time != b.start_time {
            return false;
        }
    }
    true
}

fn fill_rates(
    row: &mut DeltaRow,
    prev: &HostProcessStats,
    curr: &HostProcessStats,
    elapsed: f64,
    mem_total: Option<u64>,
) {
    let per_second = |c: Option<u64>, p: Option<u64>| match (c, p) {
        (Some(c), Some(p)) => Some(du64(c, p) as f64 / elapsed),
        _ => None,
    };

    row.cpu = per_second(curr.cpu_ticks, prev.cpu_ticks).map(|ticks| ticks / CLK_TCK * 100.0);
    row.read = per_second(curr.read_bytes, prev.read_bytes);
    row.write = per_second(curr.write_bytes, prev.write_bytes);
    row.mem = match (curr.rss_bytes, mem_total) {
        (Some(rss), Some(total)) => Some(rss as f64 * 100.0 / total as f64),
        _ => None,
    };
}

/// `part` in percent of `part + rest`; `None` on no activity or a counter
/// reset.
fn ratio(part: Option<i64>, rest: Option<i64>) -> Option<f64> {
    let (part, rest) = (part?, rest?);
    let total = part + rest;
    (total > 0).then(|| part as f64 * 100.0 / total as f64)
}

/// Instance-level rates between two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ServerRates {
    pub tps: f64,
    pub inserts: f64,
    pub updates: f64,
    pub deletes: f64,
    pub returned: f64,
    pub blks_read: f64,
    /// Database size growth in bytes per second; `None` without two sizes.
    pub size_growth: Option<f64>,
    /// Buffer cache hits in percent of block accesses during the interval.
    pub cache_hit_ratio: Option<f64>,
    /// Rolled back transactions in percent of those ended during the interval.
    pub rollback_ratio: Option<f64>,
}

impl ServerRates {
    /// `None` when no time passed between the snapshots.
    pub fn compute(previous: &Snapshot, current: &Snapshot) -> Option<Self> {
        let dt = current.elapsed_since(previous);
        if dt <= 0.0 {
            return None;
        }
        let (p, c) = (&previous.server, &current.server);
        let rate = |curr: i64, prev: i64| di64(curr, prev).map_or(0.0, |d| d as f64 / dt);

        Some(Self {
            tps: rate(c.xact_count(), p.xact_count()),
            inserts: rate(c.tup_inserted, p.tup_inserted),
            updates: rate(c.tup_updated, p.tup_updated),
            deletes: rate(c.tup_deleted, p.tup_deleted),
            returned: rate(c.tup_returned, p.tup_returned),
            blks_read: rate(c.blks_read, p.blks_read),
            size_growth: match (c.total_size, p.total_size) {
                (Some(c), Some(p)) => Some((c - p) as f64 / dt),
                _ => None,
            },
            cache_hit_ratio: ratio(
                di64(c.blks_hit, p.blks_hit),
                di64(c.blks_read, p.blks_read),
            ),
            rollback_ratio: ratio(
                di64(c.xact_rollback, p.xact_rollback),
                di64(c.xact_commit, p.xact_commit),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ServerStats, SystemInfo};
    use chrono::{TimeZone, Utc};

    fn process(pid: i32, backend_start: f64) -> ProcessRow {
        ProcessRow {
            pid,
            backend_start: Some(backend_start),
            state: "active".to_string(),
            ..ProcessRow::default()
        }
    }

    fn host(start_time: u64, ticks: u64, read: u64, write: u64) -> HostProcessStats {
        HostProcessStats {
            start_time,
            cpu_ticks: Some(ticks),
            rss_bytes: Some(1024 * 1024),
            read_bytes: Some(read),
            write_bytes: Some(write),
            io_wait: Some(false),
        }
    }

    fn snapshot(secs: i64, rows: Vec<(ProcessRow, Option<HostProcessStats>)>) -> Snapshot {
        let processes = rows.iter().map(|(p, _)| p.clone()).collect();
        let mut snap = Snapshot::new(
            Utc.timestamp_opt(secs, 0).unwrap(),
            ServerStats::default(),
            processes,
            Vec::new(),
        );
        for (p, h) in rows {
            if let Some(h) = h {
                snap.host.insert(p.pid, h);
            }
        }
        snap.system = Some(SystemInfo {
            mem_total: 100 * 1024 * 1024,
            ..SystemInfo::default()
        });
        snap
    }

    #[test]
    fn first_observation_has_blank_rates() {
        let mut engine = DeltaEngine::new();
        let s1 = snapshot(100, vec![(process(1, 10.0), Some(host(5, 100, 0, 0)))]);
        let rows = engine.compute(None, &s1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cpu, None);
        assert_eq!(rows[0].mem, None);
        assert_eq!(rows[0].read, None);
        assert_eq!(rows[0].time_plus, 0.0);
    }

    #[test]
    fn rates_from_two_observations() {
        let mut engine = DeltaEngine::new();
        let s1 = snapshot(100, vec![(process(1, 10.0), Some(host(5, 100, 1000, 0)))]);
        let s2 = snapshot(102, vec![(process(1, 10.0), Some(host(5, 200, 5000, 2000)))]);
        engine.compute(None, &s1);
        let rows = engine.compute(Some(&s1), &s2);

        // 100 ticks over 2 s at 100 ticks/s is half a core.
        assert_eq!(rows[0].cpu, Some(50.0));
        assert_eq!(rows[0].read, Some(2000.0));
        assert_eq!(rows[0].write, Some(1000.0));
        assert_eq!(rows[0].mem, Some(1.0));
        assert_eq!(rows[0].time_plus, 2.0);
    }

    #[test]
    fn negative_io_delta_reads_as_zero() {
        let mut engine = DeltaEngine::new();
        let s1 = snapshot(100, vec![(process(1, 10.0), Some(host(5, 100, 9000, 9000)))]);
        let s2 = snapshot(101, vec![(process(1, 10.0), Some(host(5, 100, 10, 20)))]);
        engine.compute(None, &s1);
        let rows = engine.compute(Some(&s1), &s2);
        assert_eq!(rows[0].read, Some(0.0));
        assert_eq!(rows[0].write, Some(0.0));
    }

    #[test]
    fn io_rates_never_negative_for_any_counter_pair() {
        let samples = [0u64, 1, 17, 4096, 1 << 20, u64::MAX / 2];
        for &a in &samples {
            for &b in &samples {
                let mut engine = DeltaEngine::new();
                let s1 = snapshot(100, vec![(process(1, 1.0), Some(host(5, 0, a, b)))]);
                let s2 = snapshot(103, vec![(process(1, 1.0), Some(host(5, 0, b, a)))]);
                engine.compute(None, &s1);
                let row = &engine.compute(Some(&s1), &s2)[0];
                assert!(row.read.unwrap() >= 0.0);
                assert!(row.write.unwrap() >= 0.0);
            }
        }
    }

    #[test]
    fn time_plus_accumulates_and_resets_on_reuse() {
        let mut engine = DeltaEngine::new();
        let s1 = snapshot(100, vec![(process(1, 10.0), None)]);
        let s2 = snapshot(103, vec![(process(1, 10.0), None)]);
        let s3 = snapshot(105, vec![(process(1, 10.0), None)]);
        let s4 = snapshot(106, vec![(process(1, 99.0), None)]);

        engine.compute(None, &s1);
        assert_eq!(engine.compute(Some(&s1), &s2)[0].time_plus, 3.0);
        assert_eq!(engine.compute(Some(&s2), &s3)[0].time_plus, 5.0);
        let reused = &engine.compute(Some(&s3), &s4)[0];
        assert_eq!(reused.time_plus, 0.0);
        assert_eq!(reused.cpu, None);
    }

    #[test]
    fn host_start_time_change_is_reuse() {
        let mut engine = DeltaEngine::new();
        let s1 = snapshot(100, vec![(process(1, 10.0), Some(host(5, 100, 0, 0)))]);
        let s2 = snapshot(101, vec![(process(1, 10.0), Some(host(6, 300, 0, 0)))]);
        engine.compute(None, &s1);
        let row = &engine.compute(Some(&s1), &s2)[0];
        assert_eq!(row.cpu, None);
        assert_eq!(row.time_plus, 0.0);
    }

    #[test]
    fn missing_pids_are_dropped() {
        let mut engine = DeltaEngine::new();
        let s1 = snapshot(100, vec![(process(1, 1.0), None), (process(2, 1.0), None)]);
        let s2 = snapshot(101, vec![(process(2, 1.0), None), (process(3, 1.0), None)]);
        engine.compute(None, &s1);
        let rows = engine.compute(Some(&s1), &s2);
        let pids: Vec<i32> = rows.iter().map(DeltaRow::pid).collect();
        assert_eq!(pids, vec![2, 3]);
        assert_eq!(rows[0].time_plus, 1.0);
        assert_eq!(rows[1].time_plus, 0.0);
    }

    #[test]
    fn no_host_stats_means_blank_rates() {
        let mut engine = DeltaEngine::new();
        let s1 = snapshot(100, vec![(process(1, 1.0), None)]);
        let s2 = snapshot(101, vec![(process(1, 1.0), None)]);
        engine.compute(None, &s1);
        let row = &engine.compute(Some(&s1), &s2)[0];
        assert_eq!(row.cpu, None);
        assert_eq!(row.read, None);
        assert_eq!(row.io_wait, None);
    }

    #[test]
    fn server_rates_per_second() {
        let mut s1 = snapshot(100, Vec::new());
        let mut s2 = snapshot(102, Vec::new());
        s1.server = ServerStats {
            xact_commit: 100,
            tup_inserted: 10,
            total_size: Some(1000),
            ..ServerStats::default()
        };
        s2.server = ServerStats {
            xact_commit: 300,
            xact_rollback: 20,
            tup_inserted: 50,
            total_size: Some(3000),
            ..ServerStats::default()
        };
        let rates = ServerRates::compute(&s1, &s2).unwrap();
        assert_eq!(rates.tps, 110.0);
        assert_eq!(rates.inserts, 20.0);
        assert_eq!(rates.size_growth, Some(1000.0));
        assert!(ServerRates::compute(&s2, &s2).is_none());
    }

    #[test]
    fn ratios_cover_the_interval_only() {
        let mut s1 = snapshot(100, Vec::new());
        let mut s2 = snapshot(101, Vec::new());
        // Lifetime totals are ~99.9% hits; this interval only 50%.
        s1.server = ServerStats {
            blks_hit: 1_000_000,
            blks_read: 1_000,
            xact_commit: 10_000,
            ..ServerStats::default()
        };
        s2.server = ServerStats {
            blks_hit: 1_000_100,
            blks_read: 1_100,
            xact_commit: 10_075,
            xact_rollback: 25,
            ..ServerStats::default()
        };
        let rates = ServerRates::compute(&s1, &s2).unwrap();
        assert_eq!(rates.cache_hit_ratio, Some(50.0));
        assert_eq!(rates.rollback_ratio, Some(25.0));
    }

    #[test]
    fn ratios_need_activity() {
        let s1 = snapshot(100, Vec::new());
        let s2 = snapshot(101, Vec::new());
        let rates = ServerRates::compute(&s1, &s2).unwrap();
        assert_eq!(rates.cache_hit_ratio, None);
        assert_eq!(rates.rollback_ratio, None);

        let mut reset = snapshot(99, Vec::new());
        reset.server.blks_hit = 500;
        assert_eq!(ServerRates::compute(&reset, &s1).unwrap().cache_hit_ratio, None);
    }

    #[test]
    fn counter_reset_gives_zero_server_rate() {
        let mut s1 = snapshot(100, Vec::new());
        let s2 = snapshot(101, Vec::new());
        s1.server.xact_commit = 500;
        assert_eq!(ServerRates::compute(&s1, &s2).unwrap().tps, 0.0);
    }
}
