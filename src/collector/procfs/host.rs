//! Per-backend CPU, memory and I/O samples from `/proc`.

use std::path::PathBuf;

use tracing::debug;

use crate::collector::traits::FileSystem;
use crate::model::{HostProcessStats, SystemInfo};

use super::parser::{parse_loadavg, parse_meminfo, parse_proc_io, parse_proc_stat};

/// Clock ticks per second for utime/stime.
pub const CLK_TCK: f64 = 100.0;

/// Bytes per page for `rss`.
pub const PAGE_SIZE: u64 = 4096;

/// Source of host-level samples for server backends.
pub trait HostStatsProvider {
    /// Samples one OS process. `None` when the process cannot be read at all.
    fn process(&self, pid: i32) -> Option<HostProcessStats>;

    /// Memory and load figures. `None` when unavailable.
    fn system(&self) -> Option<SystemInfo>;
}

/// Host stats are unavailable (remote server or no access to `/proc`).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHostStats;

impl HostStatsProvider for NoHostStats {
    fn process(&self, _pid: i32) -> Option<HostProcessStats> {
        None
    }

    fn system(&self) -> Option<SystemInfo> {
        None
    }
}

/// Reads samples from a `/proc` tree through a [`FileSystem`].
pub struct ProcfsStats<F: FileSystem> {
    fs: F,
    proc_path: PathBuf,
}

impl<F: FileSystem> ProcfsStats<F> {
    pub fn new(fs: F, proc_path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }
}

impl<F: FileSystem> HostStatsProvider for ProcfsStats<F> {
    fn process(&self, pid: i32) -> Option<HostProcessStats> {
        let base = self.proc_path.join(pid.to_string());
        // Backend exited since the activity query, or lives on another host.
        if !self.fs.exists(&base) {
            return None;
        }

        let stat = match self
            .fs
            .read_to_string(&base.join("stat"))
            .ok()
            .map(|content| parse_proc_stat(&content))
        {
            Some(Ok(stat)) => stat,
            Some(Err(e)) => {
                debug!(pid, error = %e, "unreadable stat");
                return None;
            }
            None => return None,
        };

        // io needs the same uid or CAP_SYS_PTRACE; missing counters stay None.
        let io = self
            .fs
            .read_to_string(&base.join("io"))
            .ok()
            .and_then(|content| parse_proc_io(&content).ok());

        Some(HostProcessStats {
            start_time: stat.starttime,
            cpu_ticks: Some(stat.utime + stat.stime),
            rss_bytes: u64::try_from(stat.rss).ok().map(|pages| pages * PAGE_SIZE),
            read_bytes: io.map(|io| io.read_bytes),
            write_bytes: io.map(|io| io.write_bytes),
            io_wait: Some(stat.state == 'D'),
        })
    }

    fn system(&self) -> Option<SystemInfo> {
        let mem = self
            .fs
            .read_to_string(&self.proc_path.join("meminfo"))
            .ok()
            .and_then(|content| parse_meminfo(&content).ok())?;
        let load = self
            .fs
            .read_to_string(&self.proc_path.join("loadavg"))
            .ok()
            .and_then(|content| parse_loadavg(&content).ok())
            .unwrap_or_default();

        Some(SystemInfo {
            mem_total: mem.mem_total * 1024,
            mem_free: mem.mem_free * 1024,
            mem_buffers: mem.buffers * 1024,
            mem_cached: mem.cached * 1024,
            swap_total: mem.swap_total * 1024,
            swap_free: mem.swap_free * 1024,
            load1: load.load1,
            load5: load.load5,
            load15: load.load15,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, stat_line};

    #[test]
    fn samples_typical_backend() {
        let stats = ProcfsStats::new(MockFs::typical_host(), "/proc");
        let sample = stats.process(4242).unwrap();
        assert_eq!(sample.start_time, 900_000);
        assert_eq!(sample.cpu_ticks, Some(200));
        assert_eq!(sample.rss_bytes, Some(2048 * PAGE_SIZE));
        assert_eq!(sample.read_bytes, Some(4096));
        assert_eq!(sample.write_bytes, Some(8192));
        assert_eq!(sample.io_wait, Some(false));
    }

    #[test]
    fn unreadable_io_stays_unavailable() {
        let mut fs = MockFs::new();
        fs.add_process(7, &stat_line(7, 'D', 1, 1, 10, 1), None);
        let sample = ProcfsStats::new(fs, "/proc").process(7).unwrap();
        assert_eq!(sample.read_bytes, None);
        assert_eq!(sample.write_bytes, None);
        assert_eq!(sample.io_wait, Some(true));
    }

    #[test]
    fn missing_process_is_none() {
        let stats = ProcfsStats::new(MockFs::typical_host(), "/proc");
        assert!(stats.process(1).is_none());
    }

    #[test]
    fn system_info_in_bytes() {
        let stats = ProcfsStats::new(MockFs::typical_host(), "/proc");
        let sys = stats.system().unwrap();
        assert_eq!(sys.mem_total, 16 * 1024 * 1024 * 1024);
        assert_eq!(sys.swap_used(), 0);
        assert_eq!(sys.load5, 0.58);
    }

    #[test]
    fn no_host_stats_reports_nothing() {
        assert!(NoHostStats.process(1).is_none());
        assert!(NoHostStats.system().is_none());
    }
}
