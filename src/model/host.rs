//! Host-level process and system samples.

/// One `/proc` sample of a backend process.
///
/// Counters the collector could not read are `None`, never zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostProcessStats {
    /// Process start time in clock ticks since boot.
    pub start_time: u64,
    /// utime + stime in clock ticks.
    pub cpu_ticks: Option<u64>,
    pub rss_bytes: Option<u64>,
    pub read_bytes: Option<u64>,
    pub write_bytes: Option<u64>,
    /// Process is in uninterruptible (disk) sleep.
    pub io_wait: Option<bool>,
}

/// Host memory and load figures for the system header line.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SystemInfo {
    /// Bytes.
    pub mem_total: u64,
    pub mem_free: u64,
    pub mem_buffers: u64,
    pub mem_cached: u64,
    pub swap_total: u64,
    pub swap_free: u64,
    pub load1: f64,
    pub load5: f64,
    pub load15: f64,
}

impl SystemInfo {
    pub fn mem_used(&self) -> u64 {
        self.mem_total
            .saturating_sub(self.mem_free)
            .saturating_sub(self.mem_buffers)
            .saturating_sub(self.mem_cached)
    }

    pub fn swap_used(&self) -> u64 {
        self.swap_total.saturating_sub(self.swap_free)
    }
}
