//! Host process statistics read from `/proc`.

mod host;
pub mod parser;

pub use host::{HostStatsProvider, NoHostStats, ProcfsStats, CLK_TCK, PAGE_SIZE};
