//! Data acquisition: the database connection and host process stats.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     LiveSource                        │
//! │  ┌──────────────────────┐   ┌──────────────────────┐  │
//! │  │   ActivitySource     │   │    ProcfsStats       │  │
//! │  │  - pg_stat_activity  │   │  - /proc/[pid]/stat  │  │
//! │  │  - pg_locks          │   │  - /proc/[pid]/io    │  │
//! │  │  - pg_stat_database  │   │  - /proc/meminfo     │  │
//! │  └──────────────────────┘   └──────────┬───────────┘  │
//! │                                        │              │
//! │                                 ┌──────▼──────┐       │
//! │                                 │  FileSystem │       │
//! │                                 └──────┬──────┘       │
//! └────────────────────────────────────────┼──────────────┘
//!                                 ┌────────┴────────┐
//!                          ┌──────▼──────┐   ┌──────▼──────┐
//!                          │   RealFs    │   │   MockFs    │
//!                          └─────────────┘   └─────────────┘
//! ```

pub mod mock;
pub mod pg_collector;
pub mod procfs;
pub mod traits;

pub use mock::MockFs;
pub use pg_collector::{ActionError, ActivitySource, LockScope, SourceError};
pub use procfs::{HostStatsProvider, NoHostStats, ProcfsStats};
pub use traits::{FileSystem, RealFs};
