//! Data model shared by the collector, delta engine and dashboard.

mod host;
mod lock;
mod process;
mod server;
mod snapshot;

pub use host::{HostProcessStats, SystemInfo};
pub use lock::{LockLink, LockRow};
pub use process::{ProcessRow, WaitInfo};
pub use server::{ServerStats, TempFileInfo};
pub use snapshot::Snapshot;
