//! Snapshot source abstraction.
//!
//! The dashboard talks to the server only through [`SnapshotSource`], so the
//! refresh loop and the controller can be driven by a scripted source in
//! tests. [`LiveSource`] is the real implementation on top of
//! [`ActivitySource`](crate::collector::ActivitySource); [`ScriptedSource`]
//! replays queued outcomes.

mod live;
mod scripted;

pub use live::LiveSource;
pub use scripted::{RecordedAction, RecordedRequest, ScriptedSource};

use crate::capability::{DurationMode, ServerProfile};
use crate::collector::{ActionError, LockScope, SourceError};
use crate::model::Snapshot;

/// Parameters of one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest<'a> {
    /// Seconds; `0` disables the predicate.
    pub min_duration: f64,
    pub duration_mode: DurationMode,
    /// Case-insensitive database name expression.
    pub dbname_filter: Option<&'a str>,
    /// Lock rows to fetch; `None` skips the lock query.
    pub locks: Option<LockScope>,
    /// Reuse the last total database size instead of recomputing it.
    pub skip_size: bool,
}

/// Source of consistent snapshots and backend control.
pub trait SnapshotSource {
    /// Profile of the current connection, `None` while disconnected.
    fn profile(&self) -> Option<&ServerProfile>;

    /// True when host process stats are sampled for backends.
    fn has_host_stats(&self) -> bool;

    /// Runs one fetch cycle: server stats, process rows and lock rows from
    /// the same connection.
    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<Snapshot, SourceError>;

    /// Drops any connection and connects again with the original
    /// parameters, resolving the profile anew.
    fn reconnect(&mut self) -> Result<(), SourceError>;

    fn cancel_backend(&mut self, pid: i32) -> Result<(), ActionError>;

    fn terminate_backend(&mut self, pid: i32) -> Result<(), ActionError>;
}
