//! Scripted snapshot source for driving the dashboard without a server.

use std::collections::{HashSet, VecDeque};

use crate::capability::{DurationMode, ServerProfile};
use crate::collector::{ActionError, LockScope, SourceError};
use crate::model::Snapshot;

use super::{FetchRequest, SnapshotSource};

/// Owned copy of a [`FetchRequest`] as received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub min_duration: f64,
    pub duration_mode: DurationMode,
    pub dbname_filter: Option<String>,
    pub locks: Option<LockScope>,
    pub skip_size: bool,
}

/// Control call as received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedAction {
    Cancel(i32),
    Terminate(i32),
}

/// Replays queued fetch and reconnect outcomes in order.
///
/// A fetch with nothing queued fails with a query error; a reconnect with
/// nothing queued succeeds and keeps the current profile.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    profile: Option<ServerProfile>,
    host_stats: bool,
    fetches: VecDeque<Result<Snapshot, SourceError>>,
    reconnects: VecDeque<Result<ServerProfile, SourceError>>,
    /// Pids whose control actions fail.
    pub failing_pids: HashSet<i32>,
    pub requests: Vec<RecordedRequest>,
    pub actions: Vec<RecordedAction>,
}

impl ScriptedSource {
    pub fn new(profile: ServerProfile) -> Self {
        Self {
            profile: Some(profile),
            ..Self::default()
        }
    }

    pub fn with_host_stats(mut self) -> Self {
        self.host_stats = true;
        self
    }

    pub fn push_snapshot(&mut self, snapshot: Snapshot) {
        self.fetches.push_back(Ok(snapshot));
    }

    pub fn push_error(&mut self, error: SourceError) {
        self.fetches.push_back(Err(error));
    }

    pub fn push_reconnect(&mut self, outcome: Result<ServerProfile, SourceError>) {
        self.reconnects.push_back(outcome);
    }

    fn act(&mut self, action: RecordedAction, pid: i32) -> Result<(), ActionError> {
        self.actions.push(action);
        if self.failing_pids.contains(&pid) {
            Err(ActionError {
                pid,
                reason: "no such backend".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl SnapshotSource for ScriptedSource {
    fn profile(&self) -> Option<&ServerProfile> {
        self.profile.as_ref()
    }

    fn has_host_stats(&self) -> bool {
        self.host_stats
    }

    fn fetch(&mut self, request: &FetchRequest<'_>) -> Result<Snapshot, SourceError> {
        self.requests.push(RecordedRequest {
            min_duration: request.min_duration,
            duration_mode: request.duration_mode,
            dbname_filter: request.dbname_filter.map(str::to_string),
            locks: request.locks,
            skip_size: request.skip_size,
        });
        let outcome = self
            .fetches
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Query("no scripted snapshot".to_string())));
        if matches!(outcome, Err(SourceError::ConnectionLost(_))) {
            self.profile = None;
        }
        outcome
    }

    fn reconnect(&mut self) -> Result<(), SourceError> {
        match self.reconnects.pop_front() {
            Some(Ok(profile)) => {
                self.profile = Some(profile);
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        }
    }

    fn cancel_backend(&mut self, pid: i32) -> Result<(), ActionError> {
        self.act(RecordedAction::Cancel(pid), pid)
    }

    fn terminate_backend(&mut self, pid: i32) -> Result<(), ActionError> {
        self.act(RecordedAction::Terminate(pid), pid)
    }
}
