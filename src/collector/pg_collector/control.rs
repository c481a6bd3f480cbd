//! Backend control: cancel and terminate.

use tracing::{info, warn};

use super::queries::{CANCEL_BACKEND_QUERY, TERMINATE_BACKEND_QUERY};
use super::{ActivitySource, SourceError};

/// A control action that did not take effect for one pid.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionError {
    pub pid: i32,
    pub reason: String,
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pid {}: {}", self.pid, self.reason)
    }
}

impl std::error::Error for ActionError {}

impl ActivitySource {
    /// Cancels the current statement of a backend.
    pub fn cancel_backend(&mut self, pid: i32) -> Result<(), ActionError> {
        self.signal_backend(CANCEL_BACKEND_QUERY, "cancel", pid)
    }

    /// Terminates a backend.
    ///
    /// Servers without `pg_terminate_backend` get a cancel instead.
    pub fn terminate_backend(&mut self, pid: i32) -> Result<(), ActionError> {
        let can_terminate = self.profile.as_ref().is_some_and(|p| p.can_terminate());
        if can_terminate {
            self.signal_backend(TERMINATE_BACKEND_QUERY, "terminate", pid)
        } else {
            warn!(pid, "terminate unsupported by server, cancelling instead");
            self.signal_backend(CANCEL_BACKEND_QUERY, "cancel", pid)
        }
    }

    fn signal_backend(&mut self, query: &str, action: &str, pid: i32) -> Result<(), ActionError> {
        let result = {
            let (client, _) = self.session().map_err(|e| ActionError {
                pid,
                reason: e.to_string(),
            })?;
            client
                .query_one(query, &[&pid])
                .map(|row| row.try_get::<_, Option<bool>>(0).unwrap_or_default())
        };

        match result {
            Ok(Some(true)) => {
                info!(pid, action, "backend signalled");
                Ok(())
            }
            Ok(_) => {
                warn!(pid, action, "no such backend");
                Err(ActionError {
                    pid,
                    reason: "no such backend".to_string(),
                })
            }
            Err(e) => {
                let err: SourceError = self.fail(&e);
                warn!(pid, action, error = %err, "backend action failed");
                Err(ActionError {
                    pid,
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceOptions;

    #[test]
    fn action_error_names_pid() {
        let err = ActionError {
            pid: 4242,
            reason: "no such backend".to_string(),
        };
        assert_eq!(err.to_string(), "pid 4242: no such backend");
    }

    #[test]
    fn actions_without_connection_fail_per_pid() {
        let mut source = ActivitySource::new(
            "host=localhost".to_string(),
            false,
            false,
            SourceOptions::default(),
        );
        let err = source.cancel_backend(7).unwrap_err();
        assert_eq!(err.pid, 7);
        assert!(err.reason.contains("connection lost"));
        assert!(source.terminate_backend(8).is_err());
    }
}
