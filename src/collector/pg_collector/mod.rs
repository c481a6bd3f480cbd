//! Activity source: the single live server connection.
//!
//! Reads from the statistics views:
//! - `pg_stat_activity` - backend sessions
//! - `pg_locks` - waiting and blocking lock rows
//! - `pg_stat_database`, `pg_settings` and friends - server-wide counters
//!
//! Every query is built from the resolved [`ServerProfile`], so the same
//! calls work from 8.2 up to current releases. The connection is owned here
//! exclusively; a connection-level failure drops it and surfaces as
//! [`SourceError::ConnectionLost`] until [`ActivitySource::connect`] is called
//! again with the original parameters.

mod activity;
mod control;
mod decode;
mod locks;
mod queries;
mod server;

use postgres::Client;
use postgres::error::SqlState;
use postgres_native_tls::MakeTlsConnector;
use tracing::{debug, info, warn};

use crate::capability::{self, CapabilityError, ServerProfile};
use crate::config::SourceOptions;

pub use activity::label_legacy_state;
pub use control::ActionError;
pub use decode::decode_query;
pub use locks::LockScope;

/// Error type for activity source operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// The connection is gone or could not be established.
    ConnectionLost(String),
    /// The server is older than the oldest supported tier.
    UnsupportedVersion(String),
    /// The role lacks privileges for a query.
    PermissionDenied(String),
    /// Any other query failure.
    Query(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::ConnectionLost(msg) => write!(f, "connection lost: {}", msg),
            SourceError::UnsupportedVersion(msg) => write!(f, "{}", msg),
            SourceError::PermissionDenied(msg) => write!(f, "permission denied: {}", msg),
            SourceError::Query(msg) => write!(f, "query error: {}", msg),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<CapabilityError> for SourceError {
    fn from(e: CapabilityError) -> Self {
        SourceError::UnsupportedVersion(e.to_string())
    }
}

/// Metrics disabled for the rest of the session after a privilege or
/// platform failure, so the server log is not spammed every refresh.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FailedQueries {
    pub temp_files: bool,
    pub wal_receivers: bool,
}

/// Owner of the monitoring connection.
pub struct ActivitySource {
    connection_string: String,
    verify_certificates: bool,
    managed: bool,
    options: SourceOptions,
    pub(crate) client: Option<Client>,
    pub(crate) profile: Option<ServerProfile>,
    pub(crate) failed: FailedQueries,
    server_encoding: Option<String>,
    local_access: bool,
}

impl ActivitySource {
    /// Creates a source; no connection is made until [`connect`](Self::connect).
    pub fn new(
        connection_string: String,
        verify_certificates: bool,
        managed: bool,
        options: SourceOptions,
    ) -> Self {
        Self {
            connection_string,
            verify_certificates,
            managed,
            options,
            client: None,
            profile: None,
            failed: FailedQueries::default(),
            server_encoding: None,
            local_access: false,
        }
    }

    /// (Re)connects with the original parameters and resolves the profile.
    ///
    /// Any previous connection is dropped wholesale; statements in flight on
    /// it are abandoned locally.
    pub fn connect(&mut self) -> Result<&ServerProfile, SourceError> {
        self.client = None;
        self.profile = None;

        let mut client = open_client(&self.connection_string, self.verify_certificates)
            .map_err(|e| SourceError::ConnectionLost(format_postgres_error(&e)))?;

        let version_num: String = client
            .query_one("SHOW server_version_num", &[])
            .and_then(|row| row.try_get(0))
            .map_err(|e| classify_error(&e))?;
        let version_text: String = client
            .query_one("SELECT version()", &[])
            .and_then(|row| row.try_get(0))
            .map_err(|e| classify_error(&e))?;
        let version_num = capability::parse_version_num(&version_num)?;
        let profile = capability::resolve_num(
            version_num,
            &capability::short_version(&version_text),
            self.managed,
        )?;

        self.server_encoding = client
            .query_one("SHOW server_encoding", &[])
            .and_then(|row| row.try_get::<_, String>(0))
            .ok();

        if self.options.hide_queries_in_logs {
            hide_queries_in_logs(&mut client, &profile);
        }

        info!(
            version = profile.version(),
            tier = profile.tier().label(),
            managed = self.managed,
            "connected"
        );

        self.failed = FailedQueries::default();
        self.client = Some(client);
        self.local_access = self.detect_local_access();
        Ok(self.profile.insert(profile))
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn profile(&self) -> Option<&ServerProfile> {
        self.profile.as_ref()
    }

    /// Declared encoding of the server, e.g. `UTF8`.
    pub fn server_encoding(&self) -> Option<&str> {
        self.server_encoding.as_deref()
    }

    /// True when host process stats of the server's backends are readable
    /// from this machine.
    pub fn has_local_access(&self) -> bool {
        self.local_access
    }

    pub(crate) fn options(&self) -> &SourceOptions {
        &self.options
    }

    /// Returns the live client and profile, or `ConnectionLost`.
    pub(crate) fn session(&mut self) -> Result<(&mut Client, &ServerProfile), SourceError> {
        match (self.client.as_mut(), self.profile.as_ref()) {
            (Some(client), Some(profile)) => Ok((client, profile)),
            _ => Err(SourceError::ConnectionLost("not connected".to_string())),
        }
    }

    /// Maps a query failure and drops the client when the connection is gone.
    pub(crate) fn fail(&mut self, e: &postgres::Error) -> SourceError {
        let err = classify_error(e);
        if matches!(err, SourceError::ConnectionLost(_)) {
            warn!(error = %err, "connection lost");
            self.client = None;
        }
        err
    }

    /// Same host check: server and client addresses match (or a Unix socket
    /// is used) and the data directory is visible to this role.
    fn detect_local_access(&mut self) -> bool {
        let Some(client) = self.client.as_mut() else {
            return false;
        };

        let same_host = match client.query_one(
            "SELECT inet_server_addr()::text AS server, inet_client_addr()::text AS client",
            &[],
        ) {
            Ok(row) => {
                let server: Option<String> = row.get("server");
                let client_addr: Option<String> = row.get("client");
                server == client_addr
            }
            Err(_) => false,
        };
        if !same_host {
            debug!("server is remote, host stats disabled");
            return false;
        }

        match client.query_one("SHOW data_directory", &[]) {
            Ok(row) => {
                let dir: String = row.get(0);
                let pid_file = std::path::Path::new(&dir).join("postmaster.pid");
                let readable = std::fs::metadata(&pid_file).is_ok();
                if !readable {
                    info!(path = %pid_file.display(), "postmaster.pid not readable, host stats disabled");
                }
                readable
            }
            Err(e) => {
                info!(error = %format_postgres_error(&e), "data_directory not visible, host stats disabled");
                false
            }
        }
    }
}

fn open_client(connection_string: &str, verify: bool) -> Result<Client, postgres::Error> {
    match native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(!verify)
        .danger_accept_invalid_hostnames(!verify)
        .build()
    {
        Ok(connector) => Client::connect(connection_string, MakeTlsConnector::new(connector)),
        Err(e) => {
            warn!(error = %e, "TLS unavailable, connecting without it");
            Client::connect(connection_string, postgres::NoTls)
        }
    }
}

/// Keeps the dashboard's own statements out of the server log.
fn hide_queries_in_logs(client: &mut Client, profile: &ServerProfile) {
    let mut statements = vec![
        "SET log_min_duration_statement = -1",
        "SET log_statement = 'none'",
    ];
    if profile.has_log_min_duration_sample() {
        statements.push("SET log_min_duration_sample = -1");
    }
    for statement in statements {
        if let Err(e) = client.batch_execute(statement) {
            warn!(statement, error = %format_postgres_error(&e), "cannot hide queries in logs");
        }
    }
}

/// Maps a driver error onto the source error kinds.
pub(crate) fn classify_error(e: &postgres::Error) -> SourceError {
    let msg = format_postgres_error(e);
    if e.is_closed() {
        return SourceError::ConnectionLost(msg);
    }
    match e.code() {
        // No SQLSTATE: either the socket failed or a row failed to convert.
        None if is_io_failure(e) => SourceError::ConnectionLost(msg),
        None => SourceError::Query(msg),
        Some(code) if is_connection_failure(code) => SourceError::ConnectionLost(msg),
        Some(code) if *code == SqlState::INSUFFICIENT_PRIVILEGE => {
            SourceError::PermissionDenied(msg)
        }
        Some(_) => SourceError::Query(msg),
    }
}

fn is_io_failure(e: &postgres::Error) -> bool {
    std::error::Error::source(e).is_some_and(|source| source.is::<std::io::Error>())
}

fn is_connection_failure(code: &SqlState) -> bool {
    code.code().starts_with("08")
        || *code == SqlState::ADMIN_SHUTDOWN
        || *code == SqlState::CRASH_SHUTDOWN
        || *code == SqlState::CANNOT_CONNECT_NOW
}

/// Formats PostgreSQL error message for display.
pub(crate) fn format_postgres_error(e: &postgres::Error) -> String {
    if let Some(db_error) = e.as_db_error() {
        format!("{}: {}", db_error.severity(), db_error.message())
    } else {
        let msg = e.to_string();
        if msg.contains("Connection refused") {
            "connection refused".to_string()
        } else if msg.contains("password authentication failed") {
            "password authentication failed".to_string()
        } else if msg.contains("does not exist") {
            msg.split("FATAL:")
                .last()
                .unwrap_or(&msg)
                .trim()
                .to_string()
        } else {
            msg
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_class_codes_are_losses() {
        assert!(is_connection_failure(&SqlState::CONNECTION_FAILURE));
        assert!(is_connection_failure(&SqlState::CONNECTION_EXCEPTION));
        assert!(is_connection_failure(&SqlState::ADMIN_SHUTDOWN));
        assert!(!is_connection_failure(&SqlState::INSUFFICIENT_PRIVILEGE));
        assert!(!is_connection_failure(&SqlState::QUERY_CANCELED));
    }

    #[test]
    fn unconnected_source_reports_connection_lost() {
        let mut source = ActivitySource::new(
            "host=localhost".to_string(),
            false,
            false,
            SourceOptions::default(),
        );
        assert!(!source.is_connected());
        assert!(matches!(
            source.session(),
            Err(SourceError::ConnectionLost(_))
        ));
    }

    #[test]
    fn capability_errors_become_unsupported_version() {
        let err: SourceError = CapabilityError::UnsupportedVersion {
            version: "8.1.4".to_string(),
        }
        .into();
        assert_eq!(
            err,
            SourceError::UnsupportedVersion("unsupported server version 8.1.4".to_string())
        );
    }
}
