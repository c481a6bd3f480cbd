//! Runtime configuration.
//!
//! The binary parses the command line and builds a [`Config`]; everything
//! below works without clap so it can be tested directly.

use std::path::PathBuf;

use regex::{Regex, RegexBuilder};

use crate::capability::DurationMode;
use crate::scheduler::snap_interval;
use crate::view::{Column, ColumnSet, QueryDisplay};

/// Default refresh interval in seconds.
pub const DEFAULT_REFRESH: f64 = 2.0;

/// Application name reported to the server.
pub const APPLICATION_NAME: &str = "pgtop";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Filter not of the form `dbname:REGEX`.
    InvalidFilter(String),
    /// Filter regular expression does not compile.
    InvalidRegex { pattern: String, message: String },
    /// Negative or non-numeric duration threshold.
    InvalidMinDuration(f64),
    UnknownColumn(String),
    UnknownDurationMode(String),
    UnknownQueryDisplay(String),
    /// Neither PGUSER nor USER is set and no user was given.
    MissingUser,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidFilter(s) => {
                write!(f, "invalid filter '{}', expected dbname:REGEX", s)
            }
            ConfigError::InvalidRegex { pattern, message } => {
                write!(f, "invalid regular expression '{}': {}", pattern, message)
            }
            ConfigError::InvalidMinDuration(v) => write!(f, "invalid minimum duration {}", v),
            ConfigError::UnknownColumn(s) => write!(f, "unknown column '{}'", s),
            ConfigError::UnknownDurationMode(s) => {
                write!(f, "unknown duration mode '{}', expected query|transaction|backend", s)
            }
            ConfigError::UnknownQueryDisplay(s) => {
                write!(f, "unknown query display '{}', expected full|truncated|indented", s)
            }
            ConfigError::MissingUser => write!(f, "no user given and neither PGUSER nor USER is set"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Activity source switches for optional metrics and session setup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceOptions {
    /// Never query temporary file statistics.
    pub skip_tempfiles: bool,
    /// Never query `pg_stat_wal_receiver`.
    pub skip_walreceiver: bool,
    /// Keep the dashboard's statements out of the server log.
    pub hide_queries_in_logs: bool,
}

/// Connection parameters with libpq-style environment fallbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionParams {
    /// Full connection string (key/value or URI); wins over the fields.
    pub connection_string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
    pub sslmode: Option<String>,
}

impl ConnectionParams {
    /// Fills unset fields from `PGHOST`, `PGPORT`, `PGUSER` (then `USER`),
    /// `PGPASSWORD`, `PGDATABASE` and `PGSSLMODE`.
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback(|name| std::env::var(name).ok())
    }

    fn with_fallback(mut self, env: impl Fn(&str) -> Option<String>) -> Self {
        self.host = self.host.or_else(|| env("PGHOST"));
        self.port = self
            .port
            .or_else(|| env("PGPORT").and_then(|p| p.parse().ok()));
        self.user = self
            .user
            .or_else(|| env("PGUSER"))
            .or_else(|| env("USER"));
        self.password = self.password.or_else(|| env("PGPASSWORD"));
        self.dbname = self.dbname.or_else(|| env("PGDATABASE"));
        self.sslmode = self.sslmode.or_else(|| env("PGSSLMODE"));
        self
    }

    /// Connection string for the driver, always tagged with the
    /// application name.
    ///
    /// libpq's `verify-ca`/`verify-full` become `require` here; certificate
    /// checking is then done by the TLS connector (see
    /// [`verifies_certificates`](Self::verifies_certificates)).
    pub fn to_connection_string(&self) -> Result<String, ConfigError> {
        if let Some(conn) = &self.connection_string {
            let conn = downgrade_sslmode(conn);
            return Ok(if is_uri(&conn) {
                let sep = if conn.contains('?') { '&' } else { '?' };
                format!("{}{}application_name={}", conn, sep, APPLICATION_NAME)
            } else {
                format!("{} application_name={}", conn, APPLICATION_NAME)
            });
        }

        let user = self.user.as_deref().ok_or(ConfigError::MissingUser)?;
        let mut parts = vec![
            format!("host={}", quote(self.host.as_deref().unwrap_or("localhost"))),
            format!("port={}", self.port.unwrap_or(5432)),
            format!("user={}", quote(user)),
            format!("dbname={}", quote(self.dbname.as_deref().unwrap_or(user))),
        ];
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            parts.push(format!("password={}", quote(password)));
        }
        if let Some(mode) = &self.sslmode {
            parts.push(downgrade_sslmode(&format!("sslmode={}", quote(mode))));
        }
        parts.push(format!("application_name={}", APPLICATION_NAME));
        Ok(parts.join(" "))
    }

    /// True when the user asked for certificate validation.
    pub fn verifies_certificates(&self) -> bool {
        match &self.connection_string {
            Some(conn) => verify_mode(conn),
            None => self
                .sslmode
                .as_deref()
                .is_some_and(|m| m == "verify-ca" || m == "verify-full"),
        }
    }

    /// Host and port for the header line.
    pub fn display_target(&self) -> String {
        match (&self.connection_string, &self.host) {
            (Some(_), _) => "connection string".to_string(),
            (None, host) => format!(
                "{}:{}",
                host.as_deref().unwrap_or("localhost"),
                self.port.unwrap_or(5432)
            ),
        }
    }
}

fn is_uri(conn: &str) -> bool {
    conn.starts_with("postgres://") || conn.starts_with("postgresql://")
}

fn verify_mode(conn: &str) -> bool {
    conn.contains("sslmode=verify-ca") || conn.contains("sslmode=verify-full")
}

fn downgrade_sslmode(conn: &str) -> String {
    conn.replace("sslmode=verify-full", "sslmode=require")
        .replace("sslmode=verify-ca", "sslmode=require")
}

/// Quotes a key/value connection string value when needed.
fn quote(value: &str) -> String {
    if !value.is_empty() && !value.contains([' ', '\'', '\\']) {
        return value.to_string();
    }
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}

/// Parses `dbname:REGEX` into a case-insensitive expression.
pub fn parse_filter(spec: &str) -> Result<Regex, ConfigError> {
    let Some((field, pattern)) = spec.split_once(':') else {
        return Err(ConfigError::InvalidFilter(spec.to_string()));
    };
    if field != "dbname" || pattern.is_empty() {
        return Err(ConfigError::InvalidFilter(spec.to_string()));
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

pub fn parse_duration_mode(label: &str) -> Result<DurationMode, ConfigError> {
    match label {
        "query" => Ok(DurationMode::Query),
        "transaction" => Ok(DurationMode::Transaction),
        "backend" => Ok(DurationMode::Backend),
        other => Err(ConfigError::UnknownDurationMode(other.to_string())),
    }
}

pub fn parse_query_display(label: &str) -> Result<QueryDisplay, ConfigError> {
    QueryDisplay::from_label(label).ok_or_else(|| ConfigError::UnknownQueryDisplay(label.to_string()))
}

/// Builds the visible column set from `--hide` names.
pub fn parse_hidden_columns(names: &[String]) -> Result<ColumnSet, ConfigError> {
    let mut set = ColumnSet::default();
    for name in names {
        let column =
            Column::from_name(name).ok_or_else(|| ConfigError::UnknownColumn(name.clone()))?;
        set.hide(column);
    }
    Ok(set)
}

/// Header sections shown at start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderSections {
    pub instance: bool,
    pub system: bool,
    pub process: bool,
}

impl Default for HeaderSections {
    fn default() -> Self {
        Self {
            instance: true,
            system: true,
            process: true,
        }
    }
}

/// Everything the dashboard needs at start.
#[derive(Debug, Clone)]
pub struct Config {
    pub connection: ConnectionParams,
    /// Managed-service mode (no temp files, reserved database excluded).
    pub managed: bool,
    /// Seconds, on the 0.5 s grid within `[0.5, 5]`.
    pub refresh: f64,
    pub min_duration: f64,
    pub dbname_filter: Option<Regex>,
    pub duration_mode: DurationMode,
    pub query_display: QueryDisplay,
    pub columns: ColumnSet,
    pub header: HeaderSections,
    pub output: Option<PathBuf>,
    pub skip_db_size: bool,
    pub source: SourceOptions,
    /// Root of the proc filesystem for host stats.
    pub proc_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection: ConnectionParams::default(),
            managed: false,
            refresh: DEFAULT_REFRESH,
            min_duration: 0.0,
            dbname_filter: None,
            duration_mode: DurationMode::default(),
            query_display: QueryDisplay::default(),
            columns: ColumnSet::default(),
            header: HeaderSections::default(),
            output: None,
            skip_db_size: false,
            source: SourceOptions::default(),
            proc_path: PathBuf::from("/proc"),
        }
    }
}

impl Config {
    /// Sets the refresh interval, snapped to the supported grid.
    pub fn with_refresh(mut self, secs: f64) -> Self {
        self.refresh = snap_interval(secs);
        self
    }

    pub fn with_min_duration(mut self, secs: f64) -> Result<Self, ConfigError> {
        if !secs.is_finite() || secs < 0.0 {
            return Err(ConfigError::InvalidMinDuration(secs));
        }
        self.min_duration = secs;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn filter_parsing() {
        let re = parse_filter("dbname:^prod").unwrap();
        assert!(re.is_match("PRODUCTION"));
        assert!(!re.is_match("staging"));
        assert_eq!(re.as_str(), "^prod");

        assert!(matches!(parse_filter("^prod"), Err(ConfigError::InvalidFilter(_))));
        assert!(matches!(parse_filter("user:bob"), Err(ConfigError::InvalidFilter(_))));
        assert!(matches!(parse_filter("dbname:("), Err(ConfigError::InvalidRegex { .. })));
    }

    #[test]
    fn env_fills_missing_fields_only() {
        let params = ConnectionParams {
            host: Some("db1".to_string()),
            ..ConnectionParams::default()
        }
        .with_fallback(env(&[
            ("PGHOST", "ignored"),
            ("PGPORT", "6543"),
            ("USER", "alice"),
            ("PGDATABASE", "app"),
        ]));
        assert_eq!(params.host.as_deref(), Some("db1"));
        assert_eq!(params.port, Some(6543));
        assert_eq!(params.user.as_deref(), Some("alice"));
        assert_eq!(
            params.to_connection_string().unwrap(),
            "host=db1 port=6543 user=alice dbname=app application_name=pgtop"
        );
    }

    #[test]
    fn values_are_quoted() {
        let params = ConnectionParams {
            user: Some("bob".to_string()),
            password: Some("it's secret".to_string()),
            ..ConnectionParams::default()
        };
        assert_eq!(
            params.to_connection_string().unwrap(),
            "host=localhost port=5432 user=bob dbname=bob password='it\\'s secret' application_name=pgtop"
        );
    }

    #[test]
    fn missing_user_is_an_error() {
        assert_eq!(
            ConnectionParams::default().to_connection_string(),
            Err(ConfigError::MissingUser)
        );
    }

    #[test]
    fn connection_string_wins_and_gets_app_name() {
        let params = ConnectionParams {
            connection_string: Some("postgresql://u@h/db?sslmode=verify-full".to_string()),
            host: Some("other".to_string()),
            ..ConnectionParams::default()
        };
        assert!(params.verifies_certificates());
        assert_eq!(
            params.to_connection_string().unwrap(),
            "postgresql://u@h/db?sslmode=require&application_name=pgtop"
        );

        let kv = ConnectionParams {
            connection_string: Some("host=h dbname=db".to_string()),
            ..ConnectionParams::default()
        };
        assert!(!kv.verifies_certificates());
        assert_eq!(
            kv.to_connection_string().unwrap(),
            "host=h dbname=db application_name=pgtop"
        );
    }

    #[test]
    fn sslmode_field_controls_verification() {
        let params = ConnectionParams {
            user: Some("u".to_string()),
            sslmode: Some("verify-ca".to_string()),
            ..ConnectionParams::default()
        };
        assert!(params.verifies_certificates());
        assert!(params.to_connection_string().unwrap().contains("sslmode=require"));
    }

    #[test]
    fn labels_and_columns() {
        assert_eq!(parse_duration_mode("backend"), Ok(DurationMode::Backend));
        assert!(parse_duration_mode("xact").is_err());
        assert_eq!(parse_query_display("full"), Ok(QueryDisplay::Full));

        let set = parse_hidden_columns(&["cpu".to_string(), "Client".to_string()]).unwrap();
        assert!(!set.is_visible(Column::Cpu));
        assert!(!set.is_visible(Column::Client));
        assert!(set.is_visible(Column::Mem));
        assert_eq!(
            parse_hidden_columns(&["pid".to_string()]),
            Err(ConfigError::UnknownColumn("pid".to_string()))
        );
    }

    #[test]
    fn refresh_and_min_duration() {
        let config = Config::default().with_refresh(0.2);
        assert_eq!(config.refresh, 0.5);
        assert!(Config::default().with_min_duration(-1.0).is_err());
        assert_eq!(Config::default().with_min_duration(5.0).unwrap().min_duration, 5.0);
    }
}
