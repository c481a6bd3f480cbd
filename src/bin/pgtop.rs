//! pgtop - live terminal dashboard for database server sessions.
//!
//! Usage:
//!   pgtop                                   # connect using PG* environment
//!   pgtop -h db1 -U monitor -d postgres     # explicit parameters
//!   pgtop "postgresql://monitor@db1/app"    # connection string
//!   pgtop --refresh 1 --filter dbname:^prod --output activity.csv

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fmt::Display;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clap::{ArgAction, Parser};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use pgtop::collector::ActivitySource;
use pgtop::config::{
    self, Config, ConfigError, ConnectionParams, DEFAULT_REFRESH, HeaderSections, SourceOptions,
};
use pgtop::export::CsvExporter;
use pgtop::provider::LiveSource;
use pgtop::scheduler::{MAX_INTERVAL, MIN_INTERVAL};
use pgtop::tui::{App, AppState};

/// Live terminal dashboard for database server sessions.
#[derive(Parser)]
#[command(name = "pgtop", version, disable_help_flag = true)]
struct Args {
    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,

    /// Connection string (key/value or URI); wins over the parameters below.
    #[arg(value_name = "CONNSTRING")]
    connstring: Option<String>,

    /// Database server host or socket directory (default: PGHOST, localhost).
    #[arg(short = 'h', long)]
    host: Option<String>,

    /// Database server port (default: PGPORT, 5432).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Database user name (default: PGUSER, then USER).
    #[arg(short = 'U', long)]
    username: Option<String>,

    /// Database name to connect to (default: PGDATABASE, the user name).
    #[arg(short = 'd', long)]
    dbname: Option<String>,

    /// Managed-service mode: no temp file stats, reserved database excluded
    /// from the size total.
    #[arg(long)]
    rds: bool,

    /// Refresh interval in seconds, 0.5 to 5 in 0.5 steps.
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_REFRESH, value_parser = parse_refresh)]
    refresh: f64,

    /// Only show backends running for at least this many seconds.
    #[arg(long, value_name = "SECS", default_value_t = 0.0)]
    min_duration: f64,

    /// Only show databases matching the expression (case-insensitive).
    #[arg(long, value_name = "dbname:REGEX")]
    filter: Option<String>,

    /// Timestamp behind the DURATION column: query, transaction or backend.
    #[arg(long, value_name = "MODE", default_value = "query")]
    duration_mode: String,

    /// Query text rendering: full, truncated or indented.
    #[arg(long, value_name = "MODE", default_value = "truncated")]
    query_display: String,

    /// Append the visible rows of every refresh to this CSV file.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Never compute the total database size.
    #[arg(long)]
    no_db_size: bool,

    /// Never query temporary file statistics.
    #[arg(long)]
    no_tempfiles: bool,

    /// Never query the WAL receiver.
    #[arg(long)]
    no_walreceiver: bool,

    /// Keep the dashboard's own queries out of the server log.
    #[arg(long)]
    hide_queries_in_logs: bool,

    /// Start with the instance section of the header hidden.
    #[arg(long)]
    no_inst_info: bool,

    /// Start with the system section of the header hidden.
    #[arg(long)]
    no_sys_info: bool,

    /// Start with the process section of the header hidden.
    #[arg(long)]
    no_proc_info: bool,

    /// Hide a column (repeatable), e.g. --hide appname --hide client.
    #[arg(long = "hide", value_name = "COLUMN")]
    hide: Vec<String>,

    /// Path to /proc filesystem for host process stats.
    #[arg(long, default_value = "/proc")]
    proc_path: PathBuf,

    /// Write logs to this file (the terminal belongs to the dashboard).
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', action = ArgAction::Count)]
    verbose: u8,
}

fn parse_refresh(s: &str) -> Result<f64, String> {
    let secs: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !(MIN_INTERVAL..=MAX_INTERVAL).contains(&secs) {
        return Err(format!(
            "must be between {} and {} seconds",
            MIN_INTERVAL, MAX_INTERVAL
        ));
    }
    Ok(secs)
}

fn build_config(args: &Args) -> Result<Config, ConfigError> {
    let connection = ConnectionParams {
        connection_string: args.connstring.clone(),
        host: args.host.clone(),
        port: args.port,
        user: args.username.clone(),
        dbname: args.dbname.clone(),
        ..ConnectionParams::default()
    }
    .with_env_fallback();

    let config = Config {
        connection,
        managed: args.rds,
        dbname_filter: args.filter.as_deref().map(config::parse_filter).transpose()?,
        duration_mode: config::parse_duration_mode(&args.duration_mode)?,
        query_display: config::parse_query_display(&args.query_display)?,
        columns: config::parse_hidden_columns(&args.hide)?,
        header: HeaderSections {
            instance: !args.no_inst_info,
            system: !args.no_sys_info,
            process: !args.no_proc_info,
        },
        output: args.output.clone(),
        skip_db_size: args.no_db_size,
        source: SourceOptions {
            skip_tempfiles: args.no_tempfiles,
            skip_walreceiver: args.no_walreceiver,
            hide_queries_in_logs: args.hide_queries_in_logs,
        },
        proc_path: args.proc_path.clone(),
        ..Config::default()
    };
    config
        .with_refresh(args.refresh)
        .with_min_duration(args.min_duration)
}

fn init_logging(path: &Path, verbose: u8) -> std::io::Result<()> {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = format!("pgtop={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .init();
    Ok(())
}

fn fail(message: impl Display) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        if let Err(e) = init_logging(path, args.verbose) {
            fail(format!("cannot open log file '{}': {}", path.display(), e));
        }
    }

    let config = build_config(&args).unwrap_or_else(|e| fail(e));
    let conninfo = config
        .connection
        .to_connection_string()
        .unwrap_or_else(|e| fail(e));

    let mut source = ActivitySource::new(
        conninfo,
        config.connection.verifies_certificates(),
        config.managed,
        config.source,
    );
    if let Err(e) = source.connect() {
        fail(e);
    }

    let mut state = AppState::new(&config, config.connection.display_target());
    if let Some(path) = &config.output {
        let exporter = CsvExporter::open(path).unwrap_or_else(|e| fail(e));
        info!(path = %path.display(), "exporting to CSV");
        state = state.with_exporter(exporter);
    }

    // Installed after connecting: Ctrl-C during startup exits immediately.
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    #[cfg(target_os = "linux")]
    let result = {
        use pgtop::collector::{ProcfsStats, RealFs};
        let host = ProcfsStats::new(RealFs::new(), &config.proc_path);
        App::new(LiveSource::new(source, host), state, shutdown).run()
    };
    #[cfg(not(target_os = "linux"))]
    let result = {
        use pgtop::collector::NoHostStats;
        App::new(LiveSource::new(source, NoHostStats), state, shutdown).run()
    };

    if let Err(e) = result {
        fail(format!("terminal: {}", e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn short_h_is_host() {
        let args = Args::try_parse_from(["pgtop", "-h", "db1", "-p", "6432", "-U", "mon"]).unwrap();
        assert_eq!(args.host.as_deref(), Some("db1"));
        assert_eq!(args.port, Some(6432));
        let config = build_config(&args).unwrap();
        assert_eq!(config.connection.host.as_deref(), Some("db1"));
        assert_eq!(config.connection.user.as_deref(), Some("mon"));
    }

    #[test]
    fn refresh_out_of_range_is_rejected() {
        assert!(Args::try_parse_from(["pgtop", "--refresh", "0.1"]).is_err());
        let args = Args::try_parse_from(["pgtop", "--refresh", "1.3", "-U", "x"]).unwrap();
        assert_eq!(build_config(&args).unwrap().refresh, 1.5);
    }

    #[test]
    fn bad_filter_is_a_config_error() {
        let args = Args::try_parse_from(["pgtop", "--filter", "dbname:(", "-U", "x"]).unwrap();
        assert!(matches!(
            build_config(&args),
            Err(ConfigError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn header_and_column_flags() {
        let args = Args::try_parse_from([
            "pgtop",
            "-U",
            "x",
            "--no-sys-info",
            "--hide",
            "appname",
            "--duration-mode",
            "backend",
        ])
        .unwrap();
        let config = build_config(&args).unwrap();
        assert!(!config.header.system);
        assert!(config.header.instance);
        assert!(!config.columns.is_visible(pgtop::view::Column::AppName));
        assert_eq!(
            config.duration_mode,
            pgtop::capability::DurationMode::Backend
        );
    }
}
