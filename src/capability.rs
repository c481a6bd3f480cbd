//! Server capability resolution.
//!
//! Maps a detected server version to an immutable [`ServerProfile`]. Every
//! supported version range is one row of [`TIERS`]; adding support for a new
//! release means adding a row, not a new code path. Query builders read the
//! profile and never compare version numbers themselves.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Oldest server version the dashboard can introspect.
pub const MIN_SUPPORTED_VERSION: i32 = 80200;

/// Database excluded from size aggregation in managed-service mode.
pub const MANAGED_ADMIN_DATABASE: &str = "rdsadmin";

/// Error type for capability resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityError {
    /// The server is older than the oldest known tier.
    UnsupportedVersion { version: String },
    /// The version string could not be understood at all.
    Unparseable(String),
}

impl fmt::Display for CapabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityError::UnsupportedVersion { version } => {
                write!(f, "unsupported server version {}", version)
            }
            CapabilityError::Unparseable(raw) => write!(f, "cannot parse server version '{}'", raw),
        }
    }
}

impl std::error::Error for CapabilityError {}

/// A bucket of server versions sharing one introspection-view shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    Pre90,
    V90,
    V92,
    V96,
    V10,
    V11,
    V12,
    V13,
}

impl Tier {
    pub fn label(self) -> &'static str {
        match self {
            Tier::Pre90 => "pre-9.0",
            Tier::V90 => "9.0-9.1",
            Tier::V92 => "9.2-9.5",
            Tier::V96 => "9.6",
            Tier::V10 => "10",
            Tier::V11 => "11",
            Tier::V12 => "12",
            Tier::V13 => "13+",
        }
    }
}

/// Which backend lifecycle timestamp feeds the displayed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum DurationMode {
    #[default]
    Query,
    Transaction,
    Backend,
}

impl DurationMode {
    /// Next mode in the `T` key cycle.
    pub fn next(self) -> Self {
        match self {
            DurationMode::Query => DurationMode::Transaction,
            DurationMode::Transaction => DurationMode::Backend,
            DurationMode::Backend => DurationMode::Query,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DurationMode::Query => "query",
            DurationMode::Transaction => "transaction",
            DurationMode::Backend => "backend",
        }
    }
}

/// How a backend exposes that it is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitColumn {
    /// Boolean `waiting` column (before 9.6).
    Boolean,
    /// `wait_event` text column (9.6+).
    Event,
}

/// How temporary-file usage can be measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempFileSource {
    Unavailable,
    /// `pg_ls_dir` over the default temp directory (9.1+).
    ListDir,
    /// `pg_ls_tmpdir()` per tablespace (12+).
    LsTmpDir,
}

/// Timestamp columns backing each duration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurationColumns {
    pub query: &'static str,
    pub transaction: &'static str,
    pub backend: &'static str,
}

/// One row of the tier table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSpec {
    pub tier: Tier,
    /// Lowest `server_version_num` covered by this tier.
    pub floor: i32,
    pub pid_column: &'static str,
    pub query_column: &'static str,
    pub has_application_name: bool,
    pub has_state: bool,
    pub wait_column: WaitColumn,
    pub has_wait_event_type: bool,
    pub has_backend_type: bool,
    pub has_leader_pid: bool,
    pub has_blocking_pids: bool,
    pub durations: DurationColumns,
}

const STANDARD_DURATIONS: DurationColumns = DurationColumns {
    query: "query_start",
    transaction: "xact_start",
    backend: "backend_start",
};

/// Tier table ordered by floor, oldest first.
pub const TIERS: &[TierSpec] = &[
    TierSpec {
        tier: Tier::Pre90,
        floor: MIN_SUPPORTED_VERSION,
        pid_column: "procpid",
        query_column: "current_query",
        has_application_name: false,
        has_state: false,
        wait_column: WaitColumn::Boolean,
        has_wait_event_type: false,
        has_backend_type: false,
        has_leader_pid: false,
        has_blocking_pids: false,
        // xact_start appeared in 8.3; the 8.2 floor forces query_start.
        durations: DurationColumns {
            query: "query_start",
            transaction: "query_start",
            backend: "backend_start",
        },
    },
    TierSpec {
        tier: Tier::V90,
        floor: 90000,
        pid_column: "procpid",
        query_column: "current_query",
        has_application_name: true,
        has_state: false,
        wait_column: WaitColumn::Boolean,
        has_wait_event_type: false,
        has_backend_type: false,
        has_leader_pid: false,
        has_blocking_pids: false,
        durations: STANDARD_DURATIONS,
    },
    TierSpec {
        tier: Tier::V92,
        floor: 90200,
        pid_column: "pid",
        query_column: "query",
        has_application_name: true,
        has_state: true,
        wait_column: WaitColumn::Boolean,
        has_wait_event_type: false,
        has_backend_type: false,
        has_leader_pid: false,
        has_blocking_pids: false,
        durations: STANDARD_DURATIONS,
    },
    TierSpec {
        tier: Tier::V96,
        floor: 90600,
        pid_column: "pid",
        query_column: "query",
        has_application_name: true,
        has_state: true,
        wait_column: WaitColumn::Event,
        has_wait_event_type: true,
        has_backend_type: false,
        has_leader_pid: false,
        has_blocking_pids: true,
        durations: STANDARD_DURATIONS,
    },
    TierSpec {
        tier: Tier::V10,
        floor: 100000,
        pid_column: "pid",
        query_column: "query",
        has_application_name: true,
        has_state: true,
        wait_column: WaitColumn::Event,
        has_wait_event_type: true,
        has_backend_type: true,
        has_leader_pid: false,
        has_blocking_pids: true,
        durations: STANDARD_DURATIONS,
    },
    TierSpec {
        tier: Tier::V11,
        floor: 110000,
        pid_column: "pid",
        query_column: "query",
        has_application_name: true,
        has_state: true,
        wait_column: WaitColumn::Event,
        has_wait_event_type: true,
        has_backend_type: true,
        has_leader_pid: false,
        has_blocking_pids: true,
        durations: STANDARD_DURATIONS,
    },
    TierSpec {
        tier: Tier::V12,
        floor: 120000,
        pid_column: "pid",
        query_column: "query",
        has_application_name: true,
        has_state: true,
        wait_column: WaitColumn::Event,
        has_wait_event_type: true,
        has_backend_type: true,
        has_leader_pid: false,
        has_blocking_pids: true,
        durations: STANDARD_DURATIONS,
    },
    TierSpec {
        tier: Tier::V13,
        floor: 130000,
        pid_column: "pid",
        query_column: "query",
        has_application_name: true,
        has_state: true,
        wait_column: WaitColumn::Event,
        has_wait_event_type: true,
        has_backend_type: true,
        has_leader_pid: true,
        has_blocking_pids: true,
        durations: STANDARD_DURATIONS,
    },
];

/// Resolved capabilities of the connected server. Immutable once built;
/// a reconnect produces a fresh profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerProfile {
    spec: TierSpec,
    version_num: i32,
    version: String,
    managed: bool,
}

impl ServerProfile {
    pub fn tier(&self) -> Tier {
        self.spec.tier
    }

    pub fn spec(&self) -> &TierSpec {
        &self.spec
    }

    /// Numeric version, e.g. `150004`.
    pub fn version_num(&self) -> i32 {
        self.version_num
    }

    /// Short display version, e.g. `PostgreSQL 15.4`.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn is_managed(&self) -> bool {
        self.managed
    }

    /// Timestamp column backing the given duration mode.
    pub fn duration_column(&self, mode: DurationMode) -> &'static str {
        match mode {
            DurationMode::Query => self.spec.durations.query,
            DurationMode::Transaction => self.spec.durations.transaction,
            DurationMode::Backend => self.spec.durations.backend,
        }
    }

    pub fn pid_column(&self) -> &'static str {
        self.spec.pid_column
    }

    pub fn query_column(&self) -> &'static str {
        self.spec.query_column
    }

    pub fn has_state(&self) -> bool {
        self.spec.has_state
    }

    pub fn wait_column(&self) -> WaitColumn {
        self.spec.wait_column
    }

    pub fn has_wait_event_type(&self) -> bool {
        self.spec.has_wait_event_type
    }

    pub fn has_backend_type(&self) -> bool {
        self.spec.has_backend_type
    }

    pub fn has_leader_pid(&self) -> bool {
        self.spec.has_leader_pid
    }

    pub fn has_blocking_pids(&self) -> bool {
        self.spec.has_blocking_pids
    }

    pub fn has_application_name(&self) -> bool {
        self.spec.has_application_name
    }

    /// `backend_xmin` exists from 9.4 on, inside the 9.2 tier.
    pub fn has_xmin(&self) -> bool {
        self.version_num >= 90400
    }

    /// Tuple counters in `pg_stat_database` exist from 8.3.
    pub fn has_tuple_counters(&self) -> bool {
        self.version_num >= 80300
    }

    pub fn has_autovacuum_max_workers(&self) -> bool {
        self.version_num >= 80300
    }

    /// `pg_locks.virtualxid` exists from 8.3.
    pub fn has_virtualxid(&self) -> bool {
        self.version_num >= 80300
    }

    pub fn has_max_worker_processes(&self) -> bool {
        self.version_num >= 90400
    }

    pub fn has_logical_replication_workers(&self) -> bool {
        self.spec.has_backend_type
    }

    pub fn has_parallel_workers(&self) -> bool {
        self.spec.has_backend_type
    }

    pub fn has_wal_senders(&self) -> bool {
        self.version_num >= 90100
    }

    pub fn has_wal_receivers(&self) -> bool {
        self.version_num >= 90600
    }

    pub fn has_replication_slot_count(&self) -> bool {
        self.version_num >= 140000
    }

    /// `pg_ls_dir(dir, missing_ok, include_dot_dirs)` form exists from 9.5.
    pub fn has_ls_dir_missing_ok(&self) -> bool {
        self.version_num >= 90500
    }

    /// `pg_terminate_backend` exists from 8.4; older servers only cancel.
    pub fn can_terminate(&self) -> bool {
        self.version_num >= 80400
    }

    pub fn has_log_min_duration_sample(&self) -> bool {
        self.version_num >= 130000
    }

    /// Temp-file introspection is never attempted in managed-service mode.
    pub fn temp_file_source(&self) -> TempFileSource {
        if self.managed {
            TempFileSource::Unavailable
        } else if self.version_num >= 120000 {
            TempFileSource::LsTmpDir
        } else if self.version_num >= 90100 {
            TempFileSource::ListDir
        } else {
            TempFileSource::Unavailable
        }
    }

    /// Database left out of size aggregation, if any.
    pub fn excluded_size_database(&self) -> Option<&'static str> {
        self.managed.then_some(MANAGED_ADMIN_DATABASE)
    }
}

/// Resolves a profile from a raw version string.
///
/// Accepts either `server_version_num` output (`"150004"`) or `version()`
/// output (`"PostgreSQL 15.4 on x86_64-pc-linux-gnu, ..."`).
pub fn resolve(raw_version: &str, managed: bool) -> Result<ServerProfile, CapabilityError> {
    let version_num = parse_version_num(raw_version)?;
    resolve_num(version_num, &short_version(raw_version), managed)
}

/// Resolves a profile from an already-parsed numeric version.
pub fn resolve_num(
    version_num: i32,
    display: &str,
    managed: bool,
) -> Result<ServerProfile, CapabilityError> {
    let version = if display.is_empty() || display.chars().all(|c| c.is_ascii_digit()) {
        format_version_num(version_num)
    } else {
        display.to_string()
    };

    let spec = TIERS
        .iter()
        .rev()
        .find(|t| t.floor <= version_num)
        .ok_or_else(|| CapabilityError::UnsupportedVersion {
            version: version.clone(),
        })?;

    Ok(ServerProfile {
        spec: *spec,
        version_num,
        version,
        managed,
    })
}

/// Parses a numeric server version out of either supported raw form.
pub fn parse_version_num(raw: &str) -> Result<i32, CapabilityError> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw
            .parse()
            .map_err(|_| CapabilityError::Unparseable(raw.to_string()));
    }

    let token = raw
        .split_whitespace()
        .find(|t| t.starts_with(|c: char| c.is_ascii_digit()))
        .ok_or_else(|| CapabilityError::Unparseable(raw.to_string()))?;

    // Strip suffixes like "devel", "beta2", "rc1" and trailing commas.
    let numeric: String = token
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let parts: Vec<i32> = numeric
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<i32>())
        .collect::<Result<_, _>>()
        .map_err(|_| CapabilityError::Unparseable(raw.to_string()))?;

    let num = match parts.as_slice() {
        [] => None,
        // 10+ uses two-part versions: major.minor
        [major, rest @ ..] if *major >= 10 => combine(*major, 0, rest.first().copied().unwrap_or(0)),
        [major, minor, rest @ ..] => combine(*major, *minor, rest.first().copied().unwrap_or(0)),
        [major] => combine(*major, 0, 0),
    };
    num.ok_or_else(|| CapabilityError::Unparseable(raw.to_string()))
}

/// `major * 10000 + minor * 100 + patch`, `None` on overflow.
fn combine(major: i32, minor: i32, patch: i32) -> Option<i32> {
    major
        .checked_mul(10000)?
        .checked_add(minor.checked_mul(100)?)?
        .checked_add(patch)
}

static SHORT_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w+ [\d.]+(devel|beta[0-9]+|rc[0-9]+)?").expect("static regex")
});

/// Shortens `version()` output to its leading product and version words.
///
/// `"PostgreSQL 9.6.24 on x86_64-pc-linux-gnu"` becomes `"PostgreSQL 9.6.24"`,
/// `"PostgreSQL 16devel on ..."` keeps the `devel` suffix.
pub fn short_version(full: &str) -> String {
    let full = full.trim();
    SHORT_VERSION
        .find(full)
        .map_or(full, |m| m.as_str())
        .to_string()
}

fn format_version_num(num: i32) -> String {
    if num >= 100000 {
        format!("{}.{}", num / 10000, num % 10000)
    } else {
        format!("{}.{}.{}", num / 10000, (num / 100) % 100, num % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered_by_floor() {
        for pair in TIERS.windows(2) {
            assert!(pair[0].floor < pair[1].floor);
            assert!(pair[0].tier < pair[1].tier);
        }
    }

    #[test]
    fn picks_highest_tier_not_above_version() {
        let cases = [
            (80200, Tier::Pre90),
            (80400, Tier::Pre90),
            (90000, Tier::V90),
            (90124, Tier::V90),
            (90200, Tier::V92),
            (90524, Tier::V92),
            (90600, Tier::V96),
            (100023, Tier::V10),
            (110022, Tier::V11),
            (120017, Tier::V12),
            (130000, Tier::V13),
            (170002, Tier::V13),
        ];
        for (num, tier) in cases {
            let profile = resolve_num(num, "", false).unwrap();
            assert_eq!(profile.tier(), tier, "version {}", num);
        }
    }

    #[test]
    fn rejects_versions_below_oldest_tier() {
        let err = resolve("80104", false).unwrap_err();
        assert!(matches!(err, CapabilityError::UnsupportedVersion { .. }));
        assert!(err.to_string().contains("8.1.4"));
    }

    #[test]
    fn parses_version_text() {
        assert_eq!(
            parse_version_num("PostgreSQL 9.6.24 on x86_64-pc-linux-gnu").unwrap(),
            90624
        );
        assert_eq!(parse_version_num("PostgreSQL 15.4 (Debian)").unwrap(), 150004);
        assert_eq!(parse_version_num("PostgreSQL 16devel").unwrap(), 160000);
        assert_eq!(parse_version_num("PostgreSQL 14beta1, compiled").unwrap(), 140000);
        assert_eq!(parse_version_num("110005").unwrap(), 110005);
        assert!(parse_version_num("garbage").is_err());
    }

    #[test]
    fn oversized_versions_are_unparseable() {
        assert!(matches!(
            parse_version_num("PostgreSQL 2147483647"),
            Err(CapabilityError::Unparseable(_))
        ));
        assert!(matches!(
            parse_version_num("9.99999999.1"),
            Err(CapabilityError::Unparseable(_))
        ));
        assert!(matches!(
            parse_version_num("99999999999"),
            Err(CapabilityError::Unparseable(_))
        ));
        assert_eq!(parse_version_num("16.2").unwrap(), 160002);
    }

    #[test]
    fn short_version_keeps_suffix() {
        assert_eq!(
            short_version("PostgreSQL 9.6.24 on x86_64-pc-linux-gnu, compiled by gcc"),
            "PostgreSQL 9.6.24"
        );
        assert_eq!(short_version("PostgreSQL 16devel on x86_64"), "PostgreSQL 16devel");
        assert_eq!(short_version("PostgreSQL 14rc1 on aarch64"), "PostgreSQL 14rc1");
    }

    #[test]
    fn legacy_tiers_substitute_columns() {
        let old = resolve_num(90105, "", false).unwrap();
        assert_eq!(old.pid_column(), "procpid");
        assert_eq!(old.query_column(), "current_query");
        assert!(!old.has_state());

        let oldest = resolve_num(80200, "", false).unwrap();
        assert_eq!(oldest.duration_column(DurationMode::Transaction), "query_start");

        let modern = resolve_num(150000, "", false).unwrap();
        assert_eq!(modern.pid_column(), "pid");
        assert_eq!(modern.duration_column(DurationMode::Query), "query_start");
        assert_eq!(modern.duration_column(DurationMode::Transaction), "xact_start");
        assert_eq!(modern.duration_column(DurationMode::Backend), "backend_start");
    }

    #[test]
    fn optional_columns_follow_tier() {
        let v96 = resolve_num(90600, "", false).unwrap();
        assert!(v96.has_wait_event_type());
        assert!(!v96.has_backend_type());
        assert!(!v96.has_leader_pid());

        let v10 = resolve_num(100000, "", false).unwrap();
        assert!(v10.has_backend_type());
        assert!(!v10.has_leader_pid());

        let v13 = resolve_num(130001, "", false).unwrap();
        assert!(v13.has_leader_pid());
    }

    #[test]
    fn managed_mode_disables_temp_files() {
        let plain = resolve_num(150000, "", false).unwrap();
        assert_eq!(plain.temp_file_source(), TempFileSource::LsTmpDir);
        assert_eq!(plain.excluded_size_database(), None);

        let managed = resolve_num(150000, "", true).unwrap();
        assert_eq!(managed.temp_file_source(), TempFileSource::Unavailable);
        assert_eq!(managed.excluded_size_database(), Some("rdsadmin"));
    }

    #[test]
    fn duration_mode_cycles() {
        let mode = DurationMode::default();
        assert_eq!(mode, DurationMode::Query);
        assert_eq!(mode.next().next().next(), DurationMode::Query);
    }
}
