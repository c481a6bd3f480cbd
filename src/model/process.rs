//! Backend session rows.

/// How a backend reports that it is waiting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WaitInfo {
    #[default]
    None,
    /// Boolean `waiting` flag set (servers before 9.6).
    Waiting,
    /// Wait event with its optional event type (9.6+).
    Event {
        kind: Option<String>,
        name: String,
    },
}

impl WaitInfo {
    /// True when the backend waits on a heavyweight lock.
    pub fn is_lock_wait(&self) -> bool {
        match self {
            WaitInfo::None => false,
            WaitInfo::Waiting => true,
            WaitInfo::Event { kind, .. } => kind.as_deref() == Some("Lock"),
        }
    }

    /// Short text for the WAIT column.
    pub fn label(&self) -> String {
        match self {
            WaitInfo::None => String::new(),
            WaitInfo::Waiting => "Y".to_string(),
            WaitInfo::Event { name, .. } => name.clone(),
        }
    }
}

/// One server backend as seen in `pg_stat_activity`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcessRow {
    pub pid: i32,
    pub xmin: Option<i64>,
    pub database: Option<String>,
    pub user: Option<String>,
    /// Client address; `None` for Unix-socket connections.
    pub client: Option<String>,
    pub application_name: String,
    /// Decoded query text; `None` for idle backends on legacy servers.
    pub query: Option<String>,
    pub state: String,
    pub wait: WaitInfo,
    /// Seconds since the duration-mode timestamp.
    pub duration: Option<f64>,
    pub is_parallel_worker: bool,
    pub leader_pid: Option<i32>,
    /// Backend start as a Unix epoch, used to detect pid reuse.
    pub backend_start: Option<f64>,
}

impl ProcessRow {
    pub fn is_idle(&self) -> bool {
        self.state == "idle"
    }
}
