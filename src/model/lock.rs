//! Heavyweight lock rows from `pg_locks`.

/// How a lock row relates to other backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockLink {
    /// The backend waits for this lock; pids currently holding it.
    WaitingOn(Vec<i32>),
    /// The backend holds this lock; pids waiting for it.
    Blocking(Vec<i32>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRow {
    pub pid: i32,
    pub relation: Option<String>,
    pub mode: String,
    pub lock_type: String,
    pub link: LockLink,
}

impl LockRow {
    /// An ungranted lock request.
    pub fn is_waiting(&self) -> bool {
        matches!(self.link, LockLink::WaitingOn(_))
    }

    /// A granted lock that at least one other backend waits for.
    pub fn is_blocking(&self) -> bool {
        matches!(&self.link, LockLink::Blocking(waiters) if !waiters.is_empty())
    }

    pub fn linked_pids(&self) -> &[i32] {
        match &self.link {
            LockLink::WaitingOn(pids) | LockLink::Blocking(pids) => pids,
        }
    }
}
