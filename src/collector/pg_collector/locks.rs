//! Lock rows from `pg_locks`.

use postgres::Row;

use crate::model::{LockLink, LockRow};

use super::queries::{build_blocking_locks_query, build_waiting_locks_query};
use super::{ActivitySource, SourceError};

/// Which side of the lock graph to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// Ungranted requests with the pids holding the contended lock.
    WaitingOnly,
    /// Granted locks with the pids waiting for them.
    BlockingGraph,
}

impl ActivitySource {
    pub fn fetch_locks(&mut self, scope: LockScope) -> Result<Vec<LockRow>, SourceError> {
        let result = {
            let (client, profile) = self.session()?;
            let query = match scope {
                LockScope::WaitingOnly => build_waiting_locks_query(profile),
                LockScope::BlockingGraph => build_blocking_locks_query(profile),
            };
            client.query(query.as_str(), &[]).map(|rows| {
                rows.iter()
                    .map(|row| lock_from_row(row, scope))
                    .collect::<Vec<_>>()
            })
        };
        result.map_err(|e| self.fail(&e))
    }
}

fn lock_from_row(row: &Row, scope: LockScope) -> LockRow {
    let mut linked: Vec<i32> = row
        .try_get::<_, Option<Vec<i32>>>("linked")
        .unwrap_or_default()
        .unwrap_or_default();
    linked.sort_unstable();
    linked.dedup();

    LockRow {
        pid: row.get("pid"),
        relation: row.try_get("relation").unwrap_or_default(),
        mode: row.try_get("mode").unwrap_or_default(),
        lock_type: row.try_get("locktype").unwrap_or_default(),
        link: link_for(scope, linked),
    }
}

fn link_for(scope: LockScope, pids: Vec<i32>) -> LockLink {
    match scope {
        LockScope::WaitingOnly => LockLink::WaitingOn(pids),
        LockScope::BlockingGraph => LockLink::Blocking(pids),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_selects_link_direction() {
        let waiting = link_for(LockScope::WaitingOnly, vec![1, 2]);
        assert_eq!(waiting, LockLink::WaitingOn(vec![1, 2]));
        let blocking = link_for(LockScope::BlockingGraph, vec![3]);
        assert_eq!(blocking, LockLink::Blocking(vec![3]));
    }
}
