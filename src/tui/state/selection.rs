//! Tagged pids for batch control actions.

use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pids: BTreeSet<i32>,
}

impl Selection {
    /// Tags or untags `pid`; returns true when it is now tagged.
    pub fn toggle(&mut self, pid: i32) -> bool {
        if self.pids.remove(&pid) {
            false
        } else {
            self.pids.insert(pid);
            true
        }
    }

    pub fn contains(&self, pid: i32) -> bool {
        self.pids.contains(&pid)
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn clear(&mut self) {
        self.pids.clear();
    }

    /// Drops pids absent from `present`; returns how many were dropped.
    pub fn retain_present(&mut self, present: &HashSet<i32>) -> usize {
        let before = self.pids.len();
        self.pids.retain(|pid| present.contains(pid));
        before - self.pids.len()
    }

    /// Tagged pids in ascending order.
    pub fn pids(&self) -> Vec<i32> {
        self.pids.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_twice_untags() {
        let mut s = Selection::default();
        assert!(s.toggle(7));
        assert!(s.contains(7));
        assert!(!s.toggle(7));
        assert!(s.is_empty());
    }

    #[test]
    fn retain_drops_vanished_pids() {
        let mut s = Selection::default();
        for pid in [5, 1, 9] {
            s.toggle(pid);
        }
        let present: HashSet<i32> = [1, 9, 12].into_iter().collect();
        assert_eq!(s.retain_present(&present), 1);
        assert_eq!(s.pids(), vec![1, 9]);
    }
}
