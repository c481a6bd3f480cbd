//! Refresh scheduler: when to fetch, when to reconnect.
//!
//! The scheduler holds no connection and does no I/O; the dashboard loop
//! asks [`Scheduler::poll`] what is due at `now` and reports the outcome
//! back. Quitting is checked by the loop between polls, so a fetch that has
//! started always completes.

use std::time::{Duration, Instant};

/// Shortest refresh interval in seconds.
pub const MIN_INTERVAL: f64 = 0.5;
/// Longest refresh interval in seconds.
pub const MAX_INTERVAL: f64 = 5.0;
/// Runtime adjustment step in seconds.
pub const INTERVAL_STEP: f64 = 0.5;

/// How long a computed total database size is reused.
pub const SIZE_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

/// First reconnect delay; doubles per failed attempt.
const BASE_BACKOFF: Duration = Duration::from_secs(1);
/// Upper bound for the reconnect delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Clamps an interval to `[MIN_INTERVAL, MAX_INTERVAL]` on the step grid.
pub fn snap_interval(secs: f64) -> f64 {
    if !secs.is_finite() {
        return MIN_INTERVAL;
    }
    let snapped = (secs / INTERVAL_STEP).round() * INTERVAL_STEP;
    snapped.clamp(MIN_INTERVAL, MAX_INTERVAL)
}

/// Reconnect delay after `attempt` failures.
pub fn backoff(attempt: u32) -> Duration {
    BASE_BACKOFF
        .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
        .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
}

/// What the loop should do now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// Nothing; wait for input until [`Scheduler::next_wakeup`].
    Idle,
    /// Run one fetch cycle.
    Fetch,
    /// Try to reconnect.
    Reconnect,
}

#[derive(Debug, Clone, Copy)]
struct Reconnect {
    attempt: u32,
    next_at: Instant,
}

#[derive(Debug)]
pub struct Scheduler {
    interval: f64,
    paused: bool,
    last_fetch: Option<Instant>,
    refresh_requested: bool,
    size_disabled: bool,
    size_requested: bool,
    last_size: Option<Instant>,
    reconnect: Option<Reconnect>,
}

impl Scheduler {
    /// `skip_db_size` never recomputes the total database size.
    pub fn new(interval_secs: f64, skip_db_size: bool) -> Self {
        Self {
            interval: snap_interval(interval_secs),
            paused: false,
            last_fetch: None,
            refresh_requested: false,
            size_disabled: skip_db_size,
            size_requested: false,
            last_size: None,
            reconnect: None,
        }
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval)
    }

    /// Lengthens the interval by one step (`+`).
    pub fn slower(&mut self) {
        self.interval = snap_interval(self.interval + INTERVAL_STEP);
    }

    /// Shortens the interval by one step (`-`).
    pub fn faster(&mut self) {
        self.interval = snap_interval(self.interval - INTERVAL_STEP);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Returns the new paused flag.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    /// Fetch at the next poll, bypassing the interval and pause.
    pub fn request_refresh(&mut self) {
        self.refresh_requested = true;
    }

    /// Recompute the database size with the next fetch, which is immediate.
    pub fn request_size_refresh(&mut self) {
        self.size_requested = true;
        self.refresh_requested = true;
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Failed reconnect attempts so far.
    pub fn reconnect_attempt(&self) -> Option<u32> {
        self.reconnect.map(|r| r.attempt)
    }

    pub fn poll(&self, now: Instant) -> Due {
        if let Some(reconnect) = self.reconnect {
            return if self.refresh_requested || now >= reconnect.next_at {
                Due::Reconnect
            } else {
                Due::Idle
            };
        }
        if self.refresh_requested {
            return Due::Fetch;
        }
        if self.paused {
            return Due::Idle;
        }
        match self.last_fetch {
            Some(last) if now.saturating_duration_since(last) < self.interval() => Due::Idle,
            _ => Due::Fetch,
        }
    }

    /// Time until something becomes due; the input wait timeout.
    pub fn next_wakeup(&self, now: Instant) -> Duration {
        if self.refresh_requested {
            return Duration::ZERO;
        }
        if let Some(reconnect) = self.reconnect {
            return reconnect.next_at.saturating_duration_since(now);
        }
        if self.paused {
            return self.interval();
        }
        match self.last_fetch {
            Some(last) => (last + self.interval()).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// True when the next fetch should reuse the cached database size.
    pub fn skip_size(&self, now: Instant) -> bool {
        if self.size_disabled {
            return true;
        }
        if self.size_requested {
            return false;
        }
        self.last_size
            .is_some_and(|at| now.saturating_duration_since(at) < SIZE_REFRESH_INTERVAL)
    }

    /// Records a completed fetch cycle.
    pub fn fetched(&mut self, now: Instant, size_computed: bool) {
        self.last_fetch = Some(now);
        self.refresh_requested = false;
        if size_computed {
            self.last_size = Some(now);
            self.size_requested = false;
        }
    }

    /// Enters reconnect mode; the first attempt comes after the base delay.
    pub fn connection_lost(&mut self, now: Instant) {
        if self.reconnect.is_none() {
            self.reconnect = Some(Reconnect {
                attempt: 0,
                next_at: now + backoff(0),
            });
        }
        self.refresh_requested = false;
    }

    pub fn reconnect_failed(&mut self, now: Instant) {
        let attempt = self.reconnect.map_or(0, |r| r.attempt) + 1;
        self.reconnect = Some(Reconnect {
            attempt,
            next_at: now + backoff(attempt),
        });
        self.refresh_requested = false;
    }

    /// Leaves reconnect mode and asks for an immediate full fetch.
    pub fn reconnected(&mut self) {
        self.reconnect = None;
        self.refresh_requested = true;
        self.size_requested = true;
    }
}
