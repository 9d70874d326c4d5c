//! Timers owned by a session and checked once per frame.
//!
//! Time is passed in explicitly as seconds from any monotonic clock.

use serde::{Deserialize, Serialize};

/// Identifies a timer within its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(u32);

#[derive(Debug, Clone)]
struct Timer {
    id: TimerId,
    start: f64,
    timeout: f64,
    periodic: bool,
    expired: bool,
    paused_at: Option<f64>,
}

impl Timer {
    fn check(&mut self, now: f64) -> bool {
        if self.expired || self.paused_at.is_some() || now - self.start < self.timeout {
            return false;
        }
        if self.periodic {
            self.start = now;
        } else {
            self.expired = true;
        }
        true
    }

    fn pause(&mut self, now: f64) {
        if !self.expired && self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    fn unpause(&mut self, now: f64) {
        if let Some(paused_at) = self.paused_at.take() {
            self.start += now - paused_at;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimerScheduler {
    timers: Vec<Timer>,
    next_id: u32,
    paused: bool,
}

impl TimerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a timer that fires `timeout` seconds after `now`, repeating if `periodic`.
    ///
    /// A timer armed while the scheduler is paused starts paused.
    pub fn set(&mut self, timeout: f64, periodic: bool, now: f64) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let mut timer = Timer {
            id,
            start: now,
            timeout,
            periodic,
            expired: false,
            paused_at: None,
        };
        if self.paused {
            timer.pause(now);
        }
        self.timers.push(timer);
        id
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    /// Fires every due timer and returns their ids in arming order.
    pub fn check_all(&mut self, now: f64) -> Vec<TimerId> {
        self.timers
            .iter_mut()
            .filter_map(|t| t.check(now).then_some(t.id))
            .collect()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_all(&mut self, now: f64) {
        self.paused = true;
        for timer in &mut self.timers {
            timer.pause(now);
        }
    }

    /// Resumes all timers, shifting their deadlines by the time spent paused.
    pub fn unpause_all(&mut self, now: f64) {
        self.paused = false;
        for timer in &mut self.timers {
            timer.unpause(now);
        }
    }

    pub fn toggle_pause_all(&mut self, now: f64) {
        if self.paused {
            self.unpause_all(now);
        } else {
            self.pause_all(now);
        }
    }
}
