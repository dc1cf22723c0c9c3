//! Repeating timers driven by the event loop clock.
//!
//! The registry never sleeps or spawns; the loop asks which timers are due at
//! `now` and each due timer is rescheduled one interval after the tick that
//! fired it.

use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Swap the focal item.
    FocalRefresh,
    /// Spawn a decorative flash item.
    FlashSpawn,
}

#[derive(Clone, Debug)]
struct Repeating {
    kind: TimerKind,
    interval: Duration,
    next_due: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct TimerRegistry {
    timers: Vec<Repeating>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) `kind`, first firing one interval from `now`.
    pub fn start(&mut self, kind: TimerKind, interval: Duration, now: Instant) {
        self.cancel(kind);
        self.timers.push(Repeating {
            kind,
            interval,
            next_due: now + interval,
        });
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        self.timers.retain(|timer| timer.kind != kind);
    }

    pub fn cancel_all(&mut self) {
        self.timers.clear();
    }

    pub fn is_active(&self, kind: TimerKind) -> bool {
        self.timers.iter().any(|timer| timer.kind == kind)
    }

    pub fn is_idle(&self) -> bool {
        self.timers.is_empty()
    }

    /// Timers due at `now`, in registration order. A timer that fell several
    /// intervals behind fires once; missed ticks are not replayed.
    pub fn due(&mut self, now: Instant) -> Vec<TimerKind> {
        let mut fired = Vec::new();
        for timer in &mut self.timers {
            if now >= timer.next_due {
                fired.push(timer.kind);
                timer.next_due = now + timer.interval;
            }
        }
        fired
    }

    /// Earliest pending deadline, used to bound the input poll.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.iter().map(|timer| timer.next_due).min()
    }
}
