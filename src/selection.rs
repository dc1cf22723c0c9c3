//! The start / stop / again lifecycle of a pick.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::Rng;

use crate::resolver::CandidateList;
use crate::timers::{TimerKind, TimerRegistry};

pub const HISTORY_CAPACITY: usize = 10;
pub const FOCAL_REFRESH_INTERVAL: Duration = Duration::from_millis(100);
pub const FLASH_SPAWN_INTERVAL: Duration = Duration::from_millis(200);
pub const FLASH_LIFETIME: Duration = Duration::from_millis(1600);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    Idle,
    Running,
    Stopped,
}

impl SelectionState {
    pub fn button_label(self) -> &'static str {
        match self {
            SelectionState::Idle => "Start",
            SelectionState::Running => "Stop",
            SelectionState::Stopped => "Again",
        }
    }
}

/// Past picks, most recent first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct History {
    entries: VecDeque<String>,
}

impl History {
    pub fn push(&mut self, item: String) {
        self.entries.push_front(item);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

/// Short-lived background name shown while a pick is running. Purely cosmetic.
#[derive(Clone, Debug, PartialEq)]
pub struct FlashItem {
    pub text: String,
    /// Horizontal position, percent of the play area.
    pub x_percent: f32,
    /// Vertical position, percent of the play area.
    pub y_percent: f32,
    pub size: f32,
    pub born_at: Instant,
}

impl FlashItem {
    fn spawn<R: Rng + ?Sized>(text: &str, rng: &mut R, now: Instant) -> Self {
        Self {
            text: text.to_string(),
            x_percent: rng.random_range(5.0..90.0),
            y_percent: rng.random_range(10.0..80.0),
            size: rng.random_range(22.0..38.0),
            born_at: now,
        }
    }

    /// Fraction of the lifetime already elapsed, clamped to `0.0..=1.0`.
    pub fn progress(&self, now: Instant) -> f32 {
        let age = now.saturating_duration_since(self.born_at);
        (age.as_secs_f32() / FLASH_LIFETIME.as_secs_f32()).min(1.0)
    }

    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.born_at) >= FLASH_LIFETIME
    }
}

/// Owns the pick state, the focal item, the history and the running timers.
///
/// History only changes when a running pick is stopped, and no timer is left
/// registered outside the running state.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    state: SelectionState,
    focal: Option<String>,
    history: History,
    timers: TimerRegistry,
    flashes: Vec<FlashItem>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SelectionState {
        self.state
    }

    pub fn focal(&self) -> Option<&str> {
        self.focal.as_deref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn flashes(&self) -> &[FlashItem] {
        &self.flashes
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    /// The single button action: start, stop, or start again.
    pub fn advance<R: Rng + ?Sized>(
        &mut self,
        candidates: &CandidateList,
        rng: &mut R,
        now: Instant,
    ) -> SelectionState {
        match self.state {
            SelectionState::Idle | SelectionState::Stopped => self.start(candidates, rng, now),
            SelectionState::Running => self.stop(),
        }
        tracing::debug!(state = ?self.state, focal = ?self.focal, "selection advanced");
        self.state
    }

    fn start<R: Rng + ?Sized>(&mut self, candidates: &CandidateList, rng: &mut R, now: Instant) {
        self.focal = Some(candidates.pick(rng).to_string());
        self.timers
            .start(TimerKind::FocalRefresh, FOCAL_REFRESH_INTERVAL, now);
        self.timers
            .start(TimerKind::FlashSpawn, FLASH_SPAWN_INTERVAL, now);
        self.state = SelectionState::Running;
    }

    fn stop(&mut self) {
        self.timers.cancel_all();
        self.state = SelectionState::Stopped;
        if let Some(focal) = &self.focal {
            tracing::info!(pick = %focal, "pick stopped");
            self.history.push(focal.clone());
        }
    }

    /// Advance the clock: drop expired flashes and fire due timers.
    /// Returns whether anything visible changed.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        candidates: &CandidateList,
        rng: &mut R,
        now: Instant,
    ) -> bool {
        let before = self.flashes.len();
        self.flashes.retain(|flash| !flash.expired(now));
        let mut changed = self.flashes.len() != before;

        for kind in self.timers.due(now) {
            match kind {
                TimerKind::FocalRefresh => {
                    self.focal = Some(candidates.pick(rng).to_string());
                }
                TimerKind::FlashSpawn => {
                    let text = candidates.pick(rng).to_string();
                    self.flashes.push(FlashItem::spawn(&text, rng, now));
                }
            }
            changed = true;
        }
        changed
    }
}
