//! Caller-side reference to a registered timer
//!
//! A handle is just an id plus the service that issued it. Once the service
//! drops the timer every accessor returns `None`/`false` and every mutator is
//! a no-op.

use std::fmt;

use tickwork_types::{Easing, TimeBase, TimerId, TimerKind, TimerState};

use super::service::{TimerService, lock};
use super::timer::{Timer, TimerSnapshot};

#[derive(Clone)]
pub struct TimerHandle {
    id: TimerId,
    service: TimerService,
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerHandle").field("id", &self.id).finish()
    }
}

impl TimerHandle {
    pub(crate) fn new(id: TimerId, service: TimerService) -> Self {
        Self { id, service }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// The service this timer is registered with
    pub fn service(&self) -> &TimerService {
        &self.service
    }

    pub fn is_alive(&self) -> bool {
        self.service.slot(self.id).is_some()
    }

    fn with_timer<R>(&self, f: impl FnOnce(&mut Timer) -> R) -> Option<R> {
        let slot = self.service.slot(self.id)?;
        let mut timer = lock(&slot.timer);
        Some(f(&mut timer))
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn name(&self) -> Option<String> {
        self.service.slot(self.id).map(|slot| slot.name.clone())
    }

    pub fn state(&self) -> Option<TimerState> {
        self.with_timer(|t| t.state)
    }

    pub fn kind(&self) -> Option<TimerKind> {
        self.with_timer(|t| t.kind)
    }

    pub fn time_base(&self) -> Option<TimeBase> {
        self.with_timer(|t| t.time_base)
    }

    /// Descriptive only; processing order does not depend on it
    pub fn priority(&self) -> Option<i8> {
        self.with_timer(|t| t.priority)
    }

    pub fn easing(&self) -> Option<Easing> {
        self.with_timer(|t| t.easing)
    }

    pub fn total_iterations(&self) -> Option<i32> {
        self.with_timer(|t| t.total_iterations)
    }

    pub fn remaining_iterations(&self) -> Option<i32> {
        self.with_timer(|t| t.remaining_iterations)
    }

    pub fn completed_iterations(&self) -> Option<i32> {
        self.with_timer(|t| t.completed_iterations)
    }

    pub fn groups(&self) -> Vec<String> {
        self.with_timer(|t| t.groups.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Eased progress toward the next firing at `tick`/`time`
    pub fn progress(&self, tick: u64, time: f64) -> Option<f64> {
        let scale = self.service.time_scale();
        self.with_timer(|t| t.progress(tick, time, scale))
    }

    pub fn snapshot(&self) -> Option<TimerSnapshot> {
        let slot = self.service.slot(self.id)?;
        let snapshot = lock(&slot.timer).snapshot(slot.id, &slot.name);
        Some(snapshot)
    }

    // ─── State Changes ──────────────────────────────────────────────────────

    /// Running → Paused; ignored in any other state
    pub fn pause(&self) {
        self.with_timer(Timer::pause);
    }

    /// Paused → Running; the start point is kept, so paused time still counts
    pub fn resume(&self) {
        self.with_timer(Timer::resume);
    }

    /// Restart from `tick`/`time` with the full iteration budget, from any state
    pub fn reset(&self, tick: u64, time: f64) {
        self.with_timer(|t| t.reset(tick, time));
    }

    /// The timer is dropped by the next `process_all`
    pub fn cancel(&self) {
        self.with_timer(Timer::cancel);
    }

    /// Run one processing step for this timer alone.
    ///
    /// Returns whether the timer wants to stay registered. Removal and
    /// chaining only happen in [`TimerService::process_all`].
    pub fn process(&self, tick: u64, time: f64) -> bool {
        match self.service.slot(self.id) {
            Some(slot) => self.service.process_slot(&slot, tick, time),
            None => false,
        }
    }

    // ─── Groups & Chaining ──────────────────────────────────────────────────

    pub fn add_to_group(&self, group: &str) -> bool {
        self.service.add_to_group(self.id, group)
    }

    pub fn remove_from_group(&self, group: &str) -> bool {
        self.service.remove_from_group(self.id, group)
    }

    /// Start `next` when this timer completes
    pub fn chain_to(&self, next: &TimerHandle) -> bool {
        self.service.chain(self.id, next.id)
    }
}
