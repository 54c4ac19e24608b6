//! Fluent timer configuration
//!
//! `TimerBuilder` is the only way to create a timer. Invalid input is
//! normalised rather than rejected: repeat counts below 1 become 1, empty
//! group names are dropped and an empty name falls back to `Timer_<id>`.

use std::collections::BTreeSet;
use std::sync::Arc;

use tickwork_types::{Easing, TimeBase, TimeValue, TimerKind, TimerState};

use super::chain::{ChainFactory, ChainLink};
use super::handle::TimerHandle;
use super::service::TimerService;
use super::timer::{Timer, TimerCallback};

#[must_use = "a timer is only registered once `build` is called"]
pub struct TimerBuilder {
    service: TimerService,
    name: Option<String>,
    kind: TimerKind,
    time_base: TimeBase,
    delay: TimeValue,
    repeat_count: i32,
    easing: Easing,
    priority: i8,
    callback: Option<TimerCallback>,
    on_progress: Option<Arc<super::timer::ProgressFn>>,
    groups: BTreeSet<String>,
    chain_factory: Option<ChainFactory>,
}

impl TimerBuilder {
    pub(crate) fn new(service: TimerService) -> Self {
        Self {
            service,
            name: None,
            kind: TimerKind::Once,
            time_base: TimeBase::Tick,
            delay: TimeValue::from_ticks(0),
            repeat_count: 1,
            easing: Easing::Linear,
            priority: 0,
            callback: None,
            on_progress: None,
            groups: BTreeSet::new(),
            chain_factory: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    // ─── Timing ─────────────────────────────────────────────────────────────

    /// Delay in ticks; switches the timer to the tick base
    pub fn delay_ticks(mut self, ticks: u64) -> Self {
        self.delay = TimeValue::from_ticks(ticks);
        self.time_base = TimeBase::Tick;
        self
    }

    /// Delay in seconds; switches the timer to the time base
    pub fn delay_seconds(mut self, seconds: f64) -> Self {
        self.delay = TimeValue::from_seconds(seconds);
        self.time_base = TimeBase::Time;
        self
    }

    /// Delay in whichever representation `delay` carries
    pub fn delay(self, delay: TimeValue) -> Self {
        match delay {
            TimeValue::Ticks(ticks) => self.delay_ticks(ticks),
            TimeValue::Seconds(seconds) => self.delay_seconds(seconds),
        }
    }

    /// Override the time base without touching the delay value
    pub fn time_base(mut self, time_base: TimeBase) -> Self {
        self.time_base = time_base;
        self
    }

    pub fn kind(mut self, kind: TimerKind) -> Self {
        self.kind = kind;
        self
    }

    /// Number of firings for `Repeat` timers (values below 1 become 1)
    pub fn repeat_count(mut self, count: i32) -> Self {
        self.repeat_count = count.max(1);
        self
    }

    pub fn easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn priority(mut self, priority: i8) -> Self {
        self.priority = priority;
        self
    }

    /// Debounce preset: fire once after `delay` without an early poll
    pub fn debounce(self, delay: TimeValue) -> Self {
        self.kind(TimerKind::Debounce).delay(delay)
    }

    /// Throttle preset: fire now, then at most once per `delay`
    pub fn throttle(self, delay: TimeValue) -> Self {
        self.kind(TimerKind::Throttle).delay(delay)
    }

    // ─── Callbacks ──────────────────────────────────────────────────────────

    /// Set the primary callback, replacing any previous one.
    ///
    /// A loop callback turns a one-shot `Once`/`Debounce` timer into a `Loop`
    /// timer. `Repeat` and the looping kinds keep their kind.
    pub fn callback(mut self, callback: TimerCallback) -> Self {
        if matches!(callback, TimerCallback::Loop(_))
            && matches!(self.kind, TimerKind::Once | TimerKind::Debounce)
        {
            self.kind = TimerKind::Loop;
        }
        self.callback = Some(callback);
        self
    }

    pub fn on_once(self, f: impl Fn(&TimerHandle) + Send + Sync + 'static) -> Self {
        self.callback(TimerCallback::once(f))
    }

    /// Loop callback; return false to complete the timer
    pub fn on_loop(self, f: impl Fn(&TimerHandle) -> bool + Send + Sync + 'static) -> Self {
        self.callback(TimerCallback::looping(f))
    }

    pub fn on_simple(self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.callback(TimerCallback::simple(f))
    }

    /// Called on every running pass with the eased progress in [0, 1]
    pub fn on_progress(mut self, f: impl Fn(&TimerHandle, f64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    // ─── Groups & Chaining ──────────────────────────────────────────────────

    pub fn group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        if !group.is_empty() {
            self.groups.insert(group);
        }
        self
    }

    pub fn groups<I, S>(self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        groups.into_iter().fold(self, |builder, g| builder.group(g))
    }

    /// Build a successor lazily when this timer completes without a live
    /// chain target
    pub fn with_chained_timer(
        mut self,
        factory: impl Fn(&TimerService) -> TimerBuilder + Send + Sync + 'static,
    ) -> Self {
        self.chain_factory = Some(Arc::new(factory));
        self
    }

    // ─── Build ──────────────────────────────────────────────────────────────

    /// Create the timer in the `Running` state, starting at `tick` or `time`
    /// according to its time base, and register it.
    pub fn build(self, tick: u64, time: f64) -> TimerHandle {
        let id = self.service.allocate_id();
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Timer_{id}"));
        let start = TimeValue::at(self.time_base, tick, time);
        let iterations = self.kind.initial_iterations(self.repeat_count);

        let timer = Timer {
            kind: self.kind,
            time_base: self.time_base,
            state: TimerState::Running,
            priority: self.priority,
            easing: self.easing,
            delay: self.delay,
            start,
            pause_mark: start,
            last_execution: None,
            callback: self.callback,
            on_progress: self.on_progress,
            total_iterations: iterations,
            remaining_iterations: iterations,
            completed_iterations: 0,
            groups: self.groups,
            chain: ChainLink {
                target: None,
                factory: self.chain_factory,
            },
        };

        tracing::debug!(
            id = %id,
            name = %name,
            kind = ?self.kind,
            time_base = ?self.time_base,
            "timer registered"
        );
        self.service.register(id, name, timer)
    }
}
