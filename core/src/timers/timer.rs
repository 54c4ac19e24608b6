//! Timer state machine
//!
//! A `Timer` is the per-instance state owned by the service's registry. It is
//! never exposed directly: callers hold a [`TimerHandle`] and the service locks
//! the timer only for as long as it takes to read or update fields. User
//! callbacks run with no lock held, so processing is split in two halves:
//!
//! 1. [`Timer::begin_pass`] decides whether this pass fires and hands back the
//!    callbacks to run
//! 2. [`Timer::finish_pass`] applies the post-execute transition
//!
//! # State transitions
//!
//! ```text
//! Idle ─► Running ◄─► Paused
//!            │
//!            ├─► Completed
//!            └─► Cancelled   (cancel is accepted from any state)
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tickwork_types::{Easing, TimeBase, TimeValue, TimerId, TimerKind, TimerState};

use super::chain::ChainLink;
use super::handle::TimerHandle;

pub type OnceFn = dyn Fn(&TimerHandle) + Send + Sync;
pub type LoopFn = dyn Fn(&TimerHandle) -> bool + Send + Sync;
pub type SimpleFn = dyn Fn() + Send + Sync;
pub type ProgressFn = dyn Fn(&TimerHandle, f64) + Send + Sync;

// ═══════════════════════════════════════════════════════════════════════════
// Callbacks
// ═══════════════════════════════════════════════════════════════════════════

/// The primary callback of a timer. A timer carries at most one.
#[derive(Clone)]
pub enum TimerCallback {
    /// Receives the timer; the return value is not used
    Once(Arc<OnceFn>),
    /// Receives the timer; returning false completes a looping timer
    Loop(Arc<LoopFn>),
    /// No arguments; keeps looping timers alive
    Simple(Arc<SimpleFn>),
}

impl TimerCallback {
    pub fn once(f: impl Fn(&TimerHandle) + Send + Sync + 'static) -> Self {
        TimerCallback::Once(Arc::new(f))
    }

    pub fn looping(f: impl Fn(&TimerHandle) -> bool + Send + Sync + 'static) -> Self {
        TimerCallback::Loop(Arc::new(f))
    }

    pub fn simple(f: impl Fn() + Send + Sync + 'static) -> Self {
        TimerCallback::Simple(Arc::new(f))
    }

    /// Invoke the callback for a timer of `kind` and return the continuation
    /// signal.
    ///
    /// One-shot kinds (Once, Repeat, Debounce) ignore any return value and
    /// report `false`. Looping kinds (Loop, Interval, Throttle) continue unless
    /// a loop callback returns `false`.
    pub(crate) fn dispatch(&self, kind: TimerKind, timer: &TimerHandle) -> bool {
        let looping = kind.is_looping();
        match self {
            TimerCallback::Once(f) => {
                f(timer);
                looping
            }
            TimerCallback::Loop(f) => {
                let keep_going = f(timer);
                looping && keep_going
            }
            TimerCallback::Simple(f) => {
                f();
                looping
            }
        }
    }
}

impl fmt::Debug for TimerCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerCallback::Once(_) => f.write_str("TimerCallback::Once"),
            TimerCallback::Loop(_) => f.write_str("TimerCallback::Loop"),
            TimerCallback::Simple(_) => f.write_str("TimerCallback::Simple"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Timer
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) struct Timer {
    pub(crate) kind: TimerKind,
    pub(crate) time_base: TimeBase,
    pub(crate) state: TimerState,
    pub(crate) priority: i8,
    pub(crate) easing: Easing,

    // ─── Timing ─────────────────────────────────────────────────────────────
    pub(crate) delay: TimeValue,
    pub(crate) start: TimeValue,
    /// Copy of `start` taken when the timer was paused
    pub(crate) pause_mark: TimeValue,
    /// Last throttle firing, `None` until the first one
    pub(crate) last_execution: Option<TimeValue>,

    // ─── Callbacks ──────────────────────────────────────────────────────────
    pub(crate) callback: Option<TimerCallback>,
    pub(crate) on_progress: Option<Arc<ProgressFn>>,

    // ─── Iterations (-1 = infinite) ─────────────────────────────────────────
    pub(crate) total_iterations: i32,
    pub(crate) remaining_iterations: i32,
    pub(crate) completed_iterations: i32,

    pub(crate) groups: BTreeSet<String>,
    pub(crate) chain: ChainLink,
}

/// What one processing pass needs to do outside the timer lock
pub(crate) enum Pass {
    /// Not running; `keep` tells the registry whether to retain it
    Skip { keep: bool },
    Run {
        progress: f64,
        on_progress: Option<Arc<ProgressFn>>,
        /// `Some` when the timer fires on this pass. The inner option is the
        /// callback, which may be absent.
        fire: Option<Option<TimerCallback>>,
        kind: TimerKind,
    },
}

impl Timer {
    /// The current instant in this timer's time base
    pub(crate) fn now(&self, tick: u64, time: f64) -> TimeValue {
        TimeValue::at(self.time_base, tick, time)
    }

    /// Whether at least `delay` has passed since `since`
    fn elapsed_since(&self, since: TimeValue, tick: u64, time: f64, time_scale: f64) -> bool {
        match self.time_base {
            TimeBase::Tick => tick.saturating_sub(since.ticks()) >= self.delay.ticks(),
            TimeBase::Time => (time - since.seconds()) * time_scale >= self.delay.seconds(),
        }
    }

    /// Unclamped linear progress from `start` toward `delay`
    fn linear_progress(&self, tick: u64, time: f64, time_scale: f64) -> f64 {
        let (elapsed, span) = match self.time_base {
            TimeBase::Tick => (
                tick.saturating_sub(self.start.ticks()) as f64,
                self.delay.ticks() as f64,
            ),
            TimeBase::Time => (
                (time - self.start.seconds()) * time_scale,
                self.delay.seconds(),
            ),
        };
        if span > 0.0 { elapsed / span } else { 1.0 }
    }

    /// Eased progress in [0, 1]
    pub(crate) fn progress(&self, tick: u64, time: f64, time_scale: f64) -> f64 {
        let linear = self.linear_progress(tick, time, time_scale);
        // NaN can only come from a NaN clock value; treat it as "not started"
        let clamped = if linear.is_nan() { 0.0 } else { linear.clamp(0.0, 1.0) };
        self.easing.apply(clamped)
    }

    /// First half of `process`: decide whether to fire and collect callbacks.
    pub(crate) fn begin_pass(&mut self, tick: u64, time: f64, time_scale: f64) -> Pass {
        if self.state != TimerState::Running {
            return Pass::Skip {
                keep: !self.state.is_terminal(),
            };
        }

        let progress = self.progress(tick, time, time_scale);
        let due = match self.kind {
            TimerKind::Throttle => match self.last_execution {
                None => true,
                Some(last) => self.elapsed_since(last, tick, time, time_scale),
            },
            _ => self.elapsed_since(self.start, tick, time, time_scale),
        };

        if !due && self.kind == TimerKind::Debounce {
            // Sliding window: every early poll restarts the quiet period
            self.start = self.now(tick, time);
        }

        Pass::Run {
            progress,
            on_progress: self.on_progress.clone(),
            fire: due.then(|| self.callback.clone()),
            kind: self.kind,
        }
    }

    /// Second half of `process`, after the callback ran. Returns whether the
    /// timer stays registered.
    pub(crate) fn finish_pass(&mut self, tick: u64, time: f64, keep_going: bool) -> bool {
        let now = self.now(tick, time);

        if self.kind == TimerKind::Throttle {
            self.last_execution = Some(now);
        }
        if self.kind == TimerKind::Repeat && self.remaining_iterations > 0 {
            self.completed_iterations += 1;
            self.remaining_iterations -= 1;
        }

        // The callback may have paused or cancelled its own timer
        if self.state != TimerState::Running {
            return !self.state.is_terminal();
        }

        match self.kind {
            TimerKind::Debounce => self.complete(),
            TimerKind::Throttle => true,
            TimerKind::Repeat if self.remaining_iterations > 0 => {
                self.start = now;
                true
            }
            TimerKind::Repeat => self.complete(),
            TimerKind::Once | TimerKind::Loop | TimerKind::Interval => {
                if keep_going {
                    self.start = now;
                    true
                } else {
                    self.complete()
                }
            }
        }
    }

    fn complete(&mut self) -> bool {
        self.state = TimerState::Completed;
        false
    }

    pub(crate) fn pause(&mut self) {
        if self.state == TimerState::Running {
            self.state = TimerState::Paused;
            self.pause_mark = self.start;
        }
    }

    /// Does not rebase `start`: time spent paused counts toward the delay.
    pub(crate) fn resume(&mut self) {
        if self.state == TimerState::Paused {
            self.state = TimerState::Running;
        }
    }

    pub(crate) fn reset(&mut self, tick: u64, time: f64) {
        self.start = self.now(tick, time);
        self.state = TimerState::Running;
        self.remaining_iterations = self.total_iterations;
        self.completed_iterations = 0;
    }

    pub(crate) fn cancel(&mut self) {
        self.state = TimerState::Cancelled;
    }

    /// Start a chained successor from `now`
    pub(crate) fn promote(&mut self, tick: u64, time: f64) {
        self.state = TimerState::Running;
        self.start = self.now(tick, time);
    }

    pub(crate) fn snapshot(&self, id: TimerId, name: &str) -> TimerSnapshot {
        TimerSnapshot {
            id,
            name: name.to_string(),
            kind: self.kind,
            time_base: self.time_base,
            state: self.state,
            priority: self.priority,
            easing: self.easing,
            delay: self.delay,
            start: self.start,
            pause_mark: self.pause_mark,
            total_iterations: self.total_iterations,
            remaining_iterations: self.remaining_iterations,
            completed_iterations: self.completed_iterations,
            groups: self.groups.iter().cloned().collect(),
            chain_target: self.chain.target,
            has_chain_factory: self.chain.factory.is_some(),
        }
    }
}

/// Serializable copy of a timer's descriptive state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerSnapshot {
    pub id: TimerId,
    pub name: String,
    pub kind: TimerKind,
    pub time_base: TimeBase,
    pub state: TimerState,
    pub priority: i8,
    pub easing: Easing,
    pub delay: TimeValue,
    pub start: TimeValue,
    pub pause_mark: TimeValue,
    pub total_iterations: i32,
    pub remaining_iterations: i32,
    pub completed_iterations: i32,
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_target: Option<TimerId>,
    pub has_chain_factory: bool,
}
