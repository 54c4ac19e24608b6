//! Shared value types for tickwork
//!
//! This crate contains the small, serializable types that describe a timer:
//! identity, time values, kinds, states and easing curves. They are shared by
//! the scheduler (tickwork-core), config files and introspection snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Opaque timer identifier.
///
/// Ids are allocated by a scheduler starting at 1 and are never reused for the
/// lifetime of that scheduler. `TimerId::INVALID` (0) is never handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(u64);

impl TimerId {
    pub const INVALID: TimerId = TimerId(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Time Values
// ─────────────────────────────────────────────────────────────────────────────

/// A point or span in either ticks or seconds.
///
/// The representation is fixed when the value is constructed. Converting
/// between the two is lossy in one direction: seconds → ticks truncates
/// toward zero (negative and NaN seconds become 0), ticks → seconds is exact
/// up to f64 precision. Every call site goes through [`TimeValue::ticks`] and
/// [`TimeValue::seconds`] so the rule is the same everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeValue {
    Ticks(u64),
    Seconds(f64),
}

impl TimeValue {
    pub const fn from_ticks(ticks: u64) -> Self {
        TimeValue::Ticks(ticks)
    }

    pub const fn from_seconds(seconds: f64) -> Self {
        TimeValue::Seconds(seconds)
    }

    /// The instant `now` expressed in the representation selected by `base`
    pub const fn at(base: TimeBase, tick: u64, time: f64) -> Self {
        match base {
            TimeBase::Tick => TimeValue::Ticks(tick),
            TimeBase::Time => TimeValue::Seconds(time),
        }
    }

    pub const fn is_tick(&self) -> bool {
        matches!(self, TimeValue::Ticks(_))
    }

    /// Tick count; seconds are truncated
    pub fn ticks(&self) -> u64 {
        match *self {
            TimeValue::Ticks(t) => t,
            // `as` saturates: NaN and negatives map to 0
            TimeValue::Seconds(s) => s as u64,
        }
    }

    pub fn seconds(&self) -> f64 {
        match *self {
            TimeValue::Ticks(t) => t as f64,
            TimeValue::Seconds(s) => s,
        }
    }
}

impl Default for TimeValue {
    fn default() -> Self {
        TimeValue::Ticks(0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Timer Classification
// ─────────────────────────────────────────────────────────────────────────────

/// Whether a timer measures its delay in ticks or in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    #[default]
    Tick,
    Time,
}

/// How a timer behaves once its delay has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Fire once, then complete
    #[default]
    Once,
    /// Fire every `delay` until the loop callback returns false
    Loop,
    /// Fire a fixed number of times
    Repeat,
    /// Like `Loop`, used for periodic work
    Interval,
    /// Fire once after a quiet period; every early poll restarts the window
    Debounce,
    /// Fire immediately, then at most once per `delay`
    Throttle,
}

impl TimerKind {
    /// Iteration budget for a freshly built timer (-1 = infinite)
    pub fn initial_iterations(self, repeat_count: i32) -> i32 {
        match self {
            TimerKind::Repeat => repeat_count,
            TimerKind::Once | TimerKind::Debounce => 1,
            TimerKind::Loop | TimerKind::Interval | TimerKind::Throttle => -1,
        }
    }

    /// Kinds whose loop callback decides whether to keep running
    pub fn is_looping(self) -> bool {
        matches!(self, TimerKind::Loop | TimerKind::Interval | TimerKind::Throttle)
    }
}

/// Lifecycle state of a timer
///
/// `Idle` exists for completeness; no builder path produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl TimerState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TimerState::Completed | TimerState::Cancelled)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Easing
// ─────────────────────────────────────────────────────────────────────────────

/// Progress remapping curve applied before the progress callback sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Easing {
    /// Map linear progress `t` in [0, 1] onto the curve.
    ///
    /// All curves satisfy f(0) = 0 and f(1) = 1.
    pub fn apply(self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }

    /// Parse a curve name; anything unrecognised is `Linear`
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl FromStr for Easing {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "linear" => Ok(Easing::Linear),
            "ease_in" | "easein" => Ok(Easing::EaseIn),
            "ease_out" | "easeout" => Ok(Easing::EaseOut),
            "ease_in_out" | "easeinout" => Ok(Easing::EaseInOut),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_EASINGS: [Easing; 4] = [
        Easing::Linear,
        Easing::EaseIn,
        Easing::EaseOut,
        Easing::EaseInOut,
    ];

    #[test]
    fn easing_endpoints_are_fixed() {
        for easing in ALL_EASINGS {
            assert_eq!(easing.apply(0.0), 0.0, "{easing:?} at 0");
            assert_eq!(easing.apply(1.0), 1.0, "{easing:?} at 1");
        }
    }

    #[test]
    fn easing_midpoint_ordering() {
        assert!(Easing::EaseIn.apply(0.5) < 0.5);
        assert!(Easing::EaseOut.apply(0.5) > 0.5);
        assert_eq!(Easing::EaseInOut.apply(0.5), 0.5);
        assert_eq!(Easing::Linear.apply(0.25), 0.25);
    }

    #[test]
    fn unknown_easing_name_is_linear() {
        assert_eq!(Easing::from_name("ease-in-out"), Easing::EaseInOut);
        assert_eq!(Easing::from_name("EaseOut"), Easing::EaseOut);
        assert_eq!(Easing::from_name("bounce"), Easing::Linear);
    }

    #[test]
    fn time_value_conversions() {
        let ticks = TimeValue::from_ticks(42);
        assert!(ticks.is_tick());
        assert_eq!(ticks.ticks(), 42);
        assert_eq!(ticks.seconds(), 42.0);

        let secs = TimeValue::from_seconds(2.9);
        assert!(!secs.is_tick());
        assert_eq!(secs.ticks(), 2);
        assert_eq!(secs.seconds(), 2.9);

        assert_eq!(TimeValue::from_seconds(-3.5).ticks(), 0);
    }

    #[test]
    fn time_value_at_follows_base() {
        assert_eq!(TimeValue::at(TimeBase::Tick, 7, 1.5), TimeValue::Ticks(7));
        assert_eq!(TimeValue::at(TimeBase::Time, 7, 1.5), TimeValue::Seconds(1.5));
    }

    #[test]
    fn iteration_budget_by_kind() {
        assert_eq!(TimerKind::Repeat.initial_iterations(3), 3);
        assert_eq!(TimerKind::Once.initial_iterations(3), 1);
        assert_eq!(TimerKind::Debounce.initial_iterations(3), 1);
        assert_eq!(TimerKind::Interval.initial_iterations(3), -1);
    }

    #[test]
    fn kind_deserializes_from_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            kind: TimerKind,
            easing: Easing,
        }
        let w: Wrapper = toml::from_str("kind = \"debounce\"\neasing = \"ease_in_out\"").unwrap();
        assert_eq!(w.kind, TimerKind::Debounce);
        assert_eq!(w.easing, Easing::EaseInOut);
    }
}
