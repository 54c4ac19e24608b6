//! Shorthand constructors over [`TimerBuilder`]
//!
//! Each function configures a builder and builds it at `tick`/`time`. They
//! add no behaviour of their own.
//!
//! [`TimerBuilder`]: super::TimerBuilder

use tickwork_types::{TimeValue, TimerId, TimerKind};

use super::handle::TimerHandle;
use super::service::TimerService;

/// Run `f` once after `delay`
pub fn delay(
    service: &TimerService,
    delay: TimeValue,
    tick: u64,
    time: f64,
    f: impl Fn() + Send + Sync + 'static,
) -> TimerHandle {
    service
        .builder()
        .kind(TimerKind::Once)
        .delay(delay)
        .on_simple(f)
        .build(tick, time)
}

/// Run `f` every `period` until cancelled
pub fn interval(
    service: &TimerService,
    period: TimeValue,
    tick: u64,
    time: f64,
    f: impl Fn() + Send + Sync + 'static,
) -> TimerHandle {
    service
        .builder()
        .kind(TimerKind::Interval)
        .delay(period)
        .on_simple(f)
        .build(tick, time)
}

/// Run `f` `count` times, `period` apart
pub fn repeat(
    service: &TimerService,
    period: TimeValue,
    count: i32,
    tick: u64,
    time: f64,
    f: impl Fn(&TimerHandle) + Send + Sync + 'static,
) -> TimerHandle {
    service
        .builder()
        .kind(TimerKind::Repeat)
        .repeat_count(count)
        .delay(period)
        .on_once(f)
        .build(tick, time)
}

/// Run `f` every `period` until it returns true
pub fn repeat_until(
    service: &TimerService,
    period: TimeValue,
    tick: u64,
    time: f64,
    f: impl Fn(&TimerHandle) -> bool + Send + Sync + 'static,
) -> TimerHandle {
    service
        .builder()
        .kind(TimerKind::Loop)
        .delay(period)
        .on_loop(move |timer| !f(timer))
        .build(tick, time)
}

/// Run `f` once no early poll has happened for `quiet`
pub fn debounce(
    service: &TimerService,
    quiet: TimeValue,
    tick: u64,
    time: f64,
    f: impl Fn() + Send + Sync + 'static,
) -> TimerHandle {
    service
        .builder()
        .debounce(quiet)
        .on_simple(f)
        .build(tick, time)
}

/// Run `f` immediately, then at most once per `window`
pub fn throttle(
    service: &TimerService,
    window: TimeValue,
    tick: u64,
    time: f64,
    f: impl Fn() + Send + Sync + 'static,
) -> TimerHandle {
    service
        .builder()
        .throttle(window)
        .on_simple(f)
        .build(tick, time)
}

/// Reads like prose at call sites: `schedule::after(&svc, ticks(30), ...)`
pub mod schedule {
    use super::*;

    pub fn after(
        service: &TimerService,
        wait: TimeValue,
        tick: u64,
        time: f64,
        f: impl Fn() + Send + Sync + 'static,
    ) -> TimerHandle {
        delay(service, wait, tick, time, f)
    }

    pub fn every(
        service: &TimerService,
        period: TimeValue,
        tick: u64,
        time: f64,
        f: impl Fn() + Send + Sync + 'static,
    ) -> TimerHandle {
        interval(service, period, tick, time, f)
    }

    /// Start `next` when `first` completes
    pub fn chain(service: &TimerService, first: TimerId, next: TimerId) -> bool {
        service.chain(first, next)
    }

    pub fn ticks(n: u64) -> TimeValue {
        TimeValue::from_ticks(n)
    }

    pub fn seconds(s: f64) -> TimeValue {
        TimeValue::from_seconds(s)
    }
}
