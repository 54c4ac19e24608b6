//! Timer system
//!
//! This module provides:
//! - **Timers**: per-instance state machines (once, loop, repeat, interval,
//!   debounce, throttle) driven by an external tick pump
//! - **Builder**: the single construction path, registering on `build`
//! - **Service**: the registry owning all live timers, with group index,
//!   batch operations and the two-phase `process_all`
//! - **Chaining**: promoting or spawning a successor when a timer completes
//! - **Definitions**: timer templates loaded from TOML
//!
//! # Pump
//!
//! The host calls [`TimerService::process_all`] once per frame with the
//! current tick count and elapsed seconds. Tick-based and time-based timers
//! are both driven by that one call.

mod builder;
mod chain;
pub mod convenience;
mod definition;
mod error;
mod handle;
mod service;
mod timer;

#[cfg(test)]
mod service_tests;

pub use builder::TimerBuilder;
pub use chain::ChainFactory;
pub use convenience::{debounce, delay, interval, repeat, repeat_until, schedule, throttle};
pub use definition::{
    TimerDefinition, load_definitions, parse_definitions, spawn_definitions, validate_definitions,
};
pub use error::{TimerError, TimerFault};
pub use handle::TimerHandle;
pub use service::{FaultObserver, TimerService};
pub use timer::{LoopFn, OnceFn, ProgressFn, SimpleFn, TimerCallback, TimerSnapshot};
