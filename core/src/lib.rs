pub mod config;
pub mod serde_defaults;
pub mod timers;

// Re-exports for convenience
pub use config::{ConfigError, ServiceConfig};
pub use tickwork_types::{Easing, TimeBase, TimeValue, TimerId, TimerKind, TimerState};
pub use timers::{
    TimerBuilder, TimerCallback, TimerDefinition, TimerError, TimerFault, TimerHandle,
    TimerService, TimerSnapshot,
};
