//! Common serde default value functions
//!
//! Used by timer definitions and service configuration.

/// Default for enabled fields
pub fn default_true() -> bool {
    true
}

/// Default firing count for repeat timers
pub fn default_repeat() -> i32 {
    1
}

/// Default time scale (real time)
pub fn default_time_scale() -> f64 {
    1.0
}
