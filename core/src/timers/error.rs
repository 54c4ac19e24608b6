//! Error types for timer operations

use std::any::Any;
use std::path::PathBuf;

use thiserror::Error;
use tickwork_types::TimerId;

/// Errors during timer definition loading
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("failed to read timer file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse timer TOML in {path}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to parse timer TOML")]
    Parse(#[from] toml::de::Error),

    #[error("invalid timer definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },
}

/// A panic caught while running user code inside the pump.
///
/// Faults never reach the caller of `process_all`; they go to the fault
/// observer installed on the service and to the log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerFault {
    #[error("callback of timer '{name}' ({id}) panicked: {message}")]
    Callback {
        id: TimerId,
        name: String,
        message: String,
    },

    #[error("chain factory of timer '{name}' ({id}) panicked: {message}")]
    ChainFactory {
        id: TimerId,
        name: String,
        message: String,
    },
}

impl TimerFault {
    pub fn timer_id(&self) -> TimerId {
        match self {
            TimerFault::Callback { id, .. } | TimerFault::ChainFactory { id, .. } => *id,
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
