//! Timer definition types
//!
//! Definitions are templates loaded from TOML files that describe timers to
//! schedule. They carry no code: whoever spawns them supplies the callback.
//!
//! ```toml
//! [[timer]]
//! name = "pull"
//! kind = "once"
//! delay_ticks = 120
//! chain_to = "enrage"
//!
//! [[timer]]
//! name = "enrage"
//! delay_secs = 300.0
//! deferred = true
//! groups = ["boss"]
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tickwork_types::{Easing, TimeValue, TimerKind};

use crate::serde_defaults::{default_repeat, default_true};

use super::builder::TimerBuilder;
use super::error::TimerError;
use super::handle::TimerHandle;
use super::service::TimerService;

/// Definition of a timer (loaded from config)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerDefinition {
    /// Display name, also used as the chain reference
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub kind: TimerKind,

    // ─── Delay (exactly one) ────────────────────────────────────────────────
    pub delay_ticks: Option<u64>,
    pub delay_secs: Option<f64>,

    /// Firings for `repeat` timers
    #[serde(default = "default_repeat")]
    pub repeat: i32,

    #[serde(default)]
    pub easing: Easing,

    #[serde(default)]
    pub priority: i8,

    #[serde(default)]
    pub groups: Vec<String>,

    // ─── Chaining ───────────────────────────────────────────────────────────
    /// Name of the definition to start when this one completes
    pub chain_to: Option<String>,

    /// Build paused, waiting to be started by a chain
    #[serde(default)]
    pub deferred: bool,
}

#[derive(Debug, Default, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    timer: Vec<TimerDefinition>,
}

impl TimerDefinition {
    pub fn delay(&self) -> Option<TimeValue> {
        match (self.delay_ticks, self.delay_secs) {
            (Some(ticks), None) => Some(TimeValue::from_ticks(ticks)),
            (None, Some(secs)) => Some(TimeValue::from_seconds(secs)),
            _ => None,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> TimerError {
        TimerError::InvalidDefinition {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn validate(&self) -> Result<(), TimerError> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("name must not be empty"));
        }
        match (self.delay_ticks, self.delay_secs) {
            (Some(_), Some(_)) => Err(self.invalid("set only one of delay_ticks and delay_secs")),
            (None, None) => Err(self.invalid("missing delay_ticks or delay_secs")),
            (None, Some(secs)) if !secs.is_finite() || secs < 0.0 => {
                Err(self.invalid(format!("delay_secs must be a non-negative number, got {secs}")))
            }
            _ => Ok(()),
        }
    }

    /// Builder configured from this definition, without a callback
    pub fn to_builder(&self, service: &TimerService) -> TimerBuilder {
        let builder = service
            .builder()
            .name(self.name.clone())
            .kind(self.kind)
            .repeat_count(self.repeat)
            .easing(self.easing)
            .priority(self.priority)
            .groups(self.groups.iter().cloned());
        match self.delay() {
            Some(delay) => builder.delay(delay),
            None => builder,
        }
    }
}

/// Parse and validate definitions from TOML text
pub fn parse_definitions(content: &str) -> Result<Vec<TimerDefinition>, TimerError> {
    let file: DefinitionFile = toml::from_str(content)?;
    validate_definitions(&file.timer)?;
    Ok(file.timer)
}

/// Load and validate definitions from a TOML file
pub fn load_definitions(path: &Path) -> Result<Vec<TimerDefinition>, TimerError> {
    let content = std::fs::read_to_string(path).map_err(|source| TimerError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let file: DefinitionFile = toml::from_str(&content).map_err(|source| TimerError::ParseToml {
        path: path.to_path_buf(),
        source,
    })?;
    validate_definitions(&file.timer)?;
    tracing::debug!(path = %path.display(), count = file.timer.len(), "loaded timer definitions");
    Ok(file.timer)
}

/// Check each definition, unique names and chain references
pub fn validate_definitions(definitions: &[TimerDefinition]) -> Result<(), TimerError> {
    let mut seen = HashMap::new();
    for def in definitions {
        def.validate()?;
        if seen.insert(def.name.as_str(), def).is_some() {
            return Err(def.invalid("duplicate timer name"));
        }
    }
    for def in definitions {
        if let Some(next) = &def.chain_to {
            if !seen.contains_key(next.as_str()) {
                return Err(def.invalid(format!("chain_to refers to unknown timer '{next}'")));
            }
            if next == &def.name {
                return Err(def.invalid("a timer cannot chain to itself"));
            }
        }
    }
    Ok(())
}

/// Build every enabled definition at `tick`/`time` and wire their chains.
///
/// `on_fire` becomes the callback of each timer. Deferred timers are paused
/// right after building. Chains to disabled definitions are skipped.
pub fn spawn_definitions<F>(
    service: &TimerService,
    definitions: &[TimerDefinition],
    tick: u64,
    time: f64,
    on_fire: F,
) -> Vec<TimerHandle>
where
    F: Fn(&TimerHandle) + Clone + Send + Sync + 'static,
{
    let mut by_name: HashMap<&str, TimerHandle> = HashMap::new();
    let mut handles = Vec::new();

    for def in definitions.iter().filter(|d| d.enabled) {
        let handle = def
            .to_builder(service)
            .on_once(on_fire.clone())
            .build(tick, time);
        if def.deferred {
            handle.pause();
        }
        by_name.insert(def.name.as_str(), handle.clone());
        handles.push(handle);
    }

    for def in definitions.iter().filter(|d| d.enabled) {
        let Some(next_name) = &def.chain_to else {
            continue;
        };
        match (by_name.get(def.name.as_str()), by_name.get(next_name.as_str())) {
            (Some(first), Some(next)) => {
                first.chain_to(next);
            }
            _ => tracing::debug!(from = %def.name, to = %next_name, "chain target not spawned"),
        }
    }

    handles
}
