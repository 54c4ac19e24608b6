//! Timer chaining
//!
//! A removed timer can hand over to a successor in two ways:
//! - **Direct target**: an already-built timer (usually paused) that gets
//!   promoted to `Running` with its start rebased to the completion instant.
//!   Only timers that completed promote their target.
//! - **Factory**: a closure that returns a fresh builder, invoked lazily for
//!   any removed timer, cancelled or faulted ones included
//!
//! The factory only runs when no live direct target exists, so once `chain`
//! links a live successor the factory of that timer is never used.

use std::fmt;
use std::sync::Arc;

use tickwork_types::{TimerId, TimerState};

use super::builder::TimerBuilder;
use super::service::{TimerService, lock};

pub type ChainFactory = Arc<dyn Fn(&TimerService) -> TimerBuilder + Send + Sync>;

#[derive(Clone, Default)]
pub(crate) struct ChainLink {
    pub(crate) target: Option<TimerId>,
    pub(crate) factory: Option<ChainFactory>,
}

impl fmt::Debug for ChainLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLink")
            .field("target", &self.target)
            .field("factory", &self.factory.is_some())
            .finish()
    }
}

/// What a removed timer asks for once it leaves the registry
pub(crate) enum Successor {
    Promote(TimerId),
    Spawn(ChainFactory),
}

impl ChainLink {
    /// Resolve the successor of a timer that finished in `state`.
    ///
    /// `is_live` reports whether an id is still registered.
    pub(crate) fn resolve(
        &self,
        state: TimerState,
        is_live: impl Fn(TimerId) -> bool,
    ) -> Option<Successor> {
        match self.target {
            Some(target) if is_live(target) => {
                (state == TimerState::Completed).then_some(Successor::Promote(target))
            }
            _ => self.factory.clone().map(Successor::Spawn),
        }
    }
}

impl TimerService {
    /// Make `next` start when `first` completes.
    ///
    /// `next` is left untouched until then; callers typically pause it right
    /// after building. Returns false when `first` is not registered.
    pub fn chain(&self, first: TimerId, next: TimerId) -> bool {
        let Some(slot) = self.slot(first) else {
            return false;
        };
        lock(&slot.timer).chain.target = Some(next);
        tracing::debug!(first = %first, next = %next, "timers chained");
        true
    }
}
