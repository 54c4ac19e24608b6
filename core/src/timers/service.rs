//! Timer registry
//!
//! `TimerService` owns every live timer. It is a cheap, clonable handle around
//! shared state, so the host creates one and passes it (or clones of it) to
//! whoever schedules timers. Separate services are fully isolated: each has
//! its own id counter, time scale and fault observer.
//!
//! # Locking
//!
//! The registry maps sit behind one mutex. Each timer has its own mutex.
//! Locks are only ever taken in registry → timer order, and no lock is held
//! while user code (callbacks, chain factories, the fault observer) runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use hashbrown::HashMap;
use tickwork_types::TimerId;

use crate::config::ServiceConfig;

use super::builder::TimerBuilder;
use super::chain::Successor;
use super::error::{TimerFault, panic_message};
use super::handle::TimerHandle;
use super::timer::{Pass, Timer};

pub type FaultObserver = Arc<dyn Fn(&TimerFault) + Send + Sync>;

/// Lock a mutex, recovering the data if a previous holder panicked.
///
/// User code never runs under these locks, so a poisoned guard still holds
/// consistent data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A registered timer. The name is fixed at build time and lives outside the
/// timer lock so name lookups do not contend with processing.
pub(crate) struct TimerSlot {
    pub(crate) id: TimerId,
    pub(crate) name: String,
    pub(crate) timer: Mutex<Timer>,
}

#[derive(Default)]
struct Registry {
    /// Keyed by id; ids are allocated in increasing order
    timers: BTreeMap<TimerId, Arc<TimerSlot>>,
    /// Group name -> member ids. Empty sets are pruned.
    groups: HashMap<String, BTreeSet<TimerId>>,
}

impl Registry {
    fn remove(&mut self, id: TimerId) -> Option<Arc<TimerSlot>> {
        let slot = self.timers.remove(&id)?;
        let groups = lock(&slot.timer).groups.clone();
        for group in &groups {
            self.unindex(group, id);
        }
        Some(slot)
    }

    fn unindex(&mut self, group: &str, id: TimerId) {
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(&id);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }
}

struct ServiceInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    /// f64 bits; always > 0
    time_scale: AtomicU64,
    log_faults: AtomicBool,
    fault_observer: RwLock<Option<FaultObserver>>,
}

/// Registry and pump for all timers of one host
#[derive(Clone)]
pub struct TimerService {
    inner: Arc<ServiceInner>,
}

impl Default for TimerService {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerService")
            .field("timers", &self.len())
            .field("time_scale", &self.time_scale())
            .finish()
    }
}

impl TimerService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                time_scale: AtomicU64::new(1.0f64.to_bits()),
                log_faults: AtomicBool::new(true),
                fault_observer: RwLock::new(None),
            }),
        }
    }

    pub fn with_config(config: &ServiceConfig) -> Self {
        let service = Self::new();
        service.set_time_scale(config.time_scale);
        service
            .inner
            .log_faults
            .store(config.log_faults, Ordering::Relaxed);
        service
    }

    /// Start configuring a new timer. Nothing is registered until `build`.
    pub fn builder(&self) -> TimerBuilder {
        TimerBuilder::new(self.clone())
    }

    // ─── Time Scale ─────────────────────────────────────────────────────────

    /// Multiplier applied to elapsed seconds of time-based timers.
    /// Values that are not strictly positive reset it to 1.0.
    pub fn set_time_scale(&self, scale: f64) {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        self.inner
            .time_scale
            .store(scale.to_bits(), Ordering::Relaxed);
    }

    pub fn time_scale(&self) -> f64 {
        f64::from_bits(self.inner.time_scale.load(Ordering::Relaxed))
    }

    // ─── Fault Reporting ────────────────────────────────────────────────────

    /// Receive every panic caught in callbacks and chain factories
    pub fn set_fault_observer(&self, observer: impl Fn(&TimerFault) + Send + Sync + 'static) {
        *self
            .inner
            .fault_observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(observer));
    }

    pub fn clear_fault_observer(&self) {
        *self
            .inner
            .fault_observer
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub(crate) fn report_fault(&self, fault: TimerFault) {
        if self.inner.log_faults.load(Ordering::Relaxed) {
            tracing::warn!(id = %fault.timer_id(), error = %fault, "timer fault");
        }
        let observer = self
            .inner
            .fault_observer
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            if panic::catch_unwind(AssertUnwindSafe(|| observer(&fault))).is_err() {
                tracing::warn!("fault observer panicked");
            }
        }
    }

    // ─── Registration ───────────────────────────────────────────────────────

    pub(crate) fn allocate_id(&self) -> TimerId {
        TimerId::from_raw(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn register(&self, id: TimerId, name: String, timer: Timer) -> TimerHandle {
        let groups = timer.groups.clone();
        let slot = Arc::new(TimerSlot {
            id,
            name,
            timer: Mutex::new(timer),
        });

        let mut registry = lock(&self.inner.registry);
        registry.timers.insert(id, slot);
        for group in groups {
            registry.groups.entry(group).or_default().insert(id);
        }
        drop(registry);

        TimerHandle::new(id, self.clone())
    }

    pub(crate) fn slot(&self, id: TimerId) -> Option<Arc<TimerSlot>> {
        lock(&self.inner.registry).timers.get(&id).cloned()
    }

    // ─── Lookups ────────────────────────────────────────────────────────────

    pub fn find_by_id(&self, id: TimerId) -> Option<TimerHandle> {
        lock(&self.inner.registry)
            .timers
            .contains_key(&id)
            .then(|| TimerHandle::new(id, self.clone()))
    }

    /// First live timer with this name, in id order
    pub fn find_by_name(&self, name: &str) -> Option<TimerHandle> {
        let registry = lock(&self.inner.registry);
        registry
            .timers
            .values()
            .find(|slot| slot.name == name)
            .map(|slot| TimerHandle::new(slot.id, self.clone()))
    }

    /// Live members of a group, in id order. Unknown groups are empty.
    pub fn find_by_group(&self, group: &str) -> Vec<TimerHandle> {
        let registry = lock(&self.inner.registry);
        let Some(members) = registry.groups.get(group) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|id| registry.timers.contains_key(*id))
            .map(|id| TimerHandle::new(*id, self.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.registry).timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> Vec<TimerId> {
        lock(&self.inner.registry).timers.keys().copied().collect()
    }

    /// Names of all non-empty groups, sorted
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.inner.registry).groups.keys().cloned().collect();
        names.sort();
        names
    }

    // ─── Groups ─────────────────────────────────────────────────────────────

    /// Add a timer to a group. Empty group names and unknown ids are ignored.
    pub fn add_to_group(&self, id: TimerId, group: &str) -> bool {
        if group.is_empty() {
            return false;
        }
        let mut registry = lock(&self.inner.registry);
        let Some(slot) = registry.timers.get(&id).cloned() else {
            return false;
        };
        lock(&slot.timer).groups.insert(group.to_string());
        registry
            .groups
            .entry(group.to_string())
            .or_default()
            .insert(id);
        true
    }

    /// Remove a timer from a group; the group disappears with its last member
    pub fn remove_from_group(&self, id: TimerId, group: &str) -> bool {
        if group.is_empty() {
            return false;
        }
        let mut registry = lock(&self.inner.registry);
        let Some(slot) = registry.timers.get(&id).cloned() else {
            return false;
        };
        let was_member = lock(&slot.timer).groups.remove(group);
        registry.unindex(group, id);
        was_member
    }

    // ─── Batch Operations ───────────────────────────────────────────────────

    pub fn cancel_all(&self) {
        let registry = lock(&self.inner.registry);
        for slot in registry.timers.values() {
            lock(&slot.timer).cancel();
        }
        tracing::debug!(count = registry.timers.len(), "cancelled all timers");
    }

    pub fn pause_all(&self) {
        let registry = lock(&self.inner.registry);
        for slot in registry.timers.values() {
            lock(&slot.timer).pause();
        }
    }

    pub fn resume_all(&self) {
        let registry = lock(&self.inner.registry);
        for slot in registry.timers.values() {
            lock(&slot.timer).resume();
        }
    }

    /// Advance every timer to `tick`/`time` and return the number of live
    /// timers afterwards.
    ///
    /// The pass works on a snapshot taken at the start, so callbacks are free
    /// to build, cancel or regroup timers. Timers added during the pass are
    /// first processed on the next call; timers cancelled during the pass are
    /// removed on the next call.
    pub fn process_all(&self, tick: u64, time: f64) -> usize {
        let snapshot: Vec<Arc<TimerSlot>> = lock(&self.inner.registry)
            .timers
            .values()
            .cloned()
            .collect();

        let finished: Vec<TimerId> = snapshot
            .iter()
            .filter(|slot| !self.process_slot(slot, tick, time))
            .map(|slot| slot.id)
            .collect();

        if !finished.is_empty() {
            self.retire(&finished, tick, time);
        }

        lock(&self.inner.registry).timers.len()
    }

    /// Remove finished timers, then start whatever they chain to
    fn retire(&self, finished: &[TimerId], tick: u64, time: f64) {
        let mut promotions = Vec::new();
        let mut factories = Vec::new();
        {
            let mut registry = lock(&self.inner.registry);
            let removed: Vec<Arc<TimerSlot>> =
                finished.iter().filter_map(|id| registry.remove(*id)).collect();

            for slot in &removed {
                let timer = lock(&slot.timer);
                let successor = timer
                    .chain
                    .resolve(timer.state, |target| registry.timers.contains_key(&target));
                match successor {
                    Some(Successor::Promote(target)) => {
                        if let Some(next) = registry.timers.get(&target) {
                            promotions.push(Arc::clone(next));
                        }
                    }
                    Some(Successor::Spawn(factory)) => {
                        factories.push((slot.id, slot.name.clone(), factory));
                    }
                    None => {}
                }
            }
            tracing::debug!(
                removed = removed.len(),
                remaining = registry.timers.len(),
                "retired timers"
            );
        }

        for next in promotions {
            lock(&next.timer).promote(tick, time);
            tracing::debug!(id = %next.id, name = %next.name, "chained timer promoted");
        }

        for (id, name, factory) in factories {
            match panic::catch_unwind(AssertUnwindSafe(|| factory(self))) {
                Ok(builder) => {
                    let next = builder.build(tick, time);
                    tracing::debug!(from = %id, next = %next.id(), "chained timer spawned");
                }
                Err(payload) => self.report_fault(TimerFault::ChainFactory {
                    id,
                    name,
                    message: panic_message(&*payload),
                }),
            }
        }
    }

    /// Process one timer, turning a panic into a reported fault and a drop
    pub(crate) fn process_slot(&self, slot: &TimerSlot, tick: u64, time: f64) -> bool {
        match self.try_process_slot(slot, tick, time) {
            Ok(keep) => keep,
            Err(fault) => {
                self.report_fault(fault);
                false
            }
        }
    }

    fn try_process_slot(
        &self,
        slot: &TimerSlot,
        tick: u64,
        time: f64,
    ) -> Result<bool, TimerFault> {
        let pass = lock(&slot.timer).begin_pass(tick, time, self.time_scale());
        let (progress, on_progress, fire, kind) = match pass {
            Pass::Skip { keep } => return Ok(keep),
            Pass::Run {
                progress,
                on_progress,
                fire,
                kind,
            } => (progress, on_progress, fire, kind),
        };

        let handle = TimerHandle::new(slot.id, self.clone());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if let Some(on_progress) = &on_progress {
                on_progress(&handle, progress);
            }
            fire.map(|callback| match callback {
                Some(callback) => callback.dispatch(kind, &handle),
                None => kind.is_looping(),
            })
        }))
        .map_err(|payload| TimerFault::Callback {
            id: slot.id,
            name: slot.name.clone(),
            message: panic_message(&*payload),
        })?;

        match outcome {
            None => Ok(true),
            Some(keep_going) => {
                tracing::trace!(id = %slot.id, name = %slot.name, ?kind, tick, time, "timer fired");
                Ok(lock(&slot.timer).finish_pass(tick, time, keep_going))
            }
        }
    }
}
