//! Tests for the timer registry
//!
//! Verifies that:
//! - Ids, lookups and the group index stay consistent
//! - `process_all` removes finished timers and resolves chains
//! - Callback panics are contained and reported
//! - Callbacks and other threads can schedule while the pump runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use tickwork_types::{TimeValue, TimerId, TimerKind, TimerState};

use crate::config::ServiceConfig;

use super::convenience::{self, schedule};
use super::{TimerFault, TimerService};

// ═══════════════════════════════════════════════════════════════════════════
// Test Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

fn bump(count: &Arc<AtomicUsize>) -> impl Fn() + Send + Sync + 'static {
    let count = Arc::clone(count);
    move || {
        count.fetch_add(1, Ordering::SeqCst);
    }
}

fn fired(count: &Arc<AtomicUsize>) -> usize {
    count.load(Ordering::SeqCst)
}

/// Service that records faults instead of logging them
fn observed_service() -> (TimerService, Arc<Mutex<Vec<TimerFault>>>) {
    let service = TimerService::with_config(&ServiceConfig {
        log_faults: false,
        ..ServiceConfig::default()
    });
    let faults = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&faults);
    service.set_fault_observer(move |fault| sink.lock().unwrap().push(fault.clone()));
    (service, faults)
}

// ═══════════════════════════════════════════════════════════════════════════
// Identity & Lookups
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_ids_are_nonzero_and_increasing() {
    let service = TimerService::new();
    let ids: Vec<TimerId> = (0..10)
        .map(|_| service.builder().delay_ticks(100).build(0, 0.0).id())
        .collect();

    assert!(ids.iter().all(|id| id.is_valid()));
    assert!(ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(ids[0], TimerId::from_raw(1));
}

#[test]
fn test_ids_are_not_reused_after_removal() {
    let service = TimerService::new();
    let first = service.builder().build(0, 0.0).id();
    service.process_all(0, 0.0);
    assert!(service.is_empty());

    let second = service.builder().build(0, 0.0).id();
    assert!(second > first);
}

#[test]
fn test_services_are_isolated() {
    let a = TimerService::new();
    let b = TimerService::new();
    let id_a = a.builder().build(0, 0.0).id();
    let id_b = b.builder().build(0, 0.0).id();

    assert_eq!(id_a, id_b);
    a.set_time_scale(3.0);
    assert_eq!(b.time_scale(), 1.0);
    a.cancel_all();
    assert_eq!(b.find_by_id(id_b).unwrap().state(), Some(TimerState::Running));
}

#[test]
fn test_lookup_misses_are_empty() {
    let service = TimerService::new();
    assert!(service.find_by_id(TimerId::from_raw(99)).is_none());
    assert!(service.find_by_id(TimerId::INVALID).is_none());
    assert!(service.find_by_name("nope").is_none());
    assert!(service.find_by_group("nope").is_empty());
}

#[test]
fn test_find_by_name_returns_first_match() {
    let service = TimerService::new();
    let first = service.builder().name("dup").delay_ticks(5).build(0, 0.0);
    service.builder().name("dup").delay_ticks(5).build(0, 0.0);
    let other = service.builder().name("other").build(0, 0.0);

    assert_eq!(service.find_by_name("dup").unwrap().id(), first.id());
    assert_eq!(service.find_by_name("other").unwrap().id(), other.id());
    assert_eq!(service.find_by_id(other.id()).unwrap().id(), other.id());
}

#[test]
fn test_stale_handle_is_inert() {
    let service = TimerService::new();
    let timer = service.builder().build(0, 0.0);
    service.process_all(0, 0.0);

    assert!(!timer.is_alive());
    assert_eq!(timer.state(), None);
    assert_eq!(timer.name(), None);
    assert!(timer.snapshot().is_none());
    assert!(!timer.process(10, 0.0));
    assert!(!timer.add_to_group("g"));
    timer.pause();
    timer.cancel();
    assert!(service.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════════
// Groups
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_group_add_and_remove() {
    let service = TimerService::new();
    let timer = service.builder().delay_ticks(100).build(0, 0.0);

    assert!(timer.add_to_group("G"));
    assert!(timer.add_to_group("G"));
    let members = service.find_by_group("G");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].id(), timer.id());
    assert_eq!(timer.groups(), vec!["G".to_string()]);

    assert!(timer.remove_from_group("G"));
    assert!(service.find_by_group("G").is_empty());
    assert!(timer.groups().is_empty());
    assert!(service.group_names().is_empty(), "empty group must be pruned");

    assert!(!timer.remove_from_group("G"));
}

#[test]
fn test_empty_group_names_are_ignored() {
    let service = TimerService::new();
    let timer = service.builder().group("").group("real").build(0, 0.0);

    assert!(!timer.add_to_group(""));
    assert_eq!(timer.groups(), vec!["real".to_string()]);
    assert_eq!(service.group_names(), vec!["real".to_string()]);
}

#[test]
fn test_group_members_in_id_order() {
    let service = TimerService::new();
    let a = service.builder().delay_ticks(9).groups(["wave", "all"]).build(0, 0.0);
    let b = service.builder().delay_ticks(9).group("wave").build(0, 0.0);
    let c = service.builder().delay_ticks(9).group("all").build(0, 0.0);

    let wave: Vec<_> = service.find_by_group("wave").iter().map(|h| h.id()).collect();
    assert_eq!(wave, vec![a.id(), b.id()]);
    let all: Vec<_> = service.find_by_group("all").iter().map(|h| h.id()).collect();
    assert_eq!(all, vec![a.id(), c.id()]);
    assert_eq!(service.group_names(), vec!["all".to_string(), "wave".to_string()]);
}

#[test]
fn test_removed_timers_leave_their_groups() {
    let service = TimerService::new();
    service.builder().delay_ticks(5).group("short").build(0, 0.0);
    let long = service.builder().delay_ticks(50).group("long").build(0, 0.0);

    service.process_all(5, 0.0);

    assert!(service.find_by_group("short").is_empty());
    assert_eq!(service.group_names(), vec!["long".to_string()]);
    assert_eq!(service.find_by_group("long")[0].id(), long.id());
}

// ═══════════════════════════════════════════════════════════════════════════
// Batch Operations
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_process_all_returns_live_count() {
    let service = TimerService::new();
    let count = counter();
    service.builder().delay_ticks(10).on_simple(bump(&count)).build(0, 0.0);
    service.builder().delay_ticks(20).on_simple(bump(&count)).build(0, 0.0);
    service
        .builder()
        .kind(TimerKind::Interval)
        .delay_ticks(10)
        .on_simple(bump(&count))
        .build(0, 0.0);

    assert_eq!(service.process_all(5, 0.0), 3);
    assert_eq!(service.process_all(10, 0.0), 2);
    assert_eq!(service.len(), 2);
    assert_eq!(service.process_all(20, 0.0), 1);
    assert_eq!(service.len(), 1);
    assert_eq!(fired(&count), 4);
}

#[test]
fn test_cancel_all_drops_everything_on_next_pass() {
    let service = TimerService::new();
    let count = counter();
    for _ in 0..5 {
        service.builder().delay_ticks(1).on_simple(bump(&count)).build(0, 0.0);
    }

    service.cancel_all();
    assert_eq!(service.len(), 5, "cancellation is deferred to the pump");
    assert_eq!(service.process_all(10, 0.0), 0);
    assert_eq!(fired(&count), 0);
}

#[test]
fn test_pause_all_and_resume_all() {
    let service = TimerService::new();
    let count = counter();
    let a = service.builder().delay_ticks(10).on_simple(bump(&count)).build(0, 0.0);
    let b = service.builder().delay_ticks(10).on_simple(bump(&count)).build(0, 0.0);
    b.cancel();

    service.pause_all();
    assert_eq!(a.state(), Some(TimerState::Paused));
    assert_eq!(b.state(), Some(TimerState::Cancelled));
    assert_eq!(service.process_all(100, 0.0), 1);
    assert_eq!(fired(&count), 0);

    service.resume_all();
    assert_eq!(a.state(), Some(TimerState::Running));
    assert_eq!(service.process_all(100, 0.0), 0);
    assert_eq!(fired(&count), 1);
}

#[test]
fn test_time_scale_is_coerced_positive() {
    let service = TimerService::new();
    assert_eq!(service.time_scale(), 1.0);
    service.set_time_scale(0.5);
    assert_eq!(service.time_scale(), 0.5);
    service.set_time_scale(0.0);
    assert_eq!(service.time_scale(), 1.0);
    service.set_time_scale(-4.0);
    assert_eq!(service.time_scale(), 1.0);
    service.set_time_scale(f64::NAN);
    assert_eq!(service.time_scale(), 1.0);

    let configured = TimerService::with_config(&ServiceConfig {
        time_scale: -1.0,
        log_faults: true,
    });
    assert_eq!(configured.time_scale(), 1.0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Chaining
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_chain_promotes_successor() {
    let service = TimerService::new();
    let a_count = counter();
    let b_count = counter();
    let a = service.builder().delay_ticks(10).on_simple(bump(&a_count)).build(100, 0.0);
    let b = service.builder().delay_ticks(20).on_simple(bump(&b_count)).build(100, 0.0);
    assert!(service.chain(a.id(), b.id()));

    service.process_all(110, 0.0);
    assert_eq!(fired(&a_count), 1);
    assert!(!a.is_alive());
    assert_eq!(b.state(), Some(TimerState::Running));
    assert_eq!(b.snapshot().unwrap().start, TimeValue::from_ticks(110));

    service.process_all(129, 0.0);
    assert_eq!(fired(&b_count), 0);
    service.process_all(130, 0.0);
    assert_eq!(fired(&b_count), 1);
}

#[test]
fn test_chain_wakes_paused_successor() {
    let service = TimerService::new();
    let count = counter();
    let first = service.builder().delay_ticks(5).build(0, 0.0);
    let next = service.builder().delay_ticks(5).on_simple(bump(&count)).build(0, 0.0);
    next.pause();
    assert!(first.chain_to(&next));

    service.process_all(100, 0.0);
    assert_eq!(next.state(), Some(TimerState::Running));
    assert_eq!(fired(&count), 0);

    service.process_all(104, 0.0);
    assert_eq!(fired(&count), 0);
    service.process_all(105, 0.0);
    assert_eq!(fired(&count), 1);
}

#[test]
fn test_cancelled_timer_does_not_promote_target() {
    let service = TimerService::new();
    let first = service.builder().delay_ticks(5).build(0, 0.0);
    let next = service.builder().delay_ticks(5).build(0, 0.0);
    next.pause();
    schedule::chain(&service, first.id(), next.id());

    first.cancel();
    service.process_all(10, 0.0);
    assert_eq!(next.state(), Some(TimerState::Paused));
}

#[test]
fn test_chain_to_missing_timer() {
    let service = TimerService::new();
    let live = service.builder().build(0, 0.0);
    assert!(!service.chain(TimerId::from_raw(77), live.id()));

    // Target that is gone by completion time: nothing happens
    let first = service.builder().delay_ticks(5).build(0, 0.0);
    assert!(service.chain(first.id(), TimerId::from_raw(77)));
    service.process_all(5, 0.0);
    assert!(service.is_empty());
}

#[test]
fn test_chain_factory_spawns_successor() {
    let service = TimerService::new();
    let count = counter();
    let inner = Arc::clone(&count);
    service
        .builder()
        .name("first")
        .delay_ticks(10)
        .with_chained_timer(move |svc| {
            svc.builder()
                .name("successor")
                .delay_ticks(5)
                .on_simple(bump(&inner))
        })
        .build(0, 0.0);

    assert_eq!(service.process_all(10, 0.0), 1);
    let successor = service.find_by_name("successor").unwrap();
    assert_eq!(successor.snapshot().unwrap().start, TimeValue::from_ticks(10));

    service.process_all(14, 0.0);
    assert_eq!(fired(&count), 0);
    assert_eq!(service.process_all(15, 0.0), 0);
    assert_eq!(fired(&count), 1);
}

#[test]
fn test_chain_factory_runs_after_cancel() {
    let service = TimerService::new();
    let first = service
        .builder()
        .delay_ticks(50)
        .with_chained_timer(|svc| svc.builder().name("successor").delay_ticks(5))
        .build(0, 0.0);

    first.cancel();
    assert_eq!(service.process_all(10, 0.0), 1);
    assert!(!first.is_alive());
    let successor = service.find_by_name("successor").unwrap();
    assert_eq!(successor.state(), Some(TimerState::Running));
    assert_eq!(successor.snapshot().unwrap().start, TimeValue::from_ticks(10));
}

#[test]
fn test_chain_factory_runs_after_callback_panic() {
    let (service, faults) = observed_service();
    service
        .builder()
        .name("bad")
        .delay_ticks(1)
        .on_simple(|| panic!("boom"))
        .with_chained_timer(|svc| svc.builder().name("successor").delay_ticks(5))
        .build(0, 0.0);

    assert_eq!(service.process_all(1, 0.0), 1);
    assert!(service.find_by_name("bad").is_none());
    assert!(service.find_by_name("successor").is_some());
    assert_eq!(faults.lock().unwrap().len(), 1);
}

#[test]
fn test_chain_factory_unused_with_live_target() {
    let service = TimerService::new();
    let first = service
        .builder()
        .delay_ticks(1)
        .with_chained_timer(|svc| svc.builder().name("from_factory"))
        .build(0, 0.0);
    let next = service.builder().delay_ticks(50).build(0, 0.0);
    first.chain_to(&next);

    service.process_all(1, 0.0);
    assert!(service.find_by_name("from_factory").is_none());
    assert_eq!(service.ids(), vec![next.id()]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Faults
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_panicking_callback_is_dropped_and_reported() {
    let (service, faults) = observed_service();
    let count = counter();
    let bad = service
        .builder()
        .name("bad")
        .kind(TimerKind::Interval)
        .delay_ticks(1)
        .on_simple(|| panic!("boom"))
        .build(0, 0.0);
    service.builder().delay_ticks(1).on_simple(bump(&count)).build(0, 0.0);

    assert_eq!(service.process_all(1, 0.0), 0);
    assert_eq!(fired(&count), 1, "later timers still run");

    let faults = faults.lock().unwrap();
    assert_eq!(faults.len(), 1);
    assert_eq!(
        faults[0],
        TimerFault::Callback {
            id: bad.id(),
            name: "bad".to_string(),
            message: "boom".to_string(),
        }
    );
}

#[test]
fn test_panicking_progress_callback_is_contained() {
    let (service, faults) = observed_service();
    service
        .builder()
        .delay_ticks(100)
        .on_progress(|_, _| panic!("progress {}", 1))
        .build(0, 0.0);

    assert_eq!(service.process_all(1, 0.0), 0);
    let faults = faults.lock().unwrap();
    assert!(matches!(&faults[0], TimerFault::Callback { message, .. } if message == "progress 1"));
}

#[test]
fn test_panicking_chain_factory_is_reported() {
    let (service, faults) = observed_service();
    let first = service
        .builder()
        .delay_ticks(1)
        .with_chained_timer(|_| panic!("no successor"))
        .build(0, 0.0);

    assert_eq!(service.process_all(1, 0.0), 0);
    let faults = faults.lock().unwrap();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].timer_id(), first.id());
    assert!(matches!(faults[0], TimerFault::ChainFactory { .. }));
}

#[test]
fn test_faults_without_observer_keep_pump_alive() {
    let service = TimerService::new();
    service.builder().on_simple(|| panic!("unobserved")).build(0, 0.0);
    service.builder().delay_ticks(5).build(0, 0.0);

    assert_eq!(service.process_all(0, 0.0), 1);
    service.clear_fault_observer();
    assert_eq!(service.process_all(5, 0.0), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Re-entrancy & Threads
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_callbacks_can_schedule_during_pass() {
    let service = TimerService::new();
    let spawned = counter();
    let spawned_inner = Arc::clone(&spawned);
    service
        .builder()
        .name("parent")
        .delay_ticks(1)
        .on_once(move |t| {
            t.service()
                .builder()
                .name("child")
                .on_simple(bump(&spawned_inner))
                .build(1, 0.0);
        })
        .build(0, 0.0);

    // The child is registered but not part of this pass's snapshot
    assert_eq!(service.process_all(1, 0.0), 1);
    assert_eq!(fired(&spawned), 0);
    assert!(service.find_by_name("parent").is_none());
    assert!(service.find_by_name("child").is_some());

    assert_eq!(service.process_all(2, 0.0), 0);
    assert_eq!(fired(&spawned), 1);
}

#[test]
fn test_callback_cancelling_later_timer_stops_it() {
    let service = TimerService::new();
    let count = counter();
    let target_slot: Arc<Mutex<Option<TimerId>>> = Arc::new(Mutex::new(None));
    let lookup = Arc::clone(&target_slot);

    service
        .builder()
        .delay_ticks(1)
        .on_once(move |t| {
            if let Some(id) = *lookup.lock().unwrap() {
                if let Some(target) = t.service().find_by_id(id) {
                    target.cancel();
                }
            }
        })
        .build(0, 0.0);
    let target = service.builder().delay_ticks(1).on_simple(bump(&count)).build(0, 0.0);
    *target_slot.lock().unwrap() = Some(target.id());

    assert_eq!(service.process_all(1, 0.0), 0);
    assert_eq!(fired(&count), 0);
}

#[test]
fn test_concurrent_scheduling_while_pumping() {
    let service = TimerService::new();
    let count = counter();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let service = service.clone();
            let count = Arc::clone(&count);
            thread::spawn(move || {
                let mut ids = Vec::new();
                for i in 0..250u64 {
                    let handle = convenience::delay(
                        &service,
                        TimeValue::from_ticks(i % 3),
                        0,
                        0.0,
                        bump(&count),
                    );
                    ids.push(handle.id());
                }
                ids
            })
        })
        .collect();

    let mut tick = 0;
    while workers.iter().any(|w| !w.is_finished()) {
        tick += 1;
        service.process_all(tick, 0.0);
    }
    let mut all_ids: Vec<TimerId> = workers
        .into_iter()
        .flat_map(|w| w.join().unwrap())
        .collect();

    service.process_all(tick + 10, 0.0);
    assert!(service.is_empty());
    assert_eq!(fired(&count), 1000);

    all_ids.sort();
    all_ids.dedup();
    assert_eq!(all_ids.len(), 1000, "ids must be unique across threads");
}

// ═══════════════════════════════════════════════════════════════════════════
// Convenience Functions
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_convenience_functions_configure_kinds() {
    let service = TimerService::new();
    let t = TimeValue::from_ticks(10);

    let d = convenience::delay(&service, t, 0, 0.0, || {});
    let i = convenience::interval(&service, t, 0, 0.0, || {});
    let r = convenience::repeat(&service, t, 4, 0, 0.0, |_| {});
    let u = convenience::repeat_until(&service, t, 0, 0.0, |_| true);
    let db = convenience::debounce(&service, t, 0, 0.0, || {});
    let th = convenience::throttle(&service, t, 0, 0.0, || {});
    let after = schedule::after(&service, schedule::seconds(1.0), 0, 0.0, || {});
    let every = schedule::every(&service, schedule::ticks(3), 0, 0.0, || {});

    assert_eq!(d.kind(), Some(TimerKind::Once));
    assert_eq!(i.kind(), Some(TimerKind::Interval));
    assert_eq!(r.kind(), Some(TimerKind::Repeat));
    assert_eq!(r.total_iterations(), Some(4));
    assert_eq!(u.kind(), Some(TimerKind::Loop));
    assert_eq!(db.kind(), Some(TimerKind::Debounce));
    assert_eq!(th.kind(), Some(TimerKind::Throttle));
    assert_eq!(after.time_base(), Some(tickwork_types::TimeBase::Time));
    assert_eq!(every.kind(), Some(TimerKind::Interval));
}

#[test]
fn test_repeat_until_stops_when_predicate_holds() {
    let service = TimerService::new();
    let count = counter();
    let inner = Arc::clone(&count);
    convenience::repeat_until(&service, TimeValue::from_ticks(1), 0, 0.0, move |_| {
        inner.fetch_add(1, Ordering::SeqCst) + 1 == 3
    });

    for tick in 1..=10 {
        service.process_all(tick, 0.0);
    }
    assert_eq!(fired(&count), 3);
    assert!(service.is_empty());
}
