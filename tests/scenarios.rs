//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! End-to-end scenarios exercising `ShardStateManager` across the test
//! granularity ladder: coarser-propagation, managed-vs-universe shard
//! semantics, and metrics wiring.

use std::sync::Arc;

use massa_rollup_tracker::test_exports::{FakeClock, TestGranularity};
use massa_rollup_tracker::{Clock, RollupTrackerConfig, ShardStateManager, SlotState, TrackerMetrics};
use prometheus::Registry;

fn tracker(
    managed_shards: Vec<u32>,
    shard_universe_size: u32,
) -> (ShardStateManager<TestGranularity>, Arc<FakeClock>, TrackerMetrics) {
    let clock = Arc::new(FakeClock::at(0));
    let metrics = TrackerMetrics::new(&Registry::new());
    let config = RollupTrackerConfig {
        managed_shards,
        shard_universe_size,
    };
    let tracker = ShardStateManager::new(config, clock.clone(), metrics.clone())
        .expect("valid config builds a tracker");
    (tracker, clock, metrics)
}

/// S5: propagating dirtiness from a finest-granularity slot creates both
/// coarser ancestors, active and dirty.
#[test]
fn coarser_propagation_creates_absent_ancestors() {
    let (tracker, _clock, _metrics) = tracker(vec![1], 4);

    assert!(tracker.get_update_stamp(1, TestGranularity::Mid, 3).is_none());
    assert!(tracker.get_update_stamp(1, TestGranularity::Coarse, 0).is_none());

    tracker.set_all_coarser_slots_dirty_for_slot(1, TestGranularity::Fine, 12);

    let mid = tracker.get_update_stamp(1, TestGranularity::Mid, 3).unwrap();
    assert_eq!(mid.state, SlotState::Active);
    assert!(mid.dirty);

    let coarse = tracker.get_update_stamp(1, TestGranularity::Coarse, 0).unwrap();
    assert_eq!(coarse.state, SlotState::Active);
    assert!(coarse.dirty);
}

/// S6: a parent already Active is left completely untouched by propagation;
/// only the still-absent grandparent is created.
#[test]
fn already_active_parent_is_left_untouched() {
    let (tracker, _clock, metrics) = tracker(vec![1], 4);

    let mid_manager = tracker
        .slot_state_manager(1, TestGranularity::Mid)
        .unwrap();
    mid_manager.update_slot_on_read(3, 5000, SlotState::Active);
    let before = tracker.get_update_stamp(1, TestGranularity::Mid, 3).unwrap();
    assert_eq!(before.timestamp, 5000);
    assert!(!before.dirty);

    tracker.set_all_coarser_slots_dirty_for_slot(1, TestGranularity::Fine, 12);

    let after = tracker.get_update_stamp(1, TestGranularity::Mid, 3).unwrap();
    assert_eq!(after, before);
    assert_eq!(metrics.parent_before_child_count(), 0);

    let coarse = tracker.get_update_stamp(1, TestGranularity::Coarse, 0).unwrap();
    assert_eq!(coarse.state, SlotState::Active);
    assert!(coarse.dirty);
}

/// A parent found Rolled (rather than absent) is a genuine parent-before-
/// child anomaly: it gets forced active/dirty and the meter ticks.
#[test]
fn rolled_parent_triggers_parent_before_child_anomaly() {
    let (tracker, _clock, metrics) = tracker(vec![1], 4);

    let mid_manager = tracker
        .slot_state_manager(1, TestGranularity::Mid)
        .unwrap();
    mid_manager.update_slot_on_read(3, 100, SlotState::Active);
    mid_manager.update_slot_on_read(3, 100, SlotState::Rolled);
    assert_eq!(
        tracker.get_update_stamp(1, TestGranularity::Mid, 3).unwrap().state,
        SlotState::Rolled
    );

    tracker.set_all_coarser_slots_dirty_for_slot(1, TestGranularity::Fine, 12);

    let mid = tracker.get_update_stamp(1, TestGranularity::Mid, 3).unwrap();
    assert_eq!(mid.state, SlotState::Active);
    assert!(mid.dirty);
    assert_eq!(metrics.parent_before_child_count(), 1);
}

/// S9: unmanaged shards are still ingested (the universe map exists for
/// every shard), but `contains` only reports managed shards, and an empty
/// managed set reports false even for shard 0.
#[test]
fn managed_set_gates_scheduling_not_ingestion() {
    let (tracker, _clock, _metrics) = tracker(vec![1, 3], 4);

    assert!(tracker.contains(1));
    assert!(tracker.contains(3));
    assert!(!tracker.contains(2));

    // Shard 2 is unmanaged but still in the universe: ingestion must not panic.
    let mgr = tracker.slot_state_manager(2, TestGranularity::Fine).unwrap();
    mgr.update_slot_on_read(0, 1234, SlotState::Active);
    assert_eq!(tracker.get_update_stamp(2, TestGranularity::Fine, 0).unwrap().timestamp, 1234);

    // get_dirty_slots_to_persist works for a managed shard.
    tracker
        .slot_state_manager(1, TestGranularity::Fine)
        .unwrap()
        .create_or_update_for_slot_and_millisecond(0, 10);
    assert!(tracker.get_dirty_slots_to_persist(1).is_some());

    let (empty_tracker, _clock, _metrics) = tracker_with_no_managed_shards();
    assert!(!empty_tracker.contains(0));
}

fn tracker_with_no_managed_shards() -> (ShardStateManager<TestGranularity>, Arc<FakeClock>, TrackerMetrics) {
    tracker(vec![], 4)
}

/// `get_dirty_slots_to_persist` returns `None` on a quiescent shard and
/// `Some` with exactly the dirty entries once something is dirty.
#[test]
fn dirty_slots_to_persist_signals_quiescence() {
    let (tracker, _clock, _metrics) = tracker(vec![1], 2);

    assert!(tracker.get_dirty_slots_to_persist(1).is_none());

    tracker
        .slot_state_manager(1, TestGranularity::Fine)
        .unwrap()
        .create_or_update_for_slot_and_millisecond(5, 42);

    let dirty = tracker.get_dirty_slots_to_persist(1).expect("one dirty slot");
    let fine_dirty = &dirty[&TestGranularity::Fine];
    assert_eq!(fine_dirty.len(), 1);
    assert_eq!(fine_dirty[&5].timestamp, 42);

    assert!(tracker.get_dirty_slots_to_persist(1).is_none());
}

/// A minimal sketch of the outer scheduling loop this crate does not ship:
/// age out a finest-granularity slot, run its "rollup" (Active -> Running ->
/// Rolled), propagate dirtiness to its coarser ancestors, then drain the
/// dirty set a persister would flush. Exercises the whole tracker end to end
/// the way a real scheduler/rollup-executor pair would drive it.
#[test]
fn sketch_of_an_outer_scheduling_loop() {
    let (tracker, clock, _metrics) = tracker(vec![1], 4);

    tracker
        .slot_state_manager(1, TestGranularity::Fine)
        .unwrap()
        .create_or_update_for_slot_and_millisecond(12, 0);

    clock.set(10_000);
    let fine_mgr = tracker.slot_state_manager(1, TestGranularity::Fine).unwrap();
    let old = fine_mgr.get_slots_older_than(clock.now_millis(), 1_000);
    assert_eq!(old, vec![12]);

    for &slot in &old {
        fine_mgr.get_and_set_state(slot, SlotState::Running);
        // ... rollup executor would compute and persist the aggregate here ...
        fine_mgr.get_and_set_state(slot, SlotState::Rolled);
        tracker.set_all_coarser_slots_dirty_for_slot(1, TestGranularity::Fine, slot);
    }

    assert_eq!(
        tracker.get_update_stamp(1, TestGranularity::Fine, 12).unwrap().state,
        SlotState::Rolled
    );

    let dirty = tracker.get_dirty_slots_to_persist(1).expect("ancestors are dirty");
    assert!(dirty[&TestGranularity::Mid][&3].dirty);
    assert!(dirty[&TestGranularity::Coarse][&0].dirty);
    assert!(tracker.get_dirty_slots_to_persist(1).is_none());
}

/// S8: the four telemetry sinks report the expected counts after one of
/// each kind of event.
#[test]
fn metrics_are_wired_through_every_sink() {
    let (tracker, clock, metrics) = tracker(vec![1], 2);
    let mgr = tracker.slot_state_manager(1, TestGranularity::Fine).unwrap();

    mgr.create_or_update_for_slot_and_millisecond(0, 100);
    assert_eq!(metrics.update_count(), 1);

    mgr.get_and_set_state(0, SlotState::Rolled);
    mgr.create_or_update_for_slot_and_millisecond(0, 200);
    assert_eq!(metrics.re_rollup_count(), 1);
    assert_eq!(metrics.update_count(), 2);

    clock.set(10_000);
    let _ = mgr.get_slots_older_than(10_000, 1);
    assert_eq!(metrics.age_observation_count(), 1);

    // Force a parent-before-child anomaly to tick the fourth sink.
    let mid_mgr = tracker.slot_state_manager(1, TestGranularity::Mid).unwrap();
    mid_mgr.update_slot_on_read(0, 1, SlotState::Active);
    mid_mgr.update_slot_on_read(0, 1, SlotState::Rolled);
    tracker.set_all_coarser_slots_dirty_for_slot(1, TestGranularity::Fine, 0);
    assert_eq!(metrics.parent_before_child_count(), 1);
}
