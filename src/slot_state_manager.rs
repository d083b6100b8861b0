//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! `SlotStateManager`: owns the `slot -> UpdateStamp` map for a single
//! (shard, granularity) pair and implements the merge algebra described in
//! the design doc's component design section.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::granularity::SlotId;
use crate::metrics::TrackerMetrics;
use crate::stamp::{SlotState, UpdateStamp};

/// Owns every [`UpdateStamp`] for a single (shard, granularity): the
/// convergence core of the tracker.
///
/// The slot map is a [`DashMap`], giving concurrent readers and writers
/// per-cell visibility without a single global lock. Stamp mutation has no
/// per-stamp lock beyond the shard the map already takes for the cell being
/// visited; the merge rules in this file are written to be stable under a
/// torn read of a concurrently-updated stamp (see `update_slot_on_read`).
pub struct SlotStateManager {
    slots: DashMap<SlotId, UpdateStamp>,
    clock: Arc<dyn Clock>,
    metrics: TrackerMetrics,
}

impl SlotStateManager {
    /// Create an empty manager sized for `num_slots` slots.
    pub fn new(num_slots: u64, clock: Arc<dyn Clock>, metrics: TrackerMetrics) -> SlotStateManager {
        SlotStateManager {
            slots: DashMap::with_capacity(num_slots as usize),
            clock,
            metrics,
        }
    }

    /// (a) Merge state arriving from the persisted cluster view.
    ///
    /// This is the convergence core: across any run of reads, `max(timestamp)`
    /// with `state = Active` eventually sticks on every node, whereupon the
    /// first successful rollup transitions all nodes to `Rolled` at that
    /// timestamp. Clean stamps are never overwritten downward; a node that
    /// holds a newer or still-unpersisted Active stamp marks itself dirty
    /// instead, guaranteeing it republishes so peers can converge.
    pub fn update_slot_on_read(&self, slot: SlotId, incoming_timestamp: i64, incoming_state: SlotState) {
        match self.slots.entry(slot) {
            Entry::Vacant(e) => {
                e.insert(UpdateStamp {
                    timestamp: incoming_timestamp,
                    state: incoming_state,
                    dirty: false,
                });
            }
            Entry::Occupied(mut e) => {
                let cur = *e.get();
                if cur.timestamp != incoming_timestamp && incoming_state == SlotState::Active {
                    let we_hold_newer_or_unpersisted_truth =
                        cur.state == SlotState::Active && (cur.timestamp > incoming_timestamp || cur.dirty);
                    if !we_hold_newer_or_unpersisted_truth {
                        e.insert(UpdateStamp {
                            timestamp: incoming_timestamp,
                            state: SlotState::Active,
                            dirty: false,
                        });
                    } else {
                        e.get_mut().dirty = true;
                    }
                } else if cur.timestamp == incoming_timestamp && incoming_state == SlotState::Rolled {
                    // remove wins on timestamp tie
                    e.get_mut().state = SlotState::Rolled;
                }
                // else: no-op
            }
        }
    }

    /// (b) Ingest always wins; no monotonicity check, because distributed
    /// clock skew across ingestors is handled by `update_slot_on_read` at
    /// read time instead.
    pub fn create_or_update_for_slot_and_millisecond(&self, slot: SlotId, now_millis: i64) {
        match self.slots.entry(slot) {
            Entry::Occupied(mut e) => {
                let was_rolled = e.get().state == SlotState::Rolled;
                {
                    let stamp = e.get_mut();
                    stamp.timestamp = now_millis;
                    stamp.state = SlotState::Active;
                    stamp.dirty = true;
                }
                if was_rolled {
                    self.metrics.tick_re_rollup();
                    debug!(slot, now_millis, "re-rolling: ingest reactivated a rolled slot");
                }
            }
            Entry::Vacant(e) => {
                e.insert(UpdateStamp::new_active(now_millis));
            }
        }
        self.metrics.tick_update();
    }

    /// (c) Snapshot every dirty entry and clear its flag in place.
    ///
    /// A concurrent write that sets `dirty` between the copy and the
    /// flag-clear will have its flag cleared erroneously; this is accepted,
    /// per the design doc, because the next ingest will re-dirty it. Callers
    /// must only assert eventual visibility, never per-scan atomicity.
    pub fn get_dirty_slot_stamps_and_mark_clean(&self) -> HashMap<SlotId, UpdateStamp> {
        let mut dirty = HashMap::new();
        for mut entry in self.slots.iter_mut() {
            if entry.dirty {
                dirty.insert(*entry.key(), *entry.value());
                entry.dirty = false;
            }
        }
        dirty
    }

    /// (d) Unconditionally move a slot to `new_state`, returning the mutated
    /// stamp.
    ///
    /// Calling this on a slot the caller never observed is undefined by
    /// design (the rollup executor must only call this on slots it
    /// previously saw); this implementation treats it defensively as a
    /// caller bug, logs it, and lazily creates the stamp rather than
    /// panicking.
    pub fn get_and_set_state(&self, slot: SlotId, new_state: SlotState) -> UpdateStamp {
        match self.slots.entry(slot) {
            Entry::Occupied(mut e) => {
                e.get_mut().state = new_state;
                *e.get()
            }
            Entry::Vacant(e) => {
                warn!(slot, "get_and_set_state called on a slot never previously observed");
                let stamp = UpdateStamp {
                    timestamp: self.clock.now_millis(),
                    state: new_state,
                    dirty: false,
                };
                e.insert(stamp);
                stamp
            }
        }
    }

    /// (e) A read-only view over the live map. Not a snapshot: readers may
    /// observe updates mid-iteration.
    pub fn get_slot_stamps(&self) -> &DashMap<SlotId, UpdateStamp> {
        &self.slots
    }

    /// (f) Slots that are not `Rolled` and are older than `max_age_millis`.
    /// Order is unspecified. Records `now - timestamp` into the time-since-
    /// update histogram for every slot visited, rolled slots included.
    pub fn get_slots_older_than(&self, now: i64, max_age_millis: i64) -> Vec<SlotId> {
        let mut result = Vec::new();
        for entry in self.slots.iter() {
            let age = now - entry.timestamp;
            self.metrics.observe_age(age);
            if entry.state != SlotState::Rolled && age > max_age_millis {
                result.push(*entry.key());
            }
        }
        result
    }

    /// Used only by [`crate::shard_state_manager::ShardStateManager`]'s
    /// coarser-propagation walk. Race-tolerant insert-or-activate of a
    /// parent slot: absent parents are created fresh and active; parents
    /// found in a non-`Active` state are forced active and dirty (a
    /// parent-before-child anomaly, logged and metered); parents already
    /// `Active` are left untouched so their own ingest path keeps them
    /// fresh and their age is not falsely reset.
    pub(crate) fn touch_as_parent(&self, slot: SlotId, now: i64) {
        match self.slots.entry(slot) {
            Entry::Vacant(e) => {
                e.insert(UpdateStamp::new_active(now));
            }
            Entry::Occupied(mut e) => {
                if e.get().state != SlotState::Active {
                    self.metrics.tick_parent_before_child();
                    warn!(slot, "parent-before-child: coarser slot rolled up before its parent was active");
                    let stamp = e.get_mut();
                    stamp.state = SlotState::Active;
                    stamp.dirty = true;
                    stamp.timestamp = now;
                }
            }
        }
    }
}
