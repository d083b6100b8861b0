//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! `UpdateStamp`: the atomic per-(shard, granularity, slot) cell.

/// The lifecycle state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotState {
    /// contains unrolled data; a rollup is pending
    Active,
    /// the persisted rollup reflects this timestamp; nothing to do
    Rolled,
    /// a rollup is in progress for this slot
    Running,
}

/// The mutable record held per (shard, granularity, slot).
///
/// A stamp in [`SlotState::Rolled`] with `dirty == false` is terminal until
/// ingest re-activates it. If `dirty == true`, the stamp must eventually
/// appear in a dirty-set extraction ([`crate::slot_state_manager::SlotStateManager::get_dirty_slot_stamps_and_mark_clean`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateStamp {
    /// milliseconds since a fixed epoch; the collection time of the newest
    /// sample known to belong in this slot
    pub timestamp: i64,
    /// the slot's lifecycle state
    pub state: SlotState,
    /// true iff the in-memory stamp has diverged from what has been
    /// persisted since the last flush
    pub dirty: bool,
}

impl UpdateStamp {
    /// A fresh, dirty, active stamp — the shape every newly-ingested slot
    /// starts in.
    pub fn new_active(timestamp: i64) -> UpdateStamp {
        UpdateStamp {
            timestamp,
            state: SlotState::Active,
            dirty: true,
        }
    }
}
