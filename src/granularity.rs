//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! The granularity ladder: an external interface the tracker consumes to
//! know how finer slots roll up into coarser ones.
//!
//! `spec.md` treats this as a pure boundary — the tracker never hardcodes a
//! ladder. [`Granularity`] is the one concrete, canonical ladder this crate
//! ships (the classic Blueflood-style full/5m/20m/60m/240m/1440m sequence)
//! so the rest of the crate is runnable without a caller-supplied registry.
//! Callers with a different ladder can implement [`GranularityRegistry`]
//! against their own type.

use crate::error::TrackerError;

/// A shard identifier.
pub type ShardId = u32;

/// A slot identifier within a single granularity's slot space. Wraps modulo
/// `num_slots(g)`.
pub type SlotId = u64;

/// The finest-to-coarsest ladder shipped by this crate.
///
/// `Full` is the finest resolution (one slot per raw sample bucket);
/// `Min1440` is the coarsest (one day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    /// finest: unrolled, per-ingest-bucket data
    Full,
    /// 5 minute buckets
    Min5,
    /// 20 minute buckets
    Min20,
    /// 60 minute buckets
    Min60,
    /// 240 minute (4 hour) buckets
    Min240,
    /// 1440 minute (1 day) buckets, coarsest
    Min1440,
}

impl Granularity {
    /// All rollup granularities, finest first. Mirrors `rollupGranularities()`.
    pub const ALL: [Granularity; 6] = [
        Granularity::Full,
        Granularity::Min5,
        Granularity::Min20,
        Granularity::Min60,
        Granularity::Min240,
        Granularity::Min1440,
    ];

    /// The coarsest granularity in the ladder.
    pub fn coarsest() -> Granularity {
        Granularity::Min1440
    }

    /// The finest granularity in the ladder.
    pub fn finest() -> Granularity {
        Granularity::Full
    }

    fn bucket_minutes(self) -> u64 {
        match self {
            Granularity::Full => 1,
            Granularity::Min5 => 5,
            Granularity::Min20 => 20,
            Granularity::Min60 => 60,
            Granularity::Min240 => 240,
            Granularity::Min1440 => 1440,
        }
    }
}

/// The external granularity interface the tracker consumes.
///
/// Implementors define the finer/coarser relation, slot arithmetic, and
/// locator-key formatting; the tracker never embeds any of this itself.
pub trait GranularityRegistry {
    /// One level coarser than `self`. Fails with
    /// [`TrackerError::GranularityExhausted`] at the top of the ladder.
    fn coarser(&self) -> Result<Self, TrackerError>
    where
        Self: Sized;

    /// How many slots this granularity has; slot ids wrap modulo this value.
    fn num_slots(&self) -> u64;

    /// The slot in the *next coarser* granularity that `child_slot` maps
    /// into. Caller must only invoke this when `coarser()` would succeed.
    fn parent_slot(&self, child_slot: SlotId) -> SlotId;

    /// Locator keys for every finer slot nested under `slot` at this
    /// granularity, plus the key for `slot` itself.
    fn child_and_self_keys(&self, slot: SlotId, shard: ShardId) -> Vec<String>;

    /// The unique locator key for (self, slot, shard) in the persisted state.
    fn locator_key(&self, slot: SlotId, shard: ShardId) -> String;

    /// Every rollup granularity, finest first. Static over the registry, not
    /// tied to any one instance.
    fn all() -> Vec<Self>
    where
        Self: Sized;
}

impl GranularityRegistry for Granularity {
    fn coarser(&self) -> Result<Granularity, TrackerError> {
        let idx = Granularity::ALL
            .iter()
            .position(|g| g == self)
            .expect("Granularity::ALL is exhaustive over the enum");
        Granularity::ALL
            .get(idx + 1)
            .copied()
            .ok_or_else(|| TrackerError::GranularityExhausted(format!("{self:?}")))
    }

    fn num_slots(&self) -> u64 {
        // one day's worth of buckets at this resolution, wrapping daily
        1440 / self.bucket_minutes()
    }

    fn parent_slot(&self, child_slot: SlotId) -> SlotId {
        // coarser() is infallible to call here: parent_slot is only ever
        // invoked from a context that already confirmed a coarser level
        // exists (ShardStateManager::set_all_coarser_slots_dirty_for_slot).
        let coarser = GranularityRegistry::coarser(self).expect(
            "parent_slot must only be called when a coarser granularity exists",
        );
        let self_minutes = self.bucket_minutes();
        let coarser_minutes = coarser.bucket_minutes();
        let ratio = coarser_minutes / self_minutes;
        (child_slot / ratio) % coarser.num_slots()
    }

    fn child_and_self_keys(&self, slot: SlotId, shard: ShardId) -> Vec<String> {
        let mut keys = vec![self.locator_key(slot, shard)];
        if let Some(idx) = Granularity::ALL.iter().position(|g| g == self) {
            if idx > 0 {
                let finer = Granularity::ALL[idx - 1];
                let ratio = self.bucket_minutes() / finer.bucket_minutes();
                for i in 0..ratio {
                    let child_slot = (slot * ratio + i) % finer.num_slots();
                    keys.push(finer.locator_key(child_slot, shard));
                }
            }
        }
        keys
    }

    fn locator_key(&self, slot: SlotId, shard: ShardId) -> String {
        format!("{shard},{self:?},{slot}")
    }

    fn all() -> Vec<Granularity> {
        Granularity::ALL.to_vec()
    }
}
