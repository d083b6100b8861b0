//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! Test doubles for the tracker's two external interfaces, gated behind the
//! `testing` feature (mirroring how `massa-ledger-exports` and
//! `massa-bootstrap` gate their own `test_exports` modules) or plain
//! `#[cfg(test)]` for this crate's own test suite.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::clock::Clock;
use crate::error::TrackerError;
use crate::granularity::{GranularityRegistry, ShardId, SlotId};

/// A settable clock for deterministic tests. Starts at zero.
#[derive(Debug, Default)]
pub struct FakeClock {
    millis: AtomicI64,
}

impl FakeClock {
    /// A fake clock fixed at `millis`.
    pub fn at(millis: i64) -> FakeClock {
        FakeClock {
            millis: AtomicI64::new(millis),
        }
    }

    /// Move the clock to `millis`.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Advance the clock by `delta_millis`.
    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// A fixed, three-level granularity ladder used by the scenario tests in
/// the design doc (S5, S6): `Fine` (16 slots) rolls into `Mid` (4 slots,
/// ratio 4) rolls into `Coarse` (1 slot, ratio 4), matching
/// `parentSlot(Fine, 12) == 3` and `parentSlot(Mid, 3) == 0` exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestGranularity {
    /// finest: 16 slots
    Fine,
    /// middle: 4 slots, 4 `Fine` slots per `Mid` slot
    Mid,
    /// coarsest: 1 slot, 4 `Mid` slots per `Coarse` slot
    Coarse,
}

impl TestGranularity {
    const LADDER: [TestGranularity; 3] = [
        TestGranularity::Fine,
        TestGranularity::Mid,
        TestGranularity::Coarse,
    ];

    fn num_slots_raw(self) -> u64 {
        match self {
            TestGranularity::Fine => 16,
            TestGranularity::Mid => 4,
            TestGranularity::Coarse => 1,
        }
    }
}

impl GranularityRegistry for TestGranularity {
    fn coarser(&self) -> Result<TestGranularity, TrackerError> {
        let idx = TestGranularity::LADDER
            .iter()
            .position(|g| g == self)
            .expect("LADDER is exhaustive");
        TestGranularity::LADDER
            .get(idx + 1)
            .copied()
            .ok_or_else(|| TrackerError::GranularityExhausted(format!("{self:?}")))
    }

    fn num_slots(&self) -> u64 {
        self.num_slots_raw()
    }

    fn parent_slot(&self, child_slot: SlotId) -> SlotId {
        let coarser = GranularityRegistry::coarser(self)
            .expect("parent_slot must only be called when a coarser granularity exists");
        let ratio = self.num_slots_raw() / coarser.num_slots_raw();
        (child_slot / ratio) % coarser.num_slots_raw()
    }

    fn child_and_self_keys(&self, slot: SlotId, shard: ShardId) -> Vec<String> {
        vec![self.locator_key(slot, shard)]
    }

    fn locator_key(&self, slot: SlotId, shard: ShardId) -> String {
        format!("{shard},{self:?},{slot}")
    }

    fn all() -> Vec<TestGranularity> {
        TestGranularity::LADDER.to_vec()
    }
}
