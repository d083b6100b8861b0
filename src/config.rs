//! Copyright (c) 2024 MASSA LABS <info@massa.net>

//! Tracker configuration knobs.
//!
//! Loading these from a config file/environment is out of scope for this
//! crate (see the purpose & scope section of the design doc) — this is just
//! the shape `ShardStateManager::new` needs.

use crate::error::TrackerError;
use crate::granularity::ShardId;

/// Configuration for a [`crate::shard_state_manager::ShardStateManager`].
#[derive(Debug, Clone)]
pub struct RollupTrackerConfig {
    /// shards this process schedules rollups for; the tracker still ingests
    /// and converges state for shards outside this set
    pub managed_shards: Vec<ShardId>,
    /// total number of shards in the cluster; slot-state maps are created
    /// for every shard in `0..shard_universe_size`, not just managed ones
    pub shard_universe_size: u32,
}

impl RollupTrackerConfig {
    /// Validate that every managed shard actually falls within the universe.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if let Some(bad) = self
            .managed_shards
            .iter()
            .find(|&&s| s >= self.shard_universe_size)
        {
            return Err(TrackerError::InvalidConfig(format!(
                "managed shard {bad} is outside the shard universe of size {}",
                self.shard_universe_size
            )));
        }
        Ok(())
    }
}
