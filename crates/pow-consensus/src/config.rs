//! Configuration types for proof-of-work consensus

use crate::domain::puzzle::{MAX_TARGET_BITS, MIN_TARGET_BITS};
use crate::error::{PowError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Runtime configuration for the consensus module
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PowConfig {
    /// Difficulty: target = 2^(256 - target_bits)
    pub target_bits: u32,

    /// Maximum transactions packed per block
    pub pack_limit: u64,

    /// Pause before each round so peer blocks can arrive (milliseconds)
    pub grace_period_ms: u64,

    /// Capacity of the network-to-round message queue
    pub queue_capacity: usize,

    /// What the listener does when the queue is full
    pub overflow_policy: OverflowPolicy,

    /// Chain identifier stamped on the genesis block
    pub chain_id: u64,
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            target_bits: crate::DEFAULT_TARGET_BITS,
            pack_limit: crate::DEFAULT_PACK_LIMIT,
            grace_period_ms: crate::DEFAULT_GRACE_PERIOD_MS,
            queue_capacity: crate::DEFAULT_QUEUE_CAPACITY,
            overflow_policy: OverflowPolicy::default(),
            chain_id: 0,
        }
    }
}

impl PowConfig {
    /// Grace period as a duration
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Reject values the module cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(MIN_TARGET_BITS..=MAX_TARGET_BITS).contains(&self.target_bits) {
            return Err(PowError::InvalidTargetBits {
                bits: self.target_bits,
            });
        }
        if self.queue_capacity == 0 {
            return Err(PowError::InvalidConfig(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if self.pack_limit == 0 {
            return Err(PowError::InvalidConfig(
                "pack_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Behavior of a full message queue
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// The listener waits until the round drains the queue
    #[default]
    Block,

    /// The oldest queued message is discarded to make room
    DropOldest,
}
