use serde::{Deserialize, Serialize};

use crate::dir::{HashFunction, ShardingParams};

use super::ShardError;

/// Widest branching the node bitmap can express (2^5 = 32 slots)
pub const MAX_BITS_PER_LEVEL: u8 = 5;

/// Tuning for sharded directories.
///
/// `bits_per_level`, `max_inline_entries` and `hash_function` are
/// written into the directory header when sharding activates;
/// `bucket_capacity` only steers when buckets split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardingConfig {
    pub bits_per_level: u8,
    pub max_inline_entries: u64,
    pub bucket_capacity: usize,
    pub hash_function: HashFunction,
}

impl Default for ShardingConfig {
    fn default() -> Self {
        let params = ShardingParams::default();
        Self {
            bits_per_level: params.bits_per_level,
            max_inline_entries: params.max_inline_entries,
            bucket_capacity: 8,
            hash_function: params.hash_function,
        }
    }
}

impl ShardingConfig {
    /// Rebuild a config from the parameters recorded in a directory header
    pub fn from_params(params: ShardingParams, bucket_capacity: usize) -> Self {
        Self {
            bits_per_level: params.bits_per_level,
            max_inline_entries: params.max_inline_entries,
            bucket_capacity,
            hash_function: params.hash_function,
        }
    }

    pub fn params(&self) -> ShardingParams {
        ShardingParams {
            bits_per_level: self.bits_per_level,
            max_inline_entries: self.max_inline_entries,
            hash_function: self.hash_function,
        }
    }

    pub fn validate(&self) -> Result<(), ShardError> {
        if self.bits_per_level == 0 || self.bits_per_level > MAX_BITS_PER_LEVEL {
            return Err(ShardError::InvalidConfig(format!(
                "bits_per_level must be between 1 and {}, got {}",
                MAX_BITS_PER_LEVEL, self.bits_per_level
            )));
        }
        if self.bucket_capacity == 0 {
            return Err(ShardError::InvalidConfig(
                "bucket_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of child slots per internal node
    pub fn fanout(&self) -> usize {
        1 << self.bits_per_level
    }

    /// Deepest level at which the hash still has bits left to consume
    pub fn max_depth(&self) -> u32 {
        (super::key::HASH_BITS / u32::from(self.bits_per_level)).saturating_sub(1)
    }
}
