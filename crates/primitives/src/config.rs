//! User-declared shape of a table.

#[cfg(test)]
#[path = "tests/config.rs"]
mod tests;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::ServerId;
use crate::region::{KeyRange, RightBound, StoreKey};
use crate::region_map::RegionMap;

/// Desired replicas of one shard.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShardConfig {
    pub replicas: BTreeSet<ServerId>,
    pub primary_replica: ServerId,
}

impl ShardConfig {
    #[must_use]
    pub fn new(replicas: impl IntoIterator<Item = ServerId>, primary_replica: ServerId) -> Self {
        Self {
            replicas: replicas.into_iter().collect(),
            primary_replica,
        }
    }
}

/// Shard scheme plus one [`ShardConfig`] per shard. Shard `i` covers the keys
/// between split key `i - 1` and split key `i`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    #[serde(default)]
    pub split_keys: Vec<StoreKey>,
    pub shards: Vec<ShardConfig>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{shards} shards do not fit {split_keys} split keys")]
    ShardCount { shards: usize, split_keys: usize },

    #[error("split key {0} is out of order")]
    UnorderedSplitKey(StoreKey),

    #[error("shard {0} has no replicas")]
    NoReplicas(usize),

    #[error("primary replica of shard {0} is not one of its replicas")]
    PrimaryNotReplica(usize),
}

impl TableConfig {
    /// A table with one shard covering every key.
    #[must_use]
    pub fn single(shard: ShardConfig) -> Self {
        Self {
            split_keys: Vec::new(),
            shards: vec![shard],
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shards.len() != self.split_keys.len().saturating_add(1) {
            return Err(ConfigError::ShardCount {
                shards: self.shards.len(),
                split_keys: self.split_keys.len(),
            });
        }

        let mut previous = StoreKey::min();
        for key in &self.split_keys {
            if *key <= previous {
                return Err(ConfigError::UnorderedSplitKey(key.clone()));
            }
            previous = key.clone();
        }

        if let Some(index) = self.shards.iter().position(|shard| shard.replicas.is_empty()) {
            return Err(ConfigError::NoReplicas(index));
        }

        if let Some(index) = self
            .shards
            .iter()
            .position(|shard| !shard.replicas.contains(&shard.primary_replica))
        {
            return Err(ConfigError::PrimaryNotReplica(index));
        }

        Ok(())
    }

    /// Key range of every shard, in key order.
    pub fn shard_ranges(&self) -> Result<Vec<KeyRange>, ConfigError> {
        self.validate()?;

        let lefts = core::iter::once(StoreKey::min()).chain(self.split_keys.iter().cloned());
        let rights = self
            .split_keys
            .iter()
            .cloned()
            .map(RightBound::Key)
            .chain(core::iter::once(RightBound::Unbounded));

        lefts
            .zip(rights)
            .map(|(left, right)| {
                KeyRange::new(left, right)
                    .map_err(|_| ConfigError::UnorderedSplitKey(StoreKey::min()))
            })
            .collect()
    }

    /// The shard configs laid out over the whole key space.
    pub fn shard_map(&self) -> Result<RegionMap<ShardConfig>, ConfigError> {
        let ranges = self.shard_ranges()?;

        RegionMap::from_entries(
            KeyRange::universe(),
            ranges.into_iter().zip(self.shards.iter().cloned()),
        )
        .map_err(|_| ConfigError::ShardCount {
            shards: self.shards.len(),
            split_keys: self.split_keys.len(),
        })
    }
}
