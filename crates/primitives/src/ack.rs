//! Replica acknowledgements of contracts.

#[cfg(test)]
#[path = "tests/ack.rs"]
mod tests;

use core::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::BranchId;
use crate::region::{KeyRange, StoreKey};
use crate::region_map::{RegionMap, RegionMapError};
use crate::version::Version;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckState {
    /// Caught up with the primary and receiving its writes.
    SecondaryStreaming,
    /// Has no reachable primary; reports its version so it can be elected.
    SecondaryNeedPrimary,
    /// Acting as primary with quorum backing under the contract's voter sets.
    PrimaryReady,
    /// Acting as primary and asking for its new branch to be adopted.
    PrimaryNeedBranch,
}

impl fmt::Display for AckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SecondaryStreaming => "secondary_streaming",
            Self::SecondaryNeedPrimary => "secondary_need_primary",
            Self::PrimaryReady => "primary_ready",
            Self::PrimaryNeedBranch => "primary_need_branch",
        })
    }
}

/// A replica's acknowledgement of one contract, covering the contract's whole region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAck {
    pub state: AckState,

    /// Present with `secondary_need_primary`; the replica's version may differ
    /// across the region.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<RegionMap<Version>>,

    /// Present with `primary_need_branch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchId>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AckError {
    #[error("{state} ack carries no version")]
    MissingVersion { state: AckState },

    #[error("{state} ack carries no branch")]
    MissingBranch { state: AckState },

    #[error(transparent)]
    Region(#[from] RegionMapError),
}

impl ContractAck {
    #[must_use]
    pub const fn streaming() -> Self {
        Self {
            state: AckState::SecondaryStreaming,
            version: None,
            branch: None,
        }
    }

    #[must_use]
    pub const fn need_primary(version: RegionMap<Version>) -> Self {
        Self {
            state: AckState::SecondaryNeedPrimary,
            version: Some(version),
            branch: None,
        }
    }

    #[must_use]
    pub const fn primary_ready() -> Self {
        Self {
            state: AckState::PrimaryReady,
            version: None,
            branch: None,
        }
    }

    #[must_use]
    pub const fn need_branch(branch: BranchId) -> Self {
        Self {
            state: AckState::PrimaryNeedBranch,
            version: None,
            branch: Some(branch),
        }
    }

    /// Keys at which this ack's content changes.
    pub fn boundaries(&self) -> impl Iterator<Item = &StoreKey> + '_ {
        self.version.iter().flat_map(RegionMap::boundaries)
    }

    /// The ack as it applies to `region`, which must not straddle a version boundary.
    pub fn restrict(&self, region: &KeyRange) -> Result<RegionAck, AckError> {
        let state = self.state;

        Ok(match state {
            AckState::SecondaryStreaming => RegionAck::SecondaryStreaming,
            AckState::SecondaryNeedPrimary => {
                let versions = self
                    .version
                    .as_ref()
                    .ok_or(AckError::MissingVersion { state })?;
                RegionAck::SecondaryNeedPrimary {
                    version: *versions.lookup(region)?,
                }
            }
            AckState::PrimaryReady => RegionAck::PrimaryReady,
            AckState::PrimaryNeedBranch => RegionAck::PrimaryNeedBranch {
                branch: self.branch.ok_or(AckError::MissingBranch { state })?,
            },
        })
    }
}

/// A [`ContractAck`] narrowed to one homogeneous region.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum RegionAck {
    SecondaryStreaming,
    SecondaryNeedPrimary { version: Version },
    PrimaryReady,
    PrimaryNeedBranch { branch: BranchId },
}

impl RegionAck {
    #[must_use]
    pub const fn state(&self) -> AckState {
        match self {
            Self::SecondaryStreaming => AckState::SecondaryStreaming,
            Self::SecondaryNeedPrimary { .. } => AckState::SecondaryNeedPrimary,
            Self::PrimaryReady => AckState::PrimaryReady,
            Self::PrimaryNeedBranch { .. } => AckState::PrimaryNeedBranch,
        }
    }
}
