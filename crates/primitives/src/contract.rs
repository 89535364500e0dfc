//! Contracts: the declared replica, voter and primary assignment of a region.

#[cfg(test)]
#[path = "tests/contract.rs"]
mod tests;

use std::collections::BTreeSet;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ShardConfig;
use crate::id::{BranchId, ServerId};

/// The replica currently authorised to accept and order writes.
#[derive(
    Clone, Copy, Debug, Eq, Hash, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Primary {
    pub server: ServerId,

    /// Pending replacement; the primary steps down once it acks `primary_ready`
    /// for a contract carrying this flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_over: Option<ServerId>,
}

impl Primary {
    #[must_use]
    pub const fn new(server: ServerId) -> Self {
        Self {
            server,
            hand_over: None,
        }
    }

    #[must_use]
    pub const fn handing_over_to(self, successor: ServerId) -> Self {
        Self {
            server: self.server,
            hand_over: Some(successor),
        }
    }

    #[must_use]
    pub const fn staying(self) -> Self {
        Self {
            server: self.server,
            hand_over: None,
        }
    }
}

#[derive(
    Clone, Debug, Eq, Hash, PartialEq, BorshSerialize, BorshDeserialize, Serialize, Deserialize,
)]
pub struct Contract {
    /// Every server hosting the region.
    pub replicas: BTreeSet<ServerId>,

    /// Servers whose acks count towards the write quorum.
    pub voters: BTreeSet<ServerId>,

    /// Second voter set while a membership change is in flight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_voters: Option<BTreeSet<ServerId>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<Primary>,

    /// Branch that writes to the region currently land on.
    pub branch: BranchId,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvariantViolation {
    #[error("voter {0} is not a replica")]
    VoterNotReplica(ServerId),

    #[error("temporary voter {0} is not a replica")]
    TempVoterNotReplica(ServerId),

    #[error("primary {0} is not a replica")]
    PrimaryNotReplica(ServerId),
}

impl Contract {
    /// The first contract of a newly configured shard: every configured replica
    /// votes and nobody is primary yet.
    #[must_use]
    pub fn initial(config: &ShardConfig, branch: BranchId) -> Self {
        Self {
            replicas: config.replicas.clone(),
            voters: config.replicas.clone(),
            temp_voters: None,
            primary: None,
            branch,
        }
    }

    #[must_use]
    pub fn primary_server(&self) -> Option<ServerId> {
        self.primary.map(|primary| primary.server)
    }

    #[must_use]
    pub fn is_primary(&self, server: &ServerId) -> bool {
        self.primary_server().as_ref() == Some(server)
    }

    /// Checks the structural invariants every published contract must satisfy.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if let Some(voter) = self.voters.difference(&self.replicas).next() {
            return Err(InvariantViolation::VoterNotReplica(*voter));
        }

        if let Some(temp_voters) = &self.temp_voters {
            if let Some(voter) = temp_voters.difference(&self.replicas).next() {
                return Err(InvariantViolation::TempVoterNotReplica(*voter));
            }
        }

        match self.primary {
            Some(primary) if !self.replicas.contains(&primary.server) => {
                Err(InvariantViolation::PrimaryNotReplica(primary.server))
            }
            _ => Ok(()),
        }
    }
}
