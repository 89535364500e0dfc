//! Branch lineage index
//!
//! Every branch records where it came from: for each part of its region, the
//! version of the parent branch it started from. Chaining those records yields,
//! for any key range, a single path from the nil branch to a given branch. This
//! crate answers how far a version claimed on some branch has progressed along
//! such a path, which is what makes replicas that last acked on different but
//! related branches comparable.
//!
//! The history is append-only and is handed around as an immutable snapshot.

use std::collections::btree_map::{BTreeMap, Entry};
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tableraft_primitives::{
    BranchId, KeyRange, RegionMap, RegionMapError, StateTimestamp, StoreKey, Version,
};
use thiserror::Error;
use tracing::debug;

/// Origin record of a branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchBirthCertificate {
    /// Keys the branch carries writes for.
    pub region: KeyRange,

    /// Timestamp of the branch's first state.
    pub initial_timestamp: StateTimestamp,

    /// Parent version of every part of `region`.
    pub origin: RegionMap<Version>,
}

impl BranchBirthCertificate {
    /// A branch over `region` that starts from `version` everywhere.
    #[must_use]
    pub fn new(region: KeyRange, version: Version) -> Self {
        Self {
            initial_timestamp: version.timestamp,
            origin: RegionMap::new(region.clone(), version),
            region,
        }
    }

    /// A branch over `region` that starts from the empty state.
    #[must_use]
    pub fn root(region: KeyRange) -> Self {
        Self::new(region, Version::zero())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum HistoryError {
    #[error("the nil branch cannot be registered")]
    NilBranch,

    #[error("branch {0} is already registered with a different origin")]
    Conflict(BranchId),

    #[error("origin of branch {branch} covers {origin} instead of {region}")]
    OriginDomain {
        branch: BranchId,
        region: KeyRange,
        origin: KeyRange,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProjectionError {
    #[error("branch {0} is not in the history")]
    UnknownBranch(BranchId),

    #[error("version {version} is not on the lineage of branch {target}")]
    NotAncestor { version: Version, target: BranchId },

    #[error("origin of branch {branch} is not uniform over the region")]
    Region {
        branch: BranchId,
        #[source]
        source: RegionMapError,
    },

    #[error("lineage of branch {0} loops")]
    Cycle(BranchId),
}

/// Append-only map of every known branch to its birth certificate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchHistory {
    branches: BTreeMap<BranchId, BranchBirthCertificate>,
}

impl BranchHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    #[must_use]
    pub fn get(&self, branch: &BranchId) -> Option<&BranchBirthCertificate> {
        self.branches.get(branch)
    }

    #[must_use]
    pub fn contains(&self, branch: &BranchId) -> bool {
        self.branches.contains_key(branch)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BranchId, &BranchBirthCertificate)> + '_ {
        self.branches.iter()
    }

    /// Records a branch.
    ///
    /// Returns `Ok(false)` if the identical certificate was already recorded.
    pub fn insert(
        &mut self,
        branch: BranchId,
        certificate: BranchBirthCertificate,
    ) -> Result<bool, HistoryError> {
        if branch.is_nil() {
            return Err(HistoryError::NilBranch);
        }

        if certificate.origin.domain() != &certificate.region {
            return Err(HistoryError::OriginDomain {
                branch,
                region: certificate.region,
                origin: certificate.origin.domain().clone(),
            });
        }

        match self.branches.entry(branch) {
            Entry::Occupied(existing) if existing.get() == &certificate => Ok(false),
            Entry::Occupied(_) => Err(HistoryError::Conflict(branch)),
            Entry::Vacant(slot) => {
                debug!(%branch, region = %certificate.region, "Recorded branch");
                let _ignored = slot.insert(certificate);
                Ok(true)
            }
        }
    }

    /// Every key at which some branch's region or origin changes.
    #[must_use]
    pub fn split_keys(&self) -> BTreeSet<StoreKey> {
        let mut keys = BTreeSet::new();

        for certificate in self.branches.values() {
            keys.extend(certificate.origin.boundaries().cloned());
            keys.extend(certificate.region.right().key().cloned());
        }

        keys
    }

    /// Parent version of `branch` over `region`.
    fn parent(&self, branch: BranchId, region: &KeyRange) -> Result<Version, ProjectionError> {
        let certificate = self
            .branches
            .get(&branch)
            .ok_or(ProjectionError::UnknownBranch(branch))?;

        certificate
            .origin
            .lookup(region)
            .copied()
            .map_err(|source| ProjectionError::Region { branch, source })
    }

    /// Projects `version` onto the path from the nil branch to `target` over
    /// `region`.
    ///
    /// The result is how far along that path the state described by `version`
    /// reaches: the version's own timestamp while it is on the path, capped by
    /// the timestamp at which the path left the version's branch.
    pub fn project(
        &self,
        version: &Version,
        target: BranchId,
        region: &KeyRange,
    ) -> Result<StateTimestamp, ProjectionError> {
        if version.is_zero() {
            return Ok(StateTimestamp::ZERO);
        }

        let mut current = target;
        let mut ceiling: Option<StateTimestamp> = None;

        for _ in 0..=self.branches.len() {
            if current == version.branch {
                let reached = ceiling.map_or(version.timestamp, |cap| cap.min(version.timestamp));
                return Ok(reached);
            }

            if current.is_nil() {
                return Err(ProjectionError::NotAncestor {
                    version: *version,
                    target,
                });
            }

            let parent = self.parent(current, region)?;
            ceiling = Some(ceiling.map_or(parent.timestamp, |cap| cap.min(parent.timestamp)));
            current = parent.branch;
        }

        Err(ProjectionError::Cycle(target))
    }
}

/// Projects `version` onto the lineage of `target` over `region`; see
/// [`BranchHistory::project`].
pub fn project(
    history: &BranchHistory,
    version: &Version,
    target: BranchId,
    region: &KeyRange,
) -> Result<StateTimestamp, ProjectionError> {
    history.project(version, target, region)
}
