//! Branch allocation for one pump pass.

use std::collections::BTreeMap;

use tableraft_contract::{BranchError, BranchMaker};
use tableraft_lineage::BranchBirthCertificate;
use tableraft_primitives::{BranchId, KeyRange, ServerId, Version};
use tracing::debug;

#[derive(Debug)]
struct BranchRun {
    branch: BranchId,
    region: KeyRange,
}

/// Hands out branch ids while the pump sweeps sub-regions in key order.
///
/// Requests for the same `(server, version)` over contiguous sub-regions
/// share one branch whose region grows with every request. Nothing is
/// registered until [`BranchCoalescer::finish`].
#[derive(Debug)]
pub struct BranchCoalescer {
    generation: u64,
    coalesce: bool,
    runs: BTreeMap<(ServerId, Version), Vec<BranchRun>>,
}

impl BranchCoalescer {
    /// `generation` identifies the history the pass runs against. With
    /// `coalesce` unset every request gets a branch of its own.
    #[must_use]
    pub const fn new(generation: u64, coalesce: bool) -> Self {
        Self {
            generation,
            coalesce,
            runs: BTreeMap::new(),
        }
    }

    /// Birth certificates of every branch handed out, covering each run in full.
    #[must_use]
    pub fn finish(self) -> BTreeMap<BranchId, BranchBirthCertificate> {
        let mut branches = BTreeMap::new();

        for ((_, version), runs) in self.runs {
            for run in runs {
                let certificate = BranchBirthCertificate::new(run.region, version);
                drop(branches.insert(run.branch, certificate));
            }
        }

        branches
    }
}

impl BranchMaker for BranchCoalescer {
    fn make_branch(
        &mut self,
        server: ServerId,
        version: &Version,
        region: &KeyRange,
    ) -> Result<BranchId, BranchError> {
        let coalesce = self.coalesce;
        let runs = self.runs.entry((server, *version)).or_default();

        if let Some(run) = runs.last_mut().filter(|_| coalesce) {
            if run.region == *region {
                return Ok(run.branch);
            }

            if let Some(joined) = run.region.join(region) {
                debug!(branch = %run.branch, %server, region = %joined, "Extending branch run");
                run.region = joined;
                return Ok(run.branch);
            }
        }

        let branch = BranchId::derive(server, version, region.left(), self.generation)?;
        runs.push(BranchRun {
            branch,
            region: region.clone(),
        });

        Ok(branch)
    }
}
