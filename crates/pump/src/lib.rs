//! Region partitioner and pump driver
//!
//! One pump pass cuts the table's key range at every boundary any input knows
//! about, recomputes the contract of each piece, merges neighbours that end up
//! with equal contracts and reports the result as a [`ContractDiff`] against the
//! contracts the pass started from. A pass either yields a diff or an error;
//! it never leaves half of its work behind.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tableraft_contract::{calculate_contract, ContractError};
use tableraft_lineage::{BranchBirthCertificate, HistoryError};
use tableraft_primitives::{
    BranchId, ConfigError, Contract, ContractAck, ContractId, KeyRange, RegionAck, RegionMap,
    RegionMapError, RightBound, ServerId, StoreKey,
};
use thiserror::Error;
use tracing::{debug, info, warn};

mod coalesce;
mod registrar;
mod state;

pub use coalesce::BranchCoalescer;
pub use registrar::{BranchRegistrar, InMemoryRegistrar, RegistrarError};
pub use state::{Leader, LeaderState};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[non_exhaustive]
pub struct PumpOptions {
    /// Share one branch between contiguous regions electing the same replica
    /// from the same version. Turning this off mints a branch per sub-region.
    pub coalesce_branches: bool,
}

impl Default for PumpOptions {
    fn default() -> Self {
        Self {
            coalesce_branches: true,
        }
    }
}

impl PumpOptions {
    #[must_use]
    pub const fn with_coalesce_branches(mut self, coalesce_branches: bool) -> Self {
        self.coalesce_branches = coalesce_branches;
        self
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PumpError {
    #[error("contracts do not partition the key range: {0}")]
    Partition(#[source] RegionMapError),

    #[error("no contract covers region {region}: {source}")]
    Uncovered {
        region: KeyRange,
        #[source]
        source: RegionMapError,
    },

    #[error("contract {0} is missing from the snapshot")]
    UnknownContract(ContractId),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Contract(#[from] ContractError),

    #[error("failed to register branch {branch}: {source}")]
    Branch {
        branch: BranchId,
        #[source]
        source: RegistrarError,
    },

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("failed to derive an identifier: {0}")]
    Encode(#[from] std::io::Error),
}

/// Outcome of one pump pass.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ContractDiff {
    /// Contracts to publish, keyed by their new ids.
    pub new_contracts: BTreeMap<ContractId, (KeyRange, Contract)>,

    /// Ids of contracts that are superseded.
    pub removed: BTreeSet<ContractId>,

    /// Branches registered during the pass.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub new_branches: BTreeMap<BranchId, BranchBirthCertificate>,
}

impl ContractDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_contracts.is_empty() && self.removed.is_empty() && self.new_branches.is_empty()
    }
}

/// A sub-region with its recomputed contract and the old contracts it replaces.
#[derive(Debug)]
struct Piece {
    region: KeyRange,
    contract: Contract,
    predecessors: BTreeSet<ContractId>,
}

/// Runs one pass over `snapshot`.
///
/// Branches minted during the pass are registered with `registrar` before the
/// diff is returned; a registration failure fails the pass.
pub fn pump_contracts(
    snapshot: &LeaderState,
    registrar: &mut dyn BranchRegistrar,
    options: &PumpOptions,
) -> Result<ContractDiff, PumpError> {
    let range = &snapshot.range;

    let mut entries: Vec<(KeyRange, ContractId)> = snapshot
        .contracts
        .iter()
        .map(|(id, (region, _))| (region.clone(), *id))
        .collect();
    // Duplicated regions stay adjacent and fail the tiling check as an overlap.
    entries.sort_unstable_by(|(left, _), (right, _)| left.cmp(right));

    let layout = RegionMap::from_entries(range.clone(), entries).map_err(PumpError::Partition)?;

    let shards = snapshot.config.shard_map()?;
    let acks = index_acks(&snapshot.contracts, &snapshot.acks);

    let mut split_points: BTreeSet<StoreKey> = BTreeSet::new();
    let _ignored = split_points.insert(range.left().clone());
    split_points.extend(layout.boundaries().cloned());
    split_points.extend(shards.boundaries().cloned());
    split_points.extend(snapshot.history.split_keys());
    split_points.extend(
        acks.values()
            .flat_map(|entries| entries.iter().flat_map(|(_, ack)| ack.boundaries()))
            .cloned(),
    );
    split_points.retain(|key| range.contains_key(key));

    let generation = u64::try_from(snapshot.history.len()).unwrap_or(u64::MAX);
    let mut coalescer = BranchCoalescer::new(generation, options.coalesce_branches);
    let mut pieces: Vec<Piece> = Vec::with_capacity(split_points.len());

    let lefts = split_points.iter();
    let rights = split_points
        .iter()
        .skip(1)
        .cloned()
        .map(RightBound::Key)
        .chain(core::iter::once(range.right().clone()));

    for (left, right) in lefts.zip(rights) {
        let region = KeyRange::new(left.clone(), right).map_err(|_| {
            PumpError::Partition(RegionMapError::Tiling {
                domain: range.clone(),
                at: left.clone(),
            })
        })?;

        let id = *layout
            .lookup(&region)
            .map_err(|source| PumpError::Uncovered {
                region: region.clone(),
                source,
            })?;
        let (_, old) = snapshot
            .contracts
            .get(&id)
            .ok_or(PumpError::UnknownContract(id))?;
        let shard = shards
            .lookup(&region)
            .map_err(|source| PumpError::Uncovered {
                region: region.clone(),
                source,
            })?;

        let region_acks = restrict_acks(&region, id, acks.get(&id).map_or(&[][..], Vec::as_slice));

        let contract = calculate_contract(
            &region,
            old,
            shard,
            &region_acks,
            &snapshot.history,
            &mut coalescer,
        )?;

        if let Some(last) = pieces.last_mut().filter(|last| last.contract == contract) {
            if let Some(joined) = last.region.join(&region) {
                last.region = joined;
                let _ignored = last.predecessors.insert(id);
                continue;
            }
        }

        pieces.push(Piece::new(region, contract, id));
    }

    let new_branches = coalescer.finish();
    for (branch, certificate) in &new_branches {
        registrar
            .register_branch(*branch, certificate)
            .map_err(|source| PumpError::Branch {
                branch: *branch,
                source,
            })?;
        info!(%branch, region = %certificate.region, origin = %certificate.initial_timestamp, "Registered branch");
    }

    let diff = diff_pieces(&snapshot.contracts, pieces, new_branches)?;

    info!(
        regions = split_points.len(),
        published = diff.new_contracts.len(),
        removed = diff.removed.len(),
        branches = diff.new_branches.len(),
        "Pump pass complete"
    );

    Ok(diff)
}

impl Piece {
    fn new(region: KeyRange, contract: Contract, predecessor: ContractId) -> Self {
        Self {
            region,
            contract,
            predecessors: BTreeSet::from([predecessor]),
        }
    }
}

type AckIndex<'a> = BTreeMap<ContractId, Vec<(ServerId, &'a ContractAck)>>;

/// Groups acks by the contract they acknowledge, dropping acks for contracts
/// the snapshot does not hold.
fn index_acks<'a>(
    contracts: &BTreeMap<ContractId, (KeyRange, Contract)>,
    acks: &'a BTreeMap<(ServerId, ContractId), ContractAck>,
) -> AckIndex<'a> {
    let mut index: AckIndex<'a> = BTreeMap::new();

    for ((server, contract), ack) in acks {
        if !contracts.contains_key(contract) {
            warn!(%server, %contract, "Ignoring ack for unknown contract");
            continue;
        }

        index.entry(*contract).or_default().push((*server, ack));
    }

    index
}

fn restrict_acks(
    region: &KeyRange,
    contract: ContractId,
    acks: &[(ServerId, &ContractAck)],
) -> BTreeMap<ServerId, RegionAck> {
    acks.iter()
        .filter_map(|(server, ack)| match ack.restrict(region) {
            Ok(region_ack) => Some((*server, region_ack)),
            Err(err) => {
                warn!(%server, %contract, %region, %err, "Ignoring malformed ack");
                None
            }
        })
        .collect()
}

fn diff_pieces(
    old: &BTreeMap<ContractId, (KeyRange, Contract)>,
    pieces: Vec<Piece>,
    new_branches: BTreeMap<BranchId, BranchBirthCertificate>,
) -> Result<ContractDiff, PumpError> {
    let mut kept = BTreeSet::new();
    let mut new_contracts = BTreeMap::new();

    for piece in pieces {
        let unchanged = (piece.predecessors.len() == 1)
            .then(|| piece.predecessors.first().copied())
            .flatten()
            .filter(|id| {
                old.get(id).is_some_and(|(region, contract)| {
                    *region == piece.region && *contract == piece.contract
                })
            });

        if let Some(id) = unchanged {
            let _ignored = kept.insert(id);
            continue;
        }

        let id = ContractId::derive(&piece.region, &piece.contract, &piece.predecessors)?;
        debug!(contract = %id, region = %piece.region, predecessors = piece.predecessors.len(), "Publishing contract");
        drop(new_contracts.insert(id, (piece.region, piece.contract)));
    }

    let removed = old.keys().filter(|id| !kept.contains(*id)).copied().collect();

    Ok(ContractDiff {
        new_contracts,
        removed,
        new_branches,
    })
}
