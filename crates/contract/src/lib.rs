//! Contract transition function
//!
//! [`calculate_contract`] computes the next contract for one region from the
//! previous contract, the shard's configuration and the acks replicas sent for
//! the previous contract. It never mutates its inputs; the only outward effect is
//! asking a [`BranchMaker`] for a new branch when it elects a primary.
//!
//! The rules it follows, in order:
//!
//! - servers added to the configuration become replicas straight away;
//! - voter membership changes in two phases: `temp_voters` is proposed once a
//!   majority of the new set is streaming, and committed to `voters` once the
//!   primary reports `primary_ready` under both sets;
//! - replicas that are neither configured nor voting are dropped, except a
//!   primary, which is replaced first;
//! - without a primary, the most up-to-date voter among a majority of reporting
//!   voters is elected, preferring the configured primary;
//! - with a primary, a majority of voters that cannot reach it forces a
//!   failover, and a change of primary otherwise goes through a hand-over that
//!   the old primary must acknowledge before it steps down.

use core::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use tableraft_lineage::{project, BranchHistory};
use tableraft_primitives::{
    BranchId, Contract, InvariantViolation, KeyRange, Primary, RegionAck, ServerId,
    ShardConfig, StateTimestamp, Version,
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Mints branches on behalf of the transition function.
///
/// Implementations must be idempotent within one pump pass: repeated requests
/// for the same `(server, version)` over contiguous regions must return the same
/// branch id.
pub trait BranchMaker {
    /// Returns the id of a branch hosted on `server`, starting from `version`,
    /// carrying writes for `region`.
    fn make_branch(
        &mut self,
        server: ServerId,
        version: &Version,
        region: &KeyRange,
    ) -> Result<BranchId, BranchError>;
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BranchError {
    #[error("failed to encode branch request: {0}")]
    Encode(#[from] std::io::Error),

    #[error("branch registration failed: {0}")]
    Registration(String),
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContractError {
    #[error("branch allocation failed for region {region}: {source}")]
    Branch {
        region: KeyRange,
        #[source]
        source: BranchError,
    },

    #[error("computed contract for region {region} violates an invariant: {violation}")]
    Invariant {
        region: KeyRange,
        violation: InvariantViolation,
    },
}

/// Computes the contract that succeeds `old` over `region`.
///
/// `region` must not straddle any boundary of the inputs. `acks` holds only
/// acks sent for `old`, narrowed to `region`.
pub fn calculate_contract(
    region: &KeyRange,
    old: &Contract,
    config: &ShardConfig,
    acks: &BTreeMap<ServerId, RegionAck>,
    history: &BranchHistory,
    branch_maker: &mut dyn BranchMaker,
) -> Result<Contract, ContractError> {
    let (voters, temp_voters) = next_voters(old, config, acks);
    let (replicas, should_kill_primary) = next_replicas(old, config);

    let (primary, branch) = match old.primary {
        None => match elect_primary(region, old, &voters, config, acks, history) {
            Some((server, version)) => {
                let branch = branch_maker
                    .make_branch(server, &version, region)
                    .map_err(|source| ContractError::Branch {
                        region: region.clone(),
                        source,
                    })?;
                info!(%region, %server, %version, %branch, "Elected primary");
                (Some(Primary::new(server)), branch)
            }
            None => (None, old.branch),
        },
        Some(current) => (
            next_primary(region, current, &voters, config, acks, should_kill_primary),
            old.branch,
        ),
    };

    let branch = match (old.primary, primary) {
        (Some(before), Some(after)) if before.server == after.server => {
            match acks.get(&before.server) {
                Some(RegionAck::PrimaryNeedBranch { branch: requested }) => {
                    debug!(%region, server = %before.server, branch = %requested, "Adopting branch registered by primary");
                    *requested
                }
                _ => branch,
            }
        }
        _ => branch,
    };

    let contract = Contract {
        replicas,
        voters,
        temp_voters,
        primary,
        branch,
    };

    contract.check_invariants().map_err(|violation| {
        error!(%region, %violation, ?contract, "Refusing to publish unsafe contract");
        ContractError::Invariant {
            region: region.clone(),
            violation,
        }
    })?;

    Ok(contract)
}

/// Whether `count` servers are a strict majority of `total`.
const fn is_majority(count: usize, total: usize) -> bool {
    // More than half, rounded down.
    count > total / 2
}

/// Index into an ascending ranking of reports from which candidates are backed
/// by a majority of `voters` (themselves included). Rounds down.
const fn majority_rank(voters: usize) -> usize {
    voters / 2
}

fn acked(acks: &BTreeMap<ServerId, RegionAck>, server: &ServerId, state: &RegionAck) -> bool {
    acks.get(server) == Some(state)
}

/// Two-phase voter change: returns `(voters, temp_voters)`.
fn next_voters(
    old: &Contract,
    config: &ShardConfig,
    acks: &BTreeMap<ServerId, RegionAck>,
) -> (BTreeSet<ServerId>, Option<BTreeSet<ServerId>>) {
    match &old.temp_voters {
        None if old.voters != config.replicas => {
            let streaming = config
                .replicas
                .iter()
                .filter(|server| match acks.get(*server) {
                    Some(RegionAck::SecondaryStreaming) => true,
                    Some(_) => old.is_primary(server),
                    None => false,
                })
                .count();

            // Switching quorum before the new set can ack would stall writes.
            if is_majority(streaming, config.replicas.len()) {
                debug!(streaming, proposed = config.replicas.len(), "Proposing voter change");
                (old.voters.clone(), Some(config.replicas.clone()))
            } else {
                (old.voters.clone(), None)
            }
        }
        None => (old.voters.clone(), None),
        Some(temp_voters) => {
            let committed = old.primary.is_some_and(|primary| {
                acked(acks, &primary.server, &RegionAck::PrimaryReady)
            });

            if committed {
                debug!(voters = temp_voters.len(), "Committing voter change");
                (temp_voters.clone(), None)
            } else {
                (old.voters.clone(), Some(temp_voters.clone()))
            }
        }
    }
}

/// Grows replicas to the configured set and prunes servers nobody needs.
/// Returns the replicas and whether the primary itself should go.
fn next_replicas(old: &Contract, config: &ShardConfig) -> (BTreeSet<ServerId>, bool) {
    let dead: BTreeSet<ServerId> = old
        .replicas
        .iter()
        .filter(|server| {
            !config.replicas.contains(*server)
                && !old.voters.contains(*server)
                && !old
                    .temp_voters
                    .as_ref()
                    .is_some_and(|temp_voters| temp_voters.contains(*server))
        })
        .copied()
        .collect();

    let primary = old.primary_server();
    let should_kill_primary = primary.is_some_and(|server| dead.contains(&server));

    let replicas = old
        .replicas
        .union(&config.replicas)
        .filter(|server| !dead.contains(*server) || primary.as_ref() == Some(*server))
        .copied()
        .collect();

    (replicas, should_kill_primary)
}

/// Picks a primary for a region that has none, with the version it acked.
fn elect_primary(
    region: &KeyRange,
    old: &Contract,
    voters: &BTreeSet<ServerId>,
    config: &ShardConfig,
    acks: &BTreeMap<ServerId, RegionAck>,
    history: &BranchHistory,
) -> Option<(ServerId, Version)> {
    // Ascending by progress; among equals the lower server id ranks higher.
    let mut ranking: Vec<(StateTimestamp, Reverse<ServerId>, Version)> = voters
        .iter()
        .filter_map(|server| {
            let Some(RegionAck::SecondaryNeedPrimary { version }) = acks.get(server) else {
                return None;
            };

            match project(history, version, old.branch, region) {
                Ok(timestamp) => Some((timestamp, Reverse(*server), *version)),
                Err(err) => {
                    warn!(%region, %server, %version, %err, "Excluding replica from election");
                    None
                }
            }
        })
        .collect();
    ranking.sort_unstable();

    let eligible = ranking.get(majority_rank(voters.len())..).unwrap_or_default();

    let chosen = eligible
        .iter()
        .find(|(_, Reverse(server), _)| *server == config.primary_replica)
        .or_else(|| eligible.last())
        .map(|&(_, Reverse(server), version)| (server, version));

    if chosen.is_none() {
        debug!(%region, reports = ranking.len(), voters = voters.len(), "No primary eligible yet");
    }

    chosen
}

/// Decides whether the current primary stays, hands over or is removed.
fn next_primary(
    region: &KeyRange,
    current: Primary,
    voters: &BTreeSet<ServerId>,
    config: &ShardConfig,
    acks: &BTreeMap<ServerId, RegionAck>,
    should_kill_primary: bool,
) -> Option<Primary> {
    let unreachable = voters
        .iter()
        .filter(|server| matches!(acks.get(*server), Some(RegionAck::SecondaryNeedPrimary { .. })))
        .count();

    if is_majority(unreachable, voters.len()) {
        info!(%region, primary = %current.server, unreachable, "Primary lost its majority, failing over");
        return None;
    }

    let successor = config.primary_replica;
    let successor_ready = current.server != successor
        && acked(acks, &successor, &RegionAck::SecondaryStreaming);

    if !should_kill_primary && !successor_ready {
        return Some(current.staying());
    }

    // The old primary must confirm the hand-over before it is removed; the next
    // primary is only elected after a majority stops following this one.
    if current.hand_over == Some(successor)
        && acked(acks, &current.server, &RegionAck::PrimaryReady)
    {
        info!(%region, primary = %current.server, %successor, "Hand-over acknowledged, removing primary");
        return None;
    }

    if current.hand_over != Some(successor) {
        info!(%region, primary = %current.server, %successor, should_kill_primary, "Starting hand-over");
    }

    Some(current.handing_over_to(successor))
}

#[cfg(test)]
mod tests;
