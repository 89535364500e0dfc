//! Leader-side bookkeeping around pump passes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tableraft_lineage::{BranchBirthCertificate, BranchHistory, HistoryError};
use tableraft_primitives::{
    BranchId, ConfigError, Contract, ContractAck, ContractId, KeyRange, ServerId, TableConfig,
    Version,
};
use tracing::{debug, info, warn};

use crate::{pump_contracts, BranchRegistrar, ContractDiff, PumpError, PumpOptions};

/// Everything a pump pass reads.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LeaderState {
    /// Keys the contracts partition.
    pub range: KeyRange,

    pub contracts: BTreeMap<ContractId, (KeyRange, Contract)>,

    /// Latest ack of every server for every live contract.
    #[serde(default, with = "ack_entries")]
    pub acks: BTreeMap<(ServerId, ContractId), ContractAck>,

    pub config: TableConfig,

    #[serde(default)]
    pub history: BranchHistory,
}

impl LeaderState {
    /// Replaces superseded contracts with the ones `diff` publishes. Acks
    /// addressed to removed contracts are dropped along with them.
    pub fn apply(&mut self, diff: ContractDiff) -> Result<(), HistoryError> {
        for (branch, certificate) in diff.new_branches {
            let _ignored = self.history.insert(branch, certificate)?;
        }

        for id in &diff.removed {
            drop(self.contracts.remove(id));
        }
        self.acks
            .retain(|(_, contract), _| !diff.removed.contains(contract));

        self.contracts.extend(diff.new_contracts);

        Ok(())
    }
}

/// Owns the authoritative contract set and runs pump passes over it.
#[derive(Debug)]
pub struct Leader {
    state: LeaderState,
    options: PumpOptions,
}

impl Leader {
    #[must_use]
    pub const fn new(state: LeaderState, options: PumpOptions) -> Self {
        Self { state, options }
    }

    /// Starts a table from scratch: one leaderless contract per shard, each on
    /// a root branch of its own.
    pub fn bootstrap(
        config: TableConfig,
        registrar: &mut dyn BranchRegistrar,
        options: PumpOptions,
    ) -> Result<Self, PumpError> {
        let ranges = config.shard_ranges()?;
        let mut contracts = BTreeMap::new();
        let mut history = BranchHistory::new();

        for (range, shard) in ranges.into_iter().zip(&config.shards) {
            let branch = BranchId::derive(shard.primary_replica, &Version::zero(), range.left(), 0)?;
            let certificate = BranchBirthCertificate::root(range.clone());

            registrar
                .register_branch(branch, &certificate)
                .map_err(|source| PumpError::Branch { branch, source })?;
            let _ignored = history.insert(branch, certificate)?;

            let contract = Contract::initial(shard, branch);
            let id = ContractId::derive(&range, &contract, core::iter::empty())?;

            info!(contract = %id, %range, %branch, replicas = shard.replicas.len(), "Bootstrapped shard");
            drop(contracts.insert(id, (range, contract)));
        }

        let state = LeaderState {
            range: KeyRange::universe(),
            contracts,
            acks: BTreeMap::new(),
            config,
            history,
        };

        Ok(Self::new(state, options))
    }

    #[must_use]
    pub const fn state(&self) -> &LeaderState {
        &self.state
    }

    #[must_use]
    pub fn into_state(self) -> LeaderState {
        self.state
    }

    #[must_use]
    pub const fn options(&self) -> &PumpOptions {
        &self.options
    }

    #[must_use]
    pub const fn contracts(&self) -> &BTreeMap<ContractId, (KeyRange, Contract)> {
        &self.state.contracts
    }

    /// Takes effect on the next pass.
    pub fn set_config(&mut self, config: TableConfig) -> Result<(), ConfigError> {
        config.validate()?;

        info!(shards = config.shards.len(), "Updated table configuration");
        self.state.config = config;

        Ok(())
    }

    /// Records `ack` as `server`'s latest word on `contract`. Acks for
    /// contracts that are not live are dropped and `false` is returned.
    pub fn record_ack(&mut self, server: ServerId, contract: ContractId, ack: ContractAck) -> bool {
        if !self.state.contracts.contains_key(&contract) {
            warn!(%server, %contract, "Dropping ack for unknown contract");
            return false;
        }

        debug!(%server, %contract, state = %ack.state, "Recorded ack");
        drop(self.state.acks.insert((server, contract), ack));

        true
    }

    /// Runs one pass and applies its diff. On error the state is left as it was.
    pub fn pump(&mut self, registrar: &mut dyn BranchRegistrar) -> Result<ContractDiff, PumpError> {
        let diff = pump_contracts(&self.state, registrar, &self.options)?;

        let mut next = self.state.clone();
        next.apply(diff.clone())?;
        self.state = next;

        Ok(diff)
    }
}

/// Acks are keyed by `(server, contract)`, which JSON cannot use as an object
/// key, so they are stored as a list.
mod ack_entries {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use tableraft_primitives::{ContractAck, ContractId, ServerId};

    #[derive(Serialize, Deserialize)]
    struct AckEntry<A> {
        server: ServerId,
        contract: ContractId,
        ack: A,
    }

    pub(super) fn serialize<S: Serializer>(
        acks: &BTreeMap<(ServerId, ContractId), ContractAck>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(acks.iter().map(|(&(server, contract), ack)| AckEntry {
            server,
            contract,
            ack,
        }))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<(ServerId, ContractId), ContractAck>, D::Error> {
        let entries = Vec::<AckEntry<ContractAck>>::deserialize(deserializer)?;

        Ok(entries
            .into_iter()
            .map(|entry| ((entry.server, entry.contract), entry.ack))
            .collect())
    }
}
