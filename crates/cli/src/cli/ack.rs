use clap::{Parser, ValueEnum};
use eyre::{bail, eyre, Result as EyreResult};
use tableraft_primitives::{
    BranchId, ContractAck, ContractId, RegionMap, ServerId, StateTimestamp, Version,
};
use tableraft_pump::{Leader, PumpOptions};

use crate::cli::{parse_server, RootArgs};
use crate::state;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum AckKind {
    /// Following the primary
    Streaming,
    /// Without a reachable primary
    NeedPrimary,
    /// Serving as primary with quorum
    Ready,
    /// Serving as primary on a new branch
    NeedBranch,
}

/// Record a replica's acknowledgement of a contract
#[derive(Debug, Parser)]
pub struct AckCommand {
    /// Acknowledging server
    #[arg(long, value_name = "SERVER", value_parser = parse_server)]
    pub server: ServerId,

    /// Acknowledged contract
    #[arg(long, value_name = "ID")]
    pub contract: ContractId,

    #[arg(long, value_enum)]
    pub state: AckKind,

    /// Branch of the replica's version, or the branch a primary wants adopted
    #[arg(long, value_name = "ID")]
    pub branch: Option<BranchId>,

    /// Timestamp of the replica's version on `--branch`
    #[arg(long, default_value_t = 0)]
    pub timestamp: u64,
}

impl AckCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let home = &root_args.home;
        let mut leader = Leader::new(state::load(home)?, PumpOptions::default());

        let (region, _) = leader
            .contracts()
            .get(&self.contract)
            .ok_or_else(|| eyre!("contract {} is not live", self.contract))?;

        let ack = match self.state {
            AckKind::Streaming => ContractAck::streaming(),
            AckKind::NeedPrimary => {
                let version = self.branch.map_or_else(Version::zero, |branch| {
                    Version::new(branch, StateTimestamp::new(self.timestamp))
                });
                ContractAck::need_primary(RegionMap::new(region.clone(), version))
            }
            AckKind::Ready => ContractAck::primary_ready(),
            AckKind::NeedBranch => {
                let Some(branch) = self.branch else {
                    bail!("--state need-branch requires --branch");
                };
                ContractAck::need_branch(branch)
            }
        };

        if !leader.record_ack(self.server, self.contract, ack) {
            bail!("contract {} is not live", self.contract);
        }

        state::save(home, leader.state())
    }
}
