use clap::Parser;
use eyre::Result as EyreResult;
use tableraft_config::ConfigFile;
use tableraft_pump::{InMemoryRegistrar, Leader};
use tracing::info;

use crate::cli::RootArgs;
use crate::state;

/// Recompute contracts from the latest configuration and acks
#[derive(Debug, Parser)]
pub struct PumpCommand {
    /// Print the diff without saving the new leader state
    #[arg(long)]
    pub dry_run: bool,
}

impl PumpCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let home = &root_args.home;
        let config = ConfigFile::load(home)?;

        let mut leader = Leader::new(state::load(home)?, config.pump);
        leader.set_config(config.table)?;

        let mut registrar = InMemoryRegistrar::from(leader.state().history.clone());
        let diff = leader.pump(&mut registrar)?;

        println!("{}", serde_json::to_string_pretty(&diff)?);

        if self.dry_run {
            info!("Dry run, leader state left untouched");
            return Ok(());
        }

        state::save(home, leader.state())
    }
}
