use std::fs::create_dir_all;

use clap::Parser;
use eyre::{bail, Result as EyreResult, WrapErr};
use tableraft_config::ConfigFile;
use tableraft_primitives::{ServerId, ShardConfig, TableConfig};
use tableraft_pump::{InMemoryRegistrar, Leader, PumpOptions};
use tracing::{info, warn};

use crate::cli::{parse_server, RootArgs};
use crate::state;

/// Bootstrap the leader state, writing a single-shard configuration if none exists
#[derive(Debug, Parser)]
pub struct InitCommand {
    /// Replica of the table's only shard
    #[arg(long = "replica", value_name = "SERVER", value_parser = parse_server)]
    pub replicas: Vec<ServerId>,

    /// Preferred primary, the first replica by default
    #[arg(long, value_name = "SERVER", value_parser = parse_server)]
    pub primary: Option<ServerId>,

    /// Discard existing leader state
    #[arg(short, long)]
    pub force: bool,
}

impl InitCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let home = &root_args.home;

        create_dir_all(home).wrap_err_with(|| format!("failed to create directory {home:?}"))?;

        let config = if ConfigFile::exists(home) {
            if !self.replicas.is_empty() {
                warn!(%home, "Configuration exists, ignoring --replica");
            }
            ConfigFile::load(home)?
        } else {
            let Some(primary) = self.primary.or_else(|| self.replicas.first().copied()) else {
                bail!("no configuration in {home:?}, pass --replica to create one");
            };

            let table = TableConfig::single(ShardConfig::new(self.replicas, primary));
            table.validate()?;

            let config = ConfigFile::new(table, PumpOptions::default());
            config.save(home)?;
            info!(%home, "Wrote configuration");
            config
        };

        if state::exists(home) {
            if !self.force {
                bail!("table is already initialized in {home:?}");
            }
            warn!(%home, "Overwriting leader state");
        }

        let leader = Leader::bootstrap(config.table, &mut InMemoryRegistrar::new(), config.pump)?;
        state::save(home, leader.state())?;

        for (id, (region, _)) in leader.contracts() {
            println!("{id}\t{region}");
        }

        Ok(())
    }
}
