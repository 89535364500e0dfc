use core::convert::Infallible;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use const_format::concatcp;
use eyre::Result as EyreResult;
use tableraft_primitives::ServerId;

use crate::defaults;

mod ack;
mod init;
mod pump;
mod show;

use ack::AckCommand;
use init::InitCommand;
use pump::PumpCommand;
use show::ShowCommand;

pub const EXAMPLES: &str = r"
  # Set up a table with one shard replicated on three servers
  $ tableraft --home data/ init --replica alpha --replica beta --replica gamma

  # Report that beta lost its primary while at the empty state
  $ tableraft --home data/ ack --server beta --contract <ID> --state need-primary

  # Preview the next contracts without saving them
  $ tableraft --home data/ pump --dry-run

  # List the contracts per region
  $ tableraft --home data/ show
";

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(after_help = concatcp!(
    "Environment variables:\n",
    "  TABLERAFT_HOME    Directory for config and leader state\n\n",
    "Examples:",
    EXAMPLES
))]
pub struct RootCommand {
    #[command(flatten)]
    pub args: RootArgs,

    #[command(subcommand)]
    pub action: SubCommands,
}

#[derive(Debug, Subcommand)]
pub enum SubCommands {
    Init(InitCommand),
    Ack(AckCommand),
    Pump(PumpCommand),
    #[command(alias = "ls")]
    Show(ShowCommand),
}

#[derive(Debug, Parser)]
pub struct RootArgs {
    /// Directory for config and leader state
    #[arg(long, value_name = "PATH", default_value_t = defaults::default_home_dir())]
    #[arg(env = "TABLERAFT_HOME", hide_env_values = true)]
    pub home: Utf8PathBuf,
}

impl RootCommand {
    pub fn run(self) -> EyreResult<()> {
        match self.action {
            SubCommands::Init(init) => init.run(&self.args),
            SubCommands::Ack(ack) => ack.run(&self.args),
            SubCommands::Pump(pump) => pump.run(&self.args),
            SubCommands::Show(show) => show.run(&self.args),
        }
    }
}

/// Servers are given by base58 id or by name.
pub fn parse_server(value: &str) -> Result<ServerId, Infallible> {
    Ok(value
        .parse::<ServerId>()
        .unwrap_or_else(|_| ServerId::named(value)))
}
