use clap::Parser;
use eyre::Result as EyreResult;
use serde_json::json;
use tableraft_config::OutputFormat;
use tableraft_primitives::{Contract, ServerId};

use crate::cli::RootArgs;
use crate::state;

/// Print the live contracts in key order
#[derive(Debug, Parser)]
pub struct ShowCommand {
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,
}

impl ShowCommand {
    pub fn run(self, root_args: &RootArgs) -> EyreResult<()> {
        let state = state::load(&root_args.home)?;

        let mut rows: Vec<_> = state
            .contracts
            .iter()
            .map(|(id, (region, contract))| (region, id, contract))
            .collect();
        rows.sort_unstable_by(|left, right| left.0.cmp(right.0));

        match self.format {
            OutputFormat::Json => {
                let rows: Vec<_> = rows
                    .into_iter()
                    .map(|(region, id, contract)| json!({ "region": region, "id": id, "contract": contract }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
            OutputFormat::Pretty => {
                for (region, id, contract) in rows {
                    println!("{region}  {id}");
                    print_contract(contract);
                }
            }
        }

        Ok(())
    }
}

fn print_contract(contract: &Contract) {
    let primary = match contract.primary {
        Some(primary) => match primary.hand_over {
            Some(successor) => format!("{} (handing over to {successor})", primary.server),
            None => primary.server.to_string(),
        },
        None => "-".to_owned(),
    };

    println!("  primary:  {primary}");
    println!("  replicas: {}", join(&contract.replicas));
    println!("  voters:   {}", join(&contract.voters));
    if let Some(temp_voters) = &contract.temp_voters {
        println!("  next:     {}", join(temp_voters));
    }
    println!("  branch:   {}", contract.branch);
}

fn join<'a>(servers: impl IntoIterator<Item = &'a ServerId>) -> String {
    servers
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
