//! Subcommand dispatch. Each command returns the process exit code.

use anyhow::Context;

use l3ha_client::NetworkClient;

use crate::{Cli, Commands, settings};

mod migrate;
mod optimize;

pub fn run(cli: &Cli) -> anyhow::Result<u8> {
    if matches!(cli.command, Commands::Rebalance) {
        settings::ensure_default_picker(&cli.global)?;
    }
    let file = settings::load_config(&cli.global)?;
    let client_config = settings::client_config(&cli.global, &file)?;
    let client = NetworkClient::new(client_config).context("creating API client")?;

    match &cli.command {
        Commands::Migrate { now } => {
            let migration = settings::migration_settings(&cli.global, &file)?;
            Ok(migrate::migrate(&client, migration, *now))
        }
        Commands::Evacuate { host } => {
            let migration = settings::migration_settings(&cli.global, &file)?;
            Ok(migrate::evacuate(&client, migration, host))
        }
        Commands::Check => {
            let migration = settings::migration_settings(&cli.global, &file)?;
            migrate::check(&client, migration)
        }
        Commands::Rebalance => {
            let migration = settings::migration_settings(&cli.global, &file)?;
            Ok(migrate::rebalance(&client, migration))
        }
        Commands::Optimize { format } => optimize::optimize(&client, file.agent_type(), format),
    }
}
