//! Secret commands

use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use crate::commands::Context;
use crate::error::CliResult;
use crate::output::{self, OutputFormat};

/// Secret subcommands
#[derive(Subcommand)]
pub enum SecretCommands {
    /// Fetch a secret and print it
    Get {
        /// Provider ID
        provider: String,

        /// Secret ID
        secret_id: String,

        /// Print a single entry of the secret
        #[arg(short, long)]
        key: Option<String>,
    },

    /// List configured providers
    Providers,
}

/// Table row for secret entries
#[derive(Debug, Serialize, Tabled)]
struct EntryRow {
    key: String,
    value: String,
}

/// Table row for providers
#[derive(Debug, Serialize, Tabled)]
struct ProviderRow {
    provider: String,
}

/// Execute a secret command
pub fn execute(command: SecretCommands, ctx: &Context) -> CliResult<()> {
    let manager = ctx.workspace.secrets_manager();
    match command {
        SecretCommands::Get {
            provider,
            secret_id,
            key: Some(key),
        } => {
            let value = manager.get_secret_key(&provider, &secret_id, &key)?;
            match ctx.output {
                OutputFormat::Table => println!("{}", value),
                format => output::print_single(&value, format)?,
            }
            Ok(())
        }

        SecretCommands::Get {
            provider,
            secret_id,
            key: None,
        } => {
            let value = manager.get_secret(&provider, &secret_id)?;
            match ctx.output {
                OutputFormat::Table => {
                    let rows: Vec<EntryRow> = value
                        .expose()
                        .iter()
                        .map(|(key, value)| EntryRow {
                            key: key.clone(),
                            value: value.clone(),
                        })
                        .collect();
                    output::print_output(rows, OutputFormat::Table)
                }
                format => output::print_single(value.expose(), format),
            }
        }

        SecretCommands::Providers => {
            let rows: Vec<ProviderRow> = manager
                .providers()
                .into_iter()
                .map(|provider| ProviderRow { provider })
                .collect();
            output::print_output(rows, ctx.output)
        }
    }
}
