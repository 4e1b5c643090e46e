//! Strata CLI - Command-line interface for configuration profiles
//!
//! This CLI provides operators with a terminal interface to:
//! - Resolve and inspect layered configuration profiles
//! - Validate resolved configuration before it is used
//! - Switch, inspect and restore the active environment
//! - Fetch secrets from configured providers

use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod error;
pub mod output;

use commands::{environment, resolve, secret, validate, Context};
pub use config::{StrataConfig, Workspace};
pub use error::{CliError, CliResult};

/// Strata CLI application
#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - Layered configuration and safe environment switching", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "STRATA_CONFIG")]
    config: Option<PathBuf>,

    /// Project root holding profiles and state
    #[arg(short, long, env = "STRATA_ROOT", default_value = ".")]
    root: PathBuf,

    /// Output format (table, json, yaml)
    #[arg(short, long, default_value = "table")]
    output: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Switch the active environment
    Switch {
        /// Target environment
        environment: String,

        /// Skip prerequisites and confirmation (validation still runs)
        #[arg(short, long)]
        force: bool,

        /// Confirmation answer, instead of prompting
        #[arg(long, value_name = "ANSWER")]
        confirm: Option<String>,
    },

    /// List configured environments
    #[command(alias = "ls")]
    List,

    /// Show the active environment
    Current,

    /// List backups of the active environment
    Backups,

    /// Restore the active environment from a backup
    Restore {
        /// Backup ID
        backup_id: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Delete old backups
    Prune {
        /// Number of newest backups to keep
        #[arg(short, long, default_value = "10")]
        keep: usize,
    },

    /// Validate a profile (defaults to the active one)
    Validate {
        /// Profile name
        profile: Option<String>,

        /// Treat warnings as blocking
        #[arg(long)]
        strict: bool,

        /// Only report through the exit status
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the resolved tree of a profile
    Resolve {
        /// Profile name
        profile: String,

        /// Overlay environment variables onto matching sections
        #[arg(short, long)]
        bind: bool,

        /// Fill secret-backed fields from their providers
        #[arg(short, long)]
        secrets: bool,
    },

    /// List available profiles
    Profiles,

    /// Secret providers
    Secret {
        #[command(subcommand)]
        command: secret::SecretCommands,
    },

    /// Show configuration
    Config,
}

/// Run using the current process arguments.
pub fn run() -> CliResult<()> {
    run_with_args(std::env::args_os())
}

/// Run using the provided argument iterator.
pub fn run_with_args<I, T>(args: I) -> CliResult<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();

    // Load config
    let config = StrataConfig::load(cli.config.as_deref(), &cli.root)?;
    let ctx = Context {
        workspace: Workspace::new(cli.root, config),
        output: cli.output,
    };

    // Execute command
    match cli.command {
        Commands::Switch {
            environment,
            force,
            confirm,
        } => environment::switch(&ctx, &environment, force, confirm),
        Commands::List => environment::list(&ctx),
        Commands::Current => environment::current(&ctx),
        Commands::Backups => environment::backups(&ctx),
        Commands::Restore { backup_id, yes } => environment::restore(&ctx, &backup_id, yes),
        Commands::Prune { keep } => environment::prune(&ctx, keep),
        Commands::Validate {
            profile,
            strict,
            quiet,
        } => validate::validate(&ctx, profile, strict, quiet),
        Commands::Resolve {
            profile,
            bind,
            secrets,
        } => resolve::resolve(&ctx, &profile, bind, secrets),
        Commands::Profiles => resolve::profiles(&ctx),
        Commands::Secret { command } => secret::execute(command, &ctx),
        Commands::Config => {
            if ctx.output == output::OutputFormat::Table {
                println!("Root: {}", ctx.workspace.root.display());
            }
            output::print_single(&ctx.workspace.config, ctx.output)
        }
    }
}
