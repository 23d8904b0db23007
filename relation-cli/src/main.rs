//! relctl: inspect and repair a unit agent's persisted relation state.
//!
//! # Usage
//!
//! ```text
//! relctl [--config <path>] known [--json]
//! relctl [--config <path>] show <relation-id>
//! relctl [--config <path>] purge <relation-id>
//! relctl [--config <path>] endpoints
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{endpoints::EndpointsArgs, known::KnownArgs, purge::PurgeArgs, show::ShowArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "relctl",
    version,
    about = "Inspect and repair a unit agent's persisted relation state",
    long_about = None,
)]
struct Cli {
    /// Agent settings file (default: ~/.relctl/agent.yaml).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List every relation with persisted state.
    Known(KnownArgs),

    /// Print one relation's persisted state as JSON.
    Show(ShowArgs),

    /// Remove one relation's persisted state.
    Purge(PurgeArgs),

    /// List the endpoints declared by the unit's charm.
    Endpoints(EndpointsArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = commands::load_settings(cli.config.as_deref())?;
    init_tracing(settings.log_filter.as_deref());

    match cli.command {
        Commands::Known(args) => args.run(&settings),
        Commands::Show(args) => args.run(&settings),
        Commands::Purge(args) => args.run(&settings),
        Commands::Endpoints(args) => args.run(&settings),
    }
}

/// `RUST_LOG` wins, then the settings filter, then `info`. Logs go to
/// stderr so JSON output stays clean.
fn init_tracing(settings_filter: Option<&str>) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
