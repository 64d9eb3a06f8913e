//! Command-line interface for the generation-orchestrator demo harness.
//!
//! This is *not* the product's HTTP/WebSocket transport (§1 excludes that);
//! it is an operator-facing CLI, in subx-cli's own `cli`/`commands` style,
//! that lets a human submit a local text file through the orchestrator and
//! watch its event stream from a terminal, for manual smoke-testing.
//!
//! # Examples
//!
//! ```bash
//! # Submit a local document in deep mode and stream progress to stdout
//! insight-forge submit document ./source.txt
//!
//! # Submit a video URL (an external transcript-fetch provider must be wired
//! # in by the embedding application; the demo CLI only wires a document
//! # provider by default)
//! insight-forge submit video https://www.youtube.com/watch?v=AAAAAAAAAAA --mode ultra
//!
//! # Inspect the effective configuration
//! insight-forge config show
//! ```

mod config_args;
pub mod submit_args;
pub mod ui;

use clap::{Parser, Subcommand};
pub use config_args::{ConfigAction, ConfigArgs};
pub use submit_args::{GenerationArgs, ModeArg, PriorityArg, SubmitArgs, SubmitSource};

/// Main CLI application structure defining the top-level interface.
#[derive(Parser, Debug)]
#[command(name = "insight-forge")]
#[command(about = "Submit a source artifact to the generation orchestrator and watch it through to a finished report")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Optional path to a TOML configuration file.
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the demo CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a source artifact and stream its generation progress.
    Submit(SubmitArgs),

    /// Inspect the orchestrator's effective configuration.
    Config(ConfigArgs),
}

/// Executes the demo CLI with parsed arguments.
///
/// This is the main entry point for CLI execution, routing parsed
/// command-line arguments to their respective command handlers.
///
/// # Errors
/// Returns a [`crate::Result<()>`] that wraps any errors encountered during
/// command execution.
pub async fn run() -> crate::Result<()> {
    let cli = Cli::parse();
    let config_service = std::sync::Arc::new(crate::config::ProductionConfigService::new(
        cli.config.clone(),
    )?);
    run_with_config(cli, config_service.as_ref()).await
}

/// Run the CLI with a provided configuration service.
///
/// This enables dependency injection of configuration services, making it
/// easier to test and providing better control over configuration
/// management.
///
/// # Errors
/// Returns an error if command execution fails.
pub async fn run_with_config(
    cli: Cli,
    config_service: &dyn crate::config::ConfigService,
) -> crate::Result<()> {
    match cli.command {
        Commands::Submit(args) => {
            crate::commands::submit_command::execute(args, config_service).await?;
        }
        Commands::Config(args) => {
            crate::commands::config_command::execute(args, config_service)?;
        }
    }
    Ok(())
}
