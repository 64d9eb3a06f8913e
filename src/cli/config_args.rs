//! Arguments for the `config` subcommand.

use clap::{Args, Subcommand};

/// Inspect the orchestrator's effective configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Which config operation to perform.
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration operations exposed by the demo CLI.
///
/// Unlike subx-cli's `config` subcommand, this crate's
/// [`crate::config::ConfigService`] is read-only at the trait level
/// (`get_config`/`reload`), so there is no per-key `set`/`reset`; the
/// orchestrator is configured entirely through the TOML file and
/// `INSIGHT_FORGE_*` environment overrides `ProductionConfigService` reads.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
}
