//! Configuration inspection command implementation.
//!
//! Unlike subx-cli's `config` subcommand, this crate's [`ConfigService`] is
//! read-only at the trait level (`get_config`/`reload`): the orchestrator is
//! configured entirely through a TOML file plus `INSIGHT_FORGE_*`
//! environment overrides (§6 config table), so the demo CLI's `config`
//! subcommand only shows the effective configuration rather than mutating
//! it in place.
//!
//! # Examples
//!
//! ```rust,ignore
//! use insight_forge::cli::{ConfigArgs, ConfigAction};
//! use insight_forge::commands::config_command;
//!
//! let args = ConfigArgs { action: ConfigAction::Show };
//! config_command::execute(args, &config_service)?;
//! ```

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::ConfigService;
use crate::error::OrchestratorError;
use crate::Result;

/// Execute the `config` subcommand against an injected configuration service.
///
/// # Errors
/// Returns an error if the configuration cannot be loaded or serialized.
pub fn execute(args: ConfigArgs, config_service: &dyn ConfigService) -> Result<()> {
    match args.action {
        ConfigAction::Show => {
            let config = config_service.get_config()?;
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| OrchestratorError::config(format!("TOML serialization error: {e}")))?;
            println!("{rendered}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_service::TestConfigService;
    use crate::config::Config;

    #[test]
    fn show_prints_the_effective_configuration() {
        let service = TestConfigService::new(Config::default());
        let args = ConfigArgs {
            action: ConfigAction::Show,
        };
        assert!(execute(args, &service).is_ok());
    }
}
