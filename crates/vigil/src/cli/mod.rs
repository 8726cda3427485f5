mod check;
mod plan;
mod run;

pub use check::CheckCommand;
pub use plan::PlanCommand;
pub use run::RunCommand;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};

use vigil_core::config::VigilConfig;

/// Vigil - app instance heartbeat and peer wakeup
#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the heartbeat and the peer endpoints.
    Run(RunCommand),

    /// Run a single planning pass and print the wake targets.
    Plan(PlanCommand),

    /// Validate configuration and print the effective values.
    Check(CheckCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Plan(cmd) => cmd.execute().await,
            Commands::Check(cmd) => cmd.execute(),
        }
    }
}

/// Install the fmt subscriber. `RUST_LOG` wins over the default level.
fn init_tracing(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

/// Load `.env` and the configuration file.
fn load_config(path: &str) -> Result<VigilConfig> {
    dotenvy::dotenv().ok();

    if !Path::new(path).exists() {
        anyhow::bail!("Configuration file not found: {}", path);
    }

    Ok(VigilConfig::from_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::try_parse_from(["vigil", "run", "--port", "9000", "--verbose"]).unwrap();
        match cli.command {
            Commands::Run(cmd) => {
                assert_eq!(cmd.config, "vigil.toml");
                assert_eq!(cmd.port, Some(9000));
                assert!(cmd.verbose);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_parse_plan_and_check() {
        assert!(Cli::try_parse_from(["vigil", "plan", "-c", "custom.toml"]).is_ok());
        assert!(Cli::try_parse_from(["vigil", "check"]).is_ok());
        assert!(Cli::try_parse_from(["vigil", "purge"]).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/vigil.toml").unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\nurl = \"postgres://localhost/storefront\"").unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.database.url, "postgres://localhost/storefront");
    }
}
