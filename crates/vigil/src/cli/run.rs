use anyhow::Result;
use clap::Parser;
use tracing::info;

use vigil::Vigil;

use super::{init_tracing, load_config};

/// Run the heartbeat and the peer endpoints.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "vigil.toml")]
    pub config: String,

    /// Port for the peer endpoints (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log at debug level unless RUST_LOG is set.
    #[arg(long)]
    pub verbose: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        init_tracing(self.verbose);

        info!("Loading configuration from {}", self.config);
        let mut config = load_config(&self.config)?;

        if let Some(port) = self.port {
            config.server.port = port;
        }

        let vigil = Vigil::builder().config(config).build()?;
        vigil.run().await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_defaults() {
        let cmd = RunCommand::try_parse_from(["run"]).unwrap();
        assert_eq!(cmd.config, "vigil.toml");
        assert_eq!(cmd.port, None);
        assert!(!cmd.verbose);
    }

    #[test]
    fn test_run_command_with_overrides() {
        let cmd = RunCommand::try_parse_from(["run", "-c", "custom.toml", "-p", "3000"]).unwrap();
        assert_eq!(cmd.config, "custom.toml");
        assert_eq!(cmd.port, Some(3000));
    }
}
