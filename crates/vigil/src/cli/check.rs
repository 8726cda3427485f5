use anyhow::Result;
use clap::Parser;

use vigil_core::config::VigilConfig;
use vigil_core::fleet::DbConnInfo;

use super::load_config;

/// Validate configuration and print the effective values.
#[derive(Parser)]
pub struct CheckCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "vigil.toml")]
    pub config: String,
}

impl CheckCommand {
    pub fn execute(self) -> Result<()> {
        let config = load_config(&self.config)?;
        print!("{}", render_effective(config)?);
        Ok(())
    }
}

/// Effective configuration as TOML, without database credentials.
fn render_effective(mut config: VigilConfig) -> Result<String> {
    config.database.url = DbConnInfo::from_config(&config.database)?.url;
    Ok(toml::to_string_pretty(&config)?)
}
