use std::path::PathBuf;

use clap::Parser;

use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "treesync")]
#[command(about = "Rebuild a customer's ThingsBoard asset tree and store it")]
#[command(version)]
pub struct Cli {
    /// Customer ID (UUID)
    pub customer_id: String,

    /// Configuration file (TOML). Defaults to ./treesync.toml when present
    #[arg(short, long, env = "TREESYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// ThingsBoard base URL
    #[arg(long, env = "THINGSBOARD_URL")]
    pub thingsboard_url: Option<String>,

    /// Fallback token, used when customer_settings has none
    #[arg(long, env = "THINGSBOARD_TOKEN", hide_env_values = true)]
    pub thingsboard_token: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    pub log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            thingsboard_url: self.thingsboard_url.clone(),
            thingsboard_token: self.thingsboard_token.clone(),
            database_url: self.database_url.clone(),
            log_level: self.log_level.clone(),
            log_file: self.log_file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_positional_customer_and_flags() {
        let cli = Cli::try_parse_from([
            "treesync",
            "3143ef00-647d-11ef-8cd8-8b580d9aa086",
            "--config",
            "/etc/treesync.toml",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.customer_id, "3143ef00-647d-11ef-8cd8-8b580d9aa086");
        assert_eq!(cli.config, Some(PathBuf::from("/etc/treesync.toml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_customer_id_is_required() {
        assert!(Cli::try_parse_from(["treesync"]).is_err());
    }
}
