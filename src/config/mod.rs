pub mod toml_config;

pub use toml_config::{DispatchConfig, StoreBackend};

#[cfg(feature = "cli")]
pub use cli::{CliConfig, Command};

#[cfg(feature = "cli")]
mod cli {
    use super::DispatchConfig;
    use crate::utils::error::Result;
    use clap::{Parser, Subcommand};
    use std::path::PathBuf;

    #[derive(Debug, Clone, Parser)]
    #[command(name = "rescue-dispatch")]
    #[command(about = "Confirms, cancels and creates DODO courier orders for food rescue")]
    pub struct CliConfig {
        #[arg(short, long, help = "TOML configuration file; environment variables are used when omitted")]
        pub config: Option<PathBuf>,

        #[arg(short, long, global = true, help = "Enable verbose output")]
        pub verbose: bool,

        #[arg(long, global = true, help = "Enable system monitoring")]
        pub monitor: bool,

        #[arg(long, global = true, help = "Log decisions without touching the store or DODO")]
        pub dry_run: bool,

        #[arg(long, help = "Override the confirmation window in minutes")]
        pub confirm_window_minutes: Option<i64>,

        #[arg(long, help = "Override how many days ahead new orders are created")]
        pub days_ahead: Option<u32>,

        #[command(subcommand)]
        pub command: Command,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
    pub enum Command {
        /// Confirm or cancel today's pending orders
        CheckOrders,
        /// Create orders for every donor/recipient pairing
        SendOrders,
        /// Validate the configuration and exit
        Validate,
    }

    impl CliConfig {
        pub fn load_config(&self) -> Result<DispatchConfig> {
            let mut config = match &self.config {
                Some(path) => {
                    tracing::info!("Loading configuration from: {}", path.display());
                    DispatchConfig::from_file(path)?
                }
                None => {
                    tracing::info!("Loading configuration from environment");
                    DispatchConfig::from_env()?
                }
            };
            config.apply_overrides(self.confirm_window_minutes, self.days_ahead);
            Ok(config)
        }

        pub fn monitoring_enabled(&self, config: &DispatchConfig) -> bool {
            self.monitor || config.monitoring_enabled()
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_subcommands_and_flags() {
            let cli = CliConfig::try_parse_from([
                "rescue-dispatch",
                "--config",
                "dispatch.toml",
                "check-orders",
                "--dry-run",
                "-v",
            ])
            .unwrap();

            assert_eq!(cli.command, Command::CheckOrders);
            assert_eq!(cli.config, Some(PathBuf::from("dispatch.toml")));
            assert!(cli.dry_run);
            assert!(cli.verbose);
            assert!(!cli.monitor);
        }

        #[test]
        fn test_parse_overrides() {
            let cli = CliConfig::try_parse_from([
                "rescue-dispatch",
                "--days-ahead",
                "3",
                "--confirm-window-minutes",
                "60",
                "send-orders",
            ])
            .unwrap();

            assert_eq!(cli.command, Command::SendOrders);
            assert_eq!(cli.days_ahead, Some(3));
            assert_eq!(cli.confirm_window_minutes, Some(60));
        }

        #[test]
        fn test_subcommand_is_required() {
            assert!(CliConfig::try_parse_from(["rescue-dispatch"]).is_err());
        }
    }
}
