//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Offload - idle-state offloading for keyed virtual objects
#[derive(Parser, Debug)]
#[command(name = "offload")]
#[command(version)]
#[command(about = "Run a counter virtual object whose idle state is offloaded to disk")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub overrides: Overrides,
}

/// Settings that take precedence over the configuration file.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Idle time in milliseconds before state is offloaded
    #[arg(long, global = true)]
    pub expiry_ms: Option<u64>,

    /// Idle check period in milliseconds
    #[arg(long, global = true)]
    pub check_ms: Option<u64>,

    /// Directory offloaded state is written to
    #[arg(long, global = true)]
    pub dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive a counter through an offload and a transparent reload
    Demo {
        /// Object key
        #[arg(short, long, default_value = "demo")]
        key: String,
    },

    /// Print the effective configuration as TOML
    Config,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_demo_with_overrides() {
        let cli = Cli::try_parse_from([
            "offload",
            "demo",
            "--key",
            "a",
            "--expiry-ms",
            "200",
            "--dir",
            "/tmp/x",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Demo { ref key } if key == "a"));
        assert_eq!(cli.overrides.expiry_ms, Some(200));
        assert_eq!(cli.overrides.check_ms, None);
        assert_eq!(cli.overrides.dir, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_demo_key_defaults() {
        let cli = Cli::try_parse_from(["offload", "demo"]).unwrap();
        assert!(matches!(cli.command, Commands::Demo { ref key } if key == "demo"));
    }
}
