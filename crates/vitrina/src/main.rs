// SPDX-FileCopyrightText: 2026 Vitrina Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vitrina - a WhatsApp assistant that runs a store's catalog.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vitrina_config::{ConfigError, VitrinaConfig};

/// Vitrina - a WhatsApp assistant that runs a store's catalog.
#[derive(Parser, Debug)]
#[command(name = "vitrina", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the webhook server and the agent.
    Serve,
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

fn load(path: Option<&PathBuf>) -> Result<VitrinaConfig, Vec<ConfigError>> {
    match path {
        Some(path) => vitrina_config::load_and_validate_path(path),
        None => vitrina_config::load_and_validate(),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(errors) => {
            vitrina_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("error: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::CheckConfig) => {
            println!(
                "vitrina: configuration OK (agent.name={}, webhook={}:{}{})",
                config.agent.name, config.gateway.host, config.gateway.port, config.gateway.webhook_path
            );
        }
        None => {
            println!("vitrina: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_check_config_with_path() {
        let cli = Cli::parse_from(["vitrina", "check-config", "--config", "/tmp/v.toml"]);
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/v.toml")));
    }
}
