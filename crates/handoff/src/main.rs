// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff - session and worker coordination for customer-service routing.
//!
//! This is the binary entry point.

mod demo;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use handoff_config::HandoffConfig;

/// Handoff - session and worker coordination for customer-service routing.
#[derive(Parser, Debug)]
#[command(name = "handoff", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the coordinator until SIGINT or SIGTERM.
    Serve,
    /// Play scripted customer conversations against the configured workers.
    Demo {
        /// Disable colored output.
        #[arg(long)]
        no_color: bool,
    },
    /// Validate and print the effective configuration.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> HandoffConfig {
    let loaded = match path {
        Some(path) => handoff_config::load_and_validate_path(path),
        None => handoff_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            handoff_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Demo { no_color }) => demo::run_demo(config, !no_color).await,
        Some(Commands::Config) => {
            match toml::to_string_pretty(&config) {
                Ok(rendered) => print!("{rendered}"),
                Err(e) => {
                    eprintln!("handoff: failed to render configuration: {e}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        None => {
            println!("handoff: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("handoff: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::parse_from(["handoff", "--config", "/tmp/h.toml", "demo", "--no-color"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/h.toml")));
        assert!(matches!(cli.command, Some(Commands::Demo { no_color: true })));

        let cli = Cli::parse_from(["handoff", "serve"]);
        assert!(matches!(cli.command, Some(Commands::Serve)));
        assert!(cli.config.is_none());
    }

    #[test]
    fn default_config_renders_as_toml() {
        let config = handoff_config::load_and_validate_str("").expect("defaults should be valid");
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("[coordinator]"));
        assert!(rendered.contains("idle_timeout_secs = 1800"));
    }
}
