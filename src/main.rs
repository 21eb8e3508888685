// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 AgroLens Contributors

//! AgroLens CLI entry point

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use agrolens::classifier::{Classifier, OllamaClassifier};
use agrolens::config::AppConfig;
use agrolens::web::{start_server, AppState};
use agrolens::{AgroLensError, Result};

/// AgroLens - crop flood-damage assessment portal
#[derive(Parser, Debug)]
#[command(name = "agrolens")]
#[command(version = "1.0.0")]
#[command(about = "Crop flood-damage assessment with AI classification and PDF reports", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the web server (default)
    Serve {
        /// Port override
        #[arg(short, long)]
        port: Option<u16>,

        /// Skip the engine health check on startup
        #[arg(long)]
        skip_health_check: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show AI engine status
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = AppConfig::load(&cli.config)?;

    match cli.command {
        Some(Commands::Serve { port, skip_health_check }) => {
            run_serve(config, port, skip_health_check).await
        }
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) => run_status(config).await,
        None => run_serve(config, None, false).await,
    }
}

/// Start the web server
async fn run_serve(mut config: AppConfig, port: Option<u16>, skip_health_check: bool) -> Result<()> {
    if let Some(port) = port {
        config.web.port = port;
    }

    info!("AgroLens v1.0.0");

    if skip_health_check {
        tracing::warn!("Skipping engine health check");
    } else {
        let classifier = OllamaClassifier::new(&config.ai_engine)?;
        match classifier.health_check().await {
            Ok(()) => info!("Vision engine reachable at {}", config.ai_engine.url),
            Err(e) => {
                return Err(AgroLensError::Config(format!(
                    "Vision engine unavailable: {}. Start it or pass --skip-health-check",
                    e
                )))
            }
        }
    }

    let state = Arc::new(AppState::new(config)?);
    start_server(state).await
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            AppConfig::default().save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            println!("Configuration at {:?} is valid", config_path);
            println!("  Listen: {}:{}", config.web.host, config.web.port);
            println!("  Uploads: {:?}", config.storage.upload_dir);
            println!("  Reports: {:?}", config.storage.report_dir);
            println!("  Vision model: {}", config.ai_engine.model);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: AppConfig) -> Result<()> {
    println!("AgroLens v1.0.0 Status");
    println!("======================");

    let classifier = OllamaClassifier::new(&config.ai_engine)?;
    match classifier.health_check().await {
        Ok(()) => println!("Engine: reachable at {}", config.ai_engine.url),
        Err(e) => println!("Engine: error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Vision model: {}", config.ai_engine.model);
    println!("  Timeout: {}s", config.ai_engine.timeout_secs);
    println!("  Upload dir: {:?}", config.storage.upload_dir);
    println!("  Report dir: {:?}", config.storage.report_dir);
    println!("  Allowed extensions: {:?}", config.uploads.allowed_extensions);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["agrolens"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command() {
        let cli = Cli::try_parse_from([
            "agrolens", "serve", "--port", "9001", "--skip-health-check",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Serve { port, skip_health_check }) => {
                assert_eq!(port, Some(9001));
                assert!(skip_health_check);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_config_generate() {
        let cli = Cli::try_parse_from(["agrolens", "config", "generate", "-o", "/tmp/c.json"])
            .unwrap();

        match cli.command {
            Some(Commands::Config { action: ConfigCommands::Generate { output } }) => {
                assert_eq!(output, PathBuf::from("/tmp/c.json"));
            }
            _ => panic!("Expected Config Generate command"),
        }
    }
}
