// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! # PicoClaw Container Manager
//!
//! The `picoclaw-manager` binary runs the tenant container manager and talks
//! to a running one.
//!
//! ## Commands
//!
//! - `picoclaw-manager serve` - Run the HTTP manager against the local Docker engine
//! - `picoclaw-manager status` - Check a running manager
//! - `picoclaw-manager tenant create|delete|health|logs|list` - Tenant operations
//! - `picoclaw-manager config show|validate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

use picoclaw_manager::commands::{self, ConfigCommand, TenantCommand};
use picoclaw_manager::daemon::{self, ManagerStatus};

/// PicoClaw container manager - one isolated agent container per tenant
#[derive(Parser)]
#[command(name = "picoclaw-manager")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "PICOCLAW_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Manager URL used by client commands
    #[arg(
        long,
        global = true,
        env = "PICOCLAW_MANAGER_URL",
        default_value = "http://127.0.0.1:8000"
    )]
    url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "PICOCLAW_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, env = "PICOCLAW_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the manager HTTP server
    #[command(name = "serve")]
    Serve,

    /// Check whether a manager is reachable
    #[command(name = "status")]
    Status,

    /// Tenant container operations
    #[command(name = "tenant")]
    Tenant {
        #[command(subcommand)]
        command: TenantCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal outside development
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    match cli.command {
        Some(Commands::Serve) => {
            info!("Starting PicoClaw container manager");
            daemon::start_server(cli.config).await
        }
        Some(Commands::Status) => status(&cli.url).await,
        Some(Commands::Tenant { command }) => commands::tenant::handle_command(command, &cli.url).await,
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

async fn status(url: &str) -> Result<()> {
    match daemon::check_manager_running(url).await? {
        ManagerStatus::Running => {
            println!("{} {}", "✓ Manager is running at".green(), url);
        }
        ManagerStatus::Unhealthy { error } => {
            println!("{} {} ({})", "⚠ Manager is unhealthy at".yellow(), url, error);
        }
        ManagerStatus::Unreachable { error } => {
            println!("{} {} ({})", "✗ Manager is not reachable at".red(), url, error);
            std::process::exit(1);
        }
    }
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
    }

    Ok(())
}
