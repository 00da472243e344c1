// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Tenant container commands
//!
//! Commands: create, delete, health, logs, list

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use picoclaw_core::presentation::api::{CreateContainerRequest, DEFAULT_LOG_LINES};

use crate::daemon::ManagerClient;

#[derive(Subcommand)]
pub enum TenantCommand {
    /// Create (or recreate) the container for a business
    Create {
        /// Business identifier
        business_id: u64,

        /// Display name of the business
        #[arg(long)]
        name: String,

        /// Telegram bot token for the tenant's agent
        #[arg(long, env = "PICOCLAW_TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        bot_token: String,

        /// Telegram user allowed to talk to the agent
        #[arg(long)]
        user_id: String,

        /// Business API key handed to the agent
        #[arg(long, env = "PICOCLAW_BUSINESS_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Business API base URL
        #[arg(long)]
        api_url: String,

        /// Manager bearer token
        #[arg(long, env = "MANAGER_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Stop and remove a business container
    Delete {
        business_id: u64,

        /// Also remove the tenant's data directory
        #[arg(long)]
        cleanup: bool,

        /// Manager bearer token
        #[arg(long, env = "MANAGER_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Show container status for a business
    Health {
        business_id: u64,

        /// Manager bearer token
        #[arg(long, env = "MANAGER_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// Print recent container output
    Logs {
        business_id: u64,

        /// Number of trailing lines
        #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LINES)]
        lines: usize,

        /// Manager bearer token
        #[arg(long, env = "MANAGER_TOKEN", hide_env_values = true)]
        token: String,
    },

    /// List managed tenant containers
    List {
        /// Manager bearer token
        #[arg(long, env = "MANAGER_TOKEN", hide_env_values = true)]
        token: String,
    },
}

pub async fn handle_command(command: TenantCommand, url: &str) -> Result<()> {
    match command {
        TenantCommand::Create {
            business_id,
            name,
            bot_token,
            user_id,
            api_key,
            api_url,
            token,
        } => {
            let request = CreateContainerRequest {
                business_id,
                business_name: name,
                telegram_bot_token: bot_token,
                telegram_user_id: user_id,
                api_key,
                flyapp_api_url: api_url,
            };
            let created = ManagerClient::new(url, token)?.create(&request).await?;
            println!(
                "{} {} ({})",
                "✓ Container".green(),
                created.container_id.bold(),
                created.status
            );
        }
        TenantCommand::Delete {
            business_id,
            cleanup,
            token,
        } => {
            let deleted = ManagerClient::new(url, token)?
                .delete(business_id, cleanup)
                .await?;
            println!(
                "{} {} ({})",
                "✓ Container".green(),
                deleted.container_id.bold(),
                deleted.status
            );
            if cleanup {
                println!("  Data directory removed");
            }
        }
        TenantCommand::Health { business_id, token } => {
            let health = ManagerClient::new(url, token)?.health(business_id).await?;
            let marker = if health.healthy {
                "●".green()
            } else {
                "●".red()
            };
            println!("{} {} {}", marker, health.container_id.bold(), health.status);
        }
        TenantCommand::Logs {
            business_id,
            lines,
            token,
        } => {
            let logs = ManagerClient::new(url, token)?
                .logs(business_id, lines)
                .await?;
            print!("{}", logs.logs);
        }
        TenantCommand::List { token } => {
            let tenants = ManagerClient::new(url, token)?.list().await?;
            if tenants.is_empty() {
                println!("{}", "No tenant containers".dimmed());
                return Ok(());
            }

            println!("{:<12} {:<32} {}", "BUSINESS".bold(), "CONTAINER".bold(), "STATUS".bold());
            for tenant in tenants {
                let business = tenant
                    .business_id
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let status = if tenant.status == "running" {
                    tenant.status.green()
                } else {
                    tenant.status.yellow()
                };
                println!("{:<12} {:<32} {}", business, tenant.container_id, status);
            }
        }
    }

    Ok(())
}
