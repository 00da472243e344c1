// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use picoclaw_core::domain::gateway_config::ProviderProfile;
use picoclaw_core::domain::manager_config::ManagerConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration (after environment overrides)
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file populated with defaults
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./picoclaw-manager.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. PICOCLAW_CONFIG_PATH: {}",
            std::env::var("PICOCLAW_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./picoclaw-manager.yaml");
        println!("  4. ~/.picoclaw/manager.yaml");
        println!("  5. /etc/picoclaw/manager.yaml");
        println!();
    }

    let config = ManagerConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Containers:".bold());
    println!("  Product: {}", config.product);
    println!("  Image: {}", config.image);
    println!("  Command: {}", config.command.join(" "));
    println!("  Network: {}", config.network_name());
    println!("  Memory limit: {} MiB", config.memory_limit_mb);
    println!("  Owner label: {}", config.owner_label);
    println!("  Create policy: {:?}", config.create_policy);
    println!("  Workspace layout: {:?}", config.workspace_layout);
    println!();

    println!("{}", "Storage:".bold());
    println!("  Data dir: {}", config.data_dir.display());
    println!("  Host data dir: {}", config.host_data_dir().display());
    match config.skill_path() {
        Some(path) => println!("  Skill: {}", path.display()),
        None => println!("  Skill: {}", "(no skills directory)".dimmed()),
    }
    if let Some(host) = config.host_skills_dir() {
        println!("  Host skills dir: {}", host.display());
    }
    println!();

    println!("{}", "Provider:".bold());
    println!(
        "  Active: {} ({})",
        config.provider.provider_key(),
        config.provider.default_model()
    );
    for profile in [
        ProviderProfile::Groq,
        ProviderProfile::Anthropic,
        ProviderProfile::Gemini,
    ] {
        let state = if config.provider_keys.get(profile).is_some() {
            "set".green()
        } else {
            "not set".dimmed()
        };
        println!("    {}: {}", profile.secret_env_var(), state);
    }
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", config.bind_address, config.port);
    println!(
        "  Manager token: {}",
        if config.manager_token.is_empty() {
            "not set".red()
        } else {
            "set".green()
        }
    );
    println!("  Runtime timeout: {}s", config.runtime_timeout_secs);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ManagerConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let sample = serde_yaml::to_string(&ManagerConfig::default())
        .context("Failed to render default configuration")?;

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );
    println!(
        "  Set {} and the provider key before running `picoclaw-manager serve`",
        "manager_token".bold()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_writes_loadable_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("manager.yaml");

        generate(output.clone(), false).await.unwrap();

        let loaded = ManagerConfig::from_yaml_file(&output).unwrap();
        assert_eq!(loaded.product, "picoclaw");
        assert_eq!(loaded.port, 8000);
    }

    #[tokio::test]
    async fn test_generate_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("manager.yaml");
        std::fs::write(&output, "product: keep\n").unwrap();

        assert!(generate(output.clone(), false).await.is_err());
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "product: keep\n");

        generate(output.clone(), true).await.unwrap();
        assert!(ManagerConfig::from_yaml_file(&output).is_ok());
    }
}
