// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Manager server and client
//!
//! Handles:
//! - Server bootstrap (config, Docker connection, HTTP listener)
//! - HTTP health checks against a running manager
//! - Graceful shutdown

use anyhow::Result;
use std::time::Duration;

pub mod client;
pub mod server;

pub use client::ManagerClient;
pub use server::start_server;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerStatus {
    Running,
    Unhealthy { error: String },
    Unreachable { error: String },
}

/// Check if a manager answers on its unauthenticated health endpoint
pub async fn check_manager_running(base_url: &str) -> Result<ManagerStatus> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(1500))
        .build()?;

    let health_url = format!("{}/health", base_url.trim_end_matches('/'));

    match client.get(&health_url).send().await {
        Ok(resp) if resp.status().is_success() => Ok(ManagerStatus::Running),
        Ok(resp) => Ok(ManagerStatus::Unhealthy {
            error: format!("HTTP {}", resp.status()),
        }),
        Err(e) => Ok(ManagerStatus::Unreachable { error: e.to_string() }),
    }
}
