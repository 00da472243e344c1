// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! HTTP client for communicating with a running manager

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use picoclaw_core::presentation::api::CreateContainerRequest;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateResponse {
    pub container_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteResponse {
    pub container_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthResponse {
    pub container_id: String,
    pub status: String,
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogsResponse {
    pub container_id: String,
    pub logs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TenantEntry {
    pub container_id: String,
    pub business_id: Option<u64>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    detail: String,
}

#[derive(Debug, Clone)]
pub struct ManagerClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ManagerClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        // Create recreates directories and starts a container; allow for a slow engine
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub async fn create(&self, request: &CreateContainerRequest) -> Result<CreateResponse> {
        let response = self
            .client
            .post(format!("{}/containers", self.base_url))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
            .context("Failed to create tenant container")?;

        parse(response, "create tenant container").await
    }

    pub async fn delete(&self, business_id: u64, cleanup: bool) -> Result<DeleteResponse> {
        let response = self
            .client
            .delete(format!(
                "{}/containers/{}?cleanup={}",
                self.base_url, business_id, cleanup
            ))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to delete tenant container")?;

        parse(response, "delete tenant container").await
    }

    pub async fn health(&self, business_id: u64) -> Result<HealthResponse> {
        let response = self
            .client
            .get(format!("{}/containers/{}/health", self.base_url, business_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to get tenant health")?;

        parse(response, "get tenant health").await
    }

    pub async fn logs(&self, business_id: u64, lines: usize) -> Result<LogsResponse> {
        let response = self
            .client
            .get(format!(
                "{}/containers/{}/logs?lines={}",
                self.base_url, business_id, lines
            ))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to get tenant logs")?;

        parse(response, "get tenant logs").await
    }

    pub async fn list(&self) -> Result<Vec<TenantEntry>> {
        let response = self
            .client
            .get(format!("{}/containers", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to list tenants")?;

        parse(response, "list tenants").await
    }
}

async fn parse<T: DeserializeOwned>(response: Response, action: &str) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ErrorResponse>(&error_text)
            .map(|e| e.detail)
            .unwrap_or(error_text);
        if status == StatusCode::NOT_FOUND {
            anyhow::bail!("Not found: {}", detail);
        }
        anyhow::bail!("Failed to {} ({}): {}", action, status, detail);
    }

    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", action))
}
