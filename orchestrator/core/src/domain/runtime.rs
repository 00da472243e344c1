// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Container runtime port.
//!
//! The engine is the single source of truth for container state; nothing in
//! the core caches what it reports. Implemented by the Docker adapter in
//! `infrastructure::runtime` and by the in-memory runtime used in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    Conflict(String),

    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Runtime call '{operation}' timed out after {seconds}s")]
    Timeout { operation: &'static str, seconds: u64 },

    #[error("Runtime operation failed: {0}")]
    Failed(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Observable container state as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Running,
    Exited,
    /// Any other engine status, echoed verbatim.
    Other(String),
}

impl ContainerStatus {
    pub fn from_runtime(status: &str) -> Self {
        match status {
            "running" => Self::Running,
            "exited" => Self::Exited,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Exited => "exited",
            Self::Other(status) => status,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host path bind-mounted into the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

impl VolumeBinding {
    pub fn read_only(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: true,
        }
    }

    pub fn read_write(host_path: impl Into<PathBuf>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
            read_only: false,
        }
    }

    /// Docker `binds` syntax: `host:container:mode`.
    pub fn to_bind(&self) -> String {
        format!(
            "{}:{}:{}",
            self.host_path.display(),
            self.container_path,
            if self.read_only { "ro" } else { "rw" }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestartPolicy {
    Never,
    Always,
    #[default]
    UnlessStopped,
}

/// Everything the engine needs to start a tenant container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub command: Option<Vec<String>>,
    pub env: BTreeMap<String, String>,
    pub volumes: Vec<VolumeBinding>,
    pub network: String,
    pub restart_policy: RestartPolicy,
    pub memory_limit_bytes: u64,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
    pub status: ContainerStatus,
    pub labels: BTreeMap<String, String>,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Current status of a named container; `NotFound` when absent.
    async fn inspect_container(&self, name: &str) -> Result<ContainerStatus, RuntimeError>;

    /// Stop (when `force`) and remove a named container.
    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError>;

    /// Create and start a container, returning the engine's container id.
    async fn run_container(&self, spec: ContainerSpec) -> Result<String, RuntimeError>;

    /// Last `tail` lines of combined stdout/stderr, as raw bytes.
    async fn container_logs(&self, name: &str, tail: usize) -> Result<Vec<u8>, RuntimeError>;

    /// Containers carrying every label in `labels`, running or not.
    async fn list_containers(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// `NotFound` when the network does not exist.
    async fn inspect_network(&self, name: &str) -> Result<(), RuntimeError>;

    /// `Conflict` when a network with this name already exists.
    async fn create_network(&self, name: &str, driver: &str) -> Result<(), RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ContainerStatus::from_runtime("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from_runtime("exited"), ContainerStatus::Exited);
        let paused = ContainerStatus::from_runtime("paused");
        assert_eq!(paused.as_str(), "paused");
        assert!(!paused.is_running());
    }

    #[test]
    fn test_bind_syntax() {
        let ro = VolumeBinding::read_only("/host/cfg.json", "/root/.picoclaw/config.json");
        assert_eq!(ro.to_bind(), "/host/cfg.json:/root/.picoclaw/config.json:ro");
        let rw = VolumeBinding::read_write("/host/ws", "/root/.picoclaw/workspace");
        assert_eq!(rw.to_bind(), "/host/ws:/root/.picoclaw/workspace:rw");
    }
}
