// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! In-memory container runtime.
//!
//! Behaves like the engine for the calls the manager makes: names are
//! unique, creating an existing name is a `Conflict`, and inspecting or
//! removing a missing one is `NotFound`. Every call is recorded so tests
//! can assert on ordering.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::runtime::{
    ContainerRuntime, ContainerSpec, ContainerStatus, ContainerSummary, RuntimeError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    InspectContainer(String),
    RemoveContainer(String),
    RunContainer(String),
    ContainerLogs(String),
    ListContainers,
    InspectNetwork(String),
    CreateNetwork(String),
}

#[derive(Debug, Clone)]
struct StoredContainer {
    id: String,
    status: ContainerStatus,
    labels: BTreeMap<String, String>,
    spec: Option<ContainerSpec>,
    logs: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeMap<String, StoredContainer>,
    networks: BTreeSet<String>,
    calls: Vec<RuntimeCall>,
    next_id: u64,
    unavailable: bool,
    network_race: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<State>,
    /// Pause inside `run_container` between the existence check and insert.
    run_delay: Option<Duration>,
}

impl InMemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run_delay(delay: Duration) -> Self {
        Self {
            run_delay: Some(delay),
            ..Self::default()
        }
    }

    pub async fn seed_container(&self, name: &str, status: ContainerStatus, labels: BTreeMap<String, String>) {
        let mut state = self.state.lock().await;
        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        state.containers.insert(
            name.to_string(),
            StoredContainer { id, status, labels, spec: None, logs: Vec::new() },
        );
    }

    pub async fn set_status(&self, name: &str, status: ContainerStatus) {
        if let Some(c) = self.state.lock().await.containers.get_mut(name) {
            c.status = status;
        }
    }

    pub async fn set_logs(&self, name: &str, logs: impl Into<Vec<u8>>) {
        if let Some(c) = self.state.lock().await.containers.get_mut(name) {
            c.logs = logs.into();
        }
    }

    pub async fn seed_network(&self, name: &str) {
        self.state.lock().await.networks.insert(name.to_string());
    }

    /// Every call fails with `Unavailable` while set.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }

    /// Next network create behaves as if a concurrent caller won: the
    /// network appears and this caller gets `Conflict`.
    pub async fn simulate_network_race(&self) {
        self.state.lock().await.network_race = true;
    }

    pub async fn calls(&self) -> Vec<RuntimeCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn container_names(&self) -> Vec<String> {
        self.state.lock().await.containers.keys().cloned().collect()
    }

    pub async fn container_spec(&self, name: &str) -> Option<ContainerSpec> {
        self.state.lock().await.containers.get(name).and_then(|c| c.spec.clone())
    }

    pub async fn container_id(&self, name: &str) -> Option<String> {
        self.state.lock().await.containers.get(name).map(|c| c.id.clone())
    }

    pub async fn has_network(&self, name: &str) -> bool {
        self.state.lock().await.networks.contains(name)
    }

    async fn record(&self, call: RuntimeCall) -> Result<tokio::sync::MutexGuard<'_, State>, RuntimeError> {
        let mut state = self.state.lock().await;
        state.calls.push(call);
        if state.unavailable {
            return Err(RuntimeError::Unavailable("in-memory runtime offline".to_string()));
        }
        Ok(state)
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn inspect_container(&self, name: &str) -> Result<ContainerStatus, RuntimeError> {
        let state = self.record(RuntimeCall::InspectContainer(name.to_string())).await?;
        state
            .containers
            .get(name)
            .map(|c| c.status.clone())
            .ok_or_else(|| RuntimeError::NotFound(format!("No such container: {}", name)))
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        let mut state = self.record(RuntimeCall::RemoveContainer(name.to_string())).await?;
        match state.containers.get(name) {
            None => Err(RuntimeError::NotFound(format!("No such container: {}", name))),
            Some(c) if c.status.is_running() && !force => Err(RuntimeError::Conflict(format!(
                "You cannot remove a running container {}",
                name
            ))),
            Some(_) => {
                state.containers.remove(name);
                Ok(())
            }
        }
    }

    async fn run_container(&self, spec: ContainerSpec) -> Result<String, RuntimeError> {
        let exists = {
            let state = self.record(RuntimeCall::RunContainer(spec.name.clone())).await?;
            state.containers.contains_key(&spec.name)
        };
        if exists {
            return Err(RuntimeError::Conflict(format!(
                "The container name \"/{}\" is already in use",
                spec.name
            )));
        }

        if let Some(delay) = self.run_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().await;
        if state.containers.contains_key(&spec.name) {
            return Err(RuntimeError::Conflict(format!(
                "The container name \"/{}\" is already in use",
                spec.name
            )));
        }
        if !state.networks.contains(&spec.network) {
            return Err(RuntimeError::NotFound(format!("network {} not found", spec.network)));
        }

        state.next_id += 1;
        let id = format!("mem-{}", state.next_id);
        state.containers.insert(
            spec.name.clone(),
            StoredContainer {
                id: id.clone(),
                status: ContainerStatus::Running,
                labels: spec.labels.clone(),
                spec: Some(spec),
                logs: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<Vec<u8>, RuntimeError> {
        let state = self.record(RuntimeCall::ContainerLogs(name.to_string())).await?;
        let container = state
            .containers
            .get(name)
            .ok_or_else(|| RuntimeError::NotFound(format!("No such container: {}", name)))?;

        let lines: Vec<&[u8]> = container.logs.split_inclusive(|b| *b == b'\n').collect();
        let start = lines.len().saturating_sub(tail);
        Ok(lines[start..].concat())
    }

    async fn list_containers(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let state = self.record(RuntimeCall::ListContainers).await?;
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| labels.iter().all(|(k, v)| c.labels.get(k) == Some(v)))
            .map(|(name, c)| ContainerSummary {
                name: name.clone(),
                status: c.status.clone(),
                labels: c.labels.clone(),
            })
            .collect())
    }

    async fn inspect_network(&self, name: &str) -> Result<(), RuntimeError> {
        let state = self.record(RuntimeCall::InspectNetwork(name.to_string())).await?;
        if state.networks.contains(name) {
            Ok(())
        } else {
            Err(RuntimeError::NotFound(format!("network {} not found", name)))
        }
    }

    async fn create_network(&self, name: &str, _driver: &str) -> Result<(), RuntimeError> {
        let mut state = self.record(RuntimeCall::CreateNetwork(name.to_string())).await?;
        if state.network_race {
            state.network_race = false;
            state.networks.insert(name.to_string());
            return Err(RuntimeError::Conflict(format!("network with name {} already exists", name)));
        }
        if !state.networks.insert(name.to_string()) {
            return Err(RuntimeError::Conflict(format!("network with name {} already exists", name)));
        }
        Ok(())
    }
}
