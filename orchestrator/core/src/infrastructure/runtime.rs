// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::runtime::{
    ContainerRuntime, ContainerSpec, ContainerStatus, ContainerSummary, RestartPolicy, RuntimeError,
};
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::errors::Error as DockerError;
use bollard::models::{
    ContainerCreateBody, HostConfig, NetworkCreateRequest, RestartPolicy as DockerRestartPolicy,
    RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, InspectNetworkOptions, ListContainersOptions,
    LogsOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::Docker;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

pub struct DockerRuntime {
    docker: Docker,
    call_timeout: Duration,
}

impl DockerRuntime {
    pub fn new(socket_path: Option<String>, call_timeout: Duration) -> Result<Self, RuntimeError> {
        let connect_secs = call_timeout.as_secs().max(1);

        // Connect to Docker daemon (custom socket or auto-detect)
        let docker = if let Some(path) = socket_path {
            #[cfg(unix)]
            let result = Docker::connect_with_unix(&path, connect_secs, bollard::API_DEFAULT_VERSION);

            #[cfg(windows)]
            let result = Docker::connect_with_named_pipe(&path, connect_secs, bollard::API_DEFAULT_VERSION);

            result.map_err(|e| {
                RuntimeError::Unavailable(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                ))
            })?
        } else {
            Docker::connect_with_local_defaults().map_err(|e| {
                RuntimeError::Unavailable(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Common causes:\n\
                     - Docker daemon not running (check: docker ps)\n\
                     - Permission denied accessing Docker socket\n\
                     - Manager container started without the socket mounted",
                    e
                ))
            })?
        };

        Ok(Self { docker, call_timeout })
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.bounded("ping", self.docker.ping()).await.map_err(|e| match e {
            RuntimeError::Timeout { .. } => e,
            other => RuntimeError::Unavailable(format!(
                "Cannot connect to Docker daemon: {}\n\nVerify with: docker ps",
                other
            )),
        })?;
        Ok(())
    }

    /// Run one engine call under the configured deadline and translate its error.
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, RuntimeError>
    where
        F: Future<Output = Result<T, DockerError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(|e| map_docker_error(operation, e)),
            Err(_) => Err(RuntimeError::Timeout {
                operation,
                seconds: self.call_timeout.as_secs(),
            }),
        }
    }
}

fn map_docker_error(operation: &'static str, err: DockerError) -> RuntimeError {
    match err {
        DockerError::DockerResponseServerError { status_code: 404, message } => {
            RuntimeError::NotFound(message)
        }
        DockerError::DockerResponseServerError { status_code: 409, message } => {
            RuntimeError::Conflict(message)
        }
        DockerError::DockerResponseServerError { status_code, message } => {
            RuntimeError::Failed(format!("{} failed ({}): {}", operation, status_code, message))
        }
        // Anything without a daemon response means the daemon was not reached.
        other => RuntimeError::Unavailable(format!("{}: {}", operation, other)),
    }
}

fn restart_policy(policy: RestartPolicy) -> DockerRestartPolicy {
    let name = match policy {
        RestartPolicy::Never => RestartPolicyNameEnum::NO,
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
    };
    DockerRestartPolicy {
        name: Some(name),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn inspect_container(&self, name: &str) -> Result<ContainerStatus, RuntimeError> {
        let inspect = self
            .bounded(
                "inspect_container",
                self.docker.inspect_container(name, None::<InspectContainerOptions>),
            )
            .await?;

        let status = inspect
            .state
            .and_then(|s| s.status)
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ContainerStatus::from_runtime(&status))
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.bounded("remove_container", self.docker.remove_container(name, Some(options)))
            .await?;

        info!("Removed container: {}", name);
        Ok(())
    }

    async fn run_container(&self, spec: ContainerSpec) -> Result<String, RuntimeError> {
        let host_config = HostConfig {
            binds: Some(spec.volumes.iter().map(|v| v.to_bind()).collect()),
            network_mode: Some(spec.network.clone()),
            memory: Some(i64::try_from(spec.memory_limit_bytes).unwrap_or(i64::MAX)),
            restart_policy: Some(restart_policy(spec.restart_policy)),
            ..Default::default()
        };

        // Convert map to "KEY=VALUE" strings
        let env_vars: Vec<String> = spec.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();

        let labels: HashMap<String, String> = spec.labels.into_iter().collect();

        let container_config = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: spec.command,
            env: Some(env_vars),
            labels: Some(labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        let created = self
            .bounded(
                "create_container",
                self.docker.create_container(Some(options), container_config),
            )
            .await?;

        self.bounded(
            "start_container",
            self.docker.start_container(&spec.name, None::<StartContainerOptions>),
        )
        .await?;

        info!("Started container {} ({}) from {}", spec.name, created.id, spec.image);
        Ok(created.id)
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<Vec<u8>, RuntimeError> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            tail: tail.to_string(),
            ..Default::default()
        };

        let collect = async {
            let mut stream = self.docker.logs(name, Some(options));
            let mut out = Vec::new();
            while let Some(chunk) = stream.next().await {
                match chunk? {
                    LogOutput::StdOut { message }
                    | LogOutput::StdErr { message }
                    | LogOutput::Console { message } => out.extend_from_slice(&message),
                    LogOutput::StdIn { .. } => {}
                }
            }
            Ok::<_, DockerError>(out)
        };

        let out = self.bounded("container_logs", collect).await?;
        debug!("Fetched {} bytes of logs from {}", out.len(), name);
        Ok(out)
    }

    async fn list_containers(
        &self,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert(
            "label".to_string(),
            labels.iter().map(|(k, v)| format!("{}={}", k, v)).collect::<Vec<_>>(),
        );

        let options = ListContainersOptions {
            all: true,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .bounded("list_containers", self.docker.list_containers(Some(options)))
            .await?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let name = c.names?.into_iter().next()?.trim_start_matches('/').to_string();
                let status = c
                    .state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                Some(ContainerSummary {
                    name,
                    status: ContainerStatus::from_runtime(&status),
                    labels: c.labels.unwrap_or_default().into_iter().collect(),
                })
            })
            .collect())
    }

    async fn inspect_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.bounded(
            "inspect_network",
            self.docker.inspect_network(name, None::<InspectNetworkOptions>),
        )
        .await?;
        Ok(())
    }

    async fn create_network(&self, name: &str, driver: &str) -> Result<(), RuntimeError> {
        let request = NetworkCreateRequest {
            name: name.to_string(),
            driver: Some(driver.to_string()),
            ..Default::default()
        };

        self.bounded("create_network", self.docker.create_network(request))
            .await?;

        info!("Created network: {} ({})", name, driver);
        Ok(())
    }
}
