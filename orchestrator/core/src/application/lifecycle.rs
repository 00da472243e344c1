// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Lifecycle
//!
//! Create, delete, health, logs and listing for tenant containers. The
//! container engine is re-queried for every decision; this service keeps no
//! record of what it started.
//!
//! Create and Delete hold the tenant's lock for the whole sequence and run
//! on a spawned task, so dropping the caller's future cannot stop them
//! half-way through.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Tenant container state machine

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::network::NetworkEnsurer;
use crate::application::tenant_locks::TenantLocks;
use crate::application::workspace_materializer::{
    remove_dir_if_present, write_file, FsWriteError, WorkspaceMaterializer,
};
use crate::domain::gateway_config::{
    ConfigComposer, AGENT_CONFIG_PATH, AGENT_SKILLS_PATH, AGENT_WORKSPACE_PATH,
};
use crate::domain::manager_config::{CreatePolicy, ManagerConfig};
use crate::domain::runtime::{
    ContainerRuntime, ContainerSpec, RestartPolicy, RuntimeError, VolumeBinding,
};
use crate::domain::tenant::{ResourceNamer, TenantId, TenantIdentity, TenantRequest, ValidationError};
use crate::domain::workspace::{build_bundle, WorkspaceLayout};

pub const LABEL_MANAGED_BY: &str = "managed-by";
pub const LABEL_BUSINESS_ID: &str = "business-id";

/// Reported for a tenant with no container.
pub const STATUS_NOT_FOUND: &str = "not_found";

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Container {container} not found")]
    NotFound { container: String },

    #[error("Container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("Container runtime error: {0}")]
    RuntimeFailure(String),

    #[error("Failed to write configuration: {0}")]
    ConfigurationWrite(#[source] FsWriteError),

    #[error("Failed to write workspace: {0}")]
    WorkspaceWrite(#[source] FsWriteError),

    #[error("Failed to clean up tenant directory: {0}")]
    Cleanup(#[source] FsWriteError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Operation interrupted: {0}")]
    Interrupted(String),
}

impl From<RuntimeError> for LifecycleError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Unavailable(_) | RuntimeError::Timeout { .. } => {
                Self::RuntimeUnavailable(err.to_string())
            }
            other => Self::RuntimeFailure(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateStatus {
    Running,
    AlreadyRunning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStatus {
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateOutcome {
    pub container_id: String,
    pub status: CreateStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub container_id: String,
    pub status: DeleteStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantHealth {
    pub container_id: String,
    pub status: String,
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantLogs {
    pub container_id: String,
    pub logs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantSummary {
    pub container_id: String,
    pub business_id: Option<TenantId>,
    pub status: String,
}

/// Per-deployment knobs for container creation.
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub image: String,
    pub command: Option<Vec<String>>,
    pub memory_limit_bytes: u64,
    pub owner_label: String,
    pub create_policy: CreatePolicy,
    pub workspace_layout: WorkspaceLayout,
    /// Skill document folded into the workspace as the API reference.
    pub skill_path: Option<PathBuf>,
    /// Shared skills directory as seen by the engine, mounted read-only.
    pub host_skills_dir: Option<PathBuf>,
}

impl LifecycleSettings {
    pub fn from_config(config: &ManagerConfig) -> Self {
        Self {
            image: config.image.clone(),
            command: (!config.command.is_empty()).then(|| config.command.clone()),
            memory_limit_bytes: config.memory_limit_bytes(),
            owner_label: config.owner_label.clone(),
            create_policy: config.create_policy,
            workspace_layout: config.workspace_layout,
            skill_path: config.skill_path(),
            host_skills_dir: config.host_skills_dir().map(|p| p.to_path_buf()),
        }
    }

    fn owner_filter(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(LABEL_MANAGED_BY.to_string(), self.owner_label.clone())])
    }
}

struct Inner {
    runtime: Arc<dyn ContainerRuntime>,
    namer: ResourceNamer,
    composer: ConfigComposer,
    settings: LifecycleSettings,
    locks: TenantLocks,
    network: NetworkEnsurer,
    materializer: WorkspaceMaterializer,
}

#[derive(Clone)]
pub struct TenantLifecycleService {
    inner: Arc<Inner>,
}

impl TenantLifecycleService {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        namer: ResourceNamer,
        composer: ConfigComposer,
        settings: LifecycleSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                network: NetworkEnsurer::new(runtime.clone()),
                runtime,
                namer,
                composer,
                settings,
                locks: TenantLocks::new(),
                materializer: WorkspaceMaterializer::new(),
            }),
        }
    }

    /// Build from a validated configuration. Fails only when the selected
    /// provider has no usable secret.
    pub fn from_config(config: &ManagerConfig, runtime: Arc<dyn ContainerRuntime>) -> anyhow::Result<Self> {
        let secret = config.provider_secret().ok_or_else(|| {
            anyhow::anyhow!(
                "{} is required for provider '{}'",
                config.provider.secret_env_var(),
                config.provider
            )
        })?;
        let composer = ConfigComposer::new(config.provider, secret, config.policy.clone());
        Ok(Self::new(runtime, config.namer(), composer, LifecycleSettings::from_config(config)))
    }

    pub fn namer(&self) -> &ResourceNamer {
        &self.inner.namer
    }

    pub fn settings(&self) -> &LifecycleSettings {
        &self.inner.settings
    }

    pub async fn create_tenant(&self, request: TenantRequest) -> Result<CreateOutcome, LifecycleError> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.create(request).await })
            .await
            .map_err(|e| LifecycleError::Interrupted(e.to_string()))?
    }

    pub async fn delete_tenant(&self, tenant: TenantId, cleanup: bool) -> Result<DeleteOutcome, LifecycleError> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.delete(tenant, cleanup).await })
            .await
            .map_err(|e| LifecycleError::Interrupted(e.to_string()))?
    }

    /// Read-only; may observe a transient state while a recreate is in flight.
    pub async fn tenant_health(&self, tenant: TenantId) -> Result<TenantHealth, LifecycleError> {
        let container_id = self.inner.namer.container_name(tenant);
        match self.inner.runtime.inspect_container(&container_id).await {
            Ok(status) => Ok(TenantHealth {
                healthy: status.is_running(),
                status: status.to_string(),
                container_id,
            }),
            Err(e) if e.is_not_found() => Ok(TenantHealth {
                container_id,
                status: STATUS_NOT_FOUND.to_string(),
                healthy: false,
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn tenant_logs(&self, tenant: TenantId, lines: usize) -> Result<TenantLogs, LifecycleError> {
        let container_id = self.inner.namer.container_name(tenant);
        match self.inner.runtime.container_logs(&container_id, lines).await {
            Ok(bytes) => Ok(TenantLogs {
                logs: String::from_utf8_lossy(&bytes).into_owned(),
                container_id,
            }),
            Err(e) if e.is_not_found() => Err(LifecycleError::NotFound { container: container_id }),
            Err(e) => Err(e.into()),
        }
    }

    /// Containers labelled as owned by this manager, in any state.
    pub async fn list_tenants(&self) -> Result<Vec<TenantSummary>, LifecycleError> {
        let filter = self.inner.settings.owner_filter();
        let containers = self.inner.runtime.list_containers(&filter).await?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let business_id = c
                    .labels
                    .get(LABEL_BUSINESS_ID)
                    .and_then(|id| id.parse().ok())
                    .or_else(|| self.inner.namer.tenant_from_container(&c.name));
                TenantSummary {
                    container_id: c.name,
                    business_id,
                    status: c.status.to_string(),
                }
            })
            .collect())
    }
}

impl Inner {
    async fn create(&self, request: TenantRequest) -> Result<CreateOutcome, LifecycleError> {
        let tenant = request.business_id();
        let _guard = self.locks.acquire(tenant).await;
        let identity = self.namer.identity(tenant);
        let container = identity.container_name.as_str();

        let existing = match self.runtime.inspect_container(container).await {
            Ok(status) => Some(status),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };

        if let Some(status) = existing {
            if self.settings.create_policy == CreatePolicy::ReuseIfRunning && status.is_running() {
                info!(tenant = %tenant, container, "Container already running, reusing");
                return Ok(CreateOutcome {
                    container_id: identity.container_name,
                    status: CreateStatus::AlreadyRunning,
                });
            }

            info!(tenant = %tenant, container, status = %status, "Removing existing container");
            match self.runtime.remove_container(container, true).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(tenant = %tenant, container, "Container vanished before removal");
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.reset_directories(&identity).await?;

        let document = self.composer.compose(&request);
        let json = document.to_json_pretty().map_err(|e| {
            LifecycleError::ConfigurationWrite(FsWriteError {
                path: identity.config_file(),
                source: e.into(),
            })
        })?;
        write_file(&identity.config_file(), &json)
            .await
            .map_err(LifecycleError::ConfigurationWrite)?;

        self.materialize_workspace(&identity, &request).await?;

        self.network.ensure(&identity.network_name).await?;

        let spec = self.container_spec(&identity);
        let engine_id = self.runtime.run_container(spec).await?;

        info!(
            tenant = %tenant,
            container,
            network = %identity.network_name,
            engine_id = %engine_id,
            "Tenant container started"
        );

        Ok(CreateOutcome {
            container_id: identity.container_name,
            status: CreateStatus::Running,
        })
    }

    async fn delete(&self, tenant: TenantId, cleanup: bool) -> Result<DeleteOutcome, LifecycleError> {
        let _guard = self.locks.acquire(tenant).await;
        let identity = self.namer.identity(tenant);
        let container = identity.container_name.as_str();

        match self.runtime.inspect_container(container).await {
            Ok(_) => {}
            Err(e) if e.is_not_found() => {
                return Err(LifecycleError::NotFound { container: identity.container_name });
            }
            Err(e) => return Err(e.into()),
        }

        match self.runtime.remove_container(container, true).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(tenant = %tenant, container, "Container disappeared during delete");
            }
            Err(e) => return Err(e.into()),
        }

        if cleanup {
            remove_dir_if_present(&identity.host_directory)
                .await
                .map_err(LifecycleError::Cleanup)?;
            info!(tenant = %tenant, dir = %identity.host_directory.display(), "Tenant directory removed");
        }

        info!(tenant = %tenant, container, cleanup, "Tenant container removed");
        Ok(DeleteOutcome {
            container_id: identity.container_name,
            status: DeleteStatus::Removed,
        })
    }

    /// Drop whatever the previous creation left and lay out empty subtrees.
    async fn reset_directories(&self, identity: &TenantIdentity) -> Result<(), LifecycleError> {
        remove_dir_if_present(&identity.host_directory)
            .await
            .map_err(LifecycleError::ConfigurationWrite)?;

        for dir in [identity.config_dir(), identity.workspace_dir()] {
            tokio::fs::create_dir_all(&dir).await.map_err(|source| {
                LifecycleError::ConfigurationWrite(FsWriteError { path: dir.clone(), source })
            })?;
        }
        Ok(())
    }

    async fn materialize_workspace(
        &self,
        identity: &TenantIdentity,
        request: &TenantRequest,
    ) -> Result<(), LifecycleError> {
        let skill_body = match &self.settings.skill_path {
            Some(path) => self.materializer.load_external_skill(path).await,
            None => String::new(),
        };
        let bundle = build_bundle(request, self.settings.workspace_layout, &skill_body);
        self.materializer
            .write(&identity.workspace_dir(), &bundle)
            .await
            .map_err(LifecycleError::WorkspaceWrite)
    }

    fn container_spec(&self, identity: &TenantIdentity) -> ContainerSpec {
        let profile = self.composer.profile();

        let mut volumes = vec![
            VolumeBinding::read_only(identity.mount_config_file(), AGENT_CONFIG_PATH),
            VolumeBinding::read_write(identity.mount_workspace_dir(), AGENT_WORKSPACE_PATH),
        ];
        if let Some(skills) = &self.settings.host_skills_dir {
            volumes.push(VolumeBinding::read_only(skills.clone(), AGENT_SKILLS_PATH));
        }

        ContainerSpec {
            image: self.settings.image.clone(),
            name: identity.container_name.clone(),
            command: self.settings.command.clone(),
            env: BTreeMap::from([(
                profile.secret_env_var().to_string(),
                self.composer.secret().expose().to_string(),
            )]),
            volumes,
            network: identity.network_name.clone(),
            restart_policy: RestartPolicy::UnlessStopped,
            memory_limit_bytes: self.settings.memory_limit_bytes,
            labels: BTreeMap::from([
                (LABEL_MANAGED_BY.to_string(), self.settings.owner_label.clone()),
                (LABEL_BUSINESS_ID.to_string(), identity.tenant_id.to_string()),
            ]),
        }
    }
}
