// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Tenant Identity
//!
//! Validated provisioning requests and the canonical resource names derived
//! from a tenant id. Names are recomputed on every call and never persisted,
//! so a tenant's container, network membership and host directory cannot
//! drift apart.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Tenant request validation and resource naming

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Sub-directory of the tenant's host directory holding the gateway config.
pub const CONFIG_DIR: &str = "config";

/// Sub-directory of the tenant's host directory holding the agent workspace.
pub const WORKSPACE_DIR: &str = "workspace";

/// File name of the runtime configuration document.
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("Tenant id must be numeric, got '{0}'")]
    NonNumericId(String),
}

/// Numeric business identifier of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub u64);

impl TenantId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TenantId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| ValidationError::NonNumericId(s.to_string()))
    }
}

/// Input to tenant creation. Construct through [`TenantRequest::new`] so
/// every field has been checked before any side effect happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRequest {
    business_id: TenantId,
    business_name: String,
    bot_token: String,
    allowed_user_id: String,
    api_key: String,
    api_base_url: String,
}

impl TenantRequest {
    pub fn new(
        business_id: TenantId,
        business_name: impl Into<String>,
        bot_token: impl Into<String>,
        allowed_user_id: impl Into<String>,
        api_key: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let request = Self {
            business_id,
            business_name: business_name.into(),
            bot_token: bot_token.into(),
            allowed_user_id: allowed_user_id.into(),
            api_key: api_key.into(),
            api_base_url: api_base_url.into(),
        };
        request.validate()?;
        Ok(request)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("business_name", &self.business_name),
            ("telegram_bot_token", &self.bot_token),
            ("telegram_user_id", &self.allowed_user_id),
            ("api_key", &self.api_key),
            ("api_url", &self.api_base_url),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(ValidationError::EmptyField { field });
            }
        }
        Ok(())
    }

    pub fn business_id(&self) -> TenantId {
        self.business_id
    }

    pub fn business_name(&self) -> &str {
        &self.business_name
    }

    pub fn bot_token(&self) -> &str {
        &self.bot_token
    }

    pub fn allowed_user_id(&self) -> &str {
        &self.allowed_user_id
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

/// Canonical names of everything the manager owns for one tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    pub tenant_id: TenantId,
    pub container_name: String,
    pub network_name: String,
    /// Tenant directory as seen by the manager process.
    pub host_directory: PathBuf,
    /// Same directory as seen by the container engine (bind-mount source).
    pub mount_directory: PathBuf,
}

impl TenantIdentity {
    pub fn config_dir(&self) -> PathBuf {
        self.host_directory.join(CONFIG_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir().join(CONFIG_FILE)
    }

    pub fn workspace_dir(&self) -> PathBuf {
        self.host_directory.join(WORKSPACE_DIR)
    }

    pub fn mount_config_file(&self) -> PathBuf {
        self.mount_directory.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    pub fn mount_workspace_dir(&self) -> PathBuf {
        self.mount_directory.join(WORKSPACE_DIR)
    }
}

/// Pure mapping from tenant id to resource names.
///
/// Injective over tenant ids for a fixed product prefix: the id is rendered
/// verbatim as the final name segment.
#[derive(Debug, Clone)]
pub struct ResourceNamer {
    product: String,
    network_name: String,
    data_root: PathBuf,
    host_data_root: PathBuf,
}

impl ResourceNamer {
    pub fn new(
        product: impl Into<String>,
        network_name: impl Into<String>,
        data_root: impl Into<PathBuf>,
        host_data_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            product: product.into(),
            network_name: network_name.into(),
            data_root: data_root.into(),
            host_data_root: host_data_root.into(),
        }
    }

    pub fn container_name(&self, tenant: TenantId) -> String {
        format!("{}-client-{}", self.product, tenant)
    }

    pub fn network_name(&self) -> &str {
        &self.network_name
    }

    pub fn host_dir(&self, tenant: TenantId) -> PathBuf {
        self.data_root.join(self.container_name(tenant))
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Recover the tenant id from a container name produced by this namer.
    pub fn tenant_from_container(&self, container_name: &str) -> Option<TenantId> {
        let prefix = format!("{}-client-", self.product);
        container_name
            .trim_start_matches('/')
            .strip_prefix(&prefix)?
            .parse()
            .ok()
    }

    pub fn identity(&self, tenant: TenantId) -> TenantIdentity {
        let container_name = self.container_name(tenant);
        TenantIdentity {
            tenant_id: tenant,
            host_directory: self.data_root.join(&container_name),
            mount_directory: self.host_data_root.join(&container_name),
            network_name: self.network_name.clone(),
            container_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn namer() -> ResourceNamer {
        ResourceNamer::new("picoclaw", "picoclaw-net", "/data", "/host/data")
    }

    fn request(name: &str) -> Result<TenantRequest, ValidationError> {
        TenantRequest::new(TenantId(7), name, "bot", "99", "key", "https://api.example/")
    }

    #[test]
    fn test_container_name_format() {
        assert_eq!(namer().container_name(TenantId(42)), "picoclaw-client-42");
    }

    #[test]
    fn test_naming_is_stable_and_injective() {
        let namer = namer();
        let mut seen = HashSet::new();
        for id in 0..500u64 {
            let first = namer.container_name(TenantId(id));
            assert_eq!(first, namer.container_name(TenantId(id)));
            assert!(seen.insert(first), "duplicate name for tenant {}", id);
        }
    }

    #[test]
    fn test_identity_paths() {
        let identity = namer().identity(TenantId(42));
        assert_eq!(identity.network_name, "picoclaw-net");
        assert_eq!(identity.host_directory, PathBuf::from("/data/picoclaw-client-42"));
        assert_eq!(
            identity.config_file(),
            PathBuf::from("/data/picoclaw-client-42/config/config.json")
        );
        assert_eq!(
            identity.mount_workspace_dir(),
            PathBuf::from("/host/data/picoclaw-client-42/workspace")
        );
    }

    #[test]
    fn test_tenant_from_container() {
        let namer = namer();
        assert_eq!(namer.tenant_from_container("/picoclaw-client-9"), Some(TenantId(9)));
        assert_eq!(namer.tenant_from_container("other-client-9"), None);
        assert_eq!(namer.tenant_from_container("picoclaw-client-x"), None);
    }

    #[test]
    fn test_request_rejects_blank_fields() {
        assert!(request("Acme").is_ok());
        assert_eq!(
            request("   ").unwrap_err(),
            ValidationError::EmptyField { field: "business_name" }
        );
    }

    #[test]
    fn test_tenant_id_parse() {
        assert_eq!("42".parse::<TenantId>().unwrap(), TenantId(42));
        assert!(matches!(
            "abc".parse::<TenantId>(),
            Err(ValidationError::NonNumericId(_))
        ));
    }
}
