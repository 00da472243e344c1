// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

// Manager Configuration
//
// Process-wide settings for the container manager:
// - Image, network and product prefix used for every tenant
// - Data roots (manager view and container-engine view)
// - Shared skills directory
// - Upstream provider profile and keys
// - Create policy (force-recreate vs reuse-if-running)
// - Static agent policy embedded in every gateway document
//
// Read once at startup: optional YAML file, then environment overrides,
// then validation. Anything missing is a startup error, never a per-request one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::domain::gateway_config::{PolicyDefaults, ProviderProfile, ProviderSecret};
use crate::domain::tenant::ResourceNamer;
use crate::domain::workspace::WorkspaceLayout;

/// How Create treats a container that already exists for the tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CreatePolicy {
    /// Always remove and rebuild; discards session state.
    #[default]
    ForceRecreate,
    /// Leave a running container alone; replace anything else.
    ReuseIfRunning,
}

impl FromStr for CreatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "force-recreate" | "force_recreate" => Ok(Self::ForceRecreate),
            "reuse-if-running" | "reuse_if_running" => Ok(Self::ReuseIfRunning),
            other => Err(format!(
                "Unknown create policy '{}'. Supported: force-recreate, reuse-if-running",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderKeys {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
}

impl ProviderKeys {
    pub fn get(&self, profile: ProviderProfile) -> Option<&str> {
        match profile {
            ProviderProfile::Anthropic => self.anthropic.as_deref(),
            ProviderProfile::Groq => self.groq.as_deref(),
            ProviderProfile::Gemini => self.gemini.as_deref(),
        }
    }

    fn set(&mut self, profile: ProviderProfile, value: String) {
        match profile {
            ProviderProfile::Anthropic => self.anthropic = Some(value),
            ProviderProfile::Groq => self.groq = Some(value),
            ProviderProfile::Gemini => self.gemini = Some(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Product prefix for container and network names
    pub product: String,

    /// Gateway image started for every tenant
    pub image: String,

    /// Command passed to the image (empty = image default)
    pub command: Vec<String>,

    /// Isolated network shared by tenant containers (default: "<product>-net")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_name: Option<String>,

    /// Tenant directories as seen by this process
    pub data_dir: PathBuf,

    /// Tenant directories as seen by the container engine. Differs from
    /// `data_dir` when the manager itself runs in a container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_data_dir: Option<PathBuf>,

    /// Shared skills directory as seen by this process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills_dir: Option<PathBuf>,

    /// Shared skills directory as seen by the container engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_skills_dir: Option<PathBuf>,

    /// Skill folded into the workspace as the API reference
    pub skill_name: String,

    pub provider: ProviderProfile,

    pub provider_keys: ProviderKeys,

    /// Bearer token required on every tenant endpoint
    pub manager_token: String,

    pub create_policy: CreatePolicy,

    pub workspace_layout: WorkspaceLayout,

    pub memory_limit_mb: u64,

    /// Value of the `managed-by` label on tenant containers
    pub owner_label: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub docker_socket_path: Option<String>,

    /// Upper bound for any single container-engine call
    pub runtime_timeout_secs: u64,

    pub bind_address: String,

    pub port: u16,

    pub policy: PolicyDefaults,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            product: "picoclaw".to_string(),
            image: "sipeed/picoclaw:latest".to_string(),
            command: vec!["gateway".to_string()],
            network_name: None,
            data_dir: PathBuf::from("/opt/picoclaw/data"),
            host_data_dir: None,
            skills_dir: Some(PathBuf::from("/opt/picoclaw/shared/skills")),
            host_skills_dir: None,
            skill_name: "flyapp".to_string(),
            provider: ProviderProfile::default(),
            provider_keys: ProviderKeys::default(),
            manager_token: String::new(),
            create_policy: CreatePolicy::default(),
            workspace_layout: WorkspaceLayout::default(),
            memory_limit_mb: 512,
            owner_label: "flyclawd".to_string(),
            docker_socket_path: None,
            runtime_timeout_secs: 120,
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            policy: PolicyDefaults::default(),
        }
    }
}

impl ManagerConfig {
    pub fn network_name(&self) -> String {
        self.network_name
            .clone()
            .unwrap_or_else(|| format!("{}-net", self.product))
    }

    pub fn host_data_dir(&self) -> &Path {
        self.host_data_dir.as_deref().unwrap_or(&self.data_dir)
    }

    pub fn host_skills_dir(&self) -> Option<&Path> {
        self.host_skills_dir.as_deref().or(self.skills_dir.as_deref())
    }

    /// `<skills_dir>/<skill_name>/SKILL.md`
    pub fn skill_path(&self) -> Option<PathBuf> {
        self.skills_dir
            .as_ref()
            .map(|dir| dir.join(&self.skill_name).join("SKILL.md"))
    }

    pub fn provider_secret(&self) -> Option<ProviderSecret> {
        self.provider_keys
            .get(self.provider)
            .and_then(|key| ProviderSecret::new(key))
    }

    /// Saturates; `validate` rejects limits that do not fit the engine's signed byte count.
    pub fn memory_limit_bytes(&self) -> u64 {
        self.memory_limit_mb.saturating_mul(1024 * 1024)
    }

    pub fn runtime_timeout(&self) -> Duration {
        Duration::from_secs(self.runtime_timeout_secs)
    }

    pub fn namer(&self) -> ResourceNamer {
        ResourceNamer::new(
            self.product.clone(),
            self.network_name(),
            self.data_dir.clone(),
            self.host_data_dir().to_path_buf(),
        )
    }

    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. PICOCLAW_CONFIG_PATH environment variable
    /// 2. ./picoclaw-manager.yaml (working directory)
    /// 3. ~/.picoclaw/manager.yaml (user home)
    /// 4. /etc/picoclaw/manager.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("PICOCLAW_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./picoclaw-manager.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".picoclaw").join("manager.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/picoclaw/manager.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to defaults. Environment
    /// overrides are applied last in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?
        } else {
            tracing::debug!("No configuration file found, using defaults and environment");
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        self.apply_env_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable source. Empty values are
    /// treated as unset.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PICOCLAW_PRODUCT") {
            self.product = v;
        }
        if let Some(v) = get("PICOCLAW_IMAGE") {
            self.image = v;
        }
        if let Some(v) = get("PICOCLAW_NETWORK") {
            self.network_name = Some(v);
        }
        if let Some(v) = get("DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = get("HOST_DATA_DIR") {
            self.host_data_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("SKILLS_DIR") {
            self.skills_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("HOST_SKILLS_DIR") {
            self.host_skills_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = get("PICOCLAW_SKILL") {
            self.skill_name = v;
        }
        if let Some(v) = get("PICOCLAW_PROVIDER") {
            self.provider = v.parse().map_err(anyhow::Error::msg)?;
        }
        for profile in [ProviderProfile::Anthropic, ProviderProfile::Groq, ProviderProfile::Gemini] {
            if let Some(v) = get(profile.secret_env_var()) {
                self.provider_keys.set(profile, v);
            }
        }
        if let Some(v) = get("MANAGER_TOKEN") {
            self.manager_token = v;
        }
        if let Some(v) = get("PICOCLAW_CREATE_POLICY") {
            self.create_policy = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = get("PICOCLAW_WORKSPACE_LAYOUT") {
            self.workspace_layout = v.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(v) = get("PICOCLAW_MEMORY_LIMIT_MB") {
            self.memory_limit_mb = v
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid PICOCLAW_MEMORY_LIMIT_MB: '{}'", v))?;
        }
        if let Some(v) = get("PICOCLAW_OWNER_LABEL") {
            self.owner_label = v;
        }
        if let Some(v) = get("DOCKER_SOCKET_PATH") {
            self.docker_socket_path = Some(v);
        }
        if let Some(v) = get("PICOCLAW_RUNTIME_TIMEOUT_SECS") {
            self.runtime_timeout_secs = v
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid PICOCLAW_RUNTIME_TIMEOUT_SECS: '{}'", v))?;
        }
        if let Some(v) = get("PICOCLAW_HOST") {
            self.bind_address = v;
        }
        if let Some(v) = get("PICOCLAW_PORT") {
            self.port = v
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid PICOCLAW_PORT: '{}'", v))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.product.trim().is_empty() {
            anyhow::bail!("product cannot be empty");
        }

        if self.image.trim().is_empty() {
            anyhow::bail!("image cannot be empty");
        }

        if self.manager_token.trim().is_empty() {
            anyhow::bail!("MANAGER_TOKEN is required");
        }

        if self.owner_label.trim().is_empty() {
            anyhow::bail!("owner_label cannot be empty");
        }

        if self.memory_limit_mb == 0 {
            anyhow::bail!("memory_limit_mb must be greater than zero");
        }

        let fits = self
            .memory_limit_mb
            .checked_mul(1024 * 1024)
            .is_some_and(|bytes| i64::try_from(bytes).is_ok());
        if !fits {
            anyhow::bail!("memory_limit_mb {} is too large", self.memory_limit_mb);
        }

        if self.runtime_timeout_secs == 0 {
            anyhow::bail!("runtime_timeout_secs must be greater than zero");
        }

        if self.provider_secret().is_none() {
            anyhow::bail!(
                "{} is required for provider '{}'",
                self.provider.secret_env_var(),
                self.provider
            );
        }

        if !self.policy.loop_detection.is_ordered() {
            anyhow::bail!(
                "loop detection thresholds must satisfy warning <= critical <= circuit_breaker"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn valid() -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config
            .apply_env_overrides_from(|k| {
                env(&[("MANAGER_TOKEN", "tok"), ("GROQ_API_KEY", "gk")]).get(k).cloned()
            })
            .unwrap();
        config
    }

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.network_name(), "picoclaw-net");
        assert_eq!(config.host_data_dir(), Path::new("/opt/picoclaw/data"));
        assert_eq!(config.memory_limit_bytes(), 512 * 1024 * 1024);
        assert_eq!(config.create_policy, CreatePolicy::ForceRecreate);
        assert_eq!(
            config.skill_path(),
            Some(PathBuf::from("/opt/picoclaw/shared/skills/flyapp/SKILL.md"))
        );
    }

    #[test]
    fn test_validation_requires_token_and_provider_key() {
        let mut config = ManagerConfig::default();
        assert!(config.validate().is_err());

        config.manager_token = "tok".to_string();
        assert!(config.validate().is_err());

        config.provider_keys.groq = Some("   ".to_string());
        assert!(config.validate().is_err());

        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_oversized_memory_limit_is_rejected() {
        let mut config = valid();
        config.memory_limit_mb = u64::MAX / 1024;
        assert!(config.validate().is_err());
        assert_eq!(config.memory_limit_bytes(), u64::MAX);

        // Largest value whose byte count still fits an i64
        config.memory_limit_mb = (i64::MAX as u64) / (1024 * 1024);
        assert!(config.validate().is_ok());

        config.memory_limit_mb += 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars = env(&[
            ("MANAGER_TOKEN", "tok"),
            ("ANTHROPIC_API_KEY", "ak"),
            ("PICOCLAW_PROVIDER", "anthropic"),
            ("PICOCLAW_CREATE_POLICY", "reuse-if-running"),
            ("DATA_DIR", "/srv/data"),
            ("HOST_DATA_DIR", "/mnt/host/data"),
            ("PICOCLAW_MEMORY_LIMIT_MB", "1024"),
            ("PICOCLAW_IMAGE", ""),
        ]);
        let mut config = ManagerConfig::default();
        config.apply_env_overrides_from(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.provider, ProviderProfile::Anthropic);
        assert_eq!(config.create_policy, CreatePolicy::ReuseIfRunning);
        assert_eq!(config.data_dir, PathBuf::from("/srv/data"));
        assert_eq!(config.host_data_dir(), Path::new("/mnt/host/data"));
        assert_eq!(config.memory_limit_mb, 1024);
        assert_eq!(config.image, "sipeed/picoclaw:latest");
        assert_eq!(config.provider_secret().unwrap().expose(), "ak");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_env_value_is_error() {
        let vars = env(&[("PICOCLAW_CREATE_POLICY", "sometimes")]);
        let mut config = ManagerConfig::default();
        assert!(config.apply_env_overrides_from(|k| vars.get(k).cloned()).is_err());
    }

    #[test]
    fn test_yaml_partial() {
        let config = ManagerConfig::from_yaml_str(
            "product: acme\nprovider: gemini\ncreate_policy: reuse-if-running\npolicy:\n  max_tokens: 4096\n",
        )
        .unwrap();
        assert_eq!(config.network_name(), "acme-net");
        assert_eq!(config.provider, ProviderProfile::Gemini);
        assert_eq!(config.policy.max_tokens, 4096);
        assert_eq!(config.policy.max_tool_iterations, 8);
        assert_eq!(config.namer().container_name(crate::domain::tenant::TenantId(3)), "acme-client-3");
    }

    #[test]
    fn test_loop_thresholds_must_be_ordered() {
        let mut config = valid();
        config.policy.loop_detection.warning_threshold = 10;
        assert!(config.validate().is_err());
    }
}
