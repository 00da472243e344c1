// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

// Gateway configuration document
//
// Builds the `config.json` consumed by the chat gateway inside each tenant
// container. One composer serves every upstream backend; the backend is an
// enumerated `ProviderProfile` value rather than a separate code path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::tenant::TenantRequest;

/// Paths inside the tenant container.
pub const AGENT_CONFIG_PATH: &str = "/root/.picoclaw/config.json";
pub const AGENT_WORKSPACE_PATH: &str = "/root/.picoclaw/workspace";
pub const AGENT_SKILLS_PATH: &str = "/root/.picoclaw/workspace/skills";

/// Upstream model backend a tenant's gateway talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderProfile {
    #[default]
    Groq,
    Anthropic,
    Gemini,
}

impl ProviderProfile {
    /// Key under `providers` in the gateway document.
    pub fn provider_key(&self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Groq => "deepseek-r1-distill-llama-70b",
            Self::Anthropic => "claude-sonnet-4-5",
            Self::Gemini => "gemini-2.5-flash",
        }
    }

    /// Environment variable carrying the backend secret, both for the
    /// manager's own configuration and inside the tenant container.
    pub fn secret_env_var(&self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.provider_key())
    }
}

impl FromStr for ProviderProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(format!(
                "Unknown provider '{}'. Supported: groq, anthropic, gemini",
                other
            )),
        }
    }
}

/// Non-empty upstream secret. There is no way to build one from a blank
/// string, so a composed document can never carry an empty key.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSecret(String);

impl ProviderSecret {
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProviderSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProviderSecret(***)")
    }
}

/// Static policy shared by every tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyDefaults {
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_iterations: u32,
    pub context_window_tokens: u32,
    pub request_timeout_seconds: u64,
    pub restrict_to_workspace: bool,
    pub tools_allow: Vec<String>,
    pub tools_deny: Vec<String>,
    pub web_search_max_results: u32,
    pub loop_detection: LoopDetectionPolicy,
    pub gateway_host: String,
    pub gateway_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_token: Option<String>,
}

impl Default for PolicyDefaults {
    fn default() -> Self {
        Self {
            max_tokens: 8192,
            temperature: 0.7,
            max_tool_iterations: 8,
            context_window_tokens: 32_768,
            request_timeout_seconds: 120,
            restrict_to_workspace: false,
            tools_allow: ["read_file", "write_file", "edit_file", "list_dir", "exec", "web_search", "web_fetch"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tools_deny: ["spawn", "cron"].iter().map(|s| s.to_string()).collect(),
            web_search_max_results: 5,
            loop_detection: LoopDetectionPolicy::default(),
            gateway_host: "0.0.0.0".to_string(),
            gateway_port: 18790,
            gateway_token: None,
        }
    }
}

/// Repeated-tool-call thresholds. `warning <= critical <= circuit_breaker`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopDetectionPolicy {
    pub enabled: bool,
    pub warning_threshold: u32,
    pub critical_threshold: u32,
    pub circuit_breaker_threshold: u32,
}

impl Default for LoopDetectionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            warning_threshold: 3,
            critical_threshold: 5,
            circuit_breaker_threshold: 8,
        }
    }
}

impl LoopDetectionPolicy {
    pub fn is_ordered(&self) -> bool {
        self.warning_threshold <= self.critical_threshold
            && self.critical_threshold <= self.circuit_breaker_threshold
    }
}

// ============================================================================
// Document
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfigDocument {
    pub gateway: GatewaySection,
    pub agents: AgentsSection,
    pub providers: BTreeMap<String, ProviderSection>,
    pub channels: ChannelsSection,
    pub tools: ToolsSection,
    pub loop_detection: LoopDetectionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewaySection {
    pub host: String,
    pub port: u16,
    pub auth: GatewayAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum GatewayAuth {
    None,
    Token { token: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentsSection {
    pub defaults: AgentDefaults,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefaults {
    pub workspace: String,
    pub restrict_to_workspace: bool,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_tool_iterations: u32,
    pub context_window_tokens: u32,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSection {
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelsSection {
    pub telegram: TelegramChannel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramChannel {
    pub enabled: bool,
    pub token: String,
    #[serde(rename = "allowFrom")]
    pub allow_from: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsSection {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
    pub web: WebTools,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebTools {
    pub duckduckgo: WebSearchTool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchTool {
    pub enabled: bool,
    pub max_results: u32,
}

impl RuntimeConfigDocument {
    /// Pretty JSON with a trailing newline, as written to disk.
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }
}

// ============================================================================
// Composer
// ============================================================================

/// Pure function of (request, profile, secret, policy). No I/O, no failure.
#[derive(Debug, Clone)]
pub struct ConfigComposer {
    profile: ProviderProfile,
    secret: ProviderSecret,
    policy: PolicyDefaults,
}

impl ConfigComposer {
    pub fn new(profile: ProviderProfile, secret: ProviderSecret, policy: PolicyDefaults) -> Self {
        Self { profile, secret, policy }
    }

    pub fn profile(&self) -> ProviderProfile {
        self.profile
    }

    pub fn secret(&self) -> &ProviderSecret {
        &self.secret
    }

    pub fn compose(&self, request: &TenantRequest) -> RuntimeConfigDocument {
        let policy = &self.policy;

        let auth = match &policy.gateway_token {
            Some(token) if !token.is_empty() => GatewayAuth::Token { token: token.clone() },
            _ => GatewayAuth::None,
        };

        let mut providers = BTreeMap::new();
        providers.insert(
            self.profile.provider_key().to_string(),
            ProviderSection { api_key: self.secret.expose().to_string() },
        );

        RuntimeConfigDocument {
            gateway: GatewaySection {
                host: policy.gateway_host.clone(),
                port: policy.gateway_port,
                auth,
            },
            agents: AgentsSection {
                defaults: AgentDefaults {
                    workspace: AGENT_WORKSPACE_PATH.to_string(),
                    restrict_to_workspace: policy.restrict_to_workspace,
                    model: self.profile.default_model().to_string(),
                    max_tokens: policy.max_tokens,
                    temperature: policy.temperature,
                    max_tool_iterations: policy.max_tool_iterations,
                    context_window_tokens: policy.context_window_tokens,
                    request_timeout_seconds: policy.request_timeout_seconds,
                },
            },
            providers,
            channels: ChannelsSection {
                telegram: TelegramChannel {
                    enabled: true,
                    token: request.bot_token().to_string(),
                    allow_from: vec![request.allowed_user_id().to_string()],
                },
            },
            tools: ToolsSection {
                allow: policy.tools_allow.clone(),
                deny: policy.tools_deny.clone(),
                web: WebTools {
                    duckduckgo: WebSearchTool {
                        enabled: true,
                        max_results: policy.web_search_max_results,
                    },
                },
            },
            loop_detection: policy.loop_detection.clone(),
        }
    }
}
