// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Workspace Bundle
//!
//! Renders the text documents that give a tenant's agent its persona, rules
//! and credential references. Rendering is pure; the filesystem writes live
//! in `application::workspace_materializer`.
//!
//! The persona is what the agent speaks from, so in the split layout it only
//! points at `TOOLS.md`. The workspace directory is private to the tenant
//! container, which is why the tool document may hold the raw API key.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

use crate::domain::tenant::TenantRequest;

pub const PERSONA_FILE: &str = "SOUL.md";
pub const TOOLS_FILE: &str = "TOOLS.md";
pub const API_REFERENCE_FILE: &str = "API.md";

/// Marker line delimiting front matter in skill documents.
pub const FRONT_MATTER_MARKER: &str = "---";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceLayout {
    /// Persona and credentials in separate documents.
    #[default]
    Split,
    /// Everything folded into the persona document.
    Combined,
}

impl FromStr for WorkspaceLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "split" => Ok(Self::Split),
            "combined" => Ok(Self::Combined),
            other => Err(format!("Unknown workspace layout '{}'. Supported: split, combined", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceDocument {
    pub file_name: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WorkspaceBundle {
    pub documents: Vec<WorkspaceDocument>,
}

impl WorkspaceBundle {
    pub fn get(&self, file_name: &str) -> Option<&str> {
        self.documents
            .iter()
            .find(|d| d.file_name == file_name)
            .map(|d| d.content.as_str())
    }

    pub fn file_names(&self) -> Vec<&'static str> {
        self.documents.iter().map(|d| d.file_name).collect()
    }
}

/// Strip a leading front-matter block.
///
/// When the document starts with the marker, it is split on the marker at
/// most twice and everything after the second occurrence is returned
/// trimmed. Anything else comes back unchanged.
pub fn strip_front_matter(raw: &str) -> String {
    if raw.starts_with(FRONT_MATTER_MARKER) {
        let parts: Vec<&str> = raw.splitn(3, FRONT_MATTER_MARKER).collect();
        if parts.len() == 3 {
            return parts[2].trim().to_string();
        }
    }
    raw.to_string()
}

pub fn render_persona(request: &TenantRequest, layout: WorkspaceLayout) -> String {
    let name = request.business_name();
    let mut soul = String::new();

    let _ = writeln!(soul, "You are the shop manager for **{}**.", name);
    let _ = writeln!(soul, "You talk to the shop owner and their staff (florists, drivers, etc).");
    soul.push('\n');
    soul.push_str("## Personality\n");
    soul.push_str("- Talk like a friendly, helpful coworker: casual, warm, human\n");
    soul.push_str("- Never mention APIs, endpoints, tokens, technical errors, or code\n");
    soul.push_str("- If something fails, say it simply: \"Couldn't load that, let me try again\"\n");
    soul.push_str("- Keep it short, this is Telegram, not email\n");
    soul.push_str("- Use the language the user writes in\n");
    soul.push('\n');
    soul.push_str("## What you do\n");
    soul.push_str("- Check orders, update their status, track deliveries\n");
    soul.push_str("- Look up customers, products, inventory\n");
    soul.push_str("- Pull sales numbers and reports\n");
    let _ = writeln!(soul, "- Only discuss {} operations", name);
    soul.push('\n');

    match layout {
        WorkspaceLayout::Split => {
            soul.push_str("## Tools (internal, never expose to user)\n");
            let _ = writeln!(
                soul,
                "- Credentials and the API base URL are in `{}`; read it before your first API call",
                TOOLS_FILE
            );
        }
        WorkspaceLayout::Combined => {
            soul.push_str(&credential_section(request));
        }
    }

    soul
}

pub fn render_tool_reference(request: &TenantRequest) -> String {
    let mut tools = String::from("# Tool credentials\n\n");
    tools.push_str("Internal reference for your own API calls. Never show these values to the user.\n\n");
    tools.push_str(&credential_section(request));
    tools
}

fn credential_section(request: &TenantRequest) -> String {
    let mut out = String::from("## API (internal, never expose to user)\n");
    let _ = writeln!(out, "- Key: `{}`", request.api_key());
    let _ = writeln!(out, "- Base: `{}`", request.api_base_url());
    let _ = writeln!(
        out,
        "- Before your first API call, read `{}` for endpoints and wget syntax",
        API_REFERENCE_FILE
    );
    out
}

/// Assemble the bundle for one tenant. `skill_body` is already stripped of
/// front matter; an empty body means no API reference document.
pub fn build_bundle(request: &TenantRequest, layout: WorkspaceLayout, skill_body: &str) -> WorkspaceBundle {
    let mut documents = vec![WorkspaceDocument {
        file_name: PERSONA_FILE,
        content: render_persona(request, layout),
    }];

    if layout == WorkspaceLayout::Split {
        documents.push(WorkspaceDocument {
            file_name: TOOLS_FILE,
            content: render_tool_reference(request),
        });
    }

    if !skill_body.is_empty() {
        documents.push(WorkspaceDocument {
            file_name: API_REFERENCE_FILE,
            content: skill_body.to_string(),
        });
    }

    WorkspaceBundle { documents }
}
