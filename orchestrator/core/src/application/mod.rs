// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod lifecycle;
pub mod network;
pub mod tenant_locks;
pub mod workspace_materializer;

pub use lifecycle::{
    CreateOutcome, CreateStatus, DeleteOutcome, DeleteStatus, LifecycleError, LifecycleSettings,
    TenantHealth, TenantLifecycleService, TenantLogs, TenantSummary,
};
