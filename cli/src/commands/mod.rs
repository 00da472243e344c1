// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the manager CLI

pub mod config;
pub mod tenant;

pub use self::config::ConfigCommand;
pub use self::tenant::TenantCommand;
