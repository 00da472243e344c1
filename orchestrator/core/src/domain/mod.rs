// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Domain model: tenant identity, the runtime port, and the documents
//! rendered for each tenant container.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and rendering, no I/O besides config loading

pub mod tenant;
pub mod runtime;
pub mod gateway_config;
pub mod workspace;
pub mod manager_config;
