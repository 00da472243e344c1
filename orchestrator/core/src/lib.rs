// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! PicoClaw container manager core.
//!
//! Provisions one isolated agent container per tenant on a single Docker
//! host and keeps the host-side configuration and workspace in step with it.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, lifecycle orchestration, Docker adapter and HTTP surface

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
