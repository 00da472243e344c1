// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer
//!
//! HTTP surface that translates requests into lifecycle service calls. No
//! business logic lives here; all real work is delegated to
//! `crate::application::lifecycle`.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Tenant container endpoints behind a bearer-token guard |

pub mod api;
