// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

pub mod runtime;
pub mod in_memory_runtime;

pub use in_memory_runtime::{InMemoryRuntime, RuntimeCall};
pub use runtime::DockerRuntime;
