// Copyright (c) 2026 PicoClaw Contributors
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::runtime::{ContainerRuntime, RuntimeError};

pub const NETWORK_DRIVER: &str = "bridge";

/// Makes sure the shared tenant network exists. Safe to call concurrently:
/// losing a create race to another caller counts as success.
#[derive(Clone)]
pub struct NetworkEnsurer {
    runtime: Arc<dyn ContainerRuntime>,
}

impl NetworkEnsurer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub async fn ensure(&self, name: &str) -> Result<(), RuntimeError> {
        match self.runtime.inspect_network(name).await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }

        match self.runtime.create_network(name, NETWORK_DRIVER).await {
            Ok(()) => {
                info!("Created tenant network {}", name);
                Ok(())
            }
            Err(RuntimeError::Conflict(_)) => {
                debug!("Network {} created concurrently, re-checking", name);
                self.runtime.inspect_network(name).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::in_memory_runtime::{InMemoryRuntime, RuntimeCall};

    #[tokio::test]
    async fn test_creates_missing_network() {
        let runtime = Arc::new(InMemoryRuntime::new());
        NetworkEnsurer::new(runtime.clone()).ensure("picoclaw-net").await.unwrap();
        assert!(runtime.has_network("picoclaw-net").await);
    }

    #[tokio::test]
    async fn test_existing_network_is_left_alone() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.seed_network("picoclaw-net").await;
        NetworkEnsurer::new(runtime.clone()).ensure("picoclaw-net").await.unwrap();
        assert_eq!(
            runtime.calls().await,
            vec![RuntimeCall::InspectNetwork("picoclaw-net".to_string())]
        );
    }

    #[tokio::test]
    async fn test_lost_create_race_is_success() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.simulate_network_race().await;
        NetworkEnsurer::new(runtime.clone()).ensure("picoclaw-net").await.unwrap();
        assert!(runtime.has_network("picoclaw-net").await);
    }

    #[tokio::test]
    async fn test_unavailable_is_propagated() {
        let runtime = Arc::new(InMemoryRuntime::new());
        runtime.set_unavailable(true).await;
        let err = NetworkEnsurer::new(runtime).ensure("picoclaw-net").await.unwrap_err();
        assert!(matches!(err, RuntimeError::Unavailable(_)));
    }
}
