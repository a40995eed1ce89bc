use super::RestClient;
use crate::core::{Operation, OperationResult, Result, SclError, StatusCode};
use crate::router::Router;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An in-process [`RestClient`] delivering operations straight to peer
/// routers registered under their base address.
///
/// Simulates network transmission between SCLs living in one process
/// (tests, single-binary demos).
#[derive(Clone, Default)]
pub struct LoopbackClient {
    peers: Arc<RwLock<HashMap<String, Router>>>,
}

impl LoopbackClient {
    /// Creates a new, empty client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a peer SCL, enabling it to receive operations sent to `base`.
    pub async fn register_peer(&self, base: impl Into<String>, router: Router) -> Result<()> {
        let base = base.into();
        if base.trim().is_empty() {
            return Err(SclError::bad_request("peer base address must not be empty"));
        }
        self.peers.write().await.insert(base, router);
        Ok(())
    }

    /// Removes a peer; later sends to it answer SERVICE_UNAVAILABLE.
    pub async fn unregister_peer(&self, base: &str) -> bool {
        self.peers.write().await.remove(base).is_some()
    }

    async fn peer(&self, base: &str) -> Option<Router> {
        self.peers.read().await.get(base).cloned()
    }
}

#[async_trait]
impl RestClient for LoopbackClient {
    async fn send(&self, mut operation: Operation) -> OperationResult {
        let Some(base) = operation.base.take() else {
            return OperationResult::error(
                StatusCode::ServiceUnavailable,
                format!("no base address for '{}'", operation.target_path),
            );
        };
        match self.peer(&base).await {
            Some(router) => router.dispatch(operation).await,
            None => OperationResult::error(
                StatusCode::ServiceUnavailable,
                format!("peer '{}' is not reachable", base),
            ),
        }
    }
}
