use crate::context::SclLock;
use crate::core::{Resource, ResourceKind, Result};
use crate::storage::ResourceStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bounds a container places on its content instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceLimits {
    pub max_instances: i64,
    /// `None` when the container sets no byte budget
    pub max_byte_size: Option<i64>,
}

impl InstanceLimits {
    pub fn of(container: &Resource, default_instances: i64) -> Self {
        Self {
            max_instances: container
                .attr_i64("maxNrOfInstances")
                .unwrap_or(default_instances),
            max_byte_size: container.attr_i64("maxByteSize").filter(|max| *max >= 0),
        }
    }

    fn exceeded(&self, count: i64, bytes: i64) -> bool {
        count > self.max_instances || self.max_byte_size.is_some_and(|max| bytes > max)
    }
}

/// Content size recorded on an instance, falling back to its content length.
pub fn content_size(instance: &Resource) -> i64 {
    instance
        .attr_i64("contentSize")
        .or_else(|| instance.attr_str("content").map(|c| c.len() as i64))
        .unwrap_or(0)
}

/// Removes the oldest content instances of a container once it outgrows its
/// limits.
#[derive(Clone)]
pub struct EvictionPolicy {
    store: Arc<dyn ResourceStore>,
    lock: SclLock,
}

impl EvictionPolicy {
    pub fn new(store: Arc<dyn ResourceStore>, lock: SclLock) -> Self {
        Self { store, lock }
    }

    /// Whether a container with the given instance count and total size
    /// needs eviction.
    pub fn needs_eviction(limits: &InstanceLimits, count: i64, bytes: i64) -> bool {
        limits.exceeded(count, bytes)
    }

    /// Runs [`EvictionPolicy::enforce`] on a detached task.
    pub fn schedule(&self, instances_uri: String, limits: InstanceLimits) -> JoinHandle<()> {
        let policy = self.clone();
        tokio::spawn(async move {
            match policy.enforce(&instances_uri, limits).await {
                Ok(0) => {}
                Ok(evicted) => info!(uri = %instances_uri, evicted, "evicted content instances"),
                Err(err) => warn!(uri = %instances_uri, error = %err, "eviction failed"),
            }
        })
    }

    /// Deletes the oldest instances under `instances_uri` until the limits
    /// hold again. Returns the number of deleted instances.
    pub async fn enforce(&self, instances_uri: &str, limits: InstanceLimits) -> Result<usize> {
        let _guard = self.lock.read().await;

        let mut instances: Vec<Resource> = self
            .store
            .children(instances_uri)
            .await?
            .into_iter()
            .filter(|r| r.resource_type == ResourceKind::ContentInstance)
            .collect();
        let mut bytes: i64 = instances.iter().map(content_size).sum();

        let mut evicted = 0;
        while !instances.is_empty() && limits.exceeded(instances.len() as i64, bytes) {
            let oldest = instances.remove(0);
            match self.store.delete(&oldest.uri).await {
                Ok(()) => evicted += 1,
                // Already removed by a concurrent eviction
                Err(err) => debug!(uri = %oldest.uri, error = %err, "oldest instance gone"),
            }
            bytes -= content_size(&oldest);
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use tokio::sync::RwLock;

    const INSTANCES: &str = "/scl/containers/c1/contentInstances";

    async fn store_with_instances(contents: &[&str]) -> Arc<dyn ResourceStore> {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        for (i, content) in contents.iter().enumerate() {
            let instance =
                Resource::new(ResourceKind::ContentInstance, INSTANCES, format!("ci{}", i))
                    .with_attribute("content", *content)
                    .with_attribute("contentSize", content.len());
            store.create(instance).await.unwrap();
        }
        store
    }

    async fn remaining(store: &Arc<dyn ResourceStore>) -> Vec<String> {
        store
            .children(INSTANCES)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    #[tokio::test]
    async fn test_count_limit_removes_oldest() {
        let store = store_with_instances(&["a", "b", "c", "d"]).await;
        let policy = EvictionPolicy::new(store.clone(), Arc::new(RwLock::new(())));
        let limits = InstanceLimits {
            max_instances: 3,
            max_byte_size: None,
        };

        assert_eq!(policy.enforce(INSTANCES, limits).await.unwrap(), 1);
        assert_eq!(remaining(&store).await, vec!["ci1", "ci2", "ci3"]);
        assert_eq!(policy.enforce(INSTANCES, limits).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_byte_limit_removes_until_within_budget() {
        let store = store_with_instances(&["aaaa", "bbbb", "cc"]).await;
        let policy = EvictionPolicy::new(store.clone(), Arc::new(RwLock::new(())));
        let limits = InstanceLimits {
            max_instances: 10,
            max_byte_size: Some(6),
        };

        assert_eq!(policy.enforce(INSTANCES, limits).await.unwrap(), 1);
        assert_eq!(remaining(&store).await, vec!["ci1", "ci2"]);
    }

    #[test]
    fn test_limits_default_from_config() {
        let container = Resource::new(ResourceKind::Container, "/scl/containers", "c1")
            .with_attribute("maxByteSize", -1);
        let limits = InstanceLimits::of(&container, 10);
        assert_eq!(limits.max_instances, 10);
        assert_eq!(limits.max_byte_size, None);
        assert!(EvictionPolicy::needs_eviction(&limits, 11, 0));
        assert!(!EvictionPolicy::needs_eviction(&limits, 10, i64::MAX));
    }
}
