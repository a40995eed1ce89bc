use crate::core::{Resource, ResourceTree, Result};
use async_trait::async_trait;

/// Storage engine trait - URI-keyed document store behind the SCL.
///
/// Implementations must be safe under concurrent use; each call is atomic
/// per document.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Resource without its descendants.
    async fn lazy_find(&self, uri: &str) -> Result<Option<Resource>>;

    /// Direct children of `uri` in store order.
    async fn children(&self, uri: &str) -> Result<Vec<Resource>>;

    /// Insert a new document; CONFLICT when the uri is taken.
    async fn create(&self, resource: Resource) -> Result<()>;

    /// Replace an existing document; NOT_FOUND when absent.
    async fn update(&self, resource: Resource) -> Result<()>;

    /// Remove a document and every descendant; NOT_FOUND when absent.
    async fn delete(&self, uri: &str) -> Result<()>;

    /// Every document whose uri lies within `prefix` (empty = whole tree),
    /// in store order.
    async fn scan(&self, prefix: &str) -> Result<Vec<Resource>>;

    /// Resource with its direct children materialized.
    async fn find(&self, uri: &str) -> Result<Option<ResourceTree>> {
        let Some(resource) = self.lazy_find(uri).await? else {
            return Ok(None);
        };
        let children = self.children(uri).await?;
        Ok(Some(ResourceTree { resource, children }))
    }

    async fn exists(&self, uri: &str) -> Result<bool> {
        Ok(self.lazy_find(uri).await?.is_some())
    }
}
