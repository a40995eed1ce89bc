use super::ResourceStore;
use crate::core::resource::{is_within, parent_uri};
use crate::core::{Resource, Result, SclError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

struct StoredDocument {
    seq: u64,
    resource: Resource,
}

#[derive(Default)]
struct StoreState {
    next_seq: u64,
    documents: HashMap<String, StoredDocument>,
    /// Insertion order; iteration over this index is the store order.
    order: BTreeMap<u64, String>,
}

impl StoreState {
    fn ordered(&self) -> impl Iterator<Item = &Resource> {
        self.order
            .values()
            .filter_map(|uri| self.documents.get(uri))
            .map(|doc| &doc.resource)
    }
}

/// In-memory document store.
///
/// Documents iterate in creation order, which makes "oldest" and "latest"
/// well defined for content instances.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.state.read().await.documents.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn lazy_find(&self, uri: &str) -> Result<Option<Resource>> {
        let state = self.state.read().await;
        Ok(state.documents.get(uri).map(|doc| doc.resource.clone()))
    }

    async fn children(&self, uri: &str) -> Result<Vec<Resource>> {
        let state = self.state.read().await;
        Ok(state
            .ordered()
            .filter(|resource| parent_uri(&resource.uri) == uri)
            .cloned()
            .collect())
    }

    async fn create(&self, resource: Resource) -> Result<()> {
        let mut state = self.state.write().await;
        if state.documents.contains_key(&resource.uri) {
            return Err(SclError::conflict(format!(
                "resource '{}' already exists",
                resource.uri
            )));
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, resource.uri.clone());
        state
            .documents
            .insert(resource.uri.clone(), StoredDocument { seq, resource });
        Ok(())
    }

    async fn update(&self, resource: Resource) -> Result<()> {
        let mut state = self.state.write().await;
        let doc = state.documents.get_mut(&resource.uri).ok_or_else(|| {
            SclError::not_found(format!("resource '{}' not found", resource.uri))
        })?;
        doc.resource = resource;
        Ok(())
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.documents.contains_key(uri) {
            return Err(SclError::not_found(format!("resource '{}' not found", uri)));
        }

        let doomed: Vec<(u64, String)> = state
            .documents
            .iter()
            .filter(|(key, _)| is_within(key, uri))
            .map(|(key, doc)| (doc.seq, key.clone()))
            .collect();

        for (seq, key) in doomed {
            state.order.remove(&seq);
            state.documents.remove(&key);
        }
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<Resource>> {
        let state = self.state.read().await;
        Ok(state
            .ordered()
            .filter(|resource| is_within(&resource.uri, prefix))
            .cloned()
            .collect())
    }
}
