//! Tag and prefix search over the resource tree.

use crate::core::{Operation, Result, SclError, is_within};
use crate::storage::ResourceStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Parsed discovery parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryQuery {
    /// Uri prefix to search below; empty searches the whole tree
    pub search_prefix: String,
    /// Negative or absent means unbounded
    pub max_size: Option<i64>,
    pub search_strings: Vec<String>,
}

impl DiscoveryQuery {
    pub fn new(search_prefix: &str, max_size: Option<i64>, search_strings: &[&str]) -> Self {
        Self {
            search_prefix: search_prefix.trim_end_matches('/').to_string(),
            max_size,
            search_strings: search_strings.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Reads `searchPrefix`, `maxSize` and the repeatable `searchString`
    /// parameters of an operation.
    pub fn from_operation(operation: &Operation) -> Result<Self> {
        let max_size = match operation.parameter("maxSize") {
            Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
                SclError::bad_request(format!("maxSize must be an integer, got '{}'", raw))
            })?),
            None => None,
        };
        Ok(Self {
            search_prefix: operation
                .parameter("searchPrefix")
                .unwrap_or("")
                .trim_end_matches('/')
                .to_string(),
            max_size,
            search_strings: operation.parameter_values("searchString").to_vec(),
        })
    }

    fn limit(&self) -> Option<usize> {
        self.max_size
            .filter(|max| *max >= 0)
            .map(|max| max as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResult {
    pub uris: Vec<String>,
    pub match_size: usize,
    pub truncated: bool,
}

pub struct DiscoveryEngine {
    store: Arc<dyn ResourceStore>,
}

impl DiscoveryEngine {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    pub async fn discover(&self, query: &DiscoveryQuery) -> Result<DiscoveryResult> {
        let wanted: BTreeSet<String> = query
            .search_strings
            .iter()
            .map(|tag| tag.to_lowercase())
            .collect();
        let limit = query.limit();

        let mut uris = Vec::new();
        let mut truncated = false;
        for resource in self.store.scan(&query.search_prefix).await? {
            if !is_within(&resource.uri, &query.search_prefix) {
                continue;
            }
            if !wanted.is_empty() {
                let tags: BTreeSet<String> = resource
                    .search_strings
                    .iter()
                    .map(|tag| tag.to_lowercase())
                    .collect();
                if !wanted.is_subset(&tags) {
                    continue;
                }
            }
            if limit.is_some_and(|max| uris.len() >= max) {
                truncated = true;
                break;
            }
            uris.push(resource.uri);
        }

        Ok(DiscoveryResult {
            match_size: uris.len(),
            uris,
            truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Method, Resource, ResourceKind};
    use crate::storage::InMemoryStore;

    async fn tree() -> Arc<dyn ResourceStore> {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        let resources = [
            Resource::new(ResourceKind::Container, "/scl1/containers", "temp"),
            Resource::new(ResourceKind::Application, "/scl1/applications", "app"),
            Resource::new(ResourceKind::Container, "/scl1/applications/app/containers", "hum"),
            Resource::new(ResourceKind::Container, "/scl10/containers", "other"),
            Resource::new(ResourceKind::Group, "/scl1/groups", "g"),
        ];
        for resource in resources {
            store
                .create(resource.with_default_search_strings())
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_search_strings_match_case_insensitively_below_prefix() {
        let engine = DiscoveryEngine::new(tree().await);
        let result = engine
            .discover(&DiscoveryQuery::new("/scl1", Some(-1), &["type:Container"]))
            .await
            .unwrap();

        assert_eq!(
            result.uris,
            vec!["/scl1/containers/temp", "/scl1/applications/app/containers/hum"]
        );
        assert_eq!(result.match_size, 2);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn test_max_size_truncates() {
        let engine = DiscoveryEngine::new(tree().await);
        let result = engine
            .discover(&DiscoveryQuery::new("", Some(2), &[]))
            .await
            .unwrap();

        assert_eq!(result.uris.len(), 2);
        assert_eq!(result.match_size, 2);
        assert!(result.truncated);

        let exact = engine
            .discover(&DiscoveryQuery::new("", Some(5), &[]))
            .await
            .unwrap();
        assert_eq!(exact.uris.len(), 5);
        assert!(!exact.truncated);
    }

    #[tokio::test]
    async fn test_all_tags_must_match() {
        let engine = DiscoveryEngine::new(tree().await);
        let result = engine
            .discover(&DiscoveryQuery::new("/scl1/", None, &["TYPE:container", "id:hum"]))
            .await
            .unwrap();
        assert_eq!(result.uris, vec!["/scl1/applications/app/containers/hum"]);
    }

    #[test]
    fn test_query_from_operation() {
        let op = Operation::new(Method::Retrieve, "/scl1/discovery", "admin:admin")
            .with_parameter("searchPrefix", "/scl1/containers/")
            .with_parameter("maxSize", "3")
            .with_parameter("searchString", "a")
            .with_parameter("searchString", "b");
        let query = DiscoveryQuery::from_operation(&op).unwrap();
        assert_eq!(query.search_prefix, "/scl1/containers");
        assert_eq!(query.max_size, Some(3));
        assert_eq!(query.search_strings, vec!["a", "b"]);

        let bad = Operation::new(Method::Retrieve, "/scl1/discovery", "admin:admin")
            .with_parameter("maxSize", "ten");
        assert!(DiscoveryQuery::from_operation(&bad).is_err());
    }
}
