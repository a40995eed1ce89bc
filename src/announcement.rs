//! Announcement of local resources to peer SCLs.
//!
//! An announced resource gets a lightweight shadow (`…Annc`) on every target
//! SCL, linking back to the original. Remote failures are logged and never
//! fail the local mutation.

use crate::client::RestClient;
use crate::core::{
    AnnounceTo, AnnouncedShadow, Method, Operation, Resource, ResourceKind, Result, SclError,
    StatusCode, child_uri,
};
use crate::storage::ResourceStore;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Registered peer SCL, as mirrored under `/{base}/scls/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub id: String,
    /// Path of the peer's sclBase
    pub link: String,
    /// Base address used to reach the peer
    pub poc: String,
}

pub struct Announcer {
    store: Arc<dyn ResourceStore>,
    client: Arc<dyn RestClient>,
    scl_id: String,
    identity: String,
}

impl Announcer {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        client: Arc<dyn RestClient>,
        scl_id: &str,
        identity: &str,
    ) -> Self {
        Self {
            store,
            client,
            scl_id: scl_id.to_string(),
            identity: identity.to_string(),
        }
    }

    fn scls_uri(&self) -> String {
        format!("/{}/scls", self.scl_id)
    }

    async fn peer(&self, id: &str) -> Result<Peer> {
        let scl = self
            .store
            .lazy_find(&child_uri(&self.scls_uri(), id))
            .await?
            .filter(|r| r.resource_type == ResourceKind::Scl)
            .ok_or_else(|| SclError::not_found(format!("scl '{}' is not registered", id)))?;

        let link = scl
            .attr_str("link")
            .ok_or_else(|| SclError::Internal(format!("scl '{}' has no link", id)))?
            .to_string();
        let pocs: Vec<String> = scl.attribute("pocs")?.unwrap_or_default();
        let poc = pocs
            .into_iter()
            .next()
            .ok_or_else(|| SclError::Internal(format!("scl '{}' has no point of contact", id)))?;

        Ok(Peer {
            id: id.to_string(),
            link,
            poc,
        })
    }

    /// Target SCL ids: the explicit list, or every registered SCL for a
    /// global announcement with an empty list.
    async fn targets(&self, announce_to: &AnnounceTo) -> Result<Vec<String>> {
        if !announce_to.activated {
            return Ok(Vec::new());
        }
        if announce_to.global && announce_to.scl_list.is_empty() {
            let scls = self.store.children(&self.scls_uri()).await?;
            return Ok(scls
                .into_iter()
                .filter(|r| r.resource_type == ResourceKind::Scl)
                .map(|r| r.id)
                .collect());
        }
        let mut seen = HashSet::new();
        Ok(announce_to
            .scl_list
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect())
    }

    /// Remote collection receiving the shadow: the peer's mirror of this SCL
    /// followed by the resource's parent path relative to the local base.
    fn remote_parent(&self, peer: &Peer, resource: &Resource) -> String {
        let base = format!("/{}", self.scl_id);
        let relative = resource.parent_uri().strip_prefix(&base).unwrap_or("");
        format!(
            "{}/scls/{}{}",
            peer.link.trim_end_matches('/'),
            self.scl_id,
            relative
        )
    }

    async fn announce_to_peer(&self, peer: &Peer, resource: &Resource) -> Result<AnnouncedShadow> {
        let remote_parent = self.remote_parent(peer, resource);
        let mut body = json!({
            "id": resource.id,
            "link": resource.uri,
            "searchStrings": resource.search_strings,
        });
        if let Some(expiration) = resource.expiration_time {
            body["expirationTime"] = json!(expiration);
        }

        let operation = Operation::new(Method::Create, remote_parent.clone(), self.identity.clone())
            .with_representation(body.to_string())
            .with_base(peer.poc.clone());
        let result = self.client.send(operation).await;

        match result.status_code {
            StatusCode::Created => Ok(AnnouncedShadow {
                scl: peer.id.clone(),
                uri: result
                    .resource_uri
                    .unwrap_or_else(|| child_uri(&remote_parent, &resource.id)),
            }),
            StatusCode::Conflict => {
                let uri = child_uri(&remote_parent, &resource.id);
                self.existing_shadow(peer, &uri, resource).await?;
                Ok(AnnouncedShadow {
                    scl: peer.id.clone(),
                    uri,
                })
            }
            status => Err(SclError::Remote(format!(
                "announcing '{}' to '{}' answered {}",
                resource.uri, peer.id, status
            ))),
        }
    }

    /// A conflicting id on the peer counts as announced only when it is a
    /// shadow linking back to `resource`.
    async fn existing_shadow(&self, peer: &Peer, uri: &str, resource: &Resource) -> Result<()> {
        let operation = Operation::new(Method::Retrieve, uri, self.identity.clone())
            .with_base(peer.poc.clone());
        let result = self.client.send(operation).await;
        let existing: Option<Value> = match result.status_code {
            StatusCode::Ok => result
                .representation
                .as_deref()
                .and_then(|body| serde_json::from_str(body).ok()),
            _ => None,
        };
        let is_shadow = existing.is_some_and(|existing| {
            existing["resourceType"]
                .as_str()
                .is_some_and(|kind| kind.ends_with("Annc"))
                && existing["link"].as_str() == Some(resource.uri.as_str())
        });
        if is_shadow {
            Ok(())
        } else {
            Err(SclError::conflict(format!(
                "'{}' on '{}' is not a shadow of '{}'",
                uri, peer.id, resource.uri
            )))
        }
    }

    async fn remove_shadow(&self, shadow: &AnnouncedShadow) -> Result<()> {
        let peer = self.peer(&shadow.scl).await?;
        let operation = Operation::new(Method::Delete, shadow.uri.clone(), self.identity.clone())
            .with_base(peer.poc);
        let result = self.client.send(operation).await;
        match result.status_code {
            StatusCode::Ok | StatusCode::Deleted | StatusCode::NotFound => Ok(()),
            status => Err(SclError::Remote(format!(
                "removing shadow '{}' from '{}' answered {}",
                shadow.uri, shadow.scl, status
            ))),
        }
    }

    /// Brings the shadows of `resource` in line with its `announceTo`:
    /// announces to new targets, withdraws from dropped ones, and records
    /// the result in `announceTo.announced`.
    pub async fn reconcile(&self, resource: &mut Resource) {
        if !resource.resource_type.is_announceable() {
            return;
        }
        let Some(mut announce_to) = resource.announce_to.take() else {
            return;
        };

        let targets = match self.targets(&announce_to).await {
            Ok(targets) => targets,
            Err(err) => {
                warn!(uri = %resource.uri, error = %err, "cannot resolve announcement targets");
                resource.announce_to = Some(announce_to);
                return;
            }
        };

        let mut kept = Vec::with_capacity(announce_to.announced.len());
        for shadow in std::mem::take(&mut announce_to.announced) {
            if targets.contains(&shadow.scl) {
                kept.push(shadow);
            } else if let Err(err) = self.remove_shadow(&shadow).await {
                warn!(uri = %resource.uri, scl = %shadow.scl, error = %err, "de-announcement failed");
            } else {
                info!(uri = %resource.uri, scl = %shadow.scl, "de-announced");
            }
        }

        for target in &targets {
            if kept.iter().any(|shadow| &shadow.scl == target) {
                continue;
            }
            let outcome = match self.peer(target).await {
                Ok(peer) => self.announce_to_peer(&peer, resource).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(shadow) => {
                    info!(uri = %resource.uri, scl = %target, shadow = %shadow.uri, "announced");
                    kept.push(shadow);
                }
                Err(err) => warn!(uri = %resource.uri, scl = %target, error = %err, "announcement failed"),
            }
        }

        announce_to.announced = kept;
        resource.announce_to = Some(announce_to);
    }

    /// Deletes every recorded shadow of `resource`.
    pub async fn deannounce(&self, resource: &Resource) {
        let Some(announce_to) = resource.announce_to.as_ref() else {
            return;
        };
        for shadow in &announce_to.announced {
            match self.remove_shadow(shadow).await {
                Ok(()) => debug!(uri = %resource.uri, shadow = %shadow.uri, "shadow removed"),
                Err(err) => {
                    warn!(uri = %resource.uri, scl = %shadow.scl, error = %err, "de-announcement failed")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OperationResult;
    use crate::storage::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingClient {
        sent: Mutex<Vec<Operation>>,
    }

    #[async_trait]
    impl RestClient for RecordingClient {
        async fn send(&self, operation: Operation) -> OperationResult {
            let result = match operation.method {
                Method::Create => OperationResult::created(
                    "{}",
                    format!("{}/{}", operation.target_path, "shadow"),
                ),
                _ => OperationResult::new(StatusCode::Ok, None),
            };
            self.sent.lock().unwrap().push(operation);
            result
        }
    }

    /// Peer whose CREATE always collides with `existing`.
    struct ConflictingClient {
        existing: Value,
        sent: Mutex<Vec<Operation>>,
    }

    #[async_trait]
    impl RestClient for ConflictingClient {
        async fn send(&self, operation: Operation) -> OperationResult {
            let result = match operation.method {
                Method::Create => OperationResult::error(StatusCode::Conflict, "already exists"),
                _ => OperationResult::ok(self.existing.to_string()),
            };
            self.sent.lock().unwrap().push(operation);
            result
        }
    }

    async fn announcer_with(client: Arc<dyn RestClient>) -> Announcer {
        let store: Arc<dyn ResourceStore> = Arc::new(InMemoryStore::new());
        let nscl = Resource::new(ResourceKind::Scl, "/gscl/scls", "nscl")
            .with_attribute("link", "/nscl")
            .with_attribute("pocs", vec!["http://nscl:8080"]);
        store.create(nscl).await.unwrap();
        Announcer::new(store, client, "gscl", "admin:admin")
    }

    async fn setup() -> (Announcer, Arc<RecordingClient>) {
        let client = Arc::new(RecordingClient::default());
        let announcer = announcer_with(client.clone()).await;
        (announcer, client)
    }

    async fn conflicting(existing: Value) -> (Announcer, Arc<ConflictingClient>) {
        let client = Arc::new(ConflictingClient {
            existing,
            sent: Mutex::new(Vec::new()),
        });
        let announcer = announcer_with(client.clone()).await;
        (announcer, client)
    }

    fn application(announce_to: AnnounceTo) -> Resource {
        let mut app = Resource::new(ResourceKind::Application, "/gscl/applications", "app1")
            .with_default_search_strings();
        app.announce_to = Some(announce_to);
        app
    }

    #[tokio::test]
    async fn test_announce_then_withdraw() {
        let (announcer, client) = setup().await;
        let mut app = application(AnnounceTo {
            activated: true,
            scl_list: vec!["nscl".into()],
            ..AnnounceTo::default()
        });

        announcer.reconcile(&mut app).await;
        {
            let sent = client.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].target_path, "/nscl/scls/gscl/applications");
            assert_eq!(sent[0].base.as_deref(), Some("http://nscl:8080"));
            let body: serde_json::Value =
                serde_json::from_str(sent[0].representation.as_deref().unwrap()).unwrap();
            assert_eq!(body["link"], "/gscl/applications/app1");
            assert!(body.get("accessRightID").is_none());
        }
        let announced = &app.announce_to.as_ref().unwrap().announced;
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].scl, "nscl");

        // Reconciling again does not re-announce
        announcer.reconcile(&mut app).await;
        assert_eq!(client.sent.lock().unwrap().len(), 1);

        app.announce_to.as_mut().unwrap().activated = false;
        announcer.reconcile(&mut app).await;
        let sent = client.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].method, Method::Delete);
        assert!(app.announce_to.as_ref().unwrap().announced.is_empty());
    }

    #[tokio::test]
    async fn test_global_announcement_targets_every_registered_scl() {
        let (announcer, client) = setup().await;
        let mut app = application(AnnounceTo {
            activated: true,
            global: true,
            ..AnnounceTo::default()
        });
        announcer.reconcile(&mut app).await;
        assert_eq!(client.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_target_is_skipped() {
        let (announcer, client) = setup().await;
        let mut app = application(AnnounceTo {
            activated: true,
            scl_list: vec!["ghost".into()],
            ..AnnounceTo::default()
        });
        announcer.reconcile(&mut app).await;
        assert!(client.sent.lock().unwrap().is_empty());
        assert!(app.announce_to.unwrap().announced.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_targets_are_announced_once() {
        let (announcer, client) = setup().await;
        let mut app = application(AnnounceTo {
            activated: true,
            scl_list: vec!["nscl".into(), "ghost".into(), "nscl".into()],
            ..AnnounceTo::default()
        });
        announcer.reconcile(&mut app).await;
        assert_eq!(client.sent.lock().unwrap().len(), 1);
        assert_eq!(app.announce_to.unwrap().announced.len(), 1);
    }

    #[tokio::test]
    async fn test_conflict_with_existing_shadow_counts_as_announced() {
        let (announcer, client) = conflicting(serde_json::json!({
            "resourceType": "ApplicationAnnc",
            "link": "/gscl/applications/app1",
        }))
        .await;
        let mut app = application(AnnounceTo {
            activated: true,
            scl_list: vec!["nscl".into()],
            ..AnnounceTo::default()
        });
        announcer.reconcile(&mut app).await;

        let sent = client.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].method, Method::Retrieve);
        assert_eq!(sent[1].target_path, "/nscl/scls/gscl/applications/app1");
        let announced = &app.announce_to.as_ref().unwrap().announced;
        assert_eq!(announced.len(), 1);
        assert_eq!(announced[0].uri, "/nscl/scls/gscl/applications/app1");
    }

    #[tokio::test]
    async fn test_conflict_with_foreign_resource_records_nothing() {
        // The origin's own resource, reached back through a redirection.
        let (announcer, _) = conflicting(serde_json::json!({
            "resourceType": "Application",
            "uri": "/gscl/applications/app1",
        }))
        .await;
        let mut app = application(AnnounceTo {
            activated: true,
            scl_list: vec!["nscl".into()],
            ..AnnounceTo::default()
        });
        announcer.reconcile(&mut app).await;
        assert!(app.announce_to.as_ref().unwrap().announced.is_empty());

        let (announcer, _) = conflicting(serde_json::json!({
            "resourceType": "ApplicationAnnc",
            "link": "/elsewhere/applications/app1",
        }))
        .await;
        announcer.reconcile(&mut app).await;
        assert!(app.announce_to.unwrap().announced.is_empty());
    }
}
