use crate::client::{HttpRestClient, RestClient};
use crate::config::{SclConfig, SclRole};
use crate::context::SclContext;
use crate::core::{Flag, Operation, OperationResult, Permission, Resource, ResourceKind, Result};
use crate::handler::ResourceHandler;
use crate::notification::{NotificationSink, RestNotificationSink};
use crate::registration::{Registration, RegistrationWorker};
use crate::router::Router;
use crate::storage::{InMemoryStore, ResourceStore, SnapshotManager};
use std::sync::Arc;
use tracing::info;

/// Builder wiring the collaborators of an [`SclNode`].
///
/// Anything not supplied gets the production default: an in-memory store,
/// the HTTP client, and notifications pushed through that client.
pub struct SclBuilder {
    config: SclConfig,
    store: Option<Arc<dyn ResourceStore>>,
    client: Option<Arc<dyn RestClient>>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl SclBuilder {
    pub fn new(config: SclConfig) -> Self {
        Self {
            config,
            store: None,
            client: None,
            sink: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn ResourceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn client(mut self, client: Arc<dyn RestClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Restores the snapshot (when configured) and bootstraps the tree.
    pub async fn build(self) -> Result<SclNode> {
        let config = self.config;
        let store: Arc<dyn ResourceStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStore::new()),
        };
        let client: Arc<dyn RestClient> = match self.client {
            Some(client) => client,
            None => Arc::new(HttpRestClient::new(config.request_timeout)?),
        };
        let sink: Arc<dyn NotificationSink> = match self.sink {
            Some(sink) => sink,
            None => Arc::new(RestNotificationSink::new(
                client.clone(),
                config.admin_identity.clone(),
            )),
        };
        let snapshots = config.snapshot_path.as_ref().map(SnapshotManager::new);

        let node = SclNode {
            router: Router::new(SclContext::new(config, store, client, sink)),
            snapshots,
        };
        if let Some(snapshots) = &node.snapshots {
            let ctx = node.router.context();
            snapshots.restore(ctx.store.as_ref(), &ctx.lock).await?;
        }
        node.bootstrap().await?;
        Ok(node)
    }
}

/// One running SCL: its router plus lifecycle operations.
pub struct SclNode {
    router: Router,
    snapshots: Option<SnapshotManager>,
}

impl SclNode {
    pub fn builder(config: SclConfig) -> SclBuilder {
        SclBuilder::new(config)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &SclConfig {
        &self.router.context().config
    }

    pub async fn dispatch(&self, operation: Operation) -> OperationResult {
        self.router.dispatch(operation).await
    }

    /// Creates the sclBase, its collections and the default access right
    /// unless a previous run (or snapshot) already did.
    async fn bootstrap(&self) -> Result<()> {
        let ctx = self.router.context();
        let config = &ctx.config;
        let access_right = config.default_access_right();
        let handler = ResourceHandler::new(ctx);

        let base_uri = config.base_uri();
        if !ctx.store.exists(&base_uri).await? {
            let base = Resource::new(ResourceKind::SclBase, "", config.scl_id.clone())
                .with_access_right(Some(access_right.clone()))
                .with_default_search_strings();
            ctx.store.create(base.clone()).await?;
            handler.create_collections(&base).await?;
            info!(scl = %config.scl_id, "sclBase created");
        }

        if !ctx.store.exists(&access_right).await? {
            let admin = config.admin_identity.as_str();
            let guest = config.guest_identity.as_str();
            let default_right = Resource::new(
                ResourceKind::AccessRight,
                &format!("{}/accessRights", base_uri),
                "AR_ADMIN",
            )
            .with_access_right(Some(access_right.clone()))
            .with_default_search_strings()
            .with_attribute(
                "permissions",
                vec![
                    Permission::new("P_ADMIN", [admin], Flag::ALL),
                    Permission::new("P_GUEST", [guest], [Flag::Read, Flag::Discover]),
                ],
            )
            .with_attribute(
                "selfPermissions",
                vec![Permission::new("P_SELF", [admin], Flag::ALL)],
            );
            ctx.store.create(default_right.clone()).await?;
            handler.create_collections(&default_right).await?;
            info!(uri = %access_right, "default access right created");
        }
        Ok(())
    }

    /// Starts self-registration when this SCL is a GSCL.
    pub fn start_registration(&self) -> Result<Option<RegistrationWorker>> {
        if self.config().role != SclRole::Gscl {
            return Ok(None);
        }
        Ok(Some(Registration::new(self.router.clone())?.spawn()))
    }

    /// Writes the tree snapshot, when one is configured.
    pub async fn checkpoint(&self) -> Result<Option<usize>> {
        let Some(snapshots) = &self.snapshots else {
            return Ok(None);
        };
        let ctx = self.router.context();
        Ok(Some(snapshots.checkpoint(ctx.store.as_ref(), &ctx.lock).await?))
    }
}
