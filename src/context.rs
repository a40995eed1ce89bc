use crate::announcement::Announcer;
use crate::auth::AccessControl;
use crate::client::RestClient;
use crate::config::SclConfig;
use crate::eviction::EvictionPolicy;
use crate::notification::{NotificationSink, Notifier};
use crate::storage::ResourceStore;
use crate::validation::RepresentationValidator;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Process-wide lock guarding deferred writes against bulk store mutations
/// (snapshot dump/restore take the write side).
pub type SclLock = Arc<RwLock<()>>;

/// Collaborators shared by every handler of one SCL.
///
/// Built once and handed to the router; nothing here is global, so several
/// SCLs can live in one process.
pub struct SclContext {
    pub config: SclConfig,
    pub store: Arc<dyn ResourceStore>,
    pub client: Arc<dyn RestClient>,
    pub access: AccessControl,
    pub validator: RepresentationValidator,
    pub notifier: Notifier,
    pub announcer: Announcer,
    pub eviction: EvictionPolicy,
    pub lock: SclLock,
}

impl SclContext {
    pub fn new(
        config: SclConfig,
        store: Arc<dyn ResourceStore>,
        client: Arc<dyn RestClient>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let lock: SclLock = Arc::new(RwLock::new(()));
        Self {
            access: AccessControl::new(store.clone()),
            validator: RepresentationValidator::new(),
            notifier: Notifier::new(store.clone(), sink),
            announcer: Announcer::new(
                store.clone(),
                client.clone(),
                &config.scl_id,
                &config.admin_identity,
            ),
            eviction: EvictionPolicy::new(store.clone(), lock.clone()),
            config,
            store,
            client,
            lock,
        }
    }

    pub fn base_uri(&self) -> String {
        self.config.base_uri()
    }
}
