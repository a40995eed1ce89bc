//! Change notifications pushed to subscribers.

use crate::client::{RestClient, split_address};
use crate::core::{Method, Operation, Resource, ResourceKind, Result, SclError, StatusCode};
use crate::storage::ResourceStore;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// One push towards a subscription's contact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub subscription_reference: String,
    #[serde(skip)]
    pub contact: String,
    pub status_code: StatusCode,
    pub representation: Value,
}

/// Delivery callback for notifications. Best effort: no retry or queueing
/// happens at this layer.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn push(&self, notification: Notification) -> Result<()>;
}

/// Delivers notifications as outbound CREATE operations on the contact.
pub struct RestNotificationSink {
    client: Arc<dyn RestClient>,
    identity: String,
}

impl RestNotificationSink {
    pub fn new(client: Arc<dyn RestClient>, identity: impl Into<String>) -> Self {
        Self {
            client,
            identity: identity.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for RestNotificationSink {
    async fn push(&self, notification: Notification) -> Result<()> {
        let (base, path) = split_address(&notification.contact);
        let body = serde_json::to_string(&notification)
            .map_err(|err| SclError::Internal(err.to_string()))?;

        let mut operation =
            Operation::new(Method::Create, path, self.identity.clone()).with_representation(body);
        operation.base = base;

        let result = self.client.send(operation).await;
        if result.is_success() {
            Ok(())
        } else {
            Err(SclError::Remote(format!(
                "contact '{}' answered {}",
                notification.contact, result.status_code
            )))
        }
    }
}

/// Finds the subscriptions interested in a mutation and pushes to each on
/// its own task.
pub struct Notifier {
    store: Arc<dyn ResourceStore>,
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(store: Arc<dyn ResourceStore>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { store, sink }
    }

    /// A creation concerns the subscribers of the parent collection; an
    /// update or deletion the subscribers of the resource itself.
    fn subscriptions_uri(status: StatusCode, resource: &Resource) -> String {
        match status {
            StatusCode::Created => format!("{}/subscriptions", resource.parent_uri()),
            _ => format!("{}/subscriptions", resource.uri),
        }
    }

    /// Returns the number of pushes dispatched.
    pub async fn notify(&self, status: StatusCode, resource: &Resource) -> usize {
        let subscriptions_uri = Self::subscriptions_uri(status, resource);
        let subscriptions = match self.store.children(&subscriptions_uri).await {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                warn!(uri = %resource.uri, error = %err, "cannot load subscriptions");
                return 0;
            }
        };
        if subscriptions.is_empty() {
            return 0;
        }

        let representation = match resource.to_json() {
            Ok(representation) => representation,
            Err(err) => {
                warn!(uri = %resource.uri, error = %err, "cannot render notification");
                return 0;
            }
        };

        let now = Utc::now();
        let mut dispatched = 0;
        for subscription in subscriptions
            .iter()
            .filter(|s| s.resource_type == ResourceKind::Subscription && !s.is_expired(now))
        {
            let Some(contact) = subscription.attr_str("contact") else {
                continue;
            };
            let notification = Notification {
                subscription_reference: subscription.uri.clone(),
                contact: contact.to_string(),
                status_code: status,
                representation: representation.clone(),
            };

            let sink = self.sink.clone();
            tokio::spawn(async move {
                let contact = notification.contact.clone();
                if let Err(err) = sink.push(notification).await {
                    warn!(contact = %contact, error = %err, "notification not delivered");
                }
            });
            dispatched += 1;
        }

        debug!(uri = %resource.uri, %status, dispatched, "notifications dispatched");
        dispatched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use chrono::Duration;
    use tokio::sync::mpsc;

    struct ChannelSink(mpsc::UnboundedSender<Notification>);

    #[async_trait]
    impl NotificationSink for ChannelSink {
        async fn push(&self, notification: Notification) -> Result<()> {
            self.0
                .send(notification)
                .map_err(|err| SclError::Internal(err.to_string()))
        }
    }

    fn subscription(parent: &str, id: &str, contact: &str) -> Resource {
        Resource::new(ResourceKind::Subscription, parent, id).with_attribute("contact", contact)
    }

    #[tokio::test]
    async fn test_created_resources_notify_parent_subscribers() {
        let store = Arc::new(InMemoryStore::new());
        let subs = "/scl/containers/c1/contentInstances/subscriptions";
        store.create(subscription(subs, "s1", "http://a/notify")).await.unwrap();
        let mut expired = subscription(subs, "s2", "http://b/notify");
        expired.expiration_time = Some(Utc::now() - Duration::seconds(5));
        store.create(expired).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = Notifier::new(store, Arc::new(ChannelSink(tx)));

        let instance = Resource::new(
            ResourceKind::ContentInstance,
            "/scl/containers/c1/contentInstances",
            "ci1",
        );
        assert_eq!(notifier.notify(StatusCode::Created, &instance).await, 1);

        let pushed = rx.recv().await.unwrap();
        assert_eq!(pushed.contact, "http://a/notify");
        assert_eq!(pushed.subscription_reference, format!("{}/s1", subs));
        assert_eq!(pushed.representation["id"], "ci1");

        // updates go to the resource's own subscriptions, which do not exist
        assert_eq!(notifier.notify(StatusCode::Ok, &instance).await, 0);
    }
}
