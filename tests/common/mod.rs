#![allow(dead_code)]

use async_trait::async_trait;
use m2mscl::{
    LoopbackClient, Method, Notification, NotificationSink, Operation, OperationResult,
    SclConfig, SclError, SclNode,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const ADMIN: &str = "admin:admin";
pub const GUEST: &str = "guest:guest";

/// Sink forwarding every notification into a channel.
pub struct ChannelSink(pub mpsc::UnboundedSender<Notification>);

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn push(&self, notification: Notification) -> m2mscl::Result<()> {
        self.0
            .send(notification)
            .map_err(|err| SclError::Internal(err.to_string()))
    }
}

pub struct TestScl {
    pub node: SclNode,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

pub async fn scl_with(config: SclConfig, client: LoopbackClient) -> TestScl {
    let (tx, rx) = mpsc::unbounded_channel();
    let node = SclNode::builder(config)
        .client(Arc::new(client))
        .notification_sink(Arc::new(ChannelSink(tx)))
        .build()
        .await
        .expect("scl should bootstrap");
    TestScl {
        node,
        notifications: rx,
    }
}

pub async fn scl(id: &str) -> TestScl {
    scl_with(SclConfig::new(id), LoopbackClient::new()).await
}

pub fn op(method: Method, path: &str, identity: &str) -> Operation {
    Operation::new(method, path, identity)
}

pub fn create(path: &str, body: Value) -> Operation {
    op(Method::Create, path, ADMIN).with_representation(body.to_string())
}

pub fn retrieve(path: &str) -> Operation {
    op(Method::Retrieve, path, ADMIN)
}

pub fn update(path: &str, body: Value) -> Operation {
    op(Method::Update, path, ADMIN).with_representation(body.to_string())
}

pub fn delete(path: &str) -> Operation {
    op(Method::Delete, path, ADMIN)
}

pub fn json(result: &OperationResult) -> Value {
    let raw = result
        .representation
        .as_deref()
        .expect("result should carry a representation");
    serde_json::from_str(raw).expect("representation should be JSON")
}

/// Polls `check` until it holds or about two seconds have passed.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
