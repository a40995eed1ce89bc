mod common;

use async_trait::async_trait;
use common::*;
use m2mscl::registration::Registration;
use m2mscl::{
    LoopbackClient, Method, Operation, OperationResult, RestClient, SclConfig, SclNode, StatusCode,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Parent stand-in answering registrations from a script of statuses.
struct ScriptedParent {
    script: Mutex<Vec<StatusCode>>,
    received: Mutex<Vec<Operation>>,
}

impl ScriptedParent {
    fn new(script: &[StatusCode]) -> Self {
        Self {
            script: Mutex::new(script.iter().rev().copied().collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    fn received(&self) -> Vec<Operation> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl RestClient for ScriptedParent {
    async fn send(&self, operation: Operation) -> OperationResult {
        self.received.lock().unwrap().push(operation);
        let status = self
            .script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or(StatusCode::Created);
        OperationResult::new(status, None)
    }
}

#[tokio::test]
async fn test_registration_retries_until_created() {
    let parent = Arc::new(ScriptedParent::new(&[
        StatusCode::ServiceUnavailable,
        StatusCode::Created,
    ]));
    let config = SclConfig::new("gscl")
        .parent("nscl", "http://nscl.example")
        .poc("http://gscl.example")
        .registration_retry(Duration::from_millis(10));
    let node = SclNode::builder(config)
        .client(parent.clone())
        .build()
        .await
        .unwrap();

    let attempts = Registration::new(node.router().clone()).unwrap().run().await;
    assert_eq!(attempts, 2);

    let received = parent.received();
    assert_eq!(received.len(), 2);
    let registration = &received[0];
    assert_eq!(registration.method, Method::Create);
    assert_eq!(registration.target_path, "/nscl/scls");
    assert_eq!(registration.base.as_deref(), Some("http://nscl.example"));
    let body: Value = serde_json::from_str(registration.representation.as_deref().unwrap()).unwrap();
    assert_eq!(
        body,
        json!({"id": "gscl", "link": "/gscl", "pocs": ["http://gscl.example"]})
    );

    let mirror = node.dispatch(retrieve("/gscl/scls/nscl")).await;
    assert_eq!(mirror.status_code, StatusCode::Ok);
    assert_eq!(json(&mirror)["pocs"], json!(["http://nscl.example"]));
}

#[tokio::test]
async fn test_registration_accepts_existing_registration() {
    let parent = Arc::new(ScriptedParent::new(&[StatusCode::Conflict]));
    let config = SclConfig::new("gscl").parent("nscl", "http://nscl.example");
    let node = SclNode::builder(config)
        .client(parent.clone())
        .build()
        .await
        .unwrap();

    let worker = node.start_registration().unwrap().expect("gscl registers");
    worker.join().await.unwrap();
    assert_eq!(parent.received().len(), 1);
}

#[tokio::test]
async fn test_registration_needs_a_parent() {
    let scl = scl("nscl").await;
    assert!(Registration::new(scl.node.router().clone()).is_err());
    assert!(scl.node.start_registration().unwrap().is_none());
}

struct Pair {
    nscl: TestScl,
    gscl: TestScl,
}

async fn registered_pair() -> Pair {
    let client = LoopbackClient::new();
    let nscl = scl_with(SclConfig::new("nscl").poc("loop://nscl"), client.clone()).await;
    let gscl = scl_with(
        SclConfig::new("gscl")
            .parent("nscl", "loop://nscl")
            .poc("loop://gscl")
            .registration_retry(Duration::from_millis(10)),
        client.clone(),
    )
    .await;
    client
        .register_peer("loop://nscl", nscl.node.router().clone())
        .await
        .unwrap();
    client
        .register_peer("loop://gscl", gscl.node.router().clone())
        .await
        .unwrap();

    let attempts = Registration::new(gscl.node.router().clone())
        .unwrap()
        .run()
        .await;
    assert_eq!(attempts, 1);
    Pair { nscl, gscl }
}

#[tokio::test]
async fn test_registration_links_both_scls() {
    let pair = registered_pair().await;

    let registered = pair.nscl.node.dispatch(retrieve("/nscl/scls/gscl")).await;
    assert_eq!(registered.status_code, StatusCode::Ok);
    let body = json(&registered);
    assert_eq!(body["link"], "/gscl");
    assert_eq!(body["pocs"], json!(["loop://gscl"]));

    let mirror = pair.gscl.node.dispatch(retrieve("/gscl/scls/nscl")).await;
    assert_eq!(json(&mirror)["link"], "/nscl");
}

#[tokio::test]
async fn test_operations_below_remote_scl_are_redirected() {
    let pair = registered_pair().await;
    pair.gscl
        .node
        .dispatch(create("/gscl/containers", json!({"id": "meter"})))
        .await;
    pair.gscl
        .node
        .dispatch(create(
            "/gscl/containers/meter/contentInstances",
            json!({"content": "1234"}),
        ))
        .await;

    let remote = pair
        .nscl
        .node
        .dispatch(retrieve("/nscl/scls/gscl/containers/meter"))
        .await;
    assert_eq!(remote.status_code, StatusCode::Ok);
    assert_eq!(json(&remote)["uri"], "/gscl/containers/meter");

    let content = pair
        .nscl
        .node
        .dispatch(retrieve(
            "/nscl/scls/gscl/containers/meter/contentInstances/latest/content",
        ))
        .await;
    assert_eq!(content.representation.as_deref(), Some("1234"));

    let created = pair
        .nscl
        .node
        .dispatch(create(
            "/nscl/scls/gscl/containers/meter/contentInstances",
            json!({"id": "fromNscl", "content": "9"}),
        ))
        .await;
    assert_eq!(created.status_code, StatusCode::Created);
    let local = pair
        .gscl
        .node
        .dispatch(retrieve("/gscl/containers/meter/contentInstances/fromNscl"))
        .await;
    assert_eq!(local.status_code, StatusCode::Ok);

    let missing = pair
        .nscl
        .node
        .dispatch(retrieve("/nscl/scls/gscl/containers/absent"))
        .await;
    assert_eq!(missing.status_code, StatusCode::NotFound);
}

#[tokio::test]
async fn test_announced_resources_are_mirrored_and_withdrawn() {
    let pair = registered_pair().await;

    let created = pair
        .gscl
        .node
        .dispatch(create(
            "/gscl/applications",
            json!({
                "id": "app1",
                "searchStrings": ["Room/Kitchen"],
                "announceTo": {"activated": true, "sclList": ["nscl"]}
            }),
        ))
        .await;
    assert_eq!(created.status_code, StatusCode::Created);
    let announced = json(&created)["announceTo"]["announced"].clone();
    assert_eq!(announced[0]["scl"], "nscl");
    assert_eq!(announced[0]["uri"], "/nscl/scls/gscl/applications/app1");

    let shadow = pair
        .nscl
        .node
        .dispatch(retrieve("/nscl/scls/gscl/applications/app1"))
        .await;
    assert_eq!(shadow.status_code, StatusCode::Ok);
    let body = json(&shadow);
    assert_eq!(body["resourceType"], "ApplicationAnnc");
    assert_eq!(body["link"], "/gscl/applications/app1");
    assert_eq!(body["searchStrings"], json!(["room/kitchen"]));

    let discovered = pair
        .nscl
        .node
        .dispatch(
            op(Method::Retrieve, "/nscl/discovery", GUEST)
                .with_parameter("searchString", "room/kitchen"),
        )
        .await;
    assert_eq!(
        json(&discovered)["uris"],
        json!(["/nscl/scls/gscl/applications/app1"])
    );

    let deleted = pair.gscl.node.dispatch(delete("/gscl/applications/app1")).await;
    assert_eq!(deleted.status_code, StatusCode::Ok);
    let gone = pair
        .nscl
        .node
        .dispatch(retrieve("/nscl/scls/gscl/applications/app1"))
        .await;
    assert_eq!(gone.status_code, StatusCode::NotFound);
}

#[tokio::test]
async fn test_deactivating_announcement_withdraws_shadow() {
    let pair = registered_pair().await;
    pair.gscl
        .node
        .dispatch(create(
            "/gscl/containers",
            json!({"id": "c1", "announceTo": {"activated": true, "sclList": ["nscl"]}}),
        ))
        .await;
    let shadow = "/nscl/scls/gscl/containers/c1";
    assert_eq!(
        pair.nscl.node.dispatch(retrieve(shadow)).await.status_code,
        StatusCode::Ok
    );

    let updated = pair
        .gscl
        .node
        .dispatch(update(
            "/gscl/containers/c1",
            json!({"announceTo": {"activated": false, "sclList": []}}),
        ))
        .await;
    assert_eq!(updated.status_code, StatusCode::Ok);
    assert!(json(&updated)["announceTo"].get("announced").is_none());

    // Shadow gone, so the path now redirects to the (announcement-free) origin.
    let after = pair.nscl.node.dispatch(retrieve(shadow)).await;
    assert_eq!(json(&after)["uri"], "/gscl/containers/c1");
}

#[tokio::test]
async fn test_unreachable_peer_is_reported() {
    let scl = scl("nscl").await;
    scl.node
        .dispatch(create(
            "/nscl/scls",
            json!({"id": "offline", "link": "/offline", "pocs": ["loop://offline"]}),
        ))
        .await;

    let result = scl
        .node
        .dispatch(retrieve("/nscl/scls/offline/containers/c1"))
        .await;
    assert_eq!(result.status_code, StatusCode::ServiceUnavailable);
}

#[tokio::test]
async fn test_child_of_unannounced_parent_is_not_announced() {
    let pair = registered_pair().await;
    pair.gscl
        .node
        .dispatch(create("/gscl/applications", json!({"id": "app1"})))
        .await;

    let created = pair
        .gscl
        .node
        .dispatch(create(
            "/gscl/applications/app1/containers",
            json!({"id": "c1", "announceTo": {"activated": true, "sclList": ["nscl"]}}),
        ))
        .await;
    assert_eq!(created.status_code, StatusCode::Created);
    assert!(json(&created)["announceTo"].get("announced").is_none());

    let updated = pair
        .gscl
        .node
        .dispatch(update(
            "/gscl/applications/app1/containers/c1",
            json!({"announceTo": {"activated": false, "sclList": []}}),
        ))
        .await;
    assert_eq!(updated.status_code, StatusCode::Ok);

    let deleted = pair
        .gscl
        .node
        .dispatch(delete("/gscl/applications/app1/containers/c1"))
        .await;
    assert_eq!(deleted.status_code, StatusCode::Ok);

    // Re-announced with the same outcome, then deleted while still activated.
    pair.gscl
        .node
        .dispatch(create(
            "/gscl/applications/app1/containers",
            json!({"id": "c2", "announceTo": {"activated": true, "sclList": ["nscl"]}}),
        ))
        .await;
    let deleted = pair
        .gscl
        .node
        .dispatch(delete("/gscl/applications/app1/containers/c2"))
        .await;
    assert_eq!(deleted.status_code, StatusCode::Ok);
}

#[tokio::test]
async fn test_child_of_announced_parent_is_announced_below_its_shadow() {
    let pair = registered_pair().await;
    pair.gscl
        .node
        .dispatch(create(
            "/gscl/applications",
            json!({"id": "app1", "announceTo": {"activated": true, "sclList": ["nscl"]}}),
        ))
        .await;
    let created = pair
        .gscl
        .node
        .dispatch(create(
            "/gscl/applications/app1/containers",
            json!({"id": "c1", "announceTo": {"activated": true, "sclList": ["nscl"]}}),
        ))
        .await;
    let shadow = "/nscl/scls/gscl/applications/app1/containers/c1";
    assert_eq!(json(&created)["announceTo"]["announced"][0]["uri"], shadow);

    let remote = pair.nscl.node.dispatch(retrieve(shadow)).await;
    assert_eq!(json(&remote)["resourceType"], "ContainerAnnc");

    let deleted = pair
        .gscl
        .node
        .dispatch(delete("/gscl/applications/app1/containers/c1"))
        .await;
    assert_eq!(deleted.status_code, StatusCode::Ok);
    let gone = pair.nscl.node.dispatch(retrieve(shadow)).await;
    assert_eq!(gone.status_code, StatusCode::NotFound);
}

#[tokio::test]
async fn test_redirection_makes_a_single_hop() {
    let pair = registered_pair().await;

    // Through gscl's mirror of nscl and back again.
    let bounced = pair
        .nscl
        .node
        .dispatch(retrieve("/nscl/scls/gscl/scls/nscl/scls/gscl/containers/c1"))
        .await;
    assert_eq!(bounced.status_code, StatusCode::NotFound);

    // A registered scl linking to this very base.
    pair.nscl
        .node
        .dispatch(create(
            "/nscl/scls",
            json!({"id": "itself", "link": "/nscl", "pocs": ["loop://nscl"]}),
        ))
        .await;
    let looped = pair
        .nscl
        .node
        .dispatch(retrieve("/nscl/scls/itself/containers/c1"))
        .await;
    assert_eq!(looped.status_code, StatusCode::NotFound);
}
