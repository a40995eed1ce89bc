//! Generic resource handler.
//!
//! One CRUD pipeline serves every resource kind: the rule table in
//! [`crate::validation::rules`] says which attributes a kind accepts, and
//! [`hooks`] adds the few kind-specific defaults and invariants.

pub mod content;
pub mod hooks;
pub mod render;

use crate::context::SclContext;
use crate::core::{
    AnnounceTo, Flag, Operation, OperationResult, Resource, ResourceKind, Result, SclError,
    StatusCode,
};
use crate::eviction::{EvictionPolicy, InstanceLimits, content_size};
use crate::validation::ids::{disambiguate, generate_id, validate_id};
use crate::validation::{DuplicateId, Phase, RepresentationValidator, rules_for};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, info};

pub use render::{render, render_string};

pub struct ResourceHandler<'a> {
    ctx: &'a SclContext,
}

impl<'a> ResourceHandler<'a> {
    pub fn new(ctx: &'a SclContext) -> Self {
        Self { ctx }
    }

    async fn load(&self, uri: &str) -> Result<Resource> {
        self.ctx
            .store
            .lazy_find(uri)
            .await?
            .ok_or_else(|| SclError::not_found(format!("resource '{}' not found", uri)))
    }

    /// Creates a child of the collection at `collection_uri`.
    pub async fn create(&self, operation: &Operation, collection_uri: &str) -> Result<OperationResult> {
        let collection = self.load(collection_uri).await?;
        let item_kind = collection.resource_type.item_kind().ok_or_else(|| {
            SclError::method_not_allowed(format!("'{}' does not hold children", collection_uri))
        })?;

        self.ctx
            .access
            .check(collection.access_right_id.as_deref(), &operation.identity, Flag::Create)
            .await?;

        let mut document = RepresentationValidator::parse(operation.representation.as_deref())?;
        let kind = match item_kind.announced_kind() {
            Some(announced) if document.contains_key("link") => announced,
            _ => item_kind,
        };
        self.ctx.validator.validate(kind, Phase::Create, &document)?;

        let id = self.assign_id(kind, &collection.uri, document.remove("id")).await?;
        let mut resource = Resource::new(kind, &collection.uri, id);

        resource.access_right_id = match document.remove("accessRightID") {
            Some(value) => Some(self.referenced_access_right(&value).await?),
            None => collection.access_right_id.clone(),
        };
        resource.search_strings = match document.remove("searchStrings") {
            Some(value) => folded_search_strings(value)?,
            None => crate::core::resource::default_search_strings(kind, &resource.id),
        };
        resource.expiration_time = Some(match document.remove("expirationTime") {
            Some(value) => future_timestamp(&value)?,
            None => self.default_expiration()?,
        });
        if let Some(value) = document.remove("announceTo") {
            resource.announce_to = Some(serde_json::from_value::<AnnounceTo>(value)?);
        }
        resource.attributes = document;

        hooks::on_create(
            self.ctx.store.as_ref(),
            &self.ctx.config,
            &operation.identity,
            &collection.uri,
            &mut resource,
        )
        .await?;

        self.ctx.store.create(resource.clone()).await?;
        self.create_collections(&resource).await?;
        info!(uri = %resource.uri, kind = %kind, "resource created");

        if resource.announce_to.as_ref().is_some_and(|a| a.activated) {
            self.ctx.announcer.reconcile(&mut resource).await;
            self.ctx.store.update(resource.clone()).await?;
        }

        self.ctx.notifier.notify(StatusCode::Created, &resource).await;

        if kind == ResourceKind::ContentInstance {
            self.schedule_eviction(&collection.uri).await?;
        }

        let representation = render_string(self.ctx.store.as_ref(), &resource).await?;
        Ok(OperationResult::created(representation, resource.uri))
    }

    pub async fn retrieve(&self, operation: &Operation, uri: &str) -> Result<OperationResult> {
        let resource = self.load(uri).await?;
        self.ctx
            .access
            .authorize(&resource, &operation.identity, Flag::Read)
            .await?;
        let representation = render_string(self.ctx.store.as_ref(), &resource).await?;
        Ok(OperationResult::ok(representation))
    }

    pub async fn update(&self, operation: &Operation, uri: &str) -> Result<OperationResult> {
        let mut resource = self.load(uri).await?;
        self.ctx
            .access
            .authorize(&resource, &operation.identity, Flag::Write)
            .await?;

        let document = RepresentationValidator::parse(operation.representation.as_deref())?;
        self.ctx
            .validator
            .validate(resource.resource_type, Phase::Update, &document)?;
        self.merge(&mut resource, document).await?;
        hooks::on_update(&self.ctx.config, &mut resource)?;
        resource.last_modified_time = Utc::now();

        self.ctx.store.update(resource.clone()).await?;
        debug!(uri = %resource.uri, "resource updated");

        if resource.announce_to.is_some() {
            let before = resource.announce_to.clone();
            self.ctx.announcer.reconcile(&mut resource).await;
            if resource.announce_to != before {
                self.ctx.store.update(resource.clone()).await?;
            }
        }

        self.ctx.notifier.notify(StatusCode::Ok, &resource).await;

        if resource.resource_type == ResourceKind::Container {
            self.schedule_eviction(&format!("{}/contentInstances", resource.uri))
                .await?;
        }

        let representation = render_string(self.ctx.store.as_ref(), &resource).await?;
        Ok(OperationResult::ok(representation))
    }

    pub async fn delete(&self, operation: &Operation, uri: &str) -> Result<OperationResult> {
        let resource = self.load(uri).await?;
        self.ctx
            .access
            .authorize(&resource, &operation.identity, Flag::Delete)
            .await?;

        self.ctx.announcer.deannounce(&resource).await;
        // Subscriptions live below the resource, so they are read before deletion.
        self.ctx.notifier.notify(StatusCode::Deleted, &resource).await;
        self.ctx.store.delete(&resource.uri).await?;
        info!(uri = %resource.uri, "resource deleted");

        Ok(OperationResult::new(StatusCode::Ok, None))
    }

    async fn assign_id(&self, kind: ResourceKind, parent: &str, supplied: Option<Value>) -> Result<String> {
        let rules = rules_for(kind);
        let id = match supplied {
            Some(Value::String(id)) => {
                validate_id(&id)?;
                id
            }
            Some(other) => {
                return Err(SclError::bad_request(format!("id must be a string, got {}", other)));
            }
            None => loop {
                let candidate = generate_id(rules.id_prefix);
                if !self.taken(parent, &candidate).await? {
                    return Ok(candidate);
                }
            },
        };

        if !self.taken(parent, &id).await? {
            return Ok(id);
        }
        match rules.duplicate_id {
            DuplicateId::Reject => Err(SclError::conflict(format!(
                "'{}' already exists in '{}'",
                id, parent
            ))),
            DuplicateId::Regenerate => loop {
                let candidate = disambiguate(&id);
                if !self.taken(parent, &candidate).await? {
                    return Ok(candidate);
                }
            },
        }
    }

    async fn taken(&self, parent: &str, id: &str) -> Result<bool> {
        self.ctx
            .store
            .exists(&crate::core::child_uri(parent, id))
            .await
    }

    async fn referenced_access_right(&self, value: &Value) -> Result<String> {
        let uri = value
            .as_str()
            .ok_or_else(|| SclError::bad_request("accessRightID must be a string"))?;
        let exists = self
            .ctx
            .store
            .lazy_find(uri)
            .await?
            .is_some_and(|r| r.resource_type == ResourceKind::AccessRight);
        if !exists {
            return Err(SclError::bad_request(format!(
                "accessRightID '{}' does not reference an access right",
                uri
            )));
        }
        Ok(uri.to_string())
    }

    fn default_expiration(&self) -> Result<DateTime<Utc>> {
        let ttl = chrono::Duration::from_std(self.ctx.config.default_ttl)
            .map_err(|err| SclError::Internal(format!("default ttl: {}", err)))?;
        Ok(Utc::now() + ttl)
    }

    /// Applies the fields of an update document; unlisted fields keep their
    /// stored value and an explicit `null` clears a kind attribute.
    async fn merge(&self, resource: &mut Resource, document: Map<String, Value>) -> Result<()> {
        for (name, value) in document {
            match name.as_str() {
                "accessRightID" => {
                    resource.access_right_id = Some(self.referenced_access_right(&value).await?);
                }
                "searchStrings" => resource.search_strings = folded_search_strings(value)?,
                "expirationTime" => resource.expiration_time = Some(future_timestamp(&value)?),
                "announceTo" => {
                    let mut announce_to: AnnounceTo = serde_json::from_value(value)?;
                    // Shadow bookkeeping is system-owned
                    announce_to.announced = resource
                        .announce_to
                        .take()
                        .map(|previous| previous.announced)
                        .unwrap_or_default();
                    resource.announce_to = Some(announce_to);
                }
                _ if value.is_null() => {
                    resource.attributes.remove(&name);
                }
                _ => {
                    resource.attributes.insert(name, value);
                }
            }
        }
        Ok(())
    }

    /// Materializes the collections a new resource owns, recursively. They
    /// inherit the resource's access right.
    pub(crate) async fn create_collections(&self, resource: &Resource) -> Result<()> {
        let mut pending = vec![resource.clone()];
        while let Some(owner) = pending.pop() {
            for kind in owner.resource_type.child_collections() {
                let Some(segment) = kind.collection_segment() else {
                    continue;
                };
                let collection = Resource::new(*kind, &owner.uri, segment)
                    .with_access_right(owner.access_right_id.clone())
                    .with_default_search_strings();
                self.ctx.store.create(collection.clone()).await?;
                pending.push(collection);
            }
        }
        Ok(())
    }

    async fn schedule_eviction(&self, instances_uri: &str) -> Result<()> {
        let container_uri = crate::core::parent_uri(instances_uri);
        let Some(container) = self.ctx.store.lazy_find(container_uri).await? else {
            return Ok(());
        };
        let limits = InstanceLimits::of(&container, self.ctx.config.container_default_instances);

        let instances = self.ctx.store.children(instances_uri).await?;
        let instances: Vec<&Resource> = instances
            .iter()
            .filter(|r| r.resource_type == ResourceKind::ContentInstance)
            .collect();
        let bytes = instances.iter().map(|r| content_size(r)).sum();

        if EvictionPolicy::needs_eviction(&limits, instances.len() as i64, bytes) {
            self.ctx
                .eviction
                .schedule(instances_uri.to_string(), limits);
        }
        Ok(())
    }
}

fn folded_search_strings(value: Value) -> Result<BTreeSet<String>> {
    let tags: Vec<String> = serde_json::from_value(value)?;
    Ok(tags.into_iter().map(|tag| tag.to_lowercase()).collect())
}

fn future_timestamp(value: &Value) -> Result<DateTime<Utc>> {
    let at = value
        .as_str()
        .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
        .ok_or_else(|| SclError::bad_request(format!("invalid expirationTime {}", value)))?;
    if at <= Utc::now() {
        return Err(SclError::bad_request(format!(
            "expirationTime {} is not in the future",
            at
        )));
    }
    Ok(at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_strings_are_case_folded() {
        let tags = folded_search_strings(json!(["Type:Sensor", "LOCATION:Home"])).unwrap();
        assert!(tags.contains("type:sensor"));
        assert!(tags.contains("location:home"));
        assert!(folded_search_strings(json!("flat")).is_err());
    }

    #[test]
    fn test_expiration_must_be_in_the_future() {
        let past = json!((Utc::now() - chrono::Duration::seconds(1)).to_rfc3339());
        assert!(matches!(future_timestamp(&past), Err(SclError::BadRequest(_))));

        let future = json!((Utc::now() + chrono::Duration::hours(1)).to_rfc3339());
        assert!(future_timestamp(&future).is_ok());
        assert!(future_timestamp(&json!(42)).is_err());
    }
}
