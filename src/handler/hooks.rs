//! Kind-specific defaults and invariants applied on top of the rule table.

use crate::config::SclConfig;
use crate::core::{Permission, Resource, ResourceKind, Result, SclError};
use crate::storage::ResourceStore;
use serde_json::{Value, json};

const UNBOUNDED: i64 = -1;

fn check_instance_bound(resource: &Resource, config: &SclConfig) -> Result<()> {
    let max = resource
        .attr_i64("maxNrOfInstances")
        .unwrap_or(config.container_default_instances);
    if !(0..=config.container_max_instances).contains(&max) {
        return Err(SclError::bad_request(format!(
            "maxNrOfInstances must be within 0..={}, got {}",
            config.container_max_instances, max
        )));
    }
    Ok(())
}

fn check_members(resource: &mut Resource) -> Result<()> {
    let members: Vec<String> = resource.attribute("members")?.unwrap_or_default();
    if let Some(fan_out) = members
        .iter()
        .find(|member| member.split('/').any(|segment| segment == "membersContent"))
    {
        return Err(SclError::bad_request(format!(
            "member '{}' is itself a fan-out",
            fan_out
        )));
    }
    let max = resource.attr_i64("maxNrOfMembers").unwrap_or(UNBOUNDED);
    if max >= 0 && members.len() as i64 > max {
        return Err(SclError::bad_request(format!(
            "{} members exceed maxNrOfMembers {}",
            members.len(),
            max
        )));
    }
    resource.set_attribute("currentNrOfMembers", members.len())
}

fn set_default(resource: &mut Resource, name: &str, value: Value) {
    resource
        .attributes
        .entry(name.to_string())
        .or_insert(value);
}

/// Fills defaults and checks invariants of a resource about to be created
/// in `collection_uri`.
pub async fn on_create(
    store: &dyn ResourceStore,
    config: &SclConfig,
    identity: &str,
    collection_uri: &str,
    resource: &mut Resource,
) -> Result<()> {
    match resource.resource_type {
        ResourceKind::Container => {
            set_default(
                resource,
                "maxNrOfInstances",
                json!(config.container_default_instances),
            );
            check_instance_bound(resource, config)?;
        }
        ResourceKind::ContentInstance => {
            let size = resource.attr_str("content").map(str::len).unwrap_or(0);
            resource.set_attribute("contentSize", size)?;
        }
        ResourceKind::Group => {
            set_default(resource, "members", json!([]));
            set_default(resource, "memberType", json!("ANY"));
            set_default(resource, "maxNrOfMembers", json!(UNBOUNDED));
            check_members(resource)?;
        }
        ResourceKind::Subscription => {
            let contact = resource.attr_str("contact").unwrap_or_default();
            let taken = store
                .children(collection_uri)
                .await?
                .iter()
                .any(|sibling| sibling.attr_str("contact") == Some(contact));
            if taken {
                return Err(SclError::conflict(format!(
                    "contact '{}' is already subscribed in '{}'",
                    contact, collection_uri
                )));
            }
            resource.set_attribute("subscriberId", identity)?;
        }
        ResourceKind::AccessRight => {
            set_default(resource, "permissions", json!(Vec::<Permission>::new()));
        }
        _ => {}
    }
    Ok(())
}

/// Re-checks invariants after a merge.
pub fn on_update(config: &SclConfig, resource: &mut Resource) -> Result<()> {
    match resource.resource_type {
        ResourceKind::Container => check_instance_bound(resource, config),
        ResourceKind::Group => check_members(resource),
        _ => Ok(()),
    }
}
