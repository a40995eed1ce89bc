use crate::core::{Resource, ResourceKind, Result};
use crate::eviction::content_size;
use crate::storage::ResourceStore;
use serde_json::{Value, json};

fn reference(resource: &Resource) -> Value {
    json!({ "id": resource.id, "uri": resource.uri })
}

/// Representation returned for a stored resource.
///
/// Items list the uris of their child collections; collections list their
/// item children. Container and `contentInstances` counters are computed
/// here rather than stored.
pub async fn render(store: &dyn ResourceStore, resource: &Resource) -> Result<Value> {
    let mut json = resource.to_json()?;
    let kind = resource.resource_type;

    if kind.is_collection() {
        let items: Vec<Resource> = store
            .children(&resource.uri)
            .await?
            .into_iter()
            .filter(|child| !child.resource_type.is_collection())
            .collect();
        json["childReferences"] = Value::Array(items.iter().map(reference).collect());

        if kind == ResourceKind::ContentInstances {
            let bytes: i64 = items.iter().map(content_size).sum();
            json["currentNrOfInstances"] = json!(items.len());
            json["currentByteSize"] = json!(bytes);
            if let Some(latest) = items.last() {
                json["latest"] = json!(latest.uri);
            }
            if let Some(oldest) = items.first() {
                json["oldest"] = json!(oldest.uri);
            }
        }
    } else {
        for collection in kind.child_collections() {
            if let Some(segment) = collection.collection_segment() {
                json[format!("{}Reference", segment)] =
                    json!(format!("{}/{}", resource.uri, segment));
            }
        }
    }

    if kind == ResourceKind::Container {
        let instances = store
            .children(&format!("{}/contentInstances", resource.uri))
            .await?;
        let instances: Vec<&Resource> = instances
            .iter()
            .filter(|r| r.resource_type == ResourceKind::ContentInstance)
            .collect();
        json["currentNrOfInstances"] = json!(instances.len());
        json["currentByteSize"] = json!(instances.iter().map(|r| content_size(r)).sum::<i64>());
    }

    Ok(json)
}

pub async fn render_string(store: &dyn ResourceStore, resource: &Resource) -> Result<String> {
    Ok(render(store, resource).await?.to_string())
}
