//! Read-only virtual resources over content instances.

use super::ResourceHandler;
use super::render::render_string;
use crate::core::{Flag, Operation, OperationResult, Resource, ResourceKind, Result, SclError};

/// Which end of a `contentInstances` collection a pointer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstancePointer {
    Latest,
    Oldest,
}

impl<'a> ResourceHandler<'a> {
    async fn pointed_instance(&self, instances_uri: &str, pointer: InstancePointer) -> Result<Resource> {
        if self.ctx.store.lazy_find(instances_uri).await?.is_none() {
            return Err(SclError::not_found(format!("'{}' not found", instances_uri)));
        }
        let mut instances = self
            .ctx
            .store
            .children(instances_uri)
            .await?
            .into_iter()
            .filter(|r| r.resource_type == ResourceKind::ContentInstance);
        let instance = match pointer {
            InstancePointer::Latest => instances.last(),
            InstancePointer::Oldest => instances.next(),
        };
        instance.ok_or_else(|| SclError::not_found(format!("'{}' holds no instance", instances_uri)))
    }

    async fn readable_instance(&self, operation: &Operation, instance: Resource) -> Result<Resource> {
        self.ctx
            .access
            .authorize(&instance, &operation.identity, Flag::Read)
            .await?;
        Ok(instance)
    }

    /// RETRIEVE on `contentInstances/latest|oldest[/content]`.
    pub async fn retrieve_pointer(
        &self,
        operation: &Operation,
        instances_uri: &str,
        pointer: InstancePointer,
        content_only: bool,
    ) -> Result<OperationResult> {
        let instance = self.pointed_instance(instances_uri, pointer).await?;
        let instance = self.readable_instance(operation, instance).await?;
        if content_only {
            Ok(raw_content(&instance))
        } else {
            let mut result =
                OperationResult::ok(render_string(self.ctx.store.as_ref(), &instance).await?);
            result.resource_uri = Some(instance.uri);
            Ok(result)
        }
    }

    /// RETRIEVE on `contentInstances/{id}/content`.
    pub async fn retrieve_content(&self, operation: &Operation, instance_uri: &str) -> Result<OperationResult> {
        let instance = self
            .load(instance_uri)
            .await?;
        if instance.resource_type != ResourceKind::ContentInstance {
            return Err(SclError::not_found(format!("'{}' is not a content instance", instance_uri)));
        }
        let instance = self.readable_instance(operation, instance).await?;
        Ok(raw_content(&instance))
    }
}

fn raw_content(instance: &Resource) -> OperationResult {
    OperationResult::ok(instance.attr_str("content").unwrap_or_default())
}
