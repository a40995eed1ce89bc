//! Operation dispatcher.
//!
//! Resolves an operation's target path and hands it to the resource
//! handler, the virtual resources, discovery or fan-out. Operations aimed
//! below a registered remote SCL that has no local counterpart are
//! redirected through the [`crate::client::RestClient`].

pub mod path;

use crate::context::SclContext;
use crate::core::{
    Flag, Method, Operation, OperationResult, ResourceKind, Result, SclError, is_within,
};
use crate::discovery::{DiscoveryEngine, DiscoveryQuery};
use crate::fanout::FanoutEngine;
use crate::handler::ResourceHandler;
use crate::handler::content::InstancePointer;
use async_recursion::async_recursion;
use path::Target;
use std::sync::Arc;
use tracing::{debug, info};

/// Query parameter set on a redirected operation, naming the SCL that
/// redirected it. Such an operation is never redirected again.
pub const REDIRECTED_BY: &str = "redirectedBy";

/// Cheaply clonable handle on one SCL's dispatcher.
#[derive(Clone)]
pub struct Router {
    ctx: Arc<SclContext>,
}

impl Router {
    pub fn new(ctx: SclContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &SclContext {
        &self.ctx
    }

    /// Executes an operation. Failures come back as error results; nothing
    /// escapes as `Err`.
    #[async_recursion]
    pub async fn dispatch(&self, operation: Operation) -> OperationResult {
        debug!(
            method = %operation.method,
            path = %operation.target_path,
            identity = %operation.identity,
            "dispatch"
        );
        let result = match self.route(&operation).await {
            Ok(result) => result,
            Err(err) => {
                debug!(path = %operation.target_path, error = %err, "operation failed");
                err.into()
            }
        };
        debug!(path = %operation.target_path, status = %result.status_code, "dispatched");
        result
    }

    async fn route(&self, operation: &Operation) -> Result<OperationResult> {
        if let Some(redirected) = self.redirection(operation).await? {
            return Ok(self.ctx.client.send(redirected).await);
        }

        let target = path::resolve(&self.ctx.config.scl_id, &operation.target_path)
            .ok_or_else(|| {
                SclError::not_found(format!("no resource at '{}'", operation.target_path))
            })?;
        let handler = ResourceHandler::new(&self.ctx);

        match target {
            Target::Resource { uri, kind } => self.route_resource(&handler, operation, &uri, kind).await,
            Target::Latest { instances, content } => {
                only_retrieve(operation)?;
                handler
                    .retrieve_pointer(operation, &instances, InstancePointer::Latest, content)
                    .await
            }
            Target::Oldest { instances, content } => {
                only_retrieve(operation)?;
                handler
                    .retrieve_pointer(operation, &instances, InstancePointer::Oldest, content)
                    .await
            }
            Target::Content { instance } => {
                only_retrieve(operation)?;
                handler.retrieve_content(operation, &instance).await
            }
            Target::Discovery { base } => {
                only_retrieve(operation)?;
                self.discover(operation, &base).await
            }
            Target::MembersContent { group, suffix } => {
                FanoutEngine::new(self.ctx.config.fanout_concurrency)
                    .execute(self, operation, &group, &suffix)
                    .await
            }
            Target::Stub { segment } => Err(SclError::NotImplemented(format!(
                "'{}' resources are not supported",
                segment
            ))),
        }
    }

    async fn route_resource(
        &self,
        handler: &ResourceHandler<'_>,
        operation: &Operation,
        uri: &str,
        kind: ResourceKind,
    ) -> Result<OperationResult> {
        let not_allowed = || -> Result<OperationResult> {
            Err(SclError::method_not_allowed(format!(
                "{} is not allowed on {}",
                operation.method, kind
            )))
        };

        match operation.method {
            Method::Create if kind.is_collection() => handler.create(operation, uri).await,
            Method::Create => not_allowed(),
            Method::Retrieve => handler.retrieve(operation, uri).await,
            Method::Update if kind == ResourceKind::ContentInstance => not_allowed(),
            Method::Update => handler.update(operation, uri).await,
            Method::Delete
                if kind.is_collection()
                    || kind == ResourceKind::SclBase
                    || kind == ResourceKind::ContentInstance =>
            {
                not_allowed()
            }
            Method::Delete => handler.delete(operation, uri).await,
            Method::Execute if matches!(kind, ResourceKind::Application | ResourceKind::Scl) => {
                Err(SclError::NotImplemented(format!("EXECUTE on {}", kind)))
            }
            Method::Execute => not_allowed(),
        }
    }

    async fn discover(&self, operation: &Operation, base_uri: &str) -> Result<OperationResult> {
        let base = self
            .ctx
            .store
            .lazy_find(base_uri)
            .await?
            .ok_or_else(|| SclError::not_found(format!("'{}' not found", base_uri)))?;
        self.ctx
            .access
            .check(base.access_right_id.as_deref(), &operation.identity, Flag::Discover)
            .await?;

        let query = DiscoveryQuery::from_operation(operation)?;
        let result = DiscoveryEngine::new(self.ctx.store.clone())
            .discover(&query)
            .await?;
        let body = serde_json::to_string(&result).map_err(|err| SclError::Internal(err.to_string()))?;
        Ok(OperationResult::ok(body))
    }

    /// Operations below `/{base}/scls/{id}/…` whose first levels have no
    /// local counterpart belong to the registered SCL: the path is rebased
    /// onto its `link` and the operation is sent to its first point of
    /// contact. An operation makes at most one such hop, and never toward
    /// this SCL's own base.
    async fn redirection(&self, operation: &Operation) -> Result<Option<Operation>> {
        if operation.parameter(REDIRECTED_BY).is_some() {
            return Ok(None);
        }
        let segments: Vec<&str> = operation
            .target_path
            .trim_matches('/')
            .split('/')
            .collect();
        if segments.len() <= 3 || segments[0] != self.ctx.config.scl_id || segments[1] != "scls" {
            return Ok(None);
        }

        let scl_uri = format!("/{}/scls/{}", segments[0], segments[2]);
        let Some(scl) = self
            .ctx
            .store
            .lazy_find(&scl_uri)
            .await?
            .filter(|r| r.resource_type == ResourceKind::Scl)
        else {
            return Ok(None);
        };

        let local_end = segments.len().min(5);
        let local = format!("{}/{}", scl_uri, segments[3..local_end].join("/"));
        if self.ctx.store.exists(&local).await? {
            return Ok(None);
        }

        let Some(link) = scl.attr_str("link") else {
            return Ok(None);
        };
        let pocs: Vec<String> = scl.attribute("pocs")?.unwrap_or_default();
        let Some(poc) = pocs.into_iter().next() else {
            return Ok(None);
        };

        let rebased = format!("{}/{}", link.trim_end_matches('/'), segments[3..].join("/"));
        if is_within(&rebased, &self.ctx.base_uri()) {
            debug!(from = %operation.target_path, to = %rebased, "redirection points back here");
            return Ok(None);
        }
        info!(from = %operation.target_path, to = %rebased, base = %poc, "redirecting to remote scl");
        Ok(Some(
            operation
                .retarget(rebased)
                .with_base(poc)
                .with_parameter(REDIRECTED_BY, self.ctx.config.scl_id.clone()),
        ))
    }
}

fn only_retrieve(operation: &Operation) -> Result<()> {
    if operation.method == Method::Retrieve {
        Ok(())
    } else {
        Err(SclError::method_not_allowed(format!(
            "{} is not allowed on a read-only resource",
            operation.method
        )))
    }
}
