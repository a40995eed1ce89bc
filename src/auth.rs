use crate::core::{Flag, Permission, Resource, ResourceKind, Result, SclError};
use crate::storage::ResourceStore;
use std::sync::Arc;
use tracing::debug;

/// Which permission list of an AccessRight a check runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PermissionScope {
    /// `permissions`: what the AccessRight grants to resources referencing it
    Granted,
    /// `selfPermissions`: who may manage the AccessRight itself
    SelfManagement,
}

impl PermissionScope {
    fn attribute(&self) -> &'static str {
        match self {
            PermissionScope::Granted => "permissions",
            PermissionScope::SelfManagement => "selfPermissions",
        }
    }
}

/// Evaluates access rights stored in the resource tree.
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn ResourceStore>,
}

impl AccessControl {
    pub fn new(store: Arc<dyn ResourceStore>) -> Self {
        Self { store }
    }

    /// Checks `flag` for `identity` against the `permissions` of the
    /// AccessRight at `access_right_id`.
    pub async fn check(&self, access_right_id: Option<&str>, identity: &str, flag: Flag) -> Result<()> {
        self.check_scope(access_right_id, identity, flag, PermissionScope::Granted)
            .await
    }

    /// Same algorithm against `selfPermissions`; used when an AccessRight
    /// authorizes operations on itself.
    pub async fn check_self(&self, access_right_id: Option<&str>, identity: &str, flag: Flag) -> Result<()> {
        self.check_scope(access_right_id, identity, flag, PermissionScope::SelfManagement)
            .await
    }

    /// Authorizes `flag` on an existing resource: AccessRights answer from
    /// their own `selfPermissions`, everything else from the AccessRight it
    /// references.
    pub async fn authorize(&self, resource: &Resource, identity: &str, flag: Flag) -> Result<()> {
        if resource.resource_type == ResourceKind::AccessRight {
            self.check_self(Some(&resource.uri), identity, flag).await
        } else {
            self.check(resource.access_right_id.as_deref(), identity, flag)
                .await
        }
    }

    async fn check_scope(
        &self,
        access_right_id: Option<&str>,
        identity: &str,
        flag: Flag,
        scope: PermissionScope,
    ) -> Result<()> {
        let access_right_id = access_right_id
            .ok_or_else(|| SclError::not_found("resource does not reference an access right"))?;

        let access_right = self
            .store
            .lazy_find(access_right_id)
            .await?
            .filter(|r| r.resource_type == ResourceKind::AccessRight)
            .ok_or_else(|| {
                SclError::not_found(format!("access right '{}' not found", access_right_id))
            })?;

        let permissions: Vec<Permission> = access_right
            .attribute(scope.attribute())?
            .unwrap_or_default();

        let verdict = evaluate(&permissions, identity, flag, access_right_id);
        debug!(
            access_right = access_right_id,
            identity,
            %flag,
            scope = scope.attribute(),
            granted = verdict.is_ok(),
            "access check"
        );
        verdict
    }
}

/// First permission whose holders include `identity` decides: later
/// permissions are never consulted, even when the first match lacks `flag`.
pub fn evaluate(permissions: &[Permission], identity: &str, flag: Flag, access_right_id: &str) -> Result<()> {
    let Some(permission) = permissions.iter().find(|p| p.holds(identity)) else {
        return Err(SclError::not_found(format!(
            "entity '{}' unknown to access right '{}'",
            identity, access_right_id
        )));
    };

    if permission.grants(flag) {
        Ok(())
    } else {
        Err(SclError::PermissionDenied(format!(
            "'{}' lacks {} in permission '{}' of '{}'",
            identity, flag, permission.id, access_right_id
        )))
    }
}
