//! Declarative attribute rules per resource kind.
//!
//! One table drives create/update validation and field merging for every
//! resource type; type-specific behavior beyond attribute presence lives in
//! the handler's kind hooks.

use crate::core::ResourceKind;

/// Whether an attribute may appear in a client representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Mandatory,
    Optional,
    /// System-assigned or immutable; supplying it is a bad request.
    NotPermitted,
}

/// JSON shape an attribute must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    Text,
    Integer,
    Timestamp,
    TextList,
    Permissions,
    AnnounceTo,
    Object,
}

#[derive(Debug, Clone, Copy)]
pub struct AttributeRule {
    pub name: &'static str,
    pub ty: AttributeType,
    pub on_create: Presence,
    pub on_update: Presence,
}

const fn rule(
    name: &'static str,
    ty: AttributeType,
    on_create: Presence,
    on_update: Presence,
) -> AttributeRule {
    AttributeRule {
        name,
        ty,
        on_create,
        on_update,
    }
}

use AttributeType::*;
use Presence::*;

/// What happens when a client-supplied id is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateId {
    /// Append a random suffix
    Regenerate,
    /// Answer CONFLICT
    Reject,
}

#[derive(Debug)]
pub struct ResourceRules {
    pub kind: ResourceKind,
    /// Prefix of generated ids
    pub id_prefix: &'static str,
    pub duplicate_id: DuplicateId,
    pub attributes: &'static [AttributeRule],
}

impl ResourceRules {
    /// Common attributes followed by the kind's own.
    pub fn all_attributes(&self) -> impl Iterator<Item = &'static AttributeRule> {
        let announce: &'static [AttributeRule] = if self.kind.is_announceable() {
            ANNOUNCEABLE
        } else {
            &[]
        };
        let common: &'static [AttributeRule] = if self.kind.is_collection() || self.kind == ResourceKind::SclBase {
            COLLECTION
        } else {
            COMMON
        };
        common.iter().chain(announce).chain(self.attributes.iter())
    }

    pub fn attribute(&self, name: &str) -> Option<&'static AttributeRule> {
        self.all_attributes().find(|rule| rule.name == name)
    }

    /// Kind attributes a client may both omit at creation and drop later
    /// with an explicit `null`.
    pub fn is_clearable(&self, name: &str) -> bool {
        self.attributes
            .iter()
            .any(|rule| rule.name == name && rule.on_create == Optional && rule.on_update == Optional)
    }
}

const COMMON: &[AttributeRule] = &[
    rule("resourceType", Text, NotPermitted, NotPermitted),
    rule("uri", Text, NotPermitted, NotPermitted),
    rule("id", Text, Optional, NotPermitted),
    rule("accessRightID", Text, Optional, Optional),
    rule("searchStrings", TextList, Optional, Optional),
    rule("creationTime", Timestamp, NotPermitted, NotPermitted),
    rule("lastModifiedTime", Timestamp, NotPermitted, NotPermitted),
    rule("expirationTime", Timestamp, Optional, Optional),
];

/// Collections and the sclBase only expose their access right and tags.
const COLLECTION: &[AttributeRule] = &[
    rule("resourceType", Text, NotPermitted, NotPermitted),
    rule("uri", Text, NotPermitted, NotPermitted),
    rule("id", Text, NotPermitted, NotPermitted),
    rule("accessRightID", Text, NotPermitted, Optional),
    rule("searchStrings", TextList, NotPermitted, Optional),
    rule("creationTime", Timestamp, NotPermitted, NotPermitted),
    rule("lastModifiedTime", Timestamp, NotPermitted, NotPermitted),
];

const ANNOUNCEABLE: &[AttributeRule] = &[rule("announceTo", AnnounceTo, Optional, Optional)];

const SCL: &[AttributeRule] = &[
    rule("link", Text, Mandatory, NotPermitted),
    rule("pocs", TextList, Mandatory, Optional),
    rule("onlineStatus", Text, Optional, Optional),
    rule("serverCapability", Text, Optional, Optional),
    rule("remTriggerAddr", Text, Optional, Optional),
    rule("mgmtProtocolType", Text, Optional, Optional),
];

const APPLICATION: &[AttributeRule] = &[
    rule("aPoC", Text, Optional, Optional),
    rule("aPoCPaths", TextList, Optional, Optional),
    rule("locRequestor", Text, Optional, Optional),
];

const CONTAINER: &[AttributeRule] = &[
    rule("maxNrOfInstances", Integer, Optional, Optional),
    rule("maxByteSize", Integer, Optional, Optional),
    rule("maxInstanceAge", Integer, Optional, Optional),
    rule("currentNrOfInstances", Integer, NotPermitted, NotPermitted),
    rule("currentByteSize", Integer, NotPermitted, NotPermitted),
];

const CONTENT_INSTANCE: &[AttributeRule] = &[
    rule("content", Text, Mandatory, NotPermitted),
    rule("contentTypes", TextList, Optional, NotPermitted),
    rule("contentSize", Integer, NotPermitted, NotPermitted),
];

const ACCESS_RIGHT: &[AttributeRule] = &[
    rule("permissions", Permissions, Optional, Optional),
    rule("selfPermissions", Permissions, Mandatory, Optional),
];

const GROUP: &[AttributeRule] = &[
    rule("memberType", Text, Optional, Optional),
    rule("members", TextList, Optional, Optional),
    rule("maxNrOfMembers", Integer, Optional, Optional),
    rule("currentNrOfMembers", Integer, NotPermitted, NotPermitted),
];

const SUBSCRIPTION: &[AttributeRule] = &[
    rule("contact", Text, Mandatory, NotPermitted),
    rule("filterCriteria", Object, Optional, Optional),
    rule("minimalTimeBetweenNotifications", Integer, Optional, Optional),
    rule("delayTolerance", Timestamp, Optional, Optional),
    rule("subscriberId", Text, NotPermitted, NotPermitted),
];

const ANNOUNCED: &[AttributeRule] = &[rule("link", Text, Mandatory, NotPermitted)];

const NONE: &[AttributeRule] = &[];

macro_rules! rules {
    ($kind:ident, $prefix:literal, $dup:ident, $attrs:expr) => {
        ResourceRules {
            kind: ResourceKind::$kind,
            id_prefix: $prefix,
            duplicate_id: DuplicateId::$dup,
            attributes: $attrs,
        }
    };
}

static TABLE: &[ResourceRules] = &[
    rules!(SclBase, "", Reject, NONE),
    rules!(Scls, "", Reject, NONE),
    rules!(Applications, "", Reject, NONE),
    rules!(Containers, "", Reject, NONE),
    rules!(ContentInstances, "", Reject, NONE),
    rules!(AccessRights, "", Reject, NONE),
    rules!(Groups, "", Reject, NONE),
    rules!(Subscriptions, "", Reject, NONE),
    rules!(Scl, "SCL_", Reject, SCL),
    rules!(Application, "APP_", Regenerate, APPLICATION),
    rules!(ApplicationAnnc, "APP_", Reject, ANNOUNCED),
    rules!(Container, "CONT_", Regenerate, CONTAINER),
    rules!(ContainerAnnc, "CONT_", Reject, ANNOUNCED),
    rules!(ContentInstance, "CI_", Regenerate, CONTENT_INSTANCE),
    rules!(AccessRight, "AR_", Regenerate, ACCESS_RIGHT),
    rules!(AccessRightAnnc, "AR_", Reject, ANNOUNCED),
    rules!(Group, "GROUP_", Regenerate, GROUP),
    rules!(GroupAnnc, "GROUP_", Reject, ANNOUNCED),
    rules!(Subscription, "SUB_", Regenerate, SUBSCRIPTION),
];

/// Rule set of a resource kind.
pub fn rules_for(kind: ResourceKind) -> &'static ResourceRules {
    TABLE
        .iter()
        .find(|rules| rules.kind == kind)
        .unwrap_or(&TABLE[0])
}
