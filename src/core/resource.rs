use super::error::{Result, SclError};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;

/// Every resource type addressable in an SCL tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    SclBase,
    Scls,
    Scl,
    Applications,
    Application,
    ApplicationAnnc,
    Containers,
    Container,
    ContainerAnnc,
    ContentInstances,
    ContentInstance,
    AccessRights,
    AccessRight,
    AccessRightAnnc,
    Groups,
    Group,
    GroupAnnc,
    Subscriptions,
    Subscription,
}

impl ResourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::SclBase => "SclBase",
            ResourceKind::Scls => "Scls",
            ResourceKind::Scl => "Scl",
            ResourceKind::Applications => "Applications",
            ResourceKind::Application => "Application",
            ResourceKind::ApplicationAnnc => "ApplicationAnnc",
            ResourceKind::Containers => "Containers",
            ResourceKind::Container => "Container",
            ResourceKind::ContainerAnnc => "ContainerAnnc",
            ResourceKind::ContentInstances => "ContentInstances",
            ResourceKind::ContentInstance => "ContentInstance",
            ResourceKind::AccessRights => "AccessRights",
            ResourceKind::AccessRight => "AccessRight",
            ResourceKind::AccessRightAnnc => "AccessRightAnnc",
            ResourceKind::Groups => "Groups",
            ResourceKind::Group => "Group",
            ResourceKind::GroupAnnc => "GroupAnnc",
            ResourceKind::Subscriptions => "Subscriptions",
            ResourceKind::Subscription => "Subscription",
        }
    }

    /// Maps a path segment naming a collection onto the collection kind.
    pub fn from_collection_segment(segment: &str) -> Option<Self> {
        match segment {
            "scls" => Some(ResourceKind::Scls),
            "applications" => Some(ResourceKind::Applications),
            "containers" => Some(ResourceKind::Containers),
            "contentInstances" => Some(ResourceKind::ContentInstances),
            "accessRights" => Some(ResourceKind::AccessRights),
            "groups" => Some(ResourceKind::Groups),
            "subscriptions" => Some(ResourceKind::Subscriptions),
            _ => None,
        }
    }

    /// Path segment of a collection kind.
    pub fn collection_segment(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Scls => Some("scls"),
            ResourceKind::Applications => Some("applications"),
            ResourceKind::Containers => Some("containers"),
            ResourceKind::ContentInstances => Some("contentInstances"),
            ResourceKind::AccessRights => Some("accessRights"),
            ResourceKind::Groups => Some("groups"),
            ResourceKind::Subscriptions => Some("subscriptions"),
            _ => None,
        }
    }

    #[inline]
    pub fn is_collection(&self) -> bool {
        self.collection_segment().is_some()
    }

    /// Kind of the items a collection holds.
    pub fn item_kind(&self) -> Option<Self> {
        match self {
            ResourceKind::Scls => Some(ResourceKind::Scl),
            ResourceKind::Applications => Some(ResourceKind::Application),
            ResourceKind::Containers => Some(ResourceKind::Container),
            ResourceKind::ContentInstances => Some(ResourceKind::ContentInstance),
            ResourceKind::AccessRights => Some(ResourceKind::AccessRight),
            ResourceKind::Groups => Some(ResourceKind::Group),
            ResourceKind::Subscriptions => Some(ResourceKind::Subscription),
            _ => None,
        }
    }

    /// Shadow kind created on a peer SCL when this kind is announced.
    pub fn announced_kind(&self) -> Option<Self> {
        match self {
            ResourceKind::Application => Some(ResourceKind::ApplicationAnnc),
            ResourceKind::Container => Some(ResourceKind::ContainerAnnc),
            ResourceKind::AccessRight => Some(ResourceKind::AccessRightAnnc),
            ResourceKind::Group => Some(ResourceKind::GroupAnnc),
            _ => None,
        }
    }

    #[inline]
    pub fn is_announceable(&self) -> bool {
        self.announced_kind().is_some()
    }

    #[inline]
    pub fn is_announced(&self) -> bool {
        matches!(
            self,
            ResourceKind::ApplicationAnnc
                | ResourceKind::ContainerAnnc
                | ResourceKind::AccessRightAnnc
                | ResourceKind::GroupAnnc
        )
    }

    /// Collections materialized together with a resource of this kind.
    pub fn child_collections(&self) -> &'static [ResourceKind] {
        use ResourceKind::*;
        match self {
            SclBase => &[Scls, Applications, Containers, Groups, AccessRights, Subscriptions],
            Scl => &[Applications, Containers, Groups, AccessRights, Subscriptions],
            Application | ApplicationAnnc => &[Containers, Groups, AccessRights, Subscriptions],
            Container => &[ContentInstances, Subscriptions],
            ContainerAnnc | AccessRight | AccessRightAnnc | Group | GroupAnnc => &[Subscriptions],
            Scls | Applications | Containers | ContentInstances | AccessRights | Groups => {
                &[Subscriptions]
            }
            Subscriptions | Subscription | ContentInstance => &[],
        }
    }

    /// Structural kind used by path resolution (announced shadows share the
    /// path grammar of the resource they mirror).
    pub fn structural(&self) -> Self {
        match self {
            ResourceKind::ApplicationAnnc => ResourceKind::Application,
            ResourceKind::ContainerAnnc => ResourceKind::Container,
            ResourceKind::AccessRightAnnc => ResourceKind::AccessRight,
            ResourceKind::GroupAnnc => ResourceKind::Group,
            other => *other,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Access flag granted by a [`Permission`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Flag {
    Create,
    Read,
    Write,
    Delete,
    Discover,
}

impl Flag {
    pub const ALL: [Flag; 5] = [Flag::Create, Flag::Read, Flag::Write, Flag::Delete, Flag::Discover];
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Flag::Create => "CREATE",
            Flag::Read => "READ",
            Flag::Write => "WRITE",
            Flag::Delete => "DELETE",
            Flag::Discover => "DISCOVER",
        };
        f.write_str(name)
    }
}

/// One entry of an AccessRight's `permissions` or `selfPermissions` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub holder_refs: Vec<String>,
    #[serde(default)]
    pub flags: BTreeSet<Flag>,
}

impl Permission {
    pub fn new(
        id: impl Into<String>,
        holders: impl IntoIterator<Item = impl Into<String>>,
        flags: impl IntoIterator<Item = Flag>,
    ) -> Self {
        Self {
            id: id.into(),
            holder_refs: holders.into_iter().map(Into::into).collect(),
            flags: flags.into_iter().collect(),
        }
    }

    /// Holder references compare case-insensitively.
    pub fn holds(&self, identity: &str) -> bool {
        self.holder_refs
            .iter()
            .any(|holder| holder.eq_ignore_ascii_case(identity))
    }

    #[inline]
    pub fn grants(&self, flag: Flag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Shadow created on a peer SCL for an announced resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncedShadow {
    pub scl: String,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnounceTo {
    #[serde(default)]
    pub activated: bool,
    /// Ids of registered peer SCLs to announce to.
    #[serde(default)]
    pub scl_list: Vec<String>,
    #[serde(default)]
    pub global: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub announced: Vec<AnnouncedShadow>,
}

/// A stored resource document.
///
/// Common attributes are typed fields; the attributes specific to a
/// [`ResourceKind`] live in `attributes` and are flattened into the
/// representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub resource_type: ResourceKind,
    pub id: String,
    pub uri: String,
    #[serde(rename = "accessRightID", default, skip_serializing_if = "Option::is_none")]
    pub access_right_id: Option<String>,
    #[serde(default)]
    pub search_strings: BTreeSet<String>,
    pub creation_time: DateTime<Utc>,
    pub last_modified_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce_to: Option<AnnounceTo>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Resource {
    pub fn new(kind: ResourceKind, parent_uri: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            resource_type: kind,
            uri: child_uri(parent_uri, &id),
            id,
            access_right_id: None,
            search_strings: BTreeSet::new(),
            creation_time: now,
            last_modified_time: now,
            expiration_time: None,
            announce_to: None,
            attributes: Map::new(),
        }
    }

    pub fn with_access_right(mut self, access_right_id: Option<String>) -> Self {
        self.access_right_id = access_right_id;
        self
    }

    /// Default search tags: `type:<Kind>` and `id:<id>`, case-folded.
    pub fn with_default_search_strings(mut self) -> Self {
        self.search_strings = default_search_strings(self.resource_type, &self.id);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Serialize) -> Self {
        // Serializing plain data into a JSON value cannot fail.
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.attributes.insert(name.to_string(), value);
        self
    }

    pub fn parent_uri(&self) -> &str {
        parent_uri(&self.uri)
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn attr_i64(&self, name: &str) -> Option<i64> {
        self.attributes.get(name).and_then(Value::as_i64)
    }

    /// Deserializes a kind-specific attribute into a typed value.
    pub fn attribute<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.attributes.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|err| {
                SclError::Internal(format!(
                    "attribute '{}' of '{}' is malformed: {}",
                    name, self.uri, err
                ))
            }),
        }
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|err| SclError::Internal(format!("attribute '{}': {}", name, err)))?;
        self.attributes.insert(name.to_string(), value);
        Ok(())
    }

    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time.is_some_and(|at| at <= now)
    }

    /// Serialized representation of the stored document.
    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|err| SclError::Internal(err.to_string()))
    }
}

/// Structure returned by [`crate::storage::ResourceStore::find`]: a resource
/// with its direct children materialized in store order.
#[derive(Debug, Clone)]
pub struct ResourceTree {
    pub resource: Resource,
    pub children: Vec<Resource>,
}

pub fn default_search_strings(kind: ResourceKind, id: &str) -> BTreeSet<String> {
    [format!("type:{}", kind.name()), format!("id:{}", id)]
        .into_iter()
        .map(|tag| tag.to_lowercase())
        .collect()
}

pub fn child_uri(parent: &str, id: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), id)
}

pub fn parent_uri(uri: &str) -> &str {
    match uri.rfind('/') {
        Some(0) | None => "",
        Some(idx) => &uri[..idx],
    }
}

/// True when `uri` is `ancestor` itself or lies below it.
pub fn is_within(uri: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    uri == ancestor
        || (uri.starts_with(ancestor) && uri.as_bytes().get(ancestor.len()) == Some(&b'/'))
}
