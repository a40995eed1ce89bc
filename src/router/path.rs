//! Structural resolution of target paths.
//!
//! A path is `/{sclBase}` followed by alternating collection and id
//! segments; a handful of segment names address virtual resources instead.

use crate::core::ResourceKind;

/// What a target path addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// A stored resource; `kind` is the structural kind implied by the path
    Resource { uri: String, kind: ResourceKind },
    /// Newest instance of a `contentInstances` collection (or its content)
    Latest { instances: String, content: bool },
    /// Oldest instance of a `contentInstances` collection (or its content)
    Oldest { instances: String, content: bool },
    /// Raw content of one instance
    Content { instance: String },
    /// Fan-out over the members of a group, with the path suffix to append
    MembersContent { group: String, suffix: String },
    Discovery { base: String },
    /// Recognized but unsupported (`mgmtObjs`, `notificationChannels`)
    Stub { segment: String },
}

enum Step {
    Item(ResourceKind),
    Collection(ResourceKind),
}

/// Resolves `path` against the sclBase `scl_id`. `None` for unknown shapes.
pub fn resolve(scl_id: &str, path: &str) -> Option<Target> {
    let trimmed = path.trim_end_matches('/');
    let mut segments = trimmed.strip_prefix('/')?.split('/');
    if segments.next()? != scl_id {
        return None;
    }
    let segments: Vec<&str> = segments.collect();
    if segments.iter().any(|s| s.is_empty()) {
        return None;
    }

    let mut uri = format!("/{}", scl_id);
    let mut step = Step::Item(ResourceKind::SclBase);

    let mut i = 0;
    while i < segments.len() {
        let segment = segments[i];
        let last = i + 1 == segments.len();
        match step {
            Step::Item(kind) => {
                match (kind, segment) {
                    (ResourceKind::SclBase, "discovery") if last => {
                        return Some(Target::Discovery { base: uri });
                    }
                    (ResourceKind::SclBase | ResourceKind::Scl, "mgmtObjs")
                    | (ResourceKind::Application, "notificationChannels") => {
                        return Some(Target::Stub {
                            segment: segment.to_string(),
                        });
                    }
                    (ResourceKind::Group, "membersContent") => {
                        let suffix = segments[i + 1..]
                            .iter()
                            .map(|s| format!("/{}", s))
                            .collect();
                        return Some(Target::MembersContent { group: uri, suffix });
                    }
                    (ResourceKind::ContentInstance, "content") if last => {
                        return Some(Target::Content { instance: uri });
                    }
                    _ => {}
                }
                let collection = ResourceKind::from_collection_segment(segment)
                    .filter(|c| kind.child_collections().contains(c))?;
                step = Step::Collection(collection);
            }
            Step::Collection(collection) => {
                if collection == ResourceKind::ContentInstances
                    && matches!(segment, "latest" | "oldest")
                {
                    let content = match segments.get(i + 1..) {
                        Some([]) | None => false,
                        Some(["content"]) => true,
                        Some(_) => return None,
                    };
                    return Some(if segment == "latest" {
                        Target::Latest { instances: uri, content }
                    } else {
                        Target::Oldest { instances: uri, content }
                    });
                }
                step = match ResourceKind::from_collection_segment(segment)
                    .filter(|c| collection.child_collections().contains(c))
                {
                    Some(nested) => Step::Collection(nested),
                    None => Step::Item(collection.item_kind()?),
                };
            }
        }
        uri.push('/');
        uri.push_str(segment);
        i += 1;
    }

    let kind = match step {
        Step::Item(kind) | Step::Collection(kind) => kind,
    };
    Some(Target::Resource { uri, kind })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(uri: &str, kind: ResourceKind) -> Option<Target> {
        Some(Target::Resource {
            uri: uri.to_string(),
            kind,
        })
    }

    #[test]
    fn test_stored_resources() {
        assert_eq!(resolve("scl", "/scl"), resource("/scl", ResourceKind::SclBase));
        assert_eq!(
            resolve("scl", "/scl/applications/"),
            resource("/scl/applications", ResourceKind::Applications)
        );
        assert_eq!(
            resolve("scl", "/scl/applications/app1/containers/c1/contentInstances/ci1"),
            resource(
                "/scl/applications/app1/containers/c1/contentInstances/ci1",
                ResourceKind::ContentInstance
            )
        );
        assert_eq!(
            resolve("scl", "/scl/scls/gscl/containers/subscriptions/s1"),
            resource("/scl/scls/gscl/containers/subscriptions/s1", ResourceKind::Subscription)
        );
    }

    #[test]
    fn test_virtual_resources() {
        assert_eq!(
            resolve("scl", "/scl/containers/c1/contentInstances/latest"),
            Some(Target::Latest {
                instances: "/scl/containers/c1/contentInstances".into(),
                content: false
            })
        );
        assert_eq!(
            resolve("scl", "/scl/containers/c1/contentInstances/oldest/content"),
            Some(Target::Oldest {
                instances: "/scl/containers/c1/contentInstances".into(),
                content: true
            })
        );
        assert_eq!(
            resolve("scl", "/scl/containers/c1/contentInstances/ci1/content"),
            Some(Target::Content {
                instance: "/scl/containers/c1/contentInstances/ci1".into()
            })
        );
        assert_eq!(
            resolve("scl", "/scl/groups/g1/membersContent/contentInstances"),
            Some(Target::MembersContent {
                group: "/scl/groups/g1".into(),
                suffix: "/contentInstances".into()
            })
        );
        assert_eq!(
            resolve("scl", "/scl/discovery"),
            Some(Target::Discovery { base: "/scl".into() })
        );
        assert!(matches!(
            resolve("scl", "/scl/applications/a/notificationChannels/n1"),
            Some(Target::Stub { .. })
        ));
    }

    #[test]
    fn test_unknown_shapes() {
        assert_eq!(resolve("scl", "/other/applications"), None);
        assert_eq!(resolve("scl", "scl/applications"), None);
        assert_eq!(resolve("scl", "/scl/widgets"), None);
        assert_eq!(resolve("scl", "/scl/containers/c1/applications"), None);
        assert_eq!(resolve("scl", "/scl//containers"), None);
        assert_eq!(resolve("scl", "/scl/containers/c1/contentInstances/latest/x"), None);
        assert_eq!(resolve("scl", "/scl/containers/c1/discovery"), None);
    }
}
