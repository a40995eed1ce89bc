use crate::core::{Result, SclError};
use lazy_static::lazy_static;
use regex::Regex;
use uuid::Uuid;

lazy_static! {
    static ref ID_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9._~-]+$").expect("valid id pattern");
}

/// Segment names the path grammar gives a meaning of their own.
pub const RESERVED_IDS: &[&str] = &[
    "latest",
    "oldest",
    "content",
    "membersContent",
    "subscriptions",
    "discovery",
];

pub fn validate_id(id: &str) -> Result<()> {
    if !ID_PATTERN.is_match(id) {
        return Err(SclError::bad_request(format!(
            "id '{}' must match {}",
            id,
            ID_PATTERN.as_str()
        )));
    }
    if RESERVED_IDS.contains(&id) {
        return Err(SclError::bad_request(format!("id '{}' is reserved", id)));
    }
    Ok(())
}

fn random_suffix() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw[..10].to_string()
}

/// Fresh id for a resource created without one.
pub fn generate_id(prefix: &str) -> String {
    format!("{}{}", prefix, random_suffix())
}

/// Replacement for a client id that collides with a sibling.
pub fn disambiguate(id: &str) -> String {
    format!("{}_{}", id, random_suffix())
}
