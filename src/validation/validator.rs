//! Representation validator
//!
//! Checks a client representation against the rule table of its resource
//! kind. Uses the Chain of Responsibility pattern: each rule inspects the
//! parsed document and the first failure stops the chain.

use super::rules::{AttributeType, Presence, ResourceRules, rules_for};
use crate::core::{AnnounceTo, Permission, ResourceKind, Result, SclError};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Operation a representation is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Create,
    Update,
}

/// Trait for validation rules (Chain of Responsibility pattern)
pub trait RepresentationRule: Send + Sync {
    fn check(&self, rules: &ResourceRules, phase: Phase, document: &Map<String, Value>) -> Result<()>;
}

/// Rejects attributes the kind does not define
#[derive(Debug, Clone, Default)]
pub struct KnownAttributesRule;

impl RepresentationRule for KnownAttributesRule {
    fn check(&self, rules: &ResourceRules, _phase: Phase, document: &Map<String, Value>) -> Result<()> {
        match document.keys().find(|name| rules.attribute(name).is_none()) {
            Some(unknown) => Err(SclError::bad_request(format!(
                "unknown attribute '{}' for {}",
                unknown, rules.kind
            ))),
            None => Ok(()),
        }
    }
}

/// Checks every attribute has the JSON shape its rule declares
#[derive(Debug, Clone, Default)]
pub struct AttributeTypeRule;

impl AttributeTypeRule {
    fn check_value(name: &str, ty: AttributeType, value: &Value) -> Result<()> {
        let valid = match ty {
            AttributeType::Text => value.is_string(),
            AttributeType::Integer => value.is_i64(),
            AttributeType::Object => value.is_object(),
            AttributeType::TextList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            AttributeType::Timestamp => value
                .as_str()
                .is_some_and(|raw| raw.parse::<DateTime<Utc>>().is_ok()),
            AttributeType::Permissions => {
                serde_json::from_value::<Vec<Permission>>(value.clone()).is_ok()
            }
            AttributeType::AnnounceTo => {
                if value.get("announced").is_some() {
                    return Err(SclError::bad_request(
                        "announceTo.announced is system-assigned",
                    ));
                }
                serde_json::from_value::<AnnounceTo>(value.clone()).is_ok()
            }
        };

        if valid {
            Ok(())
        } else {
            Err(SclError::bad_request(format!(
                "attribute '{}' must be {:?}, got {}",
                name, ty, value
            )))
        }
    }
}

impl RepresentationRule for AttributeTypeRule {
    fn check(&self, rules: &ResourceRules, phase: Phase, document: &Map<String, Value>) -> Result<()> {
        for (name, value) in document {
            if value.is_null() && phase == Phase::Update && rules.is_clearable(name) {
                continue;
            }
            if let Some(rule) = rules.attribute(name) {
                Self::check_value(name, rule.ty, value)?;
            }
        }
        Ok(())
    }
}

/// Enforces Mandatory / NotPermitted presence for the phase
#[derive(Debug, Clone, Default)]
pub struct PresenceRule;

impl RepresentationRule for PresenceRule {
    fn check(&self, rules: &ResourceRules, phase: Phase, document: &Map<String, Value>) -> Result<()> {
        for rule in rules.all_attributes() {
            let presence = match phase {
                Phase::Create => rule.on_create,
                Phase::Update => rule.on_update,
            };
            let supplied = document.get(rule.name).is_some_and(|v| !v.is_null());
            match presence {
                Presence::Mandatory if !supplied => {
                    return Err(SclError::bad_request(format!(
                        "mandatory attribute '{}' is missing",
                        rule.name
                    )));
                }
                Presence::NotPermitted if supplied => {
                    return Err(SclError::bad_request(format!(
                        "attribute '{}' is not permitted",
                        rule.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Main representation validator using Chain of Responsibility
pub struct RepresentationValidator {
    rules: Vec<Box<dyn RepresentationRule>>,
}

impl RepresentationValidator {
    /// Schema checks first (known attributes, shapes), then presence rules
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(KnownAttributesRule),
                Box::new(AttributeTypeRule),
                Box::new(PresenceRule),
            ],
        }
    }

    pub fn add_rule(mut self, rule: Box<dyn RepresentationRule>) -> Self {
        self.rules.push(rule);
        self
    }

    /// A representation must be present and be a JSON object
    pub fn parse(representation: Option<&str>) -> Result<Map<String, Value>> {
        let raw = representation
            .filter(|raw| !raw.trim().is_empty())
            .ok_or_else(|| SclError::bad_request("representation is missing"))?;
        match serde_json::from_str::<Value>(raw)? {
            Value::Object(document) => Ok(document),
            other => Err(SclError::bad_request(format!(
                "representation must be an object, got {}",
                other
            ))),
        }
    }

    pub fn validate(&self, kind: ResourceKind, phase: Phase, document: &Map<String, Value>) -> Result<()> {
        let rules = rules_for(kind);
        for rule in &self.rules {
            rule.check(rules, phase, document)?;
        }
        Ok(())
    }
}

impl Default for RepresentationValidator {
    fn default() -> Self {
        Self::new()
    }
}
