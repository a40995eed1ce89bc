//! Representation validation
//!
//! - `rules.rs` - per-kind attribute table (mandatory / optional / not permitted)
//! - `validator.rs` - rule chain applied to client representations
//! - `ids.rs` - id syntax and generation

pub mod ids;
pub mod rules;
pub mod validator;

pub use rules::{AttributeRule, AttributeType, DuplicateId, Presence, ResourceRules, rules_for};
pub use validator::{Phase, RepresentationRule, RepresentationValidator};
