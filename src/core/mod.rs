pub mod error;
pub mod resource;
pub mod types;

pub use error::{Result, SclError};
pub use resource::{
    AnnounceTo, AnnouncedShadow, Flag, Permission, Resource, ResourceKind, ResourceTree, child_uri,
    is_within, parent_uri,
};
pub use types::{Method, Operation, OperationResult, StatusCode};
