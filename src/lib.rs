// ============================================================================
// M2M Service Capability Layer
// ============================================================================

pub mod announcement;
pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod core;
pub mod discovery;
pub mod eviction;
pub mod facade;
pub mod fanout;
pub mod handler;
pub mod notification;
pub mod registration;
pub mod router;
pub mod storage;
pub mod validation;
pub mod web;

// Re-export main types for convenience
pub use client::{HttpRestClient, LoopbackClient, RestClient};
pub use config::{SclConfig, SclRole};
pub use context::SclContext;
pub use core::{
    Flag, Method, Operation, OperationResult, Permission, Resource, ResourceKind, Result,
    SclError, StatusCode,
};
pub use facade::{SclBuilder, SclNode};
pub use notification::{Notification, NotificationSink};
pub use router::Router;
pub use storage::{InMemoryStore, ResourceStore};
pub use web::build_router;
