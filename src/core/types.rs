use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;

/// Protocol-independent outcome of an operation.
///
/// Each protocol adapter owns the mapping of these codes onto its own status
/// space (see [`crate::web::status`] for the HTTP table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Ok,
    Created,
    Accepted,
    BadRequest,
    PermissionDenied,
    AuthorizationNotAdded,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    RequestTimeout,
    Conflict,
    UnsupportedMediaType,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    Expired,
    Deleted,
}

impl StatusCode {
    pub const ALL: [StatusCode; 20] = [
        StatusCode::Ok,
        StatusCode::Created,
        StatusCode::Accepted,
        StatusCode::BadRequest,
        StatusCode::PermissionDenied,
        StatusCode::AuthorizationNotAdded,
        StatusCode::Forbidden,
        StatusCode::NotFound,
        StatusCode::MethodNotAllowed,
        StatusCode::NotAcceptable,
        StatusCode::RequestTimeout,
        StatusCode::Conflict,
        StatusCode::UnsupportedMediaType,
        StatusCode::InternalServerError,
        StatusCode::NotImplemented,
        StatusCode::BadGateway,
        StatusCode::ServiceUnavailable,
        StatusCode::GatewayTimeout,
        StatusCode::Expired,
        StatusCode::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "CREATED",
            StatusCode::Accepted => "ACCEPTED",
            StatusCode::BadRequest => "BAD_REQUEST",
            StatusCode::PermissionDenied => "PERMISSION_DENIED",
            StatusCode::AuthorizationNotAdded => "AUTHORIZATION_NOT_ADDED",
            StatusCode::Forbidden => "FORBIDDEN",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            StatusCode::NotAcceptable => "NOT_ACCEPTABLE",
            StatusCode::RequestTimeout => "REQUEST_TIMEOUT",
            StatusCode::Conflict => "CONFLICT",
            StatusCode::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            StatusCode::InternalServerError => "INTERNAL_SERVER_ERROR",
            StatusCode::NotImplemented => "NOT_IMPLEMENTED",
            StatusCode::BadGateway => "BAD_GATEWAY",
            StatusCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            StatusCode::GatewayTimeout => "GATEWAY_TIMEOUT",
            StatusCode::Expired => "EXPIRED",
            StatusCode::Deleted => "DELETED",
        }
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            StatusCode::Ok | StatusCode::Created | StatusCode::Accepted | StatusCode::Deleted
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation verb carried by every [`Operation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Create,
    Retrieve,
    Update,
    Delete,
    Execute,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Create => "CREATE",
            Method::Retrieve => "RETRIEVE",
            Method::Update => "UPDATE",
            Method::Delete => "DELETE",
            Method::Execute => "EXECUTE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound (or outbound) request, independent of the wire protocol it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub method: Method,
    pub target_path: String,
    pub identity: String,
    pub representation: Option<String>,
    pub parameters: BTreeMap<String, Vec<String>>,
    /// Base address of the SCL the operation is sent to, for outbound calls.
    pub base: Option<String>,
}

impl Operation {
    pub fn new(method: Method, target_path: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            method,
            target_path: target_path.into(),
            identity: identity.into(),
            representation: None,
            parameters: BTreeMap::new(),
            base: None,
        }
    }

    pub fn with_representation(mut self, representation: impl Into<String>) -> Self {
        self.representation = Some(representation.into());
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    /// Same method, identity and representation aimed at another path.
    pub fn retarget(&self, target_path: impl Into<String>) -> Self {
        Self {
            method: self.method,
            target_path: target_path.into(),
            identity: self.identity.clone(),
            representation: self.representation.clone(),
            parameters: self.parameters.clone(),
            base: None,
        }
    }

    /// First value of a query parameter.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn parameter_values(&self, name: &str) -> &[String] {
        self.parameters
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Response to an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub status_code: StatusCode,
    pub representation: Option<String>,
    pub resource_uri: Option<String>,
}

impl OperationResult {
    pub fn new(status_code: StatusCode, representation: Option<String>) -> Self {
        Self {
            status_code,
            representation,
            resource_uri: None,
        }
    }

    pub fn ok(representation: impl Into<String>) -> Self {
        Self::new(StatusCode::Ok, Some(representation.into()))
    }

    pub fn created(representation: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            status_code: StatusCode::Created,
            representation: Some(representation.into()),
            resource_uri: Some(uri.into()),
        }
    }

    /// Error result whose body carries the status and a human readable reason.
    pub fn error(status_code: StatusCode, message: impl Into<String>) -> Self {
        let body = json!({
            "statusCode": status_code,
            "additionalInfo": message.into(),
        });
        Self::new(status_code, Some(body.to_string()))
    }

    #[inline]
    pub fn is_success(&self) -> bool {
        self.status_code.is_success()
    }
}
