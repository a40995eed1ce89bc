//! HTTP status table of the protocol adapter.

use crate::core::StatusCode;

/// HTTP status sent for an operation outcome.
pub fn to_http(status: StatusCode) -> u16 {
    match status {
        StatusCode::Ok => 200,
        StatusCode::Created => 201,
        StatusCode::Accepted => 202,
        StatusCode::BadRequest => 400,
        StatusCode::PermissionDenied
        | StatusCode::AuthorizationNotAdded
        | StatusCode::Forbidden => 403,
        StatusCode::NotFound | StatusCode::Expired | StatusCode::Deleted => 404,
        StatusCode::MethodNotAllowed => 405,
        StatusCode::NotAcceptable => 406,
        StatusCode::RequestTimeout => 408,
        StatusCode::Conflict => 409,
        StatusCode::UnsupportedMediaType => 415,
        StatusCode::InternalServerError => 500,
        StatusCode::NotImplemented => 501,
        StatusCode::BadGateway => 502,
        StatusCode::ServiceUnavailable => 503,
        StatusCode::GatewayTimeout => 504,
    }
}

/// Operation outcome for an HTTP status received from a remote SCL.
///
/// Codes shared by several outcomes map to the first of them; codes outside
/// the table fall back by class.
pub fn from_http(code: u16) -> StatusCode {
    match code {
        200 => StatusCode::Ok,
        201 => StatusCode::Created,
        202 => StatusCode::Accepted,
        400 => StatusCode::BadRequest,
        403 => StatusCode::PermissionDenied,
        404 => StatusCode::NotFound,
        405 => StatusCode::MethodNotAllowed,
        406 => StatusCode::NotAcceptable,
        408 => StatusCode::RequestTimeout,
        409 => StatusCode::Conflict,
        415 => StatusCode::UnsupportedMediaType,
        500 => StatusCode::InternalServerError,
        501 => StatusCode::NotImplemented,
        502 => StatusCode::BadGateway,
        503 => StatusCode::ServiceUnavailable,
        504 => StatusCode::GatewayTimeout,
        200..=299 => StatusCode::Ok,
        400..=499 => StatusCode::BadRequest,
        _ => StatusCode::InternalServerError,
    }
}
