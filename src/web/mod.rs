//! HTTP protocol adapter
//!
//! Translates HTTP requests into [`Operation`]s and [`OperationResult`]s back
//! into responses. Every path is served by one fallback handler; the router
//! behind it owns path resolution.

pub mod status;

use crate::core::{Method, Operation, OperationResult, StatusCode as SclStatus};
use crate::router::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct WebState {
    router: Router,
    guest_identity: String,
}

/// Failures of the adapter itself, before an operation exists.
#[derive(Debug)]
pub enum WebError {
    UnsupportedMethod(String),
    Credentials(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let result = match self {
            WebError::UnsupportedMethod(method) => OperationResult::error(
                SclStatus::MethodNotAllowed,
                format!("HTTP method {} has no operation", method),
            ),
            WebError::Credentials(message) => {
                OperationResult::error(SclStatus::BadRequest, message)
            }
        };
        OperationResponse(result).into_response()
    }
}

/// An operation result rendered as an HTTP response.
pub struct OperationResponse(pub OperationResult);

impl IntoResponse for OperationResponse {
    fn into_response(self) -> Response {
        let result = self.0;
        let status = StatusCode::from_u16(status::to_http(result.status_code))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut response = match result.representation {
            Some(body) => {
                let content_type = if serde_json::from_str::<serde_json::Value>(&body).is_ok() {
                    "application/json"
                } else {
                    "text/plain; charset=utf-8"
                };
                let mut response = Response::new(Body::from(body));
                response
                    .headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
                response
            }
            None => Response::new(Body::empty()),
        };
        *response.status_mut() = status;

        if result.status_code == SclStatus::Created {
            if let Some(location) = result
                .resource_uri
                .and_then(|uri| HeaderValue::from_str(&uri).ok())
            {
                response.headers_mut().insert(header::LOCATION, location);
            }
        }
        response
    }
}

fn operation_method(method: &http::Method) -> Result<Method, WebError> {
    match method.as_str() {
        "POST" => Ok(Method::Create),
        "GET" => Ok(Method::Retrieve),
        "PUT" => Ok(Method::Update),
        "DELETE" => Ok(Method::Delete),
        "EXECUTE" => Ok(Method::Execute),
        other => Err(WebError::UnsupportedMethod(other.to_string())),
    }
}

/// Identity carried by `Authorization: Basic`, as `user:password`.
fn identity(headers: &HeaderMap) -> Result<Option<String>, WebError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| WebError::Credentials("authorization header is not text".into()))?;
    let Some(encoded) = value.strip_prefix("Basic ") else {
        return Err(WebError::Credentials("only Basic authorization is supported".into()));
    };
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|err| WebError::Credentials(format!("malformed credentials: {}", err)))?;
    String::from_utf8(decoded)
        .map(Some)
        .map_err(|_| WebError::Credentials("credentials are not UTF-8".into()))
}

async fn handle(
    State(state): State<WebState>,
    method: http::Method,
    uri: Uri,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: String,
) -> Result<OperationResponse, WebError> {
    let method = operation_method(&method)?;
    let identity = identity(&headers)?.unwrap_or_else(|| state.guest_identity.clone());

    let mut operation = Operation::new(method, uri.path(), identity);
    if !body.trim().is_empty() {
        operation = operation.with_representation(body);
    }
    for (name, value) in params {
        operation = operation.with_parameter(name, value);
    }

    Ok(OperationResponse(state.router.dispatch(operation).await))
}

/// axum application serving `router` over HTTP.
pub fn build_router(router: Router) -> axum::Router {
    let guest_identity = router.context().config.guest_identity.clone();
    axum::Router::new()
        .fallback(handle)
        .with_state(WebState {
            router,
            guest_identity,
        })
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_credentials() {
        let mut headers = HeaderMap::new();
        assert_eq!(identity(&headers).unwrap(), None);

        let encoded = format!("Basic {}", STANDARD.encode("admin:admin"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&encoded).unwrap());
        assert_eq!(identity(&headers).unwrap().as_deref(), Some("admin:admin"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer x"));
        assert!(identity(&headers).is_err());
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(operation_method(&http::Method::POST).unwrap(), Method::Create);
        let execute = http::Method::from_bytes(b"EXECUTE").unwrap();
        assert_eq!(operation_method(&execute).unwrap(), Method::Execute);
        assert!(operation_method(&http::Method::PATCH).is_err());
    }

    #[test]
    fn test_created_response_carries_location() {
        let response =
            OperationResponse(OperationResult::created("{}", "/scl/containers/c1")).into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/scl/containers/c1"
        );
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
