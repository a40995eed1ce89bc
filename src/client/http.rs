use super::RestClient;
use crate::core::{Method, Operation, OperationResult, Result, SclError, StatusCode};
use crate::web::status;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use std::time::Duration;
use tracing::{debug, warn};

/// [`RestClient`] speaking the HTTP binding to remote SCLs.
#[derive(Clone)]
pub struct HttpRestClient {
    client: reqwest::Client,
}

impl HttpRestClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SclError::Internal(format!("http client: {}", err)))?;
        Ok(Self { client })
    }

    fn http_method(method: Method) -> reqwest::Method {
        match method {
            Method::Create => reqwest::Method::POST,
            Method::Retrieve => reqwest::Method::GET,
            Method::Update => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
            Method::Execute => {
                reqwest::Method::from_bytes(b"EXECUTE").unwrap_or(reqwest::Method::POST)
            }
        }
    }
}

#[async_trait]
impl RestClient for HttpRestClient {
    async fn send(&self, operation: Operation) -> OperationResult {
        let Some(base) = operation.base.as_deref() else {
            return OperationResult::error(
                StatusCode::ServiceUnavailable,
                format!("no base address for '{}'", operation.target_path),
            );
        };
        let url = format!("{}{}", base.trim_end_matches('/'), operation.target_path);

        let (user, password) = match operation.identity.split_once(':') {
            Some((user, password)) => (user, Some(password)),
            None => (operation.identity.as_str(), None),
        };
        let query: Vec<(&str, &str)> = operation
            .parameters
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
            .collect();

        let mut request = self
            .client
            .request(Self::http_method(operation.method), &url)
            .basic_auth(user, password)
            .query(&query);
        if let Some(body) = operation.representation {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        debug!(method = %operation.method, url = %url, "outbound request");
        match request.send().await {
            Ok(response) => {
                let status_code = status::from_http(response.status().as_u16());
                let resource_uri = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                let representation = response.text().await.ok().filter(|body| !body.is_empty());
                OperationResult {
                    status_code,
                    representation,
                    resource_uri,
                }
            }
            Err(err) => {
                warn!(url = %url, error = %err, "outbound request failed");
                let status_code = if err.is_timeout() {
                    StatusCode::GatewayTimeout
                } else {
                    StatusCode::ServiceUnavailable
                };
                OperationResult::error(status_code, err.to_string())
            }
        }
    }
}
