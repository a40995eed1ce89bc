//! Outbound operations against remote SCLs.

mod http;
mod loopback;

pub use http::HttpRestClient;
pub use loopback::LoopbackClient;

use crate::core::{Operation, OperationResult};
use async_trait::async_trait;

/// Sends an operation to the SCL addressed by `operation.base`.
///
/// Transport failures are reported as error results, never as `Err`, so
/// callers treat remote outcomes uniformly.
#[async_trait]
pub trait RestClient: Send + Sync {
    async fn send(&self, operation: Operation) -> OperationResult;
}

/// Splits an absolute address (`http://host:port/path`) into base and path.
/// A bare path yields no base.
pub fn split_address(address: &str) -> (Option<String>, String) {
    let Some(scheme_end) = address.find("://") else {
        return (None, address.to_string());
    };
    let authority_start = scheme_end + 3;
    match address[authority_start..].find('/') {
        Some(offset) => {
            let split = authority_start + offset;
            (Some(address[..split].to_string()), address[split..].to_string())
        }
        None => (Some(address.to_string()), "/".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::split_address;

    #[test]
    fn test_split_address() {
        assert_eq!(
            split_address("http://10.0.0.1:8080/monitor/notify"),
            (Some("http://10.0.0.1:8080".to_string()), "/monitor/notify".to_string())
        );
        assert_eq!(
            split_address("http://10.0.0.1:8080"),
            (Some("http://10.0.0.1:8080".to_string()), "/".to_string())
        );
        assert_eq!(split_address("/nscl/applications"), (None, "/nscl/applications".to_string()));
    }
}
