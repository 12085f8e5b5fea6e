//! Error handling and plain-text error responses for the proxy

use crate::proxy::{full, ProxyBody};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use thiserror::Error;

/// Type-erased error for response bodies
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Header carrying the machine-readable error code
pub const X_PROXY_ERROR: &str = "x-proxy-error";

pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Every way a request can fail. `Display` is the response body text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProxyError {
    /// Path not present in the route table
    #[error("404 Not Found")]
    NotFound,
    /// Upstream could not be reached (DNS, refused, timeout)
    #[error("502 Bad Gateway — upstream unreachable")]
    UpstreamUnreachable,
    /// Upstream answered with a non-success status
    #[error("502 Bad Gateway — upstream returned {0}")]
    UpstreamStatus(u16),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::UpstreamUnreachable | ProxyError::UpstreamStatus(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Get the error code as a string for the X-Proxy-Error header
    pub fn as_header_value(&self) -> &'static str {
        match self {
            ProxyError::NotFound => "NOT_FOUND",
            ProxyError::UpstreamUnreachable => "UPSTREAM_UNREACHABLE",
            ProxyError::UpstreamStatus(_) => "UPSTREAM_STATUS",
        }
    }

    /// Response body, newline terminated
    pub fn body(&self) -> String {
        format!("{}\n", self)
    }
}

/// Create a plain-text error response with X-Proxy-Error header.
/// Error responses are never cacheable, so no cache-control is set.
pub fn error_response(error: &ProxyError) -> Response<ProxyBody> {
    let mut response = Response::new(full(error.body()));
    *response.status_mut() = error.status_code();

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    headers.insert(X_PROXY_ERROR, HeaderValue::from_static(error.as_header_value()));

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::header::CACHE_CONTROL;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ProxyError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ProxyError::UpstreamUnreachable.status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ProxyError::UpstreamStatus(404).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_bodies() {
        assert_eq!(ProxyError::NotFound.body(), "404 Not Found\n");
        assert_eq!(
            ProxyError::UpstreamUnreachable.body(),
            "502 Bad Gateway — upstream unreachable\n"
        );
        assert_eq!(
            ProxyError::UpstreamStatus(503).body(),
            "502 Bad Gateway — upstream returned 503\n"
        );
    }

    #[test]
    fn test_error_header_values() {
        assert_eq!(ProxyError::NotFound.as_header_value(), "NOT_FOUND");
        assert_eq!(
            ProxyError::UpstreamUnreachable.as_header_value(),
            "UPSTREAM_UNREACHABLE"
        );
        assert_eq!(
            ProxyError::UpstreamStatus(500).as_header_value(),
            "UPSTREAM_STATUS"
        );
    }

    #[tokio::test]
    async fn test_error_response() {
        let response = error_response(&ProxyError::UpstreamStatus(404));

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), TEXT_PLAIN);
        assert_eq!(response.headers().get(X_PROXY_ERROR).unwrap(), "UPSTREAM_STATUS");
        assert!(response.headers().get(CACHE_CONTROL).is_none());

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], "502 Bad Gateway — upstream returned 404\n".as_bytes());
    }
}
