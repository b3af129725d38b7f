//! HTTP routes for Trellis

pub mod health;
pub mod leads;
pub mod partners;

pub use health::{health_check, readiness_check, version_info};
pub use leads::handle_lead_request;
pub use partners::handle_partner_request;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::{extract_token_from_header, Identity};
use crate::server::AppState;
use crate::types::{Result, TrellisError};

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Standard error body shape
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, PUT, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

pub(crate) fn error_response(err: TrellisError) -> Response<BoxBody> {
    let (status, message) = err.into_status_code_and_body();
    json_response(status, &ErrorResponse { error: message })
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, PUT, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

/// Build the identity context from the Authorization header
pub(crate) fn authenticate<B>(req: &Request<B>, state: &Arc<AppState>) -> Result<Identity> {
    let header = req
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok());

    let token = extract_token_from_header(header)
        .ok_or_else(|| TrellisError::Unauthorized("Missing bearer credential".into()))?;

    state.verifier.verify(token)
}

/// Read a JSON body, bounded to keep malformed clients cheap
pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<hyper::body::Incoming>,
) -> Result<T> {
    let body = req
        .collect()
        .await
        .map_err(|e| TrellisError::BadRequest(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 10240 {
        return Err(TrellisError::BadRequest("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| TrellisError::BadRequest(format!("Invalid JSON: {}", e)))
}

/// Extract one query parameter from a raw query string, percent-decoded
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    let query = query?;
    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            if key == name {
                let value = urlencoding::decode(value).unwrap_or_default();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        assert_eq!(
            query_param(Some("page=3&pageSize=20"), "page"),
            Some("3".into())
        );
        assert_eq!(
            query_param(Some("page=3&pageSize=20"), "pageSize"),
            Some("20".into())
        );
        assert_eq!(query_param(Some("page="), "page"), None);
        assert_eq!(query_param(Some("foo=bar"), "page"), None);
        assert_eq!(query_param(None, "page"), None);
    }

    #[test]
    fn test_query_param_percent_decodes() {
        assert_eq!(
            query_param(Some("search=new%20york"), "search"),
            Some("new york".into())
        );
        // Multibyte terms arrive encoded
        assert_eq!(
            query_param(Some("search=%EC%84%9C%EC%9A%B8"), "search"),
            Some("서울".into())
        );
        assert_eq!(query_param(Some("search=%2520"), "search"), Some("%20".into()));
    }
}
