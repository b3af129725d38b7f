//! HTTP routes for the partner tree
//!
//! ## Endpoints
//!
//! - `GET /partners/tree` - Per-descendant lead counts for the caller's subtree
//! - `GET /partners/integrity` - Forest integrity report (administrators only)

use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::hierarchy::check_forest;
use crate::leads::DescendantSummary;
use crate::routes::{
    authenticate, cors_preflight, error_response, json_response, BoxBody, ErrorResponse,
};
use crate::server::AppState;
use crate::types::{PartnerCode, TrellisError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeResponse {
    pub items: Vec<DescendantSummary>,
    pub requester_code: PartnerCode,
}

/// Handle /partners/* routes; None when the path belongs elsewhere
pub async fn handle_partner_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if !path.starts_with("/partners") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    let path = path.split('?').next().unwrap_or(path).to_string();

    let response = match (method, path.as_str()) {
        (&Method::GET, "/partners/tree") => handle_tree(req, state).await,
        (&Method::GET, "/partners/integrity") => handle_integrity(req, state).await,
        (_, "/partners/tree") | (_, "/partners/integrity") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
            },
        ),
        _ => json_response(
            StatusCode::NOT_FOUND,
            &ErrorResponse {
                error: "Endpoint not found".into(),
            },
        ),
    };

    Some(response)
}

async fn handle_tree(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state) {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    match state.aggregation.per_descendant(&identity.code).await {
        Ok(items) => json_response(
            StatusCode::OK,
            &TreeResponse {
                items,
                requester_code: identity.code,
            },
        ),
        Err(e) => error_response(e),
    }
}

async fn handle_integrity(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state) {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    if !identity.role.is_admin() {
        return error_response(TrellisError::Forbidden(
            "Integrity reports require administrator role".into(),
        ));
    }

    match check_forest(state.partners.as_ref()).await {
        Ok(report) => json_response(StatusCode::OK, &report),
        Err(e) => error_response(e),
    }
}
