//! HTTP routes for scoped lead access
//!
//! ## Endpoints
//!
//! - `GET /leads` - Scoped listing with status/search filters and pagination
//! - `GET /leads/stats` - Total and per-status counts over the visible scope
//! - `PUT /leads/{id}/status` - Lifecycle transition on an owned lead
//!
//! Every endpoint builds the identity context first, resolves the caller's
//! visible scope once, and answers in storage-independent shapes. The
//! `code` and `mine` query parameters narrow the scope, never widen it.

use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::auth::Identity;
use crate::db::schemas::LeadDoc;
use crate::leads::{LeadQuery, LeadStatus};
use crate::routes::{
    authenticate, cors_preflight, error_response, json_response, parse_json_body, query_param,
    BoxBody, ErrorResponse,
};
use crate::scope::{ScopePolicy, ScopeSelector};
use crate::server::AppState;
use crate::types::{PartnerCode, Result, TrellisError};

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

// =============================================================================
// Response Types
// =============================================================================

/// One lead as returned to callers, independent of storage column names
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadView {
    pub id: String,
    pub marketer_code: PartnerCode,
    pub status: LeadStatus,
    pub submitted_at: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub install_location: String,
    pub service_type: String,
    pub memo: String,
    /// Whether the requesting caller may mutate this lead
    pub can_edit: bool,
}

impl LeadView {
    /// Project a stored lead for a specific caller
    pub fn for_caller(lead: LeadDoc, identity: &Identity) -> Self {
        let owner = lead.owner();
        Self {
            id: lead.id_hex(),
            can_edit: ScopePolicy::can_mutate(identity, &owner),
            marketer_code: owner,
            status: lead.status,
            submitted_at: lead
                .submitted_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
            customer_name: lead.customer_name,
            customer_phone: lead.customer_phone,
            install_location: lead.install_location,
            service_type: lead.service_type,
            memo: lead.memo,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadListResponse {
    pub items: Vec<LeadView>,
    pub pagination: PaginationInfo,
    pub requester_code: PartnerCode,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

// =============================================================================
// Dispatch
// =============================================================================

/// Handle /leads/* routes; None when the path belongs elsewhere
pub async fn handle_lead_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Option<Response<BoxBody>> {
    let path = req.uri().path();
    let method = req.method();

    if !path.starts_with("/leads") {
        return None;
    }

    if method == Method::OPTIONS {
        return Some(cors_preflight());
    }

    // Remove query string for matching
    let path = path.split('?').next().unwrap_or(path).to_string();

    let response = match (method, path.as_str()) {
        (&Method::GET, "/leads") => handle_list(req, state).await,
        (&Method::GET, "/leads/stats") => handle_stats(req, state).await,
        (&Method::PUT, _) => {
            if let Some(id) = status_target_id(&path) {
                handle_status_update(req, state, id).await
            } else {
                not_found()
            }
        }
        (_, "/leads") | (_, "/leads/stats") => json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            &ErrorResponse {
                error: "Method not allowed".into(),
            },
        ),
        _ => not_found(),
    };

    Some(response)
}

/// Match `/leads/{id}/status` and pull out the id segment
fn status_target_id(path: &str) -> Option<String> {
    let rest = path.strip_prefix("/leads/")?;
    let (id, tail) = rest.split_once('/')?;
    if tail == "status" && !id.is_empty() {
        Some(id.to_string())
    } else {
        None
    }
}

fn not_found() -> Response<BoxBody> {
    json_response(
        StatusCode::NOT_FOUND,
        &ErrorResponse {
            error: "Endpoint not found".into(),
        },
    )
}

// =============================================================================
// Query parsing
// =============================================================================

/// Scope narrowing requested via query parameters.
/// An explicit `code` wins over the `mine` toggle.
pub(crate) fn selector_from_query(query: Option<&str>) -> ScopeSelector {
    if let Some(code) = query_param(query, "code") {
        return ScopeSelector::Only(PartnerCode::new(code));
    }
    if query_param(query, "mine").map_or(false, |v| v == "true" || v == "1") {
        return ScopeSelector::Mine;
    }
    ScopeSelector::Subtree
}

fn parse_pagination(query: Option<&str>) -> Result<(u32, u32)> {
    let page = match query_param(query, "page") {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|p| *p >= 1)
            .ok_or_else(|| TrellisError::BadRequest(format!("Invalid page '{}'", raw)))?,
        None => 1,
    };

    let page_size = match query_param(query, "pageSize") {
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|s| *s >= 1)
            .ok_or_else(|| TrellisError::BadRequest(format!("Invalid pageSize '{}'", raw)))?
            .min(MAX_PAGE_SIZE),
        None => DEFAULT_PAGE_SIZE,
    };

    Ok((page, page_size))
}

fn parse_status_filter(query: Option<&str>) -> Result<Option<LeadStatus>> {
    match query_param(query, "status") {
        Some(raw) => raw
            .parse::<LeadStatus>()
            .map(Some)
            .map_err(TrellisError::BadRequest),
        None => Ok(None),
    }
}

fn total_pages(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size))
}

// =============================================================================
// Handlers
// =============================================================================

async fn handle_list(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state) {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    let query = req.uri().query();
    let result = list_leads(&state, &identity, query).await;

    match result {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(e) => error_response(e),
    }
}

async fn list_leads(
    state: &AppState,
    identity: &Identity,
    query: Option<&str>,
) -> Result<LeadListResponse> {
    let (page, page_size) = parse_pagination(query)?;
    let status = parse_status_filter(query)?;
    let selector = selector_from_query(query);

    let scope = state.policy.visible_codes(identity, &selector).await?;

    let (items, total) = state
        .leads
        .query(&LeadQuery {
            scope,
            status,
            search: query_param(query, "search"),
            page,
            page_size,
        })
        .await?;

    debug!(
        caller = %identity.code,
        total,
        page,
        "Scoped lead listing served"
    );

    Ok(LeadListResponse {
        items: items
            .into_iter()
            .map(|lead| LeadView::for_caller(lead, identity))
            .collect(),
        pagination: PaginationInfo {
            page,
            page_size,
            total,
            total_pages: total_pages(total, page_size),
        },
        requester_code: identity.code.clone(),
    })
}

async fn handle_stats(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state) {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    let query = req.uri().query();
    let selector = selector_from_query(query);

    let result = async {
        let scope = state.policy.visible_codes(&identity, &selector).await?;
        state.aggregation.stats(&scope).await
    }
    .await;

    match result {
        Ok(stats) => json_response(StatusCode::OK, &stats),
        Err(e) => error_response(e),
    }
}

async fn handle_status_update(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    lead_id: String,
) -> Response<BoxBody> {
    let identity = match authenticate(&req, &state) {
        Ok(identity) => identity,
        Err(e) => return error_response(e),
    };

    let body: StatusUpdateRequest = match parse_json_body(req).await {
        Ok(body) => body,
        Err(e) => return error_response(e),
    };

    match state
        .lifecycle
        .transition(&lead_id, &body.status, &identity)
        .await
    {
        Ok(updated) => json_response(StatusCode::OK, &LeadView::for_caller(updated, &identity)),
        Err(e) => error_response(e),
    }
}
