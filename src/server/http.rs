//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Every request is
//! handled independently: identity context, one hierarchy resolution,
//! scoped storage calls, response. No state is shared between requests
//! beyond the read-only application wiring.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::auth::IdentityVerifier;
use crate::config::Args;
use crate::db::MongoClient;
use crate::hierarchy::{HierarchyResolver, PartnerStore};
use crate::leads::{AggregationEngine, LeadStore, LifecycleEngine};
use crate::notify::Notifier;
use crate::routes;
use crate::scope::ScopePolicy;
use crate::types::TrellisError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// Credential verification boundary, constructed once per process
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Partner hierarchy storage
    pub partners: Arc<dyn PartnerStore>,
    /// Lead storage
    pub leads: Arc<dyn LeadStore>,
    /// Visible/mutable scope derivation
    pub policy: ScopePolicy,
    /// Status transitions and owner notification
    pub lifecycle: LifecycleEngine,
    /// Scoped counts and tree listings
    pub aggregation: AggregationEngine,
}

impl AppState {
    /// Wire the core components over the given boundaries
    pub fn new(
        args: Args,
        mongo: Option<MongoClient>,
        verifier: Arc<dyn IdentityVerifier>,
        partners: Arc<dyn PartnerStore>,
        leads: Arc<dyn LeadStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let resolver = HierarchyResolver::new(Arc::clone(&partners));
        let policy = ScopePolicy::new(resolver.clone());
        let lifecycle = LifecycleEngine::new(
            Arc::clone(&leads),
            Arc::clone(&partners),
            notifier,
        );
        let aggregation = AggregationEngine::new(
            Arc::clone(&leads),
            Arc::clone(&partners),
            resolver,
            args.count_concurrency,
        );

        Self {
            args,
            mongo,
            verifier,
            partners,
            leads,
            policy,
            lifecycle,
            aggregation,
        }
    }
}

/// Convert a plain Full body response into the boxed body type
fn boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// Route one request through the handler chain
async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!(%method, %path, "Incoming request");

    // Health endpoints carry no identity context
    let response = match (&method, path.as_str()) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => {
            boxed(routes::health_check(Arc::clone(&state)))
        }
        (&Method::GET, "/ready") | (&Method::GET, "/readyz") => {
            boxed(routes::readiness_check(Arc::clone(&state)))
        }
        (&Method::GET, "/version") => boxed(routes::version_info()),
        _ if path.starts_with("/leads") => {
            match routes::handle_lead_request(req, Arc::clone(&state)).await {
                Some(response) => response,
                None => not_found_response(),
            }
        }
        _ if path.starts_with("/partners") => {
            match routes::handle_partner_request(req, Arc::clone(&state)).await {
                Some(response) => response,
                None => not_found_response(),
            }
        }
        _ => not_found_response(),
    };

    Ok(response)
}

fn not_found_response() -> Response<BoxBody> {
    let body = serde_json::json!({ "error": "Not found" }).to_string();
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(
            Full::new(Bytes::from(body))
                .map_err(|never| match never {})
                .boxed(),
        )
        .unwrap()
}

/// Run the HTTP server until the process is stopped
pub async fn run(state: Arc<AppState>) -> Result<(), TrellisError> {
    let listener = TcpListener::bind(state.args.listen)
        .await
        .map_err(|e| TrellisError::Internal(format!("Failed to bind {}: {}", state.args.listen, e)))?;

    info!("Listening on {}", state.args.listen);

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                continue;
            }
        };

        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let io = TokioIo::new(stream);
            let service = service_fn(move |req| handle_request(req, Arc::clone(&state)));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!(%remote, "Connection ended: {}", e);
            }
        });
    }
}
