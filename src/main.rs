//! Trellis - referral-partner back office

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trellis::{
    auth::{IdentityVerifier, JwtVerifier},
    config::Args,
    db::MongoClient,
    hierarchy::{self, MemoryPartnerStore, MongoPartnerStore, PartnerStore},
    leads::{LeadStore, MemoryLeadStore, MongoLeadStore},
    notify::{NoopNotifier, Notifier, WebhookNotifier},
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("trellis={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Trellis - Referral Partner Office");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Admin code prefix: {}", args.admin_code_prefix);
    info!("Count concurrency: {}", args.count_concurrency);
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Build the storage boundaries
    let (partners, leads): (Arc<dyn PartnerStore>, Arc<dyn LeadStore>) = match &mongo {
        Some(client) => {
            let partners = MongoPartnerStore::new(client).await?;
            let leads = MongoLeadStore::new(client).await?;
            (Arc::new(partners), Arc::new(leads))
        }
        None => (
            Arc::new(MemoryPartnerStore::new()),
            Arc::new(MemoryLeadStore::new()),
        ),
    };

    // Credential verifier: one explicit instance per process
    let verifier: Arc<dyn IdentityVerifier> = match &args.jwt_secret {
        Some(secret) => Arc::new(JwtVerifier::new(
            secret.clone(),
            args.jwt_expiry_seconds,
            args.admin_code_prefix.clone(),
        )?),
        None => {
            warn!("Using dev-mode JWT secret (not for production)");
            Arc::new(JwtVerifier::new_dev(args.admin_code_prefix.clone()))
        }
    };

    // Notification dispatch: webhook when configured, otherwise a no-op
    let notifier: Arc<dyn Notifier> = match &args.webhook_url {
        Some(url) => {
            info!("Notification webhook: {}", url);
            Arc::new(WebhookNotifier::new(url.clone(), args.notify_timeout_ms)?)
        }
        None => {
            info!("No webhook configured, notifications are logged only");
            Arc::new(NoopNotifier)
        }
    };

    // One-shot integrity sweep in the background, off the request path
    if args.integrity_sweep {
        let _sweep = hierarchy::spawn_startup_sweep(Arc::clone(&partners));
        info!("Referral tree integrity sweep scheduled");
    }

    let state = Arc::new(AppState::new(
        args, mongo, verifier, partners, leads, notifier,
    ));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
