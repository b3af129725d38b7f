//! Configuration for Trellis
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Trellis - referral-partner back office
#[derive(Parser, Debug, Clone)]
#[command(name = "trellis")]
#[command(about = "Hierarchy-scoped lead management for referral partners")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "trellis")]
    pub mongodb_db: String,

    /// Enable development mode (in-memory stores, insecure JWT secret allowed)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// JWT secret for token verification (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Reserved code prefix marking administrator accounts
    #[arg(long, env = "ADMIN_CODE_PREFIX", default_value = "A")]
    pub admin_code_prefix: String,

    /// Webhook URL for lead lifecycle notifications (optional)
    #[arg(long, env = "WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Timeout for one notification dispatch in milliseconds
    #[arg(long, env = "NOTIFY_TIMEOUT_MS", default_value = "5000")]
    pub notify_timeout_ms: u64,

    /// Concurrency cap for count fan-outs against storage
    #[arg(long, env = "COUNT_CONCURRENCY", default_value = "8")]
    pub count_concurrency: usize,

    /// Run the referral-tree integrity sweep at startup
    #[arg(long, env = "INTEGRITY_SWEEP", default_value = "true")]
    pub integrity_sweep: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(secret) if secret.len() < 32 => {
                    return Err("JWT_SECRET must be at least 32 characters".to_string())
                }
                Some(_) => {}
            }
        }

        if self.admin_code_prefix.is_empty() {
            return Err("ADMIN_CODE_PREFIX must not be empty".to_string());
        }

        if self.count_concurrency == 0 {
            return Err("COUNT_CONCURRENCY must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["trellis", "--dev-mode"])
    }

    #[test]
    fn test_dev_mode_needs_no_secret() {
        let args = base_args();
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_production_requires_secret() {
        let args = Args::parse_from(["trellis"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let args = Args::parse_from(["trellis", "--jwt-secret", "short"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_long_secret_accepted() {
        let args = Args::parse_from([
            "trellis",
            "--jwt-secret",
            "this-secret-is-at-least-32-chars-long",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let args = Args::parse_from(["trellis", "--dev-mode", "--count-concurrency", "0"]);
        assert!(args.validate().is_err());
    }
}
