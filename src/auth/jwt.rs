//! JWT token handling for partner authentication
//!
//! Provides generation and validation of the bearer tokens that carry the
//! (subject, code, role) triple.
//!
//! Security notes:
//! - Tokens are signed with HS256 (HMAC-SHA256)
//! - Default expiry is 1 hour
//! - In production, JWT_SECRET should be a strong random value from environment

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::auth::{Identity, IdentityVerifier, Role};
use crate::types::{PartnerCode, Result, TrellisError};

/// Payload stored in JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Stable subject id (partner document id)
    pub sub: String,
    /// Partner code (normalized form)
    pub code: String,
    /// Role granted at issue time
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

/// Input for creating a new token
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub subject_id: String,
    pub code: PartnerCode,
}

/// JWT verifier and generator
#[derive(Clone)]
pub struct JwtVerifier {
    secret: String,
    expiry_seconds: u64,
    admin_prefix: String,
}

impl JwtVerifier {
    /// Create a new JWT verifier
    ///
    /// Returns an error if the secret is empty or too short
    pub fn new(secret: String, expiry_seconds: u64, admin_prefix: String) -> Result<Self> {
        if secret.is_empty() {
            return Err(TrellisError::Config(
                "JWT_SECRET is required in production mode".into(),
            ));
        }

        if secret.len() < 32 {
            return Err(TrellisError::Config(
                "JWT_SECRET must be at least 32 characters".into(),
            ));
        }

        Ok(Self {
            secret,
            expiry_seconds,
            admin_prefix,
        })
    }

    /// Create a verifier for dev mode (fixed insecure secret)
    pub fn new_dev(admin_prefix: String) -> Self {
        Self {
            secret: "dev-mode-secret-not-for-production-use-123456".into(),
            expiry_seconds: 3600,
            admin_prefix,
        }
    }

    /// Generate a token for an authenticated partner
    ///
    /// The role is derived from the code prefix at issue time.
    pub fn generate_token(&self, input: TokenInput) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TrellisError::Internal(format!("System time error: {}", e)))?
            .as_secs();

        let role = Role::from_code(&input.code, &self.admin_prefix);
        let claims = Claims {
            sub: input.subject_id,
            code: input.code.as_str().to_string(),
            role,
            iat: now,
            exp: now + self.expiry_seconds,
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| TrellisError::Internal(format!("Failed to generate token: {}", e)))?;

        Ok(token)
    }

    /// Verify and decode a token into its claims
    pub fn decode_claims(&self, token: &str) -> Result<Claims> {
        let validation = Validation::default();

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|err| {
            use jsonwebtoken::errors::ErrorKind;
            let message = match err.kind() {
                ErrorKind::ExpiredSignature => "Token expired",
                ErrorKind::InvalidToken => "Invalid token",
                ErrorKind::InvalidSignature => "Invalid signature",
                _ => "Token validation failed",
            };
            TrellisError::Unauthorized(message.into())
        })
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, credential: &str) -> Result<Identity> {
        let claims = self.decode_claims(credential)?;

        let code = PartnerCode::new(&claims.code);
        if code.is_empty() {
            return Err(TrellisError::Unauthorized("Token carries no code".into()));
        }

        // The claimed role must match the prefix convention; a stale or
        // tampered role claim does not grant extra scope.
        let derived = Role::from_code(&code, &self.admin_prefix);
        if claims.role != derived {
            return Err(TrellisError::Unauthorized(
                "Token role does not match code".into(),
            ));
        }

        Ok(Identity::new(claims.sub, code, derived))
    }
}

/// Extract token from Authorization header.
/// Supports "Bearer <token>" format and raw tokens.
pub fn extract_token_from_header(auth_header: Option<&str>) -> Option<&str> {
    let header = auth_header?;

    // Support "Bearer <token>" format
    if let Some(token) = header.strip_prefix("Bearer ") {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    // Also support raw token (for flexibility)
    if !header.contains(' ') {
        let token = header.trim();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_verifier() -> JwtVerifier {
        JwtVerifier::new(
            "test-secret-that-is-at-least-32-characters-long".into(),
            3600,
            "A".into(),
        )
        .unwrap()
    }

    #[test]
    fn test_generate_and_verify_token() {
        let verifier = test_verifier();

        let input = TokenInput {
            subject_id: "64f000000000000000000001".into(),
            code: PartnerCode::new("p100"),
        };

        let token = verifier.generate_token(input).unwrap();
        assert!(!token.is_empty());

        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.subject_id, "64f000000000000000000001");
        assert_eq!(identity.code.as_str(), "P100");
        assert_eq!(identity.role, Role::Partner);
    }

    #[test]
    fn test_admin_prefix_grants_administrator() {
        let verifier = test_verifier();

        let token = verifier
            .generate_token(TokenInput {
                subject_id: "64f000000000000000000002".into(),
                code: PartnerCode::new("A001"),
            })
            .unwrap();

        let identity = verifier.verify(&token).unwrap();
        assert_eq!(identity.role, Role::Administrator);
    }

    #[test]
    fn test_role_claim_must_match_prefix() {
        let verifier = test_verifier();

        // Forge claims with an administrator role on a non-admin code
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let claims = Claims {
            sub: "64f000000000000000000003".into(),
            code: "P100".into(),
            role: Role::Administrator,
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(verifier.secret.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            verifier.verify(&token),
            Err(TrellisError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_invalid_token() {
        let verifier = test_verifier();
        assert!(verifier.verify("invalid-token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let verifier1 = test_verifier();
        let verifier2 = JwtVerifier::new(
            "different-secret-that-is-at-least-32-characters".into(),
            3600,
            "A".into(),
        )
        .unwrap();

        let token = verifier1
            .generate_token(TokenInput {
                subject_id: "64f000000000000000000004".into(),
                code: PartnerCode::new("P200"),
            })
            .unwrap();

        assert!(verifier2.verify(&token).is_err());
    }

    #[test]
    fn test_extract_token_from_header() {
        // Bearer format
        assert_eq!(
            extract_token_from_header(Some("Bearer abc123")),
            Some("abc123")
        );

        // Raw token
        assert_eq!(extract_token_from_header(Some("abc123")), Some("abc123"));

        // Empty cases
        assert_eq!(extract_token_from_header(None), None);
        assert_eq!(extract_token_from_header(Some("")), None);
        assert_eq!(extract_token_from_header(Some("Bearer ")), None);

        // Invalid format
        assert_eq!(extract_token_from_header(Some("Basic abc123")), None);
    }

    #[test]
    fn test_secret_validation() {
        // Too short
        assert!(JwtVerifier::new("short".into(), 3600, "A".into()).is_err());

        // Empty
        assert!(JwtVerifier::new("".into(), 3600, "A".into()).is_err());

        // Valid
        assert!(
            JwtVerifier::new("this-secret-is-at-least-32-chars-long".into(), 3600, "A".into())
                .is_ok()
        );
    }
}
