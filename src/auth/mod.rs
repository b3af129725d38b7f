//! Authentication for Trellis
//!
//! Provides:
//! - JWT token generation and validation
//! - The verified identity context (subject, code, role)
//! - Role derivation from the reserved code-prefix convention

pub mod identity;
pub mod jwt;

pub use identity::{Identity, IdentityVerifier, Role};
pub use jwt::{extract_token_from_header, Claims, JwtVerifier, TokenInput};
