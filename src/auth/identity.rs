//! Verified caller identity
//!
//! The identity context derived from an inbound credential: a stable subject
//! id, the caller's partner code, and the role derived from the reserved
//! code-prefix convention.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{PartnerCode, Result};

/// Caller role, derived from the partner code prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Partner,
    Administrator,
}

impl Role {
    /// Derive the role from a code under the reserved-prefix convention
    pub fn from_code(code: &PartnerCode, admin_prefix: &str) -> Self {
        if code.has_admin_prefix(admin_prefix) {
            Self::Administrator
        } else {
            Self::Partner
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Administrator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Partner => write!(f, "partner"),
            Self::Administrator => write!(f, "administrator"),
        }
    }
}

/// Verified (subject, code, role) triple for the current request
#[derive(Debug, Clone)]
pub struct Identity {
    /// Stable subject id (partner document id)
    pub subject_id: String,
    /// The caller's own partner code
    pub code: PartnerCode,
    /// Role derived from the code prefix
    pub role: Role,
}

impl Identity {
    pub fn new(subject_id: impl Into<String>, code: PartnerCode, role: Role) -> Self {
        Self {
            subject_id: subject_id.into(),
            code,
            role,
        }
    }
}

/// Credential verification boundary
///
/// Constructed once per process and passed in explicitly; token lifetime and
/// signing are entirely the implementation's concern.
pub trait IdentityVerifier: Send + Sync {
    /// Derive a verified identity from an opaque bearer credential
    fn verify(&self, credential: &str) -> Result<Identity>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_code_prefix() {
        assert_eq!(
            Role::from_code(&PartnerCode::new("A900"), "A"),
            Role::Administrator
        );
        assert_eq!(
            Role::from_code(&PartnerCode::new("a900"), "A"),
            Role::Administrator
        );
        assert_eq!(
            Role::from_code(&PartnerCode::new("P100"), "A"),
            Role::Partner
        );
    }
}
