//! Partner document schema
//!
//! Stores the referral tree: each partner carries its own unique code and
//! the code of the partner who recruited it.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;
use crate::types::PartnerCode;

/// Collection name for partners
pub const PARTNER_COLLECTION: &str = "partners";

/// Partner document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct PartnerDoc {
    /// MongoDB document ID (stable identity, not the join key)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at doubles as the join date)
    #[serde(default)]
    pub metadata: Metadata,

    /// Human-assigned unique code, the join key across the hierarchy
    pub unique_code: String,

    /// Unique code of the recruiting parent; None for roots
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer_code: Option<String>,

    /// Display name
    pub nickname: String,

    /// Depth hint maintained by the account-management path, not authoritative
    #[serde(default)]
    pub level: i32,

    /// Registered contact channel for lifecycle notifications
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl PartnerDoc {
    /// Create a new partner document
    pub fn new(unique_code: &PartnerCode, referrer_code: Option<&PartnerCode>, nickname: &str) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            unique_code: unique_code.as_str().to_string(),
            referrer_code: referrer_code.map(|c| c.as_str().to_string()),
            nickname: nickname.to_string(),
            level: 0,
            phone: None,
        }
    }

    /// Normalized unique code
    pub fn code(&self) -> PartnerCode {
        PartnerCode::new(&self.unique_code)
    }

    /// Normalized referrer code, if any
    pub fn referrer(&self) -> Option<PartnerCode> {
        self.referrer_code.as_deref().map(PartnerCode::new)
    }
}

impl IntoIndexes for PartnerDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on the join key
            (
                doc! { "unique_code": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("unique_code_unique".to_string())
                        .build(),
                ),
            ),
            // Children-of-code lookups walk this index
            (
                doc! { "referrer_code": 1 },
                Some(
                    IndexOptions::builder()
                        .name("referrer_code_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
