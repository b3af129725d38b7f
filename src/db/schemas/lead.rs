//! Lead document schema
//!
//! A sales inquiry captured under a partner's attribution code. The
//! attribution is fixed at creation; only the status moves afterwards.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::IntoIndexes;
use crate::db::schemas::Metadata;
use crate::leads::LeadStatus;
use crate::types::PartnerCode;

/// Collection name for leads
pub const LEAD_COLLECTION: &str = "leads";

/// Lead document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LeadDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata
    #[serde(default)]
    pub metadata: Metadata,

    /// Attribution: the unique code that owns this lead, fixed at creation
    pub marketer_code: String,

    /// Lifecycle status; unknown stored values normalize to `new` on read
    #[serde(default = "default_status")]
    pub status: LeadStatus,

    /// When the inquiry was submitted; listing sort key (descending)
    pub submitted_at: DateTime,

    /// Customer display name
    #[serde(default)]
    pub customer_name: String,

    /// Customer contact phone (searchable)
    #[serde(default)]
    pub customer_phone: String,

    /// Requested installation location (searchable)
    #[serde(default)]
    pub install_location: String,

    /// Requested service parameters, opaque to the core
    #[serde(default)]
    pub service_type: String,

    /// Free-form memo from intake
    #[serde(default)]
    pub memo: String,
}

fn default_status() -> LeadStatus {
    LeadStatus::New
}

impl Default for LeadDoc {
    fn default() -> Self {
        Self {
            _id: None,
            metadata: Metadata::default(),
            marketer_code: String::new(),
            status: LeadStatus::New,
            submitted_at: DateTime::now(),
            customer_name: String::new(),
            customer_phone: String::new(),
            install_location: String::new(),
            service_type: String::new(),
            memo: String::new(),
        }
    }
}

impl LeadDoc {
    /// Normalized attribution code
    pub fn owner(&self) -> PartnerCode {
        PartnerCode::new(&self.marketer_code)
    }

    /// Document id as a hex string, empty when not yet persisted
    pub fn id_hex(&self) -> String {
        self._id.map(|id| id.to_hex()).unwrap_or_default()
    }
}

impl IntoIndexes for LeadDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Scoped listings filter on attribution and sort by submission
            (
                doc! { "marketer_code": 1, "submitted_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("marketer_submitted_index".to_string())
                        .build(),
                ),
            ),
            // Status breakdown counts
            (
                doc! { "status": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}
