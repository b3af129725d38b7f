//! Partner storage boundary
//!
//! The hierarchy only needs a handful of operations over the partners
//! collection; each is atomic and independently failing. The MongoDB
//! implementation answers the descendant closure with a single
//! `$graphLookup` aggregation; the in-memory implementation (dev mode,
//! tests) leaves that to the resolver's per-level traversal.

use async_trait::async_trait;
use bson::doc;
use futures_util::TryStreamExt;
use std::collections::HashSet;
use tokio::sync::RwLock;

use crate::db::schemas::{PartnerDoc, PARTNER_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{PartnerCode, Result, TrellisError};

/// Storage surface for the partner hierarchy
#[async_trait]
pub trait PartnerStore: Send + Sync {
    /// All partners whose referrer code is any of `codes` (one batched query)
    async fn children_of(&self, codes: &[PartnerCode]) -> Result<Vec<PartnerDoc>>;

    /// Look up a single partner by its unique code
    async fn find_by_code(&self, code: &PartnerCode) -> Result<Option<PartnerDoc>>;

    /// Profiles for a set of codes (tree listings)
    async fn by_codes(&self, codes: &[PartnerCode]) -> Result<Vec<PartnerDoc>>;

    /// Server-side recursive closure of descendant codes, root included.
    ///
    /// `Ok(None)` means the backend has no batched recursive query and the
    /// caller must fall back to per-level traversal.
    async fn descendant_codes(&self, _root: &PartnerCode) -> Result<Option<HashSet<PartnerCode>>> {
        Ok(None)
    }

    /// Every partner row; integrity sweeps only, never on the request path
    async fn all_partners(&self) -> Result<Vec<PartnerDoc>>;
}

/// MongoDB-backed partner store
pub struct MongoPartnerStore {
    collection: MongoCollection<PartnerDoc>,
}

impl MongoPartnerStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<PartnerDoc>(PARTNER_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait]
impl PartnerStore for MongoPartnerStore {
    async fn children_of(&self, codes: &[PartnerCode]) -> Result<Vec<PartnerDoc>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let codes: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        self.collection
            .find_many(doc! { "referrer_code": { "$in": codes } }, None)
            .await
    }

    async fn find_by_code(&self, code: &PartnerCode) -> Result<Option<PartnerDoc>> {
        self.collection
            .find_one(doc! { "unique_code": code.as_str() })
            .await
    }

    async fn by_codes(&self, codes: &[PartnerCode]) -> Result<Vec<PartnerDoc>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let codes: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        self.collection
            .find_many(doc! { "unique_code": { "$in": codes } }, None)
            .await
    }

    /// Single `$graphLookup` walk of the child relation. Semantically
    /// equivalent to the resolver's per-level traversal: the reachable set
    /// under `referrer_code -> unique_code` edges, deduplicated, root
    /// included.
    async fn descendant_codes(&self, root: &PartnerCode) -> Result<Option<HashSet<PartnerCode>>> {
        let pipeline = vec![
            doc! { "$match": { "unique_code": root.as_str() } },
            doc! { "$graphLookup": {
                "from": PARTNER_COLLECTION,
                "startWith": "$unique_code",
                "connectFromField": "unique_code",
                "connectToField": "referrer_code",
                "as": "descendants",
            }},
            doc! { "$project": {
                "unique_code": 1,
                "descendant_codes": "$descendants.unique_code",
            }},
        ];

        let mut cursor = self
            .collection
            .inner()
            .aggregate(pipeline)
            .await
            .map_err(|e| TrellisError::Database(format!("Descendant lookup failed: {}", e)))?;

        let Some(row) = cursor
            .try_next()
            .await
            .map_err(|e| TrellisError::Database(format!("Descendant lookup failed: {}", e)))?
        else {
            // Root not present: the closure is just the root itself
            let mut codes = HashSet::new();
            codes.insert(root.clone());
            return Ok(Some(codes));
        };

        let mut codes: HashSet<PartnerCode> = HashSet::new();
        codes.insert(root.clone());
        if let Ok(raw) = row.get_array("descendant_codes") {
            for value in raw {
                if let Some(code) = value.as_str() {
                    codes.insert(PartnerCode::new(code));
                }
            }
        }

        Ok(Some(codes))
    }

    async fn all_partners(&self) -> Result<Vec<PartnerDoc>> {
        self.collection.find_many(doc! {}, None).await
    }
}

/// In-memory partner store for dev mode and tests
#[derive(Default)]
pub struct MemoryPartnerStore {
    partners: RwLock<Vec<PartnerDoc>>,
}

impl MemoryPartnerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a partner row
    pub async fn insert(&self, partner: PartnerDoc) {
        self.partners.write().await.push(partner);
    }
}

#[async_trait]
impl PartnerStore for MemoryPartnerStore {
    async fn children_of(&self, codes: &[PartnerCode]) -> Result<Vec<PartnerDoc>> {
        let partners = self.partners.read().await;
        Ok(partners
            .iter()
            .filter(|p| p.referrer().map_or(false, |r| codes.contains(&r)))
            .cloned()
            .collect())
    }

    async fn find_by_code(&self, code: &PartnerCode) -> Result<Option<PartnerDoc>> {
        let partners = self.partners.read().await;
        Ok(partners.iter().find(|p| &p.code() == code).cloned())
    }

    async fn by_codes(&self, codes: &[PartnerCode]) -> Result<Vec<PartnerDoc>> {
        let partners = self.partners.read().await;
        Ok(partners
            .iter()
            .filter(|p| codes.contains(&p.code()))
            .cloned()
            .collect())
    }

    async fn all_partners(&self) -> Result<Vec<PartnerDoc>> {
        let partners = self.partners.read().await;
        Ok(partners.clone())
    }
}
