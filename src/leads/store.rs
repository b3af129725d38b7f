//! Lead storage boundary
//!
//! The query/update surface over the leads collection, parameterized by a
//! policy-approved code scope, status filter, pagination window, and
//! free-text search. The MongoDB implementation backs production; the
//! in-memory implementation backs dev mode and tests with identical
//! semantics.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::TryStreamExt;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::db::schemas::{LeadDoc, LEAD_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::leads::LeadStatus;
use crate::scope::CodeScope;
use crate::types::{PartnerCode, Result, TrellisError};

/// A scoped, filtered, paginated lead listing request
#[derive(Debug, Clone)]
pub struct LeadQuery {
    /// Policy-approved code set
    pub scope: CodeScope,
    /// Optional exact status filter
    pub status: Option<LeadStatus>,
    /// Optional case-insensitive substring over contact phone OR install
    /// location
    pub search: Option<String>,
    /// 1-indexed page number
    pub page: u32,
    /// Items per page
    pub page_size: u32,
}

impl LeadQuery {
    /// Rows skipped before the requested page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Storage surface for leads
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Filtered listing plus the unpaginated matching total, newest first
    async fn query(&self, query: &LeadQuery) -> Result<(Vec<LeadDoc>, u64)>;

    /// Count leads in scope, optionally restricted to one status
    async fn count(&self, scope: &CodeScope, status: Option<LeadStatus>) -> Result<u64>;

    /// Per-code lead counts in one grouped query, when the backend has one.
    ///
    /// `Ok(None)` means the backend cannot group and the caller falls back
    /// to one count per code. Codes with no leads may be absent from the
    /// map; callers read them as zero.
    async fn count_by_code(
        &self,
        _codes: &[PartnerCode],
    ) -> Result<Option<HashMap<PartnerCode, u64>>> {
        Ok(None)
    }

    /// Load one lead by id
    async fn find_by_id(&self, id: &str) -> Result<Option<LeadDoc>>;

    /// Persist a new status and return the updated lead.
    ///
    /// Last write wins; there is no version check before persisting.
    async fn set_status(&self, id: &str, status: LeadStatus) -> Result<LeadDoc>;
}

/// Escape regex metacharacters so a search term matches literally
fn escape_regex(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// MongoDB-backed lead store
pub struct MongoLeadStore {
    collection: MongoCollection<LeadDoc>,
}

impl MongoLeadStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<LeadDoc>(LEAD_COLLECTION).await?;
        Ok(Self { collection })
    }

    fn build_filter(
        scope: &CodeScope,
        status: Option<LeadStatus>,
        search: Option<&str>,
    ) -> Document {
        let mut filter = Document::new();

        if let Some(codes) = scope.codes() {
            let codes: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
            filter.insert("marketer_code", doc! { "$in": codes });
        }

        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        if let Some(term) = search {
            let pattern = escape_regex(term);
            filter.insert(
                "$or",
                vec![
                    doc! { "customer_phone": { "$regex": &pattern, "$options": "i" } },
                    doc! { "install_location": { "$regex": &pattern, "$options": "i" } },
                ],
            );
        }

        filter
    }
}

#[async_trait]
impl LeadStore for MongoLeadStore {
    async fn query(&self, query: &LeadQuery) -> Result<(Vec<LeadDoc>, u64)> {
        let filter = Self::build_filter(&query.scope, query.status, query.search.as_deref());

        let total = self.collection.count(filter.clone()).await?;

        let options = FindOptions::builder()
            .sort(doc! { "submitted_at": -1 })
            .skip(query.offset())
            .limit(i64::from(query.page_size))
            .build();
        let items = self.collection.find_many(filter, Some(options)).await?;

        Ok((items, total))
    }

    async fn count(&self, scope: &CodeScope, status: Option<LeadStatus>) -> Result<u64> {
        let filter = Self::build_filter(scope, status, None);
        self.collection.count(filter).await
    }

    /// One `$group` aggregation instead of a count per code
    async fn count_by_code(
        &self,
        codes: &[PartnerCode],
    ) -> Result<Option<HashMap<PartnerCode, u64>>> {
        let code_strs: Vec<&str> = codes.iter().map(|c| c.as_str()).collect();
        let pipeline = vec![
            doc! { "$match": { "marketer_code": { "$in": code_strs } } },
            doc! { "$group": { "_id": "$marketer_code", "count": { "$sum": 1 } } },
        ];

        let mut cursor = self
            .collection
            .inner()
            .aggregate(pipeline)
            .await
            .map_err(|e| TrellisError::Database(format!("Grouped count failed: {}", e)))?;

        let mut counts = HashMap::new();
        while let Some(row) = cursor
            .try_next()
            .await
            .map_err(|e| TrellisError::Database(format!("Grouped count failed: {}", e)))?
        {
            let Ok(code) = row.get_str("_id") else { continue };
            let count = row
                .get_i64("count")
                .or_else(|_| row.get_i32("count").map(i64::from))
                .unwrap_or(0);
            counts.insert(PartnerCode::new(code), count.max(0) as u64);
        }

        Ok(Some(counts))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LeadDoc>> {
        // An id that cannot parse cannot reference an existing lead
        let Ok(oid) = ObjectId::parse_str(id) else {
            return Ok(None);
        };
        self.collection.find_one(doc! { "_id": oid }).await
    }

    async fn set_status(&self, id: &str, status: LeadStatus) -> Result<LeadDoc> {
        let oid = ObjectId::parse_str(id)
            .map_err(|_| TrellisError::NotFound(format!("lead {} not found", id)))?;

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.collection
            .inner()
            .find_one_and_update(
                doc! { "_id": oid },
                doc! { "$set": {
                    "status": status.as_str(),
                    "metadata.updated_at": DateTime::now(),
                }},
            )
            .with_options(options)
            .await
            .map_err(|e| TrellisError::Database(format!("Status update failed: {}", e)))?
            .ok_or_else(|| TrellisError::NotFound(format!("lead {} not found", id)))
    }
}

/// In-memory lead store for dev mode and tests
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: RwLock<Vec<LeadDoc>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a lead, assigning an id when absent; returns the id
    pub async fn insert(&self, mut lead: LeadDoc) -> String {
        let id = lead._id.unwrap_or_else(ObjectId::new);
        lead._id = Some(id);
        self.leads.write().await.push(lead);
        id.to_hex()
    }

    fn matches(lead: &LeadDoc, scope: &CodeScope, status: Option<LeadStatus>, search: Option<&str>) -> bool {
        if !scope.contains(&lead.owner()) {
            return false;
        }
        if let Some(status) = status {
            if lead.status != status {
                return false;
            }
        }
        if let Some(term) = search {
            let term = term.to_lowercase();
            let phone = lead.customer_phone.to_lowercase();
            let location = lead.install_location.to_lowercase();
            if !phone.contains(&term) && !location.contains(&term) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn query(&self, query: &LeadQuery) -> Result<(Vec<LeadDoc>, u64)> {
        let leads = self.leads.read().await;

        let mut matching: Vec<LeadDoc> = leads
            .iter()
            .filter(|l| Self::matches(l, &query.scope, query.status, query.search.as_deref()))
            .cloned()
            .collect();

        // Most recent first
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .collect();

        Ok((items, total))
    }

    async fn count(&self, scope: &CodeScope, status: Option<LeadStatus>) -> Result<u64> {
        let leads = self.leads.read().await;
        Ok(leads
            .iter()
            .filter(|l| Self::matches(l, scope, status, None))
            .count() as u64)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<LeadDoc>> {
        let leads = self.leads.read().await;
        Ok(leads.iter().find(|l| l.id_hex() == id).cloned())
    }

    async fn set_status(&self, id: &str, status: LeadStatus) -> Result<LeadDoc> {
        let mut leads = self.leads.write().await;
        let lead = leads
            .iter_mut()
            .find(|l| l.id_hex() == id)
            .ok_or_else(|| TrellisError::NotFound(format!("lead {} not found", id)))?;

        lead.status = status;
        lead.metadata.updated_at = Some(DateTime::now());
        Ok(lead.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PartnerCode;
    use std::collections::HashSet;

    fn lead(code: &str, status: LeadStatus, phone: &str, location: &str, millis: i64) -> LeadDoc {
        LeadDoc {
            marketer_code: code.to_string(),
            status,
            submitted_at: DateTime::from_millis(millis),
            customer_phone: phone.to_string(),
            install_location: location.to_string(),
            ..LeadDoc::default()
        }
    }

    fn scope_of(codes: &[&str]) -> CodeScope {
        let codes: HashSet<PartnerCode> = codes.iter().map(PartnerCode::new).collect();
        CodeScope::Codes(codes)
    }

    async fn seeded_store() -> MemoryLeadStore {
        let store = MemoryLeadStore::new();
        store
            .insert(lead("R", LeadStatus::New, "010-1111-2222", "Seoul", 1_000))
            .await;
        store
            .insert(lead("PA", LeadStatus::Contracted, "010-3333-4444", "Busan", 2_000))
            .await;
        store
            .insert(lead("PA1", LeadStatus::Contracted, "010-5555-6666", "Incheon", 3_000))
            .await;
        store
            .insert(lead("PB", LeadStatus::Cancelled, "010-7777-8888", "Daegu", 4_000))
            .await;
        store
            .insert(lead("OUTSIDE", LeadStatus::Contracted, "010-9999-0000", "Jeju", 5_000))
            .await;
        store
    }

    #[tokio::test]
    async fn test_scope_and_status_filter() {
        let store = seeded_store().await;

        let (items, total) = store
            .query(&LeadQuery {
                scope: scope_of(&["R", "PA", "PB", "PA1"]),
                status: Some(LeadStatus::Contracted),
                search: None,
                page: 1,
                page_size: 20,
            })
            .await
            .unwrap();

        assert_eq!(total, 2);
        assert!(items
            .iter()
            .all(|l| l.status == LeadStatus::Contracted
                && l.marketer_code != "OUTSIDE"));
    }

    #[tokio::test]
    async fn test_ordering_newest_first() {
        let store = seeded_store().await;

        let (items, _) = store
            .query(&LeadQuery {
                scope: scope_of(&["R", "PA", "PB", "PA1"]),
                status: None,
                search: None,
                page: 1,
                page_size: 20,
            })
            .await
            .unwrap();

        let times: Vec<i64> = items
            .iter()
            .map(|l| l.submitted_at.timestamp_millis())
            .collect();
        assert_eq!(times, vec![4_000, 3_000, 2_000, 1_000]);
    }

    #[tokio::test]
    async fn test_search_matches_either_field() {
        let store = seeded_store().await;
        let scope = scope_of(&["R", "PA", "PB", "PA1"]);

        // Phone fragment
        let (items, total) = store
            .query(&LeadQuery {
                scope: scope.clone(),
                status: None,
                search: Some("3333".into()),
                page: 1,
                page_size: 20,
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].marketer_code, "PA");

        // Location fragment, case-insensitive
        let (items, _) = store
            .query(&LeadQuery {
                scope,
                status: None,
                search: Some("seoul".into()),
                page: 1,
                page_size: 20,
            })
            .await
            .unwrap();
        assert_eq!(items[0].marketer_code, "R");
    }

    #[tokio::test]
    async fn test_pagination_window() {
        let store = MemoryLeadStore::new();
        for i in 0..45 {
            store
                .insert(lead("R", LeadStatus::New, "010", "Seoul", i64::from(i)))
                .await;
        }

        let (items, total) = store
            .query(&LeadQuery {
                scope: scope_of(&["R"]),
                status: None,
                search: None,
                page: 3,
                page_size: 20,
            })
            .await
            .unwrap();

        assert_eq!(total, 45);
        assert_eq!(items.len(), 5);
        // Final page holds the oldest five
        assert_eq!(items[0].submitted_at.timestamp_millis(), 4);
        assert_eq!(items[4].submitted_at.timestamp_millis(), 0);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let store = seeded_store().await;
        let scope = scope_of(&["R", "PA", "PB", "PA1"]);

        assert_eq!(store.count(&scope, None).await.unwrap(), 4);
        assert_eq!(
            store
                .count(&scope, Some(LeadStatus::Contracted))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            store.count(&scope, Some(LeadStatus::InProgress)).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_unrestricted_scope_sees_everything() {
        let store = seeded_store().await;
        assert_eq!(store.count(&CodeScope::All, None).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_set_status_returns_updated_lead() {
        let store = MemoryLeadStore::new();
        let id = store
            .insert(lead("R", LeadStatus::New, "010", "Seoul", 1))
            .await;

        let updated = store.set_status(&id, LeadStatus::Contracted).await.unwrap();
        assert_eq!(updated.status, LeadStatus::Contracted);

        let reloaded = store.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, LeadStatus::Contracted);
    }

    #[tokio::test]
    async fn test_set_status_unknown_id() {
        let store = MemoryLeadStore::new();
        let result = store
            .set_status(&ObjectId::new().to_hex(), LeadStatus::Cancelled)
            .await;
        assert!(matches!(result, Err(TrellisError::NotFound(_))));
    }

    #[test]
    fn test_escape_regex() {
        assert_eq!(escape_regex("010-1234"), "010-1234");
        assert_eq!(escape_regex("a.b*c"), "a\\.b\\*c");
    }
}
