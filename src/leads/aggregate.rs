//! Aggregation over a resolved code scope
//!
//! Total and per-status counts, plus the per-descendant tree listing. The
//! per-status breakdown is deliberately five uniform count queries rather
//! than one grouped query. The per-descendant listing uses the store's
//! grouped count when the backend has one and otherwise fans out one count
//! per descendant. All fan-outs are independent reads issued concurrently
//! under a configured cap.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::sync::Arc;

use crate::hierarchy::{HierarchyResolver, PartnerStore};
use crate::leads::store::LeadStore;
use crate::leads::LeadStatus;
use crate::scope::CodeScope;
use crate::types::{PartnerCode, Result};

/// Per-status lead counts, all four keys always present
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub new: u64,
    pub in_progress: u64,
    pub contracted: u64,
    pub cancelled: u64,
}

impl StatusBreakdown {
    fn set(&mut self, status: LeadStatus, count: u64) {
        match status {
            LeadStatus::New => self.new = count,
            LeadStatus::InProgress => self.in_progress = count,
            LeadStatus::Contracted => self.contracted = count,
            LeadStatus::Cancelled => self.cancelled = count,
        }
    }
}

/// Scoped lead totals
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeadStats {
    pub total: u64,
    pub by_status: StatusBreakdown,
}

/// One row of the descendant tree listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescendantSummary {
    pub code: PartnerCode,
    pub lead_count: u64,
    pub nickname: String,
    pub level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined_at: Option<String>,
}

fn summary_row(
    partner: crate::db::schemas::PartnerDoc,
    code: PartnerCode,
    lead_count: u64,
) -> DescendantSummary {
    DescendantSummary {
        code,
        lead_count,
        nickname: partner.nickname,
        level: partner.level,
        joined_at: partner
            .metadata
            .created_at
            .map(|d| d.try_to_rfc3339_string().unwrap_or_default()),
    }
}

/// Computes counts and breakdowns over policy-approved scopes
#[derive(Clone)]
pub struct AggregationEngine {
    leads: Arc<dyn LeadStore>,
    partners: Arc<dyn PartnerStore>,
    resolver: HierarchyResolver,
    concurrency: usize,
}

impl AggregationEngine {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        partners: Arc<dyn PartnerStore>,
        resolver: HierarchyResolver,
        concurrency: usize,
    ) -> Self {
        Self {
            leads,
            partners,
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    /// Total plus per-status counts over `scope`: one unfiltered count and
    /// one per enumerated status, issued concurrently under the cap.
    pub async fn stats(&self, scope: &CodeScope) -> Result<LeadStats> {
        let mut requests: Vec<Option<LeadStatus>> = vec![None];
        requests.extend(LeadStatus::ALL.into_iter().map(Some));

        let counts: Vec<(Option<LeadStatus>, u64)> = stream::iter(requests.into_iter().map(
            |status| {
                let leads = Arc::clone(&self.leads);
                let scope = scope.clone();
                async move {
                    let count = leads.count(&scope, status).await?;
                    Ok::<_, crate::types::TrellisError>((status, count))
                }
            },
        ))
        .buffer_unordered(self.concurrency)
        .try_collect()
        .await?;

        let mut stats = LeadStats {
            total: 0,
            by_status: StatusBreakdown::default(),
        };
        for (status, count) in counts {
            match status {
                None => stats.total = count,
                Some(status) => stats.by_status.set(status, count),
            }
        }

        Ok(stats)
    }

    /// Per-descendant lead counts for the tree listing rooted at `root`.
    ///
    /// Prefers one grouped count over the whole code set; falls back to one
    /// count query per descendant, concurrent under the cap. The fallback
    /// is fine at the expected scale of tens to low hundreds of
    /// descendants.
    pub async fn per_descendant(&self, root: &PartnerCode) -> Result<Vec<DescendantSummary>> {
        let scope = self.resolver.resolve(root).await?;
        let codes: Vec<PartnerCode> = scope.codes.iter().cloned().collect();
        let profiles = self.partners.by_codes(&codes).await?;

        let mut summaries = match self.leads.count_by_code(&codes).await? {
            Some(counts) => profiles
                .into_iter()
                .map(|partner| {
                    let code = partner.code();
                    let lead_count = counts.get(&code).copied().unwrap_or(0);
                    summary_row(partner, code, lead_count)
                })
                .collect(),
            None => self.per_descendant_fan_out(profiles).await?,
        };

        // Stable listing order: shallow first, then by code
        summaries.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.code.cmp(&b.code)));

        Ok(summaries)
    }

    /// One count query per descendant, concurrent under the cap
    async fn per_descendant_fan_out(
        &self,
        profiles: Vec<crate::db::schemas::PartnerDoc>,
    ) -> Result<Vec<DescendantSummary>> {
        stream::iter(profiles.into_iter().map(|partner| {
            let leads = Arc::clone(&self.leads);
            async move {
                let code = partner.code();
                let lead_count = leads
                    .count(&CodeScope::single(code.clone()), None)
                    .await?;
                Ok::<_, crate::types::TrellisError>(summary_row(partner, code, lead_count))
            }
        }))
        .buffer_unordered(self.concurrency)
        .try_collect()
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::{LeadDoc, PartnerDoc};
    use crate::hierarchy::MemoryPartnerStore;
    use crate::leads::store::MemoryLeadStore;
    use bson::DateTime;
    use std::collections::HashSet;

    async fn engine() -> AggregationEngine {
        let partners = Arc::new(MemoryPartnerStore::new());
        let r = PartnerCode::new("R");
        let a = PartnerCode::new("PA");
        let a1 = PartnerCode::new("PA1");
        partners.insert(PartnerDoc::new(&r, None, "root")).await;
        let mut pa = PartnerDoc::new(&a, Some(&r), "a");
        pa.level = 1;
        partners.insert(pa).await;
        let mut pa1 = PartnerDoc::new(&a1, Some(&a), "a1");
        pa1.level = 2;
        partners.insert(pa1).await;

        let leads = Arc::new(MemoryLeadStore::new());
        for (code, status) in [
            ("R", LeadStatus::New),
            ("PA", LeadStatus::Contracted),
            ("PA", LeadStatus::Cancelled),
            ("PA1", LeadStatus::Contracted),
        ] {
            leads
                .insert(LeadDoc {
                    marketer_code: code.into(),
                    status,
                    submitted_at: DateTime::now(),
                    ..LeadDoc::default()
                })
                .await;
        }

        let resolver = HierarchyResolver::new(Arc::clone(&partners) as Arc<dyn PartnerStore>);
        AggregationEngine::new(leads, partners, resolver, 4)
    }

    #[tokio::test]
    async fn test_stats_breakdown() {
        let engine = engine().await;
        let codes: HashSet<PartnerCode> =
            ["R", "PA", "PA1"].iter().map(PartnerCode::new).collect();

        let stats = engine.stats(&CodeScope::Codes(codes)).await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(
            stats.by_status,
            StatusBreakdown {
                new: 1,
                in_progress: 0,
                contracted: 2,
                cancelled: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_stats_narrowed_scope() {
        let engine = engine().await;

        let stats = engine
            .stats(&CodeScope::single(PartnerCode::new("PA")))
            .await
            .unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.by_status.contracted, 1);
        assert_eq!(stats.by_status.cancelled, 1);
    }

    #[tokio::test]
    async fn test_per_descendant_counts() {
        let engine = engine().await;

        let rows = engine.per_descendant(&PartnerCode::new("R")).await.unwrap();
        assert_eq!(rows.len(), 3);

        let by_code: Vec<(&str, u64)> = rows
            .iter()
            .map(|r| (r.code.as_str(), r.lead_count))
            .collect();
        assert_eq!(by_code, vec![("R", 1), ("PA", 2), ("PA1", 1)]);
    }

    /// Memory store extended with a grouped count, to drive the batched path
    struct GroupingLeadStore {
        inner: Arc<MemoryLeadStore>,
    }

    #[async_trait::async_trait]
    impl LeadStore for GroupingLeadStore {
        async fn query(
            &self,
            query: &crate::leads::LeadQuery,
        ) -> crate::types::Result<(Vec<LeadDoc>, u64)> {
            self.inner.query(query).await
        }

        async fn count(
            &self,
            scope: &CodeScope,
            status: Option<LeadStatus>,
        ) -> crate::types::Result<u64> {
            self.inner.count(scope, status).await
        }

        async fn count_by_code(
            &self,
            codes: &[PartnerCode],
        ) -> crate::types::Result<Option<std::collections::HashMap<PartnerCode, u64>>> {
            let mut counts = std::collections::HashMap::new();
            for code in codes {
                let count = self
                    .inner
                    .count(&CodeScope::single(code.clone()), None)
                    .await?;
                if count > 0 {
                    counts.insert(code.clone(), count);
                }
            }
            Ok(Some(counts))
        }

        async fn find_by_id(&self, id: &str) -> crate::types::Result<Option<LeadDoc>> {
            self.inner.find_by_id(id).await
        }

        async fn set_status(
            &self,
            id: &str,
            status: LeadStatus,
        ) -> crate::types::Result<LeadDoc> {
            self.inner.set_status(id, status).await
        }
    }

    #[tokio::test]
    async fn test_per_descendant_batched_counts_match_fan_out() {
        let partners = Arc::new(MemoryPartnerStore::new());
        let r = PartnerCode::new("R");
        let a = PartnerCode::new("PA");
        partners.insert(PartnerDoc::new(&r, None, "root")).await;
        let mut pa = PartnerDoc::new(&a, Some(&r), "a");
        pa.level = 1;
        partners.insert(pa).await;

        let memory = Arc::new(MemoryLeadStore::new());
        for code in ["R", "PA", "PA"] {
            memory
                .insert(LeadDoc {
                    marketer_code: code.into(),
                    submitted_at: DateTime::now(),
                    ..LeadDoc::default()
                })
                .await;
        }

        let grouping = Arc::new(GroupingLeadStore {
            inner: Arc::clone(&memory),
        });
        let resolver = HierarchyResolver::new(Arc::clone(&partners) as Arc<dyn PartnerStore>);
        let engine = AggregationEngine::new(grouping, partners, resolver, 4);

        let rows = engine.per_descendant(&r).await.unwrap();
        let by_code: Vec<(&str, u64)> = rows
            .iter()
            .map(|row| (row.code.as_str(), row.lead_count))
            .collect();
        assert_eq!(by_code, vec![("R", 1), ("PA", 2)]);
    }

    #[test]
    fn test_stats_wire_shape() {
        let stats = LeadStats {
            total: 3,
            by_status: StatusBreakdown {
                new: 1,
                in_progress: 0,
                contracted: 2,
                cancelled: 0,
            },
        };

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["byStatus"]["new"], 1);
        assert_eq!(json["byStatus"]["in_progress"], 0);
        assert_eq!(json["byStatus"]["contracted"], 2);
        assert_eq!(json["byStatus"]["cancelled"], 0);
    }

    #[tokio::test]
    async fn test_per_descendant_mid_tree() {
        let engine = engine().await;

        let rows = engine.per_descendant(&PartnerCode::new("PA")).await.unwrap();
        let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["PA", "PA1"]);
    }
}
