//! Referral-tree integrity sweep
//!
//! The account-management path does not validate that assigning a referrer
//! cannot create a cycle, so the tree invariant is checked out-of-band: a
//! full-collection pass that reports cyclic referrer chains and referrer
//! codes pointing at no existing partner. Runs at startup and behind an
//! administrator route; never on the request hot path.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::hierarchy::store::PartnerStore;
use crate::types::{PartnerCode, Result};

/// A referrer edge pointing at a code with no partner row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingEdge {
    pub code: PartnerCode,
    pub referrer: PartnerCode,
}

/// Result of a full integrity pass
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    /// Total partner rows examined
    pub partner_count: usize,
    /// Each cycle found in the referrer relation, listed once
    pub cycles: Vec<Vec<PartnerCode>>,
    /// Referrer edges pointing outside the partner set
    pub dangling_referrers: Vec<DanglingEdge>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.cycles.is_empty() && self.dangling_referrers.is_empty()
    }
}

/// Walk the whole partner set and report forest violations.
///
/// Every partner has at most one referrer, so the referrer relation is a
/// functional graph: walking parent chains with a per-walk path set finds
/// each cycle exactly once.
pub async fn check_forest(store: &dyn PartnerStore) -> Result<IntegrityReport> {
    let partners = store.all_partners().await?;

    let mut parent: HashMap<PartnerCode, Option<PartnerCode>> = HashMap::new();
    for p in &partners {
        parent.insert(p.code(), p.referrer());
    }

    let mut dangling = Vec::new();
    for p in &partners {
        if let Some(referrer) = p.referrer() {
            if !parent.contains_key(&referrer) {
                dangling.push(DanglingEdge {
                    code: p.code(),
                    referrer,
                });
            }
        }
    }

    let mut cycles = Vec::new();
    let mut resolved: HashSet<PartnerCode> = HashSet::new();
    for start in parent.keys() {
        if resolved.contains(start) {
            continue;
        }

        let mut path: Vec<PartnerCode> = Vec::new();
        let mut on_path: HashSet<PartnerCode> = HashSet::new();
        let mut current = start.clone();

        loop {
            if resolved.contains(&current) {
                break;
            }
            if on_path.contains(&current) {
                // Found a new cycle; record only its members
                let cycle_start = path
                    .iter()
                    .position(|c| c == &current)
                    .unwrap_or(0);
                cycles.push(path[cycle_start..].to_vec());
                break;
            }

            on_path.insert(current.clone());
            path.push(current.clone());

            match parent.get(&current) {
                Some(Some(next)) if parent.contains_key(next) => current = next.clone(),
                // Root, or referrer missing from the set (already reported)
                _ => break,
            }
        }

        resolved.extend(path);
    }

    Ok(IntegrityReport {
        partner_count: partners.len(),
        cycles,
        dangling_referrers: dangling,
    })
}

/// Run one sweep in the background at startup and log the outcome
pub fn spawn_startup_sweep(store: Arc<dyn PartnerStore>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match check_forest(store.as_ref()).await {
            Ok(report) if report.is_clean() => {
                info!(
                    partners = report.partner_count,
                    "Referral tree integrity sweep clean"
                );
            }
            Ok(report) => {
                warn!(
                    partners = report.partner_count,
                    cycles = report.cycles.len(),
                    dangling = report.dangling_referrers.len(),
                    "Referral tree integrity violations found"
                );
                for cycle in &report.cycles {
                    warn!(?cycle, "Cyclic referrer chain");
                }
                for edge in &report.dangling_referrers {
                    warn!(code = %edge.code, referrer = %edge.referrer, "Dangling referrer edge");
                }
            }
            Err(e) => {
                warn!("Integrity sweep failed: {}", e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::PartnerDoc;
    use crate::hierarchy::store::MemoryPartnerStore;

    #[tokio::test]
    async fn test_clean_forest() {
        let store = MemoryPartnerStore::new();
        let r = PartnerCode::new("R");
        let a = PartnerCode::new("PA");
        store.insert(PartnerDoc::new(&r, None, "root")).await;
        store.insert(PartnerDoc::new(&a, Some(&r), "a")).await;

        let report = check_forest(&store).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.partner_count, 2);
    }

    #[tokio::test]
    async fn test_two_cycle_detected() {
        let store = MemoryPartnerStore::new();
        let x = PartnerCode::new("X");
        let y = PartnerCode::new("Y");
        store.insert(PartnerDoc::new(&x, Some(&y), "x")).await;
        store.insert(PartnerDoc::new(&y, Some(&x), "y")).await;

        let report = check_forest(&store).await.unwrap();
        assert_eq!(report.cycles.len(), 1);
        let members: HashSet<_> = report.cycles[0].iter().cloned().collect();
        assert_eq!(members, [x, y].into_iter().collect());
    }

    #[tokio::test]
    async fn test_dangling_referrer_reported() {
        let store = MemoryPartnerStore::new();
        let a = PartnerCode::new("PA");
        let ghost = PartnerCode::new("GONE");
        store.insert(PartnerDoc::new(&a, Some(&ghost), "a")).await;

        let report = check_forest(&store).await.unwrap();
        assert!(report.cycles.is_empty());
        assert_eq!(report.dangling_referrers.len(), 1);
        assert_eq!(report.dangling_referrers[0].referrer, ghost);
    }

    #[tokio::test]
    async fn test_cycle_reported_once() {
        let store = MemoryPartnerStore::new();
        let x = PartnerCode::new("X");
        let y = PartnerCode::new("Y");
        let z = PartnerCode::new("Z");
        store.insert(PartnerDoc::new(&x, Some(&y), "x")).await;
        store.insert(PartnerDoc::new(&y, Some(&x), "y")).await;
        // Z hangs off the cycle but is not part of it
        store.insert(PartnerDoc::new(&z, Some(&x), "z")).await;

        let report = check_forest(&store).await.unwrap();
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].len(), 2);
    }
}
