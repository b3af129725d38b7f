//! Descendant resolution over the referral tree
//!
//! Computes the reflexive-transitive closure of the child relation for a
//! root code: the set of codes a caller rooted there is permitted to see.
//! Recomputed per request; results are never cached across requests.

use std::collections::HashSet;
use std::sync::Arc;

use crate::hierarchy::store::PartnerStore;
use crate::types::{PartnerCode, Result};

/// Request-lifetime resolution result
#[derive(Debug, Clone)]
pub struct ResolvedScope {
    /// The code resolution started from
    pub root: PartnerCode,
    /// Every code reachable from the root, root included
    pub codes: HashSet<PartnerCode>,
}

impl ResolvedScope {
    pub fn contains(&self, code: &PartnerCode) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Resolves the descendant closure for a root code
#[derive(Clone)]
pub struct HierarchyResolver {
    store: Arc<dyn PartnerStore>,
}

impl HierarchyResolver {
    pub fn new(store: Arc<dyn PartnerStore>) -> Self {
        Self { store }
    }

    /// Resolve every code reachable from `root` by following child edges.
    ///
    /// Prefers the store's batched recursive query; falls back to per-level
    /// traversal when the backend has none. Either way the result is the
    /// same closure, deduplicated, with `root` always present.
    ///
    /// A storage error aborts the whole resolution; no partial set is
    /// returned.
    pub async fn resolve(&self, root: &PartnerCode) -> Result<ResolvedScope> {
        if let Some(mut codes) = self.store.descendant_codes(root).await? {
            codes.insert(root.clone());
            return Ok(ResolvedScope {
                root: root.clone(),
                codes,
            });
        }

        self.resolve_by_level(root).await
    }

    /// Per-level breadth-first walk of the child relation.
    ///
    /// Codes are marked visited before being re-enqueued, so a corrupted
    /// cyclic referrer edge terminates instead of looping; under a clean
    /// forest the guard is simply deduplication.
    async fn resolve_by_level(&self, root: &PartnerCode) -> Result<ResolvedScope> {
        let mut visited: HashSet<PartnerCode> = HashSet::new();
        visited.insert(root.clone());

        let mut frontier = vec![root.clone()];
        while !frontier.is_empty() {
            let children = self.store.children_of(&frontier).await?;

            let mut next = Vec::new();
            for child in children {
                let code = child.code();
                if visited.insert(code.clone()) {
                    next.push(code);
                }
            }
            frontier = next;
        }

        Ok(ResolvedScope {
            root: root.clone(),
            codes: visited,
        })
    }
}
