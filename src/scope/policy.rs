//! Scope policy: who may view and mutate which codes
//!
//! Viewing is broad (the caller's whole recruited subtree); mutation is
//! narrow (own code only). Administrators are unrestricted on both. A
//! request may narrow the visible set further, never widen it.

use std::collections::HashSet;

use crate::auth::{Identity, Role};
use crate::hierarchy::HierarchyResolver;
use crate::types::{PartnerCode, Result, TrellisError};

/// Caller-requested narrowing of the visible set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeSelector {
    /// The full role-derived visible set
    Subtree,
    /// One explicit descendant code
    Only(PartnerCode),
    /// The caller's own code only
    Mine,
}

/// The code set a query is allowed to touch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeScope {
    /// Unrestricted (administrators only)
    All,
    /// Exactly these codes
    Codes(HashSet<PartnerCode>),
}

impl CodeScope {
    pub fn single(code: PartnerCode) -> Self {
        let mut codes = HashSet::new();
        codes.insert(code);
        Self::Codes(codes)
    }

    pub fn contains(&self, code: &PartnerCode) -> bool {
        match self {
            Self::All => true,
            Self::Codes(codes) => codes.contains(code),
        }
    }

    /// The explicit code set, None when unrestricted
    pub fn codes(&self) -> Option<&HashSet<PartnerCode>> {
        match self {
            Self::All => None,
            Self::Codes(codes) => Some(codes),
        }
    }
}

/// Derives visible and mutable scopes for a verified caller
#[derive(Clone)]
pub struct ScopePolicy {
    resolver: HierarchyResolver,
}

impl ScopePolicy {
    pub fn new(resolver: HierarchyResolver) -> Self {
        Self { resolver }
    }

    /// The set of codes the caller may view, after any requested narrowing.
    ///
    /// Narrowing is always an intersection with the role-derived set: a
    /// partner asking for a code outside its subtree gets `Forbidden`, not
    /// a widened scope.
    pub async fn visible_codes(
        &self,
        identity: &Identity,
        selector: &ScopeSelector,
    ) -> Result<CodeScope> {
        match identity.role {
            Role::Administrator => match selector {
                ScopeSelector::Subtree => Ok(CodeScope::All),
                ScopeSelector::Only(code) => Ok(CodeScope::single(code.clone())),
                ScopeSelector::Mine => Ok(CodeScope::single(identity.code.clone())),
            },
            Role::Partner => match selector {
                // Own code is always in the resolved set; no walk needed
                ScopeSelector::Mine => Ok(CodeScope::single(identity.code.clone())),
                ScopeSelector::Subtree => {
                    let scope = self.resolver.resolve(&identity.code).await?;
                    Ok(CodeScope::Codes(scope.codes))
                }
                ScopeSelector::Only(code) => {
                    let scope = self.resolver.resolve(&identity.code).await?;
                    if scope.contains(code) {
                        Ok(CodeScope::single(code.clone()))
                    } else {
                        Err(TrellisError::Forbidden(format!(
                            "code {} is outside your partner tree",
                            code
                        )))
                    }
                }
            },
        }
    }

    /// Whether the caller may mutate a lead owned by `owner`.
    ///
    /// Exact own-code match only; seeing a descendant's lead never grants
    /// edit rights. Administrators may mutate any code.
    pub fn can_mutate(identity: &Identity, owner: &PartnerCode) -> bool {
        identity.role.is_admin() || &identity.code == owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schemas::PartnerDoc;
    use crate::hierarchy::MemoryPartnerStore;
    use std::sync::Arc;

    fn partner(code: &str) -> Identity {
        Identity::new("subject", PartnerCode::new(code), Role::Partner)
    }

    fn admin(code: &str) -> Identity {
        Identity::new("subject", PartnerCode::new(code), Role::Administrator)
    }

    async fn policy() -> ScopePolicy {
        // R -> {PA, PB}, PA -> {PA1}
        let store = MemoryPartnerStore::new();
        let r = PartnerCode::new("R");
        let a = PartnerCode::new("PA");
        let b = PartnerCode::new("PB");
        let a1 = PartnerCode::new("PA1");
        store.insert(PartnerDoc::new(&r, None, "root")).await;
        store.insert(PartnerDoc::new(&a, Some(&r), "a")).await;
        store.insert(PartnerDoc::new(&b, Some(&r), "b")).await;
        store.insert(PartnerDoc::new(&a1, Some(&a), "a1")).await;
        ScopePolicy::new(HierarchyResolver::new(Arc::new(store)))
    }

    #[tokio::test]
    async fn test_partner_sees_own_subtree() {
        let policy = policy().await;
        let scope = policy
            .visible_codes(&partner("PA"), &ScopeSelector::Subtree)
            .await
            .unwrap();

        assert!(scope.contains(&PartnerCode::new("PA")));
        assert!(scope.contains(&PartnerCode::new("PA1")));
        assert!(!scope.contains(&PartnerCode::new("PB")));
    }

    #[tokio::test]
    async fn test_admin_is_unrestricted() {
        let policy = policy().await;
        let scope = policy
            .visible_codes(&admin("A900"), &ScopeSelector::Subtree)
            .await
            .unwrap();
        assert_eq!(scope, CodeScope::All);
    }

    #[tokio::test]
    async fn test_only_narrows_within_subtree() {
        let policy = policy().await;
        let scope = policy
            .visible_codes(
                &partner("R"),
                &ScopeSelector::Only(PartnerCode::new("PA1")),
            )
            .await
            .unwrap();

        assert_eq!(scope, CodeScope::single(PartnerCode::new("PA1")));
    }

    #[tokio::test]
    async fn test_only_outside_subtree_is_forbidden() {
        let policy = policy().await;
        let result = policy
            .visible_codes(
                &partner("PA"),
                &ScopeSelector::Only(PartnerCode::new("PB")),
            )
            .await;

        assert!(matches!(result, Err(TrellisError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_mine_is_singleton() {
        let policy = policy().await;
        let scope = policy
            .visible_codes(&partner("R"), &ScopeSelector::Mine)
            .await
            .unwrap();
        assert_eq!(scope, CodeScope::single(PartnerCode::new("R")));
    }

    #[test]
    fn test_can_mutate_own_code_only() {
        assert!(ScopePolicy::can_mutate(
            &partner("PA"),
            &PartnerCode::new("PA")
        ));
        // Descendant leads are visible but never editable
        assert!(!ScopePolicy::can_mutate(
            &partner("PA"),
            &PartnerCode::new("PA1")
        ));
        assert!(ScopePolicy::can_mutate(
            &admin("A900"),
            &PartnerCode::new("PB")
        ));
    }

    #[test]
    fn test_can_mutate_is_case_insensitive() {
        assert!(ScopePolicy::can_mutate(
            &partner("pa"),
            &PartnerCode::new("PA")
        ));
    }
}
