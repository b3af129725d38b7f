//! Lead lifecycle engine
//!
//! Validates and applies status transitions. Any of the four enumerated
//! values is an accepted target; arbitrary strings are rejected before
//! storage is touched. Entering `contracted` or `cancelled` from a
//! different status notifies the lead owner's registered contact channel,
//! fire-and-forget.

use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::Identity;
use crate::hierarchy::PartnerStore;
use crate::leads::store::LeadStore;
use crate::leads::LeadStatus;
use crate::notify::{LeadEvent, Notifier};
use crate::db::schemas::LeadDoc;
use crate::scope::ScopePolicy;
use crate::types::{PartnerCode, Result, TrellisError};

/// Applies status transitions and drives owner notification
#[derive(Clone)]
pub struct LifecycleEngine {
    leads: Arc<dyn LeadStore>,
    partners: Arc<dyn PartnerStore>,
    notifier: Arc<dyn Notifier>,
}

impl LifecycleEngine {
    pub fn new(
        leads: Arc<dyn LeadStore>,
        partners: Arc<dyn PartnerStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            leads,
            partners,
            notifier,
        }
    }

    /// Transition a lead to `target`, enforcing mutation scope.
    ///
    /// Checks run in order: target validation, lead existence, caller
    /// authorization. An out-of-scope caller is told `Forbidden`, never
    /// "not found". The notification is spawned after the write commits and
    /// may outlive the request; its failure never unwinds the transition.
    pub async fn transition(
        &self,
        lead_id: &str,
        target: &str,
        identity: &Identity,
    ) -> Result<LeadDoc> {
        let target: LeadStatus = target
            .parse()
            .map_err(TrellisError::BadRequest)?;

        let lead = self
            .leads
            .find_by_id(lead_id)
            .await?
            .ok_or_else(|| TrellisError::NotFound(format!("lead {} not found", lead_id)))?;

        let owner = lead.owner();
        if !ScopePolicy::can_mutate(identity, &owner) {
            return Err(TrellisError::Forbidden(format!(
                "lead {} belongs to {}",
                lead_id, owner
            )));
        }

        let previous = lead.status;
        let updated = self.leads.set_status(lead_id, target).await?;

        info!(
            lead = lead_id,
            from = previous.as_str(),
            to = target.as_str(),
            caller = %identity.code,
            "Lead status updated"
        );

        if previous != target {
            if let Some(event) = LeadEvent::from_status(target) {
                self.spawn_owner_notification(owner, event);
            }
        }

        Ok(updated)
    }

    /// Look up the owner's contact channel and dispatch in the background
    fn spawn_owner_notification(&self, owner: PartnerCode, event: LeadEvent) {
        let partners = Arc::clone(&self.partners);
        let notifier = Arc::clone(&self.notifier);

        tokio::spawn(async move {
            let contact = match partners.find_by_code(&owner).await {
                Ok(Some(partner)) => partner.phone.unwrap_or_default(),
                Ok(None) => {
                    warn!(owner = %owner, "Notification skipped: owner partner missing");
                    return;
                }
                Err(e) => {
                    warn!(owner = %owner, "Notification skipped: owner lookup failed: {}", e);
                    return;
                }
            };

            if contact.is_empty() {
                warn!(owner = %owner, "Notification skipped: no contact channel registered");
                return;
            }

            if !notifier.notify(&contact, event).await {
                warn!(owner = %owner, event = event.as_str(), "Notification dispatch failed");
            }
        });
    }
}
