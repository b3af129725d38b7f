//! Database schemas for Trellis
//!
//! Defines MongoDB document structures for partners and leads.

mod lead;
mod metadata;
mod partner;

pub use lead::{LeadDoc, LEAD_COLLECTION};
pub use metadata::Metadata;
pub use partner::{PartnerDoc, PARTNER_COLLECTION};
