//! Lead management: storage adapter, lifecycle engine, aggregation

pub mod aggregate;
pub mod lifecycle;
pub mod status;
pub mod store;

pub use aggregate::{AggregationEngine, DescendantSummary, LeadStats, StatusBreakdown};
pub use lifecycle::LifecycleEngine;
pub use status::LeadStatus;
pub use store::{LeadQuery, LeadStore, MemoryLeadStore, MongoLeadStore};
