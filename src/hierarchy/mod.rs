//! Partner hierarchy resolution
//!
//! Given a root code, computes the transitive closure of descendant codes
//! in the referral tree, plus the out-of-band forest integrity sweep.

pub mod integrity;
pub mod resolver;
pub mod store;

pub use integrity::{check_forest, spawn_startup_sweep, IntegrityReport};
pub use resolver::{HierarchyResolver, ResolvedScope};
pub use store::{MemoryPartnerStore, MongoPartnerStore, PartnerStore};
