//! Scope derivation for verified callers

pub mod policy;

pub use policy::{CodeScope, ScopePolicy, ScopeSelector};
