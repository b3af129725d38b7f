//! Trellis - referral-partner back office
//!
//! Partners recruit sub-partners; every sales lead is attributed to the
//! partner code that captured it. Each partner sees its whole recruited
//! subtree but mutates only its own leads.
//!
//! ## Components
//!
//! - **auth**: identity context from bearer credentials (JWT)
//! - **hierarchy**: descendant resolution over the referral tree + integrity sweep
//! - **scope**: visible/mutable code-set policy
//! - **leads**: storage adapter, lifecycle engine, aggregation
//! - **notify**: fire-and-forget owner notification
//! - **routes / server**: HTTP surface over the core

pub mod auth;
pub mod config;
pub mod db;
pub mod hierarchy;
pub mod leads;
pub mod notify;
pub mod routes;
pub mod scope;
pub mod server;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{PartnerCode, Result, TrellisError};
