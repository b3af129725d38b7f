//! HTTP server and application state

pub mod http;

pub use http::{run, AppState};
