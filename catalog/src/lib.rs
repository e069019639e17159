//! Client for the upstream product catalog, with per-call caching, retries and
//! circuit breaking.

pub mod cache;
mod catalog;
pub mod circuit_breaker;
pub mod client;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod resilience;
mod retry;
pub mod types;

pub use catalog::ProductCatalog;
