//! Gatewarden Common Library
//!
//! Shared code for the gateway control plane including:
//! - Database entities and repository patterns
//! - The service catalog: aggregate read-model, validation, write path
//! - The renter directory cache and usage composition
//! - The flow-counter boundary
//! - Error types and handling
//! - Configuration management

pub mod auth;
pub mod catalog;
pub mod config;
pub mod db;
pub mod directives;
pub mod errors;
pub mod flow;
pub mod metrics;
pub mod renters;

// Re-export commonly used types
pub use catalog::{build_service_detail, ServiceDetail, ServiceRef, ServiceWriter};
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use renters::RenterDirectory;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
