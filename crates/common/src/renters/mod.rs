//! Renter directory and usage composition

pub mod directory;
pub mod usage;

pub use directory::{RenterDirectory, RenterSource};
pub use usage::{compose_series, compose_usage, quota_status, QuotaStatus, UsageReport};
