//! Flow counter boundary
//!
//! The QPS measurement engine lives outside this control plane; these are
//! the contracts it is consumed through, plus a trivial in-process backend
//! used as the default wiring and in tests. Counter keys are namespaced so
//! renter, service, and gateway-wide series never collide.

use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

/// Key prefix for per-renter counters
pub const FLOW_RENTER_PREFIX: &str = "flow.renter.";

/// Key prefix for per-service counters
pub const FLOW_SERVICE_PREFIX: &str = "flow.service.";

/// Key of the gateway-wide counter
pub const FLOW_TOTAL_KEY: &str = "flow.total";

/// Point-in-time reading of one counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowSnapshot {
    /// Requests recorded today
    pub total: i64,

    /// Current requests per second
    pub qps: i64,
}

/// Read-side contract of the flow counter collaborator
#[async_trait]
pub trait FlowCounter: Send + Sync {
    /// Current totals for a counter key. Unknown keys read as zero.
    async fn snapshot(&self, key: &str) -> Result<FlowSnapshot>;

    /// Requests recorded for the wall-clock hour containing `hour`.
    /// Hours with no recorded traffic read as zero, never as absent.
    async fn hour_count(&self, key: &str, hour: DateTime<Utc>) -> Result<i64>;
}

/// Renter counter key for a tenant identifier
pub fn renter_key(renter_id: &str) -> String {
    format!("{}{}", FLOW_RENTER_PREFIX, renter_id)
}

/// Service counter key for a service id
pub fn service_key(service_id: i64) -> String {
    format!("{}{}", FLOW_SERVICE_PREFIX, service_id)
}

/// In-process counter store. The default backend when no external engine is
/// wired in; also what the tests feed.
#[derive(Default)]
pub struct MemoryFlowCounter {
    inner: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    snapshots: HashMap<String, FlowSnapshot>,
    hours: HashMap<(String, i64), i64>,
}

impl MemoryFlowCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot reading for a key
    pub fn set_snapshot(&self, key: &str, snapshot: FlowSnapshot) {
        let mut state = self.inner.write().expect("flow counter lock poisoned");
        state.snapshots.insert(key.to_string(), snapshot);
    }

    /// Set the count for the hour containing `hour`
    pub fn set_hour_count(&self, key: &str, hour: DateTime<Utc>, count: i64) {
        let mut state = self.inner.write().expect("flow counter lock poisoned");
        state.hours.insert((key.to_string(), hour_bucket(hour)), count);
    }
}

fn hour_bucket(at: DateTime<Utc>) -> i64 {
    at.timestamp() - at.timestamp().rem_euclid(3600)
}

#[async_trait]
impl FlowCounter for MemoryFlowCounter {
    async fn snapshot(&self, key: &str) -> Result<FlowSnapshot> {
        let state = self.inner.read().expect("flow counter lock poisoned");
        Ok(state.snapshots.get(key).copied().unwrap_or_default())
    }

    async fn hour_count(&self, key: &str, hour: DateTime<Utc>) -> Result<i64> {
        let state = self.inner.read().expect("flow counter lock poisoned");
        Ok(state
            .hours
            .get(&(key.to_string(), hour_bucket(hour)))
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_counter_keys() {
        assert_eq!(renter_key("tenant-42"), "flow.renter.tenant-42");
        assert_eq!(service_key(7), "flow.service.7");
    }

    #[tokio::test]
    async fn unknown_keys_read_zero() {
        let counter = MemoryFlowCounter::new();
        let snap = counter.snapshot("flow.renter.ghost").await.unwrap();
        assert_eq!(snap, FlowSnapshot::default());

        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        assert_eq!(counter.hour_count("flow.renter.ghost", at).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn hour_counts_bucket_by_hour() {
        let counter = MemoryFlowCounter::new();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        counter.set_hour_count("flow.total", at, 37);

        let later_same_hour = Utc.with_ymd_and_hms(2024, 5, 1, 9, 59, 59).unwrap();
        assert_eq!(counter.hour_count("flow.total", later_same_hour).await.unwrap(), 37);

        let next_hour = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(counter.hour_count("flow.total", next_hour).await.unwrap(), 0);
    }
}
