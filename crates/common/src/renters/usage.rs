//! Quota/usage composition
//!
//! Merges a renter's static quota configuration with live counters from the
//! flow-counter collaborator into hour-bucketed series: hours 0 through the
//! current hour for today, and a full 24-hour series for yesterday, both in
//! the deployment's configured time zone. Hours with no recorded traffic
//! are zero, never absent. Read-only aggregation at report time.

use crate::db::models::Renter;
use crate::errors::Result;
use crate::flow::{renter_key, FlowCounter, FlowSnapshot};
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Hour-bucketed request counts for one counter key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    /// Hours 0..=current hour of today, local to the reporting time zone
    pub today: Vec<i64>,

    /// All 24 hours of yesterday
    pub yesterday: Vec<i64>,
}

/// Static quota limits merged with the live counter reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    pub qpd: i64,
    pub qps: i64,
    pub real_qpd: i64,
    pub real_qps: i64,
}

/// Compose the usage report for one renter, keyed by its namespaced
/// flow-counter key.
pub async fn compose_usage(
    flow: &dyn FlowCounter,
    renter: &Renter,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<UsageReport> {
    compose_series(flow, &renter_key(&renter.renter_id), tz, now).await
}

/// Compose the hour-bucketed series for an arbitrary counter key
pub async fn compose_series(
    flow: &dyn FlowCounter,
    key: &str,
    tz: Tz,
    now: DateTime<Utc>,
) -> Result<UsageReport> {
    let local_now = now.with_timezone(&tz);

    let mut today = Vec::with_capacity(local_now.hour() as usize + 1);
    for hour in 0..=local_now.hour() {
        today.push(hour_count_at(flow, key, &tz, local_now.date_naive(), hour).await?);
    }

    let yesterday_date = (local_now - Duration::days(1)).date_naive();
    let mut yesterday = Vec::with_capacity(24);
    for hour in 0..24 {
        yesterday.push(hour_count_at(flow, key, &tz, yesterday_date, hour).await?);
    }

    Ok(UsageReport { today, yesterday })
}

/// Merge a renter's configured limits with the live counter snapshot
pub async fn quota_status(flow: &dyn FlowCounter, renter: &Renter) -> Result<QuotaStatus> {
    let FlowSnapshot { total, qps } = flow.snapshot(&renter_key(&renter.renter_id)).await?;
    Ok(QuotaStatus {
        qpd: renter.qpd,
        qps: renter.qps,
        real_qpd: total,
        real_qps: qps,
    })
}

async fn hour_count_at(
    flow: &dyn FlowCounter,
    key: &str,
    tz: &Tz,
    date: chrono::NaiveDate,
    hour: u32,
) -> Result<i64> {
    // A DST gap can make a local hour nonexistent; such hours read as zero.
    match tz
        .with_ymd_and_hms(date.year(), date.month(), date.day(), hour, 0, 0)
        .earliest()
    {
        Some(local) => flow.hour_count(key, local.with_timezone(&Utc)).await,
        None => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::MemoryFlowCounter;

    fn renter(renter_id: &str, qps: i64) -> Renter {
        Renter {
            id: 1,
            renter_id: renter_id.into(),
            name: renter_id.into(),
            secret: String::new(),
            white_ips: String::new(),
            qpd: 10_000,
            qps,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn uncounted_hours_default_to_zero() {
        let flow = MemoryFlowCounter::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        flow.set_hour_count(
            "flow.renter.tenant-42",
            Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            37,
        );

        let report = compose_usage(&flow, &renter("tenant-42", 100), chrono_tz::UTC, now)
            .await
            .unwrap();

        // Hours 0..=9 of today, hour 0 counted, everything else zero.
        assert_eq!(report.today.len(), 10);
        assert_eq!(report.today[0], 37);
        assert!(report.today[1..].iter().all(|&count| count == 0));
        assert_eq!(report.yesterday.len(), 24);
        assert!(report.yesterday.iter().all(|&count| count == 0));
    }

    #[tokio::test]
    async fn yesterday_buckets_resolve() {
        let flow = MemoryFlowCounter::new();
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        flow.set_hour_count(
            "flow.renter.tenant-42",
            Utc.with_ymd_and_hms(2024, 4, 30, 5, 0, 0).unwrap(),
            12,
        );

        let report = compose_usage(&flow, &renter("tenant-42", 100), chrono_tz::UTC, now)
            .await
            .unwrap();

        assert_eq!(report.yesterday[5], 12);
    }

    #[tokio::test]
    async fn buckets_follow_the_reporting_time_zone() {
        let flow = MemoryFlowCounter::new();
        // 01:30 UTC is 21:30 the previous day in New York (EDT).
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 1, 30, 0).unwrap();

        let report = compose_usage(
            &flow,
            &renter("tenant-42", 100),
            chrono_tz::America::New_York,
            now,
        )
        .await
        .unwrap();

        assert_eq!(report.today.len(), 22);
    }

    #[tokio::test]
    async fn quota_status_merges_static_and_live() {
        let flow = MemoryFlowCounter::new();
        flow.set_snapshot(
            "flow.renter.tenant-42",
            FlowSnapshot {
                total: 1234,
                qps: 7,
            },
        );

        let status = quota_status(&flow, &renter("tenant-42", 100)).await.unwrap();
        assert_eq!(status.qps, 100);
        assert_eq!(status.real_qps, 7);
        assert_eq!(status.real_qpd, 1234);
    }
}
