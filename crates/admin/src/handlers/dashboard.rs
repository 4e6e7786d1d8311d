//! Dashboard aggregation handlers

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;
use gatewarden_common::{
    db::models::Protocol,
    db::Repository,
    errors::Result,
    flow::FLOW_TOTAL_KEY,
    renters::{compose_series, UsageReport},
};

#[derive(Serialize)]
pub struct OverviewResponse {
    pub service_total: u64,
    pub renter_total: u64,
    pub current_qps: i64,
    pub today_requests: i64,
}

#[derive(Serialize)]
pub struct ServiceStatItem {
    pub name: String,
    pub value: i64,
}

#[derive(Serialize)]
pub struct ServiceStatResponse {
    pub legend: Vec<String>,
    pub data: Vec<ServiceStatItem>,
}

/// Totals panel: active services and renters plus gateway-wide traffic
pub async fn overview(State(state): State<AppState>) -> Result<Json<OverviewResponse>> {
    let repo = Repository::new(state.db.clone());

    let service_total = repo.count_services().await?;
    let renter_total = repo.count_renters().await?;
    let snapshot = state.flow.snapshot(FLOW_TOTAL_KEY).await?;

    Ok(Json(OverviewResponse {
        service_total,
        renter_total,
        current_qps: snapshot.qps,
        today_requests: snapshot.total,
    }))
}

/// Gateway-wide hour-bucketed traffic series
pub async fn flow_stats(State(state): State<AppState>) -> Result<Json<UsageReport>> {
    let report = compose_series(state.flow.as_ref(), FLOW_TOTAL_KEY, state.tz, Utc::now()).await?;
    Ok(Json(report))
}

/// Active service totals grouped by protocol kind
pub async fn service_stats(State(state): State<AppState>) -> Result<Json<ServiceStatResponse>> {
    let repo = Repository::new(state.db.clone());
    let rows = repo.services_by_protocol().await?;

    let mut legend = Vec::with_capacity(rows.len());
    let mut data = Vec::with_capacity(rows.len());
    for row in rows {
        let name = Protocol::from(row.protocol).legend_name().to_string();
        legend.push(name.clone());
        data.push(ServiceStatItem {
            name,
            value: row.total,
        });
    }

    Ok(Json(ServiceStatResponse { legend, data }))
}
