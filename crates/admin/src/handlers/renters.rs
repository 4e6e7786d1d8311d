//! Renter management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use gatewarden_common::{
    auth,
    db::models::Renter,
    db::{NewRenter, PageParams, Repository, RenterUpdate},
    errors::{AppError, Result},
    renters::{compose_usage, quota_status, UsageReport},
};

fn default_page_no() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenterListQuery {
    pub keyword: Option<String>,

    #[serde(default = "default_page_no")]
    #[validate(range(min = 1, max = 999))]
    pub page_no: u64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 999))]
    pub page_size: u64,
}

/// Body for creating or updating a renter. An omitted secret is derived
/// from the renter identifier.
#[derive(Debug, Deserialize, Validate)]
pub struct RenterBody {
    #[validate(length(min = 1, max = 128))]
    pub renter_id: String,

    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 128))]
    pub secret: String,

    #[serde(default)]
    pub white_ips: String,

    #[serde(default)]
    pub qpd: i64,

    #[serde(default)]
    pub qps: i64,
}

impl RenterBody {
    fn resolved_secret(&self) -> String {
        if self.secret.is_empty() {
            auth::default_secret(&self.renter_id)
        } else {
            self.secret.clone()
        }
    }
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Serialize)]
pub struct RenterListItem {
    pub id: i64,
    pub renter_id: String,
    pub name: String,
    pub secret: String,
    pub white_ips: String,
    pub qpd: i64,
    pub qps: i64,
    pub real_qpd: i64,
    pub real_qps: i64,
}

#[derive(Serialize)]
pub struct RenterListResponse {
    pub total: u64,
    pub renters: Vec<RenterListItem>,
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation {
        message: e.to_string(),
        field: None,
    }
}

/// Refresh the directory after a committed renter write. The write has
/// already happened; a refresh failure only delays visibility.
async fn refresh_directory(state: &AppState) {
    if let Err(err) = state.directory.refresh().await {
        tracing::warn!(error = %err, "Renter directory refresh failed");
    }
}

/// List active renters with their configured quotas and live counters
pub async fn list_renters(
    State(state): State<AppState>,
    Query(query): Query<RenterListQuery>,
) -> Result<Json<RenterListResponse>> {
    query.validate().map_err(validation_error)?;

    let repo = Repository::new(state.db.clone());
    let page = PageParams::new(query.page_no, query.page_size);
    let (renters, total) = repo.list_renters(query.keyword.as_deref(), page).await?;

    let mut items = Vec::with_capacity(renters.len());
    for renter in renters {
        let quota = quota_status(state.flow.as_ref(), &renter).await?;
        items.push(RenterListItem {
            id: renter.id,
            renter_id: renter.renter_id,
            name: renter.name,
            secret: renter.secret,
            white_ips: renter.white_ips,
            qpd: quota.qpd,
            qps: quota.qps,
            real_qpd: quota.real_qpd,
            real_qps: quota.real_qps,
        });
    }

    Ok(Json(RenterListResponse {
        total,
        renters: items,
    }))
}

/// One renter by primary key
pub async fn renter_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Renter>> {
    let repo = Repository::new(state.db.clone());
    let renter = repo
        .find_renter(id)
        .await?
        .ok_or_else(|| AppError::RenterNotFound { id: id.to_string() })?;

    Ok(Json(renter))
}

/// Create a renter. The external renter identifier must be unique among
/// active renters.
pub async fn create_renter(
    State(state): State<AppState>,
    Json(body): Json<RenterBody>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    body.validate().map_err(validation_error)?;

    let repo = Repository::new(state.db.clone());
    if repo
        .find_renter_by_renter_id(&body.renter_id)
        .await?
        .is_some()
    {
        return Err(AppError::validation(format!(
            "renter_id `{}` already in use",
            body.renter_id
        )));
    }

    let secret = body.resolved_secret();
    let renter = repo
        .insert_renter(NewRenter {
            renter_id: body.renter_id,
            name: body.name,
            secret,
            white_ips: body.white_ips,
            qpd: body.qpd,
            qps: body.qps,
        })
        .await?;

    refresh_directory(&state).await;

    tracing::info!(renter_id = %renter.renter_id, "Renter created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: renter.id })))
}

/// Update a renter in place
pub async fn update_renter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<RenterBody>,
) -> Result<StatusCode> {
    body.validate().map_err(validation_error)?;

    let repo = Repository::new(state.db.clone());
    let existing = repo
        .find_renter(id)
        .await?
        .ok_or_else(|| AppError::RenterNotFound { id: id.to_string() })?;

    // The external identifier is the counter and cache key; it stays fixed.
    if existing.renter_id != body.renter_id {
        return Err(AppError::validation("renter_id cannot be changed"));
    }

    let secret = body.resolved_secret();
    repo.update_renter(
        existing,
        RenterUpdate {
            name: body.name,
            secret,
            white_ips: body.white_ips,
            qpd: body.qpd,
            qps: body.qps,
        },
    )
    .await?;

    refresh_directory(&state).await;

    tracing::info!(renter_id = id, "Renter updated");
    Ok(StatusCode::NO_CONTENT)
}

/// Soft delete a renter
pub async fn delete_renter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());
    if !repo.soft_delete_renter(id).await? {
        return Err(AppError::RenterNotFound { id: id.to_string() });
    }

    refresh_directory(&state).await;

    tracing::info!(renter_id = id, "Renter deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Hour-bucketed usage series for one renter
pub async fn renter_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UsageReport>> {
    let repo = Repository::new(state.db.clone());
    let renter = repo
        .find_renter(id)
        .await?
        .ok_or_else(|| AppError::RenterNotFound { id: id.to_string() })?;

    let report = compose_usage(state.flow.as_ref(), &renter, state.tz, Utc::now()).await?;
    Ok(Json(report))
}
