//! Renter directory handlers
//!
//! Read-through surface over the in-memory directory, consumed by the
//! proxy fleet. The first request triggers the one-time load; every
//! subsequent request reads the populated map.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::AppState;
use gatewarden_common::{
    db::models::Renter,
    errors::{AppError, Result},
};

#[derive(Serialize)]
pub struct DirectoryResponse {
    pub total: usize,
    pub renters: Vec<Renter>,
}

/// Snapshot of every renter in the directory
pub async fn list_directory(State(state): State<AppState>) -> Result<Json<DirectoryResponse>> {
    state.directory.ensure_loaded().await?;

    let renters: Vec<Renter> = state
        .directory
        .list()
        .iter()
        .map(|renter| (**renter).clone())
        .collect();

    Ok(Json(DirectoryResponse {
        total: renters.len(),
        renters,
    }))
}

/// O(1) lookup by external tenant identifier
pub async fn lookup_renter(
    State(state): State<AppState>,
    Path(renter_id): Path<String>,
) -> Result<Json<Renter>> {
    state.directory.ensure_loaded().await?;

    let renter = state
        .directory
        .lookup(&renter_id)
        .ok_or(AppError::RenterNotFound { id: renter_id })?;

    Ok(Json((*renter).clone()))
}
