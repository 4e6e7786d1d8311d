//! Service aggregate management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use gatewarden_common::{
    catalog::{
        build_service_detail, AccessSpec, BalanceSpec, GrpcServiceSpec, HttpServiceSpec,
        ServiceDetail, ServiceRef, TcpServiceSpec,
    },
    db::models::{BalanceStrategy, RuleKind},
    db::{PageParams, Repository},
    errors::{AppError, Result},
    flow::service_key,
    renters::{compose_series, UsageReport},
};

fn default_page_no() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

fn default_strategy() -> BalanceStrategy {
    BalanceStrategy::WeightedRoundRobin
}

#[derive(Debug, Deserialize, Validate)]
pub struct ServiceListQuery {
    pub keyword: Option<String>,

    #[serde(default = "default_page_no")]
    #[validate(range(min = 1, max = 999))]
    pub page_no: u64,

    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 999))]
    pub page_size: u64,
}

/// Access-control fields accepted on every protocol's body
#[derive(Debug, Default, Deserialize)]
pub struct AccessPolicyInput {
    #[serde(default)]
    pub open_auth: bool,

    #[serde(default)]
    pub black_list: String,

    #[serde(default)]
    pub white_list: String,

    #[serde(default)]
    pub white_host_name: String,

    #[serde(default)]
    pub client_ip_flow_limit: i64,

    #[serde(default)]
    pub service_flow_limit: i64,
}

impl AccessPolicyInput {
    fn into_spec(self) -> AccessSpec {
        AccessSpec {
            open_auth: self.open_auth,
            black_list: self.black_list,
            white_list: self.white_list,
            white_host_name: self.white_host_name,
            client_ip_flow_limit: self.client_ip_flow_limit,
            service_flow_limit: self.service_flow_limit,
        }
    }
}

/// Load-balance fields accepted on every protocol's body
#[derive(Debug, Deserialize)]
pub struct BalancePolicyInput {
    #[serde(default = "default_strategy")]
    pub strategy: BalanceStrategy,

    pub ip_list: String,

    pub weight_list: String,

    #[serde(default)]
    pub forbid_list: String,

    #[serde(default)]
    pub upstream_connect_timeout: i32,

    #[serde(default)]
    pub upstream_header_timeout: i32,

    #[serde(default)]
    pub upstream_idle_timeout: i32,

    #[serde(default)]
    pub upstream_max_idle: i32,
}

impl BalancePolicyInput {
    fn into_spec(self) -> BalanceSpec {
        BalanceSpec {
            strategy: self.strategy,
            ip_list: self.ip_list,
            weight_list: self.weight_list,
            forbid_list: self.forbid_list,
            upstream_connect_timeout: self.upstream_connect_timeout,
            upstream_header_timeout: self.upstream_header_timeout,
            upstream_idle_timeout: self.upstream_idle_timeout,
            upstream_max_idle: self.upstream_max_idle,
        }
    }
}

/// Body for creating or updating an HTTP service
#[derive(Debug, Deserialize, Validate)]
pub struct HttpServiceBody {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub description: String,

    pub rule_kind: RuleKind,

    #[validate(length(min = 1, max = 255))]
    pub rule: String,

    #[serde(default)]
    pub need_https: bool,

    #[serde(default)]
    pub need_strip_uri: bool,

    #[serde(default)]
    pub need_websocket: bool,

    #[serde(default)]
    pub url_rewrite: String,

    #[serde(default)]
    pub header_transfer: String,

    #[serde(default)]
    pub access: AccessPolicyInput,

    pub balance: BalancePolicyInput,
}

impl HttpServiceBody {
    fn into_spec(self) -> HttpServiceSpec {
        HttpServiceSpec {
            name: self.name,
            description: self.description,
            rule_kind: self.rule_kind,
            rule: self.rule,
            need_https: self.need_https,
            need_strip_uri: self.need_strip_uri,
            need_websocket: self.need_websocket,
            url_rewrite: self.url_rewrite,
            header_transfer: self.header_transfer,
            access: self.access.into_spec(),
            balance: self.balance.into_spec(),
        }
    }
}

/// Body for creating or updating a TCP service
#[derive(Debug, Deserialize, Validate)]
pub struct TcpServiceBody {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub description: String,

    pub port: i32,

    #[serde(default)]
    pub access: AccessPolicyInput,

    pub balance: BalancePolicyInput,
}

impl TcpServiceBody {
    fn into_spec(self) -> TcpServiceSpec {
        TcpServiceSpec {
            name: self.name,
            description: self.description,
            port: self.port,
            access: self.access.into_spec(),
            balance: self.balance.into_spec(),
        }
    }
}

/// Body for creating or updating a gRPC service
#[derive(Debug, Deserialize, Validate)]
pub struct GrpcServiceBody {
    #[validate(length(min = 1, max = 128))]
    pub name: String,

    #[serde(default)]
    #[validate(length(max = 255))]
    pub description: String,

    pub port: i32,

    #[serde(default)]
    pub metadata_transfer: String,

    #[serde(default)]
    pub access: AccessPolicyInput,

    pub balance: BalancePolicyInput,
}

impl GrpcServiceBody {
    fn into_spec(self) -> GrpcServiceSpec {
        GrpcServiceSpec {
            name: self.name,
            description: self.description,
            port: self.port,
            metadata_transfer: self.metadata_transfer,
            access: self.access.into_spec(),
            balance: self.balance.into_spec(),
        }
    }
}

#[derive(Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Serialize)]
pub struct ServiceListItem {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub protocol: String,
    pub address: String,
    pub qps: i64,
    pub qpd: i64,
    pub total_node: usize,
}

#[derive(Serialize)]
pub struct ServiceListResponse {
    pub total: u64,
    pub services: Vec<ServiceListItem>,
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    AppError::Validation {
        message: e.to_string(),
        field: None,
    }
}

/// List active services with live traffic numbers and derived addresses
pub async fn list_services(
    State(state): State<AppState>,
    Query(query): Query<ServiceListQuery>,
) -> Result<Json<ServiceListResponse>> {
    query.validate().map_err(validation_error)?;

    let repo = Repository::new(state.db.clone());
    let page = PageParams::new(query.page_no, query.page_size);
    let (services, total) = repo.list_services(query.keyword.as_deref(), page).await?;

    let mut items = Vec::with_capacity(services.len());
    for service in services {
        let detail = build_service_detail(state.db.read(), ServiceRef::Id(service.id)).await?;
        let address = detail.public_address(&state.config.cluster)?;
        let total_node = detail.require_load_balance()?.node_count();
        let snapshot = state.flow.snapshot(&service_key(service.id)).await?;

        let protocol = service.protocol_kind().legend_name().to_string();
        items.push(ServiceListItem {
            id: service.id,
            name: service.name,
            description: service.description,
            protocol,
            address,
            qps: snapshot.qps,
            qpd: snapshot.total,
            total_node,
        });
    }

    Ok(Json(ServiceListResponse {
        total,
        services: items,
    }))
}

/// Full aggregate view of one service
pub async fn service_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ServiceDetail>> {
    let detail = build_service_detail(state.db.read(), ServiceRef::Id(id)).await?;
    Ok(Json(detail))
}

/// Full aggregate view of one service, addressed by its unique name
pub async fn service_detail_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ServiceDetail>> {
    let detail = build_service_detail(state.db.read(), ServiceRef::Name(&name)).await?;
    Ok(Json(detail))
}

/// Hour-bucketed traffic series for one service
pub async fn service_stats(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<UsageReport>> {
    let repo = Repository::new(state.db.clone());
    repo.find_service(id)
        .await?
        .ok_or_else(|| AppError::ServiceNotFound { id: id.to_string() })?;

    let report = compose_series(
        state.flow.as_ref(),
        &service_key(id),
        state.tz,
        chrono::Utc::now(),
    )
    .await?;

    Ok(Json(report))
}

/// Soft delete a service
pub async fn delete_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    state.writer.soft_delete(id).await?;

    tracing::info!(service_id = id, "Service deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Create an HTTP service aggregate
pub async fn create_http_service(
    State(state): State<AppState>,
    Json(body): Json<HttpServiceBody>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    body.validate().map_err(validation_error)?;

    let id = state.writer.create_http(&body.into_spec()).await?;

    tracing::info!(service_id = id, "HTTP service created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Update an HTTP service aggregate
pub async fn update_http_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<HttpServiceBody>,
) -> Result<StatusCode> {
    body.validate().map_err(validation_error)?;

    state.writer.update_http(id, &body.into_spec()).await?;

    tracing::info!(service_id = id, "HTTP service updated");
    Ok(StatusCode::NO_CONTENT)
}

/// Create a TCP service aggregate
pub async fn create_tcp_service(
    State(state): State<AppState>,
    Json(body): Json<TcpServiceBody>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    body.validate().map_err(validation_error)?;

    let id = state.writer.create_tcp(&body.into_spec()).await?;

    tracing::info!(service_id = id, "TCP service created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Update a TCP service aggregate
pub async fn update_tcp_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<TcpServiceBody>,
) -> Result<StatusCode> {
    body.validate().map_err(validation_error)?;

    state.writer.update_tcp(id, &body.into_spec()).await?;

    tracing::info!(service_id = id, "TCP service updated");
    Ok(StatusCode::NO_CONTENT)
}

/// Create a gRPC service aggregate
pub async fn create_grpc_service(
    State(state): State<AppState>,
    Json(body): Json<GrpcServiceBody>,
) -> Result<(StatusCode, Json<CreatedResponse>)> {
    body.validate().map_err(validation_error)?;

    let id = state.writer.create_grpc(&body.into_spec()).await?;

    tracing::info!(service_id = id, "gRPC service created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Update a gRPC service aggregate
pub async fn update_grpc_service(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<GrpcServiceBody>,
) -> Result<StatusCode> {
    body.validate().map_err(validation_error)?;

    state.writer.update_grpc(id, &body.into_spec()).await?;

    tracing::info!(service_id = id, "gRPC service updated");
    Ok(StatusCode::NO_CONTENT)
}
