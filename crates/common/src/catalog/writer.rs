//! Transactional aggregate write path
//!
//! Every create/update of a service flows through one command here:
//! eager validation first (nothing touches storage on rejection), then a
//! single transaction that re-checks uniqueness, writes the identity row,
//! and writes the dependent rows keyed by its id. Any failure rolls the
//! whole aggregate back; partial aggregates are never observable.

use crate::catalog::detail::{build_service_detail, ServiceDetail, ServiceRef};
use crate::catalog::validate::{
    validate_balance, validate_http_directives, validate_metadata_transfer, validate_port,
    ParsedBalance,
};
use crate::config::PortsConfig;
use crate::db::models::*;
use crate::db::repository::queries;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use chrono::Utc;
use metrics::counter;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, TransactionError, TransactionTrait};

/// Access-control fields shared by every protocol's spec
#[derive(Debug, Clone, Default)]
pub struct AccessSpec {
    pub open_auth: bool,
    pub black_list: String,
    pub white_list: String,
    pub white_host_name: String,
    pub client_ip_flow_limit: i64,
    pub service_flow_limit: i64,
}

/// Load-balance fields shared by every protocol's spec
#[derive(Debug, Clone)]
pub struct BalanceSpec {
    pub strategy: BalanceStrategy,
    pub ip_list: String,
    pub weight_list: String,
    pub forbid_list: String,
    pub upstream_connect_timeout: i32,
    pub upstream_header_timeout: i32,
    pub upstream_idle_timeout: i32,
    pub upstream_max_idle: i32,
}

/// Input for creating or updating an HTTP service aggregate
#[derive(Debug, Clone)]
pub struct HttpServiceSpec {
    pub name: String,
    pub description: String,
    pub rule_kind: RuleKind,
    pub rule: String,
    pub need_https: bool,
    pub need_strip_uri: bool,
    pub need_websocket: bool,
    pub url_rewrite: String,
    pub header_transfer: String,
    pub access: AccessSpec,
    pub balance: BalanceSpec,
}

/// Input for creating or updating a TCP service aggregate
#[derive(Debug, Clone)]
pub struct TcpServiceSpec {
    pub name: String,
    pub description: String,
    pub port: i32,
    pub access: AccessSpec,
    pub balance: BalanceSpec,
}

/// Input for creating or updating a gRPC service aggregate
#[derive(Debug, Clone)]
pub struct GrpcServiceSpec {
    pub name: String,
    pub description: String,
    pub port: i32,
    pub metadata_transfer: String,
    pub access: AccessSpec,
    pub balance: BalanceSpec,
}

/// Coordinates validated, transactional writes of service aggregates
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct ServiceWriter {
    pool: DbPool,
    ports: PortsConfig,
}

fn flatten_txn_err(err: TransactionError<AppError>) -> AppError {
    match err {
        TransactionError::Connection(db_err) => db_err.into(),
        TransactionError::Transaction(app_err) => app_err,
    }
}

impl ServiceWriter {
    pub fn new(pool: DbPool, ports: PortsConfig) -> Self {
        Self { pool, ports }
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Create an HTTP service aggregate, returning the new service id
    pub async fn create_http(&self, spec: &HttpServiceSpec) -> Result<i64> {
        let balance = validate_balance(&spec.balance.ip_list, &spec.balance.weight_list)?;
        let (url_rewrite, header_transfer) =
            validate_http_directives(&spec.url_rewrite, &spec.header_transfer)?;

        let spec = spec.clone();
        let id = self
            .pool
            .write()
            .transaction::<_, i64, AppError>(move |txn| {
                Box::pin(async move {
                    ensure_name_free(txn, &spec.name, None).await?;
                    ensure_http_rule_free(txn, spec.rule_kind, &spec.rule, None).await?;

                    let service =
                        insert_service(txn, Protocol::Http, &spec.name, &spec.description).await?;

                    HttpRuleActiveModel {
                        service_id: Set(service.id),
                        kind: Set(spec.rule_kind.into()),
                        rule: Set(spec.rule.clone()),
                        need_https: Set(spec.need_https),
                        need_strip_uri: Set(spec.need_strip_uri),
                        need_websocket: Set(spec.need_websocket),
                        url_rewrite: Set(url_rewrite),
                        header_transfer: Set(header_transfer),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    upsert_access(txn, service.id, &spec.access, None).await?;
                    upsert_balance(txn, service.id, &spec.balance, &balance, None).await?;

                    Ok(service.id)
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        record_write("http", "create");
        Ok(id)
    }

    /// Create a TCP service aggregate, returning the new service id
    pub async fn create_tcp(&self, spec: &TcpServiceSpec) -> Result<i64> {
        let balance = validate_balance(&spec.balance.ip_list, &spec.balance.weight_list)?;
        validate_port(spec.port, &self.ports)?;

        let spec = spec.clone();
        let id = self
            .pool
            .write()
            .transaction::<_, i64, AppError>(move |txn| {
                Box::pin(async move {
                    ensure_name_free(txn, &spec.name, None).await?;
                    ensure_port_free(txn, spec.port, None).await?;

                    let service =
                        insert_service(txn, Protocol::Tcp, &spec.name, &spec.description).await?;

                    TcpRuleActiveModel {
                        service_id: Set(service.id),
                        port: Set(spec.port),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    upsert_access(txn, service.id, &spec.access, None).await?;
                    upsert_balance(txn, service.id, &spec.balance, &balance, None).await?;

                    Ok(service.id)
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        record_write("tcp", "create");
        Ok(id)
    }

    /// Create a gRPC service aggregate, returning the new service id
    pub async fn create_grpc(&self, spec: &GrpcServiceSpec) -> Result<i64> {
        let balance = validate_balance(&spec.balance.ip_list, &spec.balance.weight_list)?;
        validate_port(spec.port, &self.ports)?;
        let metadata_transfer = validate_metadata_transfer(&spec.metadata_transfer)?;

        let spec = spec.clone();
        let id = self
            .pool
            .write()
            .transaction::<_, i64, AppError>(move |txn| {
                Box::pin(async move {
                    ensure_name_free(txn, &spec.name, None).await?;
                    ensure_port_free(txn, spec.port, None).await?;

                    let service =
                        insert_service(txn, Protocol::Grpc, &spec.name, &spec.description).await?;

                    GrpcRuleActiveModel {
                        service_id: Set(service.id),
                        port: Set(spec.port),
                        metadata_transfer: Set(metadata_transfer),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await?;

                    upsert_access(txn, service.id, &spec.access, None).await?;
                    upsert_balance(txn, service.id, &spec.balance, &balance, None).await?;

                    Ok(service.id)
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        record_write("grpc", "create");
        Ok(id)
    }

    // ========================================================================
    // Update
    // ========================================================================

    /// Update an HTTP service aggregate in place
    pub async fn update_http(&self, id: i64, spec: &HttpServiceSpec) -> Result<()> {
        let balance = validate_balance(&spec.balance.ip_list, &spec.balance.weight_list)?;
        let (url_rewrite, header_transfer) =
            validate_http_directives(&spec.url_rewrite, &spec.header_transfer)?;

        let spec = spec.clone();
        self.pool
            .write()
            .transaction::<_, (), AppError>(move |txn| {
                Box::pin(async move {
                    let detail = build_service_detail(txn, ServiceRef::Id(id)).await?;
                    expect_protocol(&detail, Protocol::Http)?;

                    ensure_name_free(txn, &spec.name, Some(id)).await?;
                    ensure_http_rule_free(txn, spec.rule_kind, &spec.rule, Some(id)).await?;

                    update_service(txn, &detail, &spec.name, &spec.description).await?;

                    match detail.http_rule {
                        Some(existing) => {
                            let mut rule: HttpRuleActiveModel = existing.into();
                            rule.kind = Set(spec.rule_kind.into());
                            rule.rule = Set(spec.rule.clone());
                            rule.need_https = Set(spec.need_https);
                            rule.need_strip_uri = Set(spec.need_strip_uri);
                            rule.need_websocket = Set(spec.need_websocket);
                            rule.url_rewrite = Set(url_rewrite);
                            rule.header_transfer = Set(header_transfer);
                            rule.update(txn).await?;
                        }
                        None => {
                            HttpRuleActiveModel {
                                service_id: Set(id),
                                kind: Set(spec.rule_kind.into()),
                                rule: Set(spec.rule.clone()),
                                need_https: Set(spec.need_https),
                                need_strip_uri: Set(spec.need_strip_uri),
                                need_websocket: Set(spec.need_websocket),
                                url_rewrite: Set(url_rewrite),
                                header_transfer: Set(header_transfer),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await?;
                        }
                    }

                    upsert_access(txn, id, &spec.access, detail.access_control).await?;
                    upsert_balance(txn, id, &spec.balance, &balance, detail.load_balance).await?;

                    Ok(())
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        record_write("http", "update");
        Ok(())
    }

    /// Update a TCP service aggregate in place
    pub async fn update_tcp(&self, id: i64, spec: &TcpServiceSpec) -> Result<()> {
        let balance = validate_balance(&spec.balance.ip_list, &spec.balance.weight_list)?;
        validate_port(spec.port, &self.ports)?;

        let spec = spec.clone();
        self.pool
            .write()
            .transaction::<_, (), AppError>(move |txn| {
                Box::pin(async move {
                    let detail = build_service_detail(txn, ServiceRef::Id(id)).await?;
                    expect_protocol(&detail, Protocol::Tcp)?;

                    ensure_name_free(txn, &spec.name, Some(id)).await?;
                    ensure_port_free(txn, spec.port, Some(id)).await?;

                    update_service(txn, &detail, &spec.name, &spec.description).await?;

                    match detail.tcp_rule {
                        Some(existing) => {
                            let mut rule: TcpRuleActiveModel = existing.into();
                            rule.port = Set(spec.port);
                            rule.update(txn).await?;
                        }
                        None => {
                            TcpRuleActiveModel {
                                service_id: Set(id),
                                port: Set(spec.port),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await?;
                        }
                    }

                    upsert_access(txn, id, &spec.access, detail.access_control).await?;
                    upsert_balance(txn, id, &spec.balance, &balance, detail.load_balance).await?;

                    Ok(())
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        record_write("tcp", "update");
        Ok(())
    }

    /// Update a gRPC service aggregate in place
    pub async fn update_grpc(&self, id: i64, spec: &GrpcServiceSpec) -> Result<()> {
        let balance = validate_balance(&spec.balance.ip_list, &spec.balance.weight_list)?;
        validate_port(spec.port, &self.ports)?;
        let metadata_transfer = validate_metadata_transfer(&spec.metadata_transfer)?;

        let spec = spec.clone();
        self.pool
            .write()
            .transaction::<_, (), AppError>(move |txn| {
                Box::pin(async move {
                    let detail = build_service_detail(txn, ServiceRef::Id(id)).await?;
                    expect_protocol(&detail, Protocol::Grpc)?;

                    ensure_name_free(txn, &spec.name, Some(id)).await?;
                    ensure_port_free(txn, spec.port, Some(id)).await?;

                    update_service(txn, &detail, &spec.name, &spec.description).await?;

                    match detail.grpc_rule {
                        Some(existing) => {
                            let mut rule: GrpcRuleActiveModel = existing.into();
                            rule.port = Set(spec.port);
                            rule.metadata_transfer = Set(metadata_transfer);
                            rule.update(txn).await?;
                        }
                        None => {
                            GrpcRuleActiveModel {
                                service_id: Set(id),
                                port: Set(spec.port),
                                metadata_transfer: Set(metadata_transfer),
                                ..Default::default()
                            }
                            .insert(txn)
                            .await?;
                        }
                    }

                    upsert_access(txn, id, &spec.access, detail.access_control).await?;
                    upsert_balance(txn, id, &spec.balance, &balance, detail.load_balance).await?;

                    Ok(())
                })
            })
            .await
            .map_err(flatten_txn_err)?;

        record_write("grpc", "update");
        Ok(())
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Soft delete a service. The identity row is flagged, never removed;
    /// its rule rows become unreachable through normal listing paths.
    pub async fn soft_delete(&self, id: i64) -> Result<()> {
        let conn = self.pool.write();

        let service = queries::active_service_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::ServiceNotFound { id: id.to_string() })?;

        let protocol = service.protocol_kind();
        let mut service: ServiceActiveModel = service.into();
        service.is_deleted = Set(true);
        service.updated_at = Set(Utc::now().into());
        service.update(conn).await?;

        record_write(protocol.legend_name(), "delete");
        Ok(())
    }
}

fn record_write(protocol: &str, op: &'static str) {
    counter!(
        "gatewarden_aggregate_writes_total",
        "protocol" => protocol.to_string(),
        "op" => op
    )
    .increment(1);
}

fn expect_protocol(detail: &ServiceDetail, expected: Protocol) -> Result<()> {
    let actual = detail.service.protocol_kind();
    if actual == expected {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "service {} is {:?}; its protocol kind cannot change",
            detail.service.id, actual
        )))
    }
}

async fn insert_service<C: ConnectionTrait>(
    conn: &C,
    protocol: Protocol,
    name: &str,
    description: &str,
) -> Result<Service> {
    let now = Utc::now();
    ServiceActiveModel {
        protocol: Set(protocol.into()),
        name: Set(name.to_string()),
        description: Set(description.to_string()),
        is_deleted: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(Into::into)
}

async fn update_service<C: ConnectionTrait>(
    conn: &C,
    detail: &ServiceDetail,
    name: &str,
    description: &str,
) -> Result<()> {
    let mut service: ServiceActiveModel = detail.service.clone().into();
    service.name = Set(name.to_string());
    service.description = Set(description.to_string());
    service.updated_at = Set(Utc::now().into());
    service.update(conn).await?;
    Ok(())
}

/// Fail when the name is claimed by another active service
async fn ensure_name_free<C: ConnectionTrait>(
    conn: &C,
    name: &str,
    exclude_service: Option<i64>,
) -> Result<()> {
    if let Some(existing) = queries::active_service_by_name(conn, name).await? {
        if exclude_service != Some(existing.id) {
            return Err(AppError::NameInUse {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

/// Fail when the (kind, rule) pair is claimed by another active HTTP rule
async fn ensure_http_rule_free<C: ConnectionTrait>(
    conn: &C,
    kind: RuleKind,
    rule: &str,
    exclude_service: Option<i64>,
) -> Result<()> {
    if let Some(existing) = queries::active_http_rule(conn, kind.into(), rule).await? {
        if exclude_service != Some(existing.service_id) {
            return Err(AppError::RuleInUse {
                rule: rule.to_string(),
            });
        }
    }
    Ok(())
}

/// Fail when the port is claimed by any active TCP or gRPC rule
async fn ensure_port_free<C: ConnectionTrait>(
    conn: &C,
    port: i32,
    exclude_service: Option<i64>,
) -> Result<()> {
    if let Some(existing) = queries::active_tcp_rule_by_port(conn, port).await? {
        if exclude_service != Some(existing.service_id) {
            return Err(AppError::PortInUse { port });
        }
    }
    if let Some(existing) = queries::active_grpc_rule_by_port(conn, port).await? {
        if exclude_service != Some(existing.service_id) {
            return Err(AppError::PortInUse { port });
        }
    }
    Ok(())
}

async fn upsert_access<C: ConnectionTrait>(
    conn: &C,
    service_id: i64,
    spec: &AccessSpec,
    existing: Option<AccessControl>,
) -> Result<()> {
    match existing {
        Some(row) => {
            let mut access: AccessControlActiveModel = row.into();
            access.open_auth = Set(spec.open_auth);
            access.black_list = Set(spec.black_list.clone());
            access.white_list = Set(spec.white_list.clone());
            access.white_host_name = Set(spec.white_host_name.clone());
            access.client_ip_flow_limit = Set(spec.client_ip_flow_limit);
            access.service_flow_limit = Set(spec.service_flow_limit);
            access.update(conn).await?;
        }
        None => {
            AccessControlActiveModel {
                service_id: Set(service_id),
                open_auth: Set(spec.open_auth),
                black_list: Set(spec.black_list.clone()),
                white_list: Set(spec.white_list.clone()),
                white_host_name: Set(spec.white_host_name.clone()),
                client_ip_flow_limit: Set(spec.client_ip_flow_limit),
                service_flow_limit: Set(spec.service_flow_limit),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

async fn upsert_balance<C: ConnectionTrait>(
    conn: &C,
    service_id: i64,
    spec: &BalanceSpec,
    parsed: &ParsedBalance,
    existing: Option<LoadBalance>,
) -> Result<()> {
    match existing {
        Some(row) => {
            let mut balance: LoadBalanceActiveModel = row.into();
            balance.strategy = Set(spec.strategy.into());
            balance.ip_list = Set(parsed.ip_list());
            balance.weight_list = Set(parsed.weight_list());
            balance.forbid_list = Set(spec.forbid_list.clone());
            balance.upstream_connect_timeout = Set(spec.upstream_connect_timeout);
            balance.upstream_header_timeout = Set(spec.upstream_header_timeout);
            balance.upstream_idle_timeout = Set(spec.upstream_idle_timeout);
            balance.upstream_max_idle = Set(spec.upstream_max_idle);
            balance.update(conn).await?;
        }
        None => {
            LoadBalanceActiveModel {
                service_id: Set(service_id),
                strategy: Set(spec.strategy.into()),
                ip_list: Set(parsed.ip_list()),
                weight_list: Set(parsed.weight_list()),
                forbid_list: Set(spec.forbid_list.clone()),
                upstream_connect_timeout: Set(spec.upstream_connect_timeout),
                upstream_header_timeout: Set(spec.upstream_header_timeout),
                upstream_idle_timeout: Set(spec.upstream_idle_timeout),
                upstream_max_idle: Set(spec.upstream_max_idle),
                ..Default::default()
            }
            .insert(conn)
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};

    fn writer(conn: DatabaseConnection) -> ServiceWriter {
        ServiceWriter::new(DbPool::from_connection(conn), AppConfig::default().ports)
    }

    fn balance_spec(ip_list: &str, weight_list: &str) -> BalanceSpec {
        BalanceSpec {
            strategy: BalanceStrategy::WeightedRoundRobin,
            ip_list: ip_list.into(),
            weight_list: weight_list.into(),
            forbid_list: String::new(),
            upstream_connect_timeout: 0,
            upstream_header_timeout: 0,
            upstream_idle_timeout: 0,
            upstream_max_idle: 0,
        }
    }

    fn http_spec(name: &str, rule: &str) -> HttpServiceSpec {
        HttpServiceSpec {
            name: name.into(),
            description: "checkout".into(),
            rule_kind: RuleKind::PathPrefix,
            rule: rule.into(),
            need_https: false,
            need_strip_uri: true,
            need_websocket: false,
            url_rewrite: String::new(),
            header_transfer: String::new(),
            access: AccessSpec::default(),
            balance: balance_spec("10.0.0.1,10.0.0.2", "50,50"),
        }
    }

    fn tcp_spec(name: &str, port: i32) -> TcpServiceSpec {
        TcpServiceSpec {
            name: name.into(),
            description: "raw tcp".into(),
            port,
            access: AccessSpec::default(),
            balance: balance_spec("10.0.0.1", "100"),
        }
    }

    fn grpc_spec(name: &str, port: i32) -> GrpcServiceSpec {
        GrpcServiceSpec {
            name: name.into(),
            description: "rpc".into(),
            port,
            metadata_transfer: String::new(),
            access: AccessSpec::default(),
            balance: balance_spec("10.0.0.1", "100"),
        }
    }

    fn stored_service(id: i64, protocol: Protocol, name: &str) -> Service {
        Service {
            id,
            protocol: protocol.into(),
            name: name.into(),
            description: String::new(),
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn stored_http_rule(id: i64, service_id: i64, rule: &str) -> HttpRule {
        HttpRule {
            id,
            service_id,
            kind: RuleKind::PathPrefix.into(),
            rule: rule.into(),
            need_https: false,
            need_strip_uri: false,
            need_websocket: false,
            url_rewrite: String::new(),
            header_transfer: String::new(),
        }
    }

    fn stored_access(id: i64, service_id: i64) -> AccessControl {
        AccessControl {
            id,
            service_id,
            open_auth: false,
            black_list: String::new(),
            white_list: String::new(),
            white_host_name: String::new(),
            client_ip_flow_limit: 0,
            service_flow_limit: 0,
        }
    }

    fn stored_balance(id: i64, service_id: i64) -> LoadBalance {
        LoadBalance {
            id,
            service_id,
            strategy: BalanceStrategy::WeightedRoundRobin.into(),
            ip_list: "10.0.0.1,10.0.0.2".into(),
            weight_list: "50,50".into(),
            forbid_list: String::new(),
            upstream_connect_timeout: 0,
            upstream_header_timeout: 0,
            upstream_idle_timeout: 0,
            upstream_max_idle: 0,
        }
    }

    #[tokio::test]
    async fn weight_mismatch_rejected_before_any_write() {
        // No scripted results: touching the database would fail the test.
        let conn = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let writer = writer(conn);

        let mut spec = http_spec("svc-checkout-01", "/checkout");
        spec.balance = balance_spec("10.0.0.1,10.0.0.2,10.0.0.3", "10,10");

        let err = writer.create_http(&spec).await.unwrap_err();
        assert!(matches!(err, AppError::WeightMismatch { ips: 3, weights: 2 }));
    }

    #[tokio::test]
    async fn malformed_directive_rejected_before_any_write() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let writer = writer(conn);

        let mut spec = http_spec("svc-checkout-01", "/checkout");
        spec.url_rewrite = "one-field-only".into();

        let err = writer.create_http(&spec).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedDirective { .. }));
    }

    #[tokio::test]
    async fn out_of_range_port_rejected_before_any_write() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let writer = writer(conn);

        let err = writer.create_tcp(&tcp_spec("svc-tcp-01", 80)).await.unwrap_err();
        assert!(matches!(err, AppError::PortOutOfRange { port: 80, .. }));
    }

    #[tokio::test]
    async fn duplicate_name_rejected() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_service(3, Protocol::Http, "svc-checkout-01")]])
            .into_connection();
        let writer = writer(conn);

        let err = writer
            .create_http(&http_spec("svc-checkout-01", "/checkout"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NameInUse { .. }));
    }

    #[tokio::test]
    async fn duplicate_http_rule_rejected() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Service>::new()])
            .append_query_results([vec![stored_http_rule(9, 3, "/checkout")]])
            .into_connection();
        let writer = writer(conn);

        let err = writer
            .create_http(&http_spec("svc-checkout-02", "/checkout"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RuleInUse { .. }));
    }

    #[tokio::test]
    async fn grpc_create_rejects_port_held_by_tcp_rule() {
        // A TCP rule on 8050 blocks the gRPC create on the same port.
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Service>::new()])
            .append_query_results([vec![TcpRule {
                id: 5,
                service_id: 3,
                port: 8050,
            }]])
            .into_connection();
        let writer = writer(conn);

        let err = writer
            .create_grpc(&grpc_spec("svc-grpc-01", 8050))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PortInUse { port: 8050 }));
    }

    #[tokio::test]
    async fn create_http_writes_the_whole_aggregate() {
        let service = stored_service(7, Protocol::Http, "svc-checkout-01");
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            // uniqueness checks
            .append_query_results([Vec::<Service>::new()])
            .append_query_results([Vec::<HttpRule>::new()])
            // inserts (postgres RETURNING)
            .append_query_results([vec![service]])
            .append_query_results([vec![stored_http_rule(11, 7, "/checkout")]])
            .append_query_results([vec![stored_access(21, 7)]])
            .append_query_results([vec![stored_balance(31, 7)]])
            .into_connection();
        let writer = writer(conn);

        let id = writer
            .create_http(&http_spec("svc-checkout-01", "/checkout"))
            .await
            .unwrap();
        assert_eq!(id, 7);
    }

    #[tokio::test]
    async fn update_rejects_name_held_by_other_service() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            // aggregate fetch for service 7
            .append_query_results([vec![stored_service(7, Protocol::Http, "svc-a")]])
            .append_query_results([vec![stored_http_rule(11, 7, "/a")]])
            .append_query_results([Vec::<TcpRule>::new()])
            .append_query_results([Vec::<GrpcRule>::new()])
            .append_query_results([vec![stored_access(21, 7)]])
            .append_query_results([vec![stored_balance(31, 7)]])
            // name check finds a different owner
            .append_query_results([vec![stored_service(9, Protocol::Http, "svc-b")]])
            .into_connection();
        let writer = writer(conn);

        let err = writer
            .update_http(7, &http_spec("svc-b", "/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NameInUse { .. }));
    }

    #[tokio::test]
    async fn update_missing_service_is_not_found() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Service>::new()])
            .into_connection();
        let writer = writer(conn);

        let err = writer
            .update_http(404, &http_spec("svc-a", "/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ServiceNotFound { .. }));
    }

    #[tokio::test]
    async fn update_rejects_protocol_change() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored_service(7, Protocol::Tcp, "svc-a")]])
            .append_query_results([Vec::<HttpRule>::new()])
            .append_query_results([vec![TcpRule {
                id: 5,
                service_id: 7,
                port: 8050,
            }]])
            .append_query_results([Vec::<GrpcRule>::new()])
            .append_query_results([vec![stored_access(21, 7)]])
            .append_query_results([vec![stored_balance(31, 7)]])
            .into_connection();
        let writer = writer(conn);

        let err = writer
            .update_http(7, &http_spec("svc-a", "/a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
