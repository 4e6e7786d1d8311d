//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.
//!
//! Queries that also run inside the aggregate write transaction live in
//! [`queries`] and are generic over the connection, so the repository and
//! the writer share one definition of each lookup.

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::Result;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DatabaseTransaction,
    EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    Set, TransactionTrait,
};

/// One-based pagination parameters
#[derive(Debug, Clone, Copy)]
pub struct PageParams {
    pub page_no: u64,
    pub page_size: u64,
}

impl PageParams {
    pub fn new(page_no: u64, page_size: u64) -> Self {
        Self {
            page_no: page_no.max(1),
            page_size: page_size.max(1),
        }
    }
}

/// Row shape for the protocol group-by aggregation
#[derive(Debug, Clone, FromQueryResult)]
pub struct ServiceStatRow {
    pub protocol: i16,
    pub total: i64,
}

/// Fields for inserting a renter row
#[derive(Debug, Clone)]
pub struct NewRenter {
    pub renter_id: String,
    pub name: String,
    pub secret: String,
    pub white_ips: String,
    pub qpd: i64,
    pub qps: i64,
}

/// Mutable fields of an existing renter row. The external identifier is
/// fixed for the row's lifetime.
#[derive(Debug, Clone)]
pub struct RenterUpdate {
    pub name: String,
    pub secret: String,
    pub white_ips: String,
    pub qpd: i64,
    pub qps: i64,
}

/// Repository for data access operations
#[cfg_attr(not(feature = "mock"), derive(Clone))]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Open a transaction on the write connection
    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        self.pool.write().begin().await.map_err(Into::into)
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // Service Operations
    // ========================================================================

    /// Find an active service by ID
    pub async fn find_service(&self, id: i64) -> Result<Option<Service>> {
        queries::active_service_by_id(self.read_conn(), id).await
    }

    /// Find an active service by its unique name
    pub async fn find_service_by_name(&self, name: &str) -> Result<Option<Service>> {
        queries::active_service_by_name(self.read_conn(), name).await
    }

    /// List active services with pagination and optional keyword search
    /// over name and description. Returns the page plus the total count.
    pub async fn list_services(
        &self,
        keyword: Option<&str>,
        page: PageParams,
    ) -> Result<(Vec<Service>, u64)> {
        let mut query = ServiceEntity::find().filter(ServiceColumn::IsDeleted.eq(false));

        if let Some(kw) = keyword.filter(|kw| !kw.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(ServiceColumn::Name.contains(kw))
                    .add(ServiceColumn::Description.contains(kw)),
            );
        }

        let paginator = query
            .order_by_desc(ServiceColumn::Id)
            .paginate(self.read_conn(), page.page_size);

        let total = paginator.num_items().await?;
        let services = paginator.fetch_page(page.page_no - 1).await?;

        Ok((services, total))
    }

    /// Count active services
    pub async fn count_services(&self) -> Result<u64> {
        ServiceEntity::find()
            .filter(ServiceColumn::IsDeleted.eq(false))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Active service totals grouped by protocol kind
    pub async fn services_by_protocol(&self) -> Result<Vec<ServiceStatRow>> {
        ServiceEntity::find()
            .select_only()
            .column(ServiceColumn::Protocol)
            .column_as(ServiceColumn::Id.count(), "total")
            .filter(ServiceColumn::IsDeleted.eq(false))
            .group_by(ServiceColumn::Protocol)
            .into_model::<ServiceStatRow>()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Rule Operations
    // ========================================================================

    /// HTTP rule owned by a service, if one was created
    pub async fn http_rule_for_service(&self, service_id: i64) -> Result<Option<HttpRule>> {
        queries::http_rule_for_service(self.read_conn(), service_id).await
    }

    /// TCP rule owned by a service, if one was created
    pub async fn tcp_rule_for_service(&self, service_id: i64) -> Result<Option<TcpRule>> {
        queries::tcp_rule_for_service(self.read_conn(), service_id).await
    }

    /// gRPC rule owned by a service, if one was created
    pub async fn grpc_rule_for_service(&self, service_id: i64) -> Result<Option<GrpcRule>> {
        queries::grpc_rule_for_service(self.read_conn(), service_id).await
    }

    /// Access control policy owned by a service, if one was created
    pub async fn access_control_for_service(
        &self,
        service_id: i64,
    ) -> Result<Option<AccessControl>> {
        queries::access_control_for_service(self.read_conn(), service_id).await
    }

    /// Load balance policy owned by a service, if one was created
    pub async fn load_balance_for_service(&self, service_id: i64) -> Result<Option<LoadBalance>> {
        queries::load_balance_for_service(self.read_conn(), service_id).await
    }

    // ========================================================================
    // Renter Operations
    // ========================================================================

    /// Find an active renter by primary key
    pub async fn find_renter(&self, id: i64) -> Result<Option<Renter>> {
        RenterEntity::find_by_id(id)
            .filter(RenterColumn::IsDeleted.eq(false))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find an active renter by its external tenant identifier
    pub async fn find_renter_by_renter_id(&self, renter_id: &str) -> Result<Option<Renter>> {
        RenterEntity::find()
            .filter(RenterColumn::RenterId.eq(renter_id))
            .filter(RenterColumn::IsDeleted.eq(false))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List active renters with pagination and optional keyword search
    /// over name and renter_id
    pub async fn list_renters(
        &self,
        keyword: Option<&str>,
        page: PageParams,
    ) -> Result<(Vec<Renter>, u64)> {
        let mut query = RenterEntity::find().filter(RenterColumn::IsDeleted.eq(false));

        if let Some(kw) = keyword.filter(|kw| !kw.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(RenterColumn::Name.contains(kw))
                    .add(RenterColumn::RenterId.contains(kw)),
            );
        }

        let paginator = query
            .order_by_desc(RenterColumn::Id)
            .paginate(self.read_conn(), page.page_size);

        let total = paginator.num_items().await?;
        let renters = paginator.fetch_page(page.page_no - 1).await?;

        Ok((renters, total))
    }

    /// Full scan of active renters, used by the directory load
    pub async fn all_active_renters(&self) -> Result<Vec<Renter>> {
        RenterEntity::find()
            .filter(RenterColumn::IsDeleted.eq(false))
            .order_by_asc(RenterColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Count active renters
    pub async fn count_renters(&self) -> Result<u64> {
        RenterEntity::find()
            .filter(RenterColumn::IsDeleted.eq(false))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Insert a new renter row
    pub async fn insert_renter(&self, new: NewRenter) -> Result<Renter> {
        let now = chrono::Utc::now();
        RenterActiveModel {
            renter_id: Set(new.renter_id),
            name: Set(new.name),
            secret: Set(new.secret),
            white_ips: Set(new.white_ips),
            qpd: Set(new.qpd),
            qps: Set(new.qps),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(self.write_conn())
        .await
        .map_err(Into::into)
    }

    /// Update an existing renter row
    pub async fn update_renter(&self, existing: Renter, update: RenterUpdate) -> Result<Renter> {
        let mut renter: RenterActiveModel = existing.into();
        renter.name = Set(update.name);
        renter.secret = Set(update.secret);
        renter.white_ips = Set(update.white_ips);
        renter.qpd = Set(update.qpd);
        renter.qps = Set(update.qps);
        renter.updated_at = Set(chrono::Utc::now().into());
        renter.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Soft delete a renter; returns false when no active row matched
    pub async fn soft_delete_renter(&self, id: i64) -> Result<bool> {
        let Some(existing) = self.find_renter(id).await? else {
            return Ok(false);
        };

        let mut renter: RenterActiveModel = existing.into();
        renter.is_deleted = Set(true);
        renter.updated_at = Set(chrono::Utc::now().into());
        renter.update(self.write_conn()).await?;

        Ok(true)
    }
}

/// Connection-generic lookups shared between the repository and the
/// transactional aggregate writer. Uniqueness-relevant lookups join the
/// owning service and skip soft-deleted rows.
pub mod queries {
    use super::*;
    use sea_orm::ConnectionTrait;

    pub async fn active_service_by_id<C: ConnectionTrait>(
        conn: &C,
        id: i64,
    ) -> Result<Option<Service>> {
        ServiceEntity::find_by_id(id)
            .filter(ServiceColumn::IsDeleted.eq(false))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn active_service_by_name<C: ConnectionTrait>(
        conn: &C,
        name: &str,
    ) -> Result<Option<Service>> {
        ServiceEntity::find()
            .filter(ServiceColumn::Name.eq(name))
            .filter(ServiceColumn::IsDeleted.eq(false))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn http_rule_for_service<C: ConnectionTrait>(
        conn: &C,
        service_id: i64,
    ) -> Result<Option<HttpRule>> {
        HttpRuleEntity::find()
            .filter(HttpRuleColumn::ServiceId.eq(service_id))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    /// Active HTTP rule with the given (kind, rule) pair, excluding rules
    /// orphaned by soft-deleted services
    pub async fn active_http_rule<C: ConnectionTrait>(
        conn: &C,
        kind: i16,
        rule: &str,
    ) -> Result<Option<HttpRule>> {
        HttpRuleEntity::find()
            .inner_join(ServiceEntity)
            .filter(ServiceColumn::IsDeleted.eq(false))
            .filter(HttpRuleColumn::Kind.eq(kind))
            .filter(HttpRuleColumn::Rule.eq(rule))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn tcp_rule_for_service<C: ConnectionTrait>(
        conn: &C,
        service_id: i64,
    ) -> Result<Option<TcpRule>> {
        TcpRuleEntity::find()
            .filter(TcpRuleColumn::ServiceId.eq(service_id))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn grpc_rule_for_service<C: ConnectionTrait>(
        conn: &C,
        service_id: i64,
    ) -> Result<Option<GrpcRule>> {
        GrpcRuleEntity::find()
            .filter(GrpcRuleColumn::ServiceId.eq(service_id))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    /// Active TCP rule claiming the given port
    pub async fn active_tcp_rule_by_port<C: ConnectionTrait>(
        conn: &C,
        port: i32,
    ) -> Result<Option<TcpRule>> {
        TcpRuleEntity::find()
            .inner_join(ServiceEntity)
            .filter(ServiceColumn::IsDeleted.eq(false))
            .filter(TcpRuleColumn::Port.eq(port))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    /// Active gRPC rule claiming the given port
    pub async fn active_grpc_rule_by_port<C: ConnectionTrait>(
        conn: &C,
        port: i32,
    ) -> Result<Option<GrpcRule>> {
        GrpcRuleEntity::find()
            .inner_join(ServiceEntity)
            .filter(ServiceColumn::IsDeleted.eq(false))
            .filter(GrpcRuleColumn::Port.eq(port))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn access_control_for_service<C: ConnectionTrait>(
        conn: &C,
        service_id: i64,
    ) -> Result<Option<AccessControl>> {
        AccessControlEntity::find()
            .filter(AccessControlColumn::ServiceId.eq(service_id))
            .one(conn)
            .await
            .map_err(Into::into)
    }

    pub async fn load_balance_for_service<C: ConnectionTrait>(
        conn: &C,
        service_id: i64,
    ) -> Result<Option<LoadBalance>> {
        LoadBalanceEntity::find()
            .filter(LoadBalanceColumn::ServiceId.eq(service_id))
            .one(conn)
            .await
            .map_err(Into::into)
    }
}
