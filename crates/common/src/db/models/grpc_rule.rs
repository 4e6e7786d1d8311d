//! gRPC routing rule entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_grpc_rule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning service (1:1)
    #[sea_orm(unique)]
    pub service_id: i64,

    /// Listener port inside the administrative range; unique across
    /// active TCP and gRPC rules together
    pub port: i32,

    /// Metadata transfer directives, serialized `op name value` triples
    #[sea_orm(column_type = "Text")]
    pub metadata_transfer: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::service::Entity",
        from = "Column::ServiceId",
        to = "super::service::Column::Id"
    )]
    Service,
}

impl Related<super::service::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Service.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
