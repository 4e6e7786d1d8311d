//! Service identity entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Protocol kind of a routable service. Stored as a small integer;
/// immutable after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Http,
    Tcp,
    Grpc,
}

impl From<i16> for Protocol {
    fn from(v: i16) -> Self {
        match v {
            1 => Protocol::Tcp,
            2 => Protocol::Grpc,
            _ => Protocol::Http,
        }
    }
}

impl From<Protocol> for i16 {
    fn from(p: Protocol) -> Self {
        match p {
            Protocol::Http => 0,
            Protocol::Tcp => 1,
            Protocol::Grpc => 2,
        }
    }
}

impl Protocol {
    /// Display name used in dashboard legends
    pub fn legend_name(&self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Tcp => "TCP",
            Protocol::Grpc => "gRPC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_service")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Protocol kind, see [`Protocol`]
    pub protocol: i16,

    /// Unique among non-deleted services, case-sensitive
    #[sea_orm(column_type = "Text")]
    pub name: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// Soft-delete flag; deleted rows are invisible to listings and
    /// uniqueness checks
    pub is_deleted: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Get the protocol kind as an enum
    pub fn protocol_kind(&self) -> Protocol {
        Protocol::from(self.protocol)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::http_rule::Entity")]
    HttpRule,

    #[sea_orm(has_one = "super::tcp_rule::Entity")]
    TcpRule,

    #[sea_orm(has_one = "super::grpc_rule::Entity")]
    GrpcRule,

    #[sea_orm(has_one = "super::access_control::Entity")]
    AccessControl,

    #[sea_orm(has_one = "super::load_balance::Entity")]
    LoadBalance,
}

impl Related<super::http_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::HttpRule.def()
    }
}

impl Related<super::tcp_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TcpRule.def()
    }
}

impl Related<super::grpc_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GrpcRule.def()
    }
}

impl Related<super::access_control::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccessControl.def()
    }
}

impl Related<super::load_balance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoadBalance.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
