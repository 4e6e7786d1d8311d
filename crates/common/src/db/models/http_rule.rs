//! HTTP routing rule entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How an HTTP service is matched: by URL path prefix or by domain.
/// A prefix rule and a domain rule never collide, even on equal strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    PathPrefix,
    Domain,
}

impl From<i16> for RuleKind {
    fn from(v: i16) -> Self {
        match v {
            1 => RuleKind::Domain,
            _ => RuleKind::PathPrefix,
        }
    }
}

impl From<RuleKind> for i16 {
    fn from(k: RuleKind) -> Self {
        match k {
            RuleKind::PathPrefix => 0,
            RuleKind::Domain => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_http_rule")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning service (1:1)
    #[sea_orm(unique)]
    pub service_id: i64,

    /// Rule kind, see [`RuleKind`]
    pub kind: i16,

    /// The path prefix or domain; unique among active HTTP rules of its kind
    #[sea_orm(column_type = "Text")]
    pub rule: String,

    pub need_https: bool,

    pub need_strip_uri: bool,

    pub need_websocket: bool,

    /// URL rewrite directives, serialized `pattern replacement` pairs
    #[sea_orm(column_type = "Text")]
    pub url_rewrite: String,

    /// Header transfer directives, serialized `op name value` triples
    #[sea_orm(column_type = "Text")]
    pub header_transfer: String,
}

impl Model {
    /// Get the rule kind as an enum
    pub fn rule_kind(&self) -> RuleKind {
        RuleKind::from(self.kind)
    }
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
