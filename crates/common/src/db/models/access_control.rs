//! Access control policy entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_access_control")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning service (1:1)
    #[sea_orm(unique)]
    pub service_id: i64,

    /// Whether callers must present renter credentials
    pub open_auth: bool,

    /// Comma-separated IP blacklist
    #[sea_orm(column_type = "Text")]
    pub black_list: String,

    /// Comma-separated IP whitelist; wins over the blacklist when both match
    #[sea_orm(column_type = "Text")]
    pub white_list: String,

    /// Comma-separated allowed host names
    #[sea_orm(column_type = "Text")]
    pub white_host_name: String,

    /// Per-client-IP rate limit (0 disables)
    pub client_ip_flow_limit: i64,

    /// Aggregate per-service rate limit (0 disables)
    pub service_flow_limit: i64,
}

impl Model {
    /// Resolve whether an IP is admitted by the black/white lists.
    /// The whitelist takes precedence when both match.
    pub fn admits_ip(&self, ip: &str) -> bool {
        let listed = |csv: &str| csv.split(',').any(|entry| entry.trim() == ip);
        if !self.white_list.is_empty() && listed(&self.white_list) {
            return true;
        }
        if !self.black_list.is_empty() && listed(&self.black_list) {
            return false;
        }
        true
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

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(white: &str, black: &str) -> Model {
        Model {
            id: 1,
            service_id: 1,
            open_auth: true,
            black_list: black.into(),
            white_list: white.into(),
            white_host_name: String::new(),
            client_ip_flow_limit: 0,
            service_flow_limit: 0,
        }
    }

    #[test]
    fn whitelist_wins_over_blacklist() {
        let p = policy("10.0.0.1", "10.0.0.1");
        assert!(p.admits_ip("10.0.0.1"));
    }

    #[test]
    fn blacklist_blocks_unlisted_whitelist() {
        let p = policy("", "10.0.0.2");
        assert!(!p.admits_ip("10.0.0.2"));
        assert!(p.admits_ip("10.0.0.3"));
    }
}
