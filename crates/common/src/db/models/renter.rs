//! Renter (tenant) entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_renter")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// External tenant identifier; cache key and flow-counter key
    #[sea_orm(column_type = "Text", unique)]
    pub renter_id: String,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    /// Shared secret; defaults to the SHA-256 digest of `renter_id`
    #[sea_orm(column_type = "Text")]
    pub secret: String,

    /// Comma-separated IP allow-list, prefix matchable
    #[sea_orm(column_type = "Text")]
    pub white_ips: String,

    /// Daily request quota
    pub qpd: i64,

    /// Per-second request quota
    pub qps: i64,

    /// Soft-delete flag
    pub is_deleted: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Prefix match a caller IP against the allow-list.
    /// An empty allow-list admits everyone.
    pub fn allows_ip(&self, ip: &str) -> bool {
        if self.white_ips.trim().is_empty() {
            return true;
        }
        self.white_ips
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .any(|prefix| ip.starts_with(prefix))
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn renter(white_ips: &str) -> Model {
        Model {
            id: 1,
            renter_id: "tenant-42".into(),
            name: "Tenant 42".into(),
            secret: String::new(),
            white_ips: white_ips.into(),
            qpd: 10_000,
            qps: 100,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn empty_allow_list_admits_all() {
        assert!(renter("").allows_ip("203.0.113.9"));
    }

    #[test]
    fn prefix_match() {
        let r = renter("10.0., 192.168.1.10");
        assert!(r.allows_ip("10.0.7.3"));
        assert!(r.allows_ip("192.168.1.10"));
        assert!(!r.allows_ip("192.168.2.10"));
    }
}
