//! Load balancing policy entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Upstream selection strategy. Only the configuration lives here;
/// selection itself happens in the proxy engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStrategy {
    Random,
    RoundRobin,
    WeightedRoundRobin,
    IpHash,
}

impl From<i16> for BalanceStrategy {
    fn from(v: i16) -> Self {
        match v {
            0 => BalanceStrategy::Random,
            1 => BalanceStrategy::RoundRobin,
            3 => BalanceStrategy::IpHash,
            _ => BalanceStrategy::WeightedRoundRobin,
        }
    }
}

impl From<BalanceStrategy> for i16 {
    fn from(s: BalanceStrategy) -> Self {
        match s {
            BalanceStrategy::Random => 0,
            BalanceStrategy::RoundRobin => 1,
            BalanceStrategy::WeightedRoundRobin => 2,
            BalanceStrategy::IpHash => 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "gateway_load_balance")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Owning service (1:1)
    #[sea_orm(unique)]
    pub service_id: i64,

    /// Strategy, see [`BalanceStrategy`]
    pub strategy: i16,

    /// Comma-separated upstream `ip` or `ip:port` entries
    #[sea_orm(column_type = "Text")]
    pub ip_list: String,

    /// Comma-separated weights, one per upstream entry
    #[sea_orm(column_type = "Text")]
    pub weight_list: String,

    /// Comma-separated upstreams excluded from selection
    #[sea_orm(column_type = "Text")]
    pub forbid_list: String,

    /// Upstream connect timeout in seconds (0 uses the engine default)
    pub upstream_connect_timeout: i32,

    /// Upstream response-header timeout in seconds
    pub upstream_header_timeout: i32,

    /// Upstream idle connection timeout in seconds
    pub upstream_idle_timeout: i32,

    /// Maximum idle connections kept per upstream
    pub upstream_max_idle: i32,
}

impl Model {
    /// Get the strategy as an enum
    pub fn balance_strategy(&self) -> BalanceStrategy {
        BalanceStrategy::from(self.strategy)
    }

    /// Upstream entries parsed out of the stored list
    pub fn ip_entries(&self) -> Vec<&str> {
        split_csv(&self.ip_list)
    }

    /// Weight entries parsed out of the stored list
    pub fn weight_entries(&self) -> Vec<&str> {
        split_csv(&self.weight_list)
    }

    /// Number of configured upstream nodes
    pub fn node_count(&self) -> usize {
        self.ip_entries().len()
    }
}

fn split_csv(raw: &str) -> Vec<&str> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
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

    #[test]
    fn ip_entries_skip_blanks() {
        let lb = Model {
            id: 1,
            service_id: 1,
            strategy: 2,
            ip_list: "10.0.0.1:80, 10.0.0.2:80,".into(),
            weight_list: "50,50".into(),
            forbid_list: String::new(),
            upstream_connect_timeout: 0,
            upstream_header_timeout: 0,
            upstream_idle_timeout: 0,
            upstream_max_idle: 0,
        };
        assert_eq!(lb.ip_entries(), vec!["10.0.0.1:80", "10.0.0.2:80"]);
        assert_eq!(lb.node_count(), 2);
        assert_eq!(lb.balance_strategy(), BalanceStrategy::WeightedRoundRobin);
    }
}
