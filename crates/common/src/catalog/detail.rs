//! Service aggregate read-model
//!
//! A `ServiceDetail` is one service identity row merged with whichever
//! protocol rule matches its kind, plus its access-control and load-balance
//! policies. The builder fetches every category independently and tolerates
//! missing rows: only the accessors that *require* the protocol-matching
//! rule turn absence into a consistency fault.

use crate::config::ClusterConfig;
use crate::db::models::*;
use crate::db::repository::queries;
use crate::errors::{AppError, Result};
use sea_orm::ConnectionTrait;
use serde::Serialize;

/// How to address the service being built
#[derive(Debug, Clone)]
pub enum ServiceRef<'a> {
    Id(i64),
    Name(&'a str),
}

/// The composed aggregate. Not persisted; rebuilt on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceDetail {
    pub service: Service,
    pub http_rule: Option<HttpRule>,
    pub tcp_rule: Option<TcpRule>,
    pub grpc_rule: Option<GrpcRule>,
    pub access_control: Option<AccessControl>,
    pub load_balance: Option<LoadBalance>,
}

impl ServiceDetail {
    /// The HTTP rule of an HTTP service. Missing row after creation
    /// completed is an invariant violation, not a NotFound.
    pub fn require_http_rule(&self) -> Result<&HttpRule> {
        if self.service.protocol_kind() != Protocol::Http {
            return Err(AppError::Consistency {
                message: format!(
                    "service {} is {:?}, not HTTP",
                    self.service.id,
                    self.service.protocol_kind()
                ),
            });
        }
        self.http_rule.as_ref().ok_or_else(|| AppError::Consistency {
            message: format!("http service {} has no http rule", self.service.id),
        })
    }

    /// The listener port of a TCP or gRPC service
    pub fn require_port(&self) -> Result<i32> {
        match self.service.protocol_kind() {
            Protocol::Tcp => self
                .tcp_rule
                .as_ref()
                .map(|r| r.port)
                .ok_or_else(|| AppError::Consistency {
                    message: format!("tcp service {} has no tcp rule", self.service.id),
                }),
            Protocol::Grpc => self
                .grpc_rule
                .as_ref()
                .map(|r| r.port)
                .ok_or_else(|| AppError::Consistency {
                    message: format!("grpc service {} has no grpc rule", self.service.id),
                }),
            Protocol::Http => Err(AppError::Consistency {
                message: format!("http service {} has no listener port", self.service.id),
            }),
        }
    }

    /// The load-balance policy; every completed aggregate has one
    pub fn require_load_balance(&self) -> Result<&LoadBalance> {
        self.load_balance
            .as_ref()
            .ok_or_else(|| AppError::Consistency {
                message: format!("service {} has no load balance policy", self.service.id),
            })
    }

    /// Derive the address clients reach this service at, from the
    /// cluster ingress configuration.
    pub fn public_address(&self, cluster: &ClusterConfig) -> Result<String> {
        match self.service.protocol_kind() {
            Protocol::Http => {
                let rule = self.require_http_rule()?;
                Ok(match rule.rule_kind() {
                    RuleKind::Domain => rule.rule.clone(),
                    RuleKind::PathPrefix if rule.need_https => {
                        format!("{}:{}{}", cluster.ip, cluster.ssl_port, rule.rule)
                    }
                    RuleKind::PathPrefix => {
                        format!("{}:{}{}", cluster.ip, cluster.port, rule.rule)
                    }
                })
            }
            Protocol::Tcp | Protocol::Grpc => {
                Ok(format!("{}:{}", cluster.ip, self.require_port()?))
            }
        }
    }
}

/// Build the aggregate for one service. Each rule category is fetched
/// independently; a missing row is not an error here (see module docs).
/// Strictly read-only.
pub async fn build_service_detail<C: ConnectionTrait>(
    conn: &C,
    by: ServiceRef<'_>,
) -> Result<ServiceDetail> {
    let service = match by {
        ServiceRef::Id(id) => queries::active_service_by_id(conn, id)
            .await?
            .ok_or_else(|| AppError::ServiceNotFound { id: id.to_string() })?,
        ServiceRef::Name(name) => queries::active_service_by_name(conn, name)
            .await?
            .ok_or_else(|| AppError::ServiceNotFound { id: name.to_string() })?,
    };

    let http_rule = queries::http_rule_for_service(conn, service.id).await?;
    let tcp_rule = queries::tcp_rule_for_service(conn, service.id).await?;
    let grpc_rule = queries::grpc_rule_for_service(conn, service.id).await?;
    let access_control = queries::access_control_for_service(conn, service.id).await?;
    let load_balance = queries::load_balance_for_service(conn, service.id).await?;

    Ok(ServiceDetail {
        service,
        http_rule,
        tcp_rule,
        grpc_rule,
        access_control,
        load_balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn http_service(id: i64) -> Service {
        Service {
            id,
            protocol: Protocol::Http.into(),
            name: "svc-checkout-01".into(),
            description: "checkout".into(),
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn checkout_rule(service_id: i64) -> HttpRule {
        HttpRule {
            id: 11,
            service_id,
            kind: RuleKind::PathPrefix.into(),
            rule: "/checkout".into(),
            need_https: false,
            need_strip_uri: true,
            need_websocket: false,
            url_rewrite: String::new(),
            header_transfer: String::new(),
        }
    }

    fn balance(service_id: i64) -> LoadBalance {
        LoadBalance {
            id: 21,
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

    fn access(service_id: i64) -> AccessControl {
        AccessControl {
            id: 31,
            service_id,
            open_auth: true,
            black_list: String::new(),
            white_list: String::new(),
            white_host_name: String::new(),
            client_ip_flow_limit: 0,
            service_flow_limit: 0,
        }
    }

    fn scripted_detail_db(rounds: usize) -> sea_orm::DatabaseConnection {
        let mut db = MockDatabase::new(DatabaseBackend::Postgres);
        for _ in 0..rounds {
            db = db
                .append_query_results([vec![http_service(7)]])
                .append_query_results([vec![checkout_rule(7)]])
                .append_query_results([Vec::<TcpRule>::new()])
                .append_query_results([Vec::<GrpcRule>::new()])
                .append_query_results([vec![access(7)]])
                .append_query_results([vec![balance(7)]]);
        }
        db.into_connection()
    }

    #[tokio::test]
    async fn composes_matching_rule_only() {
        let conn = scripted_detail_db(1);
        let detail = build_service_detail(&conn, ServiceRef::Id(7)).await.unwrap();

        assert_eq!(detail.service.id, 7);
        assert_eq!(detail.require_http_rule().unwrap().rule, "/checkout");
        assert!(detail.tcp_rule.is_none());
        assert!(detail.grpc_rule.is_none());
        assert_eq!(detail.require_load_balance().unwrap().node_count(), 2);
    }

    #[tokio::test]
    async fn builds_identically_without_intervening_writes() {
        let conn = scripted_detail_db(2);
        let first = build_service_detail(&conn, ServiceRef::Id(7)).await.unwrap();
        let second = build_service_detail(&conn, ServiceRef::Id(7)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_service_is_not_found() {
        let conn = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<Service>::new()])
            .into_connection();

        let err = build_service_detail(&conn, ServiceRef::Id(404)).await.unwrap_err();
        assert!(matches!(err, AppError::ServiceNotFound { .. }));
    }

    #[test]
    fn missing_matching_rule_is_a_consistency_fault() {
        let detail = ServiceDetail {
            service: http_service(7),
            http_rule: None,
            tcp_rule: None,
            grpc_rule: None,
            access_control: Some(access(7)),
            load_balance: Some(balance(7)),
        };

        let err = detail.require_http_rule().unwrap_err();
        assert!(matches!(err, AppError::Consistency { .. }));
    }

    #[test]
    fn public_address_derivation() {
        let cluster = AppConfig::default().cluster;

        let mut detail = ServiceDetail {
            service: http_service(7),
            http_rule: Some(checkout_rule(7)),
            tcp_rule: None,
            grpc_rule: None,
            access_control: None,
            load_balance: None,
        };
        assert_eq!(
            detail.public_address(&cluster).unwrap(),
            "127.0.0.1:8880/checkout"
        );

        detail.http_rule.as_mut().unwrap().need_https = true;
        assert_eq!(
            detail.public_address(&cluster).unwrap(),
            "127.0.0.1:4433/checkout"
        );

        let mut rule = checkout_rule(7);
        rule.kind = RuleKind::Domain.into();
        rule.rule = "checkout.example.com".into();
        detail.http_rule = Some(rule);
        assert_eq!(detail.public_address(&cluster).unwrap(), "checkout.example.com");

        let tcp_detail = ServiceDetail {
            service: Service {
                protocol: Protocol::Tcp.into(),
                ..http_service(8)
            },
            http_rule: None,
            tcp_rule: Some(TcpRule {
                id: 1,
                service_id: 8,
                port: 8050,
            }),
            grpc_rule: None,
            access_control: None,
            load_balance: None,
        };
        assert_eq!(tcp_detail.public_address(&cluster).unwrap(), "127.0.0.1:8050");
    }
}
