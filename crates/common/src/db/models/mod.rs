//! SeaORM entity models
//!
//! Database entities for the gateway control plane

mod access_control;
mod grpc_rule;
mod http_rule;
mod load_balance;
mod renter;
mod service;
mod tcp_rule;

pub use service::{
    Entity as ServiceEntity,
    Model as Service,
    ActiveModel as ServiceActiveModel,
    Column as ServiceColumn,
    Protocol,
};

pub use http_rule::{
    Entity as HttpRuleEntity,
    Model as HttpRule,
    ActiveModel as HttpRuleActiveModel,
    Column as HttpRuleColumn,
    RuleKind,
};

pub use tcp_rule::{
    Entity as TcpRuleEntity,
    Model as TcpRule,
    ActiveModel as TcpRuleActiveModel,
    Column as TcpRuleColumn,
};

pub use grpc_rule::{
    Entity as GrpcRuleEntity,
    Model as GrpcRule,
    ActiveModel as GrpcRuleActiveModel,
    Column as GrpcRuleColumn,
};

pub use access_control::{
    Entity as AccessControlEntity,
    Model as AccessControl,
    ActiveModel as AccessControlActiveModel,
    Column as AccessControlColumn,
};

pub use load_balance::{
    Entity as LoadBalanceEntity,
    Model as LoadBalance,
    ActiveModel as LoadBalanceActiveModel,
    Column as LoadBalanceColumn,
    BalanceStrategy,
};

pub use renter::{
    Entity as RenterEntity,
    Model as Renter,
    ActiveModel as RenterActiveModel,
    Column as RenterColumn,
};
