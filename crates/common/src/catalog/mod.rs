//! Service catalog
//!
//! The service aggregate read-model, its eager validation rules, and the
//! transactional write path.

pub mod detail;
pub mod validate;
pub mod writer;

pub use detail::{build_service_detail, ServiceDetail, ServiceRef};
pub use writer::{
    AccessSpec, BalanceSpec, GrpcServiceSpec, HttpServiceSpec, ServiceWriter, TcpServiceSpec,
};
