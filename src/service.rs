//! JSON-RPC service plumbing: authentication, connection options, metrics,
//! the per-worker connection, its factory, and the batch operation adapters.

pub mod auth;
pub mod client;
pub mod factory;
pub mod metrics;
pub mod model;
pub mod operations;
pub mod options;
pub mod paging;

pub use auth::AuthMode;
pub use client::ServiceConnection;
pub use factory::ServiceConnectionFactory;
pub use metrics::ConnectionMetricsSnapshot;
pub use model::{
    AssociateRequest, Entity, EntityPage, EntityReference, ExecuteRequest, QueryRequest,
    SessionInfo,
};
pub use operations::{
    AssociateEntities, CreateEntity, DeleteEntity, ExecuteAction, RetrieveAll, UpdateEntity,
};
pub use options::ConnectionOptions;
pub use paging::{retrieve_all, PageLimit};
