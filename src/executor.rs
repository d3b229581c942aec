//! Batch executor split across focused submodules:
//! - `parallelism`: degree-of-parallelism guard
//! - `connection`: connection factory contract and per-worker connection slot
//! - `operation`: the per-request operation contract
//! - `worker`: worker loop, partitioning, local result/failure collection
//! - `aggregate`: fan-in of worker results and batch output shapes
//! - `fault`: fault classification and failure records
//! - `error`: configuration, connection and aggregate errors
//! - `batch`: batch builder and failure-propagation policies
//! - `pool`: the executor that spawns and joins workers
//! - `tests`: executor integration/unit tests

pub mod aggregate;
pub mod batch;
pub mod connection;
pub mod error;
pub mod fault;
pub mod operation;
pub mod parallelism;
pub mod pool;
mod worker;


pub use aggregate::{BatchShape, Keyed, Positional};
pub use batch::{Batch, FailureHandler};
pub use connection::{ConnectFuture, ConnectionFactory, DisposeFuture};
pub use error::{AggregateFailure, BatchError, ConfigurationError, ConnectionError};
pub use fault::{
    DomainFault, FailureRecord, Fault, FaultClassifier, FaultKind, StandardFaultClassifier,
    TransientFault,
};
pub use operation::{operation_fn, FnOperation, Operation, OperationFuture};
pub use parallelism::{DegreeOfParallelism, AUTO_PARALLELISM};
pub use pool::BatchExecutor;
