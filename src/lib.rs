pub mod executor;
pub mod runtime;
pub mod service;

pub use executor::{
    AggregateFailure, Batch, BatchError, BatchExecutor, ConfigurationError, ConnectionError,
    ConnectionFactory, DegreeOfParallelism, DomainFault, FailureRecord, Fault, FaultClassifier,
    FaultKind, Operation, OperationFuture, StandardFaultClassifier, TransientFault,
};
pub use runtime::config::{ServiceConfig, ServiceConfigBuilder, ServiceConfigParams};
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot};
pub use service::{AuthMode, ServiceConnection, ServiceConnectionFactory};
