//! Error taxonomy surfaced by the batch executor: configuration problems that
//! fail fast, connection failures that abort a worker's partition, and the
//! aggregate bundle returned when items failed and no handler was supplied.

use crate::executor::fault::{FailureRecord, FaultKind};
use anyhow::Error as AnyError;
use std::fmt;

/// Invalid batch setup, detected before any worker is spawned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("degree of parallelism must be -1 or a positive integer, got {0}")]
    InvalidParallelism(i32),
    #[error("keyed batch contains duplicate key {key}")]
    DuplicateKey { key: String },
}

/// A worker could not materialize its connection.
#[derive(Debug)]
pub struct ConnectionError {
    endpoint: Option<String>,
    source: AnyError,
}

impl ConnectionError {
    pub fn new(source: impl Into<AnyError>) -> Self {
        Self {
            endpoint: None,
            source: source.into(),
        }
    }

    pub fn with_endpoint(endpoint: impl Into<String>, source: impl Into<AnyError>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            source: source.into(),
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn into_source(self) -> AnyError {
        self.source
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            Some(endpoint) => write!(f, "failed to connect to {endpoint}: {:#}", self.source),
            None => write!(f, "failed to create connection: {:#}", self.source),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

/// Every item-level failure of a batch that ran without a failure handler.
#[derive(Debug)]
pub struct AggregateFailure<K, Req> {
    failures: Vec<FailureRecord<K, Req>>,
    batch_len: usize,
}

impl<K, Req> AggregateFailure<K, Req> {
    pub(crate) fn new(failures: Vec<FailureRecord<K, Req>>, batch_len: usize) -> Self {
        Self {
            failures,
            batch_len,
        }
    }

    pub fn failures(&self) -> &[FailureRecord<K, Req>] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<FailureRecord<K, Req>> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Size of the batch the failures were collected from.
    pub fn batch_len(&self) -> usize {
        self.batch_len
    }

    pub fn count_of(&self, kind: FaultKind) -> usize {
        self.failures
            .iter()
            .filter(|record| record.fault().kind() == kind)
            .count()
    }
}

impl<K, Req> fmt::Display for AggregateFailure<K, Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} batch requests failed ({} domain, {} transient)",
            self.failures.len(),
            self.batch_len,
            self.count_of(FaultKind::Domain),
            self.count_of(FaultKind::Transient),
        )?;
        if let Some(first) = self.failures.first() {
            write!(f, "; first failure: {}", first.fault())?;
        }
        Ok(())
    }
}

impl<K: fmt::Debug, Req: fmt::Debug> std::error::Error for AggregateFailure<K, Req> {}

/// Error returned by a batch call.
#[derive(Debug)]
pub enum BatchError<K, Req> {
    /// Rejected before dispatch.
    Configuration(ConfigurationError),
    /// A worker could not create its connection. Its untouched requests come
    /// back in `abandoned`; item failures recorded by the other workers are in
    /// `failures`, unless a failure handler already received them.
    Connection {
        worker: usize,
        source: ConnectionError,
        abandoned: Vec<(K, Req)>,
        failures: Vec<FailureRecord<K, Req>>,
    },
    /// A worker task died outside of an operation invocation.
    WorkerAborted { worker: usize, message: String },
    /// One or more items failed and no failure handler was supplied.
    Failed(AggregateFailure<K, Req>),
}

impl<K, Req> BatchError<K, Req> {
    pub fn aggregate(&self) -> Option<&AggregateFailure<K, Req>> {
        match self {
            BatchError::Failed(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    pub fn into_aggregate(self) -> Option<AggregateFailure<K, Req>> {
        match self {
            BatchError::Failed(aggregate) => Some(aggregate),
            _ => None,
        }
    }

    /// Requests that were never attempted because their worker had no connection.
    pub fn abandoned(&self) -> &[(K, Req)] {
        match self {
            BatchError::Connection { abandoned, .. } => abandoned,
            _ => &[],
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, BatchError::Configuration(_))
    }
}

impl<K, Req> From<ConfigurationError> for BatchError<K, Req> {
    fn from(error: ConfigurationError) -> Self {
        BatchError::Configuration(error)
    }
}

impl<K, Req> From<AggregateFailure<K, Req>> for BatchError<K, Req> {
    fn from(aggregate: AggregateFailure<K, Req>) -> Self {
        BatchError::Failed(aggregate)
    }
}

impl<K, Req> fmt::Display for BatchError<K, Req> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Configuration(error) => write!(f, "invalid batch configuration: {error}"),
            BatchError::Connection {
                worker,
                source,
                abandoned,
                failures,
            } => {
                write!(
                    f,
                    "worker {worker} could not connect, {} requests abandoned",
                    abandoned.len()
                )?;
                if !failures.is_empty() {
                    write!(f, " and {} failed", failures.len())?;
                }
                write!(f, ": {source}")
            }
            BatchError::WorkerAborted { worker, message } => {
                write!(f, "worker {worker} aborted: {message}")
            }
            BatchError::Failed(aggregate) => fmt::Display::fmt(aggregate, f),
        }
    }
}

impl<K, Req> std::error::Error for BatchError<K, Req>
where
    K: fmt::Debug + 'static,
    Req: fmt::Debug + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BatchError::Configuration(error) => Some(error),
            BatchError::Connection { source, .. } => Some(source),
            BatchError::WorkerAborted { .. } => None,
            BatchError::Failed(aggregate) => Some(aggregate),
        }
    }
}
