//! Fault classification: turns whatever an operation raised into a uniform
//! [`Fault`], tagged as a domain rejection or a transient infrastructure
//! failure, and pairs it with the originating request in a [`FailureRecord`].

use anyhow::Error as AnyError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Category a failed request falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    Domain,
    Transient,
}

/// The remote service explicitly rejected one request.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("service rejected request (code={code}): {message}")]
pub struct DomainFault {
    pub code: i64,
    pub message: String,
    pub detail: Option<Value>,
}

impl DomainFault {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Infrastructure failure not tied to the request's content.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransientFault {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },
    #[error("connectivity lost during {operation}: {message}")]
    Connectivity { operation: String, message: String },
}

/// Normalized failure of one operation invocation.
///
/// Domain and transient faults share this shape; the original error is kept
/// so callers can still downcast to the concrete type.
#[derive(Clone)]
pub struct Fault {
    kind: FaultKind,
    message: String,
    code: Option<i64>,
    detail: Option<Value>,
    error: Arc<AnyError>,
}

impl Fault {
    pub fn domain(fault: DomainFault) -> Self {
        let message = fault.message.clone();
        let code = Some(fault.code);
        let detail = fault.detail.clone();
        Self {
            kind: FaultKind::Domain,
            message,
            code,
            detail,
            error: Arc::new(fault.into()),
        }
    }

    pub fn transient(error: impl Into<AnyError>) -> Self {
        let error = error.into();
        Self {
            kind: FaultKind::Transient,
            message: format!("{error:#}"),
            code: None,
            detail: None,
            error: Arc::new(error),
        }
    }

    pub(crate) fn from_panic(message: String) -> Self {
        Self::transient(anyhow::anyhow!("operation panicked: {message}"))
    }

    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    pub fn is_domain(&self) -> bool {
        self.kind == FaultKind::Domain
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FaultKind::Transient
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Service error code, present for domain faults.
    pub fn code(&self) -> Option<i64> {
        self.code
    }

    /// Structured payload the service attached to its rejection, if any.
    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    pub fn error(&self) -> &AnyError {
        &self.error
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        self.error.chain().find_map(|cause| cause.downcast_ref::<E>())
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fault")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("code", &self.code)
            .field("detail", &self.detail)
            .finish()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.code) {
            (FaultKind::Domain, Some(code)) => {
                write!(f, "domain fault (code={code}): {}", self.message)
            }
            (FaultKind::Domain, None) => write!(f, "domain fault: {}", self.message),
            (FaultKind::Transient, _) => write!(f, "transient fault: {}", self.message),
        }
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&**self.error)
    }
}

/// Decides which [`FaultKind`] an operation error belongs to.
pub trait FaultClassifier: Send + Sync + 'static {
    fn classify(&self, error: AnyError) -> Fault;
}

/// Looks for a [`DomainFault`] anywhere in the error chain; everything else
/// is treated as transient.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardFaultClassifier;

impl FaultClassifier for StandardFaultClassifier {
    fn classify(&self, error: AnyError) -> Fault {
        let domain = error
            .chain()
            .find_map(|cause| cause.downcast_ref::<DomainFault>())
            .cloned();

        match domain {
            Some(fault) => {
                let mut classified = Fault::domain(fault);
                classified.error = Arc::new(error);
                classified
            }
            None => Fault::transient(error),
        }
    }
}

/// A request that did not complete, with the fault it raised.
#[derive(Debug, Clone)]
pub struct FailureRecord<K, Req> {
    key: K,
    request: Req,
    fault: Fault,
}

impl<K, Req> FailureRecord<K, Req> {
    pub fn new(key: K, request: Req, fault: Fault) -> Self {
        Self {
            key,
            request,
            fault,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn request(&self) -> &Req {
        &self.request
    }

    pub fn fault(&self) -> &Fault {
        &self.fault
    }

    pub fn into_parts(self) -> (K, Req, Fault) {
        (self.key, self.request, self.fault)
    }
}
