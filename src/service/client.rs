//! JSON-RPC connection to the service. One `ServiceConnection` is owned by a
//! single batch worker; every call takes `&mut self`, so a connection never
//! has two requests in flight.
//!
//! Failures are mapped onto the executor's fault types: a JSON-RPC error
//! object becomes a [`DomainFault`], a timeout becomes
//! [`TransientFault::Timeout`] and anything else is
//! [`TransientFault::Connectivity`].

use crate::executor::fault::{DomainFault, TransientFault};
use crate::service::auth::{build_auth_headers, AuthMode};
use crate::service::metrics::ConnectionMetrics;
use crate::service::model::{
    AssociateRequest, Entity, EntityPage, EntityReference, ExecuteRequest, QueryRequest,
    SessionInfo,
};
use crate::service::options::ConnectionOptions;
use anyhow::{anyhow, Context, Result};
use jsonrpsee::core::client::{ClientT, Error as JsonRpcError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::types::ErrorObjectOwned;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use uuid::Uuid;

pub mod methods {
    pub const WHOAMI: &str = "session.whoami";
    pub const CREATE: &str = "entity.create";
    pub const UPDATE: &str = "entity.update";
    pub const DELETE: &str = "entity.delete";
    pub const ASSOCIATE: &str = "entity.associate";
    pub const EXECUTE: &str = "action.execute";
    pub const RETRIEVE_MULTIPLE: &str = "entity.retrieve_multiple";
}

pub struct ServiceConnection {
    id: Uuid,
    endpoint: Arc<str>,
    client: HttpClient,
    request_timeout: Duration,
    metrics: Arc<ConnectionMetrics>,
    session: SessionInfo,
    requests_sent: u64,
}

impl ServiceConnection {
    /// Builds the HTTP client and performs the identity handshake.
    pub(crate) async fn open(
        endpoint: Arc<str>,
        auth: &AuthMode,
        options: &ConnectionOptions,
        metrics: Arc<ConnectionMetrics>,
    ) -> Result<Self> {
        let headers = build_auth_headers(auth)?;
        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(options.request_timeout)
            .max_concurrent_requests(options.max_concurrent_requests)
            .max_request_size(options.request_size_limit())
            .max_response_size(options.response_size_limit())
            .build(endpoint.as_ref())
            .map_err(|err| anyhow!("failed to build service client: {err}"))?;

        let session: SessionInfo = request(
            &client,
            options.request_timeout,
            &metrics,
            methods::WHOAMI,
            rpc_params![],
        )
        .await
        .with_context(|| format!("{} handshake failed", auth.scheme()))?;

        let id = Uuid::new_v4();
        tracing::debug!(
            connection = %id,
            endpoint = %endpoint,
            user = %session.user_id,
            organization = %session.organization,
            "service connection established"
        );

        Ok(Self {
            id,
            endpoint,
            client,
            request_timeout: options.request_timeout,
            metrics,
            session,
            requests_sent: 0,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn session(&self) -> &SessionInfo {
        &self.session
    }

    /// Calls issued on this connection, excluding the handshake.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    /// Creates a record and returns the id the service assigned.
    pub async fn create(&mut self, entity: &Entity) -> Result<Uuid> {
        self.call(methods::CREATE, rpc_params![entity]).await
    }

    pub async fn update(&mut self, entity: &Entity) -> Result<()> {
        self.call(methods::UPDATE, rpc_params![entity]).await
    }

    pub async fn delete(&mut self, reference: &EntityReference) -> Result<()> {
        self.call(methods::DELETE, rpc_params![reference]).await
    }

    pub async fn associate(&mut self, request: &AssociateRequest) -> Result<()> {
        self.call(methods::ASSOCIATE, rpc_params![request]).await
    }

    /// Runs a named action and returns its raw result.
    pub async fn execute(&mut self, request: &ExecuteRequest) -> Result<Value> {
        self.call(methods::EXECUTE, rpc_params![request]).await
    }

    /// Fetches one page of `query`; pass the previous page's cookie to continue.
    pub async fn retrieve_page(
        &mut self,
        query: &QueryRequest,
        paging_cookie: Option<&str>,
    ) -> Result<EntityPage> {
        self.call(methods::RETRIEVE_MULTIPLE, rpc_params![query, paging_cookie])
            .await
    }

    async fn call<R>(&mut self, method: &'static str, params: ArrayParams) -> Result<R>
    where
        R: DeserializeOwned,
    {
        self.requests_sent = self.requests_sent.saturating_add(1);
        tracing::trace!(connection = %self.id, method, "service call started");
        request(
            &self.client,
            self.request_timeout,
            &self.metrics,
            method,
            params,
        )
        .await
    }

    pub(crate) fn close(self) {
        tracing::debug!(
            connection = %self.id,
            endpoint = %self.endpoint,
            requests = self.requests_sent,
            "service connection closed"
        );
    }
}

async fn request<R>(
    client: &HttpClient,
    request_timeout: Duration,
    metrics: &ConnectionMetrics,
    method: &'static str,
    params: ArrayParams,
) -> Result<R>
where
    R: DeserializeOwned,
{
    let start = Instant::now();
    let outcome = timeout(request_timeout, client.request::<R, _>(method, params)).await;
    let elapsed = start.elapsed();

    match outcome {
        Ok(Ok(value)) => {
            metrics.record_success(elapsed);
            Ok(value)
        }
        Ok(Err(JsonRpcError::Call(object))) => {
            metrics.record_rejection(elapsed);
            let fault = domain_fault(&object);
            tracing::debug!(method, code = fault.code, message = %fault.message, "service rejected call");
            Err(fault.into())
        }
        Ok(Err(JsonRpcError::RequestTimeout)) | Err(_) => {
            metrics.record_timeout(elapsed);
            tracing::warn!(method, timeout = ?request_timeout, "service call timed out");
            Err(TransientFault::Timeout {
                operation: method.to_owned(),
                timeout: request_timeout,
            }
            .into())
        }
        Ok(Err(err)) => {
            metrics.record_failure(elapsed);
            tracing::warn!(method, error = %err, "service call failed");
            Err(TransientFault::Connectivity {
                operation: method.to_owned(),
                message: err.to_string(),
            }
            .into())
        }
    }
}

fn domain_fault(object: &ErrorObjectOwned) -> DomainFault {
    let fault = DomainFault::new(i64::from(object.code()), object.message());
    match object
        .data()
        .and_then(|raw| serde_json::from_str::<Value>(raw.get()).ok())
    {
        Some(detail) => fault.with_detail(detail),
        None => fault,
    }
}
