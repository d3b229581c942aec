//! Connection factory binding the executor to a configured service endpoint.

use crate::executor::connection::{ConnectFuture, ConnectionFactory, DisposeFuture};
use crate::executor::error::ConnectionError;
use crate::executor::pool::BatchExecutor;
use crate::runtime::config::{validate_url, ServiceConfig};
use crate::service::auth::AuthMode;
use crate::service::client::ServiceConnection;
use crate::service::metrics::{ConnectionMetrics, ConnectionMetricsSnapshot};
use crate::service::options::ConnectionOptions;
use anyhow::Result;
use std::sync::Arc;

#[derive(Debug)]
pub struct ServiceConnectionFactory {
    endpoint: Arc<str>,
    auth: AuthMode,
    options: ConnectionOptions,
    metrics: Arc<ConnectionMetrics>,
}

impl ServiceConnectionFactory {
    pub fn new(endpoint: impl Into<String>, auth: AuthMode, options: ConnectionOptions) -> Result<Self> {
        let endpoint = endpoint.into().trim().to_owned();
        validate_url(&endpoint)?;
        let auth = auth.trimmed();
        auth.validate()?;
        options.validate()?;

        Ok(Self {
            endpoint: Arc::from(endpoint),
            auth,
            options,
            metrics: Arc::new(ConnectionMetrics::default()),
        })
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.endpoint(),
            config.auth().clone(),
            config.connection_options(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Call counters across every connection this factory produced.
    pub fn metrics(&self) -> ConnectionMetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl ConnectionFactory for ServiceConnectionFactory {
    type Connection = ServiceConnection;

    fn connect(&self) -> ConnectFuture<'_, ServiceConnection> {
        Box::pin(async move {
            ServiceConnection::open(
                Arc::clone(&self.endpoint),
                &self.auth,
                &self.options,
                Arc::clone(&self.metrics),
            )
            .await
            .map_err(|err| ConnectionError::with_endpoint(self.endpoint.as_ref(), err))
        })
    }

    fn dispose(&self, connection: ServiceConnection) -> DisposeFuture<'_> {
        Box::pin(async move { connection.close() })
    }
}

impl BatchExecutor<ServiceConnectionFactory> {
    /// Executor whose workers each open one [`ServiceConnection`] to the
    /// configured endpoint, using the configured degree of parallelism.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let factory = ServiceConnectionFactory::from_config(config)?;
        Ok(BatchExecutor::new(factory, config.parallelism()))
    }
}
