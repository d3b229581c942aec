use crate::executor::parallelism::{DegreeOfParallelism, AUTO_PARALLELISM};
use crate::service::auth::AuthMode;
use crate::service::options::{
    ConnectionOptions, DEFAULT_HTTP_BODY_LIMIT_BYTES, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use anyhow::{bail, Context, Result};
use std::time::Duration;

/// Everything needed to build a connection factory and executor for one
/// service endpoint.
///
/// All instances must be constructed via [`ServiceConfig::builder`] or [`ServiceConfig::new`]
/// so invariants are validated before any consumer observes the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    endpoint: String,
    auth: AuthMode,
    request_timeout: Duration,
    parallelism: DegreeOfParallelism,
    max_concurrent_requests: usize,
    max_request_body_bytes: usize,
    max_response_body_bytes: usize,
}

pub struct ServiceConfigParams {
    pub endpoint: String,
    pub auth: AuthMode,
    pub request_timeout: Duration,
    pub degree_of_parallelism: i32,
    pub max_concurrent_requests: usize,
    pub max_request_body_bytes: usize,
    pub max_response_body_bytes: usize,
}

impl ServiceConfig {
    /// Returns a builder to incrementally construct and validate a configuration.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Constructs a configuration directly from the provided values.
    ///
    /// Prefer [`ServiceConfig::builder`] when most values use defaults.
    pub fn new(params: ServiceConfigParams) -> Result<Self> {
        let ServiceConfigParams {
            endpoint,
            auth,
            request_timeout,
            degree_of_parallelism,
            max_concurrent_requests,
            max_request_body_bytes,
            max_response_body_bytes,
        } = params;

        let parallelism = DegreeOfParallelism::new(degree_of_parallelism)
            .context("invalid degree_of_parallelism")?;

        let config = Self {
            endpoint: trimmed_string(endpoint),
            auth: auth.trimmed(),
            request_timeout,
            parallelism,
            max_concurrent_requests,
            max_request_body_bytes,
            max_response_body_bytes,
        };

        config.validate()?;
        Ok(config)
    }

    /// Full service URL (including scheme).
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn auth(&self) -> &AuthMode {
        &self.auth
    }

    /// Per-call timeout applied by every connection.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Default degree of parallelism for batches dispatched by executors built from this config.
    pub fn parallelism(&self) -> DegreeOfParallelism {
        self.parallelism
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    pub fn max_request_body_bytes(&self) -> usize {
        self.max_request_body_bytes
    }

    pub fn max_response_body_bytes(&self) -> usize {
        self.max_response_body_bytes
    }

    /// Per-connection knobs derived from this configuration.
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            request_timeout: self.request_timeout,
            max_concurrent_requests: self.max_concurrent_requests,
            max_request_body_bytes: self.max_request_body_bytes,
            max_response_body_bytes: self.max_response_body_bytes,
        }
    }

    /// Performs validation on an existing configuration instance.
    pub fn validate(&self) -> Result<()> {
        validate_url(&self.endpoint)?;
        self.auth.validate()?;
        self.connection_options().validate()?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct ServiceConfigBuilder {
    endpoint: Option<String>,
    auth: Option<AuthMode>,
    request_timeout: Option<Duration>,
    degree_of_parallelism: Option<i32>,
    max_concurrent_requests: Option<usize>,
    max_request_body_bytes: Option<usize>,
    max_response_body_bytes: Option<usize>,
}

impl ServiceConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    pub fn auth(mut self, auth: AuthMode) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn degree_of_parallelism(mut self, value: i32) -> Self {
        self.degree_of_parallelism = Some(value);
        self
    }

    pub fn max_concurrent_requests(mut self, count: usize) -> Self {
        self.max_concurrent_requests = Some(count);
        self
    }

    pub fn max_request_body_bytes(mut self, bytes: usize) -> Self {
        self.max_request_body_bytes = Some(bytes);
        self
    }

    pub fn max_response_body_bytes(mut self, bytes: usize) -> Self {
        self.max_response_body_bytes = Some(bytes);
        self
    }

    pub fn build(self) -> Result<ServiceConfig> {
        let params = ServiceConfigParams {
            endpoint: self.endpoint.context("endpoint is required")?,
            auth: self.auth.context("auth is required")?,
            request_timeout: self
                .request_timeout
                .unwrap_or_else(|| Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
            degree_of_parallelism: self.degree_of_parallelism.unwrap_or(AUTO_PARALLELISM),
            max_concurrent_requests: self
                .max_concurrent_requests
                .unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
            max_request_body_bytes: self
                .max_request_body_bytes
                .unwrap_or(DEFAULT_HTTP_BODY_LIMIT_BYTES),
            max_response_body_bytes: self
                .max_response_body_bytes
                .unwrap_or(DEFAULT_HTTP_BODY_LIMIT_BYTES),
        };

        ServiceConfig::new(params)
    }
}

fn trimmed_string(value: String) -> String {
    value.trim().to_owned()
}

pub(crate) fn validate_url(url: &str) -> Result<()> {
    let url = url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("endpoint must start with http:// or https://");
    }
    Ok(())
}
