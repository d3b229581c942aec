//! Per-connection knobs along with validation helpers so callers can reason
//! about timeouts, in-flight limits, and HTTP body sizes.

use anyhow::{bail, Result};
use std::time::Duration;

pub const DEFAULT_HTTP_BODY_LIMIT_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOptions {
    pub request_timeout: Duration,
    pub max_concurrent_requests: usize,
    pub max_request_body_bytes: usize,
    pub max_response_body_bytes: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            max_request_body_bytes: DEFAULT_HTTP_BODY_LIMIT_BYTES,
            max_response_body_bytes: DEFAULT_HTTP_BODY_LIMIT_BYTES,
        }
    }
}

impl ConnectionOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            bail!("request_timeout must be greater than 0");
        }
        if self.max_concurrent_requests == 0 {
            bail!("max_concurrent_requests must be greater than 0");
        }
        if self.max_request_body_bytes == 0 {
            bail!("max_request_body_bytes must be greater than 0");
        }
        if self.max_response_body_bytes == 0 {
            bail!("max_response_body_bytes must be greater than 0");
        }
        Ok(())
    }

    pub(crate) fn request_size_limit(&self) -> u32 {
        self.max_request_body_bytes.min(u32::MAX as usize) as u32
    }

    pub(crate) fn response_size_limit(&self) -> u32 {
        self.max_response_body_bytes.min(u32::MAX as usize) as u32
    }
}
