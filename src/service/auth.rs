//! Authentication modes accepted by the service and their mapping onto HTTP
//! headers for the underlying `jsonrpsee` client builder.

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use jsonrpsee::http_client::{HeaderMap, HeaderValue};
use std::fmt;

pub(crate) const CLIENT_ID_HEADER: &str = "X-Client-Id";
pub(crate) const CERT_THUMBPRINT_HEADER: &str = "X-Client-Cert-Thumbprint";

/// How every connection authenticates against the service.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMode {
    /// Username and password, sent as HTTP Basic credentials.
    Credentials { username: String, password: String },
    /// Pre-issued bearer token.
    Token { token: String },
    /// Application identity backed by a client certificate thumbprint.
    Certificate {
        client_id: String,
        thumbprint: String,
    },
}

impl AuthMode {
    pub fn scheme(&self) -> &'static str {
        match self {
            AuthMode::Credentials { .. } => "credentials",
            AuthMode::Token { .. } => "token",
            AuthMode::Certificate { .. } => "certificate",
        }
    }

    pub(crate) fn trimmed(self) -> Self {
        match self {
            AuthMode::Credentials { username, password } => AuthMode::Credentials {
                username: username.trim().to_owned(),
                password: password.trim().to_owned(),
            },
            AuthMode::Token { token } => AuthMode::Token {
                token: token.trim().to_owned(),
            },
            AuthMode::Certificate {
                client_id,
                thumbprint,
            } => AuthMode::Certificate {
                client_id: client_id.trim().to_owned(),
                thumbprint: thumbprint.trim().to_owned(),
            },
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            AuthMode::Credentials { username, password } => {
                ensure_not_empty(username, "username")?;
                ensure_not_empty(password, "password")
            }
            AuthMode::Token { token } => ensure_not_empty(token, "token"),
            AuthMode::Certificate {
                client_id,
                thumbprint,
            } => {
                ensure_not_empty(client_id, "client_id")?;
                ensure_not_empty(thumbprint, "thumbprint")?;
                if !thumbprint.chars().all(|c| c.is_ascii_hexdigit()) {
                    bail!("thumbprint must be hexadecimal");
                }
                Ok(())
            }
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMode::Credentials { username, .. } => f
                .debug_struct("Credentials")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            AuthMode::Token { .. } => f
                .debug_struct("Token")
                .field("token", &"<redacted>")
                .finish(),
            AuthMode::Certificate {
                client_id,
                thumbprint,
            } => f
                .debug_struct("Certificate")
                .field("client_id", client_id)
                .field("thumbprint", thumbprint)
                .finish(),
        }
    }
}

pub(crate) fn build_auth_headers(auth: &AuthMode) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    match auth {
        AuthMode::Credentials { username, password } => {
            let encoded = BASE64_STANDARD.encode(format!("{username}:{password}"));
            let value = HeaderValue::from_str(&format!("Basic {encoded}"))
                .context("failed to build Authorization header")?;
            headers.insert("Authorization", value);
        }
        AuthMode::Token { token } => {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .context("failed to build Authorization header")?;
            headers.insert("Authorization", value);
        }
        AuthMode::Certificate {
            client_id,
            thumbprint,
        } => {
            let client_id =
                HeaderValue::from_str(client_id).context("failed to build client id header")?;
            let thumbprint = HeaderValue::from_str(&thumbprint.to_ascii_uppercase())
                .context("failed to build certificate thumbprint header")?;
            headers.insert(CLIENT_ID_HEADER, client_id);
            headers.insert(CERT_THUMBPRINT_HEADER, thumbprint);
        }
    }
    Ok(headers)
}

fn ensure_not_empty(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{field} cannot be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_become_basic_auth() {
        let headers = build_auth_headers(&AuthMode::Credentials {
            username: "user".into(),
            password: "pass".into(),
        })
        .unwrap();
        assert_eq!(headers["Authorization"], "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn token_becomes_bearer_auth() {
        let headers = build_auth_headers(&AuthMode::Token {
            token: "abc.def".into(),
        })
        .unwrap();
        assert_eq!(headers["Authorization"], "Bearer abc.def");
    }

    #[test]
    fn certificate_sets_identity_headers() {
        let headers = build_auth_headers(&AuthMode::Certificate {
            client_id: "batch-app".into(),
            thumbprint: "ab12cd".into(),
        })
        .unwrap();
        assert!(headers.get("Authorization").is_none());
        assert_eq!(headers[CLIENT_ID_HEADER], "batch-app");
        assert_eq!(headers[CERT_THUMBPRINT_HEADER], "AB12CD");
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!(
            "{:?}",
            AuthMode::Credentials {
                username: "user".into(),
                password: "hunter2".into(),
            }
        );
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn rejects_malformed_thumbprint() {
        let err = AuthMode::Certificate {
            client_id: "batch-app".into(),
            thumbprint: "not-hex".into(),
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("hexadecimal"));
    }
}
