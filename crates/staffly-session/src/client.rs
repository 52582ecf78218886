//! Backend authentication client.
//!
//! [`AuthTransport`] is the seam the refresh policy and session facade talk
//! through; [`AuthClient`] is the reqwest implementation speaking the
//! backend's versioned REST contract with its standard error envelope.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use staffly_core::{Error, Result};
use url::Url;

use crate::config::SessionConfig;

/// Tracing target for authentication client operations.
pub const TRACING_TARGET: &str = "staffly_session::client";

const LOGIN_PATH: &str = "/api/v1/Authentication/login";
const REFRESH_PATH: &str = "/api/v1/Authentication/refresh-token";

/// Login credentials.
#[derive(Clone, Serialize)]
pub struct Credentials {
    /// Account email address.
    pub email: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates credentials from email and password.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the password.
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Tokens issued by a successful login or refresh.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    /// The new access token.
    pub access_token: String,
    /// The refresh token to exchange later.
    pub refresh_token: String,
    /// When the refresh token expires, when the backend reports it.
    #[serde(default)]
    pub refresh_token_expires_at: Option<Timestamp>,
}

/// Transport seam for the authentication endpoints.
///
/// The production implementation is [`AuthClient`]; tests substitute stubs
/// to drive the refresh policy without a network.
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// Exchanges credentials for a token grant.
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant>;

    /// Exchanges a refresh token for a new token grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;
}

struct AuthClientInner {
    http: Client,
    base_url: Url,
}

impl std::fmt::Debug for AuthClientInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthClientInner")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Reqwest-backed [`AuthTransport`] implementation.
#[derive(Clone, Debug)]
pub struct AuthClient {
    inner: Arc<AuthClientInner>,
}

impl AuthClient {
    /// Creates a new authentication client from the session configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unparseable base URL and a
    /// network error when the HTTP client cannot be constructed.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            Error::configuration()
                .with_message("base URL is not a valid URL")
                .with_source(e)
        })?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                Error::configuration()
                    .with_message("failed to build HTTP client")
                    .with_source(e)
            })?;

        tracing::debug!(
            target: TRACING_TARGET,
            base_url = %base_url,
            timeout_secs = config.request_timeout_secs,
            "authentication client created"
        );

        Ok(Self {
            inner: Arc::new(AuthClientInner { http, base_url }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.inner.base_url.join(path).map_err(|e| {
            Error::configuration()
                .with_message(format!("cannot join endpoint path {path}"))
                .with_source(e)
        })
    }

    async fn post_grant<B>(&self, path: &str, body: &B) -> Result<TokenGrant>
    where
        B: Serialize + Sync,
    {
        let url = self.endpoint(path)?;
        let response = self
            .inner
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<TokenGrant>().await.map_err(|e| {
                Error::serialization()
                    .with_message("token grant response is not the expected shape")
                    .with_source(e)
            });
        }

        let message = response
            .json::<ErrorEnvelope>()
            .await
            .ok()
            .and_then(ErrorEnvelope::into_message)
            .unwrap_or_else(|| format!("HTTP {status}"));

        tracing::warn!(
            target: TRACING_TARGET,
            path,
            status = status.as_u16(),
            message = %message,
            "authentication endpoint returned an error"
        );

        let error = match status {
            StatusCode::UNAUTHORIZED => Error::unauthorized(),
            StatusCode::CONFLICT => Error::conflict(),
            _ => Error::network_error(),
        };
        Err(error.with_message(message))
    }
}

#[async_trait]
impl AuthTransport for AuthClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant> {
        self.post_grant(LOGIN_PATH, credentials).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let body = RefreshRequest { refresh_token };
        self.post_grant(REFRESH_PATH, &body).await
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Standard backend error envelope; `errorMessage` wins over `message`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
    message: Option<String>,
}

impl ErrorEnvelope {
    fn into_message(self) -> Option<String> {
        self.error_message.or(self.message)
    }
}

fn from_reqwest(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        Error::network_error()
            .with_message("request timed out")
            .with_source(error)
    } else if error.is_connect() {
        Error::network_error()
            .with_message("connection failed")
            .with_source(error)
    } else {
        Error::network_error()
            .with_message(error.to_string())
            .with_source(error)
    }
}
