//! Session configuration.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default values for configuration options.
mod defaults {
    /// Default backend base URL for development.
    pub const BASE_URL: &str = "https://api.staffly.app";

    /// Default HTTP request timeout in seconds.
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;

    /// Default refresh lead time: refresh when the access token expires
    /// within this many minutes.
    pub const REFRESH_LEAD_TIME_MINUTES: i64 = 5;

    /// Default refresh attempts per failure episode.
    pub const MAX_REFRESH_ATTEMPTS: u32 = 2;

    /// Default User-Agent header.
    pub fn user_agent() -> String {
        format!("staffly/{}", env!("CARGO_PKG_VERSION"))
    }
}

/// Configuration for a [`Session`] and its HTTP client.
///
/// [`Session`]: crate::Session
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[must_use = "config does nothing unless you use it"]
#[builder(
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct SessionConfig {
    /// Backend base URL; versioned API paths are joined onto it.
    #[builder(default = "defaults::BASE_URL.to_string()")]
    pub base_url: String,

    /// Timeout for HTTP requests in seconds.
    #[builder(default = "defaults::REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[builder(default = "defaults::user_agent()")]
    pub user_agent: String,

    /// Refresh proactively when the access token expires within this many
    /// minutes.
    #[builder(default = "defaults::REFRESH_LEAD_TIME_MINUTES")]
    pub refresh_lead_time_minutes: i64,

    /// Refresh attempts allowed per failure episode before the session is
    /// considered lost.
    #[builder(default = "defaults::MAX_REFRESH_ATTEMPTS")]
    pub max_refresh_attempts: u32,
}

impl SessionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Returns the refresh lead time as a duration.
    #[must_use]
    pub fn refresh_lead_time(&self) -> jiff::SignedDuration {
        jiff::SignedDuration::from_mins(self.refresh_lead_time_minutes)
    }

    /// Returns the request timeout as a duration.
    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

impl SessionConfigBuilder {
    /// Wrapper for builder validation that returns String errors.
    fn validate(builder: &SessionConfigBuilder) -> Result<(), String> {
        if let Some(base_url) = &builder.base_url {
            if base_url.is_empty() {
                return Err("Base URL cannot be empty".to_string());
            }

            if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
                return Err("Base URL must start with 'https://' or 'http://'".to_string());
            }
        }

        if let Some(timeout_secs) = &builder.request_timeout_secs {
            if *timeout_secs < 1 {
                return Err("Request timeout must be at least 1 second".to_string());
            }
            if *timeout_secs > 300 {
                return Err("Request timeout cannot exceed 300 seconds".to_string());
            }
        }

        if let Some(lead_time) = &builder.refresh_lead_time_minutes {
            if *lead_time < 0 {
                return Err("Refresh lead time cannot be negative".to_string());
            }
            if *lead_time > 60 {
                return Err("Refresh lead time cannot exceed 60 minutes".to_string());
            }
        }

        if let Some(attempts) = &builder.max_refresh_attempts {
            if *attempts == 0 {
                return Err("Max refresh attempts must be greater than 0".to_string());
            }
            if *attempts > 5 {
                return Err("Max refresh attempts cannot exceed 5".to_string());
            }
        }

        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::BASE_URL.to_string(),
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            user_agent: defaults::user_agent(),
            refresh_lead_time_minutes: defaults::REFRESH_LEAD_TIME_MINUTES,
            max_refresh_attempts: defaults::MAX_REFRESH_ATTEMPTS,
        }
    }
}
