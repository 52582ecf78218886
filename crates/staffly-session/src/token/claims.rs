//! JWT payload decoding.
//!
//! The backend signs and verifies its own tokens; the client only needs the
//! claims, so decoding here parses the middle base64url segment as JSON and
//! performs no signature or issuer verification. Every helper that takes a
//! raw token string is fail-safe: a token that cannot be parsed is treated
//! as expired.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use staffly_core::{Error, PermissionClaim, PermissionCode, Result, RoleClaim};
use uuid::Uuid;

/// Tracing target for token decoding operations.
pub const TRACING_TARGET: &str = "staffly_session::token";

/// Claims carried by a staffly access token.
///
/// Only the claims the portal consumes are modeled; anything else in the
/// payload is ignored. The `permissions` claim is itself a JSON-encoded
/// string holding an array of permission codes and is parsed lazily by
/// [`permission_codes`].
///
/// [`permission_codes`]: AccessClaims::permission_codes
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AccessClaims {
    /// Expiration time in seconds since the Unix epoch.
    #[serde(rename = "exp")]
    pub expires_at_secs: i64,
    /// Subject ID (unique identifier of the account).
    #[serde(rename = "sub")]
    pub subject: Uuid,
    /// Login name.
    #[serde(rename = "unique_name", default)]
    pub unique_name: Option<String>,
    /// Given name.
    #[serde(rename = "firstName", default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(rename = "lastName", default)]
    pub last_name: Option<String>,
    /// Job title shown in the portal header.
    #[serde(rename = "jobTitle", default)]
    pub job_title: Option<String>,
    /// Company the account belongs to.
    #[serde(rename = "companyId", default)]
    pub company_id: Option<Uuid>,
    /// Role claim; arrives as a bare string or a `{ "name": ... }` record.
    #[serde(
        rename = "http://schemas.microsoft.com/ws/2008/06/identity/claims/role",
        default
    )]
    pub role: Option<RoleClaim>,
    /// JSON-encoded array of issued permission codes.
    #[serde(default)]
    pub permissions: Option<String>,
}

impl AccessClaims {
    /// Decodes the payload segment of a JWT without verifying its signature.
    ///
    /// # Errors
    ///
    /// Returns a `MalformedToken` error when the token has no payload
    /// segment, the segment is not valid base64url, or the decoded bytes are
    /// not the expected JSON shape.
    pub fn decode(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| Error::malformed_token().with_message("token has no payload segment"))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| {
                Error::malformed_token()
                    .with_message("payload segment is not valid base64url")
                    .with_source(e)
            })?;

        serde_json::from_slice(&bytes).map_err(|e| {
            Error::malformed_token()
                .with_message("payload segment is not a valid claims object")
                .with_source(e)
        })
    }

    /// Returns the expiration instant.
    ///
    /// An `exp` outside the representable range reads as the distant past,
    /// so the token is treated as expired.
    #[must_use]
    pub fn expires_at(&self) -> Timestamp {
        Timestamp::from_second(self.expires_at_secs).unwrap_or(Timestamp::MIN)
    }

    /// Checks whether the token is expired at the given instant.
    #[inline]
    #[must_use]
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at() <= now
    }

    /// Checks whether the token is expired now.
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Timestamp::now())
    }

    /// Checks whether the token expires within the given window of `now`.
    #[must_use]
    pub fn expires_within_at(&self, within: SignedDuration, now: Timestamp) -> bool {
        match now.checked_add(within) {
            Ok(horizon) => self.expires_at() <= horizon,
            // An unrepresentable horizon means the window covers everything.
            Err(_) => true,
        }
    }

    /// Checks whether the token expires within the given window of now.
    #[must_use]
    pub fn expires_within(&self, within: SignedDuration) -> bool {
        self.expires_within_at(within, Timestamp::now())
    }

    /// Parses the issued permission codes out of the `permissions` claim.
    ///
    /// The claim holds a JSON-encoded string that itself contains an array of
    /// codes, either bare strings or `{ "code": ... }` records. Absent or
    /// malformed claims yield an empty list; this never fails.
    #[must_use]
    pub fn permission_codes(&self) -> Vec<PermissionCode> {
        let Some(raw) = self.permissions.as_deref() else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<PermissionClaim>>(raw) {
            Ok(claims) => claims.iter().filter_map(PermissionClaim::normalize).collect(),
            Err(error) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    subject = %self.subject,
                    error = %error,
                    "permissions claim is not a valid code array, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Extracts the whitelisted identity subset the token store persists.
    #[must_use]
    pub fn user_info(&self) -> UserInfo {
        UserInfo {
            subject: self.subject,
            unique_name: self.unique_name.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            job_title: self.job_title.clone(),
            company_id: self.company_id,
            role: self.role.clone(),
        }
    }
}

/// Checks whether a raw token is expired at the given instant.
///
/// Fail-safe: a token that cannot be decoded reads as expired.
#[must_use]
pub fn token_expired(token: &str, now: Timestamp) -> bool {
    AccessClaims::decode(token).map_or(true, |claims| claims.is_expired_at(now))
}

/// Checks whether a raw token expires within the given window of `now`.
///
/// Fail-safe: a token that cannot be decoded reads as already expired.
#[must_use]
pub fn token_expires_within(token: &str, within: SignedDuration, now: Timestamp) -> bool {
    AccessClaims::decode(token).map_or(true, |claims| claims.expires_within_at(within, now))
}

/// The whitelisted identity subset persisted in the token store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    /// Subject ID of the account.
    pub subject: Uuid,
    /// Login name.
    #[serde(default)]
    pub unique_name: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Job title.
    #[serde(default)]
    pub job_title: Option<String>,
    /// Company the account belongs to.
    #[serde(default)]
    pub company_id: Option<Uuid>,
    /// Role in whichever wire shape it arrived.
    #[serde(default)]
    pub role: Option<RoleClaim>,
}

impl UserInfo {
    /// Returns the normalized role, when one is present.
    #[must_use]
    pub fn role(&self) -> Option<staffly_core::Role> {
        self.role.as_ref().map(RoleClaim::normalize)
    }
}
