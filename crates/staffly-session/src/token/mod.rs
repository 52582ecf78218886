//! Token decoding and storage.
//!
//! # Key Types
//!
//! - [`AccessClaims`] - decoded JWT payload claims
//! - [`UserInfo`] - whitelisted identity subset the store persists
//! - [`TokenStore`] - single-writer session state store

mod claims;
mod store;

pub use self::claims::{AccessClaims, UserInfo, token_expired, token_expires_within};
pub use self::store::TokenStore;
