#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

//! # Staffly Session
//!
//! This crate implements the session and permission subsystem of the staffly
//! portal client: decoding backend-issued JWTs, persisting tokens with the
//! portal's cookie lifetimes, refreshing sessions with a bounded single-flight
//! policy, computing effective permissions, and evaluating the page and
//! action guards the UI consumes.

mod client;
mod config;
mod guard;
mod provider;
mod refresh;
mod session;
mod token;
mod trace;

pub mod prelude;

pub use client::{AuthClient, AuthTransport, Credentials, TokenGrant};
pub use config::{SessionConfig, SessionConfigBuilder};
pub use guard::{ActionDecision, ActionGuard, PageDecision, PageGuard, PageRequest};
pub use provider::{EffectivePermissions, PermissionProvider};
pub use refresh::{SessionRefresher, SessionState, UnauthorizedOutcome};
pub use session::Session;
pub use token::{AccessClaims, TokenStore, UserInfo, token_expired, token_expires_within};
pub use trace::init_tracing;

// Re-export the error surface shared with staffly-core.
pub use staffly_core::{BoxedError, Error, ErrorKind, Result};
