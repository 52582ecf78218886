#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

//! # Staffly Core
//!
//! This crate provides the permission domain model for the staffly client SDK.
//! It defines the frontend capability vocabulary, backend permission codes,
//! role normalization, and the static mapping table that translates between
//! backend codes and frontend capabilities.

mod capability;
mod code;
mod error;
mod mapping;
mod role;

pub mod prelude;

pub use capability::Capability;
pub use code::{PermissionClaim, PermissionCode};
pub use error::{BoxedError, Error, ErrorKind, Result};
pub use mapping::{capabilities_for_code, codes_for_capability, has_any, to_capabilities};
pub use role::{Role, RoleClaim};
