//! rsclearkey - ClearKey CENC license client and sample decrypter.
//!
//! This crate provides:
//! - ClearKey JSON license request building and response parsing.
//! - Key id / content key types with hex, UUID and Base64 encodings.
//! - Decryption sessions fed by a license server or provisioned keys.
//! - AES-128-CTR (`cenc`) subsample decryption.
//!
//! Feature flags:
//! - `log` (default): emit diagnostics through the `log` facade.
//! - `http` (default): reqwest based license transport.
//! - `cli`: enable the CLI binary and YAML configuration.
#![allow(clippy::result_large_err)]

#[macro_use]
mod macros;

/// Session container.
pub mod cdm;
/// Host configuration.
pub mod config;
/// CENC sample decryption.
pub mod decrypter;
/// Common error types and Result alias.
pub mod error;
/// Content keys.
pub mod key;
/// Key identifiers.
pub mod kid;
/// ClearKey license messages.
pub mod license;
/// Key id to key registry.
pub mod registry;
/// Decryption session.
pub mod session;
/// License server transport.
pub mod transport;
/// Shared helper utilities.
pub mod utils;

pub use cdm::ClearKeyCdm;
pub use config::{ClearKeyConfig, ProvisionedKeys, SessionConfig};
pub use error::{Error, ErrorKind, Result};
pub use key::{ContentKey, KeyPair};
pub use kid::KeyId;
pub use session::{Session, SessionState};
