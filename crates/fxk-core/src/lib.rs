//! fxk core library
//!
//! Profile-based configuration, response normalization and the CRM API
//! operations behind the `fxk` command line tool.
//!
//! Operations never panic on upstream data: they return a [`Normalized`]
//! result whose failures carry an [`ErrorKind`] the caller can map to an
//! exit status.

pub mod auth;
pub mod endpoints;
pub mod error;
pub mod normalizer;
pub mod profile;
pub mod resources;
pub mod response;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use auth::{AuthSession, Authenticator, TokenStatus};
pub use error::{Error, ErrorKind, Result};
pub use normalizer::{ApiEnvelope, AuthToken};
pub use profile::{Config, ConfigState, CorruptConfigPolicy, Profile, ProfileStore};
pub use resources::{GetOptions, ListOptions, ObjectClient, ObjectPage};
pub use response::Normalized;
pub use transport::{HttpTransport, Transport, TransportConfig, TransportError};

pub use reqwest::Method;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
