//! # Auth0 token cache
//!
//! Hands out a currently valid Auth0 machine-to-machine token. The token is
//! cached in Elasticsearch per environment, verified against the provider's
//! JWKS, generated with the client-credentials grant at most once per hour,
//! and refreshed before it expires.
//!
//! Modules:
//! - `auth0` — token client, generator, validator and key cache
//! - `store` — document store capability, Elasticsearch adapter, token records
//! - `transport` — outbound HTTP capability
//! - `notify` — best-effort operational alerts
//! - `config` — YAML configuration, defaults and validation

pub mod auth0;
pub mod config;
pub mod error;
pub mod helpers;
pub mod notify;
pub mod observability;
pub mod resilience;
pub mod server;
pub mod store;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::auth0::{RefreshOutcome, TokenClient};
pub use crate::config::services::ServiceConfig;
pub use crate::error::TokenError;
