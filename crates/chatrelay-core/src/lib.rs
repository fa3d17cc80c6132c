//! # chatrelay-core
//!
//! Shared types, configuration, and utilities for chatrelay.
//!
//! Every platform adapter links against this crate:
//!
//! - **Types**: the protocol-agnostic [`Message`] carried by the relay bus
//! - **Configuration**: loading and validation of the JSON5 config file
//! - **Utilities**: secrets, path resolution, environment overrides, logging

pub mod config;
pub mod types;
pub mod error;
pub mod paths;
pub mod env;
pub mod logging;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
pub use secret::SecretString;
