//! Configuration loading and credential persistence for the wolt CLI.
//!
//! Uses figment for YAML-based configuration with sensible defaults and a
//! `WOLT_` environment overlay. Credentials live in a separate JSON file so
//! rotated tokens can be written back without touching the YAML.

pub mod credentials;
pub mod schema;

pub use credentials::CredentialStore;
pub use schema::{Config, TraceOutput};
