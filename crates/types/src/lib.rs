//! Core types shared across the wolt workspace.
//!
//! This crate defines the error taxonomy, per-call credentials, upstream
//! endpoint configuration, and the typed shapes decoded from discovery and
//! venue payloads. It performs no I/O.

pub mod auth;
pub mod endpoints;
pub mod error;
pub mod venue;

pub use auth::{AuthContext, TokenRefresh};
pub use endpoints::{Coordinates, Endpoints};
pub use error::{
    ContextError, Result, UpstreamCause, UpstreamError, WoltError, find_upstream, is_upstream,
};
pub use venue::{FeedItem, Link, LocalizedText, Rating, Restaurant, Section, VenueSummary};
