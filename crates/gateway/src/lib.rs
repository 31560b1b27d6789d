//! Upstream gateway for the Wolt consumer API.
//!
//! Every outbound call goes through [`Gateway`]: request construction,
//! identification and auth headers, a shared rate throttle, response
//! classification into [`UpstreamError`](wolt_types::UpstreamError), tolerant
//! JSON decoding, and optional per-request trace lines. Token rotation lives
//! here too ([`Gateway::refresh_access_token`]); persisting the rotated pair
//! is left to the caller.

pub mod api;
pub mod client;
pub mod context;
pub mod feed;
pub mod normalize;
pub mod refresh;
pub mod throttle;
pub mod trace;
pub mod transport;

pub use client::{ApiRequest, Gateway, GatewayBuilder, RequestBody};
pub use context::CallContext;
pub use normalize::Payload;
pub use throttle::Throttle;
pub use trace::{TraceSink, Tracer, TracingSink, WriterSink};
pub use transport::Transport;
