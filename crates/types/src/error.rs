//! Unified error type for the wolt workspace.
//!
//! Every failure that touched (or tried to touch) the network is an
//! [`UpstreamError`]. Everything else is a local error that never left the
//! process, or a shape error raised after a successful decode.

use std::{error::Error as StdError, fmt};
use thiserror::Error;

/// Maximum number of characters of a response body rendered in an error message.
pub const BODY_PREVIEW_LIMIT: usize = 256;

const ELLIPSIS: &str = "...";

/// Enumerates all error kinds that can occur across wolt crates.
#[derive(Debug, Error)]
pub enum WoltError {
    /// A call reached (or attempted to reach) the upstream service and failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// The request could not be built (bad URL, blank path segment, bad input).
    #[error("request error: {0}")]
    Request(String),

    /// JSON serialization or deserialization error outside the wire pipeline.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The call context finished before a throttle slot was granted.
    #[error(transparent)]
    Context(#[from] ContextError),

    /// The token endpoint answered 2xx but no access token could be located.
    #[error("refresh response missing access token")]
    MissingAccessToken,

    /// A decoded payload lacks something the operation needs.
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential file read/write failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl WoltError {
    /// Returns the upstream HTTP status, if this error carries one.
    #[must_use]
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream(e) => e.status(),
            _ => None,
        }
    }

    /// Returns `true` for errors that involved the network.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_))
    }

    /// Returns `true` if the upstream rejected the credentials (401/403).
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.upstream_status(), Some(401 | 403))
    }

    /// Returns `true` if the upstream reported the resource missing (404/410).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.upstream_status(), Some(404 | 410))
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, WoltError>;

/// Why a call context finished before the work it guarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Underlying failure attached to an [`UpstreamError`].
#[derive(Debug, Error)]
pub enum UpstreamCause {
    /// No HTTP response was obtained (DNS, connect, TLS, timeout).
    #[error("transport: {0}")]
    Transport(#[source] Box<dyn StdError + Send + Sync>),

    /// Headers arrived but the body could not be read.
    #[error("read body: {0}")]
    Read(#[source] Box<dyn StdError + Send + Sync>),

    /// A 2xx body was not a JSON object.
    #[error("decode json: {0}")]
    Decode(#[source] serde_json::Error),

    /// The call context finished while the request was in flight.
    #[error("{0}")]
    Context(#[source] ContextError),
}

/// The uniform failure shape for any call that reached the network.
///
/// `body` keeps the raw response text byte-for-byte; only the rendered
/// message is sanitized and truncated.
#[derive(Debug)]
pub struct UpstreamError {
    pub method: String,
    pub url: String,
    status: Option<u16>,
    pub body: String,
    pub cause: Option<UpstreamCause>,
}

impl UpstreamError {
    /// Builds an error. A `status` of `0` means no response was received.
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
        cause: Option<UpstreamCause>,
    ) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            status: (status != 0).then_some(status),
            body: body.into(),
            cause,
        }
    }

    /// HTTP status, or `None` when the request never produced a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Single-line, whitespace-collapsed, length-capped rendering of `body`.
    #[must_use]
    pub fn body_preview(&self) -> String {
        sanitize_body(&self.body, BODY_PREVIEW_LIMIT)
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("upstream request failed")?;
        if let Some(status) = self.status {
            write!(f, " status={status}")?;
        }
        for part in [self.method.trim(), self.url.trim()] {
            if !part.is_empty() {
                write!(f, " {part}")?;
            }
        }
        let preview = self.body_preview();
        if !preview.is_empty() {
            write!(f, " body={preview:?}")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, " cause={cause}")?;
        }
        Ok(())
    }
}

impl StdError for UpstreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|c| c as &(dyn StdError + 'static))
    }
}

/// Reports whether `err` or anything in its `source()` chain is an
/// [`UpstreamError`].
#[must_use]
pub fn is_upstream(err: &(dyn StdError + 'static)) -> bool {
    find_upstream(err).is_some()
}

/// Finds the first [`UpstreamError`] in the `source()` chain of `err`.
#[must_use]
pub fn find_upstream<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a UpstreamError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(up) = e.downcast_ref::<UpstreamError>() {
            return Some(up);
        }
        if let Some(WoltError::Upstream(up)) = e.downcast_ref::<WoltError>() {
            return Some(up);
        }
        current = e.source();
    }
    None
}

/// Collapses all whitespace runs to a single space and caps the result at
/// `limit` characters, appending an ellipsis when truncated.
#[must_use]
pub fn sanitize_body(body: &str, limit: usize) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= limit {
        return collapsed;
    }
    let mut out: String = collapsed.chars().take(limit).collect();
    out.push_str(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_full() {
        let err = UpstreamError::new(
            "GET",
            "https://example.test/v1/user/me",
            401,
            "{\"error\": \"unauthorized\"}",
            None,
        );
        let s = err.to_string();
        assert!(s.starts_with("upstream request failed status=401"));
        assert!(s.contains("GET https://example.test/v1/user/me"));
        assert!(s.contains("unauthorized"));
        assert!(!s.contains("cause="));
    }

    #[test]
    fn test_display_without_status_or_body() {
        let err = UpstreamError::new(
            "POST",
            "https://example.test/search",
            0,
            "",
            Some(UpstreamCause::Context(ContextError::DeadlineExceeded)),
        );
        assert_eq!(err.status(), None);
        let s = err.to_string();
        assert!(!s.contains("status="));
        assert!(!s.contains("body="));
        assert!(s.ends_with("cause=context deadline exceeded"));
    }

    #[test]
    fn test_display_omits_blank_method_and_url() {
        let err = UpstreamError::new("", "  ", 500, "", None);
        assert_eq!(err.to_string(), "upstream request failed status=500");
    }

    #[test]
    fn test_display_single_part_has_no_double_space() {
        let err = UpstreamError::new("GET", "", 500, "", None);
        assert_eq!(err.to_string(), "upstream request failed status=500 GET");
        let err = UpstreamError::new(" ", "https://example.test/x", 0, "", None);
        assert_eq!(err.to_string(), "upstream request failed https://example.test/x");
    }

    #[test]
    fn test_body_preview_sanitized_and_capped() {
        let line = "word\n\t  ".repeat(250);
        assert!(line.len() >= 2000);
        let err = UpstreamError::new("GET", "https://example.test", 502, line.clone(), None);
        let preview = err.body_preview();
        assert!(!preview.contains('\n'));
        assert!(!preview.contains("  "));
        assert!(preview.ends_with(ELLIPSIS));
        assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + ELLIPSIS.len());
        assert_eq!(err.body, line, "raw body must be kept untouched");
    }

    #[test]
    fn test_sanitize_short_body_untouched() {
        assert_eq!(sanitize_body("  not   found \n", 64), "not found");
    }

    #[test]
    fn test_is_upstream_through_wolt_error() {
        let err: WoltError = UpstreamError::new("GET", "https://example.test", 404, "", None).into();
        assert!(is_upstream(&err));
        assert!(err.is_not_found());
        assert!(!err.is_auth_failure());
        assert_eq!(err.upstream_status(), Some(404));
    }

    #[test]
    fn test_is_upstream_false_for_local_errors() {
        let err = WoltError::Request("blank slug".into());
        assert!(!is_upstream(&err));
        assert!(!err.is_upstream());
        assert!(!is_upstream(&WoltError::MissingAccessToken));
    }

    #[test]
    fn test_source_chain_exposes_cause() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = UpstreamError::new("GET", "u", 200, "{oops", Some(UpstreamCause::Decode(json_err)));
        let source = err.source().expect("cause is exposed as source");
        assert!(source.to_string().starts_with("decode json"));
    }

    #[test]
    fn test_auth_failure_statuses() {
        for status in [401, 403] {
            let err: WoltError = UpstreamError::new("GET", "u", status, "", None).into();
            assert!(err.is_auth_failure());
        }
        let gone: WoltError = UpstreamError::new("GET", "u", 410, "", None).into();
        assert!(gone.is_not_found());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid {{{").unwrap_err();
        let err: WoltError = json_err.into();
        assert!(matches!(err, WoltError::Serialization(_)));
    }
}
