//! Per-call credentials and the result of a token rotation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Credentials attached to one outbound call.
///
/// Immutable once built; callers keep the canonical copy and pass a reference
/// into every gateway operation.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Only consulted by the token rotation call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Raw `name=value` cookie strings, sent in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cookies: Vec<String>,
}

impl AuthContext {
    /// Create a context holding only an access token.
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: Some(access_token.into()),
            ..Self::default()
        }
    }

    /// Attach a refresh token.
    #[must_use]
    pub fn with_refresh(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    /// Append a raw cookie string.
    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookies.push(cookie.into());
        self
    }

    /// Access token with surrounding whitespace removed, if non-blank.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        non_blank(self.access_token.as_deref())
    }

    /// Refresh token with surrounding whitespace removed, if non-blank.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        non_blank(self.refresh_token.as_deref())
    }

    /// `true` iff a non-blank access token or at least one cookie is present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.access_token().is_some() || self.cookie_header().is_some()
    }

    /// Value for the `Authorization` header.
    #[must_use]
    pub fn authorization_header(&self) -> Option<String> {
        self.access_token().map(|t| format!("Bearer {t}"))
    }

    /// Value for the `Cookie` header: non-blank cookies joined with `"; "`.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .cookies
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join("; "))
    }

    /// Copy of this context carrying only the cookies.
    #[must_use]
    pub fn cookies_only(&self) -> Self {
        Self {
            cookies: self.cookies.clone(),
            ..Self::default()
        }
    }

    /// Returns a new context with a rotated token pair applied.
    #[must_use]
    pub fn rotated(&self, refresh: &TokenRefresh) -> Self {
        Self {
            access_token: Some(refresh.access_token.clone()),
            refresh_token: Some(refresh.refresh_token.clone()),
            cookies: self.cookies.clone(),
        }
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("access_token", &self.access_token().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token().map(|_| "<redacted>"))
            .field("cookies", &self.cookies.len())
            .finish()
    }
}

/// Outcome of exchanging a refresh token. Never persisted by the gateway.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRefresh {
    pub access_token: String,
    /// Falls back to the submitted refresh token when the response omits one.
    pub refresh_token: String,
    /// Lifetime in seconds; `0` when the response has no expiry.
    pub expires_in: u64,
}

impl fmt::Debug for TokenRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRefresh")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_credentials() {
        assert!(!AuthContext::default().has_credentials());
        assert!(AuthContext::bearer("tok").has_credentials());
        assert!(AuthContext::default().with_cookie("a=b").has_credentials());
        assert!(!AuthContext::bearer("   ").has_credentials());
        assert!(!AuthContext::default().with_cookie(" ").has_credentials());
    }

    #[test]
    fn test_refresh_token_alone_is_not_credentials() {
        let auth = AuthContext::default().with_refresh("ref");
        assert!(!auth.has_credentials());
        assert_eq!(auth.refresh_token(), Some("ref"));
    }

    #[test]
    fn test_cookie_header_joined() {
        let auth = AuthContext::default()
            .with_cookie("__wtoken=abc")
            .with_cookie("")
            .with_cookie("__wrtoken=def");
        assert_eq!(
            auth.cookie_header().as_deref(),
            Some("__wtoken=abc; __wrtoken=def")
        );
    }

    #[test]
    fn test_authorization_header_trims() {
        let auth = AuthContext::bearer(" tok ");
        assert_eq!(auth.authorization_header().as_deref(), Some("Bearer tok"));
        assert_eq!(AuthContext::default().authorization_header(), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let auth = AuthContext::bearer("secret-access").with_refresh("secret-refresh");
        let dbg = format!("{auth:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn test_rotated_keeps_cookies() {
        let auth = AuthContext::bearer("old")
            .with_refresh("old-ref")
            .with_cookie("a=b");
        let next = auth.rotated(&TokenRefresh {
            access_token: "new".into(),
            refresh_token: "new-ref".into(),
            expires_in: 1800,
        });
        assert_eq!(next.access_token(), Some("new"));
        assert_eq!(next.refresh_token(), Some("new-ref"));
        assert_eq!(next.cookies, vec!["a=b".to_string()]);
    }

    #[test]
    fn test_serde_skips_empty() {
        let json = serde_json::to_string(&AuthContext::bearer("tok")).unwrap();
        assert_eq!(json, r#"{"access_token":"tok"}"#);
        let back: AuthContext = serde_json::from_str("{}").unwrap();
        assert_eq!(back, AuthContext::default());
    }
}
