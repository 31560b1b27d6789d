//! Access-token rotation.
//!
//! The token endpoint takes a form body and its JSON answer has changed
//! field names and nesting across platform versions, so the result is read
//! with alias lists instead of a fixed schema.

use crate::{
    client::{ApiRequest, Gateway},
    context::CallContext,
    normalize::{Payload, int_field_nested, string_field_nested},
};
use wolt_types::{AuthContext, Result, TokenRefresh, WoltError};

const ACCESS_TOKEN_ALIASES: &[&str] = &["access_token", "accessToken", "token"];
const REFRESH_TOKEN_ALIASES: &[&str] = &["refresh_token", "refreshToken"];
const EXPIRY_ALIASES: &[&str] = &["expires_in", "expiresIn", "expires"];
const CONTAINERS: &[&str] = &["data"];

/// Path of the token endpoint under the auth host.
const TOKEN_PATH: &[&str] = &["v1", "wauth2", "access_token"];

/// Build the form-urlencoded body for a refresh grant.
///
/// # Errors
///
/// Returns [`WoltError::Request`] if encoding fails.
pub fn refresh_form(refresh_token: &str) -> Result<String> {
    serde_urlencoded::to_string([
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token),
    ])
    .map_err(|e| WoltError::Request(format!("encode refresh form: {e}")))
}

/// Reads the rotated token pair out of a token endpoint payload.
///
/// # Errors
///
/// Returns [`WoltError::MissingAccessToken`] if no alias yields an access token.
pub fn parse_refresh_response(payload: &Payload, submitted_refresh: &str) -> Result<TokenRefresh> {
    let access_token = string_field_nested(payload, ACCESS_TOKEN_ALIASES, CONTAINERS)
        .ok_or(WoltError::MissingAccessToken)?;
    let refresh_token = string_field_nested(payload, REFRESH_TOKEN_ALIASES, CONTAINERS)
        .unwrap_or_else(|| submitted_refresh.to_string());
    let expires_in = int_field_nested(payload, EXPIRY_ALIASES, CONTAINERS)
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0);
    Ok(TokenRefresh {
        access_token,
        refresh_token,
        expires_in,
    })
}

impl Gateway {
    /// Exchanges `refresh_token` for a new access (and possibly refresh) token.
    ///
    /// Only the cookies of `auth` are forwarded; no bearer header is sent.
    /// The caller decides whether to persist the result.
    ///
    /// # Errors
    ///
    /// - [`WoltError::Request`] for a blank refresh token (nothing is sent).
    /// - [`WoltError::Upstream`] exactly as for any other call.
    /// - [`WoltError::MissingAccessToken`] when the 2xx payload has no access token.
    pub async fn refresh_access_token(
        &self,
        ctx: &CallContext,
        refresh_token: &str,
        auth: &AuthContext,
    ) -> Result<TokenRefresh> {
        let trimmed = refresh_token.trim();
        if trimmed.is_empty() {
            return Err(WoltError::Request("refresh token is blank".into()));
        }
        let url = Self::endpoint_url(&self.endpoints().auth, TOKEN_PATH)?;
        let request = ApiRequest::post(url)
            .form(refresh_form(trimmed)?)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("accept", "application/json");

        let payload = self
            .execute(ctx, request, Some(&auth.cookies_only()))
            .await?;
        let refreshed = parse_refresh_response(&payload, refresh_token)?;
        tracing::info!(
            rotated_refresh = refreshed.refresh_token != refresh_token,
            expires_in = refreshed.expires_in,
            "access token rotated"
        );
        Ok(refreshed)
    }
}
