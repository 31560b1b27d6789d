//! Credential-aware wrapper that rotates an expired access token once.

use wolt_config::CredentialStore;
use wolt_gateway::{CallContext, Gateway};
use wolt_types::{AuthContext, Result, TokenRefresh, WoltError};

pub struct Session {
    gateway: Gateway,
    store: CredentialStore,
    auth: AuthContext,
}

impl Session {
    /// Opens a session with the credentials currently in `store`.
    pub fn open(gateway: Gateway, store: CredentialStore) -> Result<Self> {
        let auth = store.load()?;
        tracing::debug!(
            access_token = auth.access_token().is_some(),
            refresh_token = auth.refresh_token().is_some(),
            cookies = auth.cookies.len(),
            "credentials loaded"
        );
        Ok(Self {
            gateway,
            store,
            auth,
        })
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Runs `op`; on a 401 with a stored refresh token, rotates the token,
    /// persists the new pair and runs `op` once more.
    pub async fn call<T>(
        &mut self,
        ctx: &CallContext,
        op: impl AsyncFn(&Gateway, &AuthContext) -> Result<T>,
    ) -> Result<T> {
        match op(&self.gateway, &self.auth).await {
            Err(err) if err.upstream_status() == Some(401) && self.auth.refresh_token().is_some() => {
                tracing::info!("access token rejected, rotating");
                self.refresh(ctx).await?;
                op(&self.gateway, &self.auth).await
            }
            other => other,
        }
    }

    /// Exchanges the stored refresh token and persists the result.
    pub async fn refresh(&mut self, ctx: &CallContext) -> Result<TokenRefresh> {
        let Some(refresh_token) = self.auth.refresh_token().map(str::to_owned) else {
            return Err(WoltError::Request(
                "no refresh token stored; run `wolt auth set --refresh-token ...`".into(),
            ));
        };
        let rotated = self
            .gateway
            .refresh_access_token(ctx, &refresh_token, &self.auth)
            .await?;
        self.auth = self.store.store_rotation(&self.auth, &rotated)?;
        Ok(rotated)
    }
}
