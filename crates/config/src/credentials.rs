//! File-backed credential persistence.
//!
//! Credentials are stored as pretty-printed JSON so a user can edit them by
//! hand. A missing file is an empty credential set, not an error.

use std::path::{Path, PathBuf};
use wolt_types::{AuthContext, Result, TokenRefresh, WoltError};

use crate::schema::default_credentials_path;

/// Reads and writes an [`AuthContext`] at a fixed path.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new(default_credentials_path())
    }
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads stored credentials; returns an empty context if the file is absent.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Storage`] if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<AuthContext> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(AuthContext::default());
            }
            Err(e) => return Err(storage(&self.path, &e)),
        };
        if raw.trim().is_empty() {
            return Ok(AuthContext::default());
        }
        serde_json::from_str(&raw).map_err(|e| storage(&self.path, &e))
    }

    /// Writes credentials, creating the parent directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Storage`] on any filesystem failure.
    pub fn save(&self, auth: &AuthContext) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| storage(parent, &e))?;
        }
        let mut json = serde_json::to_string_pretty(auth)?;
        json.push('\n');
        std::fs::write(&self.path, json).map_err(|e| storage(&self.path, &e))?;
        restrict_permissions(&self.path)?;
        tracing::debug!(path = %self.path.display(), "credentials saved");
        Ok(())
    }

    /// Applies a token rotation to `current` and persists the result.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Storage`] if the file cannot be written.
    pub fn store_rotation(&self, current: &AuthContext, refresh: &TokenRefresh) -> Result<AuthContext> {
        let next = current.rotated(refresh);
        self.save(&next)?;
        Ok(next)
    }

    /// Removes the credential file. Missing files are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`WoltError::Storage`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage(&self.path, &e)),
        }
    }
}

fn storage(path: &Path, err: &dyn std::fmt::Display) -> WoltError {
    WoltError::Storage(format!("{}: {err}", path.display()))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| storage(path, &e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
