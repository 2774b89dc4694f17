//! Credential storage backends
//!
//! Holds the bearer token (and optional refresh token) between calls.
//! Stores do no validation; expiry is the caller's concern.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;

/// A stored bearer token with its optional refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            refresh_token: None,
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }
}

/// Shared get/set/clear access to the current credential
///
/// Writes are visible to every holder of the same store immediately.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Option<Credential>;

    fn set(&self, credential: Credential) -> Result<(), CredentialError>;

    fn clear(&self) -> Result<(), CredentialError>;
}

/// In-process store, lost on exit
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: RwLock::new(Some(credential)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Option<Credential> {
        self.inner.read().ok().and_then(|c| c.clone())
    }

    fn set(&self, credential: Credential) -> Result<(), CredentialError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|e| CredentialError::Lock(e.to_string()))?;
        *guard = Some(credential);
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|e| CredentialError::Lock(e.to_string()))?;
        *guard = None;
        Ok(())
    }
}

/// JSON file store, shared by every process using the same path
///
/// The file is re-read on every `get` so a login in one process is seen
/// by another.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Credential>, CredentialError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Replace the file contents, readable by the owner only on Unix
    #[cfg(unix)]
    fn write(&self, content: &str) -> std::io::Result<()> {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(&self.path)?;
        // `mode` only applies on creation
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        file.write_all(content.as_bytes())
    }

    #[cfg(not(unix))]
    fn write(&self, content: &str) -> std::io::Result<()> {
        std::fs::write(&self.path, content)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Option<Credential> {
        match self.read() {
            Ok(credential) => credential,
            Err(e) => {
                tracing::warn!(path = ?self.path, error = %e, "Unreadable credential file");
                None
            }
        }
    }

    fn set(&self, credential: Credential) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&credential)?;
        self.write(&content)?;

        tracing::debug!(path = ?self.path, "Credential stored");
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = ?self.path, "Credential cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Errors that can occur when persisting credentials
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    Lock(String),
}
