//! Credential resolution for remote sources.
//!
//! Credentials are looked up in a fixed order: the local credentials file
//! first, then the secret store. The first one found wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracker_core::settings::SECRET_ENV_VAR;
use tracker_core::{Result, TrackerError};

/// Service-account key as written by the spreadsheet provider.
///
/// Only the fields the tracker reads are modelled; the rest of the key file
/// is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub client_email: Option<String>,
    /// Pre-minted token sent as a bearer token with remote fetches.
    #[serde(default, alias = "token")]
    pub access_token: Option<String>,
}

/// Where a credential was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOrigin {
    LocalFile(PathBuf),
    SecretStore(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub key: ServiceAccountKey,
    pub origin: CredentialOrigin,
}

impl ResolvedCredentials {
    pub fn bearer_token(&self) -> Option<&str> {
        self.key
            .access_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
    }
}

// ── Secret stores ─────────────────────────────────────────────────────────────

/// A place holding the credential JSON when no local file exists.
pub trait SecretStore: Send + Sync {
    /// Name shown in errors and logs.
    fn name(&self) -> &str;

    /// The stored credential JSON, if any.
    fn fetch(&self) -> Option<String>;
}

/// Secret store backed by an environment variable.
#[derive(Debug, Clone)]
pub struct EnvSecretStore {
    var: String,
}

impl EnvSecretStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvSecretStore {
    fn default() -> Self {
        Self::new(SECRET_ENV_VAR)
    }
}

impl SecretStore for EnvSecretStore {
    fn name(&self) -> &str {
        &self.var
    }

    fn fetch(&self) -> Option<String> {
        std::env::var(&self.var).ok().filter(|v| !v.trim().is_empty())
    }
}

// ── Resolution ────────────────────────────────────────────────────────────────

/// Resolve credentials: `local_path` first, `store` second.
///
/// A credential that exists but does not parse is an error rather than a
/// reason to fall through to the next location.
pub fn resolve_credentials(local_path: &Path, store: &dyn SecretStore) -> Result<ResolvedCredentials> {
    if local_path.is_file() {
        let content = std::fs::read_to_string(local_path).map_err(|source| TrackerError::FileRead {
            path: local_path.to_path_buf(),
            source,
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&content)?;
        tracing::debug!("using credentials from {}", local_path.display());
        return Ok(ResolvedCredentials {
            key,
            origin: CredentialOrigin::LocalFile(local_path.to_path_buf()),
        });
    }

    if let Some(raw) = store.fetch() {
        let key: ServiceAccountKey = serde_json::from_str(&raw)?;
        tracing::debug!("using credentials from secret store ${}", store.name());
        return Ok(ResolvedCredentials {
            key,
            origin: CredentialOrigin::SecretStore(store.name().to_string()),
        });
    }

    Err(TrackerError::CredentialsNotFound {
        path: local_path.to_path_buf(),
        env_var: store.name().to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
