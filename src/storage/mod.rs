//! Storage: where the broker's signing keys and login configuration come from.
//!
//! The broker core only reads through the [`Storage`] trait. [`MemoryStorage`]
//! keeps one immutable [`Settings`] snapshot behind a lock; the single writer
//! (startup, reload, rotation) swaps the whole snapshot, readers clone the `Arc`.

mod file;
mod provider;

pub use file::{SmtpConfig, StorageFile, StoredSigningKey};
pub use provider::{OAuth2Provider, ProviderKind, ProviderView};

use crate::session::{Keyset, KeysetError, PublicKeySet, SigningKey};
use secrecy::{ExposeSecret, SecretString};
use serde::Serializer;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid storage json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid root uri: {0}")]
    InvalidRootUri(String),
    #[error("invalid oauth2 provider {id}: {reason}")]
    InvalidProvider { id: String, reason: String },
    #[error("duplicate oauth2 provider id: {0}")]
    DuplicateProvider(String),
    #[error("signing keys: {0}")]
    Keyset(#[from] KeysetError),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Read-mostly view of the broker configuration, safe for concurrent readers.
pub trait Storage: Send + Sync {
    /// A consistent snapshot of the signing configuration.
    fn keyset(&self) -> Arc<Keyset>;

    fn current_signing_key(&self) -> SigningKey {
        self.keyset().current().clone()
    }

    fn published_public_keys(&self) -> PublicKeySet {
        self.keyset().published().clone()
    }

    /// Broker origin without a trailing slash; also the session token audience.
    fn root_uri(&self) -> String;

    fn display_name(&self) -> String;

    /// # Errors
    ///
    /// Returns an error when the provider list cannot be read right now.
    fn configured_providers(&self) -> Result<Vec<OAuth2Provider>, StorageError>;

    fn has_email_delivery(&self) -> bool;
}

/// Validated configuration; built once per load and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    pub root_uri: String,
    pub display_name: String,
    pub smtp: Option<SmtpConfig>,
    pub providers: Vec<OAuth2Provider>,
    pub keyset: Arc<Keyset>,
}

impl Settings {
    /// Minimal settings: a root URI and a keyset, no email, no providers.
    ///
    /// # Errors
    ///
    /// Returns an error if `root_uri` is not an absolute http(s) URL.
    pub fn new(root_uri: &str, keyset: Keyset) -> Result<Self, StorageError> {
        Ok(Self {
            root_uri: file::validate_root_uri(root_uri)?,
            display_name: String::new(),
            smtp: None,
            providers: Vec::new(),
            keyset: Arc::new(keyset),
        })
    }

    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    #[must_use]
    pub fn with_smtp(mut self, smtp: SmtpConfig) -> Self {
        self.smtp = Some(smtp);
        self
    }

    #[must_use]
    pub fn with_providers(mut self, providers: Vec<OAuth2Provider>) -> Self {
        self.providers = providers;
        self
    }
}

#[derive(Debug)]
pub struct MemoryStorage {
    settings: RwLock<Arc<Settings>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: RwLock::new(Arc::new(settings)),
        }
    }

    /// Load and validate a storage file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or any part of it is invalid.
    pub fn from_file(path: &Path) -> Result<Self, StorageError> {
        Ok(Self::new(StorageFile::load(path)?.into_settings()?))
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Settings> {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in new settings. In-flight requests keep the snapshot they started with.
    pub fn replace(&self, settings: Settings) {
        let settings = Arc::new(settings);
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    /// Replace only the keyset, keeping the rest of the configuration.
    pub fn replace_keyset(&self, keyset: Keyset) {
        let mut next = (*self.snapshot()).clone();
        next.keyset = Arc::new(keyset);
        self.replace(next);
    }

    /// Re-read `path`; on any error the current snapshot stays in place.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error.
    pub fn reload(&self, path: &Path) -> Result<(), StorageError> {
        let settings = StorageFile::load(path)?.into_settings()?;
        info!(
            path = %path.display(),
            current_kid = settings.keyset.current().kid(),
            published = settings.keyset.published().len(),
            "storage reloaded"
        );
        self.replace(settings);
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn keyset(&self) -> Arc<Keyset> {
        self.snapshot().keyset.clone()
    }

    fn root_uri(&self) -> String {
        self.snapshot().root_uri.clone()
    }

    fn display_name(&self) -> String {
        self.snapshot().display_name.clone()
    }

    fn configured_providers(&self) -> Result<Vec<OAuth2Provider>, StorageError> {
        Ok(self.snapshot().providers.clone())
    }

    fn has_email_delivery(&self) -> bool {
        self.snapshot().smtp.is_some()
    }
}

pub(crate) fn serialize_secret<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
