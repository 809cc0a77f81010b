//! On-disk JSON layout of the broker's configuration and signing keys.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;
use url::Url;

use super::{serialize_secret, OAuth2Provider, Settings, StorageError};
use crate::session::{Jwk, Keyset, SigningKey};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub password: SecretString,
    pub sender: String,
    #[serde(default)]
    pub sender_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSigningKey {
    pub kid: String,
    #[serde(serialize_with = "serialize_secret")]
    pub private_key_pem: SecretString,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageFile {
    pub root_uri: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub oauth2_providers: Vec<OAuth2Provider>,
    pub signing_key: StoredSigningKey,
    #[serde(default)]
    pub retained_keys: Vec<Jwk>,
}

impl StorageFile {
    /// A new storage document with a freshly generated signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation or PEM export fails.
    pub fn generate(root_uri: &str, display_name: &str, bits: usize) -> Result<Self, StorageError> {
        Self::with_signing_key(root_uri, display_name, &SigningKey::generate(bits)?)
    }

    /// A new storage document around an existing signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be exported as PEM.
    pub fn with_signing_key(
        root_uri: &str,
        display_name: &str,
        key: &SigningKey,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            root_uri: root_uri.to_string(),
            display_name: display_name.to_string(),
            smtp: None,
            oauth2_providers: Vec::new(),
            signing_key: StoredSigningKey {
                kid: key.kid().to_string(),
                private_key_pem: key.to_pkcs8_pem()?,
            },
            retained_keys: Vec::new(),
        })
    }

    /// Read and parse a storage file. No validation beyond JSON shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let raw = fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file = serde_json::from_str(&raw)?;
        debug!(path = %path.display(), "loaded storage file");
        Ok(file)
    }

    /// Write the document, replacing `path` atomically via a sibling temp file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or any filesystem step fails.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(self)?;
        let tmp = tmp_path(path);
        let io_err = |source| StorageError::Io {
            path: tmp.clone(),
            source,
        };
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, path).map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }

    /// Parse the stored keys into a keyset snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the private key or any retained JWK is unusable.
    pub fn keyset(&self) -> Result<Keyset, StorageError> {
        let current = SigningKey::from_pem_or_der(
            self.signing_key.private_key_pem.expose_secret().as_bytes(),
            self.signing_key.kid.clone(),
        )?;
        Ok(Keyset::new(current, &self.retained_keys)?)
    }

    /// Store `keyset` back into this document.
    ///
    /// # Errors
    ///
    /// Returns an error if the current key cannot be exported.
    pub fn set_keyset(&mut self, keyset: &Keyset) -> Result<(), StorageError> {
        self.signing_key = StoredSigningKey {
            kid: keyset.current().kid().to_string(),
            private_key_pem: keyset.current().to_pkcs8_pem()?,
        };
        self.retained_keys = keyset.retained();
        Ok(())
    }

    /// Validate everything and build the in-memory settings.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found; callers treat it as fatal.
    pub fn into_settings(self) -> Result<Settings, StorageError> {
        let root_uri = validate_root_uri(&self.root_uri)?;
        let keyset = self.keyset()?;

        let mut ids = HashSet::new();
        for provider in &self.oauth2_providers {
            provider.validate()?;
            if !ids.insert(provider.id.clone()) {
                return Err(StorageError::DuplicateProvider(provider.id.clone()));
            }
        }

        Ok(Settings {
            root_uri,
            display_name: self.display_name,
            smtp: self.smtp,
            providers: self.oauth2_providers,
            keyset: Arc::new(keyset),
        })
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Root URIs are absolute http(s) origins, stored without a trailing slash.
pub(crate) fn validate_root_uri(root_uri: &str) -> Result<String, StorageError> {
    let parsed =
        Url::parse(root_uri).map_err(|err| StorageError::InvalidRootUri(format!("{root_uri}: {err}")))?;
    if !matches!(parsed.scheme(), "https" | "http") || parsed.host_str().is_none() {
        return Err(StorageError::InvalidRootUri(root_uri.to_string()));
    }
    Ok(root_uri.trim_end_matches('/').to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::session::test_keys::{signing_key, KEY_1_PEM, KEY_2_PEM};
    use anyhow::Result;
    use std::env;

    pub(crate) fn sample_file() -> StorageFile {
        StorageFile {
            root_uri: "https://auth.example.test/".to_string(),
            display_name: "Example".to_string(),
            smtp: None,
            oauth2_providers: Vec::new(),
            signing_key: StoredSigningKey {
                kid: "k1".to_string(),
                private_key_pem: SecretString::from(KEY_1_PEM.to_string()),
            },
            retained_keys: Vec::new(),
        }
    }

    fn scratch_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("authgate-{}-{name}.json", uuid::Uuid::new_v4()))
    }

    #[test]
    fn root_uri_is_normalized() -> Result<()> {
        let settings = sample_file().into_settings()?;
        assert_eq!(settings.root_uri, "https://auth.example.test");
        Ok(())
    }

    #[test]
    fn rejects_relative_root_uri() {
        let mut file = sample_file();
        file.root_uri = "auth.example.test".to_string();
        assert!(matches!(
            file.into_settings(),
            Err(StorageError::InvalidRootUri(_))
        ));
    }

    #[test]
    fn rejects_unusable_signing_key() {
        let mut file = sample_file();
        file.signing_key.private_key_pem = SecretString::from("garbage".to_string());
        assert!(matches!(
            file.into_settings(),
            Err(StorageError::Keyset(_))
        ));
    }

    #[test]
    fn rejects_duplicate_providers() -> Result<()> {
        let provider: OAuth2Provider = serde_json::from_str(
            r#"{"id":"g","name":"Google","kind":"google","authorization_uri":"https://accounts.google.com/o/oauth2/v2/auth","client_id":"c","client_secret":"s"}"#,
        )?;
        let mut file = sample_file();
        file.oauth2_providers = vec![provider.clone(), provider];
        assert!(matches!(
            file.into_settings(),
            Err(StorageError::DuplicateProvider(id)) if id == "g"
        ));
        Ok(())
    }

    #[test]
    fn save_and_load_preserve_keys() -> Result<()> {
        let path = scratch_path("roundtrip");
        let mut file = sample_file();
        let rotated = file.keyset()?.rotate(signing_key(KEY_2_PEM, "k2")?)?;
        file.set_keyset(&rotated)?;
        file.save(&path)?;

        let loaded = StorageFile::load(&path)?;
        let keyset = loaded.keyset()?;
        assert_eq!(keyset.current().kid(), "k2");
        assert!(keyset.published().contains("k1"));
        assert_eq!(loaded.retained_keys.len(), 1);

        fs::remove_file(&path)?;
        Ok(())
    }

    #[test]
    fn load_reports_missing_file() {
        let path = scratch_path("missing");
        assert!(matches!(
            StorageFile::load(&path),
            Err(StorageError::Io { .. })
        ));
    }
}
