//! Configured OAuth2 providers and their fixed logo table.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::ToSchema;

use super::{serialize_secret, StorageError};

/// Provider families the login surface knows how to present.
///
/// Deserialization fails on anything else, so a typo in the storage file stops
/// startup instead of rendering a blank button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Github,
    Gitlab,
    Microsoft,
    Oidc,
}

impl ProviderKind {
    #[must_use]
    pub const fn logo(self) -> &'static str {
        match self {
            Self::Google => "/logos/google.svg",
            Self::Github => "/logos/github.svg",
            Self::Gitlab => "/logos/gitlab.svg",
            Self::Microsoft => "/logos/microsoft.svg",
            Self::Oidc => "/logos/openid.svg",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Provider {
    pub id: String,
    pub name: String,
    pub kind: ProviderKind,
    pub authorization_uri: String,
    pub client_id: String,
    #[serde(serialize_with = "serialize_secret")]
    pub client_secret: SecretString,
    #[serde(default)]
    pub scope: String,
}

impl OAuth2Provider {
    pub(super) fn validate(&self) -> Result<(), StorageError> {
        let invalid = |reason: &str| StorageError::InvalidProvider {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(invalid("empty id"));
        }
        if self.name.trim().is_empty() {
            return Err(invalid("empty name"));
        }
        if self.client_id.trim().is_empty() {
            return Err(invalid("empty client_id"));
        }
        let url = Url::parse(&self.authorization_uri)
            .map_err(|err| invalid(&format!("invalid authorization_uri: {err}")))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(invalid("authorization_uri must be http(s)"));
        }
        Ok(())
    }

    /// What the login surface may show about this provider.
    #[must_use]
    pub fn view(&self) -> ProviderView {
        ProviderView {
            id: self.id.clone(),
            name: self.name.clone(),
            logo: self.kind.logo().to_string(),
        }
    }
}

/// Public, secret-free projection of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProviderView {
    pub id: String,
    pub name: String,
    pub logo: String,
}
