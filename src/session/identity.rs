//! Normalized identities carried inside a session token.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity id is empty")]
    EmptyId,
    #[error("identity id contains control characters")]
    ControlCharacters,
    #[error("invalid email identity: {0}")]
    InvalidEmail(String),
    #[error("invalid identity type: {0:?}")]
    InvalidType(String),
}

/// Kind of login method an identity came from.
///
/// Unknown tags survive as `Other` so tokens minted by a newer login method
/// still resolve; the tag itself is validated on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum IdType {
    Email,
    OAuth2,
    FedCm,
    Other(String),
}

impl IdType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::OAuth2 => "oauth2",
            Self::FedCm => "fedcm",
            Self::Other(tag) => tag,
        }
    }

    /// Parse a tag, accepting known kinds and well-formed extension tags.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidType` when the tag is empty or contains anything
    /// other than `[a-z0-9_-]`.
    pub fn parse(tag: &str) -> Result<Self, IdentityError> {
        match tag {
            "email" => Ok(Self::Email),
            "oauth2" => Ok(Self::OAuth2),
            "fedcm" => Ok(Self::FedCm),
            other if valid_extension_tag(other) => Ok(Self::Other(other.to_string())),
            other => Err(IdentityError::InvalidType(other.to_string())),
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for IdType {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<IdType> for String {
    fn from(value: IdType) -> Self {
        match value {
            IdType::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

fn valid_extension_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

pub(crate) fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

/// One authenticated fact about a browser: which method, and who upstream says it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(try_from = "RawIdentity")]
pub struct Identity {
    #[schema(value_type = String, example = "email")]
    id_type: IdType,
    id: String,
}

#[derive(Deserialize)]
struct RawIdentity {
    id_type: IdType,
    id: String,
}

impl TryFrom<RawIdentity> for Identity {
    type Error = IdentityError;

    fn try_from(raw: RawIdentity) -> Result<Self, Self::Error> {
        Self::new(raw.id_type, raw.id)
    }
}

impl Identity {
    /// Build a validated identity.
    ///
    /// The id must be non-empty and free of control characters so it can always be
    /// emitted as an HTTP header value. Email identities must look like an address.
    ///
    /// # Errors
    ///
    /// Returns an `IdentityError` describing the first failed check.
    pub fn new(id_type: IdType, id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentityError::EmptyId);
        }
        if id.chars().any(char::is_control) {
            return Err(IdentityError::ControlCharacters);
        }
        if id_type == IdType::Email && !valid_email(&id) {
            return Err(IdentityError::InvalidEmail(id));
        }
        Ok(Self { id_type, id })
    }

    /// Shorthand for an email identity.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::InvalidEmail` if `email` is not an address.
    pub fn email(email: impl Into<String>) -> Result<Self, IdentityError> {
        Self::new(IdType::Email, email)
    }

    #[must_use]
    pub fn id_type(&self) -> &IdType {
        &self.id_type
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}
