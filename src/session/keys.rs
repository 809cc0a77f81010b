//! Signing keys, the published JWKS, and rotation.
//!
//! A [`Keyset`] is an immutable snapshot: one current private key plus the public
//! keys still accepted for verification. Rotation and retirement build a new
//! snapshot instead of mutating, so a reader holding an `Arc<Keyset>` always sees
//! a current key that is also in its published set.

use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fmt};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_KEY_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum KeysetError {
    #[error("failed to parse RSA key")]
    KeyParse,
    #[error("failed to encode RSA key")]
    KeyEncode,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("rsa error")]
    Rsa(#[from] rsa::Error),
    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),
    #[error("duplicate key id: {0}")]
    DuplicateKid(String),
    #[error("unknown key id: {0}")]
    UnknownKid(String),
    #[error("the current signing key cannot be retired: {0}")]
    RetireCurrent(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub kid: String,
    pub n: String,
    pub e: String,
}

impl Jwk {
    #[must_use]
    pub fn from_rsa_public_key(public_key: &RsaPublicKey, kid: impl Into<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            kid: kid.into(),
            n: Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be()),
            e: Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be()),
        }
    }

    /// Convert this JWK to an `RsaPublicKey`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key type is not RSA, the base64url values cannot be
    /// decoded, or the modulus/exponent do not form a valid key.
    pub fn to_rsa_public_key(&self) -> Result<RsaPublicKey, KeysetError> {
        if self.kty != "RSA" {
            return Err(KeysetError::UnsupportedKeyType(self.kty.clone()));
        }
        let n_bytes = Base64UrlUnpadded::decode_vec(&self.n).map_err(|_| KeysetError::Base64)?;
        let e_bytes = Base64UrlUnpadded::decode_vec(&self.e).map_err(|_| KeysetError::Base64)?;
        let n = BigUint::from_bytes_be(&n_bytes);
        let e = BigUint::from_bytes_be(&e_bytes);
        Ok(RsaPublicKey::new(n, e)?)
    }
}

/// A private RSA key used to sign new session tokens.
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    key: RsaPrivateKey,
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Load a signing key from PKCS#8 or PKCS#1, PEM or DER.
    ///
    /// # Errors
    ///
    /// Returns `KeysetError::KeyParse` if the bytes are not an RSA private key.
    pub fn from_pem_or_der(pem_or_der: &[u8], kid: impl Into<String>) -> Result<Self, KeysetError> {
        Ok(Self {
            kid: kid.into(),
            key: decode_private_key(pem_or_der)?,
        })
    }

    /// Generate a fresh key with a time-ordered key id.
    ///
    /// # Errors
    ///
    /// Returns an error if RSA key generation fails.
    pub fn generate(bits: usize) -> Result<Self, KeysetError> {
        let key = RsaPrivateKey::new(&mut rand::rngs::OsRng, bits)?;
        Ok(Self {
            kid: Uuid::now_v7().to_string(),
            key,
        })
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }

    #[must_use]
    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.key)
    }

    #[must_use]
    pub fn public_jwk(&self) -> Jwk {
        Jwk::from_rsa_public_key(&self.public_key(), self.kid.clone())
    }

    /// Export the private key as PKCS#8 PEM for storage.
    ///
    /// # Errors
    ///
    /// Returns `KeysetError::KeyEncode` if the key cannot be serialized.
    pub fn to_pkcs8_pem(&self) -> Result<SecretString, KeysetError> {
        let pem = self
            .key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|_| KeysetError::KeyEncode)?;
        Ok(SecretString::from(pem.to_string()))
    }
}

/// A published verification key, kept both as its JWK and as a parsed RSA key.
#[derive(Debug, Clone)]
pub struct PublicKey {
    jwk: Jwk,
    key: RsaPublicKey,
}

impl PublicKey {
    /// # Errors
    ///
    /// Returns an error if the JWK is not a usable RSA key.
    pub fn from_jwk(jwk: Jwk) -> Result<Self, KeysetError> {
        let key = jwk.to_rsa_public_key()?;
        Ok(Self { jwk, key })
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.jwk.kid
    }

    #[must_use]
    pub fn jwk(&self) -> &Jwk {
        &self.jwk
    }

    pub(crate) fn rsa(&self) -> &RsaPublicKey {
        &self.key
    }
}

/// Every public key a token may currently be verified against.
#[derive(Debug, Clone, Default)]
pub struct PublicKeySet {
    keys: Vec<PublicKey>,
}

impl PublicKeySet {
    /// Parse every key of a JWKS, rejecting duplicate key ids.
    ///
    /// # Errors
    ///
    /// Returns an error if a key cannot be parsed or a `kid` repeats.
    pub fn from_jwks(jwks: &Jwks) -> Result<Self, KeysetError> {
        let mut keys = Vec::with_capacity(jwks.keys.len());
        let mut seen = HashSet::new();
        for jwk in &jwks.keys {
            if !seen.insert(jwk.kid.clone()) {
                return Err(KeysetError::DuplicateKid(jwk.kid.clone()));
            }
            keys.push(PublicKey::from_jwk(jwk.clone())?);
        }
        Ok(Self { keys })
    }

    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, PublicKey> {
        self.keys.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn contains(&self, kid: &str) -> bool {
        self.keys.iter().any(|k| k.kid() == kid)
    }

    #[must_use]
    pub fn to_jwks(&self) -> Jwks {
        Jwks {
            keys: self.keys.iter().map(|k| k.jwk.clone()).collect(),
        }
    }
}

/// One consistent view of the signing configuration.
#[derive(Debug, Clone)]
pub struct Keyset {
    current: SigningKey,
    published: PublicKeySet,
}

impl Keyset {
    /// Build a keyset from the current key and the public keys retained from
    /// earlier rotations. The current key is always published first.
    ///
    /// # Errors
    ///
    /// Returns an error if a retained key cannot be parsed or a `kid` repeats.
    pub fn new(current: SigningKey, retained: &[Jwk]) -> Result<Self, KeysetError> {
        let mut keys = Vec::with_capacity(retained.len() + 1);
        keys.push(current.public_jwk());
        keys.extend(retained.iter().cloned());
        let published = PublicKeySet::from_jwks(&Jwks { keys })?;
        Ok(Self { current, published })
    }

    #[must_use]
    pub fn current(&self) -> &SigningKey {
        &self.current
    }

    #[must_use]
    pub fn published(&self) -> &PublicKeySet {
        &self.published
    }

    /// Public keys other than the current one.
    #[must_use]
    pub fn retained(&self) -> Vec<Jwk> {
        self.published
            .iter()
            .filter(|k| k.kid() != self.current.kid())
            .map(|k| k.jwk().clone())
            .collect()
    }

    /// Make `next` the current key; the previous current key stays published.
    ///
    /// # Errors
    ///
    /// Returns `KeysetError::DuplicateKid` if `next` reuses a published `kid`.
    pub fn rotate(&self, next: SigningKey) -> Result<Self, KeysetError> {
        if self.published.contains(next.kid()) {
            return Err(KeysetError::DuplicateKid(next.kid().to_string()));
        }
        let mut retained = vec![self.current.public_jwk()];
        retained.extend(self.retained());
        Self::new(next, &retained)
    }

    /// Stop accepting tokens signed by `kid`.
    ///
    /// # Errors
    ///
    /// Returns an error if `kid` is the current key or is not published.
    pub fn retire(&self, kid: &str) -> Result<Self, KeysetError> {
        if kid == self.current.kid() {
            return Err(KeysetError::RetireCurrent(kid.to_string()));
        }
        if !self.published.contains(kid) {
            return Err(KeysetError::UnknownKid(kid.to_string()));
        }
        let retained: Vec<Jwk> = self
            .retained()
            .into_iter()
            .filter(|jwk| jwk.kid != kid)
            .collect();
        Self::new(self.current.clone(), &retained)
    }
}

fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, KeysetError> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let s = std::str::from_utf8(pem_or_der).map_err(|_| KeysetError::KeyParse)?;
        if let Ok(k) = RsaPrivateKey::from_pkcs8_pem(s) {
            return Ok(k);
        }
        if let Ok(k) = RsaPrivateKey::from_pkcs1_pem(s) {
            return Ok(k);
        }
        return Err(KeysetError::KeyParse);
    }

    if let Ok(k) = RsaPrivateKey::from_pkcs8_der(pem_or_der) {
        return Ok(k);
    }
    if let Ok(k) = RsaPrivateKey::from_pkcs1_der(pem_or_der) {
        return Ok(k);
    }
    Err(KeysetError::KeyParse)
}
