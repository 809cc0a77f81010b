//! Compact RS256 session tokens.
//!
//! The token is the whole session: header, claims and signature, each base64url
//! without padding. Decoding is a pure function of the token, the published keys,
//! the expected audience and the clock value passed in.

use super::identity::Identity;
use super::keys::{PublicKeySet, SigningKey};
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1v15::{Signature, SigningKey as RsaSigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

pub const TOKEN_VERSION: u8 = 1;
const ALG: &str = "RS256";

/// Routine reasons a request is anonymous. None of these are server failures.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("no session token")]
    MissingToken,
    #[error("malformed session token")]
    MalformedToken,
    #[error("session token signature does not match any published key")]
    SignatureInvalid,
    #[error("session token expired")]
    Expired,
    #[error("session token issued for another audience")]
    AudienceMismatch,
}

/// Encoding only fails when signing itself fails, which means the key is unusable.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("session ttl out of range")]
    InvalidTtl,
    #[error("signing failed")]
    Signing(#[from] rsa::signature::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    pub v: u8,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
    pub identities: Vec<Identity>,
}

/// A verified session. Request-local; never shared between requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identities: Vec<Identity>,
    pub issued_at: i64,
    pub expires_at: i64,
    pub audience: String,
}

impl Session {
    /// The identity single-identity consumers (forward-auth) act on.
    #[must_use]
    pub fn primary(&self) -> Option<&Identity> {
        self.identities.first()
    }
}

impl From<SessionClaims> for Session {
    fn from(claims: SessionClaims) -> Self {
        Self {
            identities: claims.identities,
            issued_at: claims.iat,
            expires_at: claims.exp,
            audience: claims.aud,
        }
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::MalformedToken)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::MalformedToken)
}

/// Sign a new session token carrying `identities` in the given order.
///
/// # Errors
///
/// Returns an error if the ttl does not fit the claim range or signing fails.
pub fn encode(
    identities: &[Identity],
    audience: &str,
    ttl: Duration,
    key: &SigningKey,
    now_unix_seconds: i64,
) -> Result<String, EncodeError> {
    let ttl_seconds = i64::try_from(ttl.as_secs()).map_err(|_| EncodeError::InvalidTtl)?;
    let exp = now_unix_seconds
        .checked_add(ttl_seconds)
        .ok_or(EncodeError::InvalidTtl)?;

    let header = SessionHeader {
        alg: ALG.to_string(),
        typ: "JWT".to_string(),
        kid: key.kid().to_string(),
    };
    let claims = SessionClaims {
        v: TOKEN_VERSION,
        aud: audience.to_string(),
        iat: now_unix_seconds,
        exp,
        identities: identities.to_vec(),
    };

    let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(&claims)?);
    let signing_key = RsaSigningKey::<Sha256>::new(key.private_key().clone());
    let signature: Signature = signing_key.try_sign(signing_input.as_bytes())?;
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Verify a session token and return the session it carries.
///
/// Expiry is checked before the signature: an expired token is `Expired` whatever
/// its signature. The signature is tried against every published key.
///
/// # Errors
///
/// Returns the `TokenError` describing why the request must be treated as anonymous.
pub fn decode(
    token: Option<&str>,
    keys: &PublicKeySet,
    expected_audience: &str,
    now_unix_seconds: i64,
) -> Result<Session, TokenError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(TokenError::MissingToken)?;

    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(TokenError::MalformedToken)?;
    let claims_b64 = parts.next().ok_or(TokenError::MalformedToken)?;
    let sig_b64 = parts.next().ok_or(TokenError::MalformedToken)?;
    if parts.next().is_some() {
        return Err(TokenError::MalformedToken);
    }

    let header: SessionHeader = b64d_json(header_b64)?;
    if header.alg != ALG {
        return Err(TokenError::MalformedToken);
    }
    let claims: SessionClaims = b64d_json(claims_b64)?;
    if claims.v != TOKEN_VERSION {
        return Err(TokenError::MalformedToken);
    }
    let signature_bytes =
        Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::MalformedToken)?;

    if claims.exp <= now_unix_seconds {
        return Err(TokenError::Expired);
    }

    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| TokenError::SignatureInvalid)?;
    let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
    let verified = keys.iter().any(|key| {
        VerifyingKey::<Sha256>::new(key.rsa().clone())
            .verify(signing_input.as_bytes(), &signature)
            .is_ok()
    });
    if !verified {
        return Err(TokenError::SignatureInvalid);
    }

    if claims.aud != expected_audience {
        return Err(TokenError::AudienceMismatch);
    }

    Ok(claims.into())
}
