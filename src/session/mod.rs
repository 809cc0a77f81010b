//! Stateless sessions: the signed token is the only session state a browser carries.

mod identity;
mod keys;
mod token;

pub use identity::{IdType, Identity, IdentityError};
pub use keys::{
    Jwk, Jwks, Keyset, KeysetError, PublicKey, PublicKeySet, SigningKey, DEFAULT_KEY_BITS,
};
pub use token::{
    decode, encode, EncodeError, Session, SessionClaims, SessionHeader, TokenError, TOKEN_VERSION,
};

#[cfg(test)]
pub(crate) use keys::tests as test_keys;
