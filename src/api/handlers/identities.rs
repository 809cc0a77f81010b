//! Identity resolution: session cookie in, ordered identities out.

use axum::http::HeaderMap;
use tracing::debug;

use super::cookies::read_session_token;
use crate::session::{self, Identity, Keyset, Session, TokenError};
use crate::storage::Storage;

/// Decode the request's session cookie against one keyset snapshot.
///
/// # Errors
///
/// Returns the routine `TokenError` that makes the request anonymous.
pub fn decode_session(
    headers: &HeaderMap,
    storage: &dyn Storage,
    now_unix_seconds: i64,
) -> Result<Session, TokenError> {
    let keyset = storage.keyset();
    decode_session_with(headers, &keyset, &storage.root_uri(), now_unix_seconds)
}

/// Like [`decode_session`], for callers that already hold a keyset snapshot.
///
/// # Errors
///
/// Returns the routine `TokenError` that makes the request anonymous.
pub fn decode_session_with(
    headers: &HeaderMap,
    keyset: &Keyset,
    audience: &str,
    now_unix_seconds: i64,
) -> Result<Session, TokenError> {
    let token = read_session_token(headers);
    session::decode(
        token.as_deref(),
        keyset.published(),
        audience,
        now_unix_seconds,
    )
}

/// Identities of the browser, oldest first. Any token problem yields an empty list.
pub fn resolve(headers: &HeaderMap, storage: &dyn Storage, now_unix_seconds: i64) -> Vec<Identity> {
    match decode_session(headers, storage, now_unix_seconds) {
        Ok(session) => session.identities,
        Err(TokenError::MissingToken) => Vec::new(),
        Err(err) => {
            debug!("session token rejected: {err}");
            Vec::new()
        }
    }
}
