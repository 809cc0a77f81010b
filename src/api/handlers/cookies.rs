//! Session and return-destination cookies.
//!
//! Both cookies are `HttpOnly; SameSite=Lax; Path=/`, and `Secure` unless a trusted
//! proxy terminates TLS in front of the broker.

use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue,
};
use std::time::Duration;

use super::state::SessionConfig;

pub const SESSION_COOKIE_NAME: &str = "authgate_session";
pub const RETURN_URI_COOKIE_NAME: &str = "authgate_return_uri";
pub const RETURN_URI_TTL_SECONDS: u64 = 10 * 60;
pub const DEFAULT_RETURN_URI: &str = "/login";

fn build_cookie(
    config: &SessionConfig,
    name: &str,
    value: &str,
    max_age: u64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Cookie carrying a freshly signed session token.
pub fn session_cookie(
    config: &SessionConfig,
    token: &str,
    ttl: Duration,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, SESSION_COOKIE_NAME, token, ttl.as_secs())
}

/// Empty, already-expired session cookie. Clearing twice is the same as clearing once.
pub fn clear_session_cookie(config: &SessionConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, SESSION_COOKIE_NAME, "", 0)
}

pub fn return_uri_cookie(
    config: &SessionConfig,
    return_uri: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        config,
        RETURN_URI_COOKIE_NAME,
        &urlencoding::encode(return_uri),
        RETURN_URI_TTL_SECONDS,
    )
}

pub fn clear_return_uri_cookie(config: &SessionConfig) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(config, RETURN_URI_COOKIE_NAME, "", 0)
}

/// Value of the first cookie called `name`, across every `Cookie` header.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim().to_string())
        })
}

pub fn read_session_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, SESSION_COOKIE_NAME).filter(|token| !token.is_empty())
}

/// Where to resume after a login hop. Only local paths are honored.
pub fn read_return_uri(headers: &HeaderMap) -> Option<String> {
    let raw = read_cookie(headers, RETURN_URI_COOKIE_NAME)?;
    let decoded = urlencoding::decode(&raw).ok()?.into_owned();
    is_local_path(&decoded).then_some(decoded)
}

fn is_local_path(uri: &str) -> bool {
    uri.starts_with('/') && !uri.starts_with("//") && !uri.contains('\\')
}
