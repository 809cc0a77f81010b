//! Route handlers for the identity broker.
//!
//! Every handler reads the shared [`state::BrokerState`] from an `Extension` and
//! takes one keyset snapshot per request. The clock is read once, at the edge,
//! and passed down so the decision functions stay pure.

pub mod cookies;
pub mod health;
pub mod identities;
pub mod ip;
pub mod jwks;
pub mod login;
pub mod logout;
pub mod no_account;
pub mod state;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

use axum::http::HeaderName;
use std::time::{SystemTime, UNIX_EPOCH};

/// Login status hint for FedCM-aware browsers.
pub const SET_LOGIN: HeaderName = HeaderName::from_static("set-login");

/// Seconds since the Unix epoch; a clock before 1970 reads as 0.
pub fn now_unix_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0)
}
