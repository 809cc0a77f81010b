//! # authgate (identity broker)
//!
//! `authgate` answers one question for the services behind it: which identities has
//! this browser proven? The answer lives entirely in a signed session cookie.
//!
//! ## Sessions
//!
//! A session is a compact RS256 token carrying an ordered list of identities
//! (oldest first), an audience and an expiry. There is no server-side session
//! store; logging out clears the cookie. Tokens are verified against every
//! published key, so a rotated-out key keeps validating until it is retired.
//!
//! ## Forward-auth
//!
//! Reverse proxies call `GET /validate`. Authenticated requests get `200` with
//! `Remote-Id-Type` and `Remote-Id` for the primary identity; everyone else gets a
//! `307` into the broker's authorization entry point. Token errors never become 5xx.
//!
//! ## Storage
//!
//! Configuration and signing keys come from a JSON storage file, held in memory as
//! one immutable snapshot and swapped atomically on reload (`SIGHUP`) or rotation.

pub mod api;
pub mod cli;
pub mod session;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
