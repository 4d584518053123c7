//! Ephemeral url -> token cache for in-flight outbound handshakes.
//!
//! The initiating side stores the key it is about to send to a peer; when the
//! peer calls back to validate that key, the inbound path checks it here.
//! Nothing in this cache is persisted.

use std::time::Duration;

use moka::sync::Cache;
use tracing::debug;
use wor_core::{canonical_address, TokenCache};

/// Default lifetime of an issued token: long enough for one handshake round trip.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(300);

const MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
pub struct EphemeralTokenCache {
    /// Keyed by canonical partner url
    tokens: Cache<String, String>,
}

impl Default for EphemeralTokenCache {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_TTL)
    }
}

impl EphemeralTokenCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(MAX_ENTRIES)
                .build(),
        }
    }

    fn key(url: &str) -> String {
        canonical_address(url)
    }
}

impl TokenCache for EphemeralTokenCache {
    fn put(&self, url: &str, token: &str) {
        debug!(url = %url, "Issued handshake token");
        self.tokens.insert(Self::key(url), token.to_string());
    }

    fn get(&self, url: &str) -> Option<String> {
        self.tokens.get(&Self::key(url))
    }

    fn remove(&self, url: &str) {
        self.tokens.invalidate(&Self::key(url));
    }
}
