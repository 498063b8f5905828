//! Flow configuration.

use std::borrow::Cow;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the authentication and registration flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Lifetime of cached credential snapshots, in seconds.
    ///
    /// Bounds staleness without any invalidation plumbing. Default: 300.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Prefix prepended to the username to form the cache key.
    /// Default: "user:".
    #[serde(default = "default_cache_key_prefix")]
    pub cache_key_prefix: String,

    /// Treat usernames as case-insensitive.
    ///
    /// Governs both the cache-key normalization here and the store's
    /// comparison/uniqueness expression, so the two cannot disagree.
    /// Default: false (byte-exact matching).
    #[serde(default)]
    pub case_insensitive_usernames: bool,
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_key_prefix() -> String {
    "user:".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_key_prefix: default_cache_key_prefix(),
            case_insensitive_usernames: false,
        }
    }
}

impl AuthConfig {
    /// Cache entry TTL as a `Duration`.
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Normalize a username according to the configured collation.
    #[must_use]
    pub fn normalize_username<'a>(&self, username: &'a str) -> Cow<'a, str> {
        if self.case_insensitive_usernames {
            Cow::Owned(username.to_lowercase())
        } else {
            Cow::Borrowed(username)
        }
    }

    /// Compute the cache key for a username.
    ///
    /// Deterministic: prefix + collation-normalized username.
    #[must_use]
    pub fn cache_key(&self, username: &str) -> String {
        format!("{}{}", self.cache_key_prefix, self.normalize_username(username))
    }
}
