//! Collaborator contracts consumed by the flows.
//!
//! Defines the credential store and lookup cache interfaces plus the
//! record types that cross them. Implementations live in backend crates.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthResult;

// =============================================================================
// Types
// =============================================================================

/// A user record as held by the credential store.
///
/// Records are created by registration and never mutated or deleted
/// afterwards; the store is the source of truth for them.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Store-assigned unique identifier.
    pub id: Uuid,
    /// Unique username, immutable after creation.
    pub username: String,
    /// PHC-formatted password hash.
    pub password_hash: String,
    /// When the record was created.
    pub created_at: OffsetDateTime,
}

/// The snapshot of a user record that gets cached.
///
/// Exactly the fields password verification needs; serialized as JSON
/// bytes under the username-derived cache key. While live, a snapshot may
/// be stale relative to the store only if the record changed after it was
/// written, which cannot happen without an update path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedCredentials {
    /// Store-assigned unique identifier.
    pub id: Uuid,
    /// The username the snapshot was taken for.
    pub username: String,
    /// PHC-formatted password hash.
    pub password_hash: String,
}

impl CachedCredentials {
    /// Serialize the snapshot to cache bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Deserialize a snapshot from cache bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid snapshot. Callers
    /// treat this as corruption, not as a miss.
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

impl From<&UserRecord> for CachedCredentials {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            password_hash: record.password_hash.clone(),
        }
    }
}

// =============================================================================
// Credential Store Contract
// =============================================================================

/// Durable storage for user records.
///
/// The store is the sole arbiter of username uniqueness: `insert` must
/// enforce it at the storage layer, independent of any application-level
/// pre-check.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by username.
    ///
    /// Returns `None` if no record exists. Whether the comparison is
    /// case-sensitive is the implementation's collation choice; it must
    /// match the uniqueness constraint applied by `insert`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>>;

    /// Insert a new user record.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::UsernameTaken` if the username is already
    /// registered — including when a concurrent registration won the race
    /// after the caller's existence check passed. Returns a storage error
    /// if the insert fails for any other reason.
    async fn insert(&self, username: &str, password_hash: &str) -> AuthResult<UserRecord>;
}

// =============================================================================
// Lookup Cache Contract
// =============================================================================

/// A cache write failure.
///
/// Reads never produce errors (see [`LookupCache::get`]); writes report
/// failure so the caller can decide whether it is fatal. On the
/// authentication fallback path it is not.
#[derive(Debug, thiserror::Error)]
#[error("Cache write failed: {0}")]
pub struct CacheError(pub String);

/// Ephemeral key-value cache for credential snapshots.
///
/// The cache guarantees neither persistence nor exactly-once semantics.
/// Entries expire passively after their TTL; there is no delete.
#[async_trait]
pub trait LookupCache: Send + Sync {
    /// Get the value stored under `key`, if any.
    ///
    /// Absence is indistinguishable by design: an evicted entry, an
    /// expired entry, a key never written, and a backend read failure all
    /// return `None`. Backends log read failures before absorbing them.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store `value` under `key`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns a `CacheError` if the backend write fails.
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
}
