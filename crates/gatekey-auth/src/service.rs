//! The authentication and registration flows.
//!
//! Authentication reads cache-aside: probe the lookup cache, fall back to
//! the credential store on a miss, repopulate the cache with a bounded
//! TTL, then verify the password. Registrations are rare relative to
//! logins, which is why the cache is populated on the read path only.

use std::sync::Arc;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::password;
use crate::store::{CachedCredentials, CredentialStore, LookupCache, UserRecord};

// =============================================================================
// Cache Probe
// =============================================================================

/// Outcome of probing the lookup cache for a credential snapshot.
///
/// A tagged result instead of nested conditionals: the three outcomes
/// have three different continuations and none may fall through into
/// another silently.
enum CacheProbe {
    /// A live entry deserialized cleanly.
    Hit(CachedCredentials),
    /// Key absent, expired, evicted, or the backend read failed.
    Miss,
    /// An entry was present but would not deserialize.
    Corrupt(serde_json::Error),
}

// =============================================================================
// Auth Service
// =============================================================================

/// Orchestrates the credential flows against a store and a cache.
///
/// Holds the process-wide shared collaborators; cheap to clone via the
/// inner `Arc`s and safe to use from concurrent request tasks without
/// locking. Concurrent authentications for the same username may both
/// miss and both write the cache; the entries are idempotent snapshots of
/// the same row, so last-writer-wins is fine.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn LookupCache>,
    config: AuthConfig,
}

impl AuthService {
    /// Create a service over the given collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn LookupCache>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
        }
    }

    /// The flow configuration in effect.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Authentication
    // -------------------------------------------------------------------------

    /// Check whether `username` and `password` match a known record.
    ///
    /// Returns only a success indicator; the password hash never leaves
    /// the flow.
    ///
    /// # Errors
    ///
    /// - `MissingCredential` if either input is empty (checked before any
    ///   store or cache access)
    /// - `InvalidCredentials` for an unknown username or a wrong password,
    ///   indistinguishably
    /// - `CacheCorruption` if a cache entry exists but will not
    ///   deserialize
    /// - `StoreUnavailable` / `HashingUnavailable` for collaborator
    ///   failures that abort the flow
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<()> {
        require_present("username", username)?;
        require_present("password", password)?;

        let key = self.config.cache_key(username);

        let credentials = match self.probe_cache(&key).await {
            CacheProbe::Hit(snapshot) => {
                tracing::debug!(key = %key, "credentials resolved from cache");
                snapshot
            }
            CacheProbe::Corrupt(err) => {
                tracing::error!(key = %key, error = %err, error.kind = "cache_corruption",
                    "cache entry failed to deserialize");
                return Err(AuthError::cache_corruption(err.to_string()));
            }
            CacheProbe::Miss => {
                let Some(record) = self.store.find_by_username(username).await? else {
                    return Err(AuthError::InvalidCredentials);
                };
                let snapshot = CachedCredentials::from(&record);
                self.populate_cache(&key, &snapshot).await;
                snapshot
            }
        };

        if self.verify(password, &credentials.password_hash).await? {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Probe the cache for a snapshot under `key`.
    async fn probe_cache(&self, key: &str) -> CacheProbe {
        match self.cache.get(key).await {
            Some(bytes) => match CachedCredentials::from_bytes(&bytes) {
                Ok(snapshot) => CacheProbe::Hit(snapshot),
                Err(err) => CacheProbe::Corrupt(err),
            },
            None => CacheProbe::Miss,
        }
    }

    /// Write a snapshot to the cache, best-effort.
    ///
    /// A failed write must not abort the authentication that triggered
    /// it: the flow proceeds with the store-sourced record either way.
    async fn populate_cache(&self, key: &str, snapshot: &CachedCredentials) {
        let bytes = match snapshot.to_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "failed to serialize cache snapshot");
                return;
            }
        };
        match self
            .cache
            .set_with_ttl(key, bytes, self.config.cache_ttl())
            .await
        {
            Ok(()) => {
                tracing::debug!(key = %key, ttl_secs = self.config.cache_ttl_secs, "cache populated");
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "cache write failed, continuing with store record");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Registration
    // -------------------------------------------------------------------------

    /// Create a new user record if the username is free.
    ///
    /// The existence check and the insert are deliberately not one
    /// transaction: two concurrent registrations can both pass the check,
    /// and the store's uniqueness constraint is the backstop that turns
    /// the losing insert into `UsernameTaken`.
    ///
    /// Does not touch the cache; snapshots are created on the
    /// authentication read path only.
    ///
    /// # Errors
    ///
    /// - `MissingCredential` if either input is empty
    /// - `UsernameTaken` if the username is already registered
    /// - `StoreUnavailable` / `HashingUnavailable` for collaborator
    ///   failures
    pub async fn register(&self, username: &str, password: &str) -> AuthResult<UserRecord> {
        require_present("username", username)?;
        require_present("password", password)?;

        if self.store.find_by_username(username).await?.is_some() {
            return Err(AuthError::username_taken(username));
        }

        let hash = self.hash(password).await?;
        let record = self.store.insert(username, &hash).await?;
        tracing::info!(username = %record.username, user_id = %record.id, "user registered");
        Ok(record)
    }

    // -------------------------------------------------------------------------
    // Hashing
    // -------------------------------------------------------------------------

    /// Hash a password on the blocking pool.
    async fn hash(&self, password: &str) -> AuthResult<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || password::hash_password(&password))
            .await
            .map_err(|err| AuthError::hashing(err.to_string()))?
            .map_err(|err| AuthError::hashing(err.to_string()))
    }

    /// Verify a password against a stored hash on the blocking pool.
    ///
    /// A mismatch is `Ok(false)`; only a malformed stored hash is an
    /// error.
    async fn verify(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let password = password.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
            .await
            .map_err(|err| AuthError::hashing(err.to_string()))?
            .map_err(|err| AuthError::hashing(err.to_string()))
    }
}

/// Reject empty input before any collaborator is touched.
fn require_present(field: &'static str, value: &str) -> AuthResult<()> {
    if value.is_empty() {
        return Err(AuthError::missing(field));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    use async_trait::async_trait;
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::store::CacheError;

    // ---- fakes ----

    /// In-memory credential store with a call counter on lookups.
    #[derive(Default)]
    struct MemoryStore {
        users: Mutex<Vec<UserRecord>>,
        find_calls: AtomicUsize,
    }

    impl MemoryStore {
        fn find_count(&self) -> usize {
            self.find_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialStore for MemoryStore {
        async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.username == username).cloned())
        }

        async fn insert(&self, username: &str, password_hash: &str) -> AuthResult<UserRecord> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.username == username) {
                return Err(AuthError::username_taken(username));
            }
            let record = UserRecord {
                id: Uuid::new_v4(),
                username: username.to_string(),
                password_hash: password_hash.to_string(),
                created_at: OffsetDateTime::now_utc(),
            };
            users.push(record.clone());
            Ok(record)
        }
    }

    /// Store where every insert loses a registration race: the existence
    /// check sees nothing, but the uniqueness constraint fires.
    struct RaceLostStore;

    #[async_trait]
    impl CredentialStore for RaceLostStore {
        async fn find_by_username(&self, _username: &str) -> AuthResult<Option<UserRecord>> {
            Ok(None)
        }

        async fn insert(&self, username: &str, _password_hash: &str) -> AuthResult<UserRecord> {
            Err(AuthError::username_taken(username))
        }
    }

    /// In-memory TTL cache with a call counter on reads.
    #[derive(Default)]
    struct MemoryCache {
        entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
        get_calls: AtomicUsize,
    }

    impl MemoryCache {
        fn get_count(&self) -> usize {
            self.get_calls.load(Ordering::SeqCst)
        }

        fn seed(&self, key: &str, bytes: Vec<u8>) {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (bytes, Instant::now() + Duration::from_secs(60)));
        }

        fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl LookupCache for MemoryCache {
        async fn get(&self, key: &str) -> Option<Vec<u8>> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let entries = self.entries.lock().unwrap();
            entries
                .get(key)
                .filter(|(_, expires_at)| *expires_at > Instant::now())
                .map(|(bytes, _)| bytes.clone())
        }

        async fn set_with_ttl(
            &self,
            key: &str,
            value: Vec<u8>,
            ttl: Duration,
        ) -> Result<(), CacheError> {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value, Instant::now() + ttl));
            Ok(())
        }
    }

    /// Cache that fails every read and every write.
    struct BrokenCache;

    #[async_trait]
    impl LookupCache for BrokenCache {
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            // Backend read failure is absorbed into absence
            None
        }

        async fn set_with_ttl(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError("connection refused".to_string()))
        }
    }

    fn service(store: Arc<dyn CredentialStore>, cache: Arc<dyn LookupCache>) -> AuthService {
        AuthService::new(store, cache, AuthConfig::default())
    }

    // ---- registration ----

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let svc = service(store.clone(), cache.clone());

        let record = svc.register("alice", "s3cret").await.unwrap();
        assert_eq!(record.username, "alice");
        assert_ne!(record.password_hash, "s3cret", "hash must not be the plaintext");

        svc.authenticate("alice", "s3cret").await.unwrap();
    }

    #[tokio::test]
    async fn test_register_does_not_touch_cache() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let svc = service(store.clone(), cache.clone());

        svc.register("alice", "s3cret").await.unwrap();
        assert_eq!(cache.get_count(), 0);
        assert!(!cache.contains("user:alice"));
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let svc = service(store.clone(), cache.clone());

        svc.register("alice", "s3cret").await.unwrap();
        let err = svc.register("alice", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken { .. }));

        // First record unaffected: the original password still works
        svc.authenticate("alice", "s3cret").await.unwrap();
        let err = svc.authenticate("alice", "other").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_race_lost_insert_surfaces_username_taken() {
        // Pre-check misses the concurrent registration; the store's
        // uniqueness constraint must still yield a distinguishable conflict.
        let svc = service(Arc::new(RaceLostStore), Arc::new(MemoryCache::default()));
        let err = svc.register("alice", "s3cret").await.unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken { .. }));
    }

    // ---- authentication ----

    #[tokio::test]
    async fn test_wrong_password_and_unknown_user_are_indistinguishable() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let svc = service(store.clone(), cache.clone());

        svc.register("alice", "s3cret").await.unwrap();

        let wrong_password = svc.authenticate("alice", "wrong").await.unwrap_err();
        let unknown_user = svc.authenticate("bob", "x").await.unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_cache_aside_miss_then_hit() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let svc = service(store.clone(), cache.clone());

        svc.register("alice", "s3cret").await.unwrap();
        let finds_after_register = store.find_count();

        // First authentication: cache miss, store queried, cache populated
        svc.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(store.find_count(), finds_after_register + 1);
        assert!(cache.contains("user:alice"));

        // Second authentication within the TTL: served from cache
        svc.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(store.find_count(), finds_after_register + 1, "store must not be re-queried");

        // A hit still verifies the password
        let err = svc.authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_ttl_expiry_requeries_and_repopulates() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let config = AuthConfig {
            cache_ttl_secs: 1,
            ..AuthConfig::default()
        };
        let svc = AuthService::new(store.clone(), cache.clone(), config);

        svc.register("alice", "s3cret").await.unwrap();
        svc.authenticate("alice", "s3cret").await.unwrap();
        let finds_after_first = store.find_count();

        tokio::time::sleep(Duration::from_millis(1200)).await;

        // Entry expired: the store is queried again and the cache refreshed
        svc.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(store.find_count(), finds_after_first + 1);

        // Refreshed entry serves the next authentication
        svc.authenticate("alice", "s3cret").await.unwrap();
        assert_eq!(store.find_count(), finds_after_first + 1);
    }

    #[tokio::test]
    async fn test_cache_failure_falls_back_to_store() {
        let store = Arc::new(MemoryStore::default());
        let svc = service(store.clone(), Arc::new(BrokenCache));

        svc.register("alice", "s3cret").await.unwrap();

        // Read fails (absorbed as a miss), write fails (swallowed); the
        // request is still decided correctly off the store alone.
        svc.authenticate("alice", "s3cret").await.unwrap();
        let err = svc.authenticate("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        let err = svc.authenticate("bob", "x").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_a_hard_error() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let svc = service(store.clone(), cache.clone());

        svc.register("alice", "s3cret").await.unwrap();
        let finds_after_register = store.find_count();

        cache.seed("user:alice", b"not a snapshot".to_vec());

        let err = svc.authenticate("alice", "s3cret").await.unwrap_err();
        assert!(matches!(err, AuthError::CacheCorruption { .. }));
        assert!(err.is_server_error());
        // Corruption must not silently fall through to the store
        assert_eq!(store.find_count(), finds_after_register);
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected_before_collaborators() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let svc = service(store.clone(), cache.clone());

        let err = svc.authenticate("", "s3cret").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential { field: "username" }));
        let err = svc.authenticate("alice", "").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential { field: "password" }));
        let err = svc.register("", "").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential { field: "username" }));

        assert_eq!(store.find_count(), 0);
        assert_eq!(cache.get_count(), 0);
    }

    #[tokio::test]
    async fn test_case_insensitive_collation_shares_cache_key() {
        let store = Arc::new(MemoryStore::default());
        let cache = Arc::new(MemoryCache::default());
        let config = AuthConfig {
            case_insensitive_usernames: true,
            ..AuthConfig::default()
        };
        let svc = AuthService::new(store.clone(), cache.clone(), config);

        svc.register("alice", "s3cret").await.unwrap();
        svc.authenticate("alice", "s3cret").await.unwrap();

        // Same key regardless of the caller's casing
        assert!(cache.contains("user:alice"));
        assert_eq!(svc.config().cache_key("ALICE"), "user:alice");
    }
}
