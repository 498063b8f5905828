//! Startup wiring.
//!
//! Builds the process-wide shared context: one store pool, one cache
//! client, one `AuthService`, reused by every request task for the life
//! of the process.

use std::sync::Arc;

use anyhow::Context;

use gatekey_auth::AuthService;
use gatekey_auth_postgres::{PostgresCredentialStore, connect, ensure_schema, ping};
use gatekey_cache::create_cache_backend;

use crate::config::AppConfig;
use crate::server::AppState;

/// Connect the collaborators and assemble the application state.
///
/// The store must be reachable at startup; the cache degrades to local
/// mode on its own and never blocks boot.
///
/// # Errors
///
/// Returns an error if the PostgreSQL pool cannot be created, the
/// startup ping fails, or schema initialization fails.
pub async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let pool = connect(&config.storage.postgres)
        .await
        .context("connecting to PostgreSQL")?;
    ping(&pool).await.context("PostgreSQL startup ping")?;
    ensure_schema(&pool, config.auth.case_insensitive_usernames)
        .await
        .context("initializing users schema")?;
    tracing::info!(
        database = %config.storage.postgres.database,
        pool_size = config.storage.postgres.pool_size,
        "Connected to PostgreSQL"
    );
    let pool = Arc::new(pool);

    let cache = create_cache_backend(&config.redis).await;

    let store = PostgresCredentialStore::new(
        Arc::clone(&pool),
        config.auth.case_insensitive_usernames,
    );
    let auth = AuthService::new(
        Arc::new(store),
        Arc::new(cache.clone()),
        config.auth.clone(),
    );

    Ok(AppState {
        auth: Arc::new(auth),
        pool: Some(pool),
        cache,
    })
}
