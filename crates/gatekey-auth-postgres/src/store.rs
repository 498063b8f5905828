//! Credential store implementation.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use gatekey_auth::{AuthError, AuthResult, CredentialStore, UserRecord};

use crate::PgPool;

/// PostgreSQL-backed credential store.
///
/// The collation flag must match the unique index created by
/// [`crate::ensure_schema`]; both are wired from the same configuration
/// value at startup.
pub struct PostgresCredentialStore {
    pool: Arc<PgPool>,
    case_insensitive: bool,
}

impl PostgresCredentialStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>, case_insensitive: bool) -> Self {
        Self {
            pool,
            case_insensitive,
        }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn lookup_sql(&self) -> &'static str {
        if self.case_insensitive {
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE lower(username) = lower($1)
            LIMIT 1
            "#
        } else {
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            LIMIT 1
            "#
        }
    }
}

/// Database row shape for a user record.
type UserRow = (Uuid, String, String, OffsetDateTime);

fn record_from_row(row: UserRow) -> UserRecord {
    UserRecord {
        id: row.0,
        username: row.1,
        password_hash: row.2,
        created_at: row.3,
    }
}

fn store_error(err: sqlx_core::Error) -> AuthError {
    AuthError::store(err.to_string())
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<UserRecord>> {
        let row: Option<UserRow> = query_as(self.lookup_sql())
            .bind(username)
            .fetch_optional(self.pool.as_ref())
            .await
            .map_err(store_error)?;

        Ok(row.map(record_from_row))
    }

    async fn insert(&self, username: &str, password_hash: &str) -> AuthResult<UserRecord> {
        let row: UserRow = query_as(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(self.pool.as_ref())
        .await
        .map_err(|e| {
            // The unique index is the arbiter: a racing registration that
            // slipped past the flow's pre-check lands here.
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return AuthError::username_taken(username);
            }
            store_error(e)
        })?;

        Ok(record_from_row(row))
    }
}
