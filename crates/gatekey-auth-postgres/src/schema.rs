//! Schema initialization.
//!
//! The service owns a single table of user records. The table is created
//! at startup rather than via migration files; the unique index is the
//! storage-layer enforcement of username uniqueness that backstops the
//! registration flow's pre-check.

use sqlx_core::query::query;

use crate::PgPool;

/// Create the users table and its uniqueness index if absent.
///
/// The index expression follows the configured collation: byte-exact
/// usernames index `username` directly, case-insensitive ones index
/// `lower(username)`. Switching collation on an existing database
/// requires dropping the old index manually.
///
/// # Errors
///
/// Returns an error if a DDL statement fails.
pub async fn ensure_schema(pool: &PgPool, case_insensitive: bool) -> Result<(), sqlx_core::Error> {
    query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            username TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    let index_ddl = if case_insensitive {
        "CREATE UNIQUE INDEX IF NOT EXISTS users_username_lower_key ON users (lower(username))"
    } else {
        "CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (username)"
    };
    query(index_ddl).execute(pool).await?;

    tracing::debug!(case_insensitive, "users schema ensured");
    Ok(())
}
