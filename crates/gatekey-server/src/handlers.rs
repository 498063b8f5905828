//! HTTP handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use gatekey_auth::AuthError;

use crate::server::AppState;

// =============================================================================
// Error Mapping
// =============================================================================

/// Wraps flow errors with their HTTP representation.
///
/// Client errors keep a specific message; every internal failure becomes
/// the same generic body, with the real kind preserved in logs only.
pub struct ApiError(AuthError);

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, message) = match &err {
            AuthError::MissingCredential { field } => {
                (StatusCode::BAD_REQUEST, format!("{field} is required"))
            }
            AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "invalid credentials".to_string())
            }
            AuthError::UsernameTaken { .. } => {
                (StatusCode::CONFLICT, "username already taken".to_string())
            }
            AuthError::CacheCorruption { .. }
            | AuthError::StoreUnavailable { .. }
            | AuthError::HashingUnavailable { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        if err.is_server_error() {
            tracing::error!(error = %err, error.kind = err.kind(), "request failed");
        } else {
            tracing::debug!(error.kind = err.kind(), "request rejected");
        }

        (status, Json(json!({ "message": message }))).into_response()
    }
}

// =============================================================================
// Request Bodies
// =============================================================================

/// Credentials payload for both operations.
///
/// Fields are optional so absence maps to a 400 with a field name
/// instead of a serde rejection.
#[derive(Debug, Deserialize)]
pub struct CredentialsBody {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl CredentialsBody {
    /// Presence check only; emptiness is the flow's concern.
    fn require(self) -> Result<(String, String), ApiError> {
        let username = self
            .username
            .ok_or_else(|| ApiError(AuthError::missing("username")))?;
        let password = self
            .password
            .ok_or_else(|| ApiError(AuthError::missing("password")))?;
        Ok((username, password))
    }
}

// =============================================================================
// Service Endpoints
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "gatekey",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let store_ok = match state.pool.as_deref() {
        Some(pool) => gatekey_auth_postgres::ping(pool).await.is_ok(),
        None => true,
    };

    if store_ok {
        let body = json!({ "status": "ready", "cache": state.cache.mode() });
        (StatusCode::OK, Json(body))
    } else {
        let body = json!({ "status": "unavailable", "cache": state.cache.mode() });
        (StatusCode::SERVICE_UNAVAILABLE, Json(body))
    }
}

// =============================================================================
// Credential Endpoints
// =============================================================================

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, ApiError> {
    let (username, password) = body.require()?;
    state.auth.register(&username, &password).await?;
    Ok((StatusCode::CREATED, Json(json!({ "message": "registered" }))).into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<CredentialsBody>,
) -> Result<Response, ApiError> {
    let (username, password) = body.require()?;
    state.auth.authenticate(&username, &password).await?;
    Ok((StatusCode::OK, Json(json!({ "message": "ok" }))).into_response())
}
