//! Router assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use gatekey_auth::AuthService;
use gatekey_auth_postgres::PgPool;
use gatekey_cache::CacheBackend;

use crate::{bootstrap, config::AppConfig, handlers, middleware as app_middleware};

// =============================================================================
// Application State
// =============================================================================

/// Process-wide shared context, built once at startup and cloned into
/// every request task. The cache client and store pool live here, not in
/// ambient globals.
#[derive(Clone)]
pub struct AppState {
    /// The credential flows.
    pub auth: Arc<AuthService>,
    /// Store pool for readiness probes. Absent when the state was built
    /// around a non-Postgres store (tests).
    pub pool: Option<Arc<PgPool>>,
    /// Cache backend handle for readiness reporting.
    pub cache: CacheBackend,
}

// =============================================================================
// Router
// =============================================================================

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        // Credential operations
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        // Middleware stack (order: request id -> cors/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %method,
                        http.target = %uri,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// =============================================================================
// Server
// =============================================================================

pub struct GatekeyServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl ServerBuilder {
    #[must_use]
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    #[must_use]
    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    #[must_use]
    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connect the collaborators and assemble the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unreachable or schema
    /// initialization fails.
    pub async fn build(self) -> anyhow::Result<GatekeyServer> {
        let state = bootstrap::build_state(&self.config).await?;
        let app = build_app(state, &self.config);

        Ok(GatekeyServer {
            addr: self.addr,
            app,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatekeyServer {
    /// Serve until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns an error if binding or serving fails.
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
