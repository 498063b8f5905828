//! HTTP server for the gatekey credential service.

pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod server;

pub use config::{AppConfig, LoggingConfig, ServerConfig, StorageConfig};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, GatekeyServer, ServerBuilder, build_app};
