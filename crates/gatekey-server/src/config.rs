//! Server configuration.
//!
//! Sections deserialize with serde defaults so a bare config file (or
//! none at all, for local development against default ports) still
//! yields a runnable configuration. Collaborator sections come from the
//! crates that own them.

use std::net::SocketAddr;

use gatekey_auth::AuthConfig;
use gatekey_auth_postgres::PostgresConfig;
use gatekey_cache::RedisConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Flow configuration (cache TTL, key prefix, username collation)
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Storage validations
        if self.storage.postgres.pool_size == 0 {
            return Err("storage.postgres.pool_size must be > 0".into());
        }
        if self.storage.postgres.url.is_none() && self.storage.postgres.host.is_empty() {
            return Err("storage.postgres requires either 'url' or 'host' to be set".into());
        }
        if self.storage.postgres.url.is_none() && self.storage.postgres.database.is_empty() {
            return Err("storage.postgres.database must not be empty".into());
        }
        // Redis validations
        if self.redis.enabled && self.redis.url.is_empty() {
            return Err("redis.enabled=true requires redis.url".into());
        }
        // Auth validations
        if self.auth.cache_ttl_secs == 0 {
            return Err("auth.cache_ttl_secs must be > 0".into());
        }
        if self.auth.cache_key_prefix.is_empty() {
            return Err("auth.cache_key_prefix must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub postgres: PostgresConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from("gatekey.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., GATEKEY__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("GATEKEY")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.addr().port(), 8080);
        assert_eq!(cfg.auth.cache_ttl_secs, 300);
        assert!(!cfg.redis.enabled);
    }

    #[test]
    fn test_toml_sections_deserialize() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [server]
            port = 3000

            [storage.postgres]
            url = "postgres://gatekey:secret@db:5432/gatekey"
            pool_size = 5

            [redis]
            enabled = true
            url = "redis://cache:6379"

            [auth]
            cache_ttl_secs = 120
            case_insensitive_usernames = true

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 3000);
        assert_eq!(
            cfg.storage.postgres.url.as_deref(),
            Some("postgres://gatekey:secret@db:5432/gatekey")
        );
        assert_eq!(cfg.storage.postgres.pool_size, 5);
        assert!(cfg.redis.enabled);
        assert_eq!(cfg.auth.cache_ttl_secs, 120);
        assert!(cfg.auth.case_insensitive_usernames);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let cfg: AppConfig = toml::from_str("[server]\nport = 9090\n").unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.auth.cache_key_prefix, "user:");
        assert_eq!(cfg.storage.postgres.port, 5432);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.server.port = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.auth.cache_ttl_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.redis.enabled = true;
        cfg.redis.url = String::new();
        assert!(cfg.validate().is_err());
    }
}
