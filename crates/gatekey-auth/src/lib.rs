//! Core credential flows for gatekey.
//!
//! This crate holds the domain logic of the service: the authentication
//! flow with its cache-aside read path, the registration flow, password
//! hashing, and the contracts the storage and cache backends implement.
//!
//! Backends live in sibling crates (`gatekey-auth-postgres`,
//! `gatekey-cache`); everything here is expressed against the
//! [`CredentialStore`] and [`LookupCache`] traits so the flows can be
//! exercised with in-memory fakes.

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod store;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use service::AuthService;
pub use store::{CacheError, CachedCredentials, CredentialStore, LookupCache, UserRecord};
