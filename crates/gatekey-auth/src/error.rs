//! Authentication error types.
//!
//! One taxonomy for both flows. "No such user" and "wrong password" are
//! deliberately a single variant so callers cannot enumerate usernames.

/// Errors that can occur during registration and authentication.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A required credential field was empty or absent.
    ///
    /// Raised before any store or cache access.
    #[error("Missing credential: {field}")]
    MissingCredential {
        /// Name of the missing field.
        field: &'static str,
    },

    /// The username/password pair does not match a known record.
    ///
    /// Covers both an unknown username and a wrong password for an
    /// existing one; the two are indistinguishable to the caller.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The username is already registered.
    #[error("Username already taken: {username}")]
    UsernameTaken {
        /// The conflicting username.
        username: String,
    },

    /// A cache entry existed but could not be deserialized.
    ///
    /// This is a hard error, not a miss: silently falling through to the
    /// store could mask a poisoned cache.
    #[error("Cache corruption: {message}")]
    CacheCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// The credential store failed or is unreachable.
    #[error("Store unavailable: {message}")]
    StoreUnavailable {
        /// Description of the store failure.
        message: String,
    },

    /// Password hashing or hash parsing failed.
    #[error("Hashing unavailable: {message}")]
    HashingUnavailable {
        /// Description of the hashing failure.
        message: String,
    },
}

impl AuthError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create a `MissingCredential` error.
    #[must_use]
    pub fn missing(field: &'static str) -> Self {
        Self::MissingCredential { field }
    }

    /// Create a `UsernameTaken` error.
    #[must_use]
    pub fn username_taken(username: impl Into<String>) -> Self {
        Self::UsernameTaken {
            username: username.into(),
        }
    }

    /// Create a `CacheCorruption` error.
    #[must_use]
    pub fn cache_corruption(message: impl Into<String>) -> Self {
        Self::CacheCorruption {
            message: message.into(),
        }
    }

    /// Create a `StoreUnavailable` error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    /// Create a `HashingUnavailable` error.
    #[must_use]
    pub fn hashing(message: impl Into<String>) -> Self {
        Self::HashingUnavailable {
            message: message.into(),
        }
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this error is the caller's fault (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCredential { .. } | Self::InvalidCredentials | Self::UsernameTaken { .. }
        )
    }

    /// Returns `true` if this error is internal (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Stable kind label for diagnostics.
    ///
    /// Internal failures surface to callers as a generic server error, so
    /// this label is what keeps e.g. cache corruption distinguishable from
    /// store failures in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential { .. } => "missing_credential",
            Self::InvalidCredentials => "invalid_credentials",
            Self::UsernameTaken { .. } => "username_taken",
            Self::CacheCorruption { .. } => "cache_corruption",
            Self::StoreUnavailable { .. } => "store_unavailable",
            Self::HashingUnavailable { .. } => "hashing_unavailable",
        }
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_is_client_error() {
        let err = AuthError::missing("username");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert_eq!(err.to_string(), "Missing credential: username");
        assert_eq!(err.kind(), "missing_credential");
    }

    #[test]
    fn test_invalid_credentials_is_client_error() {
        let err = AuthError::InvalidCredentials;
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Invalid credentials");
    }

    #[test]
    fn test_username_taken_is_client_error() {
        let err = AuthError::username_taken("alice");
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Username already taken: alice");
    }

    #[test]
    fn test_cache_corruption_is_server_error() {
        let err = AuthError::cache_corruption("invalid JSON at byte 3");
        assert!(err.is_server_error());
        assert!(!err.is_client_error());
        assert_eq!(err.kind(), "cache_corruption");
    }

    #[test]
    fn test_store_and_hashing_are_server_errors() {
        assert!(AuthError::store("connection refused").is_server_error());
        assert!(AuthError::hashing("malformed PHC string").is_server_error());
        assert_eq!(AuthError::store("x").kind(), "store_unavailable");
        assert_eq!(AuthError::hashing("x").kind(), "hashing_unavailable");
    }
}
