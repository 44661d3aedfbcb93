//! Bearer credentials and their persistence.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::api::types::TokenResponse;
use crate::storage::{KeyValueStore, StoreError};

/// Storage key of the access token.
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key of the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// JWT pair issued by the backend.
#[derive(Clone)]
pub struct Tokens {
    /// Short-lived bearer token for API requests.
    pub access: SecretString,
    /// Long-lived token exchanged at `/token/refresh/`.
    pub refresh: Option<SecretString>,
}

impl Tokens {
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: refresh.map(SecretString::from),
        }
    }
}

impl std::fmt::Debug for Tokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tokens")
            .field("access", &"[REDACTED]")
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl From<TokenResponse> for Tokens {
    fn from(response: TokenResponse) -> Self {
        Self::new(response.access, response.refresh)
    }
}

/// Reads and writes [`Tokens`] in the key-value store.
#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load persisted tokens. Absent or unreadable state is `None`.
    #[must_use]
    pub fn load(&self) -> Option<Tokens> {
        let access = self.read(ACCESS_TOKEN_KEY)?;
        Some(Tokens {
            access,
            refresh: self.read(REFRESH_TOKEN_KEY),
        })
    }

    /// Persist both tokens, removing a stale refresh token when absent.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn save(&self, tokens: &Tokens) -> Result<(), StoreError> {
        self.set_access(&tokens.access)?;
        match &tokens.refresh {
            Some(refresh) => self.store.set(
                REFRESH_TOKEN_KEY,
                &Value::String(refresh.expose_secret().to_string()),
            ),
            None => self.store.remove(REFRESH_TOKEN_KEY),
        }
    }

    /// Replace only the access token.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn set_access(&self, access: &SecretString) -> Result<(), StoreError> {
        self.store.set(
            ACCESS_TOKEN_KEY,
            &Value::String(access.expose_secret().to_string()),
        )
    }

    /// Remove both tokens.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(ACCESS_TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)
    }

    fn read(&self, key: &str) -> Option<SecretString> {
        match self.store.get(key) {
            Ok(Some(Value::String(s))) if !s.is_empty() => Some(SecretString::from(s)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read stored token");
                None
            }
        }
    }
}
