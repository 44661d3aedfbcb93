//! Authenticated / anonymous session state.
//!
//! [`SessionController`] owns the bearer tokens and the current user, and
//! drives cart reconciliation at the two transitions:
//!
//! - anonymous to authenticated: the guest cart is merged into the user's
//!   server cart before the session is marked authenticated;
//! - authenticated to anonymous: the server cart is copied into the guest
//!   store before the tokens are discarded.
//!
//! An access token rejected with 401 is refreshed once and the request
//! retried once. If the refresh itself fails the session expires: tokens
//! are dropped without the logout snapshot.
//!
//! # Example
//!
//! ```rust,ignore
//! let session = storefront.session();
//! session.init().await;
//!
//! let report = session.login("asha", &password).await?;
//! if !report.is_clean() {
//!     tracing::warn!(failed = report.failed.len(), "Some cart items were not merged");
//! }
//! ```

mod tokens;

pub use tokens::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, TokenStore, Tokens};

use std::future::Future;
use std::sync::Arc;

use miracle_core::{Email, EmailError, UserRecord, is_user_admin};
use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::api::types::{
    LoginRequest, MessageResponse, RefreshRequest, RegisterRequest, SendOtpRequest,
    TokenResponse, VerifyOtpRequest,
};
use crate::api::{ApiClient, ApiError, Auth};
use crate::cart::{MergeReport, Reconciler};
use crate::error::{clear_sentry_user, set_sentry_user};

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Backend request failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The operation needs a logged-in user.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Tokens were rejected and could not be refreshed.
    #[error("Session expired, please log in again")]
    SessionExpired,

    /// Email address failed local validation.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Backend response lacked a required token.
    #[error("Backend did not return the expected tokens")]
    MissingTokens,
}

/// Who the client is acting as.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated(UserRecord),
}

// =============================================================================
// SessionController
// =============================================================================

/// Owner of the auth state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    api: ApiClient,
    tokens: TokenStore,
    reconciler: Reconciler,
    state: RwLock<SessionState>,
    /// Held while exchanging the refresh token so concurrent 401s refresh once.
    refresh_lock: Mutex<()>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController").finish_non_exhaustive()
    }
}

impl SessionController {
    /// Create an anonymous controller. Call [`init`](Self::init) to restore
    /// a persisted session.
    #[must_use]
    pub fn new(api: ApiClient, tokens: TokenStore, reconciler: Reconciler) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                api,
                tokens,
                reconciler,
                state: RwLock::new(SessionState::Anonymous),
                refresh_lock: Mutex::new(()),
            }),
        }
    }

    /// Restore the session from persisted tokens.
    ///
    /// The access token is checked against `GET /user/`; if that fails the
    /// tokens are discarded and the session stays anonymous. Returns whether
    /// a session was restored.
    #[instrument(skip(self))]
    pub async fn init(&self) -> bool {
        let Some(tokens) = self.inner.tokens.load() else {
            debug!("No persisted session");
            return false;
        };

        match self.fetch_user(&tokens.access).await {
            Ok(user) => {
                info!(user = %user.display_name(), "Restored session");
                self.become_authenticated(user).await;
                true
            }
            Err(e) => {
                warn!(error = %e, "Persisted session is no longer valid, discarding tokens");
                self.discard_tokens();
                false
            }
        }
    }

    /// Release resources held by the controller.
    ///
    /// Nothing runs in the background, so there is nothing to stop.
    pub const fn dispose(&self) {}

    // =========================================================================
    // State
    // =========================================================================

    pub async fn state(&self) -> SessionState {
        self.inner.state.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(*self.inner.state.read().await, SessionState::Authenticated(_))
    }

    pub async fn current_user(&self) -> Option<UserRecord> {
        match &*self.inner.state.read().await {
            SessionState::Authenticated(user) => Some(user.clone()),
            SessionState::Anonymous => None,
        }
    }

    /// Whether the current user may use the admin back-office.
    pub async fn is_admin(&self) -> bool {
        is_user_admin(self.current_user().await.as_ref())
    }

    /// The access token, while authenticated.
    pub async fn access_token(&self) -> Option<SecretString> {
        if !self.is_authenticated().await {
            return None;
        }
        self.inner.tokens.load().map(|t| t.access)
    }

    // =========================================================================
    // Login & registration
    // =========================================================================

    /// Log in with username and password, then merge the guest cart.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Api` if the credentials are rejected or the
    /// user cannot be resolved.
    #[instrument(skip(self, password), fields(username = %username))]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<MergeReport, SessionError> {
        let response: TokenResponse = self
            .inner
            .api
            .send_json(
                Method::POST,
                "/login/",
                &LoginRequest {
                    username,
                    password: password.expose_secret(),
                },
                Auth::None,
            )
            .await?;

        let tokens = Tokens::from(response);
        let user = self.fetch_user(&tokens.access).await?;
        Ok(self.login_with_tokens(user, tokens).await)
    }

    /// Enter the authenticated state with an already-resolved user.
    ///
    /// Tokens are persisted, the guest cart is merged into the server cart,
    /// and only then is the session marked authenticated. Merge problems are
    /// reported, never raised.
    #[instrument(skip_all, fields(user = %user.display_name()))]
    pub async fn login_with_tokens(&self, user: UserRecord, tokens: Tokens) -> MergeReport {
        if let Err(e) = self.inner.tokens.save(&tokens) {
            warn!(error = %e, "Failed to persist tokens");
        }

        let report = self.inner.reconciler.on_login(&tokens.access).await;
        self.become_authenticated(user).await;

        info!("Logged in");
        report
    }

    /// Ask the backend to e-mail a one-time registration code.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` for a malformed address, or
    /// `SessionError::Api` if the backend rejects the request.
    #[instrument(skip(self))]
    pub async fn send_otp(&self, email: &str) -> Result<MessageResponse, SessionError> {
        let email = Email::parse(email.trim())?;
        let response = self
            .inner
            .api
            .send_json(
                Method::POST,
                "/send-otp/",
                &SendOtpRequest {
                    email: email.as_str(),
                },
                Auth::None,
            )
            .await?;
        Ok(response)
    }

    /// Confirm the code sent by [`send_otp`](Self::send_otp).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` for a malformed address, or
    /// `SessionError::Api` if the code is wrong or expired.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<MessageResponse, SessionError> {
        let email = Email::parse(email.trim())?;
        let response = self
            .inner
            .api
            .send_json(
                Method::POST,
                "/verify-otp/",
                &VerifyOtpRequest {
                    email: email.as_str(),
                    otp: otp.trim(),
                },
                Auth::None,
            )
            .await?;
        Ok(response)
    }

    /// Create an account and log straight into it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidEmail` for a malformed address,
    /// `SessionError::MissingTokens` if the backend does not return both
    /// tokens, or `SessionError::Api` on any backend failure.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &SecretString,
    ) -> Result<MergeReport, SessionError> {
        let email = Email::parse(email.trim())?;
        let response: TokenResponse = self
            .inner
            .api
            .send_json(
                Method::POST,
                "/register/",
                &RegisterRequest {
                    name: name.trim(),
                    email: email.as_str(),
                    password: password.expose_secret(),
                },
                Auth::None,
            )
            .await?;

        if response.access.is_empty() || response.refresh.as_deref().is_none_or(str::is_empty) {
            return Err(SessionError::MissingTokens);
        }

        let tokens = Tokens::from(response);
        let user = self.fetch_user(&tokens.access).await?;
        Ok(self.login_with_tokens(user, tokens).await)
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Exchange the refresh token for a new access token and re-resolve the
    /// user.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingTokens` without a stored refresh token,
    /// or `SessionError::Api` if the backend rejects it.
    pub async fn refresh(&self) -> Result<SecretString, SessionError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    #[instrument(skip(self))]
    async fn refresh_locked(&self) -> Result<SecretString, SessionError> {
        let current = self.inner.tokens.load().ok_or(SessionError::MissingTokens)?;
        let refresh = current.refresh.ok_or(SessionError::MissingTokens)?;

        let response: TokenResponse = self
            .inner
            .api
            .send_json(
                Method::POST,
                "/token/refresh/",
                &RefreshRequest {
                    refresh: refresh.expose_secret(),
                },
                Auth::None,
            )
            .await?;

        // The backend only sends a refresh token when it rotates them.
        let tokens = Tokens {
            access: SecretString::from(response.access),
            refresh: Some(response.refresh.map_or(refresh, SecretString::from)),
        };
        if let Err(e) = self.inner.tokens.save(&tokens) {
            warn!(error = %e, "Failed to persist refreshed tokens");
        }

        let user = self.fetch_user(&tokens.access).await?;
        self.become_authenticated(user).await;

        debug!("Access token refreshed");
        Ok(tokens.access)
    }

    /// Refresh unless another task already replaced `stale`.
    async fn refresh_after(&self, stale: &SecretString) -> Result<SecretString, SessionError> {
        let _guard = self.inner.refresh_lock.lock().await;

        if let Some(current) = self.inner.tokens.load()
            && current.access.expose_secret() != stale.expose_secret()
        {
            return Ok(current.access);
        }

        self.refresh_locked().await
    }

    /// Run an authenticated request.
    ///
    /// `op` receives the access token. On a 401 the token is refreshed once
    /// and `op` retried once; if the refresh fails, or the retried request
    /// is still unauthorized, the session expires.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAuthenticated` without a stored token,
    /// `SessionError::SessionExpired` as described above, or the request's
    /// own error.
    pub async fn with_auth<T, F, Fut>(&self, op: F) -> Result<T, SessionError>
    where
        F: Fn(SecretString) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let tokens = self
            .inner
            .tokens
            .load()
            .ok_or(SessionError::NotAuthenticated)?;

        match op(tokens.access.clone()).await {
            Err(e) if e.is_unauthorized() => debug!("Access token rejected, refreshing"),
            other => return other.map_err(SessionError::from),
        }

        let access = match self.refresh_after(&tokens.access).await {
            Ok(access) => access,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                self.expire().await;
                return Err(SessionError::SessionExpired);
            }
        };

        match op(access).await {
            Err(e) if e.is_unauthorized() => {
                warn!("Refreshed token rejected");
                self.expire().await;
                Err(SessionError::SessionExpired)
            }
            other => other.map_err(SessionError::from),
        }
    }

    // =========================================================================
    // Logout
    // =========================================================================

    /// Log out, keeping the server cart as the new guest cart.
    ///
    /// Never fails: the backend call is best-effort and local state is
    /// always cleared.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if let Some(tokens) = self.inner.tokens.load() {
            self.inner.reconciler.snapshot_on_logout(&tokens.access).await;

            if let Some(refresh) = &tokens.refresh {
                let body = RefreshRequest {
                    refresh: refresh.expose_secret(),
                };
                if let Err(e) = self
                    .inner
                    .api
                    .send_unit(Method::POST, "/logout/", &body, Auth::None)
                    .await
                {
                    warn!(error = %e, "Backend logout failed");
                }
            }
        }

        self.expire().await;
        info!("Logged out");
    }

    /// Drop to anonymous without touching the carts.
    async fn expire(&self) {
        self.discard_tokens();
        *self.inner.state.write().await = SessionState::Anonymous;
        clear_sentry_user();
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn fetch_user(&self, access: &SecretString) -> Result<UserRecord, ApiError> {
        self.inner.api.get_json("/user/", Auth::Bearer(access)).await
    }

    async fn become_authenticated(&self, user: UserRecord) {
        let sentry_id = user
            .id
            .map_or_else(|| user.display_name().to_string(), |id| id.to_string());
        set_sentry_user(&sentry_id, Some(user.email.as_str()).filter(|e| !e.is_empty()));
        *self.inner.state.write().await = SessionState::Authenticated(user);
    }

    fn discard_tokens(&self) {
        if let Err(e) = self.inner.tokens.clear() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
    }
}
